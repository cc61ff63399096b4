//! Structured (JSON) output from text generation models.
//!
//! Models frequently wrap JSON in a Markdown fence or surround it with a
//! sentence of prose. [`extract_json_object`] trims both before strict
//! deserialization.

use serde::de::DeserializeOwned;
use tracing::debug;

use craftgen_core::{Error, GenerationBackend, Result};

/// Return the outermost `{...}` of `raw`, with any code fence removed.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&cleaned[start..=end])
}

/// Parse a model response into `T`. Any failure is `StructuredGeneration`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let json = extract_json_object(raw).ok_or_else(|| {
        Error::StructuredGeneration(format!(
            "response contains no JSON object (length {})",
            raw.len()
        ))
    })?;
    serde_json::from_str(json)
        .map_err(|e| Error::StructuredGeneration(format!("response does not match shape: {}", e)))
}

/// Run one generation call and parse its output into `T`.
///
/// Backend errors propagate unchanged; parse failures are
/// `StructuredGeneration`.
pub async fn generate_structured<T: DeserializeOwned>(
    backend: &dyn GenerationBackend,
    system: &str,
    prompt: &str,
) -> Result<T> {
    let raw = backend.generate_with_system(system, prompt).await?;
    debug!(
        model = backend.model_name(),
        response_len = raw.len(),
        "Structured generation response received"
    );
    parse_structured(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Swatch {
        name: String,
        hex_code: String,
    }

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_fenced_object() {
        let raw = "```json\n{\"name\": \"Celadon\", \"hexCode\": \"#ACE1AF\"}\n```";
        let swatch: Swatch = parse_structured(raw).unwrap();
        assert_eq!(swatch.name, "Celadon");
    }

    #[test]
    fn test_extract_object_inside_prose() {
        let raw = "Here is the swatch you asked for: {\"name\": \"Ink\", \"hexCode\": \"#111111\"} Hope it helps!";
        let swatch: Swatch = parse_structured(raw).unwrap();
        assert_eq!(swatch.hex_code, "#111111");
    }

    #[test]
    fn test_no_object_is_structured_failure() {
        let err = parse_structured::<Swatch>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, Error::StructuredGeneration(_)));
        assert!(extract_json_object("} backwards {").is_none());
    }

    #[test]
    fn test_shape_mismatch_is_structured_failure() {
        let err = parse_structured::<Swatch>(r#"{"name": "Ink"}"#).unwrap_err();
        assert!(matches!(err, Error::StructuredGeneration(msg) if msg.contains("hexCode")));
    }
}
