//! Concept synthesis from an idea, retrieved context and prior turns.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use craftgen_core::{ConversationTurn, DesignConcept, Error, GenerationBackend, Result};
use craftgen_inference::generate_structured;

use super::prompts::{concept_user_prompt, CONCEPT_SYSTEM_PROMPT};

/// Requests a [`DesignConcept`] from a text generation model.
#[derive(Clone)]
pub struct ConceptSynthesizer {
    generator: Arc<dyn GenerationBackend>,
}

impl ConceptSynthesizer {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Synthesize one concept.
    ///
    /// Output that does not deserialize into the full concept shape, or that
    /// carries an empty `conceptName`, is `StructuredGeneration`. There are no
    /// partial concepts.
    #[instrument(
        skip(self, idea, context, history),
        fields(
            subsystem = "pipeline",
            component = "synthesizer",
            op = "synthesize_concept",
            history_turns = history.len()
        )
    )]
    pub async fn synthesize(
        &self,
        idea: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<DesignConcept> {
        let start = Instant::now();
        let prompt = concept_user_prompt(idea, context, history);
        let concept: DesignConcept =
            generate_structured(self.generator.as_ref(), CONCEPT_SYSTEM_PROMPT, &prompt).await?;

        if concept.concept_name.trim().is_empty() {
            return Err(Error::StructuredGeneration(
                "conceptName is empty".to_string(),
            ));
        }

        info!(
            model = self.generator.model_name(),
            prompt_len = prompt.len(),
            materials = concept.materials.len(),
            colors = concept.colors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Concept synthesized"
        );
        Ok(concept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftgen_inference::mock::MockGenerationBackend;

    const CONCEPT_JSON: &str = r##"```json
{
  "conceptName": "Bamboo Breeze",
  "designPhilosophy": "Lightness",
  "culturalContext": "Song dynasty tea",
  "formFactor": "Tray with cups",
  "dimensions": "30 x 20 x 8 cm",
  "userInteraction": "Pour and share",
  "materials": [{"name": "Bamboo", "finish": "matte"}],
  "colors": [{"name": "Green", "hex": "#7BA05B"}],
  "keyFeatures": ["Stackable"]
}
```"##;

    #[tokio::test]
    async fn test_fenced_response_parses() {
        let backend = MockGenerationBackend::new().with_fixed_response(CONCEPT_JSON);
        let synthesizer = ConceptSynthesizer::new(Arc::new(backend.clone()));
        let concept = synthesizer.synthesize("tea set", "ctx", &[]).await.unwrap();

        assert_eq!(concept.concept_name, "Bamboo Breeze");
        let calls = backend.get_calls();
        assert_eq!(calls[0].system, CONCEPT_SYSTEM_PROMPT);
        assert!(calls[0].prompt.contains("tea set"));
        assert!(calls[0].prompt.contains("ctx"));
    }

    #[tokio::test]
    async fn test_history_reaches_prompt() {
        let backend = MockGenerationBackend::new().with_fixed_response(CONCEPT_JSON);
        let synthesizer = ConceptSynthesizer::new(Arc::new(backend.clone()));
        let history = vec![ConversationTurn::new("assistant", "Earlier concept")];
        synthesizer.synthesize("refine", "ctx", &history).await.unwrap();
        assert!(backend.get_calls()[0]
            .prompt
            .contains("ASSISTANT: Earlier concept"));
    }

    #[tokio::test]
    async fn test_partial_object_is_rejected() {
        let backend = MockGenerationBackend::new()
            .with_fixed_response(r#"{"conceptName": "Half", "materials": []}"#);
        let synthesizer = ConceptSynthesizer::new(Arc::new(backend));
        let err = synthesizer.synthesize("x", "ctx", &[]).await.unwrap_err();
        assert!(matches!(err, Error::StructuredGeneration(_)));
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let backend = MockGenerationBackend::new()
            .with_fixed_response(CONCEPT_JSON.replace("Bamboo Breeze", " "));
        let synthesizer = ConceptSynthesizer::new(Arc::new(backend));
        let err = synthesizer.synthesize("x", "ctx", &[]).await.unwrap_err();
        assert!(matches!(err, Error::StructuredGeneration(msg) if msg.contains("conceptName")));
    }

    #[tokio::test]
    async fn test_prose_response_is_rejected() {
        let backend = MockGenerationBackend::new().with_fixed_response("I cannot help with that.");
        let synthesizer = ConceptSynthesizer::new(Arc::new(backend));
        assert!(matches!(
            synthesizer.synthesize("x", "ctx", &[]).await.unwrap_err(),
            Error::StructuredGeneration(_)
        ));
    }
}
