//! DashScope multimodal generation request and response types.

use serde::{Deserialize, Serialize};

/// Request body for `services/aigc/multimodal-generation/generation`.
#[derive(Debug, Serialize)]
pub struct MultimodalRequest {
    pub model: String,
    pub input: MultimodalInput,
    pub parameters: ImageParameters,
}

#[derive(Debug, Serialize)]
pub struct MultimodalInput {
    pub messages: Vec<MultimodalMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultimodalMessage {
    pub role: String,
    pub content: Vec<ContentItem>,
}

/// One content part: either text or an image reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
}

impl ContentItem {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            image: None,
        }
    }

    pub fn image(image: String) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }
}

/// Generation parameters. Unset fields are omitted from the request.
#[derive(Debug, Default, Serialize)]
pub struct ImageParameters {
    pub size: String,
    pub n: u32,
    pub watermark: bool,
    pub prompt_extend: bool,
    pub negative_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_interleave: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_mode: Option<String>,
}

/// Successful response.
#[derive(Debug, Deserialize)]
pub struct MultimodalResponse {
    pub output: Option<MultimodalOutput>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultimodalOutput {
    #[serde(default)]
    pub choices: Vec<MultimodalChoice>,
}

#[derive(Debug, Deserialize)]
pub struct MultimodalChoice {
    pub message: Option<MultimodalMessage>,
}

impl MultimodalResponse {
    /// URL of the first image in the first choice, if present and non-blank.
    pub fn first_image_url(&self) -> Option<&str> {
        self.output
            .as_ref()?
            .choices
            .first()?
            .message
            .as_ref()?
            .content
            .first()?
            .image
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct DashScopeErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}
