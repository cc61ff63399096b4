//! Image generation request types.
//!
//! A [`GenerationRequest`] is resolved once by the image strategy and then
//! dispatched by the provider backend. Each variant carries exactly the
//! parameter set its model call needs, so reference conditioning and the
//! interleaved flag can never be sent together.

use base64::Engine;

/// Mode requested by a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    TextToImage,
    ImageToImage,
}

/// How the transfer model applies the reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Repaint,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Repaint => "repaint",
        }
    }
}

/// Reference image handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceImage {
    /// Bytes fetched from our own storage.
    Inline { bytes: Vec<u8>, mime: String },
    /// A URL the provider dereferences itself.
    Url(String),
}

impl ReferenceImage {
    /// Value for the provider's `image` field: a `data:` URI or the plain URL.
    pub fn to_provider_value(&self) -> String {
        match self {
            ReferenceImage::Inline { bytes, mime } => format!(
                "data:{};base64,{}",
                mime,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            ReferenceImage::Url(url) => url.clone(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ReferenceImage::Inline { .. })
    }
}

/// A fully resolved image generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    /// General-purpose text-to-image model, no extra parameters.
    TextToImage {
        prompt: String,
        negative_prompt: String,
    },
    /// Transfer model without a reference; interleaved generation enabled.
    TransferText {
        prompt: String,
        negative_prompt: String,
    },
    /// Transfer model conditioned on a reference image.
    ImageToImage {
        prompt: String,
        negative_prompt: String,
        reference: ReferenceImage,
        strength: f32,
        transfer_mode: TransferMode,
    },
}

impl GenerationRequest {
    pub fn prompt(&self) -> &str {
        match self {
            GenerationRequest::TextToImage { prompt, .. }
            | GenerationRequest::TransferText { prompt, .. }
            | GenerationRequest::ImageToImage { prompt, .. } => prompt,
        }
    }

    pub fn negative_prompt(&self) -> &str {
        match self {
            GenerationRequest::TextToImage {
                negative_prompt, ..
            }
            | GenerationRequest::TransferText {
                negative_prompt, ..
            }
            | GenerationRequest::ImageToImage {
                negative_prompt, ..
            } => negative_prompt,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationRequest::TextToImage { .. } => "text_to_image",
            GenerationRequest::TransferText { .. } => "transfer_text",
            GenerationRequest::ImageToImage { .. } => "image_to_image",
        }
    }

    pub fn reference(&self) -> Option<&ReferenceImage> {
        match self {
            GenerationRequest::ImageToImage { reference, .. } => Some(reference),
            _ => None,
        }
    }
}
