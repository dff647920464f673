//! Vision service seam: one multimodal request in, response text out.
//!
//! [`VisionService`] is the boundary the extraction adapter talks to. The
//! production implementation, [`LlmVisionService`], forwards to any
//! `edgequake_llm` provider; tests and embedders plug in their own.
//!
//! ## No retries here
//!
//! The whole drawing set goes out in a single request. Re-sending it is
//! expensive and may return different records, so a failed call is reported
//! to the caller as-is and retry policy stays above the pipeline.

use crate::error::SheetmarkError;
use crate::prompts::USER_INSTRUCTION;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tracing::{debug, error};

/// A single extraction request.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Rendered instructions (page count already substituted).
    pub system_prompt: String,
    /// Page images in page order.
    pub images: Vec<ImageData>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw service reply.
#[derive(Debug, Clone, Default)]
pub struct VisionResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Something that can read page images and answer in text.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Send `request` and return the reply text.
    ///
    /// Implementations report transport/provider failures as
    /// [`SheetmarkError::ServiceError`]. Empty replies are checked by the
    /// caller.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, SheetmarkError>;
}

/// [`VisionService`] backed by an `edgequake_llm` provider.
pub struct LlmVisionService {
    provider: Arc<dyn LLMProvider>,
}

impl LlmVisionService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl VisionService for LlmVisionService {
    /// ## Message layout
    ///
    /// 1. **System message** — the rendered extraction instructions
    /// 2. **User message** — a short instruction plus every page image, in order
    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, SheetmarkError> {
        let messages = vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user_with_images(USER_INSTRUCTION, request.images.clone()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                error!("Vision provider call failed: {}", e);
                SheetmarkError::ServiceError {
                    message: e.to_string(),
                }
            })?;

        debug!(
            "Vision reply: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        Ok(VisionResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Build `CompletionOptions` from the request.
fn build_options(request: &VisionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}
