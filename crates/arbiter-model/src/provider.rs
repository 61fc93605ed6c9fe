use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Input modality a provider accepts alongside text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputModality {
    Text,
    Image,
}

/// The capability boundary between the Agentic Loop and the LLM client it
/// drives. The loop only ever depends on this trait; which vendor or mock
/// implements it is a configuration-time injection, not a loop concern.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;

    /// Input modalities this provider/model accepts. Defaults to `[Text]`,
    /// to be conservative (avoid sending images to a model that can't use
    /// them).
    fn input_modalities(&self) -> Vec<InputModality> {
        vec![InputModality::Text]
    }

    /// Returns `true` if this model supports image input.
    fn supports_images(&self) -> bool {
        self.input_modalities().contains(&InputModality::Image)
    }
}
