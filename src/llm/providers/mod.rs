//! Model provider drivers.

pub mod openai;

use std::sync::Arc;

pub use openai::OpenAiDriver;

use crate::llm::{LlmDriver, LlmSettings};

/// Create a driver for the configured provider.
///
/// All supported providers speak the OpenAI chat-completions wire format,
/// so a single driver covers them; the base URL selects the endpoint.
pub fn create_driver(settings: LlmSettings) -> Arc<dyn LlmDriver> {
    Arc::new(OpenAiDriver::new(settings))
}
