use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    conversation::Exchange,
    replicate::{api::ApiError, HttpReplicate, ReplicateApi, ReplicateModel},
    tone::{ModelType, Tone},
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Misconfigured tone: {0}")]
    Configuration(String),
    #[error("The generation failed.")]
    Generation(GenerationErrorKind),
    #[error("{0} tones aren't available on this bot.")]
    Unavailable(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
}
impl GenerationError {
    pub fn configuration(s: impl Into<String>) -> Self {
        Self::Configuration(s.into())
    }
}

/// Why a provider reported failure. Replicate gives us nothing to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    Other,
}

/// Token limits for a single request, already resolved against the defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub context_tokens: usize,
    pub generation_tokens: usize,
    pub max_messages: usize,
}
impl Default for Budget {
    fn default() -> Self {
        Self {
            context_tokens: 800,
            generation_tokens: 400,
            max_messages: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt: usize,
    pub completion: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub usage: Usage,
    pub duration: Duration,
}

pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;

pub struct GenerationOptions<'a> {
    pub prompt: String,
    pub tone: &'a Tone,
    pub budget: Budget,
    /// Previous exchanges with this user, oldest first.
    pub history: Vec<Exchange>,
    /// System preamble the tone's prompt is layered onto.
    pub preamble: &'a str,
    /// Called with the partial text as it streams in. May repeat itself.
    pub progress: ProgressFn,
}

/// Rough token count, about four characters per token for English text.
pub fn prompt_length(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Routes a generation to the provider backing its tone.
pub struct ChatClient<A = HttpReplicate> {
    replicate: ReplicateModel<A>,
}
impl<A: ReplicateApi> ChatClient<A> {
    pub fn new(replicate: ReplicateModel<A>) -> Self {
        Self { replicate }
    }

    pub fn is_available(&self, tone: &Tone) -> bool {
        matches!(tone.settings.model, ModelType::Replicate(_))
    }

    pub async fn complete(
        &self,
        options: GenerationOptions<'_>,
    ) -> Result<Response, GenerationError> {
        match options.tone.settings.model {
            ModelType::Replicate(_) => self.replicate.complete(options).await,
            other => Err(GenerationError::Unavailable(other.name())),
        }
    }
}
