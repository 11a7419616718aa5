use serde::{Deserialize, Serialize};

use crate::config::Config;

// Opaque conversation state handed back by Ollama, passed along untouched
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Context(pub Vec<i64>);

impl Context {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Ollama /api/generate request body
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub context: Option<Context>, // serialized as null on the first request
    pub stream: bool,
}

impl GenerateRequest {
    /// Opens a conversation: no prior context.
    pub fn first(body: impl Into<String>, config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            prompt: body.into(),
            system: config.system_prompt.clone(),
            context: None,
            stream: true,
        }
    }

    /// Continues the conversation the given context came from.
    pub fn continuation(body: impl Into<String>, config: &Config, context: Context) -> Self {
        Self {
            context: Some(context),
            ..Self::first(body, config)
        }
    }
}

// One line of the streamed response. Other fields Ollama sends are ignored
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GenerateFragment {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub context: Option<Context>, // only set on the done fragment
}
