//! Test doubles for the model-call capability.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::{CallOptions, InferenceError, ModelCall};

/// Replays canned answers in order and records every prompt it receives.
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, InferenceError>>>,
    prompts: Mutex<Vec<(String, CallOptions)>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn answering(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub(crate) fn failing() -> Self {
        Self::new(vec![Err(InferenceError::Timeout { duration_secs: 30 })])
    }

    pub(crate) fn prompts(&self) -> Vec<(String, CallOptions)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelCall for ScriptedModel {
    async fn call(&self, prompt: &str, options: CallOptions) -> Result<String, InferenceError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), options));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(InferenceError::EmptyResponse))
    }
}
