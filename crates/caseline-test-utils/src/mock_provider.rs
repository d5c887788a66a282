// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! `MockModelProvider` implements [`ModelProvider`] with pre-configured
//! responses, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use caseline_core::{CaselineError, ModelProvider, ModelRequest, ModelResponse};

/// A mock model provider that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a
/// default `{}` text is returned (the extraction contract's "nothing
/// found" shape). In failing mode every call errors.
pub struct MockModelProvider {
    responses: Arc<Mutex<VecDeque<String>>>,
    fail: bool,
}

impl MockModelProvider {
    /// Create a mock provider with an empty response queue.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fail: false,
        }
    }

    /// Create a mock provider pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            fail: false,
        }
    }

    /// Create a mock provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fail: true,
        }
    }

    /// Add a response to the end of the queue.
    pub async fn add_response(&self, text: String) {
        self.responses.lock().await.push_back(text);
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, CaselineError> {
        if self.fail {
            return Err(CaselineError::Provider {
                message: "mock provider configured to fail".into(),
                source: None,
            });
        }
        let text = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "{}".to_string());
        Ok(ModelResponse {
            text,
            input_tokens: 10,
            output_tokens: 20,
        })
    }
}
