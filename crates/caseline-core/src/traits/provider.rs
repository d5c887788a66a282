// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative model provider trait for the extraction fallback.

use async_trait::async_trait;

use crate::error::CaselineError;

/// A single-shot completion request.
///
/// The intake pipeline only ever needs one prompt in, one text out;
/// streaming and multi-turn context stay out of this seam.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// The model's completion text plus token accounting for audit logs.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Backend that turns free text into a completion.
///
/// Callers must treat every error as recoverable: the extractor collapses
/// provider failures into an "ai_failed" outcome and re-asks the question.
#[async_trait]
pub trait ModelProvider: Send + Sync + 'static {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, CaselineError>;
}
