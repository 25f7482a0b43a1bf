//! Single-exchange front ends: ask, curio (streamed, with history) and math.

use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::providers::{self, ChatMessage, ContentPart, ImageUrl, Role};
use crate::ChatClient;

pub const ASK_PLACEHOLDER: &str = "No response from the API.";
pub const MATH_PLACEHOLDER: &str = "No solution found.";

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

pub async fn ask(
    client: &ChatClient,
    model: &str,
    question: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    if question.trim().is_empty() {
        return Err(ChatError::EmptyInput { what: "a question" });
    }
    let messages = vec![ChatMessage::text(Role::User, question)];
    let reply = client.complete(model, messages, cancel).await?;
    Ok(reply.unwrap_or_else(|| ASK_PLACEHOLDER.to_string()))
}

// ---------------------------------------------------------------------------
// math
// ---------------------------------------------------------------------------

/// One user message asking the model to solve a LaTeX equation.
pub fn math_messages(equation: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::parts(
        Role::User,
        vec![ContentPart::Text { text: format!("Solve this equation: {equation}") }],
    )]
}

pub async fn solve_equation(
    client: &ChatClient,
    model: &str,
    equation: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    if equation.trim().is_empty() {
        return Err(ChatError::EmptyInput { what: "a mathematical equation" });
    }
    let reply = client.complete(model, math_messages(equation), cancel).await?;
    Ok(reply.unwrap_or_else(|| MATH_PLACEHOLDER.to_string()))
}

// ---------------------------------------------------------------------------
// curio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    pub question: String,
    pub response: String,
}

/// Streamed Q&A with an in-memory history of finished exchanges.
#[derive(Debug, Clone)]
pub struct CurioSession {
    model: String,
    history: Vec<HistoryItem>,
}

impl CurioSession {
    pub fn new(model: impl Into<String>) -> Self {
        CurioSession { model: model.into(), history: Vec::new() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The user message for one question. Images are only attached when the
    /// current model accepts them.
    pub fn build_message(&self, question: &str, image_url: Option<&str>) -> Result<ChatMessage> {
        let image_url = image_url.map(str::trim).filter(|u| !u.is_empty());
        if question.trim().is_empty() && image_url.is_none() {
            return Err(ChatError::EmptyInput { what: "a question or an image" });
        }

        let mut parts = Vec::new();
        if !question.trim().is_empty() {
            parts.push(ContentPart::Text { text: question.to_string() });
        }
        if let Some(url) = image_url {
            if providers::supports_image(&self.model) {
                parts.push(ContentPart::ImageUrl { image_url: ImageUrl { url: url.to_string() } });
            } else {
                debug!(model = %self.model, "model does not accept images; image dropped");
            }
        }
        if parts.is_empty() {
            return Err(ChatError::EmptyInput {
                what: "a question (the selected model does not accept images)",
            });
        }
        Ok(ChatMessage::parts(Role::User, parts))
    }

    /// Stream one answer, handing each fragment to `on_fragment` as it arrives.
    ///
    /// The exchange is added to the history only when the stream finishes
    /// without error.
    pub async fn ask<F>(
        &mut self,
        client: &ChatClient,
        question: &str,
        image_url: Option<&str>,
        cancel: &CancellationToken,
        mut on_fragment: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let message = self.build_message(question, image_url)?;
        let mut fragments = client.stream(&self.model, vec![message], cancel).await?;

        let mut response = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            response.push_str(&fragment);
        }

        self.history.push(HistoryItem { question: question.to_string(), response: response.clone() });
        Ok(response)
    }
}
