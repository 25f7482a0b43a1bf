//! Two-role dialogue over one shared transcript.
//!
//! ## Turn order
//! 1. Optional scenario turn (`system`, speaker `Scenario`)
//! 2. Opening line from role A (`user`)
//! 3. Reply from role B (`assistant`)
//! 4. `rounds` pairs of A (`user`) then B (`assistant`)
//!
//! Calls are strictly sequential. The observer receives a full transcript
//! snapshot after every single append, so a failed or cancelled run leaves
//! the observer with exactly the turns that were completed.

use std::future::Future;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::providers::{ChatMessage, Role};
use crate::ChatClient;

pub const SCENARIO_SPEAKER: &str = "Scenario";
pub const NO_RESPONSE: &str = "No response";

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub message: String,
    pub role: Role,
}

impl ConversationTurn {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>, role: Role) -> Self {
        ConversationTurn { speaker: speaker.into(), message: message.into(), role }
    }

    pub fn is_scenario(&self) -> bool {
        self.role == Role::System
    }
}

/// A persona bound to the model that speaks for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub name: String,
    pub description: String,
    pub model: String,
}

impl RoleDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        RoleDescriptor { name: name.into(), description: description.into(), model: model.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialogueConfig {
    pub role_a: RoleDescriptor,
    pub role_b: RoleDescriptor,
    #[serde(default)]
    pub scenario: Option<String>,
    /// Explicit opening line for role A. Wins over the scenario heuristic.
    #[serde(default)]
    pub opening: Option<String>,
    /// Used when neither `opening` nor the scenario yields a line.
    #[serde(default)]
    pub fallback_opening: String,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

fn default_rounds() -> usize {
    3
}

impl DialogueConfig {
    /// The physicists' debate the app ships with.
    pub fn physics_debate(model_a: &str, model_b: &str) -> Self {
        DialogueConfig {
            role_a: RoleDescriptor::new(
                "Theoretical Physicist",
                "A physicist specializing in theoretical frameworks, including general relativity \
                 and quantum mechanics. Explores the boundaries of physics and is open to \
                 speculative ideas like warp drives and wormholes.",
                model_a,
            ),
            role_b: RoleDescriptor::new(
                "Experimental Physicist",
                "A physicist focused on experimental validation of physical theories. Works with \
                 particle accelerators and advanced instrumentation to test the limits of known \
                 physics. Skeptical of ideas that lack experimental evidence.",
                model_b,
            ),
            scenario: Some(
                "Two physicists are debating the feasibility of faster-than-light (FTL) travel. \
                 The Theoretical Physicist argues that FTL travel is theoretically possible under \
                 certain conditions, such as using a warp drive based on Einstein's equations. \
                 The Experimental Physicist counters that there is no experimental evidence to \
                 support such claims and that the energy requirements make it impractical. The \
                 discussion begins with the Theoretical Physicist asking the Experimental \
                 Physicist about their thoughts on the feasibility of FTL travel."
                    .to_string(),
            ),
            opening: None,
            fallback_opening: "What are your thoughts on the feasibility of faster-than-light \
                               travel, given current scientific understanding?"
                .to_string(),
            rounds: default_rounds(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.role_a.name.trim().is_empty() {
            return Err(ChatError::EmptyInput { what: "a name for the first role" });
        }
        if self.role_b.name.trim().is_empty() {
            return Err(ChatError::EmptyInput { what: "a name for the second role" });
        }
        Ok(())
    }

    /// Explicit opening, else the scenario heuristic, else the fallback.
    pub fn resolve_opening(&self) -> Result<String> {
        let explicit = self.opening.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let line = match explicit {
            Some(text) => text.to_string(),
            None => self
                .scenario
                .as_deref()
                .and_then(|s| extract_opening(s, &self.role_a.name))
                .unwrap_or_else(|| self.fallback_opening.trim().to_string()),
        };
        if line.is_empty() {
            return Err(ChatError::EmptyInput { what: "an opening line or a scenario" });
        }
        Ok(line)
    }
}

/// Best-effort: find "`<role> asks|says|inquires|questions <rest>`" in free text.
///
/// The capture stops at the first `.`, `!`, `?` or line end; `?` is appended
/// when the capture carries no terminal punctuation.
pub fn extract_opening(scenario: &str, role_name: &str) -> Option<String> {
    let role_name = role_name.trim();
    if role_name.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(?im){}\s+(?:asks|says|inquires|questions)\s+(.*?)(?:[.!?]|$)",
        regex::escape(role_name)
    );
    let re = Regex::new(&pattern).ok()?;
    let mut line = re.captures(scenario)?.get(1)?.as_str().trim().to_string();
    if line.is_empty() {
        return None;
    }
    if !line.ends_with(&['.', '!', '?'][..]) {
        line.push('?');
    }
    Some(line)
}

/// Transcript as replayed to the model: everything but the scenario turn.
pub fn replay_history(transcript: &[ConversationTurn]) -> &[ConversationTurn] {
    match transcript.first() {
        Some(first) if first.is_scenario() => &transcript[1..],
        _ => transcript,
    }
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

/// Produces the next utterance for `me`, given the history so far.
pub trait Responder {
    fn respond(
        &self,
        history: &[ConversationTurn],
        me: &RoleDescriptor,
        other: &RoleDescriptor,
        model: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// System instruction keeping the model in `me`'s character.
pub fn persona_prompt(me: &RoleDescriptor, other: &RoleDescriptor) -> String {
    format!(
        "You are roleplaying as {me_name}: {me_desc}.\n\
         You are having a conversation with {other_name}: {other_desc}.\n\
         Stay completely in character as {me_name} throughout your response.\n\
         Only respond as {me_name} would respond in this conversation.\n\
         Maintain the conversational context and don't perform unrelated tasks.",
        me_name = me.name,
        me_desc = me.description.trim(),
        other_name = other.name,
        other_desc = other.description.trim(),
    )
}

/// Persona instruction followed by the history, scenario turns skipped.
pub fn build_messages(
    history: &[ConversationTurn],
    me: &RoleDescriptor,
    other: &RoleDescriptor,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::text(Role::System, persona_prompt(me, other)));
    messages.extend(
        history
            .iter()
            .filter(|turn| !turn.is_scenario())
            .map(|turn| ChatMessage::text(turn.role, turn.message.clone())),
    );
    messages
}

/// Responder backed by one non-streaming completion per turn.
pub struct RemoteResponder {
    client: ChatClient,
}

impl RemoteResponder {
    pub fn new(client: ChatClient) -> Self {
        RemoteResponder { client }
    }
}

impl Responder for RemoteResponder {
    async fn respond(
        &self,
        history: &[ConversationTurn],
        me: &RoleDescriptor,
        other: &RoleDescriptor,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let messages = build_messages(history, me, other);
        let reply = self.client.complete(model, messages, cancel).await?;
        Ok(reply.unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueStatus {
    Idle,
    Running,
    Completed,
    /// A remote call failed; the transcript holds every turn before it.
    Failed(String),
    Cancelled,
}

/// Owner of one dialogue's transcript and status.
pub struct DialogueSession {
    id: Uuid,
    transcript: Vec<ConversationTurn>,
    status: DialogueStatus,
    observer: Option<mpsc::UnboundedSender<Vec<ConversationTurn>>>,
}

impl Default for DialogueSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueSession {
    pub fn new() -> Self {
        DialogueSession {
            id: Uuid::new_v4(),
            transcript: Vec::new(),
            status: DialogueStatus::Idle,
            observer: None,
        }
    }

    /// Snapshots of the transcript are sent to `tx` after every append.
    pub fn with_observer(tx: mpsc::UnboundedSender<Vec<ConversationTurn>>) -> Self {
        DialogueSession { observer: Some(tx), ..Self::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    pub fn status(&self) -> &DialogueStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == DialogueStatus::Running
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DialogueStatus::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// Clear transcript and error state.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.status = DialogueStatus::Idle;
        self.publish();
    }

    /// Run a full dialogue.
    ///
    /// Validation problems are returned as `Err` before anything is sent.
    /// Failures of the remote calls are recorded in the returned status and
    /// stop further rounds.
    pub async fn run<R: Responder>(
        &mut self,
        config: &DialogueConfig,
        responder: &R,
        cancel: &CancellationToken,
    ) -> Result<DialogueStatus> {
        config.validate()?;
        let opening = config.resolve_opening()?;

        self.transcript.clear();
        self.status = DialogueStatus::Running;
        info!(session = %self.id, rounds = config.rounds, "dialogue started");

        if let Some(scenario) = config.scenario.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            self.append(ConversationTurn::new(SCENARIO_SPEAKER, scenario, Role::System));
        }
        self.append(ConversationTurn::new(&config.role_a.name, opening, Role::User));

        self.status = match self.exchange(config, responder, cancel).await {
            Ok(()) => DialogueStatus::Completed,
            Err(ChatError::Cancelled) => {
                info!(session = %self.id, turns = self.transcript.len(), "dialogue cancelled");
                DialogueStatus::Cancelled
            }
            Err(e) => {
                error!(session = %self.id, error = %e, turns = self.transcript.len(), "dialogue failed");
                DialogueStatus::Failed(e.to_string())
            }
        };
        Ok(self.status.clone())
    }

    async fn exchange<R: Responder>(
        &mut self,
        config: &DialogueConfig,
        responder: &R,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (a, b) = (&config.role_a, &config.role_b);

        self.take_turn(responder, b, a, Role::Assistant, cancel).await?;
        for round in 0..config.rounds {
            debug!(session = %self.id, round = round + 1, "round started");
            self.take_turn(responder, a, b, Role::User, cancel).await?;
            self.take_turn(responder, b, a, Role::Assistant, cancel).await?;
        }
        info!(session = %self.id, turns = self.transcript.len(), "dialogue completed");
        Ok(())
    }

    async fn take_turn<R: Responder>(
        &mut self,
        responder: &R,
        me: &RoleDescriptor,
        other: &RoleDescriptor,
        role: Role,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        let history = replay_history(&self.transcript);
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            reply = responder.respond(history, me, other, &me.model, cancel) => Some(reply),
        };
        let message = reply.ok_or(ChatError::Cancelled)??;
        self.append(ConversationTurn::new(&me.name, message, role));
        Ok(())
    }

    fn append(&mut self, turn: ConversationTurn) {
        debug!(session = %self.id, speaker = %turn.speaker, role = %turn.role, "turn appended");
        self.transcript.push(turn);
        self.publish();
    }

    fn publish(&self) {
        if let Some(tx) = &self.observer {
            let _ = tx.send(self.transcript.clone());
        }
    }
}
