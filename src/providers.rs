use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Openrouter,
    Openai,
}

impl Provider {
    /// Chat-completions URL used when no endpoint override is configured.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Provider::Openrouter => "https://openrouter.ai/api/v1/chat/completions",
            Provider::Openai => "https://api.openai.com/v1/chat/completions",
        }
    }

    /// Environment variable holding the bearer token.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Openrouter => "OPENROUTER_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Openrouter => write!(f, "openrouter"),
            Provider::Openai => write!(f, "openai"),
        }
    }
}

// -- Message roles ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

// -- Request types ----------------------------------------------------------

/// Message body: plain text, or a list of typed parts for multimodal models.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        ChatMessage { role, content: MessageContent::Text(content.into()) }
    }

    pub fn parts(role: Role, parts: Vec<ContentPart>) -> Self {
        ChatMessage { role, content: MessageContent::Parts(parts) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

// -- Batched response types -------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the top choice. Empty content counts as absent.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

// -- SSE chunk types --------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Option<StreamDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// `choices[0].delta.content`, or `""` when any level is missing.
    pub fn delta_text(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
            .unwrap_or("")
    }
}

// -- Model catalog ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub label: &'static str,
    pub id: &'static str,
    pub supports_image: bool,
}

pub const DEFAULT_MODEL: &str = "moonshotai/moonlight-16b-a3b-instruct:free";
pub const DEFAULT_ASK_MODEL: &str = "deepseek/deepseek-r1:free";

pub const MODELS: &[ModelInfo] = &[
    ModelInfo { label: "Moonlight", id: "moonshotai/moonlight-16b-a3b-instruct:free", supports_image: false },
    ModelInfo { label: "DeepSeek R1", id: "deepseek/deepseek-r1:free", supports_image: false },
    ModelInfo { label: "Phi-4 Reasoning Plus", id: "microsoft/phi-4-reasoning-plus:free", supports_image: false },
    ModelInfo { label: "Reka Flash 3", id: "rekaai/reka-flash-3:free", supports_image: false },
    ModelInfo { label: "Qwen 2.5 VL 72B", id: "qwen/qwen2.5-vl-72b-instruct:free", supports_image: true },
    ModelInfo { label: "Rogue Rose 103B", id: "sophosympatheia/rogue-rose-103b-v0.2:free", supports_image: false },
    ModelInfo { label: "Llama 3.2 11B Vision", id: "meta-llama/llama-3.2-11b-vision-instruct:free", supports_image: false },
    ModelInfo { label: "Llama 3.2 1B Instruct", id: "meta-llama/llama-3.2-1b-instruct:free", supports_image: false },
    ModelInfo { label: "Nemotron 70B", id: "nvidia/llama-3.1-nemotron-70b-instruct:free", supports_image: false },
    ModelInfo { label: "InternVL3 14B", id: "opengvlab/internvl3-14b:free", supports_image: true },
    ModelInfo { label: "Gemma 3 4B", id: "google/gemma-3-4b-it:free", supports_image: true },
];

pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}

/// Unknown models are assumed text-only.
pub fn supports_image(id: &str) -> bool {
    find_model(id).map(|m| m.supports_image).unwrap_or(false)
}
