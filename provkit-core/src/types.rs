//! Core records exchanged with the configuration authority.
//!
//! Every record keeps the fields this crate understands as typed struct
//! members and preserves everything else in a flattened catch-all map, so a
//! record read from the remote side serializes back without losing
//! provider-specific keys.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Open-ended field bag carried alongside the typed fields of a record.
pub type FieldBag = Map<String, Value>;

/// Classification of a provider source, provider, or template.
///
/// Serialized as its snake_case tag. Unknown tags are preserved in
/// [`ProviderType::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    #[default]
    ChatCompletion,
    AgentRunner,
    SpeechToText,
    TextToSpeech,
    Embedding,
    Rerank,
    Other(String),
}

impl ProviderType {
    /// All known provider types, in tab order.
    pub const KNOWN: [ProviderType; 6] = [
        ProviderType::ChatCompletion,
        ProviderType::AgentRunner,
        ProviderType::SpeechToText,
        ProviderType::TextToSpeech,
        ProviderType::Embedding,
        ProviderType::Rerank,
    ];

    /// The wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ChatCompletion => "chat_completion",
            Self::AgentRunner => "agent_runner",
            Self::SpeechToText => "speech_to_text",
            Self::TextToSpeech => "text_to_speech",
            Self::Embedding => "embedding",
            Self::Rerank => "rerank",
            Self::Other(tag) => tag,
        }
    }

    /// Resolve a free-form tab hint (e.g. `select_provider_tts`) into a type.
    ///
    /// Anything unrecognised, including the empty string, resolves to
    /// [`ProviderType::ChatCompletion`].
    pub fn from_tab(value: &str) -> Self {
        let normalized = value.to_lowercase();

        if normalized.starts_with("select_agent_runner_provider") || normalized == "agent_runner"
        {
            Self::AgentRunner
        } else if normalized == "select_provider_stt"
            || normalized == "speech_to_text"
            || normalized.contains("stt")
        {
            Self::SpeechToText
        } else if normalized == "select_provider_tts"
            || normalized == "text_to_speech"
            || normalized.contains("tts")
        {
            Self::TextToSpeech
        } else if normalized.contains("embedding") {
            Self::Embedding
        } else if normalized.contains("rerank") {
            Self::Rerank
        } else {
            Self::ChatCompletion
        }
    }

    /// Map a legacy adapter tag (the `type` field of old provider records).
    pub fn from_legacy_adapter(adapter: &str) -> Option<Self> {
        let resolved = match adapter {
            "openai_chat_completion"
            | "anthropic_chat_completion"
            | "googlegenai_chat_completion"
            | "zhipu_chat_completion"
            | "dashscope" => Self::ChatCompletion,
            "dify" | "coze" => Self::AgentRunner,
            "openai_whisper_api" | "openai_whisper_selfhost" | "sensevoice_stt_selfhost" => {
                Self::SpeechToText
            }
            "openai_tts_api" | "edge_tts" | "gsvi_tts_api" | "fishaudio_tts_api"
            | "dashscope_tts" | "azure_tts" | "minimax_tts_api" | "volcengine_tts" => {
                Self::TextToSpeech
            }
            _ => return None,
        };
        Some(resolved)
    }

    /// Whether an adapter tag belongs to this type (the tag contains ours).
    pub fn matches_adapter(&self, adapter: &str) -> bool {
        !adapter.is_empty() && adapter.contains(self.as_str())
    }
}

impl From<String> for ProviderType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "chat_completion" => Self::ChatCompletion,
            "agent_runner" => Self::AgentRunner,
            "speech_to_text" => Self::SpeechToText,
            "text_to_speech" => Self::TextToSpeech,
            "embedding" => Self::Embedding,
            "rerank" => Self::Rerank,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for ProviderType {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<ProviderType> for String {
    fn from(ty: ProviderType) -> Self {
        match ty {
            ProviderType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input kind a bound model accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Modality {
    Text,
    Image,
    ToolUse,
    Other(String),
}

impl Modality {
    /// Modalities assumed when nothing is known about a model.
    pub fn fallback_set() -> Vec<Modality> {
        vec![Modality::Text, Modality::Image, Modality::ToolUse]
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::ToolUse => "tool_use",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for Modality {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => Self::Text,
            "image" => Self::Image,
            "tool_use" => Self::ToolUse,
            _ => Self::Other(tag),
        }
    }
}

impl From<Modality> for String {
    fn from(modality: Modality) -> Self {
        match modality {
            Modality::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential of a provider source: one key or a rotation list.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceKey {
    Single(String),
    Many(Vec<String>),
}

impl SourceKey {
    /// Whether no usable key is present.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Single(key) => key.trim().is_empty(),
            Self::Many(keys) => keys.iter().all(|k| k.trim().is_empty()),
        }
    }
}

impl fmt::Debug for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => write!(f, "SourceKey([REDACTED])"),
            Self::Many(keys) => write!(f, "SourceKey([REDACTED; {}])", keys.len()),
        }
    }
}

impl From<&str> for SourceKey {
    fn from(key: &str) -> Self {
        Self::Single(key.to_string())
    }
}

/// Catalog blueprint for creating a new provider source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderTemplate {
    /// Default identifier for sources created from this template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,
    /// Adapter tag, e.g. `openai_chat_completion`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    /// Vendor/brand tag.
    #[serde(rename = "provider", default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Every other default field value.
    #[serde(flatten)]
    pub defaults: FieldBag,
}

fn enabled_by_default() -> bool {
    true
}

/// Read an explicit `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_enabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(enabled_by_default))
}

/// A connection/config record from which models are served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(rename = "provider", default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<SourceKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "enabled_by_default", deserialize_with = "null_as_enabled")]
    pub enable: bool,
    #[serde(flatten)]
    pub extra: FieldBag,
}

impl ProviderSource {
    /// Create an enabled source with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_type: None,
            adapter: None,
            family: None,
            key: None,
            api_base: None,
            enable: true,
            extra: FieldBag::new(),
        }
    }

    /// Whether this source is listed under the given provider type.
    pub fn is_of_type(&self, ty: &ProviderType) -> bool {
        self.provider_type.as_ref() == Some(ty)
            || self
                .adapter
                .as_deref()
                .is_some_and(|adapter| ty.matches_adapter(adapter))
    }
}

/// A model bound under a provider source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// `<sourceId>/<modelName>` by convention.
    pub id: String,
    #[serde(
        rename = "provider_source_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,
    /// Legacy adapter tag of providers created before sources existed.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modalities: Vec<Modality>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_context_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enable: bool,
    #[serde(flatten)]
    pub extra: FieldBag,
}

impl Provider {
    /// Synthesize a disabled provider binding `model` under `source_id`.
    ///
    /// Modalities and the context limit come from `metadata` when present;
    /// without metadata the model is assumed to accept text, images and tools.
    pub fn for_model(source_id: &str, model: &str, metadata: Option<&ModelMetadata>) -> Self {
        let (modalities, max_context_tokens) = match metadata {
            Some(meta) => (meta.default_modalities(), meta.context_limit().unwrap_or(0)),
            None => (Modality::fallback_set(), 0),
        };

        let mut extra = FieldBag::new();
        extra.insert("custom_extra_body".to_string(), Value::Object(Map::new()));

        Self {
            id: provider_id(source_id, model),
            source_id: Some(source_id.to_string()),
            provider_type: None,
            adapter: None,
            model: Some(model.to_string()),
            modalities,
            max_context_tokens,
            enable: false,
            extra,
        }
    }

    /// The provider type, falling back to the legacy adapter mapping.
    pub fn resolved_type(&self) -> Option<ProviderType> {
        self.provider_type.clone().or_else(|| {
            self.adapter
                .as_deref()
                .and_then(ProviderType::from_legacy_adapter)
        })
    }
}

/// Build the conventional provider id for a model under a source.
pub fn provider_id(source_id: &str, model: &str) -> String {
    format!("{source_id}/{model}")
}

/// Input/output modalities a model reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalitySupport {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<String>,
}

/// Token limits a model reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<u64>,
}

/// Read-only descriptor of a model, keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<ModalitySupport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<ModelLimit>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_call: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: bool,
    #[serde(flatten)]
    pub extra: FieldBag,
}

impl ModelMetadata {
    pub fn supports_image_input(&self) -> bool {
        self.modalities
            .as_ref()
            .is_some_and(|m| m.input.iter().any(|kind| kind == "image"))
    }

    pub fn supports_tool_call(&self) -> bool {
        self.tool_call
    }

    pub fn supports_reasoning(&self) -> bool {
        self.reasoning
    }

    /// Context window in tokens, if reported.
    pub fn context_limit(&self) -> Option<u64> {
        self.limit.as_ref().and_then(|limit| limit.context)
    }

    /// Compact context window label: `128K`, `1M`, `512`.
    pub fn format_context_limit(&self) -> Option<String> {
        let context = self.context_limit().filter(|ctx| *ctx > 0)?;
        let label = if context >= 1_000_000 {
            format!("{}M", (context as f64 / 1_000_000.0).round())
        } else if context >= 1_000 {
            format!("{}K", (context as f64 / 1_000.0).round())
        } else {
            context.to_string()
        };
        Some(label)
    }

    /// Modalities a new provider for this model should declare.
    pub fn default_modalities(&self) -> Vec<Modality> {
        let mut modalities = vec![Modality::Text];
        if self.supports_image_input() {
            modalities.push(Modality::Image);
        }
        if self.supports_tool_call() {
            modalities.push(Modality::ToolUse);
        }
        modalities
    }
}
