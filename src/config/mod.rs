//! Configuration (layered: code > env > config file > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ToolcodeError;
use crate::sandbox::{SandboxLimits, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
use crate::types::GenerationSettings;

/// Fixed text tokens the agent loop writes and looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentMarkers {
    /// Header that introduces a call block.
    pub call_header: String,
    /// Fence opening the call expression.
    pub call_open: String,
    /// Fence closing the call expression.
    pub call_close: String,
    /// Terminal marker: the model's final answer follows it.
    pub response_header: String,
    /// Header of synthetic tool-feedback turns.
    pub feedback_header: String,
    /// Header of synthetic corrective and warning text.
    pub alert_header: String,
    /// Header prefixed to plain user input, if any.
    pub user_header: Option<String>,
    /// Header the model is told to continue with after feedback.
    pub think_header: String,
}

impl Default for SegmentMarkers {
    fn default() -> Self {
        use crate::detector::segments::header;
        Self {
            call_header: header("call_tool_code"),
            call_open: "```tool_code\n".to_string(),
            call_close: "\n```".to_string(),
            response_header: header("send_response_to_user"),
            feedback_header: header("system_feedback"),
            alert_header: header("system_alert"),
            user_header: Some(header("user_message")),
            think_header: header("think"),
        }
    }
}

impl SegmentMarkers {
    fn validate(&self) -> Result<(), ToolcodeError> {
        for (name, value) in [
            ("call_header", &self.call_header),
            ("call_open", &self.call_open),
            ("call_close", &self.call_close),
            ("response_header", &self.response_header),
        ] {
            if value.is_empty() {
                return Err(ToolcodeError::Configuration(format!(
                    "marker '{name}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Settings for one agent session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Cycles one user turn may use before it fails.
    #[builder(default = 3)]
    pub max_cycles: u32,
    /// Wall-clock budget for each sandbox run.
    #[serde(rename = "sandbox_timeout_ms", with = "duration_ms")]
    #[builder(default = DEFAULT_TIMEOUT)]
    pub sandbox_timeout: Duration,
    /// Cap on bytes captured from `print` per sandbox run.
    #[builder(default = DEFAULT_MAX_OUTPUT_BYTES)]
    pub max_output_bytes: usize,
    /// Pause after each generation request.
    #[serde(rename = "generation_delay_ms", with = "duration_ms")]
    #[builder(default)]
    pub generation_delay: Duration,
    /// Consecutive empty generations tolerated before the turn fails.
    #[builder(default = 3)]
    pub max_empty_generations: u32,
    #[builder(default)]
    pub markers: SegmentMarkers,
    #[builder(default)]
    pub settings: GenerationSettings,
    /// System prompt sent with every request of the session.
    #[builder(into)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AgentConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ToolcodeError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ToolcodeError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ToolcodeError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// `~/.toolcode/config.toml`.
    pub fn default_path() -> PathBuf {
        default_toolcode_dir().join("config.toml")
    }

    /// Load the default config file when present, else defaults; then apply
    /// environment overrides.
    pub fn from_env() -> Result<Self, ToolcodeError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let path = Self::default_path();
        let base = match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `TOOLCODE_*` overrides resolved through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ToolcodeError> {
        if let Some(v) = lookup("TOOLCODE_MAX_CYCLES") {
            self.max_cycles = parse_var("TOOLCODE_MAX_CYCLES", &v)?;
        }
        if let Some(v) = lookup("TOOLCODE_SANDBOX_TIMEOUT_MS") {
            self.sandbox_timeout =
                Duration::from_millis(parse_var("TOOLCODE_SANDBOX_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("TOOLCODE_MAX_OUTPUT_BYTES") {
            self.max_output_bytes = parse_var("TOOLCODE_MAX_OUTPUT_BYTES", &v)?;
        }
        if let Some(v) = lookup("TOOLCODE_GENERATION_DELAY_MS") {
            self.generation_delay =
                Duration::from_millis(parse_var("TOOLCODE_GENERATION_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("TOOLCODE_MODEL") {
            self.settings.model = v;
        }
        if let Some(v) = lookup("TOOLCODE_TEMPERATURE") {
            self.settings.temperature = Some(parse_var("TOOLCODE_TEMPERATURE", &v)?);
        }
        if let Some(v) = lookup("TOOLCODE_MAX_TOKENS") {
            self.settings.max_tokens = Some(parse_var("TOOLCODE_MAX_TOKENS", &v)?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ToolcodeError> {
        if self.max_cycles == 0 {
            return Err(ToolcodeError::Configuration(
                "max_cycles must be greater than zero".into(),
            ));
        }
        if self.sandbox_timeout.is_zero() {
            return Err(ToolcodeError::Configuration(
                "sandbox timeout must be greater than zero".into(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(ToolcodeError::Configuration(
                "max_output_bytes must be greater than zero".into(),
            ));
        }
        self.markers.validate()
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            timeout: self.sandbox_timeout,
            max_output_bytes: self.max_output_bytes,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ToolcodeError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ToolcodeError::Configuration(format!("{name}={value:?}: {e}")))
}

fn default_toolcode_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".toolcode"))
        .unwrap_or_else(|| PathBuf::from(".toolcode"))
}

/// Serde adapter storing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Which wire protocol a transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProviderKind {
    #[strum(to_string = "openai-compatible", serialize = "openai")]
    OpenAiCompatible,
    Gemini,
}

/// Credentials and endpoint for a model transport.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TransportConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
        }
    }

    /// Load from environment variables (TOOLCODE_PROVIDER, TOOLCODE_API_KEY, ...).
    pub fn from_env() -> Result<Self, ToolcodeError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`. The provider defaults to Gemini;
    /// the key falls back to the provider's conventional variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ToolcodeError> {
        let provider = match lookup("TOOLCODE_PROVIDER") {
            Some(raw) => raw.trim().parse::<ProviderKind>().map_err(|_| {
                ToolcodeError::Configuration(format!("unknown provider '{raw}'"))
            })?,
            None => ProviderKind::Gemini,
        };
        let fallback_key = match provider {
            ProviderKind::OpenAiCompatible => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        };
        let api_key = lookup("TOOLCODE_API_KEY")
            .or_else(|| lookup(fallback_key))
            .filter(|key| !key.is_empty());
        Ok(Self {
            provider,
            api_key,
            base_url: lookup("TOOLCODE_BASE_URL"),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_react_protocol() {
        let config = AgentConfig::default();
        assert_eq!(config.max_cycles, 3);
        assert_eq!(config.sandbox_timeout, Duration::from_secs(10));
        assert_eq!(config.max_output_bytes, 65_536);
        assert_eq!(
            config.markers.call_header,
            "<reactAgentSegmentHeader>call_tool_code</reactAgentSegmentHeader>"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = AgentConfig::from_toml_str(
            r#"
max_cycles = 5
sandbox_timeout_ms = 2500

[markers]
call_header = "<call>"

[settings]
model = "gpt-4o-mini"
"#,
        )
        .unwrap();
        assert_eq!(config.max_cycles, 5);
        assert_eq!(config.sandbox_timeout, Duration::from_millis(2500));
        assert_eq!(config.markers.call_header, "<call>");
        assert_eq!(config.markers.call_open, "```tool_code\n");
        assert_eq!(config.settings.model, "gpt-4o-mini");
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_output_bytes = 128\n").unwrap();
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.max_output_bytes, 128);
        assert!(AgentConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let config = AgentConfig::default()
            .with_overrides(lookup(&[
                ("TOOLCODE_MAX_CYCLES", "7"),
                ("TOOLCODE_MODEL", "gemini-2.0-flash"),
                ("TOOLCODE_TEMPERATURE", "0.3"),
            ]))
            .unwrap();
        assert_eq!(config.max_cycles, 7);
        assert_eq!(config.settings.model, "gemini-2.0-flash");
        assert_eq!(config.settings.temperature, Some(0.3));

        let err = AgentConfig::default()
            .with_overrides(lookup(&[("TOOLCODE_MAX_CYCLES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ToolcodeError::Configuration(_)));
        assert!(AgentConfig::default()
            .with_overrides(lookup(&[("TOOLCODE_MAX_CYCLES", "many")]))
            .is_err());
    }

    #[test]
    fn empty_markers_are_invalid() {
        let mut config = AgentConfig::default();
        config.markers.call_close.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn transport_config_resolves_provider_and_key() {
        let config = TransportConfig::from_lookup(lookup(&[
            ("TOOLCODE_PROVIDER", "openai-compatible"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAiCompatible);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert!(!format!("{config:?}").contains("sk-test"));

        let config = TransportConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert!(TransportConfig::from_lookup(lookup(&[("TOOLCODE_PROVIDER", "nope")])).is_err());
    }
}
