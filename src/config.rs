//! Configuration management
//!
//! Supports `~/.config/valet/config.toml` as a persistent config source.
//! All fields in the file are optional — it is a partial overlay on top of
//! defaults. API keys come from the environment (`GEMINI_API_KEY`,
//! `ELEVENLABS_API_KEY`) or the `[api_keys]` section, environment winning.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::{Error, Result};

/// Default chat model identifier
const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash-lite";

/// Default sampling temperature
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default synthesis voice id
const DEFAULT_VOICE_ID: &str = "SnAS1AhU43gJHbuUJIdM";

/// Default synthesis model
const DEFAULT_TTS_MODEL: &str = "eleven_turbo_v2";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the interface displays for assistant replies
    pub assistant_name: String,

    /// Persona system prompt; `None` falls back to the built-in persona
    pub persona: Option<String>,

    /// Chat completion configuration
    pub chat: ChatConfig,

    /// Voice output configuration
    pub voice: VoiceConfig,

    /// API credentials
    pub api_keys: ApiKeys,
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model identifier (e.g. "gemini-2.5-flash-lite")
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,
}

/// Voice output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable spoken replies
    pub enabled: bool,

    /// Synthesis voice identifier
    pub voice_id: String,

    /// Synthesis model identifier
    pub model: String,

    /// Voice stability setting (0.0..=1.0)
    pub stability: f32,

    /// Voice similarity boost setting (0.0..=1.0)
    pub similarity_boost: f32,
}

/// API credentials for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// Gemini API key (chat completion)
    pub gemini: Option<SecretString>,

    /// ElevenLabs API key (speech synthesis)
    pub elevenlabs: Option<SecretString>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("gemini", &self.gemini.as_ref().map(|_| "[redacted]"))
            .field("elevenlabs", &self.elevenlabs.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    /// Display name for the assistant
    #[serde(default)]
    assistant_name: Option<String>,

    /// Persona system prompt override
    #[serde(default)]
    persona: Option<String>,

    /// Chat configuration
    #[serde(default)]
    chat: ChatFileConfig,

    /// Voice configuration
    #[serde(default)]
    voice: VoiceFileConfig,

    /// API keys (environment variables take precedence)
    #[serde(default)]
    api_keys: ApiKeysFileConfig,
}

/// Chat-related file configuration
#[derive(Debug, Default, Deserialize)]
struct ChatFileConfig {
    model: Option<String>,
    temperature: Option<f32>,
}

/// Voice-related file configuration
#[derive(Debug, Default, Deserialize)]
struct VoiceFileConfig {
    enabled: Option<bool>,
    voice_id: Option<String>,
    model: Option<String>,
    stability: Option<f32>,
    similarity_boost: Option<f32>,
}

/// API keys file configuration
#[derive(Debug, Default, Deserialize)]
struct ApiKeysFileConfig {
    gemini: Option<String>,
    elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from the config file (if present) and environment.
    ///
    /// `disable_voice` forces voice output off regardless of file contents
    /// (for headless hosts without audio hardware).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if a required API key is missing.
    pub fn load(disable_voice: bool) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)?;
                tracing::debug!(path = %path.display(), "loaded config file");
                toml::from_str::<ConfigFile>(&raw)?
            }
            _ => ConfigFile::default(),
        };

        let config = Self::from_file(file, disable_voice)?;
        config.validate()?;
        Ok(config)
    }

    /// Assemble a config from a parsed file overlay plus environment keys.
    fn from_file(file: ConfigFile, disable_voice: bool) -> Result<Self> {
        let gemini = env_or_file_key("GEMINI_API_KEY", file.api_keys.gemini);
        let elevenlabs = env_or_file_key("ELEVENLABS_API_KEY", file.api_keys.elevenlabs);

        Ok(Self {
            assistant_name: file.assistant_name.unwrap_or_else(|| "Jarvis".to_string()),
            persona: file.persona,
            chat: ChatConfig {
                model: file
                    .chat
                    .model
                    .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                temperature: file.chat.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
            voice: VoiceConfig {
                enabled: !disable_voice && file.voice.enabled.unwrap_or(true),
                voice_id: file
                    .voice
                    .voice_id
                    .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
                model: file
                    .voice
                    .model
                    .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
                stability: file.voice.stability.unwrap_or(0.5),
                similarity_boost: file.voice.similarity_boost.unwrap_or(0.8),
            },
            api_keys: ApiKeys { gemini, elevenlabs },
        })
    }

    /// Check that the keys required by the enabled features are present.
    fn validate(&self) -> Result<()> {
        if self.api_keys.gemini.is_none() {
            return Err(Error::Config(
                "GEMINI_API_KEY not set (environment or [api_keys] in config.toml)".to_string(),
            ));
        }
        if self.voice.enabled && self.api_keys.elevenlabs.is_none() {
            return Err(Error::Config(
                "ELEVENLABS_API_KEY not set but voice output is enabled; \
                 set the key or pass --disable-voice"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Environment variable first, file value second.
fn env_or_file_key(var: &str, file_value: Option<String>) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .or(file_value)
        .map(SecretString::from)
}

/// Platform config file location (`~/.config/valet/config.toml` on Linux)
fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "valet")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
