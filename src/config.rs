//! Configuration System
//!
//! Layered configuration: built-in defaults, the global user file, workspace files
//! and finally `REELSMITH__SECTION__KEY` environment variables. Validation reports
//! every problem at once.

use crate::error::PipelineError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

pub const ENV_PREFIX: &str = "REELSMITH";
pub const ENV_PROFILE: &str = "REELSMITH_ENV";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReelConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage paths, relative paths resolve against the workspace root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,

    #[serde(default = "default_sessions_path")]
    pub sessions_path: PathBuf,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from(".reelsmith/artifacts")
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from(".reelsmith/sessions")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_artifact_root(),
            sessions_path: default_sessions_path(),
        }
    }
}

impl StorageConfig {
    pub fn artifact_root(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.root)
    }

    pub fn sessions_dir(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.sessions_path)
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// Generation service endpoint and models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Inline key; prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_image_endpoint")]
    pub image_endpoint: String,

    #[serde(default = "default_image_edit_endpoint")]
    pub image_edit_endpoint: String,

    #[serde(default = "default_video_model")]
    pub video_model: String,

    #[serde(default = "default_video_endpoint")]
    pub video_endpoint: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_text_model() -> String {
    "gpt-4o".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_endpoint() -> String {
    "images/generations".to_string()
}

fn default_image_edit_endpoint() -> String {
    "images/edits".to_string()
}

fn default_video_model() -> String {
    "veo-3.0-fast-generate-001".to_string()
}

fn default_video_endpoint() -> String {
    "videos/generations".to_string()
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            image_endpoint: default_image_endpoint(),
            image_edit_endpoint: default_image_edit_endpoint(),
            video_model: default_video_model(),
            video_endpoint: default_video_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("base_url must be an http(s) URL, got '{}'", self.base_url));
        }
        for (name, value) in [
            ("text_model", &self.text_model),
            ("image_model", &self.image_model),
            ("video_model", &self.video_model),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", name));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// The inline key, else the one named by `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<String, PipelineError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env).map_err(|_| {
            PipelineError::ProviderNotConfigured(format!(
                "no api_key configured and {} is not set",
                self.api_key_env
            ))
        })
    }
}

/// Orchestration knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Independent units (scenes, shots, characters) run at most this wide.
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Record an automatic approval instead of suspending after the story.
    #[serde(default)]
    pub auto_approve: bool,
}

fn default_max_concurrent_units() -> usize {
    1
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_units: default_max_concurrent_units(),
            auto_approve: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Provider(String),
    Pipeline(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ReelConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.root.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("root cannot be empty".to_string()));
        }
        if self.storage.sessions_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "sessions_path cannot be empty".to_string(),
            ));
        }
        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if self.pipeline.max_concurrent_units == 0 {
            errors.push(ValidationError::Pipeline(
                "max_concurrent_units must be at least 1".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one error.
    pub fn validated(self) -> Result<Self, PipelineError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Layered configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults only.
    pub fn default() -> ReelConfig {
        ReelConfig::default()
    }

    /// Load every layer for `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<ReelConfig, PipelineError> {
        let profile = std::env::var(ENV_PROFILE).unwrap_or_else(|_| "development".to_string());
        Self::load_layers(workspace_root, global_config_path().as_deref(), &profile)
    }

    /// Load with an explicit global file and profile name.
    pub fn load_layers(
        workspace_root: &Path,
        global_file: Option<&Path>,
        profile: &str,
    ) -> Result<ReelConfig, PipelineError> {
        let mut builder = merge::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder, global_file)?;
        builder = sources::workspace_file::add_to_builder(builder, workspace_root, profile)?;
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let config: ReelConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<ReelConfig, PipelineError> {
        let config: ReelConfig = merge::builder_with_defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
