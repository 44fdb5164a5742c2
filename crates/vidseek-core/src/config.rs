//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting, e.g. `APP_SEARCH__TOP_K=30`). Every key has a
//! default, so an empty figment yields a usable [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::DuplicatePolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => figment = figment.merge(Toml::file(format!("config.{other}.toml"))),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed settings with defaults filled in, validated.
    pub fn settings(&self) -> Result<Settings, Error> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub vector: VectorSettings,
    pub embedding: EmbeddingSettings,
    pub ingest: IngestSettings,
    pub search: SearchSettings,
    pub transcribe: TranscribeSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Root scanned for videos, also served under the playback base.
    pub video_dir: String,
    pub catalog_url: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { video_dir: "data".into(), catalog_url: "sqlite://vidseek.db".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Flat,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: VectorBackend,
    pub snapshot_path: String,
    pub lance_dir: String,
    pub table: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Flat,
            snapshot_path: "indexes/segments.json".into(),
            lance_dir: "indexes/lancedb".into(),
            table: "video_subtitles".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub fake: bool,
    pub fake_dim: usize,
    pub max_len: usize,
}

impl EmbeddingSettings {
    /// `fake`, or `APP_USE_FAKE_EMBEDDINGS` set to `1`/`true`.
    pub fn use_fake(&self) -> bool {
        self.fake || fake_embeddings_from_env()
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_dir: "models/paraphrase-multilingual-MiniLM-L12-v2".into(),
            fake: false,
            fake_dim: 384,
            max_len: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub duplicates: DuplicatePolicy,
    pub video_extensions: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            duplicates: DuplicatePolicy::Allow,
            video_extensions: crate::data_processor::DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// K for the HTTP service.
    pub top_k: usize,
    /// K for the CLI `search` command.
    pub cli_top_k: usize,
    pub playback_base: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 20, cli_top_k: 5, playback_base: "/static/videos".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscribeMode {
    #[default]
    Sidecar,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeSettings {
    pub mode: TranscribeMode,
    /// Program run in `command` mode; the video path is appended to `args`.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for TranscribeSettings {
    fn default() -> Self {
        Self { mode: TranscribeMode::Sidecar, command: None, args: Vec::new(), timeout_secs: 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 8000 }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.ingest.batch_size == 0 {
            return Err(Error::InvalidConfig("ingest.batch_size must be at least 1".into()));
        }
        if self.search.top_k == 0 || self.search.cli_top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k and search.cli_top_k must be at least 1".into()));
        }
        if self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be at least 1".into()));
        }
        if self.transcribe.mode == TranscribeMode::Command && self.transcribe.command.as_deref().map_or(true, str::is_empty) {
            return Err(Error::InvalidConfig("transcribe.command is required in command mode".into()));
        }
        if self.transcribe.timeout_secs == 0 {
            return Err(Error::InvalidConfig("transcribe.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn fake_embeddings(&self) -> bool {
        self.embedding.use_fake()
    }

    pub fn video_dir(&self) -> PathBuf {
        expand_path(&self.data.video_dir)
    }
}

fn fake_embeddings_from_env() -> bool {
    env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

/// Absolute form of a configured path, relative paths taken from the current
/// working directory.
pub fn resolve_path<S: AsRef<str>>(p: S) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_with_base(&cwd, p)
}
