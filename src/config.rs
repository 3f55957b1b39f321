//! Layered configuration loaded with figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`ROLLCALL_*`, `__` separates sections)
//! 2. TOML file at `$ROLLCALL_CONFIG`, or `rollcall.toml` in the working dir
//! 3. Built-in defaults
//!
//! `ROLLCALL_STORAGE__DATABASE_URL` maps to `storage.database_url`, and so on.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const ENV_PREFIX: &str = "ROLLCALL_";
const CONFIG_PATH_ENV: &str = "ROLLCALL_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "rollcall.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// Admin password checked by `POST /auth/login`.
    pub admin_password: String,
    /// Upper bound for JSON request bodies (images travel inline as data URIs).
    pub max_body_bytes: usize,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            loglevel: "info".to_string(),
            admin_password: "admin123".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    /// One reference image per student, named `<student_id>.jpg`.
    pub faces_dir: PathBuf,
    /// Transient probe images; the OS temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:attendance.db".to_string(),
            faces_dir: PathBuf::from("student_faces"),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Base URL of the DeepFace-compatible REST service.
    pub service_url: Url,
    pub model_name: String,
    pub detector_backend: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            service_url: Url::parse("http://127.0.0.1:5005/").expect("static URL is valid"),
            model_name: "VGG-Face".to_string(),
            detector_backend: "opencv".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl RecognitionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Load configuration from defaults, the optional TOML file and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Build the provider chain. Public so tests can layer extra providers.
    pub fn figment() -> Figment {
        let file = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
