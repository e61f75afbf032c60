use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process-wide settings, built once in `main` and handed to each service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub report: ReportConfig,
    pub annotation: AnnotationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub storage_dir: PathBuf,
    pub frontend_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionFailurePolicy {
    #[default]
    Fail,
    Degrade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: String,
    pub confidence: u8,
    pub overlap: u8,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub on_failure: DetectionFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub api_base: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub box_thickness: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_base_url: "http://localhost:8000".to_string(),
            storage_dir: PathBuf::from("images"),
            frontend_dir: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://detect.roboflow.com/adr/6".to_string(),
            api_key: String::new(),
            confidence: 30,
            overlap: 50,
            timeout_secs: 30,
            max_attempts: 1,
            retry_backoff_ms: 500,
            on_failure: DetectionFailurePolicy::Fail,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 18.0,
            box_thickness: 2,
        }
    }
}

impl AppConfig {
    /// Reads the YAML settings file (if any), then applies environment overrides and secrets.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = env::var("PIPELINE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").ok()?;
        let path = PathBuf::from(format!("{}/../config/pipeline.yaml", manifest_dir));
        path.exists().then_some(path)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port,
            })?;
        }
        if let Ok(base_url) = env::var("PUBLIC_BASE_URL") {
            self.server.public_base_url = base_url;
        }
        if let Ok(dir) = env::var("STORAGE_DIR") {
            self.server.storage_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("FRONTEND_DIR") {
            self.server.frontend_dir = Some(PathBuf::from(dir));
        }
        if let Ok(font) = env::var("LABEL_FONT_PATH") {
            self.annotation.font_path = Some(PathBuf::from(font));
        }

        self.detection.api_key =
            env::var("ROBOFLOW_API_KEY").map_err(|_| ConfigError::MissingEnv("ROBOFLOW_API_KEY"))?;
        self.report.api_key = env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty());
        Ok(())
    }
}
