use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_http_host() -> String {
    "127.0.0.1".into()
}
fn default_http_port() -> u16 {
    8390
}
fn default_gateway_url() -> String {
    "http://127.0.0.1:3010".into()
}
fn default_downloads_dir() -> String {
    "./downloads".into()
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}
fn default_pdf_processor_command() -> String {
    "process_pdf.py {file}".into()
}
fn default_subprocess_timeout_secs() -> u64 {
    120
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default)]
    pub gateway_token: Option<String>,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_pdf_processor_command")]
    pub pdf_processor_command: String,
    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            gateway_url: default_gateway_url(),
            gateway_token: None,
            downloads_dir: default_downloads_dir(),
            ffmpeg_path: default_ffmpeg_path(),
            pdf_processor_command: default_pdf_processor_command(),
            subprocess_timeout_secs: default_subprocess_timeout_secs(),
        }
    }
}

impl Config {
    pub fn downloads_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.downloads_dir)
    }

    pub fn resolve_config_path(override_path: Option<&str>) -> Result<Option<PathBuf>, BridgeError> {
        if let Some(custom) = override_path {
            if std::path::Path::new(custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(BridgeError::Config(format!(
                "--config points to non-existent file: {custom}"
            )));
        }

        if let Ok(custom) = std::env::var("MSGBRIDGE_CONFIG") {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(BridgeError::Config(format!(
                "MSGBRIDGE_CONFIG points to non-existent file: {custom}"
            )));
        }

        if std::path::Path::new("./msgbridge.config.yaml").exists() {
            return Ok(Some(PathBuf::from("./msgbridge.config.yaml")));
        }
        if std::path::Path::new("./msgbridge.config.yml").exists() {
            return Ok(Some(PathBuf::from("./msgbridge.config.yml")));
        }
        Ok(None)
    }

    /// Load config from YAML file. A missing file yields the defaults.
    pub fn load(override_path: Option<&str>) -> Result<Self, BridgeError> {
        let yaml_path = Self::resolve_config_path(override_path)?;

        let Some(path) = yaml_path else {
            let mut config = Config::default();
            config.post_deserialize()?;
            return Ok(config);
        };

        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| BridgeError::Config(format!("Failed to read {path_str}: {e}")))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse {path_str}: {e}")))?;
        config.post_deserialize()?;
        Ok(config)
    }

    /// Apply post-deserialization normalization and validation.
    pub(crate) fn post_deserialize(&mut self) -> Result<(), BridgeError> {
        if self.http_host.trim().is_empty() {
            self.http_host = default_http_host();
        }
        if self.http_port == 0 {
            self.http_port = default_http_port();
        }
        self.gateway_url = self.gateway_url.trim().trim_end_matches('/').to_string();
        if self.gateway_url.is_empty() {
            return Err(BridgeError::Config("gateway_url must be non-empty".into()));
        }
        if let Some(token) = &self.gateway_token {
            if token.trim().is_empty() {
                self.gateway_token = None;
            }
        }
        if self.downloads_dir.trim().is_empty() {
            self.downloads_dir = default_downloads_dir();
        }
        if self.ffmpeg_path.trim().is_empty() {
            self.ffmpeg_path = default_ffmpeg_path();
        }
        if self.pdf_processor_command.trim().is_empty() {
            self.pdf_processor_command = default_pdf_processor_command();
        }
        if self.subprocess_timeout_secs == 0 {
            self.subprocess_timeout_secs = default_subprocess_timeout_secs();
        }
        Ok(())
    }
}
