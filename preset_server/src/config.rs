use brain_core::adapter::PresetAdapter;
use brain_core::catalog::{CatalogError, DeviceCatalog};
use brain_core::extract::ResponseFormat;
use brain_core::gemini::{
    clamp_timeout_secs, load_api_key, ApiKeyError, GeminiClient, GeminiConfig, GenerationError,
    DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MODEL,
};
use brain_core::handler::PresetService;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    ApiKey(#[from] ApiKeyError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Generator(#[from] GenerationError),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "preset_server")]
pub struct ServerArgs {
    #[arg(long, env = "PRESET_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// raw-json: the reply body is the JSON object. fenced-json: pull it out of a ```json block.
    #[arg(long, env = "PRESET_RESPONSE_FORMAT", default_value_t = ResponseFormat::RawJson)]
    pub response_format: ResponseFormat,

    #[arg(long, env = "GEMINI_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,

    /// Extra descriptor documents to load next to the built-in ones.
    #[arg(long, env = "PEDAL_DIR", value_name = "DIR")]
    pub pedal_dir: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub api_key_file: Option<PathBuf>,
}

impl ServerArgs {
    pub fn api_key(&self) -> Result<String, ConfigError> {
        Ok(load_api_key(self.api_key_file.as_deref())?)
    }

    pub fn catalog(&self) -> Result<DeviceCatalog, ConfigError> {
        let mut catalog = DeviceCatalog::builtin()?;
        if let Some(dir) = self.pedal_dir.as_deref() {
            catalog.extend(DeviceCatalog::load_dir(dir)?)?;
        }
        Ok(catalog)
    }

    pub fn gemini_config(&self, api_key: String) -> GeminiConfig {
        GeminiConfig {
            model: self.gemini_model.trim().to_string(),
            base_url: self.gemini_base_url.trim().to_string(),
            timeout: clamp_timeout_secs(self.http_timeout_secs),
            json_mode: self.response_format == ResponseFormat::RawJson,
            ..GeminiConfig::new(api_key)
        }
    }

    pub fn build_service(&self) -> Result<PresetService, ConfigError> {
        let catalog = self.catalog()?;
        let client = GeminiClient::new(self.gemini_config(self.api_key()?))?;
        let adapter = PresetAdapter::new(Arc::new(client), self.response_format);
        Ok(PresetService::new(Arc::new(catalog), adapter))
    }
}
