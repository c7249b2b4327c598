use std::path::PathBuf;

use crate::inference::decode::DEFAULT_MAX_PIXELS;

const DEFAULT_MODEL_PATH: &str = "model/alzheimer_model.pt";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorsPolicy {
    AnyOrigin,
    AllowList(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub model_path: PathBuf,
    pub manifest_path: PathBuf,
    pub cors: CorsPolicy,
    pub max_upload_bytes: usize,
    pub max_image_pixels: u64,
    pub torch_threads: Option<i32>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_path = PathBuf::from(get("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()));
        let manifest_path = get("MODEL_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|| model_path.with_extension("yaml"));

        let cors = match get("CORS_ALLOWED_ORIGINS") {
            None => CorsPolicy::AnyOrigin,
            Some(origins) => parse_cors(&origins),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var("PORT", get("PORT"))?.unwrap_or(8000),
            workers: parse_var("HTTP_WORKERS", get("HTTP_WORKERS"))?,
            model_path,
            manifest_path,
            cors,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"))?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_image_pixels: parse_var("MAX_IMAGE_PIXELS", get("MAX_IMAGE_PIXELS"))?
                .unwrap_or(DEFAULT_MAX_PIXELS),
            torch_threads: parse_var("TORCH_NUM_THREADS", get("TORCH_NUM_THREADS"))?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_cors(origins: &str) -> CorsPolicy {
    let list: Vec<String> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if list.is_empty() || list.iter().any(|o| o == "*") {
        CorsPolicy::AnyOrigin
    } else {
        CorsPolicy::AllowList(list)
    }
}

fn parse_var<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
