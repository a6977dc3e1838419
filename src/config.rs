use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which HTTP surface the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Schema-validated route with CORS middleware.
    Web,
    /// Function-style route answering CORS itself.
    Function,
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Variant::Web),
            "function" => Ok(Variant::Function),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub variant: Variant,
    pub workers: Option<usize>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?,
            None => 8080,
        };
        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("model.onnx"));
        let variant = match lookup("PREDICT_VARIANT") {
            Some(raw) => raw.parse()?,
            None => Variant::Web,
        };
        let workers = match lookup("WORKERS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "WORKERS",
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            host,
            port,
            model_path,
            variant,
            workers,
        })
    }
}
