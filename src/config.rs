use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::document::ChunkConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable not set.")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Reads a key, falling back to `default` when unset and failing when the
/// value does not parse.
fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let api_url = lookup("GEMINI_API_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let model = lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());

        let embedding_model = lookup("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|| "text-embedding-004".to_string());

        let temperature = parse_or(&lookup, "GEMINI_TEMPERATURE", 0.7)?;

        Ok(Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            temperature,
        })
    }
}

/// How many chunks each retrieval path asks for, and how hard uploads hit
/// the embedding endpoint.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub qa_top_k: usize,
    pub search_top_k: usize,
    pub agent_top_k: usize,
    pub embedding_concurrency: usize,
    pub chunking: ChunkConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qa_top_k: 5,
            search_top_k: 10,
            agent_top_k: 5,
            embedding_concurrency: 4,
            chunking: ChunkConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub storage_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub embedding_cache: usize,
    /// Stand-in for authentication until real tokens exist.
    pub user_id: Option<String>,
    pub retrieval: RetrievalConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "DOCUMATE_PORT", 8000)?;

        let database_path = lookup("DOCUMATE_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/documate.db"));

        let storage_dir = lookup("DOCUMATE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/storage"));

        let cors_origins = lookup("DOCUMATE_CORS_ORIGINS")
            .map(|o| {
                o.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ]
            });

        let max_upload_mb: usize = parse_or(&lookup, "DOCUMATE_MAX_UPLOAD_MB", 25)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::Invalid {
                key: "DOCUMATE_MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
            })?;
        let embedding_cache = parse_or(&lookup, "DOCUMATE_EMBEDDING_CACHE", 256)?;

        let user_id = lookup("DUMMY_USER_ID").filter(|id| !id.trim().is_empty());

        let defaults = ChunkConfig::default();
        let chunk_tokens = parse_or(&lookup, "DOCUMATE_CHUNK_TOKENS", defaults.max_tokens)?;
        let chunk_overlap = parse_or(&lookup, "DOCUMATE_CHUNK_OVERLAP", defaults.overlap_tokens)?;
        let chunking =
            ChunkConfig::new(chunk_tokens, chunk_overlap).map_err(|_| ConfigError::Invalid {
                key: "DOCUMATE_CHUNK_OVERLAP",
                value: format!("{chunk_overlap} (chunk size {chunk_tokens})"),
            })?;

        Ok(Self {
            port,
            database_path,
            storage_dir,
            cors_origins,
            max_upload_bytes,
            embedding_cache,
            user_id,
            retrieval: RetrievalConfig {
                chunking,
                ..RetrievalConfig::default()
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
}

impl ClientConfig {
    /// Resolves the backend location: explicit flag, then `DOCUMATE_API_URL`,
    /// then the local default.
    pub fn resolve(flag: Option<&str>) -> Result<Self, ConfigError> {
        let raw = flag
            .map(str::to_string)
            .or_else(|| env::var("DOCUMATE_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
            key: "DOCUMATE_API_URL",
            value: raw.to_string(),
        })?;
        Ok(Self { base_url })
    }
}
