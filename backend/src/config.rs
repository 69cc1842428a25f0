use std::env;
use std::path::PathBuf;

const DEFAULT_SECRET_KEY: &str = "I have a dream";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Failed to resolve working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ModelDirs {
    pub damage: PathBuf,
    pub side: PathBuf,
    pub level: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub upload_dir: PathBuf,
    pub model_dirs: ModelDirs,
    pub max_upload_bytes: usize,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Reads the configuration from the process environment. Call
    /// `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let upload_dir = match env::var("UPLOAD_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => env::current_dir()?.join("uploads"),
        };

        Ok(Self {
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| DEFAULT_SECRET_KEY.to_string()),
            upload_dir,
            model_dirs: ModelDirs {
                damage: path_var("DAMAGE_MODEL_DIR", "./damage-model"),
                side: path_var("DAMAGE_SIDE_MODEL_DIR", "./damage-side-model"),
                level: path_var("DAMAGE_LEVEL_MODEL_DIR", "./damage-level-model"),
            },
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 5000)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
