use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GEO_COLUMN: &str = "Géolocalisation de l'établissement";
pub const DEFAULT_RESULT_CAP: usize = 5000;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    #[serde(default = "default_geo_column")]
    pub geo_column: String, // combined "lat,lon" column
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Which backend answers every query for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Sample,
    Indexed { url: String },
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_cap: default_result_cap(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_geo_column() -> String {
    DEFAULT_GEO_COLUMN.to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_result_cap() -> usize {
    DEFAULT_RESULT_CAP
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;

        // DATABASE_URL overrides the file.
        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database.url = Some(url);
            }
        }
        Ok(config)
    }

    pub fn backend(&self) -> BackendChoice {
        match self.database.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => BackendChoice::Indexed {
                url: url.to_string(),
            },
            _ => BackendChoice::Sample,
        }
    }

    /// CSV delimiter as the byte the `csv` crate expects. Non-ASCII falls back to `,`.
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.input.delimiter).unwrap_or(b',')
    }
}
