use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "teamhub.toml",
    "config/teamhub.toml",
    "crates/config/teamhub.toml",
    "../teamhub.toml",
    "../config/teamhub.toml",
];

const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".jpg", ".jpeg", ".png",
    ".gif", ".webp", ".mp3", ".mp4", ".zip", ".rar",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://teamhub.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Where message attachments are written and which files are accepted.
///
/// ```
/// use teamhub_config::UploadConfig;
///
/// let uploads = UploadConfig::default();
/// assert_eq!(uploads.max_file_size_bytes, 25 * 1024 * 1024);
/// assert!(uploads.is_extension_allowed("Report.PDF"));
/// assert!(!uploads.is_extension_allowed("payload.exe"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
    #[serde(default = "UploadConfig::default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "UploadConfig::default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    const fn default_max_file_size() -> u64 {
        25 * 1024 * 1024
    }

    fn default_allowed_extensions() -> Vec<String> {
        DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    }

    /// Case-insensitive check of the file's extension against the allowlist.
    pub fn is_extension_allowed(&self, filename: &str) -> bool {
        let Some(ext) = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
        else {
            return false;
        };
        let dotted = format!(".{}", ext.to_ascii_lowercase());
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.to_ascii_lowercase() == dotted)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_file_size_bytes: Self::default_max_file_size(),
            allowed_extensions: Self::default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound frames buffered per socket before new events are dropped.
    #[serde(default = "RealtimeConfig::default_connection_buffer")]
    pub connection_buffer: usize,
}

impl RealtimeConfig {
    const fn default_connection_buffer() -> usize {
        100
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connection_buffer: Self::default_connection_buffer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use teamhub_config::load;
///
/// std::env::remove_var("TEAMHUB_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("uploads.dir", defaults.uploads.dir.clone())?
        .set_default(
            "uploads.max_file_size_bytes",
            i64::try_from(defaults.uploads.max_file_size_bytes).unwrap_or(i64::MAX),
        )?
        .set_default(
            "uploads.allowed_extensions",
            defaults.uploads.allowed_extensions.clone(),
        )?
        .set_default(
            "realtime.connection_buffer",
            i64::try_from(defaults.realtime.connection_buffer).unwrap_or(i64::MAX),
        )?;

    let environment_overrides = config::Environment::with_prefix("TEAMHUB")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("uploads.allowed_extensions");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("TEAMHUB_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via TEAMHUB_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.realtime.connection_buffer == 0 {
        config.realtime.connection_buffer = 1;
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
