//! Test plan for the `teamhub-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and upload policy parsing.

use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use teamhub_config::{load, AppConfig, HttpConfig, RealtimeConfig, UploadConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "TEAMHUB_CONFIG",
    "TEAMHUB__DATABASE__MAX_CONNECTIONS",
    "TEAMHUB__DATABASE__URL",
    "TEAMHUB__HTTP__ADDRESS",
    "TEAMHUB__HTTP__PORT",
    "TEAMHUB__UPLOADS__DIR",
    "TEAMHUB__UPLOADS__MAX_FILE_SIZE_BYTES",
    "TEAMHUB__UPLOADS__ALLOWED_EXTENSIONS",
    "TEAMHUB__REALTIME__CONNECTION_BUFFER",
];

/// Temporary working directory with a scrubbed `TEAMHUB` environment.
///
/// Everything touched is restored on drop.
struct Sandbox {
    dir: TempDir,
    saved_env: Vec<(String, Option<String>)>,
    previous_cwd: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let previous_cwd = std::env::current_dir().expect("failed to capture current directory");
        std::env::set_current_dir(dir.path()).expect("failed to enter temp dir");

        let mut sandbox = Self {
            dir,
            saved_env: Vec::new(),
            previous_cwd,
        };
        for key in ENV_VARS_TO_RESET {
            sandbox.env(key, None);
        }
        sandbox
    }

    fn env(&mut self, key: &str, value: Option<&str>) {
        self.saved_env.push((key.to_string(), std::env::var(key).ok()));
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create config directories");
        }
        fs::write(&path, contents).expect("failed to write config file");
        path
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.previous_cwd);
        for (key, value) in self.saved_env.drain(..).rev() {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let _sandbox = Sandbox::new();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(config.uploads.dir, defaults.uploads.dir);
    assert_eq!(
        config.uploads.max_file_size_bytes,
        defaults.uploads.max_file_size_bytes
    );
    assert_eq!(
        config.uploads.allowed_extensions,
        defaults.uploads.allowed_extensions
    );
    assert_eq!(
        config.realtime.connection_buffer,
        defaults.realtime.connection_buffer
    );
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let sandbox = Sandbox::new();

    sandbox.write(
        "teamhub.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    sandbox.write(
        "config/teamhub.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let sandbox = Sandbox::new();

    sandbox.write(
        "teamhub.toml",
        r#"
        [uploads]
        dir = "/var/lib/teamhub/uploads"

        [database]
        max_connections = 50
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.uploads.dir, "/var/lib/teamhub/uploads");
    assert_eq!(
        config.uploads.max_file_size_bytes,
        defaults.uploads.max_file_size_bytes
    );
    assert_eq!(config.database.max_connections, 50);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.http.port, defaults.http.port);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let mut sandbox = Sandbox::new();

    let custom = sandbox.write(
        "elsewhere/custom.toml",
        r#"
        [realtime]
        connection_buffer = 16
        "#,
    );
    let custom = custom.display().to_string();
    sandbox.env("TEAMHUB_CONFIG", Some(&custom));

    let config = load().expect("configuration load should read TEAMHUB_CONFIG");
    assert_eq!(config.realtime.connection_buffer, 16);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let mut sandbox = Sandbox::new();

    sandbox.write(
        "teamhub.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    sandbox.env("TEAMHUB__HTTP__PORT", Some("8080"));
    sandbox.env("TEAMHUB__DATABASE__URL", Some("sqlite://data/override.db"));

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.database.url, "sqlite://data/override.db");
}

#[test]
#[serial]
fn load_parses_extension_list_from_environment() {
    let mut sandbox = Sandbox::new();

    sandbox.env("TEAMHUB__UPLOADS__ALLOWED_EXTENSIONS", Some(".pdf,.png"));

    let config = load().expect("configuration load should parse extension list");
    assert_eq!(
        config.uploads.allowed_extensions,
        vec![".pdf".to_string(), ".png".to_string()]
    );
    assert!(!config.uploads.is_extension_allowed("notes.txt"));
}

#[test]
#[serial]
fn load_raises_zero_connection_buffer_to_one() {
    let mut sandbox = Sandbox::new();

    sandbox.env("TEAMHUB__REALTIME__CONNECTION_BUFFER", Some("0"));

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.realtime.connection_buffer, 1);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let sandbox = Sandbox::new();

    sandbox.write(
        "teamhub.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn upload_extension_check_ignores_case_and_requires_extension() {
    let uploads = UploadConfig::default();
    assert!(uploads.is_extension_allowed("photo.JPeG"));
    assert!(uploads.is_extension_allowed("archive.tar.zip"));
    assert!(!uploads.is_extension_allowed("README"));
    assert!(!uploads.is_extension_allowed("script.sh"));
}

#[test]
fn http_and_realtime_defaults_match_expected_values() {
    let http = HttpConfig::default();
    assert_eq!(http.address, "127.0.0.1");
    assert_eq!(http.port, 5000);
    assert_eq!(RealtimeConfig::default().connection_buffer, 100);
}
