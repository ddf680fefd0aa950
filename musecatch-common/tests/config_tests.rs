//! Configuration resolution tests
//!
//! Covers the priority order (CLI > environment > config file > defaults)
//! and graceful degradation when the config file is missing or malformed.
//!
//! Note: Uses serial_test to prevent races on MUSECATCH_API_URL.

use musecatch_common::config::{
    load_toml_config, ClientConfig, ConfigResolver, API_URL_ENV, DEFAULT_API_BASE_URL,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    env::remove_var(API_URL_ENV);

    let config = ConfigResolver::new()
        .with_config_file(Some(PathBuf::from("/nonexistent/musecatch/config.toml")))
        .resolve();

    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.poll_interval, Duration::from_millis(1000));
}

#[test]
#[serial]
fn test_config_file_values_applied() {
    env::remove_var(API_URL_ENV);
    let file = write_config(
        r#"
api_base_url = "http://nas.local:8889/api/v1/"
poll_interval_ms = 500
queue_limit = 20
"#,
    );

    let config = ConfigResolver::new()
        .with_config_file(Some(file.path().to_path_buf()))
        .resolve();

    assert_eq!(config.api_base_url, "http://nas.local:8889/api/v1");
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.queue_limit, 20);
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    let file = write_config(r#"api_base_url = "http://from-file/api/v1""#);
    env::set_var(API_URL_ENV, "http://from-env/api/v1");

    let config = ConfigResolver::new()
        .with_config_file(Some(file.path().to_path_buf()))
        .resolve();

    assert_eq!(config.api_base_url, "http://from-env/api/v1");
    env::remove_var(API_URL_ENV);
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    env::set_var(API_URL_ENV, "http://from-env/api/v1");

    let config = ConfigResolver::new()
        .with_cli_api_url(Some("http://from-cli/api/v1".to_string()))
        .with_config_file(Some(PathBuf::from("/nonexistent/config.toml")))
        .resolve();

    assert_eq!(config.api_base_url, "http://from-cli/api/v1");
    env::remove_var(API_URL_ENV);
}

#[test]
#[serial]
fn test_malformed_config_file_falls_back_to_defaults() {
    env::remove_var(API_URL_ENV);
    let file = write_config("api_base_url = [not toml");

    assert!(load_toml_config(file.path()).is_err());

    let config = ConfigResolver::new()
        .with_config_file(Some(file.path().to_path_buf()))
        .resolve();
    assert_eq!(config, ClientConfig::default());
}

#[test]
#[serial]
fn test_blank_env_var_ignored() {
    env::set_var(API_URL_ENV, "   ");

    let config = ConfigResolver::new()
        .with_config_file(Some(PathBuf::from("/nonexistent/config.toml")))
        .resolve();

    assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    env::remove_var(API_URL_ENV);
}
