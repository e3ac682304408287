use cork_api::config::ApiConfig;
use cork_api::{Error, ErrorKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_reads_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("api.toml");
    fs::write(
        &config_path,
        r#"
            base_url = "https://api.test/v1"
            timeout_ms = 2500

            [headers]
            X-Client = "cork"
        "#,
    )
    .unwrap();

    let config = ApiConfig::load(&config_path).unwrap();
    assert_eq!(config.base_url, "https://api.test/v1");
    assert_eq!(config.timeout_ms, Some(2500));
    assert_eq!(config.headers.get("X-Client").map(String::as_str), Some("cork"));
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = ApiConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, ApiConfig::default());
}

#[test]
fn test_malformed_file_is_a_toml_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("api.toml");
    fs::write(&config_path, "base_url = [unterminated").unwrap();

    let err = ApiConfig::load(&config_path).unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
    assert_eq!(err.to_json().error_type, "TOMLParsing");
}

#[test]
fn test_wrong_value_type_is_rejected() {
    let err = ApiConfig::from_toml_str("timeout_ms = \"fast\"").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}

#[test]
fn test_invalid_values_are_config_errors() {
    let err = ApiConfig::from_toml_str("timeout_ms = 0").unwrap_err();
    assert!(err.is_kind(ErrorKind::Config));
    assert!(err.to_string().starts_with("Config: Invalid configuration:"));
}
