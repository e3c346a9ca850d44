use std::io::Write;

use navigator::config::{ConfigError, NavigatorConfig, RoutingConfig};
use navigator::location::Accuracy;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    let file = write_config(
        r#"{
            "routing": {"profile": "cycling"},
            "location": {"accuracy": "balanced", "min_distance_m": 10.0},
            "map": {"max_zoom": 18}
        }"#,
    );

    let config = NavigatorConfig::from_file(file.path()).unwrap();

    assert_eq!(config.routing.profile, "cycling");
    assert_eq!(config.routing.base_url, RoutingConfig::default().base_url);
    assert_eq!(config.location.accuracy, Accuracy::Balanced);
    assert_eq!(config.location.min_distance_m, 10.0);
    assert_eq!(config.location.time_interval_ms, 1000);
    assert_eq!(config.map.max_zoom, 18);
    assert_eq!(config.map.tile_size, 256);
}

#[test]
fn saved_config_loads_back_unchanged() {
    let mut config = NavigatorConfig::default();
    config.routing.profile = "foot".into();
    config.geocoding.timeout_secs = 3;
    let file = write_config(&serde_json::to_string_pretty(&config).unwrap());

    assert_eq!(NavigatorConfig::from_file(file.path()).unwrap(), config);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let file = write_config(r#"{"routing": {"profile": }"#);
    let err = NavigatorConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
}

#[test]
fn unknown_accuracy_is_rejected() {
    let file = write_config(r#"{"location": {"accuracy": "pinpoint"}}"#);
    assert!(matches!(
        NavigatorConfig::from_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = NavigatorConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
}
