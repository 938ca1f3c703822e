//! Tests for config loading

use std::io::Write;
use std::path::Path;

use hwgw::config::Config;
use hwgw::models::RamMb;
use serial_test::serial;

const ENV_KEYS: &[&str] = &[
    "HWGW_MAX_EXTRACT_PERCENT",
    "HWGW_RESYNC_AFTER_BATCHES",
    "HWGW_SPACING_MS",
    "HWGW_KEEP_FREE_MB",
    "HWGW_LOG_FORMAT",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_shipped_config_is_valid() {
    clear_env();
    let config = Config::load(Some(Path::new("config.toml"))).unwrap();
    assert_eq!(config.batch.resync_after_batches, 100);
    assert_eq!(config.capacity.pool, vec!["pserv-0", "pserv-1"]);
    assert_eq!(config.keep_free().overrides["home"], RamMb(32_000));
    assert_eq!(config.capacity.script_costs.hack, RamMb(1700));
}

#[test]
#[serial]
fn test_file_then_env_overrides() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[batch]
max_extract_percent = 25

[timing]
spacing_ms = 80
"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.batch.max_extract_percent, 25);
    assert_eq!(config.timing.spacing_ms, 80);

    std::env::set_var("HWGW_MAX_EXTRACT_PERCENT", "10");
    std::env::set_var("HWGW_KEEP_FREE_MB", "4096");
    let config = Config::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.batch.max_extract_percent, 10);
    assert_eq!(config.timing.spacing_ms, 80);
    assert_eq!(config.capacity.keep_free_mb, 4096);
    assert_eq!(config.planner().max_extract_percent, 10);
}

#[test]
#[serial]
fn test_invalid_env_value_fails_validation() {
    clear_env();
    std::env::set_var("HWGW_RESYNC_AFTER_BATCHES", "0");
    let result = Config::load(None);
    clear_env();
    assert!(result.is_err());

    std::env::set_var("HWGW_LOG_FORMAT", "yaml");
    let result = Config::load(None);
    clear_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_unparseable_env_value_is_ignored() {
    clear_env();
    std::env::set_var("HWGW_SPACING_MS", "soon");
    let config = Config::from_env().unwrap();
    clear_env();
    assert_eq!(config.timing.spacing_ms, 50);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_malformed_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[batch\nmax_extract_percent = ").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}
