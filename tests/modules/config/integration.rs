//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置集成测试

use std::time::Duration;
use tempfile::TempDir;
use tierguard::cache::CacheManager;
use tierguard::config::{BackendKind, Settings};
use tierguard::error::TierGuardError;
use tierguard::executor::BoundedExecutor;
use tierguard::limiters::RateLimiter;

#[test]
fn test_load_each_format() {
    let dir = TempDir::new().unwrap();

    let yaml = dir.path().join("settings.yml");
    std::fs::write(&yaml, "cache:\n  backend: memory\nperformance:\n  max_workers: 3\n").unwrap();

    let toml = dir.path().join("settings.toml");
    std::fs::write(&toml, "[cache]\nbackend = \"memory\"\n[performance]\nmax_workers = 3\n")
        .unwrap();

    let json = dir.path().join("settings.JSON");
    std::fs::write(
        &json,
        r#"{"cache": {"backend": "memory"}, "performance": {"max_workers": 3}}"#,
    )
    .unwrap();

    for path in [yaml, toml, json] {
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.cache.backend, BackendKind::Memory, "{}", path.display());
        assert_eq!(settings.performance.max_workers, 3, "{}", path.display());
    }
}

#[test]
fn test_load_missing_file() {
    let result = Settings::load("/nonexistent/tierguard.yaml");
    assert!(matches!(result, Err(TierGuardError::IoError(_))));
}

#[test]
fn test_malformed_documents() {
    assert!(matches!(
        Settings::from_yaml_str("cache: [unclosed"),
        Err(TierGuardError::YamlError(_))
    ));
    assert!(matches!(
        Settings::from_toml_str("cache = = 1"),
        Err(TierGuardError::TomlError(_))
    ));
    assert!(matches!(
        Settings::from_json_str("{"),
        Err(TierGuardError::SerdeError(_))
    ));
    assert!(matches!(
        Settings::from_yaml_str("cache:\n  backend: redis\n"),
        Err(TierGuardError::YamlError(_))
    ));
}

#[test]
fn test_settings_round_trip_through_yaml() {
    let mut settings = Settings::default();
    settings.cache.dir = Some("/var/cache/tierguard".into());
    settings.performance.rate_limit_calls_per_period = Some(30);

    let yaml = serde_yaml::to_string(&settings).unwrap();
    assert_eq!(Settings::from_yaml_str(&yaml).unwrap(), settings);
}

#[tokio::test]
async fn test_components_follow_settings() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "cache:\n  backend: file\n  enabled: false\n  dir: {}\nperformance:\n  max_workers: 5\n  rate_limit_calls_per_period: 10\n  rate_limit_period_secs: 2\n",
        dir.path().display()
    );
    let settings = Settings::from_yaml_str(&yaml).unwrap();

    let manager = CacheManager::<String>::from_settings(&settings.cache).unwrap();
    assert_eq!(manager.kind(), BackendKind::File);
    assert!(!manager.is_enabled());

    let executor = BoundedExecutor::from_settings(&settings.performance);
    assert_eq!(executor.max_workers(), 5);

    let limiter = RateLimiter::from_settings(&settings.performance).unwrap();
    assert_eq!(limiter.calls(), 10);
    assert_eq!(limiter.period(), Duration::from_secs(2));
}

#[test]
fn test_invalid_cache_settings_rejected_by_manager() {
    let mut settings = Settings::default();
    settings.cache.backend = BackendKind::Memory;
    settings.cache.memory_capacity = 0;

    let result = CacheManager::<String>::from_settings(&settings.cache);
    assert!(matches!(result, Err(TierGuardError::ConfigError(_))));
}
