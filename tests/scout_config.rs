use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use roi_scout::config::ScoutConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SCOUT_CONFIG",
        "SCOUT_SERVICE_URL",
        "SCOUT_TIMEOUT_SECS",
        "SCOUT_CAPTURE_SIZE",
        "SCOUT_BUCKETS",
        "SCOUT_EXPORT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScoutConfig::load().expect("load defaults");
    assert_eq!(cfg.service.base_url, "http://127.0.0.1:8000");
    assert_eq!(cfg.service.primary_path, "/api/detect");
    assert_eq!(cfg.service.fallback_path, "/detect");
    assert_eq!(cfg.service.timeout, None);
    assert_eq!(cfg.capture.size, 512);
    assert!(cfg.capture.enabled);
    assert_eq!(cfg.buckets.high, 0.8);
    assert_eq!(cfg.buckets.medium, 0.6);
    assert_eq!(cfg.map.center.lat, 21.212968);
    assert_eq!(cfg.map.search_zoom, 15.0);
}

#[test]
fn loads_toml_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        [service]
        base_url = "http://detector.internal:9000"
        fallback_path = "/legacy/detect"
        timeout_secs = 30

        [capture]
        enabled = false
        size = 256

        [buckets]
        high = 0.75
        medium = 0.5

        [export]
        dir = "/tmp/exports"

        [map]
        center_lat = 19.07
        center_lng = 72.87
        zoom = 11.0
    "#;
    file.write_all(toml.as_bytes()).expect("write config");

    std::env::set_var("SCOUT_CONFIG", file.path());
    std::env::set_var("SCOUT_SERVICE_URL", "http://10.0.0.5:8000");
    std::env::set_var("SCOUT_CAPTURE_SIZE", "1024");

    let cfg = ScoutConfig::load().expect("load config");

    assert_eq!(cfg.service.base_url, "http://10.0.0.5:8000");
    assert_eq!(cfg.service.primary_path, "/api/detect");
    assert_eq!(cfg.service.fallback_path, "/legacy/detect");
    assert_eq!(cfg.service.timeout, Some(Duration::from_secs(30)));
    assert!(!cfg.capture.enabled);
    assert_eq!(cfg.capture.size, 1024);
    assert_eq!(cfg.buckets.high, 0.75);
    assert_eq!(cfg.buckets.medium, 0.5);
    assert_eq!(cfg.export_dir.to_str(), Some("/tmp/exports"));
    assert_eq!(cfg.map.center.lng, 72.87);
    assert_eq!(cfg.map.zoom, 11.0);

    clear_env();
}

#[test]
fn loads_json_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    file.write_all(br#"{"service": {"primary_path": "/v2/detect"}}"#)
        .expect("write config");
    std::env::set_var("SCOUT_CONFIG", file.path());

    let cfg = ScoutConfig::load().expect("load config");
    assert_eq!(cfg.service.primary_path, "/v2/detect");

    clear_env();
}

#[test]
fn rejects_inverted_bucket_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SCOUT_BUCKETS", "0.5,0.7");
    assert!(ScoutConfig::load().is_err());
    std::env::set_var("SCOUT_BUCKETS", "0.9");
    assert!(ScoutConfig::load().is_err());
    std::env::set_var("SCOUT_BUCKETS", "0.9,0.7");
    assert!(ScoutConfig::load().is_ok());

    clear_env();
}

#[test]
fn rejects_relative_endpoint_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    file.write_all(br#"{"service": {"fallback_path": "detect"}}"#)
        .expect("write config");
    std::env::set_var("SCOUT_CONFIG", file.path());
    assert!(ScoutConfig::load().is_err());

    clear_env();
}
