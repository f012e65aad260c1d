use std::sync::Mutex;
use std::time::Duration;

use taskweave::Error;
use taskweave::config::Config;

// Environment variables are process-wide; tests that touch them take turns.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "TASKWEAVE_ITEM_DELAY_MS",
    "TASKWEAVE_FETCH_DELAY_MS",
    "TASKWEAVE_STEP_DELAY_MS",
    "TASKWEAVE_STREAM_INTERVAL_MS",
    "TASKWEAVE_OPERATION_DELAY_MS",
    "TASKWEAVE_HTTP_TIMEOUT_SECS",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn config_from_env_uses_defaults() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.item_delay, Duration::from_millis(100));
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
}

#[test]
fn config_from_env_reads_overrides() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    unsafe {
        std::env::set_var("TASKWEAVE_ITEM_DELAY_MS", "250");
        std::env::set_var("TASKWEAVE_HTTP_TIMEOUT_SECS", " 5 ");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("LOG_LEVEL", "debug");
    }

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.item_delay, Duration::from_millis(250));
    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn config_from_env_fails_on_bad_number() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    unsafe {
        std::env::set_var("TASKWEAVE_STEP_DELAY_MS", "fast");
    }

    let result = Config::from_env();
    clear_env();

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("TASKWEAVE_STEP_DELAY_MS"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn toml_overrides_only_given_fields() {
    let config = Config::from_toml_str(
        r#"
        fetch_delay_ms = 10
        log_level = "warn"
        "#,
    )
    .unwrap();

    assert_eq!(config.fetch_delay, Duration::from_millis(10));
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.step_delay, Config::default().step_delay);
}

#[test]
fn toml_rejects_unknown_fields() {
    let result = Config::from_toml_str("database_url = \"postgres://\"");
    assert!(matches!(result, Err(Error::Config(_))), "{result:?}");
}

#[test]
fn load_layers_env_over_file() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let path = std::env::temp_dir().join(format!("taskweave-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "item_delay_ms = 20\nstream_interval_ms = 30\n").unwrap();
    unsafe {
        std::env::set_var("TASKWEAVE_STREAM_INTERVAL_MS", "40");
    }

    let config = Config::load(Some(&path));
    clear_env();
    std::fs::remove_file(&path).ok();
    let config = config.unwrap();

    assert_eq!(config.item_delay, Duration::from_millis(20));
    assert_eq!(config.stream_interval, Duration::from_millis(40));
}

#[test]
fn load_fails_on_missing_file() {
    let path = std::env::temp_dir().join(format!("taskweave-missing-{}.toml", uuid::Uuid::new_v4()));
    assert!(matches!(Config::load(Some(&path)), Err(Error::Config(_))));
}
