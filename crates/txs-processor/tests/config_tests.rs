use std::io::Write;

use txs_processor::config::Config;

#[test]
fn default_config_basics() {
    let cfg = Config::default();

    assert_eq!(cfg.queue_capacity, 1024);
    assert_eq!(cfg.max_retries, 5);
    assert_eq!(cfg.retry_base_delay_ms, 100);
    assert_eq!(cfg.retry_max_delay_ms, 10_000);
    assert_eq!(cfg.database_url, None);
    cfg.validate().expect("defaults are valid");
}

#[test]
fn validate_rejects_invalid_queue_capacity() {
    let cfg = Config {
        queue_capacity: 0,
        ..Config::default()
    };

    let err = cfg.validate().expect_err("queue_capacity must be rejected");
    assert!(err.to_string().contains("queue_capacity"));
}

#[test]
fn validate_rejects_inverted_backoff_bounds() {
    let cfg = Config {
        retry_base_delay_ms: 500,
        retry_max_delay_ms: 100,
        ..Config::default()
    };

    let err = cfg.validate().expect_err("backoff bounds must be rejected");
    assert!(err.to_string().contains("retry_max_delay_ms"));
}

#[test]
fn validate_rejects_blank_database_url() {
    let cfg = Config {
        database_url: Some("  ".to_string()),
        ..Config::default()
    };

    let err = cfg.validate().expect_err("blank url must be rejected");
    assert!(err.to_string().contains("database_url"));
}

#[test]
fn backoff_doubles_up_to_cap() {
    let cfg = Config {
        retry_base_delay_ms: 100,
        retry_max_delay_ms: 1_000,
        ..Config::default()
    };

    assert_eq!(cfg.backoff_ms(1), 100);
    assert_eq!(cfg.backoff_ms(2), 200);
    assert_eq!(cfg.backoff_ms(4), 800);
    assert_eq!(cfg.backoff_ms(5), 1_000);
    assert_eq!(cfg.backoff_ms(60), 1_000);
}

#[test]
fn env_vars_overlay_file_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{"queue_capacity": 16, "max_retries": 2}}"#).expect("write");
    file.flush().expect("flush");

    let cfg = Config::from_json_file(file.path())
        .expect("parse file")
        .with_vars([
            ("TXS_PROCESSOR_MAX_RETRIES".to_string(), "7".to_string()),
            (
                "TXS_PROCESSOR_DATABASE_URL".to_string(),
                "postgres://localhost/zones".to_string(),
            ),
            ("UNRELATED".to_string(), "x".to_string()),
        ])
        .expect("overlay");

    assert_eq!(cfg.queue_capacity, 16);
    assert_eq!(cfg.max_retries, 7);
    assert_eq!(cfg.retry_base_delay_ms, 100);
    assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/zones"));
}

#[test]
fn malformed_env_value_names_the_variable() {
    let err = Config::default()
        .with_vars([("TXS_PROCESSOR_QUEUE_CAPACITY".to_string(), "many".to_string())])
        .expect_err("must fail");
    assert!(err.to_string().contains("TXS_PROCESSOR_QUEUE_CAPACITY"));
}
