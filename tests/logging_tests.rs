use battery_reserve::config::LoggingConfig;
use battery_reserve::logging::{LogContext, get_logger_with_context, init_logging, parse_log_level};
use tracing::Level;

#[test]
fn parse_levels_case_insensitively() {
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("Debug").unwrap(), Level::DEBUG);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn init_is_idempotent() {
    let config = LoggingConfig {
        file: std::env::temp_dir()
            .join("battery-reserve-test.log")
            .to_string_lossy()
            .to_string(),
        ..LoggingConfig::default()
    };
    assert!(init_logging(&config).is_ok());
    assert!(init_logging(&config).is_ok());
}

#[test]
fn logger_carries_run_context() {
    let logger = get_logger_with_context(
        LogContext::new("runner")
            .with_run_id("run-1".to_string())
            .with_field("date", "2025-06-01".to_string()),
    );
    assert_eq!(logger.context().component, "runner");
    assert_eq!(logger.context().run_id.as_deref(), Some("run-1"));
    assert_eq!(
        logger.context().extra_fields.get("date").map(String::as_str),
        Some("2025-06-01")
    );
    logger.info("context attached");
}
