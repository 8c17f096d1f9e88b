use flowtrace::config::{ConfigError, FlowTraceConfig, DEFAULT_MERGE_PREFETCH};
use flowtrace::telemetry::{Context, Notification};
use flowtrace::Validator;

#[test]
fn test_defaults() {
    let config = FlowTraceConfig::default();
    assert!(!config.tracer.log_notifications);
    assert_eq!(config.pipeline.merge_prefetch, DEFAULT_MERGE_PREFETCH);
    assert!(!config.validator.require_activity);
    assert!(!config.validator.strict_start);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = FlowTraceConfig::from_json(r#"{ "tracer": { "log_notifications": true } }"#).unwrap();
    assert!(config.tracer.log_notifications);
    assert_eq!(config.pipeline.merge_prefetch, DEFAULT_MERGE_PREFETCH);

    let config = FlowTraceConfig::from_json(r#"{ "validator": { "require_activity": true } }"#).unwrap();
    let empty = flowtrace::Snapshot::default();
    assert!(Validator::from_config(&config.validator).validate(&empty).is_err());

    let config = FlowTraceConfig::from_json(r#"{ "validator": { "strict_start": true } }"#).unwrap();
    let stream = flowtrace::telemetry::StreamId::new();
    let early_request = flowtrace::telemetry::StreamTrace::new(
        stream,
        vec![
            Context::new(stream, Notification::Subscribe),
            Context::new(stream, Notification::Request(1)),
            Context::new(stream, Notification::Unsubscribe),
        ],
    );
    let snapshot = flowtrace::Snapshot::new(vec![early_request]);
    assert!(flowtrace::telemetry::validate(&snapshot).is_ok());
    assert!(Validator::from_config(&config.validator).validate(&snapshot).is_err());
}

#[test]
fn test_rejects_bad_input() {
    assert!(matches!(
        FlowTraceConfig::from_json(r#"{ "pipeline": { "merge_prefetch": 0 } }"#),
        Err(ConfigError::ZeroPrefetch)
    ));
    assert!(matches!(
        FlowTraceConfig::from_json("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}
