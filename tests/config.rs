use parvec::{
    BackendKind, DispatchConfig, DispatchReport, Dispatcher, LockStrategy, Operand, OutputOperand,
    SpawnFailurePolicy, Vectorize, ViolationPolicy,
};
use std::sync::Arc;

#[test]
fn test_partial_json_config_uses_defaults() {
    let config: DispatchConfig =
        serde_json::from_str(r#"{ "workers": 3, "lock": "Backoff" }"#).unwrap();

    assert_eq!(config.workers, Some(3));
    assert_eq!(config.lock, LockStrategy::Backoff);
    assert!(config.verify_completion);
    assert_eq!(config.on_violation, ViolationPolicy::Abort);
    assert_eq!(config.on_spawn_failure, SpawnFailurePolicy::Abort);
    assert_eq!(config.backend, BackendKind::Native);
    assert_eq!(config.thread_name_prefix, "parvec-worker");
}

#[test]
fn test_config_from_json_drives_dispatcher() {
    let config: DispatchConfig = serde_json::from_str(
        r#"{ "workers": 2, "backend": "Crossbeam", "on_violation": "Panic" }"#,
    )
    .unwrap();
    let d = Arc::new(Dispatcher::new(config).unwrap());
    assert_eq!(d.backend_name(), "crossbeam");
    assert_eq!(d.plan(9).workers, 2);

    let ufunc = Vectorize::new().add(|x: i32| -x).build(d).unwrap();
    let input = vec![1, 2, 3];
    let mut output = vec![0; 3];
    ufunc
        .call(&[Operand::from(&input)], OutputOperand::from(&mut output))
        .unwrap();
    assert_eq!(output, vec![-1, -2, -3]);
}

#[test]
fn test_zero_workers_in_json_rejected() {
    let config: DispatchConfig = serde_json::from_str(r#"{ "workers": 0 }"#).unwrap();
    assert!(Dispatcher::new(config).is_err());
}

#[test]
fn test_report_serializes_worker_stats() {
    let d = Arc::new(Dispatcher::new(DispatchConfig::default().with_workers(4)).unwrap());
    let ufunc = Vectorize::new().add(|x: f32| x + 1.0).build(d).unwrap();
    let input = vec![0.5f32; 100];
    let mut output = vec![0.0f32; 100];
    let report = ufunc
        .call(&[Operand::from(&input)], OutputOperand::from(&mut output))
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["elements"], 100);
    assert_eq!(json["chunk"], 25);
    assert_eq!(json["workers"].as_array().map(Vec::len), Some(4));

    let back: DispatchReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}
