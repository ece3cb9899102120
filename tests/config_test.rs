use opqueue::config::Config;
use opqueue::error::Error;

#[test]
fn config_from_env_defaults_and_overrides() {
    unsafe {
        std::env::remove_var("OPQUEUE_WORKER_THREADS");
        std::env::remove_var("OPQUEUE_EVENT_CAPACITY");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.worker_threads, 4);
    assert_eq!(config.event_capacity, 256);
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("OPQUEUE_WORKER_THREADS", "8");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.worker_threads, 8);

    unsafe {
        std::env::set_var("OPQUEUE_WORKER_THREADS", "many");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("OPQUEUE_WORKER_THREADS", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("OPQUEUE_WORKER_THREADS");
    }
}

#[test]
fn config_from_toml_fills_defaults() {
    let config = Config::from_toml_str("worker_threads = 2\n").unwrap();
    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.event_capacity, 256);
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.queue_options().event_capacity, 256);
}

#[test]
fn config_from_toml_rejects_bad_values() {
    assert!(Config::from_toml_str("worker_threads = \"two\"").is_err());
    assert!(Config::from_toml_str("event_capacity = 0").is_err());
}

#[test]
fn config_from_missing_file_fails() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/opqueue.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}
