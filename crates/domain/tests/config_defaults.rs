use bridge_domain::config::Config;

#[test]
fn default_host_is_wildcard_bind() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn explicit_host_and_port_parse() {
    let toml_str = r#"
[server]
host = "127.0.0.1"
port = 8088
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8088);
}

#[test]
fn feature_flag_defaults_match_spec() {
    let config = Config::default();
    assert!(config.features.base64_passthrough);
    assert!(config.features.smart_cancel);
    assert_eq!(config.features.barge_in_debounce_ms, 1_000);
    assert_eq!(config.features.barge_in_min_remain_ms, 2_000);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.realtime_model.session_ready_deadline_ms, 3_000);
    assert_eq!(config.reservation_store.database_path, "reservations.db");
}
