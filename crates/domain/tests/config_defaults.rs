use camp_domain::config::Config;

#[test]
fn default_timeouts() {
    let config = Config::default();
    assert_eq!(config.toolsets.start_timeout_secs, 60);
    assert_eq!(config.toolsets.call_timeout_secs, 120);
}

#[test]
fn default_store_path() {
    let config = Config::default();
    assert_eq!(config.toolsets.config_path.to_str(), Some("toolsets.toml"));
}

#[test]
fn partial_toolsets_section_keeps_other_defaults() {
    let toml_str = r#"
[toolsets]
start_timeout_secs = 5
files_root = "/tmp/work"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.toolsets.start_timeout_secs, 5);
    assert_eq!(config.toolsets.call_timeout_secs, 120);
    assert_eq!(config.toolsets.log_buffer_bytes, 65_536);
    assert_eq!(
        config.toolsets.files_root.as_deref().and_then(|p| p.to_str()),
        Some("/tmp/work")
    );
}

#[test]
fn empty_file_is_default_config() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.observability.log_filter, "warn");
    assert!(config.toolsets.files_root.is_none());
}

#[test]
fn timeouts_convert_to_durations() {
    let config = Config::default();
    assert_eq!(config.toolsets.start_timeout().as_secs(), 60);
    assert_eq!(config.toolsets.call_timeout().as_secs(), 120);
}
