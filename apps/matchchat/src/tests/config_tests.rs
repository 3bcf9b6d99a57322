use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("matchchat_config_test_{name}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("matchchat.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_point_at_local_service() {
    let settings = Settings::default();
    assert_eq!(settings.server_url, "http://localhost:3010");
    assert!(settings.nickname.is_none());
}

#[test]
fn missing_file_keeps_defaults() {
    let mut settings = Settings::default();
    let path = env::temp_dir().join("matchchat_config_test_does_not_exist.toml");

    apply_file(&mut settings, &path).expect("missing file is fine");

    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_override_defaults() {
    let path = temp_file(
        "file",
        "server_url = \"http://chat.internal:4000\"\nnickname = \"alice\"\n",
    );
    let mut settings = Settings::default();

    apply_file(&mut settings, &path).expect("load");

    assert_eq!(settings.server_url, "http://chat.internal:4000");
    assert_eq!(settings.nickname.as_deref(), Some("alice"));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn invalid_file_is_reported() {
    let path = temp_file("invalid", "server_url = [unterminated");
    let mut settings = Settings::default();

    let err = apply_file(&mut settings, &path).expect_err("invalid toml");

    assert!(err.to_string().contains("invalid config file"));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();

    apply_env(
        &mut settings,
        env_map(&[
            ("MATCHCHAT_SERVER_URL", "http://one:1"),
            ("APP__SERVER_URL", "http://two:2"),
            ("MATCHCHAT_NICKNAME", "bob"),
        ]),
    );

    assert_eq!(settings.server_url, "http://two:2");
    assert_eq!(settings.nickname.as_deref(), Some("bob"));
}

#[test]
fn command_line_wins_over_env() {
    let mut settings = Settings::default();
    apply_env(&mut settings, env_map(&[("MATCHCHAT_NICKNAME", "bob")]));

    settings.override_with(Some("ws://127.0.0.1:9000/match".into()), Some("carol".into()));

    assert_eq!(settings.server_url, "ws://127.0.0.1:9000/match");
    assert_eq!(settings.nickname.as_deref(), Some("carol"));
}

#[test]
fn absent_flags_leave_settings_alone() {
    let mut settings = Settings::default();
    settings.override_with(None, None);
    assert_eq!(settings, Settings::default());
}
