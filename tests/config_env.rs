// tests/config_env.rs
mod common;

use serial_test::serial;

use common::write_config;
use leak_tracker::ConfigLoader;

const TOML: &str = r#"
[push.telegram]
enabled = false
token = "file-token"
chat_id = "42"

[quiet_hours]
enabled = true
"#;

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let (cfg, src) = write_config(dir.path(), TOML, "https://forum.test/index.rss");

    std::env::set_var("TELEGRAM_SWITCH", "ON");
    std::env::set_var("TELEGRAM_TOKEN", "env-token");
    std::env::set_var("QUIET_HOURS_SWITCH", "off");
    let loaded = ConfigLoader::new(&cfg, &src).load();
    std::env::remove_var("TELEGRAM_SWITCH");
    std::env::remove_var("TELEGRAM_TOKEN");
    std::env::remove_var("QUIET_HOURS_SWITCH");

    let loaded = loaded.unwrap();
    let tg = &loaded.app.push.telegram;
    assert!(tg.enabled);
    assert_eq!(tg.token.as_deref(), Some("env-token"));
    assert_eq!(tg.chat_id.as_deref(), Some("42"));
    assert!(!loaded.app.quiet_hours.enabled);
    assert_eq!(loaded.sources.len(), 1);
    assert_eq!(loaded.sources[0].name, "BreachForum");
}

#[test]
#[serial]
fn without_env_ignores_process_environment() {
    let dir = tempfile::tempdir().unwrap();
    let (cfg, src) = write_config(dir.path(), TOML, "https://forum.test/index.rss");

    std::env::set_var("TELEGRAM_SWITCH", "ON");
    let loaded = ConfigLoader::new(&cfg, &src).without_env().load();
    std::env::remove_var("TELEGRAM_SWITCH");

    assert!(!loaded.unwrap().app.push.telegram.enabled);
}

#[test]
#[serial]
fn missing_tracker_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (_, src) = write_config(dir.path(), "", "https://forum.test/index.rss");

    let loaded = ConfigLoader::new(dir.path().join("absent.toml"), &src)
        .without_env()
        .load()
        .unwrap();
    assert!(loaded.app.quiet_hours.enabled);
    assert_eq!(loaded.app.schedule.interval_secs, 7200);
}

#[test]
fn broken_source_list_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("sources.toml");
    std::fs::write(&src, "[[source]]\nkey = \"a\"\nname = \"A\"\nfeed_url = \"https://a.test\"\n[[source]]\nkey = \"a\"\nname = \"B\"\nfeed_url = \"https://b.test\"\n").unwrap();

    let err = ConfigLoader::new(dir.path().join("tracker.toml"), &src)
        .without_env()
        .load()
        .unwrap_err();
    assert!(format!("{err:#}").contains("duplicate source key"));
}
