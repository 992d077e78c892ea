use chatbot_core::{Config, GenerationSettings, Theme};

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn saved_settings_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config {
        endpoint: "http://localhost:8080/chat".to_string(),
        theme: Theme::Light,
        ..Config::default()
    };
    config.remember_settings(&GenerationSettings {
        model: "Phi-3-mini-4k-instruct".to_string(),
        temperature: 0.5,
        max_tokens: 1024,
        top_p: 0.5,
    });
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.initial_settings().model, "Phi-3-mini-4k-instruct");
}

#[test]
fn invalid_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn update_file_keeps_fields_it_does_not_touch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    Config {
        endpoint: "http://saved".to_string(),
        ..Config::default()
    }
    .save_to(&path)
    .unwrap();

    Config::update_file(&path, |stored| stored.theme = Theme::Light).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.endpoint, "http://saved");
    assert_eq!(loaded.theme, Theme::Light);
}

#[test]
fn update_file_leaves_unreadable_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::update_file(&path, |stored| stored.theme = Theme::Light).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}
