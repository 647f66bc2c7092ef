use groupwatch_core::{ConfigManager, GroupId, RelationKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_layered_files_override_defaults() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("default.toml"),
        r#"
[scan]
watch_list = [100, 200]
relations = ["friends", "followers"]
relation_cap = 50

[paging]
page_delay_ms = 0
"#,
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("staging.toml"),
        r#"
[scan]
relation_cap = 75
"#,
    )
    .unwrap();

    let settings = ConfigManager::load_from_sources(temp_dir.path(), "staging").unwrap();
    assert_eq!(settings.scan.watch_list, vec![GroupId(100), GroupId(200)]);
    assert_eq!(
        settings.scan.relations,
        vec![RelationKind::Friends, RelationKind::Followers]
    );
    assert_eq!(settings.scan.relation_cap, 75);
    assert_eq!(settings.paging.page_delay_ms, 0);
    // Untouched sections keep their defaults
    assert_eq!(settings.paging.page_size, 100);
    assert_eq!(settings.api.groups_base_url, "https://groups.roblox.com");
}

#[test]
fn test_local_file_wins_over_env_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("development.toml"),
        "[cache]\nally_max_age_secs = 10\n",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("local.toml"),
        "[cache]\nally_max_age_secs = 20\n",
    )
    .unwrap();

    let settings = ConfigManager::load_from_sources(temp_dir.path(), "development").unwrap();
    assert_eq!(settings.cache.ally_max_age_secs, 20);
}

#[test]
fn test_empty_directory_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let manager =
        ConfigManager::load(Some(temp_dir.path().to_path_buf()), Some("test".into())).unwrap();
    assert_eq!(manager.env(), "test");
    assert!(manager.settings().scan.watch_list.is_empty());
    assert!(manager.settings().scan.include_target);
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("default.toml"),
        "[paging]\npage_size = 0\n",
    )
    .unwrap();

    let result = ConfigManager::load(Some(temp_dir.path().to_path_buf()), Some("test".into()));
    assert!(result.is_err());
}
