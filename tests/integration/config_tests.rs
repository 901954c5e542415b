use asmdupe::config::{Config, ENV_PREFIX};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.mmap_threshold, 64 * 1024 * 1024);
}

#[test]
fn test_config_load_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
io_threads = 8
top_n = 25
module_extensions = ["DLL", ".winmd"]
ignore_patterns = ["packs/", "*.pdb"]
"#,
    )
    .unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();
    let config = config.normalized();

    assert_eq!(config.io_threads, 8);
    assert_eq!(config.top_n, 25);
    assert_eq!(config.module_extensions, ["dll", "winmd"]);
    assert_eq!(config.ignore_patterns, ["packs/", "*.pdb"]);
    assert!(config.use_mmap);
}

#[test]
fn test_config_env_overrides_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "top_n = 5\nuse_mmap = true\n").unwrap();

    // A prefix of its own keeps this test independent of the real one
    std::env::set_var("ASMDUPE_TEST_TOP_N", "7");
    std::env::set_var("ASMDUPE_TEST_USE_MMAP", "false");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("ASMDUPE_TEST_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.top_n, 7);
    assert!(!config.use_mmap);

    std::env::remove_var("ASMDUPE_TEST_TOP_N");
    std::env::remove_var("ASMDUPE_TEST_USE_MMAP");
}

#[test]
fn test_config_missing_file_is_skipped() {
    let dir = tempdir().unwrap();
    let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.top_n, Config::default().top_n);
}

#[test]
fn test_config_invalid_value_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = \"many\"\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_env_prefix() {
    assert_eq!(ENV_PREFIX, "ASMDUPE_");
}
