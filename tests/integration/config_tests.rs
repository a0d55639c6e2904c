use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use reldedup::config::{Config, ConfigError};
use reldedup::scanner::HashAlgorithm;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
jobs = 8
algorithm = "blake3"
use_manifests = true
manifest_suffix = ".sha256"
wait_timeout_secs = 5
"#,
        )?;

        let config = Config::load(Some(Path::new("config.toml"))).unwrap();
        assert_eq!(config.jobs, 8);
        assert_eq!(config.algorithm, HashAlgorithm::Blake3);
        assert!(config.use_manifests);
        assert_eq!(config.manifest_suffix, ".sha256");
        assert_eq!(config.backup_suffix, ".bak");
        assert_eq!(config.wait_timeout_secs, 5);
        Ok(())
    });
}

#[test]
fn test_config_env_layer() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RELDEDUP_JOBS", "16");
        jail.set_env("RELDEDUP_BACKUP_SUFFIX", ".orig");
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("RELDEDUP_"))
            .extract()?;
        assert_eq!(config.jobs, 16);
        assert_eq!(config.backup_suffix, ".orig");
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "jobs = 2\nbackup_suffix = \".old\"\n")?;
        jail.set_env("RELDEDUP_JOBS", "6");
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("RELDEDUP_"))
            .extract()?;
        assert_eq!(config.jobs, 6);
        assert_eq!(config.backup_suffix, ".old");
        Ok(())
    });
}

#[test]
fn test_invalid_values_in_file_rejected() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "jobs = 0\n")?;
        assert!(matches!(
            Config::load(Some(Path::new("config.toml"))),
            Err(ConfigError::Invalid(_))
        ));
        Ok(())
    });
}

#[test]
fn test_malformed_explicit_file_is_fatal() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "jobs = \"many\"\n")?;
        assert!(matches!(
            Config::load(Some(Path::new("config.toml"))),
            Err(ConfigError::Figment(_))
        ));
        Ok(())
    });
}

#[test]
fn test_missing_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::NotFound(_))
    ));
}
