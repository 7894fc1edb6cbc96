use crate::error::ConfigError;
use crate::matcher::NameSet;
use serde::Deserialize;
use std::path::PathBuf;

/// Names an optional TOML settings file. Nothing is read when it is unset.
pub const SETTINGS_ENV: &str = "POSTSIFT_SETTINGS";
pub const DEFAULT_SENDER: &str = "USPSInformeddelivery@email.informeddelivery.usps.com";
pub const DEFAULT_LABEL: &str = "USPS";
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub names: NameSet,
    pub sender_address: String,
    pub label_name: String,
    pub credentials_path: PathBuf,
    pub vision_api_key: Option<String>,
    pub quota_project: Option<String>,
    pub max_concurrent_messages: usize,
}

/// Values from the opt-in settings file. Environment variables win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub target_names: Vec<String>,
    pub deny_names: Vec<String>,
    pub sender_address: Option<String>,
    pub label_name: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub vision_api_key: Option<String>,
    pub quota_project: Option<String>,
    pub max_concurrent_messages: Option<usize>,
}

impl FileSettings {
    pub fn parse(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn read(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content, path)
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key: &str| std::env::var(key).ok())
    }

    /// Environment-only unless `POSTSIFT_SETTINGS` points at a settings file,
    /// which must then exist and parse.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match non_blank(env(SETTINGS_ENV)) {
            Some(path) => FileSettings::read(&path)?,
            None => FileSettings::default(),
        };
        Self::from_sources(file, env)
    }

    pub fn from_sources<F>(file: FileSettings, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| non_blank(env(key));

        let targets = names_from_env(&env, "TARGET_NAMES_JSON", "TARGET_NAMES")?
            .unwrap_or(file.target_names);
        let denies =
            names_from_env(&env, "DENY_NAMES_JSON", "DENY_NAMES")?.unwrap_or(file.deny_names);
        let names = NameSet::new(targets, denies)?;

        let max_concurrent_messages = match env("MAX_CONCURRENT_MESSAGES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "MAX_CONCURRENT_MESSAGES".to_string(),
                    message: e.to_string(),
                })?,
            None => file.max_concurrent_messages.unwrap_or(1),
        };
        if max_concurrent_messages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_MESSAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            names,
            sender_address: env("SENDER_ADDRESS")
                .or(file.sender_address)
                .unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            label_name: env("USPS_LABEL")
                .or(file.label_name)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            credentials_path: env("GOOGLE_CREDENTIALS")
                .map(PathBuf::from)
                .or(file.credentials_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            vision_api_key: env("VISION_API_KEY").or(file.vision_api_key),
            quota_project: env("GOOGLE_QUOTA_PROJECT").or(file.quota_project),
            max_concurrent_messages,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// JSON array form takes precedence over the comma-separated form.
fn names_from_env<F>(
    env: &F,
    json_key: &str,
    csv_key: &str,
) -> Result<Option<Vec<String>>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = env(json_key) {
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::InvalidNameList {
                key: json_key.to_string(),
                source,
            })?;
        return Ok(Some(names));
    }
    Ok(env(csv_key).map(|csv| csv.split(',').map(|s| s.trim().to_string()).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_csv_targets() {
        let config = Config::from_sources(
            FileSettings::default(),
            env_from(&[("TARGET_NAMES", "Paul, Joanne ,paul,")]),
        )
        .unwrap();

        assert_eq!(config.names.targets(), ["Paul", "Joanne"]);
        assert!(config.names.denies().is_empty());
        assert_eq!(config.sender_address, DEFAULT_SENDER);
        assert_eq!(config.label_name, "USPS");
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.max_concurrent_messages, 1);
        assert!(config.vision_api_key.is_none());
    }

    #[test]
    fn test_json_takes_precedence_over_csv() {
        let config = Config::from_sources(
            FileSettings::default(),
            env_from(&[
                ("TARGET_NAMES_JSON", r#"["Newman", "Smith, Jr."]"#),
                ("TARGET_NAMES", "Paul"),
                ("DENY_NAMES", "Current Resident"),
            ]),
        )
        .unwrap();

        assert_eq!(config.names.targets(), ["Newman", "Smith, Jr."]);
        assert_eq!(config.names.denies(), ["Current Resident"]);
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let err = Config::from_sources(
            FileSettings::default(),
            env_from(&[("TARGET_NAMES_JSON", "Paul"), ("TARGET_NAMES", "Paul")]),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidNameList { ref key, .. } if key == "TARGET_NAMES_JSON"));
    }

    #[test]
    fn test_missing_targets_is_fatal() {
        let err = Config::from_sources(FileSettings::default(), env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargetNames));

        let err = Config::from_sources(
            FileSettings::default(),
            env_from(&[("TARGET_NAMES", " , ,")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoTargetNames));
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let file = FileSettings::parse(
            r#"
target_names = ["Paul"]
label_name = "Mail/USPS"
max_concurrent_messages = 4
"#,
            "settings.toml",
        )
        .unwrap();

        let config = Config::from_sources(
            file,
            env_from(&[("TARGET_NAMES", "  "), ("USPS_LABEL", "")]),
        )
        .unwrap();

        assert_eq!(config.names.targets(), ["Paul"]);
        assert_eq!(config.label_name, "Mail/USPS");
        assert_eq!(config.max_concurrent_messages, 4);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileSettings {
            target_names: vec!["Paul".to_string()],
            sender_address: Some("file@example.com".to_string()),
            ..Default::default()
        };

        let config = Config::from_sources(
            file,
            env_from(&[
                ("TARGET_NAMES", "Joanne"),
                ("SENDER_ADDRESS", "env@example.com"),
                ("VISION_API_KEY", "abc123"),
            ]),
        )
        .unwrap();

        assert_eq!(config.names.targets(), ["Joanne"]);
        assert_eq!(config.sender_address, "env@example.com");
        assert_eq!(config.vision_api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = Config::from_sources(
            FileSettings::default(),
            env_from(&[("TARGET_NAMES", "Paul"), ("MAX_CONCURRENT_MESSAGES", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_ignores_settings_file_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), "[keybindings]\nquit = [\"q\"]\n").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let result = Config::load_with(env_from(&[("TARGET_NAMES", "Paul")]));

        std::env::set_current_dir(previous).unwrap();
        let config = result.unwrap();
        assert_eq!(config.names.targets(), ["Paul"]);
        assert_eq!(config.label_name, DEFAULT_LABEL);
    }

    #[test]
    fn test_load_reads_explicit_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postsift.toml");
        std::fs::write(&path, "target_names = [\"Joanne\"]\nlabel_name = \"Mail\"\n").unwrap();
        let path = path.to_str().unwrap().to_string();

        let config = Config::load_with(env_from(&[(SETTINGS_ENV, path.as_str())])).unwrap();

        assert_eq!(config.names.targets(), ["Joanne"]);
        assert_eq!(config.label_name, "Mail");
    }

    #[test]
    fn test_load_missing_explicit_settings_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let path = path.to_str().unwrap().to_string();

        let err = Config::load_with(env_from(&[
            (SETTINGS_ENV, path.as_str()),
            ("TARGET_NAMES", "Paul"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_settings_key_is_rejected() {
        assert!(FileSettings::parse("targets = [\"Paul\"]", "settings.toml").is_err());
    }
}
