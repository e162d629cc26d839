use crate::curve::Rules;
use serde::Deserialize;
use std::{borrow::Cow, env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USER_ID: &str = "player-1";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub data_dir: PathBuf,
    pub user_id: String,
    pub rules_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_dir = lookup("APP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let user_id = lookup("APP_USER_ID")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let rules_path = lookup("APP_CONFIG_PATH").map(PathBuf::from);

        Self {
            port,
            data_dir,
            user_id,
            rules_path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    #[serde(default)]
    settings: Rules,
    #[serde(default)]
    progression: Progression,
}

#[derive(Debug, Default, Deserialize)]
struct Progression {
    title_unlock_levels: Option<Vec<u32>>,
}

pub fn parse_rules(bytes: &[u8]) -> Result<Rules, serde_json::Error> {
    let file: RulesFile = serde_json::from_slice(bytes)?;
    let mut rules = file.settings;
    if let Some(levels) = file.progression.title_unlock_levels {
        rules.title_unlock_levels = Cow::Owned(levels);
    }
    Ok(rules)
}

/// Reads overrides from a JSON file shaped
/// `{"settings": {...}, "progression": {"title_unlock_levels": [...]}}`.
/// Any problem falls back to the canonical rules.
pub async fn load_rules(path: Option<&Path>) -> Rules {
    let Some(path) = path else {
        return Rules::default();
    };

    let rules = match fs::read(path).await {
        Ok(bytes) => match parse_rules(&bytes) {
            Ok(rules) => rules,
            Err(err) => {
                error!("failed to parse rules file {}: {err}", path.display());
                return Rules::default();
            }
        },
        Err(err) => {
            error!("failed to read rules file {}: {err}", path.display());
            return Rules::default();
        }
    };

    if !rules.is_valid() {
        warn!(?rules, "rules file has out-of-range values, using defaults");
        return Rules::default();
    }
    info!(?rules, "loaded rules from {}", path.display());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let settings = settings_from(&[("PORT", "not-a-port"), ("APP_USER_ID", "  ")]);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.user_id, DEFAULT_USER_ID);
        assert_eq!(settings.rules_path, None);
    }

    #[test]
    fn settings_read_overrides() {
        let settings = settings_from(&[
            ("PORT", "9001"),
            ("APP_DATA_DIR", "/tmp/quests"),
            ("APP_USER_ID", "hunter"),
            ("APP_CONFIG_PATH", "config.json"),
        ]);
        assert_eq!(settings.port, 9001);
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/quests"));
        assert_eq!(settings.user_id, "hunter");
        assert_eq!(settings.rules_path, Some(PathBuf::from("config.json")));
    }

    #[test]
    fn partial_rules_file_keeps_other_constants() {
        let rules = parse_rules(br#"{"settings": {"base_xp": 150, "app_name": "LEVEL CRUSH"}}"#)
            .unwrap();
        assert_eq!(rules.base_xp, 150);
        assert_eq!(rules.coeff_low, Rules::CANONICAL.coeff_low);
        assert_eq!(rules.exponent, Rules::CANONICAL.exponent);
    }

    #[test]
    fn penalty_mode_and_title_levels_are_read() {
        let rules = parse_rules(
            r#"{"settings": {"penalty_mode": "Exalté"},
                "progression": {"title_unlock_levels": [1, 3, 8]}}"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(rules.penalty_mode, Mode::Exalted);
        assert_eq!(rules.title_unlock_levels.to_vec(), vec![1, 3, 8]);
        assert!(rules.is_valid());
        assert_eq!(rules.current_title(4), "Initiate");
    }

    #[tokio::test]
    async fn unordered_title_levels_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, br#"{"progression": {"title_unlock_levels": [10, 5]}}"#)
            .await
            .unwrap();
        assert_eq!(load_rules(Some(&path)).await, Rules::default());
    }

    #[tokio::test]
    async fn unreadable_rules_file_uses_defaults() {
        let rules = load_rules(Some(Path::new("/nonexistent/rules.json"))).await;
        assert_eq!(rules, Rules::default());
    }

    #[tokio::test]
    async fn invalid_rules_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, br#"{"settings": {"coeff_high": -1}}"#)
            .await
            .unwrap();
        assert_eq!(load_rules(Some(&path)).await, Rules::default());
    }
}
