//! Application-level configuration loading: host identity, scoring rules and session policies.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_BUZZER_CONFIG_PATH";
/// Environment variables overriding the host credential pair.
const HOST_NAME_ENV: &str = "QUIZ_HOST_NAME";
const HOST_PASSWORD_ENV: &str = "QUIZ_HOST_PASSWORD";

const DEFAULT_HOST_NAME: &str = "host";
const DEFAULT_HOST_PASSWORD: &str = "host";
/// Points awarded for a correct answer when the host does not specify an amount.
pub const DEFAULT_CORRECT_POINTS: i64 = 5;
/// Points every other roster player receives when the buzzed-in player answers wrong.
pub const DEFAULT_CONSOLATION_POINTS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The single distinguished credential pair allowed to run the quiz.
pub struct HostIdentity {
    /// Login name of the host.
    pub name: String,
    /// Opaque credential compared for equality.
    pub password: String,
}

impl HostIdentity {
    /// Whether the given pair denotes the host.
    pub fn matches(&self, name: &str, password: &str) -> bool {
        self.name == name && self.password == password
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Point values applied by the scoring engine.
pub struct ScoringRules {
    /// Default award for a correct answer.
    pub correct_points: i64,
    /// Flat award to every other roster player after a wrong answer.
    pub consolation_points: i64,
    /// Points deducted from a player answering wrong (0 leaves the score unchanged).
    pub wrong_answer_penalty: i64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            correct_points: DEFAULT_CORRECT_POINTS,
            consolation_points: DEFAULT_CONSOLATION_POINTS,
            wrong_answer_penalty: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Whether unknown player names are registered on their first login.
pub enum RegistrationPolicy {
    /// First login with an unknown name creates the player.
    #[default]
    Open,
    /// Only players already present in the player store may log in.
    Closed,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    host: HostIdentity,
    scoring: ScoringRules,
    registration: RegistrationPolicy,
    idle_timeout: Option<Duration>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults, then
    /// apply environment overrides for the host credentials.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded quiz configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        let config = config.with_env_overrides(
            env::var(HOST_NAME_ENV).ok(),
            env::var(HOST_PASSWORD_ENV).ok(),
        );
        if config.host.password == DEFAULT_HOST_PASSWORD {
            warn!("host is using the built-in default password; set {HOST_PASSWORD_ENV}");
        }
        config
    }

    /// Build a configuration from explicit values.
    pub fn new(host: HostIdentity, scoring: ScoringRules, registration: RegistrationPolicy) -> Self {
        Self {
            host,
            scoring,
            registration,
            idle_timeout: None,
        }
    }

    /// Replace the host credentials with the provided non-empty overrides.
    fn with_env_overrides(mut self, name: Option<String>, password: Option<String>) -> Self {
        if let Some(name) = name.filter(|value| !value.trim().is_empty()) {
            self.host.name = name;
        }
        if let Some(password) = password.filter(|value| !value.is_empty()) {
            self.host.password = password;
        }
        self
    }

    /// Host credential pair.
    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    /// Scoring constants.
    pub fn scoring(&self) -> ScoringRules {
        self.scoring
    }

    /// Registration policy for unknown player names.
    pub fn registration(&self) -> RegistrationPolicy {
        self.registration
    }

    /// Optional idle timeout after which a silent connection is closed.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(
            HostIdentity {
                name: DEFAULT_HOST_NAME.into(),
                password: DEFAULT_HOST_PASSWORD.into(),
            },
            ScoringRules::default(),
            RegistrationPolicy::default(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    host: Option<RawHost>,
    scoring: RawScoring,
    registration: RegistrationPolicy,
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    name: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawScoring {
    correct_points: Option<i64>,
    consolation_points: Option<i64>,
    wrong_answer_penalty: Option<i64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let host = value
            .host
            .map(|raw| HostIdentity {
                name: raw.name,
                password: raw.password,
            })
            .unwrap_or(defaults.host);
        let scoring = ScoringRules {
            correct_points: value
                .scoring
                .correct_points
                .unwrap_or(defaults.scoring.correct_points),
            consolation_points: value
                .scoring
                .consolation_points
                .unwrap_or(defaults.scoring.consolation_points),
            wrong_answer_penalty: value
                .scoring
                .wrong_answer_penalty
                .map(i64::abs)
                .unwrap_or(defaults.scoring.wrong_answer_penalty),
        };

        Self {
            host,
            scoring,
            registration: value.registration,
            idle_timeout: value
                .idle_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"host":{"name":"qm","password":"s3cret"},"scoring":{"correctPoints":10}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert!(config.host().matches("qm", "s3cret"));
        assert_eq!(config.scoring().correct_points, 10);
        assert_eq!(config.scoring().consolation_points, DEFAULT_CONSOLATION_POINTS);
        assert_eq!(config.scoring().wrong_answer_penalty, 0);
        assert_eq!(config.registration(), RegistrationPolicy::Open);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn penalty_is_stored_as_magnitude() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"scoring":{"wrongAnswerPenalty":-2},"registration":"closed","idleTimeoutSecs":30}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.scoring().wrong_answer_penalty, 2);
        assert_eq!(config.registration(), RegistrationPolicy::Closed);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn env_overrides_ignore_blank_values() {
        let config = AppConfig::default()
            .with_env_overrides(Some("quizmaster".into()), Some(String::new()));

        assert_eq!(config.host().name, "quizmaster");
        assert_eq!(config.host().password, DEFAULT_HOST_PASSWORD);
    }
}
