//! Application-level policy configuration: group, roster, and round bounds,
//! scoring constants, and the optional speed bonus.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::battle::CHOICE_PALETTE;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_BATTLE_BACK_CONFIG_PATH";

const DEFAULT_MIN_STUDENTS_PER_GROUP: usize = 2;
const DEFAULT_MAX_STUDENTS_PER_GROUP: usize = 10;
const DEFAULT_MAX_GROUPS: usize = 10;
const DEFAULT_MIN_ROUNDS: usize = 5;
const DEFAULT_MAX_ROUNDS: usize = 20;
const DEFAULT_MIN_VIABLE_GROUPS: usize = 2;
const DEFAULT_POINTS_PER_CORRECT: u32 = 100;
const DEFAULT_CHOICE_SLOTS: usize = 4;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application. These are
/// policy inputs consumed by the engine, never hardcoded in it.
pub struct AppConfig {
    /// Minimum students a group roster must carry.
    pub min_students_per_group: usize,
    /// Maximum students a group roster may carry.
    pub max_students_per_group: usize,
    /// Maximum groups admitted per battle.
    pub max_groups: usize,
    /// Minimum question count per battle.
    pub min_rounds: usize,
    /// Maximum question count per battle.
    pub max_rounds: usize,
    /// Minimum registered groups required to start a battle.
    pub min_viable_groups: usize,
    /// Flat points awarded per correct answer.
    pub points_per_correct: u32,
    /// Number of distinct answer-choice slots a question may use.
    pub choice_slots: usize,
    /// Round duration applied when a battle does not set its own; rounds never
    /// auto-close when absent.
    pub default_round_seconds: Option<u64>,
    /// Optional speed bonus; flat-rate scoring applies when absent.
    pub speed_bonus: Option<SpeedBonus>,
}

/// Explicitly-configured latency-weighted scoring extension. When present, a
/// correct answer earns an extra linear bonus that decays to zero over
/// `window_ms` of response time.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpeedBonus {
    /// Maximum bonus points for an instantaneous answer.
    pub max_bonus: u32,
    /// Window (milliseconds) over which the bonus decays to zero.
    pub window_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded battle policy from config");
                    config
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

        config.sanitized()
    }

    /// Clamp values that would break the engine's own invariants.
    fn sanitized(mut self) -> Self {
        if self.choice_slots > CHOICE_PALETTE.len() {
            warn!(
                requested = self.choice_slots,
                available = CHOICE_PALETTE.len(),
                "choice_slots exceeds the rendering palette; clamping"
            );
            self.choice_slots = CHOICE_PALETTE.len();
        }
        if self.min_rounds == 0 {
            warn!("min_rounds must be at least 1; clamping");
            self.min_rounds = 1;
        }
        if self.min_viable_groups == 0 {
            warn!("min_viable_groups must be at least 1; clamping");
            self.min_viable_groups = 1;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_students_per_group: DEFAULT_MIN_STUDENTS_PER_GROUP,
            max_students_per_group: DEFAULT_MAX_STUDENTS_PER_GROUP,
            max_groups: DEFAULT_MAX_GROUPS,
            min_rounds: DEFAULT_MIN_ROUNDS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            min_viable_groups: DEFAULT_MIN_VIABLE_GROUPS,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
            choice_slots: DEFAULT_CHOICE_SLOTS,
            default_round_seconds: None,
            speed_bonus: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
/// Every field is optional; omissions keep the baked-in default.
struct RawConfig {
    min_students_per_group: Option<usize>,
    max_students_per_group: Option<usize>,
    max_groups: Option<usize>,
    min_rounds: Option<usize>,
    max_rounds: Option<usize>,
    min_viable_groups: Option<usize>,
    points_per_correct: Option<u32>,
    choice_slots: Option<usize>,
    default_round_seconds: Option<u64>,
    speed_bonus: Option<SpeedBonus>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            min_students_per_group: raw
                .min_students_per_group
                .unwrap_or(defaults.min_students_per_group),
            max_students_per_group: raw
                .max_students_per_group
                .unwrap_or(defaults.max_students_per_group),
            max_groups: raw.max_groups.unwrap_or(defaults.max_groups),
            min_rounds: raw.min_rounds.unwrap_or(defaults.min_rounds),
            max_rounds: raw.max_rounds.unwrap_or(defaults.max_rounds),
            min_viable_groups: raw.min_viable_groups.unwrap_or(defaults.min_viable_groups),
            points_per_correct: raw.points_per_correct.unwrap_or(defaults.points_per_correct),
            choice_slots: raw.choice_slots.unwrap_or(defaults.choice_slots),
            default_round_seconds: raw.default_round_seconds,
            speed_bonus: raw.speed_bonus,
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
    fn defaults_match_policy_constants() {
        let config = AppConfig::default();
        assert_eq!(config.max_groups, 10);
        assert_eq!(config.min_rounds, 5);
        assert_eq!(config.max_rounds, 20);
        assert_eq!(config.points_per_correct, 100);
        assert!(config.speed_bonus.is_none());
    }

    #[test]
    fn raw_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"max_groups": 4}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.max_groups, 4);
        assert_eq!(config.min_students_per_group, 2);
        assert_eq!(config.points_per_correct, 100);
    }

    #[test]
    fn speed_bonus_is_parsed_when_explicitly_configured() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"speed_bonus": {"max_bonus": 50, "window_ms": 10000}}"#)
                .unwrap();
        let config: AppConfig = raw.into();
        let bonus = config.speed_bonus.unwrap();
        assert_eq!(bonus.max_bonus, 50);
        assert_eq!(bonus.window_ms, 10_000);
    }

    #[test]
    fn sanitize_clamps_choice_slots_to_palette() {
        let config = AppConfig {
            choice_slots: 12,
            ..AppConfig::default()
        }
        .sanitized();
        assert_eq!(config.choice_slots, CHOICE_PALETTE.len());
    }
}
