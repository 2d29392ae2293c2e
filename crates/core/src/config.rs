#![forbid(unsafe_code)]

use crate::ids::{MAX_SUFFIX_LEN, is_id_char};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Limits and policy knobs for closure tracking and upstream propagation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Known-downstream seed bound for structural roots; non-roots get half.
    pub board_limit: usize,
    pub discovery_batch_size: usize,
    /// Far (beyond two levels) descendants kept before the closure is truncated.
    pub far_board_limit: usize,
    pub truncation_suffix: String,
    /// Button labels whose links never become edges (compared case-insensitively).
    pub excluded_link_labels: Vec<String>,
    pub default_delay_secs: i64,
    pub long_wait_secs: i64,
    pub extended_delay_secs: i64,
    pub touch_limit: usize,
    pub touch_limit_under_pressure: usize,
    pub strict_depth: u32,
    pub sync_recursion_depth: u32,
    pub max_depth: u32,
    pub heavy_pressure_fanout: usize,
    pub revision_hash_len: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            board_limit: 500,
            discovery_batch_size: 50,
            far_board_limit: 300,
            truncation_suffix: "_trunc".to_string(),
            excluded_link_labels: vec!["home".to_string(), "top board".to_string()],
            default_delay_secs: 30,
            long_wait_secs: 300,
            extended_delay_secs: 600,
            touch_limit: 200,
            touch_limit_under_pressure: 50,
            strict_depth: 5,
            sync_recursion_depth: 8,
            max_depth: 10,
            heavy_pressure_fanout: 3,
            revision_hash_len: 10,
        }
    }
}

impl TrackingConfig {
    pub fn seed_limit(&self, is_root: bool) -> usize {
        if is_root {
            self.board_limit
        } else {
            self.board_limit / 2
        }
    }

    /// Hard cap on boards fetched by one discovery pass.
    pub fn visited_ceiling(&self, is_root: bool) -> usize {
        let seed = self.seed_limit(is_root);
        seed + seed / 2
    }

    pub fn is_excluded_label(&self, label: &str) -> bool {
        let label = label.trim();
        self.excluded_link_labels
            .iter()
            .any(|excluded| excluded.trim().eq_ignore_ascii_case(label))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_limit < 2 {
            return Err(ConfigError::Invalid("board_limit must be at least 2"));
        }
        if self.discovery_batch_size == 0 {
            return Err(ConfigError::Invalid("discovery_batch_size must be positive"));
        }
        if self.truncation_suffix.is_empty() || self.truncation_suffix.len() > MAX_SUFFIX_LEN {
            return Err(ConfigError::Invalid("truncation_suffix length out of range"));
        }
        if !self.truncation_suffix.chars().all(is_id_char) {
            return Err(ConfigError::Invalid(
                "truncation_suffix must only use board id characters",
            ));
        }
        if self.default_delay_secs < 0 || self.extended_delay_secs < 0 || self.long_wait_secs < 0
        {
            return Err(ConfigError::Invalid("delays must not be negative"));
        }
        if !(self.strict_depth <= self.sync_recursion_depth
            && self.sync_recursion_depth <= self.max_depth)
        {
            return Err(ConfigError::Invalid(
                "expected strict_depth <= sync_recursion_depth <= max_depth",
            ));
        }
        if self.revision_hash_len == 0 || self.revision_hash_len > 64 {
            return Err(ConfigError::Invalid("revision_hash_len must be within 1..=64"));
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
