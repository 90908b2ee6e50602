//! # Kernel Configuration
//!
//! Session settings loaded from TOML. Every field has a default, so an
//! empty file is a valid config.
//!
//! ```toml
//! root_seed = 42
//! tick_budget = 512
//! carryover_capacity = 1024
//! strict_phase_balance = true
//! stride_salt = 0
//!
//! [replay]
//! enabled = true
//! record_probes = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Replay recording settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Attach a fresh replay stream when the driver is built.
    pub enabled: bool,
    /// Record diagnostic probe samples.
    pub record_probes: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            record_probes: false,
        }
    }
}

/// Settings for one deterministic session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Seed for every RNG stream of the session.
    pub root_seed: u32,
    /// Cost units applied per tick. Work past the budget is carried over.
    pub tick_budget: u32,
    /// Maximum work items carried into the next tick.
    pub carryover_capacity: usize,
    /// Fail the tick on unbalanced phase counters instead of warning.
    pub strict_phase_balance: bool,
    /// Salt for stride decimation (zero = unsalted).
    pub stride_salt: u64,
    /// Replay settings.
    pub replay: ReplayConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            root_seed: 1,
            tick_budget: 1024,
            carryover_capacity: 4096,
            strict_phase_balance: true,
            stride_salt: 0,
            replay: ReplayConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for bad TOML or unknown fields,
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            root_seed = config.root_seed,
            tick_budget = config.tick_budget,
            "loaded kernel config"
        );
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_budget == 0 {
            return Err(ConfigError::Invalid("tick_budget must be non-zero"));
        }
        if self.carryover_capacity == 0 {
            return Err(ConfigError::Invalid("carryover_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Sets the root seed.
    #[must_use]
    pub fn with_root_seed(mut self, root_seed: u32) -> Self {
        self.root_seed = root_seed;
        self
    }

    /// Sets the per-tick budget.
    #[must_use]
    pub fn with_tick_budget(mut self, tick_budget: u32) -> Self {
        self.tick_budget = tick_budget;
        self
    }

    /// Sets the carryover capacity.
    #[must_use]
    pub fn with_carryover_capacity(mut self, capacity: usize) -> Self {
        self.carryover_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.root_seed, 1);
        assert!(config.replay.enabled);
    }

    #[test]
    fn test_full_document() {
        let config = KernelConfig::from_toml_str(
            r#"
            root_seed = 42
            tick_budget = 16
            carryover_capacity = 8
            strict_phase_balance = false
            stride_salt = 99

            [replay]
            enabled = false
            record_probes = true
            "#,
        )
        .unwrap();
        assert_eq!(config.root_seed, 42);
        assert_eq!(config.tick_budget, 16);
        assert_eq!(config.carryover_capacity, 8);
        assert!(!config.strict_phase_balance);
        assert_eq!(config.stride_salt, 99);
        assert_eq!(
            config.replay,
            ReplayConfig {
                enabled: false,
                record_probes: true
            }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            KernelConfig::from_toml_str("tick_budget = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            KernelConfig::from_toml_str("carryover_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            KernelConfig::from_toml_str("tick_budgett = 5"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            KernelConfig::from_toml_str("root_seed = -1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = KernelConfig::load("/definitely/not/here/tessera.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
