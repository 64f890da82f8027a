//! Simulation and policy configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "num_pes": 4, "drrha": { "minimum_granularity": 0.5 } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::state::MipsShare;
use crate::error::{ConfigError, SchedError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrrhaConfig {
    /// Lower bound on every computed time slice, in seconds.
    pub minimum_granularity: f64,
}

impl Default for DrrhaConfig {
    fn default() -> Self {
        Self {
            minimum_granularity: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// PEs of the simulated VM.
    pub num_pes: usize,
    /// Speed of each PE.
    pub mips_per_pe: f64,
    /// Wake-up delays shorter than this are rounded up to it.
    pub min_time_between_events: f64,
    /// Upper bound on simulation steps before a run is abandoned.
    pub max_steps: u64,
    pub drrha: DrrhaConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_pes: 2,
            mips_per_pe: 1000.0,
            min_time_between_events: 0.01,
            max_steps: 1_000_000,
            drrha: DrrhaConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_pes == 0 {
            return Err(ConfigError::Invalid("num_pes must be at least 1".into()));
        }
        if !(self.mips_per_pe.is_finite() && self.mips_per_pe > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "mips_per_pe must be positive, got {}",
                self.mips_per_pe
            )));
        }
        if !(self.min_time_between_events.is_finite() && self.min_time_between_events > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_time_between_events must be positive, got {}",
                self.min_time_between_events
            )));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        let granularity = self.drrha.minimum_granularity;
        if !(granularity.is_finite() && granularity >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "minimum_granularity must be non-negative, got {granularity}"
            )));
        }
        Ok(())
    }

    pub fn share(&self) -> Result<MipsShare, SchedError> {
        MipsShare::new(self.num_pes, self.mips_per_pe)
    }
}
