//! Engine configuration (tether.toml)
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! name = "game"
//! max_call_depth = 64
//! vector_growth = "append-only"
//! duplicate_subsystem = "reject"
//! contract_policy = "log-and-reject"
//! sweep_every_calls = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading engine options
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to read the options file
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse options: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize options: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Validation error
    #[error("Invalid options: {0}")]
    ValidationError(String),
}

/// What happens when a vector is written past its end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorGrowth {
    /// `set(len)` appends; anything further is `IndexOutOfRange`
    #[default]
    AppendOnly,
    /// Any `set(index >= len)` is `IndexOutOfRange`; only `push` grows
    Fixed,
}

/// What happens when a subsystem name is registered twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateSubsystem`
    #[default]
    Reject,
    /// Swap the whole function group in one step
    Replace,
}

/// How pin and handle contract violations are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractPolicy {
    /// Panic at the violation site
    Panic,
    /// Log at error level and return the error
    LogAndReject,
}

impl Default for ContractPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ContractPolicy::Panic
        } else {
            ContractPolicy::LogAndReject
        }
    }
}

/// Binding engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Label used in logs and diagnostic dumps
    pub name: String,

    /// Maximum nesting of native/script calls
    pub max_call_depth: usize,

    /// Vector out-of-bounds write policy
    pub vector_growth: VectorGrowth,

    /// Duplicate subsystem registration policy
    pub duplicate_subsystem: DuplicatePolicy,

    /// Contract violation reporting
    pub contract_policy: ContractPolicy,

    /// Run a collection sweep after this many completed outermost calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_every_calls: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            name: "tether".to_string(),
            max_call_depth: 200,
            vector_growth: VectorGrowth::default(),
            duplicate_subsystem: DuplicatePolicy::default(),
            contract_policy: ContractPolicy::default(),
            sweep_every_calls: None,
        }
    }
}

impl EngineOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let options: EngineOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize to a TOML string
    pub fn to_toml_string(&self) -> Result<String, OptionsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_call_depth == 0 {
            return Err(OptionsError::ValidationError(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.sweep_every_calls == Some(0) {
            return Err(OptionsError::ValidationError(
                "sweep_every_calls must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the engine label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reentrancy limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the vector growth policy
    pub fn with_vector_growth(mut self, growth: VectorGrowth) -> Self {
        self.vector_growth = growth;
        self
    }

    /// Set the duplicate subsystem policy
    pub fn with_duplicate_subsystem(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_subsystem = policy;
        self
    }

    /// Set the contract violation policy
    pub fn with_contract_policy(mut self, policy: ContractPolicy) -> Self {
        self.contract_policy = policy;
        self
    }

    /// Sweep automatically every `calls` outermost calls
    pub fn with_sweep_every_calls(mut self, calls: u32) -> Self {
        self.sweep_every_calls = Some(calls);
        self
    }
}
