//! Workflow configuration
//!
//! Loaded from TOML; every field has a default so partial files work:
//!
//! ```toml
//! max_iterations = 5
//! generation_concurrency = 4
//!
//! [validator]
//! xy_proximity = 150.0
//! ```

use crate::error::ConfigError;
use cadloop_guard::GuardConfig;
use cadloop_plan::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Iteration ceiling; reaching it forces a pass
    pub max_iterations: u32,
    /// Budget for planning, part-code and inspection calls
    pub service_timeout_secs: u64,
    /// Budget for one render
    pub render_timeout_secs: u64,
    /// Part-code calls in flight at once
    pub generation_concurrency: usize,
    /// Treat graph issues as a failed iteration
    pub strict_graph: bool,
    /// Rendered artifacts remembered by fingerprint
    pub render_cache_capacity: u64,
    /// Directory written into the export block
    pub output_dir: String,
    /// Plan validator thresholds
    pub validator: ValidatorConfig,
    /// Diff guard tuning
    pub guard: GuardConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            service_timeout_secs: 120,
            render_timeout_secs: 300,
            generation_concurrency: 1,
            strict_graph: false,
            render_cache_capacity: 64,
            output_dir: "output".to_string(),
            validator: ValidatorConfig::default(),
            guard: GuardConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With iteration ceiling
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// With service call timeout
    #[inline]
    #[must_use]
    pub fn with_service_timeout_secs(mut self, secs: u64) -> Self {
        self.service_timeout_secs = secs;
        self
    }

    /// With render timeout
    #[inline]
    #[must_use]
    pub fn with_render_timeout_secs(mut self, secs: u64) -> Self {
        self.render_timeout_secs = secs;
        self
    }

    /// With part generation concurrency
    #[inline]
    #[must_use]
    pub fn with_generation_concurrency(mut self, n: usize) -> Self {
        self.generation_concurrency = n;
        self
    }

    /// With strict graph handling
    #[inline]
    #[must_use]
    pub fn with_strict_graph(mut self, strict: bool) -> Self {
        self.strict_graph = strict;
        self
    }

    /// With render cache capacity
    #[inline]
    #[must_use]
    pub fn with_render_cache_capacity(mut self, capacity: u64) -> Self {
        self.render_cache_capacity = capacity;
        self
    }

    /// With export directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// With validator thresholds
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    /// Service call budget
    #[inline]
    #[must_use]
    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    /// Render budget
    #[inline]
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if rendering fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.max_iterations < 1 {
            return invalid("max_iterations", "must be at least 1");
        }
        if self.generation_concurrency < 1 {
            return invalid("generation_concurrency", "must be at least 1");
        }
        if self.service_timeout_secs == 0 {
            return invalid("service_timeout_secs", "must be positive");
        }
        if self.render_timeout_secs == 0 {
            return invalid("render_timeout_secs", "must be positive");
        }
        if !self.validator.ground_height.is_finite() {
            return invalid("validator.ground_height", "must be a finite number");
        }
        if !self.validator.xy_proximity.is_finite() || self.validator.xy_proximity <= 0.0 {
            return invalid("validator.xy_proximity", "must be positive and finite");
        }
        if !self.validator.max_dimension.is_finite() || self.validator.max_dimension <= 0.0 {
            return invalid("validator.max_dimension", "must be positive and finite");
        }
        if self.output_dir.trim().is_empty() {
            return invalid("output_dir", "must not be empty");
        }
        Ok(())
    }
}
