//! Index configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Largest worker count accepted for a dedicated pool.
pub const MAX_THREADS: usize = 1024;

/// Configuration for a bucketed index.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Number of workers for parallel passes (0 = shared rayon pool).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Lower-case identity keys.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub lowercase_keys: bool,

    /// Key machines by name alone and sort machine-name-first.
    ///
    /// When disabled, machine keys are prefixed with the zero-padded source
    /// priority so identically named machines from different catalogs stay
    /// apart.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub rename_aware: bool,
}

fn default_true() -> bool {
    true
}

fn check_threads(threads: usize) -> Result<(), String> {
    if threads > MAX_THREADS {
        return Err(format!(
            "threads must be at most {MAX_THREADS}, got {threads}"
        ));
    }
    Ok(())
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        self.threads.map_or(Ok(()), check_threads)
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Check the config for values the builder would reject.
    pub fn validate(&self) -> Result<(), String> {
        check_threads(self.threads)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            lowercase_keys: true,
            rename_aware: true,
        }
    }
}
