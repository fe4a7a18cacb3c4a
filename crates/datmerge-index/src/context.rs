//! Execution context owned by one index: worker pool, log span, cancellation.

use std::sync::Arc;

use datmerge_core::{IndexConfig, IndexError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Per-index execution context.
///
/// Passes run on the dedicated pool when `threads > 0`, otherwise on the
/// global rayon pool. Cancellation is checked before each bucket.
#[derive(Debug, Clone)]
pub struct IndexContext {
    config: IndexConfig,
    pool: Option<Arc<ThreadPool>>,
    span: Span,
    cancel: CancellationToken,
}

impl IndexContext {
    /// Build a context from a config, creating a worker pool if requested.
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate().map_err(IndexError::invalid_config)?;

        let pool = match config.threads {
            0 => None,
            n => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("datmerge-{i}"))
                    .build()
                    .map_err(|e| IndexError::ThreadPool {
                        message: e.to_string(),
                    })?,
            )),
        };

        Ok(Self {
            config,
            pool,
            span: Span::none(),
            cancel: CancellationToken::new(),
        })
    }

    /// Attach the span every pass is logged under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Token that cancels passes running under this context.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `op` once per key in parallel.
    ///
    /// Keys already started finish; remaining keys are skipped once the token
    /// fires, and the call reports [`IndexError::Cancelled`].
    pub(crate) fn for_each_key<F>(&self, keys: &[String], op: F) -> Result<(), IndexError>
    where
        F: Fn(&str) + Sync + Send,
    {
        let run = || {
            keys.par_iter().for_each(|key| {
                if !self.cancel.is_cancelled() {
                    op(key.as_str());
                }
            });
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }

        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        Ok(())
    }
}

impl Default for IndexContext {
    fn default() -> Self {
        Self {
            config: IndexConfig::default(),
            pool: None,
            span: Span::none(),
            cancel: CancellationToken::new(),
        }
    }
}
