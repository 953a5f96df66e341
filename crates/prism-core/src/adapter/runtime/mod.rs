//! Cross-cutting adapter behaviors
//!
//! These pieces are composed onto any [`ViewAdapter`](super::ViewAdapter)
//! by [`ManagedAdapter`](super::ManagedAdapter):
//!
//! - [`ErrorHandler`]: classification, bounded recovery, error log
//! - [`PerformanceMonitor`]: timing samples and health scoring
//! - [`AiShim`]: AI delegation with timeout and single-flight guard

pub mod ai;
pub mod performance;
pub mod recovery;

use std::sync::Arc;
use std::time::Duration;

pub use ai::{AiError, AiShim};
pub use performance::{
    HealthReport, PerformanceMetrics, PerformanceMonitor, PerformanceSample, SampleKind,
};
pub use recovery::{
    ErrorHandler, ErrorStats, RecoveryDecision, RecoveryStrategy, MAX_RETRY_ATTEMPTS,
};

use super::contract::AiProvider;
use crate::config::{Config, PerformanceConfig};

/// Settings used to build the runtime around an adapter
#[derive(Clone)]
pub struct RuntimeSettings {
    pub performance: PerformanceConfig,
    pub ai_timeout: Duration,
    pub ai_provider: Option<Arc<dyn AiProvider>>,
    pub error_log_size: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            performance: config.performance.clone(),
            ai_timeout: config.ai.timeout(),
            ai_provider: None,
            error_log_size: recovery::DEFAULT_ERROR_LOG_SIZE,
        }
    }

    pub fn with_ai_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }
}

impl std::fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("performance", &self.performance)
            .field("ai_timeout", &self.ai_timeout)
            .field("ai_provider", &self.ai_provider.is_some())
            .field("error_log_size", &self.error_log_size)
            .finish()
    }
}
