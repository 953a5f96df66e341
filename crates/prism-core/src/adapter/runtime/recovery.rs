//! Error classification and bounded recovery

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::error::{AdapterError, AdapterErrorKind, Severity};

/// Recovery attempts allowed per error instance
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Errors kept in the log before the oldest are dropped
pub const DEFAULT_ERROR_LOG_SIZE: usize = 100;

/// Local remedy applied before retrying a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    /// Tear down and mount the adapter again
    Reinitialize,
    /// Render the last good document from scratch
    ForceRerender,
    /// Drop render caches
    ClearCaches,
    /// Reset pointer and keyboard interaction flags
    ResetInteraction,
    /// Retry without any remedy
    Retry,
}

impl RecoveryStrategy {
    pub fn for_kind(kind: AdapterErrorKind) -> Self {
        match kind {
            AdapterErrorKind::Initialization => RecoveryStrategy::Reinitialize,
            AdapterErrorKind::Rendering => RecoveryStrategy::ForceRerender,
            AdapterErrorKind::Memory => RecoveryStrategy::ClearCaches,
            AdapterErrorKind::UserInteraction => RecoveryStrategy::ResetInteraction,
            AdapterErrorKind::Network | AdapterErrorKind::Unknown => RecoveryStrategy::Retry,
        }
    }
}

/// What the caller should do with a failure
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryDecision {
    /// Apply the strategy, then retry the operation
    Recover(RecoveryStrategy),
    /// Surface the error to the host. `mitigation` is still worth applying
    /// (e.g. dropping caches after a memory error) but must not be
    /// followed by a retry.
    Propagate {
        mitigation: Option<RecoveryStrategy>,
    },
}

/// Aggregate error counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: usize,
    pub recovered: usize,
    pub propagated: usize,
    pub by_kind: BTreeMap<AdapterErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// Classifies failures, picks recovery strategies and keeps an error log
#[derive(Debug)]
pub struct ErrorHandler {
    log: VecDeque<AdapterError>,
    capacity: usize,
    stats: ErrorStats,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_SIZE)
    }
}

impl ErrorHandler {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: VecDeque::with_capacity(capacity.min(DEFAULT_ERROR_LOG_SIZE)),
            capacity: capacity.max(1),
            stats: ErrorStats::default(),
        }
    }

    /// Record a failure and decide how to handle it
    ///
    /// `error.attempts` is the number of recoveries already spent on this
    /// error instance.
    pub fn handle(&mut self, error: &AdapterError) -> RecoveryDecision {
        self.record(error);

        let strategy = RecoveryStrategy::for_kind(error.kind);
        if !error.recoverable {
            warn!(
                kind = %error.kind,
                severity = ?error.severity,
                operation = %error.operation,
                "non-recoverable adapter error: {}",
                error.message
            );
            self.stats.propagated += 1;
            return RecoveryDecision::Propagate {
                mitigation: (error.kind == AdapterErrorKind::Memory).then_some(strategy),
            };
        }

        if error.attempts >= MAX_RETRY_ATTEMPTS {
            warn!(
                operation = %error.operation,
                attempts = error.attempts,
                "giving up on adapter error: {}",
                error.message
            );
            self.stats.propagated += 1;
            return RecoveryDecision::Propagate { mitigation: None };
        }

        debug!(
            operation = %error.operation,
            attempt = error.attempts + 1,
            ?strategy,
            "attempting adapter recovery"
        );
        RecoveryDecision::Recover(strategy)
    }

    /// Note that a recovery attempt succeeded
    pub fn mark_recovered(&mut self) {
        self.stats.recovered += 1;
    }

    /// Note that an error handed a recovery strategy was surfaced instead
    pub fn mark_propagated(&mut self) {
        self.stats.propagated += 1;
    }

    /// Record an error that is reported without recovery
    pub fn report(&mut self, error: &AdapterError) {
        self.record(error);
        self.stats.propagated += 1;
    }

    fn record(&mut self, error: &AdapterError) {
        if self.log.len() == self.capacity {
            self.log.pop_front();
        }
        self.log.push_back(error.clone());

        self.stats.total += 1;
        *self.stats.by_kind.entry(error.kind).or_default() += 1;
        *self.stats.by_severity.entry(error.severity).or_default() += 1;
    }

    /// Logged errors, oldest first
    pub fn log(&self) -> impl Iterator<Item = &AdapterError> {
        self.log.iter()
    }

    pub fn last_error(&self) -> Option<&AdapterError> {
        self.log.back()
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.log.clear();
        self.stats = ErrorStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_per_kind() {
        assert_eq!(
            RecoveryStrategy::for_kind(AdapterErrorKind::Initialization),
            RecoveryStrategy::Reinitialize
        );
        assert_eq!(
            RecoveryStrategy::for_kind(AdapterErrorKind::Rendering),
            RecoveryStrategy::ForceRerender
        );
        assert_eq!(
            RecoveryStrategy::for_kind(AdapterErrorKind::UserInteraction),
            RecoveryStrategy::ResetInteraction
        );
        assert_eq!(
            RecoveryStrategy::for_kind(AdapterErrorKind::Network),
            RecoveryStrategy::Retry
        );
    }

    #[test]
    fn test_recover_until_retry_cap() {
        let mut handler = ErrorHandler::default();
        let mut error = AdapterError::new("render", "flaky");

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            error.attempts = attempt;
            assert_eq!(
                handler.handle(&error),
                RecoveryDecision::Recover(RecoveryStrategy::ForceRerender)
            );
        }

        error.attempts = MAX_RETRY_ATTEMPTS;
        assert_eq!(
            handler.handle(&error),
            RecoveryDecision::Propagate { mitigation: None }
        );
        assert_eq!(handler.stats().total, 4);
        assert_eq!(handler.stats().propagated, 1);
    }

    #[test]
    fn test_memory_errors_propagate_with_mitigation() {
        let mut handler = ErrorHandler::default();
        let error = AdapterError::new("alloc_texture", "out of memory");

        assert_eq!(
            handler.handle(&error),
            RecoveryDecision::Propagate {
                mitigation: Some(RecoveryStrategy::ClearCaches)
            }
        );
    }

    #[test]
    fn test_critical_errors_propagate() {
        let mut handler = ErrorHandler::default();
        let error = AdapterError::new("render", "context lost").with_severity(Severity::Critical);

        assert_eq!(
            handler.handle(&error),
            RecoveryDecision::Propagate { mitigation: None }
        );
        assert_eq!(handler.stats().by_severity[&Severity::Critical], 1);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut handler = ErrorHandler::new(3);
        for i in 0..5 {
            handler.report(&AdapterError::new("focus", format!("e{}", i)));
        }

        let messages: Vec<_> = handler.log().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["e2", "e3", "e4"]);
        assert_eq!(handler.last_error().unwrap().message, "e4");
        assert_eq!(handler.stats().total, 5);
        assert_eq!(
            handler.stats().by_kind[&AdapterErrorKind::UserInteraction],
            5
        );

        handler.clear();
        assert_eq!(handler.log().count(), 0);
        assert_eq!(handler.stats().total, 0);
    }
}
