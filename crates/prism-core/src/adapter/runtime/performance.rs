//! Performance sampling and health scoring

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::PerformanceConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Which adapter call a sample measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Render,
    Update,
}

/// One timed adapter call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub kind: SampleKind,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    pub slow: bool,
    pub timestamp: DateTime<Utc>,
}

/// Running timer returned by [`PerformanceMonitor::start`]
#[derive(Debug)]
pub struct OperationTimer {
    kind: SampleKind,
    started: Instant,
}

/// Summary figures over the sample window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub sample_count: usize,
    pub average_render_ms: Option<f64>,
    pub average_update_ms: Option<f64>,
    pub max_render_ms: Option<f64>,
    pub memory_mb: Option<f64>,
    pub slow_operations: usize,
    pub operations: u64,
    pub errors: u64,
    pub error_rate: f64,
}

/// Result of [`PerformanceMonitor::health_check`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub metrics: PerformanceMetrics,
    /// 0 (unusable) to 100 (no issues)
    pub score: u8,
}

/// Bounded ring buffer of timing samples plus error counters
#[derive(Debug)]
pub struct PerformanceMonitor {
    samples: VecDeque<PerformanceSample>,
    config: PerformanceConfig,
    operations: u64,
    errors: u64,
}

impl PerformanceMonitor {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.sample_capacity),
            config,
            operations: 0,
            errors: 0,
        }
    }

    pub fn start(&self, kind: SampleKind) -> OperationTimer {
        OperationTimer {
            kind,
            started: Instant::now(),
        }
    }

    /// Stop a timer and record its sample; returns whether it was slow
    pub fn finish(&mut self, timer: OperationTimer, memory_bytes: Option<u64>) -> bool {
        self.record(timer.kind, timer.started.elapsed(), memory_bytes)
    }

    /// Record a sample directly; returns whether it was slow
    pub fn record(
        &mut self,
        kind: SampleKind,
        duration: Duration,
        memory_bytes: Option<u64>,
    ) -> bool {
        let slow = duration > Duration::from_millis(self.config.slow_operation_ms);
        if slow {
            debug!(?kind, ms = duration.as_millis() as u64, "slow adapter operation");
        }

        if self.samples.len() >= self.config.sample_capacity.max(1) {
            self.samples.pop_front();
        }
        self.samples.push_back(PerformanceSample {
            kind,
            duration_ms: duration.as_micros() as f64 / 1000.0,
            memory_bytes,
            slow,
            timestamp: Utc::now(),
        });
        slow
    }

    /// Count a guarded adapter call, successful or not
    pub fn record_operation(&mut self) {
        self.operations += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn samples(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.samples.iter()
    }

    pub fn error_rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.errors as f64 / self.operations as f64
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let durations = |kind: SampleKind| {
            self.samples
                .iter()
                .filter(move |s| s.kind == kind)
                .map(|s| s.duration_ms)
        };
        let average = |kind: SampleKind| {
            let (sum, count) = durations(kind).fold((0.0, 0usize), |(s, c), d| (s + d, c + 1));
            (count > 0).then(|| sum / count as f64)
        };

        PerformanceMetrics {
            sample_count: self.samples.len(),
            average_render_ms: average(SampleKind::Render),
            average_update_ms: average(SampleKind::Update),
            max_render_ms: durations(SampleKind::Render).reduce(f64::max),
            memory_mb: self
                .samples
                .iter()
                .rev()
                .find_map(|s| s.memory_bytes)
                .map(|b| b as f64 / BYTES_PER_MB),
            slow_operations: self.samples.iter().filter(|s| s.slow).count(),
            operations: self.operations,
            errors: self.errors,
            error_rate: self.error_rate(),
        }
    }

    /// Score the adapter against the configured thresholds
    pub fn health_check(&self) -> HealthReport {
        let metrics = self.metrics();
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        let mut penalty: u32 = 0;

        if let Some(avg) = metrics.average_render_ms {
            if avg > self.config.max_average_render_ms as f64 {
                issues.push(format!(
                    "Average render time {:.1}ms exceeds {}ms",
                    avg, self.config.max_average_render_ms
                ));
                recommendations.push(
                    "Render incrementally with add/update/remove instead of full renders"
                        .to_string(),
                );
                penalty += 30;
            }
        }

        if let Some(mb) = metrics.memory_mb {
            if mb > self.config.max_memory_mb as f64 {
                issues.push(format!(
                    "Memory usage {:.1}MB exceeds {}MB",
                    mb, self.config.max_memory_mb
                ));
                recommendations.push("Clear render caches or virtualize large documents".to_string());
                penalty += 30;
            }
        }

        if metrics.error_rate > self.config.max_error_rate {
            issues.push(format!(
                "Error rate {:.1}% exceeds {:.1}%",
                metrics.error_rate * 100.0,
                self.config.max_error_rate * 100.0
            ));
            recommendations.push("Inspect the adapter error log for repeated failures".to_string());
            penalty += 40;
        }

        if metrics.slow_operations > 0 && metrics.sample_count > 0 {
            let share = metrics.slow_operations as f64 / metrics.sample_count as f64;
            penalty += (share * 20.0).round() as u32;
        }

        HealthReport {
            healthy: issues.is_empty(),
            issues,
            recommendations,
            metrics,
            score: 100u32.saturating_sub(penalty) as u8,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.operations = 0;
        self.errors = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(PerformanceConfig::default())
    }

    #[test]
    fn test_fresh_monitor_is_healthy() {
        let report = monitor().health_check();
        assert!(report.healthy);
        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
        assert_eq!(report.metrics.sample_count, 0);
    }

    #[test]
    fn test_slow_flag() {
        let mut monitor = monitor();
        assert!(!monitor.record(SampleKind::Render, Duration::from_millis(20), None));
        assert!(monitor.record(SampleKind::Render, Duration::from_millis(150), None));
        assert_eq!(monitor.metrics().slow_operations, 1);
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let mut monitor = PerformanceMonitor::new(PerformanceConfig {
            sample_capacity: 4,
            ..PerformanceConfig::default()
        });
        for i in 0..10 {
            monitor.record(SampleKind::Update, Duration::from_millis(i), None);
        }
        assert_eq!(monitor.samples().count(), 4);
        assert_eq!(monitor.samples().next().unwrap().duration_ms, 6.0);
    }

    #[test]
    fn test_slow_renders_are_unhealthy() {
        let mut monitor = monitor();
        for _ in 0..5 {
            monitor.record(SampleKind::Render, Duration::from_millis(80), None);
        }
        let report = monitor.health_check();
        assert!(!report.healthy);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("render"));
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.score, 70);
        assert_eq!(report.metrics.average_render_ms, Some(80.0));
    }

    #[test]
    fn test_memory_threshold() {
        let mut monitor = monitor();
        monitor.record(
            SampleKind::Render,
            Duration::from_millis(1),
            Some(200 * 1024 * 1024),
        );
        let report = monitor.health_check();
        assert!(!report.healthy);
        assert!(report.issues[0].contains("Memory"));
        assert_eq!(report.metrics.memory_mb, Some(200.0));
    }

    #[test]
    fn test_error_rate_threshold() {
        let mut monitor = monitor();
        for _ in 0..10 {
            monitor.record_operation();
        }
        monitor.record_error();
        assert!((monitor.error_rate() - 0.1).abs() < f64::EPSILON);

        let report = monitor.health_check();
        assert!(!report.healthy);
        assert_eq!(report.score, 60);

        monitor.reset();
        assert!(monitor.health_check().healthy);
    }

    #[test]
    fn test_timer_records_sample() {
        let mut monitor = monitor();
        let timer = monitor.start(SampleKind::Update);
        monitor.finish(timer, Some(1024));
        let sample = monitor.samples().next().unwrap();
        assert_eq!(sample.kind, SampleKind::Update);
        assert_eq!(sample.memory_bytes, Some(1024));
    }
}
