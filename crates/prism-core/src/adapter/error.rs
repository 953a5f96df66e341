//! Classified adapter errors
//!
//! Every adapter failure carries a kind inferred from the name of the
//! operation that failed, plus a severity. Kind and severity decide whether
//! the runtime may attempt local recovery or must surface the error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::types::ViewType;

/// Where an adapter failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterErrorKind {
    Initialization,
    Rendering,
    UserInteraction,
    Memory,
    Network,
    Unknown,
}

impl AdapterErrorKind {
    /// Infer the kind from an operation name such as `render`,
    /// `set_selection` or `requestAiCompletion`
    pub fn from_operation(operation: &str) -> Self {
        const RULES: &[(&[&str], AdapterErrorKind)] = &[
            (&["memory", "cache", "alloc", "oom"], AdapterErrorKind::Memory),
            (
                &["init", "create", "load", "mount", "setup"],
                AdapterErrorKind::Initialization,
            ),
            (
                &["render", "update", "draw", "layout", "paint", "add", "remove"],
                AdapterErrorKind::Rendering,
            ),
            (
                &["fetch", "network", "request", "ai", "http", "timeout"],
                AdapterErrorKind::Network,
            ),
            (
                &[
                    "click", "select", "drag", "focus", "blur", "viewport", "input", "key",
                    "pointer", "zoom",
                ],
                AdapterErrorKind::UserInteraction,
            ),
        ];

        let tokens = tokenize(operation);
        RULES
            .iter()
            .find(|(prefixes, _)| {
                tokens
                    .iter()
                    .any(|token| prefixes.iter().any(|p| token.starts_with(p)))
            })
            .map(|(_, kind)| *kind)
            .unwrap_or(AdapterErrorKind::Unknown)
    }

    /// Severity assigned when none is given explicitly
    pub fn default_severity(&self) -> Severity {
        match self {
            AdapterErrorKind::Initialization => Severity::High,
            AdapterErrorKind::Rendering => Severity::Medium,
            AdapterErrorKind::UserInteraction => Severity::Low,
            AdapterErrorKind::Memory => Severity::Critical,
            AdapterErrorKind::Network => Severity::Medium,
            AdapterErrorKind::Unknown => Severity::Medium,
        }
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterErrorKind::Initialization => "initialization",
            AdapterErrorKind::Rendering => "rendering",
            AdapterErrorKind::UserInteraction => "user-interaction",
            AdapterErrorKind::Memory => "memory",
            AdapterErrorKind::Network => "network",
            AdapterErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// How bad an adapter failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A classified adapter failure
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} error in '{operation}': {message}")]
pub struct AdapterError {
    pub id: String,
    pub kind: AdapterErrorKind,
    pub severity: Severity,
    pub operation: String,
    pub message: String,
    pub recoverable: bool,
    /// Recovery attempts already spent on this error
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<ViewType>,
}

impl AdapterError {
    /// Create an error, classifying it from the operation name
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        let operation = operation.into();
        let kind = AdapterErrorKind::from_operation(&operation);
        Self::with_kind(kind, operation, message)
    }

    /// Create an error with an explicit kind
    pub fn with_kind(
        kind: AdapterErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let severity = kind.default_severity();
        Self {
            id: format!("err-{}", Uuid::new_v4()),
            kind,
            severity,
            operation: operation.into(),
            message: message.into(),
            recoverable: is_recoverable(kind, severity),
            attempts: 0,
            timestamp: Utc::now(),
            view_type: None,
        }
    }

    /// Override the severity; recoverability follows
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self.recoverable = is_recoverable(self.kind, severity);
        self
    }

    pub fn for_view(mut self, view_type: ViewType) -> Self {
        self.view_type = Some(view_type);
        self
    }

    /// Report of a call made on an adapter that is not live
    pub fn not_ready(operation: &str, state: impl fmt::Display) -> Self {
        Self::new(
            operation,
            format!("adapter is {}; '{}' was ignored", state, operation),
        )
        .with_severity(Severity::Low)
    }
}

fn is_recoverable(kind: AdapterErrorKind, severity: Severity) -> bool {
    kind != AdapterErrorKind::Memory && severity != Severity::Critical
}

/// Split `set_selection`, `request-ai` or `requestAiCompletion` into
/// lowercase words
fn tokenize(operation: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in operation.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
