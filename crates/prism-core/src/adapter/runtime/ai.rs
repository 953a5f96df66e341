//! AI capability shim
//!
//! Delegates AI requests to an [`AiProvider`] with a deadline and a
//! single-flight guard: while one request is in flight, further requests
//! are rejected immediately rather than queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::adapter::contract::AiProvider;

/// Why an AI request did not produce a result
#[derive(Debug, Error)]
pub enum AiError {
    #[error("No AI provider is configured")]
    NoProvider,

    #[error("Another AI request is already in progress")]
    Busy,

    #[error("AI {operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("AI {operation} failed: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },
}

/// Clears the processing flag when the request ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AiShim {
    provider: Option<Arc<dyn AiProvider>>,
    timeout: Duration,
    processing: AtomicBool,
}

impl std::fmt::Debug for AiShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiShim")
            .field("provider", &self.provider.is_some())
            .field("timeout", &self.timeout)
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl AiShim {
    pub fn new(provider: Option<Arc<dyn AiProvider>>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            processing: AtomicBool::new(false),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Whether a request is currently in flight
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn request_completion(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<String, AiError> {
        let provider = self.provider()?;
        let _guard = self.acquire()?;
        self.deadline("completion", provider.complete(prompt, context))
            .await
    }

    pub async fn request_rewrite(&self, text: &str, instruction: &str) -> Result<String, AiError> {
        let provider = self.provider()?;
        let _guard = self.acquire()?;
        self.deadline("rewrite", provider.rewrite(text, instruction))
            .await
    }

    pub async fn request_suggestions(&self, context: &str) -> Result<Vec<String>, AiError> {
        let provider = self.provider()?;
        let _guard = self.acquire()?;
        self.deadline("suggestions", provider.suggestions(context))
            .await
    }

    fn provider(&self) -> Result<Arc<dyn AiProvider>, AiError> {
        self.provider.clone().ok_or(AiError::NoProvider)
    }

    fn acquire(&self) -> Result<InFlight<'_>, AiError> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.processing))
            .map_err(|_| {
                debug!("rejecting concurrent AI request");
                AiError::Busy
            })
    }

    async fn deadline<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, AiError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, "AI provider error: {:#}", e);
                Err(AiError::Provider {
                    operation,
                    message: format!("{:#}", e),
                })
            }
            Err(_) => {
                warn!(operation, timeout_secs = self.timeout.as_secs(), "AI request timed out");
                Err(AiError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}
