//! Adapter construction
//!
//! Creation runs through fixed stages and reports each one to a progress
//! callback. A [`CreationToken`] lets the caller abandon a creation it no
//! longer wants; the factory then tears down whatever it built and never
//! records a half-finished lazy load.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::registration::{AdapterConstructor, AdapterSource};
use super::{AdapterRegistry, RegistryError};
use crate::adapter::{AdapterOptions, ManagedAdapter, RuntimeSettings, ViewType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationStage {
    Create,
    Load,
    Init,
    Configure,
    Ready,
}

impl CreationStage {
    pub fn percent(&self) -> u8 {
        match self {
            CreationStage::Create => 0,
            CreationStage::Load => 25,
            CreationStage::Init => 50,
            CreationStage::Configure => 75,
            CreationStage::Ready => 100,
        }
    }
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreationStage::Create => "create",
            CreationStage::Load => "load",
            CreationStage::Init => "init",
            CreationStage::Configure => "configure",
            CreationStage::Ready => "ready",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationProgress {
    pub view_type: ViewType,
    pub stage: CreationStage,
    pub percent: u8,
    pub message: String,
}

/// Shared flag saying whether the caller still wants the adapter
#[derive(Debug, Clone)]
pub struct CreationToken(Arc<AtomicBool>);

impl CreationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn abandon(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_wanted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CreationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Build, load and mount the adapter for `view_type`
    pub async fn create_adapter(
        &self,
        view_type: ViewType,
        options: AdapterOptions,
        settings: &RuntimeSettings,
        token: &CreationToken,
        mut progress: impl FnMut(CreationProgress),
    ) -> Result<ManagedAdapter, RegistryError> {
        let mut report = |stage: CreationStage, message: String| {
            debug!(%view_type, %stage, "adapter creation progress");
            progress(CreationProgress {
                view_type,
                stage,
                percent: stage.percent(),
                message,
            });
        };

        let registration = self
            .get(view_type)
            .ok_or(RegistryError::UnsupportedType(view_type))?;
        report(
            CreationStage::Create,
            format!("Creating {}", registration.name),
        );

        report(CreationStage::Load, format!("Loading {}", registration.name));
        let constructor = self.resolve_constructor(view_type, registration.source(), token).await?;

        report(CreationStage::Init, format!("Mounting {}", registration.name));
        let mut adapter = ManagedAdapter::new(constructor(), settings);
        adapter.create(options).await?;

        if !token.is_wanted() {
            debug!(%view_type, "creation abandoned after mount; tearing down");
            adapter.destroy();
            return Err(RegistryError::Cancelled(view_type));
        }

        report(
            CreationStage::Configure,
            format!("Configuring {}", registration.name),
        );
        debug!(%view_type, capabilities = ?adapter.capabilities(), "adapter configured");

        report(CreationStage::Ready, format!("{} ready", registration.name));
        info!(%view_type, name = %registration.name, "adapter created");
        Ok(adapter)
    }

    async fn resolve_constructor(
        &self,
        view_type: ViewType,
        source: &AdapterSource,
        token: &CreationToken,
    ) -> Result<AdapterConstructor, RegistryError> {
        let loader = match source {
            AdapterSource::Eager(constructor) => return Ok(Arc::clone(constructor)),
            AdapterSource::Lazy(loader) => loader,
        };

        if let Some(constructor) = self.loaded_constructor(view_type) {
            return Ok(constructor);
        }

        let constructor = loader().await.map_err(|e| match e {
            RegistryError::LoadFailed { .. } | RegistryError::Cancelled(_) => e,
            other => RegistryError::LoadFailed {
                view_type,
                message: other.to_string(),
            },
        });
        let constructor = match constructor {
            Ok(constructor) => constructor,
            Err(e) => {
                warn!(%view_type, error = %e, "backend load failed");
                return Err(e);
            }
        };

        // An abandoned load must not be recorded
        if !token.is_wanted() {
            debug!(%view_type, "creation abandoned during load");
            return Err(RegistryError::Cancelled(view_type));
        }

        self.mark_loaded(view_type, Arc::clone(&constructor));
        info!(%view_type, "backend loaded");
        Ok(constructor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterErrorKind, HeadlessAdapter, HeadlessStats, ViewAdapter};
    use crate::registry::AdapterRegistration;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn lazy_graph(loads: Arc<AtomicUsize>, gate: CreationToken) -> AdapterRegistration {
        AdapterRegistration::lazy(ViewType::Graph, "Graph", move || {
            let loads = Arc::clone(&loads);
            let gate = gate.clone();
            Box::pin(async move {
                tokio::task::yield_now().await;
                loads.fetch_add(1, Ordering::SeqCst);
                // Simulates the caller giving up while the backend loads
                gate.abandon();
                let ctor: AdapterConstructor = Arc::new(|| -> Box<dyn ViewAdapter> {
                    Box::new(HeadlessAdapter::new(ViewType::Graph))
                });
                Ok::<_, RegistryError>(ctor)
            })
        })
    }

    #[tokio::test]
    async fn test_eager_creation_reports_all_stages() {
        let registry = AdapterRegistry::builder()
            .register(AdapterRegistration::new(
                ViewType::RichText,
                "Rich Text",
                || -> Box<dyn ViewAdapter> { Box::new(HeadlessAdapter::new(ViewType::RichText)) },
            ))
            .build();

        let mut stages = Vec::new();
        let adapter = registry
            .create_adapter(
                ViewType::RichText,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &CreationToken::new(),
                |p| stages.push((p.stage, p.percent)),
            )
            .await
            .unwrap();

        assert!(adapter.is_ready());
        assert_eq!(
            stages,
            vec![
                (CreationStage::Create, 0),
                (CreationStage::Load, 25),
                (CreationStage::Init, 50),
                (CreationStage::Configure, 75),
                (CreationStage::Ready, 100),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let registry = AdapterRegistry::builder().build();
        let err = registry
            .create_adapter(
                ViewType::Table,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &CreationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedType(ViewType::Table)));
    }

    #[tokio::test]
    async fn test_lazy_load_recorded_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        // The loader abandons its own gate, not the tokens used below
        let registry = AdapterRegistry::builder()
            .register(lazy_graph(Arc::clone(&loads), CreationToken::new()))
            .build();
        assert!(!registry.is_loaded(ViewType::Graph));

        for _ in 0..2 {
            let mut adapter = registry
                .create_adapter(
                    ViewType::Graph,
                    AdapterOptions::new("main"),
                    &RuntimeSettings::default(),
                    &CreationToken::new(),
                    |_| {},
                )
                .await
                .unwrap();
            adapter.destroy();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded(ViewType::Graph));
        assert_eq!(registry.loaded_types(), vec![ViewType::Graph]);
    }

    #[tokio::test]
    async fn test_abandoned_load_not_recorded() {
        let loads = Arc::new(AtomicUsize::new(0));
        let token = CreationToken::new();
        let registry = AdapterRegistry::builder()
            .register(lazy_graph(Arc::clone(&loads), token.clone()))
            .build();

        let err = registry
            .create_adapter(
                ViewType::Graph,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &token,
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Cancelled(ViewType::Graph)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!registry.is_loaded(ViewType::Graph));
    }

    #[tokio::test]
    async fn test_abandoned_after_mount_is_torn_down() {
        let stats: Arc<Mutex<Option<Arc<HeadlessStats>>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&stats);
        let registry = AdapterRegistry::builder()
            .register(AdapterRegistration::new(
                ViewType::Table,
                "Table",
                move || -> Box<dyn ViewAdapter> {
                    let adapter = HeadlessAdapter::new(ViewType::Table);
                    *captured.lock().unwrap() = Some(adapter.stats());
                    Box::new(adapter)
                },
            ))
            .build();

        let token = CreationToken::new();
        let abandon = token.clone();
        let err = registry
            .create_adapter(
                ViewType::Table,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &token,
                move |p| {
                    if p.stage == CreationStage::Init {
                        abandon.abandon();
                    }
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Cancelled(ViewType::Table)));
        let stats = stats.lock().unwrap().clone().unwrap();
        assert_eq!(stats.creates(), 1);
        assert_eq!(stats.destroys(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_adapter_error() {
        let registry = AdapterRegistry::builder()
            .register(AdapterRegistration::new(
                ViewType::Canvas,
                "Canvas",
                || -> Box<dyn ViewAdapter> {
                    Box::new(HeadlessAdapter::new(ViewType::Canvas).fail_next("create", 10))
                },
            ))
            .build();

        let err = registry
            .create_adapter(
                ViewType::Canvas,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &CreationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();

        match err {
            RegistryError::Adapter(e) => assert_eq!(e.kind, AdapterErrorKind::Initialization),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_loader_failure() {
        let registry = AdapterRegistry::builder()
            .register(AdapterRegistration::lazy(ViewType::Timeline, "Timeline", || {
                Box::pin(async {
                    Err::<AdapterConstructor, _>(RegistryError::LoadFailed {
                        view_type: ViewType::Timeline,
                        message: "bundle missing".to_string(),
                    })
                })
            }))
            .build();

        let err = registry
            .create_adapter(
                ViewType::Timeline,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &CreationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::LoadFailed { .. }));
        assert!(!registry.is_loaded(ViewType::Timeline));
    }
}
