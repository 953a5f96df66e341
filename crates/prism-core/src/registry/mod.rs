//! Adapter registry and factory
//!
//! The registry holds one static [`AdapterRegistration`] per view type. It
//! recommends view types for a scene and builds [`ManagedAdapter`]s, loading
//! lazy backends on first use.
//!
//! The registry is built once and shared as `Arc<AdapterRegistry>`; only the
//! set of loaded lazy backends changes afterwards.
//!
//! ```ignore
//! let registry = AdapterRegistry::builder()
//!     .register(rich_text_registration)
//!     .build();
//! let recommendations = registry.get_recommended_types(SceneTemplate::Writing);
//! ```

mod builtin;
mod factory;
mod registration;

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::adapter::{AdapterError, HealthReport, SceneTemplate, ViewType};

pub use builtin::{builtin_score, headless_registry};
pub use factory::{CreationProgress, CreationStage, CreationToken};
pub use registration::{
    AdapterConstructor, AdapterLoader, AdapterRegistration, AdapterSource, MatchScore,
};

/// Confidence above which the reason names the scene
pub const STRONG_MATCH: f64 = 0.8;

/// Confidence from which a view counts as usable
pub const USABLE_MATCH: f64 = 0.6;

/// Errors from adapter lookup and construction
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No adapter registered for view type '{0}'")]
    UnsupportedType(ViewType),

    #[error("Failed to load the {view_type} backend: {message}")]
    LoadFailed { view_type: ViewType, message: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// The caller abandoned the creation before it completed
    #[error("Creation of the {0} adapter was abandoned")]
    Cancelled(ViewType),
}

/// A view type suggested for a scene
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub view_type: ViewType,
    pub name: String,
    pub confidence: f64,
    pub reason: String,
    pub features: Vec<String>,
}

pub struct AdapterRegistry {
    registrations: BTreeMap<ViewType, AdapterRegistration>,
    /// Constructors of lazy backends that finished loading
    loaded: Mutex<HashMap<ViewType, AdapterConstructor>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("registrations", &self.registrations.keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded_types())
            .finish()
    }
}

#[derive(Default)]
pub struct AdapterRegistryBuilder {
    registrations: BTreeMap<ViewType, AdapterRegistration>,
}

impl AdapterRegistryBuilder {
    /// Add a registration; a later registration for the same view type wins
    pub fn register(mut self, registration: AdapterRegistration) -> Self {
        if let Some(previous) = self
            .registrations
            .insert(registration.view_type, registration)
        {
            warn!(
                view_type = %previous.view_type,
                replaced = %previous.name,
                "duplicate adapter registration"
            );
        }
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            registrations: self.registrations,
            loaded: Mutex::new(HashMap::new()),
        }
    }
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    pub fn get(&self, view_type: ViewType) -> Option<&AdapterRegistration> {
        self.registrations.get(&view_type)
    }

    pub fn is_registered(&self, view_type: ViewType) -> bool {
        self.registrations.contains_key(&view_type)
    }

    pub fn registrations(&self) -> impl Iterator<Item = &AdapterRegistration> {
        self.registrations.values()
    }

    pub fn view_types(&self) -> Vec<ViewType> {
        self.registrations.keys().copied().collect()
    }

    /// Whether the view's backend can be constructed without loading
    pub fn is_loaded(&self, view_type: ViewType) -> bool {
        match self.registrations.get(&view_type) {
            Some(reg) if reg.is_lazy() => self.loaded_constructor(view_type).is_some(),
            Some(_) => true,
            None => false,
        }
    }

    /// Lazy backends that have been loaded, in view-type order
    pub fn loaded_types(&self) -> Vec<ViewType> {
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        let mut types: Vec<_> = loaded.keys().copied().collect();
        types.sort();
        types
    }

    /// View types suited to `scene`, best first
    ///
    /// Only registrations listing the scene are considered. Each gets a
    /// human-readable reason matched to its confidence.
    pub fn get_recommended_types(&self, scene: SceneTemplate) -> Vec<Recommendation> {
        self.get_recommended_types_with_health(scene, None)
    }

    /// Recommendations that account for how the active view is doing
    ///
    /// The active view's confidence is scaled by its health score, so a view
    /// that keeps failing drops below healthier alternatives. An unhealthy
    /// view also has its first issue appended to the reason.
    pub fn get_recommended_types_with_health(
        &self,
        scene: SceneTemplate,
        active: Option<(ViewType, &HealthReport)>,
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = self
            .registrations
            .values()
            .filter(|reg| reg.supports(scene))
            .map(|reg| {
                let report = active
                    .filter(|(view_type, _)| *view_type == reg.view_type)
                    .map(|(_, report)| report);
                let confidence = match report {
                    Some(report) if report.score < 100 => {
                        reg.match_score(scene) * f64::from(report.score) / 100.0
                    }
                    _ => reg.match_score(scene),
                };
                let mut reason = reason_for(&reg.name, scene, confidence);
                if let Some(report) = report.filter(|r| !r.healthy) {
                    let issue = report
                        .issues
                        .first()
                        .map(String::as_str)
                        .unwrap_or("degraded");
                    reason = format!("{} (currently unhealthy: {})", reason, issue);
                }
                Recommendation {
                    view_type: reg.view_type,
                    name: reg.name.clone(),
                    confidence,
                    reason,
                    features: reg.features.clone(),
                }
            })
            .collect();

        recommendations.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        recommendations
    }

    fn loaded_constructor(&self, view_type: ViewType) -> Option<AdapterConstructor> {
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.get(&view_type).cloned()
    }

    fn mark_loaded(&self, view_type: ViewType, constructor: AdapterConstructor) {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.entry(view_type).or_insert(constructor);
    }
}

fn reason_for(name: &str, scene: SceneTemplate, confidence: f64) -> String {
    if confidence > STRONG_MATCH {
        let activity = match scene {
            SceneTemplate::Writing => "drafting and structuring long-form text",
            SceneTemplate::Research => "connecting sources and ideas",
            SceneTemplate::Planning => "laying out goals and milestones",
            SceneTemplate::Learning => "organizing concepts as you study",
            SceneTemplate::Brainstorming => "free-form idea exploration",
            SceneTemplate::Presentation => "arranging content for an audience",
            SceneTemplate::ProjectManagement => "tracking tasks and schedules",
        };
        format!("{} is ideal for {}", name, activity)
    } else if confidence >= USABLE_MATCH {
        format!("{} is usable for {}", name, scene)
    } else {
        format!("{} is available as a fallback for {}", name, scene)
    }
}
