//! Static adapter registrations

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::RegistryError;
use crate::adapter::{SceneTemplate, ViewAdapter, ViewType};

/// Builds a fresh, unmounted adapter
pub type AdapterConstructor = Arc<dyn Fn() -> Box<dyn ViewAdapter> + Send + Sync>;

/// Loads a backend on first use and yields its constructor
pub type AdapterLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AdapterConstructor, RegistryError>> + Send + Sync>;

/// Scores how well a view suits a scene, in `[0, 1]`
pub type MatchScore = Arc<dyn Fn(SceneTemplate) -> f64 + Send + Sync>;

/// Where an adapter comes from
#[derive(Clone)]
pub enum AdapterSource {
    /// Constructor available immediately
    Eager(AdapterConstructor),
    /// Backend loaded asynchronously on first creation
    Lazy(AdapterLoader),
}

/// Description of one view type's adapter
#[derive(Clone)]
pub struct AdapterRegistration {
    pub view_type: ViewType,
    pub name: String,
    pub supported_scenes: Vec<SceneTemplate>,
    pub features: Vec<String>,
    match_score: MatchScore,
    source: AdapterSource,
}

impl AdapterRegistration {
    /// Registration with an eager constructor
    pub fn new<F>(view_type: ViewType, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ViewAdapter> + Send + Sync + 'static,
    {
        Self {
            view_type,
            name: name.into(),
            supported_scenes: Vec::new(),
            features: Vec::new(),
            match_score: Arc::new(|_| 0.5),
            source: AdapterSource::Eager(Arc::new(constructor)),
        }
    }

    /// Registration whose backend is loaded on first use
    pub fn lazy<F>(view_type: ViewType, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<AdapterConstructor, RegistryError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            view_type,
            name: name.into(),
            supported_scenes: Vec::new(),
            features: Vec::new(),
            match_score: Arc::new(|_| 0.5),
            source: AdapterSource::Lazy(Arc::new(loader)),
        }
    }

    pub fn with_scenes(mut self, scenes: impl IntoIterator<Item = SceneTemplate>) -> Self {
        self.supported_scenes = scenes.into_iter().collect();
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_match_score<F>(mut self, score: F) -> Self
    where
        F: Fn(SceneTemplate) -> f64 + Send + Sync + 'static,
    {
        self.match_score = Arc::new(score);
        self
    }

    /// Whether the backend is loaded on first use
    pub fn is_lazy(&self) -> bool {
        matches!(self.source, AdapterSource::Lazy(_))
    }

    pub fn supports(&self, scene: SceneTemplate) -> bool {
        self.supported_scenes.contains(&scene)
    }

    /// Match score clamped to `[0, 1]`
    pub fn match_score(&self, scene: SceneTemplate) -> f64 {
        let score = (self.match_score)(scene);
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    pub fn source(&self) -> &AdapterSource {
        &self.source
    }
}

impl fmt::Debug for AdapterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistration")
            .field("view_type", &self.view_type)
            .field("name", &self.name)
            .field("supported_scenes", &self.supported_scenes)
            .field("features", &self.features)
            .field("lazy", &self.is_lazy())
            .finish()
    }
}
