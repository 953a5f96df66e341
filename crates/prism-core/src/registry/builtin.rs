//! Built-in registrations backed by the headless adapter

use std::sync::Arc;

use super::registration::{AdapterConstructor, AdapterRegistration};
use super::{AdapterRegistry, RegistryError};
use crate::adapter::{HeadlessAdapter, SceneTemplate, ViewAdapter, ViewType};

/// Lowest score at which a view lists a scene as supported
const SUPPORT_THRESHOLD: f64 = 0.5;

/// How well each built-in view suits each scene
pub fn builtin_score(view_type: ViewType, scene: SceneTemplate) -> f64 {
    use SceneTemplate::*;

    match (view_type, scene) {
        (ViewType::RichText, Writing) => 0.95,
        (ViewType::RichText, Learning) => 0.85,
        (ViewType::RichText, Research) => 0.8,
        (ViewType::RichText, Presentation) => 0.7,
        (ViewType::RichText, Planning) => 0.6,
        (ViewType::RichText, Brainstorming) => 0.5,
        (ViewType::RichText, ProjectManagement) => 0.4,

        (ViewType::Graph, Research) => 0.9,
        (ViewType::Graph, Brainstorming) => 0.85,
        (ViewType::Graph, Learning) => 0.8,
        (ViewType::Graph, Planning) => 0.6,
        (ViewType::Graph, Presentation) => 0.5,
        (ViewType::Graph, ProjectManagement) => 0.45,
        (ViewType::Graph, Writing) => 0.4,

        (ViewType::Canvas, Brainstorming) => 0.95,
        (ViewType::Canvas, Presentation) => 0.85,
        (ViewType::Canvas, Planning) => 0.7,
        (ViewType::Canvas, Learning) => 0.65,
        (ViewType::Canvas, Research) => 0.5,
        (ViewType::Canvas, ProjectManagement) => 0.45,
        (ViewType::Canvas, Writing) => 0.3,

        (ViewType::Table, ProjectManagement) => 0.9,
        (ViewType::Table, Planning) => 0.85,
        (ViewType::Table, Research) => 0.7,
        (ViewType::Table, Learning) => 0.5,
        (ViewType::Table, Presentation) => 0.4,
        (ViewType::Table, Writing) => 0.3,
        (ViewType::Table, Brainstorming) => 0.3,

        (ViewType::Timeline, Planning) => 0.9,
        (ViewType::Timeline, ProjectManagement) => 0.85,
        (ViewType::Timeline, Presentation) => 0.65,
        (ViewType::Timeline, Learning) => 0.55,
        (ViewType::Timeline, Research) => 0.5,
        (ViewType::Timeline, Writing) => 0.35,
        (ViewType::Timeline, Brainstorming) => 0.3,
    }
}

fn features(view_type: ViewType) -> &'static [&'static str] {
    match view_type {
        ViewType::RichText => &["formatting", "inline-editing", "ai-assist"],
        ViewType::Graph => &["node-links", "drag", "zoom", "layout"],
        ViewType::Canvas => &["free-placement", "drag", "zoom"],
        ViewType::Table => &["rows", "sorting", "bulk-edit"],
        ViewType::Timeline => &["dates", "milestones", "zoom"],
    }
}

fn headless_constructor(view_type: ViewType) -> AdapterConstructor {
    Arc::new(move || -> Box<dyn ViewAdapter> { Box::new(HeadlessAdapter::new(view_type)) })
}

fn registration(view_type: ViewType, lazy: bool) -> AdapterRegistration {
    let name = view_type.display_name();
    let reg = if lazy {
        AdapterRegistration::lazy(view_type, name, move || {
            Box::pin(async move {
                // Heavy backends arrive asynchronously
                tokio::task::yield_now().await;
                Ok::<_, RegistryError>(headless_constructor(view_type))
            })
        })
    } else {
        AdapterRegistration::new(view_type, name, move || -> Box<dyn ViewAdapter> {
            Box::new(HeadlessAdapter::new(view_type))
        })
    };

    reg.with_scenes(
        SceneTemplate::ALL
            .iter()
            .copied()
            .filter(|scene| builtin_score(view_type, *scene) >= SUPPORT_THRESHOLD),
    )
    .with_features(features(view_type).iter().copied())
    .with_match_score(move |scene| builtin_score(view_type, scene))
}

/// Registry with a headless adapter for every view type
///
/// Graph and canvas backends are registered lazily.
pub fn headless_registry() -> AdapterRegistry {
    ViewType::ALL
        .iter()
        .fold(AdapterRegistry::builder(), |builder, view_type| {
            let lazy = matches!(view_type, ViewType::Graph | ViewType::Canvas);
            builder.register(registration(*view_type, lazy))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOptions, RuntimeSettings};
    use crate::registry::CreationToken;

    #[test]
    fn test_every_view_registered() {
        let registry = headless_registry();
        assert_eq!(registry.view_types(), ViewType::ALL.to_vec());
        assert!(registry.get(ViewType::Graph).unwrap().is_lazy());
        assert!(registry.get(ViewType::Canvas).unwrap().is_lazy());
        assert!(!registry.get(ViewType::RichText).unwrap().is_lazy());
    }

    #[test]
    fn test_writing_prefers_rich_text() {
        let recs = headless_registry().get_recommended_types(SceneTemplate::Writing);
        assert_eq!(recs[0].view_type, ViewType::RichText);
        assert_eq!(recs[0].confidence, 0.95);
        assert!(recs.iter().all(|r| r.confidence >= SUPPORT_THRESHOLD));
    }

    #[test]
    fn test_scene_leaders() {
        let registry = headless_registry();
        let leader = |scene| registry.get_recommended_types(scene)[0].view_type;
        assert_eq!(leader(SceneTemplate::Research), ViewType::Graph);
        assert_eq!(leader(SceneTemplate::Brainstorming), ViewType::Canvas);
        assert_eq!(leader(SceneTemplate::ProjectManagement), ViewType::Table);
        assert_eq!(leader(SceneTemplate::Planning), ViewType::Timeline);
    }

    #[tokio::test]
    async fn test_lazy_backend_loads_on_first_creation() {
        let registry = headless_registry();
        assert!(!registry.is_loaded(ViewType::Canvas));

        let adapter = registry
            .create_adapter(
                ViewType::Canvas,
                AdapterOptions::new("main"),
                &RuntimeSettings::default(),
                &CreationToken::new(),
                |_| {},
            )
            .await
            .unwrap();
        assert_eq!(adapter.view_type(), ViewType::Canvas);
        assert!(registry.is_loaded(ViewType::Canvas));
    }
}
