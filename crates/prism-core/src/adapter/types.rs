//! View types, scene templates and capability records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A family of renderers presenting the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewType {
    RichText,
    Graph,
    Canvas,
    Table,
    Timeline,
}

impl ViewType {
    pub const ALL: [ViewType; 5] = [
        ViewType::RichText,
        ViewType::Graph,
        ViewType::Canvas,
        ViewType::Table,
        ViewType::Timeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::RichText => "rich-text",
            ViewType::Graph => "graph",
            ViewType::Canvas => "canvas",
            ViewType::Table => "table",
            ViewType::Timeline => "timeline",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ViewType::RichText => "Rich Text Editor",
            ViewType::Graph => "Knowledge Graph",
            ViewType::Canvas => "Freeform Canvas",
            ViewType::Table => "Table",
            ViewType::Timeline => "Timeline",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewType::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("view type", s))
    }
}

/// Usage intent used to recommend a view type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneTemplate {
    Writing,
    Research,
    Planning,
    Learning,
    Brainstorming,
    Presentation,
    ProjectManagement,
}

impl SceneTemplate {
    pub const ALL: [SceneTemplate; 7] = [
        SceneTemplate::Writing,
        SceneTemplate::Research,
        SceneTemplate::Planning,
        SceneTemplate::Learning,
        SceneTemplate::Brainstorming,
        SceneTemplate::Presentation,
        SceneTemplate::ProjectManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneTemplate::Writing => "writing",
            SceneTemplate::Research => "research",
            SceneTemplate::Planning => "planning",
            SceneTemplate::Learning => "learning",
            SceneTemplate::Brainstorming => "brainstorming",
            SceneTemplate::Presentation => "presentation",
            SceneTemplate::ProjectManagement => "project-management",
        }
    }
}

impl fmt::Display for SceneTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneTemplate {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SceneTemplate::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("scene template", s))
    }
}

/// A string did not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Fixed set of features an adapter declares
///
/// Orchestrator commands are gated on this record, never on the concrete
/// adapter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_select: bool,
    pub can_zoom: bool,
    pub can_drag: bool,
    pub supports_undo: bool,
    pub supports_search: bool,
    #[serde(rename = "supportsAI")]
    pub supports_ai: bool,
}

impl Capabilities {
    /// Typical capability record for a view family
    pub fn for_view(view_type: ViewType) -> Self {
        match view_type {
            ViewType::RichText => Self {
                can_edit: true,
                can_select: true,
                can_zoom: false,
                can_drag: false,
                supports_undo: true,
                supports_search: true,
                supports_ai: true,
            },
            ViewType::Graph => Self {
                can_edit: true,
                can_select: true,
                can_zoom: true,
                can_drag: true,
                supports_undo: true,
                supports_search: true,
                supports_ai: false,
            },
            ViewType::Canvas => Self {
                can_edit: true,
                can_select: true,
                can_zoom: true,
                can_drag: true,
                supports_undo: true,
                supports_search: false,
                supports_ai: false,
            },
            ViewType::Table => Self {
                can_edit: true,
                can_select: true,
                can_zoom: false,
                can_drag: false,
                supports_undo: true,
                supports_search: true,
                supports_ai: false,
            },
            ViewType::Timeline => Self {
                can_edit: true,
                can_select: true,
                can_zoom: true,
                can_drag: true,
                supports_undo: true,
                supports_search: false,
                supports_ai: false,
            },
        }
    }

    /// Same record with AI support toggled
    pub fn with_ai(mut self, enabled: bool) -> Self {
        self.supports_ai = enabled;
        self
    }

    /// Names of the enabled capabilities, in declaration order
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("canEdit", self.can_edit),
            ("canSelect", self.can_select),
            ("canZoom", self.can_zoom),
            ("canDrag", self.can_drag),
            ("supportsUndo", self.supports_undo),
            ("supportsSearch", self.supports_search),
            ("supportsAI", self.supports_ai),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

/// Visible region of a spatial view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_type_serde_and_parse() {
        let json = serde_json::to_string(&ViewType::RichText).unwrap();
        assert_eq!(json, "\"rich-text\"");
        for view in ViewType::ALL {
            assert_eq!(view.as_str().parse::<ViewType>().unwrap(), view);
        }
        assert!("spreadsheet".parse::<ViewType>().is_err());
    }

    #[test]
    fn test_scene_template_serde_and_parse() {
        let json = serde_json::to_string(&SceneTemplate::ProjectManagement).unwrap();
        assert_eq!(json, "\"project-management\"");
        for scene in SceneTemplate::ALL {
            let parsed: SceneTemplate = scene.to_string().parse().unwrap();
            assert_eq!(parsed, scene);
        }
        let err = "cooking".parse::<SceneTemplate>().unwrap_err();
        assert!(err.to_string().contains("cooking"));
    }

    #[test]
    fn test_capabilities_per_view() {
        assert!(Capabilities::for_view(ViewType::RichText).supports_ai);
        assert!(!Capabilities::for_view(ViewType::Graph).supports_ai);
        assert!(Capabilities::for_view(ViewType::Canvas).can_drag);
        assert!(!Capabilities::for_view(ViewType::Table).can_zoom);
    }

    #[test]
    fn test_capabilities_json_keys() {
        let caps = Capabilities::for_view(ViewType::RichText);
        let json = serde_json::to_value(caps).unwrap();
        assert_eq!(json["supportsAI"], true);
        assert_eq!(json["canEdit"], true);
        assert!(caps.enabled().contains(&"supportsAI"));
        assert!(!caps.with_ai(false).enabled().contains(&"supportsAI"));
    }
}
