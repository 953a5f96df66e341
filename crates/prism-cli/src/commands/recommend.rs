//! Recommend command handler

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use prism_core::{headless_registry, Config, EditorOrchestrator, Recommendation, SceneTemplate};

use super::read_document;
use crate::output::Output;

/// Suggest views for a scene
///
/// The scene comes from `--scene`, then the document's hint, then the
/// configured default.
pub fn recommend(
    config: Config,
    scene: Option<SceneTemplate>,
    path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let recommendations = recommendations_for(config, scene, path)?;
    output.print_recommendations(&recommendations)
}

fn recommendations_for(
    config: Config,
    scene: Option<SceneTemplate>,
    path: Option<&Path>,
) -> Result<Vec<Recommendation>> {
    let mut editor = EditorOrchestrator::new(config, Arc::new(headless_registry()));
    if let Some(scene) = scene {
        editor = editor.with_scene(scene);
    }
    if let Some(path) = path {
        let doc = read_document(path)?;
        editor
            .set_content(doc)
            .with_context(|| format!("Failed to open document: {:?}", path))?;
    }

    let recommendations = editor.get_recommended_editors();
    editor.destroy();
    Ok(recommendations)
}
