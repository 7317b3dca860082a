use scenes::{Scene, SceneVisual};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::source::DataSource;

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichOutcome {
    /// Whatever the enrich endpoint returned, often nothing.
    pub response: Value,
    /// Full scene list fetched after enrichment.
    pub scenes: Vec<Scene>,
    /// Visualization data for the scene, when it could be fetched.
    pub visual: Option<SceneVisual>,
}

/// Runs enrichment for one scene, then refreshes the scene list and fetches
/// the scene's visualization data.
///
/// Enrichment and the scene reload must succeed. The visualization fetch is
/// secondary: its failure is logged and yields `visual: None`.
pub async fn enrich_scene_flow(
    source: &dyn DataSource,
    script_id: &str,
    scene_id: &str,
) -> Result<EnrichOutcome> {
    let response = source.enrich_scene(scene_id).await?;
    info!(target: "previz::enrich", scene_id, "scene enriched");

    let scenes = source.get_scenes(script_id).await?;
    let visual = fetch_visual(source, scene_id).await;

    Ok(EnrichOutcome {
        response,
        scenes,
        visual,
    })
}

/// Best-effort `GET /visual/scenes/{id}`.
pub async fn fetch_visual(source: &dyn DataSource, scene_id: &str) -> Option<SceneVisual> {
    match source.scene_visual(scene_id).await {
        Ok(visual) => Some(visual),
        Err(err) => {
            warn!(target: "previz::enrich", scene_id, error = %err, "visualization data unavailable");
            None
        }
    }
}
