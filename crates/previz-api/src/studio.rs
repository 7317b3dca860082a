//! Session state for one user working through a script: upload, scene
//! review, then frame generation.
//!
//! Every operation takes `&self`, so a `Studio` can sit behind an `Arc` and
//! be driven from several tasks. The session lock is never held across a
//! backend call; per-scene in-flight sets reject a second trigger of the
//! same action with [`ApiError::Busy`].

use parking_lot::Mutex;
use prompt_slots::PromptSlots;
use scenes::{DetailLevel, Frame, ParsingStatus, Scene, SceneDraft, SceneVisual, UploadResponse};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::enrich::enrich_scene_flow;
use crate::error::{ApiError, Result};
use crate::generation::{self, GenerateOptions};
use crate::poller::{ParsePoller, PollCancel, PollOutcome};
use crate::source::{fixture, DataSource};
use crate::upload::ScriptFile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    #[default]
    Upload,
    Review,
    Generate,
}

/// Scene ids with an operation of one kind in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    action: &'static str,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            ids: Arc::default(),
        }
    }

    /// Marks `scene_id` busy until the guard is dropped.
    pub fn begin(&self, scene_id: &str) -> Result<InFlightGuard> {
        if !self.ids.lock().insert(scene_id.to_string()) {
            return Err(ApiError::Busy {
                action: self.action,
                scene_id: scene_id.to_string(),
            });
        }
        Ok(InFlightGuard {
            ids: Arc::clone(&self.ids),
            scene_id: scene_id.to_string(),
        })
    }

    pub fn contains(&self, scene_id: &str) -> bool {
        self.ids.lock().contains(scene_id)
    }
}

pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    scene_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.scene_id);
    }
}

#[derive(Default)]
struct Session {
    step: Step,
    script: Option<UploadResponse>,
    scenes: Vec<Scene>,
    current: usize,
    history: Vec<Frame>,
    visuals: HashMap<String, SceneVisual>,
    last_status: Option<ParsingStatus>,
}

impl Session {
    fn require_script_id(&self) -> Result<String> {
        self.script
            .as_ref()
            .map(|s| s.script_id.clone())
            .ok_or_else(|| ApiError::NotFound("uploaded script".into()))
    }

    fn index_of(&self, scene_id: &str) -> Result<usize> {
        self.scenes
            .iter()
            .position(|s| s.id == scene_id)
            .ok_or_else(|| ApiError::NotFound(format!("scene {scene_id}")))
    }

    fn scene_mut(&mut self, scene_id: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == scene_id)
    }

    fn current_scene(&self) -> Result<&Scene> {
        self.scenes
            .get(self.current)
            .ok_or_else(|| ApiError::NotFound("current scene".into()))
    }

    fn clamp_current(&mut self) {
        self.current = self.current.min(self.scenes.len().saturating_sub(1));
    }

    fn load_demo(&mut self) {
        let demo = fixture::demo_upload();
        *self = Session {
            step: self.step,
            scenes: demo.scenes.clone(),
            script: Some(demo),
            ..Session::default()
        };
    }
}

pub struct Studio {
    source: Arc<dyn DataSource>,
    poller: ParsePoller,
    session: Mutex<Session>,
    generating: InFlight,
    refining: InFlight,
    enriching: InFlight,
}

impl Studio {
    pub fn new(source: Arc<dyn DataSource>, poller: ParsePoller) -> Self {
        Self {
            source,
            poller,
            session: Mutex::new(Session::default()),
            generating: InFlight::new("generation"),
            refining: InFlight::new("refinement"),
            enriching: InFlight::new("enrichment"),
        }
    }

    pub fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    pub fn step(&self) -> Step {
        self.session.lock().step
    }

    pub fn script(&self) -> Option<UploadResponse> {
        self.session.lock().script.clone()
    }

    pub fn script_id(&self) -> Option<String> {
        self.session.lock().script.as_ref().map(|s| s.script_id.clone())
    }

    pub fn scenes(&self) -> Vec<Scene> {
        self.session.lock().scenes.clone()
    }

    pub fn current_index(&self) -> usize {
        self.session.lock().current
    }

    pub fn current_scene(&self) -> Option<Scene> {
        let session = self.session.lock();
        session.scenes.get(session.current).cloned()
    }

    pub fn history(&self) -> Vec<Frame> {
        self.session.lock().history.clone()
    }

    pub fn visual(&self, scene_id: &str) -> Option<SceneVisual> {
        self.session.lock().visuals.get(scene_id).cloned()
    }

    pub fn last_status(&self) -> Option<ParsingStatus> {
        self.session.lock().last_status.clone()
    }

    pub fn is_generating(&self, scene_id: &str) -> bool {
        self.generating.contains(scene_id)
    }

    pub fn is_refining(&self, scene_id: &str) -> bool {
        self.refining.contains(scene_id)
    }

    pub fn is_enriching(&self, scene_id: &str) -> bool {
        self.enriching.contains(scene_id)
    }

    /// Replaces the session with the demo script. Frame history, stored
    /// visualizations and the last parsing status are dropped.
    pub fn load_demo_data(&self) {
        info!(target: "previz::studio", "loading demo script");
        self.session.lock().load_demo();
    }

    /// Moves to `step`. Entering review or generation without scenes loads
    /// the demo script so there is something to show.
    pub fn go_to(&self, step: Step) {
        let mut session = self.session.lock();
        if step != Step::Upload && session.scenes.is_empty() {
            info!(target: "previz::studio", "loading demo script");
            session.load_demo();
        }
        session.step = step;
    }

    pub async fn handle_upload(&self, file: &ScriptFile) -> Result<UploadResponse> {
        let response = self.source.upload_script(file).await?;
        info!(
            target: "previz::studio",
            script_id = %response.script_id,
            status = %response.status,
            scenes = response.scenes.len(),
            "script uploaded"
        );
        let mut session = self.session.lock();
        session.scenes = response.scenes.clone();
        session.current = 0;
        session.history.clear();
        session.visuals.clear();
        session.last_status = None;
        session.step = Step::Review;
        session.script = Some(response.clone());
        Ok(response)
    }

    /// Polls until the uploaded script is parsed. Scenes are replaced only
    /// when the script parsed with a non-empty scene list.
    pub async fn wait_for_scenes(
        &self,
        cancel: &PollCancel,
        mut on_progress: impl FnMut(&ParsingStatus) + Send,
    ) -> Result<PollOutcome> {
        let script_id = self.session.lock().require_script_id()?;
        let mut last = None;
        let outcome = self
            .poller
            .run(self.source.as_ref(), &script_id, cancel, |status| {
                last = Some(status.clone());
                on_progress(status);
            })
            .await;

        let mut session = self.session.lock();
        if last.is_some() {
            session.last_status = last;
        }
        let outcome = outcome?;

        if let PollOutcome::Parsed { scenes, .. } = &outcome {
            session.scenes = scenes.clone();
            session.current = 0;
        }
        if let Some(script) = session.script.as_mut() {
            script.status = match &outcome {
                PollOutcome::Parsed { status, .. }
                | PollOutcome::ParsedEmpty(status)
                | PollOutcome::Failed(status) => status.script_status,
            };
        }
        Ok(outcome)
    }

    pub async fn reload_scenes(&self) -> Result<Vec<Scene>> {
        let script_id = self.session.lock().require_script_id()?;
        let scenes = self.source.get_scenes(&script_id).await?;
        let mut session = self.session.lock();
        session.scenes = scenes.clone();
        session.clamp_current();
        Ok(scenes)
    }

    pub fn continue_to_generation(&self) {
        self.go_to(Step::Generate);
    }

    /// Saves edited fields. The local copy takes the draft once the server
    /// accepts it; frames are left untouched.
    pub async fn save_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.session.lock().index_of(scene_id)?;
        self.source.update_scene(scene_id, draft).await?;

        let mut session = self.session.lock();
        let scene = session
            .scene_mut(scene_id)
            .ok_or_else(|| ApiError::NotFound(format!("scene {scene_id}")))?;
        draft.apply_to(scene);
        Ok(scene.clone())
    }

    /// Stores an edited prompt on the scene.
    pub async fn save_prompt(&self, scene_id: &str, prompt: &str) -> Result<Scene> {
        let mut draft = {
            let session = self.session.lock();
            let index = session.index_of(scene_id)?;
            SceneDraft::from_scene(&session.scenes[index])
        };
        draft.prompt = Some(prompt.to_string());
        self.save_scene(scene_id, &draft).await
    }

    pub async fn delete_scene(&self, scene_id: &str) -> Result<()> {
        self.session.lock().index_of(scene_id)?;
        self.source.delete_scene(scene_id).await?;

        let mut session = self.session.lock();
        session.scenes.retain(|s| s.id != scene_id);
        session.visuals.remove(scene_id);
        session.clamp_current();
        Ok(())
    }

    /// Appends a new scene. Without a draft, a blank one titled after its
    /// position is used.
    pub async fn add_scene(&self, draft: Option<SceneDraft>) -> Result<Scene> {
        let (script_id, count) = {
            let session = self.session.lock();
            (session.require_script_id()?, session.scenes.len())
        };
        let draft = draft.unwrap_or_else(|| SceneDraft {
            title: format!("Сцена {}", count + 1),
            ..SceneDraft::default()
        });
        let scene = self.source.add_scene(&script_id, &draft).await?;
        self.session.lock().scenes.push(scene.clone());
        Ok(scene)
    }

    pub async fn refine_scene(&self, scene_id: &str, instruction: &str) -> Result<Scene> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(ApiError::InvalidInput("refine instruction is empty".into()));
        }
        self.session.lock().index_of(scene_id)?;
        let _guard = self.refining.begin(scene_id)?;

        let refined = self.source.refine_scene(scene_id, instruction).await?;
        let mut session = self.session.lock();
        if let Some(scene) = session.scene_mut(scene_id) {
            *scene = refined.clone();
        }
        Ok(refined)
    }

    pub async fn enrich_scene(&self, scene_id: &str) -> Result<Option<SceneVisual>> {
        let script_id = self.session.lock().require_script_id()?;
        let _guard = self.enriching.begin(scene_id)?;

        let outcome = enrich_scene_flow(self.source.as_ref(), &script_id, scene_id).await?;
        let mut session = self.session.lock();
        session.scenes = outcome.scenes;
        session.clamp_current();
        if let Some(visual) = &outcome.visual {
            session.visuals.insert(scene_id.to_string(), visual.clone());
        }
        Ok(outcome.visual)
    }

    /// Makes the scene at `index` current and loads its frame history.
    pub async fn select_scene(&self, index: usize) -> Result<Scene> {
        let scene = {
            let mut session = self.session.lock();
            let scene = session
                .scenes
                .get(index)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("scene #{}", index + 1)))?;
            session.current = index;
            scene
        };
        self.load_history().await;
        Ok(scene)
    }

    /// History failures are logged and leave the previous list in place.
    /// A result for a scene that is no longer current is discarded.
    pub async fn load_history(&self) -> Vec<Frame> {
        let scene_id = {
            let session = self.session.lock();
            match session.current_scene() {
                Ok(scene) => scene.id.clone(),
                Err(_) => return session.history.clone(),
            }
        };
        let fetched = self.source.frame_history(&scene_id).await;

        let mut session = self.session.lock();
        match fetched {
            Ok(frames) => {
                let still_current = session.current_scene().is_ok_and(|s| s.id == scene_id);
                if still_current {
                    session.history = frames;
                }
            }
            Err(err) => warn!(target: "previz::studio", %scene_id, error = %err, "could not load frame history"),
        }
        session.history.clone()
    }

    pub fn sketch_advisory(&self, level: DetailLevel, direct_final: bool) -> Option<&'static str> {
        let session = self.session.lock();
        let scene = session.current_scene().ok()?;
        generation::sketch_advisory(scene, level, direct_final)
    }

    /// Generates a frame for the current scene. A second generate on the
    /// same scene while one is running fails with [`ApiError::Busy`].
    pub async fn generate(
        &self,
        level: DetailLevel,
        direct_final: bool,
        options: &GenerateOptions,
    ) -> Result<Frame> {
        let mut scene = self.session.lock().current_scene()?.clone();
        let _guard = self.generating.begin(&scene.id)?;

        let frame = generation::generate_for_scene(
            self.source.as_ref(),
            &mut scene,
            level,
            direct_final,
            options,
        )
        .await?;
        if let Some(stored) = self.session.lock().scene_mut(&scene.id) {
            stored.push_frame(frame.clone());
        }
        self.load_history().await;
        Ok(frame)
    }

    /// Regenerates the current frame of the current scene with a new prompt.
    pub async fn regenerate(&self, prompt: &str, level: DetailLevel) -> Result<Frame> {
        let mut scene = self.session.lock().current_scene()?.clone();
        let _guard = self.generating.begin(&scene.id)?;

        let frame = generation::regenerate(self.source.as_ref(), &mut scene, prompt, level).await?;
        if let Some(stored) = self.session.lock().scene_mut(&scene.id) {
            stored.current_frame = scene.current_frame;
            stored.prompt = scene.prompt;
        }
        self.load_history().await;
        Ok(frame)
    }

    /// Points the current scene at a frame from its history.
    pub fn select_history_frame(&self, frame_id: &str) -> Result<Frame> {
        let mut session = self.session.lock();
        let Session {
            scenes,
            current,
            history,
            ..
        } = &mut *session;
        let scene = scenes
            .get_mut(*current)
            .ok_or_else(|| ApiError::NotFound("current scene".into()))?;

        if !scene.generated_frames.iter().any(|f| f.id == frame_id) {
            if let Some(frame) = history.iter().find(|f| f.id == frame_id) {
                scene.generated_frames.push(frame.clone());
            }
        }
        Ok(scene.select_frame(frame_id)?.clone())
    }

    pub async fn export(&self, dir: &Path) -> Result<PathBuf> {
        let script_id = self.session.lock().require_script_id()?;
        generation::export_storyboard(self.source.as_ref(), &script_id, dir).await
    }

    /// Saves prompt slots for a scene through the backend.
    pub async fn save_slots(
        &self,
        scene_id: &str,
        slots: &PromptSlots,
        update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        let visual = self.source.update_slots(scene_id, slots, update_scene).await?;
        if let Some(visual) = &visual {
            self.session
                .lock()
                .visuals
                .insert(scene_id.to_string(), visual.clone());
        }
        Ok(visual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixtureSource;
    use std::time::Duration;

    fn studio() -> Studio {
        Studio::new(
            Arc::new(FixtureSource::instant()),
            ParsePoller::new(Duration::from_millis(1), 3),
        )
    }

    #[test]
    fn in_flight_rejects_duplicates_until_guard_drops() {
        let tracker = InFlight::new("generation");
        let guard = tracker.begin("scene-1").unwrap();
        assert!(tracker.contains("scene-1"));
        assert!(matches!(
            tracker.begin("scene-1"),
            Err(ApiError::Busy { action: "generation", .. })
        ));
        assert!(tracker.begin("scene-2").is_ok());

        drop(guard);
        assert!(!tracker.contains("scene-1"));
        assert!(tracker.begin("scene-1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn second_generate_on_a_running_scene_is_busy() {
        let studio = Arc::new(Studio::new(
            Arc::new(FixtureSource::new(Duration::from_secs(2))),
            ParsePoller::new(Duration::from_millis(1), 3),
        ));
        studio.load_demo_data();
        let frames_before = studio.current_scene().unwrap().generated_frames.len();

        let first = {
            let studio = Arc::clone(&studio);
            tokio::spawn(async move {
                studio
                    .generate(DetailLevel::Sketch, false, &GenerateOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(studio.is_generating("scene-1"));

        let second = studio
            .generate(DetailLevel::Sketch, false, &GenerateOptions::default())
            .await;
        assert!(matches!(
            &second,
            Err(ApiError::Busy { action: "generation", scene_id }) if scene_id == "scene-1"
        ));

        first.await.unwrap().unwrap();
        assert!(!studio.is_generating("scene-1"));
        assert_eq!(
            studio.current_scene().unwrap().generated_frames.len(),
            frames_before + 1
        );
    }

    #[test]
    fn entering_review_without_scenes_loads_demo() {
        let studio = studio();
        assert_eq!(studio.step(), Step::Upload);
        studio.go_to(Step::Review);
        assert_eq!(studio.step(), Step::Review);
        assert_eq!(studio.scenes().len(), 5);
        assert_eq!(studio.script_id().as_deref(), Some(fixture::DEMO_SCRIPT_ID));
    }

    #[tokio::test]
    async fn scene_crud_updates_local_state() {
        let studio = studio();
        studio.load_demo_data();

        let mut draft = SceneDraft::from_scene(&studio.scenes()[0]);
        draft.characters = SceneDraft::parse_list("Анна, Борис, Официант");
        let saved = studio.save_scene("scene-1", &draft).await.unwrap();
        assert_eq!(saved.characters.len(), 3);
        assert_eq!(saved.generated_frames.len(), 2);
        assert_eq!(studio.scenes()[0].characters.len(), 3);

        let added = studio.add_scene(None).await.unwrap();
        assert_eq!(added.title, "Сцена 6");

        studio.delete_scene("scene-2").await.unwrap();
        assert_eq!(studio.scenes().len(), 5);
        assert!(matches!(
            studio.delete_scene("scene-2").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn history_selection_moves_current_pointer() {
        let studio = studio();
        studio.load_demo_data();
        studio.select_scene(0).await.unwrap();
        assert_eq!(studio.history().len(), 2);

        let frame = studio.select_history_frame("frame-1-2").unwrap();
        assert_eq!(frame.detail_level, Some(DetailLevel::Sketch));
        assert_eq!(
            studio.current_scene().unwrap().current_frame.unwrap().id,
            "frame-1-2"
        );
        assert!(studio.select_history_frame("nope").is_err());
    }

    #[tokio::test]
    async fn regenerate_replaces_current_frame_and_prompt() {
        let studio = studio();
        studio.load_demo_data();
        studio.select_scene(4).await.unwrap();

        let frame = studio.regenerate("ночь, неон", DetailLevel::Final).await.unwrap();
        let scene = studio.current_scene().unwrap();
        assert_eq!(scene.current_frame.as_ref().unwrap().id, frame.id);
        assert_eq!(scene.prompt.as_deref(), Some("ночь, неон"));
        assert!(studio.history().iter().any(|f| f.id == frame.id));
        assert!(!studio.is_generating("scene-5"));
    }

    #[tokio::test]
    async fn refine_on_fixture_is_unsupported_and_releases_flag() {
        let studio = studio();
        studio.load_demo_data();
        assert!(matches!(
            studio.refine_scene("scene-1", "добавить дождь").await,
            Err(ApiError::Unsupported { .. })
        ));
        assert!(!studio.is_refining("scene-1"));
        assert!(matches!(
            studio.refine_scene("scene-1", "   ").await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn demo_reload_drops_history_of_the_previous_script() {
        let studio = studio();
        studio.load_demo_data();
        studio.select_scene(0).await.unwrap();
        studio
            .wait_for_scenes(&PollCancel::new(), |_| {})
            .await
            .unwrap();
        assert!(studio.last_status().is_some());
        assert!(!studio.history().is_empty());

        studio.load_demo_data();
        assert!(studio.last_status().is_none());
        assert!(studio.history().is_empty());
        assert_eq!(studio.current_index(), 0);
    }

    #[tokio::test]
    async fn export_writes_pdf() {
        let studio = studio();
        studio.load_demo_data();
        let dir = tempfile::tempdir().unwrap();
        let path = studio.export(dir.path()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), fixture::MOCK_PDF);
    }
}
