use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use prompt_slots::PromptSlots;
use scenes::{
    DetailLevel, Frame, FrameCard, GenerateRequest, ParsingStatus, RegenerateRequest, Scene,
    SceneDraft, SceneVisual, ScriptStatus, UploadResponse,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{DataSource, SourceKind};
use crate::error::{ApiError, Result};
use crate::upload::ScriptFile;
use crate::workflow::{WorkflowKind, WorkflowUploadResult};

pub const DEMO_SCRIPT_ID: &str = "mock-script-123";
pub const DEMO_FILE_NAME: &str = "sample_scenario.pdf";
pub const MOCK_PDF: &[u8] = b"Mock PDF content";
const NOT_IMPLEMENTED: &str = "Mock not implemented";

fn demo_frame(id: &str, seed: &str, level: DetailLevel, created_at: &str) -> Frame {
    Frame {
        id: id.to_string(),
        image_url: format!("https://picsum.photos/seed/{seed}/1200/675"),
        detail_level: Some(level),
        created_at: Some(created_at.to_string()),
        ..Frame::default()
    }
}

#[allow(clippy::too_many_arguments)]
fn demo_scene(
    number: u32,
    title: &str,
    location: &str,
    characters: &[&str],
    props: &[&str],
    description: &str,
    prompt: &str,
    frames: Vec<Frame>,
) -> Scene {
    Scene {
        id: format!("scene-{number}"),
        scene_number: Some(number),
        title: title.to_string(),
        location: location.to_string(),
        characters: characters.iter().map(|s| s.to_string()).collect(),
        props: props.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
        prompt: Some(prompt.to_string()),
        current_frame: frames.first().cloned(),
        generated_frames: frames,
        ..Scene::default()
    }
}

/// The five-scene demo script.
pub fn demo_scenes() -> Vec<Scene> {
    vec![
        demo_scene(
            1,
            "Встреча в кафе",
            "Кафе \"Старбакс\", день",
            &["Анна", "Борис"],
            &["Кофе", "Ноутбук", "Телефон"],
            "Анна входит в оживленное кафе и видит Бориса, сидящего за столиком у окна. Он работает за ноутбуком, не замечая её приближения.",
            "Современное кафе Starbucks, яркий дневной свет из больших окон, молодая женщина в пальто входит, мужчина за столиком с ноутбуком, чашка кофе, теплая атмосфера, стиль кинематографической визуализации",
            vec![
                demo_frame("frame-1-1", "scene1", DetailLevel::Mid, "2025-11-02T10:00:00Z"),
                demo_frame("frame-1-2", "scene1v2", DetailLevel::Sketch, "2025-11-02T09:45:00Z"),
            ],
        ),
        demo_scene(
            2,
            "Напряженный разговор",
            "Кафе \"Старбакс\", день (продолжение)",
            &["Анна", "Борис"],
            &["Документы", "Кофе"],
            "Анна садится напротив Бориса и достает папку с документами. Её лицо серьёзно. Борис закрывает ноутбук, понимая важность момента.",
            "Крупный план двух людей за столиком кафе, серьёзное выражение лиц, папка с документами на столе, напряженная атмосфера, драматический свет",
            Vec::new(),
        ),
        demo_scene(
            3,
            "Прогулка по парку",
            "Городской парк, вечер",
            &["Анна", "Борис"],
            &["Зонт", "Сумка"],
            "После встречи Анна и Борис идут через осенний парк. Моросит дождь, они делят один зонт. Разговор стал более доверительным.",
            "Осенний городской парк в сумерках, лёгкий дождь, пара под одним зонтом идёт по аллее с жёлтыми листьями, романтическая атмосфера, киношная картинка",
            vec![demo_frame("frame-3-1", "scene3", DetailLevel::Final, "2025-11-02T10:30:00Z")],
        ),
        demo_scene(
            4,
            "Офисное противостояние",
            "Офис компании, утро",
            &["Борис", "Виктор", "Екатерина"],
            &["Компьютеры", "Документы", "Проектор"],
            "Борис входит в конференц-зал, где его уже ждут Виктор и Екатерина. На экране проектора отображены компрометирующие данные.",
            "Современный офис, конференц-зал, трое людей в деловых костюмах, презентация на большом экране, холодный офисный свет, напряженная деловая атмосфера",
            Vec::new(),
        ),
        demo_scene(
            5,
            "Финальная развязка",
            "Набережная, ночь",
            &["Анна", "Борис"],
            &["Телефон", "Пальто"],
            "Анна и Борис стоят на пустой набережной. Огни города отражаются в воде. Анна передает Борису телефон с важной информацией. Это конец их совместного пути.",
            "Ночная городская набережная, отражения огней в воде, силуэты двух людей на фоне города, драматическое освещение, кинематографичный финал, эмоциональная сцена",
            vec![
                demo_frame("frame-5-1", "scene5", DetailLevel::Mid, "2025-11-02T11:00:00Z"),
                demo_frame("frame-5-2", "scene5v2", DetailLevel::Sketch, "2025-11-02T10:45:00Z"),
            ],
        ),
    ]
}

pub fn demo_upload() -> UploadResponse {
    UploadResponse {
        script_id: DEMO_SCRIPT_ID.to_string(),
        filename: DEMO_FILE_NAME.to_string(),
        status: ScriptStatus::Parsed,
        scenes: demo_scenes(),
        chunk_files: Vec::new(),
    }
}

/// In-memory stand-in for the backend, seeded with the demo script.
///
/// Writes are kept, so an added scene or a generated frame shows up in later
/// reads. Endpoints without a fixture answer with [`ApiError::Unsupported`].
pub struct FixtureSource {
    scenes: Mutex<Vec<Scene>>,
    latency: Duration,
    next_id: AtomicU64,
}

impl FixtureSource {
    pub fn new(latency: Duration) -> Self {
        Self {
            scenes: Mutex::new(demo_scenes()),
            latency,
            next_id: AtomicU64::new(1),
        }
    }

    /// No simulated delay; used by tests and the offline CLI.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-mock-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn unsupported(operation: &'static str) -> ApiError {
        ApiError::Unsupported {
            operation,
            kind: SourceKind::Fixture,
        }
    }

    fn new_frame(&self, level: DetailLevel, prompt: Option<String>) -> Frame {
        let id = self.next("frame");
        Frame {
            image_url: format!("https://picsum.photos/seed/{id}/1200/675"),
            id,
            detail_level: Some(level),
            prompt: Some(prompt.unwrap_or_else(|| "Автоматически сгенерированный промпт...".into())),
            created_at: Some(Utc::now().to_rfc3339()),
            ..Frame::default()
        }
    }

    fn record_frame(&self, scene_id: &str, mut frame: Frame) -> Frame {
        frame.scene_id = Some(scene_id.to_string());
        if let Some(scene) = self.scenes.lock().iter_mut().find(|s| s.id == scene_id) {
            scene.push_frame(frame.clone());
        }
        frame
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fixture
    }

    async fn upload_script(&self, file: &ScriptFile) -> Result<UploadResponse> {
        debug!(target: "previz::fixture", file = %file.file_name, "upload");
        self.delay().await;
        Ok(demo_upload())
    }

    async fn script_status(&self, script_id: &str) -> Result<ParsingStatus> {
        self.delay().await;
        let total = self.scenes.lock().len() as u64;
        Ok(ParsingStatus::new(script_id, ScriptStatus::Parsed, total))
    }

    async fn get_scenes(&self, _script_id: &str) -> Result<Vec<Scene>> {
        self.delay().await;
        Ok(self.scenes.lock().clone())
    }

    async fn update_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.delay().await;
        let mut scenes = self.scenes.lock();
        match scenes.iter_mut().find(|s| s.id == scene_id) {
            Some(scene) => {
                draft.apply_to(scene);
                Ok(scene.clone())
            }
            None => {
                let mut scene = Scene {
                    id: scene_id.to_string(),
                    ..Scene::default()
                };
                draft.apply_to(&mut scene);
                Ok(scene)
            }
        }
    }

    async fn delete_scene(&self, scene_id: &str) -> Result<()> {
        self.delay().await;
        self.scenes.lock().retain(|s| s.id != scene_id);
        Ok(())
    }

    async fn add_scene(&self, _script_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.delay().await;
        let mut scenes = self.scenes.lock();
        let mut scene = Scene {
            id: self.next("scene"),
            scene_number: Some(scenes.len() as u32 + 1),
            ..Scene::default()
        };
        draft.apply_to(&mut scene);
        scene.prompt = None;
        scenes.push(scene.clone());
        Ok(scene)
    }

    async fn refine_scene(&self, _scene_id: &str, _instruction: &str) -> Result<Scene> {
        Err(Self::unsupported("refine_scene"))
    }

    async fn enrich_scene(&self, _scene_id: &str) -> Result<Value> {
        Err(Self::unsupported("enrich_scene"))
    }

    async fn generate_frame(&self, scene_id: &str, request: &GenerateRequest) -> Result<Frame> {
        self.delay().await;
        let mut frame = self.new_frame(request.detail_level, request.prompt.clone());
        frame.path = request.path;
        frame.seed = request.seed;
        frame.model = request.model.clone();
        Ok(self.record_frame(scene_id, frame))
    }

    async fn generate_progressive_frame(
        &self,
        scene_id: &str,
        request: &GenerateRequest,
    ) -> Result<Frame> {
        self.generate_frame(scene_id, request).await
    }

    async fn regenerate_frame(&self, frame_id: &str, request: &RegenerateRequest) -> Result<Frame> {
        self.delay().await;
        let mut frame = self.new_frame(request.detail_level, Some(request.prompt.clone()));
        frame.path = request.path;

        let owner = self
            .scenes
            .lock()
            .iter()
            .find(|s| s.generated_frames.iter().any(|f| f.id == frame_id))
            .map(|s| s.id.clone());
        Ok(match owner {
            Some(scene_id) => self.record_frame(&scene_id, frame),
            None => frame,
        })
    }

    async fn frame_history(&self, scene_id: &str) -> Result<Vec<Frame>> {
        self.delay().await;
        Ok(self
            .scenes
            .lock()
            .iter()
            .find(|s| s.id == scene_id)
            .map(|s| s.generated_frames.clone())
            .unwrap_or_default())
    }

    async fn export_storyboard(&self, _script_id: &str) -> Result<Vec<u8>> {
        self.delay().await;
        Ok(MOCK_PDF.to_vec())
    }

    async fn frame_cards(&self, _script_id: &str) -> Result<Vec<FrameCard>> {
        Err(Self::unsupported("frame_cards"))
    }

    async fn get_slots(&self, _scene_id: &str) -> Result<Option<PromptSlots>> {
        Ok(None)
    }

    async fn update_slots(
        &self,
        _scene_id: &str,
        _slots: &PromptSlots,
        _update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        Ok(None)
    }

    async fn scene_visual(&self, _scene_id: &str) -> Result<SceneVisual> {
        Err(Self::unsupported("scene_visual"))
    }

    async fn upload_workflow(
        &self,
        _kind: WorkflowKind,
        _file_name: &str,
        _content: Vec<u8>,
    ) -> Result<WorkflowUploadResult> {
        Ok(WorkflowUploadResult::failed(NOT_IMPLEMENTED))
    }

    async fn workflows_info(&self) -> Result<Value> {
        Ok(json!({ "success": false, "error": NOT_IMPLEMENTED }))
    }
}
