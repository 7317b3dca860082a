use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use previz_api::generation::{self, GenerateOptions, GenerationMode};
use previz_api::{
    build_source, ClientConfig, ComfyProbe, DataSource, ParsePoller, PollCancel, PollOutcome,
    ScriptFile, SourceSelection, WorkflowFile, WorkflowKind,
};
use prompt_slots::{preview, validate, PromptSlots};
use scenes::{DetailLevel, Frame, Scene, SceneDraft};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "previz-cli")]
#[command(about = "PreViz Studio CLI - script upload, scene review and storyboard frame generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL (e.g. http://localhost:8080/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Fall back to demo data when the backend fails
    #[arg(long, global = true)]
    mocks: bool,

    /// Use demo data only, without contacting the backend
    #[arg(long, global = true)]
    offline: bool,

    /// Override the ComfyUI URL
    #[arg(long, global = true)]
    comfy_url: Option<String>,

    /// Print raw JSON instead of summaries
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a script (PDF, DOCX or DOC)
    Upload {
        file: PathBuf,

        /// Poll until parsing finishes and print the scenes
        #[arg(long)]
        wait: bool,
    },

    /// Show the parsing status of a script
    Status { script_id: String },

    /// Poll until a script is parsed
    Wait { script_id: String },

    /// Scene management
    #[command(subcommand)]
    Scenes(SceneCommand),

    /// Generate a frame for a scene
    Generate {
        scene_id: String,

        /// Detail level (sketch, mid, final)
        #[arg(short, long, default_value = "sketch")]
        level: DetailLevel,

        /// Skip intermediate levels and render final directly
        #[arg(long)]
        direct_final: bool,

        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        seed: Option<i64>,

        #[arg(long)]
        model: Option<String>,
    },

    /// Regenerate a frame with a new prompt
    Regenerate {
        frame_id: String,

        #[arg(short, long)]
        prompt: String,

        #[arg(short, long, default_value = "final")]
        level: DetailLevel,
    },

    /// List generated frames of a scene
    History { scene_id: String },

    /// Download the storyboard PDF
    Export {
        script_id: String,

        /// Output file, or a directory for an auto-named file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Frame cards of a script
    Cards { script_id: String },

    /// Prompt slots
    #[command(subcommand)]
    Slots(SlotsCommand),

    /// ComfyUI workflow files
    #[command(subcommand)]
    Workflow(WorkflowCommand),

    /// Check the ComfyUI connection
    ComfyStatus,
}

#[derive(Args)]
struct SceneFields {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Comma-separated
    #[arg(long)]
    characters: Option<String>,

    /// Comma-separated
    #[arg(long)]
    props: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    prompt: Option<String>,
}

impl SceneFields {
    fn apply(self, draft: &mut SceneDraft) {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(characters) = self.characters {
            draft.characters = SceneDraft::parse_list(&characters);
        }
        if let Some(props) = self.props {
            draft.props = SceneDraft::parse_list(&props);
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if self.prompt.is_some() {
            draft.prompt = self.prompt;
        }
    }
}

#[derive(Subcommand)]
enum SceneCommand {
    /// List scenes of a script
    List { script_id: String },

    /// Append a scene to a script
    Add {
        script_id: String,

        #[command(flatten)]
        fields: SceneFields,
    },

    /// Edit a scene; unspecified fields keep their current values
    Update {
        scene_id: String,

        /// Script the scene belongs to
        #[arg(long)]
        script: String,

        #[command(flatten)]
        fields: SceneFields,
    },

    Delete { scene_id: String },

    /// Ask the backend to rework a scene with a short instruction
    Refine { scene_id: String, instruction: String },

    /// Run enrichment and show the scene's visualization data
    Enrich { script_id: String, scene_id: String },
}

#[derive(Subcommand)]
enum SlotsCommand {
    Get { scene_id: String },

    /// Store slots from a JSON file
    Put {
        scene_id: String,
        file: PathBuf,

        /// Also rewrite the scene's prompt from the slots
        #[arg(long)]
        update_scene: bool,
    },

    /// Render the prompt preview of a local slots file
    Preview { file: PathBuf },

    /// Check a local slots file for missing required fields
    Validate { file: PathBuf },
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// Check a workflow JSON for required nodes
    Validate {
        file: PathBuf,

        #[arg(short, long, default_value = "text2img")]
        kind: WorkflowKind,
    },

    /// Validate and upload a workflow
    Upload {
        file: PathBuf,

        #[arg(short, long, default_value = "text2img")]
        kind: WorkflowKind,
    },

    /// Show the workflows installed on the backend
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    let selection = SourceSelection::from_config(&config, cli.offline);
    let source = build_source(&config, selection).context("Failed to set up the data source")?;
    let json = cli.json;

    match cli.command {
        Commands::Upload { file, wait } => upload_command(&source, &config, &file, wait, json).await,
        Commands::Status { script_id } => status_command(&source, &script_id, json).await,
        Commands::Wait { script_id } => wait_command(&source, &config, &script_id, json).await,
        Commands::Scenes(command) => scenes_command(&source, command, json).await,
        Commands::Generate {
            scene_id,
            level,
            direct_final,
            prompt,
            seed,
            model,
        } => {
            let options = GenerateOptions {
                prompt,
                seed,
                model,
            };
            generate_command(&source, &scene_id, level, direct_final, &options, json).await
        }
        Commands::Regenerate {
            frame_id,
            prompt,
            level,
        } => regenerate_command(&source, &frame_id, &prompt, level, json).await,
        Commands::History { scene_id } => history_command(&source, &scene_id, json).await,
        Commands::Export { script_id, output } => export_command(&source, &script_id, output).await,
        Commands::Cards { script_id } => {
            let cards = source.frame_cards(&script_id).await?;
            print_json(&cards)
        }
        Commands::Slots(command) => slots_command(&source, command, json).await,
        Commands::Workflow(command) => workflow_command(&source, command).await,
        Commands::ComfyStatus => comfy_status_command(&config, json).await,
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ClientConfig::from_env(),
    };
    if let Some(url) = &cli.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if cli.mocks {
        config = config.with_mocks(true);
    }
    if let Some(url) = &cli.comfy_url {
        config = config.with_comfy_url(url.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_scenes(scenes: &[Scene], json: bool) -> Result<()> {
    if json {
        return print_json(&scenes);
    }
    for scene in scenes {
        println!("{}  {}", scene.id, scene.label());
        if !scene.location.is_empty() {
            println!("    {}", scene.location);
        }
        if !scene.characters.is_empty() {
            println!("    {}", scene.characters.join(", "));
        }
        println!("    frames: {}", scene.generated_frames.len());
    }
    Ok(())
}

fn print_frame(frame: &Frame, json: bool) -> Result<()> {
    if json {
        return print_json(frame);
    }
    let level = frame
        .detail_level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "?".to_string());
    let created = frame
        .created_at_utc()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!("{}  [{}]  {}  {}", frame.id, level, created, frame.image_url);
    Ok(())
}

/// Cancels `cancel` on Ctrl-C.
fn cancel_on_ctrl_c(cancel: &PollCancel) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

async fn poll_until_parsed(
    source: &Arc<dyn DataSource>,
    config: &ClientConfig,
    script_id: &str,
    json: bool,
) -> Result<()> {
    let cancel = PollCancel::new();
    cancel_on_ctrl_c(&cancel);

    let outcome = ParsePoller::from_config(config)
        .run(source.as_ref(), script_id, &cancel, |status| {
            info!("{}", status.progress_line())
        })
        .await
        .context("Status polling stopped")?;

    match outcome {
        PollOutcome::Parsed { scenes, .. } => print_scenes(&scenes, json),
        PollOutcome::ParsedEmpty(_) => {
            println!("Script parsed, but no scenes were found");
            Ok(())
        }
        PollOutcome::Failed(status) => bail!("Script parsing failed: {}", status.progress_line()),
    }
}

async fn upload_command(
    source: &Arc<dyn DataSource>,
    config: &ClientConfig,
    path: &Path,
    wait: bool,
    json: bool,
) -> Result<()> {
    let file = ScriptFile::from_path(path).await?;
    info!("Uploading {} ({} bytes)", file.file_name, file.len());

    let response = source.upload_script(&file).await.context("Upload failed")?;
    if json {
        print_json(&response)?;
    } else {
        println!("script: {}", response.script_id);
        println!("status: {}", response.status);
    }

    if wait && !response.status.is_terminal() {
        poll_until_parsed(source, config, &response.script_id, json).await?;
    } else if wait {
        print_scenes(&response.scenes, json)?;
    }
    Ok(())
}

async fn status_command(source: &Arc<dyn DataSource>, script_id: &str, json: bool) -> Result<()> {
    let status = source.script_status(script_id).await?;
    if json {
        print_json(&status)
    } else {
        println!("{}", status.progress_line());
        Ok(())
    }
}

async fn wait_command(
    source: &Arc<dyn DataSource>,
    config: &ClientConfig,
    script_id: &str,
    json: bool,
) -> Result<()> {
    poll_until_parsed(source, config, script_id, json).await
}

async fn scenes_command(source: &Arc<dyn DataSource>, command: SceneCommand, json: bool) -> Result<()> {
    match command {
        SceneCommand::List { script_id } => {
            let scenes = source.get_scenes(&script_id).await?;
            print_scenes(&scenes, json)
        }
        SceneCommand::Add { script_id, fields } => {
            let count = source.get_scenes(&script_id).await.map(|s| s.len()).unwrap_or(0);
            let mut draft = SceneDraft {
                title: format!("Сцена {}", count + 1),
                ..SceneDraft::default()
            };
            fields.apply(&mut draft);
            let scene = source.add_scene(&script_id, &draft).await?;
            print_scenes(std::slice::from_ref(&scene), json)
        }
        SceneCommand::Update {
            scene_id,
            script,
            fields,
        } => {
            let scenes = source.get_scenes(&script).await?;
            let current = scenes
                .iter()
                .find(|s| s.id == scene_id)
                .with_context(|| format!("Scene {scene_id} not found in script {script}"))?;
            let mut draft = SceneDraft::from_scene(current);
            fields.apply(&mut draft);
            let scene = source.update_scene(&scene_id, &draft).await?;
            print_scenes(std::slice::from_ref(&scene), json)
        }
        SceneCommand::Delete { scene_id } => {
            source.delete_scene(&scene_id).await?;
            println!("Deleted {scene_id}");
            Ok(())
        }
        SceneCommand::Refine {
            scene_id,
            instruction,
        } => {
            let instruction = instruction.trim();
            if instruction.is_empty() {
                bail!("Refine instruction is empty");
            }
            let scene = source.refine_scene(&scene_id, instruction).await?;
            print_scenes(std::slice::from_ref(&scene), json)
        }
        SceneCommand::Enrich {
            script_id,
            scene_id,
        } => {
            let outcome =
                previz_api::enrich_scene_flow(source.as_ref(), &script_id, &scene_id).await?;
            match outcome.visual {
                Some(visual) if !json => {
                    if let Some(prompt) = &visual.flux_prompt {
                        println!("prompt: {prompt}");
                    }
                    if let Some(enriched) = visual.pretty_enriched_json() {
                        println!("{enriched}");
                    }
                    Ok(())
                }
                Some(visual) => print_json(&visual),
                None => {
                    println!("Scene enriched; no visualization data available yet");
                    Ok(())
                }
            }
        }
    }
}

async fn generate_command(
    source: &Arc<dyn DataSource>,
    scene_id: &str,
    level: DetailLevel,
    direct_final: bool,
    options: &GenerateOptions,
    json: bool,
) -> Result<()> {
    match source.frame_history(scene_id).await {
        Ok(history) => {
            let scene = Scene {
                id: scene_id.to_string(),
                generated_frames: history,
                ..Scene::default()
            };
            if let Some(advice) = generation::sketch_advisory(&scene, level, direct_final) {
                warn!("{advice}");
            }
        }
        Err(e) => warn!("Could not check frame history: {}", e),
    }

    let mode = GenerationMode::select(level, direct_final);
    let frame = generation::generate(source.as_ref(), scene_id, mode, options)
        .await
        .context("Generation failed")?;
    print_frame(&frame, json)
}

async fn regenerate_command(
    source: &Arc<dyn DataSource>,
    frame_id: &str,
    prompt: &str,
    level: DetailLevel,
    json: bool,
) -> Result<()> {
    let frame = generation::regenerate_frame(source.as_ref(), frame_id, prompt, level).await?;
    print_frame(&frame, json)
}

async fn history_command(source: &Arc<dyn DataSource>, scene_id: &str, json: bool) -> Result<()> {
    let frames = source.frame_history(scene_id).await?;
    if json {
        return print_json(&frames);
    }
    if frames.is_empty() {
        println!("No frames yet");
    }
    for frame in &frames {
        print_frame(frame, false)?;
    }
    Ok(())
}

async fn export_command(
    source: &Arc<dyn DataSource>,
    script_id: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from("."));
    let path = if output.is_dir() {
        generation::export_storyboard(source.as_ref(), script_id, &output).await?
    } else {
        let bytes = source.export_storyboard(script_id).await?;
        tokio::fs::write(&output, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        output
    };
    println!("Storyboard saved to {}", path.display());
    Ok(())
}

async fn read_slots(path: &Path) -> Result<PromptSlots> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(PromptSlots::from_partial(Some(value))?)
}

async fn slots_command(source: &Arc<dyn DataSource>, command: SlotsCommand, json: bool) -> Result<()> {
    match command {
        SlotsCommand::Get { scene_id } => match source.get_slots(&scene_id).await? {
            Some(slots) if json => print_json(&slots),
            Some(slots) => {
                println!("{}", preview(&slots));
                Ok(())
            }
            None => {
                println!("No slots stored for {scene_id}");
                Ok(())
            }
        },
        SlotsCommand::Put {
            scene_id,
            file,
            update_scene,
        } => {
            let slots = read_slots(&file).await?;
            let report = validate(&slots);
            if !report.is_valid() {
                for issue in &report.issues {
                    warn!("{}", issue.message);
                }
                bail!("Slots are incomplete, nothing was saved");
            }
            match source.update_slots(&scene_id, &slots, update_scene).await? {
                Some(visual) => print_json(&visual),
                None => {
                    println!("Slots saved");
                    Ok(())
                }
            }
        }
        SlotsCommand::Preview { file } => {
            let slots = read_slots(&file).await?;
            println!("{}", preview(&slots));
            Ok(())
        }
        SlotsCommand::Validate { file } => {
            let slots = read_slots(&file).await?;
            let report = validate(&slots);
            if report.is_valid() {
                println!("OK");
                return Ok(());
            }
            for issue in &report.issues {
                println!("{}", issue.message);
            }
            bail!("{} required field(s) missing", report.len())
        }
    }
}

async fn workflow_command(source: &Arc<dyn DataSource>, command: WorkflowCommand) -> Result<()> {
    match command {
        WorkflowCommand::Validate { file, kind } => {
            let workflow = WorkflowFile::load(&file, kind).await?;
            println!(
                "{}: valid {} workflow with {} nodes",
                file.display(),
                kind.as_str(),
                workflow.node_count()
            );
            Ok(())
        }
        WorkflowCommand::Upload { file, kind } => {
            let workflow = WorkflowFile::load(&file, kind).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.json", kind.as_str()));
            let result = source
                .upload_workflow(kind, &file_name, workflow.to_bytes()?)
                .await?;
            println!("{}", result.summary());
            if !result.success {
                bail!("Workflow upload rejected");
            }
            Ok(())
        }
        WorkflowCommand::Info => {
            let info = source.workflows_info().await?;
            print_json(&info)
        }
    }
}

async fn comfy_status_command(config: &ClientConfig, json: bool) -> Result<()> {
    let probe = ComfyProbe::new(&config.comfy_url)?;
    let status = probe.check().await;
    if json {
        return print_json(&status);
    }
    if status.connected {
        println!("ComfyUI подключен: {}", status.url);
    } else {
        println!(
            "{}",
            status.error.as_deref().unwrap_or("ComfyUI недоступен")
        );
    }
    Ok(())
}
