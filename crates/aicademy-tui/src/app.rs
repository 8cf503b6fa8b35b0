use std::path::{Path, PathBuf};
use std::sync::Arc;

use aicademy_core::controller::missing_prerequisites;
use aicademy_core::sections::{page_markers, parse_pages};
use aicademy_core::upload::validate_uploads;
use aicademy_core::{
    Backend, BriefsController, ChatMessage, Config, EntryOutcome, Navigation, RefineAction,
    RefineOutcome, SourceDocument, Stage, StageController, StagePhase, StoreHandle, UploadFile,
    WorkflowError, WorkflowStep, WorkflowStore, WorkflowType,
};
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::form::{Form, FormKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Form,
    Canvas,
    Chat,
}

/// What the input line feeds when submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTarget {
    Chat,
    Selection,
    ImportPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Current,
    Blocked,
    Pending,
}

/// Result of a background task, applied on the next tick
pub enum TaskOutput {
    Entered(EntryOutcome),
    Refined(RefineOutcome),
    Parsed(Result<(Vec<UploadFile>, Vec<SourceDocument>), WorkflowError>),
    Exported(anyhow::Result<PathBuf>),
    Imported(Result<String, WorkflowError>),
}

/// The controller behind a generated step
#[derive(Clone)]
pub enum StageHandle {
    Single(StageController),
    Briefs(BriefsController),
}

impl StageHandle {
    pub fn phase(&self) -> StagePhase {
        match self {
            StageHandle::Single(c) => c.phase(),
            StageHandle::Briefs(c) => c.phase(),
        }
    }

    pub fn conversation(&self) -> Vec<ChatMessage> {
        match self {
            StageHandle::Single(c) => c.conversation(),
            StageHandle::Briefs(c) => c.conversation(),
        }
    }

    pub fn progress(&self) -> Option<String> {
        match self {
            StageHandle::Single(c) => c.progress(),
            StageHandle::Briefs(c) => c.progress(),
        }
    }

    pub fn artifact(&self) -> String {
        match self {
            StageHandle::Single(c) => c.artifact(),
            StageHandle::Briefs(c) => c.artifact(),
        }
    }

    pub fn set_artifact(&self, content: String) {
        match self {
            StageHandle::Single(c) => c.set_artifact(content),
            StageHandle::Briefs(c) => c.set_artifact(content),
        }
    }

    pub async fn enter(&self) -> EntryOutcome {
        match self {
            StageHandle::Single(c) => c.enter().await,
            StageHandle::Briefs(c) => c.enter().await,
        }
    }

    pub async fn refine(&self, action: RefineAction) -> RefineOutcome {
        match self {
            StageHandle::Single(c) => c.refine(action).await,
            StageHandle::Briefs(c) => c.refine(action).await,
        }
    }
}

/// A paragraph of the artifact and the line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub line: usize,
    pub text: String,
}

pub fn blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(Block {
                    line: start,
                    text: current.join("\n"),
                });
                current.clear();
            }
        } else {
            if current.is_empty() {
                start = idx;
            }
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(Block {
            line: start,
            text: current.join("\n"),
        });
    }
    blocks
}

/// Heading line of the next (or previous) page relative to `current`
pub fn page_jump_target(brief_content: &str, current: usize, forward: bool) -> Option<usize> {
    let lines = page_markers(brief_content).into_iter().map(|m| m.line);
    if forward {
        lines.into_iter().find(|line| *line > current)
    } else {
        lines.into_iter().rev().find(|line| *line < current)
    }
}

/// `Page 2/4: Title` for the page whose heading is at or above `scroll`
pub fn page_label(brief_content: &str, scroll: usize) -> Option<String> {
    let page = page_markers(brief_content)
        .into_iter()
        .rev()
        .find(|m| m.line <= scroll)?;
    let total = parse_pages(brief_content).len();
    Some(if page.title.is_empty() {
        format!("Page {}/{}", page.page_number, total)
    } else {
        format!("Page {}/{}: {}", page.page_number, total, page.title)
    })
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub step: WorkflowStep,
    pub status: Option<String>,

    // Workflow
    pub config: Config,
    pub store: StoreHandle,
    backend: Arc<dyn Backend>,
    stages: Vec<StageController>,
    pub briefs: BriefsController,
    source_paths: Vec<String>,

    // Form (configuration steps only)
    pub form: Option<Form>,

    // Canvas state
    pub canvas_scroll: u16,
    pub canvas_height: u16,
    pub selected_block: usize,

    // Chat state
    pub input: String,
    pub input_cursor: usize,
    pub prompt: PromptTarget,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Layout areas for mouse hit-testing
    pub canvas_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    // Background work
    pub task: Option<JoinHandle<TaskOutput>>,
    pub task_label: &'static str,
    pub animation_frame: u8,
    pub edit_requested: bool,

    pub sidebar_collapsed: bool,
}

fn build_controllers(
    store: &StoreHandle,
    backend: &Arc<dyn Backend>,
) -> (Vec<StageController>, BriefsController) {
    let stages = [Stage::Outline, Stage::Connect, Stage::Test, Stage::Summary]
        .into_iter()
        .map(|stage| StageController::new(stage, store.clone(), backend.clone()))
        .collect();
    (stages, BriefsController::new(store.clone(), backend.clone()))
}

impl App {
    pub fn new(config: Config, workflow_type: WorkflowType, backend: Arc<dyn Backend>) -> Self {
        let store = StoreHandle::new(WorkflowStore::new(config.discard_stale_responses));
        store.update(|s| s.set_workflow_type(workflow_type));
        let (stages, briefs) = build_controllers(&store, &backend);
        let sidebar_collapsed = config.sidebar_collapsed;

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Form,
            step: WorkflowStep::Configuration,
            status: None,

            config,
            store,
            backend,
            stages,
            briefs,
            source_paths: Vec::new(),

            form: None,

            canvas_scroll: 0,
            canvas_height: 0,
            selected_block: 0,

            input: String::new(),
            input_cursor: 0,
            prompt: PromptTarget::Chat,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            canvas_area: None,
            chat_area: None,

            task: None,
            task_label: "",
            animation_frame: 0,
            edit_requested: false,

            sidebar_collapsed,
        };
        app.goto_step(WorkflowStep::Configuration);
        app
    }

    pub fn workflow_type(&self) -> WorkflowType {
        self.store.read(|s| s.state().workflow_type)
    }

    pub fn workflow_title(&self) -> Option<String> {
        self.store.read(|s| {
            s.state()
                .configuration
                .as_ref()
                .map(|c| c.title.clone())
                .filter(|t| !t.trim().is_empty())
        })
    }

    pub fn stage_handle(&self, stage: Stage) -> Option<StageHandle> {
        if stage == Stage::Briefs {
            return Some(StageHandle::Briefs(self.briefs.clone()));
        }
        self.stages
            .iter()
            .find(|c| c.stage() == stage)
            .cloned()
            .map(StageHandle::Single)
    }

    /// Controller for the step on screen, if it is a generated step
    pub fn current_handle(&self) -> Option<StageHandle> {
        self.step.stage().and_then(|stage| self.stage_handle(stage))
    }

    pub fn is_busy(&self) -> bool {
        self.task.is_some() || self.store.is_generating()
    }

    pub fn step_status(&self, step: WorkflowStep) -> StepStatus {
        if step == self.step {
            return StepStatus::Current;
        }
        let state = self.store.snapshot();
        let done = match step {
            WorkflowStep::Configuration => {
                state.configuration.is_some() && !state.parsed_sources.is_empty()
            }
            WorkflowStep::ConnectConfiguration => state.connect_configuration.is_some(),
            WorkflowStep::Briefs => !state.briefs.is_empty(),
            WorkflowStep::Outline => !state.outline_content.trim().is_empty(),
            WorkflowStep::Connect => !state.connect_content.trim().is_empty(),
            WorkflowStep::TestYourself => !state.test_content.trim().is_empty(),
            WorkflowStep::ExecutiveSummary => !state.summary_content.trim().is_empty(),
        };
        if done {
            return StepStatus::Done;
        }
        match step.stage() {
            Some(stage) if !missing_prerequisites(stage, &state).is_empty() => StepStatus::Blocked,
            _ => StepStatus::Pending,
        }
    }

    // Navigation

    pub fn goto_step(&mut self, step: WorkflowStep) {
        info!(?step, "entering step");
        self.step = step;
        self.canvas_scroll = 0;
        self.selected_block = 0;
        self.chat_scroll = 0;
        self.input_mode = InputMode::Normal;
        self.status = None;

        let state = self.store.snapshot();
        match step {
            WorkflowStep::Configuration => {
                self.store.update(|s| s.set_current_stage(Some(step)));
                let paths = if self.source_paths.is_empty() {
                    state.source_files.iter().map(|f| f.name.clone()).collect()
                } else {
                    self.source_paths.clone()
                };
                self.form = Some(Form::configuration(
                    state.configuration.as_ref(),
                    &paths,
                    state.workflow_type,
                ));
                self.focus = FocusPane::Form;
            }
            WorkflowStep::ConnectConfiguration => {
                self.store.update(|s| s.set_current_stage(Some(step)));
                self.form = Some(Form::connect(state.connect_configuration.as_ref()));
                self.focus = FocusPane::Form;
            }
            _ => {
                self.form = None;
                self.focus = FocusPane::Canvas;
                if let Some(handle) = self.current_handle() {
                    self.spawn("Generating", async move {
                        TaskOutput::Entered(handle.enter().await)
                    });
                }
            }
        }
    }

    pub fn next_step(&mut self) {
        if self.guard_busy() {
            return;
        }
        if self.step == WorkflowStep::Briefs {
            match self.briefs.next() {
                Navigation::Brief(ordinal) => self.open_brief(ordinal),
                Navigation::Step(step) => self.goto_step(step),
            }
            return;
        }
        if let Some(next) = self.workflow_type().next_step(self.step) {
            self.goto_step(next);
        }
    }

    pub fn previous_step(&mut self) {
        if self.guard_busy() {
            return;
        }
        if self.step == WorkflowStep::Briefs {
            match self.briefs.previous() {
                Navigation::Brief(ordinal) => self.open_brief(ordinal),
                Navigation::Step(step) => self.goto_step(step),
            }
            return;
        }
        if let Some(previous) = self.workflow_type().previous_step(self.step) {
            self.goto_step(previous);
        }
    }

    fn open_brief(&mut self, ordinal: u32) {
        self.canvas_scroll = 0;
        self.selected_block = 0;
        let briefs = self.briefs.clone();
        self.spawn("Generating brief", async move {
            TaskOutput::Entered(briefs.open(ordinal).await)
        });
    }

    /// Jump to the step that owns a missing prerequisite
    pub fn follow_redirect(&mut self) {
        if self.guard_busy() {
            return;
        }
        let redirect = match self.current_handle().map(|h| h.phase()) {
            Some(StagePhase::Blocked { redirect, .. }) => redirect,
            _ => return,
        };
        self.goto_step(redirect);
    }

    pub fn reset(&mut self) {
        if self.guard_busy() {
            return;
        }
        let workflow_type = self.workflow_type();
        self.store.update(|s| {
            s.reset();
            s.set_workflow_type(workflow_type);
        });
        let (stages, briefs) = build_controllers(&self.store, &self.backend);
        self.stages = stages;
        self.briefs = briefs;
        self.source_paths.clear();
        self.goto_step(WorkflowStep::Configuration);
        self.status = Some("Workflow reset.".to_string());
    }

    // Background tasks

    fn guard_busy(&mut self) -> bool {
        if self.is_busy() {
            self.status = Some("Wait for the current request to finish.".to_string());
            return true;
        }
        false
    }

    fn spawn<F>(&mut self, label: &'static str, task: F)
    where
        F: std::future::Future<Output = TaskOutput> + Send + 'static,
    {
        if self.task.is_some() {
            self.status = Some("Wait for the current request to finish.".to_string());
            return;
        }
        self.task_label = label;
        self.task = Some(tokio::spawn(task));
    }

    /// Apply the background task result once it has finished
    pub async fn poll_task(&mut self) {
        let finished = self.task.as_ref().is_some_and(|t| t.is_finished());
        if !finished {
            return;
        }
        if let Some(handle) = self.task.take() {
            match handle.await {
                Ok(output) => self.apply(output),
                Err(e) => {
                    warn!(error = %e, "background task panicked");
                    self.status = Some("Background task failed.".to_string());
                }
            }
        }
    }

    fn apply(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Entered(outcome) => {
                self.status = match outcome {
                    EntryOutcome::Generated | EntryOutcome::Reused => None,
                    EntryOutcome::Blocked { missing, redirect } => {
                        let needs: Vec<&str> = missing.iter().map(|p| p.description()).collect();
                        Some(format!(
                            "Needs {}. Press r to open {}.",
                            needs.join(", "),
                            redirect.label()
                        ))
                    }
                    EntryOutcome::Busy => Some("Another request is in flight.".to_string()),
                    EntryOutcome::Superseded => {
                        Some("Kept your edits; the generated version was dropped.".to_string())
                    }
                    EntryOutcome::Failed => {
                        Some("Generation failed. See the chat for details.".to_string())
                    }
                };
                self.scroll_chat_to_bottom();
            }
            TaskOutput::Refined(outcome) => {
                self.status = match outcome {
                    RefineOutcome::Completed { changed: true } => None,
                    RefineOutcome::Completed { changed: false } => {
                        Some("The artifact was left unchanged.".to_string())
                    }
                    RefineOutcome::NoArtifact => Some("Nothing to refine yet.".to_string()),
                    RefineOutcome::Busy => Some("Another request is in flight.".to_string()),
                    RefineOutcome::Failed => Some("Request failed.".to_string()),
                };
                self.scroll_chat_to_bottom();
            }
            TaskOutput::Parsed(Ok((files, parsed))) => {
                info!(files = files.len(), documents = parsed.len(), "sources parsed");
                self.store.update(|s| {
                    s.set_source_files(files);
                    s.set_parsed_sources(parsed);
                });
                if let Some(next) = self.workflow_type().next_step(WorkflowStep::Configuration) {
                    self.goto_step(next);
                }
            }
            TaskOutput::Parsed(Err(e)) => {
                warn!(error = %e, "parsing sources failed");
                self.source_paths.clear();
                self.set_form_error(e.to_string());
            }
            TaskOutput::Exported(Ok(path)) => {
                self.status = Some(format!("Saved to {}", path.display()));
            }
            TaskOutput::Exported(Err(e)) => {
                warn!(error = %e, "export failed");
                self.status = Some(format!("Export failed: {}", e));
            }
            TaskOutput::Imported(Ok(content)) => {
                if let Some(handle) = self.current_handle() {
                    handle.set_artifact(content);
                    self.status = Some("Imported.".to_string());
                }
            }
            TaskOutput::Imported(Err(e)) => {
                warn!(error = %e, "import failed");
                self.status = Some(format!("Import failed: {}", e));
            }
        }
    }

    fn set_form_error(&mut self, message: String) {
        match self.form.as_mut() {
            Some(form) => form.error = Some(message),
            None => self.status = Some(message),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.task.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }

    // Forms

    pub fn submit_form(&mut self) {
        if self.guard_busy() {
            return;
        }
        let Some(form) = self.form.as_ref() else {
            return;
        };

        match form.kind {
            FormKind::Configuration => {
                let configuration = form.to_configuration();
                let paths = form.source_paths();
                if let Err(e) = configuration.validate() {
                    self.set_form_error(e.to_string());
                    return;
                }
                self.store
                    .update(|s| s.set_configuration(Some(configuration)));

                let already_parsed = self.store.read(|s| !s.state().parsed_sources.is_empty());
                if already_parsed && paths == self.source_paths {
                    let next = self.workflow_type().next_step(WorkflowStep::Configuration);
                    if let Some(next) = next {
                        self.goto_step(next);
                    }
                    return;
                }

                self.source_paths = paths.clone();
                let backend = self.backend.clone();
                let limits = self.config.clone();
                self.spawn("Parsing sources", async move {
                    TaskOutput::Parsed(parse_sources(backend, paths, limits).await)
                });
            }
            FormKind::Connect => {
                let connect = form.to_connect_configuration();
                if let Err(e) = connect.validate() {
                    self.set_form_error(e.to_string());
                    return;
                }
                self.store
                    .update(|s| s.set_connect_configuration(Some(connect)));
                self.goto_step(WorkflowStep::Connect);
            }
        }
    }

    // Refinement

    pub fn dispatch_refine(&mut self, action: RefineAction) {
        if self.guard_busy() {
            return;
        }
        let Some(handle) = self.current_handle() else {
            return;
        };
        if matches!(handle.phase(), StagePhase::Blocked { .. }) {
            self.status = Some("This step is blocked. Press r to fix it.".to_string());
            return;
        }
        self.spawn("Refining", async move {
            TaskOutput::Refined(handle.refine(action).await)
        });
        self.scroll_chat_to_bottom();
    }

    pub fn start_prompt(&mut self, target: PromptTarget) {
        if target == PromptTarget::Selection && self.selected_block_text().is_none() {
            self.status = Some("Select a paragraph in the canvas first.".to_string());
            return;
        }
        self.prompt = target;
        self.input.clear();
        self.input_cursor = 0;
        self.input_mode = InputMode::Editing;
        self.focus = FocusPane::Chat;
    }

    pub fn submit_prompt(&mut self) {
        let text = self.input.trim().to_string();
        self.input.clear();
        self.input_cursor = 0;
        self.input_mode = InputMode::Normal;
        if text.is_empty() {
            return;
        }

        match self.prompt {
            PromptTarget::Chat => self.dispatch_refine(RefineAction::Chat(text)),
            PromptTarget::Selection => {
                if let Some(block) = self.selected_block_text() {
                    self.dispatch_refine(RefineAction::UpdateSelection {
                        block: block.clone(),
                        selection: block,
                        query: text,
                    });
                }
            }
            PromptTarget::ImportPath => self.import_artifact(PathBuf::from(text)),
        }
        self.prompt = PromptTarget::Chat;
    }

    // Import / export

    fn export_dir() -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn export_artifact(&mut self) {
        if self.guard_busy() {
            return;
        }
        let Some(handle) = self.current_handle() else {
            return;
        };
        let artifact = handle.artifact();
        if artifact.trim().is_empty() {
            self.status = Some("Nothing to export yet.".to_string());
            return;
        }

        let slug = self.step.label().to_lowercase().replace(' ', "-");
        let path = Self::export_dir().join(format!("aicademy-{}.docx", slug));
        let backend = self.backend.clone();
        self.spawn("Exporting", async move {
            let result = async {
                let bytes = backend.export_artifact(&artifact).await?;
                tokio::fs::write(&path, bytes).await?;
                Ok::<_, anyhow::Error>(path)
            }
            .await;
            TaskOutput::Exported(result)
        });
    }

    /// Write every artifact of the session into one markdown file
    pub fn export_package(&mut self) {
        let package = self.store.read(|s| s.export_package());
        let path = Self::export_dir().join("aicademy-package.md");
        self.status = Some(match std::fs::write(&path, package) {
            Ok(()) => format!("Saved to {}", path.display()),
            Err(e) => {
                warn!(error = %e, "writing package failed");
                format!("Could not write {}: {}", path.display(), e)
            }
        });
    }

    fn import_artifact(&mut self, path: PathBuf) {
        if self.guard_busy() || self.current_handle().is_none() {
            return;
        }
        let backend = self.backend.clone();
        self.spawn("Importing", async move {
            let result = async {
                let file = UploadFile::from_path(&path).await?;
                Ok::<_, WorkflowError>(backend.import_artifact(&file).await?)
            }
            .await;
            TaskOutput::Imported(result)
        });
    }

    /// Ask the main loop to open the artifact in `$EDITOR`
    pub fn request_edit(&mut self) {
        if self.guard_busy() {
            return;
        }
        if self.current_handle().is_some() {
            self.edit_requested = true;
        }
    }

    // Canvas

    pub fn artifact_text(&self) -> String {
        self.current_handle()
            .map(|h| h.artifact())
            .unwrap_or_default()
    }

    pub fn selected_block_text(&self) -> Option<String> {
        blocks(&self.artifact_text())
            .into_iter()
            .nth(self.selected_block)
            .map(|b| b.text)
    }

    pub fn select_next_block(&mut self) {
        let blocks = blocks(&self.artifact_text());
        if blocks.is_empty() {
            return;
        }
        self.selected_block = (self.selected_block + 1).min(blocks.len() - 1);
        self.scroll_canvas_to(blocks[self.selected_block].line);
    }

    pub fn select_prev_block(&mut self) {
        let blocks = blocks(&self.artifact_text());
        self.selected_block = self.selected_block.saturating_sub(1);
        if let Some(block) = blocks.get(self.selected_block) {
            self.scroll_canvas_to(block.line);
        }
    }

    /// Jump to the next (or previous) `Page N:` heading of a brief
    pub fn jump_page(&mut self, forward: bool) {
        let text = self.artifact_text();
        if let Some(line) = page_jump_target(&text, self.canvas_scroll as usize, forward) {
            self.canvas_scroll = line as u16;
            if let Some(idx) = blocks(&text).iter().position(|b| b.line >= line) {
                self.selected_block = idx;
            }
        }
    }

    fn scroll_canvas_to(&mut self, line: usize) {
        let line = line as u16;
        let height = self.canvas_height.max(1);
        if line < self.canvas_scroll || line >= self.canvas_scroll + height {
            self.canvas_scroll = line.saturating_sub(height / 3);
        }
    }

    pub fn scroll_canvas(&mut self, down: bool, amount: u16) {
        self.canvas_scroll = if down {
            self.canvas_scroll.saturating_add(amount)
        } else {
            self.canvas_scroll.saturating_sub(amount)
        };
    }

    // Chat

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            40
        };
        let conversation = self
            .current_handle()
            .map(|h| h.conversation())
            .unwrap_or_default();

        let mut total_lines: u16 = 0;
        for msg in &conversation {
            total_lines += 1;
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                total_lines += (char_count / wrap_width) as u16 + 1;
            }
            total_lines += 1;
        }
        if self.task.is_some() {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        if let Err(e) = Config::save_sidebar_collapsed(self.sidebar_collapsed) {
            warn!(error = %e, "could not persist sidebar preference");
        }
    }
}

async fn parse_sources(
    backend: Arc<dyn Backend>,
    paths: Vec<String>,
    limits: Config,
) -> Result<(Vec<UploadFile>, Vec<SourceDocument>), WorkflowError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(UploadFile::from_path(Path::new(path)).await?);
    }
    validate_uploads(&files, &limits)?;
    let parsed = backend.parse_files(&files).await?;
    Ok((files, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_track_start_lines() {
        let text = "## Brief 1:\n\nFirst line\nsecond line\n\n\nThird";
        let blocks = blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].line, 2);
        assert_eq!(blocks[1].text, "First line\nsecond line");
        assert_eq!(blocks[2].line, 6);
    }

    const PAGED_BRIEF: &str = "## Brief 1:\n\n### Page 1: Intro\n\nText\n\n#### Page 2:\nMore\n\
        ### Page two: loose heading\n\n### Page 3: Wrap-up\nEnd";

    #[test]
    fn test_page_jumps_follow_numbered_markers() {
        assert_eq!(page_jump_target(PAGED_BRIEF, 0, true), Some(2));
        assert_eq!(page_jump_target(PAGED_BRIEF, 2, true), Some(6));
        assert_eq!(page_jump_target(PAGED_BRIEF, 6, true), Some(10));
        assert_eq!(page_jump_target(PAGED_BRIEF, 10, true), None);
        assert_eq!(page_jump_target(PAGED_BRIEF, 10, false), Some(6));
        assert_eq!(page_jump_target("## Brief 1:\n\nNo pages", 0, true), None);
    }

    #[test]
    fn test_page_label_reads_marker_number() {
        assert_eq!(page_label(PAGED_BRIEF, 0), None);
        assert_eq!(page_label(PAGED_BRIEF, 3).as_deref(), Some("Page 1/3: Intro"));
        assert_eq!(page_label(PAGED_BRIEF, 7).as_deref(), Some("Page 2/3"));
        assert_eq!(page_label(PAGED_BRIEF, 11).as_deref(), Some("Page 3/3: Wrap-up"));
    }
}
