//! Stage orchestration.
//!
//! A controller decides on entry whether its stage needs generating, is
//! blocked on an earlier stage, or can reuse what the store already holds.
//! Once Ready it accepts refinement actions, one at a time, and writes the
//! results back through the store's sequence guard.

pub mod briefs;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::{
    accumulate, AdjustLengthRequest, AdjustLevelRequest, ArtifactChunk, Backend, BackendConfig,
    ChatRequest, ConnectRequest, GenerationResponse, OutlineRequest, StreamOutcome,
    SummaryRequest, TestRequest, UpdateSelectionRequest,
};
use crate::error::WorkflowError;
use crate::state::ChatMessage;
use crate::store::{ArtifactSlot, StoreHandle, WorkflowState};
use crate::types::{ArtifactLength, ArtifactLevel, BriefInstructions, Stage, WorkflowStep};

pub use briefs::{BriefsController, Navigation};

pub const DEFAULT_ACKNOWLEDGEMENT: &str = "Content updated successfully.";
pub const REFINE_ERROR_MESSAGE: &str = "Sorry, there was an error processing your request.";

// ============================================================================
// Prerequisites
// ============================================================================

/// Something a stage needs from an earlier step before it can generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    ParsedSources,
    Configuration,
    OutlineContent,
    Briefs,
    ConnectConfiguration,
}

impl Prerequisite {
    /// The step the user must go back to
    pub fn owner(&self) -> WorkflowStep {
        match self {
            Prerequisite::ParsedSources | Prerequisite::Configuration => {
                WorkflowStep::Configuration
            }
            Prerequisite::OutlineContent => WorkflowStep::Outline,
            Prerequisite::Briefs => WorkflowStep::Briefs,
            Prerequisite::ConnectConfiguration => WorkflowStep::ConnectConfiguration,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Prerequisite::ParsedSources => "parsed source documents",
            Prerequisite::Configuration => "a workflow configuration",
            Prerequisite::OutlineContent => "an outline",
            Prerequisite::Briefs => "at least one brief",
            Prerequisite::ConnectConfiguration => "a Connect configuration",
        }
    }

    fn is_met(&self, state: &WorkflowState) -> bool {
        match self {
            Prerequisite::ParsedSources => !state.parsed_sources.is_empty(),
            Prerequisite::Configuration => state.configuration.is_some(),
            Prerequisite::OutlineContent => !state.outline_content.trim().is_empty(),
            Prerequisite::Briefs => !state.briefs.is_empty(),
            Prerequisite::ConnectConfiguration => state.connect_configuration.is_some(),
        }
    }
}

/// Declared prerequisites of a stage, most specific first
pub fn prerequisites(stage: Stage) -> &'static [Prerequisite] {
    use Prerequisite::*;
    match stage {
        Stage::Outline => &[ParsedSources, Configuration],
        Stage::Briefs => &[OutlineContent, ParsedSources, Configuration],
        Stage::Connect => &[Briefs, ConnectConfiguration, ParsedSources, Configuration],
        Stage::Test => &[Briefs, ParsedSources, Configuration],
        Stage::Summary => &[ParsedSources, Configuration],
    }
}

pub fn missing_prerequisites(stage: Stage, state: &WorkflowState) -> Vec<Prerequisite> {
    prerequisites(stage)
        .iter()
        .copied()
        .filter(|p| !p.is_met(state))
        .collect()
}

// ============================================================================
// Phases and outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StagePhase {
    #[default]
    Uninitialized,
    Generating,
    Ready,
    Refining,
    /// Prerequisites missing. Never treated as Ready.
    Blocked {
        missing: Vec<Prerequisite>,
        redirect: WorkflowStep,
    },
}

impl StagePhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, StagePhase::Generating | StagePhase::Refining)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Artifact already present, nothing requested
    Reused,
    Generated,
    Blocked {
        missing: Vec<Prerequisite>,
        redirect: WorkflowStep,
    },
    /// Another request is in flight
    Busy,
    /// The response arrived after a manual edit or reset and was dropped
    Superseded,
    /// The request failed; the store is unchanged
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    /// Round trip finished. `changed` is false when the artifact came back
    /// identical, absent, or stale.
    Completed { changed: bool },
    /// Rejected before dispatch: another request is in flight
    Busy,
    /// Nothing to refine yet
    NoArtifact,
    Failed,
}

/// One refinement round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineAction {
    Chat(String),
    AdjustLevel(ArtifactLevel),
    AdjustLength(ArtifactLength),
    UpdateSelection {
        block: String,
        selection: String,
        query: String,
    },
}

impl RefineAction {
    fn user_message(&self) -> String {
        match self {
            RefineAction::Chat(text) => text.clone(),
            RefineAction::AdjustLevel(level) => format!("Adjusting level to {}...", level.as_str()),
            RefineAction::AdjustLength(length) => {
                format!("Adjusting length to {}...", length.as_str())
            }
            RefineAction::UpdateSelection { query, selection, .. } => {
                format!("{} (selection: \"{}\")", query, selection)
            }
        }
    }

    fn acknowledgement(&self, outcome: &StreamOutcome) -> String {
        match self {
            RefineAction::AdjustLevel(level) => format!("Adjusted level to {}.", level.as_str()),
            RefineAction::AdjustLength(length) => {
                format!("Adjusted length to {}.", length.as_str())
            }
            RefineAction::Chat(_) | RefineAction::UpdateSelection { .. } => {
                let text = outcome.response.trim();
                if text.is_empty() {
                    DEFAULT_ACKNOWLEDGEMENT.to_string()
                } else {
                    text.to_string()
                }
            }
        }
    }

    /// Revised artifact from the stream, if the backend sent one
    fn revised(&self, current: &str, outcome: StreamOutcome) -> Option<String> {
        match self {
            RefineAction::UpdateSelection { block, .. } => outcome
                .block
                .filter(|_| !block.is_empty() && current.contains(block.as_str()))
                .map(|new_block| current.replacen(block.as_str(), &new_block, 1))
                .or(outcome.artifact),
            _ => outcome.artifact,
        }
    }
}

// ============================================================================
// Shared stage context
// ============================================================================

#[derive(Debug, Default)]
struct StageSession {
    phase: StagePhase,
    conversation: Vec<ChatMessage>,
    progress: Option<String>,
}

/// State and collaborators shared by every controller flavour
#[derive(Clone)]
pub(crate) struct StageContext {
    stage: Stage,
    store: StoreHandle,
    backend: Arc<dyn Backend>,
    session: Arc<Mutex<StageSession>>,
}

impl StageContext {
    fn new(stage: Stage, store: StoreHandle, backend: Arc<dyn Backend>) -> Self {
        Self {
            stage,
            store,
            backend,
            session: Arc::new(Mutex::new(StageSession::default())),
        }
    }

    fn session(&self) -> MutexGuard<'_, StageSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> StagePhase {
        self.session().phase.clone()
    }

    fn set_phase(&self, phase: StagePhase) {
        debug!(stage = ?self.stage, ?phase, "stage phase");
        let mut session = self.session();
        session.phase = phase;
        session.progress = None;
    }

    fn conversation(&self) -> Vec<ChatMessage> {
        self.session().conversation.clone()
    }

    fn push_message(&self, message: ChatMessage) {
        self.session().conversation.push(message);
    }

    fn progress(&self) -> Option<String> {
        self.session().progress.clone()
    }

    fn mark_current(&self) {
        let step = self.stage.step();
        self.store.update(|s| s.set_current_stage(Some(step)));
    }

    /// Settle into Blocked if anything is missing
    fn check_blocked(&self) -> Option<EntryOutcome> {
        let missing = self
            .store
            .read(|s| missing_prerequisites(self.stage, s.state()));
        let redirect = missing.first()?.owner();

        info!(stage = ?self.stage, ?missing, ?redirect, "stage blocked");
        self.set_phase(StagePhase::Blocked {
            missing: missing.clone(),
            redirect,
        });
        Some(EntryOutcome::Blocked { missing, redirect })
    }

    /// Run one refinement round trip against `slot`
    async fn refine(
        &self,
        slot: ArtifactSlot,
        action: RefineAction,
        brief_instructions: Option<BriefInstructions>,
    ) -> RefineOutcome {
        let Some(_guard) = self.store.try_begin_generation() else {
            debug!(stage = ?self.stage, "refine rejected, request in flight");
            return RefineOutcome::Busy;
        };

        let (artifact, state) = self.store.read(|s| (s.artifact(slot).to_string(), s.snapshot()));
        if artifact.trim().is_empty() {
            return RefineOutcome::NoArtifact;
        }

        self.push_message(ChatMessage::user(action.user_message()));
        self.set_phase(StagePhase::Refining);
        let seq = self.store.update(|s| s.begin_request(slot));

        let result = self
            .dispatch_refine(&action, &artifact, &state, brief_instructions)
            .await;
        self.set_phase(StagePhase::Ready);

        match result {
            Ok(outcome) => {
                let message = action.acknowledgement(&outcome);
                let changed = match action.revised(&artifact, outcome) {
                    Some(revised) if revised != artifact => {
                        self.store.update(|s| s.commit_artifact(slot, seq, revised))
                    }
                    _ => false,
                };
                info!(stage = ?self.stage, ?slot, changed, "refinement finished");
                self.push_message(ChatMessage::assistant(message));
                RefineOutcome::Completed { changed }
            }
            Err(e) => {
                warn!(stage = ?self.stage, ?slot, error = %e, "refinement failed");
                self.push_message(ChatMessage::assistant(REFINE_ERROR_MESSAGE));
                RefineOutcome::Failed
            }
        }
    }

    async fn dispatch_refine(
        &self,
        action: &RefineAction,
        artifact: &str,
        state: &WorkflowState,
        brief_instructions: Option<BriefInstructions>,
    ) -> Result<StreamOutcome, WorkflowError> {
        let messages = self.conversation();
        let source = state.parsed_sources.clone();

        let stream = match action {
            RefineAction::Chat(_) => {
                let request = ChatRequest {
                    messages,
                    artifact: artifact.to_string(),
                    source,
                    stage: self.stage.api_name().to_string(),
                    config: state.configuration.clone(),
                    brief_instructions,
                };
                self.backend.chat_completion(&request).await?
            }
            RefineAction::AdjustLevel(level) => {
                let request = AdjustLevelRequest {
                    new_level: *level,
                    messages,
                    artifact: artifact.to_string(),
                    source,
                };
                self.backend.adjust_level(&request).await?
            }
            RefineAction::AdjustLength(length) => {
                let request = AdjustLengthRequest {
                    new_length: *length,
                    messages,
                    artifact: artifact.to_string(),
                    source,
                };
                self.backend.adjust_length(&request).await?
            }
            RefineAction::UpdateSelection {
                block,
                selection,
                query,
            } => {
                let request = UpdateSelectionRequest {
                    query: query.clone(),
                    artifact_chunk: ArtifactChunk {
                        block: block.clone(),
                        selection: selection.clone(),
                    },
                    source,
                    messages,
                };
                self.backend.update_selection(&request).await?
            }
        };

        let session = self.session.clone();
        let outcome = accumulate(stream, move |progress| {
            let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
            session.progress = Some(progress.to_string());
        })
        .await?;
        Ok(outcome)
    }
}

fn backend_config(state: &WorkflowState) -> Result<BackendConfig, WorkflowError> {
    state
        .configuration
        .as_ref()
        .map(BackendConfig::from)
        .ok_or_else(|| WorkflowError::InvalidConfiguration("Configuration is missing.".to_string()))
}

fn brief_contents(state: &WorkflowState) -> Vec<String> {
    state.briefs.iter().map(|b| b.content.clone()).collect()
}

fn stage_noun(stage: Stage) -> &'static str {
    match stage {
        Stage::Outline => "outline",
        Stage::Briefs => "brief",
        Stage::Connect => "Connect scenario",
        Stage::Test => "test",
        Stage::Summary => "executive summary",
    }
}

// ============================================================================
// Single-artifact stages
// ============================================================================

/// Controller for outline, connect, test and summary
#[derive(Clone)]
pub struct StageController {
    ctx: StageContext,
}

impl StageController {
    /// Briefs have their own controller, see [`BriefsController`]
    pub fn new(stage: Stage, store: StoreHandle, backend: Arc<dyn Backend>) -> Self {
        debug_assert!(stage != Stage::Briefs);
        Self {
            ctx: StageContext::new(stage, store, backend),
        }
    }

    pub fn stage(&self) -> Stage {
        self.ctx.stage
    }

    pub fn phase(&self) -> StagePhase {
        self.ctx.phase()
    }

    pub fn conversation(&self) -> Vec<ChatMessage> {
        self.ctx.conversation()
    }

    /// Latest progress note from a streaming request
    pub fn progress(&self) -> Option<String> {
        self.ctx.progress()
    }

    fn slot(&self) -> ArtifactSlot {
        ArtifactSlot::for_stage(self.ctx.stage, 1)
    }

    pub fn artifact(&self) -> String {
        let slot = self.slot();
        self.ctx.store.read(|s| s.artifact(slot).to_string())
    }

    /// Manual edit from the canvas
    pub fn set_artifact(&self, content: impl Into<String>) {
        let slot = self.slot();
        let content = content.into();
        self.ctx.store.update(|s| s.set_artifact(slot, content));
    }

    /// Reuse, block, or generate
    pub async fn enter(&self) -> EntryOutcome {
        self.ctx.mark_current();

        if !self.artifact().trim().is_empty() {
            self.ctx.set_phase(StagePhase::Ready);
            return EntryOutcome::Reused;
        }
        if let Some(blocked) = self.ctx.check_blocked() {
            return blocked;
        }
        let Some(_guard) = self.ctx.store.try_begin_generation() else {
            return EntryOutcome::Busy;
        };

        self.ctx.set_phase(StagePhase::Generating);
        let slot = self.slot();
        let (state, seq) = self
            .ctx
            .store
            .update(|s| (s.snapshot(), s.begin_request(slot)));

        let result = self.generate(&state).await;
        let outcome = match result {
            Ok(response) => {
                let noun = stage_noun(self.ctx.stage);
                let message = response
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} generated successfully!", capitalize(noun)));
                let content = response.content;
                let committed = self
                    .ctx
                    .store
                    .update(|s| s.commit_artifact(slot, seq, content));
                if committed {
                    info!(stage = ?self.ctx.stage, "stage generated");
                    self.ctx.push_message(ChatMessage::assistant(message));
                    EntryOutcome::Generated
                } else {
                    info!(stage = ?self.ctx.stage, "generated content superseded");
                    EntryOutcome::Superseded
                }
            }
            Err(e) => {
                warn!(stage = ?self.ctx.stage, error = %e, "generation failed");
                self.ctx.push_message(ChatMessage::assistant(format!(
                    "Sorry, there was an error generating this {}.",
                    stage_noun(self.ctx.stage)
                )));
                EntryOutcome::Failed
            }
        };
        self.ctx.set_phase(StagePhase::Ready);
        outcome
    }

    async fn generate(&self, state: &WorkflowState) -> Result<GenerationResponse, WorkflowError> {
        let backend = &self.ctx.backend;
        let source = state.parsed_sources.clone();
        let config = backend_config(state)?;

        let response = match self.ctx.stage {
            Stage::Outline => {
                backend
                    .generate_outline(&OutlineRequest { source, config })
                    .await?
            }
            Stage::Connect => {
                let connect_config = state.connect_configuration.clone().ok_or_else(|| {
                    WorkflowError::InvalidConfiguration(
                        "Connect configuration is missing.".to_string(),
                    )
                })?;
                backend
                    .generate_connect(&ConnectRequest {
                        source,
                        config,
                        connect_config,
                        briefs: brief_contents(state),
                    })
                    .await?
            }
            Stage::Test => {
                backend
                    .generate_test(&TestRequest {
                        source,
                        config,
                        briefs: brief_contents(state),
                    })
                    .await?
            }
            Stage::Summary => {
                backend
                    .generate_summary(&SummaryRequest {
                        source,
                        config,
                        outline: state.outline_content.clone(),
                        briefs: brief_contents(state),
                    })
                    .await?
            }
            Stage::Briefs => {
                return Err(WorkflowError::InvalidConfiguration(
                    "Briefs are generated per brief.".to_string(),
                ))
            }
        };
        Ok(response)
    }

    pub async fn refine(&self, action: RefineAction) -> RefineOutcome {
        self.ctx.refine(self.slot(), action, None).await
    }

    pub async fn send_message(&self, text: impl Into<String>) -> RefineOutcome {
        self.refine(RefineAction::Chat(text.into())).await
    }

    pub async fn adjust_level(&self, level: ArtifactLevel) -> RefineOutcome {
        self.refine(RefineAction::AdjustLevel(level)).await
    }

    pub async fn adjust_length(&self, length: ArtifactLength) -> RefineOutcome {
        self.refine(RefineAction::AdjustLength(length)).await
    }

    /// Rewrite `selection` inside `block` according to `query`
    pub async fn update_selection(
        &self,
        block: impl Into<String>,
        selection: impl Into<String>,
        query: impl Into<String>,
    ) -> RefineOutcome {
        self.refine(RefineAction::UpdateSelection {
            block: block.into(),
            selection: selection.into(),
            query: query.into(),
        })
        .await
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Configuration;

    #[test]
    fn test_briefs_blocked_on_outline_first() {
        let state = WorkflowState::default();
        let missing = missing_prerequisites(Stage::Briefs, &state);
        assert_eq!(missing[0], Prerequisite::OutlineContent);
        assert_eq!(missing[0].owner(), WorkflowStep::Outline);
    }

    #[test]
    fn test_connect_needs_briefs_and_connect_configuration() {
        let state = WorkflowState {
            configuration: Some(Configuration::default()),
            ..Default::default()
        };
        let missing = missing_prerequisites(Stage::Connect, &state);
        assert_eq!(
            missing,
            vec![
                Prerequisite::Briefs,
                Prerequisite::ConnectConfiguration,
                Prerequisite::ParsedSources
            ]
        );
    }

    #[test]
    fn test_update_selection_splices_block() {
        let action = RefineAction::UpdateSelection {
            block: "Old paragraph.".to_string(),
            selection: "Old".to_string(),
            query: "rewrite".to_string(),
        };
        let outcome = StreamOutcome {
            response: String::new(),
            artifact: None,
            block: Some("New paragraph.".to_string()),
        };
        assert_eq!(
            action.revised("Intro\n\nOld paragraph.\n\nEnd", outcome),
            Some("Intro\n\nNew paragraph.\n\nEnd".to_string())
        );
    }

    #[test]
    fn test_acknowledgements() {
        let empty = StreamOutcome::default();
        assert_eq!(
            RefineAction::AdjustLevel(ArtifactLevel::Beginner).acknowledgement(&empty),
            "Adjusted level to Beginner."
        );
        assert_eq!(
            RefineAction::Chat("hi".to_string()).acknowledgement(&empty),
            DEFAULT_ACKNOWLEDGEMENT
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("outline"), "Outline");
        assert_eq!(capitalize(""), "");
    }
}
