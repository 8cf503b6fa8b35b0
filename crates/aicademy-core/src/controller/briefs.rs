//! The briefs stage: one artifact per brief, generated from instructions
//! extracted out of the outline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::{
    backend_config, EntryOutcome, RefineAction, RefineOutcome, StageContext, StagePhase,
};
use crate::backend::{ArtifactPayload, Backend, BriefRequest, ExtractInstructionsRequest};
use crate::error::WorkflowError;
use crate::state::ChatMessage;
use crate::store::{ArtifactSlot, StoreHandle};
use crate::types::{
    ArtifactLength, ArtifactLevel, Brief, BriefInstructions, Stage, WorkflowStep,
};

/// Where next/previous lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Brief(u32),
    Step(WorkflowStep),
}

#[derive(Debug, Default)]
struct BriefCursor {
    current: u32,
    instructions: Vec<BriefInstructions>,
}

#[derive(Clone)]
pub struct BriefsController {
    ctx: StageContext,
    cursor: Arc<Mutex<BriefCursor>>,
}

impl BriefsController {
    pub fn new(store: StoreHandle, backend: Arc<dyn Backend>) -> Self {
        Self {
            ctx: StageContext::new(Stage::Briefs, store, backend),
            cursor: Arc::new(Mutex::new(BriefCursor {
                current: 1,
                instructions: Vec::new(),
            })),
        }
    }

    fn cursor(&self) -> MutexGuard<'_, BriefCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> StagePhase {
        self.ctx.phase()
    }

    pub fn conversation(&self) -> Vec<ChatMessage> {
        self.ctx.conversation()
    }

    pub fn progress(&self) -> Option<String> {
        self.ctx.progress()
    }

    /// Ordinal of the brief on screen
    pub fn current(&self) -> u32 {
        self.cursor().current
    }

    /// Number of brief positions: whichever is larger of generated and configured
    pub fn total(&self) -> u32 {
        let cached = self.cursor().instructions.len();
        let (generated, configured) = self.ctx.store.read(|s| {
            let state = s.state();
            let generated = state.briefs.iter().map(|b| b.ordinal).max().unwrap_or(0);
            let configured = state
                .configuration
                .as_ref()
                .map(|c| c.number_of_briefs.count())
                .unwrap_or(0);
            (generated, configured)
        });
        generated.max(configured.max(cached) as u32).max(1)
    }

    pub fn current_brief(&self) -> Option<Brief> {
        let ordinal = self.current();
        self.ctx.store.read(|s| s.brief(ordinal).cloned())
    }

    pub fn artifact(&self) -> String {
        let slot = ArtifactSlot::Brief(self.current());
        self.ctx.store.read(|s| s.artifact(slot).to_string())
    }

    /// Manual edit of the brief on screen
    pub fn set_artifact(&self, content: impl Into<String>) {
        let slot = ArtifactSlot::Brief(self.current());
        let content = content.into();
        self.ctx.store.update(|s| s.set_artifact(slot, content));
    }

    /// Enter the stage on the current brief, generating everything on first visit
    pub async fn enter(&self) -> EntryOutcome {
        let has_briefs = self.ctx.store.read(|s| !s.state().briefs.is_empty());
        if has_briefs {
            return self.open(self.current()).await;
        }
        self.generate_all().await
    }

    /// Extract instructions and generate each missing brief in order.
    ///
    /// Stops at the first failure or superseded response; briefs generated
    /// before it stay.
    pub async fn generate_all(&self) -> EntryOutcome {
        self.ctx.mark_current();
        if let Some(blocked) = self.ctx.check_blocked() {
            return blocked;
        }
        let Some(_guard) = self.ctx.store.try_begin_generation() else {
            return EntryOutcome::Busy;
        };
        self.ctx.set_phase(StagePhase::Generating);

        let instructions = match self.fetch_instructions().await {
            Ok(instructions) => instructions,
            Err(e) => {
                warn!(error = %e, "extracting brief instructions failed");
                self.ctx.push_message(ChatMessage::assistant(
                    "Sorry, there was an error generating the briefs.",
                ));
                self.ctx.set_phase(StagePhase::Ready);
                return EntryOutcome::Failed;
            }
        };

        info!(count = instructions.len(), "generating briefs");
        let mut outcome = EntryOutcome::Generated;
        for (idx, instruction) in instructions.into_iter().enumerate() {
            let ordinal = idx as u32 + 1;
            if self.ctx.store.read(|s| s.brief(ordinal).is_some()) {
                debug!(ordinal, "brief already present, skipping");
                continue;
            }
            let generated = self.generate_one(ordinal, instruction).await;
            if generated != EntryOutcome::Generated {
                outcome = generated;
                break;
            }
        }

        self.ctx.set_phase(StagePhase::Ready);
        outcome
    }

    /// Show brief `ordinal`, generating it alone if it is missing
    pub async fn open(&self, ordinal: u32) -> EntryOutcome {
        self.cursor().current = ordinal.max(1);
        self.ctx.mark_current();

        if self.ctx.store.read(|s| s.brief(ordinal).is_some()) {
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

        let outcome = match self.instruction_for(ordinal).await {
            Ok(instruction) => self.generate_one(ordinal, instruction).await,
            Err(e) => {
                warn!(ordinal, error = %e, "no instructions for brief");
                self.ctx.push_message(ChatMessage::assistant(
                    "Sorry, there was an error generating this brief.",
                ));
                EntryOutcome::Failed
            }
        };

        self.ctx.set_phase(StagePhase::Ready);
        outcome
    }

    /// Move forward; past the last brief goes to the Connect setup
    pub fn next(&self) -> Navigation {
        let total = self.total();
        let mut cursor = self.cursor();
        if cursor.current < total {
            cursor.current += 1;
            Navigation::Brief(cursor.current)
        } else {
            Navigation::Step(WorkflowStep::ConnectConfiguration)
        }
    }

    /// Move back; before the first brief goes to the outline
    pub fn previous(&self) -> Navigation {
        let mut cursor = self.cursor();
        if cursor.current > 1 {
            cursor.current -= 1;
            Navigation::Brief(cursor.current)
        } else {
            Navigation::Step(WorkflowStep::Outline)
        }
    }

    async fn fetch_instructions(&self) -> Result<Vec<BriefInstructions>, WorkflowError> {
        let request = self.ctx.store.read(|s| {
            let state = s.state();
            backend_config(state).map(|config| ExtractInstructionsRequest {
                config,
                outline_artifact: ArtifactPayload {
                    content: state.outline_content.clone(),
                },
            })
        })?;

        let instructions = self.ctx.backend.extract_brief_instructions(&request).await?;
        debug!(count = instructions.len(), "brief instructions extracted");
        self.cursor().instructions = instructions.clone();
        Ok(instructions)
    }

    /// Cached instructions for `ordinal`, extracting them if the cache is empty
    async fn instruction_for(&self, ordinal: u32) -> Result<BriefInstructions, WorkflowError> {
        if let Some(found) = self.cached_instruction(ordinal) {
            return Ok(found);
        }
        let cache_empty = self.cursor().instructions.is_empty();
        let instructions = if cache_empty {
            self.fetch_instructions().await?
        } else {
            Vec::new()
        };
        instructions
            .into_iter()
            .nth(ordinal.saturating_sub(1) as usize)
            .ok_or(WorkflowError::MissingInstruction { ordinal })
    }

    fn cached_instruction(&self, ordinal: u32) -> Option<BriefInstructions> {
        let cached = self
            .cursor()
            .instructions
            .get(ordinal.saturating_sub(1) as usize)
            .cloned();
        cached.or_else(|| {
            self.ctx
                .store
                .read(|s| s.brief(ordinal).and_then(|b| b.instructions.clone()))
        })
    }

    /// Generate one brief and record it: `Generated`, `Superseded` or `Failed`
    async fn generate_one(&self, ordinal: u32, instruction: BriefInstructions) -> EntryOutcome {
        let slot = ArtifactSlot::Brief(ordinal);
        let (source, seq) = self.ctx.store.update(|s| {
            (s.state().parsed_sources.clone(), s.begin_request(slot))
        });

        let request = BriefRequest {
            source,
            brief_instructions: instruction.clone(),
        };
        match self.ctx.backend.generate_brief(&request).await {
            Ok(response) => {
                let brief = Brief::from_generated(ordinal, &response.content, Some(instruction));
                if !self.ctx.store.update(|s| s.commit_brief(seq, brief)) {
                    info!(ordinal, "generated brief superseded");
                    return EntryOutcome::Superseded;
                }
                info!(ordinal, "brief generated");
                self.ctx.push_message(ChatMessage::assistant(format!(
                    "Brief {} generated successfully!",
                    ordinal
                )));
                EntryOutcome::Generated
            }
            Err(e) => {
                warn!(ordinal, error = %e, "brief generation failed");
                self.ctx.push_message(ChatMessage::assistant(
                    "Sorry, there was an error generating this brief.",
                ));
                EntryOutcome::Failed
            }
        }
    }

    /// Refine the brief on screen
    pub async fn refine(&self, action: RefineAction) -> RefineOutcome {
        let ordinal = self.current();
        let instructions = self.cached_instruction(ordinal);
        self.ctx
            .refine(ArtifactSlot::Brief(ordinal), action, instructions)
            .await
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
