//! Session-lifetime workflow state.
//!
//! `WorkflowStore` owns one [`WorkflowState`] record. Every field has exactly
//! one setter and the record is only reachable by shared reference, so the
//! setters are the only way in. `StoreHandle` shares a store between the UI
//! loop and background generation tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::sections::combine_briefs;
use crate::types::{
    Brief, Configuration, ConnectConfiguration, SourceDocument, Stage, WorkflowStep, WorkflowType,
};
use crate::upload::UploadFile;

/// Plain snapshot of everything a workflow session holds
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowState {
    pub source_files: Vec<UploadFile>,
    pub parsed_sources: Vec<SourceDocument>,
    pub configuration: Option<Configuration>,
    pub connect_configuration: Option<ConnectConfiguration>,
    pub outline_content: String,
    pub briefs_content: String,
    pub briefs: Vec<Brief>,
    pub connect_content: String,
    pub test_content: String,
    pub summary_content: String,
    pub is_generating: bool,
    pub current_stage: Option<WorkflowStep>,
    pub workflow_type: WorkflowType,
}

/// Addresses one artifact inside the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactSlot {
    Outline,
    Brief(u32),
    Connect,
    Test,
    Summary,
}

impl ArtifactSlot {
    /// Slot for a stage; `ordinal` only matters for briefs
    pub fn for_stage(stage: Stage, ordinal: u32) -> Self {
        match stage {
            Stage::Outline => ArtifactSlot::Outline,
            Stage::Briefs => ArtifactSlot::Brief(ordinal),
            Stage::Connect => ArtifactSlot::Connect,
            Stage::Test => ArtifactSlot::Test,
            Stage::Summary => ArtifactSlot::Summary,
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkflowStore {
    state: WorkflowState,
    discard_stale: bool,
    next_seq: u64,
    latest: HashMap<ArtifactSlot, u64>,
}

impl WorkflowStore {
    pub fn new(discard_stale_responses: bool) -> Self {
        Self {
            discard_stale: discard_stale_responses,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.clone()
    }

    /// Back to the empty initial record. In-flight responses become stale.
    ///
    /// `is_generating` survives: it belongs to the live `GenerationGuard`.
    pub fn reset(&mut self) {
        debug!("resetting workflow store");
        self.state = WorkflowState {
            is_generating: self.state.is_generating,
            ..WorkflowState::default()
        };
        self.latest.clear();
    }

    // Setters

    pub fn set_source_files(&mut self, files: Vec<UploadFile>) {
        self.state.source_files = files;
    }

    pub fn set_parsed_sources(&mut self, sources: Vec<SourceDocument>) {
        self.state.parsed_sources = sources;
    }

    pub fn set_configuration(&mut self, configuration: Option<Configuration>) {
        self.state.configuration = configuration;
    }

    pub fn set_connect_configuration(&mut self, configuration: Option<ConnectConfiguration>) {
        self.state.connect_configuration = configuration;
    }

    pub fn set_outline_content(&mut self, content: impl Into<String>) {
        self.state.outline_content = content.into();
    }

    pub fn set_briefs_content(&mut self, content: impl Into<String>) {
        self.state.briefs_content = content.into();
    }

    pub fn set_briefs(&mut self, briefs: Vec<Brief>) {
        self.state.briefs = briefs;
    }

    pub fn set_connect_content(&mut self, content: impl Into<String>) {
        self.state.connect_content = content.into();
    }

    pub fn set_test_content(&mut self, content: impl Into<String>) {
        self.state.test_content = content.into();
    }

    pub fn set_summary_content(&mut self, content: impl Into<String>) {
        self.state.summary_content = content.into();
    }

    pub fn set_is_generating(&mut self, generating: bool) {
        self.state.is_generating = generating;
    }

    pub fn set_current_stage(&mut self, step: Option<WorkflowStep>) {
        self.state.current_stage = step;
    }

    pub fn set_workflow_type(&mut self, workflow_type: WorkflowType) {
        self.state.workflow_type = workflow_type;
    }

    // Briefs

    pub fn brief(&self, ordinal: u32) -> Option<&Brief> {
        self.state.briefs.iter().find(|b| b.ordinal == ordinal)
    }

    /// Insert or replace a brief by ordinal and refresh the combined text
    pub fn upsert_brief(&mut self, brief: Brief) {
        let mut briefs = self.state.briefs.clone();
        match briefs.iter().position(|b| b.ordinal == brief.ordinal) {
            Some(idx) => briefs[idx] = brief,
            None => {
                let idx = briefs.partition_point(|b| b.ordinal < brief.ordinal);
                briefs.insert(idx, brief);
            }
        }
        let combined = combine_briefs(&briefs);
        self.set_briefs(briefs);
        self.set_briefs_content(combined);
    }

    // Artifacts

    pub fn artifact(&self, slot: ArtifactSlot) -> &str {
        match slot {
            ArtifactSlot::Outline => &self.state.outline_content,
            ArtifactSlot::Brief(ordinal) => self
                .brief(ordinal)
                .map(|b| b.content.as_str())
                .unwrap_or(""),
            ArtifactSlot::Connect => &self.state.connect_content,
            ArtifactSlot::Test => &self.state.test_content,
            ArtifactSlot::Summary => &self.state.summary_content,
        }
    }

    /// Manual edit. Any response still in flight for this slot becomes stale.
    pub fn set_artifact(&mut self, slot: ArtifactSlot, content: impl Into<String>) {
        self.bump(slot);
        self.write_artifact(slot, content.into());
    }

    /// Start a request for `slot` and get its sequence number
    pub fn begin_request(&mut self, slot: ArtifactSlot) -> u64 {
        let seq = self.bump(slot);
        debug!(?slot, seq, "dispatching request");
        seq
    }

    /// Apply a response unless a newer request or edit has touched the slot.
    ///
    /// Returns whether the content was written.
    pub fn commit_artifact(
        &mut self,
        slot: ArtifactSlot,
        seq: u64,
        content: impl Into<String>,
    ) -> bool {
        if self.is_stale(slot, seq) {
            return false;
        }
        self.write_artifact(slot, content.into());
        true
    }

    /// [`commit_artifact`](Self::commit_artifact) for a whole brief, instructions included
    pub fn commit_brief(&mut self, seq: u64, brief: Brief) -> bool {
        if self.is_stale(ArtifactSlot::Brief(brief.ordinal), seq) {
            return false;
        }
        self.upsert_brief(brief);
        true
    }

    fn is_stale(&self, slot: ArtifactSlot, seq: u64) -> bool {
        let stale = self.discard_stale && self.latest.get(&slot) != Some(&seq);
        if stale {
            warn!(?slot, seq, latest = ?self.latest.get(&slot), "discarding stale response");
        }
        stale
    }

    fn bump(&mut self, slot: ArtifactSlot) -> u64 {
        self.next_seq += 1;
        self.latest.insert(slot, self.next_seq);
        self.next_seq
    }

    fn write_artifact(&mut self, slot: ArtifactSlot, content: String) {
        match slot {
            ArtifactSlot::Outline => self.set_outline_content(content),
            ArtifactSlot::Brief(ordinal) => {
                let instructions = self.brief(ordinal).and_then(|b| b.instructions.clone());
                self.upsert_brief(Brief::from_generated(ordinal, &content, instructions));
            }
            ArtifactSlot::Connect => self.set_connect_content(content),
            ArtifactSlot::Test => self.set_test_content(content),
            ArtifactSlot::Summary => self.set_summary_content(content),
        }
    }

    /// Every generated artifact of the session as one markdown document
    pub fn export_package(&self) -> String {
        let title = self
            .state
            .configuration
            .as_ref()
            .map(|c| c.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or("AIcademy Workflow");

        let parts = [
            ("Outline", &self.state.outline_content),
            ("Briefs", &self.state.briefs_content),
            ("Connect", &self.state.connect_content),
            ("Test Yourself", &self.state.test_content),
            ("Executive Summary", &self.state.summary_content),
        ];

        let mut out = format!("# {}\n", title);
        for (heading, content) in parts {
            if content.trim().is_empty() {
                continue;
            }
            out.push_str(&format!("\n# {}\n\n{}\n", heading, content.trim()));
        }
        out
    }
}

/// Shared access to a [`WorkflowStore`].
///
/// The lock is only held inside `read`/`update` closures, never across an await.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<WorkflowStore>>,
}

impl StoreHandle {
    pub fn new(store: WorkflowStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&WorkflowStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut WorkflowStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.read(WorkflowStore::snapshot)
    }

    pub fn is_generating(&self) -> bool {
        self.read(|s| s.state().is_generating)
    }

    /// Set `is_generating` unless it already is. The flag clears when the guard drops.
    pub fn try_begin_generation(&self) -> Option<GenerationGuard> {
        let acquired = self.update(|s| {
            if s.state().is_generating {
                false
            } else {
                s.set_is_generating(true);
                true
            }
        });
        acquired.then(|| GenerationGuard {
            store: self.clone(),
        })
    }
}

/// Clears `is_generating` on every exit path
#[must_use = "dropping the guard clears is_generating immediately"]
pub struct GenerationGuard {
    store: StoreHandle,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.store.update(|s| s.set_is_generating(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Configuration, Figure};

    type Apply = Box<dyn Fn(&mut WorkflowStore)>;
    type Expect = Box<dyn Fn(&mut WorkflowState)>;

    fn source() -> SourceDocument {
        SourceDocument {
            name: Some("basel.pdf".to_string()),
            file_type: Some("pdf".to_string()),
            content: "Capital requirements".to_string(),
            figures: vec![Figure {
                id: "fig-1".to_string(),
                b64image: "AAAA".to_string(),
                caption: None,
                footnote: None,
                page_number: 1,
            }],
        }
    }

    #[test]
    fn test_set_outline_content_changes_only_outline() {
        let mut store = WorkflowStore::default();
        let before = store.snapshot();

        store.set_outline_content("X");

        assert_eq!(store.state().outline_content, "X");
        let mut expected = before;
        expected.outline_content = "X".to_string();
        assert_eq!(store.snapshot(), expected);
    }

    fn case(
        name: &'static str,
        apply: impl Fn(&mut WorkflowStore) + 'static,
        expect: impl Fn(&mut WorkflowState) + 'static,
    ) -> (&'static str, Apply, Expect) {
        let apply: Apply = Box::new(apply);
        let expect: Expect = Box::new(expect);
        (name, apply, expect)
    }

    #[test]
    fn test_every_setter_touches_one_field() {
        let brief = Brief::from_generated(1, "body", None);
        let expected_brief = brief.clone();
        let cases = vec![
            case(
                "source_files",
                |s| s.set_source_files(vec![UploadFile::new("a.pdf", vec![1])]),
                |e| e.source_files = vec![UploadFile::new("a.pdf", vec![1])],
            ),
            case(
                "parsed_sources",
                |s| s.set_parsed_sources(vec![source()]),
                |e| e.parsed_sources = vec![source()],
            ),
            case(
                "configuration",
                |s| s.set_configuration(Some(Configuration::default())),
                |e| e.configuration = Some(Configuration::default()),
            ),
            case(
                "connect_configuration",
                |s| s.set_connect_configuration(Some(ConnectConfiguration::default())),
                |e| e.connect_configuration = Some(ConnectConfiguration::default()),
            ),
            case(
                "briefs_content",
                |s| s.set_briefs_content("B"),
                |e| e.briefs_content = "B".to_string(),
            ),
            case(
                "briefs",
                move |s| s.set_briefs(vec![brief.clone()]),
                move |e| e.briefs = vec![expected_brief.clone()],
            ),
            case(
                "connect_content",
                |s| s.set_connect_content("C"),
                |e| e.connect_content = "C".to_string(),
            ),
            case(
                "test_content",
                |s| s.set_test_content("T"),
                |e| e.test_content = "T".to_string(),
            ),
            case(
                "summary_content",
                |s| s.set_summary_content("S"),
                |e| e.summary_content = "S".to_string(),
            ),
            case(
                "is_generating",
                |s| s.set_is_generating(true),
                |e| e.is_generating = true,
            ),
            case(
                "current_stage",
                |s| s.set_current_stage(Some(WorkflowStep::Connect)),
                |e| e.current_stage = Some(WorkflowStep::Connect),
            ),
            case(
                "workflow_type",
                |s| s.set_workflow_type(WorkflowType::ExecutiveSummary),
                |e| e.workflow_type = WorkflowType::ExecutiveSummary,
            ),
        ];

        for (name, apply, expect) in cases {
            let mut store = WorkflowStore::default();
            let mut expected = store.snapshot();
            apply(&mut store);
            expect(&mut expected);
            assert_eq!(store.snapshot(), expected, "setter {}", name);
        }
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut store = WorkflowStore::default();
        store.set_parsed_sources(vec![source()]);
        store.set_outline_content("outline");
        store.set_current_stage(Some(WorkflowStep::Outline));

        store.reset();

        assert_eq!(store.snapshot(), WorkflowState::default());
    }

    #[test]
    fn test_upsert_brief_keeps_order_and_combined_text() {
        let mut store = WorkflowStore::default();
        store.upsert_brief(Brief::from_generated(3, "three", None));
        store.upsert_brief(Brief::from_generated(1, "one", None));
        store.upsert_brief(Brief::from_generated(3, "three again", None));

        let ordinals: Vec<u32> = store.state().briefs.iter().map(|b| b.ordinal).collect();
        assert_eq!(ordinals, vec![1, 3]);
        assert_eq!(
            store.state().briefs_content,
            "## Brief 1:\n\none\n\n---\n\n## Brief 3:\n\nthree again"
        );
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut store = WorkflowStore::new(true);
        store.set_outline_content("original");

        let seq = store.begin_request(ArtifactSlot::Outline);
        store.set_artifact(ArtifactSlot::Outline, "manual edit");

        assert!(!store.commit_artifact(ArtifactSlot::Outline, seq, "late response"));
        assert_eq!(store.state().outline_content, "manual edit");
    }

    #[test]
    fn test_latest_response_is_applied() {
        let mut store = WorkflowStore::new(true);
        let first = store.begin_request(ArtifactSlot::Test);
        let second = store.begin_request(ArtifactSlot::Test);

        assert!(!store.commit_artifact(ArtifactSlot::Test, first, "old"));
        assert!(store.commit_artifact(ArtifactSlot::Test, second, "new"));
        assert_eq!(store.state().test_content, "new");
    }

    #[test]
    fn test_slots_are_independent() {
        let mut store = WorkflowStore::new(true);
        let outline = store.begin_request(ArtifactSlot::Outline);
        store.set_artifact(ArtifactSlot::Brief(1), "edited brief");

        assert!(store.commit_artifact(ArtifactSlot::Outline, outline, "outline"));
    }

    #[test]
    fn test_last_write_wins_when_guard_disabled() {
        let mut store = WorkflowStore::new(false);
        let seq = store.begin_request(ArtifactSlot::Connect);
        store.set_artifact(ArtifactSlot::Connect, "manual");

        assert!(store.commit_artifact(ArtifactSlot::Connect, seq, "late"));
        assert_eq!(store.state().connect_content, "late");
    }

    #[test]
    fn test_response_after_reset_is_discarded() {
        let mut store = WorkflowStore::new(true);
        let seq = store.begin_request(ArtifactSlot::Summary);
        store.reset();

        assert!(!store.commit_artifact(ArtifactSlot::Summary, seq, "old session"));
        assert!(store.state().summary_content.is_empty());
    }

    #[test]
    fn test_commit_brief_keeps_instructions() {
        let mut store = WorkflowStore::new(true);
        let seq = store.begin_request(ArtifactSlot::Brief(2));
        let instructions = crate::types::BriefInstructions {
            title: "Buffers".to_string(),
            ..Default::default()
        };
        let brief = Brief::from_generated(2, "Body", Some(instructions.clone()));

        assert!(store.commit_brief(seq, brief));
        assert_eq!(store.brief(2).and_then(|b| b.instructions.clone()), Some(instructions));
        assert!(!store.commit_brief(seq - 1, Brief::from_generated(2, "Old", None)));
    }

    #[test]
    fn test_brief_artifact_slot_round_trip() {
        let mut store = WorkflowStore::default();
        store.set_artifact(ArtifactSlot::Brief(2), "## Brief 2:\n\nSecond");
        assert_eq!(store.artifact(ArtifactSlot::Brief(2)), "## Brief 2:\n\nSecond");
        assert_eq!(store.artifact(ArtifactSlot::Brief(1)), "");
    }

    #[test]
    fn test_export_package_skips_empty_artifacts() {
        let mut store = WorkflowStore::default();
        store.set_configuration(Some(Configuration {
            title: "Liquidity Risk".to_string(),
            ..Default::default()
        }));
        store.set_outline_content("1. Intro");
        store.set_summary_content("Key points");

        let package = store.export_package();
        assert!(package.starts_with("# Liquidity Risk\n"));
        assert!(package.contains("# Outline\n\n1. Intro"));
        assert!(package.contains("# Executive Summary\n\nKey points"));
        assert!(!package.contains("# Connect"));
    }

    #[test]
    fn test_generation_guard_clears_flag() {
        let handle = StoreHandle::default();
        {
            let _guard = handle.try_begin_generation().expect("first guard");
            assert!(handle.is_generating());
            assert!(handle.try_begin_generation().is_none());
        }
        assert!(!handle.is_generating());
        assert!(handle.try_begin_generation().is_some());
    }

    #[test]
    fn test_reset_keeps_generation_in_flight() {
        let handle = StoreHandle::default();
        let first = handle.try_begin_generation().expect("first guard");

        handle.update(WorkflowStore::reset);

        assert!(handle.is_generating());
        assert!(handle.try_begin_generation().is_none());
        drop(first);
        assert!(!handle.is_generating());
        assert!(handle.try_begin_generation().is_some());
    }
}
