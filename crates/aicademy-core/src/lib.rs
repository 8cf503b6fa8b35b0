pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod sections;
pub mod state;
pub mod store;
pub mod types;
pub mod upload;

// Re-export commonly used types
pub use backend::{Backend, HttpBackend};
pub use config::Config;
pub use controller::{
    BriefsController, EntryOutcome, Navigation, Prerequisite, RefineAction, RefineOutcome,
    StageController, StagePhase,
};
pub use error::{BackendError, WorkflowError};
pub use state::{ChatMessage, ChatRole};
pub use store::{ArtifactSlot, StoreHandle, WorkflowState, WorkflowStore};
pub use types::{
    ArtifactLength, ArtifactLevel, Brief, BriefInstructions, Configuration, ConnectConfiguration,
    SourceDocument, Stage, WorkflowStep, WorkflowType,
};
pub use upload::UploadFile;
