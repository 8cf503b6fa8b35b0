//! Domain types shared by the store, the controllers and the backend client.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Upper bound for any free-text configuration field.
pub const TEXT_LIMIT: usize = 5000;

// ============================================================================
// Source documents
// ============================================================================

/// A figure extracted from a parsed PDF page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Figure {
    pub id: String,
    pub b64image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnote: Option<String>,
    pub page_number: u32,
}

/// A parsed source document as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub content: String,
    #[serde(default)]
    pub figures: Vec<Figure>,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    SimpleAndClear,
    #[default]
    ProfessionalAndConcise,
    ScenarioBasedAndPractical,
    TechnicalAndAnalytical,
    StepByStepInstructional,
}

impl Tone {
    pub fn all() -> Vec<Tone> {
        vec![
            Tone::SimpleAndClear,
            Tone::ProfessionalAndConcise,
            Tone::ScenarioBasedAndPractical,
            Tone::TechnicalAndAnalytical,
            Tone::StepByStepInstructional,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::SimpleAndClear => "simple_and_clear",
            Tone::ProfessionalAndConcise => "professional_and_concise",
            Tone::ScenarioBasedAndPractical => "scenario_based_and_practical",
            Tone::TechnicalAndAnalytical => "technical_and_analytical",
            Tone::StepByStepInstructional => "step_by_step_instructional",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tone::SimpleAndClear => "Simple and Clear",
            Tone::ProfessionalAndConcise => "Professional and Concise",
            Tone::ScenarioBasedAndPractical => "Scenario-Based and Practical",
            Tone::TechnicalAndAnalytical => "Technical and Analytical",
            Tone::StepByStepInstructional => "Step-by-Step Instructional",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tone::SimpleAndClear => {
                "Emphasizes plain language, avoids jargon, and explains complex concepts with relatable examples."
            }
            Tone::ProfessionalAndConcise => "Formal and precise approach with minimal elaboration.",
            Tone::ScenarioBasedAndPractical => {
                "Focuses on real-world applications to enhance understanding."
            }
            Tone::TechnicalAndAnalytical => {
                "In-depth explanations with data and advanced terminology."
            }
            Tone::StepByStepInstructional => "Guides through processes or calculations.",
        }
    }
}

/// How many briefs the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefCount {
    One,
    Two,
    #[default]
    Three,
    Four,
    Five,
}

impl BriefCount {
    pub fn all() -> Vec<BriefCount> {
        vec![
            BriefCount::One,
            BriefCount::Two,
            BriefCount::Three,
            BriefCount::Four,
            BriefCount::Five,
        ]
    }

    pub fn count(&self) -> usize {
        match self {
            BriefCount::One => 1,
            BriefCount::Two => 2,
            BriefCount::Three => 3,
            BriefCount::Four => 4,
            BriefCount::Five => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BriefCount::One => "one",
            BriefCount::Two => "two",
            BriefCount::Three => "three",
            BriefCount::Four => "four",
            BriefCount::Five => "five",
        }
    }
}

/// Initial workflow configuration entered before anything is generated.
///
/// Re-submitting the form replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub title: String,
    pub tone: Tone,
    pub number_of_briefs: BriefCount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections_to_highlight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections_to_exclude: Option<String>,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.title.trim().is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "A title is required.".to_string(),
            ));
        }
        check_limit("Title", Some(&self.title))?;
        check_limit("Sections to highlight", self.sections_to_highlight.as_ref())?;
        check_limit("Sections to exclude", self.sections_to_exclude.as_ref())?;
        Ok(())
    }
}

fn check_limit(field: &str, value: Option<&String>) -> Result<(), WorkflowError> {
    match value {
        Some(text) if text.chars().count() > TEXT_LIMIT => {
            Err(WorkflowError::InvalidConfiguration(format!(
                "{} must be at most {} characters.",
                field, TEXT_LIMIT
            )))
        }
        _ => Ok(()),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Scenario parameters for the Connect exercise
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_profile_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_profile_department: Option<String>,
    #[serde(default)]
    pub scenario_details_country_type: Vec<String>,
    #[serde(default)]
    pub scenario_details_authority_type: Vec<String>,
    #[serde(default)]
    pub scenario_details_financial_institutions_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_descriptions: Option<String>,
    #[serde(default)]
    pub character_roles: Vec<String>,
    #[serde(default)]
    pub artefacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_examples: Option<String>,
    #[serde(default)]
    pub task_types: Vec<String>,
    #[serde(default)]
    pub question_types: Vec<String>,
}

impl ConnectConfiguration {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if is_blank(&self.learner_profile_role)
            || is_blank(&self.learner_profile_department)
            || is_blank(&self.scenario_descriptions)
        {
            return Err(WorkflowError::InvalidConfiguration(
                "Role, department, and scenario description are required to generate Connect."
                    .to_string(),
            ));
        }
        check_limit("Scenario description", self.scenario_descriptions.as_ref())?;
        check_limit("Task examples", self.task_examples.as_ref())?;
        Ok(())
    }
}

/// Option catalogues offered by the Connect configuration form
pub mod connect_options {
    pub const LEARNER_PROFILE_ROLES: &[&str] = &["Policy analyst", "Supervisor"];
    pub const LEARNER_PROFILE_DEPARTMENTS: &[&str] = &[
        "Policy department",
        "Supervision department",
        "Financial stability department",
        "Innovation department",
        "Resolution department",
    ];
    pub const COUNTRY_TYPES: &[&str] = &["Developed", "Developing"];
    pub const AUTHORITY_TYPES: &[&str] =
        &["Banking", "Insurance", "Central bank", "Integrated authority"];
    pub const FINANCIAL_INSTITUTION_TYPES: &[&str] = &["Bank", "Insurer"];
    pub const CHARACTER_ROLES: &[&str] = &[
        "Manager",
        "Head of authority",
        "CEO of bank",
        "CEO of insurer",
        "Project team members",
    ];
    pub const ARTEFACTS: &[&str] = &[
        "Emails",
        "Phone Calls",
        "Press Reports",
        "Live News",
        "Financial Statements",
    ];
    pub const TASK_TYPES: &[&str] =
        &["Provide Advice", "Provide Recommendation", "Provide Report"];
    pub const QUESTION_TYPES: &[&str] =
        &["Fill-in-the-Blank", "Multiple Choice Question", "True/False"];
}

// ============================================================================
// Briefs
// ============================================================================

/// Per-brief generation instructions extracted from the outline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefInstructions {
    pub title: String,
    #[serde(default)]
    pub objectives: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "section_title", skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(default, alias = "section_content", skip_serializing_if = "Option::is_none")]
    pub section_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// One generated lesson unit.
///
/// `content` always starts with its own `## Brief N:` heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brief {
    pub id: String,
    pub ordinal: u32,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<BriefInstructions>,
}

/// A page inside a single brief
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefPage {
    pub page_number: u32,
    pub title: String,
    pub content: String,
}

// ============================================================================
// Workflow
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    #[default]
    FullTutorial,
    ExecutiveSummary,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::FullTutorial => "full_tutorial",
            WorkflowType::ExecutiveSummary => "executive_summary",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowType::FullTutorial => "Full Tutorial",
            WorkflowType::ExecutiveSummary => "Executive Summary",
        }
    }

    /// The linear step sequence this workflow walks through
    pub fn steps(&self) -> &'static [WorkflowStep] {
        match self {
            WorkflowType::FullTutorial => &[
                WorkflowStep::Configuration,
                WorkflowStep::Outline,
                WorkflowStep::Briefs,
                WorkflowStep::ConnectConfiguration,
                WorkflowStep::Connect,
                WorkflowStep::TestYourself,
                WorkflowStep::ExecutiveSummary,
            ],
            WorkflowType::ExecutiveSummary => {
                &[WorkflowStep::Configuration, WorkflowStep::ExecutiveSummary]
            }
        }
    }

    pub fn next_step(&self, step: WorkflowStep) -> Option<WorkflowStep> {
        let steps = self.steps();
        let idx = steps.iter().position(|s| *s == step)?;
        steps.get(idx + 1).copied()
    }

    pub fn previous_step(&self, step: WorkflowStep) -> Option<WorkflowStep> {
        let steps = self.steps();
        let idx = steps.iter().position(|s| *s == step)?;
        idx.checked_sub(1).and_then(|i| steps.get(i).copied())
    }
}

/// One step of the wizard, including the two form-only steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStep {
    Configuration,
    Outline,
    Briefs,
    ConnectConfiguration,
    Connect,
    TestYourself,
    ExecutiveSummary,
}

impl WorkflowStep {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowStep::Configuration => "Configuration",
            WorkflowStep::Outline => "Outline",
            WorkflowStep::Briefs => "Briefs",
            WorkflowStep::ConnectConfiguration => "Connect Setup",
            WorkflowStep::Connect => "Connect",
            WorkflowStep::TestYourself => "Test Yourself",
            WorkflowStep::ExecutiveSummary => "Executive Summary",
        }
    }

    /// The generated stage behind this step, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowStep::Outline => Some(Stage::Outline),
            WorkflowStep::Briefs => Some(Stage::Briefs),
            WorkflowStep::Connect => Some(Stage::Connect),
            WorkflowStep::TestYourself => Some(Stage::Test),
            WorkflowStep::ExecutiveSummary => Some(Stage::Summary),
            WorkflowStep::Configuration | WorkflowStep::ConnectConfiguration => None,
        }
    }
}

/// A step whose artifact is produced by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Outline,
    Briefs,
    Connect,
    Test,
    Summary,
}

impl Stage {
    pub fn all() -> Vec<Stage> {
        vec![
            Stage::Outline,
            Stage::Briefs,
            Stage::Connect,
            Stage::Test,
            Stage::Summary,
        ]
    }

    pub fn step(&self) -> WorkflowStep {
        match self {
            Stage::Outline => WorkflowStep::Outline,
            Stage::Briefs => WorkflowStep::Briefs,
            Stage::Connect => WorkflowStep::Connect,
            Stage::Test => WorkflowStep::TestYourself,
            Stage::Summary => WorkflowStep::ExecutiveSummary,
        }
    }

    /// Stage name sent with chat requests
    pub fn api_name(&self) -> &'static str {
        match self {
            Stage::Outline => "outline",
            Stage::Briefs => "brief",
            Stage::Connect => "connect",
            Stage::Test => "test",
            Stage::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ArtifactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactLevel::Beginner => "Beginner",
            ArtifactLevel::Intermediate => "Intermediate",
            ArtifactLevel::Advanced => "Advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLength {
    Shortest,
    Shorter,
    Longer,
    Longest,
}

impl ArtifactLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactLength::Shortest => "shortest",
            ArtifactLength::Shorter => "shorter",
            ArtifactLength::Longer => "longer",
            ArtifactLength::Longest => "longest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_requires_title() {
        let config = Configuration::default();
        assert!(config.validate().is_err());

        let config = Configuration {
            title: "Basel III".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configuration_text_limit() {
        let config = Configuration {
            title: "Basel III".to_string(),
            sections_to_exclude: Some("x".repeat(TEXT_LIMIT + 1)),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Sections to exclude"));
    }

    #[test]
    fn test_connect_configuration_required_fields() {
        let mut connect = ConnectConfiguration {
            learner_profile_role: Some("Supervisor".to_string()),
            learner_profile_department: Some("Policy department".to_string()),
            ..Default::default()
        };
        let err = connect.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Role, department, and scenario description are required to generate Connect."
        );

        connect.scenario_descriptions = Some("A mid-size bank fails a stress test".to_string());
        assert!(connect.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_form() {
        let config = Configuration::default();
        assert_eq!(config.tone, Tone::ProfessionalAndConcise);
        assert_eq!(config.number_of_briefs.count(), 3);
    }

    #[test]
    fn test_workflow_step_sequence() {
        let full = WorkflowType::FullTutorial;
        assert_eq!(full.next_step(WorkflowStep::Briefs), Some(WorkflowStep::ConnectConfiguration));
        assert_eq!(full.previous_step(WorkflowStep::Configuration), None);
        assert_eq!(full.next_step(WorkflowStep::ExecutiveSummary), None);

        let summary = WorkflowType::ExecutiveSummary;
        assert_eq!(
            summary.next_step(WorkflowStep::Configuration),
            Some(WorkflowStep::ExecutiveSummary)
        );
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Tone::SimpleAndClear).unwrap(), "\"simple_and_clear\"");
        assert_eq!(serde_json::to_string(&BriefCount::Four).unwrap(), "\"four\"");
        assert_eq!(serde_json::to_string(&ArtifactLength::Longest).unwrap(), "\"longest\"");
        assert_eq!(serde_json::to_string(&ArtifactLevel::Beginner).unwrap(), "\"Beginner\"");
    }

    #[test]
    fn test_source_document_camel_case() {
        let json = r#"{"name":"report.pdf","fileType":"pdf","content":"text","figures":[{"id":"f1","b64image":"AAA","pageNumber":3}]}"#;
        let doc: SourceDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.file_type.as_deref(), Some("pdf"));
        assert_eq!(doc.figures[0].page_number, 3);
        assert!(doc.figures[0].caption.is_none());
    }
}
