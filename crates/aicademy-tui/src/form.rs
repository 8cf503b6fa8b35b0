use aicademy_core::types::{connect_options as opts, BriefCount, Tone};
use aicademy_core::{Configuration, ConnectConfiguration, WorkflowType};

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text {
        value: String,
        cursor: usize,
    },
    Choice {
        options: Vec<String>,
        selected: Option<usize>,
    },
    MultiChoice {
        options: Vec<String>,
        checked: Vec<bool>,
        cursor: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FormField {
    fn text(label: &'static str, value: &str, required: bool) -> Self {
        Self {
            label,
            kind: FieldKind::Text {
                value: value.to_string(),
                cursor: value.chars().count(),
            },
            required,
        }
    }

    fn choice(label: &'static str, options: &[&str], selected: Option<usize>) -> Self {
        Self {
            label,
            kind: FieldKind::Choice {
                options: options.iter().map(|o| o.to_string()).collect(),
                selected,
            },
            required: true,
        }
    }

    fn multi(label: &'static str, options: &[&str], current: &[String]) -> Self {
        Self {
            label,
            kind: FieldKind::MultiChoice {
                options: options.iter().map(|o| o.to_string()).collect(),
                checked: options
                    .iter()
                    .map(|o| current.iter().any(|c| c == o))
                    .collect(),
                cursor: 0,
            },
            required: false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, FieldKind::Text { .. })
    }

    /// One-line rendering of the current value
    pub fn display_value(&self) -> String {
        match &self.kind {
            FieldKind::Text { value, .. } => value.clone(),
            FieldKind::Choice { options, selected } => selected
                .and_then(|i| options.get(i))
                .map(|o| format!("< {} >", o))
                .unwrap_or_else(|| "< select >".to_string()),
            FieldKind::MultiChoice {
                options,
                checked,
                cursor,
            } => options
                .iter()
                .zip(checked)
                .enumerate()
                .map(|(i, (option, on))| {
                    let mark = if *on { "[x]" } else { "[ ]" };
                    if i == *cursor {
                        format!(">{} {}", mark, option)
                    } else {
                        format!(" {} {}", mark, option)
                    }
                })
                .collect::<Vec<_>>()
                .join("  "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Configuration,
    Connect,
}

/// A step form: a vertical list of fields with one focused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focused: usize,
    pub error: Option<String>,
}

// Field positions
const SOURCES: usize = 0;
const TITLE: usize = 1;
const TONE: usize = 2;
const BRIEF_COUNT: usize = 3;
const HIGHLIGHT: usize = 4;
const EXCLUDE: usize = 5;

const ROLE: usize = 0;
const DEPARTMENT: usize = 1;
const COUNTRY: usize = 2;
const AUTHORITY: usize = 3;
const INSTITUTION: usize = 4;
const SCENARIO: usize = 5;
const CHARACTERS: usize = 6;
const ARTEFACTS: usize = 7;
const TASK_EXAMPLES: usize = 8;
const TASK_TYPES: usize = 9;
const QUESTION_TYPES: usize = 10;

impl Form {
    /// Sources are file paths, comma separated
    pub fn configuration(
        current: Option<&Configuration>,
        source_names: &[String],
        workflow_type: WorkflowType,
    ) -> Self {
        let config = current.cloned().unwrap_or_default();
        let tones: Vec<&str> = Tone::all().iter().map(|t| t.label()).collect();
        let counts = ["1", "2", "3", "4", "5"];
        let tone_idx = Tone::all().iter().position(|t| *t == config.tone);
        let count_idx = BriefCount::all()
            .iter()
            .position(|c| *c == config.number_of_briefs);

        let mut fields = vec![
            FormField::text("Source PDFs", &source_names.join(", "), true),
            FormField::text("Title", &config.title, true),
            FormField::choice("Tone", &tones, tone_idx),
            FormField::choice("Number of briefs", &counts, count_idx),
            FormField::text(
                "Sections to highlight",
                config.sections_to_highlight.as_deref().unwrap_or(""),
                false,
            ),
            FormField::text(
                "Sections to exclude",
                config.sections_to_exclude.as_deref().unwrap_or(""),
                false,
            ),
        ];
        if workflow_type == WorkflowType::ExecutiveSummary {
            fields[BRIEF_COUNT].required = false;
        }

        Self {
            kind: FormKind::Configuration,
            fields,
            focused: 0,
            error: None,
        }
    }

    pub fn connect(current: Option<&ConnectConfiguration>) -> Self {
        let config = current.cloned().unwrap_or_default();
        let position = |options: &[&str], value: &Option<String>| {
            value
                .as_ref()
                .and_then(|v| options.iter().position(|o| *o == v.as_str()))
        };

        let fields = vec![
            FormField::choice(
                "Learner role",
                opts::LEARNER_PROFILE_ROLES,
                position(opts::LEARNER_PROFILE_ROLES, &config.learner_profile_role),
            ),
            FormField::choice(
                "Learner department",
                opts::LEARNER_PROFILE_DEPARTMENTS,
                position(
                    opts::LEARNER_PROFILE_DEPARTMENTS,
                    &config.learner_profile_department,
                ),
            ),
            FormField::multi(
                "Country type",
                opts::COUNTRY_TYPES,
                &config.scenario_details_country_type,
            ),
            FormField::multi(
                "Authority type",
                opts::AUTHORITY_TYPES,
                &config.scenario_details_authority_type,
            ),
            FormField::multi(
                "Financial institutions",
                opts::FINANCIAL_INSTITUTION_TYPES,
                &config.scenario_details_financial_institutions_type,
            ),
            FormField::text(
                "Scenario description",
                config.scenario_descriptions.as_deref().unwrap_or(""),
                true,
            ),
            FormField::multi("Character roles", opts::CHARACTER_ROLES, &config.character_roles),
            FormField::multi("Artefacts", opts::ARTEFACTS, &config.artefacts),
            FormField::text(
                "Task examples",
                config.task_examples.as_deref().unwrap_or(""),
                false,
            ),
            FormField::multi("Task types", opts::TASK_TYPES, &config.task_types),
            FormField::multi("Question types", opts::QUESTION_TYPES, &config.question_types),
        ];

        Self {
            kind: FormKind::Connect,
            fields,
            focused: 0,
            error: None,
        }
    }

    pub fn focused_field(&self) -> Option<&FormField> {
        self.fields.get(self.focused)
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    // Editing

    pub fn insert_char(&mut self, c: char) {
        if let Some(FieldKind::Text { value, cursor }) = self.focused_kind() {
            let byte_pos = char_to_byte_index(value, *cursor);
            value.insert(byte_pos, c);
            *cursor += 1;
        }
    }

    pub fn backspace(&mut self) {
        if let Some(FieldKind::Text { value, cursor }) = self.focused_kind() {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(value, *cursor);
                value.remove(byte_pos);
            }
        }
    }

    /// Left/right: move the text cursor, cycle a choice, or move across options
    pub fn shift(&mut self, forward: bool) {
        match self.focused_kind() {
            Some(FieldKind::Text { value, cursor }) => {
                let len = value.chars().count();
                *cursor = if forward {
                    (*cursor + 1).min(len)
                } else {
                    cursor.saturating_sub(1)
                };
            }
            Some(FieldKind::Choice { options, selected }) => {
                let len = options.len();
                if len > 0 {
                    *selected = Some(match (*selected, forward) {
                        (None, _) => 0,
                        (Some(i), true) => (i + 1) % len,
                        (Some(i), false) => (i + len - 1) % len,
                    });
                }
            }
            Some(FieldKind::MultiChoice {
                options, cursor, ..
            }) => {
                let len = options.len();
                if len > 0 {
                    *cursor = if forward {
                        (*cursor + 1) % len
                    } else {
                        (*cursor + len - 1) % len
                    };
                }
            }
            None => {}
        }
    }

    /// Space on a multi-choice field
    pub fn toggle(&mut self) {
        if let Some(FieldKind::MultiChoice {
            checked, cursor, ..
        }) = self.focused_kind()
        {
            if let Some(on) = checked.get_mut(*cursor) {
                *on = !*on;
            }
        }
    }

    fn focused_kind(&mut self) -> Option<&mut FieldKind> {
        self.fields.get_mut(self.focused).map(|f| &mut f.kind)
    }

    // Reading values

    fn text(&self, idx: usize) -> String {
        match self.fields.get(idx).map(|f| &f.kind) {
            Some(FieldKind::Text { value, .. }) => value.trim().to_string(),
            _ => String::new(),
        }
    }

    fn optional_text(&self, idx: usize) -> Option<String> {
        Some(self.text(idx)).filter(|t| !t.is_empty())
    }

    fn selected(&self, idx: usize) -> Option<usize> {
        match self.fields.get(idx).map(|f| &f.kind) {
            Some(FieldKind::Choice { selected, .. }) => *selected,
            _ => None,
        }
    }

    fn selected_option(&self, idx: usize) -> Option<String> {
        match self.fields.get(idx).map(|f| &f.kind) {
            Some(FieldKind::Choice { options, selected }) => {
                selected.and_then(|i| options.get(i)).cloned()
            }
            _ => None,
        }
    }

    fn checked(&self, idx: usize) -> Vec<String> {
        match self.fields.get(idx).map(|f| &f.kind) {
            Some(FieldKind::MultiChoice {
                options, checked, ..
            }) => options
                .iter()
                .zip(checked)
                .filter(|(_, on)| **on)
                .map(|(o, _)| o.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Paths typed into the sources field
    pub fn source_paths(&self) -> Vec<String> {
        self.text(SOURCES)
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn to_configuration(&self) -> Configuration {
        let tone = self
            .selected(TONE)
            .and_then(|i| Tone::all().get(i).copied())
            .unwrap_or_default();
        let number_of_briefs = self
            .selected(BRIEF_COUNT)
            .and_then(|i| BriefCount::all().get(i).copied())
            .unwrap_or_default();

        Configuration {
            title: self.text(TITLE),
            tone,
            number_of_briefs,
            sections_to_highlight: self.optional_text(HIGHLIGHT),
            sections_to_exclude: self.optional_text(EXCLUDE),
        }
    }

    pub fn to_connect_configuration(&self) -> ConnectConfiguration {
        ConnectConfiguration {
            learner_profile_role: self.selected_option(ROLE),
            learner_profile_department: self.selected_option(DEPARTMENT),
            scenario_details_country_type: self.checked(COUNTRY),
            scenario_details_authority_type: self.checked(AUTHORITY),
            scenario_details_financial_institutions_type: self.checked(INSTITUTION),
            scenario_descriptions: self.optional_text(SCENARIO),
            character_roles: self.checked(CHARACTERS),
            artefacts: self.checked(ARTEFACTS),
            task_examples: self.optional_text(TASK_EXAMPLES),
            task_types: self.checked(TASK_TYPES),
            question_types: self.checked(QUESTION_TYPES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_configuration_form_round_trip() {
        let config = Configuration {
            title: "Liquidity".to_string(),
            tone: Tone::TechnicalAndAnalytical,
            number_of_briefs: BriefCount::Four,
            sections_to_highlight: Some("Chapter 3".to_string()),
            sections_to_exclude: None,
        };
        let form = Form::configuration(
            Some(&config),
            &["a.pdf".to_string(), "b.pdf".to_string()],
            WorkflowType::FullTutorial,
        );

        assert_eq!(form.to_configuration(), config);
        assert_eq!(form.source_paths(), vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_editing_text_field() {
        let mut form = Form::configuration(None, &[], WorkflowType::FullTutorial);
        form.next_field();
        for c in "Basel".chars() {
            form.insert_char(c);
        }
        form.shift(false);
        form.backspace();
        assert_eq!(form.to_configuration().title, "Basl");
    }

    #[test]
    fn test_choice_and_multi_choice() {
        let mut form = Form::connect(None);
        assert_eq!(form.to_connect_configuration().learner_profile_role, None);

        form.shift(true);
        assert_eq!(
            form.to_connect_configuration().learner_profile_role.as_deref(),
            Some(opts::LEARNER_PROFILE_ROLES[0])
        );

        form.focused = COUNTRY;
        form.shift(true);
        form.toggle();
        assert_eq!(
            form.to_connect_configuration().scenario_details_country_type,
            vec![opts::COUNTRY_TYPES[1].to_string()]
        );
    }
}
