//! Splitting generated markdown into addressable sections.
//!
//! Briefs arrive as one blob separated by `## Brief N:` headings, and each
//! brief is further divided into pages by `#+ Page N: Title` headings. Both
//! are handled by the same pair of pure functions, [`split`] and [`combine`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::{Brief, BriefInstructions, BriefPage};

/// Separator placed between sections when they are combined
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

static BRIEF_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## Brief (\d+):").unwrap());

static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+ Page (\d+):[ \t]*([^\n]*)$").unwrap());

/// Heading family a text is split on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPattern {
    /// `## Brief <n>:`
    Brief,
    /// `#+ Page <n>: <title>`
    Page,
}

impl MarkerPattern {
    fn regex(&self) -> &'static Regex {
        match self {
            MarkerPattern::Brief => &*BRIEF_MARKER_RE,
            MarkerPattern::Page => &*PAGE_MARKER_RE,
        }
    }

    /// Canonical heading line for a section
    pub fn render_marker(&self, ordinal: u32, label: &str) -> String {
        match self {
            MarkerPattern::Brief => format!("## Brief {}:", ordinal),
            MarkerPattern::Page if label.is_empty() => format!("### Page {}:", ordinal),
            MarkerPattern::Page => format!("### Page {}: {}", ordinal, label),
        }
    }

    fn label(&self, ordinal: u32, caps: Option<&Captures>) -> String {
        match self {
            MarkerPattern::Brief => format!("Brief {}", ordinal),
            MarkerPattern::Page => caps
                .and_then(|c| c.get(2))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        }
    }
}

/// One labeled unit of a split text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: String,
    pub ordinal: u32,
    /// The heading line this section was introduced by
    pub marker: String,
    pub body: String,
}

impl Section {
    pub fn new(pattern: MarkerPattern, ordinal: u32, label: &str, body: &str) -> Self {
        Self {
            label: label.to_string(),
            ordinal,
            marker: pattern.render_marker(ordinal, label),
            body: body.trim().to_string(),
        }
    }

    /// Marker line followed by the body
    pub fn render(&self) -> String {
        if self.body.is_empty() {
            self.marker.clone()
        } else {
            format!("{}\n\n{}", self.marker, self.body)
        }
    }
}

/// Result of splitting a text, keeping what came before the first marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument {
    pub preamble: String,
    pub sections: Vec<Section>,
    /// False when the text had no markers and was wrapped as one section
    pub marked: bool,
}

impl SplitDocument {
    /// Rebuild the text, restoring the preamble
    pub fn combine(&self) -> String {
        if !self.marked {
            return self
                .sections
                .first()
                .map(|s| s.body.clone())
                .unwrap_or_else(|| self.preamble.clone());
        }

        let sections = combine(&self.sections);
        match (self.preamble.is_empty(), sections.is_empty()) {
            (true, _) => sections,
            (false, true) => self.preamble.clone(),
            (false, false) => format!("{}\n\n{}", self.preamble, sections),
        }
    }
}

/// Split `text` into ordered sections on `pattern`.
///
/// Empty input yields no sections; input without any marker yields a single
/// section with ordinal 1 holding the whole trimmed text.
pub fn split(text: &str, pattern: MarkerPattern) -> Vec<Section> {
    split_document(text, pattern).sections
}

pub fn split_document(text: &str, pattern: MarkerPattern) -> SplitDocument {
    let matches: Vec<Captures> = pattern.regex().captures_iter(text).collect();

    if matches.is_empty() {
        let body = text.trim();
        let sections = if body.is_empty() {
            Vec::new()
        } else {
            vec![Section::new(pattern, 1, &pattern.label(1, None), body)]
        };
        return SplitDocument {
            preamble: String::new(),
            sections,
            marked: false,
        };
    }

    let first_start = matches[0].get(0).map(|m| m.start()).unwrap_or(0);
    let preamble = strip_separator(text[..first_start].trim()).to_string();

    let mut sections = Vec::with_capacity(matches.len());
    for (i, caps) in matches.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let body = strip_separator(text[whole.end()..end].trim());

        // Fall back to position when the digits don't fit
        let ordinal = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or((i + 1) as u32);

        sections.push(Section {
            label: pattern.label(ordinal, Some(caps)),
            ordinal,
            marker: whole.as_str().trim_end().to_string(),
            body: body.to_string(),
        });
    }

    SplitDocument {
        preamble,
        sections,
        marked: true,
    }
}

/// Join sections back into one text, each prefixed with its marker line
pub fn combine(sections: &[Section]) -> String {
    sections
        .iter()
        .map(Section::render)
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

// Drop a trailing `---` left over from a previous combine
fn strip_separator(body: &str) -> &str {
    if body == "---" {
        return "";
    }
    match body.strip_suffix("\n---") {
        Some(rest) => rest.trim_end(),
        None => body,
    }
}

// ============================================================================
// Briefs
// ============================================================================

impl Brief {
    /// Build a brief from generated text, normalising its heading
    pub fn from_generated(
        ordinal: u32,
        content: &str,
        instructions: Option<BriefInstructions>,
    ) -> Self {
        Self {
            id: format!("brief-{}", ordinal),
            ordinal,
            title: format!("Brief {}", ordinal),
            content: Section::new(MarkerPattern::Brief, ordinal, "", brief_body(content)).render(),
            instructions,
        }
    }

    /// Content without the leading `## Brief N:` heading
    pub fn body(&self) -> &str {
        brief_body(&self.content)
    }

    pub fn pages(&self) -> Vec<BriefPage> {
        parse_pages(&self.content)
    }
}

fn brief_body(content: &str) -> &str {
    let trimmed = content.trim();
    match BRIEF_MARKER_RE.find(trimmed) {
        Some(m) if m.start() == 0 => trimmed[m.end()..].trim(),
        _ => trimmed,
    }
}

pub fn combine_briefs(briefs: &[Brief]) -> String {
    briefs
        .iter()
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

// ============================================================================
// Pages
// ============================================================================

pub fn parse_pages(brief_content: &str) -> Vec<BriefPage> {
    split(brief_body(brief_content), MarkerPattern::Page)
        .into_iter()
        .map(|section| BriefPage {
            page_number: section.ordinal,
            title: if section.label.is_empty() {
                format!("Page {}", section.ordinal)
            } else {
                section.label
            },
            content: section.body,
        })
        .collect()
}

/// A `Page N:` heading inside a brief and the line it sits on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarker {
    pub line: usize,
    pub page_number: u32,
    pub title: String,
}

/// Page headings of a brief in order, with zero-based line numbers
pub fn page_markers(brief_content: &str) -> Vec<PageMarker> {
    PAGE_MARKER_RE
        .captures_iter(brief_content)
        .filter_map(|caps| {
            let heading = caps.get(0)?;
            let page_number = caps.get(1)?.as_str().parse().ok()?;
            Some(PageMarker {
                line: brief_content[..heading.start()].matches('\n').count(),
                page_number,
                title: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            })
        })
        .collect()
}
