//! The read-only `prioritize_resolutions` analysis tool.
//!
//! Classifies each active resolution by keyword, estimates weekly effort from
//! the measurable criteria, detects supporting relationships from a fixed rule
//! table, allocates an hours budget, and renders the whole plan as a
//! narrative the model can relay to the user.

use serde::Deserialize;

use stride_core::{Resolution, ResolutionSet};

use crate::ToolResult;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrioritizeInput {
    pub focus_area: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Health,
    Learning,
    Reading,
    Career,
    Relationships,
    Mindfulness,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Learning => "learning",
            Self::Reading => "reading",
            Self::Career => "career",
            Self::Relationships => "relationships",
            Self::Mindfulness => "mindfulness",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    High,
    Medium,
    Low,
}

impl Effort {
    fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    fn base_hours(self) -> f32 {
        match self {
            Self::High => 6.0,
            Self::Medium => 3.5,
            Self::Low => 1.5,
        }
    }
}

/// Keyword table for title classification, checked in order; first hit wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Health,
        &["run", "exercise", "gym", "workout", "weight", "fitness", "sleep", "diet", "walk"],
    ),
    (
        Category::Mindfulness,
        &["meditat", "mindful", "journal", "gratitude", "breath"],
    ),
    (Category::Reading, &["read", "book"]),
    (
        Category::Learning,
        &["learn", "study", "course", "skill", "language", "practice"],
    ),
    (
        Category::Career,
        &["career", "job", "work", "promotion", "network", "business", "side project"],
    ),
    (
        Category::Relationships,
        &["friend", "family", "partner", "relationship", "call", "date night"],
    ),
];

pub fn classify(title: &str) -> Category {
    let title = title.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| title.contains(k)) {
            return *category;
        }
    }
    Category::Other
}

/// Effort from the cadence implied by the measurable criteria.
pub fn estimate_effort(measurable_criteria: &str) -> Effort {
    let criteria = measurable_criteria.to_lowercase();
    if criteria.contains("daily") || criteria.contains("every day") {
        Effort::High
    } else if criteria.contains("weekly") || criteria.contains("every week") {
        Effort::Medium
    } else {
        Effort::Low
    }
}

struct Assessment<'a> {
    resolution: &'a Resolution,
    category: Category,
    effort: Effort,
    hours: f32,
}

/// Fixed, asymmetric support rules: exercise and sleep fuel learning and
/// career goals; a mindfulness practice supports everything else.
fn synergies(assessments: &[Assessment<'_>]) -> Vec<String> {
    let mut notes = Vec::new();
    for a in assessments {
        for b in assessments {
            if a.resolution.id == b.resolution.id {
                continue;
            }
            if a.category == Category::Health
                && matches!(b.category, Category::Learning | Category::Career)
            {
                notes.push(format!(
                    "\"{}\" supports \"{}\" — physical routine fuels focus for learning and work",
                    a.resolution.title, b.resolution.title
                ));
            } else if a.category == Category::Mindfulness {
                notes.push(format!(
                    "\"{}\" supports \"{}\" — a mindfulness practice steadies everything else",
                    a.resolution.title, b.resolution.title
                ));
            }
        }
    }
    notes
}

const FOCUS_BOOST: f32 = 1.5;

pub fn prioritize(input: &PrioritizeInput, set: &ResolutionSet) -> ToolResult {
    let focus = input
        .focus_area
        .as_deref()
        .map(str::trim)
        .map(str::to_lowercase)
        .filter(|s| !s.is_empty());

    let assessments: Vec<Assessment<'_>> = set
        .active()
        .map(|resolution| {
            let category = classify(&resolution.title);
            let effort = estimate_effort(&resolution.measurable_criteria);
            let mut hours = effort.base_hours();
            if focus.as_deref() == Some(category.as_str()) {
                hours *= FOCUS_BOOST;
            }
            Assessment {
                resolution,
                category,
                effort,
                hours,
            }
        })
        .collect();

    if assessments.is_empty() {
        return ToolResult::fail("no active resolutions to prioritize");
    }

    // Bucket by allocated weekly hours: >5 immediate, 2–5 secondary, ≤2 maintenance.
    let mut immediate = Vec::new();
    let mut secondary = Vec::new();
    let mut maintenance = Vec::new();
    for a in &assessments {
        let line = format!(
            "- \"{}\" [{}] — {} effort, ~{:.1}h/week",
            a.resolution.title,
            a.category.as_str(),
            a.effort.label(),
            a.hours
        );
        if a.hours > 5.0 {
            immediate.push(line);
        } else if a.hours > 2.0 {
            secondary.push(line);
        } else {
            maintenance.push(line);
        }
    }

    let total_hours: f32 = assessments.iter().map(|a| a.hours).sum();
    let mut narrative = format!(
        "Priority plan for {} active resolution(s), about {:.1} hours/week total.\n",
        assessments.len(),
        total_hours
    );
    if !immediate.is_empty() {
        narrative.push_str("\nImmediate focus (>5h/week):\n");
        narrative.push_str(&immediate.join("\n"));
    }
    if !secondary.is_empty() {
        narrative.push_str("\nSecondary (2-5h/week):\n");
        narrative.push_str(&secondary.join("\n"));
    }
    if !maintenance.is_empty() {
        narrative.push_str("\nMaintenance (up to 2h/week):\n");
        narrative.push_str(&maintenance.join("\n"));
    }
    let synergy_notes = synergies(&assessments);
    if !synergy_notes.is_empty() {
        narrative.push_str("\nSynergies:\n- ");
        narrative.push_str(&synergy_notes.join("\n- "));
    }
    if let Some(focus) = &focus {
        narrative.push_str(&format!("\nFocus area \"{focus}\" weighted more heavily."));
    }

    ToolResult::ok(narrative).with_count(assessments.len())
}

// ── Tests ────────────────────────────────────────────────────────────────────
