//! Row-to-conversation formatting.
//!
//! Two variants are supported: translation tables (source sentence plus a target
//! rendering) and nutrition tables (a food name plus optional numeric fields).
//! Every row is formatted independently into a [`RowOutcome`]; the outcomes are
//! reduced into a [`FormatReport`].

use crate::dataset::ConversationExample;
use crate::error::TrainingResult;
use crate::loader::{RawRecord, RawTable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub const SENTENCE_COLUMN: &str = "sentence";
pub const TRANSLATION_COLUMN: &str = "translation";
pub const TRANSLATION_EXTRA_COLUMN: &str = "translation_extra";
pub const FOOD_COLUMN: &str = "food";

pub const DEFAULT_MAX_ANSWER_CLAUSES: usize = 6;

/// (candidate columns, label, unit) in answer order.
const NUTRITION_FIELDS: &[(&[&str], &str, &str)] = &[
    (&["Caloric Value"], "Calories", " kcal"),
    (&["Protein"], "Protein", "g"),
    (&["Fat"], "Fat", "g"),
    (&["Carbohydrates"], "Carbohydrates", "g"),
    (&["Dietary Fiber", "Fiber"], "Fiber", "g"),
    (&["Vitamin C"], "Vitamin C", "mg"),
    (&["Calcium"], "Calcium", "mg"),
    (&["Iron"], "Iron", "mg"),
];

const QUESTION_TEMPLATES: &[&str] = &[
    "What are the nutritional values for {food}?",
    "What is the nutritional content of {food}?",
    "Can you tell me the nutrition facts for {food}?",
    "How nutritious is {food}?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    Translation,
    Nutrition,
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Translation => write!(f, "translation"),
            Self::Nutrition => write!(f, "nutrition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterOptions {
    pub format: DatasetFormat,
    /// Translation only: read the target from `translation_extra`.
    pub use_extra_translation: bool,
    /// Nutrition only: cap on answer clauses.
    pub max_answer_clauses: usize,
    /// Nutrition only: keys question-template selection.
    pub seed: u64,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            format: DatasetFormat::Translation,
            use_extra_translation: false,
            max_answer_clauses: DEFAULT_MAX_ANSWER_CLAUSES,
            seed: 42,
        }
    }
}

/// A recoverable formatting problem. Never aborts the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormattingDegradation {
    /// The configured column is missing from the table; `used` was read instead.
    ColumnFallback { requested: String, used: String },
    /// The configured cell was empty for this row; `used` was read instead.
    CellFallback { row: usize, requested: String, used: String },
    /// The row cannot produce a non-empty turn and was not emitted.
    EmptyField { row: usize, field: String },
}

impl std::fmt::Display for FormattingDegradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnFallback { requested, used } => {
                write!(f, "column '{requested}' not found, using '{used}'")
            }
            Self::CellFallback { row, requested, used } => {
                write!(f, "row {row}: '{requested}' is empty, using '{used}'")
            }
            Self::EmptyField { row, field } => write!(f, "row {row}: '{field}' is empty"),
        }
    }
}

/// A formatted row, possibly carrying a degradation that did not prevent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRow {
    pub example: ConversationExample,
    pub degradation: Option<FormattingDegradation>,
}

pub type RowOutcome = Result<FormattedRow, FormattingDegradation>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub examples: Vec<ConversationExample>,
    pub degradations: Vec<FormattingDegradation>,
    /// Rows that produced an example with no degradation.
    pub clean: usize,
    /// Rows that were degraded: emitted with a fallback, skipped, or formatted
    /// from the primary column after a column fallback. `clean + degraded`
    /// always equals the row count.
    pub degraded: usize,
}

impl FormatReport {
    fn push(&mut self, outcome: RowOutcome) {
        match outcome {
            Ok(FormattedRow { example, degradation: None }) => {
                self.examples.push(example);
                self.clean += 1;
            }
            Ok(FormattedRow { example, degradation: Some(d) }) => {
                self.examples.push(example);
                self.degradations.push(d);
                self.degraded += 1;
            }
            Err(d) => {
                self.degradations.push(d);
                self.degraded += 1;
            }
        }
    }
}

/// Format every row of `table`.
///
/// Fails only when a mandatory column is missing; row problems are reported.
pub fn format_table(table: &RawTable, options: &FormatterOptions) -> TrainingResult<FormatReport> {
    let mut report = FormatReport::default();

    match options.format {
        DatasetFormat::Translation => {
            table.require_columns(&[SENTENCE_COLUMN, TRANSLATION_COLUMN])?;

            let mut target = TRANSLATION_COLUMN;
            let mut column_fallback = false;
            if options.use_extra_translation {
                if table.has_column(TRANSLATION_EXTRA_COLUMN) {
                    target = TRANSLATION_EXTRA_COLUMN;
                } else {
                    column_fallback = true;
                    warn!(
                        requested = TRANSLATION_EXTRA_COLUMN,
                        used = TRANSLATION_COLUMN,
                        "alternate translation column not found; falling back"
                    );
                    report.degradations.push(FormattingDegradation::ColumnFallback {
                        requested: TRANSLATION_EXTRA_COLUMN.to_string(),
                        used: TRANSLATION_COLUMN.to_string(),
                    });
                }
            }

            for row in &table.rows {
                report.push(format_translation_row(row, target));
            }
            if column_fallback {
                report.degraded += report.clean;
                report.clean = 0;
            }
        }
        DatasetFormat::Nutrition => {
            table.require_columns(&[FOOD_COLUMN])?;
            for row in &table.rows {
                report.push(format_nutrition_row(row, options.max_answer_clauses, options.seed));
            }
        }
    }

    info!(
        format = %options.format,
        rows = table.len(),
        examples = report.examples.len(),
        degraded = report.degraded,
        "formatted conversations"
    );
    Ok(report)
}

pub fn format_translation_row(row: &RawRecord, target: &str) -> RowOutcome {
    let Some(sentence) = row.get(SENTENCE_COLUMN) else {
        return Err(FormattingDegradation::EmptyField {
            row: row.index,
            field: SENTENCE_COLUMN.to_string(),
        });
    };

    let mut degradation = None;
    let answer = match row.get(target) {
        Some(answer) => answer,
        None if target != TRANSLATION_COLUMN => match row.get(TRANSLATION_COLUMN) {
            Some(primary) => {
                debug!(row = row.index, "alternate translation empty; using primary");
                degradation = Some(FormattingDegradation::CellFallback {
                    row: row.index,
                    requested: target.to_string(),
                    used: TRANSLATION_COLUMN.to_string(),
                });
                primary
            }
            None => {
                return Err(FormattingDegradation::EmptyField {
                    row: row.index,
                    field: target.to_string(),
                });
            }
        },
        None => {
            return Err(FormattingDegradation::EmptyField {
                row: row.index,
                field: target.to_string(),
            });
        }
    };

    Ok(FormattedRow { example: ConversationExample::new(sentence, answer), degradation })
}

pub fn format_nutrition_row(row: &RawRecord, max_clauses: usize, seed: u64) -> RowOutcome {
    let Some(food) = row.get(FOOD_COLUMN) else {
        return Err(FormattingDegradation::EmptyField {
            row: row.index,
            field: FOOD_COLUMN.to_string(),
        });
    };

    let clauses: Vec<String> = NUTRITION_FIELDS
        .iter()
        .filter_map(|(columns, label, unit)| {
            let raw = columns.iter().find_map(|c| row.get(c))?;
            let value: f64 = raw.parse().ok()?;
            if !value.is_finite() || value == 0.0 {
                return None;
            }
            Some(format!("{label}: {raw}{unit}"))
        })
        .take(max_clauses)
        .collect();

    let answer = if clauses.is_empty() {
        format!("No nutritional information is available for {food}.")
    } else {
        format!("{food} contains: {}", clauses.join(", "))
    };

    let template = QUESTION_TEMPLATES[template_index(seed, row.index, QUESTION_TEMPLATES.len())];
    let question = template.replace("{food}", food);

    Ok(FormattedRow { example: ConversationExample::new(question, answer), degradation: None })
}

/// Deterministic template choice keyed by (seed, row index).
#[must_use]
pub fn template_index(seed: u64, row_index: usize, count: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update((row_index as u64).to_le_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(head) % count.max(1) as u64) as usize
}
