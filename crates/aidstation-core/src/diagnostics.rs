use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::columns::RunnerKey;
use crate::error::FieldParseError;

/// A field that failed to parse; the derived value for it was left null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiagnostic {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub error: FieldParseError,
}

impl FieldDiagnostic {
    pub fn new(row: usize, column: &str, value: &str, error: FieldParseError) -> Self {
        Self {
            row,
            column: column.to_string(),
            value: value.to_string(),
            error,
        }
    }
}

/// What the race calendar saw while attaching `race_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub years_seen: Vec<i64>,
    pub null_year_rows: usize,
    pub unsupported_year_rows: usize,
    pub race_date_counts: BTreeMap<NaiveDate, usize>,
}

/// Everything a caller needs to know about what was dropped, defaulted or flagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub input_rows: usize,
    pub calendar: CalendarSummary,
    pub diagnostics: Vec<FieldDiagnostic>,
    pub rollovers: usize,
    pub flagged_runners: Vec<RunnerKey>,
    pub flagged_rows: usize,
    pub validated_rows: usize,
}

impl NormalizationReport {
    pub fn diagnostics_for(&self, column: &str) -> impl Iterator<Item = &FieldDiagnostic> {
        let column = column.to_string();
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.column == column)
    }

    pub fn diagnostic_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *counts.entry(diagnostic.column.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
