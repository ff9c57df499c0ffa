use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{info, warn};

use crate::checkpoint_time::CheckpointTimeResolver;
use crate::columns::{CheckpointDirection, TimestampSource, HAS_TIMING_ERROR};
use crate::config::NormalizerConfig;
use crate::diagnostics::{FieldDiagnostic, NormalizationReport};
use crate::elapsed_time::ElapsedTimeResolver;
use crate::error::Result;
use crate::race_calendar::RaceCalendar;
use crate::record::{extract_records, CheckpointLayout, CheckpointRecord};
use crate::sequence_validator::{SequenceEntry, SequenceValidator};

/// The validated table, the flagged runners' rows, and the run summary.
#[derive(Debug, Clone)]
pub struct NormalizationOutput {
    pub validated: DataFrame,
    pub flagged: DataFrame,
    pub report: NormalizationReport,
}

/// The four stages wired together with one configuration.
#[derive(Debug, Clone)]
pub struct CheckpointNormalizer {
    config: NormalizerConfig,
    calendar: RaceCalendar,
    time_of_day: CheckpointTimeResolver,
    elapsed: ElapsedTimeResolver,
    validator: SequenceValidator,
}

impl Default for CheckpointNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl CheckpointNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            calendar: config.calendar(),
            time_of_day: CheckpointTimeResolver::new(),
            elapsed: ElapsedTimeResolver::new(config.race_start),
            validator: SequenceValidator::new(),
            config,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn calendar(&self) -> &RaceCalendar {
        &self.calendar
    }

    /// Resolves, corrects and partitions `df`.
    ///
    /// Only schema problems are returned as errors; everything row-level ends up in the report.
    pub fn normalize(&self, df: &DataFrame) -> Result<NormalizationOutput> {
        self.config.validate()?;
        let layout = CheckpointLayout::from_frame(df, &self.config)?;

        info!(
            rows = df.height(),
            columns = df.width(),
            "Starting checkpoint normalization"
        );
        if df.height() == 0 {
            warn!("Input dataframe is empty");
        }

        let (dated, calendar_summary) = self.calendar.add_race_date(df, &layout.year)?;
        let (records, mut diagnostics) = extract_records(&dated, &layout)?;

        let mut candidates: BTreeMap<CheckpointDirection, Vec<SequenceEntry>> = BTreeMap::new();
        for direction in CheckpointDirection::ALL {
            if layout.direction(direction).is_none() {
                continue;
            }
            let (entries, direction_diagnostics) = self.resolve_candidates(&records, direction);
            if !direction_diagnostics.is_empty() {
                warn!(
                    direction = %direction,
                    failures = direction_diagnostics.len(),
                    "Unparsable timing fields left empty"
                );
            }
            diagnostics.extend(direction_diagnostics);
            candidates.insert(direction, entries);
        }

        let outcome = self.validator.validate(&records, &candidates);
        info!(rollovers = outcome.rollovers, "Applied day rollover correction");

        let mut output = dated;
        for direction in CheckpointDirection::ALL {
            let len = records.len();
            let values = outcome
                .corrected
                .get(&direction)
                .cloned()
                .unwrap_or_else(|| vec![None; len]);
            let sources: Vec<Option<&str>> = match candidates.get(&direction) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| entry.source.map(TimestampSource::as_str))
                    .collect(),
                None => vec![None; len],
            };

            output.with_column(timestamp_series(&direction.timestamp_column(), &values)?)?;
            output.with_column(Series::new(
                direction.timestamp_source_column().into(),
                sources,
            ))?;
        }
        output.with_column(Series::new(HAS_TIMING_ERROR.into(), outcome.row_flags.clone()))?;

        let (validated, flagged) = self.validator.partition(&output, &outcome.row_flags)?;

        let report = NormalizationReport {
            input_rows: df.height(),
            calendar: calendar_summary,
            diagnostics,
            rollovers: outcome.rollovers,
            flagged_runners: outcome.flagged_runners.into_iter().collect(),
            flagged_rows: flagged.height(),
            validated_rows: validated.height(),
        };

        info!(
            validated_rows = report.validated_rows,
            flagged_rows = report.flagged_rows,
            flagged_runners = report.flagged_runners.len(),
            parse_failures = report.diagnostics.len(),
            "Checkpoint normalization finished"
        );

        Ok(NormalizationOutput {
            validated,
            flagged,
            report,
        })
    }

    /// Time of day first; elapsed only where no time of day was recorded.
    fn resolve_candidates(
        &self,
        records: &[CheckpointRecord],
        direction: CheckpointDirection,
    ) -> (Vec<SequenceEntry>, Vec<FieldDiagnostic>) {
        let (tod_values, mut diagnostics) = self.time_of_day.resolve_all(records, direction);
        let (elapsed_values, elapsed_diagnostics) = self
            .elapsed
            .resolve_missing(records, direction, |row| {
                records[row].time_of_day(direction).is_some()
            });
        diagnostics.extend(elapsed_diagnostics);

        let entries = tod_values
            .into_iter()
            .zip(elapsed_values)
            .map(|(tod, elapsed)| match (tod, elapsed) {
                (Some(value), _) => SequenceEntry::time_of_day(Some(value)),
                (None, Some(value)) => SequenceEntry::elapsed(Some(value)),
                (None, None) => SequenceEntry::missing(),
            })
            .collect();

        (entries, diagnostics)
    }
}

/// Convenience wrapper for a one-off run.
pub fn normalize_checkpoints(
    df: &DataFrame,
    config: &NormalizerConfig,
) -> Result<NormalizationOutput> {
    CheckpointNormalizer::new(config.clone()).normalize(df)
}

fn timestamp_series(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Series> {
    let micros: Vec<Option<i64>> = values
        .iter()
        .map(|value| value.map(naive_to_micros))
        .collect();
    Ok(Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?)
}

pub fn naive_to_micros(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_micros()
}
