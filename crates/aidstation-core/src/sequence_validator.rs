//! Per-runner reconciliation of checkpoint timestamps.
//!
//! Two passes, both local to one `(bib, year)` group:
//!
//! * rollover correction: wall-clock readings that step backwards between consecutive
//!   checkpoints mean the race crossed midnight, so that reading and everything after it
//!   moves forward one day. Crossings accumulate.
//! * timing anomalies: any negative elapsed reading flags every row of the runner, and the
//!   flagged runners are split off into their own table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{info, warn};

use crate::columns::{CheckpointDirection, RunnerKey, TimestampSource};
use crate::elapsed_time::parse_elapsed;
use crate::error::Result;
use crate::record::CheckpointRecord;

/// A candidate timestamp for one checkpoint event before rollover correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEntry {
    pub value: Option<NaiveDateTime>,
    pub source: Option<TimestampSource>,
}

impl SequenceEntry {
    pub fn time_of_day(value: Option<NaiveDateTime>) -> Self {
        Self {
            value,
            source: value.map(|_| TimestampSource::TimeOfDay),
        }
    }

    pub fn elapsed(value: Option<NaiveDateTime>) -> Self {
        Self {
            value,
            source: value.map(|_| TimestampSource::Elapsed),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            source: None,
        }
    }
}

/// Carried through one runner's ordered sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverState {
    pub day_offset: i64,
    pub previous_naive: Option<NaiveDateTime>,
    pub rollovers: usize,
}

impl RolloverState {
    /// Consumes one entry and returns its corrected timestamp.
    ///
    /// Time-of-day readings are compared naive-to-naive so the offset is never applied twice.
    /// Elapsed-derived readings are already absolute: they pass through and re-anchor the
    /// offset to their own day count. Missing readings leave the state untouched.
    pub fn step(
        &mut self,
        race_date: Option<NaiveDate>,
        entry: SequenceEntry,
    ) -> Option<NaiveDateTime> {
        let value = entry.value?;

        if entry.source == Some(TimestampSource::Elapsed) {
            if let Some(race_date) = race_date {
                self.day_offset = (value.date() - race_date).num_days();
                self.previous_naive = Some(race_date.and_time(value.time()));
            }
            return Some(value);
        }

        if self.previous_naive.is_some_and(|previous| value < previous) {
            self.day_offset += 1;
            self.rollovers += 1;
        }
        self.previous_naive = Some(value);

        Duration::try_days(self.day_offset).and_then(|offset| value.checked_add_signed(offset))
    }
}

/// Result of the rollover pass over one runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCorrection {
    pub values: Vec<Option<NaiveDateTime>>,
    pub rollovers: usize,
}

/// Corrected timestamps for every row and direction, plus the runner-level flags.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub corrected: BTreeMap<CheckpointDirection, Vec<Option<NaiveDateTime>>>,
    pub row_flags: Vec<bool>,
    pub flagged_runners: BTreeSet<RunnerKey>,
    pub rollovers: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceValidator;

impl SequenceValidator {
    pub fn new() -> Self {
        Self
    }

    /// Applies the rollover fold to one runner's entries, already in course order.
    pub fn correct_rollovers(
        &self,
        race_date: Option<NaiveDate>,
        entries: &[SequenceEntry],
    ) -> SequenceCorrection {
        let mut state = RolloverState::default();
        let values = entries
            .iter()
            .map(|entry| state.step(race_date, *entry))
            .collect();

        SequenceCorrection {
            values,
            rollovers: state.rollovers,
        }
    }

    /// Runs both passes over the whole batch.
    ///
    /// `candidates` holds, per direction, one entry per record in `records` order.
    pub fn validate(
        &self,
        records: &[CheckpointRecord],
        candidates: &BTreeMap<CheckpointDirection, Vec<SequenceEntry>>,
    ) -> ValidationOutcome {
        let len = records.len();
        let mut corrected: BTreeMap<CheckpointDirection, Vec<Option<NaiveDateTime>>> = candidates
            .keys()
            .map(|direction| (*direction, vec![None; len]))
            .collect();
        let mut rollovers = 0;

        for rows in group_runners(records) {
            let mut slots: Vec<(CheckpointDirection, usize)> = Vec::new();
            let mut entries: Vec<SequenceEntry> = Vec::new();
            for &row in &rows {
                for (direction, values) in candidates {
                    slots.push((*direction, row));
                    entries.push(values.get(row).copied().unwrap_or_else(SequenceEntry::missing));
                }
            }

            let race_date = rows.first().and_then(|row| records[*row].race_date);
            let correction = self.correct_rollovers(race_date, &entries);
            rollovers += correction.rollovers;

            for ((direction, row), value) in slots.into_iter().zip(correction.values) {
                if let Some(column) = corrected.get_mut(&direction) {
                    column[row] = value;
                }
            }
        }

        let flagged_runners = self.flag_negative_elapsed(records);
        let row_flags = records
            .iter()
            .map(|record| {
                record
                    .runner_key()
                    .is_some_and(|key| flagged_runners.contains(&key))
            })
            .collect();

        ValidationOutcome {
            corrected,
            row_flags,
            flagged_runners,
            rollovers,
        }
    }

    /// Runners with at least one negative elapsed reading in either direction or in the
    /// elapsed-minutes column.
    pub fn flag_negative_elapsed(&self, records: &[CheckpointRecord]) -> BTreeSet<RunnerKey> {
        let mut flagged = BTreeSet::new();

        for record in records {
            let negative_minutes = record.elapsed_minutes.is_some_and(|minutes| minutes < 0.0);
            let negative_duration = CheckpointDirection::ALL.into_iter().any(|direction| {
                record
                    .elapsed(direction)
                    .and_then(|raw| parse_elapsed(raw).ok())
                    .is_some_and(|elapsed| elapsed < Duration::zero())
            });

            if negative_minutes || negative_duration {
                if let Some(key) = record.runner_key() {
                    flagged.insert(key);
                }
            }
        }

        if flagged.is_empty() {
            info!("No negative elapsed times found");
        } else {
            warn!(runners = flagged.len(), "Found runners with negative elapsed times");
            for key in &flagged {
                warn!(bib = %key.bib, year = key.year, "Runner flagged for timing error");
            }
        }

        flagged
    }

    /// Splits `df` into `(validated, flagged)` using the per-row runner flags.
    pub fn partition(&self, df: &DataFrame, row_flags: &[bool]) -> Result<(DataFrame, DataFrame)> {
        let mask = BooleanChunked::from_slice("has_timing_error".into(), row_flags);
        let validated = df.filter(&!&mask)?;
        let flagged = df.filter(&mask)?;

        info!(
            flagged_rows = flagged.height(),
            validated_rows = validated.height(),
            "Partitioned runners by timing error"
        );

        Ok((validated, flagged))
    }
}

/// Row indices per runner, each ordered by aid station index then input order.
///
/// Rows without a bib or year cannot be tied to a runner and form their own group.
fn group_runners(records: &[CheckpointRecord]) -> Vec<Vec<usize>> {
    let mut keyed: HashMap<RunnerKey, Vec<usize>> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (row, record) in records.iter().enumerate() {
        match record.runner_key() {
            Some(key) => keyed.entry(key).or_default().push(row),
            None => groups.push(vec![row]),
        }
    }

    for mut rows in keyed.into_values() {
        rows.sort_by_key(|row| (records[*row].aid_station_index.unwrap_or(i64::MAX), *row));
        groups.push(rows);
    }

    groups
}
