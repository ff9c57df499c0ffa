use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::columns::CheckpointDirection;
use crate::config::default_race_start;
use crate::diagnostics::FieldDiagnostic;
use crate::error::FieldParseError;
use crate::record::CheckpointRecord;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Places an elapsed-since-start reading on the race timeline.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTimeResolver {
    race_start: NaiveTime,
}

impl Default for ElapsedTimeResolver {
    fn default() -> Self {
        Self::new(default_race_start())
    }
}

impl ElapsedTimeResolver {
    pub fn new(race_start: NaiveTime) -> Self {
        Self { race_start }
    }

    pub fn race_start(&self) -> NaiveTime {
        self.race_start
    }

    pub fn start_of_race(&self, race_date: NaiveDate) -> NaiveDateTime {
        race_date.and_time(self.race_start)
    }

    pub fn resolve(
        &self,
        record: &CheckpointRecord,
        direction: CheckpointDirection,
    ) -> Result<Option<NaiveDateTime>, FieldParseError> {
        let (Some(race_date), Some(raw)) = (record.race_date, record.elapsed(direction)) else {
            return Ok(None);
        };

        let elapsed = parse_elapsed(raw)?;
        self.start_of_race(race_date)
            .checked_add_signed(elapsed)
            .map(Some)
            .ok_or_else(|| FieldParseError::OutOfRange {
                value: raw.to_string(),
            })
    }

    /// Resolves `direction` only for rows where `skip` is false (rows that already have a
    /// time-of-day reading are left alone).
    pub fn resolve_missing(
        &self,
        records: &[CheckpointRecord],
        direction: CheckpointDirection,
        skip: impl Fn(usize) -> bool,
    ) -> (Vec<Option<NaiveDateTime>>, Vec<FieldDiagnostic>) {
        let column = direction.elapsed_column();
        let mut diagnostics = Vec::new();

        let values = records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                if skip(row) {
                    return None;
                }
                match self.resolve(record, direction) {
                    Ok(value) => value,
                    Err(error) => {
                        let raw = record.elapsed(direction).unwrap_or_default();
                        diagnostics.push(FieldDiagnostic::new(row, &column, raw, error));
                        None
                    }
                }
            })
            .collect();

        (values, diagnostics)
    }
}

/// Parses `H:MM:SS` with optional fractional seconds into a signed duration.
///
/// Hours are not capped at 24. A leading `-` negates the whole reading.
pub fn parse_elapsed(raw: &str) -> Result<Duration, FieldParseError> {
    let invalid = |reason: &str| FieldParseError::Elapsed {
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let parts: Vec<&str> = body.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(invalid("expected hours:minutes:seconds"));
    };

    let hours: i64 = hours
        .trim()
        .parse()
        .map_err(|_| invalid("hours are not an integer"))?;
    let minutes: i64 = minutes
        .trim()
        .parse()
        .map_err(|_| invalid("minutes are not an integer"))?;
    let seconds: f64 = seconds
        .trim()
        .parse()
        .map_err(|_| invalid("seconds are not numeric"))?;

    if hours < 0 || minutes < 0 || !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid("components must be non-negative"));
    }

    let whole = Duration::try_hours(hours)
        .zip(Duration::try_minutes(minutes))
        .and_then(|(h, m)| h.checked_add(&m))
        .ok_or_else(|| invalid("duration out of range"))?;
    let fraction = Duration::nanoseconds((seconds * NANOS_PER_SECOND).round() as i64);
    let total = whole
        .checked_add(&fraction)
        .ok_or_else(|| invalid("duration out of range"))?;

    Ok(if negative { -total } else { total })
}
