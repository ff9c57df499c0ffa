use chrono::{NaiveDate, NaiveDateTime};

use crate::columns::CheckpointDirection;
use crate::diagnostics::FieldDiagnostic;
use crate::error::FieldParseError;
use crate::record::CheckpointRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns a wall-clock `HH:MM:SS` reading into a naive timestamp on the race date.
///
/// No rollover handling happens here; a check-in recorded after midnight still lands on the
/// race start date until the sequence pass moves it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointTimeResolver;

impl CheckpointTimeResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        record: &CheckpointRecord,
        direction: CheckpointDirection,
    ) -> Result<Option<NaiveDateTime>, FieldParseError> {
        match (record.race_date, record.time_of_day(direction)) {
            (Some(race_date), Some(raw)) => combine(race_date, raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolves one direction for every record, collecting parse failures instead of stopping.
    pub fn resolve_all(
        &self,
        records: &[CheckpointRecord],
        direction: CheckpointDirection,
    ) -> (Vec<Option<NaiveDateTime>>, Vec<FieldDiagnostic>) {
        let column = direction.tod_column();
        let mut diagnostics = Vec::new();

        let values = records
            .iter()
            .enumerate()
            .map(|(row, record)| match self.resolve(record, direction) {
                Ok(value) => value,
                Err(error) => {
                    let raw = record.time_of_day(direction).unwrap_or_default();
                    diagnostics.push(FieldDiagnostic::new(row, &column, raw, error));
                    None
                }
            })
            .collect();

        (values, diagnostics)
    }
}

/// Scraped exports sometimes carry a full `date time` value; only the clock part is used.
fn combine(race_date: NaiveDate, raw: &str) -> Result<NaiveDateTime, FieldParseError> {
    let time = raw.split_whitespace().last().unwrap_or_default();
    let candidate = format!("{} {}", race_date.format("%Y-%m-%d"), time);
    NaiveDateTime::parse_from_str(&candidate, TIMESTAMP_FORMAT).map_err(|_| {
        FieldParseError::TimeOfDay {
            value: raw.to_string(),
        }
    })
}
