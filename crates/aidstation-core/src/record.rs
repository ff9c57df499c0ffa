use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::columns::{CheckpointDirection, RunnerKey, RACE_DATE};
use crate::config::NormalizerConfig;
use crate::diagnostics::FieldDiagnostic;
use crate::elapsed_time::parse_elapsed;
use crate::error::{FieldParseError, NormalizeError, Result};

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// One runner's timing event row at an aid station, lifted out of the input frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointRecord {
    pub year: Option<i64>,
    pub bib: Option<String>,
    pub aid_station_index: Option<i64>,
    pub check_in_time_of_day: Option<String>,
    pub check_out_time_of_day: Option<String>,
    pub check_in_elapsed: Option<String>,
    pub check_out_elapsed: Option<String>,
    /// Signed elapsed minutes read from the configured anomaly column.
    pub elapsed_minutes: Option<f64>,
    pub race_date: Option<NaiveDate>,
}

impl CheckpointRecord {
    pub fn time_of_day(&self, direction: CheckpointDirection) -> Option<&str> {
        let value = match direction {
            CheckpointDirection::CheckIn => self.check_in_time_of_day.as_deref(),
            CheckpointDirection::CheckOut => self.check_out_time_of_day.as_deref(),
        };
        value.filter(|raw| !raw.trim().is_empty())
    }

    pub fn elapsed(&self, direction: CheckpointDirection) -> Option<&str> {
        let value = match direction {
            CheckpointDirection::CheckIn => self.check_in_elapsed.as_deref(),
            CheckpointDirection::CheckOut => self.check_out_elapsed.as_deref(),
        };
        value.filter(|raw| !raw.trim().is_empty())
    }

    pub fn runner_key(&self) -> Option<RunnerKey> {
        match (&self.bib, self.year) {
            (Some(bib), Some(year)) => Some(RunnerKey {
                bib: bib.clone(),
                year,
            }),
            _ => None,
        }
    }
}

/// The timing columns actually present for one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionColumns {
    pub direction: CheckpointDirection,
    pub tod: Option<String>,
    pub elapsed: Option<String>,
}

impl DirectionColumns {
    pub fn is_present(&self) -> bool {
        self.tod.is_some() || self.elapsed.is_some()
    }
}

/// Checks the input schema before any row is touched.
#[derive(Debug, Clone)]
pub struct CheckpointLayout {
    pub year: String,
    pub bib: String,
    pub index: String,
    pub elapsed_minutes: String,
    pub directions: Vec<DirectionColumns>,
}

impl CheckpointLayout {
    pub fn from_frame(df: &DataFrame, config: &NormalizerConfig) -> Result<Self> {
        for name in [
            &config.year_column,
            &config.bib_column,
            &config.index_column,
            &config.elapsed_column,
        ] {
            require_column(df, name)?;
        }

        let directions: Vec<DirectionColumns> = CheckpointDirection::ALL
            .into_iter()
            .map(|direction| {
                let tod = direction.tod_column();
                let elapsed = direction.elapsed_column();
                DirectionColumns {
                    direction,
                    tod: has_column(df, &tod).then_some(tod),
                    elapsed: has_column(df, &elapsed).then_some(elapsed),
                }
            })
            .collect();

        if !directions.iter().any(DirectionColumns::is_present) {
            let expected = CheckpointDirection::ALL
                .into_iter()
                .flat_map(|d| [d.tod_column(), d.elapsed_column()])
                .collect();
            return Err(NormalizeError::NoTimingColumns { expected });
        }

        Ok(Self {
            year: config.year_column.clone(),
            bib: config.bib_column.clone(),
            index: config.index_column.clone(),
            elapsed_minutes: config.elapsed_column.clone(),
            directions,
        })
    }

    pub fn direction(&self, direction: CheckpointDirection) -> Option<&DirectionColumns> {
        self.directions
            .iter()
            .find(|cols| cols.direction == direction && cols.is_present())
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| NormalizeError::MissingColumn {
        column: name.to_string(),
    })
}

/// Reads `df` into one [`CheckpointRecord`] per row. `race_date` must already be attached.
pub fn extract_records(
    df: &DataFrame,
    layout: &CheckpointLayout,
) -> Result<(Vec<CheckpointRecord>, Vec<FieldDiagnostic>)> {
    let len = df.height();

    let years = require_column(df, &layout.year)?.cast(&DataType::Int64)?;
    let years = years.i64()?;
    let bibs = require_column(df, &layout.bib)?.cast(&DataType::String)?;
    let bibs = bibs.str()?;
    let indices = require_column(df, &layout.index)?.cast(&DataType::Int64)?;
    let indices = indices.i64()?;
    let race_dates = race_dates_from_frame(df)?;

    let mut records: Vec<CheckpointRecord> = (0..len)
        .map(|idx| CheckpointRecord {
            year: years.get(idx),
            bib: bibs.get(idx).map(str::to_string),
            aid_station_index: indices.get(idx),
            race_date: race_dates.get(idx).copied().flatten(),
            ..Default::default()
        })
        .collect();

    for cols in &layout.directions {
        if let Some(name) = &cols.tod {
            let values = string_values(df, name)?;
            for (record, value) in records.iter_mut().zip(values) {
                match cols.direction {
                    CheckpointDirection::CheckIn => record.check_in_time_of_day = value,
                    CheckpointDirection::CheckOut => record.check_out_time_of_day = value,
                }
            }
        }
        if let Some(name) = &cols.elapsed {
            let values = string_values(df, name)?;
            for (record, value) in records.iter_mut().zip(values) {
                match cols.direction {
                    CheckpointDirection::CheckIn => record.check_in_elapsed = value,
                    CheckpointDirection::CheckOut => record.check_out_elapsed = value,
                }
            }
        }
    }

    let (minutes, diagnostics) = elapsed_minutes(df, &layout.elapsed_minutes)?;
    for (record, value) in records.iter_mut().zip(minutes) {
        record.elapsed_minutes = value;
    }

    Ok((records, diagnostics))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?.cast(&DataType::String)?;
    let values = column.str()?;
    Ok(values
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// The anomaly column may hold numeric minutes or `H:MM:SS` strings; both become signed minutes.
fn elapsed_minutes(
    df: &DataFrame,
    name: &str,
) -> Result<(Vec<Option<f64>>, Vec<FieldDiagnostic>)> {
    let column = require_column(df, name)?;
    let mut diagnostics = Vec::new();

    if !matches!(column.dtype(), DataType::String) {
        let numeric = column.cast(&DataType::Float64)?;
        let values = numeric.f64()?.into_iter().collect();
        return Ok((values, diagnostics));
    }

    let strings = column.str()?;
    let mut values = Vec::with_capacity(strings.len());
    for (row, raw) in strings.into_iter().enumerate() {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            values.push(None);
            continue;
        };

        if let Ok(minutes) = raw.parse::<f64>() {
            values.push(Some(minutes));
            continue;
        }

        match parse_elapsed(raw) {
            Ok(duration) => values.push(Some(duration.num_milliseconds() as f64 / 60_000.0)),
            Err(_) => {
                diagnostics.push(FieldDiagnostic::new(
                    row,
                    name,
                    raw,
                    FieldParseError::ElapsedMinutes {
                        value: raw.to_string(),
                    },
                ));
                values.push(None);
            }
        }
    }

    Ok((values, diagnostics))
}

/// Reads the `race_date` column back as calendar dates.
pub fn race_dates_from_frame(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    let days = require_column(df, RACE_DATE)?.cast(&DataType::Int32)?;
    let days = days.i32()?;
    Ok(days
        .into_iter()
        .map(|value| value.and_then(date_from_epoch_days))
        .collect())
}

pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}
