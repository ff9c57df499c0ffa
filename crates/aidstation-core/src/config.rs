use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::race_calendar::RaceCalendar;

/// A single race edition: the year key and the calendar day the race started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceEdition {
    pub year: i64,
    pub date: NaiveDate,
}

/// Column bindings and fixed race tables for a normalization run.
///
/// Every field has a default, so an empty TOML document is a valid configuration:
///
/// ```toml
/// index_column = "as_index"
/// race_start = "05:00:00"
///
/// [[race]]
/// year = 2016
/// date = "2016-08-13"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    pub year_column: String,
    pub bib_column: String,
    pub index_column: String,
    pub elapsed_column: String,
    pub race_start: NaiveTime,
    #[serde(rename = "race")]
    pub races: Vec<RaceEdition>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            year_column: "year".to_string(),
            bib_column: "bib".to_string(),
            index_column: "as_index".to_string(),
            elapsed_column: "as_check_in__elapsed__min".to_string(),
            race_start: default_race_start(),
            races: default_races(),
        }
    }
}

impl NormalizerConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: NormalizerConfig =
            toml::from_str(toml_str).context("failed to parse normalizer config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config in '{}'", path.display()))
    }

    pub fn calendar(&self) -> RaceCalendar {
        RaceCalendar::new(self.races.iter().map(|race| (race.year, race.date)))
    }

    pub fn validate(&self) -> std::result::Result<(), NormalizeError> {
        let keys = [
            ("year_column", &self.year_column),
            ("bib_column", &self.bib_column),
            ("index_column", &self.index_column),
            ("elapsed_column", &self.elapsed_column),
        ];
        for (field, value) in keys {
            if value.trim().is_empty() {
                return Err(NormalizeError::InvalidConfig(format!("{field} must not be empty")));
            }
        }
        if self.year_column == self.bib_column || self.year_column == self.index_column {
            return Err(NormalizeError::InvalidConfig(
                "year_column must differ from bib_column and index_column".to_string(),
            ));
        }

        let mut years: Vec<i64> = self.races.iter().map(|race| race.year).collect();
        years.sort_unstable();
        if let Some(pair) = years.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(NormalizeError::InvalidConfig(format!(
                "race year {} is listed more than once",
                pair[0]
            )));
        }
        Ok(())
    }
}

pub fn default_race_start() -> NaiveTime {
    NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_races() -> Vec<RaceEdition> {
    [
        (2016, 8, 13),
        (2017, 8, 12),
        (2019, 8, 10),
        (2021, 8, 14),
        (2022, 8, 13),
        (2023, 8, 12),
        (2025, 8, 9),
    ]
    .into_iter()
    .filter_map(|(year, month, day)| {
        NaiveDate::from_ymd_opt(year as i32, month, day).map(|date| RaceEdition { year, date })
    })
    .collect()
}
