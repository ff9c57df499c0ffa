use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{info, warn};

use crate::columns::RACE_DATE;
use crate::config::default_races;
use crate::diagnostics::CalendarSummary;
use crate::error::Result;
use crate::record::{date_to_epoch_days, require_column};

/// Fixed lookup from race edition year to the calendar day the race started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceCalendar {
    dates: BTreeMap<i64, NaiveDate>,
}

impl Default for RaceCalendar {
    fn default() -> Self {
        Self::new(default_races().into_iter().map(|race| (race.year, race.date)))
    }
}

impl RaceCalendar {
    pub fn new(entries: impl IntoIterator<Item = (i64, NaiveDate)>) -> Self {
        Self {
            dates: entries.into_iter().collect(),
        }
    }

    /// `None` for years outside the table. That is missing data, not an error.
    pub fn resolve(&self, year: i64) -> Option<NaiveDate> {
        self.dates.get(&year).copied()
    }

    pub fn years(&self) -> impl Iterator<Item = i64> + '_ {
        self.dates.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (i64, NaiveDate)> + '_ {
        self.dates.iter().map(|(year, date)| (*year, *date))
    }

    /// Resolves a whole column of years in one pass.
    pub fn resolve_all(&self, years: &[Option<i64>]) -> (Vec<Option<NaiveDate>>, CalendarSummary) {
        let mut summary = CalendarSummary::default();
        let mut seen = BTreeSet::new();

        let dates = years
            .iter()
            .map(|year| match year {
                None => {
                    summary.null_year_rows += 1;
                    None
                }
                Some(year) => {
                    seen.insert(*year);
                    let date = self.resolve(*year);
                    match date {
                        Some(date) => *summary.race_date_counts.entry(date).or_insert(0) += 1,
                        None => summary.unsupported_year_rows += 1,
                    }
                    date
                }
            })
            .collect();

        summary.years_seen = seen.into_iter().collect();
        (dates, summary)
    }

    /// Attaches a `race_date` column derived from `year_column`.
    pub fn add_race_date(
        &self,
        df: &DataFrame,
        year_column: &str,
    ) -> Result<(DataFrame, CalendarSummary)> {
        let years = require_column(df, year_column)?.cast(&DataType::Int64)?;
        let years: Vec<Option<i64>> = years.i64()?.into_iter().collect();

        let (dates, summary) = self.resolve_all(&years);
        info!(years = ?summary.years_seen, "Found race years in data");
        if summary.null_year_rows > 0 {
            warn!(
                column = year_column,
                rows = summary.null_year_rows,
                "Null race years; race_date left empty"
            );
        }
        if summary.unsupported_year_rows > 0 {
            let unsupported: Vec<i64> = summary
                .years_seen
                .iter()
                .copied()
                .filter(|year| self.resolve(*year).is_none())
                .collect();
            warn!(
                years = ?unsupported,
                rows = summary.unsupported_year_rows,
                "Race years missing from calendar; race_date left empty"
            );
        }
        info!(distribution = ?summary.race_date_counts, "Race date distribution");

        let days: Vec<Option<i32>> = dates
            .iter()
            .map(|date| date.map(date_to_epoch_days))
            .collect();
        let race_date = Series::new(RACE_DATE.into(), days).cast(&DataType::Date)?;

        let mut output = df.clone();
        output.with_column(race_date)?;

        Ok((output, summary))
    }
}
