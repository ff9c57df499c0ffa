use std::fmt;

use serde::{Deserialize, Serialize};

pub const RACE_DATE: &str = "race_date";
pub const HAS_TIMING_ERROR: &str = "has_timing_error";

pub const TOD_SUFFIX: &str = "__tod";
pub const ELAPSED_SUFFIX: &str = "__elapsed";
pub const TIMESTAMP_SUFFIX: &str = "__timestamp";
pub const TIMESTAMP_SOURCE_SUFFIX: &str = "__timestamp_source";

/// Which of the two timing events at an aid station a column describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointDirection {
    CheckIn,
    CheckOut,
}

impl CheckpointDirection {
    /// Both directions in course order: a runner checks in before checking out.
    pub const ALL: [CheckpointDirection; 2] =
        [CheckpointDirection::CheckIn, CheckpointDirection::CheckOut];

    pub fn prefix(self) -> &'static str {
        match self {
            CheckpointDirection::CheckIn => "as_check_in",
            CheckpointDirection::CheckOut => "as_check_out",
        }
    }

    pub fn tod_column(self) -> String {
        format!("{}{}", self.prefix(), TOD_SUFFIX)
    }

    pub fn elapsed_column(self) -> String {
        format!("{}{}", self.prefix(), ELAPSED_SUFFIX)
    }

    pub fn timestamp_column(self) -> String {
        format!("{}{}", self.prefix(), TIMESTAMP_SUFFIX)
    }

    pub fn timestamp_source_column(self) -> String {
        format!("{}{}", self.prefix(), TIMESTAMP_SOURCE_SUFFIX)
    }
}

impl fmt::Display for CheckpointDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointDirection::CheckIn => f.write_str("check_in"),
            CheckpointDirection::CheckOut => f.write_str("check_out"),
        }
    }
}

/// Where a checkpoint's resolved timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    TimeOfDay,
    Elapsed,
}

impl TimestampSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TimestampSource::TimeOfDay => "time_of_day",
            TimestampSource::Elapsed => "elapsed",
        }
    }
}

/// One runner in one race edition: `(bib, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunnerKey {
    pub bib: String,
    pub year: i64,
}

impl fmt::Display for RunnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bib {} ({})", self.bib, self.year)
    }
}
