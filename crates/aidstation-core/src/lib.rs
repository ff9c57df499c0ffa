pub mod checkpoint_time;
pub mod columns;
pub mod config;
pub mod diagnostics;
pub mod elapsed_time;
pub mod error;
pub mod pipeline;
pub mod race_calendar;
pub mod record;
pub mod sequence_validator;

pub use checkpoint_time::CheckpointTimeResolver;
pub use columns::{CheckpointDirection, RunnerKey, TimestampSource};
pub use config::{NormalizerConfig, RaceEdition};
pub use diagnostics::{CalendarSummary, FieldDiagnostic, NormalizationReport};
pub use elapsed_time::{parse_elapsed, ElapsedTimeResolver};
pub use error::{FieldParseError, NormalizeError};
pub use pipeline::{normalize_checkpoints, CheckpointNormalizer, NormalizationOutput};
pub use race_calendar::RaceCalendar;
pub use record::CheckpointRecord;
pub use sequence_validator::{SequenceEntry, SequenceValidator};
