use aidstation_core::pipeline::naive_to_micros;
use aidstation_core::{
    normalize_checkpoints, CheckpointNormalizer, NormalizeError, NormalizerConfig, RaceEdition,
};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

fn ts(value: &str) -> Option<i64> {
    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").expect("timestamp");
    Some(naive_to_micros(parsed))
}

fn timestamps(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
    df.column(column)
        .expect("timestamp column")
        .cast(&DataType::Int64)
        .expect("cast")
        .i64()
        .expect("micros")
        .into_iter()
        .collect()
}

fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .expect("column")
        .cast(&DataType::String)
        .expect("cast")
        .str()
        .expect("str")
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect()
}

fn splits() -> DataFrame {
    df![
        "year" => [2016i64, 2016, 2016, 2016, 2016, 2016, 2018, 2017, 2017, 2017],
        "bib" => [101i64, 101, 101, 101, 202, 202, 303, 404, 404, 404],
        "as_index" => [2i64, 0, 3, 1, 0, 1, 0, 0, 1, 2],
        "as_check_in__tod" => [
            Some("00:30:00"), Some("21:00:00"), Some("03:10:00"), Some("23:40:00"),
            Some("06:00:00"), Some("07:00:00"),
            Some("06:00:00"),
            Some("22:00:00"), None, Some("02:00:00"),
        ],
        "as_check_out__tod" => [
            Some("00:40:00"), Some("21:05:00"), None, Some("23:55:00"),
            Some("06:05:00"), Some("07:05:00"),
            Some("06:10:00"),
            Some("22:10:00"), None, Some("bad-time"),
        ],
        "as_check_in__elapsed" => [
            None::<&str>, None, None, None,
            None, None,
            None,
            None, Some("20:15:30"), None,
        ],
        "as_check_in__elapsed__min" => [
            1170.0f64, 960.0, 1330.0, 1120.0,
            60.0, -5.0,
            60.0,
            1020.0, 1215.5, 1260.0,
        ],
    ]
    .expect("splits frame")
}

#[test]
fn normalizes_rollovers_fallbacks_and_flags() -> PolarsResult<()> {
    let output = normalize_checkpoints(&splits(), &NormalizerConfig::default()).expect("normalize");

    // Runner 202 has a negative elapsed reading and is split off whole.
    assert_eq!(output.flagged.height(), 2);
    assert_eq!(
        strings(&output.flagged, "bib"),
        vec![Some("202".to_string()), Some("202".to_string())]
    );
    let flagged_errors: Vec<Option<bool>> =
        output.flagged.column("has_timing_error")?.bool()?.into_iter().collect();
    assert_eq!(flagged_errors, vec![Some(true), Some(true)]);

    let validated = &output.validated;
    assert_eq!(validated.height(), 8);
    assert!(!strings(validated, "bib").contains(&Some("202".to_string())));

    let check_in = timestamps(validated, "as_check_in__timestamp");
    let check_out = timestamps(validated, "as_check_out__timestamp");

    // Runner 101, input order is stations 2, 0, 3, 1.
    assert_eq!(check_in[0], ts("2016-08-14 00:30:00"));
    assert_eq!(check_out[0], ts("2016-08-14 00:40:00"));
    assert_eq!(check_in[1], ts("2016-08-13 21:00:00"));
    assert_eq!(check_out[1], ts("2016-08-13 21:05:00"));
    assert_eq!(check_in[2], ts("2016-08-14 03:10:00"));
    assert_eq!(check_out[2], None);
    assert_eq!(check_in[3], ts("2016-08-13 23:40:00"));
    assert_eq!(check_out[3], ts("2016-08-13 23:55:00"));

    // Runner 303 raced in a year outside the calendar.
    assert_eq!(check_in[4], None);
    assert_eq!(check_out[4], None);

    // Runner 404 has no clock reading at station 1; elapsed fills it and anchors the day.
    assert_eq!(check_in[5], ts("2017-08-12 22:00:00"));
    assert_eq!(check_in[6], ts("2017-08-13 01:15:30"));
    assert_eq!(check_in[7], ts("2017-08-13 02:00:00"));
    assert_eq!(check_out[7], None);

    let sources = strings(validated, "as_check_in__timestamp_source");
    assert_eq!(sources[5].as_deref(), Some("time_of_day"));
    assert_eq!(sources[6].as_deref(), Some("elapsed"));
    assert_eq!(sources[4], None);

    let race_dates = strings(validated, "race_date");
    assert_eq!(race_dates[0].as_deref(), Some("2016-08-13"));
    assert_eq!(race_dates[4], None);
    assert_eq!(race_dates[5].as_deref(), Some("2017-08-12"));

    let report = &output.report;
    assert_eq!(report.input_rows, 10);
    assert_eq!(report.calendar.years_seen, vec![2016, 2017, 2018]);
    assert_eq!(report.calendar.unsupported_year_rows, 1);
    assert_eq!(report.rollovers, 1);
    assert_eq!(report.flagged_rows, 2);
    assert_eq!(report.validated_rows, 8);
    assert_eq!(report.flagged_runners.len(), 1);
    assert_eq!(report.flagged_runners[0].bib, "202");
    assert_eq!(report.flagged_runners[0].year, 2016);

    let failures: Vec<_> = report.diagnostics_for("as_check_out__tod").collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row, 9);
    assert_eq!(failures[0].value, "bad-time");

    Ok(())
}

#[test]
fn outputs_share_schema_and_cover_input() {
    let input = splits();
    let output = normalize_checkpoints(&input, &NormalizerConfig::default()).expect("normalize");

    assert_eq!(output.validated.schema(), output.flagged.schema());
    assert_eq!(
        output.validated.height() + output.flagged.height(),
        input.height()
    );

    let mut bibs: Vec<Option<String>> = strings(&output.validated, "bib");
    bibs.extend(strings(&output.flagged, "bib"));
    bibs.sort();
    let mut expected = strings(&input, "bib");
    expected.sort();
    assert_eq!(bibs, expected);
}

#[test]
fn missing_elapsed_column_fails_before_processing() {
    let input = splits().drop("as_check_in__elapsed__min").expect("drop");
    let err = normalize_checkpoints(&input, &NormalizerConfig::default())
        .expect_err("elapsed column is required");

    match err {
        NormalizeError::MissingColumn { column } => {
            assert_eq!(column, "as_check_in__elapsed__min")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn frame_without_timing_columns_is_rejected() {
    let input = df![
        "year" => [2016i64],
        "bib" => ["1"],
        "as_index" => [0i64],
        "as_check_in__elapsed__min" => [10.0f64],
    ]
    .expect("frame");

    let err = normalize_checkpoints(&input, &NormalizerConfig::default())
        .expect_err("timing columns are required");
    assert!(matches!(err, NormalizeError::NoTimingColumns { .. }));
}

#[test]
fn check_in_only_exports_still_emit_check_out_columns() {
    let input = df![
        "year" => [2016i64, 2016],
        "bib" => ["5", "5"],
        "as_index" => [0i64, 1],
        "as_check_in__tod" => ["23:59:00", "00:01:00"],
        "as_check_in__elapsed__min" => [1139.0f64, 1141.0],
    ]
    .expect("frame");

    let output = normalize_checkpoints(&input, &NormalizerConfig::default()).expect("normalize");

    assert_eq!(
        timestamps(&output.validated, "as_check_in__timestamp"),
        vec![ts("2016-08-13 23:59:00"), ts("2016-08-14 00:01:00")]
    );
    assert_eq!(
        timestamps(&output.validated, "as_check_out__timestamp"),
        vec![None, None]
    );
}

#[test]
fn custom_columns_calendar_and_start_time() {
    let config = NormalizerConfig {
        year_column: "edition".to_string(),
        index_column: "station".to_string(),
        elapsed_column: "as_check_in__elapsed".to_string(),
        race_start: chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        races: vec![RaceEdition {
            year: 2030,
            date: NaiveDate::from_ymd_opt(2030, 8, 10).unwrap(),
        }],
        ..NormalizerConfig::default()
    };

    let input = df![
        "edition" => [2030i64, 2030],
        "bib" => ["1", "2"],
        "station" => [0i64, 0],
        "as_check_in__elapsed" => ["1:30:00", "-0:00:30"],
    ]
    .expect("frame");

    let output = CheckpointNormalizer::new(config)
        .normalize(&input)
        .expect("normalize");

    assert_eq!(
        timestamps(&output.validated, "as_check_in__timestamp"),
        vec![ts("2030-08-10 07:30:00")]
    );
    assert_eq!(output.flagged.height(), 1);
    assert_eq!(output.report.flagged_runners[0].bib, "2");
}

#[test]
fn empty_input_produces_empty_outputs() {
    let input = splits().head(Some(0));
    let output = normalize_checkpoints(&input, &NormalizerConfig::default()).expect("normalize");

    assert_eq!(output.validated.height(), 0);
    assert_eq!(output.flagged.height(), 0);
    assert!(output.validated.column("as_check_in__timestamp").is_ok());
    assert!(output.report.diagnostics.is_empty());
}
