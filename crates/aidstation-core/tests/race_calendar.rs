use aidstation_core::record::race_dates_from_frame;
use aidstation_core::RaceCalendar;
use chrono::NaiveDate;
use polars::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn known_years_resolve_to_literal_dates() {
    let calendar = RaceCalendar::default();

    let expected = [
        (2016, date(2016, 8, 13)),
        (2017, date(2017, 8, 12)),
        (2019, date(2019, 8, 10)),
        (2021, date(2021, 8, 14)),
        (2022, date(2022, 8, 13)),
        (2023, date(2023, 8, 12)),
        (2025, date(2025, 8, 9)),
    ];
    for (year, race_date) in expected {
        assert_eq!(calendar.resolve(year), Some(race_date), "year {year}");
    }

    for unsupported in [2018, 2020, 2024, 1999] {
        assert_eq!(calendar.resolve(unsupported), None, "year {unsupported}");
    }
}

#[test]
fn alternate_calendar_can_be_injected() {
    let calendar = RaceCalendar::new([(2030, date(2030, 8, 10))]);
    assert_eq!(calendar.resolve(2030), Some(date(2030, 8, 10)));
    assert_eq!(calendar.resolve(2016), None);
    assert_eq!(calendar.years().collect::<Vec<_>>(), vec![2030]);
}

#[test]
fn add_race_date_attaches_column_and_summarises_years() -> PolarsResult<()> {
    let df = df![
        "year" => [Some(2016i64), Some(2016), Some(2018), None, Some(2022)],
        "bib" => ["1", "2", "3", "4", "5"],
    ]?;

    let (dated, summary) = RaceCalendar::default()
        .add_race_date(&df, "year")
        .expect("race date");

    assert_eq!(dated.height(), 5);
    assert_eq!(dated.column("race_date")?.dtype(), &DataType::Date);

    let dates = race_dates_from_frame(&dated).expect("read back dates");
    assert_eq!(
        dates,
        vec![
            Some(date(2016, 8, 13)),
            Some(date(2016, 8, 13)),
            None,
            None,
            Some(date(2022, 8, 13)),
        ]
    );

    assert_eq!(summary.years_seen, vec![2016, 2018, 2022]);
    assert_eq!(summary.null_year_rows, 1);
    assert_eq!(summary.unsupported_year_rows, 1);
    assert_eq!(summary.race_date_counts.get(&date(2016, 8, 13)), Some(&2));
    assert_eq!(summary.race_date_counts.get(&date(2022, 8, 13)), Some(&1));

    let as_text = dated.column("race_date")?.cast(&DataType::String)?;
    assert_eq!(as_text.str()?.get(0), Some("2016-08-13"));

    Ok(())
}

#[test]
fn missing_year_column_is_a_configuration_error() -> PolarsResult<()> {
    let df = df!["season" => [2016i64]]?;
    let err = RaceCalendar::default()
        .add_race_date(&df, "year")
        .expect_err("year column is required");
    assert!(err.to_string().contains("\"year\" not found"));
    Ok(())
}
