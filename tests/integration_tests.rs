use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use traffic_series::analysis::{hypothesis, segments, tendency};
use traffic_series::config::{InferenceConfig, PipelineConfig};
use traffic_series::ingest::{RawRecord, read_raw_records};
use traffic_series::pipeline::{self, PipelineOutput};
use traffic_series::series::TimeWindow;

const ROAD_NAMES: [&str; 3] = [
    "Ring Road;Maadi To Moneeb",
    "Ring Road;Moneeb To Maadi",
    "Corniche;Tahrir To Maadi",
];

/// Speeds quoted by the free-text rows, in order of appearance, with the level
/// each one should resolve to.
const SPEEDS: [(u32, u8); 8] = [
    (85, 1),
    (50, 2),
    (25, 3),
    (12, 4),
    (5, 5),
    (40, 2),
    (20, 3),
    (10, 4),
];

fn crawl_stamp(t: DateTime<Utc>) -> String {
    t.format("%a %b %d %H:%M:%S UTC %Y").to_string()
}

fn report_time(i: usize) -> DateTime<Utc> {
    let day = 25 + (i % 5) as u32;
    let hour = 6 + ((i / 5) % 12) as u32;
    Utc.with_ymd_and_hms(2016, 1, day, hour, (i % 60) as u32, 0)
        .unwrap()
}

/// A crawl row for report `i`, seen `age_minutes` after it was posted.
fn row(i: usize, age_minutes: i64) -> RawRecord {
    let road = i % 3;
    let (code, text) = if i % 10 == 0 {
        let text = match SPEEDS.get(i / 10) {
            Some((speed, _)) => format!("moving at {speed} km/h near the bridge"),
            None => "heavy, avoid if you can".to_string(),
        };
        (10, text)
    } else {
        (1 + i % 5, format!("report {i}"))
    };
    RawRecord {
        crawl_time: Some(crawl_stamp(report_time(i) + TimeDelta::minutes(age_minutes))),
        road_id: Some((road + 1).to_string()),
        road_name: Some(ROAD_NAMES[road].to_string()),
        road_status_id: Some("2".into()),
        report_hours: Some("0".into()),
        report_minutes: Some(age_minutes.to_string()),
        status_id: Some(code.to_string()),
        comment_text: Some(text),
        comment_id: Some(format!("c{i}")),
        ..Default::default()
    }
}

/// 100 raw rows over three roads and five days: 85 distinct reports, 10 re-crawls
/// of earlier reports, and 5 rows with a garbled crawl timestamp.
fn synthetic_feed() -> Vec<u8> {
    let mut rows: Vec<RawRecord> = (0..85).map(|i| row(i, 10)).collect();
    rows.extend((0..10).map(|i| row(i, 25)));
    rows.extend((0..5).map(|i| RawRecord {
        crawl_time: Some("yesterday-ish".into()),
        ..row(i + 1, 10)
    }));

    let mut writer = csv::Writer::from_writer(Vec::new());
    for r in &rows {
        writer.serialize(r).unwrap();
    }
    writer.into_inner().unwrap()
}

fn run_feed() -> PipelineOutput {
    let records = read_raw_records(synthetic_feed().as_slice());
    assert_eq!(records.len(), 100);
    pipeline::run(records, &PipelineConfig::default()).expect("pipeline run failed")
}

#[test]
fn test_full_pipeline() {
    let out = run_feed();
    let s = &out.summary;

    assert_eq!(s.raw_rows, 100);
    assert_eq!(s.dropped_decode, 5);
    assert_eq!(s.exact_duplicates, 10);
    assert_eq!(s.near_duplicates, 0);
    assert_eq!(s.roads, 3);
    assert_eq!(s.recovered_from_speed, 8);
    assert_eq!(s.dropped_unresolved, 1);
    assert_eq!(s.questions + s.incidents + s.unknown_codes, 0);
    assert_eq!(
        s.series_rows,
        100 - s.dropped_decode - s.dropped_unresolved - s.exact_duplicates
    );
    assert_eq!(out.series.len(), s.series_rows);
    assert!(s.is_balanced());

    assert!(
        out.series
            .reports()
            .windows(2)
            .all(|w| w[0].report_time <= w[1].report_time)
    );
}

#[test]
fn test_speed_comments_follow_breakpoints() {
    let out = run_feed();
    for (n, (_, level)) in SPEEDS.iter().enumerate() {
        let id = format!("c{}", n * 10);
        let report = out
            .series
            .iter()
            .find(|r| r.comment_id == id)
            .unwrap_or_else(|| panic!("{id} missing from series"));
        assert_eq!(report.congestion.value(), *level, "{id}");
    }
    assert!(out.series.iter().all(|r| r.comment_id != "c80"));
}

#[test]
fn test_road_labels() {
    let out = run_feed();
    assert_eq!(
        out.roads.minor_labels(&[3, 1, 99]),
        vec!["Tahrir To Maadi", "Maadi To Moneeb", "99"]
    );
}

#[test]
fn test_segments_and_density_cover_series() {
    let out = run_feed();
    let window = TimeWindow::new(
        Utc.with_ymd_and_hms(2016, 1, 25, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2016, 1, 30, 0, 0, 0).unwrap(),
    )
    .unwrap();

    let matrix = segments::aggregate(&out.series, &[3, 1, 2], &window, TimeDelta::days(1)).unwrap();
    assert_eq!(matrix.bucket_starts.len(), 5);
    assert_eq!(matrix.segments, vec![3, 1, 2]);
    let counted: usize = matrix.counts.iter().flatten().sum();
    assert_eq!(counted, out.series.len());
    for (row, counts) in matrix.means.iter().zip(&matrix.counts) {
        for (mean, &n) in row.iter().zip(counts) {
            assert_eq!(mean.is_some(), n > 0);
            if let Some(m) = mean {
                assert!((1.0..=5.0).contains(m));
            }
        }
    }

    let dist = segments::distribution(&out.series, &[3, 1, 2], &window);
    assert_eq!(dist.iter().map(|d| d.road_id).collect::<Vec<_>>(), vec![3, 1, 2]);
    assert_eq!(
        dist.iter().map(|d| d.sample_size).sum::<usize>(),
        out.series.len()
    );

    let density = out.series.density(TimeDelta::hours(1)).unwrap();
    assert_eq!(
        density.iter().map(|d| d.reports).sum::<usize>(),
        out.series.len()
    );
}

#[test]
fn test_statistics_over_series() {
    let out = run_feed();
    let config = PipelineConfig::default();

    let rows = tendency::central_tendency(&out.series, &config.calendar);
    assert_eq!(
        rows.iter().map(|r| r.sample_size).sum::<usize>(),
        out.series.len()
    );
    assert!(rows.iter().all(|r| (1..=5).contains(&r.mode)));

    let intervals =
        tendency::confidence_intervals(&out.series, &config.calendar, config.inference.confidence_level);
    assert!(intervals.iter().all(|r| r.lower <= r.mean && r.mean <= r.upper));

    // Default sample size of 30 is never reached per hourly cell here.
    assert!(hypothesis::weekday_vs_weekend(&out.series, &config.calendar, &config.inference).is_empty());

    let relaxed = InferenceConfig {
        min_sample_size: 2,
        ..InferenceConfig::default()
    };
    let results =
        hypothesis::direction_vs_direction(&out.series, &[1], &[2], &config.calendar, &relaxed).unwrap();
    for r in &results {
        assert!(r.sample_size_a >= 2 && r.sample_size_b >= 2);
        assert!((0.0..=1.0).contains(&r.p_value));
        assert_eq!(r.reject_null, r.p_value < relaxed.alpha);
    }
}
