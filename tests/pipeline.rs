use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use hazard_lens::data::bucket::bucketize;
use hazard_lens::data::filter::{filter, subsample, top_n, Predicate, ROW_CAP, SAMPLE_SEED};
use hazard_lens::data::loader::{load, load_or_empty};
use hazard_lens::data::schema::{DatasetKind, PercentScale, COUNTY, LAT, LON, LOW_INCOME_PCT, STATE};
use hazard_lens::data::source::{DataSource, FileSource, HttpSource, MemorySource};
use hazard_lens::{run_panel, DashboardParams, LoadError, Signal, Table, Value};

const HEADER: &str = "CF,SF,Latitude,Longitude,MEAN_low_income_percentage,midcent_median_10yr";

fn wind_mapping() -> hazard_lens::data::schema::SchemaMapping {
    DatasetKind::Wind.schema(PercentScale::Percent)
}

fn foard_source() -> MemorySource {
    MemorySource::new().with("wind.csv", format!("{HEADER}\nFoard,Texas,33.99,-99.78,42,15.0\n"))
}

/// Deterministic pseudo-random hazard CSV with some unusable rows mixed in.
fn synthetic_csv(rows: usize) -> String {
    let mut out = format!("{HEADER}\n");
    let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in 0..rows {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        let risk = (x % 5000) as f64 / 100.0;
        let lat = 25.0 + (x % 2300) as f64 / 100.0;
        let lon = -125.0 + (x % 5700) as f64 / 100.0;
        let risk_cell = if i % 97 == 0 { "n/a".to_string() } else { format!("{risk}") };
        out.push_str(&format!(
            "county {i},state {},{lat},{lon},{},{risk_cell}\n",
            i % 7,
            x % 100
        ));
    }
    out
}

fn synthetic_table(rows: usize) -> Table {
    let source = MemorySource::new().with("big.csv", synthetic_csv(rows));
    load(&source, "big.csv", &wind_mapping()).unwrap()
}

#[test]
fn foard_row_normalizes_to_canonical_columns() {
    let table = load(&foard_source(), "wind.csv", &wind_mapping()).unwrap();
    assert_eq!(table.len(), 1);
    let get = |name: &str| table.value(0, table.column_index(name).unwrap()).clone();
    assert_eq!(get(COUNTY), Value::Text("Foard".into()));
    assert_eq!(get(STATE), Value::Text("Texas".into()));
    assert_eq!(get(LAT), Value::Number(33.99));
    assert_eq!(get(LON), Value::Number(-99.78));
    assert_eq!(get(LOW_INCOME_PCT), Value::Number(42.0));
    assert_eq!(get("Wind_Risk"), Value::Number(15.0));
}

#[test]
fn foard_threshold_scenarios() {
    let table = load(&foard_source(), "wind.csv", &wind_mapping()).unwrap();
    assert!(filter(&table, "Wind_Risk", &Predicate::AtLeast(20.0)).unwrap().is_empty());
    assert_eq!(filter(&table, "Wind_Risk", &Predicate::AtLeast(10.0)).unwrap().len(), 1);
}

#[test]
fn loaded_rows_satisfy_validity_constraints() {
    let table = synthetic_table(1000);
    assert!(table.len() < 1000);
    let county = table.column_index(COUNTY).unwrap();
    let lat = table.column_index(LAT).unwrap();
    let lon = table.column_index(LON).unwrap();
    let risk = table.column_index("Wind_Risk").unwrap();
    for i in 0..table.len() {
        assert!(!table.text(i, county).unwrap().is_empty());
        assert!((-90.0..=90.0).contains(&table.number(i, lat).unwrap()));
        assert!((-180.0..=180.0).contains(&table.number(i, lon).unwrap()));
        assert!(table.number(i, risk).is_some());
    }
}

#[test]
fn loading_is_idempotent() {
    let source = MemorySource::new().with("big.csv", synthetic_csv(300));
    let first = load(&source, "big.csv", &wind_mapping()).unwrap();
    let second = load(&source, "big.csv", &wind_mapping()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn threshold_filter_is_a_monotone_subset() {
    let table = synthetic_table(500);
    let risk = table.column_index("Wind_Risk").unwrap();
    let mut last = table.len();
    for step in 0..=10 {
        let t = step as f64 * 5.0;
        let out = filter(&table, "Wind_Risk", &Predicate::AtLeast(t)).unwrap();
        assert!((0..out.len()).all(|i| out.number(i, risk).unwrap() >= t));
        assert!(out.len() <= last);
        last = out.len();
    }
}

#[test]
fn top_n_never_excludes_a_higher_row() {
    let table = synthetic_table(400);
    let risk = table.column_index("Wind_Risk").unwrap();
    let top = top_n(&table, "Wind_Risk", 25).unwrap();
    assert_eq!(top.len(), 25);
    let floor = (0..top.len())
        .map(|i| top.number(i, risk).unwrap())
        .fold(f64::INFINITY, f64::min);
    let above = (0..table.len())
        .filter(|&i| table.number(i, risk).unwrap() > floor)
        .count();
    assert!(above <= 25);
}

#[test]
fn ranking_is_unaffected_by_display_subsampling() {
    let table = synthetic_table(ROW_CAP * 2);
    assert!(table.len() > ROW_CAP);

    let direct = top_n(&table, "Wind_Risk", 10).unwrap();
    let params = DashboardParams {
        threshold: 0.0,
        ..DashboardParams::default()
    };
    let view = run_panel(&table, &params, ROW_CAP, SAMPLE_SEED);
    assert_eq!(view.display.len(), ROW_CAP);
    assert_eq!(view.matches.len(), table.len());
    assert_eq!(view.ranked, direct);

    // Rank by rank, the full table's top-N dominates the subsample's.
    let sampled = subsample(&table, ROW_CAP, SAMPLE_SEED);
    assert_eq!(sampled.len(), ROW_CAP);
    let risk = table.column_index("Wind_Risk").unwrap();
    let from_sample = top_n(&sampled, "Wind_Risk", 10).unwrap();
    for i in 0..10 {
        assert!(view.ranked.number(i, risk).unwrap() >= from_sample.number(i, risk).unwrap());
    }
}

#[test]
fn four_values_split_at_the_median() {
    let rows = [10.0, 20.0, 30.0, 40.0]
        .iter()
        .map(|&v| vec![Value::Number(v), Value::Number(v)])
        .collect();
    let table = Table::new(vec!["A".into(), "B".into()], rows);
    let result = bucketize(&table, "A", "B", 2).unwrap();
    assert_eq!(result.edges_a, vec![10.0, 25.0, 40.0]);
    let bucket = result.table.column_index("A_Bucket").unwrap();
    let labels: Vec<&str> = (0..4).map(|i| result.table.text(i, bucket).unwrap()).collect();
    assert_eq!(labels, vec!["Low", "Low", "High", "High"]);
}

#[test]
fn unreachable_source_yields_empty_non_crashing_panel() {
    let http = HttpSource::new(Duration::from_secs(2)).unwrap();
    let outcome = load_or_empty(&http, "http://127.0.0.1:9/wind.csv", &wind_mapping());
    assert!(matches!(outcome.error, Some(LoadError::SourceUnavailable { .. })));
    assert!(outcome.table.is_empty());

    let view = run_panel(&outcome.table, &DashboardParams::default(), ROW_CAP, SAMPLE_SEED);
    assert_eq!(view.signal, Signal::EmptyResult);
    assert!(view.display.is_empty());
}

#[test]
fn stalled_server_times_out_as_source_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hold the connection open without ever answering.
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    });

    let http = HttpSource::new(Duration::from_secs(1)).unwrap();
    let started = Instant::now();
    let err = http.fetch(&format!("http://{addr}/wind.csv")).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "returned after {elapsed:?}");
    drop(http);
    server.join().unwrap();
}

#[test]
fn malformed_content_is_source_unavailable() {
    let source = MemorySource::new().with("wind.json", "{ not json");
    let err = load(&source, "wind.json", &wind_mapping()).unwrap_err();
    assert!(matches!(err, LoadError::SourceUnavailable { .. }));
}

#[test]
fn parquet_files_load_like_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wildfire.parquet");

    let schema = Arc::new(Schema::new(vec![
        Field::new("CF", DataType::Utf8, false),
        Field::new("SF", DataType::Utf8, false),
        Field::new("Latitude", DataType::Float64, true),
        Field::new("Longitude", DataType::Float64, true),
        Field::new("MEAN_low_income_percentage", DataType::Float64, true),
        Field::new("midcent_median_10yr", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["shasta", "fresno"])),
            Arc::new(StringArray::from(vec!["california", "california"])),
            Arc::new(Float64Array::from(vec![Some(40.76), None])),
            Arc::new(Float64Array::from(vec![-122.04, -119.65])),
            Arc::new(Float64Array::from(vec![18.0, 35.0])),
            Arc::new(Float64Array::from(vec![12.5, 7.0])),
        ],
    )
    .unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let mapping = DatasetKind::Wildfire.schema(PercentScale::Percent);
    let locator = path.to_string_lossy().to_string();
    let table = load(&FileSource, &locator, &mapping).unwrap();
    assert_eq!(table.len(), 1);
    let county = table.column_index(COUNTY).unwrap();
    let risk = table.column_index("Wildfire_Risk").unwrap();
    assert_eq!(table.text(0, county), Some("Shasta"));
    assert_eq!(table.number(0, risk), Some(12.5));
}

#[test]
fn file_and_memory_sources_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wind.csv");
    let csv = synthetic_csv(50);
    std::fs::write(&path, &csv).unwrap();

    let from_file = load(&FileSource, &path.to_string_lossy(), &wind_mapping()).unwrap();
    let memory = MemorySource::new().with("wind.csv", csv);
    let from_memory = load(&memory, "wind.csv", &wind_mapping()).unwrap();
    assert_eq!(from_file, from_memory);
    assert!(memory.fetch("other.csv").is_err());
}
