use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Table, Value};
use super::schema::{SchemaMapping, LAT, LON};
use super::source::{locator_extension, locator_path, DataSource};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Fetch `locator` from `source` and normalize it with `mapping`.
///
/// Supported formats (by extension, query strings ignored):
/// * `.csv`     – header row, one county per row (also the fallback)
/// * `.json`    – `[{ "CF": "foard", "SF": "texas", ... }, ...]`
/// * `.parquet` – flat scalar columns
///
/// A zero-row result is `Ok`; only fetch/parse failures and missing
/// required columns are errors.
pub fn load(
    source: &dyn DataSource,
    locator: &str,
    mapping: &SchemaMapping,
) -> Result<Table, LoadError> {
    let bytes = source.fetch(locator)?;
    let raw = parse_raw(locator, bytes)?;
    let table = normalize(raw, mapping).map_err(|column| LoadError::SchemaMismatch {
        locator: locator_path(locator).to_string(),
        column,
    })?;
    log::info!(
        "Loaded {} rows with columns {:?} from {}",
        table.len(),
        table.columns,
        locator_path(locator)
    );
    Ok(table)
}

/// Always a table, plus the failure if there was one.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: Arc<Table>,
    pub error: Option<LoadError>,
}

impl LoadOutcome {
    /// Failures become an empty table carrying the mapping's required
    /// columns, so other panels keep rendering.
    pub fn from_result(result: Result<Arc<Table>, LoadError>, mapping: &SchemaMapping) -> Self {
        match result {
            Ok(table) => LoadOutcome { table, error: None },
            Err(e) => {
                log::warn!("{e}");
                LoadOutcome {
                    table: Arc::new(Table::empty(mapping.required.clone())),
                    error: Some(e),
                }
            }
        }
    }

    /// Message for the UI when the load failed.
    pub fn diagnostic(&self) -> Option<String> {
        self.error.as_ref().map(|e| format!("Error loading data: {e}"))
    }
}

/// Boundary form of [`load`].
pub fn load_or_empty(
    source: &dyn DataSource,
    locator: &str,
    mapping: &SchemaMapping,
) -> LoadOutcome {
    LoadOutcome::from_result(load(source, locator, mapping).map(Arc::new), mapping)
}

// ---------------------------------------------------------------------------
// Raw parsing
// ---------------------------------------------------------------------------

/// Header + cells before any renaming or coercion. CSV cells arrive as text.
#[derive(Debug, Default)]
pub(crate) struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn parse_raw(locator: &str, bytes: Vec<u8>) -> Result<RawTable, LoadError> {
    let parsed = match locator_extension(locator).as_str() {
        "json" => parse_json(&bytes),
        "parquet" | "pq" => parse_parquet(bytes),
        _ => parse_csv(&bytes),
    };
    parsed.map_err(|reason| LoadError::unavailable(locator_path(locator), reason))
}

fn parse_csv(bytes: &[u8]) -> Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| format!("reading CSV headers: {e}"))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err("CSV has no header row".to_string());
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let record = result.map_err(|e| format!("CSV row {row_no}: {e}"))?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Missing
                    } else {
                        Value::Text(String::from_utf8_lossy(cell).into_owned())
                    }
                })
                .collect(),
        );
    }
    Ok(RawTable { headers, rows })
}

/// Records-oriented JSON (`df.to_json(orient='records')`).
fn parse_json(bytes: &[u8]) -> Result<RawTable, String> {
    let root: JsonValue =
        serde_json::from_slice(bytes).map_err(|e| format!("parsing JSON: {e}"))?;
    let records = root
        .as_array()
        .ok_or_else(|| "expected top-level JSON array".to_string())?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| format!("row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_to_value).unwrap_or(Value::Missing))
                .collect()
        })
        .collect();
    Ok(RawTable { headers, rows })
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) if s.is_empty() => Value::Missing,
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Missing),
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Missing,
        other => Value::Text(other.to_string()),
    }
}

/// Flat Parquet file (written by Pandas `df.to_parquet()` or Polars).
fn parse_parquet(bytes: Vec<u8>) -> Result<RawTable, String> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .map_err(|e| format!("reading parquet metadata: {e}"))?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| format!("building parquet reader: {e}"))?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|e| format!("reading parquet record batch: {e}"))?;
        let columns = batch
            .columns()
            .iter()
            .map(widen)
            .collect::<Result<Vec<_>, _>>()?;
        for row in 0..batch.num_rows() {
            rows.push(columns.iter().map(|col| arrow_value(col, row)).collect());
        }
    }
    Ok(RawTable { headers, rows })
}

/// Bring a column to one of the types `arrow_value` reads directly.
///
/// Numeric columns of any width (and dictionaries of them) become `Float64`.
/// Everything else becomes `Utf8`, through the cast kernel when it supports
/// the type and the display formatter otherwise.
fn widen(col: &ArrayRef) -> Result<ArrayRef, String> {
    let target = match col.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Int32
        | DataType::Int64
        | DataType::Float32
        | DataType::Float64
        | DataType::Boolean => return Ok(Arc::clone(col)),
        DataType::Dictionary(_, value) if value.is_numeric() => DataType::Float64,
        other if other.is_numeric() => DataType::Float64,
        _ => DataType::Utf8,
    };
    if can_cast_types(col.data_type(), &target) {
        return cast(col, &target)
            .map_err(|e| format!("converting {} column to {target}: {e}", col.data_type()));
    }
    let formatter = ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())
        .map_err(|e| format!("formatting {} column: {e}", col.data_type()))?;
    let text: StringArray = (0..col.len())
        .map(|i| col.is_valid(i).then(|| formatter.value(i).to_string()))
        .collect();
    Ok(Arc::new(text))
}

/// Extract a single cell from an Arrow column already passed through `widen`.
fn arrow_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Missing;
    }
    let value = match col.data_type() {
        DataType::Utf8 => col
            .as_string_opt::<i32>()
            .map(|s| Value::Text(s.value(row).to_string())),
        DataType::LargeUtf8 => col
            .as_string_opt::<i64>()
            .map(|s| Value::Text(s.value(row).to_string())),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| Value::Number(a.value(row) as f64)),
        DataType::Int64 => col
            .as_primitive_opt::<Int64Type>()
            .map(|a| Value::Number(a.value(row) as f64)),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| Value::Number(a.value(row) as f64)),
        DataType::Float64 => col
            .as_primitive_opt::<Float64Type>()
            .map(|a| Value::Number(a.value(row))),
        DataType::Boolean => col.as_boolean_opt().map(|a| Value::Bool(a.value(row))),
        _ => None,
    };
    value.unwrap_or(Value::Missing)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Trim headers, rename, coerce, and drop rows missing required fields.
/// Returns the name of the first required column absent from the header.
pub(crate) fn normalize(raw: RawTable, mapping: &SchemaMapping) -> Result<Table, String> {
    let columns: Vec<String> = raw
        .headers
        .iter()
        .map(|h| mapping.normalized_name(h.trim()).to_string())
        .collect();

    if let Some(missing) = mapping.required.iter().find(|r| !columns.contains(r)) {
        return Err(missing.clone());
    }
    let required_idx: Vec<usize> = mapping
        .required
        .iter()
        .filter_map(|r| columns.iter().position(|c| c == r))
        .collect();

    let total = raw.rows.len();
    let mut rows = Vec::with_capacity(total);
    for raw_row in raw.rows {
        let row: Vec<Value> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let cell = raw_row.get(i).cloned().unwrap_or(Value::Missing);
                coerce(col, cell, mapping)
            })
            .collect();
        if required_idx.iter().any(|&i| row[i].is_missing()) {
            continue;
        }
        rows.push(row);
    }

    let dropped = total - rows.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} of {total} rows missing one of {:?}", mapping.required);
    }
    Ok(Table::new(columns, rows))
}

fn coerce(column: &str, cell: Value, mapping: &SchemaMapping) -> Value {
    if mapping.is_label(column) {
        return to_label(cell);
    }
    if mapping.is_numeric(column) {
        let Some(v) = to_number(&cell) else {
            return Value::Missing;
        };
        return match column {
            LAT if !(-90.0..=90.0).contains(&v) => Value::Missing,
            LON if !(-180.0..=180.0).contains(&v) => Value::Missing,
            _ if mapping.is_percent(column) => Value::Number(mapping.percent_scale.to_percent(v)),
            _ => Value::Number(v),
        };
    }
    match cell {
        Value::Text(s) => guess_value(&s),
        other => other,
    }
}

fn to_label(cell: Value) -> Value {
    let text = match cell {
        Value::Text(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Missing => return Value::Missing,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Value::Missing
    } else {
        Value::Text(title_case(trimmed))
    }
}

fn to_number(cell: &Value) -> Option<f64> {
    let v = match cell {
        Value::Number(n) => *n,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(_) | Value::Missing => return None,
    };
    v.is_finite().then_some(v)
}

/// Type inference for pass-through columns.
fn guess_value(s: &str) -> Value {
    let t = s.trim();
    if t.is_empty() {
        return Value::Missing;
    }
    if let Ok(f) = t.parse::<f64>() {
        return if f.is_finite() {
            Value::Number(f)
        } else {
            Value::Missing
        };
    }
    if t.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if t.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Text(t.to_string())
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{DatasetKind, PercentScale, COUNTY, LOW_INCOME_PCT, STATE};
    use crate::data::source::MemorySource;

    const WIND_CSV: &str = " CF ,SF,Latitude,Longitude,MEAN_low_income_percentage,midcent_median_10yr,Extra\n\
foard,TEXAS,33.99,-99.78,42,15.0,x\n\
hale,texas,,-101.8,30,9.0,y\n\
lamb,texas,34.06,-102.35,n/a,not-a-number,z\n\
  ,texas,34.0,-100.0,10,4.0,w\n";

    fn wind() -> SchemaMapping {
        DatasetKind::Wind.schema(PercentScale::Percent)
    }

    #[test]
    fn normalizes_hazard_rows_and_drops_incomplete_ones() {
        let source = MemorySource::new().with("wind.csv", WIND_CSV);
        let table = load(&source, "wind.csv", &wind()).unwrap();

        assert_eq!(table.len(), 1);
        let county = table.column_index(COUNTY).unwrap();
        let state = table.column_index(STATE).unwrap();
        let pct = table.column_index(LOW_INCOME_PCT).unwrap();
        let risk = table.column_index("Wind_Risk").unwrap();
        assert_eq!(table.text(0, county), Some("Foard"));
        assert_eq!(table.text(0, state), Some("Texas"));
        assert_eq!(table.number(0, pct), Some(42.0));
        assert_eq!(table.number(0, risk), Some(15.0));
        assert_eq!(table.columns.last().map(String::as_str), Some("Extra"));
    }

    #[test]
    fn non_numeric_optional_values_become_missing_not_zero() {
        let csv = "CF,SF,Latitude,Longitude,MEAN_low_income_percentage,midcent_median_10yr\n\
lamb,texas,34.06,-102.35,n/a,7\n";
        let source = MemorySource::new().with("w.csv", csv);
        let table = load(&source, "w.csv", &wind()).unwrap();
        let pct = table.column_index(LOW_INCOME_PCT).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, pct), &Value::Missing);
    }

    #[test]
    fn out_of_range_coordinates_drop_the_row() {
        let csv = "CF,SF,Latitude,Longitude,MEAN_low_income_percentage,midcent_median_10yr\n\
a,b,91.0,-99,1,1\n\
c,d,33.0,-181,1,1\n\
e,f,33.0,-99,1,1\n";
        let source = MemorySource::new().with("w.csv", csv);
        let table = load(&source, "w.csv", &wind()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn missing_required_column_is_schema_mismatch() {
        let csv = "CF,SF,Latitude,midcent_median_10yr\nfoard,texas,33.9,1\n";
        let source = MemorySource::new().with("w.csv", csv);
        let err = load(&source, "w.csv", &wind()).unwrap_err();
        assert_eq!(
            err,
            LoadError::SchemaMismatch {
                locator: "w.csv".into(),
                column: "Lon".into()
            }
        );
    }

    #[test]
    fn header_only_source_is_an_empty_table_not_an_error() {
        let csv = "CF,SF,Latitude,Longitude,MEAN_low_income_percentage,midcent_median_10yr\n";
        let source = MemorySource::new().with("w.csv", csv);
        let table = load(&source, "w.csv", &wind()).unwrap();
        assert!(table.is_empty());
        assert!(table.has_column("Wind_Risk"));
    }

    #[test]
    fn ragged_csv_is_source_unavailable() {
        let csv = "a,b\n1,2,3\n";
        let source = MemorySource::new().with("w.csv", csv);
        let err = load(&source, "w.csv", &SchemaMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    }

    #[test]
    fn load_or_empty_reports_unreachable_sources() {
        let outcome = load_or_empty(&MemorySource::new(), "gone.csv", &wind());
        assert!(outcome.table.is_empty());
        assert!(outcome.table.has_column("Wind_Risk"));
        assert!(matches!(
            outcome.error,
            Some(LoadError::SourceUnavailable { .. })
        ));
        assert!(outcome.diagnostic().unwrap().contains("gone.csv"));
    }

    #[test]
    fn census_pass_through_columns_are_type_inferred() {
        let csv = "County Name ,State/Territory,Identified as disadvantaged,Energy burden,Note\n\
cook county,illinois,True,12.5,urban\n";
        let source = MemorySource::new().with("c.csv", csv);
        let mapping = DatasetKind::Census.schema(PercentScale::Percent);
        let table = load(&source, "c.csv", &mapping).unwrap();
        assert_eq!(table.columns[0], COUNTY);
        assert_eq!(table.value(0, 0), &Value::Text("Cook County".into()));
        assert_eq!(table.value(0, 2), &Value::Bool(true));
        assert_eq!(table.value(0, 3), &Value::Number(12.5));
        assert_eq!(table.value(0, 4), &Value::Text("urban".into()));
    }

    #[test]
    fn fraction_scaled_sources_are_converted_to_percent() {
        let csv = "CF,SF,MEAN_low_income_percentage,Asthma\nfoard,texas,0.25,9.1\n";
        let source = MemorySource::new().with("h.csv", csv);
        let mapping = DatasetKind::Health.schema(PercentScale::Fraction);
        let table = load(&source, "h.csv", &mapping).unwrap();
        let pct = table.column_index(LOW_INCOME_PCT).unwrap();
        assert_eq!(table.number(0, pct), Some(25.0));
    }

    #[test]
    fn json_records_are_supported() {
        let json = r#"[
            {"CF": "foard", "SF": "texas", "Latitude": 33.99, "Longitude": -99.78,
             "MEAN_low_income_percentage": 42, "midcent_median_10yr": 15.0},
            {"CF": "hale", "SF": "texas", "Latitude": null, "Longitude": -101.8,
             "MEAN_low_income_percentage": 30, "midcent_median_10yr": 9.0}
        ]"#;
        let source = MemorySource::new().with("wind.json?sig=x", json);
        let table = load(&source, "wind.json?sig=x", &wind()).unwrap();
        assert_eq!(table.len(), 1);
        let lat = table.column_index(LAT).unwrap();
        assert_eq!(table.number(0, lat), Some(33.99));
    }

    #[test]
    fn parquet_columns_of_any_arrow_type_are_read_by_value() {
        use arrow::array::{Date32Array, DictionaryArray, Float64Array, Int16Array, UInt8Array};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let county: DictionaryArray<Int32Type> = vec!["foard", "hale"].into_iter().collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("CF", county.data_type().clone(), false),
            Field::new("SF", DataType::Utf8, false),
            Field::new("Latitude", DataType::Float64, false),
            Field::new("Longitude", DataType::Float64, false),
            Field::new("MEAN_low_income_percentage", DataType::UInt8, true),
            Field::new("midcent_median_10yr", DataType::Int16, true),
            Field::new("Updated", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(county),
                Arc::new(StringArray::from(vec!["texas", "texas"])),
                Arc::new(Float64Array::from(vec![33.99, 34.07])),
                Arc::new(Float64Array::from(vec![-99.78, -101.83])),
                Arc::new(UInt8Array::from(vec![Some(42), None])),
                Arc::new(Int16Array::from(vec![15, 9])),
                Arc::new(Date32Array::from(vec![Some(19_000), None])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let source = MemorySource::new().with("wind.parquet", buf);
        let table = load(&source, "wind.parquet", &wind()).unwrap();
        assert_eq!(table.len(), 2);
        let county = table.column_index(COUNTY).unwrap();
        let pct = table.column_index(LOW_INCOME_PCT).unwrap();
        let risk = table.column_index("Wind_Risk").unwrap();
        let updated = table.column_index("Updated").unwrap();
        assert_eq!(table.text(0, county), Some("Foard"));
        assert_eq!(table.text(1, county), Some("Hale"));
        assert_eq!(table.number(0, pct), Some(42.0));
        assert!(table.value(1, pct).is_missing());
        assert_eq!(table.number(0, risk), Some(15.0));
        assert_eq!(table.number(1, risk), Some(9.0));
        assert_eq!(table.text(0, updated), Some("2022-01-08"));
        assert!(table.value(1, updated).is_missing());
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("st. louis CITY"), "St. Louis City");
        assert_eq!(title_case("o'brien"), "O'Brien");
        assert_eq!(title_case("miami-dade"), "Miami-Dade");
    }
}
