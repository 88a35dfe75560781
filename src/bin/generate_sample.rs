use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// (county, state, latitude, longitude), lower-case like the raw exports.
const COUNTIES: &[(&str, &str, f64, f64)] = &[
    ("foard", "texas", 33.99, -99.78),
    ("hale", "texas", 34.07, -101.83),
    ("lamb", "texas", 34.07, -102.35),
    ("travis", "texas", 30.33, -97.78),
    ("harris", "texas", 29.86, -95.39),
    ("el paso", "texas", 31.77, -106.24),
    ("fulton", "georgia", 33.79, -84.47),
    ("chatham", "georgia", 31.97, -81.09),
    ("dougherty", "georgia", 31.53, -84.22),
    ("los angeles", "california", 34.32, -118.22),
    ("fresno", "california", 36.76, -119.65),
    ("shasta", "california", 40.76, -122.04),
    ("miami-dade", "florida", 25.61, -80.50),
    ("leon", "florida", 30.46, -84.28),
    ("cook", "illinois", 41.84, -87.82),
    ("st. clair", "illinois", 38.47, -89.93),
    ("maricopa", "arizona", 33.35, -112.49),
    ("pima", "arizona", 32.10, -111.79),
    ("orleans", "louisiana", 30.07, -89.93),
    ("caddo", "louisiana", 32.58, -93.88),
];

const HAZARDS: &[(&str, f64)] = &[("wind", 14.0), ("drought", 9.0), ("wildfire", 6.0)];

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-15);
    let u2: f64 = rng.random();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

struct HazardRow {
    county: String,
    state: String,
    lat: f64,
    lon: f64,
    low_income: f64,
    risk: f64,
}

fn hazard_rows(rng: &mut StdRng, base: f64, low_income: &[f64]) -> Vec<HazardRow> {
    COUNTIES
        .iter()
        .zip(low_income)
        .map(|(&(county, state, lat, lon), &pct)| HazardRow {
            // Raw exports pad and lower-case names; the loader fixes that.
            county: format!(" {county} "),
            state: state.to_string(),
            lat,
            lon,
            low_income: pct,
            risk: (gauss(rng, base, base * 0.5)).max(0.0),
        })
        .collect()
}

fn write_hazard_csv(path: &Path, rows: &[HazardRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "CF",
        "SF",
        "Latitude",
        "Longitude",
        "MEAN_low_income_percentage",
        "midcent_median_10yr",
    ])?;
    for r in rows {
        writer.write_record([
            r.county.clone(),
            r.state.clone(),
            r.lat.to_string(),
            r.lon.to_string(),
            format!("{:.1}", r.low_income),
            format!("{:.2}", r.risk),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_hazard_parquet(path: &Path, rows: &[HazardRow]) -> Result<()> {
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
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.county.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.state.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.lat))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.lon))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.low_income))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.risk))),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_census_csv(path: &Path, rng: &mut StdRng, low_income: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "County Name ",
        " State/Territory",
        "Identified as disadvantaged",
        "Energy burden (percentile)",
        "PM2.5 in the air (percentile)",
        "Total population",
    ])?;
    for (&(county, state, _, _), &pct) in COUNTIES.iter().zip(low_income) {
        let disadvantaged = if pct >= 30.0 { "True" } else { "False" };
        writer.write_record([
            county.to_string(),
            state.to_string(),
            disadvantaged.to_string(),
            format!("{:.0}", rng.random_range(5.0..95.0)),
            format!("{:.0}", rng.random_range(5.0..95.0)),
            format!("{}", rng.random_range(2_000..4_000_000)),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_health_json(path: &Path, rng: &mut StdRng, low_income: &[f64]) -> Result<()> {
    let records: Vec<_> = COUNTIES
        .iter()
        .zip(low_income)
        .map(|(&(county, state, _, _), &pct)| {
            json!({
                "CF": county,
                "SF": state,
                "MEAN_low_income_percentage": pct,
                "Asthma_Rate": (gauss(rng, 8.0 + pct * 0.08, 1.0) * 10.0).round() / 10.0,
                "Diabetes_Rate": (gauss(rng, 9.0 + pct * 0.1, 1.5) * 10.0).round() / 10.0,
                "Life_Expectancy": (gauss(rng, 80.0 - pct * 0.12, 1.2) * 10.0).round() / 10.0,
            })
        })
        .collect();
    let text = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = StdRng::seed_from_u64(42);
    let low_income: Vec<f64> = COUNTIES
        .iter()
        .map(|_| gauss(&mut rng, 28.0, 10.0).clamp(2.0, 80.0))
        .collect();

    let mut locators = Vec::new();
    for &(hazard, base) in HAZARDS {
        let rows = hazard_rows(&mut rng, base, &low_income);
        let path = if hazard == "wildfire" {
            let p = out_dir.join(format!("{hazard}.parquet"));
            write_hazard_parquet(&p, &rows)?;
            p
        } else {
            let p = out_dir.join(format!("{hazard}.csv"));
            write_hazard_csv(&p, &rows)?;
            p
        };
        locators.push((hazard, path));
    }

    let census = out_dir.join("census.csv");
    write_census_csv(&census, &mut rng, &low_income)?;
    locators.push(("census", census));

    let health = out_dir.join("health.json");
    write_health_json(&health, &mut rng, &low_income)?;
    locators.push(("health", health));

    let mut toml = String::from("[sources]\n");
    for (key, path) in &locators {
        toml.push_str(&format!("{key} = {:?}\n", path.display().to_string()));
    }
    let config_path = out_dir.join("hazard-lens.toml");
    std::fs::write(&config_path, toml).with_context(|| format!("writing {}", config_path.display()))?;

    println!(
        "Wrote {} counties per dataset to {}; run `hazard-lens {}`",
        COUNTIES.len(),
        out_dir.display(),
        config_path.display()
    );
    Ok(())
}
