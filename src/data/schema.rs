use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Canonical column names
// ---------------------------------------------------------------------------

pub const COUNTY: &str = "County";
pub const STATE: &str = "State";
pub const LAT: &str = "Lat";
pub const LON: &str = "Lon";
pub const LOW_INCOME_PCT: &str = "Low_Income_Pct";

// ---------------------------------------------------------------------------
// Percentage scale of the low-income indicator
// ---------------------------------------------------------------------------

/// How a source expresses the low-income share. Normalized tables always
/// carry it on the 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentScale {
    /// Already 0–100.
    #[default]
    Percent,
    /// 0–1, multiplied by 100 on load.
    Fraction,
}

impl PercentScale {
    /// Convert to the canonical 0–100 scale and clip.
    pub fn to_percent(self, v: f64) -> f64 {
        let scaled = match self {
            PercentScale::Percent => v,
            PercentScale::Fraction => v * 100.0,
        };
        scaled.clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// SchemaMapping – how a raw source becomes a normalized table
// ---------------------------------------------------------------------------

/// Rename table plus typing rules. `Hash`/`Eq` so it can key the table cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SchemaMapping {
    /// source column name → normalized column name (source names are trimmed).
    pub renames: Vec<(String, String)>,
    /// Normalized columns holding region labels: trimmed and title-cased.
    pub label_columns: Vec<String>,
    /// Normalized columns coerced to numbers.
    pub numeric_columns: Vec<String>,
    /// Normalized columns holding the 0–100 low-income share.
    pub percent_columns: Vec<String>,
    pub percent_scale: PercentScale,
    /// Normalized columns that must be non-missing for a row to survive.
    pub required: Vec<String>,
}

impl SchemaMapping {
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_string(), to.to_string()));
        self
    }

    pub fn labels(mut self, cols: &[&str]) -> Self {
        self.label_columns.extend(cols.iter().map(|c| c.to_string()));
        self
    }

    pub fn numeric(mut self, cols: &[&str]) -> Self {
        self.numeric_columns.extend(cols.iter().map(|c| c.to_string()));
        self
    }

    pub fn percent(mut self, col: &str, scale: PercentScale) -> Self {
        self.percent_columns.push(col.to_string());
        self.percent_scale = scale;
        if !self.numeric_columns.iter().any(|c| c == col) {
            self.numeric_columns.push(col.to_string());
        }
        self
    }

    pub fn require(mut self, cols: &[&str]) -> Self {
        self.required.extend(cols.iter().map(|c| c.to_string()));
        self
    }

    /// Normalized name for a (trimmed) source column.
    pub fn normalized_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| from == source)
            .map(|(_, to)| to.as_str())
            .unwrap_or(source)
    }

    pub fn is_label(&self, col: &str) -> bool {
        self.label_columns.iter().any(|c| c == col)
    }

    pub fn is_numeric(&self, col: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == col)
    }

    pub fn is_percent(&self, col: &str) -> bool {
        self.percent_columns.iter().any(|c| c == col)
    }
}

// ---------------------------------------------------------------------------
// DatasetKind – the datasets the dashboard knows about
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Wind,
    Drought,
    Wildfire,
    Census,
    Health,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        DatasetKind::Wind,
        DatasetKind::Drought,
        DatasetKind::Wildfire,
        DatasetKind::Census,
        DatasetKind::Health,
    ];

    pub fn is_hazard(self) -> bool {
        matches!(
            self,
            DatasetKind::Wind | DatasetKind::Drought | DatasetKind::Wildfire
        )
    }

    /// Normalized name of the primary risk column (hazards only).
    pub fn risk_column(self) -> Option<&'static str> {
        match self {
            DatasetKind::Wind => Some("Wind_Risk"),
            DatasetKind::Drought => Some("Drought_Risk"),
            DatasetKind::Wildfire => Some("Wildfire_Risk"),
            DatasetKind::Census | DatasetKind::Health => None,
        }
    }

    /// Configuration key, e.g. `HAZARD_LENS__SOURCES__WIND`.
    pub fn key(self) -> &'static str {
        match self {
            DatasetKind::Wind => "wind",
            DatasetKind::Drought => "drought",
            DatasetKind::Wildfire => "wildfire",
            DatasetKind::Census => "census",
            DatasetKind::Health => "health",
        }
    }

    /// The schema every source of this kind is normalized with.
    pub fn schema(self, scale: PercentScale) -> SchemaMapping {
        match self {
            DatasetKind::Wind | DatasetKind::Drought | DatasetKind::Wildfire => {
                let risk = self.risk_column().unwrap_or_default();
                SchemaMapping::default()
                    .rename("CF", COUNTY)
                    .rename("SF", STATE)
                    .rename("Latitude", LAT)
                    .rename("Longitude", LON)
                    .rename("MEAN_low_income_percentage", LOW_INCOME_PCT)
                    .rename("midcent_median_10yr", risk)
                    .labels(&[COUNTY, STATE])
                    .numeric(&[LAT, LON, risk])
                    .percent(LOW_INCOME_PCT, scale)
                    .require(&[COUNTY, STATE, LAT, LON, risk])
            }
            DatasetKind::Census => SchemaMapping::default()
                .rename("County Name", COUNTY)
                .rename("State/Territory", STATE)
                .labels(&[COUNTY, STATE])
                .require(&[COUNTY, STATE]),
            DatasetKind::Health => SchemaMapping::default()
                .rename("CF", COUNTY)
                .rename("SF", STATE)
                .rename("MEAN_low_income_percentage", LOW_INCOME_PCT)
                .labels(&[COUNTY, STATE])
                .percent(LOW_INCOME_PCT, scale)
                .require(&[COUNTY, STATE, LOW_INCOME_PCT]),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Wind => "Wind Risk",
            DatasetKind::Drought => "Drought Risk",
            DatasetKind::Wildfire => "Wildfire Risk",
            DatasetKind::Census => "Community (Census)",
            DatasetKind::Health => "Public Health",
        };
        f.write_str(name)
    }
}

/// Human-readable label for a normalized column.
pub fn metric_display_name(column: &str) -> String {
    match column {
        "Wind_Risk" => "Wind Risk".to_string(),
        "Drought_Risk" => "Drought Risk".to_string(),
        "Wildfire_Risk" => "Wildfire Risk".to_string(),
        LOW_INCOME_PCT => "Low-Income %".to_string(),
        other => other.replace('_', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hazard_schema_maps_source_columns() {
        let schema = DatasetKind::Wind.schema(PercentScale::Percent);
        assert_eq!(schema.normalized_name("CF"), COUNTY);
        assert_eq!(schema.normalized_name("midcent_median_10yr"), "Wind_Risk");
        assert_eq!(schema.normalized_name("Unmapped"), "Unmapped");
        assert!(schema.is_numeric(LOW_INCOME_PCT));
        assert!(schema.required.iter().any(|c| c == "Wind_Risk"));
    }

    #[test]
    fn fraction_scale_converts_and_clips() {
        assert_eq!(PercentScale::Fraction.to_percent(0.25), 25.0);
        assert_eq!(PercentScale::Percent.to_percent(142.0), 100.0);
        assert_eq!(PercentScale::Percent.to_percent(-3.0), 0.0);
    }

    #[test]
    fn non_hazards_have_no_risk_column() {
        assert!(DatasetKind::Census.risk_column().is_none());
        assert!(!DatasetKind::Health.is_hazard());
        assert_eq!(metric_display_name("Asthma_Rate"), "Asthma Rate");
    }
}
