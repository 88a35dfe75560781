use std::collections::{BTreeMap, BTreeSet};

use super::model::{Table, Value};
use super::schema::metric_display_name;
use crate::error::BucketError;

// ---------------------------------------------------------------------------
// Bivariate quantile classification
// ---------------------------------------------------------------------------

/// Output of [`bucketize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bivariate {
    /// Rows with both columns present, plus `<a>_Bucket`, `<b>_Bucket` and
    /// `Bivariate_Category` columns.
    pub table: Table,
    /// Quantile edges (`buckets + 1` values) for each column.
    pub edges_a: Vec<f64>,
    pub edges_b: Vec<f64>,
    /// Rows per joint label, in label-sort order.
    pub counts: Vec<(String, usize)>,
}

pub const CATEGORY_COLUMN: &str = "Bivariate_Category";

/// Ordinal labels for `buckets` groups.
pub fn bucket_labels(buckets: usize) -> Vec<String> {
    match buckets {
        2 => vec!["Low".into(), "High".into()],
        3 => vec!["Low".into(), "Medium".into(), "High".into()],
        n => (1..=n).map(|i| format!("Q{i}")).collect(),
    }
}

/// Equal-frequency split of `column_a` and `column_b` into `buckets` groups
/// each, crossed into a joint category.
///
/// Edges are linearly interpolated quantiles; the first group is closed on
/// both ends, the rest are `(lo, hi]`.
pub fn bucketize(
    table: &Table,
    column_a: &str,
    column_b: &str,
    buckets: usize,
) -> Result<Bivariate, BucketError> {
    let a = table
        .column_index(column_a)
        .ok_or_else(|| BucketError::ColumnNotFound(column_a.to_string()))?;
    let b = table
        .column_index(column_b)
        .ok_or_else(|| BucketError::ColumnNotFound(column_b.to_string()))?;

    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| table.number(i, a).is_some() && table.number(i, b).is_some())
        .collect();
    let complete = table.take(&keep);

    let values_a: Vec<f64> = (0..complete.len()).filter_map(|i| complete.number(i, a)).collect();
    let values_b: Vec<f64> = (0..complete.len()).filter_map(|i| complete.number(i, b)).collect();
    let edges_a = quantile_edges(&values_a, column_a, buckets)?;
    let edges_b = quantile_edges(&values_b, column_b, buckets)?;

    let labels = bucket_labels(buckets);
    let name_a = metric_display_name(column_a);
    let name_b = metric_display_name(column_b);

    let mut col_a = Vec::with_capacity(complete.len());
    let mut col_b = Vec::with_capacity(complete.len());
    let mut joint = Vec::with_capacity(complete.len());
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (&va, &vb) in values_a.iter().zip(&values_b) {
        let la = &labels[assign(va, &edges_a)];
        let lb = &labels[assign(vb, &edges_b)];
        let category = format!("{la} {name_a} / {lb} {name_b}");
        *counts.entry(category.clone()).or_default() += 1;
        col_a.push(Value::Text(la.clone()));
        col_b.push(Value::Text(lb.clone()));
        joint.push(Value::Text(category));
    }

    let table = complete
        .with_column(&format!("{column_a}_Bucket"), col_a)
        .with_column(&format!("{column_b}_Bucket"), col_b)
        .with_column(CATEGORY_COLUMN, joint);

    Ok(Bivariate {
        table,
        edges_a,
        edges_b,
        counts: counts.into_iter().collect(),
    })
}

/// `buckets + 1` strictly increasing quantile edges, or `InsufficientVariance`.
pub fn quantile_edges(values: &[f64], column: &str, buckets: usize) -> Result<Vec<f64>, BucketError> {
    let distinct: BTreeSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    let insufficient = || BucketError::InsufficientVariance {
        column: column.to_string(),
        distinct: distinct.len(),
        buckets,
    };
    if buckets == 0 || distinct.len() < buckets {
        return Err(insufficient());
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let edges: Vec<f64> = (0..=buckets)
        .map(|k| quantile(&sorted, k as f64 / buckets as f64))
        .collect();
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(insufficient());
    }
    Ok(edges)
}

/// Linear-interpolation quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn assign(v: f64, edges: &[f64]) -> usize {
    let last = edges.len().saturating_sub(2);
    edges[1..]
        .iter()
        .position(|&hi| v <= hi)
        .unwrap_or(last)
}

// ---------------------------------------------------------------------------
// Fallback summary
// ---------------------------------------------------------------------------

/// Plain statistics shown when a column cannot be bucketed.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

pub fn summarize(table: &Table, column: &str) -> Option<SummaryStats> {
    let col = table.column_index(column)?;
    let mut values: Vec<f64> = (0..table.len()).filter_map(|i| table.number(i, col)).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let count = values.len();
    Some(SummaryStats {
        column: column.to_string(),
        count,
        min: values[0],
        max: values[count - 1],
        mean: values.iter().sum::<f64>() / count as f64,
        median: quantile(&values, 0.5),
    })
}
