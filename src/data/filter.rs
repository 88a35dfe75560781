use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::model::{Table, Value};
use super::schema::{COUNTY, STATE};
use crate::error::QueryError;

/// Rendering bound: tables above this many rows are subsampled for display.
pub const ROW_CAP: usize = 5000;

/// Seed used for display subsampling so repeated renders agree.
pub const SAMPLE_SEED: u64 = 42;

/// State scope value meaning "no state filter".
pub const ALL_STATES: &str = "All";

// ---------------------------------------------------------------------------
// Row predicates
// ---------------------------------------------------------------------------

/// A row-level test on one column. Missing cells never pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `value >= threshold` on a numeric column.
    AtLeast(f64),
    /// Exactly `Bool(true)`; `1` or `"yes"` do not count.
    IsTrue,
    /// Exact text equality.
    Equals(String),
    /// Case-insensitive substring match on a text column.
    Contains(String),
}

impl Predicate {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Missing) => false,
            (Predicate::AtLeast(t), Value::Number(v)) => v >= t,
            (Predicate::IsTrue, Value::Bool(b)) => *b,
            (Predicate::Equals(s), Value::Text(v)) => v == s,
            (Predicate::Contains(needle), Value::Text(v)) => {
                v.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        }
    }
}

fn require_column(table: &Table, column: &str) -> Result<usize, QueryError> {
    table
        .column_index(column)
        .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))
}

/// Rows where `column` is present and satisfies `predicate`, in source order.
pub fn filter(table: &Table, column: &str, predicate: &Predicate) -> Result<Table, QueryError> {
    let col = require_column(table, column)?;
    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| predicate.matches(table.value(i, col)))
        .collect();
    Ok(table.take(&keep))
}

/// Restrict to one state; `"All"` (or empty) leaves the table untouched.
pub fn filter_by_state(table: &Table, state: &str) -> Result<Table, QueryError> {
    if state.is_empty() || state == ALL_STATES {
        return Ok(table.clone());
    }
    filter(table, STATE, &Predicate::Equals(state.to_string()))
}

/// Free-text region search over county and state names.
pub fn search_regions(table: &Table, needle: &str) -> Result<Table, QueryError> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Ok(table.clone());
    }
    let county = require_column(table, COUNTY)?;
    let state = require_column(table, STATE)?;
    let predicate = Predicate::Contains(needle.to_string());
    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| {
            predicate.matches(table.value(i, county)) || predicate.matches(table.value(i, state))
        })
        .collect();
    Ok(table.take(&keep))
}

// ---------------------------------------------------------------------------
// Composed query
// ---------------------------------------------------------------------------

/// The row constraints a dashboard panel applies, intersected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Numeric column the threshold applies to (and that must be present).
    pub metric: String,
    pub threshold: Option<f64>,
    /// Boolean indicator column that must be exactly `true`.
    pub flag: Option<String>,
    pub state_scope: Option<String>,
    pub search: Option<String>,
}

/// Non-missing metric → threshold / equality → region search.
pub fn apply_query(table: &Table, query: &Query) -> Result<Table, QueryError> {
    let metric = require_column(table, &query.metric)?;
    let present: Vec<usize> = (0..table.len())
        .filter(|&i| table.number(i, metric).is_some())
        .collect();
    let mut out = table.take(&present);

    if let Some(t) = query.threshold {
        out = filter(&out, &query.metric, &Predicate::AtLeast(t))?;
    }
    if let Some(flag) = &query.flag {
        out = filter(&out, flag, &Predicate::IsTrue)?;
    }
    if let Some(state) = &query.state_scope {
        out = filter_by_state(&out, state)?;
    }
    if let Some(needle) = &query.search {
        out = search_regions(&out, needle)?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Ranking and subsampling
// ---------------------------------------------------------------------------

/// The `n` rows with the largest `column`, descending.
///
/// Stable: equal values keep their source order. Rows whose `column` is
/// missing are never ranked.
pub fn top_n(table: &Table, column: &str, n: usize) -> Result<Table, QueryError> {
    let col = require_column(table, column)?;
    let mut ranked: Vec<(usize, f64)> = (0..table.len())
        .filter_map(|i| table.number(i, col).map(|v| (i, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let indices: Vec<usize> = ranked.into_iter().take(n).map(|(i, _)| i).collect();
    Ok(table.take(&indices))
}

/// Uniform sample of `cap` rows, keeping source order. Deterministic for a
/// given seed. Tables within the cap are returned unchanged.
///
/// Only for display: rank with [`top_n`] on the full table first.
pub fn subsample(table: &Table, cap: usize, seed: u64) -> Table {
    if table.len() <= cap {
        return table.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, table.len(), cap).into_vec();
    picked.sort_unstable();
    table.take(&picked)
}

// ---------------------------------------------------------------------------
// Column helpers and joins
// ---------------------------------------------------------------------------

/// Columns holding at least one number, in table order.
pub fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(c, _)| table.rows.iter().any(|r| matches!(r.get(*c), Some(Value::Number(_)))))
        .map(|(_, name)| name.clone())
        .collect()
}

/// Columns holding at least one boolean, in table order.
pub fn boolean_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(c, _)| table.rows.iter().any(|r| matches!(r.get(*c), Some(Value::Bool(_)))))
        .map(|(_, name)| name.clone())
        .collect()
}

/// Left join on (County, State). The first matching right row wins; right
/// columns whose names clash with the left get a `_right` suffix; unmatched
/// left rows get `Missing`.
pub fn join_by_region(left: &Table, right: &Table) -> Result<Table, QueryError> {
    let l_county = require_column(left, COUNTY)?;
    let l_state = require_column(left, STATE)?;
    let r_county = require_column(right, COUNTY)?;
    let r_state = require_column(right, STATE)?;

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    for i in 0..right.len() {
        if let (Some(c), Some(s)) = (right.text(i, r_county), right.text(i, r_state)) {
            index.entry((c, s)).or_insert(i);
        }
    }

    let right_cols: Vec<usize> = (0..right.columns.len())
        .filter(|&c| c != r_county && c != r_state)
        .collect();
    let mut columns = left.columns.clone();
    for &c in &right_cols {
        let name = &right.columns[c];
        if left.has_column(name) {
            columns.push(format!("{name}_right"));
        } else {
            columns.push(name.clone());
        }
    }

    let rows = left
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let hit = match (left.text(i, l_county), left.text(i, l_state)) {
                (Some(c), Some(s)) => index.get(&(c, s)).copied(),
                _ => None,
            };
            let mut joined = row.clone();
            joined.extend(right_cols.iter().map(|&c| match hit {
                Some(r) => right.value(r, c).clone(),
                None => Value::Missing,
            }));
            joined
        })
        .collect();
    Ok(Table::new(columns, rows))
}
