use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Value – a single cell of a normalized table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell. Coercion failures are `Missing`, never zero.
/// Using `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    Missing,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Missing => 0,
                Bool(_) => 1,
                Number(_) => 2,
                Text(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Number(a), Number(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Missing => Ok(()),
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

// ---------------------------------------------------------------------------
// Table – the normalized, row-oriented dataset
// ---------------------------------------------------------------------------

/// Column names plus positional rows. Rows are not deduplicated by region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Table { columns, rows }
    }

    /// A zero-row table with the given header.
    pub fn empty(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Value::Missing)
    }

    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.value(row, col).as_f64()
    }

    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.value(row, col).as_str()
    }

    /// Copy of the rows at `indices`, in the given order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Sorted set of distinct non-missing values in a column.
    pub fn unique_values(&self, name: &str) -> BTreeSet<Value> {
        let Some(col) = self.column_index(name) else {
            return BTreeSet::new();
        };
        self.rows
            .iter()
            .filter_map(|r| r.get(col))
            .filter(|v| !v.is_missing())
            .cloned()
            .collect()
    }

    /// Append a column; `values` is padded with `Missing` / truncated to the row count.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Table {
        self.columns.push(name.to_string());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().unwrap_or(Value::Missing));
        }
        self
    }

    /// Serialize as comma-separated text with a header row. Missing cells are empty.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["County".into(), "Score".into()],
            vec![
                vec![Value::Text("Foard".into()), Value::Number(15.0)],
                vec![Value::Text("Hale".into()), Value::Missing],
                vec![Value::Text("Foard".into()), Value::Number(3.5)],
            ],
        )
    }

    #[test]
    fn values_order_by_kind_then_content() {
        let mut set = BTreeSet::new();
        set.insert(Value::Text("b".into()));
        set.insert(Value::Number(2.0));
        set.insert(Value::Missing);
        set.insert(Value::Number(-1.0));
        set.insert(Value::Bool(true));
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                Value::Missing,
                Value::Bool(true),
                Value::Number(-1.0),
                Value::Number(2.0),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn unique_values_skip_missing_and_duplicates() {
        let table = sample();
        let counties = table.unique_values("County");
        assert_eq!(counties.len(), 2);
        assert_eq!(table.unique_values("Score").len(), 2);
        assert!(table.unique_values("Nope").is_empty());
    }

    #[test]
    fn take_preserves_requested_order() {
        let table = sample();
        let picked = table.take(&[2, 0]);
        assert_eq!(picked.number(0, 1), Some(3.5));
        assert_eq!(picked.number(1, 1), Some(15.0));
    }

    #[test]
    fn csv_export_leaves_missing_cells_empty() {
        let csv = sample().to_csv().unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "County,Score");
        assert_eq!(lines[1], "Foard,15");
        assert_eq!(lines[2], "Hale,");
    }

    #[test]
    fn with_column_pads_short_input() {
        let table = sample().with_column("Flag", vec![Value::Bool(true)]);
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.value(0, 2), &Value::Bool(true));
        assert_eq!(table.value(2, 2), &Value::Missing);
    }
}
