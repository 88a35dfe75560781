use std::collections::{BTreeMap, BTreeSet};
use std::sync::{mpsc, Arc};
use std::thread;

use serde::{Deserialize, Serialize};

use super::bucket::{bucketize, summarize, Bivariate, SummaryStats};
use super::cache::TableCache;
use super::filter::{apply_query, numeric_columns, subsample, top_n, Query, ALL_STATES};
use super::loader::LoadOutcome;
use super::model::Table;
use super::schema::{metric_display_name, DatasetKind, COUNTY, LAT, LON, STATE};
use super::source::DataSource;
use crate::config::Settings;
use crate::error::{BucketError, LoadError};

pub const THRESHOLD_RANGE: (f64, f64) = (0.0, 50.0);
pub const TOP_N_RANGE: (usize, usize) = (5, 50);

// ---------------------------------------------------------------------------
// Parameters coming from the UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardParams {
    pub kind: DatasetKind,
    /// Minimum metric value, `>=`.
    pub threshold: f64,
    /// Case-insensitive county/state substring.
    pub search: String,
    /// Ranking metric; defaults to the hazard's risk column.
    pub metric: Option<String>,
    pub top_n: usize,
    /// `"All"` or a state name.
    pub state_scope: String,
    /// Optional boolean indicator that must be true.
    pub flag: Option<String>,
    /// Hazards overlaid on the map, each with its own colour ramp.
    pub hazards: BTreeSet<DatasetKind>,
}

impl Default for DashboardParams {
    fn default() -> Self {
        Self {
            kind: DatasetKind::Wind,
            threshold: 5.0,
            search: String::new(),
            metric: None,
            top_n: 10,
            state_scope: ALL_STATES.to_string(),
            flag: None,
            hazards: BTreeSet::from([DatasetKind::Wind]),
        }
    }
}

impl DashboardParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            threshold: settings.default_threshold,
            top_n: settings.default_top_n,
            ..Self::default()
        }
        .clamped()
    }

    /// Threshold and top-N forced into their UI ranges.
    pub fn clamped(mut self) -> Self {
        self.threshold = self.threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
        self.top_n = self.top_n.clamp(TOP_N_RANGE.0, TOP_N_RANGE.1);
        self
    }

    /// The metric to filter and rank by for `table`.
    pub fn resolve_metric(&self, table: &Table) -> Option<String> {
        self.metric
            .clone()
            .or_else(|| self.kind.risk_column().map(str::to_string))
            .or_else(|| {
                numeric_columns(table)
                    .into_iter()
                    .find(|c| c != LAT && c != LON)
            })
    }
}

// ---------------------------------------------------------------------------
// Panel view model
// ---------------------------------------------------------------------------

/// Non-error outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Ok,
    EmptyResult,
}

#[derive(Debug, Clone)]
pub struct PanelView {
    pub metric: String,
    /// Every row satisfying the query.
    pub matches: Table,
    /// Top-N of `matches`, computed before any subsampling.
    pub ranked: Table,
    /// `matches`, subsampled to the row cap for the map.
    pub display: Table,
    /// `matches` as CSV for download.
    pub csv: String,
    pub summary: String,
    pub signal: Signal,
    pub warnings: Vec<String>,
}

fn scope_label(state_scope: &str) -> &str {
    if state_scope.is_empty() || state_scope == ALL_STATES {
        "the selected states"
    } else {
        state_scope
    }
}

/// Filter, rank, subsample and summarize one dataset for display.
pub fn run_panel(table: &Table, params: &DashboardParams, row_cap: usize, seed: u64) -> PanelView {
    let params = params.clone().clamped();
    let mut warnings = Vec::new();
    let metric = params.resolve_metric(table).unwrap_or_default();
    let metric_name = metric_display_name(&metric);

    let query = Query {
        metric: metric.clone(),
        threshold: Some(params.threshold),
        flag: params.flag.clone(),
        state_scope: Some(params.state_scope.clone()),
        search: Some(params.search.clone()),
    };
    let matches = match apply_query(table, &query) {
        Ok(t) => t,
        Err(e) => {
            warnings.push(e.to_string());
            Table::empty(table.columns.clone())
        }
    };
    let ranked = top_n(&matches, &metric, params.top_n)
        .unwrap_or_else(|_| Table::empty(matches.columns.clone()));
    let display = subsample(&matches, row_cap, seed);
    if display.len() < matches.len() {
        log::debug!("Subsampled {} of {} rows for display", display.len(), matches.len());
    }

    let csv = matches.to_csv().unwrap_or_else(|e| {
        warnings.push(format!("CSV export failed: {e}"));
        String::new()
    });

    let signal = if matches.is_empty() {
        warnings.push(format!(
            "No counties meet the risk threshold for {metric_name} in {}.",
            scope_label(&params.state_scope)
        ));
        Signal::EmptyResult
    } else {
        Signal::Ok
    };
    let summary = summary_line(&ranked, &metric, matches.len(), params.threshold);

    PanelView {
        metric,
        matches,
        ranked,
        display,
        csv,
        summary,
        signal,
        warnings,
    }
}

/// One hazard drawn on the shared map.
#[derive(Debug, Clone)]
pub struct HazardLayer {
    pub kind: DatasetKind,
    pub view: PanelView,
}

/// Run the panel pipeline once per selected hazard, each on its own risk
/// column. State scope, search, threshold and top-N are shared; the boolean
/// indicator is not, since hazard tables carry none.
///
/// Hazards without a loaded table yield an empty layer with its warning.
pub fn run_overlay(
    tables: &BTreeMap<DatasetKind, Arc<Table>>,
    params: &DashboardParams,
    row_cap: usize,
    seed: u64,
) -> Vec<HazardLayer> {
    params
        .hazards
        .iter()
        .filter(|kind| kind.is_hazard())
        .map(|&kind| {
            let layer_params = DashboardParams {
                kind,
                metric: None,
                flag: None,
                ..params.clone()
            };
            let view = match tables.get(&kind) {
                Some(table) => run_panel(table, &layer_params, row_cap, seed),
                None => {
                    let columns = [COUNTY, STATE, LAT, LON]
                        .into_iter()
                        .chain(kind.risk_column())
                        .map(str::to_string)
                        .collect();
                    run_panel(&Table::empty(columns), &layer_params, row_cap, seed)
                }
            };
            HazardLayer { kind, view }
        })
        .collect()
}

/// Sentence citing the top region and the threshold it met.
pub fn summary_line(ranked: &Table, metric: &str, matched: usize, threshold: f64) -> String {
    let name = metric_display_name(metric);
    let top = match (
        ranked.column_index(COUNTY),
        ranked.column_index(STATE),
        ranked.column_index(metric),
    ) {
        (Some(c), Some(s), Some(m)) if !ranked.is_empty() => {
            ranked.number(0, m).map(|v| (ranked.text(0, c), ranked.text(0, s), v))
        }
        _ => None,
    };
    match top {
        Some((Some(county), Some(state), value)) => format!(
            "{county}, {state} has the highest {name} ({value:.2}) among {matched} counties meeting the threshold {threshold}."
        ),
        _ => format!("No counties have {name} at or above {threshold}."),
    }
}

// ---------------------------------------------------------------------------
// Bivariate view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum BivariateView {
    Chart(Bivariate),
    /// Bucketing failed: raw statistics for each column instead.
    Fallback {
        warning: String,
        stats: Vec<SummaryStats>,
    },
}

pub fn run_bivariate(table: &Table, column_a: &str, column_b: &str, buckets: usize) -> BivariateView {
    match bucketize(table, column_a, column_b, buckets) {
        Ok(b) => BivariateView::Chart(b),
        Err(e) => {
            if let BucketError::InsufficientVariance { .. } = e {
                log::info!("{e}; showing summary statistics");
            }
            BivariateView::Fallback {
                warning: e.to_string(),
                stats: [column_a, column_b]
                    .iter()
                    .filter_map(|c| summarize(table, c))
                    .collect(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog – configured datasets behind the cache
// ---------------------------------------------------------------------------

/// Loads every configured dataset kind through a shared [`TableCache`].
pub struct Catalog {
    pub settings: Settings,
    source: Box<dyn DataSource + Send + Sync>,
    cache: TableCache,
}

impl Catalog {
    pub fn new(settings: Settings, source: Box<dyn DataSource + Send + Sync>) -> Self {
        Self {
            settings,
            source,
            cache: TableCache::new(),
        }
    }

    /// Never fails: unconfigured or broken sources yield an empty table plus error.
    pub fn load(&self, kind: DatasetKind) -> LoadOutcome {
        let mapping = kind.schema(self.settings.low_income_scale);
        let result = match self.settings.sources.get(kind) {
            Some(locator) => self.cache.load(self.source.as_ref(), locator, &mapping),
            None => Err(LoadError::unavailable(
                kind.key(),
                "no source configured",
            )),
        };
        LoadOutcome::from_result(result, &mapping)
    }

    pub fn load_all(&self) -> BTreeMap<DatasetKind, LoadOutcome> {
        DatasetKind::ALL
            .iter()
            .map(|&kind| (kind, self.load(kind)))
            .collect()
    }

    /// Run [`Catalog::load_all`] on a worker thread; the receiver yields
    /// exactly one result. `refetch` drops memoized tables first.
    pub fn spawn_load_all(self: &Arc<Self>, refetch: bool) -> mpsc::Receiver<BTreeMap<DatasetKind, LoadOutcome>> {
        let (sender, receiver) = mpsc::channel();
        let catalog = Arc::clone(self);
        thread::spawn(move || {
            if refetch {
                catalog.invalidate();
            }
            // The receiver is gone when the UI shut down mid-load.
            let _ = sender.send(catalog.load_all());
        });
        receiver
    }

    /// Drop memoized tables so the next load refetches.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    pub fn cached(&self, kind: DatasetKind) -> Option<Arc<Table>> {
        let locator = self.settings.sources.get(kind)?;
        self.cache
            .get(locator, &kind.schema(self.settings.low_income_scale))
    }
}
