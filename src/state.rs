use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use anyhow::{Context, Result};

use hazard_lens::data::filter::{boolean_columns, join_by_region, numeric_columns};
use hazard_lens::data::loader::LoadOutcome;
use hazard_lens::data::schema::{DatasetKind, LAT, LON, LOW_INCOME_PCT, STATE};
use hazard_lens::data::source::AnySource;
use hazard_lens::{
    run_bivariate, run_overlay, run_panel, BivariateView, Catalog, DashboardParams, HazardLayer, PanelView,
    Settings, Table,
};

use crate::color::CategoryColors;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Map,
    Ranking,
    Table,
    Bivariate,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Configured sources behind the cache (None if the HTTP client failed to build).
    pub catalog: Option<Arc<Catalog>>,

    /// Last load result per dataset kind.
    pub datasets: BTreeMap<DatasetKind, LoadOutcome>,

    /// In-flight background load, if any.
    pending: Option<Receiver<BTreeMap<DatasetKind, LoadOutcome>>>,

    /// User-adjustable parameters.
    pub params: DashboardParams,

    /// Filtered / ranked view of the active dataset (cached).
    pub view: Option<PanelView>,

    /// One layer per hazard selected for the map.
    pub overlay: Vec<HazardLayer>,

    /// Choices offered by the side panel for the active dataset.
    pub states: Vec<String>,
    pub metrics: Vec<String>,
    pub flags: Vec<String>,

    /// Bivariate columns and result.
    pub bivariate_a: String,
    pub bivariate_b: String,
    pub buckets: usize,
    pub bivariate: Option<BivariateView>,
    pub category_colors: Option<CategoryColors>,

    pub tab: Tab,
    pub row_cap: usize,
    pub sample_seed: u64,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(settings: std::result::Result<Settings, hazard_lens::DashboardError>) -> Self {
        let mut status_message = None;
        let settings = settings.unwrap_or_else(|e| {
            log::error!("{e}");
            status_message = Some(format!("{e}; using defaults"));
            Settings::default()
        });

        let catalog = match AnySource::new(settings.fetch_timeout()) {
            Ok(source) => Some(Arc::new(Catalog::new(settings.clone(), Box::new(source)))),
            Err(e) => {
                log::error!("{e}");
                status_message = Some(e.to_string());
                None
            }
        };

        let mut state = Self {
            catalog,
            datasets: BTreeMap::new(),
            pending: None,
            params: DashboardParams::from_settings(&settings),
            view: None,
            overlay: Vec::new(),
            states: Vec::new(),
            metrics: Vec::new(),
            flags: Vec::new(),
            bivariate_a: LOW_INCOME_PCT.to_string(),
            bivariate_b: String::new(),
            buckets: 2,
            bivariate: None,
            category_colors: None,
            tab: Tab::Map,
            row_cap: settings.row_cap,
            sample_seed: settings.sample_seed,
            status_message,
        };
        state.reload(false);
        state
    }

    /// Start loading every dataset on a worker thread; `refetch` drops
    /// memoized tables first. Results arrive through [`AppState::poll_reload`].
    pub fn reload(&mut self, refetch: bool) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        if self.pending.is_some() {
            log::debug!("Reload already in progress");
            return;
        }
        self.pending = Some(catalog.spawn_load_all(refetch));
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Install a finished background load. Returns `true` when one arrived.
    pub fn poll_reload(&mut self) -> bool {
        let Some(receiver) = &self.pending else {
            return false;
        };
        let datasets = match receiver.try_recv() {
            Ok(datasets) => datasets,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                log::error!("Dataset loader thread exited without a result");
                self.pending = None;
                self.status_message = Some("Loading datasets failed".to_string());
                return false;
            }
        };
        self.pending = None;
        for (kind, outcome) in &datasets {
            match outcome.diagnostic() {
                Some(msg) => log::warn!("{kind}: {msg}"),
                None => log::info!("{kind}: {} rows", outcome.table.len()),
            }
        }
        self.datasets = datasets;
        self.on_dataset_changed();
        true
    }

    pub fn active_table(&self) -> Arc<Table> {
        self.datasets
            .get(&self.params.kind)
            .map(|o| Arc::clone(&o.table))
            .unwrap_or_default()
    }

    /// Load failure of the active dataset, if any.
    pub fn active_diagnostic(&self) -> Option<String> {
        self.datasets
            .get(&self.params.kind)
            .and_then(|o| o.diagnostic())
    }

    pub fn set_kind(&mut self, kind: DatasetKind) {
        if self.params.kind != kind {
            self.params.kind = kind;
            self.params.metric = None;
            self.params.flag = None;
            self.on_dataset_changed();
        }
    }

    /// Rebuild selector choices, then recompute views.
    fn on_dataset_changed(&mut self) {
        let table = self.active_table();
        self.states = table
            .unique_values(STATE)
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if !self.states.contains(&self.params.state_scope) {
            self.params.state_scope = hazard_lens::data::filter::ALL_STATES.to_string();
        }
        self.metrics = numeric_columns(&table)
            .into_iter()
            .filter(|c| c != LAT && c != LON)
            .collect();
        self.flags = boolean_columns(&table);

        let bivariate_table = self.bivariate_table();
        let candidates = numeric_columns(&bivariate_table);
        if !candidates.contains(&self.bivariate_b) {
            self.bivariate_b = candidates
                .iter()
                .find(|c| *c != LOW_INCOME_PCT && *c != LAT && *c != LON)
                .cloned()
                .unwrap_or_default();
        }
        self.recompute();
    }

    /// Add or remove a hazard from the map overlay.
    pub fn toggle_hazard(&mut self, kind: DatasetKind) {
        if !self.params.hazards.remove(&kind) {
            self.params.hazards.insert(kind);
        }
        self.recompute();
    }

    /// Recompute the panel view after a parameter change.
    pub fn recompute(&mut self) {
        let table = self.active_table();
        self.view = Some(run_panel(&table, &self.params, self.row_cap, self.sample_seed));
        let tables: BTreeMap<DatasetKind, Arc<Table>> = self
            .datasets
            .iter()
            .map(|(kind, outcome)| (*kind, Arc::clone(&outcome.table)))
            .collect();
        self.overlay = run_overlay(&tables, &self.params, self.row_cap, self.sample_seed);
        self.recompute_bivariate();
    }

    /// Hazard tables are joined with health indicators for the cross-tab.
    pub fn bivariate_table(&self) -> Table {
        let active = self.active_table();
        let health = self.datasets.get(&DatasetKind::Health).map(|o| &o.table);
        match health {
            Some(health) if self.params.kind.is_hazard() && !health.is_empty() => {
                join_by_region(&active, health).unwrap_or_else(|_| (*active).clone())
            }
            _ => (*active).clone(),
        }
    }

    pub fn bivariate_columns(&self) -> Vec<String> {
        numeric_columns(&self.bivariate_table())
            .into_iter()
            .filter(|c| c != LAT && c != LON)
            .collect()
    }

    pub fn recompute_bivariate(&mut self) {
        let table = self.bivariate_table();
        let view = run_bivariate(&table, &self.bivariate_a, &self.bivariate_b, self.buckets);
        self.category_colors = match &view {
            BivariateView::Chart(b) => Some(CategoryColors::new(b.counts.iter().map(|(l, _)| l))),
            BivariateView::Fallback { .. } => None,
        };
        self.bivariate = Some(view);
    }

    /// Write the current filtered table as CSV.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let view = self.view.as_ref().context("nothing to export")?;
        std::fs::write(path, &view.csv)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Exported {} rows to {}", view.matches.len(), path.display());
        Ok(())
    }
}
