//! County-level hazard, community and health tables: loading, normalization,
//! filtering, ranking and bivariate classification for the dashboard UI.

pub mod config;
pub mod data;
pub mod error;

pub use config::Settings;
pub use data::model::{Table, Value};
pub use data::pipeline::{
    run_bivariate, run_overlay, run_panel, BivariateView, Catalog, DashboardParams, HazardLayer, PanelView,
    Signal,
};
pub use error::{BucketError, DashboardError, LoadError, QueryError};
