/// Data layer: table model, loading, querying and bucketing.
///
/// Architecture:
/// ```text
///  locator (https:// | path)  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  source   │  fetch bytes (HTTP with timeout, or file)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  trim, rename, coerce, drop incomplete rows → Table
///   └──────────┘   (memoized by `cache`)
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  threshold / flag / state / search → top-N → subsample
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  bucket   │  bivariate quantile classes + counts
///   └──────────┘
/// ```
///
/// `pipeline` composes the stages per dashboard panel.

pub mod bucket;
pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod source;
