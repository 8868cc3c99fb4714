/// Data layer: core types, loading, filtering and export.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet  (local path or URL)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse → GroundwaterTable (immutable snapshot)
///   └──────────┘
///        │  series(location)
///        ▼
///   ┌──────────┐
///   │  filter   │  window + hour-of-day, nearest-to-hour → FilteredResult
///   └──────────┘
///        │
///        ├──► stats    min / max / mean, display bounds
///        └──► export   CSV bytes
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod stats;
