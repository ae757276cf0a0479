/// Data layer: the table model, the registry, and the table operations.
///
/// Architecture:
/// ```text
///  .csv / .ft / .dat / .cat / .fit / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (sorted by frequency)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐   change callback
///   │ TableRegistry │ ─────────────────▶ UI refresh
///   └──────────────┘
///        │  ▲
///        ▼  │ new / mutated Table
///   ┌──────────────────────────────────────────────┐
///   │ merge · peaks (spline) · ratio · proximity    │
///   │ filter (row filter, column modifier)          │
///   └──────────────────────────────────────────────┘
/// ```

pub mod error;
pub mod filter;
pub mod loader;
pub mod merge;
pub mod model;
pub mod peaks;
pub mod proximity;
pub mod ratio;
pub mod registry;
pub mod spline;
