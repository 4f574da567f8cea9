//! Cumulus core types: rows, column headers, row deltas, ordering and table snapshots.
//!
//! Everything here is plain data. The engine builds a fresh [`TableSnapshot`] per refresh
//! and publishes it behind an `Arc`; readers never see a snapshot being mutated.

#![forbid(unsafe_code)]

pub mod delta;
pub mod event;
pub mod header;
pub mod row;
pub mod sort;
pub mod table;
pub mod tone;

pub use delta::DeltaRow;
pub use event::{RowEvent, RowEventKind, RowEvents};
pub use header::{Align, ColumnAttrs, ColumnRole, Header, HeaderColumn};
pub use row::{Fields, Row};
pub use sort::SortMode;
pub use table::TableSnapshot;
pub use tone::RowTone;

/// Placeholder rendered for values the provider did not report.
pub const NA_VALUE: &str = "n/a";
/// Placeholder rendered for absent optional values.
pub const MISSING_VALUE: &str = "<none>";
/// Placeholder rendered when a value could not be determined.
pub const UNKNOWN_VALUE: &str = "<unknown>";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unable to delete row with id: {0:?}")]
    RowNotFound(String),
    #[error("row with id {0:?} already present")]
    DuplicateRow(String),
    #[error("row index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },
    #[error("row {id:?} has {got} fields, header declares {expected}")]
    FieldCount { id: String, expected: usize, got: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;

pub mod prelude {
    pub use super::{
        ColumnAttrs, ColumnRole, CoreError, DeltaRow, Header, HeaderColumn, Row, RowEvent,
        RowEventKind, RowEvents, RowTone, SortMode, TableSnapshot,
    };
}
