//! Core data types for the Tabula table API.
//!
//! Tables, columns and views are read-only request inputs loaded from an
//! external metadata store. Filter trees and sort lists are the parsed form of
//! request and view parameters.

mod column;
mod filter;
mod observability;
mod row;
mod sort;
mod table;
mod view;

pub use column::{Column, ColumnBuilder, ColumnType, SelectOption};
pub use filter::{Comparison, ComparisonOp, FilterNode, FilterValue, LogicalOp};
pub use observability::init_tracing;
pub use row::Row;
pub use sort::{SortDirection, SortEntry};
pub use table::{Table, TableBuilder};
pub use view::{View, ViewBuilder};
