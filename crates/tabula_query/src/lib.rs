//! Query translation and pagination engine.
//!
//! Turns untrusted request parameters and a saved view into a parameterized,
//! dialect-correct query plan:
//!
//! 1. [`parse_filter_lenient`] and [`parse_sort`] turn strings into trees and lists.
//! 2. [`overlay`] merges view rules with request parameters.
//! 3. [`PlanBuilder`] resolves field references against table metadata and
//!    produces [`SelectPlan`], [`CountPlan`] and [`MutationPlan`] values.
//! 4. [`SqlRenderer`] renders plans into [`Statement`]s for a [`Dialect`].
//! 5. [`PageRequest`] normalizes `offset`/`limit` and derives [`PageInfo`].
//!
//! Nothing in this crate performs I/O.

mod filter_parser;
mod overlay;
mod pagination;
mod plan;
mod projection;
mod render;
mod resolve;
mod sort_parser;
mod value;

pub use filter_parser::{FilterParse, parse_filter, parse_filter_lenient};
pub use overlay::{EffectiveQuery, RequestParts, merge_fields, merge_filters, merge_sort, overlay};
pub use pagination::{PageInfo, PageRequest, PaginationConfig};
pub use plan::{
    Assignment, ColumnRef, CompareOp, CountPlan, DeletePlan, InsertPlan, KeyedAssignments,
    MatchKind, MutationPlan, OrderBy, PlanBuilder, Predicate, SelectPlan, UpdatePlan,
};
pub use projection::{parse_fields, resolve_projection};
pub use render::{Dialect, SqlRenderer, Statement};
pub use resolve::{FieldResolver, Scope};
pub use sort_parser::parse_sort;
pub use value::SqlValue;
