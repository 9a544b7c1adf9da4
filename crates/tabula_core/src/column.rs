//! Column metadata.

use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Semantic type of a column.
///
/// The semantic type decides which filter operators apply and how literals
/// are coerced before they are bound.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColumnType {
    /// Auto-generated row identifier
    Id,
    /// Single-line text
    #[default]
    Text,
    /// Multi-line text
    LongText,
    /// Email address
    Email,
    /// URL
    Url,
    /// Integer number
    Number,
    /// Fractional number
    Decimal,
    /// Boolean flag
    Checkbox,
    /// Calendar date
    Date,
    /// Date and time
    DateTime,
    /// One option from a fixed list
    SingleSelect,
    /// Several options from a fixed list, stored comma separated
    MultiSelect,
    /// Arbitrary JSON document
    Json,
    /// Attached files, stored as JSON
    Attachment,
    /// Relation to another table (no backing column)
    Link,
    /// Value looked up through a relation (no backing column)
    Lookup,
    /// Aggregate over a relation (no backing column)
    Rollup,
    /// Computed expression (no backing column)
    Formula,
}

impl ColumnType {
    /// Virtual columns are computed by the metadata layer and have no
    /// physical column to select, filter or sort on.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            ColumnType::Link | ColumnType::Lookup | ColumnType::Rollup | ColumnType::Formula
        )
    }

    /// Free text columns support substring matching and blank checks.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ColumnType::Text | ColumnType::LongText | ColumnType::Email | ColumnType::Url
        )
    }

    /// Numeric columns bind numeric literals.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Id | ColumnType::Number | ColumnType::Decimal)
    }

    /// Temporal columns bind date or timestamp literals.
    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }

    /// Column values have a meaningful total order.
    pub fn is_orderable(self) -> bool {
        self.is_numeric() || self.is_temporal() || self.is_textual() || self == ColumnType::SingleSelect
    }
}

/// One selectable option of a select column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct SelectOption {
    /// Stored value
    title: String,
    /// Display position
    #[serde(default)]
    order: u32,
}

impl SelectOption {
    /// Creates a new option.
    pub fn new(title: impl Into<String>, order: u32) -> Self {
        Self {
            title: title.into(),
            order,
        }
    }
}

/// A column of a user-defined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct Column {
    /// Stable identifier
    id: String,
    /// Display title, unique within the table
    title: String,
    /// Physical column name in the backing store
    column_name: String,
    /// Semantic type
    #[serde(rename = "type", default)]
    #[builder(default)]
    column_type: ColumnType,
    /// Whether this column is the primary key
    #[serde(default)]
    #[builder(default)]
    primary_key: bool,
    /// Whether the backing store generates the value on insert
    #[serde(default)]
    #[builder(default)]
    auto_increment: bool,
    /// Whether NULL is allowed
    #[serde(default = "default_nullable")]
    #[builder(default = "true")]
    nullable: bool,
    /// Default value expression, as declared
    #[serde(default, rename = "default")]
    #[builder(default, setter(into, strip_option))]
    default_value: Option<String>,
    /// Options of select columns
    #[serde(default)]
    #[builder(default)]
    options: Vec<SelectOption>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Starts building a column.
    pub fn builder() -> ColumnBuilder {
        ColumnBuilder::default()
    }

    /// Whether the column has a physical backing column.
    pub fn is_physical(&self) -> bool {
        !self.column_type.is_virtual()
    }

    /// Whether clients may write this column.
    pub fn is_writable(&self) -> bool {
        self.is_physical() && !self.auto_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn column_type_round_trips_through_strings() {
        assert_eq!(ColumnType::SingleSelect.to_string(), "single_select");
        assert_eq!(ColumnType::from_str("date_time").unwrap(), ColumnType::DateTime);
    }

    #[test]
    fn virtual_columns_are_not_writable() {
        let column = Column::builder()
            .id("c1")
            .title("Orders")
            .column_name("orders")
            .column_type(ColumnType::Link)
            .build()
            .unwrap();
        assert!(!column.is_physical());
        assert!(!column.is_writable());
    }

    #[test]
    fn builder_defaults_to_nullable_text() {
        let column = Column::builder()
            .id("c1")
            .title("Name")
            .column_name("name")
            .build()
            .unwrap();
        assert_eq!(*column.column_type(), ColumnType::Text);
        assert!(*column.nullable());
        assert!(!*column.primary_key());
    }
}
