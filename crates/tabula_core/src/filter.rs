//! Filter tree produced by the filter expression parser.
//!
//! The [`Display`](std::fmt::Display) impl renders the canonical textual form,
//! which parses back to an equal tree.

use serde::{Deserialize, Serialize};

/// Logical connective joining the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum LogicalOp {
    /// Every child must hold
    And,
    /// At least one child must hold
    Or,
}

/// Comparison operator of a single filter clause.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ComparisonOp {
    /// Equal
    Eq,
    /// Not equal (NULL counts as not equal)
    #[strum(to_string = "neq", serialize = "not", serialize = "ne")]
    Neq,
    /// Greater than
    Gt,
    /// Greater or equal
    #[strum(to_string = "ge", serialize = "gte")]
    Ge,
    /// Less than
    Lt,
    /// Less or equal
    #[strum(to_string = "le", serialize = "lte")]
    Le,
    /// Contains substring
    Like,
    /// Does not contain substring
    Nlike,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// `is null`, `is blank`, `is empty`
    Is,
    /// `isnot null`, `isnot blank`, `isnot empty`
    Isnot,
    /// NULL or empty string
    Blank,
    /// Neither NULL nor empty string
    Notblank,
    /// Checkbox is ticked
    Checked,
    /// Checkbox is not ticked
    Notchecked,
    /// Equal to one of a list
    In,
    /// Contains any of a list
    Anyof,
    /// Contains none of a list
    Nanyof,
    /// Contains all of a list
    Allof,
    /// Does not contain all of a list
    Nallof,
}

impl ComparisonOp {
    /// Operators that take no value: `(field,op)`.
    pub fn is_nullary(self) -> bool {
        matches!(
            self,
            ComparisonOp::Blank
                | ComparisonOp::Notblank
                | ComparisonOp::Checked
                | ComparisonOp::Notchecked
        )
    }

    /// Operators whose value is a comma separated list.
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            ComparisonOp::In
                | ComparisonOp::Anyof
                | ComparisonOp::Nanyof
                | ComparisonOp::Allof
                | ComparisonOp::Nallof
        )
    }
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// No operand
    #[default]
    None,
    /// Single literal
    Single(String),
    /// Literal list
    List(Vec<String>),
}

impl FilterValue {
    /// The single literal, if there is exactly one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            FilterValue::Single(s) => Some(s),
            FilterValue::List(items) if items.len() == 1 => Some(&items[0]),
            _ => None,
        }
    }

    /// All literals as a slice-like list.
    pub fn items(&self) -> Vec<&str> {
        match self {
            FilterValue::None => Vec::new(),
            FilterValue::Single(s) => vec![s.as_str()],
            FilterValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// One `(field, operator, literal)` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    /// Field reference (title, id or column name)
    pub field: String,
    /// Operator
    pub op: ComparisonOp,
    /// Operand
    #[serde(default)]
    pub value: FilterValue,
}

impl Comparison {
    /// Creates a comparison with a single literal.
    pub fn new(field: impl Into<String>, op: ComparisonOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: FilterValue::Single(value.into()),
        }
    }

    /// Creates a comparison without operand.
    pub fn nullary(field: impl Into<String>, op: ComparisonOp) -> Self {
        Self {
            field: field.into(),
            op,
            value: FilterValue::None,
        }
    }

    /// Creates a comparison against a literal list.
    pub fn list<I, S>(field: impl Into<String>, op: ComparisonOp, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            op,
            value: FilterValue::List(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    /// Leaf clause
    Comparison(Comparison),
    /// Logical combination of two or more children
    Group {
        /// Connective
        op: LogicalOp,
        /// Children, evaluated left to right
        children: Vec<FilterNode>,
    },
    /// Negation
    Not(Box<FilterNode>),
}

impl From<Comparison> for FilterNode {
    fn from(comparison: Comparison) -> Self {
        FilterNode::Comparison(comparison)
    }
}

impl FilterNode {
    /// Both `self` and `other` must hold.
    pub fn and(self, other: FilterNode) -> FilterNode {
        FilterNode::Group {
            op: LogicalOp::And,
            children: vec![self, other],
        }
    }

    /// Negates the node.
    pub fn negate(self) -> FilterNode {
        FilterNode::Not(Box::new(self))
    }

    /// Visits every comparison, depth first.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            FilterNode::Comparison(c) => out.push(c),
            FilterNode::Group { children, .. } => {
                children.iter().for_each(|c| c.collect_comparisons(out))
            }
            FilterNode::Not(inner) => inner.collect_comparisons(out),
        }
    }

    /// Drops every comparison for which `keep` returns false.
    ///
    /// Groups left with a single child collapse to that child; groups and
    /// negations left empty disappear.
    pub fn retain<F>(self, keep: &mut F) -> Option<FilterNode>
    where
        F: FnMut(&Comparison) -> bool,
    {
        match self {
            FilterNode::Comparison(c) => keep(&c).then_some(FilterNode::Comparison(c)),
            FilterNode::Group { op, children } => {
                let mut kept: Vec<FilterNode> =
                    children.into_iter().filter_map(|c| c.retain(keep)).collect();
                match kept.len() {
                    0 => None,
                    1 => kept.pop(),
                    _ => Some(FilterNode::Group { op, children: kept }),
                }
            }
            FilterNode::Not(inner) => inner.retain(keep).map(FilterNode::negate),
        }
    }

    fn fmt_operand(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterNode::Comparison(_) => write!(f, "{}", self),
            _ => write!(f, "({})", self),
        }
    }
}

fn write_escaped(f: &mut std::fmt::Formatter<'_>, text: &str, escape_comma: bool) -> std::fmt::Result {
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' | '~' => write!(f, "\\{}", ch)?,
            ',' if escape_comma => f.write_str("\\,")?,
            _ => write!(f, "{}", ch)?,
        }
    }
    Ok(())
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        write_escaped(f, &self.field, true)?;
        write!(f, ",{}", self.op)?;
        match &self.value {
            FilterValue::None => {}
            FilterValue::Single(value) => {
                f.write_str(",")?;
                write_escaped(f, value, false)?;
            }
            FilterValue::List(items) => {
                f.write_str(",")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_escaped(f, item, true)?;
                }
            }
        }
        f.write_str(")")
    }
}

impl std::fmt::Display for FilterNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterNode::Comparison(c) => write!(f, "{}", c),
            FilterNode::Group { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "~{}", op)?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
            FilterNode::Not(inner) => {
                f.write_str("~not")?;
                inner.fmt_operand(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn operator_aliases_parse_to_canonical() {
        assert_eq!(ComparisonOp::from_str("not").unwrap(), ComparisonOp::Neq);
        assert_eq!(ComparisonOp::from_str("GTE").unwrap(), ComparisonOp::Ge);
        assert_eq!(ComparisonOp::Neq.to_string(), "neq");
    }

    #[test]
    fn display_wraps_nested_groups() {
        let tree = FilterNode::Group {
            op: LogicalOp::Or,
            children: vec![
                Comparison::new("Name", ComparisonOp::Eq, "Kabul").into(),
                FilterNode::Group {
                    op: LogicalOp::And,
                    children: vec![
                        Comparison::new("Pop", ComparisonOp::Gt, "10").into(),
                        Comparison::nullary("Capital", ComparisonOp::Checked).into(),
                    ],
                },
            ],
        };
        assert_eq!(
            tree.to_string(),
            "(Name,eq,Kabul)~or((Pop,gt,10)~and(Capital,checked))"
        );
    }

    #[test]
    fn display_escapes_structural_characters() {
        let c = Comparison::list("Tags, misc", ComparisonOp::Anyof, ["a,b", "(c)"]);
        assert_eq!(c.to_string(), "(Tags\\, misc,anyof,a\\,b,\\(c\\))");
    }

    #[test]
    fn retain_collapses_single_child_groups() {
        let tree = FilterNode::from(Comparison::new("A", ComparisonOp::Eq, "1"))
            .and(Comparison::new("B", ComparisonOp::Eq, "2").into());
        let pruned = tree.retain(&mut |c| c.field == "A").unwrap();
        assert_eq!(pruned, Comparison::new("A", ComparisonOp::Eq, "1").into());
    }

    #[test]
    fn retain_drops_negation_of_removed_clause() {
        let tree = FilterNode::from(Comparison::new("A", ComparisonOp::Eq, "1")).negate();
        assert!(tree.retain(&mut |_| false).is_none());
    }
}
