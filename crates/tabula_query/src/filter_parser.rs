//! Recursive-descent parser for the `where` filter language.
//!
//! ```text
//! expr       := and_expr ("~or" and_expr)*
//! and_expr   := unary ("~and" unary)*
//! unary      := "~not" unary | primary
//! primary    := "(" expr ")" | comparison
//! comparison := "(" field "," op ["," value] ")"
//! ```
//!
//! `~and` binds tighter than `~or`; runs of the same connective associate left
//! to right and flatten into one group. A backslash escapes the next character.

use std::str::FromStr;
use tabula_core::{Comparison, ComparisonOp, FilterNode, FilterValue, LogicalOp};
use tabula_error::{QueryError, QueryErrorKind, QueryResult};
use tracing::warn;

/// Parses a filter expression strictly.
///
/// Blank input yields `Ok(None)`.
pub fn parse_filter(input: &str) -> QueryResult<Option<FilterNode>> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if parser.at_end() {
        return Ok(None);
    }
    let node = parser.parse_or()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(Some(node))
}

/// Outcome of a lenient parse: whatever survived plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct FilterParse {
    /// Filter built from the well-formed clauses
    pub filter: Option<FilterNode>,
    /// One error per dropped top-level clause
    pub errors: Vec<QueryError>,
}

/// Parses a filter expression, dropping malformed top-level clauses.
///
/// When the whole expression does not parse, it is split at top-level
/// `~and`/`~or` connectives and every segment is parsed on its own. Segments
/// that still fail are dropped and reported in [`FilterParse::errors`];
/// the rest are recombined with the original precedence.
pub fn parse_filter_lenient(input: &str) -> FilterParse {
    let first_error = match parse_filter(input) {
        Ok(filter) => {
            return FilterParse {
                filter,
                errors: Vec::new(),
            };
        }
        Err(e) => e,
    };

    let segments = split_top_level(input);
    if segments.len() <= 1 {
        warn!(error = %first_error, "Dropping malformed filter");
        return FilterParse {
            filter: None,
            errors: vec![first_error],
        };
    }

    let mut errors = Vec::new();
    let mut runs: Vec<Vec<FilterNode>> = Vec::new();
    for segment in segments {
        if segment.starts_run || runs.is_empty() {
            runs.push(Vec::new());
        }
        match parse_filter(segment.text) {
            Ok(Some(node)) => {
                if let Some(run) = runs.last_mut() {
                    run.push(node);
                }
            }
            Ok(None) => {
                errors.push(QueryError::new(QueryErrorKind::MalformedFilterSyntax {
                    position: segment.offset,
                    message: "empty clause".to_string(),
                }));
            }
            Err(e) => {
                let (position, message) = match e.kind {
                    QueryErrorKind::MalformedFilterSyntax { position, message } => {
                        (segment.offset + position, message)
                    }
                    other => (segment.offset, other.to_string()),
                };
                errors.push(QueryError::new(QueryErrorKind::MalformedFilterSyntax {
                    position,
                    message,
                }));
            }
        }
    }

    for error in &errors {
        warn!(error = %error, "Dropping malformed filter clause");
    }

    let disjuncts: Vec<FilterNode> = runs
        .into_iter()
        .filter_map(|run| group(LogicalOp::And, run))
        .collect();
    FilterParse {
        filter: group(LogicalOp::Or, disjuncts),
        errors,
    }
}

fn group(op: LogicalOp, mut children: Vec<FilterNode>) -> Option<FilterNode> {
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(FilterNode::Group { op, children }),
    }
}

struct Segment<'a> {
    text: &'a str,
    offset: usize,
    /// Preceded by `~or`, so it opens a new conjunction
    starts_run: bool,
}

/// Splits at `~and`/`~or` outside parentheses, honouring escapes.
fn split_top_level(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    let mut starts_run = true;
    let mut escaped = false;
    let mut iter = input.char_indices().peekable();

    while let Some((i, ch)) = iter.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            '~' if depth == 0 => {
                let rest = &input[i + 1..];
                let connective = if starts_with_keyword(rest, "and") {
                    Some((LogicalOp::And, 3))
                } else if starts_with_keyword(rest, "or") {
                    Some((LogicalOp::Or, 2))
                } else {
                    None
                };
                if let Some((op, len)) = connective {
                    segments.push(Segment {
                        text: &input[start..i],
                        offset: start,
                        starts_run,
                    });
                    starts_run = op == LogicalOp::Or;
                    start = i + 1 + len;
                    for _ in 0..len {
                        iter.next();
                    }
                }
            }
            _ => {}
        }
    }
    segments.push(Segment {
        text: &input[start..],
        offset: start,
        starts_run,
    });
    segments
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.len() >= keyword.len()
        && text.is_char_boundary(keyword.len())
        && text[..keyword.len()].eq_ignore_ascii_case(keyword)
        && !text[keyword.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    #[track_caller]
    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::new(QueryErrorKind::MalformedFilterSyntax {
            position: self.offset(),
            message: message.into(),
        })
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = &self.input[self.offset()..];
        if rest.starts_with('~') && starts_with_keyword(&rest[1..], keyword) {
            self.pos += 1 + keyword.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> QueryResult<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_or(&mut self) -> QueryResult<FilterNode> {
        let mut children = vec![self.parse_and()?];
        while self.eat_keyword("or") {
            children.push(self.parse_and()?);
        }
        group(LogicalOp::Or, children).ok_or_else(|| self.error("empty expression"))
    }

    fn parse_and(&mut self) -> QueryResult<FilterNode> {
        let mut children = vec![self.parse_unary()?];
        while self.eat_keyword("and") {
            children.push(self.parse_unary()?);
        }
        group(LogicalOp::And, children).ok_or_else(|| self.error("empty expression"))
    }

    fn parse_unary(&mut self) -> QueryResult<FilterNode> {
        if self.eat_keyword("not") {
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> QueryResult<FilterNode> {
        self.expect('(')?;
        self.skip_ws();
        match self.peek() {
            Some('(') | Some('~') => {
                let inner = self.parse_or()?;
                self.expect(')')?;
                Ok(inner)
            }
            _ => self.parse_comparison().map(FilterNode::Comparison),
        }
    }

    /// Parses the body of a comparison; the opening parenthesis is consumed.
    fn parse_comparison(&mut self) -> QueryResult<Comparison> {
        let field_start = self.offset();
        let (field, terminator) = self.read_token(true)?;
        let field = field.trim().to_string();
        if field.is_empty() {
            return Err(QueryError::new(QueryErrorKind::MalformedFilterSyntax {
                position: field_start,
                message: "missing field name".to_string(),
            }));
        }
        if terminator == ')' {
            return Err(self.error("missing operator"));
        }

        let op_start = self.offset();
        let (op_text, terminator) = self.read_token(true)?;
        let op = ComparisonOp::from_str(op_text.trim()).map_err(|_| {
            QueryError::new(QueryErrorKind::MalformedFilterSyntax {
                position: op_start,
                message: format!("unknown operator '{}'", op_text.trim()),
            })
        })?;

        let value = if terminator == ')' {
            if !op.is_nullary() {
                return Err(self.error(format!("operator '{}' requires a value", op)));
            }
            FilterValue::None
        } else if op.takes_list() {
            let mut items = Vec::new();
            loop {
                let (item, terminator) = self.read_token(true)?;
                items.push(item);
                if terminator == ')' {
                    break;
                }
            }
            FilterValue::List(items)
        } else {
            let (value, _) = self.read_token(false)?;
            FilterValue::Single(value)
        };

        Ok(Comparison {
            field,
            op,
            value,
        })
    }

    /// Reads up to an unescaped `)` (or `,` when `stop_at_comma`), consuming
    /// the terminator and returning it alongside the unescaped text.
    fn read_token(&mut self, stop_at_comma: bool) -> QueryResult<(String, char)> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated comparison")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("dangling escape")),
                    }
                }
                Some(')') => {
                    self.pos += 1;
                    return Ok((out, ')'));
                }
                Some(',') if stop_at_comma => {
                    self.pos += 1;
                    return Ok((out, ','));
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(field: &str, op: ComparisonOp, value: &str) -> FilterNode {
        Comparison::new(field, op, value).into()
    }

    #[test]
    fn parses_single_comparison() {
        let tree = parse_filter("(Name,eq,Afghanistan)").unwrap().unwrap();
        assert_eq!(tree, cmp("Name", ComparisonOp::Eq, "Afghanistan"));
    }

    #[test]
    fn blank_input_is_no_filter() {
        assert_eq!(parse_filter("   ").unwrap(), None);
    }

    #[test]
    fn same_connective_flattens_left_to_right() {
        let tree = parse_filter("(A,eq,1)~and(B,eq,2)~and(C,eq,3)").unwrap().unwrap();
        match tree {
            FilterNode::Group { op, children } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(children.len(), 3);
                assert_eq!(children[2], cmp("C", ComparisonOp::Eq, "3"));
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let tree = parse_filter("(A,eq,1)~or(B,eq,2)~and(C,eq,3)").unwrap().unwrap();
        let expected = FilterNode::Group {
            op: LogicalOp::Or,
            children: vec![
                cmp("A", ComparisonOp::Eq, "1"),
                FilterNode::Group {
                    op: LogicalOp::And,
                    children: vec![cmp("B", ComparisonOp::Eq, "2"), cmp("C", ComparisonOp::Eq, "3")],
                },
            ],
        };
        assert_eq!(tree, expected);
    }

    #[test]
    fn explicit_grouping_overrides_precedence() {
        let tree = parse_filter("((A,eq,1)~or(B,eq,2))~and(C,eq,3)").unwrap().unwrap();
        match tree {
            FilterNode::Group { op, children } => {
                assert_eq!(op, LogicalOp::And);
                assert!(matches!(&children[0], FilterNode::Group { op: LogicalOp::Or, .. }));
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn not_prefix_negates_group() {
        let tree = parse_filter("~not((A,eq,1)~or(B,eq,2))").unwrap().unwrap();
        assert!(matches!(tree, FilterNode::Not(inner) if matches!(*inner, FilterNode::Group { .. })));
    }

    #[test]
    fn value_keeps_commas_and_spaces() {
        let tree = parse_filter("(Title, like, hello, world )").unwrap().unwrap();
        assert_eq!(tree, cmp("Title", ComparisonOp::Like, " hello, world "));
    }

    #[test]
    fn list_operators_split_values() {
        let tree = parse_filter("(Tags,anyof,red,gre\\,en)").unwrap().unwrap();
        assert_eq!(
            tree,
            Comparison::list("Tags", ComparisonOp::Anyof, ["red", "gre,en"]).into()
        );
    }

    #[test]
    fn nullary_operator_needs_no_value() {
        let tree = parse_filter("(Done,checked)").unwrap().unwrap();
        assert_eq!(tree, Comparison::nullary("Done", ComparisonOp::Checked).into());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tree = parse_filter("(A,EQ,1)~AND(B,Neq,2)").unwrap().unwrap();
        assert!(matches!(tree, FilterNode::Group { op: LogicalOp::And, .. }));
    }

    #[test]
    fn unknown_operator_is_malformed() {
        let err = parse_filter("(A,between,1)").unwrap_err();
        match err.kind {
            QueryErrorKind::MalformedFilterSyntax { position, message } => {
                assert_eq!(position, 3);
                assert!(message.contains("between"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_value_is_malformed() {
        assert!(parse_filter("(A,eq)").is_err());
    }

    #[test]
    fn unterminated_comparison_is_malformed() {
        assert!(parse_filter("(A,eq,1").is_err());
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        assert!(parse_filter("(A,eq,1) junk").is_err());
    }

    #[test]
    fn lenient_parse_drops_only_the_bad_clause() {
        let parsed = parse_filter_lenient("(A,eq,1)~and(B,bogus,2)~and(C,eq,3)");
        assert_eq!(parsed.errors.len(), 1);
        let expected = FilterNode::Group {
            op: LogicalOp::And,
            children: vec![cmp("A", ComparisonOp::Eq, "1"), cmp("C", ComparisonOp::Eq, "3")],
        };
        assert_eq!(parsed.filter, Some(expected));
    }

    #[test]
    fn lenient_parse_keeps_or_structure() {
        let parsed = parse_filter_lenient("(A,eq,1)~or(B,eq)~and(C,eq,3)");
        assert_eq!(parsed.errors.len(), 1);
        let expected = FilterNode::Group {
            op: LogicalOp::Or,
            children: vec![cmp("A", ComparisonOp::Eq, "1"), cmp("C", ComparisonOp::Eq, "3")],
        };
        assert_eq!(parsed.filter, Some(expected));
    }

    #[test]
    fn lenient_parse_of_garbage_yields_nothing() {
        let parsed = parse_filter_lenient("Name = 'x'");
        assert!(parsed.filter.is_none());
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn lenient_error_position_is_absolute() {
        let parsed = parse_filter_lenient("(A,eq,1)~and(B,zz,2)");
        match &parsed.errors[0].kind {
            QueryErrorKind::MalformedFilterSyntax { position, .. } => assert_eq!(*position, 15),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn canonical_form_round_trips() {
        let inputs = [
            "(Name,eq,Afghanistan)",
            "(A,eq,1)~or((B,gt,2)~and(C,like,x\\)y))",
            "~not((A,blank)~or(B,in,1,2,3))",
            "((A,eq,1)~and(B,eq,2))~and(C,eq,)",
        ];
        for input in inputs {
            let tree = parse_filter(input).unwrap().unwrap();
            let reparsed = parse_filter(&tree.to_string()).unwrap().unwrap();
            assert_eq!(tree, reparsed, "round trip of {}", input);
        }
    }
}
