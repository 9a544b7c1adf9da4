//! SQL rendering of query plans.
//!
//! Every literal from a request is bound as a parameter; only identifiers
//! (quoted), limits and fixed keywords are written into the SQL text.

use crate::plan::{
    CountPlan, DeletePlan, InsertPlan, MatchKind, MutationPlan, Predicate, SelectPlan, UpdatePlan,
};
use crate::{CompareOp, ColumnRef, SqlValue};
use serde::{Deserialize, Serialize};
use tabula_core::SortDirection;

/// SQL dialect of the backing store.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dialect {
    /// PostgreSQL
    #[default]
    #[serde(alias = "postgresql")]
    #[strum(to_string = "postgres", serialize = "postgresql")]
    Postgres,
    /// MySQL / MariaDB
    Mysql,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Quotes an identifier, doubling embedded quote characters.
    pub fn quote(self, ident: &str) -> String {
        let q = match self {
            Dialect::Mysql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        };
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// Placeholder for the `n`th (1-based) bound parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Whether `INSERT … RETURNING` is available.
    pub fn supports_returning(self) -> bool {
        !matches!(self, Dialect::Mysql)
    }

    fn like(self, negated: bool) -> &'static str {
        match (self, negated) {
            (Dialect::Postgres, false) => "ILIKE",
            (Dialect::Postgres, true) => "NOT ILIKE",
            (_, false) => "LIKE",
            (_, true) => "NOT LIKE",
        }
    }

    /// MySQL and PostgreSQL already default to backslash.
    fn like_escape(self) -> &'static str {
        match self {
            Dialect::Sqlite => " ESCAPE '\\'",
            Dialect::Postgres | Dialect::Mysql => "",
        }
    }

    fn concat(self, parts: &[&str]) -> String {
        match self {
            Dialect::Mysql => format!("CONCAT({})", parts.join(", ")),
            Dialect::Postgres | Dialect::Sqlite => parts.join(" || "),
        }
    }
}

/// Rendered SQL with its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text
    pub sql: String,
    /// Parameters
    pub params: Vec<SqlValue>,
}

/// Escapes LIKE wildcards so `text` matches literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn like_pattern(kind: MatchKind, text: &str) -> String {
    let escaped = escape_like(text);
    match kind {
        MatchKind::Contains => format!("%{}%", escaped),
        MatchKind::Prefix => format!("{}%", escaped),
        MatchKind::Suffix => format!("%{}", escaped),
    }
}

struct Writer {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl Writer {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn ident(&mut self, name: &str) {
        let quoted = self.dialect.quote(name);
        self.sql.push_str(&quoted);
    }

    fn column(&mut self, column: &ColumnRef) {
        self.ident(column.name());
    }

    /// NULL is written inline so no untyped parameter is bound.
    fn bind(&mut self, value: SqlValue) {
        if value.is_null() {
            self.push("NULL");
            return;
        }
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.push(&placeholder);
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    fn joined<T>(&mut self, items: &[T], separator: &str, mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            each(self, item);
        }
    }

    fn where_clause(&mut self, filter: Option<&Predicate>) {
        if let Some(filter) = filter {
            self.push(" WHERE ");
            self.predicate(filter);
        }
    }

    fn or_null(&mut self, column: &ColumnRef) {
        self.push(" OR ");
        self.column(column);
        self.push(" IS NULL)");
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Compare { column, op, value } => {
                if *op == CompareOp::Neq {
                    self.push("(");
                    self.column(column);
                    self.push(" <> ");
                    self.bind(value.clone());
                    self.or_null(column);
                } else {
                    self.column(column);
                    self.push(&format!(" {} ", op));
                    self.bind(value.clone());
                }
            }
            Predicate::Match {
                column,
                kind,
                text,
                negated,
            } => {
                if *negated {
                    self.push("(");
                }
                self.column(column);
                self.push(&format!(" {} ", self.dialect.like(*negated)));
                self.bind(SqlValue::Text(like_pattern(*kind, text)));
                self.push(self.dialect.like_escape());
                if *negated {
                    self.or_null(column);
                }
            }
            Predicate::Null { column, negated } => {
                self.column(column);
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Blank { column, negated } => {
                self.push("(");
                self.column(column);
                if *negated {
                    self.push(" IS NOT NULL AND ");
                    self.column(column);
                    self.push(" <> '')");
                } else {
                    self.push(" IS NULL OR ");
                    self.column(column);
                    self.push(" = '')");
                }
            }
            Predicate::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.push(if *negated { "1 = 1" } else { "1 = 0" });
                    return;
                }
                if *negated {
                    self.push("(");
                }
                self.column(column);
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.joined(values, ", ", |w, v| w.bind(v.clone()));
                self.push(")");
                if *negated {
                    self.or_null(column);
                }
            }
            Predicate::Contains {
                column,
                items,
                all,
                negated,
            } => {
                if items.is_empty() {
                    self.push(if *all != *negated { "1 = 1" } else { "1 = 0" });
                    return;
                }
                let quoted = self.dialect.quote(column.name());
                let haystack = self.dialect.concat(&["','", &quoted, "','"]);
                if *negated {
                    self.push("(NOT ");
                }
                self.push("(");
                let separator = if *all { " AND " } else { " OR " };
                self.joined(items, separator, |w, item| {
                    w.push(&format!("{} LIKE ", haystack));
                    w.bind(SqlValue::Text(format!("%,{},%", escape_like(item))));
                    w.push(w.dialect.like_escape());
                });
                self.push(")");
                if *negated {
                    self.or_null(column);
                }
            }
            Predicate::All(children) if children.is_empty() => self.push("1 = 1"),
            Predicate::Any(children) if children.is_empty() => self.push("1 = 0"),
            Predicate::All(children) | Predicate::Any(children) => {
                let separator = if matches!(predicate, Predicate::All(_)) {
                    " AND "
                } else {
                    " OR "
                };
                self.push("(");
                self.joined(children, separator, |w, c| w.predicate(c));
                self.push(")");
            }
            Predicate::Not(inner) => {
                self.push("NOT (");
                self.predicate(inner);
                self.push(")");
            }
        }
    }
}

/// Renders plans for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRenderer {
    dialect: Dialect,
}

impl SqlRenderer {
    /// Renderer for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The target dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT … FROM … WHERE … ORDER BY … LIMIT … OFFSET …`
    pub fn select(&self, plan: &SelectPlan) -> Statement {
        let mut w = Writer::new(self.dialect);
        w.push("SELECT ");
        w.joined(plan.columns(), ", ", |w, c| {
            w.column(c);
            w.push(" AS ");
            w.ident(c.alias());
        });
        w.push(" FROM ");
        w.ident(plan.table());
        w.where_clause(plan.filter().as_ref());
        if !plan.order().is_empty() {
            w.push(" ORDER BY ");
            w.joined(plan.order(), ", ", |w, o| {
                w.column(&o.column);
                w.push(match o.direction {
                    SortDirection::Asc => " ASC",
                    SortDirection::Desc => " DESC",
                });
            });
        }
        if let Some(window) = plan.window() {
            w.push(&format!(" LIMIT {} OFFSET {}", window.limit(), window.offset()));
        }
        w.finish()
    }

    /// `SELECT COUNT(*) AS "count" FROM … WHERE …`
    pub fn count(&self, plan: &CountPlan) -> Statement {
        let mut w = Writer::new(self.dialect);
        w.push("SELECT COUNT(*) AS ");
        w.ident("count");
        w.push(" FROM ");
        w.ident(plan.table());
        w.where_clause(plan.filter().as_ref());
        w.finish()
    }

    /// One `INSERT` per record, returning the primary key where supported.
    pub fn insert(&self, plan: &InsertPlan) -> Vec<Statement> {
        plan.rows()
            .iter()
            .map(|row| {
                let mut w = Writer::new(self.dialect);
                w.push("INSERT INTO ");
                w.ident(plan.table());
                if row.is_empty() {
                    w.push(match self.dialect {
                        Dialect::Mysql => " () VALUES ()",
                        Dialect::Postgres | Dialect::Sqlite => " DEFAULT VALUES",
                    });
                } else {
                    w.push(" (");
                    w.joined(row, ", ", |w, a| w.column(&a.column));
                    w.push(") VALUES (");
                    w.joined(row, ", ", |w, a| w.bind(a.value.clone()));
                    w.push(")");
                }
                if self.dialect.supports_returning() {
                    w.push(" RETURNING ");
                    w.column(plan.primary_key());
                    w.push(" AS ");
                    w.ident(plan.primary_key().alias());
                }
                w.finish()
            })
            .collect()
    }

    /// One `UPDATE` per record with assignments; key-only records render nothing.
    pub fn update(&self, plan: &UpdatePlan) -> Vec<Statement> {
        plan.rows()
            .iter()
            .filter(|row| !row.assignments.is_empty())
            .map(|row| {
                let mut w = Writer::new(self.dialect);
                w.push("UPDATE ");
                w.ident(plan.table());
                w.push(" SET ");
                w.joined(&row.assignments, ", ", |w, a| {
                    w.column(&a.column);
                    w.push(" = ");
                    w.bind(a.value.clone());
                });
                w.push(" WHERE ");
                w.column(plan.primary_key());
                w.push(" = ");
                w.bind(row.key.clone());
                w.finish()
            })
            .collect()
    }

    /// One `DELETE` per key.
    pub fn delete(&self, plan: &DeletePlan) -> Vec<Statement> {
        plan.keys()
            .iter()
            .map(|key| {
                let mut w = Writer::new(self.dialect);
                w.push("DELETE FROM ");
                w.ident(plan.table());
                w.push(" WHERE ");
                w.column(plan.primary_key());
                w.push(" = ");
                w.bind(key.clone());
                w.finish()
            })
            .collect()
    }

    /// Statements of any mutation, in execution order.
    pub fn mutation(&self, plan: &MutationPlan) -> Vec<Statement> {
        match plan {
            MutationPlan::Insert(p) => self.insert(p),
            MutationPlan::Update(p) => self.update(p),
            MutationPlan::Delete(p) => self.delete(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EffectiveQuery, PageRequest, PaginationConfig, PlanBuilder, parse_filter};
    use serde_json::json;
    use std::str::FromStr;
    use tabula_core::{Column, ColumnType, SortEntry, Table};

    fn table() -> Table {
        let col = |title: &str, name: &str, ty: ColumnType| {
            Column::builder()
                .id(format!("c_{}", name))
                .title(title)
                .column_name(name)
                .column_type(ty)
                .build()
                .unwrap()
        };
        let pk = Column::builder()
            .id("c_id")
            .title("Id")
            .column_name("id")
            .column_type(ColumnType::Id)
            .primary_key(true)
            .auto_increment(true)
            .build()
            .unwrap();
        Table::builder()
            .id("t1")
            .base_id("b1")
            .title("Country")
            .table_name("country")
            .columns(vec![
                pk,
                col("Name", "name", ColumnType::Text),
                col("Population", "population", ColumnType::Number),
                col("Tags", "tags", ColumnType::MultiSelect),
                col("Odd \"Name\"", "odd\"name", ColumnType::Text),
            ])
            .build()
            .unwrap()
    }

    fn query(filter: &str, sort: Vec<SortEntry>) -> EffectiveQuery {
        EffectiveQuery {
            filter: parse_filter(filter).unwrap(),
            sort,
            ..Default::default()
        }
    }

    #[test]
    fn postgres_select_is_fully_parameterized() {
        let table = table();
        let builder = PlanBuilder::for_table(&table);
        let q = EffectiveQuery {
            fields: Some(vec!["Name".into(), "Population".into()]),
            ..query("(Name,eq,Nepal)~and(Population,gt,100)", vec![SortEntry::desc("Population")])
        };
        let page = PageRequest::new(200, 100, &PaginationConfig::default());
        let stmt = SqlRenderer::new(Dialect::Postgres).select(&builder.select(&q, Some(page)));
        assert_eq!(
            stmt.sql,
            "SELECT \"name\" AS \"Name\", \"population\" AS \"Population\" FROM \"country\" \
             WHERE (\"name\" = $1 AND \"population\" > $2) \
             ORDER BY \"population\" DESC, \"id\" ASC LIMIT 100 OFFSET 200"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("Nepal".into()), SqlValue::Int(100)]);
    }

    #[test]
    fn mysql_uses_backticks_and_question_marks() {
        let table = table();
        let plan = PlanBuilder::for_table(&table).count(&query("(Name,neq,x)", vec![]));
        let stmt = SqlRenderer::new(Dialect::Mysql).count(&plan);
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) AS `count` FROM `country` WHERE (`name` <> ? OR `name` IS NULL)"
        );
    }

    #[test]
    fn identifiers_double_embedded_quotes() {
        assert_eq!(Dialect::Postgres.quote("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(Dialect::Mysql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn like_wildcards_in_literals_are_escaped() {
        let table = table();
        let plan = PlanBuilder::for_table(&table).count(&query("(Name,like,50%_off)", vec![]));
        let stmt = SqlRenderer::new(Dialect::Sqlite).count(&plan);
        assert!(stmt.sql.ends_with("WHERE \"name\" LIKE ? ESCAPE '\\'"));
        assert_eq!(stmt.params, vec![SqlValue::Text("%50\\%\\_off%".into())]);

        let plan = PlanBuilder::for_table(&table).count(&query("(Name,sw,Ne)", vec![]));
        let stmt = SqlRenderer::new(Dialect::Postgres).count(&plan);
        assert!(stmt.sql.ends_with("WHERE \"name\" ILIKE $1"));
        assert_eq!(stmt.params, vec![SqlValue::Text("Ne%".into())]);
    }

    #[test]
    fn multi_select_containment_uses_delimited_match() {
        let table = table();
        let plan = PlanBuilder::for_table(&table).count(&query("(Tags,nanyof,a,b)", vec![]));
        let stmt = SqlRenderer::new(Dialect::Mysql).count(&plan);
        assert!(stmt.sql.ends_with(
            "WHERE (NOT (CONCAT(',', `tags`, ',') LIKE ? OR CONCAT(',', `tags`, ',') LIKE ?) OR `tags` IS NULL)"
        ));
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("%,a,%".into()), SqlValue::Text("%,b,%".into())]
        );
    }

    #[test]
    fn insert_returns_primary_key_per_record() {
        let table = table();
        let records = [json!({"Name": "Nepal", "Population": 30}), json!({})];
        let records: Vec<_> = records.iter().map(|r| r.as_object().cloned().unwrap()).collect();
        let plan = PlanBuilder::for_table(&table).insert(&records).unwrap();
        let stmts = SqlRenderer::new(Dialect::Postgres).insert(&plan);
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].sql,
            "INSERT INTO \"country\" (\"name\", \"population\") VALUES ($1, $2) RETURNING \"id\" AS \"Id\""
        );
        assert_eq!(stmts[1].sql, "INSERT INTO \"country\" DEFAULT VALUES RETURNING \"id\" AS \"Id\"");
    }

    #[test]
    fn null_assignment_is_written_inline() {
        let table = table();
        let records = vec![json!({"Id": 4, "Name": null}).as_object().cloned().unwrap()];
        let plan = PlanBuilder::for_table(&table).update(&records).unwrap();
        let stmts = SqlRenderer::new(Dialect::Postgres).update(&plan);
        assert_eq!(stmts[0].sql, "UPDATE \"country\" SET \"name\" = NULL WHERE \"id\" = $1");
        assert_eq!(stmts[0].params, vec![SqlValue::Int(4)]);
    }

    #[test]
    fn key_only_update_renders_nothing() {
        let table = table();
        let records = vec![json!({"Id": 4}).as_object().cloned().unwrap()];
        let plan = PlanBuilder::for_table(&table).update(&records).unwrap();
        assert!(SqlRenderer::new(Dialect::Sqlite).update(&plan).is_empty());
    }

    #[test]
    fn dialect_parses_from_config_strings() {
        assert_eq!(Dialect::from_str("PostgreSQL").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_str("sqlite").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
    }
}
