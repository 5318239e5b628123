use std::{fmt, ops::Range};

use crate::{Identity, Lexer, StatementKind, TokenKind, sql_literal};

/// Catalog relation an existence predicate consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Policies,
    Columns,
}

impl Catalog {
    #[must_use]
    pub const fn for_kind(kind: StatementKind) -> Option<Self> {
        match kind {
            StatementKind::CreatePolicy => Some(Self::Policies),
            StatementKind::AddColumn => Some(Self::Columns),
            _ => None,
        }
    }

    #[must_use]
    pub const fn kind(self) -> StatementKind {
        match self {
            Self::Policies => StatementKind::CreatePolicy,
            Self::Columns => StatementKind::AddColumn,
        }
    }

    #[must_use]
    pub const fn relation(self) -> &'static str {
        match self {
            Self::Policies => "pg_policies",
            Self::Columns => "information_schema.columns",
        }
    }

    #[must_use]
    pub const fn schema_column(self) -> &'static str {
        match self {
            Self::Policies => "schemaname",
            Self::Columns => "table_schema",
        }
    }

    #[must_use]
    pub const fn table_column(self) -> &'static str {
        match self {
            Self::Policies => "tablename",
            Self::Columns => "table_name",
        }
    }

    #[must_use]
    pub const fn name_column(self) -> &'static str {
        match self {
            Self::Policies => "policyname",
            Self::Columns => "column_name",
        }
    }

    fn is_name_column(self, column: &str) -> bool {
        column == self.name_column() || (self == Self::Policies && column == "polname")
    }

    fn from_relation(relation: &str) -> Option<Self> {
        match relation {
            "pg_policies" | "pg_catalog.pg_policies" => Some(Self::Policies),
            "information_schema.columns" => Some(Self::Columns),
            _ => None,
        }
    }
}

/// The catalog values an existence predicate compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardKey {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
}

impl GuardKey {
    /// Key of the object a policy or column identity creates.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Option<Self> {
        let (table, name) = match identity {
            Identity::Policy { name, table } => (table, name),
            Identity::Column { table, column } => (table, column),
            Identity::Object(_) | Identity::Trigger { .. } => return None,
        };

        Some(Self {
            schema: table.schema.as_ref().map(|schema| schema.catalog_name()),
            table: table.name.catalog_name(),
            name: name.catalog_name(),
        })
    }

    /// `true` when `self`, read from a predicate, checks for `created`.
    /// A schema is only compared when the creation clause names one.
    #[must_use]
    pub fn checks_for(&self, created: &GuardKey) -> bool {
        let schema_matches = match &created.schema {
            Some(schema) => self.schema.as_ref() == Some(schema),
            None => true,
        };
        schema_matches && self.table == created.table && self.name == created.name
    }
}

impl fmt::Display for GuardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' on ", self.name)?;
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        f.write_str(&self.table)
    }
}

/// One `column = 'literal'` comparison inside a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateTerm {
    /// Lower-cased column name without any alias qualifier.
    pub column: String,
    pub column_span: Range<usize>,
    pub literal: String,
    pub literal_span: Range<usize>,
}

/// The parenthesized query of an `IF NOT EXISTS (...)` guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPredicate {
    pub catalog: Catalog,
    /// Byte range between the guard's parentheses.
    pub span: Range<usize>,
    pub terms: Vec<PredicateTerm>,
}

impl GuardPredicate {
    /// Parses the predicate text at `span`. Returns `None` unless the query
    /// reads a known catalog and compares the object name against a literal.
    #[must_use]
    pub fn parse(source: &str, span: Range<usize>) -> Option<Self> {
        let tokens: Vec<_> = Lexer::within(source, span.clone()).collect();

        let from = tokens
            .iter()
            .position(|token| token.is_keyword(source, "FROM"))?;
        let mut parts = Vec::new();
        let mut cursor = from + 1;
        loop {
            parts.push(tokens.get(cursor)?.ident(source)?.catalog_name());
            if tokens
                .get(cursor + 1)
                .is_some_and(|token| token.kind == TokenKind::Dot)
            {
                cursor += 2;
            } else {
                break;
            }
        }
        let catalog = Catalog::from_relation(&parts.join("."))?;

        let mut terms = Vec::new();
        for window in tokens.windows(3) {
            let [column, equals, literal] = window else {
                continue;
            };
            if column.kind != TokenKind::Word
                || !equals.is_symbol(source, "=")
                || literal.kind != TokenKind::String
            {
                continue;
            }
            let Some(value) = literal.string_value(source) else {
                continue;
            };
            terms.push(PredicateTerm {
                column: column.text(source).to_ascii_lowercase(),
                column_span: column.span(),
                literal: value,
                literal_span: literal.span(),
            });
        }

        let predicate = Self {
            catalog,
            span,
            terms,
        };
        predicate.name_term()?;
        Some(predicate)
    }

    #[must_use]
    pub fn name_term(&self) -> Option<&PredicateTerm> {
        self.terms
            .iter()
            .find(|term| self.catalog.is_name_column(&term.column))
    }

    #[must_use]
    pub fn table_term(&self) -> Option<&PredicateTerm> {
        self.find_term(self.catalog.table_column())
    }

    #[must_use]
    pub fn schema_term(&self) -> Option<&PredicateTerm> {
        self.find_term(self.catalog.schema_column())
    }

    fn find_term(&self, column: &str) -> Option<&PredicateTerm> {
        self.terms.iter().find(|term| term.column == column)
    }

    /// The key this predicate currently checks. A missing table term reads
    /// as an empty table name so it never matches a real creation clause.
    #[must_use]
    pub fn key(&self) -> Option<GuardKey> {
        let name = self.name_term()?;
        Some(GuardKey {
            schema: self.schema_term().map(|term| term.literal.clone()),
            table: self
                .table_term()
                .map(|term| term.literal.clone())
                .unwrap_or_default(),
            name: name.literal.clone(),
        })
    }

    /// Shifts every recorded offset by `delta` bytes.
    #[must_use]
    pub fn relocated(mut self, delta: isize) -> Self {
        self.span = shift(&self.span, delta);
        for term in &mut self.terms {
            term.column_span = shift(&term.column_span, delta);
            term.literal_span = shift(&term.literal_span, delta);
        }
        self
    }
}

fn shift(range: &Range<usize>, delta: isize) -> Range<usize> {
    range.start.saturating_add_signed(delta)..range.end.saturating_add_signed(delta)
}

/// Renders the `WHERE` condition for `key` against `catalog`.
#[must_use]
pub fn render_condition(catalog: Catalog, key: &GuardKey) -> String {
    let mut terms = Vec::with_capacity(3);
    if let Some(schema) = &key.schema {
        terms.push(format!("{} = {}", catalog.schema_column(), sql_literal(schema)));
    }
    terms.push(format!("{} = {}", catalog.table_column(), sql_literal(&key.table)));
    terms.push(format!("{} = {}", catalog.name_column(), sql_literal(&key.name)));
    format!("({})", terms.join(" AND "))
}

/// An emitted existence-checked block with the offsets the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub text: String,
    pub predicate: Range<usize>,
    pub inner: Range<usize>,
}

/// Wraps `statement` in a `DO` block that runs it only when `key` is absent
/// from `catalog`.
#[must_use]
pub fn render_block(catalog: Catalog, key: &GuardKey, statement: &str, indent: &str) -> RenderedBlock {
    let tag = dollar_tag_for(statement);
    let mut text = String::with_capacity(statement.len() + 160);

    text.push_str("DO ");
    text.push_str(&tag);
    text.push_str("\nBEGIN\n");
    text.push_str(indent);
    text.push_str("IF NOT EXISTS (");

    let predicate_start = text.len();
    text.push('\n');
    push_indented(&mut text, indent, 2, "SELECT 1 FROM ");
    text.push_str(catalog.relation());
    text.push('\n');
    push_indented(&mut text, indent, 2, "WHERE ");
    text.push_str(&render_condition(catalog, key));
    text.push('\n');
    text.push_str(indent);
    let predicate_end = text.len();

    text.push_str(") THEN\n");
    push_indented(&mut text, indent, 2, "");
    let inner_start = text.len();
    text.push_str(statement);
    let inner_end = text.len();
    text.push('\n');

    text.push_str(indent);
    text.push_str("END IF;\nEND ");
    text.push_str(&tag);
    text.push(';');

    RenderedBlock {
        text,
        predicate: predicate_start..predicate_end,
        inner: inner_start..inner_end,
    }
}

fn push_indented(text: &mut String, indent: &str, level: usize, content: &str) {
    for _ in 0..level {
        text.push_str(indent);
    }
    text.push_str(content);
}

/// `$$` unless the wrapped text already contains it, then the first free
/// `$guard$`, `$guard1$`, ... tag.
fn dollar_tag_for(statement: &str) -> String {
    if !statement.contains("$$") {
        return "$$".to_string();
    }

    let mut suffix = 0_usize;
    loop {
        let tag = if suffix == 0 {
            "$guard$".to_string()
        } else {
            format!("$guard{suffix}$")
        };
        if !statement.contains(&tag) {
            return tag;
        }
        suffix += 1;
    }
}
