use std::{fmt, ops::Range};

use crate::{GuardPredicate, Ident, QualifiedName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    CreateTable,
    CreateIndex,
    CreateTrigger,
    CreatePolicy,
    AddColumn,
    FunctionDefinition,
}

impl StatementKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateTable => "CREATE TABLE",
            Self::CreateIndex => "CREATE INDEX",
            Self::CreateTrigger => "CREATE TRIGGER",
            Self::CreatePolicy => "CREATE POLICY",
            Self::AddColumn => "ALTER TABLE ... ADD COLUMN",
            Self::FunctionDefinition => "CREATE FUNCTION",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-specific identity of the object a statement creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Tables, indexes and functions.
    Object(QualifiedName),
    Trigger { name: Ident, table: QualifiedName },
    Policy { name: Ident, table: QualifiedName },
    Column { table: QualifiedName, column: Ident },
}

impl Identity {
    #[must_use]
    pub fn same_object(&self, other: &Identity) -> bool {
        match (self, other) {
            (Self::Object(left), Self::Object(right)) => left.same_object(right),
            (
                Self::Trigger { name, table },
                Self::Trigger {
                    name: other_name,
                    table: other_table,
                },
            )
            | (
                Self::Policy { name, table },
                Self::Policy {
                    name: other_name,
                    table: other_table,
                },
            ) => name.same_object(other_name) && table.same_object(other_table),
            (
                Self::Column { table, column },
                Self::Column {
                    table: other_table,
                    column: other_column,
                },
            ) => column.same_object(other_column) && table.same_object(other_table),
            _ => false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(name) => write!(f, "{name}"),
            Self::Trigger { name, table } | Self::Policy { name, table } => {
                write!(f, "{name} ON {table}")
            }
            Self::Column { table, column } => write!(f, "{table}.{column}"),
        }
    }
}

/// How far a recognized statement already is from its re-runnable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementForm {
    /// Written as a plain, unconditional statement.
    Bare,
    /// Carries `IF NOT EXISTS` or `OR REPLACE` already.
    Native,
    /// Preceded by a matching `DROP ... IF EXISTS`, which the span includes.
    DropGuarded,
    /// Wrapped in a `DO` block that checks the catalog first.
    GuardBlock(GuardBlock),
}

impl StatementForm {
    #[must_use]
    pub fn is_bare(&self) -> bool {
        matches!(self, Self::Bare)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardBlock {
    pub predicate: GuardPredicate,
    /// Absolute range of the wrapped statement, terminator included.
    pub inner: Range<usize>,
    /// Set when the block does not close its `IF` exactly once.
    pub trailer: Option<TrailerRepair>,
}

/// Edit restoring the single `END IF;` after a guarded statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerRepair {
    /// Absolute range to replace; always after the wrapped statement.
    pub range: Range<usize>,
    pub replacement: String,
}

/// A located statement span in a migration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    pub kind: StatementKind,
    /// Half-open byte range, terminator included.
    pub span: Range<usize>,
    pub identity: Identity,
    pub form: StatementForm,
    /// Absolute offset where an inline guard clause is inserted: the object
    /// name for tables and indexes, the end of `CREATE` for functions.
    pub anchor: usize,
    /// Clause text after the identifying names, terminator excluded. For
    /// functions this is the content of the dollar-quoted body, if any.
    pub body: Range<usize>,
    /// Lower-cased `LANGUAGE` of a function definition.
    pub language: Option<String>,
    /// Absolute offsets of the unguarded column names of an `ALTER TABLE`
    /// that adds several columns; empty otherwise.
    pub column_anchors: Vec<usize>,
}

impl StatementRecord {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    #[must_use]
    pub fn body_text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.body.clone()]
    }
}
