use serde::Deserialize;

use crate::{ConfigError, StatementKind};

const MAX_INDENT: usize = 16;

/// Selects which statement kinds are rewritten and how emitted guards look.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    pub tables: bool,
    pub indexes: bool,
    pub triggers: bool,
    pub policies: bool,
    pub columns: bool,
    /// Turns `CREATE FUNCTION` / `CREATE PROCEDURE` into `CREATE OR REPLACE`.
    pub functions: bool,
    /// Adds a missing `BEGIN` / `END;` to plpgsql bodies.
    pub repair_function_bodies: bool,
    pub normalize_whitespace: bool,
    /// Spaces per nesting level inside emitted `DO` blocks.
    pub indent: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            tables: true,
            indexes: true,
            triggers: true,
            policies: true,
            columns: true,
            functions: true,
            repair_function_bodies: true,
            normalize_whitespace: true,
            indent: 2,
        }
    }
}

impl RewriteConfig {
    #[must_use]
    pub fn guards(&self, kind: StatementKind) -> bool {
        match kind {
            StatementKind::CreateTable => self.tables,
            StatementKind::CreateIndex => self.indexes,
            StatementKind::CreateTrigger => self.triggers,
            StatementKind::CreatePolicy => self.policies,
            StatementKind::AddColumn => self.columns,
            StatementKind::FunctionDefinition => self.functions || self.repair_function_bodies,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indent > MAX_INDENT {
            return Err(ConfigError::IndentTooWide {
                actual: self.indent,
                max: MAX_INDENT,
            });
        }

        let any_enabled = self.tables
            || self.indexes
            || self.triggers
            || self.policies
            || self.columns
            || self.functions
            || self.repair_function_bodies;
        if !any_enabled {
            return Err(ConfigError::NothingEnabled);
        }

        Ok(())
    }

    pub(crate) fn indent_unit(&self) -> String {
        " ".repeat(self.indent)
    }
}
