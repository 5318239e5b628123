use std::ops::Range;

use crate::{
    Catalog, GuardKey, Identity, Lexer, RewriteConfig, StatementForm, StatementKind,
    StatementRecord, Token, TokenKind, render_block,
};

/// How a statement is made safe to run more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Native `IF NOT EXISTS`.
    InlineIfNotExists,
    /// `DROP ... IF EXISTS` right before the creation.
    DropThenCreate,
    /// A `DO` block that consults the catalog first.
    ExistenceCheckedBlock,
    /// `CREATE OR REPLACE`.
    OrReplace,
    /// Left alone because its kind is disabled.
    Passthrough,
}

impl Strategy {
    #[must_use]
    pub const fn for_kind(kind: StatementKind) -> Self {
        match kind {
            StatementKind::CreateTable | StatementKind::CreateIndex => Self::InlineIfNotExists,
            StatementKind::CreateTrigger => Self::DropThenCreate,
            StatementKind::CreatePolicy | StatementKind::AddColumn => Self::ExistenceCheckedBlock,
            StatementKind::FunctionDefinition => Self::OrReplace,
        }
    }
}

/// Offsets of an existence-checked block within [`GuardedStatement::text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    /// Between the parentheses of `IF NOT EXISTS (...)`.
    pub predicate: Range<usize>,
    /// The wrapped statement, terminator included.
    pub inner: Range<usize>,
}

/// Idempotent replacement for one statement span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedStatement {
    pub kind: StatementKind,
    pub strategy: Strategy,
    /// Catalog key the guard checks; only existence-checked blocks carry one.
    pub guard_key: Option<GuardKey>,
    pub text: String,
    pub block: Option<BlockLayout>,
}

impl GuardedStatement {
    fn unchanged(record: &StatementRecord, source: &str, strategy: Strategy) -> Self {
        Self {
            kind: record.kind,
            strategy,
            guard_key: None,
            text: record.text(source).to_string(),
            block: None,
        }
    }
}

/// Chooses and applies the idempotency strategy for scanned statements.
pub struct Synthesizer<'c> {
    config: &'c RewriteConfig,
}

impl<'c> Synthesizer<'c> {
    #[must_use]
    pub const fn new(config: &'c RewriteConfig) -> Self {
        Self { config }
    }

    /// Returns the guarded form of `record`. Statements already in a
    /// re-runnable form come back with their original text.
    #[must_use]
    pub fn synthesize(&self, source: &str, record: &StatementRecord) -> GuardedStatement {
        if !self.config.guards(record.kind) {
            return GuardedStatement::unchanged(record, source, Strategy::Passthrough);
        }
        if record.kind == StatementKind::FunctionDefinition {
            return self.function_definition(source, record);
        }

        match &record.form {
            StatementForm::Native => {
                GuardedStatement::unchanged(record, source, native_strategy(record.kind))
            }
            StatementForm::DropGuarded => {
                GuardedStatement::unchanged(record, source, Strategy::DropThenCreate)
            }
            StatementForm::GuardBlock(guard) => {
                let offset = record.span.start;
                let mut text = record.text(source).to_string();
                if let Some(trailer) = &guard.trailer {
                    text.replace_range(relative(&trailer.range, offset), &trailer.replacement);
                }
                GuardedStatement {
                    kind: record.kind,
                    strategy: Strategy::ExistenceCheckedBlock,
                    guard_key: guard.predicate.key(),
                    text,
                    block: Some(BlockLayout {
                        predicate: relative(&guard.predicate.span, offset),
                        inner: relative(&guard.inner, offset),
                    }),
                }
            }
            StatementForm::Bare => self.guard_bare(source, record),
        }
    }

    fn guard_bare(&self, source: &str, record: &StatementRecord) -> GuardedStatement {
        let original = record.text(source);
        if !record.column_anchors.is_empty() {
            return inline_if_not_exists(record, original, &record.column_anchors);
        }
        let strategy = Strategy::for_kind(record.kind);

        match strategy {
            Strategy::InlineIfNotExists => inline_if_not_exists(record, original, &[record.anchor]),
            Strategy::DropThenCreate => {
                let Identity::Trigger { name, table } = &record.identity else {
                    return GuardedStatement::unchanged(record, source, Strategy::Passthrough);
                };
                GuardedStatement {
                    kind: record.kind,
                    strategy,
                    guard_key: None,
                    text: format!("DROP TRIGGER IF EXISTS {name} ON {table};\n{original}"),
                    block: None,
                }
            }
            Strategy::ExistenceCheckedBlock => {
                let (Some(catalog), Some(key)) = (
                    Catalog::for_kind(record.kind),
                    GuardKey::from_identity(&record.identity),
                ) else {
                    return GuardedStatement::unchanged(record, source, Strategy::Passthrough);
                };
                let block = render_block(catalog, &key, original, &self.config.indent_unit());
                GuardedStatement {
                    kind: record.kind,
                    strategy,
                    guard_key: Some(key),
                    text: block.text,
                    block: Some(BlockLayout {
                        predicate: block.predicate,
                        inner: block.inner,
                    }),
                }
            }
            Strategy::OrReplace | Strategy::Passthrough => {
                GuardedStatement::unchanged(record, source, strategy)
            }
        }
    }

    fn function_definition(&self, source: &str, record: &StatementRecord) -> GuardedStatement {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        let bare = record.form.is_bare();

        if self.config.functions && bare {
            edits.push((record.anchor..record.anchor, " OR REPLACE".to_string()));
        }
        if self.config.repair_function_bodies
            && record.language.as_deref() == Some("plpgsql")
            && let Some(body) = repair_plpgsql_body(source, record.body.clone())
        {
            edits.push((record.body.clone(), body));
        }

        let strategy = if bare && !self.config.functions {
            Strategy::Passthrough
        } else {
            Strategy::OrReplace
        };

        let original = record.text(source);
        let mut text = String::with_capacity(original.len() + 32);
        let mut cursor = record.span.start;
        for (range, replacement) in edits {
            text.push_str(&source[cursor..range.start]);
            text.push_str(&replacement);
            cursor = range.end;
        }
        text.push_str(&source[cursor..record.span.end]);

        GuardedStatement {
            kind: record.kind,
            strategy,
            guard_key: None,
            text,
            block: None,
        }
    }
}

/// Inserts `IF NOT EXISTS ` before each absolute `anchors` offset.
fn inline_if_not_exists(
    record: &StatementRecord,
    original: &str,
    anchors: &[usize],
) -> GuardedStatement {
    let mut text = String::with_capacity(original.len() + 14 * anchors.len());
    let mut cursor = 0;
    for anchor in anchors {
        let anchor = anchor - record.span.start;
        text.push_str(&original[cursor..anchor]);
        text.push_str("IF NOT EXISTS ");
        cursor = anchor;
    }
    text.push_str(&original[cursor..]);
    GuardedStatement {
        kind: record.kind,
        strategy: Strategy::InlineIfNotExists,
        guard_key: None,
        text,
        block: None,
    }
}

const fn native_strategy(kind: StatementKind) -> Strategy {
    match kind {
        StatementKind::CreateTrigger | StatementKind::FunctionDefinition => Strategy::OrReplace,
        _ => Strategy::InlineIfNotExists,
    }
}

fn relative(range: &Range<usize>, offset: usize) -> Range<usize> {
    range.start - offset..range.end - offset
}

/// Returns a replacement for a plpgsql body that lacks its `BEGIN` or its
/// closing `END`, or `None` when the body is complete or cannot be fixed
/// mechanically.
fn repair_plpgsql_body(source: &str, body: Range<usize>) -> Option<String> {
    let text = &source[body.clone()];
    let tokens: Vec<_> = Lexer::within(source, body).collect();
    let first = tokens.first()?;

    let opens_block = first.is_keyword(source, "DECLARE")
        || first.is_keyword(source, "BEGIN")
        || first.is_symbol(source, "<");
    if !opens_block {
        let content = text.trim_start_matches(['\r', '\n']).trim_end();
        if closes_with_end(source, &tokens) {
            return Some(format!("\nBEGIN\n{content}\n"));
        }
        return Some(format!("\nBEGIN\n{content}\nEND;\n"));
    }

    if !tokens.iter().any(|token| token.is_keyword(source, "BEGIN")) {
        return None;
    }
    if closes_with_end(source, &tokens) {
        return None;
    }
    Some(format!("{}\nEND;\n", text.trim_end()))
}

fn closes_with_end(source: &str, tokens: &[Token]) -> bool {
    let tokens = match tokens.split_last() {
        Some((last, rest)) if last.kind == TokenKind::Semicolon => rest,
        _ => tokens,
    };
    match tokens {
        [.., last] if last.is_keyword(source, "END") => true,
        [.., end, label] => {
            end.is_keyword(source, "END")
                && label.kind == TokenKind::Word
                && !["IF", "LOOP", "CASE"]
                    .iter()
                    .any(|keyword| label.is_keyword(source, keyword))
        }
        _ => false,
    }
}
