mod batch;
mod config;
mod error;
mod guard;
mod ident;
mod lexer;
mod normalize;
mod reconciler;
mod rewriter;
mod scanner;
mod statement;
mod synthesizer;

pub use batch::{BatchDriver, BatchMode, BatchOptions, BatchReport, FileReport, FileStatus};
pub use config::RewriteConfig;
pub use error::{ConfigError, Error, ReconcileError, Result, ScanError};
pub use guard::{
    Catalog, GuardKey, GuardPredicate, PredicateTerm, RenderedBlock, render_block,
    render_condition,
};
pub use ident::{Ident, QualifiedName, sql_literal};
pub use lexer::{Delimiter, Lexer, Token, TokenKind, protected_ranges};
pub use normalize::normalize_whitespace;
pub use reconciler::{Reconciliation, reconcile};
pub use rewriter::{Anomaly, AnomalyKind, Correction, DocumentRewriter, RewriteOutcome};
pub use scanner::{Scanner, scan};
pub use statement::{
    GuardBlock, Identity, StatementForm, StatementKind, StatementRecord, TrailerRepair,
};
pub use synthesizer::{BlockLayout, GuardedStatement, Strategy, Synthesizer};

/// Rewrites one migration document with `config`.
#[must_use]
pub fn rewrite_document(source: &str, config: &RewriteConfig) -> RewriteOutcome {
    DocumentRewriter::new(config).rewrite(source)
}
