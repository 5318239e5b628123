use std::fmt;

use tracing::{debug, warn};

use crate::{
    GuardKey, ReconcileError, Reconciliation, RewriteConfig, ScanError, Scanner, StatementKind,
    Synthesizer, normalize_whitespace, reconcile, scanner::line_of,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    UnterminatedStatement,
    MalformedGuardTarget,
    UnguardableStatement,
    NestedGuardBlock,
}

impl AnomalyKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::UnterminatedStatement => "unterminated_statement",
            Self::MalformedGuardTarget => "malformed_guard_target",
            Self::UnguardableStatement => "unguardable_statement",
            Self::NestedGuardBlock => "nested_guard_block",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Something in a document that needs a human look. The affected text is
/// left as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// 1-based line of the statement start.
    pub line: usize,
    pub message: String,
}

impl Anomaly {
    fn from_scan(error: &ScanError) -> Self {
        let kind = match error {
            ScanError::UnterminatedStatement { .. } => AnomalyKind::UnterminatedStatement,
            ScanError::UnguardableStatement { .. } => AnomalyKind::UnguardableStatement,
            ScanError::NestedGuardBlock { .. } => AnomalyKind::NestedGuardBlock,
        };
        Self {
            kind,
            line: error.line(),
            message: error.to_string(),
        }
    }

    fn from_reconcile(error: &ReconcileError, line: usize) -> Self {
        Self {
            kind: AnomalyKind::MalformedGuardTarget,
            line,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// A guard predicate that was rewritten to match its creation clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub kind: StatementKind,
    pub line: usize,
    pub from: GuardKey,
    pub to: GuardKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub text: String,
    pub changed: bool,
    /// Recognized statements, rewritten or not.
    pub statements: usize,
    /// Statement spans whose text was replaced.
    pub rewritten: usize,
    pub anomalies: Vec<Anomaly>,
    pub corrections: Vec<Correction>,
}

/// Runs scan, synthesis and reconciliation over one document and splices
/// the results back into its text.
pub struct DocumentRewriter<'c> {
    config: &'c RewriteConfig,
}

impl<'c> DocumentRewriter<'c> {
    #[must_use]
    pub const fn new(config: &'c RewriteConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn rewrite(&self, source: &str) -> RewriteOutcome {
        let synthesizer = Synthesizer::new(self.config);
        let mut output = String::with_capacity(source.len() + source.len() / 4);
        let mut cursor = 0;
        let mut statements = 0;
        let mut rewritten = 0;
        let mut anomalies = Vec::new();
        let mut corrections = Vec::new();

        for scanned in Scanner::new(source) {
            let record = match scanned {
                Ok(record) => record,
                Err(error) => {
                    warn!(line = error.line(), "{error}");
                    anomalies.push(Anomaly::from_scan(&error));
                    continue;
                }
            };

            statements += 1;
            let line = line_of(source, record.span.start);
            debug!(
                kind = %record.kind,
                identity = %record.identity,
                line,
                "recognized statement"
            );

            let mut guarded = synthesizer.synthesize(source, &record);
            match reconcile(&mut guarded) {
                Ok(Reconciliation::Unchanged) => {}
                Ok(Reconciliation::Corrected { from, to }) => {
                    debug!(line, from = %from, to = %to, "corrected guard predicate");
                    corrections.push(Correction {
                        kind: record.kind,
                        line,
                        from,
                        to,
                    });
                }
                Err(error) => {
                    warn!(line, "{error}");
                    anomalies.push(Anomaly::from_reconcile(&error, line));
                }
            }

            if guarded.text != record.text(source) {
                output.push_str(&source[cursor..record.span.start]);
                output.push_str(&guarded.text);
                cursor = record.span.end;
                rewritten += 1;
            }
        }

        if rewritten == 0 {
            return RewriteOutcome {
                text: source.to_string(),
                changed: false,
                statements,
                rewritten,
                anomalies,
                corrections,
            };
        }

        output.push_str(&source[cursor..]);
        if self.config.normalize_whitespace {
            output = normalize_whitespace(&output);
        }

        RewriteOutcome {
            changed: output != source,
            text: output,
            statements,
            rewritten,
            anomalies,
            corrections,
        }
    }
}
