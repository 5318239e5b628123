mod guard_block;
mod shape;

use std::ops::Range;

use guard_block::{DoBlock, examine_do};
use shape::{Shape, ShapedStatement, classify};

use crate::{
    Identity, Lexer, ScanError, StatementForm, StatementKind, StatementRecord, Token, TokenKind,
};

const EXCERPT_LIMIT: usize = 60;

/// Lazily splits a migration document into statements and yields the ones
/// that create a tracked object kind, in document order.
///
/// Statements end at a `;` outside parentheses, strings, quoted identifiers,
/// dollar quotes and comments. Unrecognized statements are skipped; a
/// recognized statement that cannot be delimited is reported as an error
/// and scanning carries on after it.
pub struct Scanner<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    pending_drop: Option<PendingDrop>,
}

/// A `DROP ... IF EXISTS` seen as the immediately preceding statement.
struct PendingDrop {
    start: usize,
    kind: StatementKind,
    identity: Identity,
}

struct Chunk {
    tokens: Vec<Token>,
    start: usize,
    end: usize,
    terminated: bool,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            pending_drop: None,
        }
    }

    fn next_chunk(&mut self) -> Option<Chunk> {
        let mut tokens = Vec::new();
        let mut depth = 0_usize;
        let mut nested_terminator: Option<Token> = None;

        while let Some(token) = self.lexer.next() {
            match token.kind {
                TokenKind::Semicolon if depth == 0 => {
                    let start = tokens.first().map_or(token.start, |first: &Token| first.start);
                    return Some(Chunk {
                        tokens,
                        start,
                        end: token.end,
                        terminated: true,
                    });
                }
                TokenKind::Semicolon => {
                    nested_terminator.get_or_insert(token);
                }
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                TokenKind::Unterminated(_) => {
                    tokens.push(token);
                    break;
                }
                _ => {}
            }
            tokens.push(token);
        }

        let first = tokens.first()?;
        let start = first.start;

        // Unbalanced parentheses swallowed the real terminator: close the
        // statement at the first `;` inside them and resume after it.
        if depth > 0
            && let Some(terminator) = nested_terminator
            && tokens
                .last()
                .is_none_or(|last| !matches!(last.kind, TokenKind::Unterminated(_)))
        {
            tokens.retain(|token| token.end <= terminator.start);
            self.lexer = Lexer::within(self.source, terminator.end..self.source.len());
            return Some(Chunk {
                tokens,
                start,
                end: terminator.end,
                terminated: false,
            });
        }

        let end = tokens.last().map_or(start, |last| last.end);
        Some(Chunk {
            tokens,
            start,
            end,
            terminated: false,
        })
    }

    fn examine(&mut self, chunk: &Chunk) -> Option<Result<StatementRecord, ScanError>> {
        let pending = self.pending_drop.take();
        let first = chunk.tokens.first()?;

        if first.is_keyword(self.source, "DO") {
            return self.examine_do(chunk);
        }

        match classify(self.source, &chunk.tokens) {
            Shape::Statement(shaped) => {
                if !chunk.terminated {
                    return Some(Err(self.unterminated(shaped.kind, chunk)));
                }
                Some(Ok(self.record(shaped, chunk, pending)))
            }
            Shape::DropGuard { kind, identity } => {
                if chunk.terminated {
                    self.pending_drop = Some(PendingDrop {
                        start: chunk.start,
                        kind,
                        identity,
                    });
                }
                None
            }
            Shape::Unguardable { kind, reason } => {
                if !chunk.terminated {
                    return Some(Err(self.unterminated(kind, chunk)));
                }
                Some(Err(ScanError::UnguardableStatement {
                    kind,
                    line: line_of(self.source, chunk.start),
                    reason,
                }))
            }
            Shape::Unrecognized => None,
        }
    }

    fn examine_do(&self, chunk: &Chunk) -> Option<Result<StatementRecord, ScanError>> {
        match examine_do(self.source, &chunk.tokens) {
            DoBlock::Guard {
                kind,
                identity,
                guard,
                body,
            } => {
                if !chunk.terminated {
                    return Some(Err(self.unterminated(kind, chunk)));
                }
                Some(Ok(StatementRecord {
                    kind,
                    span: chunk.start..chunk.end,
                    identity,
                    form: StatementForm::GuardBlock(guard),
                    anchor: chunk.start,
                    body,
                    language: None,
                    column_anchors: Vec::new(),
                }))
            }
            DoBlock::Nested => Some(Err(ScanError::NestedGuardBlock {
                line: line_of(self.source, chunk.start),
            })),
            DoBlock::Opaque => None,
        }
    }

    fn record(
        &self,
        shaped: ShapedStatement,
        chunk: &Chunk,
        pending: Option<PendingDrop>,
    ) -> StatementRecord {
        let mut span = chunk.start..chunk.end;
        let mut form = if shaped.native {
            StatementForm::Native
        } else {
            StatementForm::Bare
        };

        if form.is_bare()
            && let Some(drop) = pending
            && drop.kind == shaped.kind
            && drop.identity.same_object(&shaped.identity)
        {
            form = StatementForm::DropGuarded;
            span.start = drop.start;
        }

        StatementRecord {
            kind: shaped.kind,
            span,
            identity: shaped.identity,
            form,
            anchor: shaped.anchor,
            body: shaped.body,
            language: shaped.language,
            column_anchors: shaped.column_anchors,
        }
    }

    fn unterminated(&self, kind: StatementKind, chunk: &Chunk) -> ScanError {
        ScanError::UnterminatedStatement {
            kind,
            line: line_of(self.source, chunk.start),
            excerpt: excerpt(&self.source[chunk.start..chunk.end]),
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<StatementRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let chunk = self.next_chunk()?;
            if let Some(item) = self.examine(&chunk) {
                return Some(item);
            }
        }
    }
}

/// Convenience wrapper collecting every scan result of `source`.
#[must_use]
pub fn scan(source: &str) -> Vec<Result<StatementRecord, ScanError>> {
    Scanner::new(source).collect()
}

/// Kind and identity of the creation clause spanning `range`, if that text
/// is one. A trailing terminator is ignored.
pub(crate) fn creation_identity(
    source: &str,
    range: Range<usize>,
) -> Option<(StatementKind, Identity)> {
    let mut tokens: Vec<_> = Lexer::within(source, range).collect();
    if tokens
        .last()
        .is_some_and(|token| token.kind == TokenKind::Semicolon)
    {
        tokens.pop();
    }
    match classify(source, &tokens) {
        Shape::Statement(shaped) => Some((shaped.kind, shaped.identity)),
        Shape::DropGuard { .. } | Shape::Unguardable { .. } | Shape::Unrecognized => None,
    }
}

/// 1-based line number of byte `offset`.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
        + 1
}

fn excerpt(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default().trim_end();
    match first_line.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}...", &first_line[..cut]),
        None => first_line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Scanner, excerpt, line_of, scan};
    use crate::{ScanError, StatementForm, StatementKind};

    fn kinds(sql: &str) -> Vec<StatementKind> {
        Scanner::new(sql)
            .map(|item| item.expect("scan should succeed").kind)
            .collect()
    }

    #[test]
    fn semicolons_inside_literals_do_not_split() {
        let sql = "CREATE TABLE a (note text DEFAULT 'x;y');\n-- CREATE TABLE ignored;\nCREATE INDEX a_idx ON a (note);";
        assert_eq!(
            kinds(sql),
            vec![StatementKind::CreateTable, StatementKind::CreateIndex]
        );
    }

    #[test]
    fn spans_include_terminator_and_are_ordered() {
        let sql = "CREATE TABLE a (id int);\nINSERT INTO a VALUES (1);\nCREATE TABLE b (id int);\n";
        let records: Vec<_> = Scanner::new(sql)
            .map(|item| item.expect("scan should succeed"))
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text(sql), "CREATE TABLE a (id int);");
        assert_eq!(records[1].text(sql), "CREATE TABLE b (id int);");
        assert!(records[0].span.end <= records[1].span.start);
    }

    #[test]
    fn matching_drop_extends_trigger_span() {
        let sql = "DROP TRIGGER IF EXISTS touch ON orders;\nCREATE TRIGGER touch BEFORE UPDATE ON orders FOR EACH ROW EXECUTE FUNCTION touch();";
        let records: Vec<_> = Scanner::new(sql)
            .map(|item| item.expect("scan should succeed"))
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].form, StatementForm::DropGuarded);
        assert_eq!(records[0].span, 0..sql.len());
    }

    #[test]
    fn drop_for_another_object_is_ignored() {
        let sql = "DROP POLICY IF EXISTS other ON docs;\nCREATE POLICY readers ON docs USING (true);";
        let records: Vec<_> = Scanner::new(sql)
            .map(|item| item.expect("scan should succeed"))
            .collect();
        assert_eq!(records[0].form, StatementForm::Bare);
        assert!(records[0].text(sql).starts_with("CREATE POLICY"));
    }

    #[test]
    fn missing_terminator_on_recognized_statement_is_reported() {
        let results = scan("SELECT 1;\nCREATE TABLE a (id int)");
        assert!(matches!(
            results.as_slice(),
            [Err(ScanError::UnterminatedStatement {
                kind: StatementKind::CreateTable,
                line: 2,
                ..
            })]
        ));
    }

    #[test]
    fn unbalanced_parenthesis_resumes_after_first_inner_semicolon() {
        let sql = "CREATE TABLE a (id int;\nCREATE INDEX b_idx ON b (id);";
        let results = scan(sql);
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(ScanError::UnterminatedStatement { line: 1, .. })
        ));
        assert_eq!(
            results[1].as_ref().map(|record| record.kind).ok(),
            Some(StatementKind::CreateIndex)
        );
    }

    #[test]
    fn unterminated_dollar_quote_ends_the_scan() {
        let results = scan("CREATE FUNCTION f() RETURNS int AS $$ BEGIN RETURN 1;");
        assert!(matches!(
            results.as_slice(),
            [Err(ScanError::UnterminatedStatement {
                kind: StatementKind::FunctionDefinition,
                ..
            })]
        ));
    }

    #[test]
    fn nested_do_block_is_reported() {
        let results = scan("DO $a$ BEGIN DO $b$ BEGIN NULL; END $b$; END $a$;");
        assert!(matches!(
            results.as_slice(),
            [Err(ScanError::NestedGuardBlock { line: 1 })]
        ));
    }

    #[test]
    fn excerpt_keeps_first_line_only() {
        assert_eq!(excerpt("CREATE TABLE a (\n  id int"), "CREATE TABLE a (");
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }
}
