use std::ops::Range;

use super::shape::{Shape, classify};
use crate::{
    Catalog, GuardBlock, GuardPredicate, Ident, Identity, Lexer, QualifiedName, StatementKind,
    Token, TokenKind, TrailerRepair,
};

/// What a top-level `DO` statement turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DoBlock {
    Guard {
        kind: StatementKind,
        identity: Identity,
        guard: GuardBlock,
        body: Range<usize>,
    },
    /// A `DO` block opened inside another one.
    Nested,
    /// Anything that is not a single catalog-checked creation.
    Opaque,
}

/// Matches `DO $$ BEGIN IF NOT EXISTS (...) THEN <stmt>; END IF; END $$`.
/// A missing or repeated `END IF;` still matches and carries a repair.
pub(crate) fn examine_do(source: &str, tokens: &[Token]) -> DoBlock {
    let Some(body) = tokens
        .iter()
        .find_map(|token| token.dollar_content(source))
    else {
        return DoBlock::Opaque;
    };

    let body_tokens: Vec<_> = Lexer::within(source, body).collect();
    if opens_nested_block(source, &body_tokens) {
        return DoBlock::Nested;
    }

    let Some(parts) = GuardParts::match_tokens(source, &body_tokens) else {
        return DoBlock::Opaque;
    };
    let Some(predicate) = GuardPredicate::parse(source, parts.predicate.clone()) else {
        return DoBlock::Opaque;
    };

    let inner_tokens = &body_tokens[parts.inner_tokens.clone()];
    let inner_end = inner_tokens.last().map_or(parts.inner.end, |token| token.end);
    let (kind, identity) = match classify(source, inner_tokens) {
        Shape::Statement(shaped) => {
            if Catalog::for_kind(shaped.kind) != Some(predicate.catalog) {
                return DoBlock::Opaque;
            }
            (shaped.kind, shaped.identity)
        }
        Shape::DropGuard { .. } | Shape::Unguardable { .. } => return DoBlock::Opaque,
        Shape::Unrecognized => {
            let Some(identity) = predicate_identity(&predicate) else {
                return DoBlock::Opaque;
            };
            (predicate.catalog.kind(), identity)
        }
    };

    DoBlock::Guard {
        kind,
        identity,
        guard: GuardBlock {
            predicate,
            inner: parts.inner.clone(),
            trailer: parts.trailer,
        },
        body: parts.inner.start..inner_end,
    }
}

fn opens_nested_block(source: &str, body_tokens: &[Token]) -> bool {
    body_tokens.iter().enumerate().any(|(index, token)| {
        token.is_keyword(source, "DO")
            && body_tokens.get(index + 1).is_none_or(|next| {
                matches!(
                    next.kind,
                    TokenKind::DollarString | TokenKind::Unterminated(_)
                ) || next.is_keyword(source, "LANGUAGE")
            })
    })
}

/// Identity read back from the predicate's literals, for guards whose
/// wrapped statement is not a creation clause at all.
fn predicate_identity(predicate: &GuardPredicate) -> Option<Identity> {
    let key = predicate.key()?;
    let table = QualifiedName {
        schema: key.schema.map(Ident::quoted),
        name: Ident::quoted(key.table),
    };
    let name = Ident::quoted(key.name);
    Some(match predicate.catalog {
        Catalog::Policies => Identity::Policy { name, table },
        Catalog::Columns => Identity::Column {
            table,
            column: name,
        },
    })
}

struct GuardParts {
    predicate: Range<usize>,
    /// Wrapped statement including its terminator.
    inner: Range<usize>,
    /// Indexes into the body tokens of the wrapped statement, terminator
    /// excluded.
    inner_tokens: Range<usize>,
    trailer: Option<TrailerRepair>,
}

impl GuardParts {
    fn match_tokens(source: &str, tokens: &[Token]) -> Option<Self> {
        let mut index = 0;
        let keyword = |index: usize, keyword: &str| {
            tokens
                .get(index)
                .is_some_and(|token| token.is_keyword(source, keyword))
        };

        for expected in ["BEGIN", "IF", "NOT", "EXISTS"] {
            if !keyword(index, expected) {
                return None;
            }
            index += 1;
        }

        let open = tokens.get(index)?;
        if open.kind != TokenKind::LParen {
            return None;
        }
        let close_index = matching_paren(tokens, index)?;
        let predicate = open.end..tokens[close_index].start;
        index = close_index + 1;

        if !keyword(index, "THEN") {
            return None;
        }
        index += 1;

        let inner_start = index;
        let terminator = inner_start
            + tokens[inner_start..]
                .iter()
                .position(|token| token.kind == TokenKind::Semicolon)?;
        if terminator == inner_start {
            return None;
        }
        let inner = tokens[inner_start].start..tokens[terminator].end;
        index = terminator + 1;

        // Semicolon index of every `END IF;` before the final `END`.
        let mut closers = Vec::new();
        while keyword(index, "END") && keyword(index + 1, "IF") {
            if tokens.get(index + 2)?.kind != TokenKind::Semicolon {
                return None;
            }
            closers.push(index + 2);
            index += 3;
        }
        if !keyword(index, "END") {
            return None;
        }
        let block_end = &tokens[index];
        index += 1;
        if tokens
            .get(index)
            .is_some_and(|token| token.kind == TokenKind::Semicolon)
        {
            index += 1;
        }
        if index != tokens.len() {
            return None;
        }

        let trailer = match closers.as_slice() {
            [] => {
                let separator = if source[inner.end..block_end.start].contains('\n') {
                    format!("\n{}", line_indent(source, tokens[1].start))
                } else {
                    " ".to_string()
                };
                Some(TrailerRepair {
                    range: inner.end..inner.end,
                    replacement: format!("{separator}END IF;"),
                })
            }
            [_] => None,
            [first, .., last] => Some(TrailerRepair {
                range: tokens[*first].end..tokens[*last].end,
                replacement: String::new(),
            }),
        };

        Some(Self {
            predicate,
            inner,
            inner_tokens: inner_start..terminator,
            trailer,
        })
    }
}

fn line_indent(source: &str, position: usize) -> &str {
    let line_start = source[..position].rfind('\n').map_or(0, |newline| newline + 1);
    let line = &source[line_start..position];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{DoBlock, examine_do};
    use crate::{Identity, Lexer, StatementKind};

    fn examine(sql: &str) -> DoBlock {
        let tokens: Vec<_> = Lexer::new(sql).collect();
        examine_do(sql, &tokens)
    }

    #[test]
    fn policy_guard_is_recognized_with_its_inner_statement() {
        let sql = "DO $$\nBEGIN\n  IF NOT EXISTS (\n    SELECT 1 FROM pg_policies\n    WHERE (tablename = 'docs' AND policyname = 'readers')\n  ) THEN\n    CREATE POLICY readers ON docs USING (true);\n  END IF;\nEND $$";
        let DoBlock::Guard {
            kind,
            identity,
            guard,
            ..
        } = examine(sql)
        else {
            panic!("expected a guard block");
        };
        assert_eq!(kind, StatementKind::CreatePolicy);
        assert!(matches!(identity, Identity::Policy { .. }));
        assert_eq!(
            &sql[guard.inner],
            "CREATE POLICY readers ON docs USING (true);"
        );
    }

    #[test]
    fn guard_around_other_work_takes_identity_from_predicate() {
        let sql = "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE policyname = 'p' AND tablename = 't') THEN RAISE NOTICE 'x'; END IF; END $$";
        let DoBlock::Guard { kind, identity, .. } = examine(sql) else {
            panic!("expected a guard block");
        };
        assert_eq!(kind, StatementKind::CreatePolicy);
        assert_eq!(identity.to_string(), r#""p" ON "t""#);
    }

    #[test]
    fn catalog_mismatch_and_free_form_blocks_are_opaque() {
        assert_eq!(
            examine("DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE policyname = 'p') THEN ALTER TABLE t ADD COLUMN c int; END IF; END $$"),
            DoBlock::Opaque
        );
        assert_eq!(
            examine("DO $$ BEGIN PERFORM refresh(); END $$"),
            DoBlock::Opaque
        );
    }

    #[test]
    fn repeated_end_if_carries_a_removal() {
        let sql = "DO $$\nBEGIN\n  IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE tablename = 't' AND policyname = 'p') THEN\n    CREATE POLICY p ON t USING (true);\n  END IF;\n  END IF;\n  END IF;\nEND $$";
        let DoBlock::Guard { guard, .. } = examine(sql) else {
            panic!("expected a guard block");
        };
        let trailer = guard.trailer.expect("repeated END IF must be repaired");
        assert_eq!(&sql[trailer.range], "\n  END IF;\n  END IF;");
        assert_eq!(trailer.replacement, "");
    }

    #[test]
    fn missing_end_if_is_inserted_after_the_statement() {
        let sql = "DO $$\nBEGIN\n  IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE tablename = 't' AND policyname = 'p') THEN\n    CREATE POLICY p ON t USING (true);\nEND $$";
        let DoBlock::Guard { guard, .. } = examine(sql) else {
            panic!("expected a guard block");
        };
        let trailer = guard.trailer.expect("missing END IF must be repaired");
        assert_eq!(trailer.range.start, guard.inner.end);
        assert!(trailer.range.is_empty());
        assert_eq!(trailer.replacement, "\n  END IF;");

        let single_line = "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE tablename = 't' AND policyname = 'p') THEN CREATE POLICY p ON t USING (true); END $$";
        let DoBlock::Guard { guard, .. } = examine(single_line) else {
            panic!("expected a guard block");
        };
        assert_eq!(
            guard.trailer.map(|trailer| trailer.replacement).as_deref(),
            Some(" END IF;")
        );
    }

    #[test]
    fn well_formed_guard_needs_no_trailer_repair() {
        let sql = "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_policies WHERE tablename = 't' AND policyname = 'p') THEN CREATE POLICY p ON t USING (true); END IF; END $$";
        let DoBlock::Guard { guard, .. } = examine(sql) else {
            panic!("expected a guard block");
        };
        assert_eq!(guard.trailer, None);
    }

    #[test]
    fn do_inside_do_is_nested() {
        assert_eq!(
            examine("DO $outer$ BEGIN DO $$ BEGIN NULL; END $$; END $outer$"),
            DoBlock::Nested
        );
    }
}
