use std::ops::Range;

use crate::{Ident, Identity, QualifiedName, StatementKind, Token, TokenKind};

/// Outcome of matching one statement's tokens against the recognized DDL
/// shapes. Tokens never include the statement terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shape {
    Statement(ShapedStatement),
    /// `DROP TRIGGER|POLICY IF EXISTS name ON table`.
    DropGuard {
        kind: StatementKind,
        identity: Identity,
    },
    Unguardable {
        kind: StatementKind,
        reason: &'static str,
    },
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShapedStatement {
    pub(crate) kind: StatementKind,
    pub(crate) identity: Identity,
    pub(crate) native: bool,
    pub(crate) anchor: usize,
    pub(crate) body: Range<usize>,
    pub(crate) language: Option<String>,
    pub(crate) column_anchors: Vec<usize>,
}

pub(crate) fn classify(source: &str, tokens: &[Token]) -> Shape {
    let mut cursor = Cursor::new(source, tokens);
    if cursor.eat_keyword("CREATE") {
        return classify_create(cursor);
    }
    if cursor.eat_sequence(&["ALTER", "TABLE"]) {
        return classify_alter_table(cursor);
    }
    if cursor.eat_keyword("DROP") {
        return classify_drop(cursor);
    }
    Shape::Unrecognized
}

fn classify_create(mut cursor: Cursor<'_, '_>) -> Shape {
    let create_end = cursor.previous_end();
    let or_replace = cursor.eat_sequence(&["OR", "REPLACE"]);

    let mut lookahead = cursor.clone();
    lookahead.eat_any(&["GLOBAL", "LOCAL"]);
    lookahead.eat_any(&["TEMP", "TEMPORARY", "UNLOGGED"]);
    if lookahead.eat_keyword("TABLE") {
        return if or_replace {
            Shape::Unrecognized
        } else {
            create_table(lookahead)
        };
    }

    let mut lookahead = cursor.clone();
    lookahead.eat_keyword("UNIQUE");
    if lookahead.eat_keyword("INDEX") {
        return if or_replace {
            Shape::Unrecognized
        } else {
            create_index(lookahead)
        };
    }

    let mut lookahead = cursor.clone();
    lookahead.eat_keyword("CONSTRAINT");
    if lookahead.eat_keyword("TRIGGER") {
        return create_trigger(lookahead, or_replace);
    }

    if cursor.eat_keyword("POLICY") {
        return if or_replace {
            Shape::Unrecognized
        } else {
            create_policy(cursor)
        };
    }

    if cursor.eat_any(&["FUNCTION", "PROCEDURE"]) {
        return create_function(cursor, or_replace, create_end);
    }

    Shape::Unrecognized
}

fn create_table(mut cursor: Cursor<'_, '_>) -> Shape {
    let native = cursor.eat_sequence(&["IF", "NOT", "EXISTS"]);
    let Some((name, name_span)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    Shape::Statement(ShapedStatement {
        kind: StatementKind::CreateTable,
        identity: Identity::Object(name),
        native,
        anchor: name_span.start,
        body: name_span.end..cursor.end(),
        language: None,
        column_anchors: Vec::new(),
    })
}

fn create_index(mut cursor: Cursor<'_, '_>) -> Shape {
    cursor.eat_keyword("CONCURRENTLY");
    let native = cursor.eat_sequence(&["IF", "NOT", "EXISTS"]);
    if !native && cursor.peek_keyword("ON") && !cursor.peek_keyword_at(1, "ON") {
        return Shape::Unguardable {
            kind: StatementKind::CreateIndex,
            reason: "an index without a name cannot use IF NOT EXISTS",
        };
    }

    let Some((name, name_span)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    Shape::Statement(ShapedStatement {
        kind: StatementKind::CreateIndex,
        identity: Identity::Object(name),
        native,
        anchor: name_span.start,
        body: name_span.end..cursor.end(),
        language: None,
        column_anchors: Vec::new(),
    })
}

fn create_trigger(mut cursor: Cursor<'_, '_>, or_replace: bool) -> Shape {
    let Some((name, name_token)) = cursor.ident() else {
        return Shape::Unrecognized;
    };
    if !cursor.skip_to_keyword("ON") {
        return Shape::Unrecognized;
    }
    let Some((table, table_span)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    Shape::Statement(ShapedStatement {
        kind: StatementKind::CreateTrigger,
        identity: Identity::Trigger { name, table },
        native: or_replace,
        anchor: name_token.start,
        body: table_span.end..cursor.end(),
        language: None,
        column_anchors: Vec::new(),
    })
}

fn create_policy(mut cursor: Cursor<'_, '_>) -> Shape {
    let Some((name, name_token)) = cursor.ident() else {
        return Shape::Unrecognized;
    };
    if !cursor.eat_keyword("ON") {
        return Shape::Unrecognized;
    }
    let Some((table, table_span)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    Shape::Statement(ShapedStatement {
        kind: StatementKind::CreatePolicy,
        identity: Identity::Policy { name, table },
        native: false,
        anchor: name_token.start,
        body: table_span.end..cursor.end(),
        language: None,
        column_anchors: Vec::new(),
    })
}

fn create_function(mut cursor: Cursor<'_, '_>, or_replace: bool, create_end: usize) -> Shape {
    let Some((name, _)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    let source = cursor.source;
    let rest = cursor.remaining();
    let body = rest
        .iter()
        .find_map(|token| token.dollar_content(source))
        .unwrap_or(cursor.end()..cursor.end());
    let language = rest.windows(2).find_map(|pair| {
        if !pair[0].is_keyword(source, "LANGUAGE") {
            return None;
        }
        match pair[1].kind {
            TokenKind::Word => Some(pair[1].text(source).to_ascii_lowercase()),
            TokenKind::String => pair[1]
                .string_value(source)
                .map(|value| value.to_ascii_lowercase()),
            _ => None,
        }
    });

    Shape::Statement(ShapedStatement {
        kind: StatementKind::FunctionDefinition,
        identity: Identity::Object(name),
        native: or_replace,
        anchor: create_end,
        body,
        language,
        column_anchors: Vec::new(),
    })
}

fn classify_alter_table(mut cursor: Cursor<'_, '_>) -> Shape {
    cursor.eat_sequence(&["IF", "EXISTS"]);
    cursor.eat_keyword("ONLY");
    let Some((table, _)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };
    cursor.eat_symbol("*");

    let actions = cursor.split_top_level_commas();
    let add_columns: Vec<_> = actions
        .iter()
        .filter_map(|action| AddColumn::parse(cursor.source, action))
        .collect();

    if add_columns.is_empty() {
        return Shape::Unrecognized;
    }

    if actions.len() > 1 {
        if add_columns.iter().all(|add| add.native) {
            return Shape::Unrecognized;
        }
        if add_columns.len() < actions.len() {
            return Shape::Unguardable {
                kind: StatementKind::AddColumn,
                reason: "ALTER TABLE combines ADD COLUMN with other actions",
            };
        }
        return several_columns(table, &add_columns, cursor.end());
    }

    let add = &add_columns[0];
    Shape::Statement(ShapedStatement {
        kind: StatementKind::AddColumn,
        identity: Identity::Column {
            table,
            column: add.column.clone(),
        },
        native: add.native,
        anchor: add.column_span.start,
        body: add.column_span.end..cursor.end(),
        language: None,
        column_anchors: Vec::new(),
    })
}

/// `ALTER TABLE t ADD COLUMN a ..., ADD COLUMN b ...`: every column still
/// lacking `IF NOT EXISTS` gets an anchor. The first one names the record.
fn several_columns(table: QualifiedName, add_columns: &[AddColumn], end: usize) -> Shape {
    let bare: Vec<&AddColumn> = add_columns.iter().filter(|add| !add.native).collect();
    let Some(first) = bare.first() else {
        return Shape::Unrecognized;
    };
    Shape::Statement(ShapedStatement {
        kind: StatementKind::AddColumn,
        identity: Identity::Column {
            table,
            column: first.column.clone(),
        },
        native: false,
        anchor: first.column_span.start,
        body: first.column_span.end..end,
        language: None,
        column_anchors: bare.iter().map(|add| add.column_span.start).collect(),
    })
}

struct AddColumn {
    column: Ident,
    column_span: Range<usize>,
    native: bool,
}

impl AddColumn {
    fn parse(source: &str, action: &[Token]) -> Option<Self> {
        let mut cursor = Cursor::new(source, action);
        if !cursor.eat_sequence(&["ADD", "COLUMN"]) {
            return None;
        }
        let native = cursor.eat_sequence(&["IF", "NOT", "EXISTS"]);
        let (column, token) = cursor.ident()?;
        Some(Self {
            column,
            column_span: token.span(),
            native,
        })
    }
}

fn classify_drop(mut cursor: Cursor<'_, '_>) -> Shape {
    let kind = if cursor.eat_keyword("TRIGGER") {
        StatementKind::CreateTrigger
    } else if cursor.eat_keyword("POLICY") {
        StatementKind::CreatePolicy
    } else {
        return Shape::Unrecognized;
    };

    if !cursor.eat_sequence(&["IF", "EXISTS"]) {
        return Shape::Unrecognized;
    }
    let Some((name, _)) = cursor.ident() else {
        return Shape::Unrecognized;
    };
    if !cursor.eat_keyword("ON") {
        return Shape::Unrecognized;
    }
    let Some((table, _)) = cursor.qualified_name() else {
        return Shape::Unrecognized;
    };

    let identity = match kind {
        StatementKind::CreateTrigger => Identity::Trigger { name, table },
        _ => Identity::Policy { name, table },
    };
    Shape::DropGuard { kind, identity }
}

#[derive(Clone)]
struct Cursor<'s, 't> {
    source: &'s str,
    tokens: &'t [Token],
    pos: usize,
}

impl<'s, 't> Cursor<'s, 't> {
    fn new(source: &'s str, tokens: &'t [Token]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek_keyword_at(0, keyword)
    }

    fn peek_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        self.tokens
            .get(self.pos + offset)
            .is_some_and(|token| token.is_keyword(self.source, keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_any(&mut self, keywords: &[&str]) -> bool {
        keywords.iter().any(|keyword| self.eat_keyword(keyword))
    }

    /// Consumes all of `keywords` in order, or nothing.
    fn eat_sequence(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords
            .iter()
            .enumerate()
            .all(|(offset, keyword)| self.peek_keyword_at(offset, keyword));
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let matches = self
            .tokens
            .get(self.pos)
            .is_some_and(|token| token.is_symbol(self.source, symbol));
        if matches {
            self.pos += 1;
        }
        matches
    }

    fn ident(&mut self) -> Option<(Ident, Token)> {
        let token = *self.tokens.get(self.pos)?;
        let ident = token.ident(self.source)?;
        self.pos += 1;
        Some((ident, token))
    }

    /// `name`, `schema.name` or `catalog.schema.name`; the catalog part is
    /// dropped.
    fn qualified_name(&mut self) -> Option<(QualifiedName, Range<usize>)> {
        let (first, first_token) = self.ident()?;
        let mut parts = vec![first];
        let mut end = first_token.end;

        while parts.len() < 3
            && self
                .tokens
                .get(self.pos)
                .is_some_and(|token| token.kind == TokenKind::Dot)
        {
            let checkpoint = self.pos;
            self.pos += 1;
            let Some((part, token)) = self.ident() else {
                self.pos = checkpoint;
                break;
            };
            parts.push(part);
            end = token.end;
        }

        let name = parts.pop()?;
        let schema = parts.pop();
        Some((QualifiedName { schema, name }, first_token.start..end))
    }

    /// Advances past the next `keyword` outside parentheses.
    fn skip_to_keyword(&mut self, keyword: &str) -> bool {
        let mut depth = 0_usize;
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                _ if depth == 0 && token.is_keyword(self.source, keyword) => return true,
                _ => {}
            }
        }
        false
    }

    fn split_top_level_commas(&self) -> Vec<&'t [Token]> {
        let rest = &self.tokens[self.pos.min(self.tokens.len())..];
        let mut actions = Vec::new();
        let mut depth = 0_usize;
        let mut start = 0;
        for (index, token) in rest.iter().enumerate() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                TokenKind::Comma if depth == 0 => {
                    actions.push(&rest[start..index]);
                    start = index + 1;
                }
                _ => {}
            }
        }
        actions.push(&rest[start..]);
        actions
    }

    fn remaining(&self) -> &'t [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map_or(0, |token| token.end)
    }

    /// End of the last token of the statement.
    fn end(&self) -> usize {
        self.tokens.last().map_or(0, |token| token.end)
    }
}
