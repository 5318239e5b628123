use std::ops::Range;

use crate::Ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    SingleQuote,
    DoubleQuote,
    DollarQuote,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword.
    Word,
    QuotedIdent,
    String,
    /// `$tag$ ... $tag$` including both tags.
    DollarString,
    Number,
    Parameter,
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    Comment,
    /// Any other single punctuation byte.
    Symbol,
    /// A quote or comment that runs to the end of the input.
    Unterminated(Delimiter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    #[must_use]
    pub fn is_keyword(&self, source: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(keyword)
    }

    #[must_use]
    pub fn is_symbol(&self, source: &str, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text(source) == symbol
    }

    /// Interprets a word or quoted identifier token as an identifier.
    #[must_use]
    pub fn ident(&self, source: &str) -> Option<Ident> {
        match self.kind {
            TokenKind::Word => Some(Ident::unquoted(self.text(source))),
            TokenKind::QuotedIdent => {
                let text = self.text(source);
                let inner = &text[1..text.len() - 1];
                Some(Ident::quoted(inner.replace("\"\"", "\"")))
            }
            _ => None,
        }
    }

    /// Unescaped value of a single-quoted string token.
    #[must_use]
    pub fn string_value(&self, source: &str) -> Option<String> {
        if self.kind != TokenKind::String {
            return None;
        }
        let text = self.text(source);
        let quote = text.find('\'')?;
        let inner = &text[quote + 1..text.len() - 1];
        Some(inner.replace("''", "'"))
    }

    /// Byte range of a dollar-quoted string's content, without its tags.
    #[must_use]
    pub fn dollar_content(&self, source: &str) -> Option<Range<usize>> {
        if self.kind != TokenKind::DollarString {
            return None;
        }
        let text = self.text(source);
        let tag_len = text[1..].find('$')? + 2;
        Some(self.start + tag_len..self.end - tag_len)
    }
}

/// Postgres-aware tokenizer over a byte range of a source text.
///
/// Token offsets are absolute positions in the source, so tokens produced
/// for a nested range (a `DO` block body, say) can be spliced against the
/// full document without translation.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self::within(source, 0..source.len())
    }

    #[must_use]
    pub fn within(source: &'a str, range: Range<usize>) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: range.start,
            end: range.end.min(source.len()),
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next token including comments.
    pub fn next_raw(&mut self) -> Option<Token> {
        self.skip_whitespace();
        if self.pos >= self.end {
            return None;
        }

        let start = self.pos;
        let kind = self.lex_token();
        Some(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.end && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        let index = self.pos + offset;
        (index < self.end).then(|| self.bytes[index])
    }

    fn lex_token(&mut self) -> TokenKind {
        let byte = self.bytes[self.pos];
        match byte {
            b'-' if self.peek(1) == Some(b'-') => self.lex_line_comment(),
            b'/' if self.peek(1) == Some(b'*') => self.lex_block_comment(),
            b'\'' => self.lex_string(false),
            b'"' => self.lex_quoted_ident(),
            b'$' => self.lex_dollar(),
            b'e' | b'E' if self.peek(1) == Some(b'\'') => {
                self.pos += 1;
                self.lex_string(true)
            }
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b',' => self.single(TokenKind::Comma),
            b'.' if !self.peek(1).is_some_and(|next| next.is_ascii_digit()) => {
                self.single(TokenKind::Dot)
            }
            b';' => self.single(TokenKind::Semicolon),
            _ if is_ident_start(byte) => {
                self.pos += 1;
                while self.pos < self.end && is_ident_continue(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                TokenKind::Word
            }
            _ if byte.is_ascii_digit() || byte == b'.' => {
                self.pos += 1;
                while self.pos < self.end
                    && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'.')
                {
                    self.pos += 1;
                }
                TokenKind::Number
            }
            _ => {
                self.pos += utf8_width(byte);
                TokenKind::Symbol
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn lex_line_comment(&mut self) -> TokenKind {
        while self.pos < self.end && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        TokenKind::Comment
    }

    fn lex_block_comment(&mut self) -> TokenKind {
        let mut depth = 0_usize;
        while self.pos < self.end {
            if self.bytes[self.pos] == b'/' && self.peek(1) == Some(b'*') {
                depth += 1;
                self.pos += 2;
            } else if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return TokenKind::Comment;
                }
            } else {
                self.pos += 1;
            }
        }
        TokenKind::Unterminated(Delimiter::BlockComment)
    }

    fn lex_string(&mut self, backslash_escapes: bool) -> TokenKind {
        self.pos += 1;
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'\\' if backslash_escapes => self.pos += 2,
                b'\'' if self.peek(1) == Some(b'\'') => self.pos += 2,
                b'\'' => {
                    self.pos += 1;
                    return TokenKind::String;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.end;
        TokenKind::Unterminated(Delimiter::SingleQuote)
    }

    fn lex_quoted_ident(&mut self) -> TokenKind {
        self.pos += 1;
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'"' if self.peek(1) == Some(b'"') => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return TokenKind::QuotedIdent;
                }
                _ => self.pos += 1,
            }
        }
        TokenKind::Unterminated(Delimiter::DoubleQuote)
    }

    fn lex_dollar(&mut self) -> TokenKind {
        if self.peek(1).is_some_and(|next| next.is_ascii_digit()) {
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            return TokenKind::Parameter;
        }

        let Some(tag_end) = self.dollar_tag_end() else {
            return self.single(TokenKind::Symbol);
        };

        let tag = &self.source[self.pos..tag_end];
        let body_start = tag_end;
        match self.source[body_start..self.end].find(tag) {
            Some(relative) => {
                self.pos = body_start + relative + tag.len();
                TokenKind::DollarString
            }
            None => {
                self.pos = self.end;
                TokenKind::Unterminated(Delimiter::DollarQuote)
            }
        }
    }

    /// Position just past the closing `$` of a `$tag$` opener at `self.pos`.
    fn dollar_tag_end(&self) -> Option<usize> {
        let mut index = self.pos + 1;
        if index < self.end && self.bytes[index] == b'$' {
            return Some(index + 1);
        }
        if index >= self.end || !is_ident_start(self.bytes[index]) {
            return None;
        }
        while index < self.end && self.bytes[index] != b'$' {
            if !is_ident_continue(self.bytes[index]) || self.bytes[index] == b'$' {
                return None;
            }
            index += 1;
        }
        (index < self.end).then_some(index + 1)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let token = self.next_raw()?;
            if token.kind != TokenKind::Comment {
                return Some(token);
            }
        }
    }
}

/// Byte ranges whose content must never be edited by formatting passes:
/// strings, quoted identifiers, dollar quotes and comments.
#[must_use]
pub fn protected_ranges(source: &str) -> Vec<Range<usize>> {
    let mut lexer = Lexer::new(source);
    let mut ranges = Vec::new();
    while let Some(token) = lexer.next_raw() {
        if matches!(
            token.kind,
            TokenKind::String
                | TokenKind::QuotedIdent
                | TokenKind::DollarString
                | TokenKind::Comment
                | TokenKind::Unterminated(_)
        ) {
            ranges.push(token.span());
        }
    }
    ranges
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn utf8_width(first_byte: u8) -> usize {
    match first_byte {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{Delimiter, Lexer, TokenKind, protected_ranges};

    fn kinds(sql: &str) -> Vec<TokenKind> {
        Lexer::new(sql).map(|token| token.kind).collect()
    }

    #[test]
    fn dollar_quoted_body_is_a_single_token() {
        let sql = "AS $$ BEGIN RETURN 1; END; $$;";
        assert_eq!(
            kinds(sql),
            vec![TokenKind::Word, TokenKind::DollarString, TokenKind::Semicolon]
        );
    }

    #[test]
    fn tagged_dollar_quote_ignores_inner_plain_dollars() {
        let sql = "$fn$ SELECT $$x$$; $fn$";
        let tokens: Vec<_> = Lexer::new(sql).collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::DollarString);
        let content = tokens[0].dollar_content(sql).expect("dollar content");
        assert_eq!(&sql[content], " SELECT $$x$$; ");
    }

    #[test]
    fn positional_parameter_is_not_a_dollar_quote() {
        assert_eq!(
            kinds("WHERE id = $1;"),
            vec![
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Symbol,
                TokenKind::Parameter,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_but_reported_raw() {
        let sql = "-- lead ; comment\nSELECT /* a /* nested */ ; */ 1;";
        assert_eq!(
            kinds(sql),
            vec![TokenKind::Word, TokenKind::Number, TokenKind::Semicolon]
        );
        assert_eq!(protected_ranges(sql).len(), 2);
    }

    #[test]
    fn strings_keep_semicolons_and_doubled_quotes() {
        let sql = "'it''s; fine' E'a\\'b;'";
        let tokens: Vec<_> = Lexer::new(sql).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            tokens[0].string_value(sql).as_deref(),
            Some("it's; fine")
        );
        assert_eq!(tokens[1].kind, TokenKind::String);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_input() {
        assert_eq!(
            kinds("SELECT 'oops;"),
            vec![
                TokenKind::Word,
                TokenKind::Unterminated(Delimiter::SingleQuote)
            ]
        );
        assert_eq!(
            kinds("AS $$ BEGIN"),
            vec![
                TokenKind::Word,
                TokenKind::Unterminated(Delimiter::DollarQuote)
            ]
        );
    }

    #[test]
    fn quoted_identifier_unescapes_doubled_quotes() {
        let sql = r#""Users can ""read""""#;
        let token = Lexer::new(sql).next().expect("token");
        assert_eq!(
            token.ident(sql).map(|ident| ident.value),
            Some(r#"Users can "read""#.to_string())
        );
    }
}
