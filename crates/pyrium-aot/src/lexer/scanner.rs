//! The scanner that produces tokens from source text.

use std::collections::VecDeque;

use super::token::AugOperator;
use super::{Span, Token, TokenKind};

/// Columns a tab advances to (next multiple of this width).
const TAB_WIDTH: usize = 8;

const BOM: char = '\u{feff}';

/// A scanner that tokenizes script source code.
///
/// Besides ordinary tokens the scanner synthesizes the layout tokens
/// `Newline`, `Indent` and `Dedent`. Line breaks inside brackets do not end
/// a logical line, and blank or comment-only lines never produce layout
/// tokens.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    indent_stack: Vec<usize>,
    pending: VecDeque<Token>,
    bracket_depth: usize,
    at_line_start: bool,
    line_has_tokens: bool,
    finished: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices().peekable();
        let mut current_pos = 0;
        // Byte order mark
        if let Some((_, BOM)) = chars.peek() {
            chars.next();
            current_pos = BOM.len_utf8();
        }
        Self {
            source,
            chars,
            current_pos,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            bracket_depth: 0,
            at_line_start: true,
            line_has_tokens: false,
            finished: false,
        }
    }

    /// Returns the source text being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            return token;
        }

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                if let Some(token) = self.scan_indentation() {
                    return token;
                }
                if let Some(token) = self.pending.pop_front() {
                    return token;
                }
            }

            self.skip_whitespace_and_comments();
            let start = self.current_pos;

            let Some((_pos, ch)) = self.advance() else {
                return self.finish(start);
            };

            let kind = match ch {
                '\n' | '\r' => {
                    if ch == '\r' && self.peek() == Some('\n') {
                        self.advance();
                    }
                    if self.bracket_depth > 0 {
                        continue;
                    }
                    self.at_line_start = true;
                    self.line_has_tokens = false;
                    return Token::new(TokenKind::Newline, Span::new(start, self.current_pos));
                }

                // Brackets
                '(' => self.open_bracket(TokenKind::LeftParen),
                ')' => self.close_bracket(TokenKind::RightParen),
                '[' => self.open_bracket(TokenKind::LeftBracket),
                ']' => self.close_bracket(TokenKind::RightBracket),
                '{' => self.open_bracket(TokenKind::LeftBrace),
                '}' => self.close_bracket(TokenKind::RightBrace),

                // Single-character tokens
                ',' => TokenKind::Comma,
                ':' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::ColonEqual
                    } else {
                        TokenKind::Colon
                    }
                }
                ';' => TokenKind::Semicolon,
                '~' => TokenKind::Tilde,
                '@' => TokenKind::At,

                // Multi-character tokens
                '.' => match self.peek() {
                    Some(c) if c.is_ascii_digit() => self.scan_number('.'),
                    Some('.') if self.peek_next() == Some('.') => {
                        self.advance();
                        self.advance();
                        TokenKind::Ellipsis
                    }
                    _ => TokenKind::Dot,
                },
                '+' => self.scan_with_aug(TokenKind::Plus, AugOperator::Add),
                '-' => self.scan_minus(),
                '*' => self.scan_star(),
                '/' => self.scan_slash(),
                '%' => self.scan_with_aug(TokenKind::Percent, AugOperator::Mod),
                '&' => self.scan_with_aug(TokenKind::Ampersand, AugOperator::BitAnd),
                '|' => self.scan_with_aug(TokenKind::Pipe, AugOperator::BitOr),
                '^' => self.scan_with_aug(TokenKind::Caret, AugOperator::BitXor),
                '<' => self.scan_less_than(),
                '>' => self.scan_greater_than(),
                '=' => self.scan_equal(),
                '!' => self.scan_bang(),

                // String literals
                '"' | '\'' => self.scan_string(ch, false),

                // Numbers
                '0'..='9' => self.scan_number(ch),

                // Identifiers and prefixed strings
                _ if is_id_start(ch) => self.scan_identifier(ch),

                _ => TokenKind::Invalid(format!("unexpected character '{}'", ch)),
            };

            self.line_has_tokens = true;
            return Token::new(kind, Span::new(start, self.current_pos));
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&mut self) -> Token {
        let token = self.next_token();
        self.pending.push_front(token.clone());
        token
    }

    /// Scans all remaining tokens, including the final `Eof`.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    /// Measures the indentation of a fresh line and queues layout tokens.
    ///
    /// Blank and comment-only lines are consumed entirely.
    fn scan_indentation(&mut self) -> Option<Token> {
        loop {
            let line_start = self.current_pos;
            let mut width = 0;
            while let Some(ch) = self.peek() {
                match ch {
                    ' ' => width += 1,
                    '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                    '\x0c' => width = 0,
                    _ => break,
                }
                self.advance();
            }

            match self.peek() {
                Some('#') => {
                    self.skip_line_comment();
                    self.skip_line_break();
                    continue;
                }
                Some('\n' | '\r') => {
                    self.skip_line_break();
                    continue;
                }
                None => return None,
                Some(_) => {}
            }

            self.at_line_start = false;
            let span = Span::new(line_start, self.current_pos);
            let top = self.indent_stack.last().copied().unwrap_or(0);

            if width > top {
                self.indent_stack.push(width);
                return Some(Token::new(TokenKind::Indent, span));
            }

            while width < self.indent_stack.last().copied().unwrap_or(0) {
                self.indent_stack.pop();
                self.pending.push_back(Token::new(TokenKind::Dedent, span));
            }

            if width != self.indent_stack.last().copied().unwrap_or(0) {
                return Some(Token::new(
                    TokenKind::Invalid("unindent does not match any outer indentation level".into()),
                    span,
                ));
            }

            return None;
        }
    }

    /// Produces the end-of-input sequence: a closing `Newline` if the last
    /// line had tokens, one `Dedent` per open block, then `Eof`.
    fn finish(&mut self, pos: usize) -> Token {
        let span = Span::new(pos, pos);
        if !self.finished {
            self.finished = true;
            if self.line_has_tokens {
                self.pending.push_back(Token::new(TokenKind::Newline, span));
            }
            while self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                self.pending.push_back(Token::new(TokenKind::Dedent, span));
            }
            self.line_has_tokens = false;
            if let Some(token) = self.pending.pop_front() {
                return token;
            }
        }
        Token::new(TokenKind::Eof, span)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\x0c') => {
                    self.advance();
                }
                Some('#') => self.skip_line_comment(),
                Some('\\') if matches!(self.peek_next(), Some('\n' | '\r')) => {
                    // Explicit line joining
                    self.advance();
                    self.skip_line_break();
                }
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' || ch == '\r' {
                break;
            }
            self.advance();
        }
    }

    fn skip_line_break(&mut self) {
        match self.peek() {
            Some('\r') => {
                self.advance();
                if self.peek() == Some('\n') {
                    self.advance();
                }
            }
            Some('\n') => {
                self.advance();
            }
            _ => {}
        }
    }

    fn open_bracket(&mut self, kind: TokenKind) -> TokenKind {
        self.bracket_depth += 1;
        kind
    }

    fn close_bracket(&mut self, kind: TokenKind) -> TokenKind {
        self.bracket_depth = self.bracket_depth.saturating_sub(1);
        kind
    }

    fn scan_with_aug(&mut self, plain: TokenKind, aug: AugOperator) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            TokenKind::AugAssign(aug)
        } else {
            plain
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        match self.peek() {
            Some('>') => {
                self.advance();
                TokenKind::Arrow
            }
            Some('=') => {
                self.advance();
                TokenKind::AugAssign(AugOperator::Sub)
            }
            _ => TokenKind::Minus,
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.peek() == Some('*') {
            self.advance();
            self.scan_with_aug(TokenKind::StarStar, AugOperator::Pow)
        } else {
            self.scan_with_aug(TokenKind::Star, AugOperator::Mult)
        }
    }

    fn scan_slash(&mut self) -> TokenKind {
        if self.peek() == Some('/') {
            self.advance();
            self.scan_with_aug(TokenKind::SlashSlash, AugOperator::FloorDiv)
        } else {
            self.scan_with_aug(TokenKind::Slash, AugOperator::Div)
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        match self.peek() {
            Some('<') => {
                self.advance();
                self.scan_with_aug(TokenKind::LeftShift, AugOperator::LShift)
            }
            Some('=') => {
                self.advance();
                TokenKind::LessThanEqual
            }
            _ => TokenKind::LessThan,
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        match self.peek() {
            Some('>') => {
                self.advance();
                self.scan_with_aug(TokenKind::RightShift, AugOperator::RShift)
            }
            Some('=') => {
                self.advance();
                TokenKind::GreaterThanEqual
            }
            _ => TokenKind::GreaterThan,
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            TokenKind::EqualEqual
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            TokenKind::NotEqual
        } else {
            TokenKind::Invalid("unexpected character '!'".into())
        }
    }

    fn scan_string(&mut self, quote: char, raw: bool) -> TokenKind {
        let triple = self.peek() == Some(quote) && self.peek_next() == Some(quote);
        if triple {
            self.advance();
            self.advance();
        } else if self.peek() == Some(quote) {
            // Empty string
            self.advance();
            return TokenKind::String(String::new());
        }

        let mut value = String::new();

        loop {
            match self.advance() {
                None => return TokenKind::Invalid("unterminated string literal".into()),
                Some((_, ch)) if ch == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_next() == Some(quote) {
                        self.advance();
                        self.advance();
                        break;
                    }
                    value.push(ch);
                }
                Some((_, '\n' | '\r')) if !triple => {
                    return TokenKind::Invalid("unterminated string literal".into());
                }
                Some((_, '\\')) if raw => {
                    value.push('\\');
                    if let Some((_, next)) = self.advance() {
                        value.push(next);
                    }
                }
                Some((_, '\\')) => {
                    let Some((_, escaped)) = self.advance() else {
                        return TokenKind::Invalid("unterminated string literal".into());
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '0' => value.push('\0'),
                        '\n' => {}
                        '\r' => {
                            if self.peek() == Some('\n') {
                                self.advance();
                            }
                        }
                        'x' => match self.scan_hex_escape(2) {
                            Some(c) => value.push(c),
                            None => return TokenKind::Invalid("invalid \\x escape".into()),
                        },
                        'u' => match self.scan_hex_escape(4) {
                            Some(c) => value.push(c),
                            None => return TokenKind::Invalid("invalid \\u escape".into()),
                        },
                        // Unknown escapes are kept verbatim
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        char::from_u32(code)
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut value = String::from(first);
        let mut is_float = first == '.';

        // Handle hex, octal, binary
        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => return self.scan_radix_number(16),
                Some('o' | 'O') => return self.scan_radix_number(8),
                Some('b' | 'B') => return self.scan_radix_number(2),
                _ => {}
            }
        }

        self.scan_digits(&mut value);

        // Fractional part
        if !is_float && self.peek() == Some('.') {
            is_float = true;
            value.push('.');
            self.advance();
            self.scan_digits(&mut value);
        }

        // Exponent part
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign_follows = matches!(self.peek_next(), Some('+' | '-'));
            let digit_follows = self.peek_next().is_some_and(|c| c.is_ascii_digit());
            if sign_follows || digit_follows {
                is_float = true;
                value.push('e');
                self.advance();
                if sign_follows {
                    if let Some((_, sign)) = self.advance() {
                        value.push(sign);
                    }
                }
                self.scan_digits(&mut value);
            }
        }

        if is_float {
            match value.parse::<f64>() {
                Ok(n) => TokenKind::Float(n),
                Err(_) => TokenKind::Invalid(format!("invalid float literal '{}'", value)),
            }
        } else {
            match value.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => TokenKind::Invalid(format!("integer literal '{}' is out of range", value)),
            }
        }
    }

    fn scan_digits(&mut self, value: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                if ch != '_' {
                    value.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_radix_number(&mut self, radix: u32) -> TokenKind {
        self.advance(); // consume the radix marker
        let mut value = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) || ch == '_' {
                if ch != '_' {
                    value.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }

        match i64::from_str_radix(&value, radix) {
            Ok(n) => TokenKind::Int(n),
            Err(_) => TokenKind::Invalid(format!("invalid base-{} literal", radix)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some(quote @ ('"' | '\'')) = self.peek() {
            if let Some((kind, raw)) = string_prefix(&name) {
                self.advance();
                return match self.scan_string(quote, raw) {
                    TokenKind::String(value) => match kind {
                        StringKind::Text => TokenKind::String(value),
                        StringKind::Bytes => TokenKind::Bytes(value),
                        StringKind::Formatted => TokenKind::FString(value),
                    },
                    other => other,
                };
            }
        }

        TokenKind::keyword(&name).unwrap_or(TokenKind::Identifier(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Text,
    Bytes,
    Formatted,
}

/// Classifies a string prefix such as `rb` or `F`; the flag is set for raw
/// strings.
fn string_prefix(prefix: &str) -> Option<(StringKind, bool)> {
    let kind = match prefix.to_ascii_lowercase().as_str() {
        "r" | "u" => StringKind::Text,
        "b" | "rb" | "br" => StringKind::Bytes,
        "f" | "rf" | "fr" => StringKind::Formatted,
        _ => return None,
    };
    Some((kind, prefix.contains(['r', 'R'])))
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}
