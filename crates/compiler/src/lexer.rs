//! Streaming lexer for RazorForge and Suflae source text.
//!
//! The scanner is context-free apart from three local decisions:
//!
//! - `0b` is a zero-byte memory-size literal unless binary digits follow
//!   (`0b1010` is binary ten).
//! - An identifier immediately followed by a quote is a text-literal
//!   prefix (`r"..."`, `t16f"..."`, `br"..."`); the legal prefix set is
//!   per-dialect and cross-dialect prefixes produce a targeted error.
//! - Newlines terminate statements unless the previous token continues a
//!   line (operators, commas, opening brackets) or bracket nesting is
//!   open; terminating newlines become [`TokenKind::Newline`] tokens.
//!
//! `>>` always lexes as one `GreaterGreater` token; the parser splits it
//! into two `Greater`s when it closes nested generic arguments.
//!
//! Lexical errors synthesize a [`TokenKind::Error`] token, record a
//! diagnostic, and resume at the next boundary.

use crate::diagnostics::Diagnostics;
use crate::token::{
    Dialect, DurationUnit, MemoryUnit, SourceLocation, TextPrefix, Token, TokenKind,
};

/// Integer type suffixes accepted after `_` on a numeric literal.
const INTEGER_SUFFIXES: &[&str] = &[
    "s8", "s16", "s32", "s64", "s128", "u8", "u16", "u32", "u64", "u128", "saddr", "uaddr",
];

/// Float type suffixes accepted after `_` on a numeric literal.
const FLOAT_SUFFIXES: &[&str] = &["f16", "f32", "f64", "f128"];

/// Decimal (IEEE 754-2008 decimal float) type suffixes.
const DECIMAL_SUFFIXES: &[&str] = &["d32", "d64", "d128"];

pub struct Lexer {
    chars: Vec<char>,
    dialect: Dialect,
    file_id: u32,
    pos: usize,
    offset: usize,
    line: u32,
    column: u32,
    /// Open `(`/`[` nesting; newlines inside are insignificant.
    bracket_depth: u32,
    tokens: Vec<Token>,
    diagnostics: Diagnostics,
}

/// Tokenize a whole source buffer. Always returns a sequence terminated by
/// an `Eof` token, plus any lexical diagnostics.
pub fn lex(source: &str, dialect: Dialect, file_id: u32) -> (Vec<Token>, Diagnostics) {
    Lexer::new(source, dialect, file_id).tokenize()
}

impl Lexer {
    pub fn new(source: &str, dialect: Dialect, file_id: u32) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Lexer {
            chars: source.chars().collect(),
            dialect,
            file_id,
            pos: 0,
            offset: 0,
            line: 1,
            column: 1,
            bracket_depth: 0,
            tokens: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Diagnostics) {
        while !self.is_at_end() {
            self.scan_token();
        }
        let loc = self.location();
        self.tokens.push(Token::new(TokenKind::Eof, "", loc));
        (self.tokens, self.diagnostics)
    }

    // ---- cursor helpers ----

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> char {
        *self.chars.get(self.pos).unwrap_or(&'\0')
    }

    fn peek_at(&self, lookahead: usize) -> char {
        *self.chars.get(self.pos + lookahead).unwrap_or(&'\0')
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset, self.file_id)
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) {
        match &kind {
            TokenKind::LeftParen | TokenKind::LeftBracket => self.bracket_depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
            }
            _ => {}
        }
        self.tokens.push(Token::new(kind, lexeme, location));
    }

    fn error(&mut self, message: impl Into<String>, lexeme: String, location: SourceLocation) {
        self.diagnostics.error(message, location);
        self.tokens.push(Token::new(TokenKind::Error, lexeme, location));
    }

    /// Whether a newline here ends a statement.
    fn newline_is_significant(&self) -> bool {
        if self.bracket_depth > 0 {
            return false;
        }
        match self.tokens.last() {
            None => false,
            Some(t) => !t.kind.continues_line(),
        }
    }

    // ---- scanning ----

    fn scan_token(&mut self) {
        let location = self.location();
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' => {}
            '\n' => {
                if self.newline_is_significant() {
                    self.push(TokenKind::Newline, "\n", location);
                }
            }
            '#' => {
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
            }
            '(' => self.push(TokenKind::LeftParen, "(", location),
            ')' => self.push(TokenKind::RightParen, ")", location),
            '[' => self.push(TokenKind::LeftBracket, "[", location),
            ']' => self.push(TokenKind::RightBracket, "]", location),
            '{' => self.push(TokenKind::LeftBrace, "{", location),
            '}' => self.push(TokenKind::RightBrace, "}", location),
            ',' => self.push(TokenKind::Comma, ",", location),
            ';' => self.push(TokenKind::Semicolon, ";", location),
            ':' => self.push(TokenKind::Colon, ":", location),
            '@' => self.push(TokenKind::At, "@", location),
            '~' => self.push(TokenKind::Tilde, "~", location),
            '?' => self.push(TokenKind::Question, "?", location),
            '.' => self.push(TokenKind::Dot, ".", location),
            '&' => self.push(TokenKind::Ampersand, "&", location),
            '|' => self.push(TokenKind::Pipe, "|", location),
            '^' => self.push(TokenKind::Caret, "^", location),
            '+' => self.scan_arith_family(
                location,
                '+',
                TokenKind::Plus,
                TokenKind::PlusWrap,
                TokenKind::PlusSaturate,
                TokenKind::PlusUnchecked,
                TokenKind::PlusChecked,
                Some(TokenKind::PlusEqual),
            ),
            '-' => {
                if self.matches('>') {
                    self.push(TokenKind::Arrow, "->", location);
                } else {
                    self.scan_arith_family(
                        location,
                        '-',
                        TokenKind::Minus,
                        TokenKind::MinusWrap,
                        TokenKind::MinusSaturate,
                        TokenKind::MinusUnchecked,
                        TokenKind::MinusChecked,
                        Some(TokenKind::MinusEqual),
                    );
                }
            }
            '*' => {
                if self.matches('*') {
                    self.push(TokenKind::StarStar, "**", location);
                } else {
                    self.scan_arith_family(
                        location,
                        '*',
                        TokenKind::Star,
                        TokenKind::StarWrap,
                        TokenKind::StarSaturate,
                        TokenKind::StarUnchecked,
                        TokenKind::StarChecked,
                        Some(TokenKind::StarEqual),
                    );
                }
            }
            '/' => {
                if self.matches('/') {
                    if self.matches('=') {
                        self.push(TokenKind::SlashSlashEqual, "//=", location);
                    } else {
                        self.push(TokenKind::SlashSlash, "//", location);
                    }
                } else {
                    self.push(TokenKind::Slash, "/", location);
                }
            }
            '%' => {
                if self.matches('=') {
                    self.push(TokenKind::PercentEqual, "%=", location);
                } else {
                    self.push(TokenKind::Percent, "%", location);
                }
            }
            '=' => {
                if self.matches('=') {
                    self.push(TokenKind::EqualEqual, "==", location);
                } else if self.matches('>') {
                    self.push(TokenKind::FatArrow, "=>", location);
                } else {
                    self.push(TokenKind::Equal, "=", location);
                }
            }
            '!' => {
                if self.matches('=') {
                    self.push(TokenKind::BangEqual, "!=", location);
                } else {
                    self.push(TokenKind::Bang, "!", location);
                }
            }
            '<' => {
                if self.matches('=') {
                    self.push(TokenKind::LessEqual, "<=", location);
                } else if self.matches('<') {
                    self.push(TokenKind::LessLess, "<<", location);
                } else {
                    self.push(TokenKind::Less, "<", location);
                }
            }
            '>' => {
                if self.matches('=') {
                    self.push(TokenKind::GreaterEqual, ">=", location);
                } else if self.matches('>') {
                    self.push(TokenKind::GreaterGreater, ">>", location);
                } else {
                    self.push(TokenKind::Greater, ">", location);
                }
            }
            '"' => self.scan_text(location, TextPrefix::PLAIN, String::from("\"")),
            '\'' => self.scan_letter(location),
            c if c.is_ascii_digit() => self.scan_number(location, c),
            c if c.is_alphabetic() || c == '_' => self.scan_word(location, c),
            other => {
                self.error(
                    format!("unexpected character '{}'", other),
                    other.to_string(),
                    location,
                );
            }
        }
    }

    /// `+`-family operators share a suffix scheme: `%` wrap, `^` saturate,
    /// `!` unchecked, `?` checked, `=` compound assignment.
    #[allow(clippy::too_many_arguments)]
    fn scan_arith_family(
        &mut self,
        location: SourceLocation,
        base: char,
        plain: TokenKind,
        wrap: TokenKind,
        saturate: TokenKind,
        unchecked: TokenKind,
        checked: TokenKind,
        assign: Option<TokenKind>,
    ) {
        let (kind, suffix) = if self.matches('%') {
            (wrap, "%")
        } else if self.matches('^') {
            (saturate, "^")
        } else if self.matches('!') {
            (unchecked, "!")
        } else if self.matches('?') {
            (checked, "?")
        } else if assign.is_some() && self.matches('=') {
            (assign.unwrap(), "=")
        } else {
            (plain, "")
        };
        let mut lexeme = String::new();
        lexeme.push(base);
        lexeme.push_str(suffix);
        self.push(kind, lexeme, location);
    }

    // ---- identifiers, keywords, text prefixes ----

    fn scan_word(&mut self, location: SourceLocation, first: char) {
        let mut word = String::new();
        word.push(first);
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            word.push(self.advance());
        }

        // Identifier directly followed by a quote: text-literal prefix.
        if self.peek() == '"' {
            if let Some(prefix) = TextPrefix::parse(&word, self.dialect) {
                self.advance();
                let mut lexeme = word;
                lexeme.push('"');
                self.scan_text(location, prefix, lexeme);
                return;
            }
            if TextPrefix::is_known_prefix(&word) {
                self.advance();
                let mut lexeme = word.clone();
                lexeme.push('"');
                self.error(
                    format!("text prefix '{}' is not available in {}", word, self.dialect),
                    lexeme,
                    location,
                );
                // Skip the literal body so scanning resumes cleanly.
                self.skip_text_body(false);
                return;
            }
        }

        match TokenKind::keyword(&word, self.dialect) {
            Some(kind) => self.push(kind, word, location),
            None => self.push(TokenKind::Identifier, word, location),
        }
    }

    // ---- text and letter literals ----

    fn scan_text(&mut self, location: SourceLocation, prefix: TextPrefix, mut lexeme: String) {
        let mut value = String::new();
        loop {
            if self.is_at_end() || self.peek() == '\n' {
                self.error("unterminated text literal", lexeme, location);
                return;
            }
            let c = self.advance();
            lexeme.push(c);
            match c {
                '"' => break,
                '\\' if !prefix.raw => match self.scan_escape(&mut lexeme) {
                    Some(decoded) => value.push(decoded),
                    None => {
                        // Diagnostic already recorded; finish the literal
                        // so one bad escape yields one error.
                        self.skip_text_body(prefix.raw);
                        return;
                    }
                },
                other => value.push(other),
            }
        }
        self.push(TokenKind::Text { prefix, value }, lexeme, location);
    }

    /// Consume the remainder of a text literal after an error.
    fn skip_text_body(&mut self, raw: bool) {
        while !self.is_at_end() && self.peek() != '\n' {
            let c = self.advance();
            if c == '"' {
                return;
            }
            if c == '\\' && !raw && !self.is_at_end() && self.peek() != '\n' {
                self.advance();
            }
        }
    }

    fn scan_letter(&mut self, location: SourceLocation) {
        let mut lexeme = String::from("'");
        if self.is_at_end() || self.peek() == '\n' {
            self.error("unterminated letter literal", lexeme, location);
            return;
        }
        let c = self.advance();
        lexeme.push(c);
        let value = if c == '\\' {
            match self.scan_escape(&mut lexeme) {
                Some(decoded) => decoded,
                None => {
                    if self.peek() == '\'' {
                        self.advance();
                    }
                    return;
                }
            }
        } else if c == '\'' {
            self.error("empty letter literal", lexeme, location);
            return;
        } else {
            c
        };
        if self.peek() == '\'' {
            lexeme.push(self.advance());
            self.push(TokenKind::Letter { value }, lexeme, location);
        } else {
            self.error("unterminated letter literal", lexeme, location);
        }
    }

    /// Decode one escape sequence after a consumed `\`. On failure,
    /// records the diagnostic and returns `None`.
    fn scan_escape(&mut self, lexeme: &mut String) -> Option<char> {
        let location = self.location();
        if self.is_at_end() {
            self.error("invalid escape at end of input", lexeme.clone(), location);
            return None;
        }
        let c = self.advance();
        lexeme.push(c);
        match c {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            '0' => Some('\0'),
            '\\' => Some('\\'),
            '"' => Some('"'),
            '\'' => Some('\''),
            '{' => Some('{'),
            '}' => Some('}'),
            'x' => {
                let mut code = String::new();
                for _ in 0..2 {
                    let h = self.peek();
                    if h.is_ascii_hexdigit() {
                        code.push(self.advance());
                        lexeme.push(h);
                    }
                }
                match u8::from_str_radix(&code, 16) {
                    Ok(b) if code.len() == 2 && b.is_ascii() => Some(b as char),
                    _ => {
                        self.error(
                            format!("invalid hex escape '\\x{}'", code),
                            lexeme.clone(),
                            location,
                        );
                        None
                    }
                }
            }
            'u' => {
                if !self.matches('{') {
                    self.error("expected '{' after '\\u'", lexeme.clone(), location);
                    return None;
                }
                lexeme.push('{');
                let mut code = String::new();
                while self.peek().is_ascii_hexdigit() {
                    let h = self.advance();
                    code.push(h);
                    lexeme.push(h);
                }
                if !self.matches('}') {
                    self.error("unterminated unicode escape", lexeme.clone(), location);
                    return None;
                }
                lexeme.push('}');
                u32::from_str_radix(&code, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .or_else(|| {
                        self.error(
                            format!("invalid unicode escape '\\u{{{}}}'", code),
                            lexeme.clone(),
                            location,
                        );
                        None
                    })
            }
            other => {
                self.error(
                    format!("invalid escape '\\{}'", other),
                    lexeme.clone(),
                    location,
                );
                None
            }
        }
    }

    // ---- numeric literals ----

    fn scan_number(&mut self, location: SourceLocation, first: char) {
        let mut lexeme = String::new();
        lexeme.push(first);

        // Radix prefixes. `0b` needs one character of lookahead: binary
        // digits make it a binary literal, anything else makes it the
        // zero-byte memory-size literal.
        if first == '0' {
            match self.peek() {
                'x' | 'X' => {
                    lexeme.push(self.advance());
                    self.scan_radix_digits(location, lexeme, 16);
                    return;
                }
                'o' | 'O' => {
                    lexeme.push(self.advance());
                    self.scan_radix_digits(location, lexeme, 8);
                    return;
                }
                'b' if matches!(self.peek_at(1), '0' | '1') => {
                    lexeme.push(self.advance());
                    self.scan_radix_digits(location, lexeme, 2);
                    return;
                }
                _ => {}
            }
        }

        let mut is_float = false;
        self.scan_decimal_digits(&mut lexeme);

        if self.peek() == '.' && self.peek_at(1).is_ascii_digit() {
            is_float = true;
            lexeme.push(self.advance());
            self.scan_decimal_digits(&mut lexeme);
        }
        if matches!(self.peek(), 'e' | 'E')
            && (self.peek_at(1).is_ascii_digit()
                || (matches!(self.peek_at(1), '+' | '-') && self.peek_at(2).is_ascii_digit()))
        {
            is_float = true;
            lexeme.push(self.advance());
            if matches!(self.peek(), '+' | '-') {
                lexeme.push(self.advance());
            }
            self.scan_decimal_digits(&mut lexeme);
        }

        // `_suffix` attaches an explicit type to the literal.
        if self.peek() == '_' && self.peek_at(1).is_alphabetic() {
            self.advance();
            lexeme.push('_');
            let mut suffix = String::new();
            while self.peek().is_alphanumeric() {
                let c = self.advance();
                suffix.push(c);
                lexeme.push(c);
            }
            self.finish_suffixed_number(location, lexeme, is_float, suffix);
            return;
        }

        // A trailing letter run is a duration or memory-size unit.
        if self.peek().is_alphabetic() {
            let mut unit = String::new();
            while self.peek().is_alphanumeric() {
                let c = self.advance();
                unit.push(c);
                lexeme.push(c);
            }
            self.finish_unit_number(location, lexeme, is_float, unit);
            return;
        }

        let digits: String = lexeme.chars().filter(|c| *c != '_').collect();
        if is_float {
            match digits.parse::<f64>() {
                Ok(value) => {
                    self.push(TokenKind::Float { value, suffix: None }, lexeme, location)
                }
                Err(_) => self.error("malformed float literal", lexeme, location),
            }
        } else {
            match digits.parse::<i128>() {
                Ok(value) => {
                    self.push(TokenKind::Integer { value, suffix: None }, lexeme, location)
                }
                Err(_) => self.error("integer literal out of range", lexeme, location),
            }
        }
    }

    fn scan_decimal_digits(&mut self, lexeme: &mut String) {
        while self.peek().is_ascii_digit()
            || (self.peek() == '_' && self.peek_at(1).is_ascii_digit())
        {
            lexeme.push(self.advance());
        }
    }

    fn scan_radix_digits(&mut self, location: SourceLocation, mut lexeme: String, radix: u32) {
        let mut digits = String::new();
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            let c = self.advance();
            lexeme.push(c);
            if c != '_' {
                digits.push(c);
            }
        }
        // The `_suffix` form also applies to radix literals: 0xFF_u8. The
        // digit run above swallowed it, so peel a trailing known suffix.
        let (digits, suffix) = match digits.rfind(|c: char| c.is_ascii_digit()) {
            Some(_) => {
                let split = digits
                    .char_indices()
                    .rev()
                    .find(|(i, _)| INTEGER_SUFFIXES.contains(&&digits[*i..]))
                    .map(|(i, _)| i);
                match split {
                    Some(i) if i > 0 => {
                        (digits[..i].to_string(), Some(digits[i..].to_string()))
                    }
                    _ => (digits, None),
                }
            }
            None => (digits, None),
        };
        if digits.is_empty() {
            self.error("missing digits in numeric literal", lexeme, location);
            return;
        }
        match i128::from_str_radix(&digits, radix) {
            Ok(value) => self.push(TokenKind::Integer { value, suffix }, lexeme, location),
            Err(_) => self.error(
                format!("invalid digits for base-{} literal", radix),
                lexeme,
                location,
            ),
        }
    }

    fn finish_suffixed_number(
        &mut self,
        location: SourceLocation,
        lexeme: String,
        is_float: bool,
        suffix: String,
    ) {
        let digits: String = lexeme
            .chars()
            .take(lexeme.len() - suffix.len() - 1)
            .filter(|c| *c != '_')
            .collect();
        if INTEGER_SUFFIXES.contains(&suffix.as_str()) {
            if is_float {
                self.error(
                    format!("integer suffix '_{}' on a float literal", suffix),
                    lexeme,
                    location,
                );
                return;
            }
            match digits.parse::<i128>() {
                Ok(value) => self.push(
                    TokenKind::Integer { value, suffix: Some(suffix) },
                    lexeme,
                    location,
                ),
                Err(_) => self.error("integer literal out of range", lexeme, location),
            }
        } else if FLOAT_SUFFIXES.contains(&suffix.as_str()) {
            match digits.parse::<f64>() {
                Ok(value) => self.push(
                    TokenKind::Float { value, suffix: Some(suffix) },
                    lexeme,
                    location,
                ),
                Err(_) => self.error("malformed float literal", lexeme, location),
            }
        } else if DECIMAL_SUFFIXES.contains(&suffix.as_str()) {
            self.push(
                TokenKind::Decimal { digits, suffix: Some(suffix) },
                lexeme,
                location,
            );
        } else {
            self.error(
                format!("unknown numeric type suffix '_{}'", suffix),
                lexeme,
                location,
            );
        }
    }

    fn finish_unit_number(
        &mut self,
        location: SourceLocation,
        lexeme: String,
        is_float: bool,
        unit: String,
    ) {
        let digits: String = lexeme
            .chars()
            .take(lexeme.len() - unit.len())
            .filter(|c| *c != '_')
            .collect();

        let duration = match unit.as_str() {
            "w" => Some(DurationUnit::Weeks),
            "d" => Some(DurationUnit::Days),
            "h" => Some(DurationUnit::Hours),
            "m" => Some(DurationUnit::Minutes),
            "s" => Some(DurationUnit::Seconds),
            "ms" => Some(DurationUnit::Millis),
            "us" => Some(DurationUnit::Micros),
            "ns" => Some(DurationUnit::Nanos),
            _ => None,
        };
        if let Some(unit) = duration {
            let nanos = if is_float {
                digits
                    .parse::<f64>()
                    .ok()
                    .map(|v| (v * unit.nanos() as f64) as i128)
            } else {
                digits.parse::<i128>().ok().map(|v| v * unit.nanos())
            };
            match nanos {
                Some(nanos) => {
                    self.push(TokenKind::Duration { nanos, unit }, lexeme, location)
                }
                None => self.error("malformed duration literal", lexeme, location),
            }
            return;
        }

        let memory = match unit.as_str() {
            "b" => Some(MemoryUnit::Bytes),
            "kb" => Some(MemoryUnit::Kb),
            "kib" => Some(MemoryUnit::Kib),
            "mb" => Some(MemoryUnit::Mb),
            "mib" => Some(MemoryUnit::Mib),
            "gb" => Some(MemoryUnit::Gb),
            "gib" => Some(MemoryUnit::Gib),
            "tb" => Some(MemoryUnit::Tb),
            "tib" => Some(MemoryUnit::Tib),
            "pb" => Some(MemoryUnit::Pb),
            "pib" => Some(MemoryUnit::Pib),
            _ => None,
        };
        if let Some(unit) = memory {
            if is_float {
                self.error(
                    "memory-size literals must be whole numbers",
                    lexeme,
                    location,
                );
                return;
            }
            match digits.parse::<i128>() {
                Ok(v) => self.push(
                    TokenKind::MemorySize { bytes: v * unit.bytes(), unit },
                    lexeme,
                    location,
                ),
                Err(_) => self.error("malformed memory-size literal", lexeme, location),
            }
            return;
        }

        self.error(
            format!("unknown literal suffix '{}'", unit),
            lexeme,
            location,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TextWidth;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = lex(source, Dialect::RazorForge, 0);
        assert!(!diags.had_error(), "unexpected lexical errors: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn first(source: &str) -> TokenKind {
        kinds(source).into_iter().next().unwrap()
    }

    #[test]
    fn zero_b_is_zero_bytes_not_binary_zero() {
        assert_eq!(
            first("0b"),
            TokenKind::MemorySize { bytes: 0, unit: MemoryUnit::Bytes }
        );
        assert_eq!(first("0b1"), TokenKind::Integer { value: 1, suffix: None });
        assert_eq!(
            first("0b1010"),
            TokenKind::Integer { value: 10, suffix: None }
        );
    }

    #[test]
    fn duration_and_memory_literals() {
        assert_eq!(
            first("5w"),
            TokenKind::Duration {
                nanos: 5 * 7 * 24 * 3_600_000_000_000,
                unit: DurationUnit::Weeks
            }
        );
        assert_eq!(
            first("30m"),
            TokenKind::Duration { nanos: 30 * 60_000_000_000, unit: DurationUnit::Minutes }
        );
        assert_eq!(
            first("1ms"),
            TokenKind::Duration { nanos: 1_000_000, unit: DurationUnit::Millis }
        );
        assert_eq!(
            first("64kib"),
            TokenKind::MemorySize { bytes: 64 * 1024, unit: MemoryUnit::Kib }
        );
        assert_eq!(
            first("2gb"),
            TokenKind::MemorySize { bytes: 2_000_000_000, unit: MemoryUnit::Gb }
        );
    }

    #[test]
    fn typed_literal_suffixes() {
        assert_eq!(
            first("42_s32"),
            TokenKind::Integer { value: 42, suffix: Some("s32".into()) }
        );
        assert_eq!(
            first("5_uaddr"),
            TokenKind::Integer { value: 5, suffix: Some("uaddr".into()) }
        );
        assert_eq!(
            first("3.14_f32"),
            TokenKind::Float { value: 3.14, suffix: Some("f32".into()) }
        );
        assert_eq!(
            first("2.5_d64"),
            TokenKind::Decimal { digits: "2.5".into(), suffix: Some("d64".into()) }
        );
    }

    #[test]
    fn bad_suffix_is_a_lexical_error() {
        let (tokens, diags) = lex("42_q7", Dialect::RazorForge, 0);
        assert!(diags.had_error());
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn shift_lexes_as_one_token() {
        assert_eq!(
            kinds("a >> b")[..3],
            [
                TokenKind::Identifier,
                TokenKind::GreaterGreater,
                TokenKind::Identifier
            ]
        );
        // Nested generic closes also lex as `>>`; the parser splits them.
        let k = kinds("List<List<s32>>");
        assert!(k.contains(&TokenKind::GreaterGreater));
    }

    #[test]
    fn text_prefixes_respect_dialect() {
        let (tokens, diags) = lex("t16\"hi\"", Dialect::RazorForge, 0);
        assert!(!diags.had_error());
        match &tokens[0].kind {
            TokenKind::Text { prefix, value } => {
                assert_eq!(prefix.width, TextWidth::T16);
                assert_eq!(value, "hi");
            }
            other => panic!("expected text token, got {:?}", other),
        }

        let (_, diags) = lex("t16\"hi\"", Dialect::Suflae, 0);
        assert!(diags.had_error());
        let (_, diags) = lex("b\"hi\"", Dialect::RazorForge, 0);
        assert!(diags.had_error());
        let (tokens, diags) = lex("br\"hi\\n\"", Dialect::Suflae, 0);
        assert!(!diags.had_error());
        match &tokens[0].kind {
            TokenKind::Text { prefix, value } => {
                assert!(prefix.bytes && prefix.raw);
                // Raw literal keeps the backslash.
                assert_eq!(value, "hi\\n");
            }
            other => panic!("expected text token, got {:?}", other),
        }
    }

    #[test]
    fn overflow_operator_family() {
        assert_eq!(
            kinds("a +% b")[1],
            TokenKind::PlusWrap
        );
        assert_eq!(kinds("a *^ b")[1], TokenKind::StarSaturate);
        assert_eq!(kinds("a -! b")[1], TokenKind::MinusUnchecked);
        assert_eq!(kinds("a +? b")[1], TokenKind::PlusChecked);
        // `^` alone is still bitwise xor.
        assert_eq!(kinds("a ^ b")[1], TokenKind::Caret);
    }

    #[test]
    fn newlines_terminate_statements_but_not_continuations() {
        let k = kinds("let x = 1\nlet y = 2");
        assert!(k.contains(&TokenKind::Newline));
        let k = kinds("let x = 1 +\n2");
        assert!(!k.contains(&TokenKind::Newline));
        let k = kinds("f(1,\n2)");
        assert!(!k.contains(&TokenKind::Newline));
    }

    #[test]
    fn unterminated_text_recovers() {
        let (tokens, diags) = lex("\"abc\nlet", Dialect::RazorForge, 0);
        assert!(diags.had_error());
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Let));
    }

    #[test]
    fn lexemes_match_source_slices() {
        let source = "routine start() {\n  let x: s32 = 42_s32 # trailing\n}\n";
        let (tokens, diags) = lex(source, Dialect::RazorForge, 0);
        assert!(!diags.had_error());
        for t in &tokens {
            if t.kind == TokenKind::Eof {
                continue;
            }
            let slice = &source[t.location.offset..t.location.offset + t.lexeme.len()];
            assert_eq!(slice, t.lexeme, "lexeme mismatch for {:?}", t);
        }
    }

    #[test]
    fn locations_are_one_based(){
        let (tokens, _) = lex("let x", Dialect::RazorForge, 7);
        assert_eq!(tokens[0].location.line, 1);
        assert_eq!(tokens[0].location.column, 1);
        assert_eq!(tokens[1].location.column, 5);
        assert_eq!(tokens[1].location.file_id, 7);
    }
}
