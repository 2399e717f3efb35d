//! Tokens and source locations shared by the lexer and parser.
//!
//! Both dialects (RazorForge `.rf` and Suflae `.sf`) lex into the same
//! closed [`TokenKind`] enumeration. Dialect differences are confined to
//! the keyword table and the set of legal text-literal prefixes.

use std::fmt;

/// Which language a compilation unit is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    RazorForge,
    Suflae,
}

impl Dialect {
    /// Pick the dialect from a source file extension, if recognized.
    pub fn from_extension(ext: &str) -> Option<Dialect> {
        match ext {
            "rf" => Some(Dialect::RazorForge),
            "sf" => Some(Dialect::Suflae),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::RazorForge => write!(f, "RazorForge"),
            Dialect::Suflae => write!(f, "Suflae"),
        }
    }
}

/// Position of a token or AST node in its source file.
///
/// Lines and columns are 1-based; `offset` is a 0-based byte offset.
/// Locations are plain values, copied freely and never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
    pub file_id: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, offset: usize, file_id: u32) -> Self {
        SourceLocation { line, column, offset, file_id }
    }

    /// A location for synthesized nodes that have no source counterpart.
    pub fn synthetic(file_id: u32) -> Self {
        SourceLocation { line: 1, column: 1, offset: 0, file_id }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Units for duration literals (`5w`, `30m`, `1ms`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl DurationUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            DurationUnit::Weeks => "w",
            DurationUnit::Days => "d",
            DurationUnit::Hours => "h",
            DurationUnit::Minutes => "m",
            DurationUnit::Seconds => "s",
            DurationUnit::Millis => "ms",
            DurationUnit::Micros => "us",
            DurationUnit::Nanos => "ns",
        }
    }

    /// Nanoseconds per unit, the canonical representation of durations.
    pub fn nanos(self) -> i128 {
        match self {
            DurationUnit::Weeks => 7 * 24 * 3_600_000_000_000,
            DurationUnit::Days => 24 * 3_600_000_000_000,
            DurationUnit::Hours => 3_600_000_000_000,
            DurationUnit::Minutes => 60_000_000_000,
            DurationUnit::Seconds => 1_000_000_000,
            DurationUnit::Millis => 1_000_000,
            DurationUnit::Micros => 1_000,
            DurationUnit::Nanos => 1,
        }
    }
}

/// Units for memory-size literals (`64kib`, `2gb`, `0b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    Bytes,
    Kb,
    Kib,
    Mb,
    Mib,
    Gb,
    Gib,
    Tb,
    Tib,
    Pb,
    Pib,
}

impl MemoryUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            MemoryUnit::Bytes => "b",
            MemoryUnit::Kb => "kb",
            MemoryUnit::Kib => "kib",
            MemoryUnit::Mb => "mb",
            MemoryUnit::Mib => "mib",
            MemoryUnit::Gb => "gb",
            MemoryUnit::Gib => "gib",
            MemoryUnit::Tb => "tb",
            MemoryUnit::Tib => "tib",
            MemoryUnit::Pb => "pb",
            MemoryUnit::Pib => "pib",
        }
    }

    pub fn bytes(self) -> i128 {
        match self {
            MemoryUnit::Bytes => 1,
            MemoryUnit::Kb => 1_000,
            MemoryUnit::Kib => 1 << 10,
            MemoryUnit::Mb => 1_000_000,
            MemoryUnit::Mib => 1 << 20,
            MemoryUnit::Gb => 1_000_000_000,
            MemoryUnit::Gib => 1 << 30,
            MemoryUnit::Tb => 1_000_000_000_000,
            MemoryUnit::Tib => 1 << 40,
            MemoryUnit::Pb => 1_000_000_000_000_000,
            MemoryUnit::Pib => 1 << 50,
        }
    }
}

/// Text-literal prefix, one lexer kind per legal combination.
///
/// RazorForge allows `t8`/`t16` width prefixes combined with `r` (raw) and
/// `f` (formatted). Suflae allows `r`/`f` plus the byte-string prefixes
/// `b`, `br`, `bf`, `brf`. The lexer rejects cross-dialect prefixes so the
/// parser never needs to re-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPrefix {
    pub width: TextWidth,
    pub raw: bool,
    pub formatted: bool,
    pub bytes: bool,
}

/// Character width selector for text literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextWidth {
    /// No explicit width prefix; the dialect default applies.
    #[default]
    Default,
    /// `t8` prefix: UTF-8 storage.
    T8,
    /// `t16` prefix: UTF-16 storage.
    T16,
}

impl TextPrefix {
    pub const PLAIN: TextPrefix = TextPrefix {
        width: TextWidth::Default,
        raw: false,
        formatted: false,
        bytes: false,
    };

    /// Parse a prefix string (the identifier directly preceding a quote).
    /// Returns `None` when the string is not a recognized prefix in the
    /// given dialect.
    pub fn parse(prefix: &str, dialect: Dialect) -> Option<TextPrefix> {
        let mut rest = prefix;
        let mut out = TextPrefix::PLAIN;
        if let Some(r) = rest.strip_prefix("t8") {
            out.width = TextWidth::T8;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("t16") {
            out.width = TextWidth::T16;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('b') {
            out.bytes = true;
            rest = r;
        }
        if let Some(r) = rest.strip_prefix('r') {
            out.raw = true;
            rest = r;
        }
        if let Some(r) = rest.strip_prefix('f') {
            out.formatted = true;
            rest = r;
        }
        if !rest.is_empty() {
            return None;
        }
        // Width prefixes are RazorForge-only; byte strings are Suflae-only.
        match dialect {
            Dialect::RazorForge if out.bytes => None,
            Dialect::Suflae if out.width != TextWidth::Default => None,
            _ => Some(out),
        }
    }

    /// True when `word` could be a text prefix in *some* dialect. Used by
    /// the lexer to produce a targeted cross-dialect diagnostic instead of
    /// a generic parse error.
    pub fn is_known_prefix(word: &str) -> bool {
        TextPrefix::parse(word, Dialect::RazorForge).is_some()
            || TextPrefix::parse(word, Dialect::Suflae).is_some()
    }
}

/// The closed set of token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals. Parsed payloads ride on the kind; the raw spelling stays
    // in `Token::lexeme` for round-tripping.
    Integer { value: i128, suffix: Option<String> },
    Float { value: f64, suffix: Option<String> },
    Decimal { digits: String, suffix: Option<String> },
    Duration { nanos: i128, unit: DurationUnit },
    MemorySize { bytes: i128, unit: MemoryUnit },
    Text { prefix: TextPrefix, value: String },
    Letter { value: char },

    Identifier,

    // Declaration keywords
    Record,
    Entity,
    Resident,
    Choice,
    Variant,
    Mutant,
    Protocol,
    Routine,
    Let,
    Var,
    Import,
    As,
    Namespace,
    External,
    Preset,

    // Modifier keywords
    Common,
    Open,
    Sealed,
    Override,
    Follows,
    From,
    Where,
    Usurping,

    // Control flow keywords
    If,
    Else,
    Unless,
    While,
    For,
    Loop,
    When,
    Break,
    Continue,
    Return,

    // Memory-model keywords (RazorForge only)
    Danger,
    Hijacking,
    Viewing,
    Seizing,
    Inspecting,
    Using,

    // Error-handling keywords
    Throw,
    Absent,

    // Range keywords
    To,
    Downto,
    Step,

    // Operator keywords
    Is,
    Isnot,
    In,
    Notin,
    And,
    Or,
    Not,

    // Value keywords
    Me,
    MyType,
    True,
    False,
    NoneLiteral,
    SomeLiteral,

    // Arithmetic operators and overflow variants
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    StarStar,
    PlusWrap,
    MinusWrap,
    StarWrap,
    PlusSaturate,
    MinusSaturate,
    StarSaturate,
    PlusUnchecked,
    MinusUnchecked,
    StarUnchecked,
    PlusChecked,
    MinusChecked,
    StarChecked,

    // Comparison operators
    EqualEqual,
    BangEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // Bitwise operators
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LessLess,
    GreaterGreater,

    // Assignment operators
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashSlashEqual,
    PercentEqual,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Arrow,
    FatArrow,
    Question,
    Bang,
    At,

    /// Statement separator produced at line breaks (suppressed after
    /// continuation tokens).
    Newline,

    /// Synthesized for unlexable input; carries the error in a diagnostic.
    Error,

    Eof,
}

impl TokenKind {
    /// Keyword lookup. Perfect-match on the identifier spelling; the four
    /// scoped-access keywords, `danger`, `usurping`, and `mutant` do not
    /// exist in Suflae and lex as plain identifiers there.
    pub fn keyword(word: &str, dialect: Dialect) -> Option<TokenKind> {
        if dialect == Dialect::Suflae {
            match word {
                "danger" | "hijacking" | "viewing" | "seizing" | "inspecting" | "usurping"
                | "mutant" | "resident" => return None,
                _ => {}
            }
        }
        let kind = match word {
            "record" => TokenKind::Record,
            "entity" => TokenKind::Entity,
            "resident" => TokenKind::Resident,
            "choice" => TokenKind::Choice,
            "variant" => TokenKind::Variant,
            "mutant" => TokenKind::Mutant,
            "protocol" => TokenKind::Protocol,
            "routine" => TokenKind::Routine,
            "let" => TokenKind::Let,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "unless" => TokenKind::Unless,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "loop" => TokenKind::Loop,
            "when" => TokenKind::When,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "namespace" => TokenKind::Namespace,
            "external" => TokenKind::External,
            "preset" => TokenKind::Preset,
            "common" => TokenKind::Common,
            "open" => TokenKind::Open,
            "sealed" => TokenKind::Sealed,
            "override" => TokenKind::Override,
            "follows" => TokenKind::Follows,
            "from" => TokenKind::From,
            "where" => TokenKind::Where,
            "usurping" => TokenKind::Usurping,
            "danger" => TokenKind::Danger,
            "hijacking" => TokenKind::Hijacking,
            "viewing" => TokenKind::Viewing,
            "seizing" => TokenKind::Seizing,
            "inspecting" => TokenKind::Inspecting,
            "using" => TokenKind::Using,
            "throw" => TokenKind::Throw,
            "absent" => TokenKind::Absent,
            "to" => TokenKind::To,
            "downto" => TokenKind::Downto,
            "step" => TokenKind::Step,
            "is" => TokenKind::Is,
            "isnot" => TokenKind::Isnot,
            "in" => TokenKind::In,
            "notin" => TokenKind::Notin,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "me" => TokenKind::Me,
            "MyType" => TokenKind::MyType,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "none" => TokenKind::NoneLiteral,
            "some" => TokenKind::SomeLiteral,
            _ => return None,
        };
        Some(kind)
    }

    /// True for kinds after which a newline continues the current
    /// statement instead of terminating it.
    pub fn continues_line(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::SlashSlash
                | TokenKind::Percent
                | TokenKind::StarStar
                | TokenKind::PlusWrap
                | TokenKind::MinusWrap
                | TokenKind::StarWrap
                | TokenKind::PlusSaturate
                | TokenKind::MinusSaturate
                | TokenKind::StarSaturate
                | TokenKind::PlusUnchecked
                | TokenKind::MinusUnchecked
                | TokenKind::StarUnchecked
                | TokenKind::PlusChecked
                | TokenKind::MinusChecked
                | TokenKind::StarChecked
                | TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::Less
                | TokenKind::Greater
                | TokenKind::LessEqual
                | TokenKind::GreaterEqual
                | TokenKind::Ampersand
                | TokenKind::Pipe
                | TokenKind::Caret
                | TokenKind::LessLess
                | TokenKind::GreaterGreater
                | TokenKind::Equal
                | TokenKind::PlusEqual
                | TokenKind::MinusEqual
                | TokenKind::StarEqual
                | TokenKind::SlashSlashEqual
                | TokenKind::PercentEqual
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::Colon
                | TokenKind::Arrow
                | TokenKind::FatArrow
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::To
                | TokenKind::Downto
                | TokenKind::Step
                | TokenKind::Newline
        )
    }
}

/// A lexed token: kind, raw spelling, and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Token { kind, lexeme: lexeme.into(), location }
    }

    /// True for identifier tokens with exactly this spelling.
    pub fn is_identifier(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_is_exact() {
        assert_eq!(
            TokenKind::keyword("record", Dialect::RazorForge),
            Some(TokenKind::Record)
        );
        assert_eq!(TokenKind::keyword("records", Dialect::RazorForge), None);
        assert_eq!(TokenKind::keyword("Record", Dialect::RazorForge), None);
    }

    #[test]
    fn scoped_keywords_absent_in_suflae() {
        assert_eq!(TokenKind::keyword("viewing", Dialect::Suflae), None);
        assert_eq!(TokenKind::keyword("danger", Dialect::Suflae), None);
        assert_eq!(
            TokenKind::keyword("viewing", Dialect::RazorForge),
            Some(TokenKind::Viewing)
        );
        // `using` is plain resource management and exists in both.
        assert_eq!(
            TokenKind::keyword("using", Dialect::Suflae),
            Some(TokenKind::Using)
        );
    }

    #[test]
    fn text_prefix_combinations() {
        let rf = Dialect::RazorForge;
        let sf = Dialect::Suflae;
        assert!(TextPrefix::parse("t8", rf).is_some());
        assert!(TextPrefix::parse("t16rf", rf).is_some());
        assert!(TextPrefix::parse("rf", rf).is_some());
        assert!(TextPrefix::parse("t16", sf).is_none());
        assert!(TextPrefix::parse("brf", sf).is_some());
        assert!(TextPrefix::parse("b", rf).is_none());
        assert!(TextPrefix::parse("xz", rf).is_none());
    }

    #[test]
    fn duration_and_memory_conversions() {
        assert_eq!(DurationUnit::Minutes.nanos(), 60_000_000_000);
        assert_eq!(MemoryUnit::Kib.bytes(), 1024);
        assert_eq!(MemoryUnit::Kb.bytes(), 1000);
    }
}
