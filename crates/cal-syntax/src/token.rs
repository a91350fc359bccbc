//! Token definitions for C/AL object text.
//!
//! This module defines every token kind the lexer can produce. Tokens are the
//! smallest meaningful units of an exported C/AL object: keywords, names,
//! literals, operators and the structural braces that delimit sections and
//! rows.
//!
//! # Token Categories
//!
//! - **Keywords**: reserved words, matched case-insensitively (`BEGIN`, `begin`
//!   and `Begin` are all [`TokenKind::Begin`])
//! - **Names**: plain identifiers (`Customer`) and quoted identifiers
//!   (`"Line No."`)
//! - **Literals**: strings (`'abc'`), integers, decimals, dates (`311299D`)
//!   and times (`235959T`)
//! - **Operators and punctuation**: `:=`, `<>`, `..`, `::`, braces, brackets
//! - **Special**: [`TokenKind::Unknown`] for unrecoverable spans and
//!   [`TokenKind::EndOfInput`], always the last token of a sequence
//!
//! The variant names are a public contract: syntax highlighting and navigation
//! tooling match on them, and they are serialized verbatim.
//!
//! # Examples
//!
//! ```rust
//! use cal_syntax::{keyword_from_str, TokenKind};
//!
//! assert_eq!(keyword_from_str("begin"), Some(TokenKind::Begin));
//! assert_eq!(keyword_from_str("Object-Properties"), Some(TokenKind::ObjectProperties));
//! assert_eq!(keyword_from_str("Customer"), None);
//! ```

use serde::Serialize;

/// Token types that can be produced by the C/AL lexer.
///
/// The kind is a plain tag; the source spelling lives in [`Token::text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // === Object structure keywords ===
    Object,
    ObjectProperties,
    Properties,
    Fields,
    Keys,
    FieldGroups,
    Code,
    Controls,
    Actions,
    Dataset,
    RequestPage,
    Labels,
    Elements,
    MenuNodes,
    Events,
    RdlData,
    WordLayout,

    // === Object kinds ===
    Table,
    Page,
    Report,
    Codeunit,
    Query,
    XmlPort,
    MenuSuite,
    Form,
    Dataport,

    // === Statement keywords ===
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    Repeat,
    Until,
    For,
    To,
    DownTo,
    Case,
    Of,
    With,
    Exit,
    Break,

    // === Declaration keywords ===
    Var,
    Procedure,
    Local,

    // === Word operators and boolean literals ===
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    In,
    True,
    False,

    // === Names ===
    /// A plain identifier, `Customer`, `No`, `_x1`
    Identifier,
    /// A double-quoted identifier, `"Line No."`; `""` escapes one quote
    QuotedIdentifier,

    // === Literals ===
    /// A single-quoted string, `'it''s'`; `''` escapes one quote
    String,
    Integer,
    Decimal,
    /// Six digits followed by `D`, `311299D`
    Date,
    /// Six digits followed by `T`, `235959T`
    Time,

    // === Operators ===
    /// `:=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    MultiplyAssign,
    /// `/=`
    DivideAssign,
    Plus,
    Minus,
    Multiply,
    Divide,
    Equal,
    /// `<>`
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // === Punctuation ===
    Dot,
    /// `..` range operator
    DotDot,
    /// `::` option access
    DoubleColon,
    Colon,
    Comma,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    /// A structural `{`; comment braces never become tokens
    LeftBrace,
    RightBrace,
    /// `@` in `Name@1000` declaration ids
    At,

    // === Special ===
    /// Unterminated quote or comment, or a disallowed character
    Unknown,
    /// End-of-input marker, always the final token
    EndOfInput,
}

/// Keyword spellings, upper-case. Matching is case-insensitive.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("OBJECT", TokenKind::Object),
    ("OBJECT-PROPERTIES", TokenKind::ObjectProperties),
    ("PROPERTIES", TokenKind::Properties),
    ("FIELDS", TokenKind::Fields),
    ("KEYS", TokenKind::Keys),
    ("FIELDGROUPS", TokenKind::FieldGroups),
    ("CODE", TokenKind::Code),
    ("CONTROLS", TokenKind::Controls),
    ("ACTIONS", TokenKind::Actions),
    ("DATASET", TokenKind::Dataset),
    ("REQUESTPAGE", TokenKind::RequestPage),
    ("LABELS", TokenKind::Labels),
    ("ELEMENTS", TokenKind::Elements),
    ("MENUNODES", TokenKind::MenuNodes),
    ("EVENTS", TokenKind::Events),
    ("RDLDATA", TokenKind::RdlData),
    ("WORDLAYOUT", TokenKind::WordLayout),
    ("TABLE", TokenKind::Table),
    ("PAGE", TokenKind::Page),
    ("REPORT", TokenKind::Report),
    ("CODEUNIT", TokenKind::Codeunit),
    ("QUERY", TokenKind::Query),
    ("XMLPORT", TokenKind::XmlPort),
    ("MENUSUITE", TokenKind::MenuSuite),
    ("FORM", TokenKind::Form),
    ("DATAPORT", TokenKind::Dataport),
    ("BEGIN", TokenKind::Begin),
    ("END", TokenKind::End),
    ("IF", TokenKind::If),
    ("THEN", TokenKind::Then),
    ("ELSE", TokenKind::Else),
    ("WHILE", TokenKind::While),
    ("DO", TokenKind::Do),
    ("REPEAT", TokenKind::Repeat),
    ("UNTIL", TokenKind::Until),
    ("FOR", TokenKind::For),
    ("TO", TokenKind::To),
    ("DOWNTO", TokenKind::DownTo),
    ("CASE", TokenKind::Case),
    ("OF", TokenKind::Of),
    ("WITH", TokenKind::With),
    ("EXIT", TokenKind::Exit),
    ("BREAK", TokenKind::Break),
    ("VAR", TokenKind::Var),
    ("PROCEDURE", TokenKind::Procedure),
    ("LOCAL", TokenKind::Local),
    ("DIV", TokenKind::Div),
    ("MOD", TokenKind::Mod),
    ("AND", TokenKind::And),
    ("OR", TokenKind::Or),
    ("XOR", TokenKind::Xor),
    ("NOT", TokenKind::Not),
    ("IN", TokenKind::In),
    ("TRUE", TokenKind::True),
    ("FALSE", TokenKind::False),
];

/// Looks up a keyword by spelling, ignoring case.
pub fn keyword_from_str(text: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(spelling, _)| spelling.eq_ignore_ascii_case(text))
        .map(|(_, kind)| *kind)
}

impl TokenKind {
    /// True for every reserved word, including the structural ones.
    pub fn is_keyword(self) -> bool {
        KEYWORDS.iter().any(|(_, kind)| *kind == self)
    }

    /// Canonical upper-case spelling of a keyword.
    pub fn keyword_text(self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(spelling, _)| *spelling)
    }

    /// Section keywords open a brace-delimited block inside an object.
    pub fn is_section_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::ObjectProperties
                | TokenKind::Properties
                | TokenKind::Fields
                | TokenKind::Keys
                | TokenKind::FieldGroups
                | TokenKind::Code
                | TokenKind::Controls
                | TokenKind::Actions
                | TokenKind::Dataset
                | TokenKind::RequestPage
                | TokenKind::Labels
                | TokenKind::Elements
                | TokenKind::MenuNodes
                | TokenKind::Events
                | TokenKind::RdlData
                | TokenKind::WordLayout
        )
    }

    /// Sections whose body is a list of `{ col ; col ; ... }` rows.
    pub fn is_row_section(self) -> bool {
        matches!(
            self,
            TokenKind::Fields
                | TokenKind::Keys
                | TokenKind::FieldGroups
                | TokenKind::Controls
                | TokenKind::Actions
                | TokenKind::Dataset
                | TokenKind::Elements
                | TokenKind::MenuNodes
                | TokenKind::Labels
                | TokenKind::Events
        )
    }

    pub fn is_object_kind(self) -> bool {
        matches!(
            self,
            TokenKind::Table
                | TokenKind::Page
                | TokenKind::Report
                | TokenKind::Codeunit
                | TokenKind::Query
                | TokenKind::XmlPort
                | TokenKind::MenuSuite
                | TokenKind::Form
                | TokenKind::Dataport
        )
    }

    /// Keywords that only carry meaning in the object skeleton, so code may
    /// use them as ordinary names (`PAGE.RUN`, `Rec.Code`, `Codeunit 80`).
    pub fn is_soft_keyword(self) -> bool {
        self.is_section_keyword() || self.is_object_kind() || self == TokenKind::Object
    }

    /// Plain or quoted identifier.
    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::Identifier | TokenKind::QuotedIdentifier)
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::String
                | TokenKind::Integer
                | TokenKind::Decimal
                | TokenKind::Date
                | TokenKind::Time
                | TokenKind::True
                | TokenKind::False
        )
    }

    pub fn is_assignment_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::MultiplyAssign
                | TokenKind::DivideAssign
        )
    }
}

/// A token with its source text and location.
///
/// `line` and `column` are 1-based (columns count characters); offsets are
/// 0-based byte offsets into the source, `end_offset` exclusive. Positions
/// never decrease along a token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source slice, quotes included
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        line: usize,
        column: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
            start_offset,
            end_offset,
        }
    }

    /// The logical value of the token: quoted identifiers and strings are
    /// stripped of their delimiters and unescaped, everything else is returned
    /// as written.
    pub fn value(&self) -> String {
        match self.kind {
            TokenKind::String => unescape_quoted(&self.text, '\''),
            TokenKind::QuotedIdentifier => unescape_quoted(&self.text, '"'),
            _ => self.text.clone(),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Short human form used in diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::EndOfInput => "end of input".to_string(),
            kind if kind.is_keyword() => kind.keyword_text().unwrap_or_default().to_string(),
            _ => format!("'{}'", self.text),
        }
    }
}

/// Strips the surrounding `quote` characters and collapses doubled quotes.
///
/// A missing closing quote (as in an unterminated literal) is tolerated.
pub fn unescape_quoted(raw: &str, quote: char) -> String {
    let inner = raw.strip_prefix(quote).unwrap_or(raw);
    let inner = inner.strip_suffix(quote).unwrap_or(inner);
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Re-escapes a string value into single-quoted source form.
pub fn escape_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Re-escapes a name into double-quoted source form.
pub fn escape_quoted_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
