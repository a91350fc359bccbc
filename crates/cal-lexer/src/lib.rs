//! C/AL lexer: converts object text into tokens.
//!
//! The same characters mean different things depending on where the scanner
//! is in the object skeleton, so the lexer runs a small context machine next
//! to the character scanner:
//!
//! - a stack of [`LexContext`] modes. `{` opens a comment only while the top
//!   is `CODE_BLOCK`; everywhere else it is a structural brace.
//! - brace and bracket depth counters.
//! - the structural column of the current section row. Columns 1-4 hold
//!   id, indent, type and name, so keyword-shaped text there is an identifier.
//! - the shape of the current `Name=Value` property, so words inside
//!   localized caption lists (`CaptionML=[ENU=Actions;...]`) stay identifiers.
//!
//! Tokenizing never fails. Malformed spans become [`TokenKind::Unknown`]
//! tokens and the sequence always ends with exactly one
//! [`TokenKind::EndOfInput`].
use cal_syntax::token::{keyword_from_str, Token, TokenKind};
use cal_syntax::validation::{LexContext, LexerEndState};
use tracing::{debug, trace};

/// Result of one tokenize pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    pub end_state: LexerEndState,
}

/// Tokenizes a whole source string with a fresh lexer.
pub fn tokenize(source: &str) -> Tokenized {
    Lexer::new(source).tokenize()
}

/// Where the scanner is inside a `Name=Value` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueState {
    /// After `{`, `}` or `;`
    Start,
    /// Reading the property name
    Name,
    /// Past the first `=`; `equals` counts nested `LANG=` assignments
    Value { equals: usize, tokens: usize },
}

#[derive(Debug, Clone, Copy)]
struct RowState {
    column: usize,
}

#[derive(Debug, Clone)]
struct SectionFrame {
    /// Brace depth right after the section's opening `{`
    brace_depth: usize,
    tracks_rows: bool,
    row: Option<RowState>,
}

/// Context machine threaded through the scan loop.
#[derive(Debug, Clone)]
struct ScanState {
    stack: Vec<LexContext>,
    brace_depth: usize,
    bracket_depth: usize,
    /// `[` left open when their row or section closed
    stray_brackets: usize,
    underflow: bool,
    pending_section: Option<TokenKind>,
    sections: Vec<SectionFrame>,
    value: ValueState,
    /// Tokens seen since `OBJECT` in the object header
    header: Option<usize>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            stack: vec![LexContext::Normal],
            brace_depth: 0,
            bracket_depth: 0,
            stray_brackets: 0,
            underflow: false,
            pending_section: None,
            sections: Vec::new(),
            value: ValueState::Start,
            header: None,
        }
    }

    fn top(&self) -> LexContext {
        self.stack.last().copied().unwrap_or(LexContext::Normal)
    }

    fn in_code(&self) -> bool {
        self.top() == LexContext::CodeBlock
    }

    fn push(&mut self, context: LexContext) {
        self.stack.push(context);
        trace!(context = %context, depth = self.stack.len(), "push context");
    }

    /// The open row of the innermost section, if the scanner sits directly in it.
    fn current_row(&self) -> Option<RowState> {
        if self.top() != LexContext::SectionLevel {
            return None;
        }
        let frame = self.sections.last()?;
        let row = frame.row?;
        (self.brace_depth == frame.brace_depth + 1).then_some(row)
    }

    fn in_structural_column(&self) -> bool {
        match self.current_row() {
            Some(row) => row.column <= 4 && !matches!(self.value, ValueState::Value { .. }),
            None => false,
        }
    }

    fn open_brace(&mut self, pending: Option<TokenKind>) {
        self.brace_depth += 1;
        if let Some(section) = pending {
            self.push(LexContext::SectionLevel);
            self.sections.push(SectionFrame {
                brace_depth: self.brace_depth,
                tracks_rows: section.is_row_section(),
                row: None,
            });
        } else if self.top() == LexContext::SectionLevel {
            let depth = self.brace_depth;
            if let Some(frame) = self.sections.last_mut() {
                if frame.tracks_rows && frame.row.is_none() && depth == frame.brace_depth + 1 {
                    frame.row = Some(RowState { column: 1 });
                }
            }
        }
    }

    fn close_brace(&mut self) {
        if self.brace_depth == 0 {
            debug!("closing brace without an open brace");
            self.underflow = true;
            return;
        }
        if self.top() == LexContext::SectionLevel {
            let depth = self.brace_depth;
            let mut close_row = false;
            let mut close_section = false;
            if let Some(frame) = self.sections.last_mut() {
                if frame.row.is_some() && depth == frame.brace_depth + 1 {
                    frame.row = None;
                    close_row = true;
                } else if depth == frame.brace_depth {
                    close_section = true;
                }
            }
            if (close_row || close_section) && self.bracket_depth > 0 {
                // a bracket cannot span rows or sections
                debug!(open = self.bracket_depth, "unclosed bracket at end of row or section");
                self.stray_brackets += self.bracket_depth;
                self.bracket_depth = 0;
            }
            if close_section {
                self.sections.pop();
                self.stack.pop();
                trace!(depth = self.stack.len(), "pop section context");
            }
        }
        self.brace_depth -= 1;
    }

    fn close_bracket(&mut self) {
        if self.bracket_depth == 0 {
            debug!("closing bracket without an open bracket");
        }
        self.bracket_depth = self.bracket_depth.saturating_sub(1);
    }

    fn end_block(&mut self) {
        match self.top() {
            LexContext::CodeBlock => {
                self.stack.pop();
                trace!(depth = self.stack.len(), "pop code block");
            }
            LexContext::Normal => {
                debug!("END would leave the outermost context");
                self.underflow = true;
            }
            LexContext::SectionLevel => {}
        }
    }

    fn next_column(&mut self) {
        if self.bracket_depth != 0 || self.current_row().is_none() {
            return;
        }
        if let Some(row) = self.sections.last_mut().and_then(|f| f.row.as_mut()) {
            row.column += 1;
        }
    }

    fn track_value(&mut self, kind: TokenKind) {
        self.value = match (kind, self.value) {
            (TokenKind::LeftBrace | TokenKind::RightBrace, _) => ValueState::Start,
            (TokenKind::Semicolon, _) if self.bracket_depth == 0 => ValueState::Start,
            (TokenKind::Equal, ValueState::Value { equals, tokens }) if self.bracket_depth == 0 => {
                ValueState::Value { equals: equals + 1, tokens }
            }
            (TokenKind::Equal, _) if self.bracket_depth == 0 => ValueState::Value { equals: 1, tokens: 0 },
            (_, ValueState::Value { equals, tokens }) => ValueState::Value { equals, tokens: tokens + 1 },
            _ => ValueState::Name,
        };
    }

    fn end_state(&self) -> LexerEndState {
        LexerEndState {
            brace_depth: self.brace_depth,
            bracket_depth: self.bracket_depth + self.stray_brackets,
            context_stack: self.stack.clone(),
            context_underflow_detected: self.underflow,
            open_property: matches!(self.value, ValueState::Value { .. }) && !self.in_code(),
            open_row: self.sections.iter().any(|f| f.row.is_some()),
        }
    }
}

/// Decides whether a word is a keyword at the current position.
///
/// Inside code every keyword counts. In the object skeleton a keyword is
/// demoted to an identifier when it follows the object kind in the header
/// (`OBJECT Page 50 Item Code`), sits in a structural row column, inside
/// `[...]`, inside a nested `LANG=` caption value, or (for `BEGIN`/`END`)
/// anywhere in a property value except its first token.
fn classify_word(text: &str, state: &ScanState) -> TokenKind {
    let Some(kind) = keyword_from_str(text) else {
        return TokenKind::Identifier;
    };
    if state.in_code() {
        return kind;
    }
    if state.header.is_some_and(|n| n >= 1) {
        return TokenKind::Identifier;
    }
    if state.in_structural_column() || state.bracket_depth > 0 {
        return TokenKind::Identifier;
    }
    match state.value {
        ValueState::Value { equals, .. } if equals > 1 => TokenKind::Identifier,
        ValueState::Value { tokens, .. } if tokens > 0 && matches!(kind, TokenKind::Begin | TokenKind::End) => {
            TokenKind::Identifier
        }
        _ => kind,
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    byte: usize,
    line: usize,
    col: usize,
}

/// Character scanner that produces tokens with positions.
///
/// A lexer is consumed by [`Lexer::tokenize`]; use a fresh one per source.
pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    byte: usize,
    line: usize,
    col: usize,
    state: ScanState,
}

impl Lexer {
    /// Create a new lexer over the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            byte: 0,
            line: 1,
            col: 1,
            state: ScanState::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }
    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.src.get(self.pos + ahead).copied()
    }
    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            self.byte += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            byte: self.byte,
            line: self.line,
            col: self.col,
        }
    }

    fn make_token(&self, kind: TokenKind, start: Mark) -> Token {
        Token {
            kind,
            text: self.src[start.pos..self.pos].iter().collect(),
            line: start.line,
            column: start.col,
            start_offset: start.byte,
            end_offset: self.byte,
        }
    }

    /// Skips whitespace and comments. An unterminated comment comes back as
    /// an `Unknown` token.
    fn skip_trivia(&mut self) -> Option<Token> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c2) = self.peek() {
                    if c2 == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if c == '/' && self.peek_at(1) == Some('*') {
                let start = self.mark();
                self.advance();
                self.advance();
                if !self.skip_until_closing("*/") {
                    return Some(self.make_token(TokenKind::Unknown, start));
                }
            } else if c == '{' && self.state.in_code() {
                let start = self.mark();
                self.advance();
                if !self.skip_until_closing("}") {
                    return Some(self.make_token(TokenKind::Unknown, start));
                }
            } else {
                break;
            }
        }
        None
    }

    /// Advances past `close`; false if input ended first.
    fn skip_until_closing(&mut self, close: &str) -> bool {
        let close: Vec<char> = close.chars().collect();
        while self.peek().is_some() {
            if close.iter().enumerate().all(|(i, c)| self.peek_at(i) == Some(*c)) {
                for _ in 0..close.len() {
                    self.advance();
                }
                return true;
            }
            self.advance();
        }
        false
    }

    fn read_number(&mut self) -> Token {
        let start = self.mark();
        let mut digits = 0;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            digits += 1;
        }
        if digits == 6 {
            let marker = match self.peek() {
                Some('D') => Some(TokenKind::Date),
                Some('T') => Some(TokenKind::Time),
                _ => None,
            };
            if let Some(kind) = marker {
                if !self.peek_at(1).is_some_and(is_word_char) {
                    self.advance();
                    return self.make_token(kind, start);
                }
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            return self.make_token(TokenKind::Decimal, start);
        }
        self.make_token(TokenKind::Integer, start)
    }

    fn read_word(&mut self) -> Token {
        let start = self.mark();
        while self.peek().is_some_and(is_word_char) {
            self.advance();
        }
        let text: String = self.src[start.pos..self.pos].iter().collect();
        if text.eq_ignore_ascii_case("OBJECT") && self.at_properties_suffix() {
            for _ in 0.."-PROPERTIES".len() {
                self.advance();
            }
            let kind = classify_word("OBJECT-PROPERTIES", &self.state);
            return self.make_token(kind, start);
        }
        let kind = classify_word(&text, &self.state);
        self.make_token(kind, start)
    }

    fn at_properties_suffix(&self) -> bool {
        let suffix = "-PROPERTIES";
        suffix
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i).is_some_and(|s| s.eq_ignore_ascii_case(&c)))
            && !self.peek_at(suffix.len()).is_some_and(is_word_char)
    }

    /// Reads a `'...'` string or `"..."` identifier. Doubled delimiters escape
    /// the delimiter; a line break or end of input before the closing quote
    /// yields an `Unknown` token holding the partial text.
    fn read_quoted(&mut self, quote: char, kind: TokenKind) -> Token {
        let start = self.mark();
        self.advance();
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => return self.make_token(TokenKind::Unknown, start),
                Some(c) if c == quote => {
                    self.advance();
                    if self.peek() == Some(quote) {
                        self.advance();
                    } else {
                        return self.make_token(kind, start);
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Consumes `len` characters and builds the token.
    fn punct(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.mark();
        for _ in 0..len {
            self.advance();
        }
        self.make_token(kind, start)
    }

    fn read_operator(&mut self, c: char) -> Token {
        let next = self.peek_at(1);
        match (c, next) {
            (':', Some('=')) => self.punct(TokenKind::Assign, 2),
            (':', Some(':')) => self.punct(TokenKind::DoubleColon, 2),
            (':', _) => self.punct(TokenKind::Colon, 1),
            ('+', Some('=')) => self.punct(TokenKind::PlusAssign, 2),
            ('+', _) => self.punct(TokenKind::Plus, 1),
            ('-', Some('=')) => self.punct(TokenKind::MinusAssign, 2),
            ('-', _) => self.punct(TokenKind::Minus, 1),
            ('*', Some('=')) => self.punct(TokenKind::MultiplyAssign, 2),
            ('*', _) => self.punct(TokenKind::Multiply, 1),
            ('/', Some('=')) => self.punct(TokenKind::DivideAssign, 2),
            ('/', _) => self.punct(TokenKind::Divide, 1),
            ('<', Some('=')) => self.punct(TokenKind::LessEqual, 2),
            ('<', Some('>')) => self.punct(TokenKind::NotEqual, 2),
            ('<', _) => self.punct(TokenKind::Less, 1),
            ('>', Some('=')) => self.punct(TokenKind::GreaterEqual, 2),
            ('>', _) => self.punct(TokenKind::Greater, 1),
            ('.', Some('.')) => self.punct(TokenKind::DotDot, 2),
            ('.', _) => self.punct(TokenKind::Dot, 1),
            ('=', _) => self.punct(TokenKind::Equal, 1),
            (',', _) => self.punct(TokenKind::Comma, 1),
            (';', _) => self.punct(TokenKind::Semicolon, 1),
            ('(', _) => self.punct(TokenKind::LeftParen, 1),
            (')', _) => self.punct(TokenKind::RightParen, 1),
            ('[', _) => self.punct(TokenKind::LeftBracket, 1),
            (']', _) => self.punct(TokenKind::RightBracket, 1),
            ('{', _) => self.punct(TokenKind::LeftBrace, 1),
            ('}', _) => self.punct(TokenKind::RightBrace, 1),
            ('@', _) => self.punct(TokenKind::At, 1),
            _ => self.punct(TokenKind::Unknown, 1),
        }
    }

    /// Applies the context effects of a token that was just produced.
    fn observe(&mut self, kind: TokenKind) {
        let in_code = self.state.in_code();
        let pending = self.state.pending_section.take();
        let header = self.state.header.take();
        self.state.header = match (kind, header) {
            (TokenKind::Object, _) if self.state.brace_depth == 0 && self.state.top() == LexContext::Normal => Some(0),
            (TokenKind::LeftBrace, _) => None,
            (_, Some(n)) => Some(n + 1),
            _ => None,
        };
        match kind {
            TokenKind::LeftBrace => self.state.open_brace(pending),
            TokenKind::RightBrace => self.state.close_brace(),
            TokenKind::LeftBracket => self.state.bracket_depth += 1,
            TokenKind::RightBracket => self.state.close_bracket(),
            TokenKind::Begin => {
                self.state.push(LexContext::CodeBlock);
                self.state.value = ValueState::Start;
                return;
            }
            TokenKind::Case if in_code => self.state.push(LexContext::CodeBlock),
            TokenKind::End => {
                self.state.end_block();
                if !self.state.in_code() {
                    self.state.value = ValueState::Start;
                }
                return;
            }
            TokenKind::Semicolon if !in_code => self.state.next_column(),
            k if k.is_section_keyword() && !in_code => self.state.pending_section = Some(k),
            _ => {}
        }
        if !in_code {
            self.state.track_value(kind);
        }
    }

    /// Tokenize the entire input into a token sequence ending with
    /// `EndOfInput`, together with the lexer end-state.
    pub fn tokenize(mut self) -> Tokenized {
        let mut tokens = Vec::new();
        loop {
            if let Some(unknown) = self.skip_trivia() {
                tokens.push(unknown);
                continue;
            }
            let tk = match self.peek() {
                None => {
                    let eof = self.make_token(TokenKind::EndOfInput, self.mark());
                    tokens.push(eof);
                    break;
                }
                Some('\'') => self.read_quoted('\'', TokenKind::String),
                Some('"') => self.read_quoted('"', TokenKind::QuotedIdentifier),
                Some(c) if c.is_ascii_digit() => self.read_number(),
                Some(c) if is_word_start(c) => self.read_word(),
                Some(c) => self.read_operator(c),
            };
            self.observe(tk.kind);
            tokens.push(tk);
        }

        let end_state = self.state.end_state();
        debug!(
            tokens = tokens.len(),
            unknown = tokens.iter().filter(|t| t.kind == TokenKind::Unknown).count(),
            brace_depth = end_state.brace_depth,
            bracket_depth = end_state.bracket_depth,
            underflow = end_state.context_underflow_detected,
            "tokenized source"
        );
        Tokenized { tokens, end_state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_syntax::validation::{validate_clean_exit, ViolationCategory};

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).tokens.iter().map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).tokens.iter().map(|t| t.text.clone()).collect()
    }

    fn assert_clean(input: &str) {
        let result = tokenize(input);
        let validation = validate_clean_exit(&result.end_state);
        assert!(validation.passed, "not clean: {:?}\n{}", validation.violations, input);
    }

    #[test]
    fn empty_input_has_single_end_marker() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
        assert_eq!(kinds("  \n // only a comment"), vec![TokenKind::EndOfInput]);
        assert_clean("");
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("begin End BEGIN eNd"),
            vec![TokenKind::Begin, TokenKind::End, TokenKind::Begin, TokenKind::End, TokenKind::EndOfInput]
        );
        assert_clean("begin End BEGIN eNd");
    }

    #[test]
    fn quoted_identifier_and_string_are_distinct() {
        assert_eq!(
            kinds("BEGIN \"Line No.\" := 'Customer Name'; END"),
            vec![
                TokenKind::Begin,
                TokenKind::QuotedIdentifier,
                TokenKind::Assign,
                TokenKind::String,
                TokenKind::Semicolon,
                TokenKind::End,
                TokenKind::EndOfInput,
            ]
        );
        let bare = kinds("\"Line No.\" := 'Customer Name';");
        assert_eq!(
            &bare[..4],
            &[TokenKind::QuotedIdentifier, TokenKind::Assign, TokenKind::String, TokenKind::Semicolon]
        );
    }

    #[test]
    fn doubled_quotes_escape() {
        let result = tokenize("'it''s' \"a\"\"b\"");
        assert_eq!(result.tokens[0].kind, TokenKind::String);
        assert_eq!(result.tokens[0].value(), "it's");
        assert_eq!(result.tokens[1].kind, TokenKind::QuotedIdentifier);
        assert_eq!(result.tokens[1].value(), "a\"b");
    }

    #[test]
    fn unterminated_string_becomes_unknown_and_stops_at_line_end() {
        let result = tokenize("x := 'abc\ny;");
        let k: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Unknown,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(result.tokens[2].text, "'abc");
        assert_eq!(result.tokens[3].line, 2);
    }

    #[test]
    fn date_and_time_need_exactly_six_digits() {
        assert_eq!(kinds("311299D")[0], TokenKind::Date);
        assert_eq!(kinds("235959T")[0], TokenKind::Time);
        assert_eq!(kinds("0D"), vec![TokenKind::Integer, TokenKind::Identifier, TokenKind::EndOfInput]);
        assert_eq!(
            kinds("3112999D"),
            vec![TokenKind::Integer, TokenKind::Identifier, TokenKind::EndOfInput]
        );
        assert_eq!(kinds("311299d"), vec![TokenKind::Integer, TokenKind::Identifier, TokenKind::EndOfInput]);
        assert_eq!(kinds("311299DX"), vec![TokenKind::Integer, TokenKind::Identifier, TokenKind::EndOfInput]);
    }

    #[test]
    fn decimal_versus_range() {
        assert_eq!(kinds("1.5")[0], TokenKind::Decimal);
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::Integer, TokenKind::DotDot, TokenKind::Integer, TokenKind::EndOfInput]
        );
        assert_eq!(
            kinds("Rec.Field"),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier, TokenKind::EndOfInput]
        );
    }

    #[test]
    fn colon_family() {
        assert_eq!(
            kinds("a := b::c : d"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn compound_and_comparison_operators() {
        assert_eq!(
            kinds("+= -= *= /= <> <= >= < >"),
            vec![
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::MultiplyAssign,
                TokenKind::DivideAssign,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn disallowed_character_is_unknown_and_scanning_resumes() {
        assert_eq!(
            kinds("a # b"),
            vec![TokenKind::Identifier, TokenKind::Unknown, TokenKind::Identifier, TokenKind::EndOfInput]
        );
    }

    #[test]
    fn brace_is_comment_only_inside_code() {
        assert_eq!(
            kinds("BEGIN { not code } x := 1; END"),
            vec![
                TokenKind::Begin,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Semicolon,
                TokenKind::End,
                TokenKind::EndOfInput,
            ]
        );
        let outside = tokenize("{ x }");
        assert_eq!(outside.tokens[0].kind, TokenKind::LeftBrace);
        assert_eq!(outside.tokens[2].kind, TokenKind::RightBrace);
        assert_eq!(outside.end_state.brace_depth, 0);
    }

    #[test]
    fn line_and_block_comments() {
        assert_eq!(
            kinds("a // tail\n/* multi\nline */ b"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::EndOfInput]
        );
        let result = tokenize("a /* never closed");
        assert_eq!(result.tokens[1].kind, TokenKind::Unknown);
        assert_eq!(result.tokens[1].text, "/* never closed");
    }

    #[test]
    fn unterminated_brace_comment_in_code() {
        let result = tokenize("BEGIN { open");
        assert_eq!(result.tokens[1].kind, TokenKind::Unknown);
        assert_eq!(result.tokens.last().map(|t| t.kind), Some(TokenKind::EndOfInput));
        assert_eq!(result.end_state.context_stack, vec![LexContext::Normal, LexContext::CodeBlock]);
    }

    #[test]
    fn case_end_does_not_close_enclosing_block() {
        let src = "BEGIN CASE x OF 1: y := 2; END; z := 3; END";
        assert_clean(src);
        let k = kinds(src);
        assert_eq!(k.iter().filter(|k| **k == TokenKind::End).count(), 2);
    }

    #[test]
    fn end_at_top_level_sets_underflow() {
        let result = tokenize("END");
        assert!(result.end_state.context_underflow_detected);
        assert_eq!(result.end_state.context_stack, vec![LexContext::Normal]);
        let validation = validate_clean_exit(&result.end_state);
        assert!(validation.has(ViolationCategory::ContextUnderflow));
    }

    #[test]
    fn stray_closing_brace_clamps_and_flags() {
        let result = tokenize("}");
        assert_eq!(result.end_state.brace_depth, 0);
        assert!(result.end_state.context_underflow_detected);
    }

    #[test]
    fn structural_column_keeps_keywords_as_identifiers() {
        let src = "DATASET\n{\n{ BEGIN ; ; DataItem ; Test }\n}";
        let result = tokenize(src);
        let begin = result.tokens.iter().find(|t| t.text == "BEGIN").expect("BEGIN token");
        assert_eq!(begin.kind, TokenKind::Identifier);
        assert_eq!(result.end_state.brace_depth, 0);
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn row_named_end_or_case() {
        let src = "CONTROLS\n{\n{ 1 ;0 ;End ;CASE }\n{ 2 ;1 ;Field ;SourceExpr=Name }\n}";
        let result = tokenize(src);
        assert!(result.tokens.iter().all(|t| t.kind != TokenKind::End && t.kind != TokenKind::Case));
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn trigger_in_row_pushes_code_block() {
        let src = "FIELDS\n{\n{ 1 ; ;No. ;Code20 ;OnValidate=BEGIN\n  { comment }\n  IF x THEN;\nEND;\n }\n}";
        let result = tokenize(src);
        assert!(result.tokens.iter().any(|t| t.kind == TokenKind::Begin));
        assert!(result.tokens.iter().all(|t| t.text != "comment"));
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn trigger_in_fourth_column_after_equals() {
        let src = "CONTROLS\n{\n{ 3 ;2 ;Field ;OnValidate=BEGIN { note } END }\n}";
        let result = tokenize(src);
        assert_eq!(
            result.tokens.iter().filter(|t| t.kind == TokenKind::Begin).count(),
            1
        );
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn caption_lists_keep_keywords_as_identifiers() {
        let src = "PROPERTIES\n{\nCaptionML=[ENU=Begin;\n           DEU=Actions];\nCaption=ENU=End Date;\n}";
        let result = tokenize(src);
        for word in ["Begin", "Actions", "End"] {
            let tok = result.tokens.iter().find(|t| t.text == word).expect("word present");
            assert_eq!(tok.kind, TokenKind::Identifier, "{word}");
        }
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn begin_later_in_value_is_not_a_block() {
        let src = "PROPERTIES\n{\nOptionString=Open,Begin,End;\n}";
        assert_clean(src);
    }

    #[test]
    fn action_list_value_opens_nested_section() {
        let src = "PROPERTIES\n{\nActionList=ACTIONS\n{\n{ 1 ;0 ;ActionContainer }\n{ 2 ;1 ;Action ;OnAction=BEGIN END }\n}\n}";
        let result = tokenize(src);
        assert!(result.tokens.iter().any(|t| t.kind == TokenKind::Actions));
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn option_ordinal_values_keep_bracket_balance() {
        let src = "PROPERTIES\n{\nOptionOrdinalValues=[-1;0;1];\n}";
        let result = tokenize(src);
        assert_eq!(result.end_state.bracket_depth, 0);
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn unclosed_caption_bracket_ends_with_its_section() {
        let src = "PROPERTIES\n{\nCaptionML=[ENU=Cust;\n}\nFIELDS\n{\n{ 1 ; ;Code ;Code20 }\n}\nCODE\n{\nBEGIN\nEND.\n}";
        let result = tokenize(src);
        for (text, kind) in [("FIELDS", TokenKind::Fields), ("CODE", TokenKind::Code), ("BEGIN", TokenKind::Begin)] {
            let tok = result.tokens.iter().find(|t| t.text == text).expect("word present");
            assert_eq!(tok.kind, kind, "{text}");
        }
        // the row name column still demotes the keyword
        let code_name = result.tokens.iter().find(|t| t.text == "Code").expect("row name");
        assert_eq!(code_name.kind, TokenKind::Identifier);
        assert_eq!(result.end_state.bracket_depth, 1);
        let validation = validate_clean_exit(&result.end_state);
        assert!(validation.has(ViolationCategory::UnbalancedBrackets));
        assert_eq!(result.end_state.context_stack, vec![LexContext::Normal]);
    }

    #[test]
    fn object_properties_is_one_token() {
        let result = tokenize("OBJECT-PROPERTIES\n{\n}");
        assert_eq!(result.tokens[0].kind, TokenKind::ObjectProperties);
        assert_eq!(result.tokens[0].text, "OBJECT-PROPERTIES");
        assert_eq!(result.tokens[1].kind, TokenKind::LeftBrace);
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn header_name_words_are_identifiers() {
        let src = "OBJECT Page 50 Item Code List\n{\nPROPERTIES\n{\n}\n}";
        let result = tokenize(src);
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            &kinds[..6],
            &[
                TokenKind::Object,
                TokenKind::Page,
                TokenKind::Integer,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(
            result.end_state.context_stack,
            vec![LexContext::Normal],
        );
        assert!(validate_clean_exit(&result.end_state).passed);
    }

    #[test]
    fn code_type_outside_section_does_not_arm() {
        let src = "CODE\n{\nVAR\nx@1000 : Code[20];\nBEGIN\nEND.\n}";
        assert_clean(src);
    }

    #[test]
    fn incomplete_property_and_row_are_reported() {
        let result = tokenize("FIELDS\n{\n{ 1 ; ;No. ;Code20 ;Caption=No");
        let validation = validate_clean_exit(&result.end_state);
        assert!(validation.has(ViolationCategory::IncompleteProperty));
        assert!(validation.has(ViolationCategory::IncompleteField));
        assert!(validation.has(ViolationCategory::UnbalancedBraces));
        assert!(validation.has(ViolationCategory::StackMismatch));
    }

    #[test]
    fn positions_track_lines_columns_and_offsets() {
        let result = tokenize("ab\n  ü := 1");
        let t = &result.tokens;
        assert_eq!((t[0].line, t[0].column, t[0].start_offset, t[0].end_offset), (1, 1, 0, 2));
        assert_eq!((t[1].line, t[1].column, t[1].start_offset), (2, 3, 5));
        assert_eq!(t[1].end_offset, 7);
        assert_eq!((t[2].line, t[2].column, t[2].start_offset), (2, 5, 8));
        for pair in t.windows(2) {
            assert!(pair[0].start_offset <= pair[1].start_offset);
        }
    }

    #[test]
    fn retokenizing_is_identical() {
        let src = "OBJECT Codeunit 50000 Test\n{\nCODE\n{\nPROCEDURE Run@1();\nBEGIN\nEND;\n\nBEGIN\nEND.\n}\n}";
        assert_eq!(tokenize(src), tokenize(src));
        assert_eq!(texts(src)[0], "OBJECT");
    }
}
