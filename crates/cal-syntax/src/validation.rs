//! Lexer end-state and the clean-exit check.
//!
//! After a tokenize pass the lexer reports where its context machine ended
//! up. For well-formed input that is exactly where it started: stack
//! `[NORMAL]`, both depth counters at zero and no underflow. Any deviation is
//! a violation from a closed set of six categories.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Lexer mode. The top of the context stack decides how `{` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LexContext {
    Normal,
    /// Inside `BEGIN ... END` or a `CASE ... END`; `{` opens a comment
    CodeBlock,
    /// Inside a section such as `FIELDS { ... }`
    SectionLevel,
}

impl LexContext {
    pub fn as_str(self) -> &'static str {
        match self {
            LexContext::Normal => "NORMAL",
            LexContext::CodeBlock => "CODE_BLOCK",
            LexContext::SectionLevel => "SECTION_LEVEL",
        }
    }
}

impl fmt::Display for LexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexer state after the most recent tokenization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LexerEndState {
    pub brace_depth: usize,
    pub bracket_depth: usize,
    pub context_stack: Vec<LexContext>,
    pub context_underflow_detected: bool,
    /// Input ended inside a `Name=Value` property
    pub open_property: bool,
    /// Input ended inside a `{ ... }` section row
    pub open_row: bool,
}

impl Default for LexerEndState {
    fn default() -> Self {
        Self {
            brace_depth: 0,
            bracket_depth: 0,
            context_stack: vec![LexContext::Normal],
            context_underflow_detected: false,
            open_property: false,
            open_row: false,
        }
    }
}

impl LexerEndState {
    /// Context stack as the upper-case names used by the external contract.
    pub fn context_names(&self) -> Vec<&'static str> {
        self.context_stack.iter().map(|c| c.as_str()).collect()
    }

    pub fn is_clean(&self) -> bool {
        validate_clean_exit(self).passed
    }
}

/// The six clean-exit violation categories. This set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCategory {
    StackMismatch,
    UnbalancedBraces,
    UnbalancedBrackets,
    IncompleteProperty,
    IncompleteField,
    ContextUnderflow,
}

impl ViolationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCategory::StackMismatch => "STACK_MISMATCH",
            ViolationCategory::UnbalancedBraces => "UNBALANCED_BRACES",
            ViolationCategory::UnbalancedBrackets => "UNBALANCED_BRACKETS",
            ViolationCategory::IncompleteProperty => "INCOMPLETE_PROPERTY",
            ViolationCategory::IncompleteField => "INCOMPLETE_FIELD",
            ViolationCategory::ContextUnderflow => "CONTEXT_UNDERFLOW",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub category: ViolationCategory,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub categories: BTreeSet<ViolationCategory>,
}

impl ValidationResult {
    pub fn has(&self, category: ViolationCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// Checks that the lexer returned to its initial state.
pub fn validate_clean_exit(state: &LexerEndState) -> ValidationResult {
    let mut violations = Vec::new();
    let mut push = |category, message: String| violations.push(Violation { category, message });

    if state.context_stack != [LexContext::Normal] {
        push(
            ViolationCategory::StackMismatch,
            format!("context stack ended as [{}], expected [NORMAL]", state.context_names().join(", ")),
        );
    }
    if state.brace_depth != 0 {
        push(
            ViolationCategory::UnbalancedBraces,
            format!("{} unclosed '{{'", state.brace_depth),
        );
    }
    if state.bracket_depth != 0 {
        push(
            ViolationCategory::UnbalancedBrackets,
            format!("{} unclosed '['", state.bracket_depth),
        );
    }
    if state.open_property {
        push(
            ViolationCategory::IncompleteProperty,
            "input ended inside a property value".to_string(),
        );
    }
    if state.open_row {
        push(
            ViolationCategory::IncompleteField,
            "input ended inside a section row".to_string(),
        );
    }
    if state.context_underflow_detected {
        push(
            ViolationCategory::ContextUnderflow,
            "a closing token tried to leave the outermost context".to_string(),
        );
    }

    let categories = violations.iter().map(|v| v.category).collect();
    ValidationResult {
        passed: violations.is_empty(),
        violations,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_clean() {
        let result = validate_clean_exit(&LexerEndState::default());
        assert!(result.passed);
        assert!(result.violations.is_empty());
        assert!(result.categories.is_empty());
    }

    #[test]
    fn every_deviation_is_reported() {
        let state = LexerEndState {
            brace_depth: 2,
            bracket_depth: 1,
            context_stack: vec![LexContext::Normal, LexContext::CodeBlock],
            context_underflow_detected: true,
            open_property: true,
            open_row: true,
        };
        let result = validate_clean_exit(&state);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 6);
        assert_eq!(result.categories.len(), 6);
        assert!(result.violations[0].message.contains("NORMAL, CODE_BLOCK"));
    }

    #[test]
    fn underflow_alone_fails() {
        let state = LexerEndState {
            context_underflow_detected: true,
            ..LexerEndState::default()
        };
        let result = validate_clean_exit(&state);
        assert!(!result.passed);
        assert!(result.has(ViolationCategory::ContextUnderflow));
        assert!(!result.has(ViolationCategory::StackMismatch));
    }

    #[test]
    fn category_names_match_contract() {
        assert_eq!(ViolationCategory::UnbalancedBrackets.to_string(), "UNBALANCED_BRACKETS");
        assert_eq!(LexContext::SectionLevel.to_string(), "SECTION_LEVEL");
    }
}
