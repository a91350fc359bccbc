//! AST (abstract syntax tree) types for C/AL objects.
//!
//! Nodes refer back to the token sequence they were parsed from through
//! [`NodeSpan`] (indices of the first and last token, inclusive). The tree is
//! built once by the parser and is read-only afterwards.

use serde::Serialize;

/// First and last token index (inclusive) covered by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NodeSpan {
    pub start_token: usize,
    pub end_token: usize,
}

impl NodeSpan {
    pub fn new(start_token: usize, end_token: usize) -> Self {
        Self {
            start_token,
            end_token: end_token.max(start_token),
        }
    }

    pub fn to(self, other: NodeSpan) -> NodeSpan {
        NodeSpan::new(self.start_token, other.end_token)
    }
}

/// Root of a parsed file.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[allow(clippy::upper_case_acronyms)]
pub struct CALDocument {
    pub object: Option<ObjectDeclaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectKind {
    Table,
    Page,
    Report,
    Codeunit,
    Query,
    XMLport,
    MenuSuite,
    Form,
    Dataport,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Table => "Table",
            ObjectKind::Page => "Page",
            ObjectKind::Report => "Report",
            ObjectKind::Codeunit => "Codeunit",
            ObjectKind::Query => "Query",
            ObjectKind::XMLport => "XMLport",
            ObjectKind::MenuSuite => "MenuSuite",
            ObjectKind::Form => "Form",
            ObjectKind::Dataport => "Dataport",
        }
    }
}

/// `OBJECT <Kind> <Id> <Name> { sections }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDeclaration {
    pub kind: ObjectKind,
    pub id: u32,
    pub name: String,
    pub object_properties: Option<PropertySection>,
    pub properties: Option<PropertySection>,
    pub fields: Option<FieldSection>,
    pub keys: Option<KeySection>,
    pub field_groups: Option<FieldGroupSection>,
    pub code: Option<CodeSection>,
    /// Sections consumed without building nodes
    pub skipped_sections: Vec<SkippedSection>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSection {
    pub name: String,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PropertySection {
    pub properties: Vec<Property>,
    pub span: NodeSpan,
}

impl PropertySection {
    /// Case-insensitive lookup by property name.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// `Name=Value`; the value is kept as source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub span: NodeSpan,
}

/// `OnSomething=[VAR ...] BEGIN ... END`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub name: String,
    pub variables: Vec<VariableDeclaration>,
    pub body: BlockStatement,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FieldSection {
    pub fields: Vec<FieldDeclaration>,
    pub span: NodeSpan,
}

/// `{ id ; ; name ; type ; properties }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDeclaration {
    pub id: Option<u32>,
    pub name: String,
    pub data_type: String,
    pub properties: Vec<Property>,
    pub triggers: Vec<Trigger>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KeySection {
    pub keys: Vec<KeyDeclaration>,
    pub span: NodeSpan,
}

/// `{ ; field,field ; properties }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDeclaration {
    pub fields: Vec<String>,
    pub properties: Vec<Property>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FieldGroupSection {
    pub groups: Vec<FieldGroupDeclaration>,
    pub span: NodeSpan,
}

/// `{ id ; name ; field,field }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroupDeclaration {
    pub id: Option<u32>,
    pub name: String,
    pub fields: Vec<String>,
    pub properties: Vec<Property>,
    pub span: NodeSpan,
}

/// Global variables, procedures and top-level triggers of an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CodeSection {
    pub variables: Vec<VariableDeclaration>,
    pub procedures: Vec<ProcedureDeclaration>,
    /// Object-level property triggers plus the trailing documentation trigger
    pub triggers: Vec<Trigger>,
    pub span: NodeSpan,
}

/// `Name@Id : Type`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub id: Option<u32>,
    pub data_type: String,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub id: Option<u32>,
    /// Declared with `VAR`
    pub by_reference: bool,
    pub data_type: String,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureDeclaration {
    pub name: String,
    pub id: Option<u32>,
    pub is_local: bool,
    pub attributes: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub return_name: Option<String>,
    pub return_type: Option<String>,
    pub variables: Vec<VariableDeclaration>,
    pub body: BlockStatement,
    pub span: NodeSpan,
}

/// Statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Statement {
    Block(BlockStatement),
    If(IfStatement),
    While(WhileStatement),
    Repeat(RepeatStatement),
    For(ForStatement),
    Case(CaseStatement),
    With(WithStatement),
    Assignment(AssignmentStatement),
    Call(CallStatement),
    Exit(ExitStatement),
    Break(BreakStatement),
    Empty(EmptyStatement),
}

impl Statement {
    pub fn span(&self) -> NodeSpan {
        match self {
            Statement::Block(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::Repeat(s) => s.span,
            Statement::For(s) => s.span,
            Statement::Case(s) => s.span,
            Statement::With(s) => s.span,
            Statement::Assignment(s) => s.span,
            Statement::Call(s) => s.span,
            Statement::Exit(s) => s.span,
            Statement::Break(s) => s.span,
            Statement::Empty(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatStatement {
    pub body: Vec<Statement>,
    pub condition: Expression,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForDirection {
    To,
    DownTo,
}

/// `FOR variable := start TO|DOWNTO end DO body`
///
/// `variable` is always an [`Expression::Identifier`] or an
/// [`Expression::Member`] chain over identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForStatement {
    pub variable: Expression,
    pub start: Expression,
    pub direction: ForDirection,
    pub end: Expression,
    pub body: Box<Statement>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStatement {
    pub selector: Expression,
    pub branches: Vec<CaseBranch>,
    pub else_branch: Option<Vec<Statement>>,
    pub span: NodeSpan,
}

/// `value, value..value: statement`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseBranch {
    pub values: Vec<Expression>,
    pub body: Statement,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithStatement {
    pub record: Expression,
    pub body: Box<Statement>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentStatement {
    pub target: Expression,
    pub operator: AssignmentOperator,
    pub value: Expression,
    pub span: NodeSpan,
}

/// A call used as a statement, with or without parentheses (`Cust.INIT;`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStatement {
    pub expression: Expression,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitStatement {
    pub value: Option<Expression>,
    pub span: NodeSpan,
}

/// Never carries a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakStatement {
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyStatement {
    pub span: NodeSpan,
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Member(MemberExpression),
    Call(CallExpression),
    ArrayAccess(ArrayAccessExpression),
    Set(SetExpression),
}

impl Expression {
    pub fn span(&self) -> NodeSpan {
        match self {
            Expression::Identifier(e) => e.span,
            Expression::Literal(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Member(e) => e.span,
            Expression::Call(e) => e.span,
            Expression::ArrayAccess(e) => e.span,
            Expression::Set(e) => e.span,
        }
    }

    /// Identifier, or member access whose every link is an identifier.
    pub fn is_member_chain(&self) -> bool {
        match self {
            Expression::Identifier(_) => true,
            Expression::Member(m) => m.object.is_member_chain(),
            _ => false,
        }
    }

    /// Shapes that may appear left of `:=`.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expression::Identifier(_) => true,
            Expression::Member(m) => m.object.is_assignable() || matches!(*m.object, Expression::Call(_)),
            Expression::ArrayAccess(a) => a.array.is_assignable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identifier {
    /// Unescaped name; quotes removed for quoted identifiers
    pub name: String,
    pub quoted: bool,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum LiteralValue {
    Integer(i64),
    /// Kept as written so no precision is lost
    Decimal(String),
    String(String),
    Date(String),
    Time(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
    And,
    Or,
    Xor,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    /// `a..b` inside sets and case labels
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemberSeparator {
    /// `Rec.Field`
    Dot,
    /// `Status::Open`
    DoubleColon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub member: Identifier,
    pub separator: MemberSeparator,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: NodeSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayAccessExpression {
    pub array: Box<Expression>,
    pub indices: Vec<Expression>,
    pub span: NodeSpan,
}

/// `[1, 3..5]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetExpression {
    pub elements: Vec<Expression>,
    pub span: NodeSpan,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, at: usize) -> Expression {
        Expression::Identifier(Identifier {
            name: name.to_string(),
            quoted: false,
            span: NodeSpan::new(at, at),
        })
    }

    fn member(object: Expression, name: &str, at: usize) -> Expression {
        let span = object.span().to(NodeSpan::new(at, at));
        Expression::Member(MemberExpression {
            object: Box::new(object),
            member: Identifier {
                name: name.to_string(),
                quoted: false,
                span: NodeSpan::new(at, at),
            },
            separator: MemberSeparator::Dot,
            span,
        })
    }

    #[test]
    fn member_chain_over_identifiers() {
        let chain = member(member(ident("a", 0), "b", 2), "c", 4);
        assert!(chain.is_member_chain());
        assert_eq!(chain.span(), NodeSpan::new(0, 4));
    }

    #[test]
    fn call_is_not_a_member_chain() {
        let call = Expression::Call(CallExpression {
            callee: Box::new(ident("GetRecord", 0)),
            arguments: vec![],
            span: NodeSpan::new(0, 2),
        });
        assert!(!call.is_member_chain());
        assert!(!member(call.clone(), "Field", 4).is_member_chain());
        assert!(member(call, "Field", 4).is_assignable());
    }

    #[test]
    fn literal_is_not_assignable() {
        let lit = Expression::Literal(Literal {
            value: LiteralValue::Integer(1),
            span: NodeSpan::new(0, 0),
        });
        assert!(!lit.is_assignable());
    }

    #[test]
    fn span_never_runs_backwards() {
        assert_eq!(NodeSpan::new(5, 3), NodeSpan::new(5, 5));
    }
}
