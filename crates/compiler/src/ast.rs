//! Abstract syntax tree shared by RazorForge and Suflae.
//!
//! Nodes split into three top-level categories (expressions, statements,
//! declarations) plus [`Program`] as the root. Nodes are immutable after
//! parsing: semantic analysis never writes into them, it decorates them
//! through side tables keyed by [`NodeId`].
//!
//! Each category has a visitor trait with one method per node kind;
//! `accept` performs the dispatch so subsystems only implement the trait.

use crate::token::{SourceLocation, TextPrefix};
use std::fmt;

/// Stable identity of an AST node, assigned densely by the parser.
/// Side tables (resolved types, symbol references) key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out dense node ids during parsing.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        NodeIdGen { next: 0 }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }
}

/// Symbol visibility, attached to declarations and symbols alike.
/// Unmarked declarations are public; `private` and the scoped `public(…)`
/// forms narrow that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Private,
    /// `public(family)`: visible to the type and its descendants.
    Family,
    /// `public(module)`: visible within the defining module.
    Module,
    #[default]
    Public,
    /// `external`: exported with C linkage.
    External,
}

/// A type written in source: a name plus optional generic arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpression {
    pub id: NodeId,
    pub location: SourceLocation,
    pub name: String,
    pub generic_args: Vec<TypeExpression>,
}

impl TypeExpression {
    /// The canonical generic-instantiated spelling, e.g. `List<s32>` or
    /// `Range<BackIndex<uaddr>>`. Used as the registry key everywhere.
    pub fn canonical_name(&self) -> String {
        if self.generic_args.is_empty() {
            self.name.clone()
        } else {
            let args: Vec<String> =
                self.generic_args.iter().map(|a| a.canonical_name()).collect();
            format!("{}<{}>", self.name, args.join(", "))
        }
    }
}

/// Overflow behavior selector on arithmetic operators.
/// `+` is the default (checked), `+%` wraps, `+^` saturates, `+!` is
/// unchecked, `+?` yields a checked result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Default,
    Wrap,
    Saturate,
    Unchecked,
    Checked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add(Overflow),
    Subtract(Overflow),
    Multiply(Overflow),
    Divide,
    FloorDivide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Is,
    IsNot,
    In,
    NotIn,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::Is
                | BinaryOp::IsNot
                | BinaryOp::In
                | BinaryOp::NotIn
        )
    }

    /// Display spelling for diagnostics.
    pub fn spelling(self) -> &'static str {
        match self {
            BinaryOp::Add(Overflow::Default) => "+",
            BinaryOp::Add(Overflow::Wrap) => "+%",
            BinaryOp::Add(Overflow::Saturate) => "+^",
            BinaryOp::Add(Overflow::Unchecked) => "+!",
            BinaryOp::Add(Overflow::Checked) => "+?",
            BinaryOp::Subtract(Overflow::Default) => "-",
            BinaryOp::Subtract(Overflow::Wrap) => "-%",
            BinaryOp::Subtract(Overflow::Saturate) => "-^",
            BinaryOp::Subtract(Overflow::Unchecked) => "-!",
            BinaryOp::Subtract(Overflow::Checked) => "-?",
            BinaryOp::Multiply(Overflow::Default) => "*",
            BinaryOp::Multiply(Overflow::Wrap) => "*%",
            BinaryOp::Multiply(Overflow::Saturate) => "*^",
            BinaryOp::Multiply(Overflow::Unchecked) => "*!",
            BinaryOp::Multiply(Overflow::Checked) => "*?",
            BinaryOp::Divide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "isnot",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "notin",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNot,
}

/// Literal payloads, pre-parsed by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer { value: i128, suffix: Option<String> },
    Float { value: f64, suffix: Option<String> },
    Decimal { digits: String, suffix: Option<String> },
    /// Durations normalize to nanoseconds.
    Duration { nanos: i128 },
    /// Memory sizes normalize to bytes.
    MemorySize { bytes: i128 },
    Text { prefix: TextPrefix, value: String },
    Letter(char),
    Bool(bool),
    /// The `none` keyword (absence for `Maybe<T>`).
    None,
}

/// A call argument with an optional label: `TestType<s64>(value: 42)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub label: Option<String>,
    pub value: Expression,
}

/// Slice-constructor flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    Dynamic,
    Temporary,
}

/// Raw-memory operations spelled with a `!` suffix (`x.size!()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOpKind {
    Size,
    Address,
    Hijack,
    UnsafePtr,
}

impl MemoryOpKind {
    pub fn name(self) -> &'static str {
        match self {
            MemoryOpKind::Size => "size",
            MemoryOpKind::Address => "address",
            MemoryOpKind::Hijack => "hijack",
            MemoryOpKind::UnsafePtr => "unsafe_ptr",
        }
    }

    pub fn from_name(name: &str) -> Option<MemoryOpKind> {
        match name {
            "size" => Some(MemoryOpKind::Size),
            "address" => Some(MemoryOpKind::Address),
            "hijack" => Some(MemoryOpKind::Hijack),
            "unsafe_ptr" => Some(MemoryOpKind::UnsafePtr),
            _ => None,
        }
    }
}

/// A `{ statements...; value }` block usable in expression position.
/// When the final statement is a bare expression it becomes the block's
/// value; otherwise the block evaluates to nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockExpression {
    pub statements: Vec<Statement>,
    pub value: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(LiteralValue),
    Identifier(String),
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// `a < b <= c` evaluated as `a < b and b <= c` with single evaluation
    /// of the shared operands.
    ChainedComparison {
        operands: Vec<Expression>,
        operators: Vec<BinaryOp>,
    },
    /// Calls, constructors, conversions, and generic instantiations all
    /// parse as `Call`; semantic analysis tells them apart by what the
    /// callee resolves to. `crashable` marks the `name!(...)` form.
    Call {
        callee: Box<Expression>,
        type_args: Vec<TypeExpression>,
        arguments: Vec<Argument>,
        crashable: bool,
    },
    Member {
        object: Box<Expression>,
        name: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    /// Block-expression `if`: `let y = if c { 1 } else { 2 }`.
    Conditional {
        condition: Box<Expression>,
        then_branch: BlockExpression,
        else_branch: BlockExpression,
    },
    /// `a to b`, `a downto b`, optional `step c`.
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        step: Option<Box<Expression>>,
        descending: bool,
    },
    Lambda {
        parameters: Vec<Parameter>,
        body: Box<Expression>,
    },
    /// `DynamicSlice<T>(...)` / `TemporarySlice<T>(...)`.
    SliceConstructor {
        kind: SliceKind,
        element_type: TypeExpression,
        arguments: Vec<Argument>,
    },
    /// `x.size!()`, `x.address!()`, `x.hijack!()`, `x.unsafe_ptr!()`.
    MemoryOp {
        op: MemoryOpKind,
        operand: Box<Expression>,
    },
    /// `@intrinsic.path<T, ...>(args)`; legal only inside `danger!`,
    /// checked by the analyzer rather than the parser.
    IntrinsicCall {
        path: String,
        type_args: Vec<TypeExpression>,
        arguments: Vec<Expression>,
    },
    /// `some(expr)`.
    SomeValue(Box<Expression>),
    /// A type used in expression position, e.g. the right operand of
    /// `is` / `isnot` with generic arguments: `x is List<s32>`.
    TypeRef(TypeExpression),
}

impl Expression {
    pub fn new(id: NodeId, location: SourceLocation, kind: ExpressionKind) -> Self {
        Expression { id, location, kind }
    }

    pub fn accept<V: ExpressionVisitor>(&self, visitor: &mut V) -> V::Output {
        match &self.kind {
            ExpressionKind::Literal(value) => visitor.visit_literal(self, value),
            ExpressionKind::Identifier(name) => visitor.visit_identifier(self, name),
            ExpressionKind::Binary { left, op, right } => {
                visitor.visit_binary(self, left, *op, right)
            }
            ExpressionKind::Unary { op, operand } => visitor.visit_unary(self, *op, operand),
            ExpressionKind::ChainedComparison { operands, operators } => {
                visitor.visit_chained_comparison(self, operands, operators)
            }
            ExpressionKind::Call { callee, type_args, arguments, crashable } => {
                visitor.visit_call(self, callee, type_args, arguments, *crashable)
            }
            ExpressionKind::Member { object, name } => visitor.visit_member(self, object, name),
            ExpressionKind::Index { object, index } => visitor.visit_index(self, object, index),
            ExpressionKind::Conditional { condition, then_branch, else_branch } => {
                visitor.visit_conditional(self, condition, then_branch, else_branch)
            }
            ExpressionKind::Range { start, end, step, descending } => {
                visitor.visit_range(self, start, end, step.as_deref(), *descending)
            }
            ExpressionKind::Lambda { parameters, body } => {
                visitor.visit_lambda(self, parameters, body)
            }
            ExpressionKind::SliceConstructor { kind, element_type, arguments } => {
                visitor.visit_slice_constructor(self, *kind, element_type, arguments)
            }
            ExpressionKind::MemoryOp { op, operand } => {
                visitor.visit_memory_op(self, *op, operand)
            }
            ExpressionKind::IntrinsicCall { path, type_args, arguments } => {
                visitor.visit_intrinsic_call(self, path, type_args, arguments)
            }
            ExpressionKind::SomeValue(inner) => visitor.visit_some_value(self, inner),
            ExpressionKind::TypeRef(type_expr) => visitor.visit_type_ref(self, type_expr),
        }
    }
}

/// Visitor over expressions; one method per kind, dispatched by
/// [`Expression::accept`].
pub trait ExpressionVisitor {
    type Output;

    fn visit_literal(&mut self, expr: &Expression, value: &LiteralValue) -> Self::Output;
    fn visit_identifier(&mut self, expr: &Expression, name: &str) -> Self::Output;
    fn visit_binary(
        &mut self,
        expr: &Expression,
        left: &Expression,
        op: BinaryOp,
        right: &Expression,
    ) -> Self::Output;
    fn visit_unary(&mut self, expr: &Expression, op: UnaryOp, operand: &Expression)
    -> Self::Output;
    fn visit_chained_comparison(
        &mut self,
        expr: &Expression,
        operands: &[Expression],
        operators: &[BinaryOp],
    ) -> Self::Output;
    fn visit_call(
        &mut self,
        expr: &Expression,
        callee: &Expression,
        type_args: &[TypeExpression],
        arguments: &[Argument],
        crashable: bool,
    ) -> Self::Output;
    fn visit_member(&mut self, expr: &Expression, object: &Expression, name: &str)
    -> Self::Output;
    fn visit_index(
        &mut self,
        expr: &Expression,
        object: &Expression,
        index: &Expression,
    ) -> Self::Output;
    fn visit_conditional(
        &mut self,
        expr: &Expression,
        condition: &Expression,
        then_branch: &BlockExpression,
        else_branch: &BlockExpression,
    ) -> Self::Output;
    fn visit_range(
        &mut self,
        expr: &Expression,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        descending: bool,
    ) -> Self::Output;
    fn visit_lambda(
        &mut self,
        expr: &Expression,
        parameters: &[Parameter],
        body: &Expression,
    ) -> Self::Output;
    fn visit_slice_constructor(
        &mut self,
        expr: &Expression,
        kind: SliceKind,
        element_type: &TypeExpression,
        arguments: &[Argument],
    ) -> Self::Output;
    fn visit_memory_op(
        &mut self,
        expr: &Expression,
        op: MemoryOpKind,
        operand: &Expression,
    ) -> Self::Output;
    fn visit_intrinsic_call(
        &mut self,
        expr: &Expression,
        path: &str,
        type_args: &[TypeExpression],
        arguments: &[Expression],
    ) -> Self::Output;
    fn visit_some_value(&mut self, expr: &Expression, inner: &Expression) -> Self::Output;
    fn visit_type_ref(&mut self, expr: &Expression, type_expr: &TypeExpression) -> Self::Output;
}

/// A brace-delimited statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub location: SourceLocation,
    pub statements: Vec<Statement>,
}

/// Scoped-access statement flavor: `viewing e as v { ... }` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopedAccessKind {
    Viewing,
    Hijacking,
    Seizing,
    Inspecting,
    Using,
}

impl ScopedAccessKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ScopedAccessKind::Viewing => "viewing",
            ScopedAccessKind::Hijacking => "hijacking",
            ScopedAccessKind::Seizing => "seizing",
            ScopedAccessKind::Inspecting => "inspecting",
            ScopedAccessKind::Using => "using",
        }
    }

    /// The scoped-token wrapper a binding of this kind carries.
    pub fn token_type(self) -> Option<&'static str> {
        match self {
            ScopedAccessKind::Viewing => Some("Viewed"),
            ScopedAccessKind::Hijacking => Some("Hijacked"),
            ScopedAccessKind::Seizing => Some("Seized"),
            ScopedAccessKind::Inspecting => Some("Inspected"),
            ScopedAccessKind::Using => None,
        }
    }
}

/// One arm of a `when` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenArm {
    pub pattern: Pattern,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Expression(Expression),
    /// Declarations in statement position (`let`, `var`, nested `preset`).
    Declaration(Box<Declaration>),
    Assignment {
        target: Expression,
        /// Compound-assignment operator, if any (`+=` carries `Add`).
        op: Option<BinaryOp>,
        value: Expression,
    },
    Return(Option<Expression>),
    If {
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    Loop {
        body: Block,
    },
    For {
        variable: String,
        iterable: Expression,
        body: Block,
    },
    When {
        subject: Expression,
        arms: Vec<WhenArm>,
    },
    Break(Option<Expression>),
    Continue,
    Block(Block),
    /// `danger! { ... }` enables intrinsics and raw-memory operations.
    Danger(Block),
    ScopedAccess {
        kind: ScopedAccessKind,
        subject: Expression,
        binding: String,
        body: Block,
    },
    Throw(Expression),
    /// Bare `absent` inside a fallible routine.
    Absent,
}

impl Statement {
    pub fn new(id: NodeId, location: SourceLocation, kind: StatementKind) -> Self {
        Statement { id, location, kind }
    }

    pub fn accept<V: StatementVisitor>(&self, visitor: &mut V) -> V::Output {
        match &self.kind {
            StatementKind::Expression(expr) => visitor.visit_expression_stmt(self, expr),
            StatementKind::Declaration(decl) => visitor.visit_declaration_stmt(self, decl),
            StatementKind::Assignment { target, op, value } => {
                visitor.visit_assignment(self, target, *op, value)
            }
            StatementKind::Return(value) => visitor.visit_return(self, value.as_ref()),
            StatementKind::If { condition, then_block, else_block } => {
                visitor.visit_if(self, condition, then_block, else_block.as_ref())
            }
            StatementKind::While { condition, body } => visitor.visit_while(self, condition, body),
            StatementKind::Loop { body } => visitor.visit_loop(self, body),
            StatementKind::For { variable, iterable, body } => {
                visitor.visit_for(self, variable, iterable, body)
            }
            StatementKind::When { subject, arms } => visitor.visit_when(self, subject, arms),
            StatementKind::Break(value) => visitor.visit_break(self, value.as_ref()),
            StatementKind::Continue => visitor.visit_continue(self),
            StatementKind::Block(block) => visitor.visit_block(self, block),
            StatementKind::Danger(block) => visitor.visit_danger(self, block),
            StatementKind::ScopedAccess { kind, subject, binding, body } => {
                visitor.visit_scoped_access(self, *kind, subject, binding, body)
            }
            StatementKind::Throw(value) => visitor.visit_throw(self, value),
            StatementKind::Absent => visitor.visit_absent(self),
        }
    }
}

pub trait StatementVisitor {
    type Output;

    fn visit_expression_stmt(&mut self, stmt: &Statement, expr: &Expression) -> Self::Output;
    fn visit_declaration_stmt(&mut self, stmt: &Statement, decl: &Declaration) -> Self::Output;
    fn visit_assignment(
        &mut self,
        stmt: &Statement,
        target: &Expression,
        op: Option<BinaryOp>,
        value: &Expression,
    ) -> Self::Output;
    fn visit_return(&mut self, stmt: &Statement, value: Option<&Expression>) -> Self::Output;
    fn visit_if(
        &mut self,
        stmt: &Statement,
        condition: &Expression,
        then_block: &Block,
        else_block: Option<&Block>,
    ) -> Self::Output;
    fn visit_while(&mut self, stmt: &Statement, condition: &Expression, body: &Block)
    -> Self::Output;
    fn visit_loop(&mut self, stmt: &Statement, body: &Block) -> Self::Output;
    fn visit_for(
        &mut self,
        stmt: &Statement,
        variable: &str,
        iterable: &Expression,
        body: &Block,
    ) -> Self::Output;
    fn visit_when(&mut self, stmt: &Statement, subject: &Expression, arms: &[WhenArm])
    -> Self::Output;
    fn visit_break(&mut self, stmt: &Statement, value: Option<&Expression>) -> Self::Output;
    fn visit_continue(&mut self, stmt: &Statement) -> Self::Output;
    fn visit_block(&mut self, stmt: &Statement, block: &Block) -> Self::Output;
    fn visit_danger(&mut self, stmt: &Statement, block: &Block) -> Self::Output;
    fn visit_scoped_access(
        &mut self,
        stmt: &Statement,
        kind: ScopedAccessKind,
        subject: &Expression,
        binding: &str,
        body: &Block,
    ) -> Self::Output;
    fn visit_throw(&mut self, stmt: &Statement, value: &Expression) -> Self::Output;
    fn visit_absent(&mut self, stmt: &Statement) -> Self::Output;
}

/// A function parameter. `me` receivers are ordinary parameters by the
/// time they reach analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: Option<TypeExpression>,
}

/// A generic parameter with optional protocol constraints
/// (`<T: Comparable>` or a `where T follows Comparable` clause).
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub location: SourceLocation,
    pub name: String,
    pub constraints: Vec<TypeExpression>,
}

/// Declaration modifiers parsed before the keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_common: bool,
    pub is_open: bool,
    pub is_sealed: bool,
    pub is_override: bool,
    pub is_usurping: bool,
}

/// A routine declaration (free function, method, or protocol signature).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub location: SourceLocation,
    /// Base name without the `!` suffix.
    pub name: String,
    /// True when declared with a `!` suffix (fallible).
    pub fallible: bool,
    /// Receiver type for `routine Type<T>.method(...)` declarations.
    pub receiver: Option<TypeExpression>,
    pub generic_params: Vec<GenericParam>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeExpression>,
    /// `None` for protocol signatures and external declarations.
    pub body: Option<Block>,
    pub modifiers: Modifiers,
}

impl FunctionDecl {
    /// Source spelling, with the `!` restored.
    pub fn display_name(&self) -> String {
        if self.fallible { format!("{}!", self.name) } else { self.name.clone() }
    }
}

/// A field of a record, entity, resident, or mutant.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: TypeExpression,
    pub visibility: Visibility,
}

/// Shared shape of record/entity/resident/mutant declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub location: SourceLocation,
    pub name: String,
    pub generic_params: Vec<GenericParam>,
    /// Base entity for `entity Dog from Animal`.
    pub base: Option<TypeExpression>,
    /// Protocols named in a `follows` clause.
    pub follows: Vec<TypeExpression>,
    pub fields: Vec<Field>,
    pub modifiers: Modifiers,
}

/// A case of a `choice` declaration, with an optional explicit value.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceCase {
    pub location: SourceLocation,
    pub name: String,
    pub value: Option<i64>,
}

/// A case of a `variant` declaration. The payload is a single type, not
/// a tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCase {
    pub location: SourceLocation,
    pub name: String,
    pub payload: Option<TypeExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Variable {
        mutable: bool,
        name: String,
        declared_type: Option<TypeExpression>,
        initializer: Option<Expression>,
        visibility: Visibility,
    },
    Function(FunctionDecl),
    Record(TypeDecl),
    Entity(TypeDecl),
    /// Reference semantics with a fixed size; RazorForge only.
    Resident(TypeDecl),
    /// Untagged union; danger-only.
    Mutant(TypeDecl),
    Choice {
        name: String,
        cases: Vec<ChoiceCase>,
        modifiers: Modifiers,
    },
    Variant {
        name: String,
        generic_params: Vec<GenericParam>,
        cases: Vec<VariantCase>,
        modifiers: Modifiers,
    },
    Protocol {
        name: String,
        generic_params: Vec<GenericParam>,
        signatures: Vec<FunctionDecl>,
        modifiers: Modifiers,
    },
    /// `implementation Type follows Protocol { methods }`.
    Implementation {
        target: TypeExpression,
        protocol: Option<TypeExpression>,
        methods: Vec<FunctionDecl>,
    },
    Import {
        /// Slash-separated path segments: `import A/B/C`.
        path: Vec<String>,
        alias: Option<String>,
        /// Selective list: `import A/{B, C}`.
        selective: Vec<String>,
    },
    Namespace {
        path: Vec<String>,
    },
    /// FFI declaration with a calling convention.
    ExternalFunction {
        name: String,
        parameters: Vec<Parameter>,
        return_type: Option<TypeExpression>,
        convention: String,
    },
    /// Compile-time constant.
    Preset {
        name: String,
        declared_type: Option<TypeExpression>,
        value: Expression,
        visibility: Visibility,
    },
}

impl Declaration {
    pub fn new(id: NodeId, location: SourceLocation, kind: DeclarationKind) -> Self {
        Declaration { id, location, kind }
    }

    pub fn accept<V: DeclarationVisitor>(&self, visitor: &mut V) -> V::Output {
        match &self.kind {
            DeclarationKind::Variable { mutable, name, declared_type, initializer, visibility } => {
                visitor.visit_variable(
                    self,
                    *mutable,
                    name,
                    declared_type.as_ref(),
                    initializer.as_ref(),
                    *visibility,
                )
            }
            DeclarationKind::Function(func) => visitor.visit_function(self, func),
            DeclarationKind::Record(decl) => visitor.visit_record(self, decl),
            DeclarationKind::Entity(decl) => visitor.visit_entity(self, decl),
            DeclarationKind::Resident(decl) => visitor.visit_resident(self, decl),
            DeclarationKind::Mutant(decl) => visitor.visit_mutant(self, decl),
            DeclarationKind::Choice { name, cases, modifiers } => {
                visitor.visit_choice(self, name, cases, modifiers)
            }
            DeclarationKind::Variant { name, generic_params, cases, modifiers } => {
                visitor.visit_variant(self, name, generic_params, cases, modifiers)
            }
            DeclarationKind::Protocol { name, generic_params, signatures, modifiers } => {
                visitor.visit_protocol(self, name, generic_params, signatures, modifiers)
            }
            DeclarationKind::Implementation { target, protocol, methods } => {
                visitor.visit_implementation(self, target, protocol.as_ref(), methods)
            }
            DeclarationKind::Import { path, alias, selective } => {
                visitor.visit_import(self, path, alias.as_deref(), selective)
            }
            DeclarationKind::Namespace { path } => visitor.visit_namespace(self, path),
            DeclarationKind::ExternalFunction { name, parameters, return_type, convention } => {
                visitor.visit_external(self, name, parameters, return_type.as_ref(), convention)
            }
            DeclarationKind::Preset { name, declared_type, value, visibility } => {
                visitor.visit_preset(self, name, declared_type.as_ref(), value, *visibility)
            }
        }
    }
}

pub trait DeclarationVisitor {
    type Output;

    fn visit_variable(
        &mut self,
        decl: &Declaration,
        mutable: bool,
        name: &str,
        declared_type: Option<&TypeExpression>,
        initializer: Option<&Expression>,
        visibility: Visibility,
    ) -> Self::Output;
    fn visit_function(&mut self, decl: &Declaration, func: &FunctionDecl) -> Self::Output;
    fn visit_record(&mut self, decl: &Declaration, type_decl: &TypeDecl) -> Self::Output;
    fn visit_entity(&mut self, decl: &Declaration, type_decl: &TypeDecl) -> Self::Output;
    fn visit_resident(&mut self, decl: &Declaration, type_decl: &TypeDecl) -> Self::Output;
    fn visit_mutant(&mut self, decl: &Declaration, type_decl: &TypeDecl) -> Self::Output;
    fn visit_choice(
        &mut self,
        decl: &Declaration,
        name: &str,
        cases: &[ChoiceCase],
        modifiers: &Modifiers,
    ) -> Self::Output;
    fn visit_variant(
        &mut self,
        decl: &Declaration,
        name: &str,
        generic_params: &[GenericParam],
        cases: &[VariantCase],
        modifiers: &Modifiers,
    ) -> Self::Output;
    fn visit_protocol(
        &mut self,
        decl: &Declaration,
        name: &str,
        generic_params: &[GenericParam],
        signatures: &[FunctionDecl],
        modifiers: &Modifiers,
    ) -> Self::Output;
    fn visit_implementation(
        &mut self,
        decl: &Declaration,
        target: &TypeExpression,
        protocol: Option<&TypeExpression>,
        methods: &[FunctionDecl],
    ) -> Self::Output;
    fn visit_import(
        &mut self,
        decl: &Declaration,
        path: &[String],
        alias: Option<&str>,
        selective: &[String],
    ) -> Self::Output;
    fn visit_namespace(&mut self, decl: &Declaration, path: &[String]) -> Self::Output;
    fn visit_external(
        &mut self,
        decl: &Declaration,
        name: &str,
        parameters: &[Parameter],
        return_type: Option<&TypeExpression>,
        convention: &str,
    ) -> Self::Output;
    fn visit_preset(
        &mut self,
        decl: &Declaration,
        name: &str,
        declared_type: Option<&TypeExpression>,
        value: &Expression,
        visibility: Visibility,
    ) -> Self::Output;
}

/// Patterns appearing in `when` arms.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: PatternKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Literal(LiteralValue),
    /// Bare identifier: binds the subject.
    Binding(String),
    /// Type pattern with optional binding: `s32 x`. Pattern contexts
    /// suppress the `is` operator so these parse unambiguously.
    Type {
        type_expr: TypeExpression,
        binding: Option<String>,
    },
    /// Variant-case pattern with optional payload binding: `Circle(r)`.
    VariantCase {
        name: String,
        binding: Option<String>,
    },
    /// `_`
    Wildcard,
    /// Boolean guard expression.
    Expression(Expression),
    /// `none`
    None,
    /// `some x`
    Some(Option<String>),
}

/// Root of a compilation unit: an ordered declaration list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

impl Program {
    pub fn new() -> Self {
        Program { declarations: Vec::new() }
    }

    /// The file-level namespace declaration, if the file starts with one.
    pub fn namespace(&self) -> Option<&[String]> {
        self.declarations.iter().find_map(|d| match &d.kind {
            DeclarationKind::Namespace { path } => Some(path.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1, 0, 0)
    }

    #[test]
    fn canonical_names_nest() {
        let mut ids = NodeIdGen::new();
        let inner = TypeExpression {
            id: ids.next(),
            location: loc(),
            name: "BackIndex".into(),
            generic_args: vec![TypeExpression {
                id: ids.next(),
                location: loc(),
                name: "uaddr".into(),
                generic_args: vec![],
            }],
        };
        let range = TypeExpression {
            id: ids.next(),
            location: loc(),
            name: "Range".into(),
            generic_args: vec![inner],
        };
        assert_eq!(range.canonical_name(), "Range<BackIndex<uaddr>>");
    }

    #[test]
    fn node_ids_are_dense() {
        let mut ids = NodeIdGen::new();
        assert_eq!(ids.next(), NodeId(0));
        assert_eq!(ids.next(), NodeId(1));
        assert_eq!(ids.count(), 2);
    }

    #[test]
    fn operator_spellings() {
        assert_eq!(BinaryOp::Add(Overflow::Wrap).spelling(), "+%");
        assert_eq!(BinaryOp::FloorDivide.spelling(), "//");
        assert!(BinaryOp::LessEqual.is_comparison());
        assert!(!BinaryOp::Power.is_comparison());
    }
}
