//! Recursive-descent / Pratt parser producing the shared AST.
//!
//! The grammar is newline-terminated with optional semicolons. Expression
//! parsing is precedence-driven; comparisons chain (`a < b <= c`) into a
//! single node. Two context-sensitive spots need care:
//!
//! - `<` after a name may open generic arguments or be a comparison. The
//!   parser try-parses generic arguments with a restorable checkpoint and
//!   falls back to comparison on failure. `>>` closing two generic levels
//!   is split into two `>` tokens in place (and un-split if the try-parse
//!   is abandoned).
//! - Pattern contexts suppress the `is` operator so `when` arms read
//!   `SomeType x` as a type pattern, not a comparison.
//!
//! Recoverable errors synchronize to the next statement terminator or
//! closing brace; one diagnostic is emitted per recovered error.

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::token::{Dialect, SourceLocation, Token, TokenKind};

/// Marker for an already-reported parse failure. The diagnostic is in the
/// list by the time this propagates.
#[derive(Debug)]
pub struct ParseError;

type PResult<T> = Result<T, ParseError>;

/// Prefixes reserved for compiler-derived safe variants.
const RESERVED_PREFIXES: &[&str] = &["try_", "check_", "find_"];

/// Result of parsing one compilation unit.
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Diagnostics,
    pub ids: NodeIdGen,
}

/// Parse a token stream into a [`Program`]. The id generator is threaded
/// through so node ids stay unique across modules of one compilation.
pub fn parse_program(tokens: Vec<Token>, dialect: Dialect, ids: NodeIdGen) -> ParseOutput {
    let mut parser = Parser {
        tokens,
        pos: 0,
        dialect,
        ids,
        diagnostics: Diagnostics::new(),
        in_pattern: false,
        token_edits: Vec::new(),
    };
    let program = parser.parse();
    ParseOutput {
        program,
        diagnostics: parser.diagnostics,
        ids: parser.ids,
    }
}

/// Restorable parser position for try-parses.
struct Checkpoint {
    pos: usize,
    diag_len: usize,
    edit_len: usize,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    #[allow(dead_code)]
    dialect: Dialect,
    ids: NodeIdGen,
    diagnostics: Diagnostics,
    /// Suppresses the `is` operator inside `when` patterns.
    in_pattern: bool,
    /// Undo log for `>>` splits performed inside try-parses.
    token_edits: Vec<(usize, Token)>,
}

enum TypeKeyword {
    Record,
    Entity,
    Resident,
    Mutant,
}

impl Parser {
    // ---- token access ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at(&self, lookahead: usize) -> &Token {
        let idx = (self.pos + lookahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn location(&self) -> SourceLocation {
        self.peek().location
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error_here(format!("expected {}, found '{}'", what, self.peek().lexeme));
            Err(ParseError)
        }
    }

    fn expect_identifier(&mut self, what: &str) -> PResult<Token> {
        if self.peek_kind() == &TokenKind::Identifier {
            Ok(self.advance())
        } else {
            self.error_here(format!("expected {}, found '{}'", what, self.peek().lexeme));
            Err(ParseError)
        }
    }

    fn error_here(&mut self, message: String) {
        let loc = self.location();
        self.diagnostics.error(message, loc);
    }

    fn error_at(&mut self, message: String, location: SourceLocation) {
        self.diagnostics.error(message, location);
    }

    fn next_id(&mut self) -> NodeId {
        self.ids.next()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    // ---- checkpoints for try-parses ----

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            diag_len: self.diagnostics.len(),
            edit_len: self.token_edits.len(),
        }
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.diagnostics.truncate(cp.diag_len);
        while self.token_edits.len() > cp.edit_len {
            let (idx, original) = self.token_edits.pop().unwrap();
            self.tokens[idx] = original;
        }
    }

    // ---- recovery ----

    /// Skip to the next statement boundary after a failed statement.
    fn synchronize_statement(&mut self) {
        while !self.is_at_end() {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next plausible declaration start after a failed
    /// top-level declaration.
    fn synchronize_declaration(&mut self) {
        while !self.is_at_end() {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Routine
                | TokenKind::Record
                | TokenKind::Entity
                | TokenKind::Resident
                | TokenKind::Choice
                | TokenKind::Variant
                | TokenKind::Mutant
                | TokenKind::Protocol
                | TokenKind::Import
                | TokenKind::Preset => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- program ----

    fn parse(&mut self) -> Program {
        let mut program = Program::new();
        self.skip_separators();
        while !self.is_at_end() {
            match self.parse_declaration() {
                Ok(decl) => program.declarations.push(decl),
                Err(ParseError) => self.synchronize_declaration(),
            }
            self.skip_separators();
        }
        program
    }

    // ---- declarations ----

    fn parse_declaration(&mut self) -> PResult<Declaration> {
        let location = self.location();
        let modifiers = self.parse_modifiers()?;

        // `external "C" routine ...` is an FFI declaration rather than a
        // visibility modifier; parse_modifiers leaves it in place.
        if self.check(&TokenKind::External)
            && matches!(self.peek_at(1).kind, TokenKind::Text { .. })
        {
            return self.parse_external(location);
        }

        match self.peek_kind().clone() {
            TokenKind::Namespace => self.parse_namespace(location),
            TokenKind::Import => self.parse_import(location),
            TokenKind::Routine => {
                self.advance();
                let func = self.parse_function(modifiers)?;
                Ok(Declaration::new(
                    self.next_id(),
                    location,
                    DeclarationKind::Function(func),
                ))
            }
            TokenKind::Record => self.parse_type_decl(location, modifiers, TypeKeyword::Record),
            TokenKind::Entity => self.parse_type_decl(location, modifiers, TypeKeyword::Entity),
            TokenKind::Resident => {
                self.parse_type_decl(location, modifiers, TypeKeyword::Resident)
            }
            TokenKind::Mutant => self.parse_type_decl(location, modifiers, TypeKeyword::Mutant),
            TokenKind::Choice => self.parse_choice(location, modifiers),
            TokenKind::Variant => self.parse_variant(location, modifiers),
            TokenKind::Protocol => self.parse_protocol(location, modifiers),
            TokenKind::Let | TokenKind::Var => self.parse_variable(location, modifiers),
            TokenKind::Preset => self.parse_preset(location, modifiers),
            // `Type follows Protocol { ... }` attaches an implementation
            // block to an existing type.
            TokenKind::Identifier if self.implementation_ahead() => {
                self.parse_implementation(location)
            }
            _ => {
                self.error_here(format!(
                    "expected a declaration, found '{}'",
                    self.peek().lexeme
                ));
                Err(ParseError)
            }
        }
    }

    fn implementation_ahead(&self) -> bool {
        // Identifier, optional generic args, then `follows`.
        if self.peek_at(1).kind == TokenKind::Follows {
            return true;
        }
        if self.peek_at(1).kind == TokenKind::Less {
            let mut i = 2;
            let mut depth = 1usize;
            while depth > 0 && i < 32 {
                match self.peek_at(i).kind {
                    TokenKind::Less => depth += 1,
                    TokenKind::Greater => depth -= 1,
                    TokenKind::GreaterGreater => depth = depth.saturating_sub(2),
                    TokenKind::Eof | TokenKind::Newline => return false,
                    _ => {}
                }
                i += 1;
            }
            return depth == 0 && self.peek_at(i).kind == TokenKind::Follows;
        }
        false
    }

    fn parse_modifiers(&mut self) -> PResult<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            match self.peek_kind() {
                TokenKind::Identifier if self.peek().lexeme == "public" => {
                    self.advance();
                    modifiers.visibility = Visibility::Public;
                    if self.matches(&TokenKind::LeftParen) {
                        let level = self.expect_identifier("visibility level")?;
                        modifiers.visibility = match level.lexeme.as_str() {
                            "family" => Visibility::Family,
                            "module" => Visibility::Module,
                            other => {
                                self.error_at(
                                    format!("unknown visibility level '{}'", other),
                                    level.location,
                                );
                                Visibility::Public
                            }
                        };
                        self.expect(&TokenKind::RightParen, "')'")?;
                    }
                }
                TokenKind::Identifier if self.peek().lexeme == "private" => {
                    self.advance();
                    modifiers.visibility = Visibility::Private;
                }
                TokenKind::External
                    if !matches!(self.peek_at(1).kind, TokenKind::Text { .. }) =>
                {
                    self.advance();
                    modifiers.visibility = Visibility::External;
                }
                TokenKind::Common => {
                    self.advance();
                    modifiers.is_common = true;
                }
                TokenKind::Open => {
                    self.advance();
                    modifiers.is_open = true;
                }
                TokenKind::Sealed => {
                    self.advance();
                    modifiers.is_sealed = true;
                }
                TokenKind::Override => {
                    self.advance();
                    modifiers.is_override = true;
                }
                TokenKind::Usurping => {
                    self.advance();
                    modifiers.is_usurping = true;
                }
                _ => break,
            }
        }
        Ok(modifiers)
    }

    fn check_reserved_name(&mut self, name: &str, location: SourceLocation) {
        for prefix in RESERVED_PREFIXES {
            if name.starts_with(prefix) {
                self.error_at(
                    format!(
                        "names beginning with '{}' are reserved for derived variants",
                        prefix
                    ),
                    location,
                );
            }
        }
    }

    fn parse_namespace(&mut self, location: SourceLocation) -> PResult<Declaration> {
        self.advance();
        let path = self.parse_module_path()?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Namespace { path },
        ))
    }

    fn parse_module_path(&mut self) -> PResult<Vec<String>> {
        let mut path = vec![self.expect_identifier("module path segment")?.lexeme];
        while self.check(&TokenKind::Slash) && self.peek_at(1).kind == TokenKind::Identifier {
            self.advance();
            path.push(self.expect_identifier("module path segment")?.lexeme);
        }
        Ok(path)
    }

    fn parse_import(&mut self, location: SourceLocation) -> PResult<Declaration> {
        self.advance();
        let mut path = vec![self.expect_identifier("import path segment")?.lexeme];
        let mut selective = Vec::new();
        while self.check(&TokenKind::Slash) {
            self.advance();
            if self.matches(&TokenKind::LeftBrace) {
                // import A/{B, C}
                loop {
                    selective.push(self.expect_identifier("imported name")?.lexeme);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RightBrace, "'}'")?;
                break;
            }
            path.push(self.expect_identifier("import path segment")?.lexeme);
        }
        let alias = if self.matches(&TokenKind::As) {
            Some(self.expect_identifier("import alias")?.lexeme)
        } else {
            None
        };
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Import { path, alias, selective },
        ))
    }

    fn parse_external(&mut self, location: SourceLocation) -> PResult<Declaration> {
        self.advance(); // external
        let convention = match self.advance() {
            Token { kind: TokenKind::Text { value, .. }, .. } => value,
            other => {
                self.error_at("expected calling convention string".into(), other.location);
                return Err(ParseError);
            }
        };
        self.expect(&TokenKind::Routine, "'routine'")?;
        let name = self.expect_identifier("external routine name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let parameters = self.parse_parameters()?;
        let return_type = if self.matches(&TokenKind::Arrow) {
            Some(self.parse_type_expression()?)
        } else {
            None
        };
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::ExternalFunction {
                name: name.lexeme,
                parameters,
                return_type,
                convention,
            },
        ))
    }

    fn parse_variable(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
    ) -> PResult<Declaration> {
        let mutable = self.advance().kind == TokenKind::Var;
        let name = self.expect_identifier("variable name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let declared_type = if self.matches(&TokenKind::Colon) {
            Some(self.parse_type_expression()?)
        } else {
            None
        };
        let initializer = if self.matches(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Variable {
                mutable,
                name: name.lexeme,
                declared_type,
                initializer,
                visibility: modifiers.visibility,
            },
        ))
    }

    fn parse_preset(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
    ) -> PResult<Declaration> {
        self.advance();
        let name = self.expect_identifier("preset name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let declared_type = if self.matches(&TokenKind::Colon) {
            Some(self.parse_type_expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Equal, "'='")?;
        let value = self.parse_expression()?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Preset {
                name: name.lexeme,
                declared_type,
                value,
                visibility: modifiers.visibility,
            },
        ))
    }

    // ---- functions ----

    fn parse_function(&mut self, modifiers: Modifiers) -> PResult<FunctionDecl> {
        let name_token = self.expect_identifier("routine name")?;
        let location = name_token.location;
        let mut generic_params = Vec::new();
        if self.check(&TokenKind::Less) {
            generic_params = self.parse_generic_params()?;
        }

        // `routine Type<T>.method(...)`: the first segment was a receiver.
        let (receiver, name_token) = if self.matches(&TokenKind::Dot) {
            let args = generic_params
                .iter()
                .map(|p| TypeExpression {
                    id: self.ids.next(),
                    location: p.location,
                    name: p.name.clone(),
                    generic_args: Vec::new(),
                })
                .collect();
            let receiver = TypeExpression {
                id: self.next_id(),
                location,
                name: name_token.lexeme.clone(),
                generic_args: args,
            };
            let method = self.expect_identifier("method name")?;
            if self.check(&TokenKind::Less) {
                let mut method_params = self.parse_generic_params()?;
                generic_params.append(&mut method_params);
            }
            (Some(receiver), method)
        } else {
            (None, name_token)
        };

        let fallible = self.matches(&TokenKind::Bang);
        self.check_reserved_name(&name_token.lexeme, name_token.location);

        let parameters = self.parse_parameters()?;
        let return_type = if self.matches(&TokenKind::Arrow) {
            Some(self.parse_type_expression()?)
        } else {
            None
        };
        if self.check(&TokenKind::Where) {
            self.parse_where_clause(&mut generic_params)?;
        }
        let body = if self.check(&TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(FunctionDecl {
            location,
            name: name_token.lexeme,
            fallible,
            receiver,
            generic_params,
            parameters,
            return_type,
            body,
            modifiers,
        })
    }

    fn parse_generic_params(&mut self) -> PResult<Vec<GenericParam>> {
        self.expect(&TokenKind::Less, "'<'")?;
        let mut params = Vec::new();
        loop {
            let name = self.expect_identifier("generic parameter")?;
            let mut constraints = Vec::new();
            if self.matches(&TokenKind::Colon) {
                constraints.push(self.parse_type_expression()?);
            }
            params.push(GenericParam {
                location: name.location,
                name: name.lexeme,
                constraints,
            });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.consume_generic_close()?;
        Ok(params)
    }

    /// `where T follows Protocol, U follows Other` (also accepts the
    /// `where T: Protocol` spelling). Constraints merge into the matching
    /// generic parameter.
    fn parse_where_clause(&mut self, params: &mut [GenericParam]) -> PResult<()> {
        self.advance(); // where
        loop {
            let name = self.expect_identifier("constrained type parameter")?;
            if !self.matches(&TokenKind::Follows) {
                self.expect(&TokenKind::Colon, "'follows' or ':'")?;
            }
            let constraint = self.parse_type_expression()?;
            match params.iter_mut().find(|p| p.name == name.lexeme) {
                Some(param) => param.constraints.push(constraint),
                None => self.error_at(
                    format!("'{}' is not a generic parameter of this routine", name.lexeme),
                    name.location,
                ),
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn parse_parameters(&mut self) -> PResult<Vec<Parameter>> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let (name, location) = match self.peek_kind() {
                    TokenKind::Me => {
                        let t = self.advance();
                        ("me".to_string(), t.location)
                    }
                    TokenKind::Identifier => {
                        let t = self.advance();
                        (t.lexeme, t.location)
                    }
                    _ => {
                        self.error_here(format!(
                            "expected parameter name, found '{}'",
                            self.peek().lexeme
                        ));
                        return Err(ParseError);
                    }
                };
                let declared_type = if self.matches(&TokenKind::Colon) {
                    Some(self.parse_type_expression()?)
                } else {
                    None
                };
                parameters.push(Parameter { location, name, declared_type });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(parameters)
    }

    // ---- nominal type declarations ----

    fn parse_type_decl(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
        keyword: TypeKeyword,
    ) -> PResult<Declaration> {
        self.advance();
        let name = self.expect_identifier("type name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let generic_params = if self.check(&TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };
        let base = if self.matches(&TokenKind::From) {
            Some(self.parse_type_expression()?)
        } else {
            None
        };
        let mut follows = Vec::new();
        if self.matches(&TokenKind::Follows) {
            loop {
                follows.push(self.parse_type_expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let fields = self.parse_field_block()?;
        let decl = TypeDecl {
            location,
            name: name.lexeme,
            generic_params,
            base,
            follows,
            fields,
            modifiers,
        };
        let kind = match keyword {
            TypeKeyword::Record => DeclarationKind::Record(decl),
            TypeKeyword::Entity => DeclarationKind::Entity(decl),
            TypeKeyword::Resident => DeclarationKind::Resident(decl),
            TypeKeyword::Mutant => DeclarationKind::Mutant(decl),
        };
        Ok(Declaration::new(self.next_id(), location, kind))
    }

    fn parse_field_block(&mut self) -> PResult<Vec<Field>> {
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut fields = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let visibility = self.parse_modifiers()?.visibility;
            let name = self.expect_identifier("field name")?;
            self.check_reserved_name(&name.lexeme, name.location);
            self.expect(&TokenKind::Colon, "':' after field name")?;
            let declared_type = self.parse_type_expression()?;
            fields.push(Field {
                location: name.location,
                name: name.lexeme,
                declared_type,
                visibility,
            });
            self.matches(&TokenKind::Comma);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(fields)
    }

    fn parse_choice(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
    ) -> PResult<Declaration> {
        self.advance();
        let name = self.expect_identifier("choice name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut cases = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let case_name = self.expect_identifier("choice case")?;
            let value = if self.matches(&TokenKind::Equal) {
                let negative = self.matches(&TokenKind::Minus);
                match self.advance() {
                    Token { kind: TokenKind::Integer { value, .. }, .. } => {
                        Some(if negative { -(value as i64) } else { value as i64 })
                    }
                    other => {
                        self.error_at("expected integer case value".into(), other.location);
                        None
                    }
                }
            } else {
                None
            };
            cases.push(ChoiceCase {
                location: case_name.location,
                name: case_name.lexeme,
                value,
            });
            self.matches(&TokenKind::Comma);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Choice { name: name.lexeme, cases, modifiers },
        ))
    }

    fn parse_variant(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
    ) -> PResult<Declaration> {
        self.advance();
        let name = self.expect_identifier("variant name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let generic_params = if self.check(&TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut cases = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let case_name = self.expect_identifier("variant case")?;
            // Payload is a single type, not a tuple.
            let payload = if self.matches(&TokenKind::LeftParen) {
                let ty = self.parse_type_expression()?;
                self.expect(&TokenKind::RightParen, "')' after case payload type")?;
                Some(ty)
            } else {
                None
            };
            cases.push(VariantCase {
                location: case_name.location,
                name: case_name.lexeme,
                payload,
            });
            self.matches(&TokenKind::Comma);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Variant {
                name: name.lexeme,
                generic_params,
                cases,
                modifiers,
            },
        ))
    }

    fn parse_protocol(
        &mut self,
        location: SourceLocation,
        modifiers: Modifiers,
    ) -> PResult<Declaration> {
        self.advance();
        let name = self.expect_identifier("protocol name")?;
        self.check_reserved_name(&name.lexeme, name.location);
        let generic_params = if self.check(&TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut signatures = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let sig_modifiers = self.parse_modifiers()?;
            self.expect(&TokenKind::Routine, "'routine'")?;
            let func = self.parse_function(sig_modifiers)?;
            if func.body.is_some() {
                self.error_at(
                    "protocol routines declare signatures only".into(),
                    func.location,
                );
            }
            signatures.push(func);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Protocol {
                name: name.lexeme,
                generic_params,
                signatures,
                modifiers,
            },
        ))
    }

    /// `Type<T> follows Protocol { routine ... }` — implementation block.
    fn parse_implementation(&mut self, location: SourceLocation) -> PResult<Declaration> {
        let target = self.parse_type_expression()?;
        self.expect(&TokenKind::Follows, "'follows'")?;
        let protocol = Some(self.parse_type_expression()?);
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut methods = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let modifiers = self.parse_modifiers()?;
            self.expect(&TokenKind::Routine, "'routine'")?;
            methods.push(self.parse_function(modifiers)?);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Declaration::new(
            self.next_id(),
            location,
            DeclarationKind::Implementation { target, protocol, methods },
        ))
    }

    // ---- type expressions ----

    fn parse_type_expression(&mut self) -> PResult<TypeExpression> {
        let location = self.location();
        // Parenthesized parameter tuple inside `Routine<(T, U), R>`.
        if self.matches(&TokenKind::LeftParen) {
            let mut elements = Vec::new();
            if !self.check(&TokenKind::RightParen) {
                loop {
                    elements.push(self.parse_type_expression()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen, "')'")?;
            return Ok(TypeExpression {
                id: self.next_id(),
                location,
                name: "Tuple".to_string(),
                generic_args: elements,
            });
        }

        let name = match self.peek_kind() {
            TokenKind::Identifier | TokenKind::MyType => self.advance().lexeme,
            _ => {
                self.error_here(format!(
                    "expected a type name, found '{}'",
                    self.peek().lexeme
                ));
                return Err(ParseError);
            }
        };
        let mut generic_args = Vec::new();
        if self.check(&TokenKind::Less) {
            self.advance();
            loop {
                generic_args.push(self.parse_type_expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume_generic_close()?;
        }
        Ok(TypeExpression {
            id: self.next_id(),
            location,
            name,
            generic_args,
        })
    }

    /// Consume one closing `>` of a generic argument list. A
    /// `GreaterGreater` here closes two nested lists: it is split in
    /// place, consuming the first half and leaving a plain `Greater` for
    /// the enclosing list.
    fn consume_generic_close(&mut self) -> PResult<()> {
        match self.peek_kind() {
            TokenKind::Greater => {
                self.advance();
                Ok(())
            }
            TokenKind::GreaterGreater => {
                let original = self.peek().clone();
                let mut loc = original.location;
                loc.column += 1;
                loc.offset += 1;
                self.token_edits.push((self.pos, original));
                self.tokens[self.pos] = Token::new(TokenKind::Greater, ">", loc);
                Ok(())
            }
            _ => {
                self.error_here(format!(
                    "expected '>' to close generic arguments, found '{}'",
                    self.peek().lexeme
                ));
                Err(ParseError)
            }
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<Block> {
        let location = self.location();
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize_statement(),
            }
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Block { location, statements })
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let location = self.location();
        match self.peek_kind().clone() {
            TokenKind::Let | TokenKind::Var => {
                let decl = self.parse_variable(location, Modifiers::default())?;
                Ok(Statement::new(
                    self.next_id(),
                    location,
                    StatementKind::Declaration(Box::new(decl)),
                ))
            }
            TokenKind::Preset => {
                let decl = self.parse_preset(location, Modifiers::default())?;
                Ok(Statement::new(
                    self.next_id(),
                    location,
                    StatementKind::Declaration(Box::new(decl)),
                ))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.statement_finished() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Ok(Statement::new(self.next_id(), location, StatementKind::Return(value)))
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expression()?;
                Ok(Statement::new(self.next_id(), location, StatementKind::Throw(value)))
            }
            TokenKind::Absent => {
                self.advance();
                Ok(Statement::new(self.next_id(), location, StatementKind::Absent))
            }
            TokenKind::Break => {
                self.advance();
                let value = if self.statement_finished() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Ok(Statement::new(self.next_id(), location, StatementKind::Break(value)))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Statement::new(self.next_id(), location, StatementKind::Continue))
            }
            TokenKind::If => self.parse_if_statement(location, false),
            TokenKind::Unless => self.parse_if_statement(location, true),
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                Ok(Statement::new(
                    self.next_id(),
                    location,
                    StatementKind::While { condition, body },
                ))
            }
            TokenKind::Loop => {
                self.advance();
                let body = self.parse_block()?;
                Ok(Statement::new(self.next_id(), location, StatementKind::Loop { body }))
            }
            TokenKind::For => {
                self.advance();
                let variable = self.expect_identifier("loop variable")?.lexeme;
                self.expect(&TokenKind::In, "'in'")?;
                let iterable = self.parse_expression()?;
                let body = self.parse_block()?;
                Ok(Statement::new(
                    self.next_id(),
                    location,
                    StatementKind::For { variable, iterable, body },
                ))
            }
            TokenKind::When => self.parse_when(location),
            TokenKind::Danger => {
                self.advance();
                // Written `danger!` in source.
                self.matches(&TokenKind::Bang);
                let block = self.parse_block()?;
                Ok(Statement::new(self.next_id(), location, StatementKind::Danger(block)))
            }
            TokenKind::Viewing => self.parse_scoped_access(location, ScopedAccessKind::Viewing),
            TokenKind::Hijacking => {
                self.parse_scoped_access(location, ScopedAccessKind::Hijacking)
            }
            TokenKind::Seizing => self.parse_scoped_access(location, ScopedAccessKind::Seizing),
            TokenKind::Inspecting => {
                self.parse_scoped_access(location, ScopedAccessKind::Inspecting)
            }
            TokenKind::Using => self.parse_scoped_access(location, ScopedAccessKind::Using),
            TokenKind::LeftBrace => {
                let block = self.parse_block()?;
                Ok(Statement::new(self.next_id(), location, StatementKind::Block(block)))
            }
            _ => self.parse_expression_statement(location),
        }
    }

    fn statement_finished(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        )
    }

    fn parse_if_statement(
        &mut self,
        location: SourceLocation,
        negated: bool,
    ) -> PResult<Statement> {
        self.advance(); // if / unless
        let mut condition = self.parse_expression()?;
        if negated {
            let id = self.next_id();
            let loc = condition.location;
            condition = Expression::new(
                id,
                loc,
                ExpressionKind::Unary { op: UnaryOp::Not, operand: Box::new(condition) },
            );
        }
        let then_block = self.parse_block()?;
        let else_block = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) || self.check(&TokenKind::Unless) {
                let loc = self.location();
                let negated = self.check(&TokenKind::Unless);
                let nested = self.parse_if_statement(loc, negated)?;
                Some(Block { location: loc, statements: vec![nested] })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Statement::new(
            self.next_id(),
            location,
            StatementKind::If { condition, then_block, else_block },
        ))
    }

    fn parse_scoped_access(
        &mut self,
        location: SourceLocation,
        kind: ScopedAccessKind,
    ) -> PResult<Statement> {
        self.advance();
        let subject = self.parse_expression()?;
        self.expect(&TokenKind::As, "'as'")?;
        let binding = self.expect_identifier("binding name")?.lexeme;
        let body = self.parse_block()?;
        Ok(Statement::new(
            self.next_id(),
            location,
            StatementKind::ScopedAccess { kind, subject, binding, body },
        ))
    }

    fn parse_when(&mut self, location: SourceLocation) -> PResult<Statement> {
        self.advance();
        let subject = self.parse_expression()?;
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let mut arms = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let pattern = self.parse_pattern()?;
            self.expect(&TokenKind::FatArrow, "'=>'")?;
            let body = if self.check(&TokenKind::LeftBrace) {
                self.parse_block()?
            } else {
                let loc = self.location();
                let stmt = self.parse_statement()?;
                Block { location: loc, statements: vec![stmt] }
            };
            arms.push(WhenArm { pattern, body });
            self.matches(&TokenKind::Comma);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Statement::new(
            self.next_id(),
            location,
            StatementKind::When { subject, arms },
        ))
    }

    fn parse_expression_statement(&mut self, location: SourceLocation) -> PResult<Statement> {
        let expr = self.parse_expression()?;
        let compound = match self.peek_kind() {
            TokenKind::Equal => Some(None),
            TokenKind::PlusEqual => Some(Some(BinaryOp::Add(Overflow::Default))),
            TokenKind::MinusEqual => Some(Some(BinaryOp::Subtract(Overflow::Default))),
            TokenKind::StarEqual => Some(Some(BinaryOp::Multiply(Overflow::Default))),
            TokenKind::SlashSlashEqual => Some(Some(BinaryOp::FloorDivide)),
            TokenKind::PercentEqual => Some(Some(BinaryOp::Modulo)),
            _ => None,
        };
        if let Some(op) = compound {
            let op_location = self.location();
            self.advance();
            if !matches!(
                expr.kind,
                ExpressionKind::Identifier(_)
                    | ExpressionKind::Member { .. }
                    | ExpressionKind::Index { .. }
            ) {
                self.error_at("invalid assignment target".into(), op_location);
            }
            let value = self.parse_expression()?;
            return Ok(Statement::new(
                self.next_id(),
                location,
                StatementKind::Assignment { target: expr, op, value },
            ));
        }
        Ok(Statement::new(
            self.next_id(),
            location,
            StatementKind::Expression(expr),
        ))
    }

    // ---- patterns ----

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        let was_in_pattern = self.in_pattern;
        self.in_pattern = true;
        let result = self.parse_pattern_inner();
        self.in_pattern = was_in_pattern;
        result
    }

    fn parse_pattern_inner(&mut self) -> PResult<Pattern> {
        let location = self.location();
        let id = self.next_id();
        match self.peek_kind().clone() {
            TokenKind::Identifier if self.peek().lexeme == "_" => {
                self.advance();
                Ok(Pattern { id, location, kind: PatternKind::Wildcard })
            }
            TokenKind::NoneLiteral => {
                self.advance();
                Ok(Pattern { id, location, kind: PatternKind::None })
            }
            TokenKind::SomeLiteral => {
                self.advance();
                let binding = if self.peek_kind() == &TokenKind::Identifier {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                Ok(Pattern { id, location, kind: PatternKind::Some(binding) })
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern { id, location, kind: PatternKind::Literal(LiteralValue::Bool(true)) })
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::Literal(LiteralValue::Bool(false)),
                })
            }
            TokenKind::Integer { value, suffix } => {
                self.advance();
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::Literal(LiteralValue::Integer { value, suffix }),
                })
            }
            TokenKind::Minus => {
                // Negative literal pattern.
                self.advance();
                match self.peek_kind().clone() {
                    TokenKind::Integer { value, suffix } => {
                        self.advance();
                        Ok(Pattern {
                            id,
                            location,
                            kind: PatternKind::Literal(LiteralValue::Integer {
                                value: -value,
                                suffix,
                            }),
                        })
                    }
                    _ => {
                        self.error_here("expected a number after '-' in pattern".into());
                        Err(ParseError)
                    }
                }
            }
            TokenKind::Text { prefix, value } => {
                self.advance();
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::Literal(LiteralValue::Text { prefix, value }),
                })
            }
            TokenKind::Letter { value } => {
                self.advance();
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::Literal(LiteralValue::Letter(value)),
                })
            }
            TokenKind::Identifier => self.parse_name_pattern(id, location),
            _ => {
                let expr = self.parse_expression()?;
                Ok(Pattern { id, location, kind: PatternKind::Expression(expr) })
            }
        }
    }

    fn parse_name_pattern(&mut self, id: NodeId, location: SourceLocation) -> PResult<Pattern> {
        let name = self.advance().lexeme;
        match self.peek_kind() {
            // `Circle(r)` — variant case with payload binding.
            TokenKind::LeftParen => {
                self.advance();
                let binding = if self.peek_kind() == &TokenKind::Identifier {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::VariantCase { name, binding },
                })
            }
            // `List<s32> xs` — generic type pattern with binding.
            TokenKind::Less => {
                let mut generic_args = Vec::new();
                self.advance();
                loop {
                    generic_args.push(self.parse_type_expression()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume_generic_close()?;
                let type_expr = TypeExpression {
                    id: self.next_id(),
                    location,
                    name,
                    generic_args,
                };
                let binding = if self.peek_kind() == &TokenKind::Identifier {
                    Some(self.advance().lexeme)
                } else {
                    None
                };
                Ok(Pattern { id, location, kind: PatternKind::Type { type_expr, binding } })
            }
            // `s32 x` — plain type pattern with binding.
            TokenKind::Identifier => {
                let binding = self.advance().lexeme;
                let type_expr = TypeExpression {
                    id: self.next_id(),
                    location,
                    name,
                    generic_args: Vec::new(),
                };
                Ok(Pattern {
                    id,
                    location,
                    kind: PatternKind::Type { type_expr, binding: Some(binding) },
                })
            }
            _ => {
                // Bare name: lowercase binds, uppercase names a type or
                // variant case; the analyzer settles which.
                if name.chars().next().is_some_and(char::is_uppercase) {
                    let type_expr = TypeExpression {
                        id: self.next_id(),
                        location,
                        name,
                        generic_args: Vec::new(),
                    };
                    Ok(Pattern {
                        id,
                        location,
                        kind: PatternKind::Type { type_expr, binding: None },
                    })
                } else {
                    Ok(Pattern { id, location, kind: PatternKind::Binding(name) })
                }
            }
        }
    }

    // ---- expressions ----

    pub fn parse_expression(&mut self) -> PResult<Expression> {
        self.parse_or()
    }

    fn binary(
        &mut self,
        location: SourceLocation,
        left: Expression,
        op: BinaryOp,
        right: Expression,
    ) -> Expression {
        Expression::new(
            self.next_id(),
            location,
            ExpressionKind::Binary { left: Box::new(left), op, right: Box::new(right) },
        )
    }

    fn parse_or(&mut self) -> PResult<Expression> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            let location = self.location();
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(location, left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expression> {
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            let location = self.location();
            self.advance();
            let right = self.parse_not()?;
            left = self.binary(location, left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expression> {
        if self.check(&TokenKind::Not) {
            let location = self.location();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::new(
                self.next_id(),
                location,
                ExpressionKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) },
            ));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.peek_kind() {
            TokenKind::EqualEqual => Some(BinaryOp::Equal),
            TokenKind::BangEqual => Some(BinaryOp::NotEqual),
            TokenKind::Less => Some(BinaryOp::Less),
            TokenKind::LessEqual => Some(BinaryOp::LessEqual),
            TokenKind::Greater => Some(BinaryOp::Greater),
            TokenKind::GreaterEqual => Some(BinaryOp::GreaterEqual),
            // `is` is suppressed in pattern contexts so type patterns
            // parse as patterns, not comparisons.
            TokenKind::Is if !self.in_pattern => Some(BinaryOp::Is),
            TokenKind::Isnot if !self.in_pattern => Some(BinaryOp::IsNot),
            TokenKind::In => Some(BinaryOp::In),
            TokenKind::Notin => Some(BinaryOp::NotIn),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> PResult<Expression> {
        let first = self.parse_range()?;
        let start_location = first.location;
        let mut operands = vec![first];
        let mut operators = Vec::new();
        while let Some(op) = self.comparison_op() {
            self.advance();
            // The right side of `is` / `isnot` is a type, not a value.
            let right = if matches!(op, BinaryOp::Is | BinaryOp::IsNot) {
                let type_expr = self.parse_type_expression()?;
                let loc = type_expr.location;
                Expression::new(self.next_id(), loc, ExpressionKind::TypeRef(type_expr))
            } else {
                self.parse_range()?
            };
            operators.push(op);
            operands.push(right);
        }
        match operators.len() {
            0 => Ok(operands.pop().unwrap()),
            1 => {
                let right = operands.pop().unwrap();
                let left = operands.pop().unwrap();
                Ok(self.binary(start_location, left, operators[0], right))
            }
            _ => Ok(Expression::new(
                self.next_id(),
                start_location,
                ExpressionKind::ChainedComparison { operands, operators },
            )),
        }
    }

    fn parse_range(&mut self) -> PResult<Expression> {
        let start = self.parse_bit_or()?;
        let descending = match self.peek_kind() {
            TokenKind::To => false,
            TokenKind::Downto => true,
            _ => return Ok(start),
        };
        let location = start.location;
        self.advance();
        let end = self.parse_bit_or()?;
        let step = if self.matches(&TokenKind::Step) {
            Some(Box::new(self.parse_bit_or()?))
        } else {
            None
        };
        Ok(Expression::new(
            self.next_id(),
            location,
            ExpressionKind::Range {
                start: Box::new(start),
                end: Box::new(end),
                step,
                descending,
            },
        ))
    }

    fn parse_bit_or(&mut self) -> PResult<Expression> {
        let mut left = self.parse_bit_xor()?;
        while self.check(&TokenKind::Pipe) {
            let location = self.location();
            self.advance();
            let right = self.parse_bit_xor()?;
            left = self.binary(location, left, BinaryOp::BitOr, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> PResult<Expression> {
        let mut left = self.parse_bit_and()?;
        while self.check(&TokenKind::Caret) {
            let location = self.location();
            self.advance();
            let right = self.parse_bit_and()?;
            left = self.binary(location, left, BinaryOp::BitXor, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> PResult<Expression> {
        let mut left = self.parse_shift()?;
        while self.check(&TokenKind::Ampersand) {
            let location = self.location();
            self.advance();
            let right = self.parse_shift()?;
            left = self.binary(location, left, BinaryOp::BitAnd, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Expression> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::LessLess => BinaryOp::ShiftLeft,
                TokenKind::GreaterGreater => BinaryOp::ShiftRight,
                _ => break,
            };
            let location = self.location();
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(location, left, op, right);
        }
        Ok(left)
    }

    fn additive_op(&self) -> Option<BinaryOp> {
        match self.peek_kind() {
            TokenKind::Plus => Some(BinaryOp::Add(Overflow::Default)),
            TokenKind::PlusWrap => Some(BinaryOp::Add(Overflow::Wrap)),
            TokenKind::PlusSaturate => Some(BinaryOp::Add(Overflow::Saturate)),
            TokenKind::PlusUnchecked => Some(BinaryOp::Add(Overflow::Unchecked)),
            TokenKind::PlusChecked => Some(BinaryOp::Add(Overflow::Checked)),
            TokenKind::Minus => Some(BinaryOp::Subtract(Overflow::Default)),
            TokenKind::MinusWrap => Some(BinaryOp::Subtract(Overflow::Wrap)),
            TokenKind::MinusSaturate => Some(BinaryOp::Subtract(Overflow::Saturate)),
            TokenKind::MinusUnchecked => Some(BinaryOp::Subtract(Overflow::Unchecked)),
            TokenKind::MinusChecked => Some(BinaryOp::Subtract(Overflow::Checked)),
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> PResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.additive_op() {
            let location = self.location();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(location, left, op, right);
        }
        Ok(left)
    }

    fn multiplicative_op(&self) -> Option<BinaryOp> {
        match self.peek_kind() {
            TokenKind::Star => Some(BinaryOp::Multiply(Overflow::Default)),
            TokenKind::StarWrap => Some(BinaryOp::Multiply(Overflow::Wrap)),
            TokenKind::StarSaturate => Some(BinaryOp::Multiply(Overflow::Saturate)),
            TokenKind::StarUnchecked => Some(BinaryOp::Multiply(Overflow::Unchecked)),
            TokenKind::StarChecked => Some(BinaryOp::Multiply(Overflow::Checked)),
            TokenKind::Slash => Some(BinaryOp::Divide),
            TokenKind::SlashSlash => Some(BinaryOp::FloorDivide),
            TokenKind::Percent => Some(BinaryOp::Modulo),
            _ => None,
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<Expression> {
        let mut left = self.parse_power()?;
        while let Some(op) = self.multiplicative_op() {
            let location = self.location();
            self.advance();
            let right = self.parse_power()?;
            left = self.binary(location, left, op, right);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> PResult<Expression> {
        let left = self.parse_unary()?;
        if self.check(&TokenKind::StarStar) {
            let location = self.location();
            self.advance();
            // Right-associative.
            let right = self.parse_power()?;
            return Ok(self.binary(location, left, BinaryOp::Power, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expression> {
        let location = self.location();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::new(
                self.next_id(),
                location,
                ExpressionKind::Unary { op, operand: Box::new(operand) },
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier("member name")?;
                    expr = self.parse_member_suffix(expr, name.lexeme, name.location)?;
                }
                TokenKind::LeftParen => {
                    let location = expr.location;
                    let arguments = self.parse_arguments()?;
                    expr = Expression::new(
                        self.next_id(),
                        location,
                        ExpressionKind::Call {
                            callee: Box::new(expr),
                            type_args: Vec::new(),
                            arguments,
                            crashable: false,
                        },
                    );
                }
                TokenKind::LeftBracket => {
                    let location = expr.location;
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket, "']'")?;
                    expr = Expression::new(
                        self.next_id(),
                        location,
                        ExpressionKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                TokenKind::Bang if self.peek_at(1).kind == TokenKind::LeftParen => {
                    let location = expr.location;
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    expr = Expression::new(
                        self.next_id(),
                        location,
                        ExpressionKind::Call {
                            callee: Box::new(expr),
                            type_args: Vec::new(),
                            arguments,
                            crashable: true,
                        },
                    );
                }
                TokenKind::Less if Self::callee_shape(&expr) => {
                    match self.try_parse_generic_call()? {
                        Some((type_args, crashable, arguments)) => {
                            let location = expr.location;
                            expr = Expression::new(
                                self.next_id(),
                                location,
                                ExpressionKind::Call {
                                    callee: Box::new(expr),
                                    type_args,
                                    arguments,
                                    crashable,
                                },
                            );
                        }
                        None => break,
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn callee_shape(expr: &Expression) -> bool {
        matches!(
            expr.kind,
            ExpressionKind::Identifier(_) | ExpressionKind::Member { .. }
        )
    }

    /// Member access plus its `!`-suffixed forms: memory operations
    /// (`x.size!()`), crashable method calls, and conversions.
    fn parse_member_suffix(
        &mut self,
        object: Expression,
        name: String,
        name_location: SourceLocation,
    ) -> PResult<Expression> {
        if self.check(&TokenKind::Bang) && self.peek_at(1).kind == TokenKind::LeftParen {
            if let Some(op) = MemoryOpKind::from_name(&name) {
                self.advance(); // !
                let arguments = self.parse_arguments()?;
                if !arguments.is_empty() {
                    self.error_at(
                        format!("'{}!' takes no arguments", op.name()),
                        name_location,
                    );
                }
                return Ok(Expression::new(
                    self.next_id(),
                    name_location,
                    ExpressionKind::MemoryOp { op, operand: Box::new(object) },
                ));
            }
            let location = object.location;
            let member = Expression::new(
                self.next_id(),
                name_location,
                ExpressionKind::Member { object: Box::new(object), name },
            );
            self.advance(); // !
            let arguments = self.parse_arguments()?;
            return Ok(Expression::new(
                self.next_id(),
                location,
                ExpressionKind::Call {
                    callee: Box::new(member),
                    type_args: Vec::new(),
                    arguments,
                    crashable: true,
                },
            ));
        }
        Ok(Expression::new(
            self.next_id(),
            name_location,
            ExpressionKind::Member { object: Box::new(object), name },
        ))
    }

    /// Attempt `callee<T, ...>(args)` (optionally `callee<T>!(args)`).
    /// Restores the token position and answers `None` when `<` turns out
    /// to be a comparison.
    #[allow(clippy::type_complexity)]
    fn try_parse_generic_call(
        &mut self,
    ) -> PResult<Option<(Vec<TypeExpression>, bool, Vec<Argument>)>> {
        let cp = self.checkpoint();
        self.advance(); // <
        let mut type_args = Vec::new();
        loop {
            match self.parse_type_expression() {
                Ok(arg) => type_args.push(arg),
                Err(ParseError) => {
                    self.restore(cp);
                    return Ok(None);
                }
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        if self.check(&TokenKind::Greater) {
            self.advance();
        } else if self.check(&TokenKind::GreaterGreater) {
            // A shift here cannot be a generic close at call level.
            self.restore(cp);
            return Ok(None);
        } else {
            self.restore(cp);
            return Ok(None);
        }
        let crashable =
            self.check(&TokenKind::Bang) && self.peek_at(1).kind == TokenKind::LeftParen;
        if crashable {
            self.advance();
        }
        if !self.check(&TokenKind::LeftParen) {
            self.restore(cp);
            return Ok(None);
        }
        let arguments = self.parse_arguments()?;
        Ok(Some((type_args, crashable, arguments)))
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Argument>> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let label = if self.peek_kind() == &TokenKind::Identifier
                    && self.peek_at(1).kind == TokenKind::Colon
                {
                    let l = self.advance().lexeme;
                    self.advance(); // :
                    Some(l)
                } else {
                    None
                };
                let value = self.parse_expression()?;
                arguments.push(Argument { label, value });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> PResult<Expression> {
        let location = self.location();
        match self.peek_kind().clone() {
            TokenKind::Integer { value, suffix } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Integer { value, suffix }))
            }
            TokenKind::Float { value, suffix } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Float { value, suffix }))
            }
            TokenKind::Decimal { digits, suffix } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Decimal { digits, suffix }))
            }
            TokenKind::Duration { nanos, .. } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Duration { nanos }))
            }
            TokenKind::MemorySize { bytes, .. } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::MemorySize { bytes }))
            }
            TokenKind::Text { prefix, value } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Text { prefix, value }))
            }
            TokenKind::Letter { value } => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Letter(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.literal(location, LiteralValue::Bool(false)))
            }
            TokenKind::NoneLiteral => {
                self.advance();
                Ok(self.literal(location, LiteralValue::None))
            }
            TokenKind::SomeLiteral => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "'(' after 'some'")?;
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Expression::new(
                    self.next_id(),
                    location,
                    ExpressionKind::SomeValue(Box::new(inner)),
                ))
            }
            TokenKind::Me => {
                self.advance();
                Ok(Expression::new(
                    self.next_id(),
                    location,
                    ExpressionKind::Identifier("me".to_string()),
                ))
            }
            TokenKind::MyType => {
                self.advance();
                Ok(Expression::new(
                    self.next_id(),
                    location,
                    ExpressionKind::Identifier("MyType".to_string()),
                ))
            }
            TokenKind::If => self.parse_conditional_expression(location),
            TokenKind::At => self.parse_intrinsic(location),
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                // Single-parameter lambda: `x => expr`.
                if self.check(&TokenKind::FatArrow) {
                    self.advance();
                    let body = self.parse_expression()?;
                    return Ok(Expression::new(
                        self.next_id(),
                        location,
                        ExpressionKind::Lambda {
                            parameters: vec![Parameter {
                                location,
                                name,
                                declared_type: None,
                            }],
                            body: Box::new(body),
                        },
                    ));
                }
                if (name == "DynamicSlice" || name == "TemporarySlice")
                    && self.check(&TokenKind::Less)
                {
                    return self.parse_slice_constructor(location, &name);
                }
                Ok(Expression::new(
                    self.next_id(),
                    location,
                    ExpressionKind::Identifier(name),
                ))
            }
            TokenKind::LeftParen => {
                if let Some(lambda) = self.try_parse_lambda(location)? {
                    return Ok(lambda);
                }
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            _ => {
                self.error_here(format!(
                    "expected an expression, found '{}'",
                    self.peek().lexeme
                ));
                Err(ParseError)
            }
        }
    }

    fn literal(&mut self, location: SourceLocation, value: LiteralValue) -> Expression {
        Expression::new(self.next_id(), location, ExpressionKind::Literal(value))
    }

    /// Block-expression `if`: both branches are required.
    fn parse_conditional_expression(&mut self, location: SourceLocation) -> PResult<Expression> {
        self.advance(); // if
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block_expression()?;
        self.expect(&TokenKind::Else, "'else' in if-expression")?;
        let else_branch = if self.check(&TokenKind::If) {
            // `else if ...` chains into a nested conditional.
            let loc = self.location();
            let nested = self.parse_conditional_expression(loc)?;
            BlockExpression { statements: Vec::new(), value: Some(Box::new(nested)) }
        } else {
            self.parse_block_expression()?
        };
        Ok(Expression::new(
            self.next_id(),
            location,
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
        ))
    }

    /// `{ statements...; value }` where a trailing bare expression is the
    /// block's value.
    fn parse_block_expression(&mut self) -> PResult<BlockExpression> {
        let block = self.parse_block()?;
        let mut statements = block.statements;
        let value = match statements.last() {
            Some(Statement { kind: StatementKind::Expression(_), .. }) => match statements.pop() {
                Some(Statement { kind: StatementKind::Expression(expr), .. }) => {
                    Some(Box::new(expr))
                }
                _ => None,
            },
            _ => None,
        };
        Ok(BlockExpression { statements, value })
    }

    fn parse_slice_constructor(
        &mut self,
        location: SourceLocation,
        name: &str,
    ) -> PResult<Expression> {
        let kind = if name == "DynamicSlice" { SliceKind::Dynamic } else { SliceKind::Temporary };
        self.advance(); // <
        let element_type = self.parse_type_expression()?;
        self.consume_generic_close()?;
        let arguments = self.parse_arguments()?;
        Ok(Expression::new(
            self.next_id(),
            location,
            ExpressionKind::SliceConstructor { kind, element_type, arguments },
        ))
    }

    /// `@intrinsic.<dotted.path><T, ...>(args)`. The parser accepts the
    /// form anywhere; danger-block placement is enforced by the analyzer.
    fn parse_intrinsic(&mut self, location: SourceLocation) -> PResult<Expression> {
        self.advance(); // @
        let head = self.expect_identifier("'intrinsic'")?;
        if head.lexeme != "intrinsic" {
            self.error_at(format!("unknown attribute '@{}'", head.lexeme), head.location);
            return Err(ParseError);
        }
        self.expect(&TokenKind::Dot, "'.'")?;
        let mut path = self.expect_identifier("intrinsic name")?.lexeme;
        while self.check(&TokenKind::Dot) && self.peek_at(1).kind == TokenKind::Identifier {
            self.advance();
            path.push('.');
            path.push_str(&self.advance().lexeme);
        }
        let mut type_args = Vec::new();
        if self.matches(&TokenKind::Less) {
            loop {
                type_args.push(self.parse_type_expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume_generic_close()?;
        }
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(Expression::new(
            self.next_id(),
            location,
            ExpressionKind::IntrinsicCall { path, type_args, arguments },
        ))
    }

    /// `(a, b) => expr` / `(a: s32) => expr`. Restores and answers `None`
    /// when the parens turn out to be grouping.
    fn try_parse_lambda(&mut self, location: SourceLocation) -> PResult<Option<Expression>> {
        let cp = self.checkpoint();
        self.advance(); // (
        let mut parameters = Vec::new();
        let mut ok = true;
        if !self.check(&TokenKind::RightParen) {
            loop {
                if self.peek_kind() != &TokenKind::Identifier {
                    ok = false;
                    break;
                }
                let name = self.advance();
                let declared_type = if self.matches(&TokenKind::Colon) {
                    match self.parse_type_expression() {
                        Ok(t) => Some(t),
                        Err(ParseError) => {
                            ok = false;
                            break;
                        }
                    }
                } else {
                    None
                };
                parameters.push(Parameter {
                    location: name.location,
                    name: name.lexeme,
                    declared_type,
                });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if !ok || !self.matches(&TokenKind::RightParen) || !self.matches(&TokenKind::FatArrow) {
            self.restore(cp);
            return Ok(None);
        }
        let body = self.parse_expression()?;
        Ok(Some(Expression::new(
            self.next_id(),
            location,
            ExpressionKind::Lambda { parameters, body: Box::new(body) },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_ok(source: &str) -> Program {
        let (tokens, lex_diags) = lex(source, Dialect::RazorForge, 0);
        assert!(!lex_diags.had_error(), "lex errors: {:?}", lex_diags);
        let out = parse_program(tokens, Dialect::RazorForge, NodeIdGen::new());
        assert!(
            !out.diagnostics.had_error(),
            "parse errors: {:?}",
            out.diagnostics.iter().collect::<Vec<_>>()
        );
        out.program
    }

    fn parse_err(source: &str) -> Diagnostics {
        let (tokens, _) = lex(source, Dialect::RazorForge, 0);
        let out = parse_program(tokens, Dialect::RazorForge, NodeIdGen::new());
        assert!(out.diagnostics.had_error(), "expected parse errors");
        out.diagnostics
    }

    #[test]
    fn parses_generic_identity_routine() {
        let program = parse_ok("routine identity<T>(value: T) -> T { return value }");
        assert_eq!(program.declarations.len(), 1);
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                assert_eq!(f.name, "identity");
                assert_eq!(f.generic_params.len(), 1);
                assert_eq!(f.parameters.len(), 1);
                assert_eq!(f.return_type.as_ref().unwrap().name, "T");
                assert!(!f.fallible);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn nested_generics_close_with_shift_token() {
        let program = parse_ok("let xs: List<List<s32>> = make()");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { declared_type: Some(t), .. } => {
                assert_eq!(t.canonical_name(), "List<List<s32>>");
            }
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn shift_still_works_in_expressions() {
        let program = parse_ok("let x = a >> b");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::ShiftRight),
                other => panic!("expected shift, got {:?}", other),
            },
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn method_on_type_with_receiver() {
        let program =
            parse_ok("routine TestType<T>.get_value(me: TestType<T>) -> T { return me.value }");
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                assert_eq!(f.name, "get_value");
                let recv = f.receiver.as_ref().unwrap();
                assert_eq!(recv.canonical_name(), "TestType<T>");
                assert_eq!(f.parameters[0].name, "me");
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn fallible_routine_and_throw() {
        let program = parse_ok(
            "routine divide!(a: s32, b: s32) -> s32 {\n  if b == 0 { throw DivisionByZeroError() }\n  return a // b\n}",
        );
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                assert!(f.fallible);
                assert_eq!(f.name, "divide");
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn reserved_prefixes_rejected() {
        let diags = parse_err("routine try_thing() { return }");
        assert!(diags.iter().any(|d| d.message.contains("reserved")));
        parse_err("let check_x = 1");
        parse_err("routine find_it(a: s32) { return }");
    }

    #[test]
    fn if_expression_with_block_values() {
        let program = parse_ok("let y = if cond { 1_s32 } else { 2_s32 }");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Conditional { then_branch, else_branch, .. } => {
                    assert!(then_branch.value.is_some());
                    assert!(else_branch.value.is_some());
                }
                other => panic!("expected conditional, got {:?}", other),
            },
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn chained_comparison_collapses() {
        let program = parse_ok("let ok = 1 < x <= 10");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::ChainedComparison { operands, operators } => {
                    assert_eq!(operands.len(), 3);
                    assert_eq!(operators, &[BinaryOp::Less, BinaryOp::LessEqual]);
                }
                other => panic!("expected chained comparison, got {:?}", other),
            },
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn generic_call_vs_comparison() {
        let program = parse_ok("routine start() { let x: s64 = identity<s64>(42) }");
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                match &body.statements[0].kind {
                    StatementKind::Declaration(decl) => match &decl.kind {
                        DeclarationKind::Variable { initializer: Some(init), .. } => {
                            match &init.kind {
                                ExpressionKind::Call { type_args, .. } => {
                                    assert_eq!(type_args.len(), 1);
                                    assert_eq!(type_args[0].name, "s64");
                                }
                                other => panic!("expected generic call, got {:?}", other),
                            }
                        }
                        other => panic!("expected variable, got {:?}", other),
                    },
                    other => panic!("expected declaration, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }

        // `a < b` alone must stay a comparison.
        let program = parse_ok("let p = a < b");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Less),
                other => panic!("expected comparison, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn when_patterns_parse() {
        let program = parse_ok(
            "routine classify(v: Shape) {\n  when v {\n    Circle(r) => return\n    s32 n => return\n    none => return\n    some x => return\n    _ => return\n  }\n}",
        );
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                match &body.statements[0].kind {
                    StatementKind::When { arms, .. } => {
                        assert_eq!(arms.len(), 5);
                        assert!(matches!(arms[0].pattern.kind, PatternKind::VariantCase { .. }));
                        assert!(matches!(arms[1].pattern.kind, PatternKind::Type { .. }));
                        assert!(matches!(arms[2].pattern.kind, PatternKind::None));
                        assert!(matches!(arms[3].pattern.kind, PatternKind::Some(_)));
                        assert!(matches!(arms[4].pattern.kind, PatternKind::Wildcard));
                    }
                    other => panic!("expected when, got {:?}", other),
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn scoped_access_forms() {
        let program = parse_ok(
            "routine use_doc(d: Doc) {\n  viewing d as v { inspect(v) }\n  hijacking d as h { mutate(h) }\n}",
        );
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                assert!(matches!(
                    body.statements[0].kind,
                    StatementKind::ScopedAccess { kind: ScopedAccessKind::Viewing, .. }
                ));
                assert!(matches!(
                    body.statements[1].kind,
                    StatementKind::ScopedAccess { kind: ScopedAccessKind::Hijacking, .. }
                ));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn imports_and_namespace() {
        let program =
            parse_ok("namespace app/core\nimport std/collections as col\nimport std/{Text, List}");
        assert_eq!(
            program.namespace(),
            Some(&["app".to_string(), "core".to_string()][..])
        );
        match &program.declarations[1].kind {
            DeclarationKind::Import { path, alias, .. } => {
                assert_eq!(path, &["std".to_string(), "collections".to_string()]);
                assert_eq!(alias.as_deref(), Some("col"));
            }
            other => panic!("expected import, got {:?}", other),
        }
        match &program.declarations[2].kind {
            DeclarationKind::Import { selective, .. } => {
                assert_eq!(selective, &["Text".to_string(), "List".to_string()]);
            }
            other => panic!("expected selective import, got {:?}", other),
        }
    }

    #[test]
    fn intrinsic_call_node() {
        let program =
            parse_ok("routine f(a: s32) { danger! { let x = @intrinsic.add.wrap<s32>(a, a) } }");
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                match &body.statements[0].kind {
                    StatementKind::Danger(block) => match &block.statements[0].kind {
                        StatementKind::Declaration(d) => match &d.kind {
                            DeclarationKind::Variable { initializer: Some(init), .. } => {
                                match &init.kind {
                                    ExpressionKind::IntrinsicCall {
                                        path,
                                        type_args,
                                        arguments,
                                    } => {
                                        assert_eq!(path, "add.wrap");
                                        assert_eq!(type_args.len(), 1);
                                        assert_eq!(arguments.len(), 2);
                                    }
                                    other => panic!("expected intrinsic, got {:?}", other),
                                }
                            }
                            other => panic!("expected variable, got {:?}", other),
                        },
                        other => panic!("expected declaration, got {:?}", other),
                    },
                    other => panic!("expected danger block, got {:?}", other),
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn record_entity_choice_variant_protocol() {
        let program = parse_ok(
            "record Point { x: s32, y: s32 }\n\
             entity Dog from Animal follows Loud { name: Text }\n\
             choice Color { Red, Green = 3, Blue }\n\
             variant Shape<T> { Circle(T), Empty }\n\
             protocol Printable { routine print(me) }",
        );
        assert_eq!(program.declarations.len(), 5);
        assert!(matches!(program.declarations[0].kind, DeclarationKind::Record(_)));
        match &program.declarations[1].kind {
            DeclarationKind::Entity(t) => {
                assert_eq!(t.base.as_ref().unwrap().name, "Animal");
                assert_eq!(t.follows[0].name, "Loud");
            }
            other => panic!("expected entity, got {:?}", other),
        }
        match &program.declarations[2].kind {
            DeclarationKind::Choice { cases, .. } => {
                assert_eq!(cases[1].value, Some(3));
                assert_eq!(cases[2].value, None);
            }
            other => panic!("expected choice, got {:?}", other),
        }
        match &program.declarations[3].kind {
            DeclarationKind::Variant { cases, .. } => {
                assert_eq!(cases[0].payload.as_ref().unwrap().name, "T");
                assert!(cases[1].payload.is_none());
            }
            other => panic!("expected variant, got {:?}", other),
        }
    }

    #[test]
    fn implementation_block() {
        let program = parse_ok("Shape follows Printable {\n  routine print(me) { show(me) }\n}");
        match &program.declarations[0].kind {
            DeclarationKind::Implementation { target, protocol, methods } => {
                assert_eq!(target.name, "Shape");
                assert_eq!(protocol.as_ref().unwrap().name, "Printable");
                assert_eq!(methods.len(), 1);
            }
            other => panic!("expected implementation, got {:?}", other),
        }
    }

    #[test]
    fn recovery_continues_after_bad_statement() {
        let (tokens, _) = lex(
            "routine f() {\n  let = broken\n  let ok = 1\n}",
            Dialect::RazorForge,
            0,
        );
        let out = parse_program(tokens, Dialect::RazorForge, NodeIdGen::new());
        assert!(out.diagnostics.had_error());
        // The good statement after the bad one still parses.
        match &out.program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                assert!(body.statements.iter().any(|s| matches!(
                    &s.kind,
                    StatementKind::Declaration(d)
                        if matches!(&d.kind, DeclarationKind::Variable { name, .. } if name == "ok")
                )));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn ranges_with_step() {
        let program = parse_ok("let r = 10 downto 0 step 2");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Range { descending, step, .. } => {
                    assert!(*descending);
                    assert!(step.is_some());
                }
                other => panic!("expected range, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn is_operator_takes_type_operand() {
        let program = parse_ok("let t = x is List<s32>");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Binary { op, right, .. } => {
                    assert_eq!(*op, BinaryOp::Is);
                    match &right.kind {
                        ExpressionKind::TypeRef(t) => {
                            assert_eq!(t.canonical_name(), "List<s32>")
                        }
                        other => panic!("expected type ref, got {:?}", other),
                    }
                }
                other => panic!("expected binary, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn crashable_call_forms() {
        let program = parse_ok("let v = s32!(x)\nlet w = obj.s64!()");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Call { crashable, .. } => assert!(*crashable),
                other => panic!("expected crashable call, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn memory_operations() {
        let program = parse_ok("routine f(x: Buffer) { danger! { let p = x.address!() } }");
        match &program.declarations[0].kind {
            DeclarationKind::Function(f) => {
                let body = f.body.as_ref().unwrap();
                match &body.statements[0].kind {
                    StatementKind::Danger(block) => match &block.statements[0].kind {
                        StatementKind::Declaration(d) => match &d.kind {
                            DeclarationKind::Variable { initializer: Some(init), .. } => {
                                assert!(matches!(
                                    init.kind,
                                    ExpressionKind::MemoryOp { op: MemoryOpKind::Address, .. }
                                ));
                            }
                            _ => unreachable!(),
                        },
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn lambdas() {
        let program = parse_ok("let f = (a: s32, b: s32) => a + b\nlet g = x => x");
        match &program.declarations[0].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Lambda { parameters, .. } => assert_eq!(parameters.len(), 2),
                other => panic!("expected lambda, got {:?}", other),
            },
            _ => unreachable!(),
        }
        match &program.declarations[1].kind {
            DeclarationKind::Variable { initializer: Some(init), .. } => match &init.kind {
                ExpressionKind::Lambda { parameters, .. } => assert_eq!(parameters.len(), 1),
                other => panic!("expected lambda, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }
}
