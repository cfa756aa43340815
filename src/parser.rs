use crate::error::{Report, ParseError};
use crate::expr::*;
use crate::literal::Literal;
use crate::stmt::*;
use crate::token::{Token, Type};

type ParseResult<T> = Result<T, ParseError>;

/// Returns true (and consumes the token) if the next token is any of the given types.
macro_rules! advance_if_matches {
    ( $self:ident, $( $type:expr ),+ ) => {
        {
            if $( $self.check($type) ) ||* {
                $self.advance();
                true
            } else {
                false
            }
        }
    }
}

/// Recursive-descent parser producing a statement list. Follows the grammar
/// in order of ascending precedence:
///
/// - program     -> declaration* EOF
/// - declaration -> classDecl | funDecl | varDecl | statement
/// - classDecl   -> "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}"
/// - funDecl     -> "fun" function
/// - varDecl     -> "var" IDENTIFIER ( "=" expression )? ";"
/// - function    -> IDENTIFIER "(" params? ")" block
/// - params      -> IDENTIFIER ( "," IDENTIFIER )*
/// - statement   -> exprStmt | printStmt | block | ifStmt
///                 | whileStmt | forStmt | returnStmt | breakStmt
/// - forStmt     -> "for" "(" (varDecl | exprStmt | ";") expression? ";" expression? ")" statement
/// - expression  -> assignment
/// - assignment  -> ( call "." )? IDENTIFIER "=" assignment | logic_or
/// - logic_or    -> logic_and ( "or" logic_and )*
/// - logic_and   -> equality ( "and" equality )*
/// - equality    -> comparison ( ("!="|"==") comparison )*
/// - comparison  -> term ( (">"|">="|"<"|"<=") term )*
/// - term        -> factor ( ("-"|"+") factor )*
/// - factor      -> unary ( ("/"|"*") unary )*
/// - unary       -> ("!"|"-") unary | call
/// - call        -> primary ( "(" args? ")" | "." IDENTIFIER )*
/// - primary     -> NUMBER | STRING | "true" | "false" | "nil"
///                 | "this" | "super" "." IDENTIFIER
///                 | "(" expression ")" | IDENTIFIER
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    out: Vec<u8>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0, out: Vec::new() }
    }

    /// Parses the tokens into a statement list and any error text produced
    /// along the way (`line <N>: <message>` form, same shape as the scanner).
    /// Failed declarations are dropped; the returned list may be shorter
    /// than the source implies.
    pub fn parse(mut self) -> (Vec<Stmt>, String) {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        (statements, String::from_utf8(self.out).unwrap_or_default())
    }

    fn report(&mut self, err: ParseError) {
        let _ = err.report(&mut self.out);
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().r#type == Type::EOF
    }

    fn check(&self, r#type: Type) -> bool {
        !self.is_at_end() && self.peek().r#type == r#type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn consume(&mut self, r#type: Type, message: &str) -> ParseResult<&Token> {
        if self.check(r#type) {
            return Ok(self.advance());
        }

        Err(ParseError { token: self.peek().clone(), message: message.to_string() })
    }

    /// Parses a declaration. On failure, reports the error and resynchronizes,
    /// dropping this declaration from the output.
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if advance_if_matches!(self, Type::Class) {
            self.class_declaration()
        } else if advance_if_matches!(self, Type::Fun) {
            self.function("function")
        } else if advance_if_matches!(self, Type::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.report(error);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect class name.")?.clone();

        let superclass = if advance_if_matches!(self, Type::Less) {
            self.consume(Type::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable(VariableData { name: self.previous().clone() }))
        } else {
            None
        };

        self.consume(Type::LeftBrace, "Expect '{' before class body.")?;

        let mut methods: Vec<Stmt> = vec![];
        while !self.check(Type::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(Type::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class(ClassData { name, superclass, methods }))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect variable name.")?.clone();

        let initializer = if advance_if_matches!(self, Type::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(Type::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(VarData { name, initializer }))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::While(WhileData { condition, body: Box::new(body) }))
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if advance_if_matches!(self, Type::For) {
            return self.for_statement();
        }

        if advance_if_matches!(self, Type::If) {
            return self.if_statement();
        }

        if advance_if_matches!(self, Type::Print) {
            return self.print_statement();
        }

        if advance_if_matches!(self, Type::Return) {
            return self.return_statement();
        }

        if advance_if_matches!(self, Type::Break) {
            return self.break_statement();
        }

        if advance_if_matches!(self, Type::While) {
            return self.while_statement();
        }

        if advance_if_matches!(self, Type::LeftBrace) {
            return Ok(Stmt::Block(BlockData { statements: self.block()? }));
        }

        self.expression_statement()
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`, with `cond` defaulting to `true`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if advance_if_matches!(self, Type::Semicolon) {
            None
        } else if advance_if_matches!(self, Type::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(Type::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(Type::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(Type::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(Type::RightParen, "Expect ')' after loop clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(BlockData {
                statements: vec![body, Stmt::Expression(ExpressionData { expr: increment })],
            });
        }

        body = Stmt::While(WhileData {
            condition: condition.unwrap_or(Expr::Literal(Literal::Bool(true))),
            body: Box::new(body),
        });

        if let Some(initializer) = initializer {
            body = Stmt::Block(BlockData { statements: vec![initializer, body] });
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if advance_if_matches!(self, Type::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If(IfData { condition, then_branch, else_branch }))
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(PrintData { expr }))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        let value = if !self.check(Type::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(Type::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(ReturnData { keyword, value }))
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        self.consume(Type::Semicolon, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break(BreakData { keyword }))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(ExpressionData { expr }))
    }

    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, &format!("Expect {kind} name."))?.clone();

        self.consume(Type::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = vec![];

        if !self.check(Type::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.report(ParseError {
                        token: self.peek().clone(),
                        message: "Can't have more than 255 parameters.".to_string(),
                    });
                }

                params.push(self.consume(Type::Identifier, "Expect parameter name.")?.clone());

                if !advance_if_matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        self.consume(Type::RightParen, "Expect ')' after parameters.")?;
        self.consume(Type::LeftBrace, &format!("Expect '{{' before {kind} body."))?;

        let body = self.block()?;

        Ok(Stmt::Function(FunctionData { name, params, body }))
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(Type::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(Type::RightBrace, "Expect '}' after block.")?;

        Ok(statements)
    }

    /// Parses an expression, then if followed by `=` validates the left side
    /// was an assignable target (a bare variable or a `.` property access)
    /// and rewrites it into `Assign`/`Set`. Anything else is reported but the
    /// left-hand expression is kept so parsing can continue.
    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if advance_if_matches!(self, Type::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(data) => Ok(Expr::Assign(AssignData { name: data.name, value: Box::new(value) })),
                Expr::Get(data) => Ok(Expr::Set(SetData { object: data.object, name: data.name, value: Box::new(value) })),
                _ => {
                    self.report(ParseError { token: equals, message: "Invalid assignment target.".to_string() });
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while advance_if_matches!(self, Type::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical(LogicalData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while advance_if_matches!(self, Type::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical(LogicalData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while advance_if_matches!(self, Type::BangEqual, Type::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary(BinaryData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while advance_if_matches!(self, Type::Greater, Type::GreaterEqual, Type::Less, Type::LessEqual) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary(BinaryData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while advance_if_matches!(self, Type::Minus, Type::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary(BinaryData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while advance_if_matches!(self, Type::Slash, Type::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary(BinaryData { left: Box::new(expr), operator, right: Box::new(right) });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if advance_if_matches!(self, Type::Bang, Type::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary(UnaryData { operator, expr: Box::new(right) }));
        }

        self.call()
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];

        if !self.check(Type::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.report(ParseError {
                        token: self.peek().clone(),
                        message: "Can't have more than 255 arguments.".to_string(),
                    });
                }

                arguments.push(self.expression()?);

                if !advance_if_matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(Type::RightParen, "Expect ')' after arguments.")?.clone();

        Ok(Expr::Call(CallData { callee: Box::new(callee), paren, arguments }))
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if advance_if_matches!(self, Type::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if advance_if_matches!(self, Type::Dot) {
                let name = self.consume(Type::Identifier, "Expect property name after '.'.")?.clone();
                expr = Expr::Get(GetData { object: Box::new(expr), name });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parses and discards a right-hand operand at `parse_rhs`'s precedence,
    /// then returns a "Missing left-hand operand" error for `operator`. Used
    /// when `primary` finds a binary operator where an expression was
    /// expected (e.g. `+ 2` with nothing before the `+`).
    fn missing_operand(
        &mut self,
        operator: Token,
        parse_rhs: impl FnOnce(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let _ = parse_rhs(self);
        Err(ParseError { token: operator, message: "Missing left-hand operand.".to_string() })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if advance_if_matches!(self, Type::False) {
            return Ok(Expr::Literal(Literal::Bool(false)));
        }

        if advance_if_matches!(self, Type::True) {
            return Ok(Expr::Literal(Literal::Bool(true)));
        }

        if advance_if_matches!(self, Type::Nil) {
            return Ok(Expr::Literal(Literal::Nil));
        }

        if advance_if_matches!(self, Type::Number, Type::String) {
            return Ok(Expr::Literal(self.previous().literal.clone()
                .expect("number or string token to carry a literal value")));
        }

        if advance_if_matches!(self, Type::Super) {
            let keyword = self.previous().clone();
            self.consume(Type::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(Type::Identifier, "Expect superclass method name.")?.clone();

            return Ok(Expr::Super(SuperData { keyword, method }));
        }

        if advance_if_matches!(self, Type::This) {
            return Ok(Expr::This(ThisData { keyword: self.previous().clone() }));
        }

        if advance_if_matches!(self, Type::Identifier) {
            return Ok(Expr::Variable(VariableData { name: self.previous().clone() }));
        }

        if advance_if_matches!(self, Type::LeftParen) {
            let expr = self.expression()?;
            self.consume(Type::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(GroupingData { expr: Box::new(expr) }));
        }

        if advance_if_matches!(self, Type::BangEqual, Type::EqualEqual) {
            let operator = self.previous().clone();
            return self.missing_operand(operator, Self::comparison);
        }

        if advance_if_matches!(self, Type::Greater, Type::GreaterEqual, Type::Less, Type::LessEqual) {
            let operator = self.previous().clone();
            return self.missing_operand(operator, Self::term);
        }

        if advance_if_matches!(self, Type::Plus) {
            let operator = self.previous().clone();
            return self.missing_operand(operator, Self::factor);
        }

        if advance_if_matches!(self, Type::Slash, Type::Star) {
            let operator = self.previous().clone();
            return self.missing_operand(operator, Self::unary);
        }

        Err(ParseError { token: self.peek().clone(), message: "Expect expression.".to_string() })
    }

    /// Discards tokens until after a `;` or at the next statement-starter
    /// keyword, so later declarations get a fresh chance to parse.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().r#type == Type::Semicolon {
                return;
            }

            match self.peek().r#type {
                Type::Class | Type::Fun | Type::Var | Type::For
                | Type::If | Type::While | Type::Print | Type::Return => return,
                _ => { self.advance(); }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(src: &str) -> (Vec<Stmt>, String) {
        let (tokens, scan_errors) = Scanner::new(src).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors: {scan_errors}");
        Parser::new(tokens).parse()
    }

    #[test]
    fn desugars_for_into_a_block_with_a_while() {
        let (statements, errors) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errors.is_empty());
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Block(_)));
    }

    #[test]
    fn break_parses_as_a_statement() {
        let (statements, errors) = parse("while (true) { break; }");
        assert!(errors.is_empty());
        let Stmt::While(data) = &statements[0] else { panic!("expected while") };
        let Stmt::Block(block) = data.body.as_ref() else { panic!("expected block body") };
        assert!(matches!(block.statements[0], Stmt::Break(_)));
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_parsing_continues() {
        let (statements, errors) = parse("1 = 2;");
        assert!(errors.contains("Invalid assignment target"));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn missing_left_hand_operand_is_reported() {
        let (_, errors) = parse("+ 2;");
        assert!(errors.contains("Missing left-hand operand"));
    }

    #[test]
    fn parameter_cap_is_reported_but_not_fatal() {
        let params = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let src = format!("fun f({params}) {{ print 1; }}");
        let (statements, errors) = parse(&src);
        assert!(errors.contains("Can't have more than 255 parameters"));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn synchronize_resumes_parsing_after_the_next_semicolon() {
        let (statements, errors) = parse("var a = ; var b = 2;");
        assert!(!errors.is_empty());
        assert_eq!(statements.len(), 1);
        let Stmt::Var(data) = &statements[0] else { panic!("expected var") };
        assert_eq!(data.name.lexeme, "b");
    }
}
