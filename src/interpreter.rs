use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::class::{Class, Instance};
use crate::environment::Environment;
use crate::error::{Report, RuntimeError};
use crate::expr::{self, Expr, ExprVisitor};
use crate::function::{NativeFunction, UserFunction};
use crate::literal::Literal;
use crate::object::{Callable, Object};
use crate::stmt::{self, Stmt, StmtVisitor};
use crate::token::{Token, Type};

/// What a statement did besides whatever side effects it had. Return and
/// break are non-local exits: they unwind through blocks, `if`, and `while`
/// without becoming `RuntimeError`s, and are only observed by the call
/// boundary (for `Return`) or the enclosing `while` (for `Break`).
pub enum Flow {
    Normal,
    Return(Object),
    Break,
}

type EvalResult = Result<Object, RuntimeError>;
type ExecResult = Result<Flow, RuntimeError>;

/// The tree-walking evaluator. Holds the global scope (seeded with the
/// native functions), the environment currently in scope, and the
/// resolver's distance side-table (keyed by [`Token::id`], since the same
/// variable name can appear at many, separately-resolved, occurrences).
pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<u64, usize>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Builds an interpreter that writes `print` output to an arbitrary
    /// sink instead of stdout. Used by integration tests to capture output.
    pub fn with_writer(out: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new(None)));
        for native in NativeFunction::globals() {
            let name = native.name.clone();
            globals.borrow_mut().define(&name, Object::from(native));
        }

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Records that the occurrence of a name at `token` was resolved
    /// `distance` environment frames up from wherever it is evaluated.
    pub fn resolve(&mut self, token: &Token, distance: usize) {
        self.locals.insert(token.id, distance);
    }

    /// Runs a program's statements in order. Stops at (and reports) the
    /// first runtime error, per the propagation policy: a runtime error
    /// aborts the rest of the current top-level unit. Returns the
    /// formatted error text, empty if nothing went wrong.
    pub fn interpret(&mut self, statements: &[Stmt]) -> String {
        let mut buf = Vec::new();

        for statement in statements {
            if let Err(error) = self.execute(statement) {
                let _ = error.report(&mut buf);
                break;
            }
        }

        String::from_utf8(buf).unwrap_or_default()
    }

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        stmt.accept(self)
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        expr.accept(self)
    }

    /// Runs `statements` with `environment` as the active scope, restoring
    /// whatever scope was active before on every exit path — normal
    /// completion, a `Return`/`Break` signal, or a propagated error.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Rc<RefCell<Environment>>) -> ExecResult {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = (|| {
            for statement in statements {
                match self.execute(statement)? {
                    Flow::Normal => continue,
                    other => return Ok(other),
                }
            }
            Ok(Flow::Normal)
        })();

        self.environment = previous;
        result
    }

    fn lookup_variable(&self, name: &Token) -> EvalResult {
        match self.locals.get(&name.id) {
            Some(&distance) => self.environment.borrow().get_at(distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn check_number_operand(operator: &Token, operand: &Object) -> Result<f64, RuntimeError> {
        operand.as_number().ok_or_else(|| RuntimeError::new(operator.clone(), "Operand must be a number."))
    }

    fn check_number_operands(operator: &Token, left: &Object, right: &Object) -> Result<(f64, f64), RuntimeError> {
        match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(RuntimeError::new(operator.clone(), "Operands must be two numbers.")),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprVisitor<EvalResult> for Interpreter {
    fn visit_literal_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Literal(literal) = expr else { unreachable!() };
        Ok(Object::from(literal.clone()))
    }

    fn visit_logical_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Logical(logical) = expr else { unreachable!() };

        let left = self.evaluate(&logical.left)?;

        if logical.operator.r#type == Type::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.evaluate(&logical.right)
    }

    fn visit_unary_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Unary(unary) = expr else { unreachable!() };

        let right = self.evaluate(&unary.expr)?;

        match unary.operator.r#type {
            Type::Minus => {
                let n = Self::check_number_operand(&unary.operator, &right)?;
                Ok(Object::from(-n))
            }
            Type::Bang => Ok(Object::from(!right.is_truthy())),
            _ => unreachable!(),
        }
    }

    fn visit_binary_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Binary(binary) = expr else { unreachable!() };

        let left = self.evaluate(&binary.left)?;
        let right = self.evaluate(&binary.right)?;
        let op = &binary.operator;

        match op.r#type {
            Type::Greater => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l > r))
            }
            Type::GreaterEqual => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l >= r))
            }
            Type::Less => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l < r))
            }
            Type::LessEqual => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l <= r))
            }
            Type::BangEqual => Ok(Object::from(left != right)),
            Type::EqualEqual => Ok(Object::from(left == right)),
            Type::Minus => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l - r))
            }
            Type::Slash => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                if r == 0.0 {
                    return Err(RuntimeError::new(op.clone(), "Division by zero."));
                }
                Ok(Object::from(l / r))
            }
            Type::Star => {
                let (l, r) = Self::check_number_operands(op, &left, &right)?;
                Ok(Object::from(l * r))
            }
            Type::Plus => match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => Ok(Object::from(l + r)),
                _ if left.as_string().is_some() || right.as_string().is_some() => {
                    Ok(Object::from(format!("{left}{right}")))
                }
                _ => Err(RuntimeError::new(op.clone(), "Operands must be two numbers or two strings.")),
            },
            _ => unreachable!(),
        }
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Grouping(grouping) = expr else { unreachable!() };
        self.evaluate(&grouping.expr)
    }

    fn visit_variable_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Variable(variable) = expr else { unreachable!() };
        self.lookup_variable(&variable.name)
    }

    fn visit_assign_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Assign(assign) = expr else { unreachable!() };

        let value = self.evaluate(&assign.value)?;

        match self.locals.get(&assign.name.id) {
            Some(&distance) => self.environment.borrow_mut().assign_at(distance, &assign.name, value.clone()),
            None => self.globals.borrow_mut().assign(&assign.name, value.clone())?,
        }

        Ok(value)
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Call(call) = expr else { unreachable!() };

        let callee = self.evaluate(&call.callee)?;

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.evaluate(argument)?);
        }

        let arity = match &callee {
            Object::Function(f) => f.arity(),
            Object::NativeFunction(f) => f.arity(),
            Object::Class(c) => c.arity(),
            _ => {
                return Err(RuntimeError::new(call.paren.clone(), "Can only call functions and classes."));
            }
        };

        if arguments.len() != arity {
            return Err(RuntimeError::new(
                call.paren.clone(),
                format!("Expected {} arguments but got {}.", arity, arguments.len()),
            ));
        }

        match callee {
            Object::Function(f) => f.call(self, arguments),
            Object::NativeFunction(f) => f.call(self, arguments),
            Object::Class(c) => c.instantiate(self, arguments),
            _ => unreachable!(),
        }
    }

    fn visit_get_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Get(get) = expr else { unreachable!() };

        let object = self.evaluate(&get.object)?;

        match &object {
            Object::Instance(instance) => instance.borrow().get(&get.name, &object),
            _ => Err(RuntimeError::new(get.name.clone(), "Only instances have properties.")),
        }
    }

    fn visit_set_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Set(set) = expr else { unreachable!() };

        let object = self.evaluate(&set.object)?;

        let Object::Instance(instance) = &object else {
            return Err(RuntimeError::new(set.name.clone(), "Only instances have fields."));
        };

        let value = self.evaluate(&set.value)?;
        instance.borrow_mut().set(&set.name, value.clone());
        Ok(value)
    }

    fn visit_this_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::This(this) = expr else { unreachable!() };
        self.lookup_variable(&this.keyword)
    }

    fn visit_super_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        let distance = *self.locals.get(&super_expr.keyword.id)
            .expect("resolver to have annotated every 'super' occurrence");

        let superclass = self.environment.borrow().get_at_str(distance, "super")
            .expect("'super' to be bound in its resolved frame");
        let Object::Class(superclass) = superclass else {
            unreachable!("resolver only binds 'super' to a class value");
        };

        let instance = self.environment.borrow().get_at_str(distance - 1, "this")
            .expect("'this' to be bound one frame inside 'super'");

        let method = superclass.find_method(&super_expr.method.lexeme).ok_or_else(|| {
            RuntimeError::new(super_expr.method.clone(), format!("Undefined property '{}'.", super_expr.method.lexeme))
        })?;

        Ok(Object::from(method.bind(instance)))
    }
}

impl StmtVisitor<ExecResult> for Interpreter {
    fn visit_expression_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Expression(data) = stmt else { unreachable!() };
        self.evaluate(&data.expr)?;
        Ok(Flow::Normal)
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Print(data) = stmt else { unreachable!() };
        let value = self.evaluate(&data.expr)?;
        let _ = writeln!(self.out, "{value}");
        Ok(Flow::Normal)
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Var(data) = stmt else { unreachable!() };

        let value = match &data.initializer {
            Some(initializer) => self.evaluate(initializer)?,
            None => Object::Literal(Literal::Nil),
        };

        self.environment.borrow_mut().define(&data.name.lexeme, value);
        Ok(Flow::Normal)
    }

    fn visit_block_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Block(data) = stmt else { unreachable!() };
        let environment = Environment::new(Some(Rc::clone(&self.environment)));
        self.execute_block(&data.statements, Rc::new(RefCell::new(environment)))
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::If(data) = stmt else { unreachable!() };

        if self.evaluate(&data.condition)?.is_truthy() {
            self.execute(&data.then_branch)
        } else if let Some(else_branch) = &data.else_branch {
            self.execute(else_branch)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::While(data) = stmt else { unreachable!() };

        while self.evaluate(&data.condition)?.is_truthy() {
            match self.execute(&data.body)? {
                Flow::Normal => continue,
                Flow::Break => break,
                returned @ Flow::Return(_) => return Ok(returned),
            }
        }

        Ok(Flow::Normal)
    }

    fn visit_break_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Break(_) = stmt else { unreachable!() };
        Ok(Flow::Break)
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Function(data) = stmt else { unreachable!() };

        let function = UserFunction::new(
            data.name.clone(),
            data.params.clone(),
            Rc::new(data.body.clone()),
            Rc::clone(&self.environment),
            false,
        );
        self.environment.borrow_mut().define(&data.name.lexeme, Object::from(function));
        Ok(Flow::Normal)
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Return(data) = stmt else { unreachable!() };

        let value = match &data.value {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Literal(Literal::Nil),
        };

        Ok(Flow::Return(value))
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Class(data) = stmt else { unreachable!() };

        let superclass = match &data.superclass {
            Some(superclass_expr) => {
                let value = self.evaluate(superclass_expr)?;
                let Object::Class(class) = value else {
                    let Expr::Variable(variable) = superclass_expr else { unreachable!() };
                    return Err(RuntimeError::new(variable.name.clone(), "Superclass must be a class."));
                };
                Some(class)
            }
            None => None,
        };

        self.environment.borrow_mut().define(&data.name.lexeme, Object::Literal(Literal::Nil));

        let enclosing = Rc::clone(&self.environment);
        if let Some(superclass) = &superclass {
            let super_env = Environment::new(Some(Rc::clone(&enclosing)));
            self.environment = Rc::new(RefCell::new(super_env));
            self.environment.borrow_mut().define("super", Object::from(Rc::clone(superclass)));
        }

        let mut methods = HashMap::new();
        for method in &data.methods {
            let stmt::Stmt::Function(method_data) = method else { unreachable!() };
            let is_initializer = method_data.name.lexeme == "init";
            let function = UserFunction::new(
                method_data.name.clone(),
                method_data.params.clone(),
                Rc::new(method_data.body.clone()),
                Rc::clone(&self.environment),
                is_initializer,
            );
            methods.insert(method_data.name.lexeme.clone(), Rc::new(function));
        }

        if superclass.is_some() {
            self.environment = enclosing;
        }

        let class = Class::new(data.name.lexeme.clone(), superclass, methods);
        self.environment.borrow_mut().assign(&data.name, Object::from(Rc::new(class)))?;

        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(src: &str) -> String {
        let (tokens, scan_errors) = Scanner::new(src).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors: {scan_errors}");

        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {parse_errors}");

        let buf: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_writer(Box::new(SharedBuf(Rc::clone(&buf))));

        let resolve_errors = Resolver::new(&mut interpreter).resolve_program(&statements);
        assert!(resolve_errors.is_empty(), "resolve errors: {resolve_errors}");

        let runtime_errors = interpreter.interpret(&statements);
        assert!(runtime_errors.is_empty(), "runtime errors: {runtime_errors}");

        let bytes = buf.borrow().clone();
        String::from_utf8(bytes).unwrap()
    }

    struct SharedBuf(Rc<RefCell<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(data)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn closures_capture_the_defining_environment() {
        let src = r#"
            var a = "global";
            {
                fun f() { print a; }
                var a = "local";
                f();
            }
        "#;
        assert_eq!(run(src), "global\n");
    }

    #[test]
    fn recursive_fibonacci() {
        let src = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        "#;
        assert_eq!(run(src), "55\n");
    }

    #[test]
    fn inheritance_dispatches_through_super() {
        let src = r#"
            class A { greet() { print "A"; } }
            class B < A { greet() { super.greet(); print "B"; } }
            B().greet();
        "#;
        assert_eq!(run(src), "A\nB\n");
    }

    #[test]
    fn initializer_always_returns_this() {
        assert_eq!(run(r#"class C { init(x) { this.x = x; } } print C(7).x;"#), "7\n");
    }

    #[test]
    fn break_exits_the_enclosing_while() {
        let src = r#"
            var i = 0;
            while (i < 3) {
                if (i == 2) break;
                print i;
                i = i + 1;
            }
            print "done";
        "#;
        assert_eq!(run(src), "0\n1\ndone\n");
    }

    #[test]
    fn truthiness_laws() {
        assert_eq!(run("print !nil;"), "true\n");
        assert_eq!(run("print !false;"), "true\n");
        assert_eq!(run("print !0;"), "false\n");
        assert_eq!(run(r#"print !"";"#), "false\n");
    }

    #[test]
    fn logical_operators_return_operand_values_not_booleans() {
        assert_eq!(run(r#"print "hi" or 2;"#), "hi\n");
        assert_eq!(run(r#"print nil or "fallback";"#), "fallback\n");
        assert_eq!(run(r#"print "hi" and "there";"#), "there\n");
        assert_eq!(run(r#"print false and "unreached";"#), "false\n");
    }

    #[test]
    fn equality_is_type_sensitive() {
        assert_eq!(run(r#"print 1 == "1";"#), "false\n");
        assert_eq!(run("print nil == false;"), "false\n");
        assert_eq!(run("print nil == nil;"), "true\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (tokens, _) = Scanner::new("print 1/0;").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        let mut interpreter = Interpreter::with_writer(Box::new(io::sink()));
        let _ = Resolver::new(&mut interpreter).resolve_program(&statements);
        let errors = interpreter.interpret(&statements);
        assert!(errors.contains("Division by zero"));
    }

    #[test]
    fn string_concatenation_with_plus() {
        assert_eq!(run(r#"print "foo" + "bar";"#), "foobar\n");
    }

    #[test]
    fn plus_stringifies_when_either_side_is_a_string() {
        assert_eq!(run(r#"print "n=" + 1;"#), "n=1\n");
    }

    #[test]
    fn classes_print_their_bare_name_and_instances_say_so() {
        let src = r#"
            class Bagel {}
            print Bagel;
            print Bagel();
        "#;
        assert_eq!(run(src), "Bagel\nBagel instance\n");
    }
}
