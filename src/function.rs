use std::cell::RefCell;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{Flow, Interpreter};
use crate::literal::Literal;
use crate::object::{Callable, Object};
use crate::stmt::Stmt;
use crate::token::{Location, Token, Type};

/// A user-defined function or method, closed over the environment it was
/// declared in. `is_initializer` marks a class's `init` method: calling it
/// always yields the bound instance (`this`) regardless of what the body
/// returns, and a bare `return;` inside it is fine while `return <expr>;` is
/// rejected by the resolver.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl UserFunction {
    pub fn new(name: Token, params: Vec<Token>, body: Rc<Vec<Stmt>>, closure: Rc<RefCell<Environment>>, is_initializer: bool) -> Self {
        UserFunction { name, params, body, closure, is_initializer }
    }

    /// Produces a copy of this function whose closure additionally defines
    /// `this` as `instance`. Used both for ordinary method dispatch and for
    /// resolving `super.method()` calls.
    pub fn bind(&self, instance: Object) -> UserFunction {
        let environment = Rc::new(RefCell::new(Environment::new(Some(Rc::clone(&self.closure)))));
        environment.borrow_mut().define("this", instance);

        UserFunction {
            name: self.name.clone(),
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }
}

impl Callable for UserFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));

        for (param, arg) in self.params.iter().zip(arguments.into_iter()) {
            environment.define(&param.lexeme, arg);
        }

        let flow = interpreter.execute_block(&self.body, Rc::new(RefCell::new(environment)))?;

        if self.is_initializer {
            return Ok(self.closure.borrow().get_at_str(0, "this").expect("initializer to close over this"));
        }

        Ok(match flow {
            Flow::Return(value) => value,
            _ => Object::Literal(Literal::Nil),
        })
    }

    fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Display for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}

/// A function implemented in Rust and exposed to Lox under a fixed name and
/// arity (spec native function table: `clock`, `input`, `len`).
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub function: Rc<dyn Fn(&mut Interpreter, Vec<Object>) -> Result<Object, RuntimeError>>,
}

impl Clone for NativeFunction {
    fn clone(&self) -> Self {
        NativeFunction { name: self.name.clone(), arity: self.arity, function: Rc::clone(&self.function) }
    }
}

impl Callable for NativeFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        (self.function)(interpreter, arguments)
    }

    fn arity(&self) -> usize {
        self.arity
    }
}

impl NativeFunction {
    /// The functions every fresh global scope is seeded with.
    pub fn globals() -> Vec<NativeFunction> {
        vec![
            NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                function: Rc::new(|_, _| {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .expect("system clock to be after the unix epoch")
                        .as_secs_f64();
                    Ok(Object::from(now))
                }),
            },
            NativeFunction {
                name: "input".to_string(),
                arity: 0,
                function: Rc::new(|_, _| {
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)
                        .map_err(|e| RuntimeError::new(eof_token(), format!("Failed to read input: {e}")))?;
                    while input.ends_with('\n') || input.ends_with('\r') {
                        input.pop();
                    }
                    Ok(Object::from(input))
                }),
            },
            NativeFunction {
                name: "len".to_string(),
                arity: 1,
                function: Rc::new(|_, mut arguments| {
                    let argument = arguments.remove(0);
                    match &argument {
                        Object::Literal(Literal::String(s)) => Ok(Object::from(s.chars().count() as f64)),
                        _ => Err(RuntimeError::new(
                            eof_token(),
                            format!("Cannot take len() of a {}.", argument.type_str()),
                        )),
                    }
                }),
            },
        ]
    }
}

/// Native functions raise errors that aren't tied to any particular source
/// token; this placeholder carries enough to print a sane location.
fn eof_token() -> Token {
    Token::new(Type::EOF, String::new(), None, Location::new(0, 0), 0)
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_functions_have_expected_arities() {
        let globals = NativeFunction::globals();
        let len = globals.iter().find(|f| f.name == "len").unwrap();
        assert_eq!(len.arity(), 1);
        let clock = globals.iter().find(|f| f.name == "clock").unwrap();
        assert_eq!(clock.arity(), 0);
    }
}
