use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::object::Object;
use crate::token::Token;
use crate::error::RuntimeError;

#[derive(Debug, Clone)]
pub struct Environment {
    pub enclosing: Option<Rc<RefCell<Environment>>>,
    pub variables: HashMap<String, Object>,
}

impl Environment {
    pub fn new(enclosing: Option<Rc<RefCell<Environment>>>) -> Self {
        Environment {
            enclosing,
            variables: HashMap::new(),
        }
    }

    pub fn define(&mut self, name: &str, value: Object) {
        self.variables.insert(name.to_string(), value);
    }

    fn ancestor(&self, distance: usize) -> Rc<RefCell<Environment>> {
        let parent = self.enclosing.clone()
            .unwrap_or_else(|| panic!("enclosing environment to exist at depth {}", 1));
        let mut environment = Rc::clone(&parent);

        for i in 1..distance {
            let parent = environment.borrow().enclosing.clone()
                .unwrap_or_else(|| panic!("enclosing environment to exist at depth {}", i));
            environment = Rc::clone(&parent);
        }

        environment
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), RuntimeError> {
        if self.variables.contains_key(&name.lexeme) {
            self.variables.insert(name.lexeme.clone(), value);
            return Ok(());
        }

        if let Some(enclosing) = &mut self.enclosing {
            return enclosing.borrow_mut().assign(name, value);
        }

        Err(RuntimeError {
            token: name.clone(),
            message: format!("Undefined variable '{}'.", name.lexeme),
        })
    }

    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Object) {
        if distance > 0 {
            self.ancestor(distance).borrow_mut().variables.insert(name.lexeme.clone(), value);
        } else {
            self.variables.insert(name.lexeme.clone(), value);
        }
    }

    pub fn get(&self, name: &Token) -> Result<Object, RuntimeError> {
        if let Some(variable) = self.variables.get(&name.lexeme) {
            return Ok(variable.clone());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow().get(name);
        }

        Err(RuntimeError {
            token: name.clone(),
            message: format!("Undefined variable '{}'.", name.lexeme)
        })
    }

    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Object, RuntimeError> {
        self.get_at_str(distance, &name.lexeme).ok_or_else(|| RuntimeError {
            token: name.clone(),
            message: format!("Undefined variable '{}'.", name.lexeme),
        })
    }

    /// Looks a name up by plain string at a known distance. Used for `this`
    /// and `super`, which the resolver and interpreter refer to by name
    /// rather than by the original token (there may not be one handy, e.g.
    /// when a method body never mentions `this` directly but still needs it
    /// bound for a call).
    pub fn get_at_str(&self, distance: usize, name: &str) -> Option<Object> {
        if distance > 0 {
            self.ancestor(distance).borrow().variables.get(name).cloned()
        } else {
            self.variables.get(name).cloned()
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use crate::token::{Location, Type};

    fn token(name: &str) -> Token {
        Token::new(Type::Identifier, name.to_string(), None, Location::new(1, 0), 0)
    }

    #[test]
    fn get_falls_through_to_enclosing_scope() {
        let mut global = Environment::new(None);
        global.define("x", Object::Literal(Literal::Number(1.0)));
        let child = Environment::new(Some(Rc::new(RefCell::new(global))));

        assert_eq!(child.get(&token("x")).unwrap(), Object::Literal(Literal::Number(1.0)));
    }

    #[test]
    fn assign_to_undefined_variable_is_a_runtime_error() {
        let mut env = Environment::new(None);
        assert!(env.assign(&token("missing"), Object::Literal(Literal::Nil)).is_err());
    }

    #[test]
    fn get_at_distance_reads_the_right_ancestor() {
        let mut global = Environment::new(None);
        global.define("x", Object::Literal(Literal::Number(1.0)));
        let global = Rc::new(RefCell::new(global));

        let mut middle = Environment::new(Some(Rc::clone(&global)));
        middle.define("x", Object::Literal(Literal::Number(2.0)));
        let middle = Rc::new(RefCell::new(middle));

        let inner = Environment::new(Some(Rc::clone(&middle)));

        assert_eq!(inner.get_at(1, &token("x")).unwrap(), Object::Literal(Literal::Number(2.0)));
        assert_eq!(inner.get_at(2, &token("x")).unwrap(), Object::Literal(Literal::Number(1.0)));
    }
}
