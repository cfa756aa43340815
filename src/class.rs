use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::function::UserFunction;
use crate::object::{Callable, Object};
use crate::interpreter::Interpreter;
use crate::token::Token;

// `Class` is callable (as the constructor `ClassName(...)`) but, unlike
// `UserFunction`/`NativeFunction`, doesn't implement `Callable`: building the
// instance needs an `Rc<Class>` to hand to `Instance::new`, and the only way
// to get one from `&self` would be to clone the whole method table on every
// instantiation. `arity`/`instantiate` below take the `Rc<Self>` the
// interpreter already holds instead, so constructing an instance is just a
// refcount bump.

/// A Lox class: a name, an optional single superclass, and its own methods
/// (inherited methods are found by walking the superclass chain, not copied
/// in at construction time).
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<UserFunction>>,
}

impl Class {
    pub fn new(name: String, superclass: Option<Rc<Class>>, methods: HashMap<String, Rc<UserFunction>>) -> Self {
        Class { name, superclass, methods }
    }

    /// Looks up a method on this class, falling back to the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<UserFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref().and_then(|superclass| superclass.find_method(name))
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |initializer| initializer.arity())
    }

    /// Constructs a new instance of this class, running `init` if it
    /// declares one. Takes `Rc<Self>` so the instance can hold on to the
    /// same class allocation the interpreter already has, rather than
    /// cloning it.
    pub fn instantiate(self: Rc<Class>, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(&self))));
        let instance_obj = Object::Instance(Rc::clone(&instance));

        if let Some(initializer) = self.find_method("init") {
            initializer.bind(instance_obj.clone()).call(interpreter, arguments)?;
        }

        Ok(instance_obj)
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Object>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance { class, fields: HashMap::new() }
    }

    pub fn get(&self, name: &Token, instance: &Object) -> Result<Object, RuntimeError> {
        if let Some(field) = self.fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        if let Some(method) = self.class.find_method(&name.lexeme) {
            return Ok(Object::from(method.bind(instance.clone())));
        }

        Err(RuntimeError {
            token: name.clone(),
            message: format!("Undefined property '{}'.", name.lexeme),
        })
    }

    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Location, Type};

    fn token(name: &str) -> Token {
        Token::new(Type::Identifier, name.to_string(), None, Location::new(1, 0), 0)
    }

    #[test]
    fn instance_set_then_get_returns_the_field() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let mut instance = Instance::new(class);
        instance.set(&token("x"), Object::from(3.0));

        let handle = Object::Instance(Rc::new(RefCell::new(instance.clone())));
        assert_eq!(instance.get(&token("x"), &handle).unwrap(), Object::from(3.0));
    }

    #[test]
    fn undefined_property_is_a_runtime_error() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let instance = Instance::new(class);
        let handle = Object::Instance(Rc::new(RefCell::new(instance.clone())));
        let err = instance.get(&token("y"), &handle).unwrap_err();
        assert!(err.message.contains("Undefined property 'y'"));
    }

    #[test]
    fn instantiate_shares_the_class_allocation() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let mut interpreter = Interpreter::new();
        let Object::Instance(instance) = class.clone().instantiate(&mut interpreter, vec![]).unwrap() else {
            panic!("expected an instance");
        };
        assert!(Rc::ptr_eq(&instance.borrow().class, &class));
    }

    #[test]
    fn find_method_walks_the_superclass_chain() {
        use crate::environment::Environment;

        let mut base_methods = HashMap::new();
        let greet = Rc::new(UserFunction::new(
            token("greet"),
            vec![],
            Rc::new(vec![]),
            Rc::new(RefCell::new(Environment::new(None))),
            false,
        ));
        base_methods.insert("greet".to_string(), greet);
        let base = Rc::new(Class::new("Animal".to_string(), None, base_methods));
        let derived = Class::new("Dog".to_string(), Some(Rc::clone(&base)), HashMap::new());

        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }
}
