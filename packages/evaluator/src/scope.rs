use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A variable slot
#[derive(Clone)]
pub enum Binding {
    Value { value: Value, mutable: bool },
    /// Live import: read from the source module's exports at use time
    Import { source: Value, name: String },
}

pub enum AssignError {
    NotFound,
    Constant,
}

/// Lexical environment
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding::Value { value, mutable });
    }

    pub fn declare_import(&self, name: &str, source: Value, imported: &str) {
        self.vars.borrow_mut().insert(
            name.to_string(),
            Binding::Import {
                source,
                name: imported.to_string(),
            },
        );
    }

    /// Nearest binding for `name`
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            return match binding {
                Binding::Value {
                    value: slot,
                    mutable: true,
                } => {
                    *slot = value;
                    Ok(())
                }
                _ => Err(AssignError::Constant),
            };
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::NotFound),
        }
    }

    /// Own bindings, for per-iteration copies of loop variables
    pub fn own_bindings(&self) -> Vec<(String, Binding)> {
        self.vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn restore_bindings(&self, bindings: Vec<(String, Binding)>) {
        let mut vars = self.vars.borrow_mut();
        for (name, binding) in bindings {
            vars.insert(name, binding);
        }
    }

    /// Drop every binding; breaks closure cycles when a session ends
    pub fn clear(&self) {
        self.vars.borrow_mut().clear();
    }
}
