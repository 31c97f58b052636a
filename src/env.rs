use crate::value::{NativeFunction, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// A chained scope record. `define` always targets this environment's own
/// map (so shadowing works) while `get`/`assign` walk the enclosing chain
/// outward (so inner scopes see outer bindings). That asymmetry is the
/// entire scoping model.
#[derive(Debug, PartialEq)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    /// Creates a new, empty global environment without the prelude.
    pub fn new() -> Rc<RefCell<Self>> {
        debug!("Creating new global environment");
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: None,
        }))
    }

    /// Creates a global environment populated with the native prelude.
    pub fn new_with_prelude() -> Rc<RefCell<Self>> {
        debug!("Creating new global environment with prelude");
        let env = Environment::new();

        const PRELUDE: &[NativeFunction] = &[NativeFunction {
            name: "clock",
            arity: 0,
            func: native_clock,
        }];

        {
            let mut globals = env.borrow_mut();
            for native in PRELUDE {
                globals.define(native.name.to_string(), Value::NativeFunction(native.clone()));
            }
        }
        env
    }

    /// Creates a new environment enclosed by `enclosing`. One of these is
    /// made per block entry and per call activation.
    pub fn new_enclosed(enclosing: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        trace!("Creating new enclosed environment");
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    /// Defines a new variable or redefines an existing one in this
    /// environment only. Never fails.
    pub fn define(&mut self, name: String, value: Value) {
        trace!(name = %name, value = ?value, "Defining variable in current environment");
        self.values.insert(name, value);
    }

    /// Retrieves a variable's value, delegating to the enclosing chain when
    /// it is not bound here. `None` means undefined everywhere; the caller
    /// owns turning that into a line-attributed error.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            trace!(name = %name, "Found variable in current environment");
            Some(value.clone())
        } else {
            match &self.enclosing {
                Some(enclosing) => {
                    trace!(name = %name, "Variable not here, checking enclosing environment");
                    enclosing.borrow().get(name)
                }
                None => {
                    debug!(name = %name, "Variable not found in any environment");
                    None
                }
            }
        }
    }

    /// Overwrites `name` in the nearest enclosing environment that already
    /// defines it. Returns `false` when no environment in the chain does;
    /// assignment never creates a binding.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            trace!(name = %name, value = ?value, "Assigning variable in current environment");
            *slot = value;
            true
        } else {
            match &self.enclosing {
                Some(enclosing) => enclosing.borrow_mut().assign(name, value),
                None => {
                    debug!(name = %name, "Assignment target not found in any environment");
                    false
                }
            }
        }
    }
}

/// Seconds since the Unix epoch, as a script number.
fn native_clock(_args: &[Value]) -> Result<Value, String> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("clock error: {}", e))?
        .as_secs_f64();
    Ok(Value::Number(seconds))
}
