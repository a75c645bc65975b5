// ABOUTME: Environments: name-to-cell hash tables chained through parent links

use crate::error::LispError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A shared mutable binding slot. `None` marks a name that is bound but
/// not yet assigned (letrec forward references). Cells are shared by
/// every environment that installed them; only the contained Option is
/// ever swapped.
pub type Cell = Rc<RefCell<Option<Value>>>;

/// Create a fresh cell, populated or empty.
pub fn new_cell(value: Option<Value>) -> Cell {
    Rc::new(RefCell::new(value))
}

pub struct Environment {
    bindings: RefCell<HashMap<String, Cell>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates the root environment, with no parent.
    pub fn root() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a child environment chained to `parent`.
    pub fn extend(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Inserts a fresh cell holding `value` at THIS level, inserting or
    /// overwriting the name here without touching parents.
    pub fn bind(&self, name: &str, value: Value) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), new_cell(Some(value)));
    }

    /// Installs an existing cell at this level. Letrec and closure
    /// invocation use this so that assignment through one environment
    /// is observed by every other holder of the cell.
    pub fn bind_cell(&self, name: &str, cell: Cell) {
        self.bindings.borrow_mut().insert(name.to_string(), cell);
    }

    /// Walks this level and then the parent chain; first hit wins.
    pub fn find_cell(&self, name: &str) -> Option<Cell> {
        if let Some(cell) = self.bindings.borrow().get(name) {
            return Some(cell.clone());
        }
        self.parent.as_ref().and_then(|p| p.find_cell(name))
    }

    /// The cell bound at this level only, ignoring parents.
    pub fn local_cell(&self, name: &str) -> Option<Cell> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Resolves `name` to a value. An absent name is `NotFound`; a
    /// bound-but-unassigned cell is `Unspecified`.
    pub fn lookup(&self, name: &str) -> Result<Value, LispError> {
        match self.find_cell(name) {
            None => Err(LispError::NotFound(format!("Unbound identifier {}", name))),
            Some(cell) => match &*cell.borrow() {
                Some(value) => Ok(value.clone()),
                None => Err(LispError::Unspecified(name.to_string())),
            },
        }
    }

    /// SetVar semantics: if `name` is already bound at this level,
    /// swap the contents of its cell (visible to every sharer);
    /// otherwise create a new binding here.
    pub fn assign(&self, name: &str, value: Value) {
        if let Some(cell) = self.local_cell(name) {
            *cell.borrow_mut() = Some(value);
        } else {
            self.bind(name, value);
        }
    }

    /// Names bound at this level, for REPL completion.
    pub fn local_names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    /// All names visible from here, deduplicated, sorted. Shadowed
    /// names appear once.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = Some(self);
        while let Some(env) = cursor {
            for name in env.bindings.borrow().keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            cursor = env.parent.as_deref();
        }
        names.sort();
        names
    }
}

// Shallow by hand: environments reference closures that reference
// environments, so a derived Debug would chase the cycle.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.local_names();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
