// ABOUTME: Value types for the Lisp data universe: atoms, pairs, and callables

use crate::ast::Expr;
use crate::env::{Cell, Environment};
use crate::error::LispError;
use std::fmt;
use std::rc::Rc;

/// Native function signature for primitives. Primitives are opaque to
/// the evaluator: a name and a function over an argument vector.
pub type PrimitiveFn = fn(&[Value]) -> Result<Value, LispError>;

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Symbol(String),
    Str(String),
    Nil,
    Pair(Box<Value>, Box<Value>),
    Quote(Box<Value>),
    Quasiquote(Box<Value>),
    Unquote(Box<Value>),
    UnquoteSplicing(Box<Value>),
    Record(Rc<RecordData>),
    Primitive(&'static str, PrimitiveFn),
    Closure(Rc<ClosureData>),
    Module(Rc<ModuleData>),
    Macro(Rc<MacroData>),
}

#[derive(Debug)]
pub struct RecordData {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

#[derive(Debug)]
pub struct ClosureData {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
    pub capture: Capture,
}

/// What a closure holds onto from its definition site. Both modes are
/// semantically equivalent; `Cells` limits retention to the bindings
/// the body actually reaches for.
#[derive(Debug)]
pub enum Capture {
    /// The whole defining environment, by reference.
    Whole(Rc<Environment>),
    /// The defining environment plus the enumerated free-variable cells,
    /// re-installed at call level so shared mutation stays visible.
    Cells {
        parent: Rc<Environment>,
        cells: Vec<(String, Cell)>,
    },
}

#[derive(Debug)]
pub struct ModuleData {
    pub name: String,
    pub env: Rc<Environment>,
    pub exports: Vec<String>,
}

#[derive(Debug)]
pub struct MacroData {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
    pub env: Rc<Environment>,
}

impl Value {
    /// Short type tag used in error messages and record printing.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Boolean(_) => "bool",
            Value::Symbol(_) => "symbol",
            Value::Str(_) => "string",
            Value::Nil => "nil",
            Value::Pair(..) => "pair",
            Value::Quote(_) => "quote",
            Value::Quasiquote(_) => "quasiquote",
            Value::Unquote(_) => "unquote",
            Value::UnquoteSplicing(_) => "unquote-splicing",
            Value::Record(_) => "record",
            Value::Primitive(..) => "primitive",
            Value::Closure(_) => "closure",
            Value::Module(_) => "module",
            Value::Macro(_) => "macro",
        }
    }

    /// A proper list is Nil or a Pair whose tail chain terminates at Nil.
    pub fn is_list(&self) -> bool {
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return true,
                Value::Pair(_, tail) => cursor = tail,
                _ => return false,
            }
        }
    }

    /// Pair-walk a proper list into a native vector; `None` for
    /// anything else (including dotted pairs).
    pub fn try_list_to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return Some(items),
                Value::Pair(head, tail) => {
                    items.push((**head).clone());
                    cursor = tail;
                }
                _ => return None,
            }
        }
    }

    /// As `try_list_to_vec`, but for callers that have already
    /// established list shape. An improper list here is an internal
    /// invariant failure.
    pub fn list_to_vec(&self) -> Vec<Value> {
        self.try_list_to_vec()
            .unwrap_or_else(|| panic!("pair_to_list: not a proper list: {}", self))
    }

    /// Build a proper list from a native vector.
    pub fn list_from_vec(items: Vec<Value>) -> Value {
        items.into_iter().rev().fold(Value::Nil, |tail, head| {
            Value::Pair(Box::new(head), Box::new(tail))
        })
    }
}

impl PartialEq for Value {
    /// Structural equality for atoms and pair trees. Modules compare by
    /// identity (the cache-hit guarantee); other callables never
    /// compare equal.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(h1, t1), Value::Pair(h2, t2)) => h1 == h2 && t1 == t2,
            (Value::Quote(a), Value::Quote(b)) => a == b,
            (Value::Quasiquote(a), Value::Quasiquote(b)) => a == b,
            (Value::Unquote(a), Value::Unquote(b)) => a == b,
            (Value::UnquoteSplicing(a), Value::UnquoteSplicing(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.name == b.name && a.fields == b.fields
            }
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Nil => write!(f, "nil"),
            Value::Pair(head, tail) => {
                write!(f, "({}", head)?;
                let mut cursor: &Value = tail;
                loop {
                    match cursor {
                        Value::Nil => break,
                        Value::Pair(h, t) => {
                            write!(f, " {}", h)?;
                            cursor = t;
                        }
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Quote(v) => write!(f, "'{}", v),
            Value::Quasiquote(v) => write!(f, "`{}", v),
            Value::Unquote(v) => write!(f, ",{}", v),
            Value::UnquoteSplicing(v) => write!(f, ",@{}", v),
            Value::Record(r) => {
                write!(f, "#<record:{}(", r.name)?;
                for (i, (name, value)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}={}", name, value.type_name(), value)?;
                }
                write!(f, ")>")
            }
            Value::Primitive(name, _) => write!(f, "#<primitive:{}>", name),
            Value::Closure(c) => write!(f, "#<{}:({})>", c.name, c.params.join(" ")),
            Value::Module(m) => write!(f, "#<module:{}>", m.name),
            Value::Macro(m) => write!(f, "#<macro:{}>", m.name),
        }
    }
}
