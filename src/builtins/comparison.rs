//! Comparison primitives: =, <, >, <=, >=, not
//!
//! `=` is structural equality over atoms and pair trees; the ordering
//! operators are integer-only.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::Value;
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.bind("=", Value::Primitive("=", prim_eq));
    env.bind("<", Value::Primitive("<", prim_lt));
    env.bind(">", Value::Primitive(">", prim_gt));
    env.bind("<=", Value::Primitive("<=", prim_le));
    env.bind(">=", Value::Primitive(">=", prim_ge));
    env.bind("not", Value::Primitive("not", prim_not));
}

pub fn prim_eq(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [a, b] => Ok(Value::Boolean(a == b)),
        _ => Err(LispError::TypeError("(= value value)".to_string())),
    }
}

fn int_pair(shape: &str, args: &[Value]) -> Result<(i64, i64), LispError> {
    match args {
        [Value::Integer(a), Value::Integer(b)] => Ok((*a, *b)),
        _ => Err(LispError::TypeError(shape.to_string())),
    }
}

pub fn prim_lt(args: &[Value]) -> Result<Value, LispError> {
    let (a, b) = int_pair("(< int int)", args)?;
    Ok(Value::Boolean(a < b))
}

pub fn prim_gt(args: &[Value]) -> Result<Value, LispError> {
    let (a, b) = int_pair("(> int int)", args)?;
    Ok(Value::Boolean(a > b))
}

pub fn prim_le(args: &[Value]) -> Result<Value, LispError> {
    let (a, b) = int_pair("(<= int int)", args)?;
    Ok(Value::Boolean(a <= b))
}

pub fn prim_ge(args: &[Value]) -> Result<Value, LispError> {
    let (a, b) = int_pair("(>= int int)", args)?;
    Ok(Value::Boolean(a >= b))
}

pub fn prim_not(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::Boolean(b)] => Ok(Value::Boolean(!b)),
        _ => Err(LispError::TypeError("(not bool)".to_string())),
    }
}
