//! List primitives: pair, head, tail, list, len, null?
//!
//! `pair` is the only producer of dotted pairs; the reader always
//! yields proper lists.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::Value;
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.bind("pair", Value::Primitive("pair", prim_pair));
    env.bind("head", Value::Primitive("head", prim_head));
    env.bind("tail", Value::Primitive("tail", prim_tail));
    env.bind("list", Value::Primitive("list", prim_list));
    env.bind("len", Value::Primitive("len", prim_len));
    env.bind("null?", Value::Primitive("null?", prim_null_q));
}

pub fn prim_pair(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [head, tail] => Ok(Value::Pair(
            Box::new(head.clone()),
            Box::new(tail.clone()),
        )),
        _ => Err(LispError::TypeError("(pair head tail)".to_string())),
    }
}

pub fn prim_head(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::Pair(head, _)] => Ok((**head).clone()),
        _ => Err(LispError::TypeError("(head pair)".to_string())),
    }
}

pub fn prim_tail(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::Pair(_, tail)] => Ok((**tail).clone()),
        _ => Err(LispError::TypeError("(tail pair)".to_string())),
    }
}

pub fn prim_list(args: &[Value]) -> Result<Value, LispError> {
    Ok(Value::list_from_vec(args.to_vec()))
}

pub fn prim_len(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [list] => {
            let items = list
                .try_list_to_vec()
                .ok_or_else(|| LispError::TypeError("(len list)".to_string()))?;
            Ok(Value::Integer(items.len() as i64))
        }
        _ => Err(LispError::TypeError("(len list)".to_string())),
    }
}

pub fn prim_null_q(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [value] => Ok(Value::Boolean(matches!(value, Value::Nil))),
        _ => Err(LispError::TypeError("(null? value)".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_builds_dotted_pairs() {
        let p = prim_pair(&[Value::Integer(1), Value::Integer(2)]).unwrap();
        assert_eq!(p.to_string(), "(1 . 2)");
        assert!(!p.is_list());
    }

    #[test]
    fn test_head_and_tail() {
        let list = Value::list_from_vec(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(prim_head(&[list.clone()]).unwrap(), Value::Integer(1));
        assert_eq!(prim_tail(&[list]).unwrap().to_string(), "(2)");
        assert!(prim_head(&[Value::Nil]).is_err());
    }

    #[test]
    fn test_list_and_len() {
        let built = prim_list(&[Value::Integer(1), Value::Integer(2)]).unwrap();
        assert_eq!(prim_len(&[built]).unwrap(), Value::Integer(2));
        assert_eq!(prim_len(&[Value::Nil]).unwrap(), Value::Integer(0));
        assert!(prim_len(&[Value::Integer(3)]).is_err());
    }

    #[test]
    fn test_null_q() {
        assert_eq!(prim_null_q(&[Value::Nil]).unwrap(), Value::Boolean(true));
        assert_eq!(
            prim_null_q(&[Value::Integer(1)]).unwrap(),
            Value::Boolean(false)
        );
    }
}
