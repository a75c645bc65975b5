//! Arithmetic primitives: +, -, *, /, %
//!
//! Integer-only. `+` and `*` are variadic with the usual identities;
//! `-` negates a single argument; `/` and `%` reject zero divisors.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::Value;
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.bind("+", Value::Primitive("+", prim_add));
    env.bind("-", Value::Primitive("-", prim_sub));
    env.bind("*", Value::Primitive("*", prim_mul));
    env.bind("/", Value::Primitive("/", prim_div));
    env.bind("%", Value::Primitive("%", prim_rem));
}

fn int_args(shape: &str, args: &[Value]) -> Result<Vec<i64>, LispError> {
    args.iter()
        .map(|arg| match arg {
            Value::Integer(n) => Ok(*n),
            _ => Err(LispError::TypeError(shape.to_string())),
        })
        .collect()
}

pub fn prim_add(args: &[Value]) -> Result<Value, LispError> {
    let nums = int_args("(+ int int)", args)?;
    Ok(Value::Integer(nums.into_iter().sum()))
}

/// `(- 10 3 2)` => 5; `(- 5)` => -5.
pub fn prim_sub(args: &[Value]) -> Result<Value, LispError> {
    let nums = int_args("(- int int)", args)?;
    match nums.split_first() {
        None => Err(LispError::TypeError("(- int int)".to_string())),
        Some((first, [])) => Ok(Value::Integer(-first)),
        Some((first, rest)) => Ok(Value::Integer(rest.iter().fold(*first, |a, b| a - b))),
    }
}

pub fn prim_mul(args: &[Value]) -> Result<Value, LispError> {
    let nums = int_args("(* int int)", args)?;
    Ok(Value::Integer(nums.into_iter().product()))
}

pub fn prim_div(args: &[Value]) -> Result<Value, LispError> {
    let nums = int_args("(/ int int)", args)?;
    let Some((first, rest)) = nums.split_first() else {
        return Err(LispError::TypeError("(/ int int)".to_string()));
    };
    let mut result = *first;
    for n in rest {
        if *n == 0 {
            return Err(LispError::TypeError("(/ int nonzero-int)".to_string()));
        }
        result /= n;
    }
    Ok(Value::Integer(result))
}

pub fn prim_rem(args: &[Value]) -> Result<Value, LispError> {
    match int_args("(% int int)", args)?.as_slice() {
        [a, b] if *b != 0 => Ok(Value::Integer(a % b)),
        [_, 0] => Err(LispError::TypeError("(% int nonzero-int)".to_string())),
        _ => Err(LispError::TypeError("(% int int)".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Integer(*n)).collect()
    }

    #[test]
    fn test_add() {
        assert_eq!(prim_add(&ints(&[3, 5])).unwrap(), Value::Integer(8));
        assert_eq!(prim_add(&[]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_sub_and_negate() {
        assert_eq!(prim_sub(&ints(&[10, 3, 2])).unwrap(), Value::Integer(5));
        assert_eq!(prim_sub(&ints(&[5])).unwrap(), Value::Integer(-5));
    }

    #[test]
    fn test_mul() {
        assert_eq!(prim_mul(&ints(&[2, 3, 4])).unwrap(), Value::Integer(24));
        assert_eq!(prim_mul(&[]).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_div_rejects_zero() {
        assert_eq!(prim_div(&ints(&[20, 4])).unwrap(), Value::Integer(5));
        assert!(prim_div(&ints(&[1, 0])).is_err());
    }

    #[test]
    fn test_rem() {
        assert_eq!(prim_rem(&ints(&[7, 3])).unwrap(), Value::Integer(1));
        assert!(prim_rem(&ints(&[7])).is_err());
    }

    #[test]
    fn test_type_error_carries_shape() {
        assert_eq!(
            prim_add(&[Value::Str("x".into())]),
            Err(LispError::TypeError("(+ int int)".to_string()))
        );
    }
}
