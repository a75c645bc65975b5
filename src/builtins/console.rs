//! Console primitives: print, println, getchar
//!
//! The only blocking I/O available from inside the evaluator.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::Value;
use std::io::{self, Read, Write};
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.bind("print", Value::Primitive("print", prim_print));
    env.bind("println", Value::Primitive("println", prim_println));
    env.bind("getchar", Value::Primitive("getchar", prim_getchar));
}

/// Strings print raw; everything else uses the value printer.
fn display(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn prim_print(args: &[Value]) -> Result<Value, LispError> {
    let text: Vec<String> = args.iter().map(display).collect();
    print!("{}", text.join(" "));
    io::stdout().flush().ok();
    Ok(Value::Nil)
}

pub fn prim_println(args: &[Value]) -> Result<Value, LispError> {
    let text: Vec<String> = args.iter().map(display).collect();
    println!("{}", text.join(" "));
    Ok(Value::Nil)
}

/// One byte from stdin as an integer, -1 at end of input.
pub fn prim_getchar(args: &[Value]) -> Result<Value, LispError> {
    if !args.is_empty() {
        return Err(LispError::TypeError("(getchar)".to_string()));
    }
    let mut byte = [0u8; 1];
    match io::stdin().read(&mut byte) {
        Ok(1) => Ok(Value::Integer(i64::from(byte[0]))),
        _ => Ok(Value::Integer(-1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unwraps_strings() {
        assert_eq!(display(&Value::Str("hi".into())), "hi");
        assert_eq!(display(&Value::Integer(3)), "3");
        assert_eq!(
            display(&Value::list_from_vec(vec![Value::Integer(1)])),
            "(1)"
        );
    }

    #[test]
    fn test_print_returns_nil() {
        assert_eq!(prim_print(&[]).unwrap(), Value::Nil);
        assert_eq!(prim_println(&[Value::Integer(1)]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_getchar_rejects_arguments() {
        assert!(prim_getchar(&[Value::Integer(1)]).is_err());
    }
}
