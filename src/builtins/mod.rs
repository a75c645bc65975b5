//! # Primitives
//!
//! The native function library. Primitives are opaque to the
//! evaluator: each is a name plus a `fn(&[Value]) -> Result<Value, LispError>`
//! over an already-evaluated argument vector.
//!
//! - **[arithmetic]**: `+ - * / %`
//! - **[comparison]**: `= < > <= >= not`
//! - **[lists]**: `pair head tail list len null?`
//! - **[console]**: `print println getchar`
//! - **[records]**: `record record-get`
//!
//! `clear-module-cache` is registered here directly; it is the
//! documented explicit clear request for the module cache.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::Value;
use std::rc::Rc;

pub mod arithmetic;
pub mod comparison;
pub mod console;
pub mod lists;
pub mod records;

/// Register every primitive in the environment.
pub fn register_builtins(env: &Rc<Environment>) {
    arithmetic::register(env);
    comparison::register(env);
    lists::register(env);
    console::register(env);
    records::register(env);

    env.bind(
        "clear-module-cache",
        Value::Primitive("clear-module-cache", prim_clear_module_cache),
    );
}

fn prim_clear_module_cache(args: &[Value]) -> Result<Value, LispError> {
    if !args.is_empty() {
        return Err(LispError::TypeError("(clear-module-cache)".to_string()));
    }
    crate::modules::clear_cache();
    Ok(Value::Nil)
}
