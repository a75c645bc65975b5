// ABOUTME: Pipeline driver: read, build, expand, evaluate against one environment

use crate::ast::{self, Expr};
use crate::builtins;
use crate::env::Environment;
use crate::error::LispError;
use crate::eval;
use crate::expander;
use crate::reader::Reader;
use crate::value::Value;
use std::rc::Rc;

const PRELUDE: &str = include_str!("prelude.mlisp");

/// A top-level environment plus the read → build → expand → evaluate
/// pipeline. The REPL, the file driver, the module loader, and the
/// tests all go through here, so definitions accumulate the same way
/// everywhere.
pub struct Interpreter {
    env: Rc<Environment>,
}

impl Interpreter {
    /// Root environment with the primitives and the bundled prelude.
    pub fn new() -> Result<Self, LispError> {
        let interp = Self::bare();
        interp.load_prelude()?;
        Ok(interp)
    }

    /// Primitives only, no prelude.
    pub fn bare() -> Self {
        let env = Environment::root();
        builtins::register_builtins(&env);
        Interpreter { env }
    }

    pub fn env(&self) -> Rc<Environment> {
        self.env.clone()
    }

    /// One already-read form through build → expand → evaluate.
    pub fn eval_form(&self, form: &Value) -> Result<Value, LispError> {
        let expr = ast::build(form)?;
        let expr = expander::expand(&expr, &self.env)?;
        eval::eval(&expr, &self.env)
    }

    /// Every form in `source` in order, returning the last value.
    /// Stops at the first error.
    pub fn eval_source(&self, file: &str, source: &str) -> Result<Value, LispError> {
        run_source(&self.env, file, source)
    }

    /// The prelude admits only definitions; anything else in it is a
    /// packaging mistake surfaced as NonDefinitionInStdlib.
    fn load_prelude(&self) -> Result<(), LispError> {
        let mut reader = Reader::new(PRELUDE, "prelude");
        loop {
            let form = match reader.read() {
                Err(LispError::EndOfStream) => return Ok(()),
                other => other?,
            };
            let expr = ast::build(&form)?;
            if !matches!(expr, Expr::Def(_) | Expr::ModuleDef { .. }) {
                return Err(LispError::NonDefinitionInStdlib(form.to_string()));
            }
            let expr = expander::expand(&expr, &self.env)?;
            eval::eval(&expr, &self.env)?;
        }
    }
}

/// Evaluates all forms from `source` against `env`, threading the
/// environment through so definitions persist. The module loader runs
/// files through this.
pub fn run_source(
    env: &Rc<Environment>,
    file: &str,
    source: &str,
) -> Result<Value, LispError> {
    let mut reader = Reader::new(source, file);
    let mut last = Value::Nil;
    loop {
        match reader.read() {
            Err(LispError::EndOfStream) => return Ok(last),
            Err(e) => return Err(e),
            Ok(form) => {
                let expr = ast::build(&form)?;
                let expr = expander::expand(&expr, env)?;
                last = eval::eval(&expr, env)?;
            }
        }
    }
}
