// ABOUTME: Macro expander: AST-to-AST rewriting plus quasiquote templates

use crate::ast::{self, Definition, Expr};
use crate::env::Environment;
use crate::error::LispError;
use crate::eval;
use crate::value::{MacroData, Value};
use std::rc::Rc;

/// Expansion steps allowed for one top-level form before the expander
/// assumes a macro expands to itself.
pub const MACRO_RECURSION_LIMIT: usize = 100;

/// Expands every macro call in `expr` to a fixpoint. Expanding the
/// result again yields the same tree.
pub fn expand(expr: &Expr, env: &Rc<Environment>) -> Result<Expr, LispError> {
    expand_at(expr, env, 0)
}

/// A single expansion step of the outermost macro call, for
/// `macroexpand-1`. Non-macro expressions come back unchanged.
pub fn expand_once(expr: &Expr, env: &Rc<Environment>) -> Result<Expr, LispError> {
    if let Expr::Call(func, args) = expr {
        if let Expr::Var(name) = func.as_ref() {
            if let Some(m) = macro_binding(env, name) {
                return apply_macro(&m, args);
            }
        }
    }
    Ok(expr.clone())
}

fn expand_at(expr: &Expr, env: &Rc<Environment>, depth: usize) -> Result<Expr, LispError> {
    match expr {
        Expr::Call(func, args) => {
            if let Expr::Var(name) = func.as_ref() {
                if let Some(m) = macro_binding(env, name) {
                    if depth >= MACRO_RECURSION_LIMIT {
                        return Err(LispError::MacroRecursionLimit(name.clone()));
                    }
                    let stepped = apply_macro(&m, args)?;
                    return expand_at(&stepped, env, depth + 1);
                }
            }
            let func = expand_at(func, env, depth)?;
            let args = args
                .iter()
                .map(|a| expand_at(a, env, depth))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call(Box::new(func), args))
        }
        Expr::If(c, t, e) => Ok(Expr::If(
            Box::new(expand_at(c, env, depth)?),
            Box::new(expand_at(t, env, depth)?),
            Box::new(expand_at(e, env, depth)?),
        )),
        Expr::And(a, b) => Ok(Expr::And(
            Box::new(expand_at(a, env, depth)?),
            Box::new(expand_at(b, env, depth)?),
        )),
        Expr::Or(a, b) => Ok(Expr::Or(
            Box::new(expand_at(a, env, depth)?),
            Box::new(expand_at(b, env, depth)?),
        )),
        Expr::Apply(f, args) => Ok(Expr::Apply(
            Box::new(expand_at(f, env, depth)?),
            Box::new(expand_at(args, env, depth)?),
        )),
        // Parameters are opaque; only the body is visited.
        Expr::Lambda { name, params, body } => Ok(Expr::Lambda {
            name: name.clone(),
            params: params.clone(),
            body: Box::new(expand_at(body, env, depth)?),
        }),
        Expr::Let {
            kind,
            bindings,
            body,
        } => {
            let bindings = bindings
                .iter()
                .map(|(n, e)| Ok((n.clone(), expand_at(e, env, depth)?)))
                .collect::<Result<Vec<_>, LispError>>()?;
            Ok(Expr::Let {
                kind: *kind,
                bindings,
                body: Box::new(expand_at(body, env, depth)?),
            })
        }
        Expr::Def(Definition::SetVar(name, value)) => Ok(Expr::Def(Definition::SetVar(
            name.clone(),
            Box::new(expand_at(value, env, depth)?),
        ))),
        Expr::Def(Definition::DefineFunction(name, params, body)) => {
            Ok(Expr::Def(Definition::DefineFunction(
                name.clone(),
                params.clone(),
                Box::new(expand_at(body, env, depth)?),
            )))
        }
        Expr::Def(Definition::DefineMacro(name, params, body)) => {
            Ok(Expr::Def(Definition::DefineMacro(
                name.clone(),
                params.clone(),
                Box::new(expand_at(body, env, depth)?),
            )))
        }
        Expr::ModuleDef {
            name,
            exports,
            body,
        } => {
            let body = body
                .iter()
                .map(|e| expand_at(e, env, depth))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::ModuleDef {
                name: name.clone(),
                exports: exports.clone(),
                body,
            })
        }
        Expr::LoadModule(name) => Ok(Expr::LoadModule(Box::new(expand_at(
            name, env, depth,
        )?))),
        // Imports reference macros, they do not invoke them.
        Expr::Literal(_) | Expr::Var(_) | Expr::Import(_) => Ok(expr.clone()),
    }
}

fn macro_binding(env: &Rc<Environment>, name: &str) -> Option<Rc<MacroData>> {
    let cell = env.find_cell(name)?;
    let borrowed = cell.borrow();
    match &*borrowed {
        Some(Value::Macro(m)) => Some(m.clone()),
        _ => None,
    }
}

/// One macro application: bind the UNevaluated argument S-expressions
/// to the parameters in a child of the definition environment, evaluate
/// the body, strip one Quote wrapper, and rebuild the result as an
/// expression.
fn apply_macro(m: &MacroData, args: &[Expr]) -> Result<Expr, LispError> {
    if args.len() != m.params.len() {
        return Err(LispError::NotFound(format!(
            "Macro {} expects {} arguments, got {}",
            m.name,
            m.params.len(),
            args.len()
        )));
    }

    let call_env = Environment::extend(m.env.clone());
    for (param, arg) in m.params.iter().zip(args.iter()) {
        call_env.bind(param, ast::expr_to_value(arg));
    }

    let produced = eval::eval(&m.body, &call_env)?;
    let template = match produced {
        Value::Quote(inner) => *inner,
        other => other,
    };
    ast::build(&template)
}

/// Quasiquote expansion over values. `depth` starts at 1 when the
/// evaluator enters a top-level quasiquote; it is threaded by value, so
/// unwinding on error restores it for free.
pub fn expand_quasiquote(
    template: &Value,
    depth: usize,
    env: &Rc<Environment>,
) -> Result<Value, LispError> {
    match template {
        Value::Unquote(inner) => {
            if depth == 1 {
                eval_hole(inner, env)
            } else {
                Ok(Value::Unquote(Box::new(expand_quasiquote(
                    inner, depth, env,
                )?)))
            }
        }
        Value::UnquoteSplicing(inner) => {
            if depth == 1 {
                // Splicing only makes sense inside an enclosing pair
                // sequence; the Pair arm below intercepts that case.
                Err(LispError::TypeError(
                    "unquote-splicing inside a list".to_string(),
                ))
            } else {
                Ok(Value::UnquoteSplicing(Box::new(expand_quasiquote(
                    inner, depth, env,
                )?)))
            }
        }
        Value::Quasiquote(inner) => Ok(Value::Quasiquote(Box::new(expand_quasiquote(
            inner,
            depth + 1,
            env,
        )?))),
        Value::Pair(head, tail) => {
            if depth == 1 {
                if let Value::UnquoteSplicing(inner) = head.as_ref() {
                    let spliced = eval_hole(inner, env)?;
                    let items = spliced.try_list_to_vec().ok_or_else(|| {
                        LispError::TypeError("(unquote-splicing list)".to_string())
                    })?;
                    let rest = expand_quasiquote(tail, depth, env)?;
                    return Ok(items.into_iter().rev().fold(rest, |acc, item| {
                        Value::Pair(Box::new(item), Box::new(acc))
                    }));
                }
            }
            Ok(Value::Pair(
                Box::new(expand_quasiquote(head, depth, env)?),
                Box::new(expand_quasiquote(tail, depth, env)?),
            ))
        }
        atom => Ok(atom.clone()),
    }
}

/// Evaluates an unquote hole in the surrounding environment.
fn eval_hole(form: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let expr = ast::build(form)?;
    let expr = expand(&expr, env)?;
    eval::eval(&expr, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::register_builtins;
    use crate::reader::Reader;

    fn env_with_builtins() -> Rc<Environment> {
        let env = Environment::root();
        register_builtins(&env);
        env
    }

    fn run(env: &Rc<Environment>, input: &str) -> Result<Value, LispError> {
        let form = Reader::new(input, "test").read().unwrap();
        let expr = ast::build(&form)?;
        let expr = expand(&expr, env)?;
        eval::eval(&expr, env)
    }

    #[test]
    fn test_quasiquote_unquote_substitutes() {
        let env = env_with_builtins();
        let result = run(&env, "`(1 ,(+ 2 3))").unwrap();
        assert_eq!(result.to_string(), "(1 5)");
    }

    #[test]
    fn test_quasiquote_splicing_concatenates() {
        let env = env_with_builtins();
        let result = run(&env, "`(1 ,@(list 2 3) 4)").unwrap();
        assert_eq!(result.to_string(), "(1 2 3 4)");
    }

    #[test]
    fn test_splicing_requires_a_list() {
        let env = env_with_builtins();
        assert!(matches!(
            run(&env, "`(1 ,@2)"),
            Err(LispError::TypeError(_))
        ));
    }

    #[test]
    fn test_nested_quasiquote_preserves_structure() {
        let env = env_with_builtins();
        let result = run(&env, "``(a ,(+ 1 2))").unwrap();
        // The inner unquote is one level down, so nothing evaluates.
        assert_eq!(result.to_string(), "`(a ,(+ 1 2))");
    }

    #[test]
    fn test_macro_call_expands() {
        let env = env_with_builtins();
        run(&env, "(defmacro unless (test body) `(if ,test nil ,body))").unwrap();

        let form = Reader::new("(unless #f 42)", "test").read().unwrap();
        let expanded = expand(&ast::build(&form).unwrap(), &env).unwrap();
        assert_eq!(expanded.to_string(), "(if #f nil 42)");
    }

    #[test]
    fn test_expansion_is_a_fixpoint() {
        let env = env_with_builtins();
        run(&env, "(defmacro twice (x) `(+ ,x ,x))").unwrap();

        let form = Reader::new("(twice (twice 3))", "test").read().unwrap();
        let once = expand(&ast::build(&form).unwrap(), &env).unwrap();
        let again = expand(&once, &env).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn test_macro_arity_mismatch() {
        let env = env_with_builtins();
        run(&env, "(defmacro unless (test body) `(if ,test nil ,body))").unwrap();
        let form = Reader::new("(unless #f)", "test").read().unwrap();
        let result = expand(&ast::build(&form).unwrap(), &env);
        assert!(matches!(result, Err(LispError::NotFound(msg)) if msg.contains("expects 2")));
    }

    #[test]
    fn test_macro_recursion_limit() {
        let env = env_with_builtins();
        run(&env, "(defmacro forever (x) `(forever ,x))").unwrap();
        let form = Reader::new("(forever 1)", "test").read().unwrap();
        let result = expand(&ast::build(&form).unwrap(), &env);
        assert_eq!(
            result,
            Err(LispError::MacroRecursionLimit("forever".to_string()))
        );
    }

    #[test]
    fn test_expand_once_is_a_single_step() {
        let env = env_with_builtins();
        run(&env, "(defmacro wrap (x) `(list ,x))").unwrap();
        run(&env, "(defmacro wrap2 (x) `(wrap ,x))").unwrap();

        let form = Reader::new("(wrap2 1)", "test").read().unwrap();
        let stepped = expand_once(&ast::build(&form).unwrap(), &env).unwrap();
        assert_eq!(stepped.to_string(), "(wrap 1)");
    }
}
