// ABOUTME: Evaluator: expression trees plus environments to values

use crate::ast::{self, Definition, Expr, LetKind};
use crate::env::{new_cell, Environment};
use crate::error::LispError;
use crate::expander;
use crate::modules;
use crate::value::{Capture, ClosureData, MacroData, Value};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Evaluates one expression. Definitions, module definitions, and
/// imports mutate `env` in place (bindings land at its level); every
/// other form leaves it untouched.
pub fn eval(expr: &Expr, env: &Rc<Environment>) -> Result<Value, LispError> {
    match expr {
        Expr::Literal(value) => eval_literal(value, env),
        Expr::Var(name) => env.lookup(name),
        Expr::If(cond, then, otherwise) => match eval(cond, env)? {
            Value::Boolean(true) => eval(then, env),
            Value::Boolean(false) => eval(otherwise, env),
            _ => Err(LispError::IllegalIfExpression(cond.to_string())),
        },
        // Both operands evaluate eagerly and must be booleans. This is
        // a deliberate departure from short-circuiting Lisps.
        Expr::And(a, b) => match (eval(a, env)?, eval(b, env)?) {
            (Value::Boolean(x), Value::Boolean(y)) => Ok(Value::Boolean(x && y)),
            _ => Err(LispError::TypeError("(and bool bool)".to_string())),
        },
        Expr::Or(a, b) => match (eval(a, env)?, eval(b, env)?) {
            (Value::Boolean(x), Value::Boolean(y)) => Ok(Value::Boolean(x || y)),
            _ => Err(LispError::TypeError("(or bool bool)".to_string())),
        },
        Expr::Call(func, args) => eval_call(func, args, env),
        Expr::Apply(func, list) => {
            let f = eval(func, env)?;
            let args_value = eval(list, env)?;
            let args = args_value
                .try_list_to_vec()
                .ok_or_else(|| LispError::TypeError("(apply function list)".to_string()))?;
            apply_function(&f, &args)
        }
        Expr::Lambda { name, params, body } => Ok(make_closure(name, params, body, env)),
        Expr::Let {
            kind,
            bindings,
            body,
        } => eval_let(*kind, bindings, body, env),
        Expr::Def(def) => eval_def(def, env),
        Expr::ModuleDef {
            name,
            exports,
            body,
        } => modules::eval_module_def(name, exports, body, env),
        Expr::Import(spec) => modules::eval_import(spec, env),
        Expr::LoadModule(name_expr) => {
            let name = match eval(name_expr, env)? {
                Value::Str(s) | Value::Symbol(s) => s,
                _ => return Err(LispError::TypeError("(load-module name)".to_string())),
            };
            modules::load_module(&name, env)
        }
    }
}

fn eval_literal(value: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    match value {
        Value::Quote(inner) => Ok((**inner).clone()),
        Value::Quasiquote(inner) => expander::expand_quasiquote(inner, 1, env),
        Value::Unquote(_) | Value::UnquoteSplicing(_) => Err(LispError::TypeError(
            "unquote inside an enclosing quasiquote".to_string(),
        )),
        other => Ok(other.clone()),
    }
}

fn eval_call(func: &Expr, args: &[Expr], env: &Rc<Environment>) -> Result<Value, LispError> {
    // Debugging forms dispatched on the unevaluated call shape.
    if let Expr::Var(name) = func {
        match (name.as_str(), args) {
            ("env", []) => return Ok(reify_bindings(env)),
            ("macroexpand", [Expr::Literal(Value::Quote(form))]) => {
                let expr = ast::build(form)?;
                let expanded = expander::expand(&expr, env)?;
                return Ok(Value::Quote(Box::new(ast::expr_to_value(&expanded))));
            }
            ("macroexpand-1", [Expr::Literal(Value::Quote(form))]) => {
                let expr = ast::build(form)?;
                let expanded = expander::expand_once(&expr, env)?;
                return Ok(Value::Quote(Box::new(ast::expr_to_value(&expanded))));
            }
            _ => {}
        }
    }

    let f = eval(func, env)?;
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, env)?);
    }
    apply_function(&f, &values)
}

/// Dispatch on the value in function position.
pub fn apply_function(func: &Value, args: &[Value]) -> Result<Value, LispError> {
    match func {
        Value::Primitive(_, f) => f(args),
        Value::Closure(c) => invoke_closure(c, args),
        other => Err(LispError::ApplyError(other.to_string())),
    }
}

fn invoke_closure(closure: &ClosureData, args: &[Value]) -> Result<Value, LispError> {
    if args.len() != closure.params.len() {
        return Err(LispError::MissingArgument(closure.params.join(" ")));
    }
    let call_env = match &closure.capture {
        Capture::Whole(captured) => Environment::extend(captured.clone()),
        Capture::Cells { parent, cells } => {
            let env = Environment::extend(parent.clone());
            for (name, cell) in cells {
                env.bind_cell(name, cell.clone());
            }
            env
        }
    };
    for (param, arg) in closure.params.iter().zip(args) {
        call_env.bind(param, arg.clone());
    }
    eval(&closure.body, &call_env)
}

/// Closure construction. Free-variable analysis runs once, here: a body
/// with no free variables keeps the whole defining environment; one
/// with free variables captures their cells individually (plus the
/// parent link, so names bound after the fact still resolve).
fn make_closure(name: &str, params: &[String], body: &Expr, env: &Rc<Environment>) -> Value {
    let frees = free_variables(name, params, body);
    let capture = if frees.is_empty() {
        Capture::Whole(env.clone())
    } else {
        let cells = frees
            .iter()
            .filter_map(|n| env.find_cell(n).map(|cell| (n.clone(), cell)))
            .collect();
        Capture::Cells {
            parent: env.clone(),
            cells,
        }
    };
    Value::Closure(Rc::new(ClosureData {
        name: name.to_string(),
        params: params.to_vec(),
        body: body.clone(),
        capture,
    }))
}

/// Free variables of a function body: every Var that is not a
/// parameter, not the function's own name, and not bound by an inner
/// let or lambda.
fn free_variables(self_name: &str, params: &[String], body: &Expr) -> BTreeSet<String> {
    let mut bound: Vec<String> = params.to_vec();
    bound.push(self_name.to_string());
    let mut free = BTreeSet::new();
    collect_free(body, &mut bound, &mut free);
    free
}

fn collect_free(expr: &Expr, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(name) => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
        }
        Expr::Literal(Value::Quasiquote(template)) => {
            collect_template_symbols(template, bound, free);
        }
        Expr::Literal(_) | Expr::Import(_) => {}
        Expr::If(a, b, c) => {
            collect_free(a, bound, free);
            collect_free(b, bound, free);
            collect_free(c, bound, free);
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_free(a, bound, free);
            collect_free(b, bound, free);
        }
        Expr::Apply(f, args) => {
            collect_free(f, bound, free);
            collect_free(args, bound, free);
        }
        Expr::Call(f, args) => {
            collect_free(f, bound, free);
            for arg in args {
                collect_free(arg, bound, free);
            }
        }
        Expr::Lambda { name, params, body } => {
            let mark = bound.len();
            bound.extend(params.iter().cloned());
            bound.push(name.clone());
            collect_free(body, bound, free);
            bound.truncate(mark);
        }
        Expr::Let {
            kind,
            bindings,
            body,
        } => {
            let mark = bound.len();
            match kind {
                LetKind::Parallel => {
                    for (_, value) in bindings {
                        collect_free(value, bound, free);
                    }
                    bound.extend(bindings.iter().map(|(n, _)| n.clone()));
                }
                LetKind::Sequential => {
                    for (name, value) in bindings {
                        collect_free(value, bound, free);
                        bound.push(name.clone());
                    }
                }
                LetKind::Recursive => {
                    bound.extend(bindings.iter().map(|(n, _)| n.clone()));
                    for (_, value) in bindings {
                        collect_free(value, bound, free);
                    }
                }
            }
            collect_free(body, bound, free);
            bound.truncate(mark);
        }
        Expr::Def(Definition::SetVar(_, value)) => collect_free(value, bound, free),
        Expr::Def(Definition::DefineFunction(name, params, body))
        | Expr::Def(Definition::DefineMacro(name, params, body)) => {
            let mark = bound.len();
            bound.push(name.clone());
            bound.extend(params.iter().cloned());
            collect_free(body, bound, free);
            bound.truncate(mark);
        }
        Expr::ModuleDef { body, .. } => {
            for expr in body {
                collect_free(expr, bound, free);
            }
        }
        Expr::LoadModule(name) => collect_free(name, bound, free),
    }
}

/// Quasiquote templates hide variable references inside unquote holes;
/// any symbol there is conservatively counted as free. Over-counting is
/// harmless (the parent link still resolves it), under-counting only
/// costs retention.
fn collect_template_symbols(template: &Value, bound: &[String], free: &mut BTreeSet<String>) {
    match template {
        Value::Unquote(inner) | Value::UnquoteSplicing(inner) => {
            collect_symbols_deep(inner, bound, free);
        }
        Value::Quasiquote(inner) => collect_template_symbols(inner, bound, free),
        Value::Pair(head, tail) => {
            collect_template_symbols(head, bound, free);
            collect_template_symbols(tail, bound, free);
        }
        _ => {}
    }
}

fn collect_symbols_deep(value: &Value, bound: &[String], free: &mut BTreeSet<String>) {
    match value {
        Value::Symbol(s) => {
            if !bound.contains(s) {
                free.insert(s.clone());
            }
        }
        Value::Pair(head, tail) => {
            collect_symbols_deep(head, bound, free);
            collect_symbols_deep(tail, bound, free);
        }
        Value::Quote(inner)
        | Value::Quasiquote(inner)
        | Value::Unquote(inner)
        | Value::UnquoteSplicing(inner) => collect_symbols_deep(inner, bound, free),
        _ => {}
    }
}

fn eval_let(
    kind: LetKind,
    bindings: &[(String, Expr)],
    body: &Expr,
    env: &Rc<Environment>,
) -> Result<Value, LispError> {
    match kind {
        LetKind::Parallel => {
            let values = bindings
                .iter()
                .map(|(_, value)| eval(value, env))
                .collect::<Result<Vec<_>, _>>()?;
            let child = Environment::extend(env.clone());
            for ((name, _), value) in bindings.iter().zip(values) {
                child.bind(name, value);
            }
            eval(body, &child)
        }
        LetKind::Sequential => {
            let mut current = env.clone();
            for (name, value_expr) in bindings {
                let value = eval(value_expr, &current)?;
                let next = Environment::extend(current);
                next.bind(name, value);
                current = next;
            }
            eval(body, &current)
        }
        LetKind::Recursive => {
            // Two phases: install empty cells for every name, then fill
            // them in order. A right-hand side that reads a later
            // binding hits the empty cell and reports Unspecified.
            let child = Environment::extend(env.clone());
            let cells: Vec<_> = bindings
                .iter()
                .map(|(name, _)| {
                    let cell = new_cell(None);
                    child.bind_cell(name, cell.clone());
                    cell
                })
                .collect();
            for ((_, value_expr), cell) in bindings.iter().zip(&cells) {
                let value = eval(value_expr, &child)?;
                *cell.borrow_mut() = Some(value);
            }
            eval(body, &child)
        }
    }
}

fn eval_def(def: &Definition, env: &Rc<Environment>) -> Result<Value, LispError> {
    match def {
        Definition::SetVar(name, value_expr) => {
            let value = eval(value_expr, env)?;
            env.assign(name, value.clone());
            Ok(value)
        }
        Definition::DefineFunction(name, params, body) => {
            // The closure excludes its own name from capture; recursion
            // resolves through the defining environment, which holds the
            // binding by the time the body runs.
            let closure = make_closure(name, params, body, env);
            env.assign(name, closure.clone());
            Ok(closure)
        }
        Definition::DefineMacro(name, params, body) => {
            let value = Value::Macro(Rc::new(MacroData {
                name: name.clone(),
                params: params.clone(),
                body: (**body).clone(),
                env: env.clone(),
            }));
            env.assign(name, value.clone());
            Ok(value)
        }
    }
}

/// `(env)`: the current bindings as a list of (name . value) pairs.
fn reify_bindings(env: &Rc<Environment>) -> Value {
    let mut entries = Vec::new();
    for name in env.visible_names() {
        if let Ok(value) = env.lookup(&name) {
            entries.push(Value::Pair(
                Box::new(Value::Symbol(name)),
                Box::new(value),
            ));
        }
    }
    Value::list_from_vec(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::register_builtins;
    use crate::reader::Reader;

    fn test_env() -> Rc<Environment> {
        let env = Environment::root();
        register_builtins(&env);
        env
    }

    fn run(env: &Rc<Environment>, input: &str) -> Result<Value, LispError> {
        let mut reader = Reader::new(input, "test");
        let mut last = Value::Nil;
        loop {
            match reader.read() {
                Err(LispError::EndOfStream) => return Ok(last),
                Err(e) => return Err(e),
                Ok(form) => {
                    let expr = ast::build(&form)?;
                    let expr = expander::expand(&expr, env)?;
                    last = eval(&expr, env)?;
                }
            }
        }
    }

    #[test]
    fn test_literals_and_lookup() {
        let env = test_env();
        assert_eq!(run(&env, "42").unwrap(), Value::Integer(42));
        assert_eq!(run(&env, "#t").unwrap(), Value::Boolean(true));
        assert_eq!(run(&env, "'x").unwrap(), Value::Symbol("x".to_string()));
        assert!(matches!(run(&env, "nope"), Err(LispError::NotFound(_))));
    }

    #[test]
    fn test_if_requires_boolean_condition() {
        let env = test_env();
        assert_eq!(run(&env, "(if #t 1 2)").unwrap(), Value::Integer(1));
        assert_eq!(run(&env, "(if #f 1 2)").unwrap(), Value::Integer(2));
        assert!(matches!(
            run(&env, "(if 3 1 2)"),
            Err(LispError::IllegalIfExpression(_))
        ));
    }

    #[test]
    fn test_and_or_are_eager_and_typed() {
        let env = test_env();
        assert_eq!(run(&env, "(and #t #f)").unwrap(), Value::Boolean(false));
        assert_eq!(run(&env, "(or #f #t)").unwrap(), Value::Boolean(true));
        assert_eq!(
            run(&env, "(and #t 1)"),
            Err(LispError::TypeError("(and bool bool)".to_string()))
        );
        // No short circuit: the second operand always evaluates.
        assert_eq!(
            run(&env, "(or #t 2)"),
            Err(LispError::TypeError("(or bool bool)".to_string()))
        );
    }

    #[test]
    fn test_define_and_call() {
        let env = test_env();
        run(&env, "(define x 10)").unwrap();
        assert_eq!(run(&env, "(+ x 5)").unwrap(), Value::Integer(15));
    }

    #[test]
    fn test_defun_is_recursive_without_letrec() {
        let env = test_env();
        run(
            &env,
            "(defun fact (n) (if (< n 2) 1 (* n (fact (- n 1)))))",
        )
        .unwrap();
        assert_eq!(run(&env, "(fact 5)").unwrap(), Value::Integer(120));
    }

    #[test]
    fn test_lambda_capture_modes() {
        let env = test_env();
        env.bind("free", Value::Integer(1));

        let Value::Closure(no_frees) = run(&env, "(lambda (x) x)").unwrap() else {
            panic!("expected closure");
        };
        assert!(matches!(no_frees.capture, Capture::Whole(_)));

        let Value::Closure(with_frees) = run(&env, "(lambda (x) (+ x free))").unwrap()
        else {
            panic!("expected closure");
        };
        match &with_frees.capture {
            Capture::Cells { cells, .. } => {
                assert!(cells.iter().any(|(n, _)| n == "free"));
            }
            Capture::Whole(_) => panic!("expected cell capture"),
        }
    }

    #[test]
    fn test_closures_capture_by_reference() {
        let env = test_env();
        run(&env, "(define x 1)").unwrap();
        run(&env, "(defun get-x () x)").unwrap();
        run(&env, "(define x 42)").unwrap();
        assert_eq!(run(&env, "(get-x)").unwrap(), Value::Integer(42));
    }

    #[test]
    fn test_let_is_parallel() {
        let env = test_env();
        assert_eq!(
            run(&env, "(let ((x 10) (y 20)) (+ x y))").unwrap(),
            Value::Integer(30)
        );
        // Parallel bindings cannot see each other.
        assert!(matches!(
            run(&env, "(let ((a 1) (b a)) b)"),
            Err(LispError::NotFound(_))
        ));
    }

    #[test]
    fn test_let_star_is_sequential() {
        let env = test_env();
        assert_eq!(
            run(&env, "(let* ((x 10) (y x)) (+ x y))").unwrap(),
            Value::Integer(20)
        );
    }

    #[test]
    fn test_letrec_supports_mutual_recursion() {
        let env = test_env();
        let result = run(
            &env,
            "(letrec ((f (lambda (x) (if (< x 2) 1 (g (- x 1)))))
                      (g (lambda (x) (if (< x 2) 3 (f (- x 2))))))
               (f 10))",
        )
        .unwrap();
        assert!(matches!(result, Value::Integer(_)));
    }

    #[test]
    fn test_letrec_premature_reference_is_unspecified() {
        let env = test_env();
        assert_eq!(
            run(&env, "(letrec ((a b) (b 1)) a)"),
            Err(LispError::Unspecified("b".to_string()))
        );
    }

    #[test]
    fn test_apply_spreads_a_list() {
        let env = test_env();
        assert_eq!(
            run(&env, "(apply + (list 1 2 3))").unwrap(),
            Value::Integer(6)
        );
        assert!(matches!(
            run(&env, "(apply + 3)"),
            Err(LispError::TypeError(_))
        ));
    }

    #[test]
    fn test_arity_mismatch_reports_parameters() {
        let env = test_env();
        run(&env, "(defun two (a b) (+ a b))").unwrap();
        assert_eq!(
            run(&env, "(two 1)"),
            Err(LispError::MissingArgument("a b".to_string()))
        );
    }

    #[test]
    fn test_applying_a_non_function_fails() {
        let env = test_env();
        assert!(matches!(run(&env, "(3 4)"), Err(LispError::ApplyError(_))));
    }

    #[test]
    fn test_bare_unquote_is_an_error() {
        let env = test_env();
        assert!(matches!(
            run(&env, ",(+ 1 2)"),
            Err(LispError::TypeError(_))
        ));
    }

    #[test]
    fn test_env_debugging_form() {
        let env = test_env();
        run(&env, "(define marker 7)").unwrap();
        let reified = run(&env, "(env)").unwrap();
        let entries = reified.try_list_to_vec().unwrap();
        assert!(entries.iter().any(|e| {
            matches!(e, Value::Pair(name, value)
                if **name == Value::Symbol("marker".to_string())
                    && **value == Value::Integer(7))
        }));
    }

    #[test]
    fn test_macroexpand_forms() {
        let env = test_env();
        run(&env, "(defmacro unless (test body) `(if ,test nil ,body))").unwrap();
        let expanded = run(&env, "(macroexpand '(unless #f 1))").unwrap();
        assert_eq!(expanded.to_string(), "'(if #f nil 1)");
        let stepped = run(&env, "(macroexpand-1 '(unless #f 1))").unwrap();
        assert_eq!(stepped.to_string(), "'(if #f nil 1)");
    }
}
