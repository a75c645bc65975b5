// ABOUTME: AST builder: S-expressions to typed expression trees, and back

use crate::error::LispError;
use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetKind {
    /// `let`: every right-hand side sees the outer environment.
    Parallel,
    /// `let*`: each right-hand side sees the bindings before it.
    Sequential,
    /// `letrec`: all bindings share one child environment of empty cells.
    Recursive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    SetVar(String, Box<Expr>),
    DefineFunction(String, Vec<String>, Box<Expr>),
    DefineMacro(String, Vec<String>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpec {
    /// `(import m)`: bind every export.
    All(String),
    /// `(import m a b)`: bind the requested exports only.
    Selective(String, Vec<String>),
    /// `(import m :as z)`: bind the module at `z` and exports at `z.name`.
    As(String, String),
}

impl ImportSpec {
    pub fn module_name(&self) -> &str {
        match self {
            ImportSpec::All(m) | ImportSpec::Selective(m, _) | ImportSpec::As(m, _) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `(apply f args)`: the second operand evaluates to an argument list.
    Apply(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Lambda {
        name: String,
        params: Vec<String>,
        body: Box<Expr>,
    },
    Let {
        kind: LetKind,
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    Def(Definition),
    ModuleDef {
        name: String,
        exports: Vec<String>,
        body: Vec<Expr>,
    },
    Import(ImportSpec),
    LoadModule(Box<Expr>),
}

/// Recognizes special forms by head symbol and produces the expression
/// tree. Pure: no environment, no side effects.
pub fn build(form: &Value) -> Result<Expr, LispError> {
    match form {
        Value::Integer(_) | Value::Boolean(_) | Value::Str(_) => {
            Ok(Expr::Literal(form.clone()))
        }
        Value::Symbol(s) if s == "nil" => Ok(Expr::Literal(Value::Nil)),
        Value::Symbol(s) => Ok(Expr::Var(s.clone())),
        Value::Quote(_)
        | Value::Quasiquote(_)
        | Value::Unquote(_)
        | Value::UnquoteSplicing(_) => Ok(Expr::Literal(form.clone())),
        Value::Nil => Err(LispError::PoorlyFormedExpression),
        Value::Pair(..) => {
            let items = form
                .try_list_to_vec()
                .ok_or(LispError::PoorlyFormedExpression)?;
            build_compound(&items, form)
        }
        // Evaluated values can flow back in through macro results.
        _ => Ok(Expr::Literal(form.clone())),
    }
}

fn build_compound(items: &[Value], form: &Value) -> Result<Expr, LispError> {
    if let Value::Symbol(head) = &items[0] {
        match head.as_str() {
            "if" => return build_if(items, form),
            "cond" => return build_cond(items),
            "and" | "or" => return build_and_or(head, items),
            "quote" => return build_wrapper(items, Value::Quote),
            "quasiquote" => return build_wrapper(items, Value::Quasiquote),
            "unquote" => return build_wrapper(items, Value::Unquote),
            "unquote-splicing" => return build_wrapper(items, Value::UnquoteSplicing),
            "define" => return build_define(items, form),
            "defun" => return build_defun(items, form, false),
            "defmacro" => return build_defun(items, form, true),
            "lambda" => return build_lambda(items),
            "apply" => return build_apply(items),
            "let" => return build_let(LetKind::Parallel, items),
            "let*" => return build_let(LetKind::Sequential, items),
            "letrec" => return build_let(LetKind::Recursive, items),
            "module" => return build_module(items),
            "import" => return build_import(items),
            "load-module" => return build_load_module(items),
            _ => {}
        }
    }

    let func = build(&items[0])?;
    let args = items[1..].iter().map(build).collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::Call(Box::new(func), args))
}

fn build_if(items: &[Value], form: &Value) -> Result<Expr, LispError> {
    if items.len() != 4 {
        return Err(LispError::IllegalIfExpression(form.to_string()));
    }
    Ok(Expr::If(
        Box::new(build(&items[1])?),
        Box::new(build(&items[2])?),
        Box::new(build(&items[3])?),
    ))
}

/// `(cond (c1 r1) ... (cn rn))` right-folds into nested ifs with a nil
/// fallthrough.
fn build_cond(items: &[Value]) -> Result<Expr, LispError> {
    let mut result = Expr::Literal(Value::Nil);
    for clause in items[1..].iter().rev() {
        let parts = clause
            .try_list_to_vec()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| LispError::TypeError("(cond (test result) ...)".to_string()))?;
        result = Expr::If(
            Box::new(build(&parts[0])?),
            Box::new(build(&parts[1])?),
            Box::new(result),
        );
    }
    Ok(result)
}

fn build_and_or(head: &str, items: &[Value]) -> Result<Expr, LispError> {
    if items.len() != 3 {
        return Err(LispError::TypeError(format!("({} bool bool)", head)));
    }
    let a = Box::new(build(&items[1])?);
    let b = Box::new(build(&items[2])?);
    Ok(if head == "and" {
        Expr::And(a, b)
    } else {
        Expr::Or(a, b)
    })
}

fn build_wrapper(
    items: &[Value],
    wrap: fn(Box<Value>) -> Value,
) -> Result<Expr, LispError> {
    if items.len() != 2 {
        return Err(LispError::PoorlyFormedExpression);
    }
    Ok(Expr::Literal(wrap(Box::new(items[1].clone()))))
}

fn build_define(items: &[Value], form: &Value) -> Result<Expr, LispError> {
    match items {
        [_, Value::Symbol(name), value] => Ok(Expr::Def(Definition::SetVar(
            name.clone(),
            Box::new(build(value)?),
        ))),
        _ => Err(LispError::InvalidDefineExpression(form.to_string())),
    }
}

/// `(defun name (params) body...)` and `(defmacro name (params) body...)`
/// share a shape.
fn build_defun(items: &[Value], form: &Value, is_macro: bool) -> Result<Expr, LispError> {
    if items.len() < 4 {
        return Err(LispError::InvalidDefineExpression(form.to_string()));
    }
    let Value::Symbol(name) = &items[1] else {
        return Err(LispError::InvalidDefineExpression(form.to_string()));
    };
    let shape = if is_macro {
        "(defmacro name (params) body)"
    } else {
        "(defun name (params) body)"
    };
    let params = unique_names(&items[2], shape)?;
    let body = Box::new(build_body(&items[3..], shape)?);
    Ok(Expr::Def(if is_macro {
        Definition::DefineMacro(name.clone(), params, body)
    } else {
        Definition::DefineFunction(name.clone(), params, body)
    }))
}

fn build_lambda(items: &[Value]) -> Result<Expr, LispError> {
    const SHAPE: &str = "(lambda (params) body)";
    if items.len() < 3 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }
    let params = unique_names(&items[1], SHAPE)?;
    let body = Box::new(build_body(&items[2..], SHAPE)?);
    Ok(Expr::Lambda {
        name: "lambda".to_string(),
        params,
        body,
    })
}

fn build_apply(items: &[Value]) -> Result<Expr, LispError> {
    if items.len() != 3 {
        return Err(LispError::TypeError("(apply function list)".to_string()));
    }
    Ok(Expr::Apply(
        Box::new(build(&items[1])?),
        Box::new(build(&items[2])?),
    ))
}

fn build_let(kind: LetKind, items: &[Value]) -> Result<Expr, LispError> {
    const SHAPE: &str = "(let bindings body)";
    if items.len() < 3 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }
    let binding_forms = items[1]
        .try_list_to_vec()
        .ok_or_else(|| LispError::TypeError(SHAPE.to_string()))?;

    let mut bindings = Vec::with_capacity(binding_forms.len());
    for form in &binding_forms {
        let parts = form
            .try_list_to_vec()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| LispError::TypeError(SHAPE.to_string()))?;
        let Value::Symbol(name) = &parts[0] else {
            return Err(LispError::TypeError(SHAPE.to_string()));
        };
        if bindings.iter().any(|(n, _)| n == name) {
            return Err(LispError::UniqueError(name.clone()));
        }
        bindings.push((name.clone(), build(&parts[1])?));
    }

    Ok(Expr::Let {
        kind,
        bindings,
        body: Box::new(build_body(&items[2..], SHAPE)?),
    })
}

fn build_module(items: &[Value]) -> Result<Expr, LispError> {
    const SHAPE: &str = "(module name (exports) body)";
    if items.len() < 3 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }
    let Value::Symbol(name) = &items[1] else {
        return Err(LispError::TypeError(SHAPE.to_string()));
    };
    let exports = unique_names(&items[2], SHAPE)?;
    let body = items[3..].iter().map(build).collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::ModuleDef {
        name: name.clone(),
        exports,
        body,
    })
}

fn build_import(items: &[Value]) -> Result<Expr, LispError> {
    const SHAPE: &str = "(import module [:as alias | names])";
    if items.len() < 2 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }
    let Value::Symbol(module) = &items[1] else {
        return Err(LispError::TypeError(SHAPE.to_string()));
    };

    let spec = match &items[2..] {
        [] => ImportSpec::All(module.clone()),
        [Value::Symbol(marker), Value::Symbol(alias)] if marker == ":as" => {
            ImportSpec::As(module.clone(), alias.clone())
        }
        names => {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let Value::Symbol(s) = name else {
                    return Err(LispError::TypeError(SHAPE.to_string()));
                };
                selected.push(s.clone());
            }
            ImportSpec::Selective(module.clone(), selected)
        }
    };
    Ok(Expr::Import(spec))
}

fn build_load_module(items: &[Value]) -> Result<Expr, LispError> {
    const SHAPE: &str = "(load-module name)";
    if items.len() != 2 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }
    // A bare symbol names the module literally; anything else is an
    // expression evaluating to the name.
    let name_expr = match &items[1] {
        Value::Symbol(s) => Expr::Literal(Value::Str(s.clone())),
        other => build(other)?,
    };
    Ok(Expr::LoadModule(Box::new(name_expr)))
}

/// A parameter or export list: a proper list of distinct symbols.
fn unique_names(list: &Value, shape: &str) -> Result<Vec<String>, LispError> {
    let items = list
        .try_list_to_vec()
        .ok_or_else(|| LispError::TypeError(shape.to_string()))?;
    let mut names = Vec::with_capacity(items.len());
    for item in &items {
        let Value::Symbol(name) = item else {
            return Err(LispError::TypeError(shape.to_string()));
        };
        if names.contains(name) {
            return Err(LispError::UniqueError(name.clone()));
        }
        names.push(name.clone());
    }
    Ok(names)
}

fn build_body(items: &[Value], shape: &str) -> Result<Expr, LispError> {
    if items.is_empty() {
        return Err(LispError::TypeError(shape.to_string()));
    }
    let exprs = items.iter().map(build).collect::<Result<Vec<_>, _>>()?;
    Ok(sequence(exprs))
}

/// Rewrites a multi-expression body into nested single-expression lets:
/// `(e1 e2 ... ek)` becomes `Let([("_", e1)], sequence(e2...ek))`. An
/// internal define is lifted into a binding so it stays visible to the
/// expressions after it; defun lifts recursively so the function can
/// call itself.
pub fn sequence(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        return exprs.pop().expect("sequence of one");
    }
    let first = exprs.remove(0);
    let rest = sequence(exprs);
    let (kind, name, value) = match first {
        Expr::Def(Definition::SetVar(name, value)) => (LetKind::Sequential, name, *value),
        Expr::Def(Definition::DefineFunction(name, params, body)) => (
            LetKind::Recursive,
            name.clone(),
            Expr::Lambda {
                name,
                params,
                body,
            },
        ),
        other => (LetKind::Parallel, "_".to_string(), other),
    };
    Expr::Let {
        kind,
        bindings: vec![(name, value)],
        body: Box::new(rest),
    }
}

/// The inverse of `build`: renders an expression back into the
/// S-expression it came from. The macro expander hands argument
/// expressions to macro bodies in this form.
pub fn expr_to_value(expr: &Expr) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Var(name) => Value::Symbol(name.clone()),
        Expr::If(c, t, e) => Value::list_from_vec(vec![
            sym("if"),
            expr_to_value(c),
            expr_to_value(t),
            expr_to_value(e),
        ]),
        Expr::And(a, b) => {
            Value::list_from_vec(vec![sym("and"), expr_to_value(a), expr_to_value(b)])
        }
        Expr::Or(a, b) => {
            Value::list_from_vec(vec![sym("or"), expr_to_value(a), expr_to_value(b)])
        }
        Expr::Apply(f, args) => {
            Value::list_from_vec(vec![sym("apply"), expr_to_value(f), expr_to_value(args)])
        }
        Expr::Call(f, args) => {
            let mut items = vec![expr_to_value(f)];
            items.extend(args.iter().map(expr_to_value));
            Value::list_from_vec(items)
        }
        Expr::Lambda { params, body, .. } => Value::list_from_vec(vec![
            sym("lambda"),
            symbol_list(params),
            expr_to_value(body),
        ]),
        Expr::Let {
            kind,
            bindings,
            body,
        } => {
            let head = match kind {
                LetKind::Parallel => "let",
                LetKind::Sequential => "let*",
                LetKind::Recursive => "letrec",
            };
            let binding_forms = bindings
                .iter()
                .map(|(name, value)| {
                    Value::list_from_vec(vec![sym(name), expr_to_value(value)])
                })
                .collect();
            Value::list_from_vec(vec![
                sym(head),
                Value::list_from_vec(binding_forms),
                expr_to_value(body),
            ])
        }
        Expr::Def(Definition::SetVar(name, value)) => {
            Value::list_from_vec(vec![sym("define"), sym(name), expr_to_value(value)])
        }
        Expr::Def(Definition::DefineFunction(name, params, body)) => Value::list_from_vec(vec![
            sym("defun"),
            sym(name),
            symbol_list(params),
            expr_to_value(body),
        ]),
        Expr::Def(Definition::DefineMacro(name, params, body)) => Value::list_from_vec(vec![
            sym("defmacro"),
            sym(name),
            symbol_list(params),
            expr_to_value(body),
        ]),
        Expr::ModuleDef {
            name,
            exports,
            body,
        } => {
            let mut items = vec![sym("module"), sym(name), symbol_list(exports)];
            items.extend(body.iter().map(expr_to_value));
            Value::list_from_vec(items)
        }
        Expr::Import(ImportSpec::All(m)) => Value::list_from_vec(vec![sym("import"), sym(m)]),
        Expr::Import(ImportSpec::Selective(m, names)) => {
            let mut items = vec![sym("import"), sym(m)];
            items.extend(names.iter().map(|n| sym(n)));
            Value::list_from_vec(items)
        }
        Expr::Import(ImportSpec::As(m, alias)) => {
            Value::list_from_vec(vec![sym("import"), sym(m), sym(":as"), sym(alias)])
        }
        Expr::LoadModule(name) => {
            Value::list_from_vec(vec![sym("load-module"), expr_to_value(name)])
        }
    }
}

fn sym(s: &str) -> Value {
    Value::Symbol(s.to_string())
}

fn symbol_list(names: &[String]) -> Value {
    Value::list_from_vec(names.iter().map(|n| sym(n)).collect())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", expr_to_value(self))
    }
}
