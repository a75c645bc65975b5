// ABOUTME: Module subsystem: definitions, imports, file loading with cache

use crate::ast::{Expr, ImportSpec};
use crate::env::Environment;
use crate::error::LispError;
use crate::eval;
use crate::interpreter;
use crate::value::{ModuleData, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

pub const MODULE_EXTENSION: &str = "mlisp";

/// File resolution order for `load-module`.
const SEARCH_PATHS: &[&str] = &[".", "./modules"];

/// One cached load: the module value, its internal environment, the
/// file it came from, and when it was loaded.
pub struct CacheEntry {
    pub value: Value,
    pub env: Rc<Environment>,
    pub path: PathBuf,
    pub loaded_at: SystemTime,
}

// Process-wide mutable state, serialized by the single-threaded
// execution model. The cache lives until an explicit clear request;
// the loading stack exists to reject circular loads.
thread_local! {
    static CACHE: RefCell<HashMap<String, CacheEntry>> = RefCell::new(HashMap::new());
    static LOADING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Pops the loading stack on every exit path, error or not.
struct LoadGuard;

impl LoadGuard {
    fn push(name: &str) -> Self {
        LOADING.with(|l| l.borrow_mut().push(name.to_string()));
        LoadGuard
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        LOADING.with(|l| {
            l.borrow_mut().pop();
        });
    }
}

/// `(module name (exports) body...)`.
pub fn eval_module_def(
    name: &str,
    exports: &[String],
    body: &[Expr],
    env: &Rc<Environment>,
) -> Result<Value, LispError> {
    let module_env = Environment::extend(env.clone());

    // A placeholder with empty exports, so the body can refer to the
    // module under definition.
    let placeholder = Value::Module(Rc::new(ModuleData {
        name: name.to_string(),
        env: module_env.clone(),
        exports: Vec::new(),
    }));
    module_env.bind(name, placeholder);

    for expr in body {
        if !is_definition_like(expr) {
            eprintln!(
                "Warning: module {} evaluates non-definition expression {}",
                name, expr
            );
        }
        eval::eval(expr, &module_env)?;
    }

    for export in exports {
        if module_env.local_cell(export).is_none() {
            return Err(LispError::ExportNotFound {
                module: name.to_string(),
                name: export.clone(),
            });
        }
    }

    let module = Value::Module(Rc::new(ModuleData {
        name: name.to_string(),
        env: module_env.clone(),
        exports: exports.to_vec(),
    }));
    module_env.assign(name, module.clone());
    env.assign(name, module.clone());

    insert_cache(name, module.clone(), module_env, PathBuf::new());
    Ok(module)
}

/// A module body is made of definitions; anything else still runs, but
/// its value is discarded with a warning. Branching forms count as
/// definitions when either branch defines.
fn is_definition_like(expr: &Expr) -> bool {
    match expr {
        Expr::Def(_) | Expr::ModuleDef { .. } | Expr::Import(_) | Expr::LoadModule(_) => true,
        Expr::If(_, then, otherwise) => {
            is_definition_like(then) || is_definition_like(otherwise)
        }
        _ => false,
    }
}

/// `(import m)`, `(import m names...)`, `(import m :as alias)`.
pub fn eval_import(spec: &ImportSpec, env: &Rc<Environment>) -> Result<Value, LispError> {
    let module_name = spec.module_name();
    let value = env.lookup(module_name)?;
    let Value::Module(module) = &value else {
        return Err(LispError::NotAModule(module_name.to_string()));
    };

    match spec {
        ImportSpec::All(_) => {
            for name in &module.exports {
                let exported = module.env.lookup(name)?;
                env.bind(name, exported);
            }
        }
        ImportSpec::Selective(_, names) => {
            for name in names {
                if !module.exports.contains(name) {
                    return Err(LispError::ExportNotFound {
                        module: module_name.to_string(),
                        name: name.clone(),
                    });
                }
                let exported = module.env.lookup(name)?;
                env.bind(name, exported);
            }
        }
        ImportSpec::As(_, alias) => {
            env.bind(alias, value.clone());
            for name in &module.exports {
                let exported = module.env.lookup(name)?;
                env.bind(&format!("{}.{}", alias, name), exported);
            }
        }
    }
    Ok(value)
}

/// Loads `NAME.mlisp` from the search paths, with caching and circular
/// dependency detection. The resulting module value is bound at `NAME`
/// in the caller's environment.
pub fn load_module(name: &str, env: &Rc<Environment>) -> Result<Value, LispError> {
    let cycle = LOADING.with(|l| {
        let loading = l.borrow();
        loading
            .iter()
            .any(|n| n == name)
            .then(|| loading.join(" -> "))
    });
    if let Some(stack) = cycle {
        return Err(LispError::ModuleLoadError {
            module: name.to_string(),
            reason: format!("Circular dependency: {} -> {}", stack, name),
        });
    }

    if let Some(value) = cached_value(name) {
        env.bind(name, value.clone());
        return Ok(value);
    }

    let path = resolve_path(name).ok_or_else(|| LispError::ModuleLoadError {
        module: name.to_string(),
        reason: "not found".to_string(),
    })?;
    let source = std::fs::read_to_string(&path).map_err(|e| LispError::ModuleLoadError {
        module: name.to_string(),
        reason: e.to_string(),
    })?;

    let _guard = LoadGuard::push(name);

    // Errors propagate here; the guard still unwinds the stack.
    let file_env = Environment::extend(env.clone());
    interpreter::run_source(&file_env, &path.display().to_string(), &source)?;

    let value = file_env
        .lookup(name)
        .map_err(|_| LispError::ModuleLoadError {
            module: name.to_string(),
            reason: format!("file defines no module named {}", name),
        })?;
    let Value::Module(module) = &value else {
        return Err(LispError::ModuleLoadError {
            module: name.to_string(),
            reason: format!("{} is bound but is not a module", name),
        });
    };

    insert_cache(name, value.clone(), module.env.clone(), path);
    env.bind(name, value.clone());
    Ok(value)
}

fn resolve_path(name: &str) -> Option<PathBuf> {
    SEARCH_PATHS
        .iter()
        .map(|dir| Path::new(dir).join(format!("{}.{}", name, MODULE_EXTENSION)))
        .find(|p| p.is_file())
}

fn insert_cache(name: &str, value: Value, env: Rc<Environment>, path: PathBuf) {
    CACHE.with(|c| {
        c.borrow_mut().insert(
            name.to_string(),
            CacheEntry {
                value,
                env,
                path,
                loaded_at: SystemTime::now(),
            },
        );
    });
}

/// The cached module value for `name`, if any.
pub fn cached_value(name: &str) -> Option<Value> {
    CACHE.with(|c| c.borrow().get(name).map(|entry| entry.value.clone()))
}

/// Empties the module cache. Exposed to programs as the
/// `clear-module-cache` primitive.
pub fn clear_cache() {
    CACHE.with(|c| c.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Definition;

    #[test]
    fn test_definition_like_classification() {
        let def = Expr::Def(Definition::SetVar(
            "x".to_string(),
            Box::new(Expr::Literal(Value::Integer(1))),
        ));
        assert!(is_definition_like(&def));

        let bare = Expr::Literal(Value::Integer(1));
        assert!(!is_definition_like(&bare));

        let branching = Expr::If(
            Box::new(Expr::Literal(Value::Boolean(true))),
            Box::new(def),
            Box::new(Expr::Literal(Value::Nil)),
        );
        assert!(is_definition_like(&branching));
    }

    #[test]
    fn test_resolve_path_misses_cleanly() {
        assert!(resolve_path("definitely-not-a-module-here").is_none());
    }
}
