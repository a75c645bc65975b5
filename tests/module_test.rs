// ABOUTME: Module subsystem tests: imports, file loading, cache, cycle detection

use mlisp::error::LispError;
use mlisp::interpreter::Interpreter;
use mlisp::modules;
use mlisp::value::Value;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

fn setup() -> Interpreter {
    modules::clear_cache();
    Interpreter::new().expect("prelude should load")
}

/// Writes module fixtures into a scratch directory and makes it the
/// working directory, since load-module resolves against the cwd.
fn enter_scratch_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mlisp-module-test-{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    for (file, contents) in files {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(path, contents).expect("write fixture");
    }
    std::env::set_current_dir(&dir).expect("enter scratch dir");
    dir
}

#[test]
#[serial]
fn test_load_module_from_file() {
    enter_scratch_dir(
        "load",
        &[("m.mlisp", "(module m (x) (define x 10))")],
    );
    let interp = setup();
    let result = interp
        .eval_source("test", "(load-module \"m\") (import m) x")
        .unwrap();
    assert_eq!(result, Value::Integer(10));
}

#[test]
#[serial]
fn test_load_module_searches_modules_directory() {
    enter_scratch_dir(
        "search",
        &[("modules/n.mlisp", "(module n (y) (define y 3))")],
    );
    let interp = setup();
    let result = interp
        .eval_source("test", "(load-module \"n\") (import n) y")
        .unwrap();
    assert_eq!(result, Value::Integer(3));
}

#[test]
#[serial]
fn test_missing_module_file() {
    enter_scratch_dir("missing", &[]);
    let interp = setup();
    let err = interp
        .eval_source("test", "(load-module \"nowhere\")")
        .unwrap_err();
    assert_eq!(
        err,
        LispError::ModuleLoadError {
            module: "nowhere".to_string(),
            reason: "not found".to_string(),
        }
    );
}

#[test]
#[serial]
fn test_cache_hits_return_identity_equal_modules() {
    enter_scratch_dir(
        "cache",
        &[("m.mlisp", "(module m (x) (define x 10))")],
    );
    let interp = setup();
    let first = interp.eval_source("test", "(load-module \"m\")").unwrap();
    let second = interp.eval_source("test", "(load-module \"m\")").unwrap();
    // Module equality is Rc identity, so this is the cache-hit check.
    assert_eq!(first, second);
    assert!(modules::cached_value("m").is_some());
}

#[test]
#[serial]
fn test_clear_module_cache_forces_a_fresh_load() {
    enter_scratch_dir(
        "clear",
        &[("m.mlisp", "(module m (x) (define x 10))")],
    );
    let interp = setup();
    let first = interp.eval_source("test", "(load-module \"m\")").unwrap();
    interp
        .eval_source("test", "(clear-module-cache)")
        .unwrap();
    assert!(modules::cached_value("m").is_none());
    let second = interp.eval_source("test", "(load-module \"m\")").unwrap();
    assert_ne!(first, second);
}

#[test]
#[serial]
fn test_circular_dependency_is_detected() {
    enter_scratch_dir(
        "cycle",
        &[
            (
                "a.mlisp",
                "(load-module \"b\") (module a (ax) (define ax 1))",
            ),
            (
                "b.mlisp",
                "(load-module \"a\") (module b (bx) (define bx 2))",
            ),
        ],
    );
    let interp = setup();
    let err = interp.eval_source("test", "(load-module \"a\")").unwrap_err();
    let LispError::ModuleLoadError { reason, .. } = err else {
        panic!("expected a module load error, got {:?}", err);
    };
    assert!(reason.contains("Circular dependency"), "reason: {}", reason);
    assert!(reason.contains("a -> b -> a"), "reason: {}", reason);
}

#[test]
#[serial]
fn test_failed_load_unwinds_the_loading_stack() {
    enter_scratch_dir("unwind", &[("bad.mlisp", "(this-is-not-defined)")]);
    let interp = setup();
    assert!(interp
        .eval_source("test", "(load-module \"bad\")")
        .is_err());
    // A second attempt must fail the same way, not report a bogus cycle.
    let err = interp
        .eval_source("test", "(load-module \"bad\")")
        .unwrap_err();
    assert!(matches!(err, LispError::NotFound(_)), "got {:?}", err);
}

#[test]
#[serial]
fn test_top_level_defines_outside_the_module_are_not_importable() {
    enter_scratch_dir(
        "outside",
        &[(
            "q.mlisp",
            "(define helper 5) (module q (x) (define x helper))",
        )],
    );
    let interp = setup();
    let result = interp
        .eval_source("test", "(load-module \"q\") (import q) x")
        .unwrap();
    assert_eq!(result, Value::Integer(5));
    // The helper supported the module body but is not reachable from
    // the importing scope.
    assert!(matches!(
        interp.eval_source("test", "helper").unwrap_err(),
        LispError::NotFound(_)
    ));
}

#[test]
fn test_export_must_exist() {
    let interp = setup();
    let err = interp
        .eval_source("test", "(module bad (missing) (define x 1))")
        .unwrap_err();
    assert_eq!(
        err,
        LispError::ExportNotFound {
            module: "bad".to_string(),
            name: "missing".to_string(),
        }
    );
}

#[test]
fn test_selective_import_of_non_export() {
    let interp = setup();
    let err = interp
        .eval_source("test", "(module m (a) (define a 1) (define b 2)) (import m b)")
        .unwrap_err();
    assert_eq!(
        err,
        LispError::ExportNotFound {
            module: "m".to_string(),
            name: "b".to_string(),
        }
    );
}

#[test]
fn test_import_requires_a_module_value() {
    let interp = setup();
    let err = interp
        .eval_source("test", "(define z 1) (import z)")
        .unwrap_err();
    assert_eq!(err, LispError::NotAModule("z".to_string()));
}

#[test]
fn test_two_imports_share_one_module_object() {
    let interp = setup();
    interp
        .eval_source(
            "test",
            "(module m (x) (define x 1)) (import m :as a) (import m :as b)",
        )
        .unwrap();
    let first = interp.eval_source("test", "a").unwrap();
    let second = interp.eval_source("test", "b").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_recursive_module_reference_resolves_to_placeholder() {
    let interp = setup();
    // The module body can mention the module under definition.
    let result = interp
        .eval_source(
            "test",
            "(module m (self?) (define self? (lambda () m))) (import m) (self?)",
        )
        .unwrap();
    assert!(matches!(result, Value::Module(_)));
}
