// ABOUTME: Static help-text table keyed by diagnostic code

/// One help string per diagnostic code. The table is data only; the
/// renderer in `diagnostics` decides how to present it.
const HELP_TABLE: &[(&str, &str)] = &[
    (
        "E001",
        "Each parameter or binding name may appear only once in a form. \
         Rename the duplicate.",
    ),
    (
        "E002",
        "The form does not match the shape the operator requires. The \
         message shows the expected shape.",
    ),
    (
        "E003",
        "An empty or malformed expression cannot be evaluated. Check for \
         a stray `()` or a misplaced parenthesis.",
    ),
    (
        "E004",
        "Only closures and primitives can be called. The value in \
         function position is neither.",
    ),
    (
        "E100",
        "The reader does not recognize this character at this point. \
         Check for an unbalanced delimiter or a typo.",
    ),
    (
        "E101",
        "Boolean literals are written `#t` and `#f`. Any other token \
         starting with `#` is invalid.",
    ),
    (
        "E102",
        "A definition is written `(define name expr)`, \
         `(defun name (params) body)`, or `(defmacro name (params) body)`.",
    ),
    (
        "E103",
        "Record fields are named by symbols: \
         `(record 'point 'x 1 'y 2)`.",
    ),
    (
        "E104",
        "An if expression is `(if condition then else)` and its \
         condition must evaluate to `#t` or `#f`.",
    ),
    (
        "E200",
        "The name is not bound in any enclosing scope. Define it first, \
         or import the module that provides it.",
    ),
    (
        "E201",
        "A letrec binding was read before its right-hand side finished \
         evaluating. Reorder the bindings or delay the reference inside \
         a lambda.",
    ),
    (
        "E202",
        "The function was called with fewer or more arguments than it \
         has parameters.",
    ),
    (
        "E203",
        "The prelude may contain only definitions: define, defun, \
         defmacro, or module forms.",
    ),
    (
        "E204",
        "import and module access require a module value. Did you \
         shadow the module name?",
    ),
    (
        "E205",
        "The module does not list this name in its export list. Check \
         the `(module NAME (exports...) ...)` header.",
    ),
    (
        "E206",
        "Module files are searched in the working directory and \
         ./modules/, as NAME.mlisp. Circular loads are rejected.",
    ),
    (
        "E207",
        "Macro expansion did not terminate within the step limit. The \
         macro probably expands to a call of itself.",
    ),
];

/// Look up the help text for a diagnostic code.
pub fn help_for(code: &str) -> Option<&'static str> {
    HELP_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
}
