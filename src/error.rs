// ABOUTME: Error taxonomy for the interpreter, with canonical diagnostic codes

use thiserror::Error;

/// Every failure the reader, AST builder, macro expander, evaluator, or
/// module loader can produce. Each variant maps to a canonical code
/// (`E0xx` parse, `E1xx` syntax, `E2xx` runtime) used by the diagnostic
/// renderer and the help table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LispError {
    // ===== Parse errors =====
    #[error("Duplicate name: {0}")]
    UniqueError(String),

    /// Carries the expected shape, e.g. `(let bindings body)`.
    #[error("Expected {0}")]
    TypeError(String),

    #[error("Poorly formed expression")]
    PoorlyFormedExpression,

    #[error("Cannot apply: {0}")]
    ApplyError(String),

    // ===== Syntax errors =====
    #[error("Unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("Invalid boolean literal '{0}'")]
    InvalidBooleanLiteral(String),

    #[error("Invalid define expression: {0}")]
    InvalidDefineExpression(String),

    #[error("Record field name must be a symbol, got {0}")]
    RecordFieldNameMustBeSymbol(String),

    #[error("Illegal if expression: {0}")]
    IllegalIfExpression(String),

    // ===== Runtime errors =====
    #[error("{0}")]
    NotFound(String),

    #[error("{0} is bound but has not been assigned a value")]
    Unspecified(String),

    /// Carries the parameter list of the function that was called short.
    #[error("Missing argument for parameter(s): {0}")]
    MissingArgument(String),

    #[error("Non-definition form in the prelude: {0}")]
    NonDefinitionInStdlib(String),

    #[error("{0} is not a module")]
    NotAModule(String),

    #[error("Module {module} does not export {name}")]
    ExportNotFound { module: String, name: String },

    #[error("Failed to load module {module}: {reason}")]
    ModuleLoadError { module: String, reason: String },

    #[error("Macro recursion limit exceeded while expanding {0}")]
    MacroRecursionLimit(String),

    /// Raised by the reader when the input stream holds no further
    /// forms. Drives loop termination; never rendered as a diagnostic.
    #[error("end of stream")]
    EndOfStream,
}

impl LispError {
    /// The canonical diagnostic code, or `None` for internal signals.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            LispError::UniqueError(_) => Some("E001"),
            LispError::TypeError(_) => Some("E002"),
            LispError::PoorlyFormedExpression => Some("E003"),
            LispError::ApplyError(_) => Some("E004"),
            LispError::UnexpectedCharacter(_) => Some("E100"),
            LispError::InvalidBooleanLiteral(_) => Some("E101"),
            LispError::InvalidDefineExpression(_) => Some("E102"),
            LispError::RecordFieldNameMustBeSymbol(_) => Some("E103"),
            LispError::IllegalIfExpression(_) => Some("E104"),
            LispError::NotFound(_) => Some("E200"),
            LispError::Unspecified(_) => Some("E201"),
            LispError::MissingArgument(_) => Some("E202"),
            LispError::NonDefinitionInStdlib(_) => Some("E203"),
            LispError::NotAModule(_) => Some("E204"),
            LispError::ExportNotFound { .. } => Some("E205"),
            LispError::ModuleLoadError { .. } => Some("E206"),
            LispError::MacroRecursionLimit(_) => Some("E207"),
            LispError::EndOfStream => None,
        }
    }

    /// Static help text for this error kind, when the table has one.
    pub fn help(&self) -> Option<&'static str> {
        self.code().and_then(crate::help::help_for)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_taxonomy_bands() {
        assert_eq!(LispError::UniqueError("x".into()).code(), Some("E001"));
        assert_eq!(LispError::UnexpectedCharacter('^').code(), Some("E100"));
        assert_eq!(LispError::NotFound("x".into()).code(), Some("E200"));
        assert_eq!(
            LispError::ModuleLoadError {
                module: "m".into(),
                reason: "not found".into()
            }
            .code(),
            Some("E206")
        );
        assert_eq!(LispError::EndOfStream.code(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = LispError::TypeError("(let bindings body)".into());
        assert_eq!(err.to_string(), "Expected (let bindings body)");

        let err = LispError::ExportNotFound {
            module: "m".into(),
            name: "y".into(),
        };
        assert_eq!(err.to_string(), "Module m does not export y");
    }

    #[test]
    fn test_every_coded_error_has_help() {
        let errors = [
            LispError::UniqueError("x".into()),
            LispError::TypeError("t".into()),
            LispError::PoorlyFormedExpression,
            LispError::ApplyError("3".into()),
            LispError::UnexpectedCharacter('^'),
            LispError::InvalidBooleanLiteral("#x".into()),
            LispError::InvalidDefineExpression("(define)".into()),
            LispError::RecordFieldNameMustBeSymbol("3".into()),
            LispError::IllegalIfExpression("(if)".into()),
            LispError::NotFound("x".into()),
            LispError::Unspecified("x".into()),
            LispError::MissingArgument("x y".into()),
            LispError::NonDefinitionInStdlib("(+ 1 2)".into()),
            LispError::NotAModule("m".into()),
        ];
        for err in errors {
            assert!(err.help().is_some(), "no help text for {:?}", err.code());
        }
    }
}
