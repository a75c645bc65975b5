// ABOUTME: REPL helper: completion, hints, and ;;-terminated multi-line input

use crate::env::Environment;
use crate::reader::is_symbol_char;
use rustyline::completion::Completer;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Context;
use rustyline_derive::{Helper, Highlighter};
use std::rc::Rc;

/// Line-editor helper wired to the top-level environment, so completion
/// and hints track whatever the session has defined or imported.
#[derive(Helper, Highlighter)]
pub struct ReplHelper {
    env: Rc<Environment>,
}

impl ReplHelper {
    pub fn new(env: Rc<Environment>) -> Self {
        ReplHelper { env }
    }

    fn matches(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .env
            .visible_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        names
    }
}

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let start = word_start(line, pos);
        Ok((start, self.matches(&line[start..pos])))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let start = word_start(line, pos);
        let prefix = &line[start..pos];
        if prefix.len() < 2 {
            return None;
        }
        self.matches(prefix)
            .into_iter()
            .find(|name| name.len() > prefix.len())
            .map(|name| name[prefix.len()..].to_string())
    }
}

impl Validator for ReplHelper {
    /// Input is one submission once it ends with the `;;` terminator;
    /// anything else keeps the editor in multi-line mode.
    fn validate(
        &self,
        ctx: &mut ValidationContext,
    ) -> rustyline::Result<ValidationResult> {
        if ctx.input().trim_end().ends_with(";;") {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_symbol_char(*c))
        .last()
        .map_or(pos, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_word_start_stops_at_delimiters() {
        assert_eq!(word_start("(fact", 5), 1);
        assert_eq!(word_start("(+ x", 4), 3);
        assert_eq!(word_start("(", 1), 1);
    }

    #[test]
    fn test_matches_filters_visible_names() {
        let env = Environment::root();
        env.bind("factorial", Value::Nil);
        env.bind("filter", Value::Nil);
        let helper = ReplHelper::new(env);
        assert_eq!(helper.matches("fac"), vec!["factorial".to_string()]);
        assert_eq!(helper.matches("f").len(), 2);
    }
}
