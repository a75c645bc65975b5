// ABOUTME: Reader: character stream to S-expression values, with position tracking

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, none_of, one_of},
    combinator::{opt, value},
    multi::many0,
    IResult, Parser,
};

use crate::error::LispError;
use crate::value::Value;

/// Line/column of a point in the input, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Pulls one S-expression per `read` call off a buffered source,
/// remembering where the most recent form began and keeping the whole
/// input around for diagnostic excerpts.
pub struct Reader {
    source: String,
    file: String,
    offset: usize,
    form_start: Position,
}

impl Reader {
    pub fn new(source: impl Into<String>, file: impl Into<String>) -> Self {
        Reader {
            source: source.into(),
            file: file.into(),
            offset: 0,
            form_start: Position { line: 1, column: 1 },
        }
    }

    /// Reads the next form. `EndOfStream` when only whitespace and
    /// comments remain.
    pub fn read(&mut self) -> Result<Value, LispError> {
        let rest = &self.source[self.offset..];
        let after_ws = match ws_and_comments(rest) {
            Ok((after, ())) => after,
            Err(_) => rest,
        };
        self.offset = self.source.len() - after_ws.len();
        if after_ws.is_empty() {
            return Err(LispError::EndOfStream);
        }
        self.form_start = self.position_at(self.offset);

        match parse_form(after_ws) {
            Ok((remaining, form)) => {
                self.offset = self.source.len() - remaining.len();
                Ok(form)
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let failed_at = self.source.len() - e.input.len();
                let first = e.input.chars().next();
                let token: String = e
                    .input
                    .chars()
                    .take_while(|&c| c == '#' || is_symbol_char(c))
                    .collect();
                self.form_start = self.position_at(failed_at);
                match first {
                    // The stream ran out inside a form. EndOfStream is
                    // reserved for exhaustion between forms.
                    None => Err(LispError::PoorlyFormedExpression),
                    Some('#') => Err(LispError::InvalidBooleanLiteral(token)),
                    Some(c) => Err(LispError::UnexpectedCharacter(c)),
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(LispError::PoorlyFormedExpression),
        }
    }

    /// Where the most recently read (or failed) form began.
    pub fn last_position(&self) -> Position {
        self.form_start
    }

    pub fn file_name(&self) -> &str {
        &self.file
    }

    /// The raw text of a 1-based source line, for diagnostic excerpts.
    pub fn source_line(&self, line: usize) -> Option<&str> {
        self.source.lines().nth(line.checked_sub(1)?)
    }

    fn position_at(&self, offset: usize) -> Position {
        let prefix = &self.source[..offset];
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map_or(0, |i| i + 1);
        Position {
            line,
            column: offset - line_start + 1,
        }
    }
}

/// Symbols run until whitespace or one of the hard delimiters.
pub(crate) fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(c, '(' | ')' | '{' | '}' | ';' | '"' | '\'' | '`' | ',')
}

/// Symbol-start additionally excludes the characters that open other
/// token classes: digits, `#` (booleans), `~` (negative integers).
fn is_symbol_start(c: char) -> bool {
    is_symbol_char(c) && !c.is_ascii_digit() && !matches!(c, '#' | '~')
}

fn parse_comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = char(';')(input)?;
    let (input, _) = take_while(|c| c != '\n')(input)?;
    Ok((input, ()))
}

/// Skip whitespace and `;`-to-end-of-line comments.
fn ws_and_comments(input: &str) -> IResult<&str, ()> {
    many0(alt((value((), multispace1), parse_comment)))
        .map(|_| ())
        .parse(input)
}

/// Decimal integer, with an optional leading `~` meaning minus. A
/// `-` prefix is accepted too so printed negatives read back.
fn parse_integer(input: &str) -> IResult<&str, Value> {
    let (input, neg) = opt(one_of("~-")).parse(input)?;
    let (input, digits) = digit1(input)?;
    let Ok(n) = digits.parse::<i64>() else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    };
    let n = if neg.is_some() { -n } else { n };
    Ok((input, Value::Integer(n)))
}

/// `#t` or `#f`, rejecting longer `#...` tokens so the reader can
/// report them as invalid boolean literals.
fn parse_boolean(input: &str) -> IResult<&str, Value> {
    let (rest, v) = alt((
        value(Value::Boolean(true), tag("#t")),
        value(Value::Boolean(false), tag("#f")),
    ))
    .parse(input)?;
    if rest.chars().next().is_some_and(is_symbol_char) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, v))
}

fn parse_symbol(input: &str) -> IResult<&str, Value> {
    match input.chars().next() {
        Some(c) if is_symbol_start(c) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::OneOf,
            )))
        }
    }
    let (rest, sym) = take_while1(is_symbol_char)(input)?;
    Ok((rest, Value::Symbol(sym.to_string())))
}

/// String literal with `\"`, `\\`, `\n`, `\t` escapes.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('"')(input)?;

    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('"')(input) {
        return Ok((input, Value::Str(String::new())));
    }

    let (input, content) = escaped(none_of("\"\\"), '\\', one_of("\"\\nt"))(input)?;
    let (input, _) = char('"')(input)?;

    let mut result = String::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    Ok((input, Value::Str(result)))
}

/// `'form` reads one following form and wraps it.
fn parse_quoted(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('\'')(input)?;
    let (input, form) = parse_form(input)?;
    Ok((input, Value::Quote(Box::new(form))))
}

fn parse_quasiquoted(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('`')(input)?;
    let (input, form) = parse_form(input)?;
    Ok((input, Value::Quasiquote(Box::new(form))))
}

/// `,form` or `,@form`.
fn parse_unquoted(input: &str) -> IResult<&str, Value> {
    let (input, _) = char(',')(input)?;
    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('@')(input) {
        let (input, form) = parse_form(input)?;
        Ok((input, Value::UnquoteSplicing(Box::new(form))))
    } else {
        let (input, form) = parse_form(input)?;
        Ok((input, Value::Unquote(Box::new(form))))
    }
}

/// `(form ...)` always builds a proper list; `()` is Nil.
fn parse_list(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('(')(input)?;
    let (input, _) = ws_and_comments(input)?;

    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = char::<_, nom::error::Error<_>>(')')(remaining) {
            return Ok((rest, Value::list_from_vec(items)));
        }
        let (rest, form) = parse_form(remaining)?;
        items.push(form);
        let (rest, _) = ws_and_comments(rest)?;
        remaining = rest;
    }
}

fn parse_form(input: &str) -> IResult<&str, Value> {
    let (input, _) = ws_and_comments(input)?;
    alt((
        parse_quoted,
        parse_quasiquoted,
        parse_unquoted,
        parse_list,
        parse_boolean,
        parse_integer,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}
