//! BibTeX / biblatex source parser using nom.
//!
//! Handles the subset of the format that both biblatex sources and
//! `biber --tool` output use:
//! - `@string` definitions (expanded in later field values)
//! - `@preamble` declarations
//! - `@comment{...}` and `@comment(...)` sections (dropped)
//! - Entries delimited by braces or parentheses
//! - Braced, quoted, numeric and macro field values joined with `#`
//!
//! Text between blocks is skipped, including `@` signs that do not open a
//! block (e-mail addresses in `%` comments, for instance).

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, one_of},
    combinator::{map, peek},
    error::{ErrorKind, ParseError as NomParseError},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use thiserror::Error;

use crate::entry::{Bibliography, Entry, Field};

/// Errors that can occur while parsing bibliography text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected {expected}")]
    Expected { line: usize, expected: &'static str },

    #[error("line {line}: unexpected end of input inside {context}")]
    UnexpectedEof { line: usize, context: &'static str },

    #[error("line {line}: entry has an empty citation key")]
    EmptyKey { line: usize },
}

/// Month macros BibTeX predefines.
const MONTH_MACROS: &[(&str, &str)] = &[
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// Where and why a parser stopped. `at` is always a suffix of the source
/// text, so the line number can be recovered from its length.
#[derive(Debug, Clone, PartialEq)]
struct Failure<'a> {
    at: &'a str,
    problem: Problem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Problem {
    Syntax,
    Expected(&'static str),
    Eof(&'static str),
    EmptyKey,
}

impl<'a> NomParseError<&'a str> for Failure<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Failure {
            at: input,
            problem: Problem::Syntax,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, O> = IResult<&'a str, O, Failure<'a>>;

/// Parses bibliography text into a [`Bibliography`].
///
/// # Errors
///
/// Returns a [`ParseError`] carrying the 1-based line number of the first
/// malformed block. No recovery is attempted inside a block.
///
/// # Examples
///
/// ```
/// use biblatex2bibtex::parse_bibliography;
///
/// let bib = parse_bibliography("@book{knuth84, title = {The {\\TeX}book}}").unwrap();
/// assert_eq!(bib.entries[0].get("title"), Some("The {\\TeX}book"));
/// ```
pub fn parse_bibliography(input: &str) -> Result<Bibliography, ParseError> {
    let mut bib = Bibliography::default();
    let mut remaining = input;

    while let Some(offset) = remaining.find('@') {
        let at = &remaining[offset..];
        remaining = match command(at) {
            Ok((rest, kind)) => block(rest, &kind, &mut bib).map_err(|e| to_parse_error(input, e))?,
            // not followed by `{` or `(`: free text
            Err(nom::Err::Error(_)) => &at[1..],
            Err(e) => return Err(to_parse_error(input, e)),
        };
    }

    Ok(bib)
}

/// `@type` up to, but not including, the opening delimiter.
fn command(input: &str) -> PResult<'_, String> {
    let (rest, kind) = delimited(
        pair(char('@'), multispace0),
        take_while1(is_ident_char),
        multispace0,
    )(input)?;
    let (rest, _) = peek(one_of("{("))(rest)?;
    Ok((rest, kind.to_lowercase()))
}

/// Parses the delimited body of one block into `bib` and returns the text
/// after it.
fn block<'a>(
    input: &'a str,
    kind: &str,
    bib: &mut Bibliography,
) -> Result<&'a str, nom::Err<Failure<'a>>> {
    if kind == "comment" {
        let (rest, _) = alt((
            balanced('{', '}', "@comment"),
            balanced('(', ')', "@comment"),
        ))(input)?;
        return Ok(rest);
    }

    let (rest, delimiter) = open_block(input)?;
    let rest = match kind {
        "preamble" => {
            let (rest, text) = value(rest, &bib.strings)?;
            bib.preambles.push(text);
            rest
        }
        "string" => {
            let (rest, (name, text)) = string_definition(rest, &bib.strings)?;
            define_string(&mut bib.strings, name.to_string(), text);
            rest
        }
        _ => {
            let (rest, entry) = entry_body(rest, kind, delimiter, &bib.strings)?;
            bib.entries.push(entry);
            rest
        }
    };
    let (rest, _) = close_block(rest, delimiter)?;
    Ok(rest)
}

/// Consumes `{` or `(` and returns the matching closing delimiter.
fn open_block(input: &str) -> PResult<'_, char> {
    let (rest, open) = one_of("{(")(input)?;
    Ok((rest, if open == '{' { '}' } else { ')' }))
}

fn close_block(input: &str, delimiter: char) -> PResult<'_, char> {
    let expected = if delimiter == '}' { "'}'" } else { "')'" };
    preceded(multispace0, expect(expected, char(delimiter)))(input)
}

fn define_string(strings: &mut Vec<(String, String)>, name: String, value: String) {
    match strings
        .iter_mut()
        .find(|(n, _)| n.eq_ignore_ascii_case(&name))
    {
        Some(slot) => slot.1 = value,
        None => strings.push((name, value)),
    }
}

fn string_definition<'a>(
    input: &'a str,
    strings: &[(String, String)],
) -> PResult<'a, (&'a str, String)> {
    let (rest, name) = preceded(multispace0, expect("macro name", take_while1(is_ident_char)))(input)?;
    let (rest, _) = preceded(multispace0, expect("'=' after macro name", char('=')))(rest)?;
    let (rest, text) = value(rest, strings)?;
    Ok((rest, (name, text)))
}

fn entry_body<'a>(
    input: &'a str,
    kind: &str,
    delimiter: char,
    strings: &[(String, String)],
) -> PResult<'a, Entry> {
    let (rest, _) = multispace0(input)?;
    let (rest, key) =
        take_while(|c: char| c != ',' && c != delimiter && !c.is_whitespace())(rest)?;
    if key.is_empty() {
        return fail(rest, Problem::EmptyKey);
    }

    let mut entry = Entry::new(kind, key);
    let mut remaining = rest;
    loop {
        let (rest, _) = multispace0(remaining)?;
        match rest.chars().next() {
            None => return fail(rest, Problem::Eof("entry")),
            Some(c) if c == delimiter => return Ok((rest, entry)),
            Some(',') => remaining = &rest[1..],
            Some(_) => {
                let (rest, (name, value)) = field(rest, strings)?;
                entry.fields.retain(|f| f.name != name);
                entry.fields.push(Field {
                    name: name.to_string(),
                    value,
                });
                remaining = rest;
            }
        }
    }
}

/// `name = value`
fn field<'a>(input: &'a str, strings: &[(String, String)]) -> PResult<'a, (&'a str, String)> {
    let (rest, name) = expect("field name", take_while1(is_field_name_char))(input)?;
    let (rest, _) = preceded(multispace0, expect("'=' after field name", char('=')))(rest)?;
    let (rest, value) = value(rest, strings)?;
    Ok((rest, (name, value)))
}

/// Parses a value made of one or more parts joined by `#`.
fn value<'a>(input: &'a str, strings: &[(String, String)]) -> PResult<'a, String> {
    let mut result = String::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        if rest.is_empty() {
            return fail(rest, Problem::Eof("field value"));
        }

        let (rest, part) = expect(
            "field value",
            alt((
                map(braced, |b: &str| b[1..b.len() - 1].to_string()),
                map(quoted, |q: &str| q.to_string()),
                map(take_while1(|c: char| c.is_ascii_digit()), |d: &str| {
                    d.to_string()
                }),
                map(take_while1(is_ident_char), |name: &str| {
                    resolve_macro(name, strings)
                }),
            )),
        )(rest)?;
        result.push_str(&part);

        let (rest, _) = multispace0(rest)?;
        match rest.strip_prefix('#') {
            Some(after) => remaining = after,
            None => return Ok((rest, result)),
        }
    }
}

/// Takes a balanced `{...}` group, braces included.
fn braced(input: &str) -> PResult<'_, &str> {
    balanced('{', '}', "braced value")(input)
}

/// Takes a group from `open` to its matching `close`, delimiters included.
/// Once `open` is seen, running out of input is a failure at the group's
/// start.
fn balanced<'a>(
    open: char,
    close: char,
    context: &'static str,
) -> impl Fn(&'a str) -> PResult<'a, &'a str> {
    move |input: &'a str| {
        char::<&'a str, Failure<'a>>(open)(input)?;

        let mut depth = 0usize;
        for (i, c) in input.char_indices() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..i + 1]));
                }
            }
        }
        fail(input, Problem::Eof(context))
    }
}

/// Takes a `"..."` value and returns its contents. Quotes nested inside
/// braces do not terminate the value.
fn quoted(input: &str) -> PResult<'_, &str> {
    let (body, _) = char('"')(input)?;
    let mut depth = 0usize;

    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 => return Ok((&body[i + 1..], &body[..i])),
            _ => {}
        }
    }
    fail(input, Problem::Eof("quoted value"))
}

/// Commits to `parser`: a recoverable error becomes a failure naming what
/// was expected at that position.
fn expect<'a, O, P>(what: &'static str, mut parser: P) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    P: Parser<&'a str, O, Failure<'a>>,
{
    move |input: &'a str| {
        parser.parse(input).map_err(|e| match e {
            nom::Err::Error(_) => nom::Err::Failure(Failure {
                at: input,
                problem: Problem::Expected(what),
            }),
            other => other,
        })
    }
}

fn fail<O>(at: &str, problem: Problem) -> PResult<'_, O> {
    Err(nom::Err::Failure(Failure { at, problem }))
}

fn to_parse_error(source: &str, err: nom::Err<Failure<'_>>) -> ParseError {
    let failure = match err {
        nom::Err::Error(f) | nom::Err::Failure(f) => f,
        nom::Err::Incomplete(_) => {
            return ParseError::UnexpectedEof {
                line: line_of(source, ""),
                context: "input",
            }
        }
    };

    let line = line_of(source, failure.at);
    match failure.problem {
        Problem::Syntax => ParseError::Expected {
            line,
            expected: "valid syntax",
        },
        Problem::Expected(expected) => ParseError::Expected { line, expected },
        Problem::Eof(context) => ParseError::UnexpectedEof { line, context },
        Problem::EmptyKey => ParseError::EmptyKey { line },
    }
}

/// 1-based line number at which `rest`, a suffix of `source`, begins.
fn line_of(source: &str, rest: &str) -> usize {
    source[..source.len() - rest.len()].matches('\n').count() + 1
}

/// Unknown macros are kept verbatim rather than rejected.
fn resolve_macro(name: &str, strings: &[(String, String)]) -> String {
    strings
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .or_else(|| {
            MONTH_MACROS
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.to_string())
        })
        .unwrap_or_else(|| name.to_string())
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || "_-:.+/'".contains(c)
}

fn is_field_name_char(c: char) -> bool {
    c.is_alphanumeric() || "_-:.+".contains(c)
}
