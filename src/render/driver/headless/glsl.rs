// glsl.rs - GLSL front-end for the headless driver
//
// A nom grammar for the GLSL ES 1.00 subset the pipeline's shaders use, plus
// the `in`/`out`/`layout` storage forms of later versions. Anything outside
// the grammar is a compile error with a driver-style info log. Global storage
// declarations are collected for linking and the `gl_Position` assignment in
// `main` is kept when it is a plain product of names.

use crate::render::driver::ShaderStage;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit0, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{cut, map, not, opt, peek, recognize, value, verify},
    error::{context, ContextError, ErrorKind, ParseError},
    multi::{many0, separated_list0},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Qualifier {
    Attribute,
    Uniform,
    VaryingOut,
    VaryingIn,
    FragmentOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Declaration {
    pub qualifier: Qualifier,
    pub ty: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub(super) struct CompiledStage {
    pub declarations: Vec<Declaration>,
    pub has_main: bool,
    /// Identifiers multiplied together in `gl_Position = ...`, left to right.
    /// `None` when the expression is not a plain product of names.
    pub position_factors: Option<Vec<String>>,
}

const TYPES: &[&str] = &[
    "void", "bool", "int", "float", "vec2", "vec3", "vec4", "bvec2", "bvec3", "bvec4", "ivec2",
    "ivec3", "ivec4", "mat2", "mat3", "mat4", "sampler2D", "samplerCube",
];

const KEYWORDS: &[&str] = &[
    "attribute", "uniform", "varying", "const", "in", "out", "inout", "layout", "precision",
    "lowp", "mediump", "highp", "invariant", "flat", "smooth", "centroid", "if", "else", "for",
    "while", "do", "return", "discard", "break", "continue", "struct", "true", "false",
];

const GENERIC: &str = "syntax error";

/// Where parsing stopped and why. Alternatives keep whichever got further.
#[derive(Debug, Clone, PartialEq)]
struct SyntaxError<'a> {
    input: &'a str,
    message: &'static str,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            message: GENERIC,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        if other.input.len() <= self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for SyntaxError<'a> {
    fn add_context(_input: &'a str, message: &'static str, other: Self) -> Self {
        if other.message == GENERIC {
            Self { message, ..other }
        } else {
            other
        }
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

#[derive(Debug, Clone, PartialEq)]
enum Expr<'a> {
    Name(&'a str),
    Product(Vec<&'a str>),
    Assign(&'a str, Box<Expr<'a>>),
    Other,
}

/// `name = value` statements reached while parsing a function body.
type Assignments<'a> = Vec<(&'a str, Expr<'a>)>;

enum External<'a> {
    Declarations(Vec<Declaration>),
    Function {
        name: &'a str,
        body: Option<Assignments<'a>>,
    },
    Other,
}

// Lexical layer

fn block_comment(input: &str) -> PResult<'_, &str> {
    recognize(preceded(
        tag("/*"),
        cut(context("unterminated comment", pair(take_until("*/"), tag("*/")))),
    ))(input)
}

/// Whitespace, comments and preprocessor lines.
fn trivia(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(tag("//"), not_line_ending)),
            block_comment,
            recognize(pair(char('#'), not_line_ending)),
        ))),
    )(input)
}

fn ws<'a, O, F>(parser: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(trivia, parser)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn number(input: &str) -> PResult<'_, &str> {
    terminated(
        recognize(pair(
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        )),
        not(satisfy(|c| c.is_ascii_alphanumeric() || c == '_')),
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    ws(verify(identifier, move |s: &str| s == word))
}

fn type_name(input: &str) -> PResult<'_, &str> {
    ws(verify(identifier, |s: &str| TYPES.contains(&s)))(input)
}

fn variable_name(input: &str) -> PResult<'_, &str> {
    ws(verify(identifier, |s: &str| {
        !TYPES.contains(&s) && !KEYWORDS.contains(&s)
    }))(input)
}

fn punct<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    ws(char(c))
}

/// `symbol`, unless the next character would make it a longer operator.
fn operator<'a>(
    symbol: &'static str,
    not_followed_by: &'static str,
) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    ws(terminated(
        tag(symbol),
        not(satisfy(move |c| not_followed_by.contains(c))),
    ))
}

fn semicolon(input: &str) -> PResult<'_, char> {
    context("syntax error: missing ';'", punct(';'))(input)
}

fn close_paren(input: &str) -> PResult<'_, char> {
    context("syntax error: missing ')'", punct(')'))(input)
}

fn precision_qualifier(input: &str) -> PResult<'_, &str> {
    alt((keyword("lowp"), keyword("mediump"), keyword("highp")))(input)
}

// Expressions

fn call_arguments(input: &str) -> PResult<'_, ()> {
    value(
        (),
        preceded(
            punct('('),
            cut(pair(separated_list0(punct(','), assignment_expression), close_paren)),
        ),
    )(input)
}

fn primary(input: &str) -> PResult<'_, Expr<'_>> {
    alt((
        map(ws(number), |_| Expr::Other),
        map(alt((keyword("true"), keyword("false"))), |_| Expr::Other),
        map(pair(alt((type_name, variable_name)), call_arguments), |_| Expr::Other),
        map(variable_name, Expr::Name),
        map(
            preceded(punct('('), cut(terminated(expression, close_paren))),
            |_| Expr::Other,
        ),
    ))(input)
}

fn postfix(input: &str) -> PResult<'_, Expr<'_>> {
    let (input, base) = primary(input)?;
    let (input, suffixes) = many0(alt((
        value(
            (),
            preceded(
                punct('['),
                cut(pair(expression, context("syntax error: missing ']'", punct(']')))),
            ),
        ),
        value((), preceded(punct('.'), cut(ws(identifier)))),
        value((), operator("++", "")),
        value((), operator("--", "")),
    )))(input)?;
    Ok((input, if suffixes.is_empty() { base } else { Expr::Other }))
}

fn unary(input: &str) -> PResult<'_, Expr<'_>> {
    alt((
        map(
            preceded(
                alt((
                    operator("++", ""),
                    operator("--", ""),
                    operator("+", "+="),
                    operator("-", "-="),
                    operator("!", "="),
                    operator("~", ""),
                )),
                cut(unary),
            ),
            |_| Expr::Other,
        ),
        postfix,
    ))(input)
}

type Operand = for<'a> fn(&'a str) -> PResult<'a, Expr<'a>>;
type Chain<'a> = (Expr<'a>, Vec<(&'a str, Expr<'a>)>);

/// One precedence level: `operand (op operand)*`. An operator commits to a
/// right-hand side.
fn binary_chain<'a>(
    input: &'a str,
    operators: &[(&'static str, &'static str)],
    operand: Operand,
) -> PResult<'a, Chain<'a>> {
    let (mut input, first) = operand(input)?;
    let mut rest = Vec::new();
    loop {
        let matched = operators
            .iter()
            .find_map(|&(symbol, guard)| operator(symbol, guard)(input).ok());
        let Some((after, symbol)) = matched else {
            break;
        };
        let (after, rhs) = cut(context("syntax error: operand expected", operand))(after)?;
        rest.push((symbol, rhs));
        input = after;
    }
    Ok((input, (first, rest)))
}

fn fold<'a>(result: PResult<'a, Chain<'a>>) -> PResult<'a, Expr<'a>> {
    result.map(|(input, (first, rest))| (input, if rest.is_empty() { first } else { Expr::Other }))
}

fn multiplicative(input: &str) -> PResult<'_, Expr<'_>> {
    let (input, (first, rest)) =
        binary_chain(input, &[("*", "="), ("/", "=*/"), ("%", "=")], unary)?;
    if rest.is_empty() {
        return Ok((input, first));
    }

    let mut names = Vec::new();
    let product = std::iter::once(("*", first))
        .chain(rest)
        .all(|factor| match factor {
            ("*", Expr::Name(name)) => {
                names.push(name);
                true
            }
            _ => false,
        });
    Ok((input, if product { Expr::Product(names) } else { Expr::Other }))
}

fn additive(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("+", "=+"), ("-", "=-")], multiplicative))
}

fn shift(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("<<", "="), (">>", "=")], additive))
}

fn relational(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(
        input,
        &[("<=", ""), (">=", ""), ("<", "<="), (">", ">=")],
        shift,
    ))
}

fn equality(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("==", ""), ("!=", "")], relational))
}

fn bit_and(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("&", "&=")], equality))
}

fn bit_xor(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("^", "^=")], bit_and))
}

fn bit_or(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("|", "|=")], bit_xor))
}

fn logical_and(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("&&", "")], bit_or))
}

fn logical_xor(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("^^", "")], logical_and))
}

fn logical_or(input: &str) -> PResult<'_, Expr<'_>> {
    fold(binary_chain(input, &[("||", "")], logical_xor))
}

fn conditional(input: &str) -> PResult<'_, Expr<'_>> {
    let (input, condition) = logical_or(input)?;
    match punct('?')(input) {
        Ok((input, _)) => {
            let (input, _) = cut(tuple((
                expression,
                context("syntax error: missing ':'", punct(':')),
                assignment_expression,
            )))(input)?;
            Ok((input, Expr::Other))
        }
        Err(_) => Ok((input, condition)),
    }
}

fn assignment_expression(input: &str) -> PResult<'_, Expr<'_>> {
    let assignment = map(
        tuple((
            unary,
            alt((
                operator("=", "="),
                operator("+=", ""),
                operator("-=", ""),
                operator("*=", ""),
                operator("/=", ""),
            )),
            cut(context("syntax error: expression expected", assignment_expression)),
        )),
        |(target, symbol, value)| match (target, symbol) {
            (Expr::Name(name), "=") => Expr::Assign(name, Box::new(value)),
            _ => Expr::Other,
        },
    );
    alt((assignment, conditional))(input)
}

fn expression(input: &str) -> PResult<'_, Expr<'_>> {
    let (input, first) = assignment_expression(input)?;
    let (input, rest) = many0(preceded(punct(','), cut(assignment_expression)))(input)?;
    Ok((input, if rest.is_empty() { first } else { Expr::Other }))
}

// Declarations

fn array_size(input: &str) -> PResult<'_, ()> {
    value(
        (),
        preceded(
            punct('['),
            cut(pair(conditional, context("syntax error: missing ']'", punct(']')))),
        ),
    )(input)
}

/// Everything after a declared name: `[n]` and `= value`.
fn declarator_suffix(input: &str) -> PResult<'_, ()> {
    value(
        (),
        pair(
            opt(array_size),
            opt(preceded(operator("=", "="), cut(assignment_expression))),
        ),
    )(input)
}

fn declarator(input: &str) -> PResult<'_, &str> {
    terminated(variable_name, declarator_suffix)(input)
}

fn remaining_declarators(input: &str) -> PResult<'_, Vec<&str>> {
    terminated(many0(preceded(punct(','), cut(declarator))), semicolon)(input)
}

/// `name [= value] (, name [= value])* ;` once the type is known.
fn declarators(input: &str) -> PResult<'_, Vec<&str>> {
    let (input, first) = declarator(input)?;
    let (input, mut names) = cut(remaining_declarators)(input)?;
    names.insert(0, first);
    Ok((input, names))
}

fn local_declaration(input: &str) -> PResult<'_, Vec<&str>> {
    preceded(
        tuple((opt(keyword("const")), opt(precision_qualifier), type_name)),
        declarators,
    )(input)
}

fn precision_statement(input: &str) -> PResult<'_, ()> {
    value(
        (),
        preceded(
            keyword("precision"),
            cut(tuple((precision_qualifier, type_name, semicolon))),
        ),
    )(input)
}

fn layout_qualifier(input: &str) -> PResult<'_, ()> {
    value(
        (),
        preceded(
            keyword("layout"),
            cut(tuple((
                punct('('),
                separated_list0(
                    punct(','),
                    pair(ws(identifier), opt(preceded(operator("=", "="), ws(number)))),
                ),
                close_paren,
            ))),
        ),
    )(input)
}

fn storage_declaration(stage: ShaderStage, input: &str) -> PResult<'_, Vec<Declaration>> {
    let (input, _) = opt(layout_qualifier)(input)?;
    let (input, _) = opt(alt((
        keyword("invariant"),
        keyword("flat"),
        keyword("smooth"),
        keyword("centroid"),
    )))(input)?;
    let (input, _) = trivia(input)?;
    let at = input;
    let (input, word) = alt((
        keyword("attribute"),
        keyword("uniform"),
        keyword("varying"),
        keyword("in"),
        keyword("out"),
        keyword("const"),
    ))(input)?;

    let qualifier = match (word, stage) {
        ("uniform", _) => Some(Qualifier::Uniform),
        ("attribute" | "in", ShaderStage::Vertex) => Some(Qualifier::Attribute),
        ("attribute", ShaderStage::Fragment) => {
            return Err(nom::Err::Failure(SyntaxError {
                input: at,
                message: "supported in vertex shaders only",
            }))
        }
        ("varying" | "out", ShaderStage::Vertex) => Some(Qualifier::VaryingOut),
        ("varying" | "in", ShaderStage::Fragment) => Some(Qualifier::VaryingIn),
        ("out", ShaderStage::Fragment) => Some(Qualifier::FragmentOut),
        _ => None,
    };

    let (input, (_, ty, names)) = cut(tuple((
        opt(precision_qualifier),
        context("syntax error: type expected", type_name),
        declarators,
    )))(input)?;

    let declarations = match qualifier {
        Some(qualifier) => names
            .into_iter()
            .map(|name| Declaration {
                qualifier,
                ty: ty.to_string(),
                name: name.to_string(),
            })
            .collect(),
        None => Vec::new(),
    };
    Ok((input, declarations))
}

fn parameter(input: &str) -> PResult<'_, ()> {
    value(
        (),
        tuple((
            opt(keyword("const")),
            opt(alt((keyword("in"), keyword("out"), keyword("inout")))),
            opt(precision_qualifier),
            type_name,
            opt(variable_name),
            opt(array_size),
        )),
    )(input)
}

fn parameters(input: &str) -> PResult<'_, ()> {
    alt((
        value((), terminated(keyword("void"), peek(punct(')')))),
        value((), separated_list0(punct(','), parameter)),
    ))(input)
}

/// Function prototype or definition, or a global without storage qualifier.
fn function_or_variable(input: &str) -> PResult<'_, External<'_>> {
    let (input, _) = opt(precision_qualifier)(input)?;
    let (input, _) = type_name(input)?;
    let (input, name) = variable_name(input)?;

    if let Ok((input, _)) = punct('(')(input) {
        let (input, _) = cut(terminated(parameters, close_paren))(input)?;
        let (input, body) = cut(alt((map(semicolon, |_| None), map(compound, Some))))(input)?;
        return Ok((input, External::Function { name, body }));
    }

    let (input, _) = cut(pair(declarator_suffix, remaining_declarators))(input)?;
    Ok((input, External::Other))
}

fn external_declaration(stage: ShaderStage, input: &str) -> PResult<'_, External<'_>> {
    alt((
        map(precision_statement, |_| External::Other),
        map(|i| storage_declaration(stage, i), External::Declarations),
        function_or_variable,
        map(punct(';'), |_| External::Other),
    ))(input)
}

// Statements

fn compound(input: &str) -> PResult<'_, Assignments<'_>> {
    let (mut input, _) = punct('{')(input)?;
    let mut assignments = Vec::new();
    loop {
        if let Ok((rest, _)) = punct('}')(input) {
            return Ok((rest, assignments));
        }
        let (rest, found) = cut(statement)(input)?;
        assignments.extend(found);
        input = rest;
    }
}

fn expression_statement(input: &str) -> PResult<'_, Assignments<'_>> {
    map(terminated(expression, cut(semicolon)), |expr| match expr {
        Expr::Assign(target, value) => vec![(target, *value)],
        _ => Vec::new(),
    })(input)
}

fn selection(input: &str) -> PResult<'_, Assignments<'_>> {
    let (input, _) = keyword("if")(input)?;
    let (input, (_, _, _, mut assignments)) =
        cut(tuple((punct('('), expression, close_paren, statement)))(input)?;
    let (input, otherwise) = opt(preceded(keyword("else"), cut(statement)))(input)?;
    assignments.extend(otherwise.into_iter().flatten());
    Ok((input, assignments))
}

fn for_loop(input: &str) -> PResult<'_, Assignments<'_>> {
    let (input, _) = keyword("for")(input)?;
    let (input, (_, _, _, _, _, _, body)) = cut(tuple((
        punct('('),
        alt((
            value((), local_declaration),
            value((), expression_statement),
            value((), punct(';')),
        )),
        opt(expression),
        semicolon,
        opt(expression),
        close_paren,
        statement,
    )))(input)?;
    Ok((input, body))
}

fn while_loop(input: &str) -> PResult<'_, Assignments<'_>> {
    let (input, _) = keyword("while")(input)?;
    let (input, (_, _, _, body)) =
        cut(tuple((punct('('), expression, close_paren, statement)))(input)?;
    Ok((input, body))
}

fn do_loop(input: &str) -> PResult<'_, Assignments<'_>> {
    let (input, _) = keyword("do")(input)?;
    let (input, (body, _, _, _, _, _)) = cut(tuple((
        statement,
        keyword("while"),
        punct('('),
        expression,
        close_paren,
        semicolon,
    )))(input)?;
    Ok((input, body))
}

fn statement(input: &str) -> PResult<'_, Assignments<'_>> {
    alt((
        compound,
        map(precision_statement, |_| Assignments::new()),
        map(local_declaration, |_| Assignments::new()),
        selection,
        for_loop,
        while_loop,
        do_loop,
        map(
            preceded(keyword("return"), cut(pair(opt(expression), semicolon))),
            |_| Assignments::new(),
        ),
        map(
            terminated(
                alt((keyword("discard"), keyword("break"), keyword("continue"))),
                cut(semicolon),
            ),
            |_| Assignments::new(),
        ),
        map(punct(';'), |_| Assignments::new()),
        expression_statement,
    ))(input)
}

// Driver entry point

fn info_log(source: &str, err: nom::Err<SyntaxError<'_>>) -> String {
    let error = match err {
        nom::Err::Error(error) | nom::Err::Failure(error) => error,
        nom::Err::Incomplete(_) => SyntaxError {
            input: "",
            message: GENERIC,
        },
    };
    let offset = source.len().saturating_sub(error.input.len());
    let line = source[..offset].matches('\n').count() + 1;

    let token: PResult<'_, &str> = alt((identifier, number, recognize(anychar)))(error.input);
    match token {
        Ok((_, token)) => format!("ERROR: 0:{}: '{}' : {}\n", line, token, error.message),
        Err(_) => format!("ERROR: 0:{}: '' : syntax error: unexpected end of file\n", line),
    }
}

fn position_factors(value: &Expr<'_>) -> Option<Vec<String>> {
    match value {
        Expr::Name(name) => Some(vec![name.to_string()]),
        Expr::Product(names) => Some(names.iter().map(|name| name.to_string()).collect()),
        _ => None,
    }
}

/// Compiles one stage; the error is the info log a driver would report.
pub(super) fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let mut compiled = CompiledStage::default();
    let mut input = source;

    loop {
        let (rest, _) = trivia(input).map_err(|err| info_log(source, err))?;
        if rest.is_empty() {
            break;
        }
        let (rest, external) =
            external_declaration(stage, rest).map_err(|err| info_log(source, err))?;

        match external {
            External::Declarations(declarations) => compiled.declarations.extend(declarations),
            External::Function {
                name: "main",
                body: Some(assignments),
            } => {
                compiled.has_main = true;
                if stage == ShaderStage::Vertex {
                    compiled.position_factors = assignments
                        .iter()
                        .find(|(target, _)| *target == "gl_Position")
                        .and_then(|(_, value)| position_factors(value));
                }
            }
            External::Function { .. } | External::Other => {}
        }
        input = rest;
    }

    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        uniform mat4 u_MVPMatrix;
        attribute vec4 a_Position;
        varying vec4 v_Color;
        // comment
        void main() {
            v_Color = vec4(1.0, 0.5, 0.0, 1.0);
            gl_Position = u_MVPMatrix * a_Position;
        }
    "#;

    #[test]
    fn test_declarations_are_collected() {
        let compiled = compile(ShaderStage::Vertex, VERTEX).unwrap();
        let names: Vec<_> = compiled
            .declarations
            .iter()
            .map(|d| (d.qualifier, d.name.as_str()))
            .collect();

        assert_eq!(
            names,
            vec![
                (Qualifier::Uniform, "u_MVPMatrix"),
                (Qualifier::Attribute, "a_Position"),
                (Qualifier::VaryingOut, "v_Color"),
            ]
        );
        assert!(compiled.has_main);
        assert_eq!(
            compiled.position_factors,
            Some(vec!["u_MVPMatrix".to_string(), "a_Position".to_string()])
        );
    }

    #[test]
    fn test_missing_semicolon_is_rejected() {
        let source = "void main() { gl_FragColor = vec4(1.0) }";
        let log = compile(ShaderStage::Fragment, source).unwrap_err();
        assert!(log.contains("missing ';'"), "{log}");
        assert!(log.starts_with("ERROR: 0:1: '}'"), "{log}");
    }

    #[test]
    fn test_unbalanced_braces_are_rejected() {
        let log = compile(ShaderStage::Fragment, "void main() { gl_FragColor = vec4(1.0);").unwrap_err();
        assert!(log.contains("unexpected end of file"), "{log}");
    }

    #[test]
    fn test_attribute_in_fragment_stage_is_rejected() {
        let log = compile(ShaderStage::Fragment, "attribute vec4 a;\nvoid main() {}").unwrap_err();
        assert!(log.starts_with("ERROR: 0:1: 'attribute'"), "{log}");
    }

    #[test]
    fn test_unexpected_character_reports_line() {
        let log = compile(ShaderStage::Vertex, "void main() {\n  gl_Position = @;\n}").unwrap_err();
        assert!(log.starts_with("ERROR: 0:2: '@'"), "{log}");
    }

    #[test]
    fn test_misspelled_qualifier_is_rejected() {
        let log = compile(
            ShaderStage::Vertex,
            "atribute vec4 a_Position;\nvoid main() { gl_Position = a_Position; }",
        )
        .unwrap_err();
        assert!(log.starts_with("ERROR: 0:1: 'atribute'"), "{log}");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let log = compile(ShaderStage::Vertex, "uniform vec5 u_Color;\nvoid main() {}").unwrap_err();
        assert!(log.starts_with("ERROR: 0:1: 'vec5'"), "{log}");
    }

    #[test]
    fn test_malformed_expressions_are_rejected() {
        let cases = [
            ("gl_Position = a_Position a_Position;", "a_Position"),
            ("gl_Position = * ;", "*"),
            ("gl_Position = a_Position +;", ";"),
            ("gl_Position = vec4(a_Position.xy, 0.0, 1.0;", ";"),
        ];

        for (body, token) in cases {
            let source = format!("attribute vec4 a_Position;\nvoid main() {{\n    {body}\n}}");
            let log = compile(ShaderStage::Vertex, &source).unwrap_err();
            assert!(log.starts_with(&format!("ERROR: 0:3: '{token}'")), "{body}: {log}");
        }
    }

    #[test]
    fn test_unterminated_comment_is_rejected() {
        let log = compile(ShaderStage::Vertex, "/* never closed\nvoid main() {}").unwrap_err();
        assert!(log.contains("unterminated comment"), "{log}");
    }

    #[test]
    fn test_preprocessor_and_precision_are_ignored() {
        let source = "#ifdef GL_ES\nprecision mediump float;\n#endif\nvarying vec4 v_Color;\nvoid main() { gl_FragColor = v_Color; }";
        let compiled = compile(ShaderStage::Fragment, source).unwrap();
        assert_eq!(compiled.declarations.len(), 1);
        assert_eq!(compiled.declarations[0].qualifier, Qualifier::VaryingIn);
    }

    #[test]
    fn test_control_flow_and_helpers_parse() {
        let source = r#"
            uniform mat4 u_MVPMatrix;
            attribute vec4 a_Position;
            varying vec4 v_Color;

            float brightness(in vec3 color) {
                return dot(color, vec3(0.299, 0.587, 0.114));
            }

            void main() {
                vec4 color = vec4(1.0), other;
                for (int i = 0; i < 3; i++) {
                    if (color[i] > 0.5 && !(i == 1)) {
                        color.rgb *= 0.5;
                    } else {
                        color.a = brightness(color.rgb) > 0.2 ? 1.0 : 0.0;
                    }
                }
                v_Color = color;
                gl_Position = u_MVPMatrix * a_Position;
            }
        "#;
        let compiled = compile(ShaderStage::Vertex, source).unwrap();
        assert!(compiled.has_main);
        assert_eq!(compiled.declarations.len(), 3);
        assert_eq!(
            compiled.position_factors,
            Some(vec!["u_MVPMatrix".to_string(), "a_Position".to_string()])
        );
    }

    #[test]
    fn test_non_product_position_is_not_evaluated() {
        let source = "attribute vec3 p;\nvoid main() { gl_Position = vec4(p, 1.0); }";
        let compiled = compile(ShaderStage::Vertex, source).unwrap();
        assert_eq!(compiled.position_factors, None);
    }
}
