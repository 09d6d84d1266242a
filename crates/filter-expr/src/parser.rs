//! Filter expression parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and (("or" | "|") and)*
//! and     := not (("and" | "&") not)*
//! not     := ("not" | "~") not | cmp
//! cmp     := sum (cmpop sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | postfix
//! postfix := atom ("." ident)* ("[" int "]")?
//! atom    := number | string | True | False | ident | `quoted` | "(" or ")"
//! ```
//!
//! `&` and `|` share the precedence of `and` and `or`, so
//! `a == 1 & b > 0.9` groups as `(a == 1) & (b > 0.9)`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value, verify},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use tracing::trace;

use crate::ast::{BinaryOp, CompareOp, Expr, Literal, NameRef, UnaryOp};
use crate::error::{ExprError, Result};
use crate::tokens::TokenTable;

type PResult<'a, O> = IResult<&'a str, O>;

const KEYWORDS: &[&str] = &["and", "or", "not", "True", "False"];

/// Parse a filter expression.
///
/// Backtick-quoted names are mangled with `tokens` into plain identifiers.
pub fn parse(expr: &str, tokens: &TokenTable) -> Result<Expr> {
    let result = all_consuming(delimited(
        multispace0,
        |i| or_expr(i, tokens),
        multispace0,
    ))(expr);

    match result {
        Ok((_, parsed)) => {
            trace!(expr = %expr, ast = ?parsed, "Parsed filter expression");
            Ok(parsed)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = expr.len() - e.input.len();
            let message = if e.input.is_empty() {
                "unexpected end of expression".to_string()
            } else {
                let snippet: String = e.input.chars().take(20).collect();
                format!("unexpected input at position {}: '{}'", position, snippet)
            };
            Err(ExprError::Parse {
                expr: expr.to_string(),
                message,
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprError::Parse {
            expr: expr.to_string(),
            message: "incomplete expression".to_string(),
        }),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn symbol<'a>(s: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    delimited(multispace0, tag(s), multispace0)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    delimited(
        multispace0,
        terminated(tag(kw), not(satisfy(is_ident_char))),
        multispace0,
    )
}

fn identifier(i: &str) -> PResult<'_, &str> {
    verify(
        recognize(pair(satisfy(is_ident_start), take_while(is_ident_char))),
        |name: &str| !KEYWORDS.contains(&name),
    )(i)
}

/// Fold `operand (op operand)*` into a left-associative chain.
fn binary_chain<'a, P>(
    i: &'a str,
    tokens: &TokenTable,
    mut op: P,
    operand: fn(&'a str, &TokenTable) -> PResult<'a, Expr>,
) -> PResult<'a, Expr>
where
    P: FnMut(&'a str) -> PResult<'a, BinaryOp>,
{
    let (mut i, mut left) = operand(i, tokens)?;
    loop {
        match op(i) {
            Ok((rest, bin_op)) => {
                let (rest, right) = operand(rest, tokens)?;
                left = Expr::Binary(bin_op, Box::new(left), Box::new(right));
                i = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((i, left)),
            Err(e) => return Err(e),
        }
    }
}

fn or_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let op = alt((
        value(BinaryOp::Or, keyword("or")),
        value(BinaryOp::Or, symbol("|")),
    ));
    binary_chain(i, tokens, op, and_expr)
}

fn and_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let op = alt((
        value(BinaryOp::And, keyword("and")),
        value(BinaryOp::And, symbol("&")),
    ));
    binary_chain(i, tokens, op, not_expr)
}

fn not_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    if let Ok((rest, _)) = alt((keyword("not"), symbol("~")))(i) {
        let (rest, operand) = not_expr(rest, tokens)?;
        return Ok((rest, Expr::Unary(UnaryOp::Not, Box::new(operand))));
    }
    cmp_expr(i, tokens)
}

fn compare_op(i: &str) -> PResult<'_, CompareOp> {
    alt((
        value(CompareOp::Eq, symbol("==")),
        value(CompareOp::Ne, symbol("!=")),
        value(CompareOp::Le, symbol("<=")),
        value(CompareOp::Ge, symbol(">=")),
        value(CompareOp::Lt, symbol("<")),
        value(CompareOp::Gt, symbol(">")),
    ))(i)
}

fn cmp_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let (mut i, first) = sum_expr(i, tokens)?;
    let mut rest = Vec::new();
    loop {
        match compare_op(i) {
            Ok((after_op, op)) => {
                let (after, operand) = sum_expr(after_op, tokens)?;
                rest.push((op, operand));
                i = after;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    if rest.is_empty() {
        Ok((i, first))
    } else {
        Ok((
            i,
            Expr::Compare {
                first: Box::new(first),
                rest,
            },
        ))
    }
}

fn sum_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let op = alt((
        value(BinaryOp::Add, symbol("+")),
        value(BinaryOp::Sub, symbol("-")),
    ));
    binary_chain(i, tokens, op, product_expr)
}

fn product_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let op = alt((
        value(BinaryOp::Mul, symbol("*")),
        value(BinaryOp::Div, symbol("/")),
        value(BinaryOp::Mod, symbol("%")),
    ));
    binary_chain(i, tokens, op, unary_expr)
}

fn unary_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    if let Ok((rest, _)) = symbol("-")(i) {
        let (rest, operand) = unary_expr(rest, tokens)?;
        let negated = match operand {
            Expr::Literal(Literal::Int(v)) => Expr::Literal(Literal::Int(-v)),
            Expr::Literal(Literal::Float(v)) => Expr::Literal(Literal::Float(-v)),
            other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
        };
        return Ok((rest, negated));
    }
    postfix_expr(i, tokens)
}

fn postfix_expr<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    let (i, base) = atom(i, tokens)?;
    let mut path = match base {
        Expr::Name(NameRef { path, .. }) => path,
        other => return Ok((i, other)),
    };

    let (i, more) = many0(preceded(symbol("."), identifier))(i)?;
    path.extend(more.into_iter().map(str::to_string));
    let (i, index) = opt(delimited(symbol("["), signed_int, symbol("]")))(i)?;

    Ok((i, Expr::Name(NameRef { path, index })))
}

fn signed_int(i: &str) -> PResult<'_, i64> {
    let (rest, text) = recognize(pair(opt(char('-')), digit1))(i)?;
    match text.parse() {
        Ok(v) => Ok((rest, v)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn atom<'a>(i: &'a str, tokens: &TokenTable) -> PResult<'a, Expr> {
    delimited(
        multispace0,
        alt((
            map(value(true, keyword("True")), |b| Expr::Literal(Literal::Bool(b))),
            map(value(false, keyword("False")), |b| {
                Expr::Literal(Literal::Bool(b))
            }),
            map(string_literal, |s| Expr::Literal(Literal::Str(s.to_string()))),
            map(backtick_name, |name| {
                Expr::Name(NameRef::simple(tokens.sanitize(name)))
            }),
            delimited(symbol("("), |i| or_expr(i, tokens), symbol(")")),
            map(number, Expr::Literal),
            map(identifier, |name| Expr::Name(NameRef::simple(name))),
        )),
        multispace0,
    )(i)
}

fn string_literal(i: &str) -> PResult<'_, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    ))(i)
}

fn backtick_name(i: &str) -> PResult<'_, &str> {
    delimited(char('`'), take_while1(|c: char| c != '`'), char('`'))(i)
}

fn number(i: &str) -> PResult<'_, Literal> {
    let (rest, text) = recognize_float(i)?;
    let is_integer = text.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-');
    if is_integer {
        if let Ok(v) = text.parse::<i64>() {
            return Ok((rest, Literal::Int(v)));
        }
    }
    match text.parse::<f64>() {
        Ok(v) => Ok((rest, Literal::Float(v))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Float,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Expr {
        Expr::Name(NameRef::simple(s))
    }

    fn cmp(left: Expr, op: CompareOp, right: Expr) -> Expr {
        Expr::Compare {
            first: Box::new(left),
            rest: vec![(op, right)],
        }
    }

    #[test]
    fn test_simple_comparison() {
        let tokens = TokenTable::new();
        let expr = parse("sensitivity < 0.9", &tokens).unwrap();
        assert_eq!(
            expr,
            cmp(
                name("sensitivity"),
                CompareOp::Lt,
                Expr::Literal(Literal::Float(0.9))
            )
        );
    }

    #[test]
    fn test_ampersand_binds_like_and() {
        let tokens = TokenTable::new();
        let expr = parse("l2_quality_flag == 1 & sensitivity > 0.9", &tokens).unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::And,
                Box::new(cmp(
                    name("l2_quality_flag"),
                    CompareOp::Eq,
                    Expr::Literal(Literal::Int(1))
                )),
                Box::new(cmp(
                    name("sensitivity"),
                    CompareOp::Gt,
                    Expr::Literal(Literal::Float(0.9))
                )),
            )
        );
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let tokens = TokenTable::new();
        let expr = parse("a or b and c", &tokens).unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                Box::new(name("a")),
                Box::new(Expr::Binary(
                    BinaryOp::And,
                    Box::new(name("b")),
                    Box::new(name("c"))
                )),
            )
        );
    }

    #[test]
    fn test_dotted_and_indexed_names() {
        let tokens = TokenTable::new();
        let expr = parse("land_cover_data.landsat_treecover > 60.0", &tokens).unwrap();
        assert_eq!(
            expr.names(),
            vec![NameRef {
                path: vec!["land_cover_data".into(), "landsat_treecover".into()],
                index: None,
            }]
        );

        let expr = parse("xvar[-1] >= 10", &tokens).unwrap();
        assert_eq!(
            expr.names(),
            vec![NameRef {
                path: vec!["xvar".into()],
                index: Some(-1),
            }]
        );
    }

    #[test]
    fn test_backtick_name_is_mangled() {
        let tokens = TokenTable::new();
        let expr = parse("`land_cover_data/landsat_treecover` > 60.0", &tokens).unwrap();
        assert_eq!(
            expr.names(),
            vec![NameRef::simple(
                "BACKTICK_QUOTED_STRING_land_cover_data_SLASH_landsat_treecover"
            )]
        );
    }

    #[test]
    fn test_keywords_need_boundaries() {
        let tokens = TokenTable::new();
        let expr = parse("notable == order", &tokens).unwrap();
        assert_eq!(expr.names(), vec![NameRef::simple("notable"), NameRef::simple("order")]);
    }

    #[test]
    fn test_negative_literals_and_arithmetic() {
        let tokens = TokenTable::new();
        let expr = parse("lat > -1.5 * 2", &tokens).unwrap();
        assert_eq!(
            expr,
            cmp(
                name("lat"),
                CompareOp::Gt,
                Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(Literal::Float(-1.5))),
                    Box::new(Expr::Literal(Literal::Int(2)))
                )
            )
        );
    }

    #[test]
    fn test_chained_comparison() {
        let tokens = TokenTable::new();
        let expr = parse("0 < x <= 10", &tokens).unwrap();
        match expr {
            Expr::Compare { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("expected comparison chain, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_expressions() {
        let tokens = TokenTable::new();
        for bad in ["", "a >", "(a > 1", "a > 1 )", "a === 1", "and", "`unterminated"] {
            assert!(
                matches!(parse(bad, &tokens), Err(ExprError::Parse { .. })),
                "expected parse error for {:?}",
                bad
            );
        }
    }
}
