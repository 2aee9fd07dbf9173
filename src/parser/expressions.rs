//! 表达式解析
//!
//! 二元表达式使用优先级爬升：从最小优先级 0 开始，
//! 只要当前运算符的优先级不低于下限就消费它，右侧以“优先级 + 1”递归，
//! 从而得到左结合。优先级全部来自会话的运算符表。

mod postfix;
mod unary;

use crate::ast::*;
use crate::error::KsResult;
use crate::lexer::Token;
use super::Parser;
use super::operators::OperatorTable;

pub use unary::parse_unary;

/// 解析表达式（入口点）
pub fn parse_expression(parser: &mut Parser) -> KsResult<Expr> {
    parse_binary(parser, 0)
}

/// 以 `min_precedence` 为下限解析二元表达式链
pub fn parse_binary(parser: &mut Parser, min_precedence: u32) -> KsResult<Expr> {
    let mut left = parse_unary(parser)?;

    loop {
        let Some((op, precedence)) = peek_binary_operator(parser)? else {
            break;
        };
        if precedence < min_precedence {
            break;
        }
        let loc = parser.current_loc();
        parser.advance();
        let right = parse_binary(parser, precedence + 1)?;
        left = Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            loc,
        });
    }

    Ok(left)
}

/// 查看当前令牌是否是二元运算符
///
/// 保留符号（`)`、`,`、`;`、`(`）、非运算符令牌和已声明的一元运算符结束表达式，
/// 一元运算符由下一个单元开头消费；两张表中都没有的符号是错误。
fn peek_binary_operator(parser: &Parser) -> KsResult<Option<(char, u32)>> {
    let op = match parser.current_token() {
        Token::Operator(op) => *op,
        _ => return Ok(None),
    };
    if OperatorTable::is_reserved(op) {
        return Ok(None);
    }
    match parser.operators().precedence(op) {
        Some(precedence) => Ok(Some((op, precedence))),
        None if parser.operators().is_unary(op) => Ok(None),
        None => Err(parser.error(&format!("Unknown binary operator '{}'", op))),
    }
}

/// 解析基本表达式
pub fn parse_primary(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();

    match parser.current_token().clone() {
        Token::Number(text) => {
            parser.advance();
            Ok(Expr::Number(NumberLit { text, loc }))
        }
        Token::Identifier(_) => postfix::parse_identifier_expression(parser),
        Token::Operator('(') => {
            parser.advance();
            let expr = parse_expression(parser)?;
            parser.consume_operator(')')?;
            Ok(expr)
        }
        Token::If => parse_if(parser),
        Token::For => parse_for(parser),
        Token::Var => parse_var(parser),
        _ => Err(parser.expected("expression")),
    }
}

/// `if cond then a else b`
fn parse_if(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();
    parser.consume(&Token::If, "'if'")?;
    let condition = parse_expression(parser)?;
    parser.consume(&Token::Then, "'then' after if condition")?;
    let then_branch = parse_expression(parser)?;
    parser.consume(&Token::Else, "'else' after then branch")?;
    let else_branch = parse_expression(parser)?;

    Ok(Expr::If(IfExpr {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch),
        loc,
    }))
}

/// `for x = start, end [, step] in body`
fn parse_for(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();
    parser.consume(&Token::For, "'for'")?;
    let var_name = parser.consume_identifier("identifier after for")?;
    if !parser.match_operator('=') {
        return Err(parser.expected("'=' after for variable"));
    }
    let start = parse_expression(parser)?;
    if !parser.match_operator(',') {
        return Err(parser.expected("',' after for start value"));
    }
    let end = parse_expression(parser)?;

    let step = if parser.match_operator(',') {
        Some(Box::new(parse_expression(parser)?))
    } else {
        None
    };

    parser.consume(&Token::In, "'in' after for")?;
    let body = parse_expression(parser)?;

    Ok(Expr::For(ForExpr {
        var_name,
        start: Box::new(start),
        end: Box::new(end),
        step,
        body: Box::new(body),
        loc,
    }))
}

/// `var a = 1, b in body`
fn parse_var(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();
    parser.consume(&Token::Var, "'var'")?;

    let mut bindings = Vec::new();
    loop {
        let binding_loc = parser.current_loc();
        let name = parser.consume_identifier("identifier after var")?;
        let init = if parser.match_operator('=') {
            Some(parse_expression(parser)?)
        } else {
            None
        };
        bindings.push(VarBinding {
            name,
            init,
            loc: binding_loc,
        });
        if !parser.match_operator(',') {
            break;
        }
    }

    parser.consume(&Token::In, "'in' after var bindings")?;
    let body = parse_expression(parser)?;

    Ok(Expr::VarIn(VarInExpr {
        bindings,
        body: Box::new(body),
        loc,
    }))
}
