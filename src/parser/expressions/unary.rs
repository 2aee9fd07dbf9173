//! 一元表达式解析
//!
//! 前缀运算符比任何二元运算符结合得更紧，在进入优先级爬升之前解析。

use crate::ast::*;
use crate::error::KsResult;
use crate::lexer::Token;
use super::super::Parser;
use super::super::operators::OperatorTable;
use super::parse_primary;

/// 解析一元表达式
pub fn parse_unary(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();

    let op = match parser.current_token() {
        Token::Operator(op) if *op != '(' => *op,
        _ => return parse_primary(parser),
    };

    if OperatorTable::is_reserved(op) {
        return Err(parser.expected("expression"));
    }
    if !parser.operators().is_unary(op) {
        return Err(parser.error(&format!("Unknown unary operator '{}'", op)));
    }

    parser.advance();
    let operand = parse_unary(parser)?;
    Ok(Expr::Unary(UnaryExpr {
        op,
        operand: Box::new(operand),
        loc,
    }))
}
