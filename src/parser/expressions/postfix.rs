//! 标识符表达式解析
//!
//! 标识符后紧跟 `(` 时是函数调用，否则是变量引用。

use crate::ast::*;
use crate::error::KsResult;
use super::super::Parser;
use super::parse_expression;

/// 解析变量引用或函数调用
pub fn parse_identifier_expression(parser: &mut Parser) -> KsResult<Expr> {
    let loc = parser.current_loc();
    let name = parser.consume_identifier("identifier")?;

    if !parser.match_operator('(') {
        return Ok(Expr::Variable(VariableExpr { name, loc }));
    }

    let args = parse_arguments(parser)?;
    Ok(Expr::Call(CallExpr {
        callee: name,
        args,
        loc,
    }))
}

/// 解析参数列表（左括号已消费），包括右括号
pub fn parse_arguments(parser: &mut Parser) -> KsResult<Vec<Expr>> {
    let mut args = Vec::new();

    if parser.match_operator(')') {
        return Ok(args);
    }

    loop {
        args.push(parse_expression(parser)?);
        if parser.match_operator(')') {
            break;
        }
        if !parser.match_operator(',') {
            return Err(parser.expected("',' or ')' in argument list"));
        }
    }

    Ok(args)
}
