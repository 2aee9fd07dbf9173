//! 顶层单元解析：函数定义、外部声明、顶层表达式

use crate::ast::*;
use crate::error::KsResult;
use crate::lexer::Token;
use super::Parser;
use super::expressions::parse_expression;
use super::operators::{DEFAULT_PRECEDENCE, MAX_PRECEDENCE, OperatorTable};

/// 解析 `def prototype body`
pub fn parse_definition(parser: &mut Parser) -> KsResult<Item> {
    parser.consume(&Token::Def, "'def'")?;
    let proto = parse_prototype(parser)?;
    let body = parse_expression(parser)?;
    Ok(Item::Function(Function {
        proto,
        body,
        is_anonymous: false,
    }))
}

/// 解析 `extern prototype`
pub fn parse_extern(parser: &mut Parser) -> KsResult<Item> {
    parser.consume(&Token::Extern, "'extern'")?;
    Ok(Item::Extern(parse_prototype(parser)?))
}

/// 把顶层表达式包装成无参数的匿名函数
pub fn parse_top_level_expression(parser: &mut Parser) -> KsResult<Item> {
    let loc = parser.current_loc();
    let body = parse_expression(parser)?;
    Ok(Item::Function(Function {
        proto: Prototype {
            name: ANON_FUNCTION_NAME.to_string(),
            params: Vec::new(),
            operator_kind: None,
            precedence: None,
            loc,
        },
        body,
        is_anonymous: true,
    }))
}

/// 解析原型：
/// - `name(a b)`
/// - `unary op (a)`
/// - `binary op [precedence] (a b)`
///
/// 二元运算符的优先级在原型解析完成时写入运算符表，
/// 因此函数体和后续单元都能使用该运算符。
pub fn parse_prototype(parser: &mut Parser) -> KsResult<Prototype> {
    let loc = parser.current_loc();

    let (name, operator_kind, precedence) = match parser.current_token().clone() {
        Token::Identifier(name) => {
            // 匿名包装函数的名字只能由顶层表达式使用
            if name == ANON_FUNCTION_NAME {
                return Err(parser.error(&format!("Reserved function name '{}'", name)));
            }
            parser.advance();
            (name, None, None)
        }
        Token::Unary => {
            parser.advance();
            let op = parse_operator_symbol(parser, OperatorKind::Unary)?;
            (operator_function_name(OperatorKind::Unary, op), Some(OperatorKind::Unary), None)
        }
        Token::Binary => {
            parser.advance();
            let op = parse_operator_symbol(parser, OperatorKind::Binary)?;
            let precedence = parse_precedence(parser)?;
            (
                operator_function_name(OperatorKind::Binary, op),
                Some(OperatorKind::Binary),
                Some(precedence),
            )
        }
        _ => return Err(parser.expected("function name in prototype")),
    };

    parser.consume_operator('(')?;
    let mut params = Vec::new();
    loop {
        match parser.current_token() {
            Token::Identifier(param) => {
                params.push(param.clone());
                parser.advance();
                // 参数之间的逗号可有可无
                parser.match_operator(',');
            }
            _ => break,
        }
    }
    if !parser.match_operator(')') {
        return Err(parser.expected("')' in prototype"));
    }

    if let Some(kind) = operator_kind {
        if params.len() != kind.arity() {
            return Err(parser.error(&format!(
                "Invalid number of operands for {} operator: expected {}, found {}",
                kind,
                kind.arity(),
                params.len()
            )));
        }
    }

    let proto = Prototype {
        name,
        params,
        operator_kind,
        precedence,
        loc,
    };
    register_operator(parser, &proto);
    Ok(proto)
}

fn parse_operator_symbol(parser: &mut Parser, kind: OperatorKind) -> KsResult<char> {
    let op = match parser.current_token() {
        Token::Operator(op) if !OperatorTable::is_reserved(*op) => *op,
        _ => return Err(parser.expected(&format!("{} operator symbol", kind))),
    };
    let builtin = match kind {
        OperatorKind::Unary => OperatorTable::is_builtin_unary(op),
        OperatorKind::Binary => OperatorTable::is_builtin_binary(op),
    };
    if builtin {
        return Err(parser.error(&format!("Cannot redefine built-in operator '{}'", op)));
    }
    parser.advance();
    Ok(op)
}

fn parse_precedence(parser: &mut Parser) -> KsResult<u32> {
    let text = match parser.current_token() {
        Token::Number(text) => text.clone(),
        _ => return Ok(DEFAULT_PRECEDENCE),
    };
    match text.parse::<u32>() {
        Ok(value) if (1..=MAX_PRECEDENCE).contains(&value) => {
            parser.advance();
            Ok(value)
        }
        _ => Err(parser.error(&format!(
            "Invalid precedence '{}': must be between 1 and {}",
            text, MAX_PRECEDENCE
        ))),
    }
}

fn register_operator(parser: &mut Parser, proto: &Prototype) {
    let Some(op) = proto.operator_symbol() else {
        return;
    };
    match proto.operator_kind {
        Some(OperatorKind::Binary) => {
            parser
                .operators_mut()
                .declare_binary(op, proto.precedence.unwrap_or(DEFAULT_PRECEDENCE));
        }
        Some(OperatorKind::Unary) => {
            parser.operators_mut().declare_unary(op);
        }
        None => {}
    }
}
