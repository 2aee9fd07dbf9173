//! 语法分析器
//!
//! 递归下降处理结构化形式，优先级爬升处理表达式链。
//! 每次产出一个顶层单元（`def`、`extern` 或包装成匿名函数的表达式），
//! 使驱动器可以在两个单元之间完成代码生成。

mod definitions;
mod expressions;
pub mod operators;

use crate::ast::Item;
use crate::error::{KsError, KsResult, SourceLocation, parser_error};
use crate::lexer::{Token, TokenWithLocation};

pub use operators::OperatorTable;

/// 语法分析器
pub struct Parser<'t> {
    /// 令牌流
    pub tokens: Vec<TokenWithLocation>,
    /// 当前解析位置
    pub pos: usize,
    /// 会话共享的运算符优先级表
    operators: &'t mut OperatorTable,
    /// 出错后停止产出单元
    failed: bool,
}

impl<'t> Parser<'t> {
    /// 创建新的语法分析器
    pub fn new(tokens: Vec<TokenWithLocation>, operators: &'t mut OperatorTable) -> Self {
        Self {
            tokens,
            pos: 0,
            operators,
            failed: false,
        }
    }

    pub fn operators(&self) -> &OperatorTable {
        &*self.operators
    }

    pub fn operators_mut(&mut self) -> &mut OperatorTable {
        &mut *self.operators
    }

    /// 解析下一个顶层单元，输入结束或已出错时返回 None
    pub fn next_item(&mut self) -> Option<KsResult<Item>> {
        if self.failed {
            return None;
        }

        // 顶层的 ';' 只是单元分隔符
        while self.check_operator(';') {
            self.advance();
        }
        if self.is_at_end() {
            return None;
        }

        let result = match self.current_token() {
            Token::Def => definitions::parse_definition(self),
            Token::Extern => definitions::parse_extern(self),
            _ => definitions::parse_top_level_expression(self),
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    /// 解析全部单元，遇到第一个错误即返回
    pub fn parse_all(&mut self) -> KsResult<Vec<Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item() {
            items.push(item?);
        }
        Ok(items)
    }

    // 辅助方法
    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn current_token(&self) -> &Token {
        // 令牌流总以 Eof 结尾
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.tokens
            .get(index)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_loc(&self) -> SourceLocation {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.tokens.get(index).map(|t| t.loc).unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.current_token() == token
    }

    fn check_operator(&self, op: char) -> bool {
        self.current_token().is_operator(op)
    }

    fn match_operator(&mut self, op: char) -> bool {
        if self.check_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, token: &Token, expected: &str) -> KsResult<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn consume_operator(&mut self, op: char) -> KsResult<()> {
        if self.match_operator(op) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{}'", op)))
        }
    }

    fn consume_identifier(&mut self, expected: &str) -> KsResult<String> {
        match self.current_token() {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected(expected)),
        }
    }

    /// 报告“期望 X，实际是 Y”
    fn expected(&self, expected: &str) -> KsError {
        self.error(&format!("Expected {}, found '{}'", expected, self.current_token()))
    }

    fn error(&self, message: &str) -> KsError {
        parser_error(self.current_loc(), message)
    }
}

/// 用给定的运算符表解析整段源码
pub fn parse(tokens: Vec<TokenWithLocation>, operators: &mut OperatorTable) -> KsResult<Vec<Item>> {
    let mut parser = Parser::new(tokens, operators);
    parser.parse_all()
}

impl Iterator for Parser<'_> {
    type Item = KsResult<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use expect_test::expect;

    fn parse_source(source: &str, table: &mut OperatorTable) -> KsResult<Vec<Item>> {
        parse(lex(source)?, table)
    }

    fn dump_one(source: &str) -> String {
        let mut table = OperatorTable::new();
        let items = parse_source(source, &mut table).unwrap();
        assert_eq!(items.len(), 1);
        items[0].dump()
    }

    #[test]
    fn test_precedence_climbing() {
        let expected = expect![[r#"
            Function true
              Prototype __anon_expr []
              Binary +
                Number 3
                Binary *
                  Number 3
                  Number 4"#]];
        expected.assert_eq(&dump_one("3+3*4"));
    }

    #[test]
    fn test_left_associativity() {
        let mut table = OperatorTable::new();
        let items = parse_source("a - b - c", &mut table).unwrap();
        assert_eq!(items[0].to_string(), "((a - b) - c)");
    }

    #[test]
    fn test_function_with_if() {
        let expected = expect![[r#"
            Function false
              Prototype foo [a b]
              Binary *
                Variable a
                If
                  Binary <
                    Variable a
                    Variable b
                  Binary +
                    Variable a
                    Number 1
                  Binary +
                    Variable b
                    Number 1"#]];
        expected.assert_eq(&dump_one("def foo(a b) a * if a < b then a + 1 else b + 1"));
    }

    #[test]
    fn test_for_and_var() {
        let expected = expect![[r#"
            Function false
              Prototype oddlessthan [n]
              For x
                Number 1.0
                Binary <
                  Variable x
                  Variable n
                Binary +
                  Variable x
                  Number 2
                Variable x"#]];
        expected.assert_eq(&dump_one("def oddlessthan(n) for x = 1.0, x < n, x + 2 in x"));

        let expected = expect![[r#"
            Function true
              Prototype __anon_expr []
              VarIn
                Binding a
                  Number 1
                Binding b
                  None
                Binary +
                  Variable a
                  Variable b"#]];
        expected.assert_eq(&dump_one("var a = 1, b in a + b"));
    }

    #[test]
    fn test_extern_and_call() {
        let expected = expect![[r#"
            Extern
              Prototype ceil [x]"#]];
        expected.assert_eq(&dump_one("extern ceil(x)"));
        assert_eq!(dump_one("f()"), "Function true\n  Prototype __anon_expr []\n  Call f []");
    }

    #[test]
    fn test_binary_definition_updates_table() {
        let mut table = OperatorTable::new();
        let items = parse_source("def binary % 5 (a b) a - b\n10 % 5 * 2", &mut table).unwrap();
        assert_eq!(table.precedence('%'), Some(5));
        // '%' 的优先级低于 '*'
        assert_eq!(items[1].to_string(), "(10 % (5 * 2))");
        assert_eq!(items[0].prototype().name, "binary%");
        assert_eq!(items[0].to_string(), "def binary % 5(a b) (a - b)");
    }

    #[test]
    fn test_default_precedence_and_unary() {
        let mut table = OperatorTable::new();
        let items = parse_source("def unary!(a) 0 - a\ndef binary |(a b) a\n!a | b + c", &mut table).unwrap();
        assert_eq!(table.precedence('|'), Some(30));
        assert!(table.is_unary('!'));
        // '|' 的默认优先级 30 高于 '+'
        assert_eq!(items[2].to_string(), "((!a | b) + c)");
    }

    #[test]
    fn test_unary_operator_starts_next_unit() {
        let mut table = OperatorTable::new();
        let items = parse_source("def unary!(a) 0 - a\n!10\n3", &mut table).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].to_string(), "def unary !(a) (0 - a)");
        assert_eq!(items[1].to_string(), "!10");
        assert!(items[1].is_anonymous());

        let err = parse_source("1 @ 2", &mut table).unwrap_err();
        assert_eq!(err.message(), "Unknown binary operator '@'");
    }

    #[test]
    fn test_multiple_units_and_separators() {
        let mut table = OperatorTable::new();
        let items = parse_source("def f(x) x; f(1); 2", &mut table).unwrap();
        assert_eq!(items.len(), 3);
        assert!(!items[0].is_anonymous());
        assert!(items[1].is_anonymous());
    }

    #[test]
    fn test_round_trip_through_canonical_source() {
        let mut table = OperatorTable::new();
        let source = "def binary ~ 15 (x y) x\ndef g(a b) var t = a ~ b in for i = 0, i < t, i + 1 in if i < 2 then -i else g(i, t)";
        let first = parse_source(source, &mut table).unwrap();
        let printed: Vec<String> = first.iter().map(|i| i.to_string()).collect();
        let second = parse_source(&printed.join("\n"), &mut table).unwrap();
        let first_dumps: Vec<String> = first.iter().map(Item::dump).collect();
        let second_dumps: Vec<String> = second.iter().map(Item::dump).collect();
        assert_eq!(first_dumps, second_dumps);
    }

    #[test]
    fn test_undeclared_operators() {
        let mut table = OperatorTable::new();
        let err = parse_source("10 % 5", &mut table).unwrap_err();
        assert_eq!(err, parser_error(SourceLocation::new(1, 4), "Unknown binary operator '%'"));

        let err = parse_source("!10", &mut table).unwrap_err();
        assert_eq!(err, parser_error(SourceLocation::new(1, 1), "Unknown unary operator '!'"));
    }

    #[test]
    fn test_malformed_constructs() {
        let mut table = OperatorTable::new();
        let err = parse_source("f(1, 2", &mut table).unwrap_err();
        assert_eq!(err, parser_error(SourceLocation::new(1, 7), "Expected ',' or ')' in argument list, found 'end of input'"));

        let err = parse_source("for x = 1, x < 3 x", &mut table).unwrap_err();
        assert_eq!(err, parser_error(SourceLocation::new(1, 18), "Expected 'in' after for, found 'x'"));

        let err = parse_source("def (x) x", &mut table).unwrap_err();
        assert!(err.message().starts_with("Expected function name in prototype"));
    }

    #[test]
    fn test_builtin_operators_cannot_be_redefined() {
        let mut table = OperatorTable::new();
        let err = parse_source("def binary + (a b) a", &mut table).unwrap_err();
        assert_eq!(err.message(), "Cannot redefine built-in operator '+'");
        let err = parse_source("def unary - (a) a", &mut table).unwrap_err();
        assert_eq!(err.message(), "Cannot redefine built-in operator '-'");
        let err = parse_source("def binary % (a) a", &mut table).unwrap_err();
        assert_eq!(err.message(), "Invalid number of operands for binary operator: expected 2, found 1");
        let err = parse_source("def binary % 0 (a b) a", &mut table).unwrap_err();
        assert_eq!(err.message(), "Invalid precedence '0': must be between 1 and 100");
    }

    #[test]
    fn test_wrapper_name_reserved() {
        let mut table = OperatorTable::new();
        let err = parse_source("def __anon_expr() 7", &mut table).unwrap_err();
        assert_eq!(err, parser_error(SourceLocation::new(1, 5), "Reserved function name '__anon_expr'"));
        let err = parse_source("extern __anon_expr()", &mut table).unwrap_err();
        assert_eq!(err.message(), "Reserved function name '__anon_expr'");
    }

    #[test]
    fn test_parser_stops_after_error() {
        let mut table = OperatorTable::new();
        let mut parser = Parser::new(lex("def f(x) x\n)\n3").unwrap(), &mut table);
        assert!(parser.next_item().unwrap().is_ok());
        assert!(parser.next_item().unwrap().is_err());
        assert!(parser.next_item().is_none());
    }
}
