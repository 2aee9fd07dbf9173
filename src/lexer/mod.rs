//! 词法分析器
//!
//! 把源码切分为带位置的令牌流，以单个 `Eof` 令牌结尾。

use std::fmt;
use std::ops::Range;

use logos::Logos;
use crate::error::{KsResult, lexer_error};
use crate::error::SourceLocation;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // 关键字
    #[token("def")]
    Def,
    #[token("extern")]
    Extern,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("binary")]
    Binary,
    #[token("unary")]
    Unary,
    #[token("var")]
    Var,

    // 标识符
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // 数字字面量保留原文，类型由类型解析阶段决定
    #[regex(r"[0-9]+(\.[0-9]*)?|\.[0-9]+", |lex| lex.slice().to_string())]
    Number(String),

    // 任意单个符号字符，包括括号和逗号
    #[regex(r"[^ \t\r\f\n0-9a-zA-Z_.#]", |lex| lex.slice().chars().next())]
    Operator(char),

    #[token("\n")]
    Newline,

    Eof,
}

impl Token {
    pub fn is_operator(&self, op: char) -> bool {
        matches!(self, Token::Operator(c) if *c == op)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::Extern => write!(f, "extern"),
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Binary => write!(f, "binary"),
            Token::Unary => write!(f, "unary"),
            Token::Var => write!(f, "var"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Number(text) => write!(f, "{}", text),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Newline => write!(f, "newline"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenWithLocation {
    pub token: Token,
    pub loc: SourceLocation,
    pub span: Range<usize>,
}

pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            line: 1,
            line_start: 0,
        }
    }

    fn location_of(&self, offset: usize) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.source[self.line_start..offset].chars().count() + 1,
        }
    }

    pub fn tokenize(&mut self) -> KsResult<Vec<TokenWithLocation>> {
        let mut tokens = Vec::new();

        while let Some(token_result) = self.inner.next() {
            let span = self.inner.span();
            match token_result {
                Ok(Token::Newline) => {
                    // 换行只用于行号跟踪，不进入令牌流
                    self.line += 1;
                    self.line_start = span.end;
                }
                Ok(token) => {
                    let loc = self.location_of(span.start);
                    tokens.push(TokenWithLocation { token, loc, span });
                }
                Err(_) => {
                    let loc = self.location_of(span.start);
                    return Err(lexer_error(
                        loc.line,
                        loc.column,
                        format!("Unexpected character: '{}'", &self.source[span]),
                    ));
                }
            }
        }

        let end = self.source.len();
        tokens.push(TokenWithLocation {
            token: Token::Eof,
            loc: self.location_of(end),
            span: end..end,
        });

        Ok(tokens)
    }
}

pub fn lex(source: &str) -> KsResult<Vec<TokenWithLocation>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("def define extern in inner"),
            vec![
                Token::Def,
                Token::Identifier("define".to_string()),
                Token::Extern,
                Token::In,
                Token::Identifier("inner".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_keep_lexeme() {
        assert_eq!(
            kinds("42 5.5 1. .25"),
            vec![
                Token::Number("42".to_string()),
                Token::Number("5.5".to_string()),
                Token::Number("1.".to_string()),
                Token::Number(".25".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_operators_are_single_chars() {
        assert_eq!(
            kinds("!^10"),
            vec![
                Token::Operator('!'),
                Token::Operator('^'),
                Token::Number("10".to_string()),
                Token::Eof,
            ]
        );
        assert_eq!(
            kinds("binary%(a b)"),
            vec![
                Token::Binary,
                Token::Operator('%'),
                Token::Operator('('),
                Token::Identifier("a".to_string()),
                Token::Identifier("b".to_string()),
                Token::Operator(')'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = lex("# comment\n  foo(x)\nbar").unwrap();
        assert_eq!(tokens[0].token, Token::Identifier("foo".to_string()));
        assert_eq!(tokens[0].loc, SourceLocation::new(2, 3));
        assert_eq!(tokens[0].span, 12..15);
        assert_eq!(tokens[4].token, Token::Identifier("bar".to_string()));
        assert_eq!(tokens[4].loc, SourceLocation::new(3, 1));
        assert_eq!(tokens[5].token, Token::Eof);
        assert_eq!(tokens[5].loc, SourceLocation::new(3, 4));
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex("1 + .").unwrap_err();
        assert_eq!(err, lexer_error(1, 5, "Unexpected character: '.'"));
    }
}
