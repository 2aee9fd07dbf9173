//! 运算符优先级表
//!
//! 每个会话拥有一张表，`def binary`/`def unary` 在解析时写入，
//! 之后的所有解析单元都能看到新的运算符。

use std::collections::{HashMap, HashSet};

use tracing::trace;

/// 内置二元运算符及其优先级
pub const BUILTIN_BINARY: [(char, u32); 5] = [('<', 10), ('+', 20), ('-', 20), ('*', 40), ('/', 40)];

/// 内置一元运算符
pub const BUILTIN_UNARY: [char; 1] = ['-'];

/// 省略优先级时二元运算符的默认优先级
pub const DEFAULT_PRECEDENCE: u32 = 30;

pub const MAX_PRECEDENCE: u32 = 100;

/// 不能作为运算符使用的符号
pub const RESERVED_SYMBOLS: [char; 4] = ['(', ')', ',', ';'];

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorTable {
    binary: HashMap<char, u32>,
    unary: HashSet<char>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self {
            binary: BUILTIN_BINARY.iter().copied().collect(),
            unary: BUILTIN_UNARY.iter().copied().collect(),
        }
    }

    pub fn is_builtin_binary(op: char) -> bool {
        BUILTIN_BINARY.iter().any(|(c, _)| *c == op)
    }

    pub fn is_builtin_unary(op: char) -> bool {
        BUILTIN_UNARY.contains(&op)
    }

    pub fn is_reserved(op: char) -> bool {
        RESERVED_SYMBOLS.contains(&op)
    }

    /// 二元运算符的优先级，未声明时返回 None
    pub fn precedence(&self, op: char) -> Option<u32> {
        self.binary.get(&op).copied()
    }

    pub fn is_unary(&self, op: char) -> bool {
        self.unary.contains(&op)
    }

    /// 声明用户二元运算符，后写入者覆盖，返回之前的优先级
    pub fn declare_binary(&mut self, op: char, precedence: u32) -> Option<u32> {
        let previous = self.binary.insert(op, precedence);
        trace!(op = %op, precedence, ?previous, "binary operator declared");
        previous
    }

    /// 声明用户一元运算符，返回该符号此前是否已声明
    pub fn declare_unary(&mut self, op: char) -> bool {
        let existed = !self.unary.insert(op);
        trace!(op = %op, existed, "unary operator declared");
        existed
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}
