//! 作用域栈符号表
//!
//! 类型解析和代码生成共用：函数入口重置，循环和 `var` 进入新作用域，
//! 退出时弹出作用域即可恢复被遮蔽的外层绑定。

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScopedSymbolTable<V> {
    scopes: Vec<HashMap<String, V>>,
}

impl<V: Clone> ScopedSymbolTable<V> {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// 进入新作用域
    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// 退出当前作用域，最外层作用域保留
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// 在当前作用域声明名字，遮蔽外层同名绑定
    pub fn declare(&mut self, name: impl Into<String>, value: V) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// 从内层到外层查找
    pub fn lookup(&self, name: &str) -> Option<&V> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// 重置（用于新函数）
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.scopes.push(HashMap::new());
    }
}

impl<V: Clone> Default for ScopedSymbolTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_and_restore() {
        let mut table = ScopedSymbolTable::new();
        table.declare("x", 1);
        table.enter_scope();
        table.declare("x", 2);
        table.declare("y", 3);
        assert_eq!(table.lookup("x"), Some(&2));
        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(&1));
        assert!(!table.contains("y"));
    }

    #[test]
    fn test_reset_and_outer_scope_kept() {
        let mut table = ScopedSymbolTable::new();
        table.declare("a", 1);
        table.exit_scope();
        assert_eq!(table.depth(), 1);
        assert!(table.contains("a"));
        table.reset();
        assert!(!table.contains("a"));
    }
}
