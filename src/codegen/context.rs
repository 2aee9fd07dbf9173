//! 代码生成上下文和状态管理
use crate::semantic::ScopedSymbolTable;
use super::builder::FunctionBuilder;
use super::ir::{Module, Operand};
use super::runtime;

/// 当前正在生成的函数
pub struct FunctionContext {
    pub builder: FunctionBuilder,
    /// 变量名到 SSA 值的映射，循环和 `var` 进入新作用域
    pub symbols: ScopedSymbolTable<Operand>,
}

impl FunctionContext {
    pub fn new(builder: FunctionBuilder) -> Self {
        Self {
            builder,
            symbols: ScopedSymbolTable::new(),
        }
    }
}

/// SSA 代码生成器
///
/// 跨多个输入单元持有同一个程序映像；每个单元失败时映像回到该单元之前的状态。
pub struct CodeGenerator {
    pub module: Module,
}

impl CodeGenerator {
    pub fn new() -> Self {
        let mut module = Module::new();
        runtime::declare_builtins(&mut module);
        Self { module }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
