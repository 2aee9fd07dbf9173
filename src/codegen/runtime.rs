//! 运行时内置函数声明
use super::ir::{Function, Module};
use super::types::IrType;

/// 每个会话映像预先声明的单参数内置函数
pub const BUILTINS: &[&str] = &["putchard", "printd"];

/// 把内置函数作为声明放入映像，由后端在执行前解析
pub fn declare_builtins(module: &mut Module) {
    for name in BUILTINS {
        module.insert(Function::declaration(*name, vec!["x".to_string()], IrType::F64));
    }
}
