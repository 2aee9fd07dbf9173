//! SSA 代码生成器
//!
//! 把带类型的顶层单元逐个降级到同一个程序映像中。

mod builder;
mod context;
mod control_flow;
mod expressions;
mod generator;
pub mod ir;
mod runtime;
mod types;
mod verifier;

pub use builder::FunctionBuilder;
pub use context::CodeGenerator;
pub use runtime::BUILTINS;
pub use types::IrType;
pub use verifier::verify_function;
