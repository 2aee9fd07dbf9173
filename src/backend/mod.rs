//! 执行后端
//!
//! 代码生成器只产出 SSA 映像，后端负责优化和执行。

mod eval;
mod host;
mod interpreter;
mod optimize;

pub use interpreter::{Interpreter, MAX_CALL_DEPTH};
pub use optimize::{OptStats, optimize_function, optimize_module};

use crate::codegen::ir::Module;
use crate::error::KsResult;
use crate::types::Scalar;

/// 消费 SSA 映像的后端
pub trait Backend {
    /// 优化映像；调用方传入的是副本，持久映像不受影响
    fn optimize(&mut self, module: &mut Module);

    /// 链接并执行 `entry`，返回它的标量结果
    fn run(&mut self, module: &Module, entry: &str) -> KsResult<Scalar>;
}
