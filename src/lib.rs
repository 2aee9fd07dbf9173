pub mod error;
pub mod types;
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod codegen;
pub mod backend;
pub mod evaluator;

pub use error::{KsError, KsResult};
pub use evaluator::{EvalOptions, Evaluator};
pub use types::Scalar;

use tracing_subscriber::{EnvFilter, fmt};

/// 安装日志订阅器，默认只输出警告，可用 `RUST_LOG` 覆盖
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
