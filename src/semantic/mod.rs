//! 语义分析：数值类型解析

mod analyzer;
mod symbol_table;
mod typed;

pub use analyzer::{PARAM_TYPE, TypeResolver, check_type};
pub use symbol_table::ScopedSymbolTable;
pub use typed::{TypedExpr, TypedFunction, TypedItem, TypedKind};

use crate::ast::Item;
use crate::error::KsResult;

/// 解析单个顶层单元的类型
pub fn resolve(item: &Item) -> KsResult<TypedItem> {
    TypeResolver::new().resolve_item(item)
}
