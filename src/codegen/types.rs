//! IR 类型
use std::fmt;

use crate::types::NumType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    /// 比较结果
    I1,
    I64,
    F64,
}

impl IrType {
    pub fn is_float(&self) -> bool {
        matches!(self, IrType::F64)
    }
}

impl From<NumType> for IrType {
    fn from(ty: NumType) -> Self {
        match ty {
            NumType::Int => IrType::I64,
            NumType::Float => IrType::F64,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => write!(f, "i1"),
            IrType::I64 => write!(f, "i64"),
            IrType::F64 => write!(f, "double"),
        }
    }
}
