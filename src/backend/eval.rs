//! 纯指令的求值规则，解释器和常量折叠共用

use crate::codegen::ir::{BinaryOp, CastKind, CmpPred, Constant, InstKind};
use crate::error::{KsResult, runtime_error};

pub fn eval_binary(op: BinaryOp, lhs: Constant, rhs: Constant) -> KsResult<Constant> {
    match (lhs, rhs) {
        (Constant::Int(a), Constant::Int(b)) => {
            let value = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(runtime_error("Integer division by zero"));
                    }
                    a.wrapping_div(b)
                }
            };
            Ok(Constant::Int(value))
        }
        (Constant::Float(a), Constant::Float(b)) => {
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            };
            Ok(Constant::Float(value))
        }
        _ => Err(operand_mismatch(lhs, rhs)),
    }
}

pub fn eval_cmp(pred: CmpPred, lhs: Constant, rhs: Constant) -> KsResult<Constant> {
    let result = match (lhs, rhs) {
        (Constant::Int(a), Constant::Int(b)) => match pred {
            CmpPred::Lt => a < b,
            CmpPred::Ne => a != b,
        },
        // ult 在无序时为真，one 在无序时为假
        (Constant::Float(a), Constant::Float(b)) => match pred {
            CmpPred::Lt => a.is_nan() || b.is_nan() || a < b,
            CmpPred::Ne => !a.is_nan() && !b.is_nan() && a != b,
        },
        (Constant::Bool(a), Constant::Bool(b)) => match pred {
            CmpPred::Lt => !a & b,
            CmpPred::Ne => a != b,
        },
        _ => return Err(operand_mismatch(lhs, rhs)),
    };
    Ok(Constant::Bool(result))
}

pub fn eval_neg(value: Constant) -> KsResult<Constant> {
    match value {
        Constant::Int(v) => Ok(Constant::Int(v.wrapping_neg())),
        Constant::Float(v) => Ok(Constant::Float(-v)),
        Constant::Bool(_) => Err(runtime_error("Cannot negate a boolean value")),
    }
}

pub fn eval_cast(kind: CastKind, value: Constant) -> KsResult<Constant> {
    match (kind, value) {
        (CastKind::SiToFp, Constant::Int(v)) => Ok(Constant::Float(v as f64)),
        (CastKind::UiToFp, Constant::Bool(b)) => Ok(Constant::Float(if b { 1.0 } else { 0.0 })),
        (CastKind::ZExt, Constant::Bool(b)) => Ok(Constant::Int(b as i64)),
        _ => Err(runtime_error(format!(
            "Invalid {} of {}",
            kind.mnemonic(),
            value.ty()
        ))),
    }
}

/// 求值纯指令，操作数已经解析为常量；调用和 phi 返回 `None`
pub fn eval_pure(kind: &InstKind, operands: &[Constant]) -> Option<KsResult<Constant>> {
    let result = match (kind, operands) {
        (InstKind::Binary { op, .. }, [lhs, rhs]) => eval_binary(*op, *lhs, *rhs),
        (InstKind::Cmp { pred, .. }, [lhs, rhs]) => eval_cmp(*pred, *lhs, *rhs),
        (InstKind::Neg(_), [value]) => eval_neg(*value),
        (InstKind::Cast { kind, .. }, [value]) => eval_cast(*kind, *value),
        _ => return None,
    };
    Some(result)
}

fn operand_mismatch(lhs: Constant, rhs: Constant) -> crate::error::KsError {
    runtime_error(format!(
        "Operand type mismatch: {} and {}",
        lhs.ty(),
        rhs.ty()
    ))
}
