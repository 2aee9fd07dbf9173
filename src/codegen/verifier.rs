//! 生成函数的结构检查

use std::collections::HashSet;

use crate::error::{KsResult, SourceLocation, codegen_error};
use super::ir::*;

/// 检查函数结构：
/// - 每个块都有终结指令，跳转目标存在
/// - phi 的入边块恰好是所在块的前驱
/// - 使用的值都在函数内定义
pub fn verify_function(function: &Function, loc: SourceLocation) -> KsResult<()> {
    if function.is_declaration() {
        return Ok(());
    }

    let fail = |message: String| {
        Err(codegen_error(
            loc,
            format!("Malformed function '{}': {}", function.name, message),
        ))
    };

    let mut defined: HashSet<ValueId> = (0..function.params.len()).map(ValueId).collect();
    for block in &function.blocks {
        for inst in &block.insts {
            if !defined.insert(inst.result) {
                return fail(format!("value {} defined twice", inst.result.0));
            }
        }
    }

    let preds = function.predecessors();
    for (index, block) in function.blocks.iter().enumerate() {
        let Some(term) = &block.terminator else {
            return fail(format!("block '{}' has no terminator", block.label));
        };
        for succ in term.successors() {
            if succ.0 >= function.blocks.len() {
                return fail(format!("block '{}' branches to a missing block", block.label));
            }
        }

        let mut seen_non_phi = false;
        for inst in &block.insts {
            if let InstKind::Phi { incoming } = &inst.kind {
                if seen_non_phi {
                    return fail(format!("phi not at the start of block '{}'", block.label));
                }
                let mut sources: Vec<BlockId> = incoming.iter().map(|(_, b)| *b).collect();
                sources.sort();
                let mut expected = preds[index].clone();
                expected.sort();
                if sources != expected {
                    return fail(format!(
                        "phi incoming blocks do not match predecessors of '{}'",
                        block.label
                    ));
                }
            } else {
                seen_non_phi = true;
            }

            for operand in inst.kind.operands() {
                if let Operand::Value(id) = operand {
                    if !defined.contains(&id) {
                        return fail(format!("use of undefined value {}", id.0));
                    }
                }
            }
        }

        let term_operand = match term {
            Terminator::CondBr { cond, .. } => Some(cond),
            Terminator::Ret(value) => Some(value),
            Terminator::Br(_) => None,
        };
        if let Some(Operand::Value(id)) = term_operand {
            if !defined.contains(id) {
                return fail(format!("use of undefined value {}", id.0));
            }
        }
    }

    Ok(())
}
