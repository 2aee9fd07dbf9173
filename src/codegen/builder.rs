//! 函数构建器
//!
//! 持有正在生成的函数和当前插入块。降级一个分支可能打开新的块，
//! 所以调用方在连接 phi 之前要用 `current_block()` 取得分支真正结束的块。

use super::ir::*;
use super::types::IrType;

pub struct FunctionBuilder {
    function: Function,
    current: BlockId,
    label_counter: usize,
}

impl FunctionBuilder {
    /// 创建带 `entry` 块的函数
    pub fn new(name: &str, params: Vec<String>, ret: IrType) -> Self {
        let mut function = Function::declaration(name, params, ret);
        function.blocks.push(Block::new("entry"));
        Self {
            function,
            current: BlockId(0),
            label_counter: 0,
        }
    }

    /// 追加新块，标签按提示加序号保证唯一
    pub fn append_block(&mut self, hint: &str) -> BlockId {
        self.label_counter += 1;
        let label = format!("{}{}", hint, self.label_counter);
        self.function.blocks.push(Block::new(label));
        BlockId(self.function.blocks.len() - 1)
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn param(&self, index: usize) -> Operand {
        Operand::Value(self.function.param_value(index))
    }

    pub fn operand_type(&self, operand: &Operand) -> IrType {
        self.function.operand_type(operand).unwrap_or(IrType::F64)
    }

    /// 在当前块末尾追加指令，返回结果值
    pub fn build(&mut self, kind: InstKind, ty: IrType, hint: &str) -> Operand {
        Operand::Value(self.push(kind, ty, hint))
    }

    fn push(&mut self, kind: InstKind, ty: IrType, hint: &str) -> ValueId {
        let result = ValueId(self.function.values.len());
        self.function.values.push(ValueInfo {
            name: hint.to_string(),
            ty,
        });
        self.function.blocks[self.current.0].insts.push(Instruction { result, ty, kind });
        result
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, hint: &str) -> Operand {
        let ty = self.operand_type(&lhs);
        self.build(InstKind::Binary { op, lhs, rhs }, ty, hint)
    }

    pub fn cmp(&mut self, pred: CmpPred, lhs: Operand, rhs: Operand, hint: &str) -> Operand {
        self.build(InstKind::Cmp { pred, lhs, rhs }, IrType::I1, hint)
    }

    pub fn neg(&mut self, value: Operand, hint: &str) -> Operand {
        let ty = self.operand_type(&value);
        self.build(InstKind::Neg(value), ty, hint)
    }

    pub fn cast(&mut self, kind: CastKind, value: Operand, ty: IrType, hint: &str) -> Operand {
        self.build(InstKind::Cast { kind, value }, ty, hint)
    }

    pub fn call(&mut self, callee: &str, args: Vec<Operand>, ret: IrType, hint: &str) -> Operand {
        self.build(
            InstKind::Call {
                callee: callee.to_string(),
                args,
            },
            ret,
            hint,
        )
    }

    /// 创建空的 phi，入边之后用 `add_incoming` 补充
    pub fn phi(&mut self, ty: IrType, hint: &str) -> ValueId {
        self.push(InstKind::Phi { incoming: Vec::new() }, ty, hint)
    }

    pub fn add_incoming(&mut self, phi: ValueId, value: Operand, block: BlockId) {
        for block_data in &mut self.function.blocks {
            for inst in &mut block_data.insts {
                if inst.result == phi {
                    if let InstKind::Phi { incoming } = &mut inst.kind {
                        incoming.push((value, block));
                    }
                    return;
                }
            }
        }
    }

    /// 结束当前块，已经结束的块保持不变
    pub fn terminate(&mut self, term: Terminator) {
        let block = &mut self.function.blocks[self.current.0];
        if block.terminator.is_none() {
            block.terminator = Some(term);
        }
    }

    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, cond: Operand, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Operand) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn finish(self) -> Function {
        self.function
    }
}
