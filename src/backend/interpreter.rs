//! SSA 解释器
//!
//! 直接执行程序映像中的函数。调用栈是显式的帧列表，
//! 深递归不会耗尽宿主线程的栈。

use std::collections::HashSet;
use std::io::{self, Write};

use tracing::{debug, trace};

use crate::codegen::ir::*;
use crate::error::{KsResult, runtime_error};
use crate::types::Scalar;
use super::eval::eval_pure;
use super::host;
use super::optimize::optimize_module;
use super::Backend;

/// 调用深度上限
pub const MAX_CALL_DEPTH: usize = 10_000;

struct Frame<'m> {
    function: &'m Function,
    values: Vec<Option<Constant>>,
    block: BlockId,
    pc: usize,
    /// 等待被调函数返回的结果值
    waiting: Option<ValueId>,
}

impl<'m> Frame<'m> {
    fn new(function: &'m Function, args: &[Constant]) -> Self {
        let mut values = vec![None; function.values.len()];
        for (slot, arg) in values.iter_mut().zip(args) {
            *slot = Some(*arg);
        }
        Self {
            function,
            values,
            block: BlockId(0),
            pc: 0,
            waiting: None,
        }
    }

    fn operand(&self, operand: &Operand) -> KsResult<Constant> {
        match operand {
            Operand::Const(c) => Ok(*c),
            Operand::Value(id) => self.values.get(id.0).copied().flatten().ok_or_else(|| {
                runtime_error(format!(
                    "Use of undefined value {} in '{}'",
                    id.0, self.function.name
                ))
            }),
        }
    }

    fn set(&mut self, id: ValueId, value: Constant) {
        if let Some(slot) = self.values.get_mut(id.0) {
            *slot = Some(value);
        }
    }

    /// 跳转到目标块，按来源块并行地给 phi 赋值
    fn enter_block(&mut self, target: BlockId) -> KsResult<()> {
        let from = self.block;
        let block = self
            .function
            .blocks
            .get(target.0)
            .ok_or_else(|| runtime_error(format!("Branch to missing block in '{}'", self.function.name)))?;

        let mut updates = Vec::new();
        let mut phi_count = 0;
        for inst in &block.insts {
            let InstKind::Phi { incoming } = &inst.kind else {
                break;
            };
            let (value, _) = incoming
                .iter()
                .find(|(_, pred)| *pred == from)
                .ok_or_else(|| {
                    runtime_error(format!(
                        "Phi in block '{}' has no value for its predecessor",
                        block.label
                    ))
                })?;
            updates.push((inst.result, self.operand(value)?));
            phi_count += 1;
        }
        for (id, value) in updates {
            self.set(id, value);
        }

        self.block = target;
        self.pc = phi_count;
        Ok(())
    }
}

/// 参考后端：解释执行 SSA
pub struct Interpreter {
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// 内置输出函数写入给定的输出
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self { output }
    }

    /// 检查从入口可达的所有外部声明都能解析到宿主符号
    fn link(&self, module: &Module, entry: &str) -> KsResult<()> {
        let mut visited = HashSet::new();
        let mut pending = vec![entry.to_string()];

        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(function) = module.get(&name) else {
                return Err(runtime_error(format!("unresolved external symbol '{}'", name)));
            };
            if function.is_declaration() {
                let symbol = host::lookup(&name).ok_or_else(|| {
                    runtime_error(format!("unresolved external symbol '{}'", name))
                })?;
                if symbol.arity() != function.arity() {
                    return Err(runtime_error(format!(
                        "External symbol '{}' expects {} arguments, declared with {}",
                        name,
                        symbol.arity(),
                        function.arity()
                    )));
                }
                continue;
            }
            for block in &function.blocks {
                for inst in &block.insts {
                    if let InstKind::Call { callee, .. } = &inst.kind {
                        pending.push(callee.clone());
                    }
                }
            }
        }
        trace!(entry, symbols = visited.len(), "linked");
        Ok(())
    }

    fn execute(&mut self, module: &Module, entry: &Function) -> KsResult<Constant> {
        let mut stack = vec![Frame::new(entry, &[])];

        loop {
            let depth = stack.len();
            let Some(frame) = stack.last_mut() else {
                return Err(runtime_error("Call stack underflow"));
            };
            let function = frame.function;
            let block = function.block(frame.block);

            if let Some(inst) = block.insts.get(frame.pc) {
                frame.pc += 1;
                match &inst.kind {
                    InstKind::Call { callee, args } => {
                        let args = args
                            .iter()
                            .map(|arg| frame.operand(arg))
                            .collect::<KsResult<Vec<_>>>()?;
                        let target = module.get(callee).ok_or_else(|| {
                            runtime_error(format!("unresolved external symbol '{}'", callee))
                        })?;

                        if target.is_declaration() {
                            let value = self.call_host(callee, &args)?;
                            frame.set(inst.result, value);
                            continue;
                        }

                        if depth >= MAX_CALL_DEPTH {
                            return Err(runtime_error(format!(
                                "stack overflow: call depth exceeded {} in '{}'",
                                MAX_CALL_DEPTH, callee
                            )));
                        }
                        frame.waiting = Some(inst.result);
                        stack.push(Frame::new(target, &args));
                    }
                    InstKind::Phi { .. } => {
                        return Err(runtime_error(format!(
                            "Phi after non-phi instruction in '{}'",
                            function.name
                        )));
                    }
                    kind => {
                        let operands = kind
                            .operands()
                            .iter()
                            .map(|op| frame.operand(op))
                            .collect::<KsResult<Vec<_>>>()?;
                        let value = eval_pure(kind, &operands).unwrap_or_else(|| {
                            Err(runtime_error("Instruction cannot be evaluated"))
                        })?;
                        frame.set(inst.result, value);
                    }
                }
                continue;
            }

            match &block.terminator {
                Some(Terminator::Br(target)) => frame.enter_block(*target)?,
                Some(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                }) => {
                    let target = if frame.operand(cond)?.is_zero() {
                        *else_block
                    } else {
                        *then_block
                    };
                    frame.enter_block(target)?;
                }
                Some(Terminator::Ret(value)) => {
                    let value = frame.operand(value)?;
                    stack.pop();
                    let Some(caller) = stack.last_mut() else {
                        return Ok(value);
                    };
                    if let Some(result) = caller.waiting.take() {
                        caller.set(result, value);
                    }
                }
                None => {
                    return Err(runtime_error(format!(
                        "Block '{}' in '{}' has no terminator",
                        block.label, function.name
                    )));
                }
            }
        }
    }

    fn call_host(&mut self, name: &str, args: &[Constant]) -> KsResult<Constant> {
        let symbol = host::lookup(name)
            .ok_or_else(|| runtime_error(format!("unresolved external symbol '{}'", name)))?;
        let args: Vec<f64> = args
            .iter()
            .map(|arg| match arg {
                Constant::Float(v) => *v,
                Constant::Int(v) => *v as f64,
                Constant::Bool(b) => *b as i64 as f64,
            })
            .collect();
        let value = symbol.call(&args, self.output.as_mut())?;
        Ok(Constant::Float(value))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn optimize(&mut self, module: &mut Module) {
        optimize_module(module);
    }

    fn run(&mut self, module: &Module, entry: &str) -> KsResult<Scalar> {
        self.link(module, entry)?;
        let function = module
            .get(entry)
            .ok_or_else(|| runtime_error(format!("unresolved external symbol '{}'", entry)))?;
        if function.arity() != 0 {
            return Err(runtime_error(format!(
                "Entry function '{}' must not take arguments",
                entry
            )));
        }

        debug!(entry, "executing");
        let result = self.execute(module, function)?;
        self.output
            .flush()
            .map_err(|err| crate::error::KsError::Io(err.to_string()))?;
        Ok(match result {
            Constant::Int(v) => Scalar::Int(v),
            Constant::Float(v) => Scalar::Float(v),
            Constant::Bool(b) => Scalar::Int(b as i64),
        })
    }
}
