//! 映像优化
//!
//! 只在映像副本上运行。每个函数重复以下几步直到不再变化：
//! 常量折叠、平凡 phi 消除、常量条件分支折叠、死指令删除。

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::codegen::ir::*;
use super::eval::eval_pure;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptStats {
    pub folded: usize,
    pub phis: usize,
    pub branches: usize,
    pub dead: usize,
}

impl OptStats {
    fn changed(&self) -> bool {
        self.folded + self.phis + self.branches + self.dead > 0
    }

    fn add(&mut self, other: OptStats) {
        self.folded += other.folded;
        self.phis += other.phis;
        self.branches += other.branches;
        self.dead += other.dead;
    }
}

pub fn optimize_module(module: &mut Module) -> OptStats {
    let mut total = OptStats::default();
    for function in module.functions_mut() {
        if function.is_declaration() {
            continue;
        }
        let stats = optimize_function(function);
        trace!(
            function = %function.name,
            folded = stats.folded,
            phis = stats.phis,
            branches = stats.branches,
            dead = stats.dead,
            "optimised"
        );
        total.add(stats);
    }
    total
}

pub fn optimize_function(function: &mut Function) -> OptStats {
    let mut total = OptStats::default();
    loop {
        let mut round = OptStats::default();
        let mut replacements = HashMap::new();

        round.folded = fold_constants(function, &mut replacements);
        round.branches = fold_branches(function);
        prune_unreachable_incoming(function);
        round.phis = remove_trivial_phis(function, &mut replacements);
        replace_uses(function, &replacements);
        round.dead = remove_dead_instructions(function);

        if !round.changed() {
            return total;
        }
        total.add(round);
    }
}

fn resolve(replacements: &HashMap<ValueId, Operand>, operand: Operand) -> Operand {
    let mut current = operand;
    while let Operand::Value(id) = current {
        match replacements.get(&id) {
            Some(next) => current = *next,
            None => break,
        }
    }
    current
}

/// 把所有操作数都是常量的纯指令替换为常量
fn fold_constants(function: &mut Function, replacements: &mut HashMap<ValueId, Operand>) -> usize {
    let mut folded = 0;
    for block in &mut function.blocks {
        block.insts.retain(|inst| {
            if matches!(inst.kind, InstKind::Phi { .. }) || !inst.kind.is_pure() {
                return true;
            }
            let operands: Option<Vec<Constant>> = inst
                .kind
                .operands()
                .into_iter()
                .map(|op| resolve(replacements, op).as_const())
                .collect();
            let Some(operands) = operands else {
                return true;
            };
            // 求值出错（如整数除零）的指令留到运行时报告
            match eval_pure(&inst.kind, &operands) {
                Some(Ok(value)) => {
                    replacements.insert(inst.result, Operand::Const(value));
                    folded += 1;
                    false
                }
                _ => true,
            }
        });
    }
    if folded > 0 {
        replace_uses(function, replacements);
    }
    folded
}

/// 条件为常量的分支改为无条件跳转，并删掉未走分支目标中对应的 phi 入边
fn fold_branches(function: &mut Function) -> usize {
    let mut removed_edges = Vec::new();
    for (index, block) in function.blocks.iter_mut().enumerate() {
        let Some(Terminator::CondBr {
            cond: Operand::Const(cond),
            then_block,
            else_block,
        }) = block.terminator.clone()
        else {
            continue;
        };
        let (taken, dropped) = if cond.is_zero() {
            (else_block, then_block)
        } else {
            (then_block, else_block)
        };
        block.terminator = Some(Terminator::Br(taken));
        if taken != dropped {
            removed_edges.push((BlockId(index), dropped));
        }
    }

    for (from, to) in &removed_edges {
        if let Some(block) = function.blocks.get_mut(to.0) {
            for inst in &mut block.insts {
                if let InstKind::Phi { incoming } = &mut inst.kind {
                    incoming.retain(|(_, pred)| pred != from);
                }
            }
        }
    }
    removed_edges.len()
}

fn reachable_blocks(function: &Function) -> HashSet<BlockId> {
    let mut reachable = HashSet::new();
    let mut pending = vec![BlockId(0)];
    while let Some(id) = pending.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(Some(term)) = function.blocks.get(id.0).map(|b| &b.terminator) {
            pending.extend(term.successors());
        }
    }
    reachable
}

/// 不可达块不再是任何 phi 的有效来源
fn prune_unreachable_incoming(function: &mut Function) {
    let reachable = reachable_blocks(function);
    for block in &mut function.blocks {
        for inst in &mut block.insts {
            if let InstKind::Phi { incoming } = &mut inst.kind {
                incoming.retain(|(_, pred)| reachable.contains(pred));
            }
        }
    }
}

/// 所有入边（忽略自引用）都是同一个值的 phi 等价于该值
fn remove_trivial_phis(function: &mut Function, replacements: &mut HashMap<ValueId, Operand>) -> usize {
    let mut removed = 0;
    for block in &mut function.blocks {
        block.insts.retain(|inst| {
            let InstKind::Phi { incoming } = &inst.kind else {
                return true;
            };
            let mut unique: Option<Operand> = None;
            for (value, _) in incoming {
                let value = resolve(replacements, *value);
                if value == Operand::Value(inst.result) {
                    continue;
                }
                match unique {
                    None => unique = Some(value),
                    Some(existing) if existing == value => {}
                    Some(_) => return true,
                }
            }
            match unique {
                Some(value) => {
                    replacements.insert(inst.result, value);
                    removed += 1;
                    false
                }
                None => true,
            }
        });
    }
    removed
}

fn replace_uses(function: &mut Function, replacements: &HashMap<ValueId, Operand>) {
    if replacements.is_empty() {
        return;
    }
    for block in &mut function.blocks {
        for inst in &mut block.insts {
            for operand in inst.kind.operands_mut() {
                *operand = resolve(replacements, *operand);
            }
        }
        if let Some(term) = &mut block.terminator {
            for operand in term.operands_mut() {
                *operand = resolve(replacements, *operand);
            }
        }
    }
}

/// 删除结果没有被使用的纯指令
fn remove_dead_instructions(function: &mut Function) -> usize {
    let mut removed = 0;
    loop {
        let mut used = HashSet::new();
        for block in &function.blocks {
            for inst in &block.insts {
                for operand in inst.kind.operands() {
                    if let Operand::Value(id) = operand {
                        // phi 自引用不算使用
                        if id != inst.result {
                            used.insert(id);
                        }
                    }
                }
            }
            if let Some(term) = &block.terminator {
                let operand = match term {
                    Terminator::CondBr { cond, .. } => Some(cond),
                    Terminator::Ret(value) => Some(value),
                    Terminator::Br(_) => None,
                };
                if let Some(Operand::Value(id)) = operand {
                    used.insert(*id);
                }
            }
        }

        let mut round = 0;
        for block in &mut function.blocks {
            block.insts.retain(|inst| {
                let dead = inst.kind.is_pure() && !used.contains(&inst.result);
                if dead {
                    round += 1;
                }
                !dead
            });
        }
        if round == 0 {
            return removed;
        }
        removed += round;
    }
}
