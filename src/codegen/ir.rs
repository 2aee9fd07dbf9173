//! SSA 中间表示
//!
//! 程序映像是一个按插入顺序保存函数的 `Module`。函数由基本块组成，
//! 每个块是一串指令加一个终结指令；没有基本块的函数就是声明。
//! `Display` 输出 LLVM 风格的文本，用于 `--emit-ir` 和测试。

use std::fmt;

use indexmap::IndexMap;

use super::types::IrType;

/// SSA 值编号。参数占用前 `params.len()` 个编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

/// 基本块在所属函数中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Bool(_) => IrType::I1,
            Constant::Int(_) => IrType::I64,
            Constant::Float(_) => IrType::F64,
        }
    }

    /// 零值判断，用于条件分支
    pub fn is_zero(&self) -> bool {
        match self {
            Constant::Bool(b) => !b,
            Constant::Int(v) => *v == 0,
            Constant::Float(v) => *v == 0.0,
        }
    }

    pub fn zero(ty: IrType) -> Self {
        match ty {
            IrType::I1 => Constant::Bool(false),
            IrType::I64 => Constant::Int(0),
            IrType::F64 => Constant::Float(0.0),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Value(ValueId),
    Const(Constant),
}

impl Operand {
    pub fn as_const(&self) -> Option<Constant> {
        match self {
            Operand::Const(c) => Some(*c),
            Operand::Value(_) => None,
        }
    }
}

impl From<Constant> for Operand {
    fn from(c: Constant) -> Self {
        Operand::Const(c)
    }
}

impl From<ValueId> for Operand {
    fn from(id: ValueId) -> Self {
        Operand::Value(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn from_symbol(op: char) -> Option<Self> {
        match op {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            '*' => Some(BinaryOp::Mul),
            '/' => Some(BinaryOp::Div),
            _ => None,
        }
    }

    pub fn mnemonic(&self, ty: IrType) -> &'static str {
        match (self, ty.is_float()) {
            (BinaryOp::Add, true) => "fadd",
            (BinaryOp::Add, false) => "add",
            (BinaryOp::Sub, true) => "fsub",
            (BinaryOp::Sub, false) => "sub",
            (BinaryOp::Mul, true) => "fmul",
            (BinaryOp::Mul, false) => "mul",
            (BinaryOp::Div, true) => "fdiv",
            (BinaryOp::Div, false) => "sdiv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Lt,
    Ne,
}

impl CmpPred {
    pub fn mnemonic(&self, ty: IrType) -> &'static str {
        match (self, ty.is_float()) {
            (CmpPred::Lt, true) => "fcmp ult",
            (CmpPred::Lt, false) => "icmp slt",
            (CmpPred::Ne, true) => "fcmp one",
            (CmpPred::Ne, false) => "icmp ne",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// i64 -> double
    SiToFp,
    /// i1 -> double
    UiToFp,
    /// i1 -> i64
    ZExt,
}

impl CastKind {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastKind::SiToFp => "sitofp",
            CastKind::UiToFp => "uitofp",
            CastKind::ZExt => "zext",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Cmp {
        pred: CmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    Neg(Operand),
    Cast {
        kind: CastKind,
        value: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
    },
    Phi {
        incoming: Vec<(Operand, BlockId)>,
    },
}

impl InstKind {
    /// 没有副作用的指令可以被折叠或删除
    pub fn is_pure(&self) -> bool {
        !matches!(self, InstKind::Call { .. })
    }

    pub fn operands(&self) -> Vec<Operand> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Neg(value) | InstKind::Cast { value, .. } => vec![*value],
            InstKind::Call { args, .. } => args.clone(),
            InstKind::Phi { incoming } => incoming.iter().map(|(value, _)| *value).collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Neg(value) | InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(value, _)| value).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: ValueId,
    pub ty: IrType,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Operand),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Ret(_) => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Terminator::Br(_) => Vec::new(),
            Terminator::CondBr { cond, .. } => vec![cond],
            Terminator::Ret(value) => vec![value],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
            terminator: None,
        }
    }
}

/// 值的元数据：名字提示和类型
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    pub name: String,
    pub ty: IrType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub ret: IrType,
    pub blocks: Vec<Block>,
    pub values: Vec<ValueInfo>,
}

impl Function {
    /// 创建声明，所有参数都是 double
    pub fn declaration(name: impl Into<String>, params: Vec<String>, ret: IrType) -> Self {
        let values = params
            .iter()
            .map(|param| ValueInfo {
                name: param.clone(),
                ty: IrType::F64,
            })
            .collect();
        Self {
            name: name.into(),
            params,
            ret,
            blocks: Vec::new(),
            values,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_value(&self, index: usize) -> ValueId {
        ValueId(index)
    }

    pub fn is_param(&self, id: ValueId) -> bool {
        id.0 < self.params.len()
    }

    pub fn value_type(&self, id: ValueId) -> Option<IrType> {
        self.values.get(id.0).map(|info| info.ty)
    }

    pub fn operand_type(&self, operand: &Operand) -> Option<IrType> {
        match operand {
            Operand::Const(c) => Some(c.ty()),
            Operand::Value(id) => self.value_type(*id),
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// 每个块的前驱块
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for (index, block) in self.blocks.iter().enumerate() {
            if let Some(term) = &block.terminator {
                for succ in term.successors() {
                    if let Some(list) = preds.get_mut(succ.0) {
                        if !list.contains(&BlockId(index)) {
                            list.push(BlockId(index));
                        }
                    }
                }
            }
        }
        preds
    }

    fn value_ref(&self, id: ValueId) -> String {
        match self.values.get(id.0) {
            Some(info) if self.is_param(id) => format!("%{}", info.name),
            Some(info) if !info.name.is_empty() => format!("%{}.{}", info.name, id.0),
            _ => format!("%{}", id.0),
        }
    }

    fn operand_ref(&self, operand: &Operand) -> String {
        match operand {
            Operand::Const(c) => c.to_string(),
            Operand::Value(id) => self.value_ref(*id),
        }
    }

    fn typed_operand(&self, operand: &Operand) -> String {
        let ty = self
            .operand_type(operand)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{} {}", ty, self.operand_ref(operand))
    }

    fn block_label(&self, id: BlockId) -> String {
        match self.blocks.get(id.0) {
            Some(block) => format!("%{}", block.label),
            None => format!("%<bb{}>", id.0),
        }
    }

    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, inst: &Instruction) -> fmt::Result {
        write!(f, "  {} = ", self.value_ref(inst.result))?;
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => write!(
                f,
                "{} {} {}, {}",
                op.mnemonic(inst.ty),
                inst.ty,
                self.operand_ref(lhs),
                self.operand_ref(rhs)
            ),
            InstKind::Cmp { pred, lhs, rhs } => {
                let ty = self.operand_type(lhs).unwrap_or(IrType::F64);
                write!(
                    f,
                    "{} {} {}, {}",
                    pred.mnemonic(ty),
                    ty,
                    self.operand_ref(lhs),
                    self.operand_ref(rhs)
                )
            }
            InstKind::Neg(value) => {
                if inst.ty.is_float() {
                    write!(f, "fneg {} {}", inst.ty, self.operand_ref(value))
                } else {
                    write!(f, "sub {} 0, {}", inst.ty, self.operand_ref(value))
                }
            }
            InstKind::Cast { kind, value } => write!(
                f,
                "{} {} to {}",
                kind.mnemonic(),
                self.typed_operand(value),
                inst.ty
            ),
            InstKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.typed_operand(arg)).collect();
                write!(f, "call {} @{}({})", inst.ty, callee, args.join(", "))
            }
            InstKind::Phi { incoming } => {
                let edges: Vec<String> = incoming
                    .iter()
                    .map(|(value, block)| {
                        format!("[ {}, {} ]", self.operand_ref(value), self.block_label(*block))
                    })
                    .collect();
                write!(f, "phi {} {}", inst.ty, edges.join(", "))
            }
        }
    }

    fn fmt_terminator(&self, f: &mut fmt::Formatter<'_>, term: &Terminator) -> fmt::Result {
        match term {
            Terminator::Br(target) => write!(f, "  br label {}", self.block_label(*target)),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "  br {}, label {}, label {}",
                self.typed_operand(cond),
                self.block_label(*then_block),
                self.block_label(*else_block)
            ),
            Terminator::Ret(value) => write!(f, "  ret {}", self.typed_operand(value)),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            let params = vec![IrType::F64.to_string(); self.params.len()];
            return write!(f, "declare {} @{}({})", self.ret, self.name, params.join(", "));
        }

        let params: Vec<String> = (0..self.params.len())
            .map(|index| self.typed_operand(&Operand::Value(ValueId(index))))
            .collect();
        writeln!(f, "define {} @{}({}) {{", self.ret, self.name, params.join(", "))?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                self.fmt_inst(f, inst)?;
                writeln!(f)?;
            }
            if let Some(term) = &block.terminator {
                self.fmt_terminator(f, term)?;
                writeln!(f)?;
            }
        }
        write!(f, "}}")
    }
}

/// 程序映像
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    functions: IndexMap<String, Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// 插入或替换函数，替换时保留原来的位置
    pub fn insert(&mut self, function: Function) -> Option<Function> {
        self.functions.insert(function.name.clone(), function)
    }

    pub fn remove(&mut self, name: &str) -> Option<Function> {
        self.functions.shift_remove(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, function) in self.functions.values().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", function)?;
        }
        Ok(())
    }
}
