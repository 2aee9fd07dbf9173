//! 带类型的表达式树
//!
//! 由类型解析器从 AST 生成，每个节点都带有确定的数值类型，
//! 需要提升的位置显式插入 `Promote` 节点。

use crate::ast::Prototype;
use crate::error::SourceLocation;
use crate::types::NumType;

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedKind,
    pub ty: NumType,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedKind {
    Int(i64),
    Float(f64),
    Variable(String),
    /// 内置二元运算，两侧类型已统一
    Binary {
        op: char,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    /// 内置一元运算
    Unary {
        op: char,
        operand: Box<TypedExpr>,
    },
    /// 用户自定义二元运算符，降级为对 `binary<op>` 的调用
    UserBinary {
        op: char,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    /// 用户自定义一元运算符，降级为对 `unary<op>` 的调用
    UserUnary {
        op: char,
        operand: Box<TypedExpr>,
    },
    Call {
        callee: String,
        args: Vec<TypedExpr>,
    },
    If {
        condition: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    For {
        var_name: String,
        start: Box<TypedExpr>,
        end: Box<TypedExpr>,
        step: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
    VarIn {
        bindings: Vec<(String, TypedExpr)>,
        body: Box<TypedExpr>,
    },
    /// 整数提升为浮点
    Promote(Box<TypedExpr>),
}

impl TypedExpr {
    pub fn new(kind: TypedKind, ty: NumType, loc: SourceLocation) -> Self {
        Self { kind, ty, loc }
    }

    pub fn promote(self) -> Self {
        let loc = self.loc;
        TypedExpr::new(TypedKind::Promote(Box::new(self)), NumType::Float, loc)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunction {
    pub proto: Prototype,
    pub body: TypedExpr,
    pub ret: NumType,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedItem {
    Extern(Prototype),
    Function(TypedFunction),
}

impl TypedItem {
    pub fn prototype(&self) -> &Prototype {
        match self {
            TypedItem::Extern(proto) => proto,
            TypedItem::Function(func) => &func.proto,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, TypedItem::Function(func) if func.is_anonymous)
    }
}
