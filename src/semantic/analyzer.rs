//! 类型解析器
//!
//! 自底向上为每个表达式确定 `int` 或 `double`。参数位置声明期望类型：
//! 类型相同直接通过，`int` 流入 `double` 位置时插入提升节点，其余情况报错。

use tracing::trace;

use crate::ast::*;
use crate::error::{KsResult, SourceLocation, type_error};
use crate::parser::operators::OperatorTable;
use crate::types::{INT_BITS, NumType};
use super::symbol_table::ScopedSymbolTable;
use super::typed::{TypedExpr, TypedFunction, TypedItem, TypedKind};

/// 函数参数、返回值和运算符调用统一使用的类型
pub const PARAM_TYPE: NumType = NumType::Float;

/// 类型解析器
pub struct TypeResolver {
    symbol_table: ScopedSymbolTable<NumType>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self {
            symbol_table: ScopedSymbolTable::new(),
        }
    }

    /// 解析一个顶层单元
    pub fn resolve_item(&mut self, item: &Item) -> KsResult<TypedItem> {
        match item {
            Item::Extern(proto) => Ok(TypedItem::Extern(proto.clone())),
            Item::Function(func) => Ok(TypedItem::Function(self.resolve_function(func)?)),
        }
    }

    fn resolve_function(&mut self, func: &Function) -> KsResult<TypedFunction> {
        self.symbol_table.reset();
        for param in &func.proto.params {
            self.symbol_table.declare(param.as_str(), PARAM_TYPE);
        }

        let body = self.resolve_expr(&func.body)?;
        // 具名函数总是返回 double，匿名包装函数保留表达式自身的类型
        let (body, ret) = if func.is_anonymous {
            let ty = body.ty;
            (body, ty)
        } else {
            (check_type(body, PARAM_TYPE)?, PARAM_TYPE)
        };
        trace!(function = %func.proto.name, ret = %ret, "function resolved");

        Ok(TypedFunction {
            proto: func.proto.clone(),
            body,
            ret,
            is_anonymous: func.is_anonymous,
        })
    }

    /// 解析表达式
    pub fn resolve_expr(&mut self, expr: &Expr) -> KsResult<TypedExpr> {
        match expr {
            Expr::Number(lit) => resolve_number(lit),
            Expr::Variable(var) => {
                // 未知变量留给代码生成器报告
                let ty = self
                    .symbol_table
                    .lookup(&var.name)
                    .copied()
                    .unwrap_or(PARAM_TYPE);
                Ok(TypedExpr::new(TypedKind::Variable(var.name.clone()), ty, var.loc))
            }
            Expr::Binary(bin) => self.resolve_binary(bin),
            Expr::Unary(unary) => self.resolve_unary(unary),
            Expr::Call(call) => {
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.resolve_argument(arg))
                    .collect::<KsResult<Vec<_>>>()?;
                Ok(TypedExpr::new(
                    TypedKind::Call {
                        callee: call.callee.clone(),
                        args,
                    },
                    PARAM_TYPE,
                    call.loc,
                ))
            }
            Expr::If(if_expr) => self.resolve_if(if_expr),
            Expr::For(for_expr) => self.resolve_for(for_expr),
            Expr::VarIn(var_in) => self.resolve_var_in(var_in),
        }
    }

    fn resolve_argument(&mut self, arg: &Expr) -> KsResult<TypedExpr> {
        let typed = self.resolve_expr(arg)?;
        check_type(typed, PARAM_TYPE)
    }

    fn resolve_binary(&mut self, bin: &BinaryExpr) -> KsResult<TypedExpr> {
        if !OperatorTable::is_builtin_binary(bin.op) {
            let left = self.resolve_argument(&bin.left)?;
            let right = self.resolve_argument(&bin.right)?;
            return Ok(TypedExpr::new(
                TypedKind::UserBinary {
                    op: bin.op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                PARAM_TYPE,
                bin.loc,
            ));
        }

        let left = self.resolve_expr(&bin.left)?;
        let right = self.resolve_expr(&bin.right)?;
        let ty = left.ty.unify(right.ty);
        let left = check_type(left, ty)?;
        let right = check_type(right, ty)?;
        Ok(TypedExpr::new(
            TypedKind::Binary {
                op: bin.op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
            bin.loc,
        ))
    }

    fn resolve_unary(&mut self, unary: &UnaryExpr) -> KsResult<TypedExpr> {
        if OperatorTable::is_builtin_unary(unary.op) {
            let operand = self.resolve_expr(&unary.operand)?;
            let ty = operand.ty;
            return Ok(TypedExpr::new(
                TypedKind::Unary {
                    op: unary.op,
                    operand: Box::new(operand),
                },
                ty,
                unary.loc,
            ));
        }

        let operand = self.resolve_argument(&unary.operand)?;
        Ok(TypedExpr::new(
            TypedKind::UserUnary {
                op: unary.op,
                operand: Box::new(operand),
            },
            PARAM_TYPE,
            unary.loc,
        ))
    }

    fn resolve_if(&mut self, if_expr: &IfExpr) -> KsResult<TypedExpr> {
        let condition = self.resolve_expr(&if_expr.condition)?;
        let then_branch = self.resolve_expr(&if_expr.then_branch)?;
        let else_branch = self.resolve_expr(&if_expr.else_branch)?;

        // 两个分支必须统一为同一类型
        let ty = then_branch.ty.unify(else_branch.ty);
        let then_branch = check_type(then_branch, ty)?;
        let else_branch = check_type(else_branch, ty)?;

        Ok(TypedExpr::new(
            TypedKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            ty,
            if_expr.loc,
        ))
    }

    fn resolve_for(&mut self, for_expr: &ForExpr) -> KsResult<TypedExpr> {
        let start = self.resolve_expr(&for_expr.start)?;
        let ty = start.ty;

        self.symbol_table.enter_scope();
        self.symbol_table.declare(for_expr.var_name.as_str(), ty);
        let result = self.resolve_loop_parts(for_expr, ty);
        self.symbol_table.exit_scope();
        let (step, end, body) = result?;

        Ok(TypedExpr::new(
            TypedKind::For {
                var_name: for_expr.var_name.clone(),
                start: Box::new(start),
                end: Box::new(end),
                step: Box::new(step),
                body: Box::new(body),
            },
            ty,
            for_expr.loc,
        ))
    }

    fn resolve_loop_parts(
        &mut self,
        for_expr: &ForExpr,
        ty: NumType,
    ) -> KsResult<(TypedExpr, TypedExpr, TypedExpr)> {
        // 省略步进时下一个值是 `var + 1`
        let step = match &for_expr.step {
            Some(step) => self.resolve_expr(step)?,
            None => self.resolve_expr(&default_step(&for_expr.var_name, for_expr.loc))?,
        };
        let step = check_type(step, ty)?;
        let end = self.resolve_expr(&for_expr.end)?;
        let body = self.resolve_expr(&for_expr.body)?;
        Ok((step, end, body))
    }

    fn resolve_var_in(&mut self, var_in: &VarInExpr) -> KsResult<TypedExpr> {
        self.symbol_table.enter_scope();
        let result = self.resolve_var_bindings(var_in);
        self.symbol_table.exit_scope();
        let (bindings, body) = result?;

        let ty = body.ty;
        Ok(TypedExpr::new(
            TypedKind::VarIn {
                bindings,
                body: Box::new(body),
            },
            ty,
            var_in.loc,
        ))
    }

    fn resolve_var_bindings(
        &mut self,
        var_in: &VarInExpr,
    ) -> KsResult<(Vec<(String, TypedExpr)>, TypedExpr)> {
        let mut bindings = Vec::new();
        for binding in &var_in.bindings {
            // 初始化表达式看不到正在声明的名字，但能看到前面的绑定
            let init = match &binding.init {
                Some(init) => self.resolve_expr(init)?,
                None => TypedExpr::new(TypedKind::Float(0.0), NumType::Float, binding.loc),
            };
            self.symbol_table.declare(binding.name.as_str(), init.ty);
            bindings.push((binding.name.clone(), init));
        }
        let body = self.resolve_expr(&var_in.body)?;
        Ok((bindings, body))
    }
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn default_step(var_name: &str, loc: SourceLocation) -> Expr {
    Expr::Binary(BinaryExpr {
        op: '+',
        left: Box::new(Expr::Variable(VariableExpr {
            name: var_name.to_string(),
            loc,
        })),
        right: Box::new(Expr::Number(NumberLit {
            text: "1".to_string(),
            loc,
        })),
        loc,
    })
}

/// 数字字面量：纯数字序列是整数（必须能放进整数位宽），否则是浮点
fn resolve_number(lit: &NumberLit) -> KsResult<TypedExpr> {
    if lit.text.chars().all(|c| c.is_ascii_digit()) {
        return match lit.text.parse::<i64>() {
            Ok(value) => Ok(TypedExpr::new(TypedKind::Int(value), NumType::Int, lit.loc)),
            Err(_) => Err(type_error(
                lit.loc,
                format!(
                    "Integer literal {} too big to fit in {} bits",
                    lit.text, INT_BITS
                ),
            )),
        };
    }

    match lit.text.parse::<f64>() {
        Ok(value) => Ok(TypedExpr::new(TypedKind::Float(value), NumType::Float, lit.loc)),
        Err(_) => Err(type_error(
            lit.loc,
            format!("Invalid number format '{}'", lit.text),
        )),
    }
}

/// 把表达式调整为期望类型
pub fn check_type(expr: TypedExpr, expected: NumType) -> KsResult<TypedExpr> {
    if expr.ty == expected {
        return Ok(expr);
    }
    if expr.ty == NumType::Int && expected == NumType::Float {
        return Ok(expr.promote());
    }
    Err(type_error(
        expr.loc,
        format!(
            "Type mismatch error, expecting {} but got {}",
            expected, expr.ty
        ),
    ))
}
