//! 表达式代码生成
use crate::ast::{OperatorKind, operator_function_name};
use crate::error::{KsResult, SourceLocation, codegen_error};
use crate::semantic::{TypedExpr, TypedKind};
use super::context::{CodeGenerator, FunctionContext};
use super::ir::*;
use super::types::IrType;

impl CodeGenerator {
    /// 生成表达式代码，返回结果值
    pub fn lower_expr(&self, ctx: &mut FunctionContext, expr: &TypedExpr) -> KsResult<Operand> {
        match &expr.kind {
            TypedKind::Int(value) => Ok(Operand::Const(Constant::Int(*value))),
            TypedKind::Float(value) => Ok(Operand::Const(Constant::Float(*value))),
            TypedKind::Variable(name) => ctx.symbols.lookup(name).copied().ok_or_else(|| {
                codegen_error(expr.loc, format!("Undefined variable '{}'", name))
            }),
            TypedKind::Binary { op, left, right } => {
                self.lower_builtin_binary(ctx, *op, left, right, expr.loc)
            }
            TypedKind::Unary { op, operand } => {
                let value = self.lower_expr(ctx, operand)?;
                match op {
                    '-' => Ok(ctx.builder.neg(value, "negtmp")),
                    _ => Err(codegen_error(
                        expr.loc,
                        format!("Unknown unary operator '{}'", op),
                    )),
                }
            }
            TypedKind::UserBinary { op, left, right } => {
                let callee = operator_function_name(OperatorKind::Binary, *op);
                if !self.module.contains(&callee) {
                    return Err(codegen_error(
                        expr.loc,
                        format!("Unknown binary operator '{}'", op),
                    ));
                }
                self.lower_call(ctx, &callee, &[left.as_ref(), right.as_ref()], expr.loc, "binop")
            }
            TypedKind::UserUnary { op, operand } => {
                let callee = operator_function_name(OperatorKind::Unary, *op);
                if !self.module.contains(&callee) {
                    return Err(codegen_error(
                        expr.loc,
                        format!("Unknown unary operator '{}'", op),
                    ));
                }
                self.lower_call(ctx, &callee, &[operand.as_ref()], expr.loc, "unop")
            }
            TypedKind::Call { callee, args } => {
                let args: Vec<&TypedExpr> = args.iter().collect();
                self.lower_call(ctx, callee, &args, expr.loc, "calltmp")
            }
            TypedKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(ctx, condition, then_branch, else_branch, expr.ty.into()),
            TypedKind::For {
                var_name,
                start,
                end,
                step,
                body,
            } => self.lower_for(ctx, var_name, start, end, step, body, expr.ty.into()),
            TypedKind::VarIn { bindings, body } => self.lower_var_in(ctx, bindings, body),
            TypedKind::Promote(inner) => {
                match self.lower_expr(ctx, inner)? {
                    Operand::Const(Constant::Int(value)) => {
                        Ok(Operand::Const(Constant::Float(value as f64)))
                    }
                    value => Ok(ctx.builder.cast(CastKind::SiToFp, value, IrType::F64, "promote")),
                }
            }
        }
    }

    fn lower_builtin_binary(
        &self,
        ctx: &mut FunctionContext,
        op: char,
        left: &TypedExpr,
        right: &TypedExpr,
        loc: SourceLocation,
    ) -> KsResult<Operand> {
        let lhs = self.lower_expr(ctx, left)?;
        let rhs = self.lower_expr(ctx, right)?;

        if op == '<' {
            // 比较结果转换回操作数类型：真为 1，假为 0
            let ty = ctx.builder.operand_type(&lhs);
            let cmp = ctx.builder.cmp(CmpPred::Lt, lhs, rhs, "cmptmp");
            let kind = if ty.is_float() {
                CastKind::UiToFp
            } else {
                CastKind::ZExt
            };
            return Ok(ctx.builder.cast(kind, cmp, ty, "booltmp"));
        }

        let Some(bin_op) = BinaryOp::from_symbol(op) else {
            return Err(codegen_error(loc, format!("Unknown binary operator '{}'", op)));
        };
        let hint = match bin_op {
            BinaryOp::Add => "addtmp",
            BinaryOp::Sub => "subtmp",
            BinaryOp::Mul => "multmp",
            BinaryOp::Div => "divtmp",
        };
        Ok(ctx.builder.binary(bin_op, lhs, rhs, hint))
    }

    /// 检查被调函数和参数个数，按顺序生成参数后发出调用
    fn lower_call(
        &self,
        ctx: &mut FunctionContext,
        callee: &str,
        args: &[&TypedExpr],
        loc: SourceLocation,
        hint: &str,
    ) -> KsResult<Operand> {
        let Some(function) = self.module.get(callee) else {
            return Err(codegen_error(
                loc,
                format!("Call to unknown function '{}'", callee),
            ));
        };
        if function.arity() != args.len() {
            return Err(codegen_error(
                loc,
                format!(
                    "Call argument length mismatch for '{}': expected {}, found {}",
                    callee,
                    function.arity(),
                    args.len()
                ),
            ));
        }
        let ret = function.ret;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.lower_expr(ctx, arg)?);
        }
        Ok(ctx.builder.call(callee, values, ret, hint))
    }

    /// 与零比较得到 i1 条件
    pub(super) fn truthiness(&self, ctx: &mut FunctionContext, value: Operand, hint: &str) -> Operand {
        let ty = ctx.builder.operand_type(&value);
        ctx.builder
            .cmp(CmpPred::Ne, value, Operand::Const(Constant::zero(ty)), hint)
    }
}
