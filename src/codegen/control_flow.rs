//! 控制流代码生成：`if`、`for`、`var`
use crate::error::KsResult;
use crate::semantic::TypedExpr;
use super::context::{CodeGenerator, FunctionContext};
use super::ir::{BlockId, Operand, ValueId};
use super::types::IrType;

impl CodeGenerator {
    /// ```text
    ///   cond = ...; br cond, then, else
    /// then:  ...; br ifcont
    /// else:  ...; br ifcont
    /// ifcont: phi [then_val, then_end], [else_val, else_end]
    /// ```
    pub(super) fn lower_if(
        &self,
        ctx: &mut FunctionContext,
        condition: &TypedExpr,
        then_branch: &TypedExpr,
        else_branch: &TypedExpr,
        ty: IrType,
    ) -> KsResult<Operand> {
        let cond = self.lower_expr(ctx, condition)?;
        let cond = self.truthiness(ctx, cond, "ifcond");

        let then_bb = ctx.builder.append_block("then");
        let else_bb = ctx.builder.append_block("else");
        let merge_bb = ctx.builder.append_block("ifcont");
        ctx.builder.cond_br(cond, then_bb, else_bb);

        ctx.builder.position_at_end(then_bb);
        let then_val = self.lower_expr(ctx, then_branch)?;
        ctx.builder.br(merge_bb);
        // 分支内部可能打开了新块
        let then_end = ctx.builder.current_block();

        ctx.builder.position_at_end(else_bb);
        let else_val = self.lower_expr(ctx, else_branch)?;
        ctx.builder.br(merge_bb);
        let else_end = ctx.builder.current_block();

        ctx.builder.position_at_end(merge_bb);
        let phi = ctx.builder.phi(ty, "iftmp");
        ctx.builder.add_incoming(phi, then_val, then_end);
        ctx.builder.add_incoming(phi, else_val, else_end);
        Ok(Operand::Value(phi))
    }

    /// ```text
    ///   start = ...; br loop
    /// loop:
    ///   var = phi [start, preheader], [next, body_end]
    ///   next = step
    ///   cond = end; br cond, loopbody, afterloop
    /// loopbody: body; br loop
    /// afterloop:
    /// ```
    /// 结果是退出循环时循环变量的值。
    #[allow(clippy::too_many_arguments)]
    pub(super) fn lower_for(
        &self,
        ctx: &mut FunctionContext,
        var_name: &str,
        start: &TypedExpr,
        end: &TypedExpr,
        step: &TypedExpr,
        body: &TypedExpr,
        ty: IrType,
    ) -> KsResult<Operand> {
        let start_val = self.lower_expr(ctx, start)?;
        let preheader = ctx.builder.current_block();

        let loop_bb = ctx.builder.append_block("loop");
        let body_bb = ctx.builder.append_block("loopbody");
        let after_bb = ctx.builder.append_block("afterloop");
        ctx.builder.br(loop_bb);

        ctx.builder.position_at_end(loop_bb);
        let phi = ctx.builder.phi(ty, var_name);
        ctx.builder.add_incoming(phi, start_val, preheader);

        // 循环变量遮蔽外层同名绑定，退出作用域后恢复
        ctx.symbols.enter_scope();
        ctx.symbols.declare(var_name, Operand::Value(phi));
        let result = self.lower_loop_body(ctx, phi, end, step, body, [loop_bb, body_bb, after_bb]);
        ctx.symbols.exit_scope();
        result?;

        ctx.builder.position_at_end(after_bb);
        Ok(Operand::Value(phi))
    }

    /// 在 loop 块中生成步进和条件，然后生成循环体和回边
    fn lower_loop_body(
        &self,
        ctx: &mut FunctionContext,
        phi: ValueId,
        end: &TypedExpr,
        step: &TypedExpr,
        body: &TypedExpr,
        [loop_bb, body_bb, after_bb]: [BlockId; 3],
    ) -> KsResult<()> {
        let next = self.lower_expr(ctx, step)?;
        let end_val = self.lower_expr(ctx, end)?;
        let cond = self.truthiness(ctx, end_val, "loopcond");
        ctx.builder.cond_br(cond, body_bb, after_bb);

        ctx.builder.position_at_end(body_bb);
        self.lower_expr(ctx, body)?;
        let body_end = ctx.builder.current_block();
        ctx.builder.add_incoming(phi, next, body_end);
        ctx.builder.br(loop_bb);
        Ok(())
    }

    /// `var a = 1, b in body`：绑定依次求值，只在 body 内可见
    pub(super) fn lower_var_in(
        &self,
        ctx: &mut FunctionContext,
        bindings: &[(String, TypedExpr)],
        body: &TypedExpr,
    ) -> KsResult<Operand> {
        ctx.symbols.enter_scope();
        let result = self.lower_var_scope(ctx, bindings, body);
        ctx.symbols.exit_scope();
        result
    }

    fn lower_var_scope(
        &self,
        ctx: &mut FunctionContext,
        bindings: &[(String, TypedExpr)],
        body: &TypedExpr,
    ) -> KsResult<Operand> {
        for (name, init) in bindings {
            let value = self.lower_expr(ctx, init)?;
            ctx.symbols.declare(name.as_str(), value);
        }
        self.lower_expr(ctx, body)
    }
}
