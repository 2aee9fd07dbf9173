//! 顶层单元的代码生成
//!
//! 原型规则：
//! - 名字不存在时新建
//! - 已有声明且参数个数相同，可以再次声明或补上定义
//! - 已有定义时任何再次声明或定义都是错误
//! - 参数个数不同是错误

use tracing::{debug, warn};

use crate::ast::Prototype;
use crate::error::{KsResult, codegen_error};
use crate::semantic::{TypedFunction, TypedItem};
use super::builder::FunctionBuilder;
use super::context::{CodeGenerator, FunctionContext};
use super::ir::Function;
use super::types::IrType;
use super::verifier::verify_function;

impl CodeGenerator {
    /// 生成一个顶层单元，返回它在映像中的函数名
    pub fn generate(&mut self, item: &TypedItem) -> KsResult<String> {
        match item {
            TypedItem::Extern(proto) => {
                self.declare_extern(proto)?;
                Ok(proto.name.clone())
            }
            TypedItem::Function(func) => self.generate_function(func),
        }
    }

    fn declare_extern(&mut self, proto: &Prototype) -> KsResult<()> {
        self.check_prototype(proto)?;
        if !self.module.contains(&proto.name) {
            self.module.insert(Function::declaration(
                proto.name.as_str(),
                proto.params.clone(),
                IrType::F64,
            ));
        }
        debug!(function = %proto.name, arity = proto.params.len(), "extern declared");
        Ok(())
    }

    fn check_prototype(&self, proto: &Prototype) -> KsResult<()> {
        let Some(existing) = self.module.get(&proto.name) else {
            return Ok(());
        };
        if !existing.is_declaration() {
            return Err(codegen_error(
                proto.loc,
                format!("Redefinition of function '{}'", proto.name),
            ));
        }
        if existing.arity() != proto.params.len() {
            return Err(codegen_error(
                proto.loc,
                format!(
                    "Redefinition of function '{}' with a different number of arguments: expected {}, found {}",
                    proto.name,
                    existing.arity(),
                    proto.params.len()
                ),
            ));
        }
        Ok(())
    }

    fn generate_function(&mut self, func: &TypedFunction) -> KsResult<String> {
        let proto = &func.proto;
        self.check_prototype(proto)?;

        let ret = IrType::from(func.ret);
        let previous = self.module.get(&proto.name).cloned();
        // 先放入声明，函数体可以递归调用自身
        self.module.insert(Function::declaration(
            proto.name.as_str(),
            proto.params.clone(),
            ret,
        ));

        match self.lower_function(func, ret) {
            Ok(function) => {
                debug!(
                    function = %proto.name,
                    blocks = function.blocks.len(),
                    "function lowered"
                );
                self.module.insert(function);
                Ok(proto.name.clone())
            }
            Err(err) => {
                match previous {
                    Some(declaration) => {
                        self.module.insert(declaration);
                    }
                    None => {
                        self.module.remove(&proto.name);
                    }
                }
                warn!(function = %proto.name, error = %err, "function rejected");
                Err(err)
            }
        }
    }

    fn lower_function(&self, func: &TypedFunction, ret: IrType) -> KsResult<Function> {
        let proto = &func.proto;
        let builder = FunctionBuilder::new(&proto.name, proto.params.clone(), ret);
        let mut ctx = FunctionContext::new(builder);
        for (index, param) in proto.params.iter().enumerate() {
            let value = ctx.builder.param(index);
            ctx.symbols.declare(param.as_str(), value);
        }

        let body = self.lower_expr(&mut ctx, &func.body)?;
        ctx.builder.ret(body);

        let function = ctx.builder.finish();
        verify_function(&function, proto.loc)?;
        Ok(function)
    }
}
