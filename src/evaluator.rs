//! 增量求值驱动器
//!
//! 会话持有运算符表、程序映像和后端。每段输入中的单元依次经过
//! 解析、类型解析、代码生成；裸表达式包装成匿名函数后交给后端执行。
//! 失败的单元被丢弃，运算符表和映像都回到该单元之前的状态。

use std::io::Write;

use tracing::{debug, warn};

use crate::ast::Item;
use crate::backend::{Backend, Interpreter};
use crate::codegen::CodeGenerator;
use crate::codegen::ir::Module;
use crate::error::{KsError, KsResult};
use crate::lexer::lex;
use crate::parser::{OperatorTable, Parser, parse};
use crate::semantic;
use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// 执行前在映像副本上运行优化
    pub optimize: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// 单元降级成功后要做的事
enum UnitAction {
    Execute,
    EmitIr,
}

pub struct Evaluator<B: Backend = Interpreter> {
    operators: OperatorTable,
    codegen: CodeGenerator,
    backend: B,
    options: EvalOptions,
}

impl Evaluator<Interpreter> {
    /// 使用解释器后端，输出写到标准输出
    pub fn new() -> Self {
        Self::with_backend(Interpreter::new(), EvalOptions::default())
    }

    /// 内置输出函数写入给定的输出
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self::with_backend(Interpreter::with_output(output), EvalOptions::default())
    }
}

impl Default for Evaluator<Interpreter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Evaluator<B> {
    pub fn with_backend(backend: B, options: EvalOptions) -> Self {
        Self {
            operators: OperatorTable::new(),
            codegen: CodeGenerator::new(),
            backend,
            options,
        }
    }

    pub fn options(&self) -> EvalOptions {
        self.options
    }

    pub fn set_options(&mut self, options: EvalOptions) {
        self.options = options;
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.operators
    }

    /// 当前的程序映像
    pub fn module(&self) -> &Module {
        self.codegen.module()
    }

    /// 求值一段输入，返回最后一个单元的结果；遇到第一个错误即停止
    pub fn evaluate(&mut self, text: &str) -> KsResult<Option<Scalar>> {
        let mut last = None;
        for result in self.drive(text, UnitAction::Execute, true) {
            last = result?;
        }
        Ok(last)
    }

    /// 逐个单元求值并分别报告结果
    ///
    /// 代码生成或执行失败的单元不影响后续单元；解析错误之后不再产出单元。
    pub fn evaluate_all(&mut self, text: &str) -> Vec<KsResult<Option<Scalar>>> {
        self.drive(text, UnitAction::Execute, false)
    }

    /// 只解析，返回每个单元的结构转储；使用运算符表的临时副本
    pub fn parse_only(&self, text: &str) -> KsResult<Vec<String>> {
        let mut scratch = self.operators.clone();
        let items = parse(lex(text)?, &mut scratch)?;
        Ok(items.iter().map(Item::dump).collect())
    }

    /// 降级但不执行，返回每个单元未优化的 IR 文本
    ///
    /// 定义和声明保留在映像中，匿名包装函数在输出后移除。
    pub fn emit_ir(&mut self, text: &str) -> KsResult<Vec<String>> {
        let mut texts = Vec::new();
        for result in self.drive_ir(text) {
            texts.push(result?);
        }
        Ok(texts)
    }

    fn drive(
        &mut self,
        text: &str,
        action: UnitAction,
        stop_on_error: bool,
    ) -> Vec<KsResult<Option<Scalar>>> {
        let tokens = match lex(text) {
            Ok(tokens) => tokens,
            Err(err) => return vec![Err(err)],
        };

        let mut results = Vec::new();
        let mut parser = Parser::new(tokens, &mut self.operators);
        loop {
            let snapshot = parser.operators().clone();
            let Some(item) = parser.next_item() else {
                break;
            };
            let result = item.and_then(|item| {
                run_unit(&mut self.codegen, &mut self.backend, self.options, &item, &action)
                    .map(|outcome| outcome.value)
            });
            let failed = result.is_err();
            if let Err(err) = &result {
                reject_unit(parser.operators_mut(), snapshot, err);
            }
            results.push(result);
            if failed && stop_on_error {
                break;
            }
        }
        results
    }

    fn drive_ir(&mut self, text: &str) -> Vec<KsResult<String>> {
        let tokens = match lex(text) {
            Ok(tokens) => tokens,
            Err(err) => return vec![Err(err)],
        };

        let mut results = Vec::new();
        let mut parser = Parser::new(tokens, &mut self.operators);
        loop {
            let snapshot = parser.operators().clone();
            let Some(item) = parser.next_item() else {
                break;
            };
            let result = item.and_then(|item| {
                run_unit(
                    &mut self.codegen,
                    &mut self.backend,
                    self.options,
                    &item,
                    &UnitAction::EmitIr,
                )
                .map(|outcome| outcome.ir)
            });
            let failed = result.is_err();
            if let Err(err) = &result {
                reject_unit(parser.operators_mut(), snapshot, err);
            }
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}

struct UnitOutcome {
    value: Option<Scalar>,
    ir: String,
}

fn reject_unit(operators: &mut OperatorTable, snapshot: OperatorTable, err: &KsError) {
    warn!(error = %err, "unit rejected");
    *operators = snapshot;
}

/// 处理单个顶层单元
fn run_unit<B: Backend>(
    codegen: &mut CodeGenerator,
    backend: &mut B,
    options: EvalOptions,
    item: &Item,
    action: &UnitAction,
) -> KsResult<UnitOutcome> {
    let typed = semantic::resolve(item)?;
    let name = codegen.generate(&typed)?;
    debug!(unit = %name, anonymous = typed.is_anonymous(), "unit lowered");

    let ir = match action {
        UnitAction::EmitIr => codegen
            .module()
            .get(&name)
            .map(|function| function.to_string())
            .unwrap_or_default(),
        UnitAction::Execute => String::new(),
    };

    if !typed.is_anonymous() {
        return Ok(UnitOutcome { value: None, ir });
    }

    let value = match action {
        UnitAction::Execute => Some(execute(codegen, backend, options, &name)),
        UnitAction::EmitIr => None,
    };
    // 匿名包装函数只用一次
    codegen.module_mut().remove(&name);

    match value {
        Some(result) => {
            let value = result?;
            debug!(unit = %name, result = %value, "expression evaluated");
            Ok(UnitOutcome {
                value: Some(value),
                ir,
            })
        }
        None => Ok(UnitOutcome { value: None, ir }),
    }
}

/// 把整个映像交给后端：优化在副本上进行，持久映像保持未优化
fn execute<B: Backend>(
    codegen: &CodeGenerator,
    backend: &mut B,
    options: EvalOptions,
    entry: &str,
) -> KsResult<Scalar> {
    if options.optimize {
        let mut image = codegen.module().clone();
        backend.optimize(&mut image);
        backend.run(&image, entry)
    } else {
        backend.run(codegen.module(), entry)
    }
}
