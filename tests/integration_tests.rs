//! kscope 集成测试
//!
//! 通过求值器驱动完整流水线：解析、类型解析、代码生成、执行。

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use kscope::backend::Interpreter;
use kscope::{EvalOptions, Evaluator, KsError, Scalar};

/// 共享的输出缓冲，测试结束后读取内置函数写出的内容
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session() -> Evaluator {
    Evaluator::with_output(Box::new(io::sink()))
}

/// 求值并返回数值结果
fn eval_number(evaluator: &mut Evaluator, source: &str) -> Result<f64, String> {
    match evaluator.evaluate(source) {
        Ok(Some(value)) => Ok(value.as_f64()),
        Ok(None) => Err(format!("'{}' produced no value", source)),
        Err(e) => Err(format!("'{}' failed: {}", source, e)),
    }
}

/// 求值一段没有结果的定义
fn define(evaluator: &mut Evaluator, source: &str) {
    match evaluator.evaluate(source) {
        Ok(None) => {}
        Ok(Some(value)) => panic!("'{}' unexpectedly produced {}", source, value),
        Err(e) => panic!("'{}' failed: {}", source, e),
    }
}

fn expect_error(evaluator: &mut Evaluator, source: &str) -> KsError {
    match evaluator.evaluate(source) {
        Ok(value) => panic!("'{}' should fail, got {:?}", source, value),
        Err(e) => e,
    }
}

#[test]
fn test_basic() {
    let mut e = session();
    assert_eq!(eval_number(&mut e, "3").unwrap(), 3.0);
    assert_eq!(e.evaluate("3+3*4").unwrap(), Some(Scalar::Int(15)));
    assert_eq!(eval_number(&mut e, "(3+3)*4").unwrap(), 24.0);
    assert_eq!(eval_number(&mut e, "10 - 4 - 3").unwrap(), 3.0);
}

#[test]
fn test_integer_and_float_results() {
    let mut e = session();
    assert_eq!(e.evaluate("7 / 2").unwrap(), Some(Scalar::Int(3)));
    assert_eq!(e.evaluate("7 / 2.0").unwrap(), Some(Scalar::Float(3.5)));
    assert_eq!(e.evaluate("-5 + 2").unwrap(), Some(Scalar::Int(-3)));
    assert_eq!(e.evaluate("1 < 2").unwrap(), Some(Scalar::Int(1)));
    assert_eq!(e.evaluate("2.5 < 1").unwrap(), Some(Scalar::Float(0.0)));
}

#[test]
fn test_use_func() {
    let mut e = session();
    define(&mut e, "def adder(x y) x+y");
    assert_eq!(eval_number(&mut e, "adder(5, 4) + adder(3, 2)").unwrap(), 14.0);
}

#[test]
fn test_use_libc() {
    let mut e = session();
    define(&mut e, "extern ceil(x)");
    assert_eq!(eval_number(&mut e, "ceil(4.5)").unwrap(), 5.0);
    define(&mut e, "extern floor(x)");
    define(&mut e, "def cfadder(x) ceil(x) + floor(x)");
    assert_eq!(eval_number(&mut e, "cfadder(3.14)").unwrap(), 7.0);
}

#[test]
fn test_basic_if() {
    let mut e = session();
    define(&mut e, "def foo(a b) a * if a < b then a + 1 else b + 1");
    assert_eq!(eval_number(&mut e, "foo(3, 4)").unwrap(), 12.0);
    assert_eq!(eval_number(&mut e, "foo(5, 4)").unwrap(), 25.0);
}

#[test]
fn test_nested_if() {
    let mut e = session();
    define(
        &mut e,
        "
        def foo(a b c)
            if a < b
                then if a < c then a * 2 else c * 2
                else b * 2",
    );
    assert_eq!(eval_number(&mut e, "foo(1, 20, 300)").unwrap(), 2.0);
    assert_eq!(eval_number(&mut e, "foo(10, 2, 300)").unwrap(), 4.0);
    assert_eq!(eval_number(&mut e, "foo(100, 2000, 30)").unwrap(), 60.0);
}

#[test]
fn test_min3() {
    let mut e = session();
    define(
        &mut e,
        "
        def min3(a b c)
            if a < b
                then if a < c
                    then a
                    else c
                else if b < c
                    then b
                    else c",
    );
    for args in ["1, 2, 3", "1, 3, 2", "2, 1, 3", "2, 3, 1", "3, 1, 2", "3, 2, 1"] {
        let call = format!("min3({})", args);
        assert_eq!(eval_number(&mut e, &call).unwrap(), 1.0, "{}", call);
    }
}

#[test]
fn test_for_returns_final_induction_value() {
    let mut e = session();
    define(&mut e, "def oddlessthan(n) for x = 1.0, x < n, x + 2 in x");
    assert_eq!(eval_number(&mut e, "oddlessthan(100)").unwrap(), 101.0);
    assert_eq!(eval_number(&mut e, "oddlessthan(1000)").unwrap(), 1001.0);
    // 零次迭代返回初始值
    assert_eq!(eval_number(&mut e, "oddlessthan(0)").unwrap(), 1.0);
}

#[test]
fn test_for_default_step() {
    let mut e = session();
    assert_eq!(e.evaluate("for i = 0, i < 10 in i").unwrap(), Some(Scalar::Int(10)));
}

#[test]
fn test_custom_binop() {
    let mut e = session();
    define(&mut e, "def binary %(a b) a - b");
    assert_eq!(eval_number(&mut e, "10 % 5").unwrap(), 5.0);
    assert_eq!(eval_number(&mut e, "100 % 5.5").unwrap(), 94.5);
}

#[test]
fn test_custom_binop_precedence() {
    let mut e = session();
    // 优先级 50 高于 '*'
    define(&mut e, "def binary ~ 50 (a b) a - b");
    assert_eq!(eval_number(&mut e, "2 * 5 ~ 3").unwrap(), 4.0);
    // 优先级 5 低于 '<'
    define(&mut e, "def binary & 5 (a b) if a then b else 0");
    assert_eq!(eval_number(&mut e, "1 < 2 & 3 < 4").unwrap(), 1.0);
}

#[test]
fn test_custom_unop() {
    let mut e = session();
    define(&mut e, "def unary!(a) 0 - a");
    define(&mut e, "def unary^(a) a * a");
    assert_eq!(eval_number(&mut e, "!10").unwrap(), -10.0);
    assert_eq!(eval_number(&mut e, "^10").unwrap(), 100.0);
    assert_eq!(eval_number(&mut e, "!^10").unwrap(), -100.0);
    assert_eq!(eval_number(&mut e, "^!10").unwrap(), 100.0);
}

#[test]
fn test_unop_definition_and_use_in_one_input() {
    let mut e = session();
    assert_eq!(eval_number(&mut e, "def unary!(a) 0 - a\n!10").unwrap(), -10.0);

    let results = e.evaluate_all("def unary~(a) a * 3\n~2\n3");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Ok(None));
    assert_eq!(results[1], Ok(Some(Scalar::Float(6.0))));
    assert_eq!(results[2], Ok(Some(Scalar::Int(3))));
}

#[test]
fn test_wrapper_name_cannot_be_defined() {
    let mut e = session();
    let err = expect_error(&mut e, "def __anon_expr() 7");
    assert!(matches!(err, KsError::Parser { .. }));
    assert_eq!(eval_number(&mut e, "1 + 1").unwrap(), 2.0);
}

#[test]
fn test_mixed_ops() {
    let mut e = session();
    define(&mut e, "def unary!(a) 0 - a");
    define(&mut e, "def unary^(a) a * a");
    define(&mut e, "def binary %(a b) a - b");
    assert_eq!(eval_number(&mut e, "!10 % !20").unwrap(), 10.0);
    assert_eq!(eval_number(&mut e, "^(!10 % !20)").unwrap(), 100.0);
}

#[test]
fn test_redefinition_rules() {
    let mut e = session();
    define(&mut e, "extern f(x)");
    define(&mut e, "def f(x) x+1");
    assert_eq!(eval_number(&mut e, "f(1)").unwrap(), 2.0);

    let err = expect_error(&mut e, "def f(x) x+1");
    assert!(matches!(err, KsError::CodeGen { .. }));
    assert!(err.message().contains("Redefinition of function 'f'"));

    define(&mut e, "extern g(x)");
    let err = expect_error(&mut e, "extern g(x y)");
    assert!(matches!(err, KsError::CodeGen { .. }));
    assert!(err.message().contains("different number of arguments"));

    // 失败的单元不影响已有定义
    assert_eq!(eval_number(&mut e, "f(41)").unwrap(), 42.0);
}

#[test]
fn test_identical_extern_is_idempotent() {
    let mut e = session();
    define(&mut e, "extern sin(x)");
    define(&mut e, "extern sin(x)");
    assert_eq!(eval_number(&mut e, "sin(0)").unwrap(), 0.0);
}

#[test]
fn test_loop_variable_shadows_parameter() {
    let mut e = session();
    define(&mut e, "def f(x) (for x = 1, x < 3 in x) + x");
    assert_eq!(eval_number(&mut e, "f(10)").unwrap(), 13.0);
}

#[test]
fn test_var_in() {
    let mut e = session();
    define(&mut e, "def g(x) var a = x * 2, b = a + 1 in a * b");
    assert_eq!(eval_number(&mut e, "g(3)").unwrap(), 42.0);
    assert_eq!(eval_number(&mut e, "var z in z + 1").unwrap(), 1.0);
}

#[test]
fn test_recursion() {
    let mut e = session();
    define(&mut e, "def fib(x) if x < 3 then 1 else fib(x - 1) + fib(x - 2)");
    assert_eq!(eval_number(&mut e, "fib(15)").unwrap(), 610.0);
}

#[test]
fn test_putchard_writes_to_output() {
    let buffer = SharedBuffer::default();
    let mut e = Evaluator::with_output(Box::new(buffer.clone()));
    define(&mut e, "def printstar(n) for i = 1, i < n + 1 in putchard(42)");
    e.evaluate("printstar(5); putchard(10)").unwrap();
    e.evaluate("printd(2.5)").unwrap();
    assert_eq!(buffer.contents(), "*****\n2.5\n");
}

#[test]
fn test_errors_do_not_end_session() {
    let mut e = session();
    let err = expect_error(&mut e, "1 %% 2");
    assert!(matches!(err, KsError::Parser { .. }));
    let err = expect_error(&mut e, "undefined_fn(1)");
    assert!(matches!(err, KsError::CodeGen { .. }));
    let err = expect_error(&mut e, "def bad(x) y");
    assert_eq!(err.message(), "Undefined variable 'y'");
    let err = expect_error(&mut e, "99999999999999999999");
    assert!(matches!(err, KsError::Type { .. }));
    assert_eq!(eval_number(&mut e, "1 + 1").unwrap(), 2.0);
}

#[test]
fn test_error_locations() {
    let mut e = session();
    let err = expect_error(&mut e, "def f(x)\n  x + y");
    let location = err.location().unwrap();
    assert_eq!((location.line, location.column), (2, 7));

    let err = expect_error(&mut e, "for i = 1, 2 x");
    assert!(matches!(err, KsError::Parser { .. }));
    assert!(err.message().contains("'in'"), "{}", err);
}

#[test]
fn test_runtime_errors() {
    let mut e = session();
    let err = expect_error(&mut e, "def zero() 0; 1 / 0");
    assert!(matches!(err, KsError::Runtime(_)));

    define(&mut e, "def forever(x) forever(x + 1)");
    let err = expect_error(&mut e, "forever(0)");
    assert!(err.message().starts_with("stack overflow"), "{}", err);

    define(&mut e, "extern mystery(x)");
    let err = expect_error(&mut e, "mystery(1)");
    assert_eq!(err.message(), "unresolved external symbol 'mystery'");
    // 未被调用的未解析声明不影响其他表达式
    assert_eq!(eval_number(&mut e, "2 * 3").unwrap(), 6.0);
}

#[test]
fn test_evaluate_all_reports_each_unit() {
    let mut e = session();
    let results = e.evaluate_all("def sq(x) x * x; sq(3); nope(1); sq(4)");
    assert_eq!(results.len(), 4);
    assert_eq!(results[0], Ok(None));
    assert_eq!(results[1], Ok(Some(Scalar::Float(9.0))));
    assert!(results[2].is_err());
    assert_eq!(results[3], Ok(Some(Scalar::Float(16.0))));
}

#[test]
fn test_evaluate_returns_last_unit() {
    let mut e = session();
    assert_eq!(e.evaluate("1; 2; 3.5").unwrap(), Some(Scalar::Float(3.5)));
    assert_eq!(e.evaluate("4; def h(x) x").unwrap(), None);
}

#[test]
fn test_parse_only_dump() {
    let e = session();
    let dumps = e.parse_only("def binary % 77 (a b) a - b; 1 % 2").unwrap();
    assert_eq!(dumps.len(), 2);
    assert!(dumps[0].contains("Prototype binary% [a b] binary 77"), "{}", dumps[0]);
    assert!(dumps[1].contains("Binary %"), "{}", dumps[1]);
    // 临时运算符表不影响会话
    assert!(e.parse_only("1 % 2").is_err());
}

#[test]
fn test_emit_ir_without_execution() {
    let buffer = SharedBuffer::default();
    let mut e = Evaluator::with_output(Box::new(buffer.clone()));
    let texts = e.emit_ir("def f(x) x + 1; putchard(65)").unwrap();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("fadd double %x, 1.0"), "{}", texts[0]);
    assert!(texts[1].contains("call double @putchard(double 65.0)"), "{}", texts[1]);
    assert_eq!(buffer.contents(), "");
    // 定义保留在映像中
    assert_eq!(eval_number(&mut e, "f(1)").unwrap(), 2.0);
}

#[test]
fn test_optimisation_does_not_change_results() {
    let source = "def tri(n) if n < 1 then 0 else n + tri(n - 1)";
    let mut plain = Evaluator::with_backend(
        Interpreter::with_output(Box::new(io::sink())),
        EvalOptions { optimize: false },
    );
    let mut optimised = session();
    define(&mut plain, source);
    define(&mut optimised, source);
    for n in [0, 1, 10, 100] {
        let call = format!("tri({})", n);
        assert_eq!(
            eval_number(&mut plain, &call).unwrap(),
            eval_number(&mut optimised, &call).unwrap()
        );
    }
    assert_eq!(eval_number(&mut optimised, "tri(100)").unwrap(), 5050.0);
}

#[test]
fn test_parse_round_trip() {
    let e = session();
    for source in [
        "def foo(a b) a * if a < b then a + 1 else b + 1",
        "for x = 1.0, x < 10, x + 2 in putchard(x)",
        "var a = 1, b in a - -b",
        "extern atan2(y x)",
    ] {
        let first = e.parse_only(source).unwrap();
        let tokens = kscope::lexer::lex(source).unwrap();
        let mut table = kscope::parser::OperatorTable::new();
        let items = kscope::parser::parse(tokens, &mut table).unwrap();
        let canonical = items[0].to_string();
        let second = e.parse_only(&canonical).unwrap();
        assert_eq!(first, second, "{}", canonical);
    }
}
