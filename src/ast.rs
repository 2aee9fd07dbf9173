//! 抽象语法树
//!
//! 节点构造后不可变；`flatten`/`dump` 提供与位置信息无关的结构化输出，
//! `Display` 输出可被重新解析的规范源码。

use std::fmt;

use crate::error::SourceLocation;

/// 包装顶层表达式的匿名函数名
pub const ANON_FUNCTION_NAME: &str = "__anon_expr";

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Extern(Prototype),
    Function(Function),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Unary,
    Binary,
}

impl OperatorKind {
    pub fn arity(&self) -> usize {
        match self {
            OperatorKind::Unary => 1,
            OperatorKind::Binary => 2,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Unary => write!(f, "unary"),
            OperatorKind::Binary => write!(f, "binary"),
        }
    }
}

/// 用户自定义运算符对应的函数名，例如 `binary%`
pub fn operator_function_name(kind: OperatorKind, op: char) -> String {
    format!("{}{}", kind, op)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
    pub operator_kind: Option<OperatorKind>,
    pub precedence: Option<u32>,
    pub loc: SourceLocation,
}

impl Prototype {
    /// 运算符原型的符号（函数名的最后一个字符）
    pub fn operator_symbol(&self) -> Option<char> {
        self.operator_kind.and_then(|_| self.name.chars().last())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub proto: Prototype,
    pub body: Expr,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(NumberLit),
    Variable(VariableExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    If(IfExpr),
    For(ForExpr),
    VarIn(VarInExpr),
}

/// 数字字面量保留词法原文，由类型解析阶段决定整数或浮点
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLit {
    pub text: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableExpr {
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: char,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: char,
    pub operand: Box<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr {
    pub condition: Box<Expr>,
    pub then_branch: Box<Expr>,
    pub else_branch: Box<Expr>,
    pub loc: SourceLocation,
}

/// `for x = start, end, step in body`，`step` 是计算下一个值的表达式
#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr {
    pub var_name: String,
    pub start: Box<Expr>,
    pub end: Box<Expr>,
    pub step: Option<Box<Expr>>,
    pub body: Box<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBinding {
    pub name: String,
    pub init: Option<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarInExpr {
    pub bindings: Vec<VarBinding>,
    pub body: Box<Expr>,
    pub loc: SourceLocation,
}

impl Expr {
    pub fn loc(&self) -> SourceLocation {
        match self {
            Expr::Number(n) => n.loc,
            Expr::Variable(v) => v.loc,
            Expr::Binary(b) => b.loc,
            Expr::Unary(u) => u.loc,
            Expr::Call(c) => c.loc,
            Expr::If(i) => i.loc,
            Expr::For(f) => f.loc,
            Expr::VarIn(v) => v.loc,
        }
    }
}

impl Item {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Item::Function(func) if func.is_anonymous)
    }

    pub fn prototype(&self) -> &Prototype {
        match self {
            Item::Extern(proto) => proto,
            Item::Function(func) => &func.proto,
        }
    }
}

// ---------------------------------------------------------------------------
// 结构化展开与转储
// ---------------------------------------------------------------------------

/// 展开后的节点：叶子是字面文本，节点是名字加字段
#[derive(Debug, Clone, PartialEq)]
pub enum Flat {
    Atom(String),
    Node(String, Vec<Flat>),
    List(Vec<Flat>),
}

impl Flat {
    fn atom(value: impl ToString) -> Flat {
        Flat::Atom(value.to_string())
    }

    fn node(name: &str, fields: Vec<Flat>) -> Flat {
        Flat::Node(name.to_string(), fields)
    }

    /// 把展开结果渲染为缩进文本
    pub fn dump(&self) -> String {
        let mut out = String::new();
        match self {
            Flat::Node(name, fields) => write_node(&mut out, name, fields, 0),
            Flat::Atom(text) => out.push_str(text),
            Flat::List(_) => write_field(&mut out, self, 0),
        }
        out
    }
}

fn write_node(out: &mut String, name: &str, fields: &[Flat], indent: usize) {
    out.push_str(name);
    for field in fields {
        write_field(out, field, indent);
    }
}

fn write_field(out: &mut String, field: &Flat, indent: usize) {
    match field {
        Flat::Atom(text) => {
            out.push(' ');
            out.push_str(text);
        }
        Flat::Node(name, fields) => {
            out.push('\n');
            out.push_str(&" ".repeat(indent + 2));
            write_node(out, name, fields, indent + 2);
        }
        Flat::List(items) if items.is_empty() => out.push_str(" []"),
        Flat::List(items) if items.iter().all(|i| matches!(i, Flat::Atom(_))) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|i| match i {
                    Flat::Atom(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            out.push_str(&format!(" [{}]", texts.join(" ")));
        }
        Flat::List(items) => {
            for item in items {
                write_field(out, item, indent);
            }
        }
    }
}

fn flatten_optional(expr: Option<&Expr>) -> Flat {
    match expr {
        Some(e) => e.flatten(),
        None => Flat::node("None", Vec::new()),
    }
}

impl Expr {
    pub fn flatten(&self) -> Flat {
        match self {
            Expr::Number(n) => Flat::node("Number", vec![Flat::atom(&n.text)]),
            Expr::Variable(v) => Flat::node("Variable", vec![Flat::atom(&v.name)]),
            Expr::Binary(b) => Flat::node(
                "Binary",
                vec![Flat::atom(b.op), b.left.flatten(), b.right.flatten()],
            ),
            Expr::Unary(u) => Flat::node("Unary", vec![Flat::atom(u.op), u.operand.flatten()]),
            Expr::Call(c) => Flat::node(
                "Call",
                vec![
                    Flat::atom(&c.callee),
                    Flat::List(c.args.iter().map(Expr::flatten).collect()),
                ],
            ),
            Expr::If(i) => Flat::node(
                "If",
                vec![
                    i.condition.flatten(),
                    i.then_branch.flatten(),
                    i.else_branch.flatten(),
                ],
            ),
            Expr::For(f) => Flat::node(
                "For",
                vec![
                    Flat::atom(&f.var_name),
                    f.start.flatten(),
                    f.end.flatten(),
                    flatten_optional(f.step.as_deref()),
                    f.body.flatten(),
                ],
            ),
            Expr::VarIn(v) => Flat::node(
                "VarIn",
                vec![
                    Flat::List(
                        v.bindings
                            .iter()
                            .map(|b| {
                                Flat::node(
                                    "Binding",
                                    vec![Flat::atom(&b.name), flatten_optional(b.init.as_ref())],
                                )
                            })
                            .collect(),
                    ),
                    v.body.flatten(),
                ],
            ),
        }
    }

    pub fn dump(&self) -> String {
        self.flatten().dump()
    }
}

impl Prototype {
    pub fn flatten(&self) -> Flat {
        let mut fields = vec![
            Flat::atom(&self.name),
            Flat::List(self.params.iter().map(Flat::atom).collect()),
        ];
        if let Some(kind) = self.operator_kind {
            fields.push(Flat::atom(kind));
        }
        if let Some(precedence) = self.precedence {
            fields.push(Flat::atom(precedence));
        }
        Flat::node("Prototype", fields)
    }
}

impl Item {
    pub fn flatten(&self) -> Flat {
        match self {
            Item::Extern(proto) => Flat::node("Extern", vec![proto.flatten()]),
            Item::Function(func) => Flat::node(
                "Function",
                vec![
                    Flat::atom(func.is_anonymous),
                    func.proto.flatten(),
                    func.body.flatten(),
                ],
            ),
        }
    }

    pub fn dump(&self) -> String {
        self.flatten().dump()
    }
}

// ---------------------------------------------------------------------------
// 规范源码输出
// ---------------------------------------------------------------------------

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n.text),
            Expr::Variable(v) => write!(f, "{}", v.name),
            Expr::Binary(b) => write!(f, "({} {} {})", b.left, b.op, b.right),
            Expr::Unary(u) => write!(f, "{}{}", u.op, u.operand),
            Expr::Call(c) => {
                write!(f, "{}(", c.callee)?;
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::If(i) => write!(
                f,
                "(if {} then {} else {})",
                i.condition, i.then_branch, i.else_branch
            ),
            Expr::For(l) => {
                write!(f, "(for {} = {}, {}", l.var_name, l.start, l.end)?;
                if let Some(step) = &l.step {
                    write!(f, ", {}", step)?;
                }
                write!(f, " in {})", l.body)
            }
            Expr::VarIn(v) => {
                write!(f, "(var ")?;
                for (i, binding) in v.bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", binding.name)?;
                    if let Some(init) = &binding.init {
                        write!(f, " = {}", init)?;
                    }
                }
                write!(f, " in {})", v.body)
            }
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operator_kind, self.operator_symbol()) {
            (Some(kind), Some(op)) => {
                write!(f, "{} {}", kind, op)?;
                if let Some(precedence) = self.precedence {
                    write!(f, " {}", precedence)?;
                }
            }
            _ => write!(f, "{}", self.name)?,
        }
        write!(f, "({})", self.params.join(" "))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Extern(proto) => write!(f, "extern {}", proto),
            Item::Function(func) if func.is_anonymous => write!(f, "{}", func.body),
            Item::Function(func) => write!(f, "def {} {}", func.proto, func.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Expr {
        Expr::Number(NumberLit {
            text: text.to_string(),
            loc: SourceLocation::default(),
        })
    }

    fn var(name: &str) -> Expr {
        Expr::Variable(VariableExpr {
            name: name.to_string(),
            loc: SourceLocation::default(),
        })
    }

    #[test]
    fn test_leaf_dump() {
        assert_eq!(num("8").dump(), "Number 8");
        assert_eq!(num("8").flatten(), Flat::Node("Number".to_string(), vec![Flat::Atom("8".to_string())]));
    }

    #[test]
    fn test_call_dump() {
        let call = Expr::Call(CallExpr {
            callee: "f".to_string(),
            args: vec![num("90"), num("8")],
            loc: SourceLocation::default(),
        });
        assert_eq!(call.dump(), "Call f\n  Number 90\n  Number 8");

        let empty = Expr::Call(CallExpr {
            callee: "g".to_string(),
            args: Vec::new(),
            loc: SourceLocation::default(),
        });
        assert_eq!(empty.dump(), "Call g []");
    }

    #[test]
    fn test_for_without_step_dump() {
        let looped = Expr::For(ForExpr {
            var_name: "i".to_string(),
            start: Box::new(num("1")),
            end: Box::new(var("n")),
            step: None,
            body: Box::new(var("i")),
            loc: SourceLocation::default(),
        });
        assert_eq!(
            looped.dump(),
            "For i\n  Number 1\n  Variable n\n  None\n  Variable i"
        );
        assert_eq!(looped.to_string(), "(for i = 1, n in i)");
    }

    #[test]
    fn test_prototype_display() {
        let proto = Prototype {
            name: operator_function_name(OperatorKind::Binary, '%'),
            params: vec!["a".to_string(), "b".to_string()],
            operator_kind: Some(OperatorKind::Binary),
            precedence: Some(30),
            loc: SourceLocation::default(),
        };
        assert_eq!(proto.name, "binary%");
        assert_eq!(proto.operator_symbol(), Some('%'));
        assert_eq!(proto.to_string(), "binary % 30(a b)");
        assert_eq!(proto.flatten().dump(), "Prototype binary% [a b] binary 30");
    }
}
