use std::fmt;

/// 整数字面量的位宽
pub const INT_BITS: u32 = 64;

/// 语言中唯一的数值类型域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumType {
    Int,
    Float,
}

impl NumType {
    /// 两个类型统一后的类型：只要有一方是浮点就统一为浮点
    pub fn unify(self, other: NumType) -> NumType {
        if self == NumType::Float || other == NumType::Float {
            NumType::Float
        } else {
            NumType::Int
        }
    }
}

impl fmt::Display for NumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumType::Int => write!(f, "int"),
            NumType::Float => write!(f, "double"),
        }
    }
}

/// 执行顶层表达式得到的标量结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unify() {
        assert_eq!(NumType::Int.unify(NumType::Int), NumType::Int);
        assert_eq!(NumType::Int.unify(NumType::Float), NumType::Float);
        assert_eq!(NumType::Float.unify(NumType::Int), NumType::Float);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Int(15).to_string(), "15");
        assert_eq!(Scalar::Float(94.5).to_string(), "94.5");
        assert_eq!(Scalar::Float(-100.0).as_f64(), -100.0);
    }
}
