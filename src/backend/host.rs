//! 宿主符号：解析映像中的外部声明

use std::io::Write;

use crate::error::{KsError, KsResult};

#[derive(Clone, Copy)]
enum HostFn {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
    /// 按字节写出参数
    PutChar,
    /// 写出参数和换行
    PrintD,
}

pub struct HostSymbol {
    pub name: &'static str,
    f: HostFn,
}

impl HostSymbol {
    pub fn arity(&self) -> usize {
        match self.f {
            HostFn::Binary(_) => 2,
            _ => 1,
        }
    }

    pub fn call(&self, args: &[f64], out: &mut dyn Write) -> KsResult<f64> {
        if args.len() != self.arity() {
            return Err(KsError::Runtime(format!(
                "External symbol '{}' expects {} arguments, found {}",
                self.name,
                self.arity(),
                args.len()
            )));
        }
        match self.f {
            HostFn::Unary(f) => Ok(f(args[0])),
            HostFn::Binary(f) => Ok(f(args[0], args[1])),
            HostFn::PutChar => {
                // 先截成整数再取低字节
                out.write_all(&[args[0] as i64 as u8]).map_err(io_error)?;
                Ok(0.0)
            }
            HostFn::PrintD => {
                writeln!(out, "{}", args[0]).map_err(io_error)?;
                Ok(0.0)
            }
        }
    }
}

fn io_error(err: std::io::Error) -> KsError {
    KsError::Io(err.to_string())
}

const HOST_SYMBOLS: &[HostSymbol] = &[
    HostSymbol { name: "putchard", f: HostFn::PutChar },
    HostSymbol { name: "printd", f: HostFn::PrintD },
    HostSymbol { name: "ceil", f: HostFn::Unary(f64::ceil) },
    HostSymbol { name: "floor", f: HostFn::Unary(f64::floor) },
    HostSymbol { name: "sqrt", f: HostFn::Unary(f64::sqrt) },
    HostSymbol { name: "sin", f: HostFn::Unary(f64::sin) },
    HostSymbol { name: "cos", f: HostFn::Unary(f64::cos) },
    HostSymbol { name: "tan", f: HostFn::Unary(f64::tan) },
    HostSymbol { name: "exp", f: HostFn::Unary(f64::exp) },
    HostSymbol { name: "log", f: HostFn::Unary(f64::ln) },
    HostSymbol { name: "fabs", f: HostFn::Unary(f64::abs) },
    HostSymbol { name: "pow", f: HostFn::Binary(f64::powf) },
    HostSymbol { name: "atan2", f: HostFn::Binary(f64::atan2) },
    HostSymbol { name: "fmod", f: HostFn::Binary(fmod) },
];

fn fmod(a: f64, b: f64) -> f64 {
    a % b
}

pub fn lookup(name: &str) -> Option<&'static HostSymbol> {
    HOST_SYMBOLS.iter().find(|symbol| symbol.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_symbols() {
        let mut sink = Vec::new();
        assert_eq!(lookup("ceil").unwrap().call(&[4.5], &mut sink).unwrap(), 5.0);
        assert_eq!(lookup("pow").unwrap().call(&[2.0, 10.0], &mut sink).unwrap(), 1024.0);
        assert!(lookup("malloc").is_none());
    }

    #[test]
    fn test_output_symbols() {
        let mut sink = Vec::new();
        lookup("putchard").unwrap().call(&[72.0], &mut sink).unwrap();
        lookup("putchard").unwrap().call(&[105.0], &mut sink).unwrap();
        lookup("printd").unwrap().call(&[2.5], &mut sink).unwrap();
        assert_eq!(String::from_utf8(sink).unwrap(), "Hi2.5\n");
    }

    #[test]
    fn test_putchard_writes_low_byte() {
        let mut sink = Vec::new();
        let putchard = lookup("putchard").unwrap();
        putchard.call(&[321.0], &mut sink).unwrap();
        putchard.call(&[-191.0], &mut sink).unwrap();
        putchard.call(&[66.9], &mut sink).unwrap();
        assert_eq!(sink, b"AAB");
    }

    #[test]
    fn test_arity_checked() {
        let mut sink = Vec::new();
        let err = lookup("sin").unwrap().call(&[1.0, 2.0], &mut sink).unwrap_err();
        assert!(matches!(err, KsError::Runtime(_)));
    }
}
