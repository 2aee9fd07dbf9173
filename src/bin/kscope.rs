//! kscope 命令行入口
//!
//! Usage: `kscope [FILE] [--no-opt] [--parse-only] [--emit-ir]`
//!
//! 给定文件时逐个单元求值并打印表达式结果；否则从标准输入读取，
//! 每行作为一段输入，出错后会话继续。

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use kscope::backend::Interpreter;
use kscope::{EvalOptions, Evaluator};

#[derive(Parser, Debug)]
#[command(name = "kscope")]
#[command(about = "Incremental evaluator for a small expression language")]
struct Args {
    /// Source file; reads from stdin when omitted
    file: Option<PathBuf>,

    /// Skip optimisation before execution
    #[arg(long = "no-opt")]
    no_opt: bool,

    /// Print the AST dump of each unit instead of evaluating
    #[arg(long = "parse-only", conflicts_with = "emit_ir")]
    parse_only: bool,

    /// Print the generated IR of each unit instead of executing
    #[arg(long = "emit-ir")]
    emit_ir: bool,
}

#[derive(Clone, Copy)]
enum Mode {
    Evaluate,
    ParseOnly,
    EmitIr,
}

fn main() -> Result<()> {
    kscope::init_logging();

    let args = Args::parse();
    let mode = if args.parse_only {
        Mode::ParseOnly
    } else if args.emit_ir {
        Mode::EmitIr
    } else {
        Mode::Evaluate
    };
    let options = EvalOptions {
        optimize: !args.no_opt,
    };
    let mut evaluator = Evaluator::with_backend(Interpreter::new(), options);

    match &args.file {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if !run_source(&mut evaluator, &source, mode) {
                std::process::exit(1);
            }
        }
        None => repl(&mut evaluator, mode)?,
    }
    Ok(())
}

/// 处理一段输入，返回是否全部成功
fn run_source(evaluator: &mut Evaluator, source: &str, mode: Mode) -> bool {
    match mode {
        Mode::ParseOnly => match evaluator.parse_only(source) {
            Ok(dumps) => {
                for dump in dumps {
                    println!("{}", dump);
                }
                true
            }
            Err(err) => report(&err),
        },
        Mode::EmitIr => match evaluator.emit_ir(source) {
            Ok(texts) => {
                for text in texts {
                    println!("{}", text);
                }
                true
            }
            Err(err) => report(&err),
        },
        Mode::Evaluate => {
            let mut ok = true;
            for result in evaluator.evaluate_all(source) {
                match result {
                    Ok(Some(value)) => println!("{}", value),
                    Ok(None) => {}
                    Err(err) => ok = report(&err),
                }
            }
            ok
        }
    }
}

fn report(err: &kscope::KsError) -> bool {
    error!("{}", err);
    false
}

fn repl(evaluator: &mut Evaluator, mode: Mode) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("ready> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        run_source(evaluator, &line, mode);
    }
}
