//! Minimal driver for the compiler toolchain core. Accepts no
//! command-line interface; wiring a real frontend and CLI in front of
//! this crate's `CompilationPipeline` is out of scope here.

use fcx::{CompilationPipeline, OptimizationLevel};
use fcx_ir::{BinOpKind, Function, FunctionBuilder, Module, NumType, VReg};
use std::process;

/// Builds a placeholder `identity` function until a real frontend feeds
/// this pipeline a module of its own.
fn placeholder_module() -> Module {
    let x = VReg::new(1, NumType::I64);
    let mut f = Function::new("identity", vec![x], NumType::I64);
    {
        let mut b = FunctionBuilder::new(&mut f);
        let zero = b.const_int(NumType::I64, 0).unwrap();
        let result = b.binop(BinOpKind::Add, x, zero).unwrap();
        b.ret(Some(result)).unwrap();
    }
    let mut module = Module::new("main");
    module.add_function(f);
    module
}

fn main() {
    #[cfg(feature = "verbose")]
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut module = placeholder_module();
    let pipeline = CompilationPipeline::new(OptimizationLevel::O2);

    match pipeline.compile(&mut module) {
        Ok(result) => {
            println!("compiled {} function(s) in {}ms", result.stats.functions_count, result.compile_time_ms);
        }
        Err(e) => {
            eprintln!("fcxc-core: {e}");
            process::exit(1);
        }
    }
}
