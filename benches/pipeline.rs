//! Benchmarks for the analysis pipeline.
//!
//! Measures the stages on a synthetic function made of repeated blocks:
//! - CFG construction alone
//! - CFG, use/def, liveness and def-use chains
//! - The full pipeline including rewrites and code generation
//! - Many functions in parallel

extern crate decoflow;

use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, Criterion};
use decoflow::prelude::*;

/// Builds `blocks` blocks of: two pushes, a call, a comparison and a branch to the next block.
fn synthetic_function(blocks: u64) -> InstructionList {
    let eax = || Expression::register(X86Registers::EAX);
    let ecx = || Expression::register(X86Registers::ECX);
    let mut instructions = Vec::new();

    for block in 0..blocks {
        let base = 0x40_0000 + block * 0x20;
        let next = base + 0x20;
        let name = format!("block_{block}");
        let callee = CallExpression::new(Expression::global("memset")).with_parameter_count(2);

        instructions.push(Instruction::label(base, name));
        instructions.push(Instruction::assignment(base, ecx(), Expression::number(block)));
        instructions.push(Instruction::push(base + 0x04, ecx()));
        instructions.push(Instruction::push(base + 0x05, Expression::stack("buffer", -0x40)));
        instructions.push(Instruction::assignment(base + 0x08, eax(), Expression::from_call(callee)));
        instructions.push(Instruction::conditional_jump(
            base + 0x10,
            Expression::binary(BinaryOperator::Equal, eax(), Expression::number(0)),
            Expression::global_at(format!("block_{}", block + 1), next),
        ));
    }
    instructions.push(Instruction::label(0x40_0000 + blocks * 0x20, format!("block_{blocks}")));
    instructions.push(Instruction::ret(0x40_0000 + blocks * 0x20, eax()));

    InstructionList::from(instructions)
}

/// Benchmark CFG construction on 200 blocks.
fn bench_cfg_build(c: &mut Criterion) {
    let function = synthetic_function(200);

    c.bench_function("cfg_build_200", |b| {
        b.iter(|| {
            let events = EventLog::new();
            let cfg = CfgBuilder::new(&events).build(black_box(function.clone())).unwrap();
            black_box(cfg)
        });
    });
}

/// Benchmark the analyses that precede any rewrite.
fn bench_analyses(c: &mut Criterion) {
    let function = synthetic_function(200);
    let config = AnalysisConfig::default();

    c.bench_function("analyses_200", |b| {
        b.iter(|| {
            let events = EventLog::new();
            let mut cfg = CfgBuilder::new(&events).build(function.clone()).unwrap();
            UseDefComputer::new(&X86Registers, &config).compute(&mut cfg);
            let liveness = LiveVariables::new(&events).solve(&mut cfg);
            DefUseBuilder::build(&mut cfg);
            black_box((cfg, liveness))
        });
    });
}

/// Benchmark the complete pipeline on one function.
fn bench_decompile(c: &mut Criterion) {
    let function = synthetic_function(200);
    let decompiler = Decompiler::new(AnalysisConfig::default(), Arc::new(X86Registers));

    c.bench_function("decompile_200", |b| {
        b.iter(|| {
            let result = decompiler.decompile(black_box(function.clone())).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark 64 functions analysed in parallel.
fn bench_decompile_all(c: &mut Criterion) {
    let functions: Vec<InstructionList> = (0..64).map(|_| synthetic_function(50)).collect();
    let decompiler = Decompiler::new(AnalysisConfig::default(), Arc::new(X86Registers));

    c.bench_function("decompile_all_64x50", |b| {
        b.iter(|| {
            let results = decompiler.decompile_all(black_box(functions.clone()));
            black_box(results)
        });
    });
}

criterion_group!(
    benches,
    bench_cfg_build,
    bench_analyses,
    bench_decompile,
    bench_decompile_all
);
criterion_main!(benches);
