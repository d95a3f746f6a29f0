//! The per-function analysis pipeline.
//!
//! [`Decompiler::decompile`] takes one function's lifted instructions
//! through every stage in a fixed order:
//!
//! ```text
//! instructions
//!   -> CfgBuilder        basic blocks and edges
//!   -> UseDefComputer    Uses/Definitions per instruction and node
//!   -> LiveVariables     LiveIn/LiveOut fixed point
//!   -> DefUseBuilder     def-use chains, last definitions
//!   -> DataflowPass      dead definitions, copies, stack, parameters
//!   -> IdiomPass         runtime helper calls to Throw
//!   -> CleanupPass       placeholder pops
//!   -> CodeGenerator     text lines
//! ```
//!
//! A function is analysed on one thread from start to end. Independent
//! functions can be analysed in parallel with [`Decompiler::decompile_all`].

use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    analysis::{CfgBuilder, ControlFlowGraph, DefUseBuilder, LiveVariables, UseDefComputer},
    codegen::CodeGenerator,
    compiler::{
        pass::{run_on_graph, InstructionAnalysis, PassContext},
        passes::{CleanupPass, DataflowPass, IdiomPass},
        AnalysisConfig, EventKind, EventLog,
    },
    ir::{InstructionList, RegisterFile},
    Result,
};

/// The outcome of analysing one function.
#[derive(Debug, Default)]
pub struct DecompiledFunction {
    /// The rewritten control flow graph
    pub cfg: ControlFlowGraph,
    /// Everything the stages recorded
    pub events: EventLog,
    /// Generated text, one entry per sink line
    pub lines: Vec<String>,
}

impl DecompiledFunction {
    /// Returns the generated lines joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Runs the analysis pipeline with a fixed configuration and register file.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use decoflow::prelude::*;
///
/// let decompiler = Decompiler::new(AnalysisConfig::default(), Arc::new(X86Registers));
/// let function = decompiler.decompile(instructions)?;
/// println!("{}", function.text());
/// println!("{}", function.events.summary());
/// ```
#[derive(Clone)]
pub struct Decompiler {
    config: AnalysisConfig,
    registers: Arc<dyn RegisterFile>,
}

impl Decompiler {
    /// Creates a decompiler.
    #[must_use]
    pub fn new(config: AnalysisConfig, registers: Arc<dyn RegisterFile>) -> Self {
        Decompiler { config, registers }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns the register file.
    #[must_use]
    pub fn registers(&self) -> &dyn RegisterFile {
        self.registers.as_ref()
    }

    /// Analyses one function.
    ///
    /// An empty instruction stream yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if the configuration does not
    /// validate, or [`crate::Error::GraphError`] if the graph cannot be built.
    pub fn decompile(&self, instructions: InstructionList) -> Result<DecompiledFunction> {
        self.config.validate()?;

        let config = &self.config;
        let registers = self.registers.as_ref();
        let events = EventLog::new();

        if instructions.is_empty() {
            events.info("empty instruction stream, nothing to analyse");
            return Ok(DecompiledFunction {
                events,
                ..DecompiledFunction::default()
            });
        }

        let mut cfg = CfgBuilder::new(&events).build(instructions)?;
        self.stage_completed("cfg", &cfg, &events);

        UseDefComputer::new(registers, config).compute(&mut cfg);
        self.stage_completed("usedef", &cfg, &events);

        let liveness = LiveVariables::new(&events).solve(&mut cfg);
        log::debug!("liveness converged after {} iterations", liveness.iterations);
        self.stage_completed("liveness", &cfg, &events);

        DefUseBuilder::build(&mut cfg);
        self.stage_completed("defuse", &cfg, &events);

        let context = PassContext {
            config,
            registers,
            events: &events,
        };
        self.run_pass(&mut DataflowPass::new(), &mut cfg, context);
        self.run_pass(&mut IdiomPass::from_config(config), &mut cfg, context);
        self.run_pass(&mut CleanupPass, &mut cfg, context);

        let mut lines = Vec::new();
        CodeGenerator::new(registers, config).generate(&cfg, &mut lines)?;
        events
            .record(EventKind::StageCompleted)
            .message(format!("codegen: {} lines", lines.len()));
        log::debug!("decompiled: {}", events.summary());

        Ok(DecompiledFunction { cfg, events, lines })
    }

    /// Analyses independent functions in parallel.
    ///
    /// Results are returned in input order. A failing function does not
    /// affect the others.
    pub fn decompile_all(&self, functions: Vec<InstructionList>) -> Vec<Result<DecompiledFunction>> {
        functions
            .into_par_iter()
            .map(|instructions| self.decompile(instructions))
            .collect()
    }

    fn run_pass<P: InstructionAnalysis>(
        &self,
        pass: &mut P,
        cfg: &mut ControlFlowGraph,
        context: PassContext<'_>,
    ) {
        let name = pass.name();
        if !pass.should_run(&self.config) {
            log::debug!("skipping disabled pass '{name}'");
            return;
        }
        let removed = run_on_graph(pass, cfg, context);
        log::debug!("pass '{name}' removed {removed} instructions");
        self.stage_completed(name, cfg, context.events);
    }

    fn stage_completed(&self, stage: &'static str, cfg: &ControlFlowGraph, events: &EventLog) {
        events
            .record(EventKind::StageCompleted)
            .pass(stage)
            .message(stage);
        if self.config.trace_stages {
            log::debug!("after {stage}:\n{}", cfg.dump(self.registers.as_ref()));
        }
    }
}
