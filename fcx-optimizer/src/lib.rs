//! FCx IR optimizer (C2): three in-place rewrite passes driven to a
//! fixed point, plus four read-only analyses that only ever emit
//! diagnostics (§4.2).

pub mod algebraic;
pub mod analysis;
pub mod constant_fold;
pub mod dead_code;
pub mod diagnostics;
pub mod strength_reduction;

pub use algebraic::AlgebraicSimplifier;
pub use analysis::{LeakAnalysis, MemorySafetyAnalysis, PointerAnalysis};
pub use constant_fold::ConstantFolder;
pub use dead_code::DeadCodeEliminator;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use strength_reduction::StrengthReducer;

use fcx_ir::Function;
use tracing::debug;

/// Which tier of the rewrite/analysis pipeline to run, also consulted by
/// the partitioner (§4.7) for chunk sizing and by the chunk optimizer
/// (§4.8) for whether expensive passes are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizationLevel {
    O1,
    O2,
    O3,
    OMax,
}

impl OptimizationLevel {
    /// Cap on fixed-point iterations of the rewrite passes (§4.2).
    pub fn iteration_cap(self) -> usize {
        match self {
            OptimizationLevel::O1 => 1,
            OptimizationLevel::O2 => 10,
            OptimizationLevel::O3 | OptimizationLevel::OMax => 15,
        }
    }

    pub fn runs_expensive_opts(self) -> bool {
        matches!(self, OptimizationLevel::O3 | OptimizationLevel::OMax)
    }
}

/// Drives the three rewrite passes to a fixed point and then runs the
/// four analyses once, modeled on the same until-no-change loop shape
/// used elsewhere in this pipeline.
pub struct Optimizer {
    level: OptimizationLevel,
    folder: ConstantFolder,
    algebraic: AlgebraicSimplifier,
    strength: StrengthReducer,
    dce: DeadCodeEliminator,
}

impl Optimizer {
    pub fn new(level: OptimizationLevel) -> Self {
        Self {
            level,
            folder: ConstantFolder::new(),
            algebraic: AlgebraicSimplifier::new(),
            strength: StrengthReducer::new(),
            dce: DeadCodeEliminator::new(),
        }
    }

    /// Runs constant folding, algebraic simplification, strength
    /// reduction and dead-code elimination in a loop until no pass
    /// reports a change or the level's iteration cap is hit.
    pub fn optimize_until_fixpoint(&mut self, func: &mut Function) {
        let cap = self.level.iteration_cap();
        for iteration in 0..cap {
            let mut changed = false;
            changed |= self.folder.run(func);
            changed |= self.algebraic.run(func);
            changed |= self.strength.run(func);
            changed |= self.dce.run(func);

            if !changed {
                debug!(function = %func.name, iteration, "optimizer reached a fixed point");
                return;
            }
        }
        debug!(function = %func.name, cap, "optimizer hit its iteration cap without reaching a fixed point");
    }

    /// Runs the side-effect-free analyses once and returns whatever they
    /// found. Never called as part of `optimize_until_fixpoint` because
    /// analyses read the fully-rewritten IR, not an intermediate state.
    pub fn analyze(&self, func: &Function) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        PointerAnalysis::new().run(func, &mut diagnostics);
        MemorySafetyAnalysis::new().run(func, &mut diagnostics);
        LeakAnalysis::new().run(func, &mut diagnostics);
        diagnostics
    }
}
