//! Compilation pipeline: drives a single translation unit from FCx IR
//! through the optimizer (C2), lowering (C3+C4), and object-file
//! emission (C5, §6), plus a whole-program linking stage that runs the
//! hierarchical multi-stage optimizer (C6-C9) across every unit's
//! function bodies.

use crate::error::{CompileError, Result};
use fc_backend::{lower_function, FcModule};
use fcx_ir::{Function, Module};
use fcx_optimizer::{Diagnostics, Optimizer, OptimizationLevel};
use hmso::{
    apply_cross_chunk_opportunities, build_cache, find_cross_chunk_opportunities, partition_by_call_graph,
    summarize_function, BuildCache, CacheStats, GlobalIndex, LinkSession, ObjectFile, ObjectHeader,
};
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Cross-crate configuration threaded explicitly through the pipeline
/// (§9 "Global state": no environment-variable reads, no statics).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub level: OptimizationLevel,
    /// Worker count for the HMSO chunk optimizer's rayon pool (§4.8, §5).
    pub num_threads: usize,
    pub cache_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(level: OptimizationLevel) -> Self {
        Self { level, num_threads: num_cpus::get(), cache_dir: None }
    }

    pub fn enable_expensive_opts(&self) -> bool {
        self.level.runs_expensive_opts()
    }
}

/// Per-unit compilation statistics, mirrored after the stage timings a
/// single `compile` call threads through (§4.2, §4.3).
#[derive(Debug, Default)]
pub struct CompilationStats {
    pub functions_count: usize,
    pub instructions_before: usize,
    pub instructions_after: usize,
    pub optimization_time_ms: u64,
    pub lowering_time_ms: u64,
    pub summarize_time_ms: u64,
}

impl CompilationStats {
    pub fn optimization_savings(&self) -> f64 {
        if self.instructions_before == 0 {
            0.0
        } else {
            (self.instructions_before - self.instructions_after) as f64 / self.instructions_before as f64
        }
    }
}

#[derive(Debug)]
pub struct CompilationResult {
    pub compile_time_ms: u64,
    pub object_bytes: Vec<u8>,
    pub stats: CompilationStats,
}

/// Outcome of a whole-program link: how the call graph was partitioned
/// and how many cross-cutting optimizations were applied (C6-C9).
#[derive(Debug, Default)]
pub struct LinkResult {
    pub chunk_count: usize,
    pub inlines_applied: usize,
    pub cross_chunk_opportunities_applied: usize,
    /// How many chunks were actually re-optimized. For `link_program` this
    /// is always `chunk_count` (a full rebuild); for
    /// `link_program_incremental` it's only the chunks the build cache
    /// marked dirty (C10).
    pub chunks_reoptimized: usize,
    pub cache_stats: CacheStats,
}

fn count_instructions(module: &Module) -> usize {
    module.functions.iter().map(|f| f.blocks.iter().map(|b| b.instructions.len()).sum::<usize>()).sum()
}

/// Drives a single unit through C2-C5. Frontend parsing is out of
/// scope here; callers hand in an already-built `fcx_ir::Module`.
pub struct CompilationPipeline {
    config: PipelineConfig,
}

impl CompilationPipeline {
    pub fn new(level: OptimizationLevel) -> Self {
        Self { config: PipelineConfig::new(level) }
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn optimization_level(&self) -> OptimizationLevel {
        self.config.level
    }

    /// Optimizes every function in `module` to a fixed point, lowers it
    /// to FC IR, summarizes it, and serializes the result as an object
    /// file (§6). `module` is mutated in place by the optimizer passes.
    pub fn compile(&self, module: &mut Module) -> Result<CompilationResult> {
        let start = Instant::now();
        let mut stats = CompilationStats { functions_count: module.functions.len(), ..Default::default() };

        if module.functions.is_empty() {
            return Err(CompileError::EmptyModule);
        }

        stats.instructions_before = count_instructions(module);
        info!(functions = stats.functions_count, "starting compilation");

        let optimize_start = Instant::now();
        let mut optimizer = Optimizer::new(self.config.level);
        for func in &mut module.functions {
            optimizer.optimize_until_fixpoint(func);
        }
        stats.optimization_time_ms = optimize_start.elapsed().as_millis() as u64;
        stats.instructions_after = count_instructions(module);
        debug!(savings = stats.optimization_savings(), "optimization pass complete");

        let lowering_start = Instant::now();
        let mut lowered_dump = String::new();
        for func in &module.functions {
            let fc_func = lower_function(func)?;
            lowered_dump.push_str(&format!("{fc_func:#?}\n"));
        }
        stats.lowering_time_ms = lowering_start.elapsed().as_millis() as u64;

        let summarize_start = Instant::now();
        let summaries: Vec<_> = module.functions.iter().map(summarize_function).collect();
        stats.summarize_time_ms = summarize_start.elapsed().as_millis() as u64;

        // Machine-code emission (register allocation, encoding, linking)
        // is out of scope for this crate; the code section carries a
        // textual dump of the lowered FC IR as a stand-in opaque blob.
        let object = ObjectFile {
            header: ObjectHeader::default(),
            code: lowered_dump.into_bytes(),
            ir: format!("{module:#?}").into_bytes(),
            functions: summaries,
            profile: Vec::new(),
        };
        let mut object_bytes = Vec::new();
        object.write(&mut object_bytes)?;

        let compile_time_ms = start.elapsed().as_millis() as u64;
        info!(compile_time_ms, "compilation complete");

        Ok(CompilationResult { compile_time_ms, object_bytes, stats })
    }

    /// Runs `module` through optimize (C2) then lowering (C3+C4), returning
    /// the resulting `fc_backend::FcModule` plus every analysis diagnostic
    /// collected along the way, in function order. `module` is mutated in
    /// place the same way [`Self::compile`] mutates it.
    pub fn compile_module(&self, module: &mut Module) -> Result<(FcModule, Diagnostics)> {
        if module.functions.is_empty() {
            return Err(CompileError::EmptyModule);
        }

        let mut optimizer = Optimizer::new(self.config.level);
        let mut diagnostics = Diagnostics::default();
        let mut fc_module = FcModule::default();
        for func in &mut module.functions {
            optimizer.optimize_until_fixpoint(func);
            diagnostics.0.extend(optimizer.analyze(func).0);
            fc_module.functions.push(lower_function(func)?);
        }
        info!(functions = fc_module.functions.len(), diagnostics = diagnostics.0.len(), "compile_module complete");
        Ok((fc_module, diagnostics))
    }

    /// Runs the whole-program HMSO pipeline (C6-C9) across every unit's
    /// object file: builds the global call-graph index, partitions
    /// reachable functions into optimization chunks, optimizes each
    /// chunk independently (in parallel, §5), and applies one
    /// cross-chunk pass. `functions` holds the actual function bodies
    /// keyed by name, since object files carry summaries only.
    pub fn link_program(
        &self,
        units: &[(String, Vec<u8>)],
        entry_points: &[String],
        functions: &mut FxHashMap<String, Function>,
    ) -> LinkResult {
        let index = GlobalIndex::build(units, entry_points);
        let mut chunks = partition_by_call_graph(&index, self.config.level);
        info!(chunk_count = chunks.len(), num_threads = self.config.num_threads, "partitioned call graph into chunks");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .expect("thread pool construction with a positive thread count");
        let results = pool.install(|| hmso::optimize_chunks_parallel(chunks.clone(), &index, functions));
        let inlines_applied: usize = results.iter().map(|r| r.inlines_applied).sum();

        let opportunities = find_cross_chunk_opportunities(&index, &chunks);
        let applied = apply_cross_chunk_opportunities(&mut chunks, &opportunities);
        debug!(applied, "cross-chunk pass complete");

        LinkResult {
            chunk_count: chunks.len(),
            inlines_applied,
            cross_chunk_opportunities_applied: applied,
            chunks_reoptimized: chunks.len(),
            cache_stats: CacheStats::default(),
        }
    }

    /// Same whole-program link as [`Self::link_program`], but consults
    /// `cache` first (C10): units whose source hash and transitive
    /// dependency hash are unchanged since the last link are skipped
    /// entirely, and only the chunks the build cache marks dirty are
    /// re-optimized (§4.10's "mark every chunk containing any affected
    /// function as dirty ... re-run §4.8 on dirty chunks only").
    ///
    /// `sources` pairs each unit in `units` (by position) with
    /// `(source_hash, cached_object_path, object_exists)`; `cache` is
    /// mutated in place with the refreshed entries so the caller can
    /// persist it for the next invocation.
    pub fn link_program_incremental(
        &self,
        units: &[(String, Vec<u8>)],
        entry_points: &[String],
        functions: &mut FxHashMap<String, Function>,
        cache: &mut BuildCache,
        sources: &[(u64, String, bool)],
    ) -> LinkResult {
        let mut session = LinkSession::new(units, entry_points, std::mem::take(cache));
        let plan_input: Vec<(String, u64, String, bool)> = units
            .iter()
            .zip(sources)
            .map(|((path, _), (source_hash, cached_object_path, object_exists))| {
                (path.clone(), *source_hash, cached_object_path.clone(), *object_exists)
            })
            .collect();
        let changed_units: std::collections::HashSet<String> = session.plan_recompiles(&plan_input).into_iter().collect();

        let mut chunks = partition_by_call_graph(&session.index, self.config.level);
        let changed_functions: Vec<String> = session
            .index
            .nodes
            .iter()
            .filter(|n| changed_units.contains(&units[n.unit_index].0))
            .map(|n| n.name.clone())
            .collect();
        let dirty = build_cache::dirty_chunks(&session.index, &chunks, &changed_functions);
        info!(chunk_count = chunks.len(), dirty_chunks = dirty.len(), "incremental link: dirty-chunk set computed");

        let mut dirty_chunks_to_run = Vec::new();
        let mut idx = 0;
        while idx < chunks.len() {
            if dirty.contains(&chunks[idx].id) {
                dirty_chunks_to_run.push(chunks.remove(idx));
            } else {
                idx += 1;
            }
        }
        let clean_chunks = chunks;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .expect("thread pool construction with a positive thread count");
        let results = pool.install(|| hmso::optimize_chunks_parallel(dirty_chunks_to_run.clone(), &session.index, functions));
        let inlines_applied: usize = results.iter().map(|r| r.inlines_applied).sum();

        let mut all_chunks = clean_chunks;
        all_chunks.extend(dirty_chunks_to_run);

        let opportunities = find_cross_chunk_opportunities(&session.index, &all_chunks);
        let applied = apply_cross_chunk_opportunities(&mut all_chunks, &opportunities);
        debug!(applied, reoptimized = results.len(), "incremental cross-chunk pass complete");

        *cache = session.cache;
        LinkResult {
            chunk_count: all_chunks.len(),
            inlines_applied,
            cross_chunk_opportunities_applied: applied,
            chunks_reoptimized: results.len(),
            cache_stats: session.stats,
        }
    }
}
