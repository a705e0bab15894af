//! Partitioner (§4.7): groups call-graph nodes into optimization chunks,
//! either by SCC packing alone or guided by dynamic call-count profiles.

use crate::index::GlobalIndex;
use fcx_optimizer::OptimizationLevel;
use rustc_hash::FxHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct ChunkSizeBounds {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl ChunkSizeBounds {
    pub fn for_level(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::O1 => ChunkSizeBounds { min_chunk_size: 20, max_chunk_size: 300 },
            OptimizationLevel::O2 => ChunkSizeBounds { min_chunk_size: 20, max_chunk_size: 300 },
            OptimizationLevel::O3 => ChunkSizeBounds { min_chunk_size: 10, max_chunk_size: 100 },
            OptimizationLevel::OMax => ChunkSizeBounds { min_chunk_size: 5, max_chunk_size: 50 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationChunk {
    pub id: usize,
    pub function_nodes: Vec<usize>,
    pub total_instruction_count: u64,
    pub hotness: f64,
    pub level: OptimizationLevel,
    pub enable_expensive_opts: bool,
    pub optimized: bool,
}

impl fmt::Display for OptimizationChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} [{} fns, {} insns, hotness {:.2}, {:?}{}{}]",
            self.id,
            self.function_nodes.len(),
            self.total_instruction_count,
            self.hotness,
            self.level,
            if self.enable_expensive_opts { ", expensive" } else { "" },
            if self.optimized { ", optimized" } else { "" },
        )
    }
}

/// Minimum caller count for a function to seed a hot path (§4.7).
const HOT_SEED_MIN_CALLERS: usize = 4;
/// Maximum depth a hot-path walk follows the most-executed outgoing edge.
const HOT_PATH_MAX_DEPTH: usize = 10;

/// Groups SCCs into chunks, greedily packing up to `min_chunk_size`
/// functions per chunk before opening a new one, then splitting any
/// chunk that still exceeds `max_chunk_size` into equal slices.
pub fn partition_by_call_graph(index: &GlobalIndex, level: OptimizationLevel) -> Vec<OptimizationChunk> {
    let bounds = ChunkSizeBounds::for_level(level);
    let mut by_scc: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (node_index, node) in index.nodes.iter().enumerate() {
        if !node.reachable {
            continue;
        }
        by_scc.entry(node.scc_id).or_default().push(node_index);
    }

    let mut scc_ids: Vec<usize> = by_scc.keys().copied().collect();
    scc_ids.sort_unstable();

    let mut chunks: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for scc_id in scc_ids {
        let members = &by_scc[&scc_id];
        if current.len() >= bounds.min_chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend(members.iter().copied());
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let mut split_chunks: Vec<Vec<usize>> = Vec::new();
    for chunk in chunks {
        if chunk.len() <= bounds.max_chunk_size {
            split_chunks.push(chunk);
            continue;
        }
        let num_slices = chunk.len().div_ceil(bounds.max_chunk_size);
        let slice_size = chunk.len().div_ceil(num_slices);
        for slice in chunk.chunks(slice_size) {
            split_chunks.push(slice.to_vec());
        }
    }

    split_chunks
        .into_iter()
        .enumerate()
        .map(|(id, function_nodes)| {
            let total_instruction_count = function_nodes
                .iter()
                .map(|&n| index.summaries[n].instruction_count as u64)
                .sum();
            OptimizationChunk {
                id,
                function_nodes,
                total_instruction_count,
                hotness: 0.0,
                level,
                enable_expensive_opts: level.runs_expensive_opts(),
                optimized: false,
            }
        })
        .collect()
}

/// Follows hot seeds (nodes with ≥4 callers) along their most-executed
/// outgoing edge to build hot-path chunks; everything else becomes one
/// residual cold chunk at O1 with expensive opts disabled (§4.7).
pub fn partition_by_profile(index: &GlobalIndex, hot_level: OptimizationLevel) -> Vec<OptimizationChunk> {
    let mut caller_counts: FxHashMap<usize, usize> = FxHashMap::default();
    for edge in &index.edges {
        *caller_counts.entry(edge.callee).or_insert(0) += 1;
    }
    let mut outgoing: FxHashMap<usize, Vec<&crate::index::CallGraphEdge>> = FxHashMap::default();
    for edge in &index.edges {
        outgoing.entry(edge.caller).or_default().push(edge);
    }

    let mut in_hot_chunk = vec![false; index.nodes.len()];
    let mut hot_chunks: Vec<Vec<usize>> = Vec::new();

    let mut seeds: Vec<usize> = (0..index.nodes.len())
        .filter(|&n| index.nodes[n].reachable && caller_counts.get(&n).copied().unwrap_or(0) >= HOT_SEED_MIN_CALLERS)
        .collect();
    seeds.sort_unstable();

    for seed in seeds {
        if in_hot_chunk[seed] {
            continue;
        }
        let mut path = vec![seed];
        in_hot_chunk[seed] = true;
        let mut current = seed;
        for _ in 0..HOT_PATH_MAX_DEPTH {
            let next = outgoing
                .get(&current)
                .and_then(|edges| edges.iter().max_by_key(|e| e.dynamic_call_count))
                .filter(|e| !in_hot_chunk[e.callee]);
            match next {
                Some(edge) => {
                    path.push(edge.callee);
                    in_hot_chunk[edge.callee] = true;
                    current = edge.callee;
                }
                None => break,
            }
        }
        hot_chunks.push(path);
    }

    let cold: Vec<usize> = (0..index.nodes.len())
        .filter(|&n| index.nodes[n].reachable && !in_hot_chunk[n])
        .collect();

    let mut chunks: Vec<OptimizationChunk> = hot_chunks
        .into_iter()
        .enumerate()
        .map(|(id, function_nodes)| {
            let total_instruction_count =
                function_nodes.iter().map(|&n| index.summaries[n].instruction_count as u64).sum();
            OptimizationChunk {
                id,
                function_nodes,
                total_instruction_count,
                hotness: 1.0,
                level: hot_level,
                enable_expensive_opts: true,
                optimized: false,
            }
        })
        .collect();

    if !cold.is_empty() {
        let id = chunks.len();
        let total_instruction_count = cold.iter().map(|&n| index.summaries[n].instruction_count as u64).sum();
        chunks.push(OptimizationChunk {
            id,
            function_nodes: cold,
            total_instruction_count,
            hotness: 0.0,
            level: OptimizationLevel::O1,
            enable_expensive_opts: false,
            optimized: false,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::GlobalIndex;
    use crate::object_file::ObjectFile;
    use crate::summary::{BehaviorFlags, CallSite, FunctionSummary, MemoryAccessFlags};

    fn object_with(functions: Vec<FunctionSummary>) -> Vec<u8> {
        let obj = ObjectFile { header: Default::default(), code: vec![], ir: vec![], functions, profile: vec![] };
        let mut bytes = Vec::new();
        obj.write(&mut bytes).unwrap();
        bytes
    }

    fn summary(name: &str, calls: &[&str]) -> FunctionSummary {
        FunctionSummary {
            name: name.to_string(),
            content_hash: 0,
            instruction_count: 10,
            basic_block_count: 1,
            cyclomatic_complexity: 1,
            loop_depth_max: 0,
            behavior: BehaviorFlags::default(),
            memory_access: MemoryAccessFlags::default(),
            call_sites: calls
                .iter()
                .map(|c| CallSite { callee_name: c.to_string(), call_count: 1, argument_count: 0, indirect: false, tail: false })
                .collect(),
            inline_cost: 1,
        }
    }

    #[test]
    fn call_graph_partitioning_keeps_unreachable_functions_out() {
        let unit = (
            "u.fcx.o".to_string(),
            object_with(vec![summary("main", &["f"]), summary("f", &[]), summary("dead", &[])]),
        );
        let index = GlobalIndex::build(&[unit], &[]);
        let chunks = partition_by_call_graph(&index, OptimizationLevel::OMax);
        let placed: usize = chunks.iter().map(|c| c.function_nodes.len()).sum();
        assert_eq!(placed, 2);
    }

    #[test]
    fn oversized_chunk_is_split_to_respect_max_chunk_size() {
        let summaries: Vec<FunctionSummary> = (0..120).map(|i| summary(&format!("f{i}"), &[])).collect();
        let unit = ("u.fcx.o".to_string(), object_with(summaries));
        let index = GlobalIndex::build(&[unit], &(0..120).map(|i| format!("f{i}")).collect::<Vec<_>>());
        let chunks = partition_by_call_graph(&index, OptimizationLevel::OMax);
        assert!(chunks.iter().all(|c| c.function_nodes.len() <= ChunkSizeBounds::for_level(OptimizationLevel::OMax).max_chunk_size));
    }

    #[test]
    fn display_reports_id_function_count_and_level() {
        let chunk = OptimizationChunk {
            id: 3,
            function_nodes: vec![0, 1],
            total_instruction_count: 42,
            hotness: 0.75,
            level: OptimizationLevel::O2,
            enable_expensive_opts: true,
            optimized: false,
        };
        let rendered = format!("{chunk}");
        assert!(rendered.starts_with("chunk 3 [2 fns, 42 insns, hotness 0.75, O2, expensive]"));
    }
}
