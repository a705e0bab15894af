//! Cross-chunk optimizer (§4.9): finds hot call-graph edges that cross
//! chunk boundaries and inlines or merges across them, single-threaded
//! since it mutates chunk membership directly.

use crate::index::GlobalIndex;
use crate::partitioner::OptimizationChunk;

/// An edge counts as hot once either its static or dynamic count clears
/// this threshold (§4.9).
const HOT_EDGE_THRESHOLD: u64 = 10;
/// Only the top N opportunities are applied per pass.
const MAX_APPLICATIONS_PER_PASS: usize = 10;
/// A callee chunk at or under this size is cheap enough to absorb
/// wholesale; above it, only the one hot callee moves (§4.9: "either
/// inlining across the boundary or merging the two chunks").
const MERGE_WHOLE_CHUNK_MAX_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossChunkAction {
    InlineAcrossChunks,
    MergeChunks,
}

#[derive(Debug, Clone)]
pub struct CrossChunkOpportunity {
    pub caller_chunk: usize,
    pub callee_chunk: usize,
    pub caller: usize,
    pub callee: usize,
    pub benefit: i64,
    pub action: CrossChunkAction,
}

fn chunk_of(chunks: &[OptimizationChunk], node_index: usize) -> Option<usize> {
    chunks.iter().position(|c| c.function_nodes.contains(&node_index))
}

/// Builds a dense node -> chunk-position lookup so membership checks
/// during the edge scan don't re-scan every chunk per edge.
fn build_membership(chunks: &[OptimizationChunk], node_count: usize) -> Vec<Option<usize>> {
    let mut membership = vec![None; node_count];
    for (chunk_pos, chunk) in chunks.iter().enumerate() {
        for &node in &chunk.function_nodes {
            membership[node] = Some(chunk_pos);
        }
    }
    membership
}

pub fn find_cross_chunk_opportunities(
    index: &GlobalIndex,
    chunks: &[OptimizationChunk],
) -> Vec<CrossChunkOpportunity> {
    let membership = build_membership(chunks, index.nodes.len());
    let mut opportunities = Vec::new();

    for edge in &index.edges {
        let is_hot = edge.static_call_count as u64 >= HOT_EDGE_THRESHOLD || edge.dynamic_call_count >= HOT_EDGE_THRESHOLD;
        if !is_hot {
            continue;
        }
        let (Some(caller_chunk), Some(callee_chunk)) = (membership[edge.caller], membership[edge.callee]) else {
            continue;
        };
        if caller_chunk == callee_chunk {
            continue;
        }
        let benefit = 10 * edge.static_call_count as i64;
        let action = if chunks[callee_chunk].function_nodes.len() <= MERGE_WHOLE_CHUNK_MAX_SIZE {
            CrossChunkAction::MergeChunks
        } else {
            CrossChunkAction::InlineAcrossChunks
        };
        opportunities.push(CrossChunkOpportunity {
            caller_chunk,
            callee_chunk,
            caller: edge.caller,
            callee: edge.callee,
            benefit,
            action,
        });
    }

    opportunities.sort_by(|a, b| b.benefit.cmp(&a.benefit));
    opportunities.truncate(MAX_APPLICATIONS_PER_PASS);
    opportunities
}

/// Applies the top-ranked opportunities either by moving just the hot
/// callee into the caller's chunk (`InlineAcrossChunks`) or by folding
/// the whole callee chunk into the caller's (`MergeChunks`) when the
/// callee chunk is small enough that absorbing it outright is cheaper
/// than relocating one node at a time. Either way, the actual inlining
/// happens once both functions share a chunk: a true cross-chunk inliner
/// would splice IR directly, but this defers that to the next
/// `chunk_optimizer` pass, keeping this stage single-purpose and
/// single-threaded (§4.9).
pub fn apply_cross_chunk_opportunities(
    chunks: &mut [OptimizationChunk],
    opportunities: &[CrossChunkOpportunity],
) -> usize {
    let mut applied = 0usize;
    for opportunity in opportunities {
        match opportunity.action {
            CrossChunkAction::InlineAcrossChunks => {
                if chunk_of(chunks, opportunity.callee) != Some(opportunity.callee_chunk) {
                    continue; // already moved by an earlier opportunity this pass
                }
                chunks[opportunity.callee_chunk].function_nodes.retain(|&n| n != opportunity.callee);
                chunks[opportunity.caller_chunk].function_nodes.push(opportunity.callee);
                chunks[opportunity.caller_chunk].optimized = false;
            }
            CrossChunkAction::MergeChunks => {
                if chunks[opportunity.callee_chunk].function_nodes.is_empty() {
                    continue; // already merged away by an earlier opportunity this pass
                }
                if opportunity.caller_chunk == opportunity.callee_chunk {
                    continue;
                }
                let absorbed = std::mem::take(&mut chunks[opportunity.callee_chunk].function_nodes);
                chunks[opportunity.caller_chunk].function_nodes.extend(absorbed);
                chunks[opportunity.caller_chunk].optimized = false;
            }
        }
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{CallGraphEdge, CallGraphNode};
    use crate::summary::{BehaviorFlags, FunctionSummary, MemoryAccessFlags};
    use fcx_optimizer::OptimizationLevel;

    fn node(name: &str) -> CallGraphNode {
        CallGraphNode { unit_index: 0, function_index: 0, name: name.to_string(), scc_id: 0, reachable: true }
    }

    fn summary(name: &str) -> FunctionSummary {
        FunctionSummary {
            name: name.to_string(),
            content_hash: 0,
            instruction_count: 5,
            basic_block_count: 1,
            cyclomatic_complexity: 1,
            loop_depth_max: 0,
            behavior: BehaviorFlags::default(),
            memory_access: MemoryAccessFlags::default(),
            call_sites: vec![],
            inline_cost: 1,
        }
    }

    fn chunk(id: usize, nodes: Vec<usize>) -> OptimizationChunk {
        OptimizationChunk {
            id,
            function_nodes: nodes,
            total_instruction_count: 0,
            hotness: 0.0,
            level: OptimizationLevel::O2,
            enable_expensive_opts: false,
            optimized: false,
        }
    }

    #[test]
    fn hot_edge_crossing_chunks_is_detected_and_applied() {
        let mut index = GlobalIndex::default();
        index.nodes = vec![node("hot_caller"), node("hot_callee")];
        index.summaries = vec![summary("hot_caller"), summary("hot_callee")];
        index.edges = vec![CallGraphEdge { caller: 0, callee: 1, static_call_count: 20, dynamic_call_count: 0, hot: false }];

        let mut chunks = vec![chunk(0, vec![0]), chunk(1, vec![1])];
        let opportunities = find_cross_chunk_opportunities(&index, &chunks);
        assert_eq!(opportunities.len(), 1);

        let applied = apply_cross_chunk_opportunities(&mut chunks, &opportunities);
        assert_eq!(applied, 1);
        assert!(chunks[0].function_nodes.contains(&1));
        assert!(!chunks[1].function_nodes.contains(&1));
    }

    #[test]
    fn hot_edge_into_a_large_callee_chunk_inlines_the_single_callee_instead_of_merging() {
        let mut index = GlobalIndex::default();
        let names = ["hot_caller", "hot_callee", "sibling_a", "sibling_b", "sibling_c", "sibling_d", "sibling_e"];
        index.nodes = names.iter().map(|n| node(n)).collect();
        index.summaries = names.iter().map(|n| summary(n)).collect();
        index.edges = vec![CallGraphEdge { caller: 0, callee: 1, static_call_count: 20, dynamic_call_count: 0, hot: false }];

        let mut chunks = vec![chunk(0, vec![0]), chunk(1, vec![1, 2, 3, 4, 5, 6])];
        let opportunities = find_cross_chunk_opportunities(&index, &chunks);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].action, CrossChunkAction::InlineAcrossChunks);

        let applied = apply_cross_chunk_opportunities(&mut chunks, &opportunities);
        assert_eq!(applied, 1);
        assert!(chunks[0].function_nodes.contains(&1));
        assert!(!chunks[1].function_nodes.contains(&1));
        assert_eq!(chunks[1].function_nodes.len(), 5);
    }

    #[test]
    fn hot_edge_into_a_small_callee_chunk_merges_the_whole_chunk() {
        let mut index = GlobalIndex::default();
        index.nodes = vec![node("hot_caller"), node("hot_callee"), node("callee_sibling")];
        index.summaries = vec![summary("hot_caller"), summary("hot_callee"), summary("callee_sibling")];
        index.edges = vec![CallGraphEdge { caller: 0, callee: 1, static_call_count: 20, dynamic_call_count: 0, hot: false }];

        let mut chunks = vec![chunk(0, vec![0]), chunk(1, vec![1, 2])];
        let opportunities = find_cross_chunk_opportunities(&index, &chunks);
        assert_eq!(opportunities[0].action, CrossChunkAction::MergeChunks);

        apply_cross_chunk_opportunities(&mut chunks, &opportunities);
        assert!(chunks[0].function_nodes.contains(&1));
        assert!(chunks[0].function_nodes.contains(&2));
        assert!(chunks[1].function_nodes.is_empty());
    }

    #[test]
    fn cold_edge_crossing_chunks_is_ignored() {
        let mut index = GlobalIndex::default();
        index.nodes = vec![node("a"), node("b")];
        index.summaries = vec![summary("a"), summary("b")];
        index.edges = vec![CallGraphEdge { caller: 0, callee: 1, static_call_count: 1, dynamic_call_count: 0, hot: false }];
        let chunks = vec![chunk(0, vec![0]), chunk(1, vec![1])];
        assert!(find_cross_chunk_opportunities(&index, &chunks).is_empty());
    }
}
