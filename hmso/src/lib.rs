//! Hierarchical multi-stage optimizer (C5-C10): per-unit summaries, a
//! whole-program call-graph index, partitioning into optimization
//! chunks, intra- and cross-chunk optimization passes, and a build cache
//! that drives incremental recompilation.

pub mod build_cache;
pub mod chunk_optimizer;
pub mod cross_chunk;
pub mod error;
pub mod index;
pub mod link_session;
pub mod object_file;
pub mod partitioner;
pub mod summary;

pub use build_cache::{needs_recompile, BuildCache, CacheEntry};
pub use chunk_optimizer::{optimize_chunk, optimize_chunks_parallel, ChunkOptimizationResult, InlineOpportunity};
pub use cross_chunk::{apply_cross_chunk_opportunities, find_cross_chunk_opportunities, CrossChunkAction, CrossChunkOpportunity};
pub use error::{HmsoError, Result};
pub use index::{CallGraphEdge, CallGraphNode, GlobalIndex};
pub use link_session::{CacheStats, LinkSession};
pub use object_file::{ObjectFile, ObjectHeader};
pub use partitioner::{partition_by_call_graph, partition_by_profile, ChunkSizeBounds, OptimizationChunk};
pub use summary::{summarize_function, summarize_module, FunctionSummary, ModuleSummary};
