//! Global index (§4.6): symbol table, call-graph construction, strongly
//! connected components, and reachability from program entry points.

use crate::object_file::ObjectFile;
use crate::summary::FunctionSummary;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Pre-sized so a pathological unit can't blow up edge storage; excess
/// edges past this cap are dropped (§4.6 step 3).
const EDGE_CAP_PER_NODE: usize = 10;

#[derive(Debug, Clone)]
pub struct CallGraphNode {
    pub unit_index: usize,
    pub function_index: usize,
    pub name: String,
    pub scc_id: usize,
    pub reachable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CallGraphEdge {
    pub caller: usize,
    pub callee: usize,
    pub static_call_count: u32,
    pub dynamic_call_count: u64,
    pub hot: bool,
}

#[derive(Debug, Default)]
pub struct GlobalIndex {
    pub source_paths: Vec<String>,
    pub summaries: Vec<FunctionSummary>,
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
    /// function name -> node index. Later units shadow earlier ones for
    /// link purposes (§4.6 step 2); every node is still retained in
    /// `nodes`, so a shadowed function stays visible to the call graph
    /// and reachability even once a later unit claims its name.
    symbol_table: FxHashMap<String, usize>,
    pub dead_functions: Vec<String>,
}

impl GlobalIndex {
    /// Builds the index from a sequence of `(source_path, object_file_bytes)`
    /// pairs. Units with a bad magic or version are skipped, not fatal
    /// (§4.6 step 1, §7 format errors).
    pub fn build(units: &[(String, Vec<u8>)], entry_points: &[String]) -> Self {
        let mut index = GlobalIndex::default();
        for (unit_index, (path, bytes)) in units.iter().enumerate() {
            let (_, functions) = match ObjectFile::read_summary_only(bytes) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path, error = %e, "skipping unit with invalid object file");
                    continue;
                }
            };
            index.source_paths.push(path.clone());
            for (function_index, summary) in functions.iter().enumerate() {
                let node_index = index.nodes.len();
                index.nodes.push(CallGraphNode {
                    unit_index,
                    function_index,
                    name: summary.name.clone(),
                    scc_id: 0,
                    reachable: false,
                });
                index.symbol_table.insert(summary.name.clone(), node_index);
                index.summaries.push(summary.clone());
            }
        }

        index.build_edges();
        index.compute_sccs();
        index.mark_reachable(entry_points);
        index
    }

    /// Looks up a function's summary by name. If more than one unit
    /// defines `name`, this resolves to whichever unit was indexed last
    /// (§4.6 step 2) — the same node `build_edges` resolves call sites
    /// against.
    pub fn summary_by_name(&self, name: &str) -> Option<&FunctionSummary> {
        self.symbol_table.get(name).map(|&idx| &self.summaries[idx])
    }

    pub fn node_index_by_name(&self, name: &str) -> Option<usize> {
        self.symbol_table.get(name).copied()
    }

    fn build_edges(&mut self) {
        let cap = self.nodes.len().saturating_mul(EDGE_CAP_PER_NODE);
        for (caller_index, summary) in self.summaries.iter().enumerate() {
            for call_site in &summary.call_sites {
                if self.edges.len() >= cap {
                    warn!(cap, "call-graph edge cap reached; dropping remaining edges");
                    return;
                }
                if let Some(&callee_index) = self.symbol_table.get(&call_site.callee_name) {
                    self.edges.push(CallGraphEdge {
                        caller: caller_index,
                        callee: callee_index,
                        static_call_count: call_site.call_count,
                        dynamic_call_count: 0,
                        hot: false,
                    });
                }
            }
        }
    }

    /// Tarjan's algorithm, iterative to avoid recursion depth on large
    /// call graphs (§9: "avoid owning cycles entirely").
    fn compute_sccs(&mut self) {
        let n = self.nodes.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &self.edges {
            adjacency[edge.caller].push(edge.callee);
        }

        let mut index_counter = 0usize;
        let mut indices = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_scc_id = 0usize;

        for start in 0..n {
            if indices[start].is_some() {
                continue;
            }
            // (node, child_cursor)
            let mut work: Vec<(usize, usize)> = vec![(start, 0)];
            indices[start] = Some(index_counter);
            lowlink[start] = index_counter;
            index_counter += 1;
            stack.push(start);
            on_stack[start] = true;

            while let Some(&mut (node, ref mut cursor)) = work.last_mut() {
                if *cursor < adjacency[node].len() {
                    let child = adjacency[node][*cursor];
                    *cursor += 1;
                    if indices[child].is_none() {
                        indices[child] = Some(index_counter);
                        lowlink[child] = index_counter;
                        index_counter += 1;
                        stack.push(child);
                        on_stack[child] = true;
                        work.push((child, 0));
                    } else if on_stack[child] {
                        lowlink[node] = lowlink[node].min(indices[child].unwrap());
                    }
                } else {
                    work.pop();
                    if let Some(&mut (parent, _)) = work.last_mut() {
                        lowlink[parent] = lowlink[parent].min(lowlink[node]);
                    }
                    if lowlink[node] == indices[node].unwrap() {
                        loop {
                            let member = stack.pop().unwrap();
                            on_stack[member] = false;
                            self.nodes[member].scc_id = next_scc_id;
                            if member == node {
                                break;
                            }
                        }
                        next_scc_id += 1;
                    }
                }
            }
        }
    }

    fn mark_reachable(&mut self, entry_points: &[String]) {
        let mut seed_names: Vec<&str> = entry_points.iter().map(String::as_str).collect();
        seed_names.push("main");
        seed_names.push("_start");
        let mut seeds: Vec<usize> = Vec::new();
        for name in seed_names {
            if let Some(&idx) = self.symbol_table.get(name) {
                seeds.push(idx);
            }
        }

        let mut adjacency: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for edge in &self.edges {
            adjacency.entry(edge.caller).or_default().push(edge.callee);
        }

        let mut stack = seeds;
        while let Some(node) = stack.pop() {
            if self.nodes[node].reachable {
                continue;
            }
            self.nodes[node].reachable = true;
            if let Some(callees) = adjacency.get(&node) {
                for &callee in callees {
                    if !self.nodes[callee].reachable {
                        stack.push(callee);
                    }
                }
            }
        }

        self.dead_functions = self
            .nodes
            .iter()
            .filter(|n| !n.reachable)
            .map(|n| n.name.clone())
            .collect();
        for name in &self.dead_functions {
            warn!(function = %name, "function is unreachable from any entry point");
        }
    }
}
