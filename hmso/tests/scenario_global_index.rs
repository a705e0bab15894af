//! End-to-end scenario (§8): three object-file units feed `GlobalIndex::build`,
//! producing one call edge and flagging the one function no entry point
//! can reach as dead.

use hmso::summary::{BehaviorFlags, CallSite, FunctionSummary, MemoryAccessFlags};
use hmso::{GlobalIndex, ObjectFile, ObjectHeader};

fn object_with(functions: Vec<FunctionSummary>) -> Vec<u8> {
    let obj = ObjectFile { header: ObjectHeader::default(), code: vec![], ir: vec![], functions, profile: vec![] };
    let mut bytes = Vec::new();
    obj.write(&mut bytes).unwrap();
    bytes
}

fn summary(name: &str, calls: &[&str]) -> FunctionSummary {
    FunctionSummary {
        name: name.to_string(),
        content_hash: 0,
        instruction_count: 1,
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
fn three_units_one_call_edge_and_one_dead_function() {
    let unit_a = ("a.fcx.o".to_string(), object_with(vec![summary("f", &[])]));
    let unit_b = ("b.fcx.o".to_string(), object_with(vec![summary("main", &["f"])]));
    let unit_c = ("c.fcx.o".to_string(), object_with(vec![summary("unused", &[])]));

    let index = GlobalIndex::build(&[unit_a, unit_b, unit_c], &[]);

    assert_eq!(index.nodes.len(), 3);
    assert_eq!(index.edges.len(), 1);
    assert_eq!(index.dead_functions, vec!["unused".to_string()]);

    let main_node = index.node_index_by_name("main").unwrap();
    let f_node = index.node_index_by_name("f").unwrap();
    assert!(index.nodes[main_node].reachable);
    assert!(index.nodes[f_node].reachable);
}
