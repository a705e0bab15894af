//! Basic blocks: an ordered instruction sequence plus predecessor and
//! successor id vectors (non-owning references, §3).

use crate::inst::{BlockId, Instruction};

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: Option<String>,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
    pub is_entry: bool,
    pub is_exit: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            name: None,
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            is_entry: false,
            is_exit: false,
        }
    }

    pub fn with_name(id: BlockId, name: impl Into<String>) -> Self {
        let mut block = Self::new(id);
        block.name = Some(name.into());
        block
    }

    /// Whether the last instruction terminates the block (branch, jump,
    /// or return). A block without one relies on structural fallthrough
    /// to the next block in function order (§3).
    pub fn has_explicit_terminator(&self) -> bool {
        use crate::inst::InstKind::*;
        matches!(
            self.instructions.last().map(|i| &i.kind),
            Some(Branch { .. }) | Some(Jump { .. }) | Some(Return { .. })
        )
    }
}
