//! Functions: ordered parameter list, ordered blocks, and the monotonic
//! id counters builders draw fresh VRegs and block ids from (§3).

use crate::block::BasicBlock;
use crate::error::{IrError, Result};
use crate::inst::BlockId;
use crate::ty::NumType;
use crate::vreg::VReg;
use rustc_hash::FxHashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<VReg>,
    pub return_ty: NumType,
    pub blocks: Vec<BasicBlock>,
    pub entry_block: BlockId,
    next_vreg: u32,
    next_block: u32,
}

impl Function {
    /// Creates a function whose entry block is already reserved as block 0
    /// and whose VReg counter starts past any pre-colored id range used by
    /// `params`.
    pub fn new(name: impl Into<String>, params: Vec<VReg>, return_ty: NumType) -> Self {
        let entry = BasicBlock::new(0);
        let start_vreg = params
            .iter()
            .map(|p| p.id + 1)
            .max()
            .unwrap_or(1)
            .max(1);
        let mut func = Self {
            name: name.into(),
            params,
            return_ty,
            blocks: vec![entry],
            entry_block: 0,
            next_vreg: start_vreg,
            next_block: 1,
        };
        func.blocks[0].is_entry = true;
        func
    }

    pub fn fresh_vreg(&mut self, ty: NumType) -> Result<VReg> {
        let id = self.next_vreg;
        self.next_vreg = self
            .next_vreg
            .checked_add(1)
            .ok_or(IrError::AllocationFailed)?;
        Ok(VReg::new(id, ty))
    }

    pub fn fresh_block(&mut self) -> BlockId {
        let id = self.next_block;
        self.next_block += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Label-consistency check (§8): every branch/jump/phi target must
    /// name a block that exists in this function.
    pub fn verify_label_consistency(&self) -> Result<()> {
        let ids: std::collections::HashSet<BlockId> = self.blocks.iter().map(|b| b.id).collect();
        for block in &self.blocks {
            for inst in &block.instructions {
                for label in inst.referenced_labels() {
                    if !ids.contains(&label) {
                        return Err(IrError::UnknownLabel(label));
                    }
                }
            }
        }
        Ok(())
    }

    /// Single-entry invariant (§3): exactly one block flagged `is_entry`.
    pub fn verify_single_entry(&self) -> Result<()> {
        let entries = self.blocks.iter().filter(|b| b.is_entry).count();
        if entries != 1 {
            return Err(IrError::MultipleEntryBlocks(self.name.clone()));
        }
        Ok(())
    }

    /// Single-definition invariant (§3, §8): a VReg is defined by at most
    /// one CONST/MOV/binary/unary/load/call instruction across the whole
    /// function. PHI and per-iteration loop writes are exempt because they
    /// rely on fresh ids per iteration rather than redefinition.
    pub fn verify_single_definition(&self) -> Result<()> {
        let mut defined: FxHashMap<u32, u32> = FxHashMap::default();
        for block in &self.blocks {
            for inst in &block.instructions {
                if matches!(inst.kind, crate::inst::InstKind::Phi { .. }) {
                    continue;
                }
                if let Some(dest) = inst.defined_vreg() {
                    let count = defined.entry(dest.id).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        return Err(IrError::DuplicateDefinition(dest.id));
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        writeln!(f, ") -> {:?} {{", self.return_ty)?;
        for block in &self.blocks {
            match &block.name {
                Some(name) => writeln!(f, "block{} ({name}):", block.id)?,
                None => writeln!(f, "block{}:", block.id)?,
            }
            for inst in &block.instructions {
                match inst.defined_vreg() {
                    Some(dest) => writeln!(f, "  {dest} = {:?} @{}", inst.kind, inst.line)?,
                    None => writeln!(f, "  {:?} @{}", inst.kind, inst.line)?,
                }
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vreg_starts_after_params() {
        let mut f = Function::new("f", vec![VReg::new(1, NumType::I64)], NumType::I64);
        let v = f.fresh_vreg(NumType::I64).unwrap();
        assert_eq!(v.id, 2);
    }

    #[test]
    fn fresh_block_appends_to_blocks() {
        let mut f = Function::new("f", vec![], NumType::Void);
        let b = f.fresh_block();
        assert_eq!(b, 1);
        assert_eq!(f.blocks.len(), 2);
    }

    #[test]
    fn single_entry_holds_by_construction() {
        let f = Function::new("f", vec![], NumType::Void);
        assert!(f.verify_single_entry().is_ok());
    }

    #[test]
    fn display_includes_name_params_and_block_labels() {
        let f = Function::new("add_one", vec![VReg::new(1, NumType::I64)], NumType::I64);
        let rendered = format!("{f}");
        assert!(rendered.starts_with("define add_one(%1) -> I64 {"));
        assert!(rendered.contains("block0:"));
    }
}
