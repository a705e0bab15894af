//! Builder API: pure mutators over a function's current block. Builders
//! append exactly one instruction and allocate no transitive state beyond
//! what the instruction's variant needs (§4.1).

use crate::error::{IrError, Result};
use crate::function::Function;
use crate::inst::*;
use crate::ty::NumType;
use crate::vreg::VReg;
use smallvec::SmallVec;

/// Wraps a [`Function`] and tracks the block instructions are currently
/// appended to, plus the set of block ids considered "reserved" so that
/// branch/jump targets can be validated as they're emitted.
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current: BlockId,
    line: u32,
}

impl<'f> FunctionBuilder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        let entry = func.entry_block;
        Self { func, current: entry, line: 0 }
    }

    /// Set the source-line number attached to subsequently appended
    /// instructions.
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn set_current_block(&mut self, id: BlockId) -> Result<()> {
        if self.func.block(id).is_none() {
            return Err(IrError::DetachedBlock);
        }
        self.current = id;
        Ok(())
    }

    /// Create a new block and reserve its id as a valid branch/jump
    /// target, without switching the builder's current block to it.
    pub fn create_block(&mut self) -> BlockId {
        self.func.fresh_block()
    }

    pub fn fresh_vreg(&mut self, ty: NumType) -> Result<VReg> {
        self.func.fresh_vreg(ty)
    }

    fn label_exists(&self, id: BlockId) -> bool {
        self.func.block(id).is_some()
    }

    fn push(&mut self, kind: InstKind) -> Result<()> {
        let labels: SmallVec<[BlockId; 2]> = match &kind {
            InstKind::Branch { true_block, false_block, .. } => {
                SmallVec::from_slice(&[*true_block, *false_block])
            }
            InstKind::Jump { target } => SmallVec::from_slice(&[*target]),
            InstKind::Phi { incoming, .. } => incoming.iter().map(|(b, _)| *b).collect(),
            _ => SmallVec::new(),
        };
        for label in labels {
            if !self.label_exists(label) {
                return Err(IrError::UnknownLabel(label));
            }
        }
        let block = self
            .func
            .block_mut(self.current)
            .ok_or(IrError::DetachedBlock)?;
        block.instructions.push(Instruction::new(kind, self.line));
        Ok(())
    }

    // --- constants ---

    pub fn const_int(&mut self, ty: NumType, value: i64) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::Const { dest, value })?;
        Ok(dest)
    }

    pub fn const_bigint(&mut self, ty: NumType, value: crate::bigint::BigInt) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::ConstBigInt { dest, value })?;
        Ok(dest)
    }

    // --- load/store/move ---

    pub fn load(&mut self, ty: NumType, addr: MemRef) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::Load { dest, addr })?;
        Ok(dest)
    }

    pub fn store(&mut self, addr: MemRef, value: VReg) -> Result<()> {
        self.push(InstKind::Store { addr, value })
    }

    pub fn mov(&mut self, src: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(src.ty)?;
        self.push(InstKind::Mov { dest, src })?;
        Ok(dest)
    }

    // --- arithmetic ---

    pub fn binop(&mut self, op: BinOpKind, lhs: VReg, rhs: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(lhs.ty)?;
        self.push(InstKind::BinOp { dest, op, lhs, rhs })?;
        Ok(dest)
    }

    pub fn unop(&mut self, op: UnOpKind, src: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(src.ty)?;
        self.push(InstKind::UnOp { dest, op, src })?;
        Ok(dest)
    }

    pub fn cmp(&mut self, op: CmpKind, signed: bool, lhs: VReg, rhs: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(NumType::Bool)?;
        self.push(InstKind::Cmp { dest, op, signed, lhs, rhs })?;
        Ok(dest)
    }

    // --- allocation family ---

    pub fn alloc(
        &mut self,
        ty: NumType,
        kind: AllocKind,
        size: VReg,
        align: u32,
        scope_or_type: Option<u32>,
    ) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::Alloc { dest, kind, size, align, scope_or_type })?;
        Ok(dest)
    }

    pub fn dealloc(&mut self, kind: DeallocKind, ptr: Option<VReg>, scope_or_type: Option<u32>) -> Result<()> {
        self.push(InstKind::Dealloc { kind, ptr, scope_or_type })
    }

    pub fn align_hint(&mut self, ptr: VReg, align: u32) -> Result<()> {
        self.push(InstKind::Align { ptr, align })
    }

    pub fn prefetch(&mut self, addr: VReg, write: bool) -> Result<()> {
        self.push(InstKind::Prefetch { addr, write })
    }

    // --- atomics ---

    pub fn atomic_load(&mut self, ty: NumType, addr: MemRef) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::AtomicLoad { dest, addr })?;
        Ok(dest)
    }

    pub fn atomic_store(&mut self, addr: MemRef, value: VReg) -> Result<()> {
        self.push(InstKind::AtomicStore { addr, value })
    }

    pub fn atomic_swap(&mut self, addr: MemRef, value: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(value.ty)?;
        self.push(InstKind::AtomicSwap { dest, addr, value })?;
        Ok(dest)
    }

    pub fn atomic_cas(&mut self, addr: MemRef, expected: VReg, new: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(new.ty)?;
        self.push(InstKind::AtomicCas { dest, addr, expected, new })?;
        Ok(dest)
    }

    pub fn atomic_fetch(&mut self, op: AtomicRmwOp, addr: MemRef, value: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(value.ty)?;
        self.push(InstKind::AtomicFetch { dest, op, addr, value })?;
        Ok(dest)
    }

    pub fn fence(&mut self, kind: FenceKind) -> Result<()> {
        self.push(InstKind::Fence { kind })
    }

    // --- syscall ---

    pub fn syscall(&mut self, dest_ty: Option<NumType>, number: VReg, args: SmallVec<[VReg; 6]>) -> Result<Option<VReg>> {
        let dest = match dest_ty {
            Some(ty) => Some(self.fresh_vreg(ty)?),
            None => None,
        };
        self.push(InstKind::Syscall { dest, number, args })?;
        Ok(dest)
    }

    // --- MMIO ---

    pub fn mmio_read(&mut self, ty: NumType, address: u64) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::MmioRead { dest, address })?;
        Ok(dest)
    }

    pub fn mmio_write(&mut self, address: u64, value: VReg) -> Result<()> {
        self.push(InstKind::MmioWrite { address, value })
    }

    // --- pointer arithmetic ---

    pub fn ptr_add(&mut self, ptr: VReg, offset: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(ptr.ty)?;
        self.push(InstKind::PtrAdd { dest, ptr, offset })?;
        Ok(dest)
    }

    pub fn ptr_sub(&mut self, ptr: VReg, offset: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(ptr.ty)?;
        self.push(InstKind::PtrSub { dest, ptr, offset })?;
        Ok(dest)
    }

    pub fn ptr_diff(&mut self, lhs: VReg, rhs: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(NumType::I64)?;
        self.push(InstKind::PtrDiff { dest, lhs, rhs })?;
        Ok(dest)
    }

    pub fn ptr_cast(&mut self, src: VReg, to: NumType) -> Result<VReg> {
        let dest = self.fresh_vreg(to)?;
        self.push(InstKind::PtrCast { dest, src })?;
        Ok(dest)
    }

    pub fn ptr_to_int(&mut self, src: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(NumType::U64)?;
        self.push(InstKind::PtrToInt { dest, src })?;
        Ok(dest)
    }

    pub fn int_to_ptr(&mut self, src: VReg, to: NumType) -> Result<VReg> {
        let dest = self.fresh_vreg(to)?;
        self.push(InstKind::IntToPtr { dest, src })?;
        Ok(dest)
    }

    pub fn field_offset(&mut self, base: VReg, offset: i64) -> Result<VReg> {
        let dest = self.fresh_vreg(base.ty)?;
        self.push(InstKind::FieldOffset { dest, base, offset })?;
        Ok(dest)
    }

    // --- control flow ---

    pub fn branch(&mut self, cond: VReg, true_block: BlockId, false_block: BlockId) -> Result<()> {
        self.push(InstKind::Branch { cond, true_block, false_block })
    }

    pub fn jump(&mut self, target: BlockId) -> Result<()> {
        self.push(InstKind::Jump { target })
    }

    pub fn call(
        &mut self,
        dest_ty: Option<NumType>,
        name: impl Into<String>,
        args: SmallVec<[VReg; 6]>,
        tail: bool,
        indirect: bool,
    ) -> Result<Option<VReg>> {
        let dest = match dest_ty {
            Some(ty) => Some(self.fresh_vreg(ty)?),
            None => None,
        };
        self.push(InstKind::Call { dest, name: name.into(), args, tail, indirect })?;
        Ok(dest)
    }

    pub fn ret(&mut self, value: Option<VReg>) -> Result<()> {
        self.push(InstKind::Return { value })
    }

    pub fn phi(&mut self, ty: NumType, incoming: Vec<(BlockId, VReg)>) -> Result<VReg> {
        let dest = self.fresh_vreg(ty)?;
        self.push(InstKind::Phi { dest, incoming })?;
        Ok(dest)
    }

    // --- SIMD ---

    pub fn simd_binop(&mut self, op: SimdOpKind, lhs: VReg, rhs: VReg) -> Result<VReg> {
        let dest = self.fresh_vreg(lhs.ty)?;
        self.push(InstKind::SimdBinOp { dest, op, lhs, rhs })?;
        Ok(dest)
    }

    // --- inline assembly ---

    pub fn inline_asm(&mut self, payload: InlineAsmPayload) -> Result<()> {
        self.push(InstKind::InlineAsm(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appending_to_unreserved_label_fails() {
        let mut f = Function::new("f", vec![], NumType::Void);
        let mut b = FunctionBuilder::new(&mut f);
        let cond = b.const_int(NumType::Bool, 1).unwrap();
        let err = b.branch(cond, 99, 98).unwrap_err();
        assert_eq!(err, IrError::UnknownLabel(99));
    }

    #[test]
    fn branch_to_reserved_labels_succeeds() {
        let mut f = Function::new("f", vec![], NumType::Void);
        let mut b = FunctionBuilder::new(&mut f);
        let cond = b.const_int(NumType::Bool, 1).unwrap();
        let t = b.create_block();
        let e = b.create_block();
        assert!(b.branch(cond, t, e).is_ok());
    }

    #[test]
    fn const_then_add_keeps_single_definition() {
        let mut f = Function::new("f", vec![], NumType::I64);
        let mut b = FunctionBuilder::new(&mut f);
        let x = b.const_int(NumType::I64, 2).unwrap();
        let y = b.const_int(NumType::I64, 3).unwrap();
        let _ = b.binop(BinOpKind::Add, x, y).unwrap();
        assert!(f.verify_single_definition().is_ok());
    }
}
