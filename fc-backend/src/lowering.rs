//! FCx IR → FC IR lowering (§4.3): the per-opcode translation table plus
//! the handful of multi-instruction idioms (syscalls, CAS, branches) the
//! table calls out by name.

use crate::error::{BackendError, Result};
use crate::inst::{CallTarget, FcBlock, FcFunction, FcInst};
use crate::operand::{FcMemRef, FcOperand};
use crate::sentinel;
use fcx_ir::{
    AllocKind, BinOpKind, DeallocKind, Function, InstKind, NumType, PhysReg, VReg,
};

/// Element size used to scale typed-pointer arithmetic. The IR doesn't
/// track a pointee type beyond the pointer's own flavor, so this is the
/// "defaulting to 8" case §4.3 allows.
const TYPED_PTR_ELEMENT_SIZE: i64 = 8;

fn reg(v: VReg) -> FcOperand {
    FcOperand::Reg(v)
}

fn phys(p: PhysReg, ty: NumType) -> VReg {
    VReg::new(p.precolored_id(), ty)
}

/// Allocates FC-only temporaries (sentinel stash, scaled offsets,
/// materialized MMIO addresses) above every vreg id already in use by
/// the function being lowered, since FC IR shares FCx's numeric id space.
struct LoweringContext {
    next_fresh_id: u32,
}

impl LoweringContext {
    fn for_function(func: &Function) -> Self {
        let mut max_id = 0u32;
        for p in &func.params {
            max_id = max_id.max(p.id);
        }
        for block in &func.blocks {
            for inst in &block.instructions {
                if let Some(d) = inst.defined_vreg() {
                    max_id = max_id.max(d.id);
                }
                for u in inst.used_vregs() {
                    max_id = max_id.max(u.id);
                }
            }
        }
        Self { next_fresh_id: max_id.saturating_add(1).max(fcx_ir::PRECOLORED_MAX + 1) }
    }

    fn fresh(&mut self, ty: NumType) -> VReg {
        let id = self.next_fresh_id;
        self.next_fresh_id += 1;
        VReg::new(id, ty)
    }

    fn materialize_imm(&mut self, out: &mut Vec<FcInst>, value: i64, ty: NumType) -> VReg {
        let v = self.fresh(ty);
        out.push(FcInst::Mov { dest: reg(v), src: FcOperand::Imm(value) });
        v
    }
}

pub fn lower_function(func: &Function) -> Result<FcFunction> {
    if func.blocks.is_empty() {
        return Err(BackendError::EmptyFunction);
    }
    let mut ctx = LoweringContext::for_function(func);
    let mut out = FcFunction::new(func.name.clone());
    for block in &func.blocks {
        let mut fc_block = FcBlock::new(block.id);
        for inst in &block.instructions {
            lower_instruction(&mut ctx, &inst.kind, &mut fc_block.instructions)?;
        }
        out.blocks.push(fc_block);
    }
    Ok(out)
}

fn mem(base: VReg, offset: i64) -> FcMemRef {
    FcMemRef::simple(base, offset)
}

fn is_shift_or_rotate(op: BinOpKind) -> bool {
    matches!(op, BinOpKind::Shl | BinOpKind::ShrLogical | BinOpKind::ShrArith | BinOpKind::Rol | BinOpKind::Ror)
}

fn lower_instruction(
    ctx: &mut LoweringContext,
    kind: &InstKind,
    out: &mut Vec<FcInst>,
) -> Result<()> {
    match kind {
        InstKind::Const { dest, value } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::Imm(*value) });
        }
        InstKind::ConstBigInt { dest, value } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::BigImm(value.clone()) });
        }
        InstKind::Load { dest, addr } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::Mem(mem(addr.base, addr.offset)) });
        }
        InstKind::Store { addr, value } => {
            out.push(FcInst::Mov { dest: FcOperand::Mem(mem(addr.base, addr.offset)), src: reg(*value) });
        }
        InstKind::Mov { dest, src } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*src) });
        }
        InstKind::BinOp { dest, op, lhs, rhs } => lower_binop(ctx, *dest, *op, *lhs, *rhs, out),
        InstKind::UnOp { dest, op, src } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*src) });
            match op {
                fcx_ir::UnOpKind::Neg => out.push(FcInst::Neg { dest: *dest }),
                fcx_ir::UnOpKind::Not => out.push(FcInst::Not { dest: *dest }),
            }
        }
        InstKind::Cmp { dest, op, lhs, rhs, .. } => {
            out.push(FcInst::Cmp { left: reg(*lhs), right: reg(*rhs) });
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::Imm(sentinel::encode(*op)) });
        }
        InstKind::Alloc { dest, kind, size, align, scope_or_type } => {
            lower_alloc(ctx, *dest, *kind, *size, *align, *scope_or_type, out);
        }
        InstKind::Dealloc { kind, ptr, scope_or_type } => {
            lower_dealloc(ctx, *kind, *ptr, *scope_or_type, out);
        }
        InstKind::Align { .. } => {
            // Pure hint consumed by register allocation; nothing to lower.
        }
        InstKind::Prefetch { addr, write } => {
            let m = mem(*addr, 0);
            if *write {
                out.push(FcInst::Prefetchw { addr: m });
            } else {
                out.push(FcInst::Prefetcht0 { addr: m });
            }
        }
        InstKind::AtomicLoad { dest, addr } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::Mem(mem(addr.base, addr.offset)) });
        }
        InstKind::AtomicStore { addr, value } => {
            out.push(FcInst::Mov { dest: FcOperand::Mem(mem(addr.base, addr.offset)), src: reg(*value) });
        }
        InstKind::AtomicSwap { dest, addr, value } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*value) });
            out.push(FcInst::Xchg { addr: mem(addr.base, addr.offset), value: *dest });
        }
        InstKind::AtomicCas { dest, addr, expected, new } => {
            let rax = phys(PhysReg::Rax, expected.ty);
            out.push(FcInst::Mov { dest: reg(rax), src: reg(*expected) });
            out.push(FcInst::LockCmpxchg { addr: mem(addr.base, addr.offset), new: *new });
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(rax) });
        }
        InstKind::AtomicFetch { dest, op, addr, value } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*value) });
            out.push(FcInst::LockXadd { op: *op, addr: mem(addr.base, addr.offset), value: *dest });
        }
        InstKind::Fence { kind } => match kind {
            fcx_ir::FenceKind::Full => out.push(FcInst::Mfence),
            fcx_ir::FenceKind::Acquire => out.push(FcInst::Lfence),
            fcx_ir::FenceKind::Release => out.push(FcInst::Sfence),
        },
        InstKind::Syscall { dest, number, args } => lower_syscall(ctx, *dest, *number, args, out),
        InstKind::MmioRead { dest, address } => {
            let addr_reg = ctx.materialize_imm(out, *address as i64, NumType::U64);
            out.push(FcInst::Mov { dest: reg(*dest), src: FcOperand::Mem(mem(addr_reg, 0)) });
        }
        InstKind::MmioWrite { address, value } => {
            let addr_reg = ctx.materialize_imm(out, *address as i64, NumType::U64);
            out.push(FcInst::Mov { dest: FcOperand::Mem(mem(addr_reg, 0)), src: reg(*value) });
        }
        InstKind::PtrAdd { dest, ptr, offset } => lower_ptr_arith(ctx, *dest, *ptr, *offset, BinOpKind::Add, out)?,
        InstKind::PtrSub { dest, ptr, offset } => lower_ptr_arith(ctx, *dest, *ptr, *offset, BinOpKind::Sub, out)?,
        InstKind::PtrDiff { dest, lhs, rhs } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*lhs) });
            out.push(FcInst::Alu { op: BinOpKind::Sub, dest: *dest, src: reg(*rhs) });
        }
        InstKind::PtrCast { dest, src } | InstKind::PtrToInt { dest, src } | InstKind::IntToPtr { dest, src } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*src) });
        }
        InstKind::FieldOffset { dest, base, offset } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*base) });
            out.push(FcInst::Alu { op: BinOpKind::Add, dest: *dest, src: FcOperand::Imm(*offset) });
        }
        InstKind::Branch { cond, true_block, false_block } => {
            out.push(FcInst::Cmp { left: reg(*cond), right: FcOperand::Imm(0) });
            out.push(FcInst::Jcc { cond: fcx_ir::CmpKind::Ne, target: *true_block });
            out.push(FcInst::Jmp { target: *false_block });
        }
        InstKind::Jump { target } => out.push(FcInst::Jmp { target: *target }),
        InstKind::Call { dest, name, args, tail, indirect } => {
            lower_call(*dest, name, args, *tail, *indirect, out);
        }
        InstKind::Return { value } => {
            if let Some(v) = value {
                out.push(FcInst::Mov { dest: reg(phys(PhysReg::Rax, v.ty)), src: reg(*v) });
            }
            out.push(FcInst::Ret);
        }
        InstKind::Phi { .. } => {
            // Materialized as mutable slots at backend time; no FC-level op.
        }
        InstKind::SimdBinOp { dest, op, lhs, rhs } => {
            out.push(FcInst::Mov { dest: reg(*dest), src: reg(*lhs) });
            out.push(FcInst::SimdAlu { op: *op, dest: *dest, src: reg(*rhs) });
        }
        InstKind::InlineAsm(payload) => out.push(FcInst::InlineAsm(payload.clone())),
    }
    Ok(())
}

fn lower_binop(ctx: &mut LoweringContext, dest: VReg, op: BinOpKind, lhs: VReg, rhs: VReg, out: &mut Vec<FcInst>) {
    match op {
        BinOpKind::Div | BinOpKind::Mod => {
            out.push(FcInst::Mov { dest: reg(dest), src: reg(lhs) });
            let (quotient, remainder) = if matches!(op, BinOpKind::Div) {
                (dest, ctx.fresh(dest.ty))
            } else {
                (ctx.fresh(dest.ty), dest)
            };
            out.push(FcInst::Idiv { divisor: reg(rhs), quotient, remainder });
        }
        op if is_shift_or_rotate(op) || matches!(op, BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::And | BinOpKind::Or | BinOpKind::Xor) => {
            out.push(FcInst::Mov { dest: reg(dest), src: reg(lhs) });
            out.push(FcInst::Alu { op, dest, src: reg(rhs) });
        }
        _ => unreachable!("BinOpKind is exhaustively matched above"),
    }
}

fn lower_ptr_arith(
    ctx: &mut LoweringContext,
    dest: VReg,
    ptr: VReg,
    offset: VReg,
    op: BinOpKind,
    out: &mut Vec<FcInst>,
) -> Result<()> {
    match ptr.ty {
        NumType::RawPtr => return Err(BackendError::InvalidPointerArithmetic),
        NumType::TypedPtr => {
            let scaled = ctx.fresh(offset.ty);
            out.push(FcInst::Mov { dest: reg(scaled), src: reg(offset) });
            out.push(FcInst::Alu { op: BinOpKind::Mul, dest: scaled, src: FcOperand::Imm(TYPED_PTR_ELEMENT_SIZE) });
            out.push(FcInst::Mov { dest: reg(dest), src: reg(ptr) });
            out.push(FcInst::Alu { op, dest, src: reg(scaled) });
        }
        _ => {
            // BytePtr, and any other flavor: unscaled.
            out.push(FcInst::Mov { dest: reg(dest), src: reg(ptr) });
            out.push(FcInst::Alu { op, dest, src: reg(offset) });
        }
    }
    Ok(())
}

fn lower_alloc(
    ctx: &mut LoweringContext,
    dest: VReg,
    kind: AllocKind,
    size: VReg,
    align: u32,
    scope_or_type: Option<u32>,
    out: &mut Vec<FcInst>,
) {
    let imm_ty = NumType::U64;
    let (name, args): (&str, smallvec::SmallVec<[VReg; 6]>) = match kind {
        AllocKind::Heap => {
            let align_reg = ctx.materialize_imm(out, align as i64, imm_ty);
            ("_fcx_alloc", smallvec::smallvec![size, align_reg])
        }
        AllocKind::Stack => {
            let align_reg = ctx.materialize_imm(out, 16, imm_ty);
            ("_fcx_alloc", smallvec::smallvec![size, align_reg])
        }
        AllocKind::Arena => {
            let align_reg = ctx.materialize_imm(out, align as i64, imm_ty);
            let scope_reg = ctx.materialize_imm(out, scope_or_type.unwrap_or(0) as i64, imm_ty);
            ("_fcx_arena_alloc", smallvec::smallvec![size, align_reg, scope_reg])
        }
        AllocKind::Slab => {
            let type_hash_reg = ctx.materialize_imm(out, scope_or_type.unwrap_or(0) as i64, imm_ty);
            ("_fcx_slab_alloc", smallvec::smallvec![size, type_hash_reg])
        }
    };
    out.push(FcInst::ExternCall { name: name.to_string(), args });
    out.push(FcInst::Mov { dest: reg(dest), src: reg(phys(PhysReg::Rax, dest.ty)) });
}

fn lower_dealloc(
    ctx: &mut LoweringContext,
    kind: DeallocKind,
    ptr: Option<VReg>,
    scope_or_type: Option<u32>,
    out: &mut Vec<FcInst>,
) {
    let imm_ty = NumType::U64;
    match kind {
        DeallocKind::Heap => {
            let ptr = ptr.expect("heap dealloc always carries a pointer");
            out.push(FcInst::ExternCall { name: "_fcx_free".to_string(), args: smallvec::smallvec![ptr] });
        }
        DeallocKind::Slab => {
            let ptr = ptr.expect("slab dealloc always carries a pointer");
            let type_hash = ctx.materialize_imm(out, scope_or_type.unwrap_or(0) as i64, imm_ty);
            out.push(FcInst::ExternCall {
                name: "_fcx_slab_free".to_string(),
                args: smallvec::smallvec![ptr, type_hash],
            });
        }
        DeallocKind::ArenaReset => {
            let scope = ctx.materialize_imm(out, scope_or_type.unwrap_or(0) as i64, imm_ty);
            out.push(FcInst::ExternCall { name: "_fcx_arena_reset".to_string(), args: smallvec::smallvec![scope] });
        }
    }
}

fn lower_syscall(
    ctx: &mut LoweringContext,
    dest: Option<VReg>,
    number: VReg,
    args: &[VReg],
    out: &mut Vec<FcInst>,
) {
    let rcx = phys(PhysReg::Rcx, NumType::I64);
    let r11 = phys(PhysReg::R11, NumType::I64);
    out.push(FcInst::Push(rcx));
    out.push(FcInst::Push(r11));
    for (i, arg) in args.iter().enumerate().rev() {
        let target = phys(PhysReg::SYSCALL_ARG_ORDER[i], arg.ty);
        out.push(FcInst::Mov { dest: reg(target), src: reg(*arg) });
    }
    let rax = phys(PhysReg::Rax, number.ty);
    out.push(FcInst::Mov { dest: reg(rax), src: reg(number) });
    out.push(FcInst::Syscall);
    if let Some(d) = dest {
        out.push(FcInst::Mov { dest: reg(d), src: reg(phys(PhysReg::Rax, d.ty)) });
    }
    out.push(FcInst::Pop(r11));
    out.push(FcInst::Pop(rcx));
    let _ = ctx; // reserved for a future caller-saved temp if argument count grows
}

/// A callee named with either prefix routes through the external ABI
/// path (§4.3 CALL row) rather than an ordinary direct/indirect call.
fn is_external_abi_call(name: &str) -> bool {
    name.starts_with("_fcx_") || name.starts_with("_external_")
}

fn lower_call(
    dest: Option<VReg>,
    name: &str,
    args: &[VReg],
    tail: bool,
    indirect: bool,
    out: &mut Vec<FcInst>,
) {
    if is_external_abi_call(name) {
        out.push(FcInst::ExternCall { name: name.to_string(), args: args.iter().copied().collect() });
    } else {
        for (i, arg) in args.iter().enumerate().rev() {
            let target = phys(PhysReg::ARG_ORDER[i], arg.ty);
            out.push(FcInst::Mov { dest: reg(target), src: reg(*arg) });
        }
        out.push(FcInst::Call(CallTarget { name: name.to_string(), tail, indirect }));
    }
    if let Some(d) = dest {
        out.push(FcInst::Mov { dest: reg(d), src: reg(phys(PhysReg::Rax, d.ty)) });
    }
}
