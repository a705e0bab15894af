//! End-to-end lowering scenarios (§8): comparison+branch, syscall, and
//! atomic compare-and-swap, each checked against the exact instruction
//! sequence the lowering table promises.

use fc_backend::{lower_function, sentinel, FcInst, FcOperand};
use fcx_ir::{CmpKind, Function, FunctionBuilder, MemRef, NumType, PhysReg, VReg};
use smallvec::smallvec;

#[test]
fn cmp_gt_then_branch_lowers_to_cmp_sentinel_cmp_jcc_jmp() {
    let mut f = Function::new("cmp_gt", vec![VReg::new(2, NumType::I64), VReg::new(3, NumType::I64)], NumType::I64);
    {
        let mut b = FunctionBuilder::new(&mut f);
        let cond = b.cmp(CmpKind::Gt, true, VReg::new(2, NumType::I64), VReg::new(3, NumType::I64)).unwrap();
        b.branch(cond, 1, 2).unwrap();
    }
    let lowered = lower_function(&f).unwrap();
    let instrs = &lowered.blocks[0].instructions;

    assert!(matches!(instrs[0], FcInst::Cmp { .. }));
    assert!(matches!(&instrs[1], FcInst::Mov { src: FcOperand::Imm(v), .. } if *v == sentinel::encode(CmpKind::Gt)));
    assert!(matches!(instrs[2], FcInst::Cmp { .. }));
    assert!(matches!(instrs[3], FcInst::Jcc { cond: CmpKind::Ne, target: 1 }));
    assert!(matches!(instrs[4], FcInst::Jmp { target: 2 }));
}

#[test]
fn syscall_emits_push_reverse_args_syscall_pop_in_order() {
    let mut f = Function::new("write_syscall", vec![], NumType::I64);
    let fd = VReg::new(10, NumType::I64);
    let buf = VReg::new(11, NumType::I64);
    let len = VReg::new(12, NumType::I64);
    {
        let mut b = FunctionBuilder::new(&mut f);
        let num = b.const_int(NumType::I64, 1).unwrap();
        b.syscall(Some(NumType::I64), num, smallvec![fd, buf, len]).unwrap();
        b.ret(None).unwrap();
    }
    let lowered = lower_function(&f).unwrap();
    let instrs = &lowered.blocks[0].instructions;

    assert!(matches!(instrs[1], FcInst::Push(r) if r.id == PhysReg::Rcx.precolored_id()));
    assert!(matches!(instrs[2], FcInst::Push(r) if r.id == PhysReg::R11.precolored_id()));
    // reverse order: last argument moves first.
    assert!(matches!(&instrs[3], FcInst::Mov { dest: FcOperand::Reg(r), src: FcOperand::Reg(s) }
        if r.id == PhysReg::Rdx.precolored_id() && s.id == len.id));
    assert!(matches!(&instrs[4], FcInst::Mov { dest: FcOperand::Reg(r), src: FcOperand::Reg(s) }
        if r.id == PhysReg::Rsi.precolored_id() && s.id == buf.id));
    assert!(matches!(&instrs[5], FcInst::Mov { dest: FcOperand::Reg(r), src: FcOperand::Reg(s) }
        if r.id == PhysReg::Rdi.precolored_id() && s.id == fd.id));
    assert!(matches!(instrs[6], FcInst::Mov { dest: FcOperand::Reg(r), .. } if r.id == PhysReg::Rax.precolored_id()));
    assert!(matches!(instrs[7], FcInst::Syscall));
    assert!(matches!(instrs[9], FcInst::Pop(r) if r.id == PhysReg::R11.precolored_id()));
    assert!(matches!(instrs[10], FcInst::Pop(r) if r.id == PhysReg::Rcx.precolored_id()));
}

#[test]
fn atomic_cas_lowers_to_mov_rax_then_lock_cmpxchg_then_result_move() {
    let mut f = Function::new("cas", vec![VReg::new(1, NumType::TypedPtr)], NumType::I64);
    let expected = VReg::new(20, NumType::I64);
    let new = VReg::new(21, NumType::I64);
    let dest;
    {
        let mut b = FunctionBuilder::new(&mut f);
        dest = b.atomic_cas(MemRef { base: VReg::new(1, NumType::TypedPtr), offset: 0 }, expected, new).unwrap();
    }
    let lowered = lower_function(&f).unwrap();
    let instrs = &lowered.blocks[0].instructions;
    let cas_start = instrs.len() - 3;

    assert!(matches!(&instrs[cas_start], FcInst::Mov { dest: FcOperand::Reg(r), .. } if r.id == PhysReg::Rax.precolored_id()));
    assert!(matches!(&instrs[cas_start + 1], FcInst::LockCmpxchg { .. }));
    assert!(matches!(&instrs[cas_start + 2], FcInst::Mov { dest: FcOperand::Reg(r), src: FcOperand::Reg(s) }
        if r.id == dest.id && s.id == PhysReg::Rax.precolored_id()));
}
