//! Virtual registers, including the pre-colored ids reserved for specific
//! System V AMD64 physical registers (§3).

use crate::ty::NumType;
use std::fmt;

/// Lowest pre-colored id; ids in `[PRECOLORED_MIN, PRECOLORED_MAX]` denote
/// a specific physical register and must survive lowering unchanged.
pub const PRECOLORED_MIN: u32 = 1000;
pub const PRECOLORED_MAX: u32 = 1015;

/// A dense virtual register id, tagged with its value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg {
    pub id: u32,
    pub ty: NumType,
}

impl VReg {
    pub fn new(id: u32, ty: NumType) -> Self {
        debug_assert!(id >= 1, "VReg ids are dense and start at 1");
        Self { id, ty }
    }

    pub fn is_precolored(self) -> bool {
        (PRECOLORED_MIN..=PRECOLORED_MAX).contains(&self.id)
    }

    pub fn byte_size(self) -> u32 {
        self.ty.byte_size()
    }

    /// Physical register this id denotes, if it is pre-colored.
    pub fn physical(self) -> Option<PhysReg> {
        PhysReg::from_precolored_id(self.id)
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.id)
    }
}

/// System V AMD64 argument/return registers reachable by pre-coloring.
/// Ids `1008..=1014` are reserved but currently unnamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysReg {
    Rax,
    Rdi,
    Rsi,
    Rdx,
    R10,
    R8,
    R9,
    Rcx,
    R11,
}

impl PhysReg {
    pub fn from_precolored_id(id: u32) -> Option<Self> {
        match id {
            1000 => Some(PhysReg::Rax),
            1001 => Some(PhysReg::Rdi),
            1002 => Some(PhysReg::Rsi),
            1003 => Some(PhysReg::Rdx),
            1004 => Some(PhysReg::R10),
            1005 => Some(PhysReg::R8),
            1006 => Some(PhysReg::R9),
            1007 => Some(PhysReg::Rcx),
            1015 => Some(PhysReg::R11),
            _ => None,
        }
    }

    pub fn precolored_id(self) -> u32 {
        match self {
            PhysReg::Rax => 1000,
            PhysReg::Rdi => 1001,
            PhysReg::Rsi => 1002,
            PhysReg::Rdx => 1003,
            PhysReg::R10 => 1004,
            PhysReg::R8 => 1005,
            PhysReg::R9 => 1006,
            PhysReg::Rcx => 1007,
            PhysReg::R11 => 1015,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PhysReg::Rax => "rax",
            PhysReg::Rdi => "rdi",
            PhysReg::Rsi => "rsi",
            PhysReg::Rdx => "rdx",
            PhysReg::R10 => "r10",
            PhysReg::R8 => "r8",
            PhysReg::R9 => "r9",
            PhysReg::Rcx => "rcx",
            PhysReg::R11 => "r11",
        }
    }

    /// System V AMD64 integer-argument registers, in call order.
    pub const ARG_ORDER: [PhysReg; 6] = [
        PhysReg::Rdi,
        PhysReg::Rsi,
        PhysReg::Rdx,
        PhysReg::Rcx,
        PhysReg::R8,
        PhysReg::R9,
    ];

    /// Syscall argument registers, in call order (note: arg 4 is `r10`,
    /// not `rcx`, per the Linux syscall ABI).
    pub const SYSCALL_ARG_ORDER: [PhysReg; 6] = [
        PhysReg::Rdi,
        PhysReg::Rsi,
        PhysReg::Rdx,
        PhysReg::R10,
        PhysReg::R8,
        PhysReg::R9,
    ];
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precolored_round_trips() {
        for id in PRECOLORED_MIN..=PRECOLORED_MAX {
            if let Some(phys) = PhysReg::from_precolored_id(id) {
                assert_eq!(phys.precolored_id(), id);
            }
        }
    }

    #[test]
    fn unreserved_precolored_ids_have_no_physical_register() {
        assert!(PhysReg::from_precolored_id(1008).is_none());
        assert!(PhysReg::from_precolored_id(1014).is_none());
    }

    #[test]
    fn non_precolored_vreg_is_not_precolored() {
        let v = VReg::new(42, NumType::I64);
        assert!(!v.is_precolored());
        assert!(v.physical().is_none());
    }
}
