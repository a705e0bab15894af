//! Comparison-result sentinel (§4.4): the one lowering convention that
//! leaks into the backend, so it gets its own tiny, stable module rather
//! than being inlined where CMP_* is lowered.

use fcx_ir::CmpKind;

fn condition_code(op: CmpKind) -> i64 {
    match op {
        CmpKind::Eq => 0,
        CmpKind::Ne => 1,
        CmpKind::Lt => 2,
        CmpKind::Le => 3,
        CmpKind::Gt => 4,
        CmpKind::Ge => 5,
    }
}

fn from_condition_code(code: i64) -> Option<CmpKind> {
    match code {
        0 => Some(CmpKind::Eq),
        1 => Some(CmpKind::Ne),
        2 => Some(CmpKind::Lt),
        3 => Some(CmpKind::Le),
        4 => Some(CmpKind::Gt),
        5 => Some(CmpKind::Ge),
        _ => None,
    }
}

/// `sentinel = -(condition_code + 1000)`.
pub fn encode(op: CmpKind) -> i64 {
    -(condition_code(op) + 1000)
}

/// Recovers the condition code from a sentinel value, if `value` is one.
/// A real folded boolean constant is always 0 or 1, so any negative
/// value with magnitude ≥ 1001 is unambiguously a sentinel.
pub fn decode(value: i64) -> Option<CmpKind> {
    if value >= -1 {
        return None;
    }
    from_condition_code(-value - 1000)
}
