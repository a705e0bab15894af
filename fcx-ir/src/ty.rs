//! Numeric and pointer type tags carried by every virtual register.

/// The closed set of value types a [`crate::vreg::VReg`] can carry (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumType {
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
    I512,
    I1024,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    U512,
    U1024,
    F32,
    F64,
    Bool,
    Void,
    /// Scaled-arithmetic pointer: `PTR_ADD` multiplies the offset by the
    /// pointee's size.
    TypedPtr,
    /// Arithmetic-free pointer: `PTR_ADD`/`PTR_SUB` are rejected at
    /// lowering time (§4.3).
    RawPtr,
    /// Byte-addressed pointer: `PTR_ADD` adds the raw offset, unscaled.
    BytePtr,
}

impl NumType {
    /// Byte size implied by the type tag. Pointer flavors are always
    /// 8 bytes on the System V AMD64 target this IR lowers to.
    pub fn byte_size(self) -> u32 {
        match self {
            NumType::I8 | NumType::U8 | NumType::Bool => 1,
            NumType::I16 | NumType::U16 => 2,
            NumType::I32 | NumType::U32 | NumType::F32 => 4,
            NumType::I64 | NumType::U64 | NumType::F64 => 8,
            NumType::I128 | NumType::U128 => 16,
            NumType::I256 | NumType::U256 => 32,
            NumType::I512 | NumType::U512 => 64,
            NumType::I1024 | NumType::U1024 => 128,
            NumType::Void => 0,
            NumType::TypedPtr | NumType::RawPtr | NumType::BytePtr => 8,
        }
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, NumType::TypedPtr | NumType::RawPtr | NumType::BytePtr)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            NumType::I8
                | NumType::I16
                | NumType::I32
                | NumType::I64
                | NumType::I128
                | NumType::I256
                | NumType::I512
                | NumType::I1024
                | NumType::U8
                | NumType::U16
                | NumType::U32
                | NumType::U64
                | NumType::U128
                | NumType::U256
                | NumType::U512
                | NumType::U1024
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            NumType::U8
                | NumType::U16
                | NumType::U32
                | NumType::U64
                | NumType::U128
                | NumType::U256
                | NumType::U512
                | NumType::U1024
        )
    }

    /// Whether this type fits in a single 64-bit machine word, i.e. does
    /// not require the fixed-capacity bigint representation.
    pub fn is_machine_word(self) -> bool {
        self.is_integer() && self.byte_size() <= 8
    }
}
