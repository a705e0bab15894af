//! Object file (`.fcx.o`, §6): fixed little-endian header plus a
//! summary section. Code/IR sections are opaque byte blobs at this
//! layer — their producers live in `fc-backend`/`fcx-ir`.

use crate::error::{HmsoError, Result};
use crate::summary::{BehaviorFlags, CallSite, FunctionSummary, MemoryAccessFlags};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC: u32 = 0x4F58_4346; // "FCXO"
pub const VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct ObjectHeader {
    pub code_offset: u64,
    pub code_size: u64,
    pub ir_offset: u64,
    pub ir_size: u64,
    pub summary_offset: u64,
    pub summary_size: u64,
    pub profile_offset: u64,
    pub profile_size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectFile {
    pub header: ObjectHeader,
    pub code: Vec<u8>,
    pub ir: Vec<u8>,
    pub functions: Vec<FunctionSummary>,
    pub profile: Vec<u8>,
}

fn write_string(w: &mut impl Write, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|_| HmsoError::Truncated("string bytes"))?;
    String::from_utf8(buf).map_err(|_| HmsoError::CorruptCache("non-utf8 string"))
}

fn write_summary_section(w: &mut impl Write, functions: &[FunctionSummary]) -> Result<()> {
    w.write_u32::<LittleEndian>(functions.len() as u32)?;
    for f in functions {
        write_string(w, &f.name)?;
        w.write_u64::<LittleEndian>(f.content_hash)?;
        w.write_u32::<LittleEndian>(f.instruction_count)?;
        w.write_u32::<LittleEndian>(f.basic_block_count)?;
        w.write_u32::<LittleEndian>(f.cyclomatic_complexity)?;
        w.write_u32::<LittleEndian>(f.behavior.to_bits())?;
        w.write_u32::<LittleEndian>(f.memory_access.to_bits())?;
        w.write_u32::<LittleEndian>(f.inline_cost)?;
        w.write_u32::<LittleEndian>(f.call_sites.len() as u32)?;
        for c in &f.call_sites {
            write_string(w, &c.callee_name)?;
            w.write_u32::<LittleEndian>(c.call_count)?;
        }
    }
    Ok(())
}

fn read_summary_section(r: &mut impl Read) -> Result<Vec<FunctionSummary>> {
    let num_functions = r.read_u32::<LittleEndian>()?;
    let mut out = Vec::with_capacity(num_functions as usize);
    for _ in 0..num_functions {
        let name = read_string(r)?;
        let content_hash = r.read_u64::<LittleEndian>()?;
        let instruction_count = r.read_u32::<LittleEndian>()?;
        let basic_block_count = r.read_u32::<LittleEndian>()?;
        let cyclomatic_complexity = r.read_u32::<LittleEndian>()?;
        let behavior = BehaviorFlags::from_bits(r.read_u32::<LittleEndian>()?);
        let memory_access = MemoryAccessFlags::from_bits(r.read_u32::<LittleEndian>()?);
        let inline_cost = r.read_u32::<LittleEndian>()?;
        let num_callsites = r.read_u32::<LittleEndian>()?;
        let mut call_sites = Vec::with_capacity(num_callsites as usize);
        for _ in 0..num_callsites {
            let callee_name = read_string(r)?;
            let call_count = r.read_u32::<LittleEndian>()?;
            call_sites.push(CallSite { callee_name, call_count, argument_count: 0, indirect: false, tail: false });
        }
        out.push(FunctionSummary {
            name,
            content_hash,
            instruction_count,
            basic_block_count,
            cyclomatic_complexity,
            loop_depth_max: 0,
            behavior,
            memory_access,
            call_sites,
            inline_cost,
        });
    }
    Ok(out)
}

impl ObjectFile {
    pub fn write(&self, w: &mut impl Write) -> Result<()> {
        let mut summary_bytes = Vec::new();
        write_summary_section(&mut summary_bytes, &self.functions)?;

        let code_offset = 72u64; // 2 u32 + 8 u64 fixed header fields
        let ir_offset = code_offset + self.code.len() as u64;
        let summary_offset = ir_offset + self.ir.len() as u64;
        let profile_offset = summary_offset + summary_bytes.len() as u64;

        w.write_u32::<LittleEndian>(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_u64::<LittleEndian>(code_offset)?;
        w.write_u64::<LittleEndian>(self.code.len() as u64)?;
        w.write_u64::<LittleEndian>(ir_offset)?;
        w.write_u64::<LittleEndian>(self.ir.len() as u64)?;
        w.write_u64::<LittleEndian>(summary_offset)?;
        w.write_u64::<LittleEndian>(summary_bytes.len() as u64)?;
        if self.profile.is_empty() {
            w.write_u64::<LittleEndian>(0)?;
            w.write_u64::<LittleEndian>(0)?;
        } else {
            w.write_u64::<LittleEndian>(profile_offset)?;
            w.write_u64::<LittleEndian>(self.profile.len() as u64)?;
        }

        w.write_all(&self.code)?;
        w.write_all(&self.ir)?;
        w.write_all(&summary_bytes)?;
        w.write_all(&self.profile)?;
        Ok(())
    }

    /// Reads only the header and summary section (lazy IR load, §4.6):
    /// `code`/`ir` are left empty until a consumer asks for them
    /// specifically via `read_full`.
    pub fn read_summary_only(bytes: &[u8]) -> Result<(ObjectHeader, Vec<FunctionSummary>)> {
        let mut cursor = std::io::Cursor::new(bytes);
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(HmsoError::BadMagic { expected: MAGIC, actual: magic });
        }
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(HmsoError::UnsupportedVersion(version));
        }
        let header = ObjectHeader {
            code_offset: cursor.read_u64::<LittleEndian>()?,
            code_size: cursor.read_u64::<LittleEndian>()?,
            ir_offset: cursor.read_u64::<LittleEndian>()?,
            ir_size: cursor.read_u64::<LittleEndian>()?,
            summary_offset: cursor.read_u64::<LittleEndian>()?,
            summary_size: cursor.read_u64::<LittleEndian>()?,
            profile_offset: cursor.read_u64::<LittleEndian>()?,
            profile_size: cursor.read_u64::<LittleEndian>()?,
        };
        let start = header.summary_offset as usize;
        let end = start
            .checked_add(header.summary_size as usize)
            .filter(|&e| e <= bytes.len())
            .ok_or(HmsoError::Truncated("summary section"))?;
        let mut summary_cursor = std::io::Cursor::new(&bytes[start..end]);
        let functions = read_summary_section(&mut summary_cursor)?;
        Ok((header, functions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{BehaviorFlags, MemoryAccessFlags};

    fn sample_summary() -> FunctionSummary {
        FunctionSummary {
            name: "f".to_string(),
            content_hash: 0xDEADBEEF,
            instruction_count: 5,
            basic_block_count: 1,
            cyclomatic_complexity: 1,
            loop_depth_max: 0,
            behavior: BehaviorFlags { pure: true, ..Default::default() },
            memory_access: MemoryAccessFlags::default(),
            call_sites: vec![CallSite { callee_name: "g".into(), call_count: 3, argument_count: 1, indirect: false, tail: false }],
            inline_cost: 7,
        }
    }

    #[test]
    fn write_then_read_summary_round_trips() {
        let obj = ObjectFile {
            header: ObjectHeader::default(),
            code: vec![0xAA; 16],
            ir: vec![0xBB; 8],
            functions: vec![sample_summary()],
            profile: Vec::new(),
        };
        let mut bytes = Vec::new();
        obj.write(&mut bytes).unwrap();

        let (_header, functions) = ObjectFile::read_summary_only(&bytes).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "f");
        assert_eq!(functions[0].content_hash, 0xDEADBEEF);
        assert_eq!(functions[0].call_sites[0].callee_name, "g");
        assert_eq!(functions[0].call_sites[0].call_count, 3);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = [0u8; 32];
        let err = ObjectFile::read_summary_only(&bytes).unwrap_err();
        assert!(matches!(err, HmsoError::BadMagic { .. }));
    }

    proptest::proptest! {
        /// Summary serialize -> deserialize -> serialize produces
        /// byte-identical output (§8 "round-trip and idempotence laws").
        #[test]
        fn summary_round_trip_is_byte_identical_on_the_second_write(
            name in "[a-z][a-z0-9_]{0,15}",
            content_hash in proptest::prelude::any::<u64>(),
            instruction_count in 0u32..10_000,
            basic_block_count in 0u32..1_000,
            inline_cost in 0u32..100_000,
            callee_name in "[a-z][a-z0-9_]{0,15}",
            call_count in 0u32..1_000,
        ) {
            let summary = FunctionSummary {
                name,
                content_hash,
                instruction_count,
                basic_block_count,
                cyclomatic_complexity: 1,
                loop_depth_max: 0,
                behavior: BehaviorFlags { pure: true, leaf: true, ..Default::default() },
                memory_access: MemoryAccessFlags { read: true, ..Default::default() },
                call_sites: vec![CallSite { callee_name, call_count, argument_count: 0, indirect: false, tail: false }],
                inline_cost,
            };
            let obj = ObjectFile { header: ObjectHeader::default(), code: vec![], ir: vec![], functions: vec![summary], profile: vec![] };

            let mut first_bytes = Vec::new();
            obj.write(&mut first_bytes).unwrap();
            let (_, functions) = ObjectFile::read_summary_only(&first_bytes).unwrap();
            let round_tripped = ObjectFile { functions, ..obj.clone() };

            let mut second_bytes = Vec::new();
            round_tripped.write(&mut second_bytes).unwrap();

            proptest::prop_assert_eq!(first_bytes, second_bytes);
        }
    }
}
