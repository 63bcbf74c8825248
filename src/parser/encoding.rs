//! Binary format constants and the writing half of the LEB128 / float codecs.
//!
//! All writers append to a caller-provided `&mut Vec<u8>`.

use byteorder::{LittleEndian, WriteBytesExt};

pub const MAGIC: u32 = 0x6d73_6100; // '\0asm'
pub const VERSION: u32 = 1;

// Section IDs
pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_TABLE: u8 = 4;
pub const SECTION_MEMORY: u8 = 5;
pub const SECTION_GLOBAL: u8 = 6;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_START: u8 = 8;
pub const SECTION_ELEMENT: u8 = 9;
pub const SECTION_CODE: u8 = 10;
pub const SECTION_DATA: u8 = 11;
pub const SECTION_DATA_COUNT: u8 = 12;

pub const TYPE_FUNC: u8 = 0x60;

// Import/export descriptor tags
pub const DESC_FUNC: u8 = 0x00;
pub const DESC_TABLE: u8 = 0x01;
pub const DESC_MEMORY: u8 = 0x02;
pub const DESC_GLOBAL: u8 = 0x03;

// Value types
pub const VALTYPE_I32: u8 = 0x7f;
pub const VALTYPE_I64: u8 = 0x7e;
pub const VALTYPE_F32: u8 = 0x7d;
pub const VALTYPE_F64: u8 = 0x7c;
pub const VALTYPE_V128: u8 = 0x7b;
pub const VALTYPE_FUNCREF: u8 = 0x70;
pub const VALTYPE_EXTERNREF: u8 = 0x6f;

pub const LIMITS_MIN: u8 = 0x00;
pub const LIMITS_MIN_MAX: u8 = 0x01;

// Opcodes for the supported instruction subset
pub const OP_UNREACHABLE: u8 = 0x00;
pub const OP_NOP: u8 = 0x01;
pub const OP_END: u8 = 0x0b;
pub const OP_RETURN: u8 = 0x0f;
pub const OP_CALL: u8 = 0x10;
pub const OP_DROP: u8 = 0x1a;
pub const OP_LOCAL_GET: u8 = 0x20;
pub const OP_LOCAL_SET: u8 = 0x21;
pub const OP_LOCAL_TEE: u8 = 0x22;
pub const OP_GLOBAL_GET: u8 = 0x23;
pub const OP_GLOBAL_SET: u8 = 0x24;
pub const OP_I32_CONST: u8 = 0x41;
pub const OP_I64_CONST: u8 = 0x42;
pub const OP_F32_CONST: u8 = 0x43;
pub const OP_F64_CONST: u8 = 0x44;
pub const OP_I32_ADD: u8 = 0x6a;
pub const OP_I64_ADD: u8 = 0x7c;

// ---------------------------------------------------------------------------
// LEB128
// ---------------------------------------------------------------------------

fn write_vu(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn write_vs(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

pub fn write_vu32(buf: &mut Vec<u8>, v: u32) {
    write_vu(buf, v as u64);
}

pub fn write_vs32(buf: &mut Vec<u8>, v: i32) {
    write_vs(buf, v as i64);
}

pub fn write_vs64(buf: &mut Vec<u8>, v: i64) {
    write_vs(buf, v);
}

// ---------------------------------------------------------------------------
// Floats and names
// ---------------------------------------------------------------------------

pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    // writing into a Vec cannot fail
    let _ = buf.write_f32::<LittleEndian>(v);
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    let _ = buf.write_f64::<LittleEndian>(v);
}

/// Length-prefixed UTF-8 name.
pub fn write_name(buf: &mut Vec<u8>, name: &str) {
    write_vu32(buf, name.len() as u32);
    buf.extend_from_slice(name.as_bytes());
}

/// `section_id: u8 | byte_length: vu32 | contents`
pub fn write_section(buf: &mut Vec<u8>, id: u8, contents: &[u8]) {
    buf.push(id);
    write_vu32(buf, contents.len() as u32);
    buf.extend_from_slice(contents);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_vu32() {
        let emit = |v: u32| {
            let mut buf = Vec::new();
            write_vu32(&mut buf, v);
            buf
        };

        assert_eq!(emit(0), vec![0]);
        assert_eq!(emit(624485), vec![0b11100101, 0b10001110, 0b00100110]);
        assert_eq!(emit(0xffffffff), vec![0xff, 0xff, 0xff, 0xff, 0xf]);
    }

    #[test]
    fn test_write_vs64() {
        let emit = |v: i64| {
            let mut buf = Vec::new();
            write_vs64(&mut buf, v);
            buf
        };

        assert_eq!(emit(-1), vec![0x7f]);
        assert_eq!(emit(-128), vec![0x80, 0x7f]);
        assert_eq!(emit(i64::MIN), vec![128, 128, 128, 128, 128, 128, 128, 128, 128, 127]);
    }

    #[test]
    fn test_write_section() {
        let mut buf = Vec::new();
        write_section(&mut buf, SECTION_START, &[3]);
        assert_eq!(buf, vec![8, 1, 3]);
    }
}
