//! Binary format decoder
//!
//! Reads `.wasm` bytes into a [`module::Module`], validating the parts of the
//! module the host bridge depends on: import/export declarations, global
//! initialisers and straight-line function bodies.

pub mod encoding;
pub mod instruction;
pub mod module;
pub mod reader;
pub mod validate;

use std::io;

use thiserror::Error;
use tracing::{debug, trace};

use encoding::*;
use instruction::DecodeError;
use module::{
    Export, ExportIndex, ExternalKind, Function, FunctionBody, FunctionType, Global, GlobalType, Import, Limits,
    Locals, Module, TableType, ValueType,
};
use reader::Reader;
use validate::ValidationError;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("magic header not detected: {0}")]
    BadMagic(String),

    #[error("unknown binary version: {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected end: {0}")]
    UnexpectedEof(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("malformed section id: {0}")]
    UnknownSection(u8),

    #[error("unexpected content after section #{0}")]
    SectionOrder(u8),

    #[error("section size mismatch in section #{0}")]
    SectionSizeMismatch(u8),

    #[error("malformed external kind {tag:#04x} at offset {offset}")]
    MalformedKind { tag: u8, offset: usize },

    #[error("unsupported opcode {opcode:#04x} in function {function}")]
    UnsupportedOpcode { opcode: u8, function: u32 },

    #[error("too many locals")]
    TooManyLocals,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => ParseError::UnexpectedEof(e.to_string()),
            _ => ParseError::Malformed(e.to_string()),
        }
    }
}

impl From<DecodeError> for ParseError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Io(e) => e.into(),
            other => ParseError::Malformed(other.to_string()),
        }
    }
}

pub fn parse(name: &str, reader: &mut Reader) -> Result<Module, ParseError> {
    let mut module = Module::new(name);

    read_header(reader)?;

    let mut last_id = SECTION_CUSTOM;
    while !reader.is_empty() {
        let sec_id = reader.read_byte()?;
        let sec_len = reader.read_vu32()? as usize;
        if !reader.has_at_least(sec_len) {
            return Err(ParseError::UnexpectedEof(format!(
                "not enough bytes left for section #{}, expected {}, got {}",
                sec_id,
                sec_len,
                reader.remaining()
            )));
        }
        let mut section = reader.sub_reader(sec_len)?;

        if sec_id != SECTION_CUSTOM {
            if sec_id > SECTION_DATA_COUNT {
                return Err(ParseError::UnknownSection(sec_id));
            }
            if section_order(sec_id) <= section_order(last_id) {
                return Err(ParseError::SectionOrder(sec_id));
            }
            last_id = sec_id;
        }

        debug!(section = sec_id, len = sec_len, "reading section");
        read_section(sec_id, &mut section, &mut module)?;
        if !section.is_empty() {
            return Err(ParseError::SectionSizeMismatch(sec_id));
        }
    }

    validate::validate_module(&module)?;
    debug!(
        module = name,
        imports = module.imports.len(),
        exports = module.exports.len(),
        "parsed module"
    );

    Ok(module)
}

// data count is numbered last but must precede code
fn section_order(sec_id: u8) -> u8 {
    match sec_id {
        SECTION_DATA_COUNT => SECTION_CODE,
        SECTION_CODE | SECTION_DATA => sec_id + 1,
        _ => sec_id,
    }
}

fn read_header(reader: &mut Reader) -> Result<(), ParseError> {
    let magic = reader
        .read_bytes(4)
        .map_err(|_| ParseError::UnexpectedEof("magic header".to_string()))?;
    if magic != &MAGIC.to_le_bytes()[..] {
        return Err(ParseError::BadMagic(hex::encode(magic)));
    }
    let version = reader
        .read_u32()
        .map_err(|_| ParseError::UnexpectedEof("version".to_string()))?;
    if version != VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }
    Ok(())
}

fn read_section(sec_id: u8, reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    match sec_id {
        SECTION_TYPE => read_section_type(reader, &mut module.types),
        SECTION_IMPORT => read_section_import(reader, &mut module.imports),
        SECTION_FUNCTION => read_section_function(reader, &mut module.functions),
        SECTION_TABLE => read_section_table(reader, &mut module.tables),
        SECTION_MEMORY => read_section_memory(reader, &mut module.memories),
        SECTION_GLOBAL => read_section_global(reader, &mut module.globals),
        SECTION_EXPORT => read_section_export(reader, &mut module.exports),
        SECTION_START => {
            module.start = Some(reader.read_vu32()?);
            Ok(())
        }
        SECTION_CODE => read_section_code(reader, &mut module.code),
        SECTION_CUSTOM | SECTION_ELEMENT | SECTION_DATA | SECTION_DATA_COUNT => {
            trace!(section = sec_id, "skipping section");
            reader.skip(reader.remaining())?;
            Ok(())
        }
        _ => Err(ParseError::UnknownSection(sec_id)),
    }
}

/* SECTION READERS ************************************************/

fn read_value_types(reader: &mut Reader) -> Result<Vec<ValueType>, ParseError> {
    let count = reader.read_vu32()?;
    let mut types = Vec::new();
    for _ in 0..count {
        types.push(ValueType::decode(reader.read_byte()?)?);
    }
    Ok(types)
}

fn read_section_type(reader: &mut Reader, types: &mut Vec<FunctionType>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;

    for _ in 0..count {
        if reader.read_byte()? != TYPE_FUNC {
            return Err(ParseError::Malformed("expected 0x60 to lead function type".to_string()));
        }
        let parameters = read_value_types(reader)?;
        let return_types = read_value_types(reader)?;
        types.push(FunctionType {
            parameters,
            return_types,
        });
    }

    Ok(())
}

fn read_section_import(reader: &mut Reader, imports: &mut Vec<Import>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;

    for _ in 0..count {
        let module = reader.read_string()?;
        let name = reader.read_string()?;
        let offset = reader.pos();
        match reader.peek_byte() {
            Some(tag) if tag > DESC_GLOBAL => return Err(ParseError::MalformedKind { tag, offset }),
            _ => {}
        }
        let external_kind = ExternalKind::decode(reader)?;
        trace!(%module, %name, kind = %external_kind, "import");
        imports.push(Import {
            module,
            name,
            external_kind,
        });
    }

    Ok(())
}

fn read_section_function(reader: &mut Reader, functions: &mut Vec<Function>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        functions.push(Function {
            ftype_index: reader.read_vu32()?,
        });
    }
    Ok(())
}

fn read_section_table(reader: &mut Reader, tables: &mut Vec<TableType>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        tables.push(TableType::decode(reader)?);
    }
    Ok(())
}

fn read_section_memory(reader: &mut Reader, memories: &mut Vec<Limits>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        memories.push(Limits::decode(reader)?);
    }
    Ok(())
}

fn read_section_global(reader: &mut Reader, globals: &mut Vec<Global>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let global_type = GlobalType::decode(reader)?;
        let init = instruction::decode_constant_expression(reader)?;
        globals.push(Global { global_type, init });
    }
    Ok(())
}

fn read_section_export(reader: &mut Reader, exports: &mut Vec<Export>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;

    for _ in 0..count {
        let name = reader.read_string()?;
        let offset = reader.pos();
        let tag = reader.read_byte()?;
        let idx = reader.read_vu32()?;
        let index = ExportIndex::decode(tag, idx).map_err(|_| ParseError::MalformedKind { tag, offset })?;
        trace!(%name, tag, idx, "export");
        exports.push(Export { index, name });
    }

    Ok(())
}

fn read_section_code(reader: &mut Reader, code: &mut Vec<FunctionBody>) -> Result<(), ParseError> {
    let count = reader.read_vu32()?;

    for function in 0..count {
        let size = reader.read_vu32()? as usize;
        let mut body = reader.sub_reader(size)?;

        let entry_count = body.read_vu32()?;
        let mut entries = Vec::new();
        let mut total: u64 = 0;
        for _ in 0..entry_count {
            let n = body.read_vu32()?;
            total += n as u64;
            if total > u32::MAX as u64 {
                return Err(ParseError::TooManyLocals);
            }
            entries.push((n, ValueType::decode(body.read_byte()?)?));
        }

        let instructions = instruction::decode_function_body(&mut body).map_err(|e| match e {
            DecodeError::UnsupportedOpcode { opcode, .. } => ParseError::UnsupportedOpcode { opcode, function },
            other => other.into(),
        })?;

        code.push(FunctionBody {
            locals: Locals::new(entries),
            instructions,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
    }

    fn parse_bytes(bytes: &[u8]) -> Result<Module, ParseError> {
        parse("test", &mut Reader::new(bytes))
    }

    #[test]
    fn test_empty_module() {
        let module = parse_bytes(&header()).unwrap();
        assert!(module.imports.is_empty());
        assert!(module.exports.is_empty());
    }

    #[test]
    fn test_bad_magic() {
        match parse_bytes(&[0x00, 0x61, 0x73, 0x6e, 0x01, 0x00, 0x00, 0x00]) {
            Err(ParseError::BadMagic(hex)) => assert_eq!(hex, "0061736e"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = header();
        bytes[4] = 2;
        assert!(matches!(parse_bytes(&bytes), Err(ParseError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse_bytes(&header()[..6]), Err(ParseError::UnexpectedEof(_))));

        let mut bytes = header();
        bytes.extend([SECTION_TYPE, 0x05, 0x01]);
        assert!(matches!(parse_bytes(&bytes), Err(ParseError::UnexpectedEof(_))));
    }

    #[test]
    fn test_unknown_section() {
        let mut bytes = header();
        bytes.extend([0x0d, 0x00]);
        assert!(matches!(parse_bytes(&bytes), Err(ParseError::UnknownSection(0x0d))));
    }

    #[test]
    fn test_custom_section_skipped() {
        let mut bytes = header();
        bytes.extend([SECTION_CUSTOM, 0x04, 0x03, b'a', b'b', b'c']);
        assert!(parse_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_malformed_import_kind() {
        let mut bytes = header();
        let mut section = Vec::new();
        write_vu32(&mut section, 1);
        write_name(&mut section, "m");
        write_name(&mut section, "tag");
        section.extend([0x04, 0x00, 0x00]);
        write_section(&mut bytes, SECTION_IMPORT, &section);
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::MalformedKind { tag: 0x04, .. })
        ));
    }

    #[test]
    fn test_section_size_mismatch() {
        let mut bytes = header();
        // one memory with min 0, plus a stray byte inside the section
        write_section(&mut bytes, SECTION_MEMORY, &[0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::SectionSizeMismatch(SECTION_MEMORY))
        ));
    }

    #[test]
    fn test_section_order() {
        let mut bytes = header();
        write_section(&mut bytes, SECTION_EXPORT, &[0x00]);
        write_section(&mut bytes, SECTION_TYPE, &[0x00]);
        assert!(matches!(parse_bytes(&bytes), Err(ParseError::SectionOrder(SECTION_TYPE))));
    }

    #[test]
    fn test_imports_in_order() {
        let mut bytes = header();
        let mut section = Vec::new();
        write_vu32(&mut section, 2);
        write_name(&mut section, "module");
        write_name(&mut section, "global");
        section.extend([DESC_GLOBAL, VALTYPE_I64, 0x00]);
        write_name(&mut section, "module");
        write_name(&mut section, "memory");
        section.extend([DESC_MEMORY, LIMITS_MIN, 0x00]);
        write_section(&mut bytes, SECTION_IMPORT, &section);

        let module = parse_bytes(&bytes).unwrap();
        let names: Vec<&str> = module.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["global", "memory"]);
        assert_eq!(module.global_count(), 1);
        assert_eq!(module.memory_count(), 1);
    }
}
