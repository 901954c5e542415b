//! ECMA-335 metadata: CLI header, metadata root, heaps and tables.
//!
//! # Overview
//!
//! The `#~` stream stores every table back to back. Row widths depend on the
//! row counts of other tables and on the heap size flags, so the whole layout
//! is computed up front from a static schema of all 45 tables. After that any
//! cell can be read by `(table, row, column)`.
//!
//! Only the readers the extractor needs are exposed: the assembly identity,
//! the assembly references, and custom attributes with their resolved
//! attribute type.

use super::pe::{PeImage, CLI_DIRECTORY};
use super::{align4, bytes_at, le_u16, le_u32, le_u64, le_u8, MetadataError};
use crate::version::ModuleVersion;

const CLI_HEADER_SIZE: u32 = 72;
const METADATA_SIGNATURE: u32 = 0x424A_5342; // "BSJB"
const TABLE_COUNT: usize = 0x2D;

const HEAP_STRINGS_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Table identifiers used by the readers.
pub mod table {
    pub const MODULE: usize = 0x00;
    pub const TYPE_REF: usize = 0x01;
    pub const TYPE_DEF: usize = 0x02;
    pub const FIELD: usize = 0x04;
    pub const METHOD_DEF: usize = 0x06;
    pub const PARAM: usize = 0x08;
    pub const INTERFACE_IMPL: usize = 0x09;
    pub const MEMBER_REF: usize = 0x0A;
    pub const CUSTOM_ATTRIBUTE: usize = 0x0C;
    pub const DECL_SECURITY: usize = 0x0E;
    pub const STAND_ALONE_SIG: usize = 0x11;
    pub const EVENT: usize = 0x14;
    pub const PROPERTY: usize = 0x17;
    pub const MODULE_REF: usize = 0x1A;
    pub const TYPE_SPEC: usize = 0x1B;
    pub const ASSEMBLY: usize = 0x20;
    pub const ASSEMBLY_REF: usize = 0x23;
    pub const FILE: usize = 0x26;
    pub const EXPORTED_TYPE: usize = 0x27;
    pub const MANIFEST_RESOURCE: usize = 0x28;
    pub const GENERIC_PARAM: usize = 0x2A;
    pub const METHOD_SPEC: usize = 0x2B;
    pub const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;
}

use table::*;

/// Marks an unused slot in a coded index.
const NONE: usize = usize::MAX;

/// A coded index: a tag selecting one of several tables plus a row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedIndex {
    bits: u32,
    tables: &'static [usize],
}

impl CodedIndex {
    /// Split a raw value into `(table, row)`. Unused tags yield `None`.
    #[must_use]
    pub fn decode(&self, raw: u32) -> Option<(usize, u32)> {
        let tag = (raw & ((1 << self.bits) - 1)) as usize;
        let table = *self.tables.get(tag)?;
        (table != NONE).then_some((table, raw >> self.bits))
    }
}

pub const TYPE_DEF_OR_REF: CodedIndex = CodedIndex {
    bits: 2,
    tables: &[TYPE_DEF, TYPE_REF, TYPE_SPEC],
};
const HAS_CONSTANT: CodedIndex = CodedIndex {
    bits: 2,
    tables: &[FIELD, PARAM, PROPERTY],
};
pub const HAS_CUSTOM_ATTRIBUTE: CodedIndex = CodedIndex {
    bits: 5,
    tables: &[
        METHOD_DEF,
        FIELD,
        TYPE_REF,
        TYPE_DEF,
        PARAM,
        INTERFACE_IMPL,
        MEMBER_REF,
        MODULE,
        DECL_SECURITY,
        PROPERTY,
        EVENT,
        STAND_ALONE_SIG,
        MODULE_REF,
        TYPE_SPEC,
        ASSEMBLY,
        ASSEMBLY_REF,
        FILE,
        EXPORTED_TYPE,
        MANIFEST_RESOURCE,
        GENERIC_PARAM,
        GENERIC_PARAM_CONSTRAINT,
        METHOD_SPEC,
    ],
};
const HAS_FIELD_MARSHAL: CodedIndex = CodedIndex {
    bits: 1,
    tables: &[FIELD, PARAM],
};
const HAS_DECL_SECURITY: CodedIndex = CodedIndex {
    bits: 2,
    tables: &[TYPE_DEF, METHOD_DEF, ASSEMBLY],
};
pub const MEMBER_REF_PARENT: CodedIndex = CodedIndex {
    bits: 3,
    tables: &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC],
};
const HAS_SEMANTICS: CodedIndex = CodedIndex {
    bits: 1,
    tables: &[EVENT, PROPERTY],
};
const METHOD_DEF_OR_REF: CodedIndex = CodedIndex {
    bits: 1,
    tables: &[METHOD_DEF, MEMBER_REF],
};
const MEMBER_FORWARDED: CodedIndex = CodedIndex {
    bits: 1,
    tables: &[FIELD, METHOD_DEF],
};
const IMPLEMENTATION: CodedIndex = CodedIndex {
    bits: 2,
    tables: &[FILE, ASSEMBLY_REF, EXPORTED_TYPE],
};
pub const CUSTOM_ATTRIBUTE_TYPE: CodedIndex = CodedIndex {
    bits: 3,
    tables: &[NONE, NONE, METHOD_DEF, MEMBER_REF, NONE],
};
pub const RESOLUTION_SCOPE: CodedIndex = CodedIndex {
    bits: 2,
    tables: &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF],
};
const TYPE_OR_METHOD_DEF: CodedIndex = CodedIndex {
    bits: 1,
    tables: &[TYPE_DEF, METHOD_DEF],
};

#[derive(Debug, Clone, Copy)]
enum Column {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Table(usize),
    Coded(CodedIndex),
}

use Column::{Blob, Coded, Guid, Str, Table, U16, U32};

/// Column layout of every table, indexed by table id.
const SCHEMA: [&[Column]; TABLE_COUNT] = [
    /* 0x00 Module */ &[U16, Str, Guid, Guid, Guid],
    /* 0x01 TypeRef */ &[Coded(RESOLUTION_SCOPE), Str, Str],
    /* 0x02 TypeDef */
    &[U32, Str, Str, Coded(TYPE_DEF_OR_REF), Table(FIELD), Table(METHOD_DEF)],
    /* 0x03 FieldPtr */ &[Table(FIELD)],
    /* 0x04 Field */ &[U16, Str, Blob],
    /* 0x05 MethodPtr */ &[Table(METHOD_DEF)],
    /* 0x06 MethodDef */ &[U32, U16, U16, Str, Blob, Table(PARAM)],
    /* 0x07 ParamPtr */ &[Table(PARAM)],
    /* 0x08 Param */ &[U16, U16, Str],
    /* 0x09 InterfaceImpl */ &[Table(TYPE_DEF), Coded(TYPE_DEF_OR_REF)],
    /* 0x0A MemberRef */ &[Coded(MEMBER_REF_PARENT), Str, Blob],
    /* 0x0B Constant */ &[U16, Coded(HAS_CONSTANT), Blob],
    /* 0x0C CustomAttribute */
    &[Coded(HAS_CUSTOM_ATTRIBUTE), Coded(CUSTOM_ATTRIBUTE_TYPE), Blob],
    /* 0x0D FieldMarshal */ &[Coded(HAS_FIELD_MARSHAL), Blob],
    /* 0x0E DeclSecurity */ &[U16, Coded(HAS_DECL_SECURITY), Blob],
    /* 0x0F ClassLayout */ &[U16, U32, Table(TYPE_DEF)],
    /* 0x10 FieldLayout */ &[U32, Table(FIELD)],
    /* 0x11 StandAloneSig */ &[Blob],
    /* 0x12 EventMap */ &[Table(TYPE_DEF), Table(EVENT)],
    /* 0x13 EventPtr */ &[Table(EVENT)],
    /* 0x14 Event */ &[U16, Str, Coded(TYPE_DEF_OR_REF)],
    /* 0x15 PropertyMap */ &[Table(TYPE_DEF), Table(PROPERTY)],
    /* 0x16 PropertyPtr */ &[Table(PROPERTY)],
    /* 0x17 Property */ &[U16, Str, Blob],
    /* 0x18 MethodSemantics */ &[U16, Table(METHOD_DEF), Coded(HAS_SEMANTICS)],
    /* 0x19 MethodImpl */
    &[Table(TYPE_DEF), Coded(METHOD_DEF_OR_REF), Coded(METHOD_DEF_OR_REF)],
    /* 0x1A ModuleRef */ &[Str],
    /* 0x1B TypeSpec */ &[Blob],
    /* 0x1C ImplMap */ &[U16, Coded(MEMBER_FORWARDED), Str, Table(MODULE_REF)],
    /* 0x1D FieldRVA */ &[U32, Table(FIELD)],
    /* 0x1E EncLog */ &[U32, U32],
    /* 0x1F EncMap */ &[U32],
    /* 0x20 Assembly */ &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
    /* 0x21 AssemblyProcessor */ &[U32],
    /* 0x22 AssemblyOS */ &[U32, U32, U32],
    /* 0x23 AssemblyRef */ &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
    /* 0x24 AssemblyRefProcessor */ &[U32, Table(ASSEMBLY_REF)],
    /* 0x25 AssemblyRefOS */ &[U32, U32, U32, Table(ASSEMBLY_REF)],
    /* 0x26 File */ &[U32, Str, Blob],
    /* 0x27 ExportedType */ &[U32, U32, Str, Str, Coded(IMPLEMENTATION)],
    /* 0x28 ManifestResource */ &[U32, U32, Str, Coded(IMPLEMENTATION)],
    /* 0x29 NestedClass */ &[Table(TYPE_DEF), Table(TYPE_DEF)],
    /* 0x2A GenericParam */ &[U16, U16, Coded(TYPE_OR_METHOD_DEF), Str],
    /* 0x2B MethodSpec */ &[Coded(METHOD_DEF_OR_REF), Blob],
    /* 0x2C GenericParamConstraint */ &[Table(GENERIC_PARAM), Coded(TYPE_DEF_OR_REF)],
];

/// The CLI (COR20) header of a managed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliHeader {
    pub metadata_rva: u32,
    pub metadata_size: u32,
    pub flags: u32,
}

impl CliHeader {
    /// Read the CLI header. `Ok(None)` means the image is native.
    pub fn read(image: &PeImage<'_>) -> Result<Option<Self>, MetadataError> {
        let Some(dir) = image.directory(CLI_DIRECTORY) else {
            return Ok(None);
        };
        let raw = image.slice_at_rva(dir.rva, dir.size.max(CLI_HEADER_SIZE))?;
        Ok(Some(Self {
            metadata_rva: le_u32(raw, 8)?,
            metadata_size: le_u32(raw, 12)?,
            flags: le_u32(raw, 16)?,
        }))
    }
}

/// Assembly identity from the Assembly table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    pub name: String,
    pub version: ModuleVersion,
    /// `None` when the culture column is empty
    pub culture: Option<String>,
}

/// One row of the AssemblyRef table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReference {
    pub name: String,
    pub version: ModuleVersion,
}

/// A CustomAttribute row with its coded indexes decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomAttribute {
    /// `(table, row)` the attribute is attached to
    pub parent: (usize, u32),
    /// `(table, row)` of the attribute constructor, `None` for unused tags
    pub constructor: Option<(usize, u32)>,
    /// Blob heap index of the encoded value
    pub value: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TableLayout {
    offset: usize,
    rows: u32,
    row_size: usize,
}

/// Decoded metadata of one module.
#[derive(Debug, Clone)]
pub struct Metadata<'a> {
    tables: &'a [u8],
    strings: &'a [u8],
    blobs: &'a [u8],
    heap_sizes: u8,
    rows: [u32; TABLE_COUNT],
    layout: [TableLayout; TABLE_COUNT],
}

impl<'a> Metadata<'a> {
    /// Locate the metadata root and lay out the table stream.
    pub fn read(image: &PeImage<'a>, cli: &CliHeader) -> Result<Self, MetadataError> {
        let root = image.slice_at_rva(cli.metadata_rva, cli.metadata_size)?;
        if le_u32(root, 0)? != METADATA_SIGNATURE {
            return Err(MetadataError::BadSignature("BSJB"));
        }

        let version_len = le_u32(root, 12)? as usize;
        let mut at = 16usize
            .checked_add(version_len)
            .ok_or(MetadataError::Truncated(16))?;
        let stream_count = le_u16(root, at + 2)?;
        at += 4;

        let mut tables = None;
        let mut strings: &[u8] = &[];
        let mut blobs: &[u8] = &[];
        for _ in 0..stream_count {
            let offset = le_u32(root, at)? as usize;
            let size = le_u32(root, at + 4)? as usize;
            let name_start = at + 8;
            let name_len = root
                .get(name_start..)
                .and_then(|rest| rest.iter().take(32).position(|&b| b == 0))
                .ok_or(MetadataError::Truncated(name_start))?;
            let name = &root[name_start..name_start + name_len];
            at = align4(name_start + name_len + 1);

            let body = bytes_at(root, offset, size)?;
            match name {
                b"#~" | b"#-" => tables = Some(body),
                b"#Strings" => strings = body,
                b"#Blob" => blobs = body,
                _ => {}
            }
        }

        let tables = tables.ok_or_else(|| MetadataError::Unsupported("no table stream".into()))?;
        Self::layout(tables, strings, blobs)
    }

    fn layout(tables: &'a [u8], strings: &'a [u8], blobs: &'a [u8]) -> Result<Self, MetadataError> {
        let heap_sizes = le_u8(tables, 6)?;
        let valid = le_u64(tables, 8)?;
        if valid >> TABLE_COUNT != 0 {
            return Err(MetadataError::Unsupported(format!("tables {valid:#x}")));
        }

        let mut layout = [TableLayout::default(); TABLE_COUNT];
        let mut at = 24;
        for (id, entry) in layout.iter_mut().enumerate() {
            if valid & (1 << id) != 0 {
                entry.rows = le_u32(tables, at)?;
                at += 4;
            }
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            at += 4;
        }

        let mut rows = [0u32; TABLE_COUNT];
        for (count, entry) in rows.iter_mut().zip(layout.iter()) {
            *count = entry.rows;
        }
        for (id, entry) in layout.iter_mut().enumerate() {
            entry.row_size = SCHEMA[id]
                .iter()
                .map(|c| column_width(*c, heap_sizes, &rows))
                .sum();
            entry.offset = at;
            let span = entry
                .row_size
                .checked_mul(entry.rows as usize)
                .ok_or(MetadataError::Truncated(at))?;
            at = at.checked_add(span).ok_or(MetadataError::Truncated(at))?;
        }

        if at > tables.len() {
            return Err(MetadataError::Truncated(at));
        }

        Ok(Self {
            tables,
            strings,
            blobs,
            heap_sizes,
            rows,
            layout,
        })
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn row_count(&self, table: usize) -> u32 {
        self.layout.get(table).map_or(0, |t| t.rows)
    }

    /// Read one cell. Rows are 1-based as in every metadata index.
    pub fn cell(&self, table: usize, row: u32, column: usize) -> Result<u32, MetadataError> {
        let entry = self
            .layout
            .get(table)
            .filter(|t| row >= 1 && row <= t.rows)
            .ok_or(MetadataError::BadIndex { what: "row", index: row })?;
        let columns = SCHEMA[table];

        let mut at = entry.offset + entry.row_size * (row as usize - 1);
        for (i, col) in columns.iter().enumerate() {
            let width = column_width(*col, self.heap_sizes, &self.rows);
            if i == column {
                return match width {
                    2 => le_u16(self.tables, at).map(u32::from),
                    _ => le_u32(self.tables, at),
                };
            }
            at += width;
        }
        Err(MetadataError::BadIndex {
            what: "column",
            index: column as u32,
        })
    }

    /// Read a null-terminated string from the `#Strings` heap.
    pub fn string(&self, index: u32) -> Result<&'a str, MetadataError> {
        let rest = self
            .strings
            .get(index as usize..)
            .ok_or(MetadataError::BadIndex { what: "string", index })?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MetadataError::BadIndex { what: "string", index })?;
        std::str::from_utf8(&rest[..end]).map_err(|_| MetadataError::BadString("#Strings"))
    }

    /// Read a length-prefixed entry from the `#Blob` heap.
    pub fn blob(&self, index: u32) -> Result<&'a [u8], MetadataError> {
        let rest = self
            .blobs
            .get(index as usize..)
            .ok_or(MetadataError::BadIndex { what: "blob", index })?;
        let (len, header) = compressed_u32(rest)?;
        bytes_at(rest, header, len as usize)
    }

    /// The module's own assembly identity, if it has an Assembly row.
    pub fn assembly(&self) -> Result<Option<AssemblyIdentity>, MetadataError> {
        if self.row_count(ASSEMBLY) == 0 {
            return Ok(None);
        }
        let version = self.version_columns(ASSEMBLY, 1, 1)?;
        let name = self.string(self.cell(ASSEMBLY, 1, 7)?)?.to_string();
        let culture = self.string(self.cell(ASSEMBLY, 1, 8)?)?;
        Ok(Some(AssemblyIdentity {
            name,
            version,
            culture: (!culture.is_empty()).then(|| culture.to_string()),
        }))
    }

    /// Every assembly reference in table order.
    pub fn assembly_refs(&self) -> Result<Vec<AssemblyReference>, MetadataError> {
        (1..=self.row_count(ASSEMBLY_REF))
            .map(|row| {
                Ok(AssemblyReference {
                    version: self.version_columns(ASSEMBLY_REF, row, 0)?,
                    name: self.string(self.cell(ASSEMBLY_REF, row, 6)?)?.to_string(),
                })
            })
            .collect()
    }

    fn version_columns(&self, table: usize, row: u32, first: usize) -> Result<ModuleVersion, MetadataError> {
        Ok(ModuleVersion::new(
            self.cell(table, row, first)?,
            self.cell(table, row, first + 1)?,
            self.cell(table, row, first + 2)?,
            self.cell(table, row, first + 3)?,
        ))
    }

    /// Every CustomAttribute row.
    pub fn custom_attributes(&self) -> Result<Vec<CustomAttribute>, MetadataError> {
        (1..=self.row_count(CUSTOM_ATTRIBUTE))
            .map(|row| {
                let parent_raw = self.cell(CUSTOM_ATTRIBUTE, row, 0)?;
                let parent = HAS_CUSTOM_ATTRIBUTE.decode(parent_raw).ok_or(MetadataError::BadIndex {
                    what: "HasCustomAttribute",
                    index: parent_raw,
                })?;
                Ok(CustomAttribute {
                    parent,
                    constructor: CUSTOM_ATTRIBUTE_TYPE.decode(self.cell(CUSTOM_ATTRIBUTE, row, 1)?),
                    value: self.cell(CUSTOM_ATTRIBUTE, row, 2)?,
                })
            })
            .collect()
    }

    /// Resolve an attribute constructor to its declaring type's
    /// `(namespace, name)`.
    ///
    /// Handles a constructor defined in this module (MethodDef) and one
    /// imported from elsewhere (MemberRef on a TypeRef or TypeDef). Anything
    /// else resolves to `None`.
    pub fn attribute_type(&self, constructor: (usize, u32)) -> Result<Option<(&'a str, &'a str)>, MetadataError> {
        match constructor {
            (METHOD_DEF, row) => match self.method_owner(row)? {
                Some(type_def) => self.type_def_name(type_def).map(Some),
                None => Ok(None),
            },
            (MEMBER_REF, row) => {
                let class = self.cell(MEMBER_REF, row, 0)?;
                match MEMBER_REF_PARENT.decode(class) {
                    Some((TYPE_REF, r)) => Ok(Some((
                        self.string(self.cell(TYPE_REF, r, 2)?)?,
                        self.string(self.cell(TYPE_REF, r, 1)?)?,
                    ))),
                    Some((TYPE_DEF, r)) => self.type_def_name(r).map(Some),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn type_def_name(&self, row: u32) -> Result<(&'a str, &'a str), MetadataError> {
        Ok((
            self.string(self.cell(TYPE_DEF, row, 2)?)?,
            self.string(self.cell(TYPE_DEF, row, 1)?)?,
        ))
    }

    /// The TypeDef whose method list contains `method`.
    fn method_owner(&self, method: u32) -> Result<Option<u32>, MetadataError> {
        let mut owner = None;
        for row in 1..=self.row_count(TYPE_DEF) {
            let start = self.cell(TYPE_DEF, row, 5)?;
            if start == 0 || start > method {
                break;
            }
            owner = Some(row);
        }
        Ok(owner)
    }
}

fn column_width(column: Column, heap_sizes: u8, rows: &[u32]) -> usize {
    let wide = |flag: u8| if heap_sizes & flag != 0 { 4 } else { 2 };
    match column {
        Column::U16 => 2,
        Column::U32 => 4,
        Column::Str => wide(HEAP_STRINGS_WIDE),
        Column::Guid => wide(HEAP_GUID_WIDE),
        Column::Blob => wide(HEAP_BLOB_WIDE),
        Column::Table(t) => {
            if rows[t] < 0x1_0000 {
                2
            } else {
                4
            }
        }
        Column::Coded(coded) => {
            let max = coded
                .tables
                .iter()
                .filter(|&&t| t != NONE)
                .map(|&t| rows[t])
                .max()
                .unwrap_or(0);
            if max < (1 << (16 - coded.bits)) {
                2
            } else {
                4
            }
        }
    }
}

/// Decode an ECMA-335 compressed unsigned integer.
///
/// Returns the value and the number of bytes it occupied.
pub fn compressed_u32(data: &[u8]) -> Result<(u32, usize), MetadataError> {
    let b0 = le_u8(data, 0)?;
    if b0 & 0x80 == 0 {
        Ok((u32::from(b0), 1))
    } else if b0 & 0xC0 == 0x80 {
        let b1 = le_u8(data, 1)?;
        Ok(((u32::from(b0 & 0x3F) << 8) | u32::from(b1), 2))
    } else if b0 & 0xE0 == 0xC0 {
        let rest = bytes_at(data, 1, 3)?;
        Ok((
            (u32::from(b0 & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]),
            4,
        ))
    } else {
        Err(MetadataError::Unsupported(format!("compressed integer lead {b0:#x}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::builder::ModuleImageBuilder;

    fn with_metadata<T>(image: &[u8], f: impl FnOnce(&Metadata<'_>) -> T) -> T {
        let pe = PeImage::parse(image).unwrap();
        let cli = CliHeader::read(&pe).unwrap().unwrap();
        let metadata = Metadata::read(&pe, &cli).unwrap();
        f(&metadata)
    }

    #[test]
    fn test_compressed_integers() {
        assert_eq!(compressed_u32(&[0x03]).unwrap(), (3, 1));
        assert_eq!(compressed_u32(&[0x7F]).unwrap(), (0x7F, 1));
        assert_eq!(compressed_u32(&[0x80, 0x80]).unwrap(), (0x80, 2));
        assert_eq!(compressed_u32(&[0xBF, 0xFF]).unwrap(), (0x3FFF, 2));
        assert_eq!(compressed_u32(&[0xC0, 0x00, 0x40, 0x00]).unwrap(), (0x4000, 4));
        assert!(compressed_u32(&[0xE0]).is_err());
        assert!(compressed_u32(&[0x80]).is_err());
    }

    #[test]
    fn test_coded_index_decode() {
        assert_eq!(HAS_CUSTOM_ATTRIBUTE.decode((1 << 5) | 14), Some((ASSEMBLY, 1)));
        assert_eq!(HAS_CUSTOM_ATTRIBUTE.decode((3 << 5) | 7), Some((MODULE, 3)));
        assert_eq!(CUSTOM_ATTRIBUTE_TYPE.decode((2 << 3) | 3), Some((MEMBER_REF, 2)));
        assert_eq!(CUSTOM_ATTRIBUTE_TYPE.decode((2 << 3) | 2), Some((METHOD_DEF, 2)));
        assert_eq!(CUSTOM_ATTRIBUTE_TYPE.decode((2 << 3) | 1), None);
        assert_eq!(CUSTOM_ATTRIBUTE_TYPE.decode((2 << 3) | 7), None);
        assert_eq!(RESOLUTION_SCOPE.decode((4 << 2) | 2), Some((ASSEMBLY_REF, 4)));
    }

    #[test]
    fn test_coded_width_grows_with_rows() {
        let mut rows = vec![0u32; TABLE_COUNT];
        assert_eq!(column_width(Coded(HAS_CUSTOM_ATTRIBUTE), 0, &rows), 2);
        rows[METHOD_DEF] = (1 << 11) - 1;
        assert_eq!(column_width(Coded(HAS_CUSTOM_ATTRIBUTE), 0, &rows), 2);
        rows[METHOD_DEF] = 1 << 11;
        assert_eq!(column_width(Coded(HAS_CUSTOM_ATTRIBUTE), 0, &rows), 4);
        assert_eq!(column_width(Str, HEAP_STRINGS_WIDE, &rows), 4);
        assert_eq!(column_width(Blob, HEAP_STRINGS_WIDE, &rows), 2);
    }

    #[test]
    fn test_native_image_has_no_cli_header() {
        let image = ModuleImageBuilder::native().build();
        let pe = PeImage::parse(&image).unwrap();
        assert_eq!(CliHeader::read(&pe).unwrap(), None);
    }

    #[test]
    fn test_assembly_identity() {
        let image = ModuleImageBuilder::new()
            .assembly("Contoso.Core", (4, 2, 1, 7))
            .culture("fr")
            .build();
        with_metadata(&image, |md| {
            let identity = md.assembly().unwrap().unwrap();
            assert_eq!(identity.name, "Contoso.Core");
            assert_eq!(identity.version, ModuleVersion::new(4, 2, 1, 7));
            assert_eq!(identity.culture.as_deref(), Some("fr"));
            assert_eq!(md.row_count(MODULE), 1);
        });
    }

    #[test]
    fn test_module_without_assembly_row() {
        let image = ModuleImageBuilder::new().build();
        with_metadata(&image, |md| {
            assert_eq!(md.assembly().unwrap(), None);
            assert!(md.assembly_refs().unwrap().is_empty());
        });
    }

    #[test]
    fn test_assembly_refs_in_order() {
        let image = ModuleImageBuilder::new()
            .assembly("A", (1, 0, 0, 0))
            .assembly_ref("System.Runtime", (9, 0, 0, 0))
            .assembly_ref("System.Collections", (9, 0, 0, 0))
            .build();
        with_metadata(&image, |md| {
            let refs = md.assembly_refs().unwrap();
            let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, ["System.Runtime", "System.Collections"]);
            assert_eq!(refs[0].version, ModuleVersion::new(9, 0, 0, 0));
        });
    }

    #[test]
    fn test_attribute_type_via_member_ref() {
        let image = ModuleImageBuilder::new()
            .assembly("A", (1, 0, 0, 0))
            .target_framework(".NETStandard,Version=v2.0")
            .build();
        with_metadata(&image, |md| {
            let attrs = md.custom_attributes().unwrap();
            assert_eq!(attrs.len(), 1);
            assert_eq!(attrs[0].parent, (ASSEMBLY, 1));
            let ctor = attrs[0].constructor.unwrap();
            assert_eq!(ctor.0, MEMBER_REF);
            assert_eq!(
                md.attribute_type(ctor).unwrap(),
                Some(("System.Runtime.Versioning", "TargetFrameworkAttribute"))
            );
        });
    }

    #[test]
    fn test_attribute_type_via_method_def() {
        let image = ModuleImageBuilder::new()
            .target_framework_local(".NETFramework,Version=v4.6")
            .build();
        with_metadata(&image, |md| {
            let attrs = md.custom_attributes().unwrap();
            assert_eq!(attrs[0].parent, (MODULE, 1));
            let ctor = attrs[0].constructor.unwrap();
            assert_eq!(ctor.0, METHOD_DEF);
            assert_eq!(
                md.attribute_type(ctor).unwrap(),
                Some(("System.Runtime.Versioning", "TargetFrameworkAttribute"))
            );
        });
    }

    #[test]
    fn test_string_and_blob_bounds() {
        let image = ModuleImageBuilder::new().assembly("A", (1, 0, 0, 0)).build();
        with_metadata(&image, |md| {
            assert_eq!(md.string(0).unwrap(), "");
            assert!(md.string(u32::MAX).is_err());
            assert!(md.blob(u32::MAX).is_err());
            assert!(md.cell(ASSEMBLY, 2, 0).is_err());
            assert!(md.cell(ASSEMBLY, 0, 0).is_err());
        });
    }
}
