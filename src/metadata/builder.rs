//! In-memory module images for tests and benchmarks.
//!
//! [`ModuleImageBuilder`] writes a small but well-formed PE32 image: one
//! `.text` section holding the CLI header, the metadata streams and, when a
//! file version is requested, the version resource. All table indexes are two
//! bytes wide; the heaps switch to four-byte indexes only if they outgrow
//! 64 KiB.
//!
//! # Example
//!
//! ```
//! use asmdupe::metadata::{extract, Architecture, ModuleImageBuilder};
//! use asmdupe::metadata::builder::Machine;
//!
//! let image = ModuleImageBuilder::native()
//!     .machine(Machine::Arm64)
//!     .file_version("10.0.22621.1")
//!     .build();
//! let meta = extract(&image).unwrap();
//! assert_eq!(meta.architecture, Some(Architecture::Arm64));
//! assert_eq!(meta.file_version.as_deref(), Some("10.0.22621.1"));
//! ```

use super::pe::{
    COMIMAGE_FLAGS_ILONLY, MACHINE_AMD64, MACHINE_ARMNT, MACHINE_ARM64, MACHINE_I386,
};
use crate::version::ModuleVersion;

const E_LFANEW: u32 = 0x40;
const OPTIONAL_HEADER_SIZE: u16 = 224;
const SECTION_TABLE: usize = 0x40 + 4 + 20 + OPTIONAL_HEADER_SIZE as usize;
const HEADERS_SIZE: u32 = 0x200;
const TEXT_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: usize = 72;
const METADATA_VERSION: &[u8; 12] = b"v4.0.30319\0\0";

/// Four-part version as stored in the Assembly and AssemblyRef tables.
pub type Version4 = (u16, u16, u16, u16);

/// Machine values the builder can stamp into the COFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    I386,
    X64,
    Arm,
    Arm64,
}

impl Machine {
    fn value(self) -> u16 {
        match self {
            Self::I386 => MACHINE_I386,
            Self::X64 => MACHINE_AMD64,
            Self::Arm => MACHINE_ARMNT,
            Self::Arm64 => MACHINE_ARM64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeEncoding {
    /// Constructor imported through MemberRef → TypeRef
    Referenced,
    /// Constructor defined in this module's MethodDef table
    Local,
}

/// Builder for synthetic PE images.
#[derive(Debug, Clone)]
pub struct ModuleImageBuilder {
    machine: u16,
    managed: bool,
    cli_flags: u32,
    assembly: Option<(String, Version4)>,
    culture: String,
    references: Vec<(String, Version4)>,
    framework: Option<(String, AttributeEncoding)>,
    file_version: Option<String>,
    fixed_version: Option<Version4>,
    trailing: usize,
}

impl Default for ModuleImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleImageBuilder {
    /// A managed, IL-only I386 module (reported as `anycpu`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            machine: MACHINE_I386,
            managed: true,
            cli_flags: COMIMAGE_FLAGS_ILONLY,
            assembly: None,
            culture: String::new(),
            references: Vec::new(),
            framework: None,
            file_version: None,
            fixed_version: None,
            trailing: 0,
        }
    }

    /// A native image without a CLI header.
    #[must_use]
    pub fn native() -> Self {
        Self {
            managed: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine.value();
        self
    }

    /// Stamp an arbitrary machine value, e.g. a ReadyToRun OS override.
    #[must_use]
    pub fn raw_machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    #[must_use]
    pub fn cli_flags(mut self, flags: u32) -> Self {
        self.cli_flags = flags;
        self
    }

    /// Add an Assembly row.
    #[must_use]
    pub fn assembly(mut self, name: &str, version: Version4) -> Self {
        self.assembly = Some((name.to_string(), version));
        self
    }

    /// Culture of the Assembly row.
    #[must_use]
    pub fn culture(mut self, culture: &str) -> Self {
        self.culture = culture.to_string();
        self
    }

    /// Append an AssemblyRef row.
    #[must_use]
    pub fn assembly_ref(mut self, name: &str, version: Version4) -> Self {
        self.references.push((name.to_string(), version));
        self
    }

    /// Declare `TargetFrameworkAttribute` with an imported constructor.
    #[must_use]
    pub fn target_framework(mut self, moniker: &str) -> Self {
        self.framework = Some((moniker.to_string(), AttributeEncoding::Referenced));
        self
    }

    /// Declare `TargetFrameworkAttribute` with a constructor defined locally.
    #[must_use]
    pub fn target_framework_local(mut self, moniker: &str) -> Self {
        self.framework = Some((moniker.to_string(), AttributeEncoding::Local));
        self
    }

    /// Add a version resource with a `FileVersion` string.
    #[must_use]
    pub fn file_version(mut self, version: &str) -> Self {
        self.file_version = Some(version.to_string());
        self
    }

    /// Set the numeric version of `VS_FIXEDFILEINFO`.
    #[must_use]
    pub fn fixed_file_version(mut self, version: Version4) -> Self {
        self.fixed_version = Some(version);
        self
    }

    /// Append `count` bytes after the section, changing size and hash.
    #[must_use]
    pub fn trailing_bytes(mut self, count: usize) -> Self {
        self.trailing = count;
        self
    }

    /// Serialize the image.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let mut cli_dir = (0, 0);
        if self.managed {
            let metadata = self.metadata();
            put_u32(&mut section, CLI_HEADER_SIZE as u32);
            put_u16(&mut section, 2);
            put_u16(&mut section, 5);
            put_u32(&mut section, TEXT_RVA + CLI_HEADER_SIZE as u32);
            put_u32(&mut section, metadata.len() as u32);
            put_u32(&mut section, self.cli_flags);
            section.resize(CLI_HEADER_SIZE, 0);
            section.extend_from_slice(&metadata);
            cli_dir = (TEXT_RVA, CLI_HEADER_SIZE as u32);
        }

        let mut resource_dir = (0, 0);
        if self.file_version.is_some() || self.fixed_version.is_some() {
            pad4(&mut section);
            let rva = TEXT_RVA + section.len() as u32;
            let resources = self.resources(rva);
            resource_dir = (rva, resources.len() as u32);
            section.extend_from_slice(&resources);
        }
        if section.is_empty() {
            section.resize(16, 0xCC);
        }

        let mut image = self.headers(section.len() as u32, cli_dir, resource_dir);
        image.extend_from_slice(&section);
        image.resize(image.len() + self.trailing, 0);
        image
    }

    fn headers(&self, section_len: u32, cli: (u32, u32), resources: (u32, u32)) -> Vec<u8> {
        let mut h = vec![0u8; HEADERS_SIZE as usize];
        h[0..2].copy_from_slice(b"MZ");
        write_u32(&mut h, 0x3C, E_LFANEW);
        h[0x40..0x44].copy_from_slice(b"PE\0\0");

        let coff = 0x44;
        write_u16(&mut h, coff, self.machine);
        write_u16(&mut h, coff + 2, 1);
        write_u16(&mut h, coff + 16, OPTIONAL_HEADER_SIZE);
        write_u16(&mut h, coff + 18, 0x2102); // EXECUTABLE_IMAGE | 32BIT_MACHINE | DLL

        let opt = coff + 20;
        write_u16(&mut h, opt, 0x10b);
        write_u32(&mut h, opt + 28, 0x1000_0000);
        write_u32(&mut h, opt + 32, 0x2000);
        write_u32(&mut h, opt + 36, 0x200);
        write_u32(&mut h, opt + 56, TEXT_RVA + section_len.next_multiple_of(0x2000));
        write_u32(&mut h, opt + 60, HEADERS_SIZE);
        write_u16(&mut h, opt + 68, 3);
        write_u32(&mut h, opt + 92, 16);
        let dirs = opt + 96;
        write_u32(&mut h, dirs + 2 * 8, resources.0);
        write_u32(&mut h, dirs + 2 * 8 + 4, resources.1);
        write_u32(&mut h, dirs + 14 * 8, cli.0);
        write_u32(&mut h, dirs + 14 * 8 + 4, cli.1);

        let s = SECTION_TABLE;
        h[s..s + 5].copy_from_slice(b".text");
        write_u32(&mut h, s + 8, section_len);
        write_u32(&mut h, s + 12, TEXT_RVA);
        write_u32(&mut h, s + 16, section_len);
        write_u32(&mut h, s + 20, HEADERS_SIZE);
        write_u32(&mut h, s + 36, 0x6000_0020);
        h
    }

    fn metadata(&self) -> Vec<u8> {
        let mut strings = vec![0u8];
        let mut blobs = vec![0u8];
        let guids = [0x5Au8; 16];

        let module_name = match &self.assembly {
            Some((name, _)) => format!("{name}.dll"),
            None => "module.netmodule".to_string(),
        };
        let module_name = add_string(&mut strings, &module_name);

        let assembly = self.assembly.as_ref().map(|(name, version)| {
            let name = add_string(&mut strings, name);
            let culture = add_string(&mut strings, &self.culture);
            (*version, name, culture)
        });
        let references: Vec<(Version4, u32)> = self
            .references
            .iter()
            .map(|(name, version)| (*version, add_string(&mut strings, name)))
            .collect();

        let mut type_refs: Vec<[u32; 3]> = Vec::new();
        let mut type_defs: Vec<[u32; 6]> = Vec::new();
        let mut method_defs: Vec<[u32; 2]> = Vec::new();
        let mut member_refs: Vec<[u32; 3]> = Vec::new();
        let mut attributes: Vec<[u32; 3]> = Vec::new();

        if let Some((moniker, encoding)) = &self.framework {
            let namespace = add_string(&mut strings, "System.Runtime.Versioning");
            let name = add_string(&mut strings, "TargetFrameworkAttribute");
            let ctor = add_string(&mut strings, ".ctor");
            let signature = add_blob(&mut blobs, &[0x20, 0x01, 0x01, 0x0E]);
            let value = add_blob(&mut blobs, &attribute_value(moniker));

            let constructor = match encoding {
                AttributeEncoding::Referenced => {
                    // Scoped to the first AssemblyRef, or to this module
                    let scope = if references.is_empty() { 1 << 2 } else { (1 << 2) | 2 };
                    type_refs.push([scope, name, namespace]);
                    member_refs.push([((type_refs.len() as u32) << 3) | 1, ctor, signature]);
                    ((member_refs.len() as u32) << 3) | 3
                }
                AttributeEncoding::Local => {
                    let module_type = add_string(&mut strings, "<Module>");
                    type_defs.push([0, module_type, 0, 0, 1, 1]);
                    type_defs.push([0x0010_0101, name, namespace, 0, 1, 1]);
                    method_defs.push([ctor, signature]);
                    ((method_defs.len() as u32) << 3) | 2
                }
            };
            let parent = if assembly.is_some() { (1 << 5) | 14 } else { (1 << 5) | 7 };
            attributes.push([parent, constructor, value]);
        }

        pad4(&mut strings);
        pad4(&mut blobs);
        let wide_strings = strings.len() >= 0x1_0000;
        let wide_blobs = blobs.len() >= 0x1_0000;
        let s = |buf: &mut Vec<u8>, v: u32| put_index(buf, v, wide_strings);
        let b = |buf: &mut Vec<u8>, v: u32| put_index(buf, v, wide_blobs);

        let mut tables: Vec<(usize, u32, Vec<u8>)> = Vec::new();

        let mut rows = Vec::new();
        put_u16(&mut rows, 0);
        s(&mut rows, module_name);
        put_u16(&mut rows, 1);
        put_u16(&mut rows, 0);
        put_u16(&mut rows, 0);
        tables.push((0x00, 1, rows));

        let mut rows = Vec::new();
        for [scope, name, namespace] in &type_refs {
            put_u16(&mut rows, *scope as u16);
            s(&mut rows, *name);
            s(&mut rows, *namespace);
        }
        tables.push((0x01, type_refs.len() as u32, rows));

        let mut rows = Vec::new();
        for [flags, name, namespace, extends, fields, methods] in &type_defs {
            put_u32(&mut rows, *flags);
            s(&mut rows, *name);
            s(&mut rows, *namespace);
            put_u16(&mut rows, *extends as u16);
            put_u16(&mut rows, *fields as u16);
            put_u16(&mut rows, *methods as u16);
        }
        tables.push((0x02, type_defs.len() as u32, rows));

        let mut rows = Vec::new();
        for [name, signature] in &method_defs {
            put_u32(&mut rows, 0);
            put_u16(&mut rows, 0);
            put_u16(&mut rows, 0x1886); // public hidebysig specialname rtspecialname
            s(&mut rows, *name);
            b(&mut rows, *signature);
            put_u16(&mut rows, 1);
        }
        tables.push((0x06, method_defs.len() as u32, rows));

        let mut rows = Vec::new();
        for [class, name, signature] in &member_refs {
            put_u16(&mut rows, *class as u16);
            s(&mut rows, *name);
            b(&mut rows, *signature);
        }
        tables.push((0x0A, member_refs.len() as u32, rows));

        let mut rows = Vec::new();
        for [parent, constructor, value] in &attributes {
            put_u16(&mut rows, *parent as u16);
            put_u16(&mut rows, *constructor as u16);
            b(&mut rows, *value);
        }
        tables.push((0x0C, attributes.len() as u32, rows));

        let mut rows = Vec::new();
        if let Some((version, name, culture)) = assembly {
            put_u32(&mut rows, 0x8004); // SHA1
            put_version(&mut rows, version);
            put_u32(&mut rows, 0);
            b(&mut rows, 0);
            s(&mut rows, name);
            s(&mut rows, culture);
        }
        tables.push((0x20, u32::from(assembly.is_some()), rows));

        let mut rows = Vec::new();
        for (version, name) in &references {
            put_version(&mut rows, *version);
            put_u32(&mut rows, 0);
            b(&mut rows, 0);
            s(&mut rows, *name);
            s(&mut rows, 0);
            b(&mut rows, 0);
        }
        tables.push((0x23, references.len() as u32, rows));

        tables.retain(|(_, count, _)| *count > 0);
        let mut heap_sizes = 0u8;
        if wide_strings {
            heap_sizes |= 0x01;
        }
        if wide_blobs {
            heap_sizes |= 0x04;
        }

        let mut table_stream = Vec::new();
        put_u32(&mut table_stream, 0);
        table_stream.extend_from_slice(&[2, 0, heap_sizes, 1]);
        let valid = tables.iter().fold(0u64, |acc, (id, _, _)| acc | (1u64 << *id));
        table_stream.extend_from_slice(&valid.to_le_bytes());
        table_stream.extend_from_slice(&0u64.to_le_bytes());
        for (_, count, _) in &tables {
            put_u32(&mut table_stream, *count);
        }
        for (_, _, rows) in &tables {
            table_stream.extend_from_slice(rows);
        }
        pad4(&mut table_stream);

        let user_strings = vec![0u8; 4];
        let streams: [(&[u8], &[u8]); 5] = [
            (b"#~", &table_stream),
            (b"#Strings", &strings),
            (b"#US", &user_strings),
            (b"#GUID", &guids),
            (b"#Blob", &blobs),
        ];

        let header_len: usize = 16
            + METADATA_VERSION.len()
            + 4
            + streams
                .iter()
                .map(|(name, _)| 8 + (name.len() + 1).next_multiple_of(4))
                .sum::<usize>();

        let mut root = Vec::new();
        put_u32(&mut root, 0x424A_5342);
        put_u16(&mut root, 1);
        put_u16(&mut root, 1);
        put_u32(&mut root, 0);
        put_u32(&mut root, METADATA_VERSION.len() as u32);
        root.extend_from_slice(METADATA_VERSION);
        put_u16(&mut root, 0);
        put_u16(&mut root, streams.len() as u16);

        let mut offset = header_len;
        for (name, body) in &streams {
            put_u32(&mut root, offset as u32);
            put_u32(&mut root, body.len() as u32);
            root.extend_from_slice(name);
            root.push(0);
            pad4(&mut root);
            offset += body.len();
        }
        for (_, body) in &streams {
            root.extend_from_slice(body);
        }
        root
    }

    fn resources(&self, rva: u32) -> Vec<u8> {
        let info = self.version_info();
        let mut r = Vec::new();
        resource_directory(&mut r, 16, 0x8000_0000 | 24); // RT_VERSION
        resource_directory(&mut r, 1, 0x8000_0000 | 48);
        resource_directory(&mut r, 0x409, 72);
        put_u32(&mut r, rva + 88);
        put_u32(&mut r, info.len() as u32);
        put_u32(&mut r, 0);
        put_u32(&mut r, 0);
        r.extend_from_slice(&info);
        r
    }

    fn version_info(&self) -> Vec<u8> {
        let fixed = self.fixed_version.unwrap_or_else(|| {
            self.file_version
                .as_deref()
                .and_then(ModuleVersion::parse)
                .map_or((0, 0, 0, 0), |v| {
                    (
                        v.major as u16,
                        v.minor as u16,
                        v.build.unwrap_or(0) as u16,
                        v.revision.unwrap_or(0) as u16,
                    )
                })
        });

        let mut fixed_info = Vec::with_capacity(52);
        put_u32(&mut fixed_info, 0xFEEF_04BD);
        put_u32(&mut fixed_info, 0x0001_0000);
        put_u32(&mut fixed_info, (u32::from(fixed.0) << 16) | u32::from(fixed.1));
        put_u32(&mut fixed_info, (u32::from(fixed.2) << 16) | u32::from(fixed.3));
        fixed_info.resize(52, 0);

        let mut children = Vec::new();
        if let Some(text) = &self.file_version {
            let mut value = utf16(text);
            value.extend_from_slice(&[0, 0]);
            let words = (value.len() / 2) as u16;
            let string = version_block("FileVersion", &value, words, true, &[]);
            let table = version_block("040904B0", &[], 0, true, &[string]);
            children.push(version_block("StringFileInfo", &[], 0, true, &[table]));
        }
        version_block("VS_VERSION_INFO", &fixed_info, 52, false, &children)
    }
}

fn attribute_value(text: &str) -> Vec<u8> {
    let mut value = vec![0x01, 0x00];
    encode_compressed(&mut value, text.len() as u32);
    value.extend_from_slice(text.as_bytes());
    value.extend_from_slice(&[0x00, 0x00]);
    value
}

fn resource_directory(buf: &mut Vec<u8>, id: u32, target: u32) {
    buf.extend_from_slice(&[0u8; 12]);
    put_u16(buf, 0);
    put_u16(buf, 1);
    put_u32(buf, id);
    put_u32(buf, target);
}

fn version_block(key: &str, value: &[u8], value_len: u16, text: bool, children: &[Vec<u8>]) -> Vec<u8> {
    let mut block = vec![0u8; 6];
    block.extend_from_slice(&utf16(key));
    block.extend_from_slice(&[0, 0]);
    pad4(&mut block);
    block.extend_from_slice(value);
    for child in children {
        pad4(&mut block);
        block.extend_from_slice(child);
    }
    let len = block.len() as u16;
    write_u16(&mut block, 0, len);
    write_u16(&mut block, 2, value_len);
    write_u16(&mut block, 4, u16::from(text));
    block
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn add_string(heap: &mut Vec<u8>, text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let index = heap.len() as u32;
    heap.extend_from_slice(text.as_bytes());
    heap.push(0);
    index
}

fn add_blob(heap: &mut Vec<u8>, data: &[u8]) -> u32 {
    let index = heap.len() as u32;
    encode_compressed(heap, data.len() as u32);
    heap.extend_from_slice(data);
    index
}

fn encode_compressed(buf: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        buf.push(value as u8);
    } else if value < 0x4000 {
        buf.extend_from_slice(&((value as u16) | 0x8000).to_be_bytes());
    } else {
        buf.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
    }
}

fn put_version(buf: &mut Vec<u8>, v: Version4) {
    for part in [v.0, v.1, v.2, v.3] {
        put_u16(buf, part);
    }
}

fn put_index(buf: &mut Vec<u8>, value: u32, wide: bool) {
    if wide {
        put_u32(buf, value);
    } else {
        put_u16(buf, value as u16);
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn pad4(buf: &mut Vec<u8>) {
    buf.resize(buf.len().next_multiple_of(4), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract;
    use crate::metadata::tables::compressed_u32;

    #[test]
    fn test_compressed_encoding_matches_decoder() {
        for value in [0u32, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFF_FFFF] {
            let mut buf = Vec::new();
            encode_compressed(&mut buf, value);
            assert_eq!(compressed_u32(&buf).unwrap(), (value, buf.len()));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = ModuleImageBuilder::new()
            .assembly("A", (1, 0, 0, 0))
            .file_version("1.0.0.0");
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn test_trailing_bytes_change_size_only() {
        let base = ModuleImageBuilder::new().assembly("A", (1, 0, 0, 0));
        let small = base.clone().build();
        let large = base.trailing_bytes(100).build();
        assert_eq!(large.len(), small.len() + 100);
        assert_eq!(extract(&small), extract(&large));
    }

    #[test]
    fn test_large_string_heap_uses_wide_indexes() {
        let long_name = "N".repeat(70_000);
        let image = ModuleImageBuilder::new()
            .assembly(&long_name, (3, 0, 0, 0))
            .culture("en-US")
            .build();
        let meta = extract(&image).unwrap();
        assert_eq!(meta.assembly_version, Some(ModuleVersion::new(3, 0, 0, 0)));
        assert_eq!(meta.culture.as_deref(), Some("en-US"));
    }

    #[test]
    fn test_target_framework_without_assembly_row() {
        let image = ModuleImageBuilder::new()
            .target_framework(".NETCoreApp,Version=v9.0")
            .build();
        let meta = extract(&image).unwrap();
        assert_eq!(meta.framework.as_deref(), Some(".NETCoreApp,Version=v9.0"));
        assert_eq!(meta.culture, None);
    }
}
