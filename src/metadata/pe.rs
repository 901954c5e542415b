//! PE/COFF image headers.
//!
//! Only what the extractor needs is decoded: the target machine, the data
//! directory table and the section table used to map RVAs to file offsets.

use std::fmt;

use serde::{Serialize, Serializer};

use super::{bytes_at, le_u16, le_u32, MetadataError};

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const E_LFANEW_OFFSET: usize = 0x3C;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;

/// Data directory index of the resource table.
pub const RESOURCE_DIRECTORY: usize = 2;
/// Data directory index of the CLI header.
pub const CLI_DIRECTORY: usize = 14;

pub(crate) const MACHINE_I386: u16 = 0x014c;
pub(crate) const MACHINE_AMD64: u16 = 0x8664;
pub(crate) const MACHINE_ARM: u16 = 0x01c0;
pub(crate) const MACHINE_ARMNT: u16 = 0x01c4;
pub(crate) const MACHINE_THUMB: u16 = 0x01c2;
pub(crate) const MACHINE_ARM64: u16 = 0xaa64;

/// ReadyToRun images XOR the machine field with an OS-specific value.
pub(crate) const READY_TO_RUN_OS_MASKS: [u16; 5] = [
    0x4644, // Apple
    0xADC4, // FreeBSD
    0x7B79, // Linux
    0x1993, // NetBSD
    0x1992, // Sun
];

/// CLI header flag: the module contains only IL.
pub const COMIMAGE_FLAGS_ILONLY: u32 = 0x0000_0001;
/// CLI header flag: the module must run in a 32-bit process.
pub const COMIMAGE_FLAGS_32BITREQUIRED: u32 = 0x0000_0002;
/// CLI header flag: the module prefers, but does not need, a 32-bit process.
pub const COMIMAGE_FLAGS_32BITPREFERRED: u32 = 0x0002_0000;

/// Target processor of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Architecture {
    /// IL-only module that runs on any processor
    AnyCpu,
    X86,
    X64,
    Arm,
    Arm64,
}

impl Architecture {
    /// Short lowercase tag used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyCpu => "anycpu",
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
        }
    }

    fn from_machine(machine: u16) -> Option<Self> {
        match machine {
            MACHINE_I386 => Some(Self::X86),
            MACHINE_AMD64 => Some(Self::X64),
            MACHINE_ARM | MACHINE_ARMNT | MACHINE_THUMB => Some(Self::Arm),
            MACHINE_ARM64 => Some(Self::Arm64),
            _ => None,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Architecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An entry of the optional header's data directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDirectory {
    pub rva: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && rva - self.virtual_address < extent
    }
}

/// A parsed view over the bytes of a PE image.
#[derive(Debug, Clone)]
pub struct PeImage<'a> {
    data: &'a [u8],
    machine: u16,
    directories: Vec<DataDirectory>,
    sections: Vec<Section>,
}

impl<'a> PeImage<'a> {
    /// Parse the DOS, COFF and optional headers plus the section table.
    ///
    /// # Errors
    ///
    /// Fails when a signature is missing or a header runs past the end of
    /// `data`. Callers treat any failure as "not a module".
    pub fn parse(data: &'a [u8]) -> Result<Self, MetadataError> {
        if le_u16(data, 0)? != DOS_MAGIC {
            return Err(MetadataError::BadSignature("MZ"));
        }

        let pe_offset = le_u32(data, E_LFANEW_OFFSET)? as usize;
        if le_u32(data, pe_offset)? != PE_SIGNATURE {
            return Err(MetadataError::BadSignature("PE"));
        }

        let coff = pe_offset + 4;
        let machine = le_u16(data, coff)?;
        let section_count = le_u16(data, coff + 2)? as usize;
        let optional_size = le_u16(data, coff + 16)? as usize;

        let optional = coff + COFF_HEADER_SIZE;
        let (count_at, dirs_at) = match le_u16(data, optional)? {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            other => {
                return Err(MetadataError::Unsupported(format!(
                    "optional header magic {other:#x}"
                )))
            }
        };

        let dir_count = le_u32(data, optional + count_at)? as usize;
        // Directories must fit in the declared optional header
        let dir_count = dir_count.min(optional_size.saturating_sub(dirs_at) / 8);
        let mut directories = Vec::with_capacity(dir_count);
        for i in 0..dir_count {
            let at = optional + dirs_at + i * 8;
            directories.push(DataDirectory {
                rva: le_u32(data, at)?,
                size: le_u32(data, at + 4)?,
            });
        }

        let table = optional + optional_size;
        let mut sections = Vec::with_capacity(section_count);
        for i in 0..section_count {
            let at = table + i * SECTION_HEADER_SIZE;
            sections.push(Section {
                virtual_size: le_u32(data, at + 8)?,
                virtual_address: le_u32(data, at + 12)?,
                raw_size: le_u32(data, at + 16)?,
                raw_pointer: le_u32(data, at + 20)?,
            });
        }

        Ok(Self {
            data,
            machine,
            directories,
            sections,
        })
    }

    /// Raw machine field from the COFF header.
    #[must_use]
    pub fn machine(&self) -> u16 {
        self.machine
    }

    /// Returns a data directory, or `None` when it is absent or empty.
    #[must_use]
    pub fn directory(&self, index: usize) -> Option<DataDirectory> {
        self.directories
            .get(index)
            .copied()
            .filter(|d| d.rva != 0 && d.size != 0)
    }

    /// Map an RVA to a file offset through the section table.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize, MetadataError> {
        let section = self
            .sections
            .iter()
            .find(|s| s.contains(rva))
            .ok_or(MetadataError::BadIndex { what: "rva", index: rva })?;
        Ok(section.raw_pointer as usize + (rva - section.virtual_address) as usize)
    }

    /// Borrow `size` bytes starting at `rva`.
    pub fn slice_at_rva(&self, rva: u32, size: u32) -> Result<&'a [u8], MetadataError> {
        let offset = self.rva_to_offset(rva)?;
        bytes_at(self.data, offset, size as usize)
    }

    /// Decode the module architecture.
    ///
    /// `cli_flags` are the flags of the CLI header for managed modules; they
    /// turn an I386 IL-only module into [`Architecture::AnyCpu`].
    #[must_use]
    pub fn architecture(&self, cli_flags: Option<u32>) -> Option<Architecture> {
        let machine = unmask_machine(self.machine)?;
        let arch = Architecture::from_machine(machine)?;

        if arch == Architecture::X86 {
            if let Some(flags) = cli_flags {
                let il_only = flags & COMIMAGE_FLAGS_ILONLY != 0;
                let required = flags & COMIMAGE_FLAGS_32BITREQUIRED != 0;
                let preferred = flags & COMIMAGE_FLAGS_32BITPREFERRED != 0;
                if il_only && (!required || preferred) {
                    return Some(Architecture::AnyCpu);
                }
            }
        }
        Some(arch)
    }
}

/// Strip a ReadyToRun OS override from a machine value.
fn unmask_machine(machine: u16) -> Option<u16> {
    if Architecture::from_machine(machine).is_some() {
        return Some(machine);
    }
    READY_TO_RUN_OS_MASKS
        .iter()
        .map(|mask| machine ^ mask)
        .find(|m| Architecture::from_machine(*m).is_some())
}
