//! File version from the `RT_VERSION` resource.
//!
//! The resource is a tree of `VS_VERSIONINFO` blocks. The free-form
//! `FileVersion` string of the first string table is preferred; when it is
//! missing the numeric version of `VS_FIXEDFILEINFO` is used instead.

use super::pe::{PeImage, RESOURCE_DIRECTORY};
use super::{align4, bytes_at, le_u16, le_u32, MetadataError};

const RT_VERSION: u32 = 16;
const SUBDIRECTORY_BIT: u32 = 0x8000_0000;
const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_FILE_INFO_SIZE: usize = 52;
const BLOCK_HEADER_SIZE: usize = 6;
const MAX_NESTING: usize = 4;

/// Read the file version of an image, if it has a version resource.
pub fn file_version(image: &PeImage<'_>) -> Result<Option<String>, MetadataError> {
    let Some(dir) = image.directory(RESOURCE_DIRECTORY) else {
        return Ok(None);
    };
    let resources = image.slice_at_rva(dir.rva, dir.size)?;
    let Some((rva, size)) = find_version_resource(resources)? else {
        return Ok(None);
    };
    let data = image.slice_at_rva(rva, size)?;
    parse_version_info(data)
}

/// Walk type → name → language and return the data entry `(rva, size)`.
fn find_version_resource(resources: &[u8]) -> Result<Option<(u32, u32)>, MetadataError> {
    let Some(type_entry) = directory_entries(resources, 0)?
        .into_iter()
        .find(|(id, _)| *id == RT_VERSION)
    else {
        return Ok(None);
    };

    let mut target = type_entry.1;
    // Name and language levels: take the first entry of each
    for _ in 0..2 {
        if target & SUBDIRECTORY_BIT == 0 {
            break;
        }
        let offset = (target & !SUBDIRECTORY_BIT) as usize;
        match directory_entries(resources, offset)?.first() {
            Some(&(_, next)) => target = next,
            None => return Ok(None),
        }
    }

    if target & SUBDIRECTORY_BIT != 0 {
        return Ok(None);
    }
    let entry = target as usize;
    Ok(Some((le_u32(resources, entry)?, le_u32(resources, entry + 4)?)))
}

/// Entries of one resource directory as `(name or id, offset)` pairs.
fn directory_entries(resources: &[u8], at: usize) -> Result<Vec<(u32, u32)>, MetadataError> {
    let named = le_u16(resources, at + 12)? as usize;
    let ids = le_u16(resources, at + 14)? as usize;
    (0..named + ids)
        .map(|i| {
            let entry = at + 16 + i * 8;
            Ok((le_u32(resources, entry)?, le_u32(resources, entry + 4)?))
        })
        .collect()
}

struct Block<'a> {
    key: String,
    value: &'a [u8],
    children: &'a [u8],
}

/// Parse one block starting at `at`, returning it and the offset of the next
/// sibling.
fn read_block(data: &[u8], at: usize) -> Result<(Block<'_>, usize), MetadataError> {
    let length = le_u16(data, at)? as usize;
    let value_length = le_u16(data, at + 2)? as usize;
    let text = le_u16(data, at + 4)? == 1;
    if length < BLOCK_HEADER_SIZE {
        return Err(MetadataError::Truncated(at));
    }
    let end = at + length;
    let block = bytes_at(data, at, length)?;

    let (key, key_bytes) = utf16_until_nul(&block[BLOCK_HEADER_SIZE..]);
    let value_start = align4(BLOCK_HEADER_SIZE + key_bytes).min(length);
    let value_bytes = if text { value_length * 2 } else { value_length };
    let value_end = (value_start + value_bytes).min(length);
    let children_start = align4(value_end).min(length);

    Ok((
        Block {
            key,
            value: &block[value_start..value_end],
            children: &block[children_start..],
        },
        align4(end),
    ))
}

fn children(region: &[u8]) -> Result<Vec<Block<'_>>, MetadataError> {
    let mut blocks = Vec::new();
    let mut at = 0;
    while at + BLOCK_HEADER_SIZE <= region.len() {
        let (block, next) = read_block(region, at)?;
        blocks.push(block);
        at = next;
    }
    Ok(blocks)
}

/// Decode UTF-16LE up to the first nul. Returns the text and the number of
/// bytes consumed including the terminator.
fn utf16_until_nul(data: &[u8]) -> (String, usize) {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    let consumed = ((units.len() + 1) * 2).min(data.len());
    (String::from_utf16_lossy(&units), consumed)
}

fn parse_version_info(data: &[u8]) -> Result<Option<String>, MetadataError> {
    let (root, _) = read_block(data, 0)?;
    if root.key != "VS_VERSION_INFO" {
        return Err(MetadataError::BadSignature("VS_VERSION_INFO"));
    }

    if let Some(text) = find_string(root.children, "FileVersion", 0)? {
        return Ok(Some(text));
    }
    Ok(fixed_file_version(root.value))
}

/// Search `StringFileInfo` → string tables → strings for `name`.
fn find_string(region: &[u8], name: &str, depth: usize) -> Result<Option<String>, MetadataError> {
    if depth >= MAX_NESTING {
        return Ok(None);
    }
    for block in children(region)? {
        if depth == 2 && block.key == name {
            let (text, _) = utf16_until_nul(block.value);
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        } else if (depth == 0 && block.key == "StringFileInfo") || depth == 1 {
            if let Some(found) = find_string(block.children, name, depth + 1)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn fixed_file_version(value: &[u8]) -> Option<String> {
    if value.len() < FIXED_FILE_INFO_SIZE || le_u32(value, 0).ok()? != FIXED_FILE_INFO_SIGNATURE {
        return None;
    }
    let ms = le_u32(value, 8).ok()?;
    let ls = le_u32(value, 12).ok()?;
    if ms == 0 && ls == 0 {
        return None;
    }
    Some(format!("{}.{}.{}.{}", ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF))
}
