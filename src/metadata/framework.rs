//! Target framework identity.
//!
//! A module either declares its framework with `TargetFrameworkAttribute` on
//! the assembly (or module), or the framework is inferred from the version of
//! the runtime library it references.

use super::tables::{compressed_u32, table, AssemblyReference, Metadata};
use super::{bytes_at, le_u16, MetadataError};

const ATTRIBUTE_NAMESPACE: &str = "System.Runtime.Versioning";
const ATTRIBUTE_NAME: &str = "TargetFrameworkAttribute";
const CUSTOM_ATTRIBUTE_PROLOG: u16 = 0x0001;
const NULL_SER_STRING: u8 = 0xFF;

/// Newest runtime major version the inference table knows about.
pub const NEWEST_RUNTIME_MAJOR: u32 = 10;

/// Return the framework declared by a `TargetFrameworkAttribute`.
///
/// Only attributes attached to the Assembly or Module row count. Any decoding
/// problem is treated as "not declared".
#[must_use]
pub fn declared_framework(metadata: &Metadata<'_>) -> Option<String> {
    let attributes = match metadata.custom_attributes() {
        Ok(attributes) => attributes,
        Err(e) => {
            log::trace!("Unreadable custom attributes: {}", e);
            return None;
        }
    };

    attributes
        .iter()
        .filter(|a| matches!(a.parent.0, table::ASSEMBLY | table::MODULE))
        .filter_map(|a| {
            let ctor = a.constructor?;
            match metadata.attribute_type(ctor) {
                Ok(Some((ATTRIBUTE_NAMESPACE, ATTRIBUTE_NAME))) => Some(a.value),
                Ok(_) => None,
                Err(e) => {
                    log::trace!("Unresolvable attribute constructor: {}", e);
                    None
                }
            }
        })
        .find_map(|value| {
            metadata
                .blob(value)
                .and_then(first_string_argument)
                .unwrap_or_else(|e| {
                    log::trace!("Malformed TargetFrameworkAttribute value: {}", e);
                    None
                })
        })
}

/// Decode the first fixed argument of an attribute value as a string.
///
/// The value is the prolog `0x0001` followed by a SerString; `0xFF` encodes a
/// null string.
pub fn first_string_argument(value: &[u8]) -> Result<Option<String>, MetadataError> {
    if le_u16(value, 0)? != CUSTOM_ATTRIBUTE_PROLOG {
        return Err(MetadataError::BadSignature("custom attribute prolog"));
    }
    let rest = value.get(2..).ok_or(MetadataError::Truncated(2))?;
    if rest.first() == Some(&NULL_SER_STRING) {
        return Ok(None);
    }
    let (len, header) = compressed_u32(rest)?;
    let text = bytes_at(rest, header, len as usize)?;
    let text = std::str::from_utf8(text).map_err(|_| MetadataError::BadString("attribute value"))?;
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Infer the framework from assembly references.
///
/// References are tried in order and the first one that maps to a known
/// framework wins.
#[must_use]
pub fn infer_framework(references: &[AssemblyReference]) -> Option<String> {
    references.iter().find_map(framework_for_reference)
}

fn framework_for_reference(reference: &AssemblyReference) -> Option<String> {
    let v = &reference.version;
    let build = v.build.unwrap_or(0);
    match reference.name.as_str() {
        "netstandard" => {
            matches!(v.major, 1 | 2).then(|| format!(".NETStandard,Version=v{}.{}", v.major, v.minor))
        }
        "System.Runtime" | "System.Private.CoreLib" | "mscorlib" => {
            runtime_framework(v.major, v.minor, build)
        }
        _ => None,
    }
}

/// Map a runtime library version to the framework that shipped it.
fn runtime_framework(major: u32, minor: u32, build: u32) -> Option<String> {
    let moniker = match (major, minor, build) {
        (4, 0, 0) => ".NETFramework,Version=v4.5".to_string(),
        (4, 0, 10) | (4, 0, 20) => ".NETFramework,Version=v4.6".to_string(),
        (4, 2, 0) => ".NETCoreApp,Version=v2.0".to_string(),
        (4, 2, 1) => ".NETCoreApp,Version=v2.1".to_string(),
        (4, 2, 2) => ".NETCoreApp,Version=v3.0".to_string(),
        (5..=NEWEST_RUNTIME_MAJOR, 0, 0) => format!(".NETCoreApp,Version=v{major}.0"),
        _ => return None,
    };
    Some(moniker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract;
    use crate::metadata::ModuleImageBuilder;
    use crate::version::ModuleVersion;

    fn reference(name: &str, v: (u32, u32, u32, u32)) -> AssemblyReference {
        AssemblyReference {
            name: name.to_string(),
            version: ModuleVersion::new(v.0, v.1, v.2, v.3),
        }
    }

    #[test]
    fn test_runtime_table() {
        let cases = [
            ((4, 0, 0, 0), Some(".NETFramework,Version=v4.5")),
            ((4, 0, 10, 0), Some(".NETFramework,Version=v4.6")),
            ((4, 0, 20, 0), Some(".NETFramework,Version=v4.6")),
            ((4, 2, 0, 0), Some(".NETCoreApp,Version=v2.0")),
            ((4, 2, 1, 0), Some(".NETCoreApp,Version=v2.1")),
            ((4, 2, 2, 0), Some(".NETCoreApp,Version=v3.0")),
            ((5, 0, 0, 0), Some(".NETCoreApp,Version=v5.0")),
            ((9, 0, 0, 0), Some(".NETCoreApp,Version=v9.0")),
            ((10, 0, 0, 0), Some(".NETCoreApp,Version=v10.0")),
            ((11, 0, 0, 0), None),
            ((4, 1, 0, 0), None),
            ((8, 0, 1, 0), None),
        ];
        for (version, expected) in cases {
            assert_eq!(
                framework_for_reference(&reference("System.Runtime", version)).as_deref(),
                expected,
                "System.Runtime {version:?}"
            );
        }
    }

    #[test]
    fn test_netstandard_reference() {
        assert_eq!(
            framework_for_reference(&reference("netstandard", (2, 1, 0, 0))).as_deref(),
            Some(".NETStandard,Version=v2.1")
        );
        assert_eq!(
            framework_for_reference(&reference("netstandard", (1, 6, 0, 0))).as_deref(),
            Some(".NETStandard,Version=v1.6")
        );
        assert_eq!(framework_for_reference(&reference("netstandard", (3, 0, 0, 0))), None);
    }

    #[test]
    fn test_unrelated_reference_is_ignored() {
        assert_eq!(framework_for_reference(&reference("Newtonsoft.Json", (8, 0, 0, 0))), None);
    }

    #[test]
    fn test_first_matching_reference_wins() {
        let refs = [
            reference("Microsoft.Extensions.Logging", (8, 0, 0, 0)),
            reference("System.Runtime", (11, 0, 0, 0)),
            reference("mscorlib", (4, 0, 0, 0)),
            reference("netstandard", (2, 0, 0, 0)),
        ];
        assert_eq!(infer_framework(&refs).as_deref(), Some(".NETFramework,Version=v4.5"));
        assert_eq!(infer_framework(&[]), None);
    }

    #[test]
    fn test_first_string_argument() {
        let value = [0x01, 0x00, 0x03, b'a', b'b', b'c', 0x00, 0x00];
        assert_eq!(first_string_argument(&value).unwrap().as_deref(), Some("abc"));

        assert_eq!(first_string_argument(&[0x01, 0x00, 0xFF, 0, 0]).unwrap(), None);
        assert!(first_string_argument(&[0x02, 0x00, 0x01, b'a']).is_err());
        assert!(first_string_argument(&[0x01, 0x00, 0x10, b'a']).is_err());
    }

    #[test]
    fn test_declared_framework_wins_over_references() {
        let image = ModuleImageBuilder::new()
            .assembly("A", (1, 0, 0, 0))
            .assembly_ref("System.Runtime", (8, 0, 0, 0))
            .target_framework(".NETStandard,Version=v2.0")
            .build();
        let meta = extract(&image).unwrap();
        assert_eq!(meta.framework.as_deref(), Some(".NETStandard,Version=v2.0"));
    }

    #[test]
    fn test_declared_framework_locally_defined_attribute() {
        let image = ModuleImageBuilder::new()
            .assembly("A", (1, 0, 0, 0))
            .target_framework_local(".NETFramework,Version=v4.7.2")
            .build();
        let meta = extract(&image).unwrap();
        assert_eq!(meta.framework.as_deref(), Some(".NETFramework,Version=v4.7.2"));
    }

    #[test]
    fn test_resource_only_module_has_no_framework() {
        let image = ModuleImageBuilder::new()
            .assembly("A.resources", (1, 0, 0, 0))
            .culture("ja")
            .build();
        let meta = extract(&image).unwrap();
        assert_eq!(meta.framework, None);
    }
}
