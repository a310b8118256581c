//! Migration checksums for drift auditing.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes the checksum of a migration's name and declared content.
///
/// FNV-1a (32-bit) over the UTF-16 code units of `name + content_hash`,
/// rendered as 8 lowercase hex digits. Checksums recorded by earlier
/// deployments stay comparable as long as this stays UTF-16 based.
pub fn checksum(name: &str, content_hash: Option<&str>) -> String {
    let units = name
        .encode_utf16()
        .chain(content_hash.unwrap_or_default().encode_utf16());

    let hash = units.fold(FNV_OFFSET_BASIS, |acc, unit| {
        (acc ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    });

    format!("{hash:08x}")
}
