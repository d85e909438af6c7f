//! Single-file extraction from copy-from-container tar archives.

use crate::error::{ClientError, Result};
use std::io::Read;
use std::path::Path;

/// Upper bound on the buffer reserved from a header's declared size.
const PREALLOCATE_LIMIT: u64 = 64 * 1024;

/// A file read out of a tar archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    /// Entry name as recorded in the archive
    pub name: String,
    /// Declared size, always equal to `content.len()`
    pub size: u64,
    /// Entry bytes
    pub content: Vec<u8>,
}

/// Read the first entry of a tar archive.
///
/// Copying a single path from a container yields an archive holding exactly
/// one entry. `desired_name` is only used for diagnostics: the first entry
/// is returned even when its name differs. Archives with several entries
/// (a copied directory) are not unpacked beyond the first one.
///
/// # Errors
/// Returns [`ClientError::Format`] if there is no valid tar header or the
/// entry holds fewer bytes than its header declares.
pub fn extract_single_entry<R: Read>(reader: R, desired_name: &str) -> Result<TarEntry> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = archive
        .entries()
        .map_err(|e| ClientError::Format(format!("invalid tar archive: {e}")))?;

    let mut entry = entries
        .next()
        .ok_or_else(|| ClientError::Format("tar archive contains no entries".to_string()))?
        .map_err(|e| ClientError::Format(format!("invalid tar header: {e}")))?;

    let name = entry
        .path()
        .map_err(|e| ClientError::Format(format!("invalid tar entry name: {e}")))?
        .to_string_lossy()
        .into_owned();
    let size = entry
        .header()
        .size()
        .map_err(|e| ClientError::Format(format!("invalid tar entry size: {e}")))?;

    if Path::new(&name).file_name() != Path::new(desired_name).file_name() {
        tracing::debug!(%name, desired = %desired_name, "Tar entry name differs from requested path");
    }

    let mut content = Vec::with_capacity(size.min(PREALLOCATE_LIMIT) as usize);
    let read = (&mut entry)
        .take(size)
        .read_to_end(&mut content)
        .map_err(|e| ClientError::Format(format!("failed to read tar entry {name}: {e}")))?;
    if (read as u64) < size {
        return Err(ClientError::Format(format!(
            "tar entry {name} declares {size} bytes but the archive holds only {read}"
        )));
    }

    Ok(TarEntry {
        name,
        size,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_extracts_single_entry() {
        let data = archive(&[("foo.txt", &b"bar"[..])]);
        let entry = extract_single_entry(&data[..], "/tmp/foo.txt").unwrap();
        assert_eq!(
            entry,
            TarEntry {
                name: "foo.txt".into(),
                size: 3,
                content: b"bar".to_vec(),
            }
        );
    }

    #[test]
    fn test_empty_stream_is_format_error() {
        let err = extract_single_entry(&b""[..], "foo.txt").unwrap_err();
        assert!(matches!(err, ClientError::Format(_)));
    }

    #[test]
    fn test_end_of_archive_marker_only_is_format_error() {
        let data = archive(&[]);
        let err = extract_single_entry(&data[..], "foo.txt").unwrap_err();
        assert!(matches!(err, ClientError::Format(_)));
    }

    #[test]
    fn test_truncated_content_is_format_error() {
        let data = archive(&[("foo.txt", &b"0123456789"[..])]);
        // Keep the 512-byte header and four bytes of content.
        let err = extract_single_entry(&data[..516], "foo.txt").unwrap_err();
        assert!(matches!(err, ClientError::Format(_)));
    }

    #[test]
    fn test_oversized_declared_size_is_format_error() {
        let mut header = tar::Header::new_gnu();
        header.set_path("foo.txt").unwrap();
        header.set_size(1 << 44);
        header.set_mode(0o644);
        header.set_cksum();
        let mut data = header.as_bytes().to_vec();
        data.extend_from_slice(b"bar");

        match extract_single_entry(&data[..], "foo.txt") {
            Err(ClientError::Format(msg)) => assert!(msg.contains("holds only 3"), "{msg}"),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_name_mismatch_still_returns_first_entry() {
        let data = archive(&[("other.txt", &b"x"[..]), ("foo.txt", &b"bar"[..])]);
        let entry = extract_single_entry(&data[..], "foo.txt").unwrap();
        assert_eq!(entry.name, "other.txt");
        assert_eq!(entry.content, b"x");
    }
}
