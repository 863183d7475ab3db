//! Archive reader: pulls the single tabular payload out of a ZIP container.

use std::io::{Cursor, Read};

use bytes::Bytes;

use crate::error::{Error, Result};

/// The payload located inside an archive.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Member name inside the container.
    pub name: String,
    /// Decompressed member content.
    pub data: Bytes,
}

/// Extracts the first member whose name ends with `extension`.
///
/// Members are scanned in central-directory order and directories are
/// ignored. When several members qualify the first one wins; the choice is
/// stable for a given container but carries no further meaning.
///
/// # Errors
///
/// - [`Error::ArchiveFormat`] if the container cannot be opened or the
///   member cannot be decompressed.
/// - [`Error::PayloadNotFound`] if no member qualifies.
pub fn extract_payload(archive: Bytes, extension: &str) -> Result<Payload> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::archive_format("cannot open zip container", e))?;

    let mut selected = None;
    for index in 0..zip.len() {
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| Error::archive_format(format!("cannot read entry {index}"), e))?;
        if !entry.is_dir() && entry.name().ends_with(extension) {
            selected = Some(index);
            break;
        }
    }

    let Some(index) = selected else {
        return Err(Error::PayloadNotFound {
            extension: extension.to_string(),
        });
    };

    let mut entry = zip
        .by_index(index)
        .map_err(|e| Error::archive_format(format!("cannot open entry {index}"), e))?;
    let name = entry.name().to_string();
    let capacity = usize::try_from(entry.size()).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);
    entry
        .read_to_end(&mut data)
        .map_err(|e| Error::archive_format(format!("cannot decompress '{name}'"), e))?;

    tracing::debug!(member = %name, bytes = data.len(), "extracted payload");

    Ok(Payload {
        name,
        data: Bytes::from(data),
    })
}
