//! Blocking archive walker.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use tokio::sync::mpsc::{self, Sender};

use super::{ArchiveError, ArchiveKind, ArchiveMember, MemberStream};

/// Walk `file` as a `kind` archive, sending one `MemberStream` per regular
/// file and then feeding it that file's bytes in blocks of at most
/// `block_size`.
///
/// Must run off the async runtime (it uses `blocking_send`). Returns the
/// number of members emitted.
pub fn expand(
    mut file: File,
    kind: ArchiveKind,
    block_size: usize,
    tx: Sender<MemberStream>,
) -> Result<usize, ArchiveError> {
    file.seek(SeekFrom::Start(0))?;
    let mut block = vec![0u8; block_size.max(1)];

    let emitted = match kind {
        ArchiveKind::Zip => expand_zip(file, &mut block, &tx)?,
        ArchiveKind::Tar => expand_tar(file, &mut block, &tx)?,
    };

    if emitted == 0 {
        return Err(ArchiveError::Empty);
    }
    Ok(emitted)
}

fn expand_zip(
    file: File,
    block: &mut [u8],
    tx: &Sender<MemberStream>,
) -> Result<usize, ArchiveError> {
    let mut zip = zip::ZipArchive::new(file)?;
    let mut emitted = 0;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let member = ArchiveMember {
            name: entry.name().to_string(),
            byte_size: entry.size(),
        };
        pump(member, &mut entry, block, tx)?;
        emitted += 1;
    }
    Ok(emitted)
}

fn expand_tar(
    file: File,
    block: &mut [u8],
    tx: &Sender<MemberStream>,
) -> Result<usize, ArchiveError> {
    let mut archive = tar::Archive::new(file);
    let mut emitted = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = ArchiveMember {
            name: entry.path()?.to_string_lossy().into_owned(),
            byte_size: entry.size(),
        };
        pump(member, &mut entry, block, tx)?;
        emitted += 1;
    }
    Ok(emitted)
}

fn pump<R: Read>(
    member: ArchiveMember,
    reader: &mut R,
    block: &mut [u8],
    tx: &Sender<MemberStream>,
) -> Result<(), ArchiveError> {
    tracing::debug!(member = %member.name, bytes = member.byte_size, "Expanding archive member");
    let (block_tx, blocks) = mpsc::channel(1);
    tx.blocking_send(MemberStream { member, blocks })
        .map_err(|_| ArchiveError::Cancelled)?;

    loop {
        match reader.read(block) {
            Ok(0) => return Ok(()),
            Ok(n) => block_tx
                .blocking_send(Ok(Bytes::copy_from_slice(&block[..n])))
                .map_err(|_| ArchiveError::Cancelled)?,
            Err(e) => {
                // The reader side only needs to know the member is cut short.
                let _ = block_tx.blocking_send(Err(std::io::Error::new(e.kind(), e.to_string())));
                return Err(e.into());
            }
        }
    }
}
