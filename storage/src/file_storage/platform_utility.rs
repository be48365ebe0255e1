use std::path::Path;

use crate::storage::Result;

#[cfg(unix)]
pub(crate) fn available_storage(path: &Path) -> Result<u64> {
    use nix::sys::statvfs;

    let stats = statvfs::statvfs(path)?;
    let available_bytes = stats.blocks_available() as u64 * stats.fragment_size() as u64;
    Ok(available_bytes / 1024)
}

#[cfg(not(unix))]
pub(crate) fn available_storage(_path: &Path) -> Result<u64> {
    Err("free space probe is only supported on unix".into())
}
