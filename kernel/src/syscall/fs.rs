//! `readfile(filename, buf, count, offset)` (spec §4.5 "Filesystem"), the only
//! filesystem operation exposed as a system call — `sizefile` (`fs::layout::sizefile`)
//! is an internal helper `exec`'s catalogue lookup uses, not part of the ABI table.

use crate::config::MAX_EXECNAME_LEN;
use crate::error::KernelResult;
use crate::fs::ExecCatalogue;
use crate::mm::vas::{copy_to_user, validate_cstr};
use crate::mm::PhysicalMemory;
use crate::process::ids::Pid;
use crate::process::table;

/// Reads at most `count` bytes of `filename` starting at `offset` into the user buffer
/// at `buf_va`, returning the number of bytes actually copied (spec §4.5 edge case:
/// "a `count`/`offset` pair that runs past end-of-file copies only the bytes that
/// exist"). `catalogue` hides whether the backing store is the in-image boot catalogue
/// or the on-disk P4 filesystem (spec §6.1).
pub fn readfile(
    pid: Pid,
    mem: &mut impl PhysicalMemory,
    name_va: u32,
    buf_va: u32,
    count: u32,
    offset: u32,
    catalogue: &impl ExecCatalogue,
) -> KernelResult<u32> {
    let pd = table::page_directory(pid)?;
    let name_len = validate_cstr(mem, pd, name_va, MAX_EXECNAME_LEN)?;
    let mut name_bytes = alloc::vec![0u8; name_len];
    crate::mm::vas::copy_from_user(mem, pd, name_va, &mut name_bytes)?;
    let name = core::str::from_utf8(&name_bytes).map_err(|_| crate::error::KernelError::InvalidArgument)?;

    let full = catalogue.lookup(name)?;
    let start = (offset as usize).min(full.len());
    let end = start.saturating_add(count as usize).min(full.len());
    let slice = &full[start..end];
    copy_to_user(mem, pd, buf_va, slice)?;
    Ok(slice.len() as u32)
}
