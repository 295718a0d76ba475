//! P4 on-disk filesystem layout and `readfile`/`sizefile` traversal (spec §6 "Boot
//! catalogue"), grounded in `original_source/p4/kern/disk.c`.
//!
//! The disk's type-`0xAA` partition holds a fixed-size-record format: one superblock
//! sector naming the head of a file-node linked list; each file-node names a file and
//! the head of its own data-node (extent) linked list. Every record occupies exactly
//! one sector and is found by sector number, not by a byte offset — `next == 0` ends
//! a list (sector 0 holds the superblock and can never be a legitimate "next").

use alloc::vec::Vec;

use crate::config::{MAX_EXECNAME_LEN, SECTOR_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::fs::blockdev::BlockDevice;

const SUPERBLOCK_SECTOR: u32 = 0;

/// `superblock_t`: names the head of the file-node list. The original also tracks a
/// free-node list for a (never-implemented, per spec §6 `writefile`/`deletefile`
/// Non-goal) allocator; this crate omits it.
struct Superblock {
    file_node: u32,
}

/// `file_node_t`.
struct FileNode {
    next: u32,
    filename: [u8; MAX_EXECNAME_LEN],
    size: u32,
    data_node: u32,
}

/// `data_node_t`: one extent, i.e. a run of `extent_len` contiguous sectors starting
/// at `extent`.
struct DataNode {
    next: u32,
    extent_len: u32,
    extent: u32,
}

fn parse_u32(buf: &[u8; SECTOR_SIZE], offset: usize) -> u32 {
    u32::from_ne_bytes(buf[offset..offset + 4].try_into().expect("4-byte slice"))
}

fn read_superblock(dev: &impl BlockDevice) -> KernelResult<Superblock> {
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(SUPERBLOCK_SECTOR, &mut buf)?;
    Ok(Superblock {
        file_node: parse_u32(&buf, 4),
    })
}

fn read_file_node(dev: &impl BlockDevice, sector: u32) -> KernelResult<FileNode> {
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(sector, &mut buf)?;
    let mut filename = [0u8; MAX_EXECNAME_LEN];
    filename.copy_from_slice(&buf[4..4 + MAX_EXECNAME_LEN]);
    let size = parse_u32(&buf, 4 + MAX_EXECNAME_LEN);
    let data_node = parse_u32(&buf, 4 + MAX_EXECNAME_LEN + 4);
    Ok(FileNode {
        next: parse_u32(&buf, 0),
        filename,
        size,
        data_node,
    })
}

fn read_data_node(dev: &impl BlockDevice, sector: u32) -> KernelResult<DataNode> {
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(sector, &mut buf)?;
    Ok(DataNode {
        next: parse_u32(&buf, 0),
        extent_len: parse_u32(&buf, 4),
        extent: parse_u32(&buf, 8),
    })
}

fn name_matches(stored: &[u8; MAX_EXECNAME_LEN], name: &str) -> bool {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > MAX_EXECNAME_LEN {
        return false;
    }
    &stored[..name_bytes.len()] == name_bytes
        && stored[name_bytes.len()..].iter().all(|&b| b == 0)
}

fn find_file_node(dev: &impl BlockDevice, name: &str) -> KernelResult<FileNode> {
    let superblock = read_superblock(dev)?;
    let mut addr = superblock.file_node;
    while addr != 0 {
        let node = read_file_node(dev, addr)?;
        if name_matches(&node.filename, name) {
            return Ok(node);
        }
        addr = node.next;
    }
    Err(KernelError::NotFound)
}

/// `sizefile(name)` (spec §6): the file's total byte length, or `NotFound`.
pub fn sizefile(dev: &impl BlockDevice, name: &str) -> KernelResult<u32> {
    Ok(find_file_node(dev, name)?.size)
}

/// `readfile(name, count, offset)` (spec §6): walk the file's extent chain, copying
/// up to `count` bytes starting at `offset` into the returned buffer. Returns fewer
/// than `count` bytes once the file's extents are exhausted, matching the original's
/// "returns bytes read" contract rather than padding with zeros.
pub fn readfile(dev: &impl BlockDevice, name: &str, count: u32, offset: u32) -> KernelResult<Vec<u8>> {
    let node = find_file_node(dev, name)?;
    if offset >= node.size {
        return Ok(Vec::new());
    }
    let count = count.min(node.size - offset);
    let mut out = Vec::with_capacity(count as usize);
    let mut remaining_skip = offset as u64;
    let mut addr = node.data_node;

    while addr != 0 && (out.len() as u32) < count {
        let extent = read_data_node(dev, addr)?;
        let extent_bytes = extent.extent_len as u64 * SECTOR_SIZE as u64;

        if remaining_skip >= extent_bytes {
            remaining_skip -= extent_bytes;
            addr = extent.next;
            continue;
        }

        let start_sector_in_extent = (remaining_skip / SECTOR_SIZE as u64) as u32;
        let mut byte_in_sector = (remaining_skip % SECTOR_SIZE as u64) as usize;
        remaining_skip = 0;

        for sector_index in start_sector_in_extent..extent.extent_len {
            if (out.len() as u32) >= count {
                break;
            }
            let mut buf = [0u8; SECTOR_SIZE];
            dev.read_sector(extent.extent + sector_index, &mut buf)?;
            let take = ((count as usize - out.len()).min(SECTOR_SIZE - byte_in_sector)) as usize;
            out.extend_from_slice(&buf[byte_in_sector..byte_in_sector + take]);
            byte_in_sector = 0;
        }
        addr = extent.next;
    }

    Ok(out)
}
