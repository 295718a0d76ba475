//! The disk as a narrow external-collaborator trait (spec §6.1), since the PCI/IDE
//! driver itself is out of scope (spec §1, "Out of scope").

use crate::config::SECTOR_SIZE;
use crate::error::KernelResult;

/// Sector-addressed block storage. Grounded in `original_source/p4/410kern/ide/ide.h`'s
/// `dma_read` — a synchronous, whole-sector read keyed by sector number.
pub trait BlockDevice {
    fn sector_count(&self) -> u32;
    fn read_sector(&self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> KernelResult<()>;
}

/// A `Vec`-backed stand-in good enough to exercise `fs::layout` against in tests —
/// the in-tree equivalent of `mm::phys_mem::SimPhysicalMemory` for the disk.
#[cfg(any(test, not(target_os = "none")))]
pub struct RamDisk {
    sectors: alloc::vec::Vec<[u8; SECTOR_SIZE]>,
}

#[cfg(any(test, not(target_os = "none")))]
impl RamDisk {
    pub fn new(sector_count: u32) -> Self {
        Self {
            sectors: alloc::vec![[0u8; SECTOR_SIZE]; sector_count as usize],
        }
    }

    pub fn write_sector(&mut self, sector: u32, data: &[u8; SECTOR_SIZE]) {
        self.sectors[sector as usize] = *data;
    }
}

#[cfg(any(test, not(target_os = "none")))]
impl BlockDevice for RamDisk {
    fn sector_count(&self) -> u32 {
        self.sectors.len() as u32
    }

    fn read_sector(&self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> KernelResult<()> {
        let src = self
            .sectors
            .get(sector as usize)
            .ok_or(crate::error::KernelError::InvalidArgument)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
