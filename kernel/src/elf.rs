//! Simplified ELF section-table parsing and validation (spec §6, "Executable format"),
//! grounded in `original_source/p3/410kern/elf/elf_410.h`'s `simple_elf_t`.
//!
//! This crate does not parse real ELF32 headers — per spec §6 the boot catalogue
//! hands `exec` an already-extracted `SimpleElf` (file-offset, memory-address, length
//! triples per section), exactly the structure the original's `elf_load_helper`
//! produces. What lives here is the validation `exec` must run on that structure
//! before trusting it, plus the per-segment read/write flags `exec` maps with.

use crate::config::USER_MEM_START;
use crate::error::{KernelError, KernelResult};

/// One `{file offset, length, virtual start}` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    pub file_offset: u32,
    pub len: u32,
    pub start: u32,
}

impl Segment {
    fn end(&self) -> Option<u32> {
        self.start.checked_add(self.len)
    }
}

/// A loadable program image, named `SimpleElf` to match `simple_elf_t` (spec §6).
#[derive(Debug, Clone, Default)]
pub struct SimpleElf {
    pub entry: u32,
    pub text: Segment,
    pub rodata: Segment,
    pub data: Segment,
    /// bss has no file offset — it is zero-filled, not copied in (§6).
    pub bss_start: u32,
    pub bss_len: u32,
}

/// Which of the four sections a mapped page belongs to, with the read/write flag
/// `exec` must map it with (spec §6: "text/rodata read-only, data/bss writable").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Text,
    Rodata,
    Data,
    Bss,
}

impl SectionKind {
    pub fn writable(self) -> bool {
        matches!(self, SectionKind::Data | SectionKind::Bss)
    }
}

/// One segment ready to be mapped: its kind (for the read/write flag), its virtual
/// range, and its source bytes in the backing file (`None` for bss, which is
/// zero-filled rather than copied).
#[derive(Debug, Clone, Copy)]
pub struct LoadableSegment {
    pub kind: SectionKind,
    pub start: u32,
    pub len: u32,
    pub file_offset: Option<u32>,
}

impl SimpleElf {
    /// Every named, non-empty segment as a `LoadableSegment`, in `.text`, `.rodata`,
    /// `.data`, `.bss` order — the order `exec` maps them in.
    pub fn segments(&self) -> impl Iterator<Item = LoadableSegment> + '_ {
        [
            (SectionKind::Text, self.text.start, self.text.len, Some(self.text.file_offset)),
            (SectionKind::Rodata, self.rodata.start, self.rodata.len, Some(self.rodata.file_offset)),
            (SectionKind::Data, self.data.start, self.data.len, Some(self.data.file_offset)),
            (SectionKind::Bss, self.bss_start, self.bss_len, None),
        ]
        .into_iter()
        .filter(|(_, _, len, _)| *len > 0)
        .map(|(kind, start, len, file_offset)| LoadableSegment {
            kind,
            start,
            len,
            file_offset,
        })
    }

    /// `exec` rejects any binary whose entry point is not inside `.text` or whose
    /// segments fall outside the user range (spec §6). Segments are also rejected if
    /// they overlap one another — the original's loader trusts a well-formed
    /// `simple_elf_t` to not overlap, but this crate checks explicitly since the
    /// catalogue handing us one is an external collaborator (§6.1).
    pub fn validate(&self) -> KernelResult<()> {
        let segs: alloc::vec::Vec<Segment> = [self.text, self.rodata, self.data]
            .into_iter()
            .chain(core::iter::once(Segment {
                file_offset: 0,
                len: self.bss_len,
                start: self.bss_start,
            }))
            .filter(|s| s.len > 0)
            .collect();

        if segs.is_empty() {
            return Err(KernelError::InvalidArgument);
        }

        for seg in &segs {
            let end = seg.end().ok_or(KernelError::InvalidArgument)?;
            if (seg.start as usize) < USER_MEM_START {
                return Err(KernelError::MemoryValidation);
            }
            if (end as usize) < USER_MEM_START {
                return Err(KernelError::InvalidArgument);
            }
        }

        for i in 0..segs.len() {
            for j in (i + 1)..segs.len() {
                if ranges_overlap(segs[i], segs[j]) {
                    return Err(KernelError::Overlap);
                }
            }
        }

        let text_end = self.text.end().ok_or(KernelError::InvalidArgument)?;
        if self.text.len == 0 || self.entry < self.text.start || self.entry >= text_end {
            return Err(KernelError::InvalidArgument);
        }

        Ok(())
    }
}

fn ranges_overlap(a: Segment, b: Segment) -> bool {
    let (Some(a_end), Some(b_end)) = (a.end(), b.end()) else {
        return true;
    };
    a.start < b_end && b.start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_elf() -> SimpleElf {
        SimpleElf {
            entry: USER_MEM_START as u32 + 0x10,
            text: Segment { file_offset: 0, len: 0x1000, start: USER_MEM_START as u32 },
            rodata: Segment { file_offset: 0x1000, len: 0x1000, start: USER_MEM_START as u32 + 0x1000 },
            data: Segment { file_offset: 0x2000, len: 0x1000, start: USER_MEM_START as u32 + 0x2000 },
            bss_start: USER_MEM_START as u32 + 0x3000,
            bss_len: 0x1000,
        }
    }

    #[test]
    fn well_formed_elf_validates() {
        assert!(valid_elf().validate().is_ok());
    }

    #[test]
    fn entry_outside_text_is_rejected() {
        let mut elf = valid_elf();
        elf.entry = elf.rodata.start;
        assert_eq!(elf.validate().unwrap_err(), KernelError::InvalidArgument);
    }

    #[test]
    fn segment_below_user_memory_is_rejected() {
        let mut elf = valid_elf();
        elf.data.start = 0;
        assert_eq!(elf.validate().unwrap_err(), KernelError::MemoryValidation);
    }

    #[test]
    fn overlapping_segments_are_rejected() {
        let mut elf = valid_elf();
        elf.rodata.start = elf.text.start;
        assert_eq!(elf.validate().unwrap_err(), KernelError::Overlap);
    }

    #[test]
    fn segments_iterator_reports_correct_flags_and_skips_empty_sections() {
        let mut elf = valid_elf();
        elf.bss_len = 0;
        let segs: alloc::vec::Vec<_> = elf.segments().collect();
        assert_eq!(segs.len(), 3);
        assert!(!segs[0].kind.writable());
        assert!(!segs[1].kind.writable());
        assert!(segs[2].kind.writable());
    }
}
