//! A self-contained address space: per-PID page-table roots plus the three
//! size-specific TLBs that cache translations for it (§4.7).
//!
//! A `Context` is the unit of isolation the whole core operates on —
//! translating against one `Context` never observes or mutates another.
//! Sharing a single `Context` across threads is a caller concern (§5): the
//! type is not internally synchronized.

use crate::addressing::Decoder;
use crate::constants::MAX_PID;
use crate::page_table::{PageSize, PageTableMappingError, PageTableRoots, Privilege};
use crate::permission::Permission;
use crate::tlb_subsystem::TlbSubsystem;

/// Per-process page tables and TLBs (§4.7).
#[derive(Debug)]
pub struct Context {
    decoder: Decoder,
    roots: PageTableRoots,
    tlbs: TlbSubsystem,
}

impl Context {
    /// Builds a context with the default 48-bit VA width and every PID
    /// unmapped.
    pub fn new() -> Self {
        Self::with_va_width(Decoder::DEFAULT_VA_WIDTH)
    }

    /// Builds a context configured for a narrower (or wider) VA width
    /// (§4.1, §10.3).
    pub fn with_va_width(va_width: u32) -> Self {
        Context {
            decoder: Decoder::new(va_width),
            roots: PageTableRoots::new(MAX_PID),
            tlbs: TlbSubsystem::new(),
        }
    }

    /// The address decoder this context was configured with.
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub(crate) fn roots(&self) -> &PageTableRoots {
        &self.roots
    }

    pub(crate) fn tlbs_mut(&mut self) -> &mut TlbSubsystem {
        &mut self.tlbs
    }

    /// Builds intermediate levels as needed and writes a terminating mapping
    /// (§6.1). Does not touch any TLB: a caller replacing a mapping that was
    /// previously live must also call [`Self::invalidate_by_page`].
    pub fn map(
        &mut self,
        pid: u32,
        va: u64,
        frame: u64,
        size: PageSize,
        permissions: Permission,
        privilege: Privilege,
    ) -> Result<(), PageTableMappingError> {
        self.roots
            .map(&self.decoder, pid, va, frame, size, permissions, privilege)
    }

    /// Removes whatever mapping terminates at `va` for `pid`, returning its
    /// frame base (§6.1). Does not invalidate any TLB entry itself.
    pub fn unmap(&mut self, pid: u32, va: u64) -> Result<u64, PageTableMappingError> {
        self.roots.unmap(pid, va, &self.decoder)
    }

    /// Clears every TLB entry (of any size) whose tag matches `va` at
    /// `size`, analogous to the x86 `INVLPG` instruction (§6.1).
    pub fn invalidate_by_page(&mut self, va: u64, size: PageSize) {
        self.tlbs.invalidate_by_page(va, size);
    }

    /// Clears every TLB entry in every size-specific TLB and resets all
    /// pseudo-LRU counters. Does not touch page tables (§6.1).
    pub fn invalidate_all(&mut self) {
        self.tlbs.invalidate_all();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
