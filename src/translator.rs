//! The entry point tying the TLB subsystem and the page-table walker
//! together (§4.6).

use crate::context::Context;
use crate::page_table::{ErrorKind, PageTableWalker, TranslationRequest};
use crate::tlb_subsystem::TlbCheck;

/// Orchestrates a translation: consult the TLBs, fall back to a walk on a
/// clean miss, and warm the TLB on a successful walk (§4.6).
///
/// Stateless itself — all mutable state lives in the [`Context`] passed in,
/// so side effects are exactly what §4.6 and §5 describe: one counter
/// increment on a hit, or one insertion after a clean miss and successful
/// walk. Nothing is mutated on any failure path.
pub struct Translator;

impl Translator {
    /// Translates `request` against `context` (§4.6).
    pub fn translate(request: &TranslationRequest, context: &mut Context) -> Result<u64, ErrorKind> {
        match context.tlbs_mut().check(request) {
            TlbCheck::Hit(pa) => return Ok(pa),
            TlbCheck::Unauthorized => return Err(ErrorKind::Unauthorized),
            TlbCheck::Miss => {}
        }

        let (pa, size) = PageTableWalker::walk(request, context.roots(), context.decoder())?;
        context.tlbs_mut().insert_after_walk(request, pa_to_frame(pa, size), size);
        Ok(pa)
    }
}

/// Recovers the frame base a walk's composed PA came from, so the TLB
/// insertion stores the frame rather than a VA-specific physical address
/// (§4.4's TLB entries cache `(tag, frame)`, not `(tag, pa)`).
fn pa_to_frame(pa: u64, size: crate::page_table::PageSize) -> u64 {
    pa & !size.offset_mask()
}
