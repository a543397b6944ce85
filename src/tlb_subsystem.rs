//! Aggregates the three size-specific TLBs and dispatches lookups/insertions
//! across them in large-first order (§4.5).

use crate::page_table::{PageSize, TranslationRequest};
use crate::tlb::{Tlb, TlbLookup};

/// The outcome of consulting all three TLBs for a request (§4.5).
///
/// `PermissionDenied` always short-circuits the scan, so the only
/// non-trivial miss outcome this produces is "all three sizes missed" —
/// modeled here as the unit `Miss` variant rather than a three-flag hints
/// struct, since no other combination is ever observable (see DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlbCheck {
    /// A hit in one of the three TLBs, carrying the translated PA.
    Hit(u64),
    /// A matching entry was found but denied the request's permissions.
    Unauthorized,
    /// All three TLBs missed; a walk is required.
    Miss,
}

/// Owns one [`Tlb`] per page size and coordinates lookups across them.
#[derive(Debug)]
pub struct TlbSubsystem {
    one_g: Tlb,
    two_m: Tlb,
    four_k: Tlb,
}

impl TlbSubsystem {
    /// Builds three empty, size-specific TLBs.
    pub fn new() -> Self {
        Self {
            one_g: Tlb::new(PageSize::OneG),
            two_m: Tlb::new(PageSize::TwoM),
            four_k: Tlb::new(PageSize::FourK),
        }
    }

    /// The TLB for a given size, mutably.
    fn tlb_mut(&mut self, size: PageSize) -> &mut Tlb {
        match size {
            PageSize::OneG => &mut self.one_g,
            PageSize::TwoM => &mut self.two_m,
            PageSize::FourK => &mut self.four_k,
        }
    }

    /// Consults the three TLBs in 1 GiB → 2 MiB → 4 KiB order (§4.5): a
    /// coarser hit dominates a finer one, so checking coarsest first needs
    /// no arbitration between multiple simultaneous hits.
    pub fn check(&mut self, request: &TranslationRequest) -> TlbCheck {
        for size in [PageSize::OneG, PageSize::TwoM, PageSize::FourK] {
            match self
                .tlb_mut(size)
                .lookup(request.va, request.pid, request.privilege, request.permissions)
            {
                TlbLookup::Hit(pa) => return TlbCheck::Hit(pa),
                TlbLookup::PermissionDenied => return TlbCheck::Unauthorized,
                TlbLookup::Miss => continue,
            }
        }
        TlbCheck::Miss
    }

    /// Inserts a walk result into the TLB matching `size`, evicting first if
    /// full. Only the size that terminated the walk is warmed; smaller-size
    /// TLBs are never pre-populated (§9).
    pub fn insert_after_walk(
        &mut self,
        request: &TranslationRequest,
        frame: u64,
        size: PageSize,
    ) {
        let tlb = self.tlb_mut(size);
        tlb.evict_if_full();
        tlb.insert(request.va, request.pid, request.privilege, request.permissions, frame);
    }

    /// Clears every TLB entry (of any size) whose tag at that size matches
    /// `va` (§6.1).
    pub fn invalidate_by_page(&mut self, va: u64, size: PageSize) {
        self.tlb_mut(size).invalidate_by_page(va);
    }

    /// Clears every slot in every size-specific TLB (§6.1).
    pub fn invalidate_all(&mut self) {
        self.one_g.invalidate_all();
        self.two_m.invalidate_all();
        self.four_k.invalidate_all();
    }
}

impl Default for TlbSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_table::{Privilege, TranslationRequest};
    use crate::permission::Permission;

    fn req(va: u64) -> TranslationRequest {
        TranslationRequest::new(va, 1, Privilege::User, Permission::READ)
    }

    #[test]
    fn coarser_size_is_consulted_before_finer_ones() {
        let mut sub = TlbSubsystem::new();
        sub.four_k.insert(0x1000, 1, Privilege::User, Permission::READ, 0xaaaa);
        sub.one_g.insert(0x1000, 1, Privilege::User, Permission::READ, 0xbbbb);
        match sub.check(&req(0x1000)) {
            TlbCheck::Hit(pa) => assert_eq!(pa, 0xbbbb),
            other => panic!("expected a 1 GiB hit, got {other:?}"),
        }
    }

    #[test]
    fn permission_denial_short_circuits_before_finer_tlbs() {
        let mut sub = TlbSubsystem::new();
        sub.one_g.insert(0x1000, 1, Privilege::User, Permission::empty(), 0xbbbb);
        sub.four_k.insert(0x1000, 1, Privilege::User, Permission::READ, 0xaaaa);
        assert_eq!(sub.check(&req(0x1000)), TlbCheck::Unauthorized);
    }

    #[test]
    fn miss_across_all_three_sizes_reports_miss() {
        let mut sub = TlbSubsystem::new();
        assert_eq!(sub.check(&req(0x1000)), TlbCheck::Miss);
    }

    #[test]
    fn insert_after_walk_only_warms_the_terminating_size() {
        let mut sub = TlbSubsystem::new();
        sub.insert_after_walk(&req(0x1000), 0xcccc, PageSize::TwoM);
        assert_eq!(sub.check(&req(0x1000)), TlbCheck::Hit(0xcccc));
        assert_eq!(sub.four_k.occupied(), 0);
        assert_eq!(sub.one_g.occupied(), 0);
    }
}
