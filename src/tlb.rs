//! A fixed-capacity, fully-associative, pseudo-LRU cache for one page size
//! (§3, §4.4).
//!
//! Slots form an ordered sequence, not a set: eviction breaks ties on the
//! lowest index (§9), so this module deliberately stores slots in a `Vec`
//! indexed by position rather than a hash-keyed container.

use crate::addressing::compose;
use crate::page_table::{PageSize, Privilege};
use crate::permission::{self, Permission};

pub use crate::constants::TLB_ENTRY_COUNT;

#[derive(Clone, Copy, Debug)]
struct TlbSlot {
    in_use: bool,
    tag: u64,
    pid: u32,
    privilege: Privilege,
    permissions: Permission,
    frame: u64,
    counter: u8,
}

impl TlbSlot {
    const fn empty() -> Self {
        TlbSlot {
            in_use: false,
            tag: 0,
            pid: 0,
            privilege: Privilege::User,
            permissions: Permission::empty(),
            frame: 0,
            counter: 0,
        }
    }
}

/// The result of a lookup against a single size-specific TLB (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlbLookup {
    /// A matching, authorized slot was found; carries the translated PA.
    Hit(u64),
    /// A matching slot was found but the request's permissions are not a
    /// subset of the slot's. Authoritative — the scan stops here.
    PermissionDenied,
    /// No in-use slot matches this (tag, PID).
    Miss,
}

/// Caches translations for exactly one page size (§4.4).
#[derive(Debug)]
pub struct Tlb {
    size: PageSize,
    slots: Vec<TlbSlot>,
    occupied: usize,
}

impl Tlb {
    /// Builds an empty TLB for `size`.
    pub fn new(size: PageSize) -> Self {
        Tlb {
            size,
            slots: vec![TlbSlot::empty(); TLB_ENTRY_COUNT],
            occupied: 0,
        }
    }

    /// The page size this TLB caches.
    pub fn size(&self) -> PageSize {
        self.size
    }

    /// Number of in-use slots. Always equals the count of slots with
    /// `in_use == true` (§3 invariant).
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    fn tag_of(&self, va: u64) -> u64 {
        va >> self.size.offset_bits()
    }

    /// Scans every slot for a matching (tag, PID) pair (§4.4).
    ///
    /// A slot whose PID and tag match but whose privilege differs is not a
    /// candidate at all — different address spaces may coexist at the same
    /// tag — so the scan continues past it rather than denying or hitting.
    pub fn lookup(
        &mut self,
        va: u64,
        pid: u32,
        privilege: Privilege,
        requested_permissions: Permission,
    ) -> TlbLookup {
        let tag = self.tag_of(va);
        for slot in self.slots.iter_mut() {
            if !slot.in_use || slot.pid != pid || slot.tag != tag {
                continue;
            }
            if slot.privilege != privilege {
                continue;
            }
            if !permission::satisfies(requested_permissions, slot.permissions) {
                log::debug!("tlb[{:?}]: PERMISSION_DENIED tag={:#x} pid={pid}", self.size, tag);
                return TlbLookup::PermissionDenied;
            }
            slot.counter = slot.counter.saturating_add(1);
            let pa = compose(slot.frame, va, self.size);
            log::debug!("tlb[{:?}]: HIT tag={:#x} pid={pid} counter={}", self.size, tag, slot.counter);
            return TlbLookup::Hit(pa);
        }
        log::debug!("tlb[{:?}]: MISS tag={:#x} pid={pid}", self.size, tag);
        TlbLookup::Miss
    }

    /// If the TLB is full, evicts the slot with the minimum counter (ties
    /// broken by lowest index), without otherwise mutating survivors (§4.4).
    pub fn evict_if_full(&mut self) {
        if self.occupied < TLB_ENTRY_COUNT {
            return;
        }
        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(idx, slot)| (slot.counter, *idx))
            .map(|(idx, _)| idx)
            .expect("TLB_ENTRY_COUNT is nonzero");
        log::debug!(
            "tlb[{:?}]: EVICT slot={victim} counter={}",
            self.size,
            self.slots[victim].counter
        );
        self.slots[victim] = TlbSlot::empty();
        self.occupied -= 1;
    }

    /// Places a new record in the lowest-indexed free slot. Caller must have
    /// ensured room via [`Self::evict_if_full`] (§4.4).
    pub fn insert(
        &mut self,
        va: u64,
        pid: u32,
        privilege: Privilege,
        permissions: Permission,
        frame: u64,
    ) {
        let idx = self
            .slots
            .iter()
            .position(|slot| !slot.in_use)
            .expect("caller must evict_if_full before inserting");
        let tag = self.tag_of(va);
        self.slots[idx] = TlbSlot {
            in_use: true,
            tag,
            pid,
            privilege,
            permissions,
            frame,
            counter: 0,
        };
        self.occupied += 1;
        log::debug!("tlb[{:?}]: INSERT slot={idx} tag={:#x} pid={pid}", self.size, tag);
    }

    /// Clears every slot whose tag matches `va` at this TLB's size,
    /// regardless of PID (§6.1's `invalidate_by_page`).
    pub fn invalidate_by_page(&mut self, va: u64) {
        let tag = self.tag_of(va);
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.in_use && slot.tag == tag {
                *slot = TlbSlot::empty();
                self.occupied -= 1;
                log::debug!("tlb[{:?}]: INVALIDATE slot={idx} tag={:#x}", self.size, tag);
            }
        }
    }

    /// Clears every slot and resets all counters (§6.1's `invalidate_all`).
    pub fn invalidate_all(&mut self) {
        let cleared = self.occupied;
        for slot in self.slots.iter_mut() {
            *slot = TlbSlot::empty();
        }
        self.occupied = 0;
        log::debug!("tlb[{:?}]: INVALIDATE_ALL cleared={cleared}", self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_perms() -> Permission {
        Permission::READ | Permission::WRITE | Permission::EXECUTE
    }

    #[test]
    fn insert_then_lookup_hits_and_bumps_counter() {
        let mut tlb = Tlb::new(PageSize::FourK);
        tlb.evict_if_full();
        tlb.insert(0x1000, 1, Privilege::User, full_perms(), 0x2000);
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::User, Permission::READ),
            TlbLookup::Hit(0x2000)
        );
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::User, Permission::READ),
            TlbLookup::Hit(0x2000)
        );
    }

    #[test]
    fn differing_pid_or_privilege_is_a_miss_not_a_candidate() {
        let mut tlb = Tlb::new(PageSize::FourK);
        tlb.insert(0x1000, 1, Privilege::User, full_perms(), 0x2000);
        assert_eq!(
            tlb.lookup(0x1000, 2, Privilege::User, Permission::READ),
            TlbLookup::Miss
        );
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::Supervisor, Permission::READ),
            TlbLookup::Miss
        );
    }

    #[test]
    fn insufficient_permission_denies_rather_than_misses() {
        let mut tlb = Tlb::new(PageSize::FourK);
        tlb.insert(0x1000, 1, Privilege::User, Permission::READ, 0x2000);
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::User, Permission::WRITE),
            TlbLookup::PermissionDenied
        );
    }

    #[test]
    fn thirty_third_insert_evicts_the_minimum_counter_slot() {
        let mut tlb = Tlb::new(PageSize::FourK);
        for i in 0..TLB_ENTRY_COUNT as u64 {
            tlb.evict_if_full();
            tlb.insert(i << 12, 1, Privilege::User, full_perms(), i << 12);
        }
        assert_eq!(tlb.occupied(), TLB_ENTRY_COUNT);

        // Warm slot 5 so its counter is no longer the minimum.
        tlb.lookup(5 << 12, 1, Privilege::User, Permission::READ);

        tlb.evict_if_full();
        tlb.insert(999 << 12, 1, Privilege::User, full_perms(), 999 << 12);
        assert_eq!(tlb.occupied(), TLB_ENTRY_COUNT);
        // Slot 0 (the lowest-indexed zero-counter survivor) was evicted:
        // its tag must now miss.
        assert_eq!(
            tlb.lookup(0, 1, Privilege::User, Permission::READ),
            TlbLookup::Miss
        );
        // Slot 5 survived the eviction.
        assert_eq!(
            tlb.lookup(5 << 12, 1, Privilege::User, Permission::READ),
            TlbLookup::Hit(5 << 12)
        );
    }

    #[test]
    fn invalidate_by_page_clears_only_the_matching_tag() {
        let mut tlb = Tlb::new(PageSize::FourK);
        tlb.insert(0x1000, 1, Privilege::User, full_perms(), 0x2000);
        tlb.insert(0x2000, 1, Privilege::User, full_perms(), 0x3000);
        tlb.invalidate_by_page(0x1000);
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::User, Permission::READ),
            TlbLookup::Miss
        );
        assert_eq!(
            tlb.lookup(0x2000, 1, Privilege::User, Permission::READ),
            TlbLookup::Hit(0x3000)
        );
        assert_eq!(tlb.occupied(), 1);
    }

    #[test]
    fn invalidate_all_clears_every_slot_and_counter() {
        let mut tlb = Tlb::new(PageSize::FourK);
        tlb.insert(0x1000, 1, Privilege::User, full_perms(), 0x2000);
        tlb.lookup(0x1000, 1, Privilege::User, Permission::READ);
        tlb.invalidate_all();
        assert_eq!(tlb.occupied(), 0);
        assert_eq!(
            tlb.lookup(0x1000, 1, Privilege::User, Permission::READ),
            TlbLookup::Miss
        );
    }
}
