//! Page-table entries and the hierarchical walker (§3, §4.3, §6.1, §7.1).
//!
//! A PTE is represented as a tagged sum type (`PteKind`) rather than the
//! packed, page-size-dependent bitfield union the reference simulator uses
//! for the same data (§9's redesign recommendation). `Internal` entries own
//! the table one level down; `Mapped` entries carry the frame, size, and
//! privilege of a terminating page. Every field that is meaningful
//! regardless of a PTE's kind — the VPN sanity tag, the valid bit, and the
//! permission set — lives on `Pte` itself; fields that only make sense for a
//! terminating page (the privilege bit) live only inside `PteKind::Mapped`,
//! which makes "intermediate privilege is never compared" a guarantee the
//! type system enforces rather than a rule an implementation could forget.

use crate::addressing::{Decoder, Level};
use crate::permission::{self, Permission};
use thiserror::Error;

pub use crate::constants::TABLE_SIZE;

/// The three page sizes a mapping may terminate with (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSize {
    /// 4 KiB page: 12-bit offset.
    FourK,
    /// 2 MiB page: 21-bit offset.
    TwoM,
    /// 1 GiB page: 30-bit offset.
    OneG,
}

impl PageSize {
    /// Number of low bits of a VA that fall within a page of this size.
    #[inline]
    pub const fn offset_bits(self) -> u32 {
        match self {
            PageSize::FourK => 12,
            PageSize::TwoM => 21,
            PageSize::OneG => 30,
        }
    }

    /// Mask selecting the offset bits of a VA for this size.
    #[inline]
    pub const fn offset_mask(self) -> u64 {
        (1u64 << self.offset_bits()) - 1
    }

    /// The level at which a mapping of this size legally terminates.
    #[inline]
    pub const fn terminating_level(self) -> Level {
        match self {
            PageSize::OneG => Level::L2,
            PageSize::TwoM => Level::L1,
            PageSize::FourK => Level::L0,
        }
    }

    /// Whether a mapping of this size is legal when terminating at `level`
    /// (§4.3 step 5a: L2→1 GiB, L1→2 MiB or 1 GiB, L0→any of the three).
    #[inline]
    pub const fn legal_at(self, level: Level) -> bool {
        match level {
            Level::L3 => false,
            Level::L2 => matches!(self, PageSize::OneG),
            Level::L1 => matches!(self, PageSize::TwoM | PageSize::OneG),
            Level::L0 => true,
        }
    }
}

/// User or supervisor privilege (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    /// Unprivileged access.
    User,
    /// Privileged access.
    Supervisor,
}

/// A 512-entry table at one level of the hierarchy.
///
/// Owns its entries; an `Internal` PTE owns the next level's `Table` by
/// value (through a `Box`), so dropping a root recursively frees the whole
/// tree beneath it (§4.7, §9's ownership redesign).
#[derive(Debug)]
pub struct Table(Box<[Pte]>);

impl Table {
    /// Builds a table of 512 empty (invalid) entries.
    pub fn new() -> Self {
        Table((0..TABLE_SIZE).map(|_| Pte::empty()).collect())
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Index<usize> for Table {
    type Output = Pte;
    fn index(&self, index: usize) -> &Pte {
        &self.0[index]
    }
}

impl core::ops::IndexMut<usize> for Table {
    fn index_mut(&mut self, index: usize) -> &mut Pte {
        &mut self.0[index]
    }
}

/// The kind-specific payload of a [`Pte`].
#[derive(Debug)]
pub enum PteKind {
    /// Points at the next-level table. Only legal above `L0` (§4.3 step 6).
    Internal {
        /// The table one level down.
        table: Box<Table>,
    },
    /// Terminates the walk at a mapped page.
    Mapped {
        /// Physical frame base, aligned to `size`.
        frame: u64,
        /// The page size this entry maps.
        size: PageSize,
        /// Privilege required to use this mapping.
        privilege: Privilege,
    },
}

/// One entry of one level's table (§3).
///
/// `noncacheable`, `dirty`, and `global` are carried for data-model fidelity
/// but are reserved: the core never consults them (§3).
#[derive(Debug)]
pub struct Pte {
    /// The VA bits this entry is expected to match at its level, retained
    /// purely as a sanity check (§3, §4.3 step 2).
    pub vpn: u64,
    /// Whether this entry is present.
    pub valid: bool,
    /// Permissions: the full R/W/X set on a `Mapped` entry, or just the bit
    /// required to traverse through on an `Internal` entry (§4.3 step 4a).
    pub permissions: Permission,
    /// Reserved, not consulted by the core.
    pub noncacheable: bool,
    /// Reserved, not consulted by the core.
    pub dirty: bool,
    /// Reserved, not consulted by the core.
    pub global: bool,
    /// The internal-vs-mapped payload.
    pub kind: PteKind,
}

impl Pte {
    /// An unpopulated, invalid slot.
    pub fn empty() -> Self {
        Pte {
            vpn: 0,
            valid: false,
            permissions: Permission::empty(),
            noncacheable: false,
            dirty: false,
            global: false,
            kind: PteKind::Mapped {
                frame: 0,
                size: PageSize::FourK,
                privilege: Privilege::User,
            },
        }
    }

    /// A valid, terminating entry.
    pub fn mapped(
        vpn: u64,
        frame: u64,
        size: PageSize,
        permissions: Permission,
        privilege: Privilege,
    ) -> Self {
        Pte {
            vpn,
            valid: true,
            permissions,
            noncacheable: false,
            dirty: false,
            global: false,
            kind: PteKind::Mapped {
                frame,
                size,
                privilege,
            },
        }
    }

    /// A valid, non-terminating entry pointing at `table`.
    pub fn internal(vpn: u64, table: Table, permissions: Permission) -> Self {
        Pte {
            vpn,
            valid: true,
            permissions,
            noncacheable: false,
            dirty: false,
            global: false,
            kind: PteKind::Internal {
                table: Box::new(table),
            },
        }
    }
}

/// The request a translation is performed against (§4.3, §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranslationRequest {
    /// The virtual address to translate.
    pub va: u64,
    /// The process the translation is performed on behalf of.
    pub pid: u32,
    /// The requesting privilege level.
    pub privilege: Privilege,
    /// The access being attempted.
    pub permissions: Permission,
}

impl TranslationRequest {
    /// Builds a request.
    pub fn new(va: u64, pid: u32, privilege: Privilege, permissions: Permission) -> Self {
        Self {
            va,
            pid,
            privilege,
            permissions,
        }
    }
}

/// The four translation faults the walker can produce (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A PTE's recorded VPN does not match the VA at this level, a terminal
    /// page-size tag is illegal for its level, or `L0` was reached without
    /// terminating. A simulator/harness invariant violation.
    #[error("page table entry is malformed for this level")]
    Malformed,
    /// A PTE on the walk path has its valid bit clear. A normal page fault.
    #[error("page table entry is not valid")]
    NotValid,
    /// The requested permissions are not a subset of the entry's.
    #[error("requested access is not permitted")]
    Unauthorized,
    /// The requester's privilege does not match the terminating entry's.
    #[error("privilege level does not match the mapping")]
    PrivilegeMismatch,
}

/// Errors from the mapping-construction convenience in §6.1 / §7.1.
///
/// Distinct from [`ErrorKind`]: these describe a malformed *request to
/// build a mapping*, issued by the out-of-scope test harness, not a
/// simulated hardware fault encountered while translating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PageTableMappingError {
    /// `va` or `frame` is not aligned to the page size being mapped.
    #[error("address is not aligned to the requested page size")]
    Unaligned,
    /// A mapping already terminates at this VA for this PID.
    #[error("a mapping already exists at this address")]
    Duplicated,
    /// `unmap` found no terminating mapping at this VA, or `map`/`unmap`
    /// was asked to operate on a `pid` outside `0..max_pid`.
    #[error("no mapping exists at this address")]
    NotExist,
    /// The requested permission set cannot form a legal mapping (write or
    /// execute without read).
    #[error("permission set is not a legal combination")]
    InvalidPermission,
}

/// Per-PID page-table roots (§3, §4.7).
///
/// `PID`s range over `0..max_pid`; an unmapped PID has no root at all, which
/// the walker treats as every address faulting [`ErrorKind::NotValid`]
/// rather than [`ErrorKind::Malformed`] — there being no table at all is not
/// by itself an invariant violation, it is simply an address space with
/// nothing mapped in it yet.
#[derive(Debug)]
pub struct PageTableRoots {
    roots: Vec<Option<Table>>,
}

impl PageTableRoots {
    /// Builds an all-unmapped root array for `max_pid` PIDs.
    pub fn new(max_pid: u32) -> Self {
        Self {
            roots: (0..max_pid).map(|_| None).collect(),
        }
    }

    fn table(&self, pid: u32) -> Option<&Table> {
        self.roots.get(pid as usize).and_then(|slot| slot.as_ref())
    }

    /// Maps `va` to `frame` at `size` for `pid`, creating any missing
    /// intermediate levels along the way (§6.1).
    pub fn map(
        &mut self,
        decoder: &Decoder,
        pid: u32,
        va: u64,
        frame: u64,
        size: PageSize,
        permissions: Permission,
        privilege: Privilege,
    ) -> Result<(), PageTableMappingError> {
        if (permissions.contains(Permission::WRITE) || permissions.contains(Permission::EXECUTE))
            && !permissions.contains(Permission::READ)
        {
            return Err(PageTableMappingError::InvalidPermission);
        }
        let mask = size.offset_mask();
        if va & mask != 0 || frame & mask != 0 {
            return Err(PageTableMappingError::Unaligned);
        }

        let root = self
            .roots
            .get_mut(pid as usize)
            .ok_or(PageTableMappingError::NotExist)?
            .get_or_insert_with(Table::new);

        let leaf = Pte::mapped(
            decoder.tag_at(va, size.terminating_level()),
            frame,
            size,
            permissions,
            privilege,
        );
        install(root, decoder, Level::L3, size.terminating_level(), va, leaf)
    }

    /// Removes whatever mapping terminates at `va` for `pid`, returning its
    /// frame base. Does not invalidate any TLB; callers that unmap a live
    /// page must also invalidate it (§6.1, §5).
    pub fn unmap(&mut self, pid: u32, va: u64, decoder: &Decoder) -> Result<u64, PageTableMappingError> {
        let root = self
            .roots
            .get_mut(pid as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(PageTableMappingError::NotExist)?;
        remove(root, decoder, Level::L3, va)
    }
}

fn install(
    table: &mut Table,
    decoder: &Decoder,
    level: Level,
    target: Level,
    va: u64,
    leaf: Pte,
) -> Result<(), PageTableMappingError> {
    let idx = decoder.index(va, level);
    if level == target {
        if table[idx].valid {
            return Err(PageTableMappingError::Duplicated);
        }
        table[idx] = leaf;
        return Ok(());
    }

    if !table[idx].valid {
        table[idx] = Pte::internal(decoder.tag_at(va, level), Table::new(), Permission::READ);
    } else if matches!(table[idx].kind, PteKind::Mapped { .. }) {
        return Err(PageTableMappingError::Duplicated);
    }

    let next = match &mut table[idx].kind {
        PteKind::Internal { table } => table.as_mut(),
        PteKind::Mapped { .. } => unreachable!("checked above"),
    };
    let next_level = level.next().expect("target level reached above");
    install(next, decoder, next_level, target, va, leaf)
}

fn remove(
    table: &mut Table,
    decoder: &Decoder,
    level: Level,
    va: u64,
) -> Result<u64, PageTableMappingError> {
    let idx = decoder.index(va, level);
    if !table[idx].valid {
        return Err(PageTableMappingError::NotExist);
    }
    match &mut table[idx].kind {
        PteKind::Mapped { frame, .. } => {
            let frame = *frame;
            // Clear only the valid bit; the VPN tag is left in place so a
            // repeat walk faults NOT_VALID rather than MALFORMED (§8
            // boundary: validity, not VPN sanity, is what `unmap` revokes).
            table[idx].valid = false;
            Ok(frame)
        }
        PteKind::Internal { table: next } => {
            let next_level = level.next().ok_or(PageTableMappingError::NotExist)?;
            remove(next.as_mut(), decoder, next_level, va)
        }
    }
}

/// The hierarchical page-table walker (§4.3).
///
/// Stateless: every input it needs (the request, the per-PID roots, and the
/// configured VA-width decoder) is passed explicitly, so a walk has no side
/// effects on anything but its return value (§5).
pub struct PageTableWalker;

impl PageTableWalker {
    /// Descends the hierarchy for `request`, returning the translated
    /// physical address and the size of the page it terminated at, or the
    /// first fault encountered (§4.3). The size accompanies the address so
    /// a caller (the [`crate::translator::Translator`]) knows which
    /// size-specific TLB to warm, without the walker needing any TLB
    /// awareness of its own.
    pub fn walk(
        request: &TranslationRequest,
        roots: &PageTableRoots,
        decoder: &Decoder,
    ) -> Result<(u64, PageSize), ErrorKind> {
        let mut table = match roots.table(request.pid) {
            Some(table) => table,
            None => return Err(ErrorKind::NotValid),
        };

        for level in Level::ALL {
            let idx = decoder.index(request.va, level);
            let pte = &table[idx];
            log::trace!(
                "walk: level={level:?} idx={idx} vpn_expected={:#x} vpn_got={:#x}",
                decoder.tag_at(request.va, level),
                pte.vpn
            );

            if decoder.tag_at(request.va, level) != pte.vpn {
                log::warn!("walk: MALFORMED — VPN mismatch at {level:?}");
                return Err(ErrorKind::Malformed);
            }
            if !pte.valid {
                log::debug!("walk: NOT_VALID at {level:?}");
                return Err(ErrorKind::NotValid);
            }

            match &pte.kind {
                PteKind::Internal { table: next } => {
                    if !permission::satisfies(Permission::READ, pte.permissions) {
                        log::debug!("walk: UNAUTHORIZED descending through {level:?}");
                        return Err(ErrorKind::Unauthorized);
                    }
                    match level.next() {
                        Some(_) => table = next.as_ref(),
                        None => {
                            log::warn!("walk: MALFORMED — L0 entry tagged INTERNAL");
                            return Err(ErrorKind::Malformed);
                        }
                    }
                }
                PteKind::Mapped {
                    frame,
                    size,
                    privilege,
                } => {
                    if !size.legal_at(level) {
                        log::warn!("walk: MALFORMED — {size:?} illegal at {level:?}");
                        return Err(ErrorKind::Malformed);
                    }
                    if !permission::satisfies(request.permissions, pte.permissions) {
                        log::debug!("walk: UNAUTHORIZED terminating at {level:?}");
                        return Err(ErrorKind::Unauthorized);
                    }
                    if request.privilege != *privilege {
                        log::debug!("walk: PRIVILEGE_MISMATCH terminating at {level:?}");
                        return Err(ErrorKind::PrivilegeMismatch);
                    }
                    let pa = crate::addressing::compose(*frame, request.va, *size);
                    log::trace!("walk: success pa={pa:#x}");
                    return Ok((pa, *size));
                }
            }
        }
        unreachable!("L0 always either terminates or fails within the loop body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> Decoder {
        Decoder::default()
    }

    #[test]
    fn four_k_mapping_translates_with_offset_preserved() {
        let d = decoder();
        let mut roots = PageTableRoots::new(32);
        let va = 0x0000_0000_1234_5000u64;
        let frame = 0x0000_0000_abc4_5000u64;
        roots
            .map(
                &d,
                1,
                va,
                frame,
                PageSize::FourK,
                Permission::READ | Permission::WRITE,
                Privilege::User,
            )
            .unwrap();
        let req = TranslationRequest::new(
            va,
            1,
            Privilege::User,
            Permission::READ | Permission::WRITE,
        );
        assert_eq!(PageTableWalker::walk(&req, &roots, &d), Ok((frame, PageSize::FourK)));
    }

    #[test]
    fn two_m_and_one_g_mappings_bypass_deeper_levels() {
        let d = decoder();
        let mut roots = PageTableRoots::new(32);

        let va2m = 0x0000_0000_4567_8000u64;
        let frame2m = 0x0000_0000_de60_0000u64;
        roots
            .map(&d, 1, va2m, frame2m, PageSize::TwoM, Permission::READ, Privilege::User)
            .unwrap();
        let req2m = TranslationRequest::new(va2m, 1, Privilege::User, Permission::READ);
        assert_eq!(
            PageTableWalker::walk(&req2m, &roots, &d),
            Ok((0x0000_0000_de77_8000, PageSize::TwoM))
        );

        let va1g = 0x0000_0000_789a_0000u64;
        let frame1g = 0x0000_0001_2000_0000u64;
        roots
            .map(&d, 2, va1g, frame1g, PageSize::OneG, Permission::READ, Privilege::User)
            .unwrap();
        let req1g = TranslationRequest::new(va1g, 2, Privilege::User, Permission::READ);
        assert_eq!(
            PageTableWalker::walk(&req1g, &roots, &d),
            Ok((0x0000_0001_589a_0000, PageSize::OneG))
        );
    }

    #[test]
    fn unmapped_pid_faults_not_valid() {
        let d = decoder();
        let roots = PageTableRoots::new(32);
        let req = TranslationRequest::new(0x1000, 5, Privilege::User, Permission::empty());
        assert_eq!(PageTableWalker::walk(&req, &roots, &d), Err(ErrorKind::NotValid));
    }

    #[test]
    fn permission_mismatch_is_unauthorized() {
        let d = decoder();
        let mut roots = PageTableRoots::new(32);
        let va = 0x1000u64;
        roots
            .map(&d, 1, va, 0x2000, PageSize::FourK, Permission::READ, Privilege::User)
            .unwrap();
        let req = TranslationRequest::new(va, 1, Privilege::User, Permission::READ | Permission::WRITE);
        assert_eq!(PageTableWalker::walk(&req, &roots, &d), Err(ErrorKind::Unauthorized));
    }

    #[test]
    fn privilege_mismatch_is_reported() {
        let d = decoder();
        let mut roots = PageTableRoots::new(32);
        let va = 0x3000u64;
        roots
            .map(&d, 1, va, 0x4000, PageSize::FourK, Permission::READ, Privilege::Supervisor)
            .unwrap();
        let req = TranslationRequest::new(va, 1, Privilege::User, Permission::READ);
        assert_eq!(PageTableWalker::walk(&req, &roots, &d), Err(ErrorKind::PrivilegeMismatch));
    }

    #[test]
    fn internal_entry_tagged_invalid_yields_not_valid_not_malformed() {
        // L3 internal, but the L2 table underneath has an entry whose valid
        // bit is clear: a walk through it returns NOT_VALID (§8 boundary).
        let d = decoder();
        let mut roots = PageTableRoots::new(32);
        let va = 0x0000_0040_0000_0000u64; // touches L3 idx 0, L2 idx 1
        roots
            .map(&d, 1, va, 0x1000, PageSize::FourK, Permission::READ, Privilege::User)
            .unwrap();
        roots.unmap(1, va, &d).unwrap();
        // The L0 leaf is gone (NotExist on a second unmap), but the L3→L2→L1
        // internal chain built by `map` is still standing and still valid;
        // exercise the boundary by asserting the now-empty leaf faults
        // NotValid rather than Malformed.
        let req = TranslationRequest::new(va, 1, Privilege::User, Permission::READ);
        assert_eq!(PageTableWalker::walk(&req, &roots, &d), Err(ErrorKind::NotValid));
    }

    #[test]
    fn duplicate_unaligned_and_missing_mappings_report_distinct_errors() {
        let d = decoder();
        let mut roots = PageTableRoots::new(32);
        assert_eq!(
            roots.map(&d, 1, 0x1234000, 0x5000, PageSize::FourK, Permission::READ, Privilege::User),
            Ok(())
        );
        assert_eq!(
            roots.map(&d, 1, 0x1234000, 0x6000, PageSize::FourK, Permission::READ, Privilege::User),
            Err(PageTableMappingError::Duplicated)
        );
        assert_eq!(
            roots.map(&d, 1, 0x1234123, 0x7000, PageSize::FourK, Permission::READ, Privilege::User),
            Err(PageTableMappingError::Unaligned)
        );
        assert_eq!(
            roots.unmap(1, 0x1235000, &d),
            Err(PageTableMappingError::NotExist)
        );
        assert_eq!(
            roots.map(&d, 1, 0x9999000, 0x8000, PageSize::FourK, Permission::WRITE, Privilege::User),
            Err(PageTableMappingError::InvalidPermission)
        );
    }
}
