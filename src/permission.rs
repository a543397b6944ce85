//! Memory access permissions and the subset test that guards every
//! translation (§3, §4.2).

bitflags::bitflags! {
    /// The R/W/X permission triple carried by every PTE and TLB slot, and
    /// requested by every translation.
    #[derive(Default)]
    pub struct Permission: u8 {
        /// Readable.
        const READ = 1 << 0;
        /// Writable.
        const WRITE = 1 << 1;
        /// Executable.
        const EXECUTE = 1 << 2;
    }
}

impl Permission {
    /// All eight combinations of {read, write, execute}, for exhaustive
    /// boundary testing.
    pub const ALL_CASES: [Permission; 8] = [
        Permission::empty(),
        Permission::READ,
        Permission::WRITE,
        Permission::from_bits_truncate(Permission::READ.bits() | Permission::WRITE.bits()),
        Permission::EXECUTE,
        Permission::from_bits_truncate(Permission::READ.bits() | Permission::EXECUTE.bits()),
        Permission::from_bits_truncate(Permission::WRITE.bits() | Permission::EXECUTE.bits()),
        Permission::from_bits_truncate(
            Permission::READ.bits() | Permission::WRITE.bits() | Permission::EXECUTE.bits(),
        ),
    ];
}

/// Returns whether `page`'s permissions cover everything `requested` asks
/// for (§3): every bit set in `requested` must also be set in `page`. A
/// request with no bits set is always satisfied.
#[inline]
pub fn satisfies(requested: Permission, page: Permission) -> bool {
    page.contains(requested)
}
