//! Tunable constants (§6.4, §10.3).
//!
//! Kept as named items in one place rather than scattered literals, so a
//! host binary or test harness can reference them instead of repeating
//! magic numbers. There is no environment-variable or file-based
//! configuration layer here — this is a library core, not a daemon.

/// Number of PIDs a [`crate::context::Context`] tracks page-table roots for.
pub const MAX_PID: u32 = 32;

/// Number of slots in each size-specific TLB.
pub const TLB_ENTRY_COUNT: usize = 32;

/// Number of entries in every level's page table.
pub const TABLE_SIZE: usize = 512;
