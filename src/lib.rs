//! A software simulator of a hardware memory-management unit.
//!
//! This crate reproduces the behavior of a CPU's virtual-to-physical address
//! translation: per-process, four-level page tables with variable-depth
//! termination (4 KiB / 2 MiB / 1 GiB pages), a pseudo-LRU translation
//! lookaside buffer per page size, and a [`Translator`] that orchestrates
//! the two. It does not model physical memory, process scheduling, or an
//! operating system's fault handler — those are the out-of-scope
//! collaborators a host binds this core to.
//!
//! The primary entry points are [`Context`], [`Translator::translate`], and
//! [`Context::map`]/[`Context::unmap`] for populating a context's tables.
//!
//! ```
//! use mmu_sim::{Context, Translator, TranslationRequest, PageSize, Permission, Privilege};
//!
//! let mut ctx = Context::new();
//! ctx.map(0, 0x1000, 0x9000, PageSize::FourK, Permission::READ, Privilege::User)
//!     .unwrap();
//! let request = TranslationRequest::new(0x1000, 0, Privilege::User, Permission::READ);
//! assert_eq!(Translator::translate(&request, &mut ctx), Ok(0x9000));
//! ```

#![warn(missing_docs)]

pub mod addressing;
pub mod constants;
pub mod context;
pub mod page_table;
pub mod permission;
pub mod tlb;
pub mod tlb_subsystem;
pub mod translator;

pub use addressing::{Decoder, Level};
pub use context::Context;
pub use page_table::{
    ErrorKind, PageTableMappingError, PageTableWalker, PageSize, Privilege, TranslationRequest,
};
pub use permission::Permission;
pub use tlb_subsystem::TlbCheck;
pub use translator::Translator;
