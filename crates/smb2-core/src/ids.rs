//! Monotonic identifier allocation (spec.md §4.2).
//!
//! Session and tree IDs are plain `fetch_add(1)` counters seeded at 2 --
//! `fetch_add` returns the pre-increment value, so seeding at 2 makes the
//! first value ever issued 2, not 1 -- zero is reserved to mean "no
//! session"/"no tree" in [`crate::context::RequestContext`]. File IDs pair a
//! persistent counter half with a random half, mirroring
//! `smb-dtyp::guid::Guid`'s role as an opaque 16-byte wire identifier
//! elsewhere in this workspace.

use rand::RngCore;
use smb2_msg::FileId;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub struct IdAllocator {
    next_session_id: AtomicU64,
    next_tree_id: AtomicU32,
    next_file_id_counter: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        // Seeded at 2, not 1: `fetch_add` returns the pre-increment value, so
        // seeding at 1 would hand out 1 as the first id. Seeding at 2 makes
        // the first issued value 2, per spec.md §4.2.
        IdAllocator {
            next_session_id: AtomicU64::new(2),
            next_tree_id: AtomicU32::new(2),
            next_file_id_counter: AtomicU64::new(2),
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new, nonzero session id.
    pub fn alloc_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates a new, nonzero tree id.
    pub fn alloc_tree_id(&self) -> u32 {
        self.next_tree_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates a new file id: 8-byte LE persistent counter followed by 8
    /// cryptographically random bytes, per spec.md §4.2.
    pub fn alloc_file_id(&self) -> FileId {
        let counter = self.next_file_id_counter.fetch_add(1, Ordering::Relaxed);
        let mut id = [0u8; 16];
        id[0..8].copy_from_slice(&counter.to_le_bytes());
        rand::thread_rng().fill_bytes(&mut id[8..16]);
        id
    }
}
