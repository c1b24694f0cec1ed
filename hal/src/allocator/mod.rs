//! Physical frame and kernel heap allocation.
//!
//! Two tiers: `buddy` manages whole physical pages (orders up to
//! [`buddy::MAX_ORDER`]), `slab` carves individual pages from the buddy
//! allocator into fixed-size objects for small kernel allocations.

pub mod buddy;
pub mod intrusive_list;
pub mod page;
pub mod slab;

pub use buddy::BuddyAllocator;
pub use page::{Page, PhysPageFlags};
pub use slab::{SlabAllocator, SLAB_ALLOCATOR};
