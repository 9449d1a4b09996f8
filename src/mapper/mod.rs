//! Name <-> id resolution, id allocation and retention.

pub mod allocator;
pub mod resolver;
pub mod sweeper;

pub use allocator::{AllocateError, IdAllocator};
pub use resolver::{ConferenceMapper, Resolution, ResolveRequest};
pub use sweeper::{Sweeper, SweeperHandle};
