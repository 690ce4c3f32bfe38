mod parent;
mod registry;
mod resolver;

pub use parent::{NO_SLOT, ParentRef};
pub use registry::{NoPlatforms, PlatformMap, PlatformRegistry};
pub use resolver::FrameResolver;
