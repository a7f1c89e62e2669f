pub mod assets;
pub mod git_ref;
pub mod lifecycle;
pub mod parameters;
pub mod registry;
pub mod versioning;

pub use assets::*;
pub use git_ref::*;
pub use lifecycle::*;
pub use parameters::*;
pub use registry::*;
pub use versioning::*;
