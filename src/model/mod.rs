pub mod common;
pub mod parameter;
pub mod process_group;
pub mod version;

pub use common::*;
pub use parameter::*;
pub use process_group::*;
pub use version::*;
