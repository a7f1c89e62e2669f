pub mod memory;
pub mod rest;
pub mod traits;
pub mod wire;

pub use memory::*;
pub use rest::*;
pub use traits::*;
