pub mod fixtures;
pub mod gated_provider;

pub use fixtures::*;
pub use gated_provider::GatedProvider;
