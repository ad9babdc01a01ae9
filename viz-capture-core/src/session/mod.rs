pub mod control;
pub(crate) mod engine;
pub mod registry;
pub mod surface;
