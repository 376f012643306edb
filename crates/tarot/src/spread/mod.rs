//! Spread templates and prompt assembly

pub mod builder;
pub mod registry;

pub use builder::{render, Spread, SpreadBuilder, CARD_LIST_TOKEN};
pub use registry::{ParameterSpec, PersonaText, SpreadRecord, SpreadRegistry, SpreadTemplate};
