// crates/shared/src/toolbelts/mod.rs
pub mod arithmetic;
pub mod web_search;

pub use arithmetic::Arithmetic;
pub use web_search::WebSearch;
