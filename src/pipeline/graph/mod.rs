pub mod aliases;
pub mod cypher;
pub mod executor;
pub mod generator;
pub mod types;

pub use aliases::*;
pub use cypher::*;
pub use executor::*;
pub use generator::*;
pub use types::*;
