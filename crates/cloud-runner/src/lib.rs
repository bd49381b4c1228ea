mod context;
mod params;
mod pipeline;
mod provider;
mod stages;
mod types;

pub use context::*;
pub use params::*;
pub use pipeline::*;
pub use provider::*;
pub use stages::{CustomStep, CustomStepSecret};
pub use types::*;

pub use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Error>;
