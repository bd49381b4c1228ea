pub(crate) mod build;
pub(crate) mod compress;
pub(crate) mod custom;
pub(crate) mod deploy;
pub(crate) mod setup;
pub(crate) mod upload;

pub use custom::{CustomStep, CustomStepSecret};
