pub mod cli;
pub mod deployment;
pub mod gateway;
pub mod pacing;
pub mod workflows;

pub use gateway::{GatewayClient, GatewayError, ProjectStatus};
pub use pacing::Pacing;
pub use workflows::Session;
