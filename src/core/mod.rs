// Core modules implementing the lifecycle template, Rox activation, and its collaborators.
pub mod cleanup;
pub mod error;
pub mod filter;
pub mod gate;
pub mod lifecycle;
pub mod log;
pub mod options;
pub mod remove;
pub mod staging;
