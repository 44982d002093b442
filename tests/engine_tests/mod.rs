//! Engine integration test modules

mod configuration;
mod errors;
mod helpers;
mod lifecycle;
