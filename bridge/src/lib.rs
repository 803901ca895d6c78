pub mod config;
pub mod wiring;
