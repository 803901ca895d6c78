pub mod aggregate;
pub mod band;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod entity;
pub mod feed;
pub mod filter;
pub mod health;
pub mod history;
pub mod normalize;
pub mod pairs;
pub mod publish;
pub mod runtime;
pub mod sink;
pub mod spot;

pub use config::EngineConfig;
pub use engine::{Engine, TickReport};
