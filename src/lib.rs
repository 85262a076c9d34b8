pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod models;
pub mod observability;
pub mod policy;
pub mod state;
