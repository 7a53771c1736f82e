pub mod client;
pub mod config;
pub mod design;
pub mod error;
pub mod export;
pub mod planner;
pub mod retry;
pub mod session;
pub mod state;
pub mod synthesizer;
