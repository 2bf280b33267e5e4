pub mod client;
pub mod config;
pub mod models;
pub mod processor;
pub mod steps;
pub mod store;
pub mod stream;
pub mod utils;
