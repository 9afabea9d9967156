pub mod config;
pub mod error;
pub mod library;
pub mod models;
pub mod mutation;
pub mod normalize;
pub mod progress;
pub mod storage;
