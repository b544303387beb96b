pub mod audit;
pub mod blobs;
pub mod config;
pub mod display;
pub mod error;
pub mod parser;
pub mod roster;
pub mod service;
pub mod store;
pub mod teams;
pub mod web;

pub use error::{AppError, Result};
