pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod workflow;

pub use startup::AppState;
