pub mod config;
pub mod handlers;
pub mod humanize;
pub mod model;
pub mod observability;
pub mod services;
pub mod store;
