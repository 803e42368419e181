pub mod config;
pub mod dataset;
pub mod query;
pub mod tutorial;
