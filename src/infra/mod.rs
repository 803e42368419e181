pub mod http;
pub mod import;
pub mod memory;
