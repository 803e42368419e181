#[cfg(not(target_arch = "wasm32"))]
mod desktop;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use desktop::{init_logging, launch};
#[cfg(target_arch = "wasm32")]
pub use web::{init_logging, launch};
