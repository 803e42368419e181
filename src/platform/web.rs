use anyhow::Result;

use crate::app::App;

pub fn init_logging() {
    tracing_wasm::set_as_global_default();
}

pub fn launch() -> Result<()> {
    dioxus::launch(App);
    Ok(())
}
