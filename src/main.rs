mod app;
mod config;
mod domain;
mod infra;
mod platform;
mod ui;
mod usecase;

#[cfg(test)]
mod tests;

fn main() {
    platform::init_logging();

    if let Err(err) = platform::launch() {
        tracing::error!(error = %format!("{err:#}"), "failed to launch");
        std::process::exit(1);
    }
}
