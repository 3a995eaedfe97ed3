//! Stub entry point: this crate is a library.

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("audio-transport is a library crate.");
    println!("Construct a Transport from a list of media files and drive it");
    println!("with play / pause / resume / stop / toggle_mute / loop / repeat.");
}
