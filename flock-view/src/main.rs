//! Application entry point for the flock viewer.
//!
//! This binary sets up logging and eframe/egui, then delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.

mod viewer;

use tracing_subscriber::EnvFilter;
use viewer::Viewer;

/// Starts the native eframe application.
///
/// Log verbosity follows `RUST_LOG` and defaults to `info`.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if eframe fails to create the native window or event loop.
fn main() -> eframe::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Boids Flock",
        options,
        Box::new(|_cc| Ok(Box::new(Viewer::new()?))),
    )
}
