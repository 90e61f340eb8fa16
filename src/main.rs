//! Demo viewer.
//!
//! ```text
//! flurry [texture-path] [config.json]
//! ```
//!
//! Without a texture the built-in white square is used. Drag with the left
//! mouse button to move the emitter. `RUST_LOG` controls logging.

use std::process::ExitCode;

use flurry::{EmitterConfig, TextureSource, Vec2, Viewer};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let source = match args.next() {
        Some(path) => TextureSource::Url(path),
        None => TextureSource::Default,
    };

    let config = match args.next() {
        Some(path) => match EmitterConfig::from_file(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::error!("{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let result = Viewer::new()
        .with_size(800, 600)
        .with_title("Flurry")
        .with_emitter("demo", Vec2::new(0.0, 150.0), source, config)
        .run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
