//! sfx-board - terminal panel for trying out sound generators
//!
//! Run with: cargo run --bin sfx-board
//! Set SFX_LOG (e.g. `SFX_LOG=simsound=debug`) to write sfx-board.log.

mod app;
mod ui;

use std::{fs::File, sync::Mutex};

use app::Board;
use simsound::{config::AudioConfig, io::AudioSystem};
use tracing_subscriber::EnvFilter;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let system = AudioSystem::start_or_silent(&AudioConfig::default());
    let mut board = Board::new(system)?;

    let mut terminal = ratatui::init();
    let result = board.run(&mut terminal);
    ratatui::restore();
    result
}

/// The terminal belongs to the UI, so logs only go to a file and only on request.
fn init_logging() -> color_eyre::Result<()> {
    let Ok(directives) = std::env::var("SFX_LOG") else {
        return Ok(());
    };

    let file = File::create("sfx-board.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
