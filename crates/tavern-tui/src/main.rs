use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;

use tavern_core::Settings;

mod app;
mod client;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

/// Route logs to a file; the terminal is owned by the UI.
fn init_logging() -> Result<WorkerGuard> {
    let dir = dirs::data_local_dir()
        .context("Could not determine data directory")?
        .join("tavern");
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, "tavern-tui.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging()?;
    let settings = Settings::from_env()?;
    tracing::info!(server = %settings.server_url, "starting tavern client");

    tui::install_panic_hook();
    let mut terminal = Tui::enter()?;
    let mut app = App::new(&settings);
    let mut events = EventHandler::new();
    let tx = events.sender();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event, &tx)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.cancel_request();
    drop(terminal);
    result
}
