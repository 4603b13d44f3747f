//! colony-client binary
//!
//! Joins one room on a colony server, mirrors its grid and prints it on
//! demand. Console commands are read from stdin (see `input`).
//!
//! ## Configuration (TOML / env via `config` crate, flags via `clap`)
//!
//! | Flag               | Key              | Default                 |
//! |--------------------|------------------|-------------------------|
//! | `--config`         |                  | none (`COLONY_CONFIG`)  |
//! | `--origin`         | `origin`         | `http://localhost:8080` |
//! | `--room`           | `room`           | `lobby`                 |
//! | `--retry-delay-ms` | `retry_delay_ms` | `3000`                  |
//! | `--draw`           |                  | off                     |
//!
//! Switching rooms throws away the view and the connection and starts over.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use colony_client::{
    endpoint_url,
    input::UserCommand,
    settings::ClientSettings,
    transport::TransportManager,
    view::{ClickOutcome, Reconciled, WorldView},
    WsConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::Instrument;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "colony-client", about = "Colony Client", version)]
struct Args {
    /// Settings file (TOML)
    #[arg(long, env = "COLONY_CONFIG")]
    config: Option<PathBuf>,

    /// Origin of the server page, e.g. http://localhost:8080
    #[arg(long)]
    origin: Option<String>,

    /// Room to join
    #[arg(long)]
    room: Option<String>,

    /// Delay between reconnection attempts (ms)
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Print the grid after every visible change
    #[arg(long)]
    draw: bool,
}

impl Args {
    fn apply(&self, settings: &mut ClientSettings) {
        if let Some(origin) = &self.origin {
            settings.origin = origin.clone();
        }
        if let Some(room) = &self.room {
            settings.room = room.clone();
        }
        if let Some(ms) = self.retry_delay_ms {
            settings.retry_delay_ms = ms;
        }
    }
}

/// Why a room session ended.
enum Exit {
    Quit,
    SwitchRoom(String),
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("colony_client=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut settings = ClientSettings::load(args.config.as_deref())?;
    args.apply(&mut settings);

    log::info!(
        "Starting colony-client (origin='{}', room='{}', retry={}ms)",
        settings.origin,
        settings.room,
        settings.retry_delay_ms,
    );

    let mut stdin = Some(BufReader::new(tokio::io::stdin()).lines());
    let mut room = settings.room.clone();

    loop {
        let span = tracing::info_span!("room", room = %room);
        match run_room(&settings, &room, args.draw, &mut stdin)
            .instrument(span)
            .await?
        {
            Exit::Quit => break,
            Exit::SwitchRoom(next) => {
                log::info!("Switching room: {} -> {}", room, next);
                room = next;
            }
        }
    }

    log::info!("colony-client stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// One room session
// ---------------------------------------------------------------------------

async fn run_room(
    settings: &ClientSettings,
    room: &str,
    draw: bool,
    stdin: &mut Option<Lines<BufReader<Stdin>>>,
) -> Result<Exit> {
    let address = endpoint_url(&settings.origin, room)?;
    let (manager, mut handle) =
        TransportManager::new(settings.transport_config(address.as_str()), WsConnector);
    let transport = tokio::spawn(manager.run().in_current_span());

    let mut view = WorldView::new(&settings.view).with_retry_delay_ms(settings.retry_delay_ms);
    let outcome = drive(&mut view, &mut handle.events, draw, stdin).await;

    drop(handle);
    transport.abort();
    outcome
}

async fn drive(
    view: &mut WorldView,
    events: &mut tokio::sync::mpsc::Receiver<colony_client::TransportEvent>,
    draw: bool,
    stdin: &mut Option<Lines<BufReader<Stdin>>>,
) -> Result<Exit> {
    loop {
        let flash = view.next_deadline();
        let flash_at = tokio::time::Instant::from_std(
            flash.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
        );

        tokio::select! {
            event = events.recv() => {
                let event = event.ok_or_else(|| anyhow!("transport task ended"))?;
                let reconciled = view.handle_transport(event, Instant::now());
                if let Some(entry) = view.log().last() {
                    log::debug!("[client] {}", entry);
                }
                if draw && reconciled != Reconciled::Nothing {
                    print_grid(view);
                }
            }

            _ = tokio::time::sleep_until(flash_at), if flash.is_some() => {
                view.tick(Instant::now());
            }

            line = next_line(stdin), if stdin.is_some() => match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match UserCommand::parse(&line) {
                    Ok(UserCommand::Quit) => return Ok(Exit::Quit),
                    Ok(UserCommand::SwitchRoom(next)) => return Ok(Exit::SwitchRoom(next)),
                    Ok(command) => run_command(view, command),
                    Err(e) => println!("{}", e),
                },
                None => {
                    log::info!("stdin closed; press Ctrl-C to exit");
                    *stdin = None;
                }
            },

            _ = tokio::signal::ctrl_c() => return Ok(Exit::Quit),
        }
    }
}

/// Next stdin line; `None` on end of input or read error.
async fn next_line(stdin: &mut Option<Lines<BufReader<Stdin>>>) -> Option<String> {
    let lines = stdin.as_mut()?;
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            log::warn!("stdin read failed: {}", e);
            None
        }
    }
}

fn run_command(view: &mut WorldView, command: UserCommand) {
    match command {
        UserCommand::Click { x, y } => match view.click_tile(x, y) {
            ClickOutcome::Sent => println!("click ({},{}) sent", x, y),
            ClickOutcome::NotConnected => println!("not connected; click dropped"),
            ClickOutcome::UnknownTile => println!("no tile at ({},{})", x, y),
        },
        UserCommand::Status => print_status(view),
        UserCommand::Log => {
            for entry in view.log().entries() {
                println!("{}", entry);
            }
        }
        UserCommand::Draw => print_grid(view),
        UserCommand::SwitchRoom(_) | UserCommand::Quit => {}
    }
}

fn print_status(view: &WorldView) {
    let model = view.model();
    let (width, height) = model.dimensions().unwrap_or((0, 0));
    let resources = model
        .resources()
        .iter()
        .map(|(name, amount)| format!("{}={}", name, amount))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{} | room {} | {}x{} | {} tiles | {} entities | {}",
        view.status_text(),
        model.room_id().unwrap_or("-"),
        width,
        height,
        model.tile_count(),
        model.entity_count(),
        if resources.is_empty() { "-" } else { resources.as_str() },
    );
}

fn print_grid(view: &WorldView) {
    print_status(view);
    print!("{}", view.surface().render_text());
    for entity in view.surface().entity_elements() {
        println!("  {} @ {} [{}]", entity.label(), entity.coord, entity.class_list());
    }
}
