use clap::Parser;
use log::{error, info};
use macroquad::prelude::*;
use snake_client::history::{HistorySink, JsonLinesHistory, LogSink};
use snake_client::input::InputManager;
use snake_client::network::{Session, SessionConfig};
use snake_client::rendering::Renderer;
use snake_client::world::World;
use snake_shared::DEFAULT_PORT;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Player name sent in the handshake
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Append game history as JSON lines to this file instead of the log
    #[arg(long, env = "SNAKE_HISTORY")]
    history: Option<PathBuf>,

    /// Window width
    #[arg(short = 'w', long, default_value = "900")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "900")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: format!("Snake - {}", args.name),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Network tasks live on tokio worker threads; this thread belongs to the window.
    let runtime = tokio::runtime::Runtime::new()?;

    let sink: Box<dyn HistorySink> = match &args.history {
        Some(path) => {
            info!("Recording game history to {}", path.display());
            Box::new(JsonLinesHistory::open(path)?)
        }
        None => Box::new(LogSink::new()),
    };

    let config = SessionConfig::new(args.host, args.port, args.name);
    let world = Arc::new(World::new());
    let session = runtime.block_on(Session::connect(&config, Arc::clone(&world), sink))?;

    info!("Controls: arrow keys or WASD to turn, Escape to quit");
    prevent_quit();

    let mut input = InputManager::new();
    let mut renderer = Renderer::new(&config.player_name);

    loop {
        let frame = input.update();
        if frame.quit || is_quit_requested() {
            break;
        }

        if let Some(direction) = frame.direction {
            session.send_move(direction);
        }

        renderer.render(&world.snapshot(), session.is_receiving());
        next_frame().await;
    }

    runtime.block_on(session.disconnect());
    Ok(())
}
