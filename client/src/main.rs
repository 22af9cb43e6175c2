use clap::Parser;
use client::{Client, ClientConfig, Codec, InputCommand, Signals};
use log::{info, warn};
use shared::Side;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the match server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/game")]
    server: String,

    /// Local user id
    #[arg(short = 'u', long, default_value = "1")]
    user: u32,

    /// Display name of the local user
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Side to request: man or alien
    #[arg(long, default_value = "man")]
    side: Side,

    /// Movement reports per second
    #[arg(long, default_value = "30")]
    send_rate: u32,

    /// Simulation ticks per second
    #[arg(long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,

    /// Unacknowledged commands allowed before sends are refused
    #[arg(long, default_value = "64")]
    max_events: usize,

    /// Outbound frame encoding: json or bincode
    #[arg(long, default_value = "json")]
    codec: Codec,
}

/// Reads `+left`, `-left`, `fire`, `tower`, ... lines from stdin.
async fn read_console(input: mpsc::UnboundedSender<InputCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<InputCommand>() {
            Ok(command) => {
                if input.send(command).is_err() {
                    break;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ClientConfig {
        server_url: args.server,
        user_id: args.user,
        user_name: args.name,
        side: args.side,
        send_rate: args.send_rate,
        tick_rate: args.tick_rate,
        max_events: args.max_events,
        codec: args.codec,
    };

    info!("Starting client...");
    info!("Playing as {} ({}) on side {}", config.user_name, config.user_id, config.side);
    info!("Controls: +left/-left, +right, +up, +down, fire, tower");

    let (signals, signal_rx) = Signals::channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    tokio::spawn(client::network::log_signals(signal_rx));
    tokio::spawn(read_console(input_tx));

    let mut client = Client::multiplayer(config, signals);
    client.run(input_rx).await?;

    Ok(())
}
