use clap::Parser;
use client::input::{parse_command, Command, HELP_TEXT};
use client::network::Client;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Name shown next to your chat messages
    #[arg(short = 'n', long, default_value = "")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    println!("{}", HELP_TEXT);

    let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(command) = parse_command(&line) {
                        if command_tx.send(command).is_err() {
                            break;
                        }
                    }
                }
                // EOF drops the sender, which ends the session.
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });

    let mut client = Client::new(args.server, args.name, std::io::stdout());
    client.run(command_rx).await?;

    Ok(())
}
