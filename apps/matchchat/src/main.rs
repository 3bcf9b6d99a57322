use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{Endpoint, MatchClient, SocketIoConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod command;
mod config;
mod view;

use app::{App, Flow};

#[derive(Parser, Debug)]
#[command(about = "Terminal client for random one-to-one chat")]
struct Args {
    /// Matching service base URL (http, https, ws or wss).
    #[arg(long)]
    server_url: Option<String>,
    /// Connect with this nickname at startup.
    #[arg(long)]
    nickname: Option<String>,
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = config::load_settings(&args.config)?;
    settings.override_with(args.server_url, args.nickname);

    let endpoint = Endpoint::parse(&settings.server_url)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    info!(endpoint = %endpoint, "matchchat starting");

    let client = MatchClient::new(SocketIoConnector, endpoint);
    let mut app = App::new(client, settings.nickname.clone());
    let mut stdout = io::stdout();

    if let Some(nickname) = settings.nickname {
        app.handle_command(command::Command::Connect(Some(nickname)), &mut stdout)?;
    } else {
        println!("{}", command::HELP);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let has_transport = app.client().has_transport();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let Some(command) = command::parse(&line) else {
                    continue;
                };
                if app.handle_command(command, &mut stdout)? == Flow::Quit {
                    break;
                }
                app.flush_pending(&mut stdout)?;
            }
            Some(update) = app.client_mut().next_event(), if has_transport => {
                app.show_update(&update, &mut stdout)?;
            }
        }
    }

    app.client_mut().disconnect();
    info!("matchchat stopped");
    Ok(())
}
