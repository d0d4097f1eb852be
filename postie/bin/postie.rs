//! Send a single message through the configured relay.

use std::{io::Read, path::PathBuf, process::ExitCode};

use clap::Parser;
use postie::{CONFIG_ENV, DEFAULT_PATHS, Settings, find_config_file};
use postie_common::{config::BodyFormat, internal, logging};
use postie_smtp::{Message, Sender};

/// Send one message through an authenticated SMTP relay
#[derive(Parser, Debug)]
#[command(name = "postie")]
#[command(about = "Send one message through an authenticated SMTP relay", long_about = None)]
#[command(version)]
struct Cli {
    /// Recipient address
    #[arg(long)]
    to: String,

    /// Subject line
    #[arg(short, long)]
    subject: String,

    /// Message body; read from standard input when neither this nor
    /// --body-file is given
    #[arg(short, long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the message body from a file
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Sender address, overriding the configured one
    #[arg(long)]
    from: Option<String>,

    /// Send the body as HTML
    #[arg(long)]
    html: bool,

    /// Path to the settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn body(&self) -> anyhow::Result<String> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }

        if let Some(path) = &self.body_file {
            return std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read body from {}: {}", path.display(), e)
            });
        }

        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        Ok(body)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init();

    let config_path = find_config_file(
        cli.config.clone(),
        std::env::var(CONFIG_ENV).ok(),
        &DEFAULT_PATHS,
    )?;
    internal!(level = DEBUG, "Using settings from {}", config_path.display());

    let mut settings = Settings::load(&config_path)?;
    if cli.html {
        settings.sender.body_format = BodyFormat::Html;
    }

    let message = Message::new(
        settings.sender_address(cli.from.as_deref()),
        cli.to.clone(),
        cli.subject.clone(),
        cli.body()?,
    );

    let mut sender = Sender::new(settings.sender);
    sender.configure(settings.server);

    let status = sender.send(message).await;

    if status.is_success() {
        println!("{status}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{status}");
        Ok(ExitCode::FAILURE)
    }
}
