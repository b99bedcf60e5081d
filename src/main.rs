use anyhow::{Context, Result};
use clap::Parser;

use armvision::session;
use armvision::settings::Settings;

use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Camera guided pick-and-place for a three joint arm")]
struct Args {
	/// Settings file
	#[arg(short, long, default_value = "vset.toml")]
	config: PathBuf,

	/// Serial port of the arm controller, overrides [serial] port
	#[arg(short, long)]
	port: Option<String>,

	/// Run without the preview window
	#[arg(long)]
	no_display: bool,
}

// Main
#[tokio::main]
async fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();

	//Load Vision Settings
	let mut settings = Settings::load(&args.config)
		.with_context(|| format!("loading {}", args.config.display()))?;
	if let Some(port) = args.port {
		settings.serial.port = port;
	}
	if args.no_display {
		settings.output.display = false;
	}

	session::run(settings).await
}
