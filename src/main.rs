use clap::{CommandFactory, Parser, Subcommand};
use msgbridge::config::Config;
use msgbridge::{logging, runtime};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "msgbridge", version = VERSION, about = "HTTP-to-messaging bridge")]
struct Cli {
    /// Path to msgbridge.config.yaml
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Start the bridge server
    Start,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(MainCommand::Start) => {}
        Some(MainCommand::Version) => {
            println!("msgbridge {VERSION}");
            return Ok(());
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            return Ok(());
        }
    }

    logging::init_console_logging();

    let config = Config::load(cli.config.as_deref())?;
    info!("Starting msgbridge...");
    runtime::run(config).await
}
