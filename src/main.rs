use clap::{CommandFactory, Parser, Subcommand};
use hopebot::config::Config;
use hopebot::resource::{ResourceIcon, DEFAULT_RESOURCES};
use hopebot::{db, logging, runtime};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LONG_ABOUT: &str = concat!(
    "\x1b[1mHopeBot v",
    env!("CARGO_PKG_VERSION"),
    "\x1b[22m\n",
    "Mental health companion chat service.\n",
    "\n",
    "\x1b[1mQuick Start:\x1b[22m\n",
    "  1) write hopebot.config.yaml (optional; set api_key to enable the model)\n",
    "  2) hopebot start",
);

#[derive(Debug, Parser)]
#[command(
    name = "hopebot",
    version = VERSION,
    about = LONG_ABOUT
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Start the web server
    Start,
    /// List the curated resources
    Resources,
    /// Show version
    Version,
}

fn print_version() {
    println!("hopebot {VERSION}");
}

fn open_database(config: &Config) -> anyhow::Result<db::Database> {
    let data_dir = config.data_root_dir();
    Ok(db::Database::new(&data_dir.to_string_lossy())?)
}

fn print_resources(config: &Config) -> anyhow::Result<()> {
    let database = open_database(config)?;
    database.seed_resources_if_empty(&DEFAULT_RESOURCES)?;
    for resource in database.list_resources()? {
        let icon = ResourceIcon::from_tag(&resource.icon);
        println!("{} {}", icon.symbol(), resource.title);
        println!("   {}", resource.description);
        println!("   {}", resource.url);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(MainCommand::Start) => {}
        Some(MainCommand::Resources) => {
            let config = Config::load()?;
            print_resources(&config)?;
            return Ok(());
        }
        Some(MainCommand::Version) => {
            print_version();
            return Ok(());
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            return Ok(());
        }
    }

    let config = Config::load()?;

    if std::env::var("HOPEBOT_LOG_TO_FILE").is_ok() {
        logging::init_file_logging(&config.log_dir(), config.log_retention_days)?;
    } else {
        logging::init_console_logging();
    }
    info!("Starting HopeBot v{VERSION}...");

    let database = open_database(&config)?;
    info!("Database initialized");

    runtime::run(config, database).await?;

    Ok(())
}
