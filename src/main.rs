use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod app;
pub mod chat;
pub mod config;
pub mod desktop;
pub mod image_analysis;
pub mod llm;
pub mod menu;
pub mod prompts;
pub mod responder;
pub mod screenshot;
pub mod session;
pub mod surface;
pub mod utils;

use app::App;
use config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "replypilot")]
#[command(about = "replypilot: answers your desktop chats while you are away")]
struct Cli {
    /// Settings file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// API key, taking precedence over the environment and the settings file.
    #[arg(long)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu.
    Menu {},
    /// Watch the chat in the foreground until Ctrl-C or inactivity.
    Run {},
    /// Generate one reply for a transcript.
    Test {
        #[arg(long)]
        history: String,
    },
    /// Calibrate the screen coordinates.
    Setup {},
    /// Save a screen region as a reference image for template capture.
    Snap {
        /// One of app_icon, chat_area, message_box.
        element: String,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show {},
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

async fn run_foreground(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    app.start()?;
    println!("Watching the chat. Press Ctrl-C to stop.");
    let report = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            app.stop().await
        }
        report = app.wait() => report,
    };
    if let Some(report) = report {
        println!(
            "Session ended ({:?}) after {} repl{}.",
            report.end,
            report.replies.len(),
            if report.replies.len() == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    // debug_mode lives in the settings file, so loading it logs through a
    // scoped subscriber before the global one is installed
    let loader = tracing_subscriber::fmt().with_env_filter(env_filter("info")).finish();
    let mut app = tracing::subscriber::with_default(loader, || App::load(cli.config, cli.api_key));
    let level = if app.settings.debug_mode { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(env_filter(level)).init();

    match cli.command.unwrap_or(Commands::Menu {}) {
        Commands::Menu {} => menu::run_menu(&mut app).await,
        Commands::Run {} => run_foreground(&mut app).await,
        Commands::Test { history } => {
            menu::test_generation(&app, &history).await;
            Ok(())
        }
        Commands::Setup {} => {
            menu::setup_coordinates(&mut app);
            Ok(())
        }
        Commands::Snap {
            element,
            x,
            y,
            width,
            height,
        } => {
            let path = app.capture_reference(&element, x, y, width, height)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show {},
        } => {
            let mut shown = app.settings.clone();
            if shown.api_key.is_some() {
                shown.api_key = Some("********".to_string());
            }
            println!("# {}", app.config_path().display());
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}
