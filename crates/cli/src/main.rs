use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "fitbooth", version, about = "Virtual try-on kiosk tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a photo into a frame template.
    Compose(ComposeArgs),
    /// Take a photo through a capture session and upload it to the kiosk server.
    Capture(CaptureArgs),
    /// Run a full try-on and print the result.
    TryOn(TryOnArgs),
    /// List saved results.
    Results(ResultsArgs),
    /// Validate configuration and optionally probe the remote services.
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ComposeArgs {
    /// Photo to place in the frame.
    #[arg(long)]
    pub photo: PathBuf,

    /// Frame template (PNG with a transparent cutout).
    #[arg(long)]
    pub frame: PathBuf,

    #[arg(long, value_enum, default_value_t = PresetChoice::Portrait)]
    pub preset: PresetChoice,

    /// Output path.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PresetChoice {
    /// Captured photo framed for submission.
    TryOn,
    /// Printed portrait with a thin border.
    Portrait,
}

#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Still images served as cameras, in device order.
    #[arg(long = "still", required = true)]
    pub stills: Vec<PathBuf>,

    /// Camera index to start on.
    #[arg(long, default_value_t = 0)]
    pub device: usize,

    /// Run the on-screen countdown before capturing.
    #[arg(long)]
    pub countdown: bool,
}

#[derive(Parser, Debug)]
pub struct TryOnArgs {
    /// Model photo.
    #[arg(long)]
    pub model: PathBuf,

    /// The model photo was taken at the kiosk and gets the try-on frame.
    #[arg(long)]
    pub captured: bool,

    /// Garment photo.
    #[arg(long)]
    pub cloth: PathBuf,

    #[arg(long, default_value = "")]
    pub model_name: String,

    #[arg(long, default_value = "")]
    pub outfit_name: String,

    /// Frame template for captured photos. Defaults to `FRAME_TEMPLATE_PATH`.
    #[arg(long)]
    pub frame: Option<PathBuf>,

    /// Ask the service whether both photos are usable before submitting.
    #[arg(long)]
    pub check_inputs: bool,
}

#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Read the metadata table instead of the kiosk server.
    #[arg(long)]
    pub remote: bool,

    /// Fetch a single metadata row.
    #[arg(long, requires = "remote")]
    pub id: Option<i64>,

    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    /// Image sent to the model input check to verify the API key.
    #[arg(long)]
    pub probe: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fitbooth=info,fitbooth_pipeline=info,fitbooth_capture=info,\
                 fitbooth_fitroom=info,fitbooth_cloud=info,fitbooth_local=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => commands::compose(args),
        Command::Capture(args) => commands::capture(args).await,
        Command::TryOn(args) => commands::try_on(args).await,
        Command::Results(args) => commands::results(args).await,
        Command::CheckConfig(args) => commands::check_config(args).await,
    }
}
