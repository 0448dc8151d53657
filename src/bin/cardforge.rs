use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use cardforge::{CardConfig, ExportJob, Exporter, ImageResource, apply_watermark, card_scene};

#[derive(Parser)]
#[command(name = "cardforge", about = "Compose, export and watermark Anoma community cards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a card to a PNG file.
    Card(CardArgs),
    /// Overlay the protective watermark on an image and write it as JPEG.
    Watermark(WatermarkArgs),
}

#[derive(clap::Args)]
struct CardArgs {
    /// Profile picture to place in the artwork slot.
    #[arg(long)]
    pfp: PathBuf,
    /// Twitter handle, with or without the leading '@'.
    #[arg(long, default_value = "")]
    twitter: String,
    /// Discord handle, with or without the leading '@'.
    #[arg(long, default_value = "")]
    discord: String,
    /// Badge label; blank falls back to the default.
    #[arg(long, default_value = "")]
    badge: String,
    /// Output directory for the timestamped PNG.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(clap::Args)]
struct WatermarkArgs {
    /// Source image (PNG or JPEG).
    #[arg(long = "in")]
    input: PathBuf,
    /// Destination JPEG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Card(args) => run_card(args),
        Command::Watermark(args) => run_watermark(args),
    }
}

fn run_card(args: CardArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.pfp)
        .with_context(|| format!("read profile picture {}", args.pfp.display()))?;

    let mut config = CardConfig::new();
    config.set_profile(ImageResource::decode_now(&bytes)?);
    config.set_twitter(&args.twitter);
    config.set_discord(&args.discord);
    config.set_badge(&args.badge);
    anyhow::ensure!(
        config.ready(),
        "card needs a profile picture and at least one handle (--twitter or --discord)"
    );

    let job = ExportJob::card(card_scene(&config));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build tokio runtime")?;
    let exported = runtime.block_on(Exporter::new().export(&job))?;

    let path = exported.write_to_dir(&args.out)?;
    println!("{}", path.display());
    Ok(())
}

fn run_watermark(args: WatermarkArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("read source image {}", args.input.display()))?;
    let jpeg = apply_watermark(&bytes)?;
    std::fs::write(&args.out, &jpeg)
        .with_context(|| format!("write watermarked image {}", args.out.display()))?;
    println!("{}", args.out.display());
    Ok(())
}
