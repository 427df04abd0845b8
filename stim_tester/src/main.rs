use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use stimgen::core_modules::utils::image_helper::{save_image, save_mask};
use stimgen::{
    Adjustment, CheckerboardFactory, GratingRequest, Pair, Period, PipelineConfig, Resolution,
    StimulusPipeline, resolve, resolve_grating_params,
};

#[derive(Parser)]
#[command(name = "stim_tester")]
#[command(about = "Resolve, render and export parametric visual stimuli")]
#[command(version)]
struct Cli {
    /// Fail instead of reporting when a requested value had to be adjusted.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve (shape, visual size, ppd) from any sufficient subset.
    Resolve(ResolveArgs),

    /// Resolve a grating partition along one axis.
    Grating(GratingArgs),

    /// Render a region stimulus from a JSON pipeline config.
    Render(RenderArgs),

    /// Sample a checkerboard with no equal top or left neighbours.
    Checkerboard(CheckerboardArgs),
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Height in pixels.
    #[arg(long)]
    height: Option<usize>,
    /// Width in pixels.
    #[arg(long)]
    width: Option<usize>,
    /// Height in degrees.
    #[arg(long)]
    visual_height: Option<f64>,
    /// Width in degrees.
    #[arg(long)]
    visual_width: Option<f64>,
    #[arg(long)]
    ppd_vertical: Option<f64>,
    #[arg(long)]
    ppd_horizontal: Option<f64>,
    /// Same ppd for both axes; overridden by the per-axis flags.
    #[arg(long)]
    ppd: Option<f64>,
}

#[derive(Debug, Args)]
struct GratingArgs {
    #[arg(long)]
    length: Option<usize>,
    #[arg(long)]
    visual_angle: Option<f64>,
    #[arg(long)]
    ppd: Option<f64>,
    /// Cycles per degree.
    #[arg(long)]
    frequency: Option<f64>,
    #[arg(long)]
    n_phases: Option<f64>,
    /// Degrees per phase.
    #[arg(long)]
    phase_width: Option<f64>,
    /// Period policy: ignore, even, odd or either.
    #[arg(long, default_value = "ignore")]
    period: Period,
    /// Keep the phase width as requested instead of snapping to whole pixels.
    #[arg(long)]
    no_round_phase_width: bool,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Pipeline config (JSON).
    #[arg(long)]
    config: PathBuf,
    /// Where to write the image as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Where to write the region mask as PNG.
    #[arg(long)]
    mask_out: Option<PathBuf>,
    /// Intensity drawn as black.
    #[arg(long, default_value = "0.0")]
    low: f64,
    /// Intensity drawn as white.
    #[arg(long, default_value = "1.0")]
    high: f64,
}

#[derive(Debug, Args)]
struct CheckerboardArgs {
    #[arg(long, default_value = "8")]
    n_checks: usize,
    /// Side of one check in degrees.
    #[arg(long, default_value = "1.0")]
    check_visual_size: f64,
    #[arg(long, default_value = "32.0")]
    ppd: f64,
    /// Candidate values, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "0.15,0.3,0.45,0.6,0.75,0.9")]
    values: Vec<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Where to write the board as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<T: Serialize> {
    result: T,
    adjustments: Vec<Adjustment>,
}

#[derive(Serialize)]
struct StimulusSummary<P: Serialize> {
    resolution: Resolution,
    params: P,
}

fn emit<T: Serialize>(result: T, adjustments: Vec<Adjustment>, strict: bool) -> Result<()> {
    if strict && !adjustments.is_empty() {
        let changed: Vec<String> = adjustments.iter().map(ToString::to_string).collect();
        bail!("requested values were adjusted: {}", changed.join("; "));
    }
    let json = serde_json::to_string_pretty(&Report {
        result,
        adjustments,
    })?;
    println!("{json}");
    Ok(())
}

fn run_resolve(args: ResolveArgs, strict: bool) -> Result<()> {
    let shape = Pair::Each(args.height, args.width);
    let visual_size = Pair::Each(args.visual_height, args.visual_width);
    let ppd = Pair::Each(
        args.ppd_vertical.or(args.ppd),
        args.ppd_horizontal.or(args.ppd),
    );
    let resolved = resolve(shape, visual_size, ppd)?;
    emit(resolved.value, resolved.adjustments, strict)
}

fn run_grating(args: GratingArgs, strict: bool) -> Result<()> {
    let request = GratingRequest {
        length: args.length,
        visual_angle: args.visual_angle,
        ppd: args.ppd,
        frequency: args.frequency,
        n_phases: args.n_phases,
        phase_width: args.phase_width,
        period: args.period,
        round_phase_width: !args.no_round_phase_width,
    };
    let resolved = resolve_grating_params(&request)?;
    emit(resolved.value, resolved.adjustments, strict)
}

fn run_render(args: RenderArgs, strict: bool) -> Result<()> {
    tracing::info!("Loading config: {}", args.config.display());
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let config: PipelineConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", args.config.display()))?;

    let stimulus = StimulusPipeline::new(config).render()?;
    tracing::info!(
        "Rendered {}x{} px",
        stimulus.resolution.height(),
        stimulus.resolution.width()
    );

    if let Some(out) = &args.out {
        save_image(out, &stimulus.img, (args.low, args.high))?;
        tracing::info!("Image written to {}", out.display());
    }
    if let Some(mask_out) = &args.mask_out {
        save_mask(mask_out, &stimulus.mask)?;
        tracing::info!("Mask written to {}", mask_out.display());
    }

    let summary = StimulusSummary {
        resolution: stimulus.resolution,
        params: stimulus.params,
    };
    emit(summary, stimulus.adjustments, strict)
}

fn run_checkerboard(args: CheckerboardArgs, strict: bool) -> Result<()> {
    let factory = CheckerboardFactory {
        n_checks: args.n_checks,
        check_visual_size: args.check_visual_size,
        ppd: args.ppd,
        values: args.values,
        seed: args.seed,
    };
    let stimulus = factory.build()?;

    if let Some(out) = &args.out {
        let low = factory.values.iter().copied().fold(f64::INFINITY, f64::min);
        let high = factory.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        save_image(out, &stimulus.img, (low.min(0.0), high.max(1.0)))?;
        tracing::info!("Checkerboard written to {}", out.display());
    }

    let summary = StimulusSummary {
        resolution: stimulus.resolution,
        params: stimulus.params,
    };
    emit(summary, stimulus.adjustments, strict)
}

fn main() -> Result<()> {
    // --- 1. Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // --- 2. Argument Parsing & Dispatch ---
    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve(args) => run_resolve(args, cli.strict),
        Commands::Grating(args) => run_grating(args, cli.strict),
        Commands::Render(args) => run_render(args, cli.strict),
        Commands::Checkerboard(args) => run_checkerboard(args, cli.strict),
    }
}
