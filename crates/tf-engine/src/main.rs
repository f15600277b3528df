//! Track-finder entrypoint: loads a hit-store archive and a parameters
//! file, runs [`tf_engine::find_tracks`] over it, and reports a summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tf_config::Parameters;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tf-engine", version, about = "Charged-particle track finder")]
struct Args {
    /// Hit-store archive produced by the upstream unpacker (§6 archive layout).
    hits: PathBuf,

    /// Parameters TOML (§6/§10.3); falls back to a small in-memory default
    /// setup if omitted.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Time window length, in the hit store's time unit (ns).
    #[arg(long = "window-length", default_value_t = 1000.0)]
    window_length: f64,

    /// Stride between consecutive window starts; must be <= window-length
    /// for overlapping windows to cover every track crossing a boundary.
    #[arg(long = "stride", default_value_t = 1000.0)]
    stride: f64,

    /// Number of parallel worker lanes (`TrackFinder` threads, §4.8).
    #[arg(long = "lanes", default_value_t = 4)]
    lanes: usize,
}

fn configure_logging() -> Result<Option<WorkerGuard>> {
    let log_dir = Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "tf-engine.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_writer(nb_writer).try_init() {
        Ok(_) => Ok(Some(guard)),
        Err(_) => Ok(None),
    }
}

fn load_parameters(args: &Args) -> Result<Parameters> {
    match &args.config {
        Some(path) => Parameters::from_file(path).with_context(|| format!("loading parameters from {}", path.display())),
        None => {
            tracing::warn!(target: "tf_engine::startup", "no --config given, using the in-memory default setup");
            Ok(Parameters::default_cbm_like())
        }
    }
}

fn main() -> Result<()> {
    let _guard = configure_logging()?;
    let args = Args::parse();

    tracing::info!(target: "tf_engine::startup", hits = %args.hits.display(), window_length = args.window_length, stride = args.stride, lanes = args.lanes, "startup");

    let params = load_parameters(&args)?;

    let file = std::fs::File::open(&args.hits).with_context(|| format!("opening hit store {}", args.hits.display()))?;
    let mut reader = std::io::BufReader::new(file);
    let store = tf_io::read_hit_store(&mut reader).with_context(|| format!("reading hit store {}", args.hits.display()))?;

    tracing::info!(target: "tf_engine::startup", n_hits = store.n_hits(), n_streams = store.n_streams(), "hit store loaded");

    let (tracks, hit_indices) = tf_engine::find_tracks(&store, &params, args.window_length, args.stride, args.lanes);

    tracing::info!(target: "tf_engine::summary", n_tracks = tracks.len(), n_owned_hits = hit_indices.len(), "track finding complete");
    println!("reconstructed {} tracks over {} hits ({} owned hit ids)", tracks.len(), store.n_hits(), hit_indices.len());

    Ok(())
}
