extern crate log;
extern crate pretty_env_logger;

use std::fs;
use std::io::BufWriter;
use std::path::{
    Path,
    PathBuf,
};

use clap::Parser;
use log::{
    error,
    info,
    warn,
};

use specmesh::{
    AddOutcome,
    EngineConfig,
    EngineError,
    Result,
    SpectralEngineContext,
    TraceInput,
    Viewport,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config, written to instead of read with `--write-template`
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long, default_value = "specmesh_output")]
    output_dir: String,
    #[arg(long, action)]
    write_template: bool,
    /// Overrides `ledger.session_id`
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    low: Option<f64>,
    #[arg(long)]
    high: Option<f64>,
    #[arg(long, default_value_t = 2000)]
    max_points: usize,
    /// Label of the trace to rank the others against
    #[arg(long)]
    reference: Option<String>,
    /// Trace files, JSON arrays of traces or two-column axis,value CSV
    files: Vec<String>,
}

/// Reads a headerless (or single header row) two-column CSV. Rows whose
/// columns do not parse as numbers are skipped.
fn read_csv_trace(path: &Path) -> Result<TraceInput> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut axis = Vec::new();
    let mut value = Vec::new();
    let mut skipped = 0;
    for record in rdr.records() {
        let record = record?;
        let parsed = (
            record.get(0).and_then(|x| x.parse::<f64>().ok()),
            record.get(1).and_then(|x| x.parse::<f64>().ok()),
        );
        match parsed {
            (Some(x), Some(y)) => {
                axis.push(x);
                value.push(y);
            },
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("Skipped {} unparseable rows in {}", skipped, path.display());
    }

    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mut input = TraceInput::new(label, axis, value);
    input.provider = Some(path.display().to_string());
    Ok(input)
}

fn read_inputs(path: &Path) -> Result<Vec<TraceInput>> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        let bytes = fs::read(path)?;
        let inputs: Vec<TraceInput> = serde_json::from_slice(&bytes)?;
        Ok(inputs)
    } else {
        Ok(vec![read_csv_trace(path)?])
    }
}

fn write_template(path: Option<String>) -> Result<()> {
    let out_path = path.unwrap_or_else(|| "specmesh.toml".into());
    EngineConfig::default().write_template(&out_path)?;
    println!("Wrote default config to {}", out_path);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_toml(path)?,
        None => EngineConfig::default(),
    };
    if let Some(session) = args.session {
        config.ledger.session_id = session;
    }

    let mut inputs = Vec::new();
    for file in &args.files {
        info!("Reading traces from: {}", file);
        inputs.extend(read_inputs(Path::new(file))?);
    }
    if inputs.is_empty() {
        return Err(EngineError::InvalidOption("no input traces given".into()));
    }

    let mut ctx = SpectralEngineContext::new(config)?;
    let outcomes = ctx.ingest_batch(inputs, true);
    for outcome in outcomes {
        match outcome {
            Ok(AddOutcome::Added(id)) => info!("Added trace {}", id),
            Ok(AddOutcome::Duplicate {
                fingerprint,
                existing_label,
            }) => info!("Duplicate of '{}' ({})", existing_label, fingerprint),
            Err(e) => warn!("Could not ingest trace: {}", e),
        }
    }

    let viewport = Viewport::new(args.low, args.high);
    for trace in ctx.traces() {
        let sampled = trace.sample(&viewport, Some(args.max_points), false);
        info!(
            "{} '{}': {} points, serving {} (full resolution: {})",
            trace.id(),
            trace.label(),
            trace.series().len(),
            sampled.len(),
            sampled.is_full_resolution
        );
    }

    let options = ctx.default_options();
    let matrix = ctx.similarity_matrix(&viewport, &options);

    let out_path_dir = PathBuf::from(&args.output_dir);
    if !out_path_dir.exists() {
        fs::create_dir_all(&out_path_dir)?;
    }
    for metric in matrix.metrics() {
        let out_path = out_path_dir.join(format!("similarity_{}.csv", metric));
        let file = fs::File::create(&out_path)?;
        matrix.write_csv(metric, BufWriter::new(file))?;
        info!("Wrote {}", out_path.display());
    }

    if let Some(reference) = args.reference {
        let reference_id = ctx
            .traces()
            .find(|t| t.label() == reference)
            .map(|t| t.id())
            .ok_or_else(|| EngineError::InvalidOption(format!("no trace labelled '{reference}'")))?;
        let ranked = ctx.rank_against_reference(&viewport, &options.with_reference(reference_id))?;
        for (rank, entry) in ranked.iter().enumerate() {
            match entry.score {
                Some(score) => println!("{:>3} {:<32} {:.6}", rank + 1, entry.label, score),
                None => println!("{:>3} {:<32} -", rank + 1, entry.label),
            }
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    if args.write_template {
        if let Err(e) = write_template(args.config) {
            eprintln!("Could not write template: {}", e);
            std::process::exit(1);
        }
        return;
    }

    pretty_env_logger::init();

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
