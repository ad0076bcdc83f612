//! CLI entry point for synap-rs.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use synap_rs::cli::{Cli, Commands};
use synap_rs::config::Config;
use synap_rs::input::InputSource;
use synap_rs::timing::Timings;
use synap_rs::{Backend, PreparedInference, Session};

/// Get the enabled features.
fn enabled_features() -> &'static str {
    if cfg!(feature = "native") {
        "native"
    } else {
        "simulated-only"
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

/// Options of the `infer` command after merging CLI flags and config.
struct InferOptions {
    model: PathBuf,
    inputs: Vec<InputSource>,
    output_sizes: Vec<usize>,
    backend: Backend,
    repeat: usize,
    lock: bool,
    dump_raw: Option<PathBuf>,
    pretty: bool,
}

fn run_infer(opts: InferOptions) -> Result<()> {
    // Read the model up front so load time stays separate from init time.
    let load_start = Instant::now();
    let model = fs::read(&opts.model)
        .with_context(|| format!("Failed to load model file: {}", opts.model.display()))?;
    let load_ms = elapsed_ms(load_start);

    let input_data = opts
        .inputs
        .iter()
        .map(|source| {
            source
                .load()
                .with_context(|| format!("Failed to load input: {}", source))
        })
        .collect::<Result<Vec<_>>>()?;

    let session = Session::open(opts.backend)?;
    let _npu_lock = if opts.lock {
        let lock = session.lock_npu()?;
        info!("NPU locked");
        Some(lock)
    } else {
        None
    };

    info!("Loading network: {}", opts.model.display());
    let init_start = Instant::now();
    let prepared = PreparedInference::new(&session, &model, &input_data, &opts.output_sizes)
        .context("Failed to load network")?;
    let init_ms = elapsed_ms(init_start);

    info!("Network inputs: {}", prepared.input_count());
    info!("Network outputs: {}", prepared.output_count());

    let mut outputs: Vec<Vec<u8>> = opts.output_sizes.iter().map(|&s| vec![0; s]).collect();
    let mut run_times = Vec::with_capacity(opts.repeat);
    for i in 0..opts.repeat {
        let start = Instant::now();
        prepared
            .run_into(&mut outputs)
            .with_context(|| format!("Prediction {} failed", i))?;
        let t = elapsed_ms(start);
        info!("Predict #{}: {:.2} ms", i, t);
        run_times.push(t);
    }
    prepared.release();

    if let Some(dir) = &opts.dump_raw {
        dump_outputs(dir, &outputs)?;
    }

    let timings = Timings::from_runs(load_ms, init_ms, &run_times);
    info!(
        "Inference timings (ms): load: {:.2} init: {:.2} min: {:.2} median: {:.2} max: {:.2} stddev: {:.2} mean: {:.2}",
        timings.load,
        timings.init,
        timings.min,
        timings.median,
        timings.max,
        timings.stddev,
        timings.mean
    );

    let report = serde_json::json!({
        "backend": opts.backend.to_string(),
        "model": opts.model.display().to_string(),
        "repeat": opts.repeat,
        "inputs": opts.inputs.iter().zip(&input_data).enumerate().map(|(i, (source, data))| {
            serde_json::json!({
                "index": i,
                "source": source.to_string(),
                "size": data.len(),
            })
        }).collect::<Vec<_>>(),
        "outputs": outputs.iter().enumerate().map(|(i, data)| {
            serde_json::json!({
                "index": i,
                "size": data.len(),
            })
        }).collect::<Vec<_>>(),
        "timings_ms": timings,
    });

    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}

fn dump_outputs(dir: &Path, outputs: &[Vec<u8>]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    for (i, data) in outputs.iter().enumerate() {
        let path = dir.join(format!("output_raw_{}.dat", i));
        info!("Writing raw out {} to file: {}", i, path.display());
        fs::write(&path, data)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    }
    Ok(())
}

fn run_check(backend: Backend, lock: bool) -> Result<()> {
    println!("synap-rs v{}", env!("CARGO_PKG_VERSION"));
    println!("features: {}", enabled_features());
    println!("backend: {}", backend);

    let session = Session::open(backend).context("NPU unavailable")?;
    println!("driver: {}", session.driver_name());

    if lock {
        let npu_lock = session.lock_npu()?;
        println!("NPU lock: OK");
        npu_lock.unlock()?;
    }
    println!("Status: OK (NPU ready)");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Infer {
            model,
            inputs,
            output_sizes,
            backend,
            repeat,
            lock,
            dump_raw,
            output_dir,
            format,
            config,
        } => {
            let config = if let Some(config_path) = config {
                Config::from_yaml_file(&config_path)
                    .with_context(|| format!("Failed to load config: {}", config_path.display()))?
            } else {
                Config::default()
            };

            let backend = match backend {
                Some(b) => b.parse()?,
                None => config.driver.backend()?,
            };
            info!("Using backend: {}", backend);

            let dump_raw = (dump_raw || config.output.dump_raw).then(|| {
                output_dir.unwrap_or_else(|| PathBuf::from(&config.output.directory))
            });

            run_infer(InferOptions {
                model,
                inputs,
                output_sizes,
                backend,
                repeat: repeat.unwrap_or(config.inference.repeat),
                lock: lock || config.inference.lock_npu,
                dump_raw,
                pretty: format == "pretty",
            })?;
        }

        Commands::Check { backend, lock } => {
            let backend = match backend {
                Some(b) => b.parse()?,
                None => Config::default().driver.backend()?,
            };
            if let Err(e) = run_check(backend, lock) {
                eprintln!("Check failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
