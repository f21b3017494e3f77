//! lumen: apply Lightroom-style adjustments to photographs.
//!
//! Decodes each source, bounds it to the preview size, runs the
//! adjustment pipeline and writes `<stem>-adjusted.jpg` next to the other
//! outputs. Parameters come from an XMP preset, a JSON object and
//! repeated `--set key=value` flags, layered in that order.
//!
//! Sources are processed in parallel and share one base image cache, so
//! `--runs N` re-renders from the cache and reports per-stage timings.
//!
//! # Usage
//!
//! ```text
//! lumen --preset film.xmp --set exposure=+0.3 --set hue_blue=-20 IMG_0001.jpg IMG_0002.jpg
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use image::codecs::jpeg::JpegEncoder;
use lumen_pipeline::diagnostics::{Clock, PipelineDiagnostics, duration_ms};
use lumen_pipeline::{
    DownscaleFilter, Editor, EditorConfig, FileDecoder, ParameterSet, RgbImage, Stage,
};
use rayon::prelude::*;

/// Apply Lightroom-style adjustment parameters to photographs.
///
/// Writes one adjusted JPEG preview per source and prints per-stage
/// diagnostics for each.
#[derive(Parser)]
#[command(name = "lumen", version)]
struct Cli {
    /// Source images (PNG, JPEG, BMP, WebP, TIFF).
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Set one parameter, e.g. `exposure=0.5` or `sat_orange=-20`.
    /// Repeatable; overrides the preset and `--params-json`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Parameters as a JSON object, e.g. `{"contrast": 25}`.
    #[arg(long)]
    params_json: Option<String>,

    /// Lightroom XMP preset to start from.
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Directory for adjusted previews.
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// JPEG quality of the written previews.
    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Long-edge bound applied when a source is first decoded.
    #[arg(long, default_value_t = EditorConfig::DEFAULT_MAX_DIMENSION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_dimension: u32,

    /// Downscale filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Number of decoded sources kept in memory (0 disables the cache).
    #[arg(long, default_value_t = EditorConfig::DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Full editor config as a JSON string.
    ///
    /// When provided, `--max-dimension`, `--filter` and `--cache-capacity`
    /// are ignored. The JSON must be a valid `EditorConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of times each source is rendered.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Downscale resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Keep the decoded resolution.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian (smooth).
    Gaussian,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos3,
}

/// Maps a [`DownscaleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: DownscaleFilter) -> Filter {
    match f {
        DownscaleFilter::Disabled => Filter::Disabled,
        DownscaleFilter::Nearest => Filter::Nearest,
        DownscaleFilter::Triangle => Filter::Triangle,
        DownscaleFilter::CatmullRom => Filter::CatmullRom,
        DownscaleFilter::Gaussian => Filter::Gaussian,
        DownscaleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn filter_to_pipeline(f: Filter) -> DownscaleFilter {
    match f {
        Filter::Disabled => DownscaleFilter::Disabled,
        Filter::Nearest => DownscaleFilter::Nearest,
        Filter::Triangle => DownscaleFilter::Triangle,
        Filter::CatmullRom => DownscaleFilter::CatmullRom,
        Filter::Gaussian => DownscaleFilter::Gaussian,
        Filter::Lanczos3 => DownscaleFilter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`EditorConfig::DEFAULT_DOWNSCALE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(EditorConfig::DEFAULT_DOWNSCALE_FILTER);

/// Build an [`EditorConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<EditorConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(EditorConfig {
        max_dimension: cli.max_dimension,
        downscale_filter: filter_to_pipeline(cli.filter),
        cache_capacity: cli.cache_capacity,
    })
}

/// Layer preset, JSON and `--set` parameters, later sources winning.
fn params_from_cli(cli: &Cli) -> Result<ParameterSet, String> {
    let mut params = ParameterSet::new();

    if let Some(ref path) = cli.preset {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading preset {}: {e}", path.display()))?;
        params.merge(&lumen_pipeline::preset::parse_xmp(&text));
    }

    if let Some(ref json) = cli.params_json {
        let parsed: ParameterSet = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --params-json: {e}"))?;
        params.merge(&parsed);
    }

    let pairs = cli
        .set
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| format!("--set expects KEY=VALUE, got `{pair}`"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    params.merge(&ParameterSet::from_text_pairs(pairs));

    Ok(params)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let outputs = match output_paths(&cli.output, &cli.sources) {
        Ok(outputs) => outputs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        eprintln!("Error creating {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    let editor = match Editor::new(config, FileDecoder::new()) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {:#?}", editor.config());
    eprintln!("Parameters: {}", render_params(&params));
    eprintln!("Sources: {}  Runs: {}", cli.sources.len(), cli.runs);
    eprintln!();

    let results: Vec<(&PathBuf, Result<Vec<PipelineDiagnostics>, String>)> = cli
        .sources
        .par_iter()
        .zip(outputs.par_iter())
        .map(|(source, out_path)| {
            (source, render_source(&editor, source, out_path, &params, &cli))
        })
        .collect();

    let mut failed = false;
    for (source, result) in results {
        match result {
            Ok(all_diagnostics) => {
                println!("== {} ==", source.display());
                for diagnostics in &all_diagnostics {
                    if cli.json {
                        match serde_json::to_string_pretty(diagnostics) {
                            Ok(json) => println!("{json}"),
                            Err(e) => {
                                eprintln!("Error serializing diagnostics: {e}");
                                failed = true;
                            }
                        }
                    } else {
                        println!("{}", diagnostics.report());
                    }
                }
                if all_diagnostics.len() > 1 {
                    print_multi_run_summary(&all_diagnostics);
                }
                println!();
            }
            Err(msg) => {
                tracing::error!(source = %source.display(), error = %msg, "adjustment failed");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Render one source `cli.runs` times, writing the first result to disk.
fn render_source(
    editor: &Editor<FileDecoder>,
    source: &Path,
    out_path: &Path,
    params: &ParameterSet,
    cli: &Cli,
) -> Result<Vec<PipelineDiagnostics>, String> {
    let source_id = source
        .to_str()
        .ok_or_else(|| "source path is not valid UTF-8".to_string())?;

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    for run in 0..cli.runs {
        let (image, diagnostics) = editor
            .adjust_with_diagnostics(source_id, params, &StdClock)
            .map_err(|e| e.to_string())?;

        tracing::debug!(
            source = source_id,
            run,
            total_ms = duration_ms(diagnostics.total_duration),
            "rendered"
        );

        if run == 0 {
            write_jpeg(out_path, &image, cli.quality)
                .map_err(|e| format!("Error writing {}: {e}", out_path.display()))?;
            eprintln!(
                "{} -> {} ({}x{})",
                source.display(),
                out_path.display(),
                image.width(),
                image.height(),
            );
        }

        all_diagnostics.push(diagnostics);
    }
    Ok(all_diagnostics)
}

/// Output path for every source, in order.
///
/// Sources whose stems collide (`a/IMG.jpg` and `b/IMG.jpg`, or `x.jpg`
/// and `x.png`) would overwrite each other's preview, so they are
/// rejected before any work starts.
fn output_paths(dir: &Path, sources: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::with_capacity(sources.len());
    for source in sources {
        let out = output_path(dir, source);
        if let Some(previous) = claimed.insert(out.clone(), source) {
            return Err(format!(
                "{} and {} would both write {}",
                previous.display(),
                source.display(),
                out.display()
            ));
        }
        outputs.push(out);
    }
    Ok(outputs)
}

/// `<dir>/<stem>-adjusted.jpg`.
fn output_path(dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    dir.join(format!("{stem}-adjusted.jpg"))
}

fn write_jpeg(path: &Path, image: &RgbImage, quality: u8) -> Result<(), image::ImageError> {
    let file = std::fs::File::create(path)?;
    encode_jpeg(file, image, quality)
}

/// Encode through a buffer and flush it, so a failed final write is
/// reported instead of lost on drop.
fn encode_jpeg<W: Write>(sink: W, image: &RgbImage, quality: u8) -> Result<(), image::ImageError> {
    let mut writer = std::io::BufWriter::new(sink);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(image)?;
    writer.flush().map_err(image::ImageError::IoError)
}

/// Compact `key=value` listing of explicitly set parameters.
fn render_params(params: &ParameterSet) -> String {
    if params.is_empty() {
        return "(defaults)".to_string();
    }
    params
        .iter()
        .map(|(p, v)| format!("{p}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in Stage::ORDER {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(stage))
            .filter(|s| !s.skipped)
            .map(|s| duration_ms(s.duration))
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lumen_pipeline::Parameter;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lumen").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_editor_config() {
        let cli = cli(&["a.jpg"]);
        assert_eq!(config_from_cli(&cli).unwrap(), EditorConfig::default());
        assert_eq!(cli.quality, 85);
        assert_eq!(cli.runs, 1);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = cli(&[
            "--max-dimension",
            "100",
            "--config-json",
            r#"{"max_dimension": 640, "cache_capacity": 0}"#,
            "a.jpg",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.max_dimension, 640);
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.downscale_filter, DownscaleFilter::Lanczos3);
    }

    #[test]
    fn set_flags_override_json() {
        let cli = cli(&[
            "--params-json",
            r#"{"exposure": 1, "contrast": 10}"#,
            "--set",
            "exposure=+0.5",
            "--set",
            "lum_aqua=-20",
            "a.jpg",
        ]);
        let params = params_from_cli(&cli).unwrap();
        assert!((params.get(Parameter::Exposure) - 0.5).abs() < f32::EPSILON);
        assert!((params.get(Parameter::Contrast) - 10.0).abs() < f32::EPSILON);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn malformed_set_is_an_error() {
        let cli = cli(&["--set", "exposure", "a.jpg"]);
        assert!(params_from_cli(&cli).is_err());
    }

    #[test]
    fn sources_are_required() {
        assert!(Cli::try_parse_from(["lumen"]).is_err());
    }

    #[test]
    fn output_name_uses_source_stem() {
        let path = output_path(Path::new("out"), Path::new("/photos/IMG_0042.CR2"));
        assert_eq!(path, Path::new("out/IMG_0042-adjusted.jpg"));
    }

    #[test]
    fn colliding_stems_are_rejected() {
        let sources = [PathBuf::from("a/IMG.jpg"), PathBuf::from("b/IMG.jpg")];
        assert!(output_paths(Path::new("out"), &sources).is_err());

        let sources = [PathBuf::from("x.jpg"), PathBuf::from("x.png")];
        assert!(output_paths(Path::new("out"), &sources).is_err());

        let sources = [PathBuf::from("x.jpg"), PathBuf::from("y.jpg")];
        let outputs = output_paths(Path::new("out"), &sources).unwrap();
        assert_eq!(outputs[1], Path::new("out/y-adjusted.jpg"));
    }

    /// A sink whose every write fails.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_final_write_is_reported() {
        // Small enough to sit entirely in the write buffer until flush.
        let image = RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
        assert!(encode_jpeg(FullDisk, &image, 85).is_err());

        let mut bytes = Vec::new();
        encode_jpeg(&mut bytes, &image, 85).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn quality_is_bounded() {
        assert!(Cli::try_parse_from(["lumen", "--quality", "0", "a.jpg"]).is_err());
        assert!(Cli::try_parse_from(["lumen", "--quality", "101", "a.jpg"]).is_err());
    }
}
