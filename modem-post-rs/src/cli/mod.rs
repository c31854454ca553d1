//! Command-line interface for the ModEM post-processing tools.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::projection::Crs;
use crate::ToolsConfig;

#[derive(Parser)]
#[command(name = "modem-post")]
#[command(about = "Post-processing tools for ModEM inversions and 3DGrid meshes", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move a UBC mesh origin to the south-west corner of the station layout
    FixMesh {
        /// UBC mesh written by 3DGrid
        mesh: PathBuf,
        /// ModEM data file providing station locations
        data_file: PathBuf,
        /// Output mesh path (defaults to rewriting the input mesh)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Projected CRS, e.g. EPSG:28355
        #[arg(long)]
        crs: Option<String>,
        /// Elevation of the mesh top
        #[arg(long, allow_hyphen_values = true)]
        top: Option<f64>,
    },

    /// Extract RMS per iteration from a ModEM inversion log
    RmsLog {
        /// ModEM inversion log file
        log_file: PathBuf,
        /// Output CSV path (defaults to <log>_RMS_vs_iter.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Plot title
        #[arg(long)]
        title: Option<String>,
        /// Skip the PNG plot
        #[arg(long)]
        no_plot: bool,
    },

    /// Cut a model point cloud into depth slices and export GeoTIFFs
    Slices {
        /// Point cloud file with x y z value columns
        input: PathBuf,
        /// Output directory (defaults to geotiff_slices next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Padding cells removed from each side in the east direction
        #[arg(long)]
        east_pad: Option<usize>,
        /// Padding cells removed from each side in the north direction
        #[arg(long)]
        north_pad: Option<usize>,
        /// Model top added to every depth
        #[arg(long, allow_hyphen_values = true)]
        model_top: Option<f64>,
        /// ModEM data file used to shift model coordinates to the projected CRS
        #[arg(long)]
        origin_data: Option<PathBuf>,
        /// Write CSV grids only, without calling gdal_translate
        #[arg(long)]
        csv_only: bool,
        /// Keep CSV and ASCII grid files next to the GeoTIFFs
        #[arg(long)]
        keep_intermediate: bool,
        /// Projected CRS, e.g. EPSG:28355
        #[arg(long)]
        crs: Option<String>,
    },

    /// Compute per-station and per-component RMS from a ModEM response file
    StationRms {
        /// ModEM response (.res) file
        response_file: PathBuf,
        /// Output CSV path (defaults to <response>_RMS.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Projected CRS, e.g. EPSG:28355
        #[arg(long)]
        crs: Option<String>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination of the config file
        #[arg(default_value = "modem-post.yaml")]
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Resolve the CRS from a CLI override or the config, exiting on bad input.
fn resolve_crs(cli_crs: Option<&str>, config: &ToolsConfig) -> Crs {
    let identifier = cli_crs.unwrap_or(&config.projection.crs);
    match identifier.parse::<Crs>() {
        Ok(crs) => crs,
        Err(e) => {
            error!("Invalid CRS '{}': {}", identifier, e);
            std::process::exit(1);
        }
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match ToolsConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                ToolsConfig::default()
            }
        },
        None => ToolsConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::FixMesh { mesh, data_file, output, crs, top } => {
            cmd_fix_mesh(&mesh, &data_file, output, crs.as_deref(), top, &config);
        }
        Commands::RmsLog { log_file, output, title, no_plot } => {
            cmd_rms_log(&log_file, output, title, no_plot, &config);
        }
        Commands::Slices {
            input,
            output_dir,
            east_pad,
            north_pad,
            model_top,
            origin_data,
            csv_only,
            keep_intermediate,
            crs,
        } => {
            let mut slice_config = config.slices.clone();
            slice_config.east_padding = east_pad.unwrap_or(slice_config.east_padding);
            slice_config.north_padding = north_pad.unwrap_or(slice_config.north_padding);
            slice_config.model_top = model_top.unwrap_or(slice_config.model_top);
            slice_config.raster &= !csv_only;
            slice_config.keep_intermediate |= keep_intermediate;

            let crs = resolve_crs(crs.as_deref(), &config);
            cmd_slices(&input, output_dir, origin_data.as_deref(), &slice_config, &crs);
        }
        Commands::StationRms { response_file, output, crs } => {
            let crs = resolve_crs(crs.as_deref(), &config);
            cmd_station_rms(&response_file, output, &crs);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path, &config);
        }
    }
}

fn cmd_fix_mesh(
    mesh: &Path,
    data_file: &Path,
    output: Option<PathBuf>,
    crs: Option<&str>,
    top: Option<f64>,
    config: &ToolsConfig,
) {
    use crate::processors::mesh_fix;

    let start = Instant::now();
    let crs = resolve_crs(crs, config);
    let top_elevation = top.unwrap_or(config.mesh.top_elevation);
    let output_path = output.unwrap_or_else(|| mesh.to_path_buf());

    println!("Relocating mesh origin...");
    println!("Mesh: {}", mesh.display());
    println!("Data file: {}", data_file.display());
    println!("CRS: {} ({})", crs.label(), crs);

    let spinner = create_spinner("Projecting station centre...");

    match mesh_fix::fix_mesh_file(mesh, data_file, &output_path, &crs, top_elevation) {
        Ok(fix) => {
            spinner.finish_and_clear();

            print_summary(
                "Mesh Fix Complete",
                &[
                    ("Output mesh", output_path.display().to_string()),
                    ("Centre (lon, lat)", format!("{:.6}, {:.6}", fix.centre_geo.1, fix.centre_geo.0)),
                    (
                        "Centre (E, N)",
                        format!("{:.2}, {:.2}", fix.centre_projected.0, fix.centre_projected.1),
                    ),
                    ("SW corner (E, N)", format!("{:.2}, {:.2}", fix.south_west.0, fix.south_west.1)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Mesh fix failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_rms_log(
    log_file: &Path,
    output: Option<PathBuf>,
    title: Option<String>,
    no_plot: bool,
    config: &ToolsConfig,
) {
    use crate::processors::rms_log;

    let start = Instant::now();

    let mut rms_config = config.rms_log.clone();
    if let Some(title) = title {
        rms_config.title = title;
    }
    rms_config.plot &= !no_plot;

    let csv_path = output.unwrap_or_else(|| rms_log::derived_path(log_file, "_RMS_vs_iter.csv"));
    let plot_path = rms_config.plot.then(|| csv_path.with_extension("png"));

    let spinner = create_spinner("Reading inversion log...");

    match rms_log::process_log(log_file, &csv_path, plot_path.as_deref(), &rms_config) {
        Ok(values) => {
            spinner.finish_and_clear();

            let first = values.first().copied().unwrap_or_default();
            let last = values.last().copied().unwrap_or_default();

            print_summary(
                "RMS Extraction Complete",
                &[
                    ("Log file", log_file.display().to_string()),
                    ("Output CSV", csv_path.display().to_string()),
                    (
                        "Output PNG",
                        plot_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "skipped".to_string()),
                    ),
                    ("Iterations", values.len().saturating_sub(1).to_string()),
                    ("Starting RMS", format!("{:.4}", first)),
                    ("Final RMS", format!("{:.4}", last)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("RMS extraction failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_slices(
    input: &Path,
    output_dir: Option<PathBuf>,
    origin_data: Option<&Path>,
    config: &crate::SliceConfig,
    crs: &Crs,
) {
    use crate::processors::export;

    let start = Instant::now();
    let output_dir = output_dir.unwrap_or_else(|| export::default_output_dir(input));

    println!("Exporting depth slices...");
    println!("Input: {}", input.display());
    println!("Output directory: {}", output_dir.display());
    println!("Padding (E, N): {}, {}", config.east_padding, config.north_padding);
    println!("CRS: {} ({})", crs.label(), crs);

    let spinner = create_spinner("Slicing model...");

    let report = match export::process_slices(input, &output_dir, config, crs, origin_data) {
        Ok(report) => {
            spinner.finish_and_clear();
            report
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Slice export failed: {:#}", e);
            std::process::exit(1);
        }
    };

    print_summary(
        "Slice Export Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Slices", report.outcomes.len().to_string()),
            ("GeoTIFFs written", report.exported().to_string()),
            ("Empty slices", report.empty().to_string()),
            ("Failed slices", report.failed().to_string()),
            ("Overwritten names", report.reused_stems.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if report.failed() > 0 {
        error!("{} of {} slices failed", report.failed(), report.outcomes.len());
        std::process::exit(1);
    }
}

fn cmd_station_rms(response_file: &Path, output: Option<PathBuf>, crs: &Crs) {
    use crate::processors::station_rms;

    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| station_rms::default_output_path(response_file));

    let spinner = create_spinner("Computing station RMS...");

    match station_rms::process_response_file(response_file, &output_path, crs) {
        Ok(report) => {
            spinner.finish_and_clear();

            print_summary(
                "Station RMS Complete",
                &[
                    ("Response file", response_file.display().to_string()),
                    ("Output CSV", output_path.display().to_string()),
                    ("Stations", report.stations.len().to_string()),
                    ("Components", report.components.join(", ")),
                    ("Global RMS", format!("{:.4}", report.global_rms)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Station RMS failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(path: &Path, config: &ToolsConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_slices_overrides() {
        let cli = Cli::try_parse_from([
            "modem-post",
            "-vv",
            "slices",
            "model.txt",
            "--east-pad",
            "4",
            "--model-top",
            "-250",
            "--csv-only",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Slices { input, east_pad, north_pad, model_top, csv_only, .. } => {
                assert_eq!(input, PathBuf::from("model.txt"));
                assert_eq!(east_pad, Some(4));
                assert_eq!(north_pad, None);
                assert_eq!(model_top, Some(-250.0));
                assert!(csv_only);
            }
            _ => panic!("expected slices subcommand"),
        }
    }

    #[test]
    fn test_resolve_crs_prefers_cli() {
        let config = ToolsConfig::default();
        assert_eq!(resolve_crs(Some("EPSG:32754"), &config).epsg(), 32754);
        assert_eq!(resolve_crs(None, &config).epsg(), 28355);
    }
}
