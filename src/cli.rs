use crate::config::{Config, load_config};
use crate::render::{render_svg, write_output_svg};
use crate::scene::{SceneRun, parse_scene, run_scene};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "mkcl",
    version,
    about = "Replay a map scene through marker clustering and spiderfying"
)]
pub struct Args {
    /// Scene file (.json/.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file with cluster, spiderfier and render sections
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Override the clustering grid size in pixels
    #[arg(short = 'g', long = "gridSize")]
    pub grid_size: Option<f64>,

    /// Override the zoom at which clusters split into members
    #[arg(short = 'z', long = "maxZoom")]
    pub max_zoom: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(grid_size) = args.grid_size {
        config.cluster.grid_size = grid_size;
    }
    if let Some(max_zoom) = args.max_zoom {
        config.cluster.max_zoom = max_zoom;
    }

    let input = read_input(args.input.as_deref())?;
    let scene = parse_scene(&input)?;
    let run = run_scene(&scene, &config)?;
    let (width, height) = run.map.size();
    config.render.width = width as f32;
    config.render.height = height as f32;

    match args.output_format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&run.summary())?;
            match args.output.as_deref() {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        OutputFormat::Svg => {
            let svg = snapshot(&run, &config);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = snapshot(&run, &config);
            write_png(&svg, &output, &config.render)?;
        }
    }

    Ok(())
}

fn snapshot(run: &SceneRun, config: &Config) -> String {
    render_svg(&run.map, run.engine.clusters(), run.spiderfier.fanned(), &config.render)
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, render: &crate::config::RenderConfig) -> Result<()> {
    crate::render::write_output_png(svg, output, render)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _render: &crate::config::RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
