//! labelkit-render: draw an annotation file over an image and save a PNG.
//!
//! Usage: `labelkit-render <image> <annotations.json> <out.png>
//! [--config path] [--size WxH] [--select ID]`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use labelkit::config::{CanvasConfig, ConfigError};
use labelkit::model::{Annotation, AnnotationId, ImageInfo};
use labelkit::viewport::Size;
use labelkit::AnnotationCanvas;
use labelkit_render::{PixmapSurface, RenderError};

const USAGE: &str =
    "Usage: labelkit-render <image> <annotations.json> <out.png> [--config path] [--size WxH] [--select ID]";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to read annotations: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid annotation file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

struct Args {
    image: PathBuf,
    annotations: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    size: Option<(u32, u32)>,
    select: Option<AnnotationId>,
}

impl Args {
    fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut positional = Vec::new();
        let mut config = None;
        let mut size = None;
        let mut select = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(flag_value(&mut iter, "--config")?)),
                "--size" => size = Some(parse_size(flag_value(&mut iter, "--size")?)?),
                "--select" => {
                    let value = flag_value(&mut iter, "--select")?;
                    let id = value
                        .parse()
                        .map_err(|_| CliError::Usage(format!("Invalid annotation id '{}'", value)))?;
                    select = Some(id);
                }
                other if other.starts_with("--") => {
                    return Err(CliError::Usage(format!("Unknown option '{}'", other)));
                }
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let [image, annotations, output]: [PathBuf; 3] = positional
            .try_into()
            .map_err(|_| CliError::Usage("Expected three paths".to_string()))?;

        Ok(Self {
            image,
            annotations,
            output,
            config,
            size,
            select,
        })
    }
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, CliError> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| CliError::Usage(format!("{} needs a value", flag)))
}

fn parse_size(value: &str) -> Result<(u32, u32), CliError> {
    let invalid = || CliError::Usage(format!("Invalid size '{}', expected WxH", value));
    let (w, h) = value.split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.parse().map_err(|_| invalid())?;
    let h = h.parse().map_err(|_| invalid())?;
    Ok((w, h))
}

fn load_config(path: Option<&Path>) -> Result<CanvasConfig, CliError> {
    match path {
        Some(path) => Ok(CanvasConfig::load(path)?),
        None => Ok(CanvasConfig::load_or_default()),
    }
}

fn run(args: Args, config: CanvasConfig) -> Result<(), CliError> {
    let image = image::open(&args.image)?.to_rgba8();
    let annotations: Vec<Annotation> =
        serde_json::from_str(&std::fs::read_to_string(&args.annotations)?)?;
    log::info!(
        "Rendering {} annotations over {:?} ({}x{})",
        annotations.len(),
        args.image,
        image.width(),
        image.height()
    );

    let (width, height) = args.size.unwrap_or(image.dimensions());
    let mut canvas = AnnotationCanvas::new(config);
    canvas.resize(Size::new(width as f32, height as f32));
    let id = args
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    canvas.set_image(ImageInfo::new(id, image.width(), image.height()));

    let mut surface = PixmapSurface::new(width, height)?;
    let stats = canvas.render(&mut surface, Some(&image), &annotations, args.select);
    if stats.skipped > 0 {
        log::warn!("{} annotations had malformed geometry and were skipped", stats.skipped);
    }

    surface.save_png(&args.output)?;
    log::info!("Wrote {:?}", args.output);
    Ok(())
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let result = Args::parse(&raw).and_then(|args| {
        let config = load_config(args.config.as_deref())?;
        env_logger::Builder::new()
            .filter_level(config.log_level.to_level_filter())
            .parse_default_env()
            .init();
        run(args, config)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let CliError::Usage(_) = e {
                eprintln!("{}", USAGE);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::parse(&strings(&[
            "photo.jpg",
            "--size",
            "800x600",
            "anns.json",
            "out.png",
            "--select",
            "42",
        ]))
        .unwrap();
        assert_eq!(args.image, PathBuf::from("photo.jpg"));
        assert_eq!(args.annotations, PathBuf::from("anns.json"));
        assert_eq!(args.output, PathBuf::from("out.png"));
        assert_eq!(args.size, Some((800, 600)));
        assert_eq!(args.select, Some(42));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Args::parse(&strings(&["a.png", "b.json"])).is_err());
        assert!(Args::parse(&strings(&["a", "b", "c", "--size", "800"])).is_err());
        assert!(Args::parse(&strings(&["a", "b", "c", "--select"])).is_err());
        assert!(Args::parse(&strings(&["a", "b", "c", "--verbose"])).is_err());
    }
}
