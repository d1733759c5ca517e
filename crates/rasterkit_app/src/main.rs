//! Rasterkit - PNG and PPM conversion from the command line.
//!
//! Decodes PNG or binary PPM files into raw rasters and writes them back out
//! as 8- or 16-bit PPM.

mod batch;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use batch::BatchConfig;
use rasterkit_core::options::DEFAULT_GAMMA;
use rasterkit_core::{
    export_image_with, import_image_with, DecodeOptions, EncodeOptions, ImageFormat,
};
use report::ImageReport;

const SNIFF_LEN: u64 = 8;

#[derive(Parser, Debug)]
#[command(name = "rasterkit")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a file and print its dimensions and pixel digest
    Info {
        file: PathBuf,

        #[arg(short, long)]
        format: Option<ImageFormat>,

        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Convert a single image
    Convert {
        input: PathBuf,

        output: PathBuf,

        #[arg(long)]
        from: Option<ImageFormat>,

        #[arg(long)]
        to: Option<ImageFormat>,

        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Convert every image of a directory to PPM
    Batch {
        input_dir: PathBuf,

        output_dir: PathBuf,

        #[arg(long)]
        from: Option<ImageFormat>,

        /// Worker threads, defaults to the number of CPUs
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        codec: CodecArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct CodecArgs {
    /// Keep rows top-to-bottom instead of flipping them
    #[arg(long, default_value_t = false)]
    no_flip: bool,

    /// Keep palette indices instead of expanding them to RGB
    #[arg(long, default_value_t = false)]
    keep_palette: bool,

    #[arg(long, default_value_t = false)]
    verify_crc: bool,

    #[arg(long, default_value_t = DEFAULT_GAMMA)]
    gamma: f32,

    /// Output sample depth for PPM export
    #[arg(long, default_value_t = 16, value_parser = parse_depth)]
    depth: u8,
}

impl CodecArgs {
    fn decode_options(&self) -> DecodeOptions {
        let mut options = DecodeOptions::new()
            .with_gamma(self.gamma)
            .with_crc_check(self.verify_crc);
        if self.no_flip {
            options = options.without_flip();
        }
        if self.keep_palette {
            options = options.without_palette_expansion();
        }
        options
    }

    fn encode_options(&self) -> EncodeOptions {
        let max_value = if self.depth == 8 { 255 } else { u16::MAX };
        let mut options = EncodeOptions::new()
            .with_gamma(self.gamma)
            .with_max_value(max_value);
        if self.no_flip {
            options = options.without_flip();
        }
        options
    }
}

fn parse_depth(s: &str) -> std::result::Result<u8, String> {
    match s.parse::<u8>() {
        Ok(depth @ (8 | 16)) => Ok(depth),
        _ => Err(format!("depth must be 8 or 16, got {s}")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Info {
            file,
            format,
            json,
            codec,
        } => run_info(&file, format, json, &codec),
        Command::Convert {
            input,
            output,
            from,
            to,
            codec,
        } => run_convert(&input, &output, from, to, &codec),
        Command::Batch {
            input_dir,
            output_dir,
            from,
            jobs,
            codec,
        } => {
            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })
            .context("Failed to set Ctrl+C handler")?;

            let config = BatchConfig {
                from,
                to: ImageFormat::Ppm,
                workers: jobs.unwrap_or_else(num_cpus::get),
                decode: codec.decode_options(),
                encode: codec.encode_options(),
            };
            let summary = batch::run_batch(&input_dir, &output_dir, config, running)?;
            if !summary.failed.is_empty() {
                anyhow::bail!("{} file(s) failed to convert", summary.failed.len());
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Picks the input format from an explicit flag, then the file's magic bytes,
/// then its extension.
fn detect_format(path: &Path, explicit: Option<ImageFormat>) -> Result<ImageFormat> {
    if let Some(format) = explicit {
        return Ok(format);
    }
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    ImageFormat::sniff(&head)
        .or_else(|| ImageFormat::from_path(path))
        .with_context(|| format!("Cannot tell the format of {}", path.display()))
}

fn run_info(file: &Path, format: Option<ImageFormat>, json: bool, codec: &CodecArgs) -> Result<()> {
    let format = detect_format(file, format)?;
    let options = codec.decode_options();
    let image = import_image_with(file, format, &options)
        .with_context(|| format!("Failed to decode {}", file.display()))?;

    let report = ImageReport::new(file, format, &image, &options);
    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print_human();
    }
    Ok(())
}

fn run_convert(
    input: &Path,
    output: &Path,
    from: Option<ImageFormat>,
    to: Option<ImageFormat>,
    codec: &CodecArgs,
) -> Result<()> {
    let from = detect_format(input, from)?;
    let to = to
        .or_else(|| ImageFormat::from_path(output))
        .unwrap_or(ImageFormat::Ppm);

    let image = import_image_with(input, from, &codec.decode_options())
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    export_image_with(&image, to, output, &codec.encode_options())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "[Convert] {} ({}) -> {} ({}), {}x{}",
        input.display(),
        from,
        output.display(),
        to,
        image.width(),
        image.height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_codec_args_defaults() {
        let args = Args::parse_from(["rasterkit", "info", "a.png"]);
        let Command::Info { codec, format, .. } = args.command else {
            panic!("expected info");
        };
        assert_eq!(format, None);
        assert_eq!(codec.decode_options(), DecodeOptions::default());
        assert_eq!(codec.encode_options(), EncodeOptions::default());
    }

    #[test]
    fn test_codec_args_flags() {
        let args = Args::parse_from([
            "rasterkit",
            "convert",
            "in.png",
            "out.ppm",
            "--no-flip",
            "--verify-crc",
            "--depth",
            "8",
            "--gamma",
            "1.0",
        ]);
        let Command::Convert { codec, .. } = args.command else {
            panic!("expected convert");
        };
        let decode = codec.decode_options();
        assert!(!decode.flip_vertically);
        assert!(decode.verify_crc);
        assert_eq!(decode.gamma, 1.0);
        let encode = codec.encode_options();
        assert_eq!(encode.max_value, 255);
        assert!(!encode.flip_vertically);
    }

    #[test]
    fn test_depth_rejects_other_values() {
        assert!(Args::try_parse_from(["rasterkit", "info", "a.png", "--depth", "12"]).is_err());
        assert_eq!(parse_depth("16"), Ok(16));
    }

    #[test]
    fn test_format_flag_parses() {
        let args = Args::parse_from(["rasterkit", "info", "blob", "--format", "ppm"]);
        let Command::Info { format, .. } = args.command else {
            panic!("expected info");
        };
        assert_eq!(format, Some(ImageFormat::Ppm));
    }

    #[test]
    fn test_detect_format_prefers_magic_over_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mislabeled.png");
        std::fs::write(&path, b"P6\n1 1\n255\n\x01\x02\x03").unwrap();
        assert_eq!(detect_format(&path, None).unwrap(), ImageFormat::Ppm);
        assert_eq!(
            detect_format(&path, Some(ImageFormat::Png)).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_convert_ppm_to_ppm() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.ppm");
        std::fs::write(&input, b"P6\n1 1\n255\n\x01\x02\x03").unwrap();
        let output = dir.path().join("out.ppm");

        let args = Args::parse_from(["rasterkit", "convert", "x", "y", "--depth", "8"]);
        let Command::Convert { codec, .. } = args.command else {
            panic!("expected convert");
        };
        run_convert(&input, &output, None, None, &codec).unwrap();

        let written = std::fs::read(&output).unwrap();
        assert!(written.starts_with(b"P6\n1 1\n255\n"));
        assert_eq!(written.len(), 11 + 3);
    }
}
