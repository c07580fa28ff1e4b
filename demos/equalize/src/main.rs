use argh::FromArgs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lumeq::image::Image;
use lumeq::imgproc::{
    clip::ClipFactor,
    equalize::{equalize_histogram_new, EqualizeParams},
    histogram::{compute_histogram, Histogram},
    lut::LookupTable,
    parallel::ExecutionStrategy,
};
use lumeq::io::{functional as F, png as P};

#[derive(FromArgs)]
/// Equalize the histogram of a grayscale image.
struct Args {
    /// path to the input image
    #[argh(option, short = 'i')]
    input: PathBuf,

    /// path to the output image
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// clip factor, values below 1.0 disable clipping
    #[argh(option, short = 's', default = "0.0")]
    clip_factor: f64,

    /// execution strategy: serial, parallel, rows or fixed:N
    #[argh(option, default = "StrategyArg::Parallel", from_str_fn(parse_strategy))]
    strategy: StrategyArg,

    /// write the histogram and lookup table to this json file
    #[argh(option)]
    lut_json: Option<PathBuf>,

    /// convert color inputs to luma instead of rejecting them
    #[argh(switch)]
    gray: bool,
}

/// The strategy as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StrategyArg {
    Serial,
    Parallel,
    Rows,
    Fixed(usize),
}

impl StrategyArg {
    /// Pick the execution strategy for an image `width` pixels wide.
    fn resolve(self, width: usize) -> ExecutionStrategy {
        match self {
            StrategyArg::Serial => ExecutionStrategy::Serial,
            StrategyArg::Parallel => ExecutionStrategy::ParallelElements,
            StrategyArg::Rows => ExecutionStrategy::AutoRows(width.max(1)),
            StrategyArg::Fixed(n) => ExecutionStrategy::Fixed(n),
        }
    }
}

fn parse_strategy(value: &str) -> Result<StrategyArg, String> {
    match value {
        "serial" => Ok(StrategyArg::Serial),
        "parallel" => Ok(StrategyArg::Parallel),
        "rows" => Ok(StrategyArg::Rows),
        other => match other.strip_prefix("fixed:") {
            Some(n) => match n.parse() {
                Ok(0) => Err("thread count must be > 0".to_string()),
                Ok(n) => Ok(StrategyArg::Fixed(n)),
                Err(e) => Err(format!("invalid thread count '{n}': {e}")),
            },
            None => Err(format!("unknown strategy '{other}'")),
        },
    }
}

#[derive(serde::Serialize)]
struct Report<'a> {
    clip_factor: ClipFactor,
    histogram: &'a Histogram,
    lut: &'a LookupTable,
}

fn is_png(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "png")
}

fn read_input(path: &Path, gray: bool) -> Result<Image<u8, 1>, lumeq::io::IoError> {
    if gray {
        F::read_image_any_luma8(path)
    } else if is_png(path) {
        P::read_image_png_mono8(path)
    } else {
        F::read_image_any_mono8(path)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let image = read_input(&args.input, args.gray)?;
    log::info!("read {} from {}", image.size(), args.input.display());

    let strategy = args.strategy.resolve(image.cols());
    let params = EqualizeParams::default()
        .with_clip_factor(ClipFactor::new(args.clip_factor)?)
        .with_strategy(strategy);

    let start = Instant::now();
    let (equalized, lut) = equalize_histogram_new(&image, &params)?;
    log::info!(
        "equalized with s={} in {:?}, lut spans [{}, {}]",
        params.clip_factor,
        start.elapsed(),
        lut[0],
        lut[255]
    );

    if is_png(&args.output) {
        P::write_image_png_mono8(&args.output, &equalized)?;
    } else {
        F::write_image_any_mono8(&args.output, &equalized)?;
    }
    log::info!("wrote {}", args.output.display());

    if let Some(path) = args.lut_json {
        let histogram = compute_histogram(&image, params.strategy)?;
        let report = Report {
            clip_factor: params.clip_factor,
            histogram: &histogram,
            lut: &lut,
        };
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        log::info!("wrote lookup table to {}", path.display());
    }

    Ok(())
}
