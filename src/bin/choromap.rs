use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "choromap",
    version,
    about = "Render an animated choropleth GIF from a boundary shapefile and a daily case table"
)]
struct Cli {
    /// Job description JSON; all other flags are ignored when set.
    #[arg(long)]
    job: Option<PathBuf>,

    /// Boundary shapefile.
    #[arg(long, default_value = "cb_2018_us_state_500k.shp")]
    boundaries: PathBuf,

    /// dBase attribute holding the region name.
    #[arg(long, default_value = "NAME")]
    name_field: String,

    /// Delimited-text case table.
    #[arg(long, default_value = "data-daily.csv")]
    cases: PathBuf,

    /// Case table column holding the region name.
    #[arg(long, default_value = "state")]
    key_column: String,

    /// Font file for title and legend text.
    #[arg(long, default_value = "DejaVuSans.ttf")]
    font: PathBuf,

    /// Output GIF path.
    #[arg(long, default_value = "us-cases-daily.gif")]
    out: PathBuf,

    /// Region name excluded after the join (repeatable). Defaults to the
    /// three non-state territories the source pipeline removed.
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Skip the antimeridian trim.
    #[arg(long, default_value_t = false)]
    no_trim: bool,

    /// Region whose geometry is trimmed to the window below.
    #[arg(long, default_value = "Alaska")]
    trim_region: String,

    /// Trim window as min_lon,min_lat,max_lon,max_lat.
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 4,
        allow_hyphen_values = true,
        default_values_t = [-180.0, 50.0, -100.0, 75.0]
    )]
    trim_window: Vec<f64>,

    /// Canvas width in pixels.
    #[arg(long, default_value_t = 1000)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Title text placed before the formatted date.
    #[arg(long)]
    title: Option<String>,

    /// Per-frame delay in milliseconds.
    #[arg(long, default_value_t = 300)]
    frame_delay_ms: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let job = match &cli.job {
        Some(path) => choromap::ChoroplethJob::from_path(path)
            .with_context(|| format!("load job '{}'", path.display()))?,
        None => job_from_flags(&cli),
    };

    let frames = choromap::run_job(&job)?;
    eprintln!("wrote {} ({frames} frames)", job.out.display());
    Ok(())
}

fn job_from_flags(cli: &Cli) -> choromap::ChoroplethJob {
    let mut job = choromap::ChoroplethJob::default();
    job.boundaries = cli.boundaries.clone();
    job.name_field = cli.name_field.clone();
    job.cases = cli.cases.clone();
    job.key_column = cli.key_column.clone();
    job.font = cli.font.clone();
    job.out = cli.out.clone();
    job.style.canvas = choromap::Canvas {
        width: cli.width,
        height: cli.height,
    };
    job.opts.frame_delay_ms = cli.frame_delay_ms;

    if !cli.exclude.is_empty() {
        job.exclude = cli.exclude.clone();
    }
    if cli.no_trim {
        job.region_override = None;
    } else {
        job.region_override = Some(choromap::RegionOverride::new(
            cli.trim_region.clone(),
            geo_types::Rect::new(
                geo_types::Coord {
                    x: cli.trim_window[0],
                    y: cli.trim_window[1],
                },
                geo_types::Coord {
                    x: cli.trim_window[2],
                    y: cli.trim_window[3],
                },
            ),
        ));
    }
    if let Some(title) = &cli.title {
        job.style.title_prefix = title.clone();
    }

    job
}
