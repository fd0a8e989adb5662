use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    boundary::load_regions,
    encode_gif::{GifAnimator, default_gif_config},
    error::{ChoromapError, ChoromapResult},
    join::{FrameTable, default_territory_exclusions, join_regions},
    render::{ChoroplethRenderer, FrameRgba},
    style::MapStyle,
    table::load_metric_table,
    trim::{RegionOverride, apply_override},
};

/// Options for [`render_to_gif`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderToGifOpts {
    /// Background color frames are flattened over (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Per-frame delay in milliseconds.
    pub frame_delay_ms: u32,
    /// Whether to overwrite the output file if it already exists.
    pub overwrite: bool,
}

impl Default for RenderToGifOpts {
    fn default() -> Self {
        Self {
            bg_rgba: [255, 255, 255, 255],
            frame_delay_ms: 300,
            overwrite: true,
        }
    }
}

/// Render every date column of `table` and encode the sequence as one
/// looping GIF. Returns the number of frames written.
///
/// Frames are rendered strictly in column order and the whole sequence is
/// held in memory until the single final encode; with a year of daily
/// columns this, not the per-frame rasterization, is the peak memory cost.
#[tracing::instrument(skip(table, style, font_bytes), fields(columns = table.columns.len()))]
pub fn render_to_gif(
    table: &FrameTable,
    style: &MapStyle,
    font_bytes: Vec<u8>,
    out_path: &Path,
    opts: &RenderToGifOpts,
) -> ChoromapResult<u64> {
    if table.columns.is_empty() {
        return Err(ChoromapError::validation(
            "frame table has no date columns to render",
        ));
    }

    let frames = render_frames(table, style, font_bytes)?;

    let mut cfg = default_gif_config(out_path, style.canvas.width, style.canvas.height);
    cfg.frame_delay_ms = opts.frame_delay_ms;
    cfg.overwrite = opts.overwrite;

    let mut animator = GifAnimator::new(cfg, opts.bg_rgba)?;
    for frame in &frames {
        animator.encode_frame(frame)?;
    }
    let written = animator.finish()?;
    tracing::info!(frames = written, "encoded animated gif");
    Ok(written)
}

/// Render every date column of `table` into an ordered frame sequence.
pub fn render_frames(
    table: &FrameTable,
    style: &MapStyle,
    font_bytes: Vec<u8>,
) -> ChoromapResult<Vec<FrameRgba>> {
    let mut renderer = ChoroplethRenderer::new(table, style.clone(), font_bytes)?;

    let mut frames = Vec::with_capacity(table.columns.len());
    for col in 0..table.columns.len() {
        frames.push(renderer.render_frame(table, col)?);
        tracing::debug!(
            column = %table.columns[col].label,
            rendered = frames.len(),
            total = table.columns.len(),
            "rendered frame"
        );
    }
    Ok(frames)
}

/// A complete batch job: inputs, the geometry override, the join exclusions,
/// the map style, and the output.
///
/// Serializable so a whole run can be described by one JSON file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChoroplethJob {
    /// Boundary shapefile path.
    pub boundaries: PathBuf,
    /// dBase attribute holding the region name.
    pub name_field: String,
    /// Delimited-text metric table path.
    pub cases: PathBuf,
    /// Metric table column holding the region name.
    pub key_column: String,
    /// Region names removed after the join.
    pub exclude: Vec<String>,
    /// Optional antimeridian trim, applied before the join.
    pub region_override: Option<RegionOverride>,
    pub style: MapStyle,
    /// Font file used for the title and legend.
    pub font: PathBuf,
    /// Output GIF path.
    pub out: PathBuf,
    #[serde(default)]
    pub opts: RenderToGifOpts,
}

impl Default for ChoroplethJob {
    /// The source pipeline's fixed inputs: US Census state boundaries, a
    /// daily case table, the Alaska trim, and the three territory
    /// exclusions.
    fn default() -> Self {
        Self {
            boundaries: PathBuf::from("cb_2018_us_state_500k.shp"),
            name_field: "NAME".to_string(),
            cases: PathBuf::from("data-daily.csv"),
            key_column: "state".to_string(),
            exclude: default_territory_exclusions(),
            region_override: Some(RegionOverride::default()),
            style: MapStyle::default(),
            font: PathBuf::from("DejaVuSans.ttf"),
            out: PathBuf::from("us-cases-daily.gif"),
            opts: RenderToGifOpts::default(),
        }
    }
}

impl ChoroplethJob {
    /// Load a job description from a JSON file.
    pub fn from_path(path: &Path) -> ChoromapResult<Self> {
        let file =
            std::fs::File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
        let job: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("parse job JSON '{}'", path.display()))?;
        Ok(job)
    }
}

/// Execute a full job: load, trim, join, render, encode. Returns the number
/// of frames written.
pub fn run_job(job: &ChoroplethJob) -> ChoromapResult<u64> {
    let regions = load_regions(&job.boundaries, &job.name_field)?;
    tracing::info!(regions = regions.len(), "loaded boundary dataset");

    let regions = match &job.region_override {
        Some(ov) => apply_override(&regions, ov)?,
        None => regions,
    };

    let table = load_metric_table(&job.cases, &job.key_column)?;
    tracing::info!(
        rows = table.rows().len(),
        columns = table.columns().len(),
        "loaded metric table"
    );

    let joined = join_regions(&regions, &table, &job.exclude)?;

    let font_bytes = std::fs::read(&job.font)
        .with_context(|| format!("read font '{}'", job.font.display()))?;

    render_to_gif(&joined, &job.style, font_bytes, &job.out, &job.opts)
}
