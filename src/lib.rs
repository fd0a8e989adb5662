#![forbid(unsafe_code)]

pub mod boundary;
pub mod encode_gif;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod table;
mod text;
pub mod trim;

pub use boundary::{Region, load_regions};
pub use encode_gif::{GifAnimator, GifConfig, default_gif_config};
pub use error::{ChoromapError, ChoromapResult};
pub use join::{FrameTable, JoinedRegion, default_territory_exclusions, join_regions};
pub use pipeline::{ChoroplethJob, RenderToGifOpts, render_frames, render_to_gif, run_job};
pub use render::{ChoroplethRenderer, FrameRgba};
pub use style::{Canvas, Classifier, ColorRamp, MapStyle, default_case_thresholds};
pub use table::{DateColumn, MetricTable, load_metric_table, read_metric_table};
pub use trim::{RegionOverride, apply_override};
