use geo::BoundingRect;
use geo::orient::{Direction, Orient};
use geo_types::Polygon;
use kurbo::{Affine, BezPath};

use crate::{
    error::{ChoromapError, ChoromapResult},
    join::FrameTable,
    style::{Classifier, ColorRamp, MapStyle},
    text::{TextBrushRgba8, TextEngine},
};

/// One rendered frame: row-major premultiplied RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Renders classed choropleth frames for one joined dataset.
///
/// All frame-invariant work happens at construction: classification setup,
/// legend label shaping, the lon/lat → pixel projection, and the projected
/// region outlines. [`render_frame`](Self::render_frame) then only varies
/// fill colors and the title, and every per-frame rasterization resource is
/// dropped when the call returns.
pub struct ChoroplethRenderer {
    style: MapStyle,
    classifier: Classifier,
    class_colors: Vec<[u8; 3]>,
    legend_labels: Vec<parley::Layout<TextBrushRgba8>>,
    text: TextEngine,
    /// Projected region outlines, one per joined row, in row order.
    paths: Vec<BezPath>,
    map_left: f64,
    map_top: f64,
    map_right: f64,
    legend_left: f64,
}

const TEXT_BLACK: TextBrushRgba8 = TextBrushRgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

const LEGEND_GAP_PX: f64 = 8.0;

impl ChoroplethRenderer {
    pub fn new(table: &FrameTable, style: MapStyle, font_bytes: Vec<u8>) -> ChoromapResult<Self> {
        style.validate()?;
        if table.rows.is_empty() {
            return Err(ChoromapError::validation("frame table has no rows"));
        }

        u16::try_from(style.canvas.width)
            .and_then(|_| u16::try_from(style.canvas.height))
            .map_err(|_| ChoromapError::validation("canvas dimensions exceed u16"))?;

        let classifier = Classifier::new(&style.thresholds)?;
        let class_colors = ColorRamp::or_rd().class_colors(classifier.class_count());

        let mut text = TextEngine::from_font_bytes(font_bytes)?;
        let mut legend_labels = Vec::with_capacity(classifier.class_count());
        for label in classifier.class_labels() {
            legend_labels.push(text.layout(&label, style.legend_size_px, TEXT_BLACK)?);
        }

        // The legend band sits outside the plot, against its upper-right
        // corner; its width follows from the widest shaped label.
        let swatch = f64::from(style.legend_size_px);
        let max_label_w = legend_labels
            .iter()
            .map(|l| TextEngine::layout_size(l).0)
            .fold(0.0, f64::max);
        let legend_band = swatch + LEGEND_GAP_PX + max_label_w + style.margin_px;

        let title_band = f64::from(style.title_size_px) * 2.0;
        let map_left = style.margin_px;
        let map_top = style.margin_px + title_band;
        let map_right = f64::from(style.canvas.width) - style.margin_px - legend_band;
        let map_bottom = f64::from(style.canvas.height) - style.margin_px;
        if map_right <= map_left || map_bottom <= map_top {
            return Err(ChoromapError::validation(
                "canvas too small for margins, title and legend",
            ));
        }

        let projection = fit_projection(table, map_left, map_top, map_right, map_bottom)?;
        let paths = table
            .rows
            .iter()
            .map(|row| {
                let oriented = row.geometry.orient(Direction::Default);
                let mut path = BezPath::new();
                for polygon in &oriented {
                    append_polygon(&mut path, polygon);
                }
                path.apply_affine(projection);
                path
            })
            .collect();

        Ok(Self {
            legend_left: map_right + LEGEND_GAP_PX,
            style,
            classifier,
            class_colors,
            legend_labels,
            text,
            paths,
            map_left,
            map_top,
            map_right,
        })
    }

    pub fn canvas_width(&self) -> u32 {
        self.style.canvas.width
    }

    pub fn canvas_height(&self) -> u32 {
        self.style.canvas.height
    }

    /// Render the frame for one date column of `table`.
    ///
    /// `table` must be the dataset the renderer was built for.
    pub fn render_frame(&mut self, table: &FrameTable, col: usize) -> ChoromapResult<FrameRgba> {
        if col >= table.columns.len() {
            return Err(ChoromapError::validation(format!(
                "date column {col} out of range ({} columns)",
                table.columns.len()
            )));
        }
        if table.rows.len() != self.paths.len() {
            return Err(ChoromapError::validation(
                "frame table does not match the dataset this renderer was built for",
            ));
        }

        let width = self.style.canvas.width as u16;
        let height = self.style.canvas.height as u16;
        let mut ctx = vello_cpu::RenderContext::new(width, height);
        let mut pixmap = vello_cpu::Pixmap::new(width, height);

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        // Background.
        let [br, bg, bb, ba] = self.style.background_rgba;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(br, bg, bb, ba));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.style.canvas.width),
            f64::from(self.style.canvas.height),
        ));

        // Region fills, classed by this column's value.
        for (row, path) in table.rows.iter().zip(&self.paths) {
            let class = self.classifier.class_of(row.values[col]);
            let [r, g, b] = self.class_colors[class];
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, 255));
            ctx.fill_path(&bezpath_to_cpu(path));
        }

        // Region borders.
        let [er, eg, eb, ea] = self.style.edge_rgba;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(er, eg, eb, ea));
        ctx.set_stroke(vello_cpu::kurbo::Stroke::new(self.style.edge_width_px));
        for path in &self.paths {
            ctx.stroke_path(&bezpath_to_cpu(path));
        }

        self.draw_legend(&mut ctx);
        self.draw_title(&mut ctx, table, col)?;

        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRgba {
            width: self.style.canvas.width,
            height: self.style.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_legend(&self, ctx: &mut vello_cpu::RenderContext) {
        let swatch = f64::from(self.style.legend_size_px);
        let row_h = swatch * 1.5;

        for (i, label) in self.legend_labels.iter().enumerate() {
            let top = self.map_top + i as f64 * row_h;
            let swatch_rect = vello_cpu::kurbo::Rect::new(
                self.legend_left,
                top,
                self.legend_left + swatch,
                top + swatch,
            );

            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            let [r, g, b] = self.class_colors[i];
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, 255));
            ctx.fill_rect(&swatch_rect);

            let [er, eg, eb, ea] = self.style.edge_rgba;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(er, eg, eb, ea));
            ctx.set_stroke(vello_cpu::kurbo::Stroke::new(0.5));
            ctx.stroke_rect(&swatch_rect);

            let text_left = self.legend_left + swatch + LEGEND_GAP_PX;
            let text_top = top + (swatch - TextEngine::layout_size(label).1) / 2.0;
            draw_layout(ctx, self.text.font(), label, text_left, text_top);
        }
    }

    fn draw_title(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        table: &FrameTable,
        col: usize,
    ) -> ChoromapResult<()> {
        let title = format!(
            "{} {}",
            self.style.title_prefix,
            table.columns[col].display()
        );
        let layout = self
            .text
            .layout(&title, self.style.title_size_px, TEXT_BLACK)?;

        let map_w = self.map_right - self.map_left;
        let left = self.map_left + (map_w - TextEngine::layout_size(&layout).0) / 2.0;
        draw_layout(ctx, self.text.font(), &layout, left.max(0.0), self.style.margin_px);
        Ok(())
    }
}

/// Fit the joined dataset's lon/lat extent into the pixel-space map area,
/// preserving aspect ratio and flipping the y axis.
fn fit_projection(
    table: &FrameTable,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
) -> ChoromapResult<Affine> {
    let mut bounds: Option<geo_types::Rect<f64>> = None;
    for row in &table.rows {
        let Some(rect) = row.geometry.bounding_rect() else {
            return Err(ChoromapError::geometry(format!(
                "region '{}' has an empty geometry",
                row.name
            )));
        };
        bounds = Some(match bounds {
            None => rect,
            Some(acc) => geo_types::Rect::new(
                geo_types::Coord {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo_types::Coord {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            ),
        });
    }
    let bounds = bounds.ok_or_else(|| ChoromapError::geometry("dataset has no geometry"))?;

    let data_w = bounds.width();
    let data_h = bounds.height();
    if !(data_w > 0.0) || !(data_h > 0.0) {
        return Err(ChoromapError::geometry(
            "dataset extent is degenerate (zero width or height)",
        ));
    }

    let scale = ((right - left) / data_w).min((bottom - top) / data_h);
    let pad_x = (right - left - data_w * scale) / 2.0;
    let pad_y = (bottom - top - data_h * scale) / 2.0;

    // x' = scale*lon + tx; y' = -scale*lat + ty (north up).
    let tx = left + pad_x - bounds.min().x * scale;
    let ty = top + pad_y + bounds.max().y * scale;
    Ok(Affine::new([scale, 0.0, 0.0, -scale, tx, ty]))
}

fn append_polygon(path: &mut BezPath, polygon: &Polygon<f64>) {
    let mut append_ring = |ring: &geo_types::LineString<f64>| {
        let mut coords = ring.coords();
        let Some(first) = coords.next() else {
            return;
        };
        path.move_to(kurbo::Point::new(first.x, first.y));
        for c in coords {
            path.line_to(kurbo::Point::new(c.x, c.y));
        }
        path.close_path();
    };

    append_ring(polygon.exterior());
    for interior in polygon.interiors() {
        append_ring(interior);
    }
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let point = |p: kurbo::Point| vello_cpu::kurbo::Point::new(p.x, p.y);

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point(p)),
            PathEl::LineTo(p) => out.line_to(point(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point(p1), point(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(point(p1), point(p2), point(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrushRgba8>,
    left: f64,
    top: f64,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((left, top)));

    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));

            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}
