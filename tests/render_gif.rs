use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use geo_types::{Coord, MultiPolygon, Rect};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use choromap::{
    Canvas, ChoroplethRenderer, FrameTable, MapStyle, Region, RenderToGifOpts, join_regions,
    read_metric_table, render_to_gif,
};

/// Locate any TrueType/OpenType font on the host; rendering tests are
/// skipped when none is available.
fn find_system_font() -> Option<PathBuf> {
    let roots = [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/System/Library/Fonts",
        "/Library/Fonts",
        "C:\\Windows\\Fonts",
    ];
    roots.iter().find_map(|root| find_font_under(Path::new(root)))
}

fn find_font_under(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_font_under(&path) {
                return Some(found);
            }
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ttf" | "otf" | "TTF" | "OTF")
        ) {
            return Some(path);
        }
    }
    None
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x100_0000_01b3);
    }
    h
}

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![
        Rect::new(
            Coord { x: x0, y: y0 },
            Coord {
                x: x0 + size,
                y: y0 + size,
            },
        )
        .to_polygon(),
    ])
}

fn sample_table() -> FrameTable {
    let csv = "\
state,20200315,20200316,20200317
Alpha,50,600,700000
Beta,200,200,200
";
    let table = read_metric_table(csv.as_bytes(), "state").unwrap();
    let regions = vec![
        Region {
            name: "Alpha".to_string(),
            geometry: square(-10.0, 0.0, 8.0),
        },
        Region {
            name: "Beta".to_string(),
            geometry: square(0.0, 0.0, 8.0),
        },
    ];
    join_regions(&regions, &table, &[]).unwrap()
}

fn small_style() -> MapStyle {
    MapStyle {
        canvas: Canvas {
            width: 400,
            height: 240,
        },
        margin_px: 8.0,
        title_size_px: 10.0,
        legend_size_px: 7.0,
        ..MapStyle::default()
    }
}

#[test]
fn render_is_deterministic_and_nonempty() {
    let Some(font) = find_system_font() else {
        return;
    };
    let font_bytes = std::fs::read(font).unwrap();

    let table = sample_table();
    let mut renderer =
        ChoroplethRenderer::new(&table, small_style(), font_bytes).unwrap();

    let a = renderer.render_frame(&table, 0).unwrap();
    let b = renderer.render_frame(&table, 0).unwrap();

    assert_eq!(a.width, 400);
    assert_eq!(a.height, 240);
    assert!(a.premultiplied);
    assert_eq!(fnv1a(&a.data), fnv1a(&b.data));
    // Region fills must leave more than bare background on the canvas.
    assert!(a.data.chunks_exact(4).any(|px| px[0] != px[1]));
}

#[test]
fn different_columns_render_different_fills() {
    let Some(font) = find_system_font() else {
        return;
    };
    let font_bytes = std::fs::read(font).unwrap();

    let table = sample_table();
    let mut renderer =
        ChoroplethRenderer::new(&table, small_style(), font_bytes).unwrap();

    // Alpha moves from the lowest class to the highest between these columns.
    let first = renderer.render_frame(&table, 0).unwrap();
    let last = renderer.render_frame(&table, 2).unwrap();
    assert_ne!(fnv1a(&first.data), fnv1a(&last.data));
}

#[test]
fn gif_has_one_frame_per_column_and_loops_forever() {
    let Some(font) = find_system_font() else {
        return;
    };
    let font_bytes = std::fs::read(font).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("cases.gif");

    let table = sample_table();
    let written = render_to_gif(
        &table,
        &small_style(),
        font_bytes,
        &out,
        &RenderToGifOpts::default(),
    )
    .unwrap();
    assert_eq!(written, 3);

    let decoder = GifDecoder::new(BufReader::new(File::open(&out).unwrap())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();

    assert_eq!(frames.len(), 3);
    assert!(
        frames
            .iter()
            .all(|f| f.buffer().dimensions() == (400, 240))
    );
    let (num, den) = frames[0].delay().numer_denom_ms();
    assert_eq!(num / den, 300);

    // Infinite looping is written as the NETSCAPE2.0 application extension.
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));
}

#[test]
fn empty_column_set_is_an_error() {
    let Some(font) = find_system_font() else {
        return;
    };
    let font_bytes = std::fs::read(font).unwrap();

    let mut table = sample_table();
    table.columns.clear();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("cases.gif");
    assert!(
        render_to_gif(
            &table,
            &small_style(),
            font_bytes,
            &out,
            &RenderToGifOpts::default()
        )
        .is_err()
    );
}
