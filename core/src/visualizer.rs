//! Component E: draw rooms over the source raster and return a base64
//! PNG. Colors cycle through a fixed six-entry palette by room index,
//! so the same rooms always render the same way.

use ab_glyph::{FontArc, PxScale};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::error::{DetectionError, Result};
use crate::types::Room;

const PALETTE: [[u8; 3]; 6] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
];

const FILL_ALPHA: u8 = 70;

fn room_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// Render `rooms` over `base`, returning a base64-encoded PNG.
///
/// `font` is optional: the server loads one at startup from a path
/// supplied by configuration, but a missing or unparsable font file is
/// not fatal (§11 treats it as a degraded, not failed, capability) and
/// rendering without labels is still a useful annotated image.
pub fn render(base: &RgbaImage, rooms: &[Room], font: Option<&FontArc>) -> Result<String> {
    let mut canvas = base.clone();

    for (index, room) in rooms.iter().enumerate() {
        let color = room_color(index);
        fill_polygon(&mut canvas, &room.polygon, color, FILL_ALPHA);
        draw_polygon_outline(&mut canvas, &room.polygon, color);

        if let Some(font) = font {
            let label = format!("{} ({:.0}%)", room.id, room.confidence * 100.0);
            let x = room.centroid.x.clamp(0, canvas.width() as i64 - 1) as i32;
            let y = room.centroid.y.clamp(0, canvas.height() as i64 - 1) as i32;
            draw_text_mut(
                &mut canvas,
                Rgba([255, 255, 255, 255]),
                x,
                y,
                PxScale::from(16.0),
                font,
                &label,
            );
        }
    }

    if let Some(font) = font {
        draw_caption(&mut canvas, font, rooms.len());
    }

    encode_png_base64(&canvas)
}

fn draw_caption(canvas: &mut RgbaImage, font: &FontArc, num_rooms: usize) {
    let caption = format!("{num_rooms} rooms");
    let bg_rect = Rect::at(0, 0).of_size(canvas.width().min(160), 22);
    draw_filled_rect_mut(canvas, bg_rect, Rgba([0, 0, 0, 160]));
    draw_text_mut(canvas, Rgba([255, 255, 255, 255]), 4, 2, PxScale::from(16.0), font, &caption);
}

/// Scanline polygon fill with a fixed alpha, blended over the existing
/// pixel rather than overwritten, so overlapping rooms stay legible.
fn fill_polygon(canvas: &mut RgbaImage, polygon: &[crate::types::Point], color: [u8; 3], alpha: u8) {
    if polygon.len() < 3 {
        return;
    }
    let min_y = polygon.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let max_y = polygon.iter().map(|p| p.y).max().unwrap_or(0).min(canvas.height() as i64 - 1);

    for y in min_y..=max_y {
        let mut xs: Vec<i64> = Vec::new();
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            if (a.y <= y && b.y > y) || (b.y <= y && a.y > y) {
                let t = (y - a.y) as f64 / (b.y - a.y) as f64;
                xs.push((a.x as f64 + t * (b.x - a.x) as f64).round() as i64);
            }
        }
        xs.sort_unstable();
        for pair in xs.chunks(2) {
            if pair.len() < 2 {
                continue;
            }
            let (x0, x1) = (pair[0].max(0), pair[1].min(canvas.width() as i64 - 1));
            for x in x0..=x1 {
                blend_pixel(canvas, x as u32, y as u32, color, alpha);
            }
        }
    }
}

fn blend_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: [u8; 3], alpha: u8) {
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let existing = canvas.get_pixel(x, y).0;
    let a = alpha as f32 / 255.0;
    let blended = [
        (color[0] as f32 * a + existing[0] as f32 * (1.0 - a)) as u8,
        (color[1] as f32 * a + existing[1] as f32 * (1.0 - a)) as u8,
        (color[2] as f32 * a + existing[2] as f32 * (1.0 - a)) as u8,
        255,
    ];
    canvas.put_pixel(x, y, Rgba(blended));
}

fn draw_polygon_outline(canvas: &mut RgbaImage, polygon: &[crate::types::Point], color: [u8; 3]) {
    if polygon.len() < 2 {
        return;
    }
    let rgba = Rgba([color[0], color[1], color[2], 255]);
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        draw_line(canvas, a.x, a.y, b.x, b.y, rgba);
    }
}

/// Bresenham's line algorithm; imageproc's own line-drawing helpers
/// take float endpoints and antialias, which would make output depend
/// on the AA implementation rather than just coordinates.
fn draw_line(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < canvas.width() && (y0 as u32) < canvas.height() {
            canvas.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let mut buf = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| DetectionError::internal(format!("failed to encode visualization: {e}")))?;
    Ok(STANDARD.encode(buf))
}

/// Draw an empty box, used by tests that only care about text/caption
/// placement and don't want to construct a real source photo.
#[cfg(test)]
fn blank_canvas(w: u32, h: u32) -> RgbaImage {
    ImageBuffer::from_pixel(w, h, Rgba([255, 255, 255, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Point, ShapeType};

    fn test_room(id: &str, poly: Vec<Point>) -> Room {
        Room {
            id: id.to_string(),
            bounding_box: BoundingBox::new(0, 0, 100, 100),
            area_pixels: 10000,
            centroid: Point { x: 50, y: 50 },
            confidence: 0.95,
            shape_type: ShapeType::Rectangle,
            num_vertices: poly.len(),
            polygon: poly,
        }
    }

    #[test]
    fn render_produces_valid_base64_png() {
        let base = blank_canvas(200, 200);
        let room = test_room(
            "room_001",
            vec![
                Point { x: 10, y: 10 },
                Point { x: 190, y: 10 },
                Point { x: 190, y: 190 },
                Point { x: 10, y: 190 },
            ],
        );
        let out = render(&base, &[room], None).unwrap();
        let decoded = STANDARD.decode(out).unwrap();
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn render_with_no_rooms_and_no_font_still_succeeds() {
        let base = blank_canvas(64, 64);
        let out = render(&base, &[], None).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn render_is_idempotent_for_identical_inputs() {
        let base = blank_canvas(200, 200);
        let room = test_room(
            "room_001",
            vec![
                Point { x: 10, y: 10 },
                Point { x: 190, y: 10 },
                Point { x: 190, y: 190 },
                Point { x: 10, y: 190 },
            ],
        );
        let first = render(&base, &[room.clone()], None).unwrap();
        let second = render(&base, &[room], None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fill_polygon_is_a_no_op_for_degenerate_polygons() {
        let mut canvas = blank_canvas(10, 10);
        let before = canvas.clone();
        fill_polygon(&mut canvas, &[Point { x: 1, y: 1 }, Point { x: 2, y: 2 }], [255, 0, 0], 128);
        assert_eq!(canvas, before);
    }
}
