use image::{Rgb, RgbImage};
use lenscal_core::BoardGeometry;
use nalgebra::Point2;

const ROW_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 200, 255]),
    Rgb([255, 0, 255]),
];
const MISS_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MARKER_RADIUS: i32 = 3;

/// Overlay detected corners on a preview frame.
///
/// A complete detection is drawn as per-row coloured markers joined in
/// detection order; a partial one as isolated red markers.
pub fn draw_corners(
    image: &mut RgbImage,
    board: BoardGeometry,
    points: &[Point2<f32>],
    found: bool,
) {
    if !found {
        for p in points {
            let (x, y) = (p.x.round() as i32, p.y.round() as i32);
            draw_cross(image, x, y, MARKER_RADIUS, MISS_COLOR);
        }
        return;
    }

    let cols = board.columns() as usize;
    let mut prev: Option<(i32, i32)> = None;
    for (k, p) in points.iter().enumerate() {
        let color = ROW_COLORS[(k / cols) % ROW_COLORS.len()];
        let (x, y) = (p.x.round() as i32, p.y.round() as i32);
        if let Some((px, py)) = prev {
            draw_line(image, px, py, x, y, color);
        }
        draw_cross(image, x, y, MARKER_RADIUS, color);
        prev = Some((x, y));
    }
}

fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(image: &mut RgbImage, mut x0: i32, mut y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(image, x0, y0, color);
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

fn draw_cross(image: &mut RgbImage, x: i32, y: i32, radius: i32, color: Rgb<u8>) {
    for d in -radius..=radius {
        put(image, x + d, y + d, color);
        put(image, x + d, y - d, color);
    }
}
