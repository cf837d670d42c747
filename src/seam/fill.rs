//! Scanline rasterization of seam polygons.

use image::{GrayImage, Luma};

use crate::seam::ring::Point;

/// Set every pixel whose centre lies inside `polygons` to `value`.
///
/// `offset` is the position of the mask's upper-left pixel in polygon
/// coordinates. Polygons are closed implicitly and combined with the even-odd
/// rule, so a polygon nested inside another cuts a hole. Pixels off the mask
/// are skipped.
pub fn fill_polygons(mask: &mut GrayImage, polygons: &[Vec<Point>], offset: (i32, i32), value: u8) {
    let (width, height) = mask.dimensions();
    let shift = |p: Point| Point::new(p.x - offset.0, p.y - offset.1);
    let edges: Vec<(Point, Point)> = polygons
        .iter()
        .filter(|poly| poly.len() > 2)
        .flat_map(|poly| {
            poly.iter()
                .zip(poly.iter().cycle().skip(1))
                .map(|(&a, &b)| (shift(a), shift(b)))
                .filter(|(a, b)| a.y != b.y)
        })
        .collect();
    if edges.is_empty() {
        return;
    }

    let mut crossings = Vec::new();
    for y in 0..height {
        let centre = y as f64 + 0.5;
        crossings.clear();
        for (a, b) in &edges {
            let (lo, hi) = if a.y < b.y { (a, b) } else { (b, a) };
            if centre < lo.y as f64 || centre >= hi.y as f64 {
                continue;
            }
            let t = (centre - lo.y as f64) / (hi.y - lo.y) as f64;
            crossings.push(lo.x as f64 + t * (hi.x - lo.x) as f64);
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            // Pixel x is inside when span[0] <= x + 0.5 < span[1].
            let first = (span[0] - 0.5).ceil().max(0.0);
            let last = (span[1] - 0.5).ceil().min(width as f64);
            let mut x = first;
            while x < last {
                mask.put_pixel(x as u32, y, Luma([value]));
                x += 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn filled(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] != 0).count()
    }

    mod fill_polygons {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn lattice_square_covers_its_cells() {
                let mut mask = GrayImage::new(8, 8);
                fill_polygons(&mut mask, &[rect(2, 2, 5, 5)], (0, 0), 255);
                assert_eq!(filled(&mask), 9);
                assert_eq!(mask.get_pixel(2, 2)[0], 255);
                assert_eq!(mask.get_pixel(4, 4)[0], 255);
                assert_eq!(mask.get_pixel(5, 5)[0], 0);
            }

            #[test]
            fn nested_polygon_is_a_hole() {
                let mut mask = GrayImage::new(10, 10);
                fill_polygons(&mut mask, &[rect(0, 0, 10, 10), rect(3, 3, 6, 6)], (0, 0), 255);
                assert_eq!(filled(&mask), 100 - 9);
                assert_eq!(mask.get_pixel(4, 4)[0], 0);
            }

            #[test]
            fn clipped_to_image() {
                let mut mask = GrayImage::new(4, 4);
                fill_polygons(&mut mask, &[rect(-5, -5, 2, 9)], (0, 0), 7);
                assert_eq!(filled(&mask), 8);
                assert_eq!(mask.get_pixel(1, 3)[0], 7);
            }

            #[test]
            fn triangle_uses_pixel_centres() {
                let mut mask = GrayImage::new(4, 4);
                let triangle = vec![Point::new(0, 0), Point::new(4, 0), Point::new(0, 4)];
                fill_polygons(&mut mask, &[triangle], (0, 0), 1);
                // Row y has centres x + 0.5 < 4 - (y + 0.5).
                assert_eq!(filled(&mask), 3 + 2 + 1);
            }

            #[test]
            fn offset_shifts_polygons_into_the_mask() {
                let mut mask = GrayImage::new(4, 4);
                fill_polygons(&mut mask, &[rect(10, 20, 12, 22)], (10, 20), 255);
                assert_eq!(filled(&mask), 4);
                assert_eq!(mask.get_pixel(1, 1)[0], 255);
                assert_eq!(mask.get_pixel(2, 2)[0], 0);
            }

            #[test]
            fn degenerate_polygons_fill_nothing() {
                let mut mask = GrayImage::new(4, 4);
                fill_polygons(&mut mask, &[vec![Point::new(0, 0), Point::new(3, 3)]], (0, 0), 255);
                fill_polygons(&mut mask, &[], (0, 0), 255);
                assert_eq!(filled(&mask), 0);
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// An axis-aligned lattice rectangle fills exactly its area.
                #[test]
                fn rectangle_area(x0 in 0i32..10, y0 in 0i32..10, w in 1i32..10, h in 1i32..10) {
                    let mut mask = GrayImage::new(20, 20);
                    fill_polygons(&mut mask, &[rect(x0, y0, x0 + w, y0 + h)], (0, 0), 255);
                    prop_assert_eq!(filled(&mask), (w * h) as usize);
                }
            }
        }
    }
}
