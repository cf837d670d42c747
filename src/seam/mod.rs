//! Seam-mask generation between the running composite and the next image.
//!
//! The pipeline runs the nearest-feature transform, vectorizes the boundary
//! of the white region, optimizes the moveable vertices against the pixel
//! mismatch, and fills the resulting polygons back into a mask.

pub mod anneal;
pub mod contour;
pub mod cost;
pub mod fill;
pub mod nft;
pub mod path;
pub mod ring;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use log::{debug, info, warn};

use crate::config::SeamOptions;
use crate::error::{BlendError, BlendResult};
use crate::executor::RowExecutor;
use crate::fixed::{ChannelDepth, PyramidPixel};
use crate::footprint::Footprint;
use crate::plane::Plane;

use self::anneal::{anneal_segment, prune_forbidden, seeded_rng};
use self::contour::{Contour, freeze_uncovered, vectorize};
use self::cost::{CostField, FORBIDDEN};
use self::fill::fill_polygons;
use self::nft::{BLACK, RegionMap, WHITE, nearest_feature_transform};
use self::path::{reconnect_segment, seam_cost};
use self::ring::{Point, Vertex};

const FORBIDDEN_COLOR: Rgb<u8> = Rgb([96, 0, 0]);
const UNCOVERED_COLOR: Rgb<u8> = Rgb([0, 0, 96]);
const PATH_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MOVEABLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FROZEN_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Output of [`create_seam_mask`].
#[derive(Debug, Clone)]
pub struct Seam {
    /// 255 where the white image wins, 0 where the black image wins.
    pub mask: GrayImage,
    /// Cost field with the optimized seam drawn over it, on the cost grid.
    pub visualization: Option<RgbImage>,
}

/// Compute the seam mask for a pair of layers placed on the same canvas.
///
/// `white` is the incoming image and `black` the running composite. Pixels
/// covered by only one of them always go to that image. A coarse grid that
/// misses one image's own pixels is retried at full resolution. The
/// visualization is only produced when `visualize` is set and the seam is
/// optimized.
pub fn create_seam_mask<P, E>(
    white: (&Plane<P>, &Footprint),
    black: (&Plane<P>, &Footprint),
    depth: ChannelDepth,
    wraparound: bool,
    options: &SeamOptions,
    visualize: bool,
    executor: &E,
) -> BlendResult<Seam>
where
    P: PyramidPixel,
    E: RowExecutor,
{
    let (width, height) = white.1.dimensions();
    let stride = options.stride();
    let region = match nearest_feature_transform(white.1, black.1, stride, wraparound) {
        Err(BlendError::DegenerateOverlap(reason)) if stride > 1 => {
            debug!("coarse grid misses a feature set ({reason}); retrying at full resolution");
            nearest_feature_transform(white.1, black.1, 1, wraparound)?
        }
        result => result?,
    };

    if !options.coarse && !options.optimize {
        let mut mask = region.upsample(width, height);
        force_exclusive(&mut mask, white.1, black.1);
        return Ok(Seam {
            mask,
            visualization: None,
        });
    }

    let distance = options.resolved_vectorize_distance();
    let mut contours: Vec<Contour> = vectorize(&region, distance, (width, height))
        .into_iter()
        .map(|mut ring| {
            freeze_uncovered(&mut ring, white.1, black.1);
            Contour::split(&ring)
        })
        .collect();
    for (i, contour) in contours.iter().enumerate() {
        if !contour.segments().iter().any(|s| s.has_moveable()) {
            debug!("contour {i} has no moveable vertex");
        }
    }

    let mut visualization = None;
    if options.optimize {
        let mut cost = CostField::mismatch(white, black, depth, options.cost_stride(), executor)?;
        let mut rng = seeded_rng(&options.anneal);
        for contour in &mut contours {
            contour.segments_mut().retain_mut(|segment| {
                anneal_segment(segment, &cost, &options.anneal, &mut rng);
                prune_forbidden(segment, &cost);
                if segment.ring().is_empty() {
                    warn!("dropping a closed seam that lies entirely outside the overlap");
                    return false;
                }
                true
            });
        }
        let markers: Vec<Vertex> = if visualize {
            contours
                .iter()
                .flat_map(|c| c.segments().iter().flat_map(|s| s.vertices()))
                .collect()
        } else {
            Vec::new()
        };

        cost.open_uncovered(white.1, black.1);
        let mut total = 0u64;
        for segment in contours.iter_mut().flat_map(|c| c.segments_mut().iter_mut()) {
            reconnect_segment(segment, &cost, options.path_radius);
            total += seam_cost(segment, &cost);
        }
        debug!("optimized seam cost {total}");

        if visualize {
            visualization = Some(draw_visualization(&cost, white.1, black.1, &contours, &markers));
        }
    }

    contours.retain(|c| !c.is_empty());
    info!("seam has {} contour(s)", contours.len());
    let mut mask = rasterize_seam(&contours, &region, width, height)?;
    force_exclusive(&mut mask, white.1, black.1);
    Ok(Seam {
        mask,
        visualization,
    })
}

/// Outlines of the white region that still enclose an area.
fn seam_polygons(contours: &[Contour]) -> BlendResult<Vec<Vec<Point>>> {
    let polygons: Vec<Vec<Point>> = contours
        .iter()
        .map(Contour::polygon)
        .filter(|polygon| polygon.len() >= 3)
        .collect();
    if polygons.is_empty() {
        return Err(BlendError::DegenerateContour(format!(
            "none of {} contour(s) encloses an area",
            contours.len()
        )));
    }
    Ok(polygons)
}

/// Fill the seam polygons white. Without a usable polygon the nearest-feature
/// partition is used as is.
fn rasterize_seam(contours: &[Contour], region: &RegionMap, width: u32, height: u32) -> BlendResult<GrayImage> {
    match seam_polygons(contours) {
        Ok(polygons) => {
            let mut mask = GrayImage::new(width, height);
            fill_polygons(&mut mask, &polygons, (0, 0), WHITE);
            Ok(mask)
        }
        Err(BlendError::DegenerateContour(reason)) => {
            warn!("{reason}; using the nearest-feature partition");
            Ok(region.upsample(width, height))
        }
        Err(err) => Err(err),
    }
}

/// Give pixels covered by a single image to that image.
fn force_exclusive(mask: &mut GrayImage, white: &Footprint, black: &Footprint) {
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        match (white.covered(x, y), black.covered(x, y)) {
            (true, false) => *pixel = Luma([WHITE]),
            (false, true) => *pixel = Luma([BLACK]),
            _ => {}
        }
    }
}

fn draw_visualization(
    cost: &CostField,
    white: &Footprint,
    black: &Footprint,
    contours: &[Contour],
    markers: &[Vertex],
) -> RgbImage {
    let stride = cost.stride();
    let mut image = RgbImage::from_fn(cost.width() as u32, cost.height() as u32, |gx, gy| {
        let (x, y) = (gx * stride, gy * stride);
        match (white.covered(x, y), black.covered(x, y)) {
            (true, true) => {
                let c = cost.at(Point::new(gx as i32, gy as i32));
                if c == FORBIDDEN { FORBIDDEN_COLOR } else { Rgb([c, c, c]) }
            }
            (false, false) => UNCOVERED_COLOR,
            _ => FORBIDDEN_COLOR,
        }
    });

    for segment in contours.iter().flat_map(Contour::segments) {
        let ring = segment.ring();
        for (a, b) in segment.links() {
            let (pa, pb) = (
                cost.to_grid(ring.vertex(a).point),
                cost.to_grid(ring.vertex(b).point),
            );
            draw_line_segment_mut(
                &mut image,
                (pa.x as f32, pa.y as f32),
                (pb.x as f32, pb.y as f32),
                PATH_COLOR,
            );
        }
    }
    for vertex in markers {
        let p = cost.to_grid(vertex.point);
        let color = if vertex.moveable { MOVEABLE_COLOR } else { FROZEN_COLOR };
        image.put_pixel(p.x as u32, p.y as u32, color);
    }
    image
}
