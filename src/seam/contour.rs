//! Crack-contour tracing of a [`RegionMap`] and its reduction to seam vertices.
//!
//! The region map is surrounded by a one-cell black frame, so the inner edge
//! of the frame is the border of the working canvas. Contour points lie on the
//! lattice of cell corners. Points on the canvas border are frozen; interior
//! points are thinned to one moveable vertex every `distance` steps.

use std::collections::VecDeque;

use log::debug;

use crate::footprint::Footprint;
use crate::seam::nft::RegionMap;
use crate::seam::ring::{NodeId, Point, Vertex, VertexRing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    fn step(self, p: Point) -> Point {
        match self {
            Dir::East => Point::new(p.x + 1, p.y),
            Dir::South => Point::new(p.x, p.y + 1),
            Dir::West => Point::new(p.x - 1, p.y),
            Dir::North => Point::new(p.x, p.y - 1),
        }
    }

    fn right(self) -> Dir {
        match self {
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
            Dir::North => Dir::East,
        }
    }

    fn left(self) -> Dir {
        match self {
            Dir::East => Dir::North,
            Dir::South => Dir::East,
            Dir::West => Dir::South,
            Dir::North => Dir::West,
        }
    }

    /// Cells ahead-left and ahead-right of lattice point `p` when facing this way.
    fn ahead(self, p: Point) -> (Point, Point) {
        let (x, y) = (p.x, p.y);
        match self {
            Dir::East => (Point::new(x, y - 1), Point::new(x, y)),
            Dir::South => (Point::new(x, y), Point::new(x - 1, y)),
            Dir::West => (Point::new(x - 1, y), Point::new(x - 1, y - 1)),
            Dir::North => (Point::new(x - 1, y - 1), Point::new(x, y - 1)),
        }
    }
}

/// Walk the crack boundary of the component containing cell `start`, keeping it on the right.
///
/// `start` must be the component's first cell in raster order. With
/// `eight_connected` diagonal neighbours belong to the same component.
fn trace_boundary(
    inside: impl Fn(Point) -> bool,
    start: Point,
    eight_connected: bool,
    limit: usize,
) -> Vec<Point> {
    let mut points = Vec::new();
    let mut p = start;
    let mut dir = Dir::East;
    loop {
        points.push(p);
        p = dir.step(p);
        let (left, right) = dir.ahead(p);
        let (left_in, right_in) = (inside(left), inside(right));
        dir = if eight_connected {
            if left_in {
                dir.left()
            } else if right_in {
                dir
            } else {
                dir.right()
            }
        } else if !right_in {
            dir.right()
        } else if left_in {
            dir.left()
        } else {
            dir
        };
        if (p == start && dir == Dir::East) || points.len() > limit {
            break;
        }
    }
    points
}

/// Label connected cells for which `member` holds; ids start at 1, 0 means unlabeled.
fn label_components(
    width: usize,
    height: usize,
    member: impl Fn(usize, usize) -> bool,
    eight_connected: bool,
    seeds_only_on_edge: bool,
) -> (Vec<u32>, u32) {
    let mut labels = vec![0u32; width * height];
    let mut next = 0u32;
    let mut queue = VecDeque::new();
    let idx = |x: usize, y: usize| y * width + x;
    for y in 0..height {
        for x in 0..width {
            if labels[idx(x, y)] != 0 || !member(x, y) {
                continue;
            }
            let on_edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
            if seeds_only_on_edge && !on_edge {
                continue;
            }
            next += 1;
            labels[idx(x, y)] = next;
            queue.push_back((x, y));
            while let Some((cx, cy)) = queue.pop_front() {
                for (dx, dy) in neighbours(eight_connected) {
                    let (nx, ny) = (cx as isize + dx, cy as isize + dy);
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    if labels[idx(nx, ny)] == 0 && member(nx, ny) {
                        labels[idx(nx, ny)] = next;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
    }
    (labels, next)
}

fn neighbours(eight_connected: bool) -> &'static [(isize, isize)] {
    const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    const EIGHT: [(isize, isize); 8] = [
        (-1, 0),
        (1, 0),
        (0, -1),
        (0, 1),
        (-1, -1),
        (1, -1),
        (-1, 1),
        (1, 1),
    ];
    if eight_connected { &EIGHT } else { &FOUR }
}

/// Crack contours of every white region and every black hole, in framed lattice coordinates.
///
/// Cell `(x, y)` of the map has its upper-left corner at lattice point `(x + 1, y + 1)`.
pub fn trace_contours(region: &RegionMap) -> Vec<Vec<Point>> {
    let (gw, gh) = region.labels().dimensions();
    let (w, h) = (gw as usize, gh as usize);
    let white = |x: usize, y: usize| region.is_white(x as u32, y as u32);

    let (regions, region_count) = label_components(w, h, white, false, false);
    // Black cells reachable from the frame; whatever black is left forms holes.
    let (outside, _) = label_components(w, h, |x, y| !white(x, y), true, true);
    let (holes, hole_count) =
        label_components(w, h, |x, y| !white(x, y) && outside[y * w + x] == 0, true, false);
    debug!("region map has {region_count} white regions and {hole_count} holes");

    let limit = 4 * (w + 2) * (h + 2) + 4;
    let mut traced_regions = vec![false; region_count as usize + 1];
    let mut traced_holes = vec![false; hole_count as usize + 1];
    let mut contours = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let start = Point::new(x as i32 + 1, y as i32 + 1);
            let (id, holes_side) = match (regions[y * w + x], holes[y * w + x]) {
                (r, _) if r != 0 => (r, false),
                (_, hole) if hole != 0 => (hole, true),
                _ => continue,
            };
            let (labels, traced) = if holes_side {
                (&holes, &mut traced_holes)
            } else {
                (&regions, &mut traced_regions)
            };
            if traced[id as usize] {
                continue;
            }
            traced[id as usize] = true;
            let inside = |p: Point| {
                let (cx, cy) = (p.x - 1, p.y - 1);
                cx >= 0
                    && cy >= 0
                    && (cx as usize) < w
                    && (cy as usize) < h
                    && labels[cy as usize * w + cx as usize] == id
            };
            contours.push(trace_boundary(inside, start, holes_side, limit));
        }
    }
    contours
}

/// Thin a traced contour into vertices and map them onto a `canvas` of the given size.
///
/// Border points are frozen and collapsed to the ends of each border run.
/// Interior points are kept as moveable vertices every `distance` steps.
pub fn thin_contour(
    points: &[Point],
    region: &RegionMap,
    distance: u32,
    canvas: (u32, u32),
) -> VertexRing {
    let (gw, gh) = region.labels().dimensions();
    let (right, bottom) = (gw as i32 + 1, gh as i32 + 1);
    let on_border = |p: Point| p.x == 1 || p.y == 1 || p.x == right || p.y == bottom;
    let is_corner = |p: Point| (p.x == 1 || p.x == right) && (p.y == 1 || p.y == bottom);
    let stride = region.stride() as i32;
    let to_canvas = |p: Point| {
        Point::new(
            ((p.x - 1) * stride).min(canvas.0 as i32),
            ((p.y - 1) * stride).min(canvas.1 as i32),
        )
    };

    let distance = distance.max(1);
    let mut ring = VertexRing::new();
    let mut last_frozen = false;
    let mut travelled = 0u32;
    for (i, &p) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        if on_border(p) {
            if is_corner(p) || !last_frozen || !on_border(next) {
                ring.push_back(Vertex::frozen(to_canvas(p)));
                travelled = 0;
            }
            last_frozen = true;
        } else {
            if travelled % distance == 0 {
                ring.push_back(Vertex::moveable(to_canvas(p)));
                travelled = 0;
            }
            last_frozen = false;
        }
        travelled += 1;
    }
    ring
}

/// Trace and thin every contour of `region`.
pub fn vectorize(region: &RegionMap, distance: u32, canvas: (u32, u32)) -> Vec<VertexRing> {
    trace_contours(region)
        .iter()
        .map(|points| thin_contour(points, region, distance, canvas))
        .filter(|ring| !ring.is_empty())
        .collect()
}

/// Freeze moveable vertices lying outside both footprints.
pub fn freeze_uncovered(ring: &mut VertexRing, white: &Footprint, black: &Footprint) {
    let (w, h) = white.dimensions();
    for id in ring.ids() {
        let vertex = ring.vertex_mut(id);
        if !vertex.moveable {
            continue;
        }
        let x = (vertex.point.x.max(0) as u32).min(w.saturating_sub(1));
        let y = (vertex.point.y.max(0) as u32).min(h.saturating_sub(1));
        if !white.covered(x, y) && !black.covered(x, y) {
            vertex.moveable = false;
        }
    }
}

/// A run of a contour that is optimized on its own.
///
/// Open segments start and end on frozen vertices. A contour without any
/// frozen vertex forms a single closed segment.
#[derive(Debug, Clone)]
pub struct Segment {
    ring: VertexRing,
    closed: bool,
}

impl Segment {
    pub fn open(vertices: Vec<Vertex>) -> Self {
        Self {
            ring: VertexRing::from_vertices(vertices),
            closed: false,
        }
    }

    pub fn closed(vertices: Vec<Vertex>) -> Self {
        Self {
            ring: VertexRing::from_vertices(vertices),
            closed: true,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn ring(&self) -> &VertexRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut VertexRing {
        &mut self.ring
    }

    pub fn vertices(&self) -> Vec<Vertex> {
        self.ring.vertices()
    }

    pub fn has_moveable(&self) -> bool {
        self.ring.vertices().iter().any(|v| v.moveable)
    }

    /// Consecutive node pairs joined by the seam; closed segments also join tail to head.
    pub fn links(&self) -> Vec<(NodeId, NodeId)> {
        let ids = self.ring.ids();
        let mut links: Vec<_> = ids.windows(2).map(|w| (w[0], w[1])).collect();
        if self.closed && ids.len() > 1 {
            links.push((ids[ids.len() - 1], ids[0]));
        }
        links
    }
}

/// A traced contour as a list of segments in traversal order.
#[derive(Debug, Clone)]
pub struct Contour {
    segments: Vec<Segment>,
}

impl Contour {
    /// Cut a closed vertex ring into segments bounded by frozen vertices.
    pub fn split(ring: &VertexRing) -> Self {
        let vertices = ring.vertices();
        let segments = if vertices.is_empty() {
            Vec::new()
        } else if vertices.iter().all(|v| v.moveable) {
            vec![Segment::closed(vertices)]
        } else {
            let first_frozen = vertices.iter().position(|v| !v.moveable).unwrap_or(0);
            let mut linear: Vec<Vertex> = vertices[first_frozen..]
                .iter()
                .chain(&vertices[..first_frozen])
                .copied()
                .collect();
            linear.push(linear[0]);

            let mut segments = Vec::new();
            let mut current = vec![linear[0]];
            let mut seen_moveable = false;
            for &vertex in &linear[1..] {
                current.push(vertex);
                if vertex.moveable {
                    seen_moveable = true;
                } else if seen_moveable {
                    segments.push(Segment::open(std::mem::replace(&mut current, vec![vertex])));
                    seen_moveable = false;
                }
            }
            if current.len() > 1 {
                segments.push(Segment::open(current));
            }
            segments
        };
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut Vec<Segment> {
        &mut self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.ring().is_empty())
    }

    /// Closed outline in traversal order; shared segment ends appear once.
    pub fn polygon(&self) -> Vec<Point> {
        let mut points = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            let skip = usize::from(i > 0 && !segment.is_closed());
            points.extend(segment.vertices().iter().skip(skip).map(|v| v.point));
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn region_from(rows: &[&str], stride: u32) -> RegionMap {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let labels = GrayImage::from_fn(w, h, |x, y| {
            let c = rows[y as usize].as_bytes()[x as usize];
            Luma([if c == b'#' { 255 } else { 0 }])
        });
        RegionMap::new(labels, stride)
    }

    fn area(points: &[Point]) -> i64 {
        let n = points.len();
        let twice: i64 = (0..n)
            .map(|i| {
                let (a, b) = (points[i], points[(i + 1) % n]);
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice.abs() / 2
    }

    mod trace_contours {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn single_cell_has_four_corners() {
                let region = region_from(&["...", ".#.", "..."], 1);
                let contours = trace_contours(&region);
                assert_eq!(contours.len(), 1);
                assert_eq!(
                    contours[0],
                    vec![
                        Point::new(2, 2),
                        Point::new(3, 2),
                        Point::new(3, 3),
                        Point::new(2, 3)
                    ]
                );
            }

            #[test]
            fn contour_encloses_region_area() {
                let region = region_from(&["......", ".####.", ".##...", ".##...", "......"], 1);
                let contours = trace_contours(&region);
                assert_eq!(contours.len(), 1);
                assert_eq!(area(&contours[0]), 8);
            }

            #[test]
            fn diagonal_cells_are_separate_regions() {
                let region = region_from(&["#.", ".#"], 1);
                assert_eq!(trace_contours(&region).len(), 2);
            }

            #[test]
            fn holes_are_traced() {
                let region = region_from(&["#####", "#...#", "#...#", "#####"], 1);
                let contours = trace_contours(&region);
                assert_eq!(contours.len(), 2);
                assert_eq!(area(&contours[0]), 20);
                assert_eq!(area(&contours[1]), 6);
            }

            #[test]
            fn black_touching_the_frame_is_not_a_hole() {
                let region = region_from(&["###", "#..", "###"], 1);
                assert_eq!(trace_contours(&region).len(), 1);
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Consecutive contour points are one lattice step apart, including the wrap.
                #[test]
                fn contours_are_closed_lattice_paths(
                    cells in proptest::collection::vec(any::<bool>(), 36)
                ) {
                    let labels = GrayImage::from_fn(6, 6, |x, y| {
                        Luma([if cells[(y * 6 + x) as usize] { 255 } else { 0 }])
                    });
                    let region = RegionMap::new(labels, 1);
                    for contour in trace_contours(&region) {
                        prop_assert!(contour.len() >= 4);
                        for i in 0..contour.len() {
                            let (a, b) = (contour[i], contour[(i + 1) % contour.len()]);
                            prop_assert_eq!((a.x - b.x).abs() + (a.y - b.y).abs(), 1);
                        }
                    }
                }
            }
        }
    }

    mod vectorize {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn half_split_has_frozen_ends_and_moveable_interior() {
                // Right half white on a 4x6 grid: seam runs down column 2.
                let region = region_from(&["..##", "..##", "..##", "..##", "..##", "..##"], 1);
                let rings = vectorize(&region, 2, (4, 6));
                assert_eq!(rings.len(), 1);
                let vertices = rings[0].vertices();
                let moveable: Vec<_> = vertices.iter().filter(|v| v.moveable).collect();
                assert!(!moveable.is_empty());
                assert!(moveable.iter().all(|v| v.point.x == 2));
                // Every frozen vertex is on the canvas border.
                for v in vertices.iter().filter(|v| !v.moveable) {
                    let p = v.point;
                    assert!(p.x == 0 || p.y == 0 || p.x == 4 || p.y == 6, "{p:?}");
                }
                assert!(rings[0].is_closed());
            }

            #[test]
            fn border_runs_collapse_to_endpoints() {
                let region = region_from(&["####", "####", "####"], 1);
                let rings = vectorize(&region, 4, (4, 3));
                let points: Vec<_> = rings[0].vertices().iter().map(|v| v.point).collect();
                assert_eq!(
                    points,
                    vec![
                        Point::new(0, 0),
                        Point::new(4, 0),
                        Point::new(4, 3),
                        Point::new(0, 3)
                    ]
                );
            }

            #[test]
            fn coarse_vertices_scale_by_stride_and_clamp() {
                let region = region_from(&["..##", "..##"], 8);
                let rings = vectorize(&region, 1, (30, 12));
                let points: Vec<_> = rings[0].vertices().iter().map(|v| v.point).collect();
                assert!(points.contains(&Point::new(16, 0)));
                assert!(points.contains(&Point::new(30, 12)));
            }

            #[test]
            fn uncovered_vertices_freeze() {
                let region = region_from(&["..##", "..##", "..##"], 1);
                let mut ring = vectorize(&region, 1, (4, 3)).remove(0);
                let empty = Footprint::empty(4, 3);
                freeze_uncovered(&mut ring, &empty, &empty);
                assert!(ring.vertices().iter().all(|v| !v.moveable));
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// The set of frozen vertices does not depend on the spacing.
                #[test]
                fn spacing_never_drops_frozen_vertices(
                    cells in proptest::collection::vec(any::<bool>(), 49),
                    distance in 1u32..50,
                ) {
                    let labels = GrayImage::from_fn(7, 7, |x, y| {
                        Luma([if cells[(y * 7 + x) as usize] { 255 } else { 0 }])
                    });
                    let region = RegionMap::new(labels, 1);
                    let frozen = |d: u32| -> Vec<Vec<Point>> {
                        vectorize(&region, d, (7, 7))
                            .iter()
                            .map(|r| r.vertices().iter().filter(|v| !v.moveable).map(|v| v.point).collect())
                            .collect()
                    };
                    prop_assert_eq!(frozen(1), frozen(distance));
                }

                /// Every vectorized contour is a closed ring.
                #[test]
                fn rings_are_closed(cells in proptest::collection::vec(any::<bool>(), 49), distance in 1u32..8) {
                    let labels = GrayImage::from_fn(7, 7, |x, y| {
                        Luma([if cells[(y * 7 + x) as usize] { 255 } else { 0 }])
                    });
                    for ring in vectorize(&RegionMap::new(labels, 1), distance, (7, 7)) {
                        prop_assert!(ring.is_closed());
                        prop_assert!(!ring.is_empty());
                    }
                }
            }
        }
    }

    mod split {
        use super::*;

        fn m(x: i32) -> Vertex {
            Vertex::moveable(Point::new(x, 0))
        }

        fn f(x: i32) -> Vertex {
            Vertex::frozen(Point::new(x, 0))
        }

        fn xs(segment: &Segment) -> Vec<i32> {
            segment.vertices().iter().map(|v| v.point.x).collect()
        }

        mod unit {
            use super::*;

            #[test]
            fn all_moveable_is_one_closed_segment() {
                let contour = Contour::split(&VertexRing::from_vertices([m(0), m(1), m(2)]));
                assert_eq!(contour.segments().len(), 1);
                assert!(contour.segments()[0].is_closed());
                assert_eq!(contour.segments()[0].links().len(), 3);
            }

            #[test]
            fn rotates_to_first_frozen_and_splits() {
                let ring = VertexRing::from_vertices([m(1), f(2), f(3), m(4), m(5), f(6), m(7)]);
                let contour = Contour::split(&ring);
                let runs: Vec<_> = contour.segments().iter().map(xs).collect();
                assert_eq!(runs, vec![vec![2, 3, 4, 5, 6], vec![6, 7, 1, 2]]);
                assert!(contour.segments().iter().all(|s| !s.is_closed()));
            }

            #[test]
            fn polygon_lists_shared_ends_once() {
                let ring = VertexRing::from_vertices([f(0), m(1), f(2), m(3)]);
                let contour = Contour::split(&ring);
                let xs: Vec<_> = contour.polygon().iter().map(|p| p.x).collect();
                assert_eq!(xs, vec![0, 1, 2, 3, 0]);
            }

            #[test]
            fn trailing_frozen_run_is_kept() {
                let ring = VertexRing::from_vertices([f(0), m(1), f(2), f(3), f(4)]);
                let runs: Vec<_> = Contour::split(&ring).segments().iter().map(xs).collect();
                assert_eq!(runs, vec![vec![0, 1, 2], vec![2, 3, 4, 0]]);
            }
        }
    }
}
