//! Phase 2 of seam optimization: minimum-cost reconnection of vertex pairs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::footprint::Rect;
use crate::seam::contour::Segment;
use crate::seam::cost::CostField;
use crate::seam::ring::{Point, Vertex};

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Cheapest 8-connected path from `from` to `to` inside `window`, in grid coordinates.
///
/// Entering a pixel costs its value. Only the interior points are returned,
/// so the endpoints are never repeated. Endpoints outside the window are
/// clamped into it.
pub fn min_cost_path(cost: &CostField, window: Rect, from: Point, to: Point) -> Vec<Point> {
    if from == to || window.is_empty() {
        return Vec::new();
    }
    let (w, h) = (window.width as usize, window.height as usize);
    let local = |p: Point| -> usize {
        let x = (p.x - window.x).clamp(0, w as i32 - 1) as usize;
        let y = (p.y - window.y).clamp(0, h as i32 - 1) as usize;
        y * w + x
    };
    let global = |i: usize| Point::new(window.x + (i % w) as i32, window.y + (i / w) as i32);
    let (start, goal) = (local(from), local(to));

    let mut dist = vec![u64::MAX; w * h];
    let mut came = vec![usize::MAX; w * h];
    let mut open = BinaryHeap::new();
    dist[start] = 0;
    open.push(Reverse((0u64, start)));

    while let Some(Reverse((d, i))) = open.pop() {
        if i == goal {
            break;
        }
        if d > dist[i] {
            continue;
        }
        let p = global(i);
        for (dx, dy) in NEIGHBOURS {
            let q = Point::new(p.x + dx, p.y + dy);
            if !window.contains(q.x, q.y) {
                continue;
            }
            let j = local(q);
            let nd = d + cost.at(q) as u64;
            if nd < dist[j] {
                dist[j] = nd;
                came[j] = i;
                open.push(Reverse((nd, j)));
            }
        }
    }

    let mut interior = Vec::new();
    let mut i = came[goal];
    while i != start && i != usize::MAX {
        interior.push(global(i));
        i = came[i];
    }
    interior.reverse();
    interior
}

/// Replace every link with a moveable end by the cheapest path between its vertices.
///
/// Path points are inserted as frozen vertices. The search for each link is
/// confined to the pair's bounding box grown by `radius` grid cells.
pub fn reconnect_segment(segment: &mut Segment, cost: &CostField, radius: u32) {
    let bounds = cost.bounds();
    for (a, b) in segment.links() {
        let ring = segment.ring();
        let (va, vb) = (*ring.vertex(a), *ring.vertex(b));
        if !va.moveable && !vb.moveable {
            continue;
        }
        let (ga, gb) = (cost.to_grid(va.point), cost.to_grid(vb.point));
        let pair = Rect::new(
            ga.x.min(gb.x),
            ga.y.min(gb.y),
            ga.x.abs_diff(gb.x) + 1,
            ga.y.abs_diff(gb.y) + 1,
        );
        let Some(window) = pair.grown_within(radius, &bounds) else {
            continue;
        };
        let ring = segment.ring_mut();
        let mut at = a;
        for p in min_cost_path(cost, window, ga, gb) {
            at = ring.insert_after(at, Vertex::frozen(cost.to_canvas(p)));
        }
    }
}

/// Total cost of the straight lines joining consecutive vertices of `segment`.
pub fn seam_cost(segment: &Segment, cost: &CostField) -> u64 {
    let ring = segment.ring();
    segment
        .links()
        .into_iter()
        .map(|(a, b)| {
            cost.line_cost(
                cost.to_grid(ring.vertex(a).point),
                cost.to_grid(ring.vertex(b).point),
            )
        })
        .sum()
}
