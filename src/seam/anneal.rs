//! Phase 1 of seam optimization: stochastic relocation of moveable vertices.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::AnnealOptions;
use crate::seam::contour::Segment;
use crate::seam::cost::{CostField, FORBIDDEN};
use crate::seam::ring::{Point, Vertex};

/// Random generator shared by every segment of one seam.
pub fn seeded_rng(options: &AnnealOptions) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(options.seed)
}

/// Move each moveable vertex of `segment` towards cheaper cost-field pixels.
///
/// Every vertex stays within `options.radius` grid cells of where it started.
/// A vertex never ends on a position whose window cost exceeds its starting one.
pub fn anneal_segment<R: Rng>(
    segment: &mut Segment,
    cost: &CostField,
    options: &AnnealOptions,
    rng: &mut R,
) {
    let radius = options.radius as i32;
    let (w, h) = (cost.width() as i32, cost.height() as i32);
    let ring = segment.ring_mut();
    for id in ring.ids() {
        let vertex = *ring.vertex(id);
        if !vertex.moveable {
            continue;
        }
        let origin = cost.to_grid(vertex.point);
        let mut current_energy = cost.window_sum(origin);
        let mut best = (current_energy, origin);

        for k in 0..options.kmax {
            let temperature =
                options.initial_temperature * (1.0 - k as f64 / options.kmax.max(1) as f64);
            for _ in 0..options.candidates {
                let candidate = Point::new(
                    (origin.x + rng.random_range(-radius..=radius)).clamp(0, w - 1),
                    (origin.y + rng.random_range(-radius..=radius)).clamp(0, h - 1),
                );
                let energy = cost.window_sum(candidate);
                let accept = energy <= current_energy
                    || (temperature > 0.0
                        && rng.random::<f64>()
                            < (-((energy - current_energy) as f64) / temperature).exp());
                if accept {
                    current_energy = energy;
                    if energy < best.0 {
                        best = (energy, candidate);
                    }
                }
            }
        }
        if best.1 != origin {
            *ring.vertex_mut(id) = Vertex::moveable(cost.to_canvas(best.1));
        }
    }
}

/// Delete moveable vertices still resting on forbidden pixels.
///
/// When a frozen vertex would lose every moveable successor before the next
/// frozen vertex, a moveable placeholder is inserted at the next vertex's
/// position so the pair is still reconnected.
pub fn prune_forbidden(segment: &mut Segment, cost: &CostField) {
    let ring = segment.ring_mut();
    for id in ring.ids() {
        let vertex = *ring.vertex(id);
        if !vertex.moveable || cost.at(cost.to_grid(vertex.point)) != FORBIDDEN {
            continue;
        }
        let prev = ring.prev(id);
        let Some(next) = ring.remove(id) else {
            break;
        };
        let (before, after) = (*ring.vertex(prev), *ring.vertex(next));
        if !before.moveable && !after.moveable && prev != next {
            ring.insert_after(prev, Vertex::moveable(after.point));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::Plane;

    /// A 21x21 field that is forbidden except for a cheap vertical channel at `x == 10`.
    fn channel_field() -> CostField {
        let plane = Plane::try_from_fn(21, 21, |x, _| if x == 10 { 0 } else { 200 }).unwrap();
        CostField::from_plane(plane, 1, (21, 21))
    }

    mod anneal_segment {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn vertices_drift_into_cheap_channel() {
                let field = channel_field();
                let mut segment = Segment::open(vec![
                    Vertex::frozen(Point::new(10, 0)),
                    Vertex::moveable(Point::new(12, 10)),
                    Vertex::frozen(Point::new(10, 20)),
                ]);
                let options = AnnealOptions::default().with_kmax(40);
                anneal_segment(&mut segment, &field, &options, &mut seeded_rng(&options));
                let moved = segment.vertices()[1];
                assert!(moved.moveable);
                assert!((moved.point.x - 10).abs() <= 1, "ended at {:?}", moved.point);
            }

            #[test]
            fn frozen_vertices_never_move() {
                let field = channel_field();
                let ends = [Point::new(3, 0), Point::new(18, 20)];
                let mut segment = Segment::open(vec![
                    Vertex::frozen(ends[0]),
                    Vertex::moveable(Point::new(5, 5)),
                    Vertex::frozen(ends[1]),
                ]);
                let options = AnnealOptions::default();
                anneal_segment(&mut segment, &field, &options, &mut seeded_rng(&options));
                let vertices = segment.vertices();
                assert_eq!(vertices[0].point, ends[0]);
                assert_eq!(vertices[2].point, ends[1]);
            }

            #[test]
            fn same_seed_same_result() {
                let field = channel_field();
                let run = || {
                    let mut segment = Segment::closed(vec![
                        Vertex::moveable(Point::new(4, 4)),
                        Vertex::moveable(Point::new(16, 16)),
                    ]);
                    let options = AnnealOptions::default().with_seed(7);
                    anneal_segment(&mut segment, &field, &options, &mut seeded_rng(&options));
                    segment.vertices()
                };
                assert_eq!(run(), run());
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Window cost under a vertex never rises and the vertex stays within the radius.
                #[test]
                fn never_worse_and_bounded(
                    x in 0i32..21, y in 0i32..21, seed in any::<u64>(),
                    values in proptest::collection::vec(0u8..=255, 441),
                ) {
                    let plane = Plane::try_from_fn(21, 21, |px, py| values[py * 21 + px]).unwrap();
                    let field = CostField::from_plane(plane, 1, (21, 21));
                    let start = Point::new(x, y);
                    let mut segment = Segment::closed(vec![Vertex::moveable(start)]);
                    let options = AnnealOptions::default().with_kmax(4).with_seed(seed);
                    anneal_segment(&mut segment, &field, &options, &mut seeded_rng(&options));
                    let end = segment.vertices()[0].point;
                    prop_assert!(field.window_sum(end) <= field.window_sum(start));
                    prop_assert!((end.x - x).abs() <= options.radius as i32);
                    prop_assert!((end.y - y).abs() <= options.radius as i32);
                }
            }
        }
    }

    mod prune_forbidden {
        use super::*;

        fn field_with_hole() -> CostField {
            // Forbidden everywhere except row 0.
            let plane = Plane::try_from_fn(10, 3, |_, y| if y == 0 { 5 } else { FORBIDDEN }).unwrap();
            CostField::from_plane(plane, 1, (10, 3))
        }

        mod unit {
            use super::*;

            #[test]
            fn placeholder_replaces_lost_run() {
                let field = field_with_hole();
                let mut segment = Segment::open(vec![
                    Vertex::frozen(Point::new(0, 0)),
                    Vertex::moveable(Point::new(3, 2)),
                    Vertex::moveable(Point::new(6, 2)),
                    Vertex::frozen(Point::new(9, 0)),
                ]);
                prune_forbidden(&mut segment, &field);
                let vertices = segment.vertices();
                assert_eq!(vertices.len(), 3);
                assert!(vertices[1].moveable);
                assert_eq!(vertices[1].point, Point::new(9, 0));
            }

            #[test]
            fn allowed_vertices_survive() {
                let field = field_with_hole();
                let mut segment = Segment::open(vec![
                    Vertex::frozen(Point::new(0, 0)),
                    Vertex::moveable(Point::new(3, 0)),
                    Vertex::moveable(Point::new(6, 2)),
                    Vertex::frozen(Point::new(9, 0)),
                ]);
                prune_forbidden(&mut segment, &field);
                let points: Vec<_> = segment.vertices().iter().map(|v| v.point).collect();
                assert_eq!(
                    points,
                    vec![Point::new(0, 0), Point::new(3, 0), Point::new(9, 0)]
                );
            }

            #[test]
            fn closed_segment_can_vanish() {
                let field = field_with_hole();
                let mut segment = Segment::closed(vec![
                    Vertex::moveable(Point::new(1, 1)),
                    Vertex::moveable(Point::new(5, 2)),
                ]);
                prune_forbidden(&mut segment, &field);
                assert!(segment.ring().is_empty());
            }
        }
    }
}
