//! Detection of conflict areas from the intersections of lane edges.

use super::builder::ConflictCounters;
use super::width::WidthGenerator;
use super::{ConflictSide, ConflictType};
use crate::math::{Polygon2d, Polyline2d};
use crate::{Lane, TrafficResult};
use log::{info, warn};
use std::sync::atomic::Ordering;

/// Fractions closer than this describe a conflict without length.
const FRACTION_TOLERANCE: f64 = 1e-8;

/// Relative amount by which the bounds of a conflict without length are moved apart.
const FRACTION_NUDGE: f64 = 1e-3;

/// The left and right edge of the conflict area of a lane.
#[derive(Clone, Debug)]
pub(crate) struct LaneEdges {
    pub left: Polyline2d,
    pub right: Polyline2d,
}

impl LaneEdges {
    pub fn new(lane: &Lane, width: &dyn WidthGenerator) -> TrafficResult<Self> {
        let (start, end) = (width.width(lane, 0.0), width.width(lane, 1.0));
        Ok(Self {
            left: lane.center_line().offset_line(0.5 * start, 0.5 * end)?,
            right: lane.center_line().offset_line(-0.5 * start, -0.5 * end)?,
        })
    }
}

/// An intersection between an edge of one lane and an edge of another lane.
#[derive(Clone, Copy, Debug)]
struct Intersection {
    fraction1: f64,
    fraction2: f64,
    /// Which edges intersect: 0 is left/left, 1 is left/right, 2 is right/left and 3 is right/right.
    combo: usize,
}

impl Intersection {
    /// Returns true for intersections between a left and a right edge.
    fn is_left_right(&self) -> bool {
        self.combo == 1 || self.combo == 2
    }
}

/// All intersections between the edges of two lanes, ordered by the fraction along the first lane.
fn intersections(edges1: &LaneEdges, edges2: &LaneEdges) -> Vec<Intersection> {
    let combos = [
        (&edges1.left, &edges2.left),
        (&edges1.left, &edges2.right),
        (&edges1.right, &edges2.left),
        (&edges1.right, &edges2.right),
    ];
    let mut out = combos
        .iter()
        .enumerate()
        .flat_map(|(combo, (line1, line2))| {
            line1.intersections(line2).into_iter().map(move |i| Intersection {
                fraction1: i.fraction1,
                fraction2: i.fraction2,
                combo,
            })
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| {
        a.fraction1
            .total_cmp(&b.fraction1)
            .then(a.fraction2.total_cmp(&b.fraction2))
            .then(a.combo.cmp(&b.combo))
    });
    out
}

/// How two lanes are connected.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PairTopology {
    /// The lanes share a downstream lane.
    pub merge: bool,
    /// The lanes share an upstream lane.
    pub split: bool,
    /// The lanes belong to the same link.
    pub same_link: bool,
}

/// A conflict between two lanes, as fractions of the length of each lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Region {
    pub conflict_type: ConflictType,
    pub fractions1: (f64, f64),
    pub fractions2: (f64, f64),
}

/// Finds the merge, split and crossing areas between two lanes.
pub(crate) fn find_regions(
    edges1: &LaneEdges,
    edges2: &LaneEdges,
    topology: PairTopology,
    counters: &ConflictCounters,
) -> Vec<Region> {
    let mut intersections = intersections(edges1, edges2);
    let mut regions = vec![];

    if topology.merge {
        // The last left/right crossing; any later ones come from the lanes ending together
        let start = intersections
            .iter()
            .rev()
            .find(|i| i.is_left_right())
            .map(|i| (i.fraction1, i.fraction2));
        let (f1, f2) = match start {
            Some((f1, f2)) => {
                intersections.retain(|i| i.fraction1 < f1);
                (f1, f2)
            }
            None => {
                info!("Fixing fractions of merge conflict");
                counters.merge_fixes.fetch_add(1, Ordering::Relaxed);
                (0.0, 0.0)
            }
        };
        regions.push(Region {
            conflict_type: ConflictType::Merge,
            fractions1: (f1, 1.0),
            fractions2: (f2, 1.0),
        });
    }

    if topology.split {
        // The first left/right crossing; any earlier ones come from the lanes starting together
        let end = intersections
            .iter()
            .find(|i| i.is_left_right())
            .map(|i| (i.fraction1, i.fraction2));
        let (f1, f2) = match end {
            Some((f1, f2)) => {
                let skip = intersections.iter().take_while(|i| i.fraction1 <= f1).count();
                intersections.drain(..skip);
                (f1, f2)
            }
            None => {
                info!("Fixing fractions of split conflict");
                counters.split_fixes.fetch_add(1, Ordering::Relaxed);
                (1.0, 1.0)
            }
        };
        regions.push(Region {
            conflict_type: ConflictType::Split,
            fractions1: (0.0, f1),
            fractions2: (0.0, f2),
        });
    }

    if !topology.same_link {
        regions.extend(crossings(&intersections, counters));
    }

    regions
}

/// Walks the intersections in order, toggling the crossed state of each edge combination.
/// A crossing ends once all four combinations are crossed, or none is.
fn crossings(intersections: &[Intersection], counters: &ConflictCounters) -> Vec<Region> {
    struct Open {
        f1_start: f64,
        f2_start: f64,
        f2_end: f64,
    }

    let mut out = vec![];
    let mut crossed = [false; 4];
    let mut open: Option<Open> = None;
    for i in intersections {
        let region = open.get_or_insert(Open {
            f1_start: i.fraction1,
            f2_start: i.fraction2,
            f2_end: i.fraction2,
        });
        region.f2_start = region.f2_start.min(i.fraction2);
        region.f2_end = region.f2_end.max(i.fraction2);

        crossed[i.combo] = !crossed[i.combo];
        if crossed.iter().all(|c| *c) || crossed.iter().all(|c| !*c) {
            if let Some(region) = open.take() {
                out.push(Region {
                    conflict_type: ConflictType::Crossing,
                    fractions1: (region.f1_start, i.fraction1),
                    fractions2: (region.f2_start, region.f2_end),
                });
            }
        }
    }
    if let Some(region) = open {
        warn!(
            "Crossing conflict starting at fraction {:.4} is never closed, skipping it",
            region.f1_start
        );
        counters.crossing_fixes.fetch_add(1, Ordering::Relaxed);
    }
    out
}

/// Creates one side of a conflict pair, on `lane` between two fractions of its length.
pub(crate) fn conflict_side(
    lane: &Lane,
    fractions: (f64, f64),
    width: &dyn WidthGenerator,
) -> TrafficResult<ConflictSide> {
    let (start, end) = fractions;
    Ok(ConflictSide {
        lane: lane.id(),
        position: lane.length() * start.min(end),
        length: lane.length() * (end - start).abs(),
        footprint: footprint(lane, start, end, width)?,
    })
}

/// The outline of the conflict area: the left edge forward, then the right edge back.
fn footprint(lane: &Lane, start: f64, end: f64, width: &dyn WidthGenerator) -> TrafficResult<Polygon2d> {
    let (mut f1, mut f2) = if end > start { (start, end) } else { (end, start) };
    if (f1 - f2).abs() < FRACTION_TOLERANCE {
        if f1 > 0.0 {
            f1 -= f1 * FRACTION_NUDGE;
        } else {
            f2 = (f2 + FRACTION_NUDGE).min(1.0);
        }
    }
    let center = lane.center_line().extract_fractional(f1, f2)?;
    let (w1, w2) = (width.width(lane, f1), width.width(lane, f2));
    let left = center.offset_line(0.5 * w1, 0.5 * w2)?;
    let right = center.offset_line(-0.5 * w1, -0.5 * w2)?.reverse();
    Ok(Polygon2d::new(
        left.points().iter().chain(right.points()).copied().collect(),
    ))
}
