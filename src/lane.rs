use crate::error::TrafficResult;
use crate::math::{ParametricCurve2d, Polygon2d, Polyline2d};
use crate::network::DestinationId;
use crate::util::Interval;
use crate::{LaneId, LinkId};
use smallvec::SmallVec;

/// The maximum distance between centre line samples, in m.
const SAMPLE_SPACING: f64 = 1.0;

/// A single lane of a link.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// The name of the lane.
    name: String,
    /// The link the lane belongs to.
    link: LinkId,
    /// The centre line, in the direction of travel.
    center_line: Polyline2d,
    /// The outline of the lane at full width.
    contour: Polygon2d,
    /// The width at the start and end of the lane, in m.
    width: Interval<f64>,
    /// Lateral offset of the lane centre from the link's design line at the start, in m.
    lateral_offset: f64,
    /// The lanes that precede this one.
    pub(crate) upstream: SmallVec<[LaneId; 2]>,
    /// The lanes that succeed this one.
    pub(crate) downstream: SmallVec<[LaneId; 2]>,
    /// The adjacent lane on the left.
    pub(crate) left: Option<LaneId>,
    /// The adjacent lane on the right.
    pub(crate) right: Option<LaneId>,
    /// Whether vehicles may change to the left lane.
    pub(crate) can_change_left: bool,
    /// Whether vehicles may change to the right lane.
    pub(crate) can_change_right: bool,
    /// The destination this lane leads to directly, if any.
    pub(crate) destination: Option<DestinationId>,
    /// The nearest split at or downstream of this lane.
    pub(crate) downstream_split: Option<LaneId>,
    /// The nearest merge at or upstream of this lane.
    pub(crate) upstream_merge: Option<LaneId>,
}

/// The attributes of a lane.
pub struct LaneAttributes<'a> {
    /// The name of the lane.
    pub name: &'a str,
    /// The link the lane belongs to.
    pub link: LinkId,
    /// A curve defining the centre line of the lane.
    pub curve: &'a dyn ParametricCurve2d,
    /// The width at the start of the lane in m.
    pub start_width: f64,
    /// The width at the end of the lane in m.
    pub end_width: f64,
    /// Lateral offset from the link's design line at the start, positive to the left.
    pub lateral_offset: f64,
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(attribs: &LaneAttributes) -> TrafficResult<Self> {
        let center_line = Polyline2d::from_curve(&attribs.curve, SAMPLE_SPACING)?;
        let width = Interval::new(attribs.start_width, attribs.end_width);
        let left = center_line.offset_line(0.5 * width.min, 0.5 * width.max)?;
        let right = center_line.offset_line(-0.5 * width.min, -0.5 * width.max)?;
        let contour = Polygon2d::new(
            left.points()
                .iter()
                .chain(right.reverse().points())
                .copied()
                .collect(),
        );
        Ok(Self {
            id: LaneId::default(),
            name: attribs.name.to_owned(),
            link: attribs.link,
            center_line,
            contour,
            width,
            lateral_offset: attribs.lateral_offset,
            upstream: SmallVec::new(),
            downstream: SmallVec::new(),
            left: None,
            right: None,
            can_change_left: false,
            can_change_right: false,
            destination: None,
            downstream_split: None,
            upstream_merge: None,
        })
    }

    pub(crate) fn with_id(mut self, id: LaneId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The link this lane belongs to.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.center_line.length()
    }

    pub fn center_line(&self) -> &Polyline2d {
        &self.center_line
    }

    /// The outline of the lane at full width.
    pub fn contour(&self) -> &Polygon2d {
        &self.contour
    }

    /// The width at a fraction of the lane length, in m.
    pub fn width_at(&self, fraction: f64) -> f64 {
        self.width.lerp(fraction)
    }

    pub fn lateral_offset(&self) -> f64 {
        self.lateral_offset
    }

    pub fn upstream(&self) -> &[LaneId] {
        &self.upstream
    }

    pub fn downstream(&self) -> &[LaneId] {
        &self.downstream
    }

    pub fn left(&self) -> Option<LaneId> {
        self.left
    }

    pub fn right(&self) -> Option<LaneId> {
        self.right
    }

    pub fn can_change_left(&self) -> bool {
        self.can_change_left
    }

    pub fn can_change_right(&self) -> bool {
        self.can_change_right
    }

    pub fn destination(&self) -> Option<DestinationId> {
        self.destination
    }

    /// Returns true if traffic on this lane splits over several downstream lanes.
    pub fn is_split(&self) -> bool {
        self.downstream.len() > 1
    }

    /// Returns true if several upstream lanes merge onto this lane.
    pub fn is_merge(&self) -> bool {
        self.upstream.len() > 1
    }

    /// The nearest split at or downstream of this lane, once the topology is initialised.
    pub fn downstream_split(&self) -> Option<LaneId> {
        self.downstream_split
    }

    /// The nearest merge at or upstream of this lane, once the topology is initialised.
    pub fn upstream_merge(&self) -> Option<LaneId> {
        self.upstream_merge
    }
}
