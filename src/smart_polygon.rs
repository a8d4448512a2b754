//! Smart polygon session: request a proposal, edit it, then commit or cancel.
//!
//! The session is plain state with methods, so every transition can be driven
//! and inspected without a rendering context. Candidate points are kept in
//! image space; screen positions are only used to decide which vertex the
//! pointer is over.

use thiserror::Error;

use crate::config::Thresholds;
use crate::constants::FALLBACK_ALGORITHM;
use crate::geometry;
use crate::model::{CompletedShape, ImageInfo, MIN_POLYGON_VERTICES, Point};
use crate::segmentation::{
    RequestTicket, SegmentationError, SegmentationProposal, SegmentationRequest,
};
use crate::viewport::{ScreenPoint, ViewportState};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartState {
    /// No candidate. A request may be in flight.
    Idle,
    /// A candidate polygon is being edited.
    Editing,
}

/// An auto-proposed polygon under edit.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartPolygonCandidate {
    pub points: Vec<Point>,
    /// In `[0, 1]`
    pub confidence: f32,
    pub algorithm: String,
    pub editing: bool,
}

impl SmartPolygonCandidate {
    fn from_proposal(proposal: SegmentationProposal) -> Self {
        Self {
            points: proposal.points,
            confidence: proposal.confidence,
            algorithm: proposal.algorithm,
            editing: true,
        }
    }

    /// Square of side `2 * half_size` centered on `click`.
    pub fn fallback(click: Point, half_size: f32, confidence: f32) -> Self {
        let points = vec![
            Point::new(click.x - half_size, click.y - half_size),
            Point::new(click.x + half_size, click.y - half_size),
            Point::new(click.x + half_size, click.y + half_size),
            Point::new(click.x - half_size, click.y + half_size),
        ];
        Self {
            points,
            confidence,
            algorithm: FALLBACK_ALGORITHM.to_string(),
            editing: true,
        }
    }
}

/// What applying a segmentation result did.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The proposal became the candidate.
    Applied,
    /// The call failed; the fallback square became the candidate.
    Fallback { reason: String },
    /// The result belongs to a request this session no longer waits for.
    Stale,
}

/// What a primary press while editing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    DragStarted(usize),
    Inserted(usize),
    Nothing,
}

/// Rejected edits. State is unchanged when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("no candidate polygon")]
    NoCandidate,

    #[error("no vertex under the pointer")]
    NoVertex,

    #[error("removing a vertex would leave {remaining} vertices")]
    BelowMinimum { remaining: usize },

    #[error("candidate has {vertices} vertices, at least 3 required")]
    TooFewVertices { vertices: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct InFlight {
    ticket: RequestTicket,
    click: Point,
}

/// Lifecycle of one smart polygon at a time.
#[derive(Debug, Clone, Default)]
pub struct SmartPolygonSession {
    candidate: Option<SmartPolygonCandidate>,
    in_flight: Option<InFlight>,
    /// Vertex being dragged
    dragging: Option<usize>,
    next_ticket: u64,
}

impl SmartPolygonSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SmartState {
        if self.candidate.is_some() {
            SmartState::Editing
        } else {
            SmartState::Idle
        }
    }

    /// A request is waiting for its result.
    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn candidate(&self) -> Option<&SmartPolygonCandidate> {
        self.candidate.as_ref()
    }

    pub fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    /// Issue a request for a click at `click` (image space).
    ///
    /// Returns `None` while a request is in flight or a candidate is being
    /// edited.
    pub fn request_at(
        &mut self,
        click: Point,
        image: &ImageInfo,
    ) -> Option<(RequestTicket, SegmentationRequest)> {
        if self.in_flight.is_some() {
            log::debug!("Smart polygon: request already in flight, ignoring click");
            return None;
        }
        if self.candidate.is_some() {
            return None;
        }

        self.next_ticket += 1;
        let ticket = RequestTicket(self.next_ticket);
        self.in_flight = Some(InFlight { ticket, click });

        let request = SegmentationRequest::new(image.id.clone(), click, image.width, image.height);
        log::info!(
            "Smart polygon: requesting segmentation {:?} at ({}, {})",
            ticket,
            request.x,
            request.y
        );
        Some((ticket, request))
    }

    /// Apply the result of a request.
    ///
    /// Results for any ticket other than the one in flight are dropped
    /// without touching state. Failures become the fallback square.
    pub fn apply_result(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<SegmentationProposal, SegmentationError>,
        thresholds: &Thresholds,
    ) -> ApplyOutcome {
        let Some(in_flight) = self.in_flight else {
            log::debug!("Smart polygon: dropping result {:?}, nothing in flight", ticket);
            return ApplyOutcome::Stale;
        };
        if in_flight.ticket != ticket {
            log::debug!(
                "Smart polygon: dropping result {:?}, waiting for {:?}",
                ticket,
                in_flight.ticket
            );
            return ApplyOutcome::Stale;
        }
        self.in_flight = None;
        self.dragging = None;

        let proposal = outcome.and_then(|p| {
            if p.points.is_empty() {
                Err(SegmentationError::EmptyResult)
            } else {
                Ok(p)
            }
        });

        match proposal {
            Ok(proposal) => {
                log::info!(
                    "Smart polygon: {} vertices from '{}' (confidence {:.2})",
                    proposal.points.len(),
                    proposal.algorithm,
                    proposal.confidence
                );
                self.candidate = Some(SmartPolygonCandidate::from_proposal(proposal));
                ApplyOutcome::Applied
            }
            Err(e) => {
                log::warn!("Smart polygon: segmentation failed ({}), using fallback", e);
                self.candidate = Some(SmartPolygonCandidate::fallback(
                    in_flight.click,
                    thresholds.fallback_half_size,
                    thresholds.fallback_confidence,
                ));
                ApplyOutcome::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Primary press while editing: grab a vertex, or insert one on a
    /// nearby edge.
    pub fn press(
        &mut self,
        pos: ScreenPoint,
        viewport: &ViewportState,
        thresholds: &Thresholds,
    ) -> EditAction {
        let Some(candidate) = self.candidate.as_mut() else {
            return EditAction::Nothing;
        };

        if let Some(idx) = vertex_under(pos, &candidate.points, viewport, thresholds.vertex_hit_px) {
            self.dragging = Some(idx);
            log::debug!("Smart polygon: dragging vertex {}", idx);
            return EditAction::DragStarted(idx);
        }

        let click = viewport.screen_to_image(pos);
        if let Some((edge, dist)) = geometry::nearest_edge(&click, &candidate.points) {
            if dist < thresholds.edge_insert_distance {
                let idx = edge + 1;
                candidate.points.insert(idx, click);
                log::debug!(
                    "Smart polygon: inserted vertex {} on edge {} ({:.1} away)",
                    idx,
                    edge,
                    dist
                );
                return EditAction::Inserted(idx);
            }
        }
        EditAction::Nothing
    }

    /// Move the dragged vertex to `pos`.
    pub fn drag_to(&mut self, pos: ScreenPoint, viewport: &ViewportState) -> bool {
        let (Some(idx), Some(candidate)) = (self.dragging, self.candidate.as_mut()) else {
            return false;
        };
        match candidate.points.get_mut(idx) {
            Some(p) => {
                *p = viewport.screen_to_image(pos);
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self) {
        if let Some(idx) = self.dragging.take() {
            log::debug!("Smart polygon: released vertex {}", idx);
        }
    }

    /// Remove the vertex under `pos`, keeping at least three.
    pub fn remove_vertex_at(
        &mut self,
        pos: ScreenPoint,
        viewport: &ViewportState,
        thresholds: &Thresholds,
    ) -> Result<usize, EditError> {
        let candidate = self.candidate.as_mut().ok_or(EditError::NoCandidate)?;
        let idx = vertex_under(pos, &candidate.points, viewport, thresholds.vertex_hit_px)
            .ok_or(EditError::NoVertex)?;

        let remaining = candidate.points.len() - 1;
        if remaining < MIN_POLYGON_VERTICES {
            return Err(EditError::BelowMinimum { remaining });
        }
        candidate.points.remove(idx);
        self.dragging = None;
        log::debug!("Smart polygon: removed vertex {} ({} left)", idx, remaining);
        Ok(idx)
    }

    /// Commit the candidate as a polygon and return to idle.
    pub fn complete(&mut self) -> Result<CompletedShape, EditError> {
        let candidate = self.candidate.as_ref().ok_or(EditError::NoCandidate)?;
        if candidate.points.len() < MIN_POLYGON_VERTICES {
            return Err(EditError::TooFewVertices {
                vertices: candidate.points.len(),
            });
        }

        let candidate = self.candidate.take().ok_or(EditError::NoCandidate)?;
        self.dragging = None;
        log::info!(
            "Smart polygon: committed {} vertices ({})",
            candidate.points.len(),
            candidate.algorithm
        );
        Ok(CompletedShape::Polygon {
            points: candidate.points,
            smart_generated: true,
            confidence: Some(candidate.confidence),
            algorithm: Some(candidate.algorithm),
        })
    }

    /// Drop the candidate and forget any in-flight request.
    pub fn cancel(&mut self) {
        if self.candidate.is_some() || self.in_flight.is_some() {
            log::debug!("Smart polygon: session cancelled");
        }
        self.candidate = None;
        self.in_flight = None;
        self.dragging = None;
    }
}

/// Nearest vertex within `radius` screen pixels of `pos`.
fn vertex_under(
    pos: ScreenPoint,
    points: &[Point],
    viewport: &ViewportState,
    radius: f32,
) -> Option<usize> {
    let on_screen: Vec<Point> = points
        .iter()
        .map(|p| {
            let s = viewport.image_to_screen(*p);
            Point::new(s.x, s.y)
        })
        .collect();
    geometry::nearest_vertex(&Point::new(pos.x, pos.y), &on_screen, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Size;

    fn image() -> ImageInfo {
        ImageInfo::new("img-7", 640, 480)
    }

    /// Identity transform: screen == image.
    fn identity() -> ViewportState {
        ViewportState::new(100.0, ScreenPoint::new(0.0, 0.0), Size::new(640.0, 480.0))
    }

    fn triangle() -> SegmentationProposal {
        SegmentationProposal {
            points: vec![
                Point::new(100.0, 100.0),
                Point::new(200.0, 100.0),
                Point::new(150.0, 200.0),
            ],
            confidence: 0.8,
            algorithm: "sam".to_string(),
        }
    }

    fn editing_session(proposal: SegmentationProposal) -> SmartPolygonSession {
        let mut session = SmartPolygonSession::new();
        let (ticket, _) = session.request_at(Point::new(150.0, 130.0), &image()).unwrap();
        session.apply_result(ticket, Ok(proposal), &Thresholds::default());
        session
    }

    #[test]
    fn test_request_sets_processing_and_blocks_overlap() {
        let mut session = SmartPolygonSession::new();
        let (ticket, req) = session.request_at(Point::new(10.4, 20.6), &image()).unwrap();
        assert_eq!(req.x, 10);
        assert_eq!(req.y, 21);
        assert_eq!(req.image_id, "img-7");
        assert!(session.is_processing());
        assert_eq!(session.state(), SmartState::Idle);

        assert!(session.request_at(Point::new(50.0, 50.0), &image()).is_none());

        let outcome = session.apply_result(ticket, Ok(triangle()), &Thresholds::default());
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!session.is_processing());
        assert_eq!(session.state(), SmartState::Editing);
        assert!(session.candidate().unwrap().editing);
    }

    #[test]
    fn test_empty_points_fall_back_to_square() {
        let mut session = SmartPolygonSession::new();
        let click = Point::new(300.0, 200.0);
        let (ticket, _) = session.request_at(click, &image()).unwrap();

        let empty = SegmentationProposal {
            points: Vec::new(),
            confidence: 0.9,
            algorithm: "sam".to_string(),
        };
        let outcome = session.apply_result(ticket, Ok(empty), &Thresholds::default());
        assert!(matches!(outcome, ApplyOutcome::Fallback { .. }));

        let candidate = session.candidate().unwrap();
        assert_eq!(candidate.points.len(), 4);
        assert_eq!(candidate.confidence, 0.1);
        assert_eq!(candidate.algorithm, "fallback");
        assert_eq!(
            candidate.points,
            vec![
                Point::new(250.0, 150.0),
                Point::new(350.0, 150.0),
                Point::new(350.0, 250.0),
                Point::new(250.0, 250.0),
            ]
        );
        assert_eq!(session.state(), SmartState::Editing);
    }

    #[test]
    fn test_transport_error_falls_back() {
        let mut session = SmartPolygonSession::new();
        let (ticket, _) = session.request_at(Point::new(0.0, 0.0), &image()).unwrap();
        let outcome = session.apply_result(
            ticket,
            Err(SegmentationError::Transport("connection refused".to_string())),
            &Thresholds::default(),
        );
        match outcome {
            ApplyOutcome::Fallback { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(session.candidate().unwrap().points.len(), 4);
    }

    #[test]
    fn test_result_after_cancel_is_stale() {
        let mut session = SmartPolygonSession::new();
        let (ticket, _) = session.request_at(Point::new(10.0, 10.0), &image()).unwrap();
        session.cancel();

        let outcome = session.apply_result(ticket, Ok(triangle()), &Thresholds::default());
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(session.candidate().is_none());
        assert!(!session.is_processing());
        assert_eq!(session.state(), SmartState::Idle);
    }

    #[test]
    fn test_old_ticket_does_not_apply_to_new_request() {
        let mut session = SmartPolygonSession::new();
        let (old, _) = session.request_at(Point::new(10.0, 10.0), &image()).unwrap();
        session.cancel();
        let (new, _) = session.request_at(Point::new(20.0, 20.0), &image()).unwrap();
        assert_ne!(old, new);

        assert_eq!(
            session.apply_result(old, Ok(triangle()), &Thresholds::default()),
            ApplyOutcome::Stale
        );
        assert!(session.is_processing());
        assert_eq!(
            session.apply_result(new, Ok(triangle()), &Thresholds::default()),
            ApplyOutcome::Applied
        );
    }

    #[test]
    fn test_press_near_vertex_starts_drag() {
        let mut session = editing_session(triangle());
        let vp = identity();
        let t = Thresholds::default();

        assert_eq!(
            session.press(ScreenPoint::new(205.0, 104.0), &vp, &t),
            EditAction::DragStarted(1)
        );
        assert!(session.drag_to(ScreenPoint::new(220.0, 90.0), &vp));
        session.release();
        assert_eq!(session.dragging(), None);
        assert_eq!(session.candidate().unwrap().points[1], Point::new(220.0, 90.0));
    }

    #[test]
    fn test_drag_uses_viewport_transform() {
        let mut session = editing_session(triangle());
        let vp = ViewportState::new(200.0, ScreenPoint::new(10.0, 20.0), Size::new(640.0, 480.0));
        let t = Thresholds::default();

        // Vertex 0 (100,100) sits at screen (210, 220)
        assert_eq!(
            session.press(ScreenPoint::new(212.0, 221.0), &vp, &t),
            EditAction::DragStarted(0)
        );
        session.drag_to(ScreenPoint::new(30.0, 40.0), &vp);
        assert_eq!(session.candidate().unwrap().points[0], Point::new(10.0, 10.0));
    }

    #[test]
    fn test_press_near_edge_inserts_after_edge_start() {
        let mut session = editing_session(triangle());
        let vp = identity();
        let t = Thresholds::default();

        // Midpoint of edge 0 (100,100)-(200,100), 8 units below it
        assert_eq!(
            session.press(ScreenPoint::new(150.0, 108.0), &vp, &t),
            EditAction::Inserted(1)
        );
        let points = &session.candidate().unwrap().points;
        assert_eq!(points.len(), 4);
        assert_eq!(points[1], Point::new(150.0, 108.0));
        assert_eq!(points[2], Point::new(200.0, 100.0));
    }

    #[test]
    fn test_press_far_from_polygon_does_nothing() {
        let mut session = editing_session(triangle());
        let before = session.candidate().cloned();
        assert_eq!(
            session.press(ScreenPoint::new(500.0, 400.0), &identity(), &Thresholds::default()),
            EditAction::Nothing
        );
        assert_eq!(session.candidate().cloned(), before);
    }

    #[test]
    fn test_vertex_removal_floor() {
        let mut session = editing_session(triangle());
        let vp = identity();
        let t = Thresholds::default();

        for pos in [
            ScreenPoint::new(100.0, 100.0),
            ScreenPoint::new(200.0, 100.0),
            ScreenPoint::new(150.0, 200.0),
        ] {
            assert_eq!(
                session.remove_vertex_at(pos, &vp, &t),
                Err(EditError::BelowMinimum { remaining: 2 })
            );
            assert_eq!(session.candidate().unwrap().points.len(), 3);
        }
    }

    #[test]
    fn test_vertex_removal_above_floor() {
        let mut session = editing_session(SegmentationProposal {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            confidence: 0.5,
            algorithm: "sam".to_string(),
        });
        let vp = identity();
        let t = Thresholds::default();

        assert_eq!(session.remove_vertex_at(ScreenPoint::new(98.0, 2.0), &vp, &t), Ok(1));
        assert_eq!(session.candidate().unwrap().points.len(), 3);
        assert_eq!(
            session.remove_vertex_at(ScreenPoint::new(50.0, 50.0), &vp, &t),
            Err(EditError::NoVertex)
        );
    }

    #[test]
    fn test_complete_commits_smart_polygon() {
        let mut session = editing_session(triangle());
        let shape = session.complete().unwrap();
        assert!(shape.is_smart_generated());
        match shape {
            CompletedShape::Polygon {
                points,
                confidence,
                algorithm,
                ..
            } => {
                assert_eq!(points.len(), 3);
                assert_eq!(confidence, Some(0.8));
                assert_eq!(algorithm.as_deref(), Some("sam"));
            }
            other => panic!("expected polygon, got {:?}", other),
        }
        assert_eq!(session.state(), SmartState::Idle);
        assert_eq!(session.complete(), Err(EditError::NoCandidate));
    }

    #[test]
    fn test_complete_rejects_short_candidate() {
        let mut session = editing_session(SegmentationProposal {
            points: vec![Point::new(1.0, 1.0), Point::new(5.0, 5.0)],
            confidence: 0.4,
            algorithm: "sam".to_string(),
        });
        assert_eq!(session.complete(), Err(EditError::TooFewVertices { vertices: 2 }));
        assert_eq!(session.state(), SmartState::Editing);
    }

    #[test]
    fn test_no_new_request_while_editing() {
        let mut session = editing_session(triangle());
        assert!(session.request_at(Point::new(1.0, 1.0), &image()).is_none());
        session.cancel();
        assert!(session.request_at(Point::new(1.0, 1.0), &image()).is_some());
    }
}
