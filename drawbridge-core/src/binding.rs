//! Arrow binding resolution.
//!
//! Inbound arrows and lines may reference their endpoints by element id
//! (`start`/`end` raw form). The resolver rewrites them into absolute
//! geometry anchored on the referenced elements' silhouettes, leaving a
//! uniform gap, and emits the stored-form `startBinding`/`endBinding`
//! records. It is a total function: missing references degrade to a straight
//! default rather than failing.

use std::collections::HashMap;

use crate::{Binding, Element, ElementType, EndpointRef, NormalizedElement};

/// Gap between an arrow endpoint and the silhouette it binds to.
pub const BINDING_GAP: f64 = 8.0;

/// Length of the straight fallback when a referenced element is missing.
const FALLBACK_LENGTH: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct PeerBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    element_type: ElementType,
}

impl PeerBox {
    fn of(element: &Element) -> Self {
        Self {
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
            element_type: element.element_type,
        }
    }

    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Resolve endpoint references for every arrow/line in a batch.
///
/// The working element map is the batch united with the already-stored
/// elements, so intra-batch references resolve. Referenced peers are
/// snapshotted before any arrow is rewritten.
pub fn resolve_batch(items: &mut [NormalizedElement], existing: &[Element]) {
    let mut boxes: HashMap<String, PeerBox> = existing
        .iter()
        .map(|e| (e.id.clone(), PeerBox::of(e)))
        .collect();
    for item in items.iter() {
        boxes.insert(item.element.id.clone(), PeerBox::of(&item.element));
    }

    for item in items.iter_mut() {
        if !matches!(
            item.element.element_type,
            ElementType::Arrow | ElementType::Line
        ) {
            continue;
        }
        if item.start.is_none() && item.end.is_none() {
            continue;
        }
        let start = item.start.take();
        let end = item.end.take();
        resolve_one(&mut item.element, start, end, &boxes);
    }
}

fn resolve_one(
    arrow: &mut Element,
    start: Option<EndpointRef>,
    end: Option<EndpointRef>,
    boxes: &HashMap<String, PeerBox>,
) {
    let raw_start = (arrow.x, arrow.y);
    let raw_end = arrow
        .points
        .as_deref()
        .and_then(<[[f64; 2]]>::last)
        .map_or((arrow.x + FALLBACK_LENGTH, arrow.y), |p| {
            (arrow.x + p[0], arrow.y + p[1])
        });
    let fallback_end = (arrow.x + FALLBACK_LENGTH, arrow.y);

    let start_peer = start.as_ref().and_then(|r| boxes.get(&r.id)).copied();
    let end_peer = end.as_ref().and_then(|r| boxes.get(&r.id)).copied();

    // Anchor for each side: the peer center when bound, the substitute
    // straight default when the reference dangles, the raw point otherwise.
    let start_anchor = start_peer.map_or(raw_start, |peer| peer.center());
    let end_anchor = match (&end, end_peer) {
        (_, Some(peer)) => peer.center(),
        (Some(_), None) => fallback_end,
        (None, None) => raw_end,
    };

    let final_start = start_peer.map_or(start_anchor, |peer| attach_with_gap(&peer, end_anchor));
    let final_end = end_peer.map_or(end_anchor, |peer| attach_with_gap(&peer, start_anchor));

    arrow.x = final_start.0;
    arrow.y = final_start.1;
    arrow.width = (final_end.0 - final_start.0).abs();
    arrow.height = (final_end.1 - final_start.1).abs();
    arrow.points = Some(vec![
        [0.0, 0.0],
        [final_end.0 - final_start.0, final_end.1 - final_start.1],
    ]);
    arrow.start_binding = match (start, start_peer) {
        (Some(r), Some(_)) => Some(Binding {
            element_id: r.id,
            focus: 0.0,
            gap: BINDING_GAP,
        }),
        _ => None,
    };
    arrow.end_binding = match (end, end_peer) {
        (Some(r), Some(_)) => Some(Binding {
            element_id: r.id,
            focus: 0.0,
            gap: BINDING_GAP,
        }),
        _ => None,
    };
}

/// Edge attachment on `peer`'s silhouette toward `target`, pushed
/// [`BINDING_GAP`] further along the same direction.
fn attach_with_gap(peer: &PeerBox, target: (f64, f64)) -> (f64, f64) {
    let (cx, cy) = peer.center();
    let dx = target.0 - cx;
    let dy = target.1 - cy;

    if dx == 0.0 && dy == 0.0 {
        // Degenerate: target sits on the center. Pick the bottom face.
        return (cx, peer.y + peer.height + BINDING_GAP);
    }

    let attach = edge_point(peer, dx, dy);
    let len = dx.hypot(dy);
    (
        attach.0 + BINDING_GAP * dx / len,
        attach.1 + BINDING_GAP * dy / len,
    )
}

/// Silhouette intersection of the ray from `peer`'s center along `(dx, dy)`.
fn edge_point(peer: &PeerBox, dx: f64, dy: f64) -> (f64, f64) {
    let (cx, cy) = peer.center();
    let hw = peer.width / 2.0;
    let hh = peer.height / 2.0;

    match peer.element_type {
        ElementType::Diamond => {
            // Rhombus: |x|/hw + |y|/hh == 1 along the scaled vector.
            let t = 1.0 / (dx.abs() / hw + dy.abs() / hh);
            (cx + dx * t, cy + dy * t)
        }
        ElementType::Ellipse => {
            let theta = dy.atan2(dx);
            (cx + hw * theta.cos(), cy + hh * theta.sin())
        }
        _ => {
            // Bounding-box silhouette: whichever face the ray exits first.
            let tx = if dx == 0.0 { f64::INFINITY } else { hw / dx.abs() };
            let ty = if dy == 0.0 { f64::INFINITY } else { hh / dy.abs() };
            let t = tx.min(ty);
            (cx + dx * t, cy + dy * t)
        }
    }
}
