//! The capabilities the clustering and spiderfying code expects from the
//! map widget that hosts them.
//!
//! Markers, leg lines and listener registrations are all owned by the host;
//! the engine only ever holds their ids. Event delivery is explicit: the host
//! turns whatever its widget reports into a [`MapEvent`] and hands it to each
//! component's `handle_event`, which reacts only if it still holds a live
//! [`ListenerHandle`] for that target and kind.

use serde::{Deserialize, Serialize};

use crate::geo::{LatLng, LatLngBounds, Point};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MarkerId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PolylineId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Viewport settled after a pan or zoom.
    Idle,
    DragEnd,
    Click,
    ZoomChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    Map,
    Marker(MarkerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapEvent {
    pub target: EventTarget,
    pub kind: EventKind,
}

impl MapEvent {
    pub fn map(kind: EventKind) -> Self {
        Self {
            target: EventTarget::Map,
            kind,
        }
    }

    pub fn marker(id: MarkerId, kind: EventKind) -> Self {
        Self {
            target: EventTarget::Marker(id),
            kind,
        }
    }
}

/// Disposable registration returned by [`MapHost::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    pub id: u64,
    pub target: EventTarget,
    pub kind: EventKind,
}

impl ListenerHandle {
    pub fn matches(&self, event: &MapEvent) -> bool {
        self.target == event.target && self.kind == event.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Icon {
    Html {
        content: String,
        anchor: Point,
    },
    Image {
        url: String,
        width: f64,
        height: f64,
        anchor: Point,
    },
}

impl Icon {
    pub fn html(content: impl Into<String>, anchor: Point) -> Self {
        Icon::Html {
            content: content.into(),
            anchor,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Icon::Html { content, .. } => Some(content),
            Icon::Image { .. } => None,
        }
    }

    /// Same icon with its HTML content swapped; image icons are returned as-is.
    pub fn with_content(&self, new_content: String) -> Icon {
        match self {
            Icon::Html { anchor, .. } => Icon::Html {
                content: new_content,
                anchor: *anchor,
            },
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub position: LatLng,
    pub title: Option<String>,
    pub icon: Option<Icon>,
    pub z_index: i32,
    pub visible: bool,
}

impl MarkerOptions {
    pub fn at(position: LatLng) -> Self {
        Self {
            position,
            title: None,
            icon: None,
            z_index: 100,
            visible: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub path: Vec<LatLng>,
    pub stroke_color: String,
    pub stroke_weight: f64,
    pub stroke_opacity: f64,
}

/// Map widget contract.
///
/// Marker operations on an unknown id are no-ops (getters return `None`).
/// Placement calls are idempotent: showing a visible marker or hiding a
/// hidden one changes nothing.
pub trait MapHost {
    fn coord_to_offset(&self, position: LatLng) -> Point;
    fn offset_to_coord(&self, offset: Point) -> LatLng;
    fn zoom(&self) -> f64;
    fn bounds(&self) -> LatLngBounds;

    fn create_marker(&mut self, options: MarkerOptions) -> MarkerId;
    fn destroy_marker(&mut self, id: MarkerId);
    fn set_marker_visible(&mut self, id: MarkerId, visible: bool);
    fn is_marker_visible(&self, id: MarkerId) -> bool;
    fn marker_position(&self, id: MarkerId) -> Option<LatLng>;
    fn set_marker_position(&mut self, id: MarkerId, position: LatLng);
    fn marker_icon(&self, id: MarkerId) -> Option<Icon>;
    fn set_marker_icon(&mut self, id: MarkerId, icon: Icon);
    fn marker_z_index(&self, id: MarkerId) -> Option<i32>;
    fn set_marker_z_index(&mut self, id: MarkerId, z_index: i32);
    fn marker_title(&self, id: MarkerId) -> Option<String>;

    fn add_polyline(&mut self, line: Polyline) -> PolylineId;
    fn remove_polyline(&mut self, id: PolylineId);

    fn subscribe(&mut self, target: EventTarget, kind: EventKind) -> ListenerHandle;
    fn unsubscribe(&mut self, handle: ListenerHandle);
}

/// Releases every handle in `handles`, leaving it empty.
pub(crate) fn unsubscribe_all<H: MapHost + ?Sized>(
    host: &mut H,
    handles: &mut Vec<ListenerHandle>,
) {
    for handle in handles.drain(..) {
        host.unsubscribe(handle);
    }
}
