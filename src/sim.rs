//! In-memory map widget.
//!
//! `SimMap` implements [`MapHost`] over a Web-Mercator world of 256 px tiles,
//! a viewport given by its center and pixel size, and plain stores for
//! markers, leg lines and listener registrations. The CLI replays scenes on
//! it and the tests use it to observe placement and listener lifetimes.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::geo::{LatLng, LatLngBounds, Point};
use crate::map::{
    EventKind, EventTarget, Icon, ListenerHandle, MapEvent, MapHost, MarkerId, MarkerOptions,
    Polyline, PolylineId,
};

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

#[derive(Debug, Clone, PartialEq)]
pub struct SimMarker {
    pub position: LatLng,
    pub title: Option<String>,
    pub icon: Option<Icon>,
    pub z_index: i32,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct SimMap {
    center: LatLng,
    zoom: f64,
    width: f64,
    height: f64,
    markers: BTreeMap<MarkerId, SimMarker>,
    polylines: BTreeMap<PolylineId, Polyline>,
    listeners: BTreeMap<u64, ListenerHandle>,
    next_marker: u64,
    next_polyline: u64,
    next_listener: u64,
}

impl SimMap {
    pub fn new(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            markers: BTreeMap::new(),
            polylines: BTreeMap::new(),
            listeners: BTreeMap::new(),
            next_marker: 1,
            next_polyline: 1,
            next_listener: 1,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.center = center;
    }

    /// Moves the viewport by a pixel delta at the current zoom.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let center_px = self.coord_to_offset(self.center);
        self.center = self.offset_to_coord(center_px.offset(dx, dy));
    }

    /// Moves a marker as a finished drag would. The caller fires `DragEnd`.
    pub fn drag_marker(&mut self, id: MarkerId, position: LatLng) {
        self.set_marker_position(id, position);
    }

    /// Screen-space position (0,0 = top-left of the viewport).
    pub fn to_screen(&self, position: LatLng) -> Point {
        let origin = self.viewport_origin();
        let world = self.coord_to_offset(position);
        Point::new(world.x - origin.x, world.y - origin.y)
    }

    pub fn from_screen(&self, screen: Point) -> LatLng {
        let origin = self.viewport_origin();
        self.offset_to_coord(screen.offset(origin.x, origin.y))
    }

    pub fn marker(&self, id: MarkerId) -> Option<&SimMarker> {
        self.markers.get(&id)
    }

    pub fn markers(&self) -> impl Iterator<Item = (MarkerId, &SimMarker)> {
        self.markers.iter().map(|(id, marker)| (*id, marker))
    }

    pub fn visible_markers(&self) -> Vec<MarkerId> {
        self.markers
            .iter()
            .filter(|(_, marker)| marker.visible)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn polylines(&self) -> impl Iterator<Item = &Polyline> {
        self.polylines.values()
    }

    pub fn live_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// True when at least one live registration would receive `event`.
    pub fn fire(&self, event: MapEvent) -> bool {
        self.listeners.values().any(|handle| handle.matches(&event))
    }

    fn scale(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    fn viewport_origin(&self) -> Point {
        let center = self.coord_to_offset(self.center);
        center.offset(-self.width / 2.0, -self.height / 2.0)
    }
}

impl MapHost for SimMap {
    fn coord_to_offset(&self, position: LatLng) -> Point {
        let scale = self.scale();
        let lat = position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin = lat.to_radians().sin();
        let x = (position.lng + 180.0) / 360.0 * scale;
        let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * scale;
        Point::new(x, y)
    }

    fn offset_to_coord(&self, offset: Point) -> LatLng {
        let scale = self.scale();
        let lng = offset.x / scale * 360.0 - 180.0;
        let n = PI - 2.0 * PI * offset.y / scale;
        let lat = n.sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn bounds(&self) -> LatLngBounds {
        let center = self.coord_to_offset(self.center);
        let sw = self.offset_to_coord(center.offset(-self.width / 2.0, self.height / 2.0));
        let ne = self.offset_to_coord(center.offset(self.width / 2.0, -self.height / 2.0));
        LatLngBounds::new(sw, ne)
    }

    fn create_marker(&mut self, options: MarkerOptions) -> MarkerId {
        let id = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.markers.insert(
            id,
            SimMarker {
                position: options.position,
                title: options.title,
                icon: options.icon,
                z_index: options.z_index,
                visible: options.visible,
            },
        );
        id
    }

    fn destroy_marker(&mut self, id: MarkerId) {
        self.markers.remove(&id);
        self.listeners
            .retain(|_, handle| handle.target != EventTarget::Marker(id));
    }

    fn set_marker_visible(&mut self, id: MarkerId, visible: bool) {
        if let Some(marker) = self.markers.get_mut(&id) {
            marker.visible = visible;
        }
    }

    fn is_marker_visible(&self, id: MarkerId) -> bool {
        self.markers.get(&id).is_some_and(|marker| marker.visible)
    }

    fn marker_position(&self, id: MarkerId) -> Option<LatLng> {
        self.markers.get(&id).map(|marker| marker.position)
    }

    fn set_marker_position(&mut self, id: MarkerId, position: LatLng) {
        if let Some(marker) = self.markers.get_mut(&id) {
            marker.position = position;
        }
    }

    fn marker_icon(&self, id: MarkerId) -> Option<Icon> {
        self.markers.get(&id).and_then(|marker| marker.icon.clone())
    }

    fn set_marker_icon(&mut self, id: MarkerId, icon: Icon) {
        if let Some(marker) = self.markers.get_mut(&id) {
            marker.icon = Some(icon);
        }
    }

    fn marker_z_index(&self, id: MarkerId) -> Option<i32> {
        self.markers.get(&id).map(|marker| marker.z_index)
    }

    fn set_marker_z_index(&mut self, id: MarkerId, z_index: i32) {
        if let Some(marker) = self.markers.get_mut(&id) {
            marker.z_index = z_index;
        }
    }

    fn marker_title(&self, id: MarkerId) -> Option<String> {
        self.markers.get(&id).and_then(|marker| marker.title.clone())
    }

    fn add_polyline(&mut self, line: Polyline) -> PolylineId {
        let id = PolylineId(self.next_polyline);
        self.next_polyline += 1;
        self.polylines.insert(id, line);
        id
    }

    fn remove_polyline(&mut self, id: PolylineId) {
        self.polylines.remove(&id);
    }

    fn subscribe(&mut self, target: EventTarget, kind: EventKind) -> ListenerHandle {
        let handle = ListenerHandle {
            id: self.next_listener,
            target,
            kind,
        };
        self.next_listener += 1;
        self.listeners.insert(handle.id, handle);
        handle
    }

    fn unsubscribe(&mut self, handle: ListenerHandle) {
        self.listeners.remove(&handle.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seoul() -> SimMap {
        SimMap::new(LatLng::new(37.5665, 126.978), 10.0, 800.0, 600.0)
    }

    #[test]
    fn projection_round_trips() {
        let map = seoul();
        let position = LatLng::new(37.55, 127.01);
        let back = map.offset_to_coord(map.coord_to_offset(position));
        assert!((back.lat - position.lat).abs() < 1e-9);
        assert!((back.lng - position.lng).abs() < 1e-9);
    }

    #[test]
    fn zoom_doubles_pixel_distances() {
        let mut map = seoul();
        let a = LatLng::new(37.55, 126.95);
        let b = LatLng::new(37.56, 126.99);
        let near = map.coord_to_offset(a).distance(&map.coord_to_offset(b));
        map.set_zoom(11.0);
        let far = map.coord_to_offset(a).distance(&map.coord_to_offset(b));
        assert!((far / near - 2.0).abs() < 1e-9);
    }

    #[test]
    fn viewport_bounds_match_screen_corners() {
        let map = seoul();
        let bounds = map.bounds();
        assert!(bounds.contains(map.center()));
        let top_left = map.to_screen(LatLng::new(bounds.ne.lat, bounds.sw.lng));
        assert!(top_left.x.abs() < 1e-6);
        assert!(top_left.y.abs() < 1e-6);
        assert!(!bounds.contains(map.from_screen(Point::new(-5.0, 300.0))));
    }

    #[test]
    fn destroying_a_marker_drops_its_listeners() {
        let mut map = seoul();
        let id = map.create_marker(MarkerOptions::at(map.center()));
        map.subscribe(EventTarget::Marker(id), EventKind::Click);
        map.subscribe(EventTarget::Map, EventKind::Idle);
        assert_eq!(map.live_listener_count(), 2);
        map.destroy_marker(id);
        assert_eq!(map.live_listener_count(), 1);
        assert!(!map.fire(MapEvent::marker(id, EventKind::Click)));
        assert!(map.fire(MapEvent::map(EventKind::Idle)));
    }
}
