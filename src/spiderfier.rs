//! Fans out markers that overlap on screen.
//!
//! Clicking a marker finds every registered marker connected to it through
//! chains of pixel-space overlaps, then lays the whole group out on a ring
//! around the clicked marker's position with a coloured leg back to the
//! center. The layout is undone on the next zoom change or when another
//! group is fanned out.

use std::collections::{HashSet, VecDeque};
use std::f64::consts::PI;

use log::debug;

use crate::config::SpiderfierOptions;
use crate::geo::{LatLng, Point};
use crate::map::{
    EventKind, EventTarget, Icon, ListenerHandle, MapEvent, MapHost, MarkerId, Polyline,
    PolylineId, unsubscribe_all,
};

const FALLBACK_COLOR: &str = "#FF6B6B";
const DEFAULT_Z_INDEX: i32 = 100;

/// One fanned-out marker and what is needed to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiderLeg {
    pub marker: MarkerId,
    pub original_position: LatLng,
    pub original_z_index: i32,
    pub original_icon: Option<Icon>,
    pub fanned_position: LatLng,
    pub color: String,
    pub line: PolylineId,
}

#[derive(Debug, Default)]
pub struct OverlapSpiderfier {
    options: SpiderfierOptions,
    markers: Vec<MarkerId>,
    click_listeners: Vec<ListenerHandle>,
    zoom_listener: Option<ListenerHandle>,
    legs: Vec<SpiderLeg>,
    active: Option<MarkerId>,
}

impl OverlapSpiderfier {
    pub fn new(options: SpiderfierOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SpiderfierOptions {
        &self.options
    }

    pub fn markers(&self) -> &[MarkerId] {
        &self.markers
    }

    /// Legs of the group currently fanned out; empty otherwise.
    pub fn fanned(&self) -> &[SpiderLeg] {
        &self.legs
    }

    /// The marker whose click produced the current fan-out.
    pub fn active(&self) -> Option<MarkerId> {
        self.active
    }

    pub fn add_marker<H: MapHost + ?Sized>(&mut self, host: &mut H, marker: MarkerId) {
        if self.markers.contains(&marker) {
            return;
        }
        self.markers.push(marker);
        self.click_listeners
            .push(host.subscribe(EventTarget::Marker(marker), EventKind::Click));
        if self.zoom_listener.is_none() {
            self.zoom_listener = Some(host.subscribe(EventTarget::Map, EventKind::ZoomChanged));
        }
    }

    /// Restores any fan-out and releases every listener.
    pub fn detach<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        self.unspiderfy(host);
        unsubscribe_all(host, &mut self.click_listeners);
        if let Some(handle) = self.zoom_listener.take() {
            host.unsubscribe(handle);
        }
        self.markers.clear();
    }

    pub fn handle_event<H: MapHost + ?Sized>(&mut self, host: &mut H, event: MapEvent) -> bool {
        if self.zoom_listener.is_some_and(|handle| handle.matches(&event)) {
            self.unspiderfy(host);
            return true;
        }
        let EventTarget::Marker(marker) = event.target else {
            return false;
        };
        if !self.click_listeners.iter().any(|handle| handle.matches(&event)) {
            return false;
        }
        self.click(host, marker);
        true
    }

    /// Click on `marker`: fans out its overlap group, if it has one.
    pub fn click<H: MapHost + ?Sized>(&mut self, host: &mut H, marker: MarkerId) {
        if self.legs.iter().any(|leg| leg.marker == marker) {
            return;
        }
        // Overlaps are measured at rest, so the open group goes home first.
        if self.active.is_some() {
            self.unspiderfy(host);
        }
        let overlapping = self.find_overlapping(&*host, marker);
        if !overlapping.is_empty() {
            self.spiderfy(host, marker, &overlapping);
        }
    }

    /// Registered markers connected to `target` through overlaps, nearest
    /// first. Two markers overlap when they are at most `overlap_distance`
    /// pixels apart. Empty when nothing overlaps `target` directly.
    pub fn find_overlapping<H: MapHost + ?Sized>(
        &self,
        host: &H,
        target: MarkerId,
    ) -> Vec<MarkerId> {
        let Some(target_pos) = host.marker_position(target) else {
            return Vec::new();
        };
        let limit = self.options.overlap_distance;

        let direct: Vec<MarkerId> = self
            .markers
            .iter()
            .copied()
            .filter(|marker| *marker != target)
            .filter(|marker| {
                host.marker_position(*marker)
                    .is_some_and(|pos| pixel_distance(host, target_pos, pos) <= limit)
            })
            .collect();
        if direct.is_empty() {
            return Vec::new();
        }

        let mut visited = HashSet::from([target]);
        let mut queue: VecDeque<MarkerId> = direct.into();
        let mut group = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            group.push(current);
            let Some(current_pos) = host.marker_position(current) else {
                continue;
            };
            for marker in &self.markers {
                if visited.contains(marker) {
                    continue;
                }
                let near = host
                    .marker_position(*marker)
                    .is_some_and(|pos| pixel_distance(host, current_pos, pos) <= limit);
                if near {
                    queue.push_back(*marker);
                }
            }
        }

        let distance_to_target = |marker: &MarkerId| {
            host.marker_position(*marker)
                .map(|pos| pixel_distance(host, target_pos, pos))
                .unwrap_or(f64::INFINITY)
        };
        group.sort_by(|a, b| distance_to_target(a).total_cmp(&distance_to_target(b)));
        group
    }

    /// Lays `target` and `overlapping` out on a ring around `target`.
    pub fn spiderfy<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        target: MarkerId,
        overlapping: &[MarkerId],
    ) {
        if self.active == Some(target) {
            return;
        }
        if self.active.is_some() {
            self.unspiderfy(host);
        }
        let Some(center) = host.marker_position(target) else {
            return;
        };

        let group: Vec<MarkerId> = std::iter::once(target)
            .chain(overlapping.iter().copied().filter(|marker| *marker != target))
            .collect();
        let center_px = host.coord_to_offset(center);
        let angle_step = 2.0 * PI / group.len() as f64;

        for (index, marker) in group.iter().copied().enumerate() {
            let Some(original_position) = host.marker_position(marker) else {
                continue;
            };
            let angle = index as f64 * angle_step;
            let fanned_px = Point::new(
                center_px.x + self.options.radius * angle.cos(),
                center_px.y + self.options.radius * angle.sin(),
            );
            let fanned_position = host.offset_to_coord(fanned_px);
            let color = self.color_for(index).to_string();

            let line = host.add_polyline(Polyline {
                path: vec![center, fanned_position],
                stroke_color: color.clone(),
                stroke_weight: self.options.leg_weight,
                stroke_opacity: self.options.leg_opacity,
            });

            let original_icon = host.marker_icon(marker);
            if let Some(icon) = &original_icon {
                if let Some(content) = icon.content() {
                    let recolored = icon.with_content(recolor_content(content, &color));
                    host.set_marker_icon(marker, recolored);
                }
            }
            let original_z_index = host.marker_z_index(marker).unwrap_or(DEFAULT_Z_INDEX);
            host.set_marker_position(marker, fanned_position);
            host.set_marker_z_index(marker, self.options.spider_z_index);

            self.legs.push(SpiderLeg {
                marker,
                original_position,
                original_z_index,
                original_icon,
                fanned_position,
                color,
                line,
            });
        }

        debug!("spiderfied {} markers around {}", self.legs.len(), target.0);
        self.active = Some(target);
    }

    /// Puts every fanned marker back and removes the legs. No-op when
    /// nothing is fanned out.
    pub fn unspiderfy<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if self.legs.is_empty() {
            self.active = None;
            return;
        }
        for leg in self.legs.drain(..) {
            host.set_marker_position(leg.marker, leg.original_position);
            host.set_marker_z_index(leg.marker, leg.original_z_index);
            if let Some(icon) = leg.original_icon {
                host.set_marker_icon(leg.marker, icon);
            }
            host.remove_polyline(leg.line);
        }
        self.active = None;
    }

    fn color_for(&self, index: usize) -> &str {
        if self.options.palette.is_empty() {
            return FALLBACK_COLOR;
        }
        &self.options.palette[index % self.options.palette.len()]
    }
}

/// Pixel distance between two positions with each axis rounded to 0.01 px.
fn pixel_distance<H: MapHost + ?Sized>(host: &H, a: LatLng, b: LatLng) -> f64 {
    let a = host.coord_to_offset(a);
    let b = host.coord_to_offset(b);
    let dx = ((a.x - b.x) * 100.0).round() / 100.0;
    let dy = ((a.y - b.y) * 100.0).round() / 100.0;
    (dx * dx + dy * dy).sqrt()
}

/// Recolours the standard pin markup: body background and border, and the
/// two triangles forming the pointer.
pub fn recolor_content(content: &str, color: &str) -> String {
    content
        .replacen("background: white;", &format!("background: {color}; color: white;"), 1)
        .replacen("border: 1px solid #888;", &format!("border: 2px solid {color};"), 1)
        .replacen(
            "border-top: 8px solid white;",
            &format!("border-top: 8px solid {color};"),
            1,
        )
        .replacen(
            "border-top: 8px solid #888;",
            &format!("border-top: 8px solid {color};"),
            1,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MarkerOptions;
    use crate::sim::SimMap;

    const PIN: &str = "<div style=\"background: white; border: 1px solid #888;\">\
<div style=\"border-top: 8px solid white;\"></div>\
<div style=\"border-top: 8px solid #888;\"></div>ACME</div>";

    fn map() -> SimMap {
        SimMap::new(LatLng::new(37.5, 127.0), 15.0, 800.0, 600.0)
    }

    fn pin_at(map: &mut SimMap, x: f64, y: f64) -> MarkerId {
        let position = map.from_screen(Point::new(x, y));
        map.create_marker(
            MarkerOptions::at(position)
                .icon(Icon::html(PIN, Point::new(60.0, 40.0)))
                .visible(true),
        )
    }

    fn registered(map: &mut SimMap, markers: &[MarkerId]) -> OverlapSpiderfier {
        let mut spiderfier = OverlapSpiderfier::new(SpiderfierOptions::default());
        for marker in markers {
            spiderfier.add_marker(map, *marker);
        }
        spiderfier
    }

    #[test]
    fn overlap_is_transitive() {
        let mut map = map();
        let a = pin_at(&mut map, 300.0, 300.0);
        let b = pin_at(&mut map, 330.0, 300.0);
        let c = pin_at(&mut map, 370.0, 300.0);
        let spiderfier = registered(&mut map, &[a, b, c]);
        assert_eq!(spiderfier.find_overlapping(&map, a), vec![b, c]);
    }

    #[test]
    fn isolated_click_does_nothing() {
        let mut map = map();
        let a = pin_at(&mut map, 100.0, 300.0);
        let b = pin_at(&mut map, 300.0, 300.0);
        let mut spiderfier = registered(&mut map, &[a, b]);
        assert!(spiderfier.handle_event(&mut map, MapEvent::marker(a, EventKind::Click)));
        assert!(spiderfier.fanned().is_empty());
        assert_eq!(map.polylines().count(), 0);
    }

    #[test]
    fn fan_out_places_group_on_ring() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 405.0, 300.0);
        let c = pin_at(&mut map, 400.0, 310.0);
        let d = pin_at(&mut map, 395.0, 295.0);
        let center = map.to_screen(map.marker_position(a).unwrap());
        let mut spiderfier = registered(&mut map, &[a, b, c, d]);
        spiderfier.click(&mut map, a);

        let legs = spiderfier.fanned();
        assert_eq!(legs.len(), 4);
        assert_eq!(legs[0].marker, a);
        for (index, leg) in legs.iter().enumerate() {
            let screen = map.to_screen(map.marker_position(leg.marker).unwrap());
            let angle = index as f64 * PI / 2.0;
            assert!((screen.x - (center.x + 80.0 * angle.cos())).abs() < 1e-6);
            assert!((screen.y - (center.y + 80.0 * angle.sin())).abs() < 1e-6);
            assert_eq!(map.marker_z_index(leg.marker), Some(200));
            assert_eq!(leg.color, SpiderfierOptions::default().palette[index]);
        }
        assert_eq!(map.polylines().count(), 4);
    }

    #[test]
    fn fanned_icons_are_recoloured() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 401.0, 300.0);
        let mut spiderfier = registered(&mut map, &[a, b]);
        spiderfier.click(&mut map, a);
        let content = map.marker_icon(b).unwrap().content().unwrap().to_string();
        assert!(content.contains("background: #4ECDC4; color: white;"));
        assert!(content.contains("border: 2px solid #4ECDC4;"));
        assert!(!content.contains("#888"));
    }

    #[test]
    fn unspiderfy_restores_everything() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 410.0, 300.0);
        let c = pin_at(&mut map, 400.0, 320.0);
        map.set_marker_z_index(c, 7);
        let before: Vec<_> = [a, b, c]
            .iter()
            .map(|id| map.marker(*id).unwrap().clone())
            .collect();
        let mut spiderfier = registered(&mut map, &[a, b, c]);

        spiderfier.click(&mut map, a);
        assert_eq!(spiderfier.fanned().len(), 3);
        spiderfier.unspiderfy(&mut map);

        let after: Vec<_> = [a, b, c]
            .iter()
            .map(|id| map.marker(*id).unwrap().clone())
            .collect();
        assert_eq!(before, after);
        assert_eq!(map.polylines().count(), 0);
        assert!(spiderfier.active().is_none());

        spiderfier.unspiderfy(&mut map);
        assert!(spiderfier.fanned().is_empty());
    }

    #[test]
    fn clicking_inside_the_active_group_is_idempotent() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 410.0, 300.0);
        let mut spiderfier = registered(&mut map, &[a, b]);
        spiderfier.click(&mut map, a);
        let legs = spiderfier.fanned().to_vec();
        spiderfier.click(&mut map, a);
        spiderfier.click(&mut map, b);
        assert_eq!(spiderfier.fanned(), legs.as_slice());
        assert_eq!(map.polylines().count(), 2);
    }

    #[test]
    fn fanning_another_group_collapses_the_first() {
        let mut map = map();
        let a = pin_at(&mut map, 100.0, 100.0);
        let b = pin_at(&mut map, 110.0, 100.0);
        let c = pin_at(&mut map, 600.0, 400.0);
        let d = pin_at(&mut map, 610.0, 400.0);
        let a_home = map.marker_position(a).unwrap();
        let mut spiderfier = registered(&mut map, &[a, b, c, d]);

        spiderfier.click(&mut map, a);
        spiderfier.click(&mut map, c);
        assert_eq!(spiderfier.active(), Some(c));
        assert_eq!(map.marker_position(a), Some(a_home));
        let fanned: Vec<MarkerId> = spiderfier.fanned().iter().map(|leg| leg.marker).collect();
        assert_eq!(fanned, vec![c, d]);
        assert_eq!(map.polylines().count(), 2);
    }

    #[test]
    fn overlaps_are_measured_after_the_open_group_goes_home() {
        let mut map = map();
        let a = pin_at(&mut map, 300.0, 300.0);
        let b = pin_at(&mut map, 305.0, 300.0);
        // Exactly where `a` lands when its group fans out.
        let x = pin_at(&mut map, 380.0, 300.0);
        let a_home = map.marker_position(a).unwrap();
        let mut spiderfier = registered(&mut map, &[a, b, x]);

        spiderfier.click(&mut map, a);
        assert_eq!(spiderfier.fanned().len(), 2);

        assert!(spiderfier.handle_event(&mut map, MapEvent::marker(x, EventKind::Click)));
        assert!(spiderfier.fanned().is_empty());
        assert!(spiderfier.active().is_none());
        assert_eq!(map.marker_position(a), Some(a_home));
        assert_eq!(map.polylines().count(), 0);
    }

    #[test]
    fn zoom_change_unspiderfies() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 410.0, 300.0);
        let home = map.marker_position(b).unwrap();
        let mut spiderfier = registered(&mut map, &[a, b]);
        spiderfier.click(&mut map, a);
        assert_ne!(map.marker_position(b), Some(home));

        map.set_zoom(16.0);
        assert!(spiderfier.handle_event(&mut map, MapEvent::map(EventKind::ZoomChanged)));
        assert_eq!(map.marker_position(b), Some(home));
        assert!(spiderfier.fanned().is_empty());
    }

    #[test]
    fn palette_cycles_for_large_groups() {
        let mut map = map();
        let markers: Vec<MarkerId> = (0..10)
            .map(|i| pin_at(&mut map, 400.0 + i as f64, 300.0))
            .collect();
        let mut spiderfier = registered(&mut map, &markers);
        spiderfier.click(&mut map, markers[0]);
        let legs = spiderfier.fanned();
        assert_eq!(legs.len(), 10);
        assert_eq!(legs[8].color, legs[0].color);
        assert_eq!(legs[9].color, legs[1].color);
    }

    #[test]
    fn detach_releases_listeners() {
        let mut map = map();
        let a = pin_at(&mut map, 400.0, 300.0);
        let b = pin_at(&mut map, 410.0, 300.0);
        let mut spiderfier = registered(&mut map, &[a, b]);
        assert_eq!(map.live_listener_count(), 3);
        spiderfier.click(&mut map, a);
        spiderfier.detach(&mut map);
        assert_eq!(map.live_listener_count(), 0);
        assert_eq!(map.polylines().count(), 0);
        assert!(!spiderfier.handle_event(&mut map, MapEvent::marker(a, EventKind::Click)));
    }
}
