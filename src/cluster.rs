//! A single grouping of markers and its aggregate marker.
//!
//! A `Cluster` lives for exactly one reflow of the [`ClusterEngine`]. It owns
//! the synthetic aggregate marker it creates on the host, and the click
//! registration on that marker; member markers stay owned by the host and
//! are only shown or hidden from here.
//!
//! [`ClusterEngine`]: crate::engine::ClusterEngine

use crate::config::ClusterOptions;
use crate::geo::{LatLng, LatLngBounds, PixelRect, Point};
use crate::icon::select_cluster_icon;
use crate::map::{EventKind, EventTarget, ListenerHandle, MapHost, MarkerId, MarkerOptions};

#[derive(Debug, Default)]
pub struct Cluster {
    center: Option<LatLng>,
    bounds: Option<LatLngBounds>,
    aggregate: Option<MarkerId>,
    click_listener: Option<ListenerHandle>,
    expanded: bool,
    members: Vec<MarkerId>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `marker` unless it is already a member. The first member fixes
    /// the center and the bounding square. Returns whether it was added.
    pub fn add_marker<H: MapHost + ?Sized>(
        &mut self,
        host: &H,
        options: &ClusterOptions,
        marker: MarkerId,
    ) -> bool {
        if self.is_member(marker) {
            return false;
        }
        if self.center.is_none() {
            let Some(position) = host.marker_position(marker) else {
                return false;
            };
            self.center = Some(position);
            self.bounds = Some(calc_bounds(host, options, position));
        }
        self.members.push(marker);
        true
    }

    pub fn center(&self) -> Option<LatLng> {
        self.center
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.bounds
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[MarkerId] {
        &self.members
    }

    pub fn is_member(&self, marker: MarkerId) -> bool {
        self.members.contains(&marker)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn aggregate_marker(&self) -> Option<MarkerId> {
        self.aggregate
    }

    pub fn click_listener(&self) -> Option<ListenerHandle> {
        self.click_listener
    }

    pub fn is_in_bounds(&self, position: LatLng) -> bool {
        self.bounds.is_some_and(|bounds| bounds.contains(position))
    }

    /// Where the aggregate marker sits: the seeding member's position, or the
    /// mean member position when `average_center` is on.
    pub fn display_position<H: MapHost + ?Sized>(
        &self,
        host: &H,
        options: &ClusterOptions,
    ) -> Option<LatLng> {
        if !options.average_center {
            return self.center;
        }
        let positions: Vec<LatLng> = self
            .members
            .iter()
            .filter_map(|id| host.marker_position(*id))
            .collect();
        if positions.is_empty() {
            return self.center;
        }
        let n = positions.len() as f64;
        let lat = positions.iter().map(|p| p.lat).sum::<f64>() / n;
        let lng = positions.iter().map(|p| p.lng).sum::<f64>() / n;
        Some(LatLng::new(lat, lng))
    }

    /// Creates the aggregate marker if needed, refreshes its icon and label,
    /// then re-evaluates what is visible.
    pub fn update_cluster<H: MapHost + ?Sized>(&mut self, host: &mut H, options: &ClusterOptions) {
        if self.members.is_empty() {
            return;
        }
        if self.aggregate.is_none() {
            let Some(position) = self.display_position(&*host, options) else {
                return;
            };
            self.aggregate = Some(host.create_marker(MarkerOptions::at(position).visible(true)));
            if !options.disable_click_zoom {
                self.enable_click_zoom(host);
            }
        }

        self.update_icon(host, options);
        self.update_count(host, options);
        self.check_by_zoom_and_min_cluster_size(host, options);
    }

    /// Visibility rule. A lone member is always shown directly. Otherwise,
    /// at `max_zoom` and above, clusters smaller than `member_exemption`
    /// show their members; everything else shows the aggregate.
    pub fn check_by_zoom_and_min_cluster_size<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        options: &ClusterOptions,
    ) {
        if self.count() == 1 {
            host.set_marker_visible(self.members[0], true);
            if let Some(aggregate) = self.aggregate {
                host.set_marker_visible(aggregate, false);
            }
            return;
        }

        if host.zoom() >= options.max_zoom && self.count() < options.member_exemption {
            self.show_members(host);
        } else {
            self.hide_members(host);
        }
    }

    pub fn update_icon<H: MapHost + ?Sized>(&mut self, host: &mut H, options: &ClusterOptions) {
        let Some(aggregate) = self.aggregate else {
            return;
        };
        match select_cluster_icon(self.count(), options) {
            Some(icon) => host.set_marker_icon(aggregate, icon),
            None => host.set_marker_visible(aggregate, false),
        }
    }

    pub fn update_count<H: MapHost + ?Sized>(&mut self, host: &mut H, options: &ClusterOptions) {
        let (Some(styling), Some(aggregate)) = (&options.styling_function, self.aggregate) else {
            return;
        };
        let Some(icon) = host.marker_icon(aggregate) else {
            return;
        };
        if let Some(styled) = styling.apply(&icon, self.count()) {
            host.set_marker_icon(aggregate, styled);
        }
    }

    pub fn enable_click_zoom<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if self.click_listener.is_some() {
            return;
        }
        let Some(aggregate) = self.aggregate else {
            return;
        };
        self.click_listener =
            Some(host.subscribe(EventTarget::Marker(aggregate), EventKind::Click));
    }

    pub fn disable_click_zoom<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(handle) = self.click_listener.take() {
            host.unsubscribe(handle);
        }
    }

    pub(crate) fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    /// Folds an expanded cluster back behind its aggregate.
    pub fn collapse<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        self.hide_members(host);
        self.expanded = false;
    }

    pub(crate) fn show_members<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        for member in &self.members {
            host.set_marker_visible(*member, true);
        }
        if let Some(aggregate) = self.aggregate {
            host.set_marker_visible(aggregate, false);
        }
    }

    pub(crate) fn hide_members<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if self.count() == 1 {
            return;
        }
        for member in &self.members {
            host.set_marker_visible(*member, false);
        }
        if let Some(aggregate) = self.aggregate {
            if !host.is_marker_visible(aggregate) {
                host.set_marker_visible(aggregate, true);
            }
        }
    }

    /// Releases the click registration, hides every member, removes the
    /// aggregate marker and forgets all state.
    pub fn destroy<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        self.disable_click_zoom(host);
        for member in self.members.drain(..) {
            host.set_marker_visible(member, false);
        }
        if let Some(aggregate) = self.aggregate.take() {
            host.destroy_marker(aggregate);
        }
        self.center = None;
        self.bounds = None;
        self.expanded = false;
    }
}

/// Square of `grid_size` pixels around `position`, clamped to the viewport
/// and converted back to geographic bounds.
fn calc_bounds<H: MapHost + ?Sized>(
    host: &H,
    options: &ClusterOptions,
    position: LatLng,
) -> LatLngBounds {
    let map_bounds = host.bounds();
    let viewport = PixelRect::from_corners(
        host.coord_to_offset(map_bounds.sw),
        host.coord_to_offset(map_bounds.ne),
    );
    let square = PixelRect::around(host.coord_to_offset(position), options.grid_size / 2.0);
    let clamped = square.intersect(&viewport);

    // Screen y grows southward: bottom-left is south-west.
    let sw = host.offset_to_coord(Point::new(clamped.min.x, clamped.max.y));
    let ne = host.offset_to_coord(Point::new(clamped.max.x, clamped.min.y));
    LatLngBounds::new(sw, ne)
}
