//! Viewport-driven clustering.
//!
//! The engine keeps the full marker list as the source of truth and rebuilds
//! every [`Cluster`] from scratch whenever the viewport settles or a marker
//! is dragged. Assignment is a single greedy pass in insertion order: each
//! on-screen marker joins the nearest existing cluster within the matching
//! threshold, or seeds a new one.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::cluster::Cluster;
use crate::config::{ClusterOptions, OptionChange, OptionReaction};
use crate::geo::LatLng;
use crate::map::{
    EventKind, EventTarget, ListenerHandle, MapEvent, MapHost, MarkerId, unsubscribe_all,
};

/// Emitted once a clicked cluster has displayed its members.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterExpanded {
    pub members: Vec<MarkerId>,
    pub position: Option<LatLng>,
}

#[derive(Debug, Clone, Copy)]
struct DeferredExpansion {
    cluster: usize,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct ClusterEngine {
    options: ClusterOptions,
    markers: Vec<MarkerId>,
    clusters: Vec<Cluster>,
    expanded: Option<usize>,
    attached: bool,
    map_listeners: Vec<ListenerHandle>,
    marker_listeners: Vec<ListenerHandle>,
    deferred: VecDeque<DeferredExpansion>,
    // Bumped whenever the cluster list is discarded, so stale deferred
    // expansions can be recognised.
    generation: u64,
}

impl ClusterEngine {
    pub fn new(options: ClusterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_markers(
        options: ClusterOptions,
        markers: impl IntoIterator<Item = MarkerId>,
    ) -> Self {
        let mut engine = Self::new(options);
        for marker in markers {
            if !engine.markers.contains(&marker) {
                engine.markers.push(marker);
            }
        }
        engine
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn markers(&self) -> &[MarkerId] {
        &self.markers
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn expanded_cluster(&self) -> Option<&Cluster> {
        self.expanded.and_then(|index| self.clusters.get(index))
    }

    pub fn cluster_of(&self, marker: MarkerId) -> Option<usize> {
        self.clusters.iter().position(|cluster| cluster.is_member(marker))
    }

    /// Attaches to a map: registers the viewport and map-click listeners and
    /// clusters whatever markers are already known.
    pub fn set_map<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if self.attached {
            return;
        }
        self.attached = true;
        self.map_listeners.push(host.subscribe(EventTarget::Map, EventKind::Idle));
        self.map_listeners.push(host.subscribe(EventTarget::Map, EventKind::Click));

        if !self.markers.is_empty() {
            self.create_clusters(host);
            self.update_clusters(host);
        }
    }

    /// Detaches from the map, releasing every listener and cluster.
    pub fn detach<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if !self.attached {
            return;
        }
        unsubscribe_all(host, &mut self.map_listeners);
        self.clear_clusters(host);
        self.deferred.clear();
        self.attached = false;
    }

    pub fn add_marker<H: MapHost + ?Sized>(&mut self, host: &mut H, marker: MarkerId) {
        if self.markers.contains(&marker) {
            return;
        }
        self.markers.push(marker);
        if !self.attached {
            return;
        }
        let Some(position) = host.marker_position(marker) else {
            return;
        };
        if !host.bounds().contains(position) {
            return;
        }
        let index = self.closest_cluster(&*host, position);
        self.clusters[index].add_marker(&*host, &self.options, marker);
        self.marker_listeners
            .push(host.subscribe(EventTarget::Marker(marker), EventKind::DragEnd));
        self.clusters[index].update_cluster(host, &self.options);
    }

    pub fn add_markers<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        markers: impl IntoIterator<Item = MarkerId>,
    ) {
        for marker in markers {
            if !self.markers.contains(&marker) {
                self.markers.push(marker);
            }
        }
        if self.attached {
            self.redraw(host);
        }
    }

    /// Replaces the marker list and reclusters.
    pub fn set_markers<H: MapHost + ?Sized>(&mut self, host: &mut H, markers: Vec<MarkerId>) {
        let mut unique = Vec::with_capacity(markers.len());
        for marker in markers {
            if !unique.contains(&marker) {
                unique.push(marker);
            }
        }
        self.set_option(host, OptionChange::Markers(unique));
    }

    pub fn clear_markers<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        self.markers.clear();
        self.clear_clusters(host);
    }

    /// Stores an option and applies its reaction to the live clusters.
    pub fn set_option<H: MapHost + ?Sized>(&mut self, host: &mut H, change: OptionChange) {
        let reaction = change.reaction();
        if let Some(markers) = change.apply(&mut self.options) {
            self.markers = markers;
        }
        if !self.attached {
            return;
        }

        debug!("option changed, reaction {reaction:?}");
        match reaction {
            OptionReaction::Redraw => self.redraw(host),
            OptionReaction::RefreshIcons => {
                for cluster in &mut self.clusters {
                    cluster.update_icon(host, &self.options);
                }
            }
            OptionReaction::RecheckVisibility => {
                for cluster in &mut self.clusters {
                    if cluster.count() > 1 {
                        cluster.check_by_zoom_and_min_cluster_size(host, &self.options);
                    }
                }
            }
            OptionReaction::RefreshCount => {
                for cluster in &mut self.clusters {
                    cluster.update_count(host, &self.options);
                }
            }
            OptionReaction::ToggleClickZoom(enabled) => {
                for cluster in &mut self.clusters {
                    if enabled {
                        cluster.enable_click_zoom(host);
                    } else {
                        cluster.disable_click_zoom(host);
                    }
                }
            }
        }
    }

    /// Routes a host event. Returns `true` when the engine held a live
    /// registration for it and reacted.
    pub fn handle_event<H: MapHost + ?Sized>(&mut self, host: &mut H, event: MapEvent) -> bool {
        if !self.attached {
            return false;
        }
        if self.map_listeners.iter().any(|handle| handle.matches(&event)) {
            match event.kind {
                EventKind::Idle => self.redraw(host),
                EventKind::Click => self.collapse_expanded(host),
                _ => return false,
            }
            return true;
        }
        if self.marker_listeners.iter().any(|handle| handle.matches(&event)) {
            self.redraw(host);
            return true;
        }
        let clicked = self.clusters.iter().position(|cluster| {
            cluster
                .click_listener()
                .is_some_and(|handle| handle.matches(&event))
        });
        match clicked {
            Some(index) => self.expand_cluster(host, index),
            None => false,
        }
    }

    /// Marks cluster `index` as the expanded one, collapsing any other first.
    /// Member display happens on the next [`run_deferred`](Self::run_deferred).
    pub fn expand_cluster<H: MapHost + ?Sized>(&mut self, host: &mut H, index: usize) -> bool {
        if index >= self.clusters.len() {
            return false;
        }
        if let Some(previous) = self.expanded {
            if previous != index {
                if let Some(cluster) = self.clusters.get_mut(previous) {
                    cluster.collapse(host);
                }
            }
        }
        self.clusters[index].set_expanded(true);
        self.expanded = Some(index);
        self.deferred.push_back(DeferredExpansion {
            cluster: index,
            generation: self.generation,
        });
        true
    }

    pub fn collapse_expanded<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(index) = self.expanded.take() {
            if let Some(cluster) = self.clusters.get_mut(index) {
                cluster.collapse(host);
            }
        }
    }

    /// Runs expansions queued by cluster clicks. Each still-expanded cluster
    /// shows its members and yields one notification; expansions whose
    /// cluster was collapsed or rebuilt since are dropped.
    pub fn run_deferred<H: MapHost + ?Sized>(&mut self, host: &mut H) -> Vec<ClusterExpanded> {
        let mut notifications = Vec::new();
        while let Some(task) = self.deferred.pop_front() {
            if task.generation != self.generation {
                continue;
            }
            let Some(cluster) = self.clusters.get_mut(task.cluster) else {
                continue;
            };
            if !cluster.is_expanded() {
                continue;
            }
            cluster.show_members(host);
            notifications.push(ClusterExpanded {
                members: cluster.members().to_vec(),
                position: cluster.display_position(&*host, &self.options),
            });
        }
        notifications
    }

    /// Discards every cluster and rebuilds from the current viewport.
    pub fn redraw<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        self.clear_clusters(host);
        self.create_clusters(host);
        self.update_clusters(host);
        debug!(
            "reflow at zoom {}: {} markers into {} clusters",
            host.zoom(),
            self.markers.len(),
            self.clusters.len()
        );
    }

    fn create_clusters<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        let bounds = host.bounds();
        for i in 0..self.markers.len() {
            let marker = self.markers[i];
            let Some(position) = host.marker_position(marker) else {
                continue;
            };
            if !bounds.contains(position) {
                continue;
            }
            let index = self.closest_cluster(&*host, position);
            self.clusters[index].add_marker(&*host, &self.options, marker);
            trace!("marker {} -> cluster {index}", marker.0);
            self.marker_listeners
                .push(host.subscribe(EventTarget::Marker(marker), EventKind::DragEnd));
        }
    }

    fn update_clusters<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        for cluster in &mut self.clusters {
            cluster.update_cluster(host, &self.options);
        }
    }

    fn clear_clusters<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        for cluster in &mut self.clusters {
            cluster.destroy(host);
        }
        unsubscribe_all(host, &mut self.marker_listeners);
        self.clusters.clear();
        self.expanded = None;
        self.generation += 1;
    }

    /// Index of the nearest cluster accepting `position`, creating one when
    /// none qualifies. Candidates must contain the position in their bounding
    /// square and lie strictly under the zoom-dependent pixel threshold.
    fn closest_cluster<H: MapHost + ?Sized>(&mut self, host: &H, position: LatLng) -> usize {
        let threshold = self.options.match_threshold(host.zoom());
        let marker_px = host.coord_to_offset(position);
        let mut closest = None;
        let mut min_distance = f64::INFINITY;

        for (index, cluster) in self.clusters.iter().enumerate() {
            if !cluster.is_in_bounds(position) {
                continue;
            }
            let Some(center) = cluster.center() else {
                continue;
            };
            let distance = marker_px.distance(&host.coord_to_offset(center));
            if distance < threshold && distance < min_distance {
                min_distance = distance;
                closest = Some(index);
            }
        }

        match closest {
            Some(index) => index,
            None => {
                self.clusters.push(Cluster::new());
                self.clusters.len() - 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;
    use crate::map::{Icon, MarkerOptions};
    use crate::sim::SimMap;

    fn map_at(zoom: f64) -> SimMap {
        SimMap::new(LatLng::new(37.5, 127.0), zoom, 800.0, 600.0)
    }

    fn marker_at(map: &mut SimMap, x: f64, y: f64) -> MarkerId {
        let position = map.from_screen(Point::new(x, y));
        map.create_marker(MarkerOptions::at(position))
    }

    fn attached(map: &mut SimMap, options: ClusterOptions, markers: &[MarkerId]) -> ClusterEngine {
        let mut engine = ClusterEngine::with_markers(options, markers.iter().copied());
        engine.set_map(map);
        engine
    }

    #[test]
    fn near_markers_share_a_cluster_below_max_zoom() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let engine = attached(&mut map, ClusterOptions::default(), &[a, b]);

        assert_eq!(engine.clusters().len(), 1);
        let cluster = &engine.clusters()[0];
        assert_eq!(cluster.count(), 2);
        assert!(map.is_marker_visible(cluster.aggregate_marker().unwrap()));
        assert!(!map.is_marker_visible(a));
        assert!(!map.is_marker_visible(b));
    }

    #[test]
    fn zooming_past_max_zoom_reveals_small_clusters() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        // 0.64 px apart at zoom 14, still under the zoomed-in threshold.
        let b = marker_at(&mut map, 400.01, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert!(!map.is_marker_visible(a));

        map.set_zoom(14.0);
        assert!(engine.handle_event(&mut map, MapEvent::map(EventKind::Idle)));
        assert_eq!(engine.clusters().len(), 1);
        let cluster = &engine.clusters()[0];
        assert_eq!(cluster.count(), 2);
        assert!(map.is_marker_visible(a));
        assert!(map.is_marker_visible(b));
        assert!(!map.is_marker_visible(cluster.aggregate_marker().unwrap()));
    }

    #[test]
    fn far_markers_stay_apart() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 200.0, 300.0);
        let b = marker_at(&mut map, 320.0, 300.0);
        let engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert_eq!(engine.clusters().len(), 2);
        assert!(map.is_marker_visible(a));
        assert!(map.is_marker_visible(b));
    }

    #[test]
    fn offscreen_markers_are_not_clustered() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let off = marker_at(&mut map, -50.0, 300.0);
        let engine = attached(&mut map, ClusterOptions::default(), &[a, off]);
        assert_eq!(engine.clusters().len(), 1);
        assert!(engine.cluster_of(off).is_none());
        assert!(!map.is_marker_visible(off));
    }

    #[test]
    fn add_marker_joins_live_clusters() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a]);
        let b = marker_at(&mut map, 405.0, 300.0);
        engine.add_marker(&mut map, b);
        assert_eq!(engine.clusters().len(), 1);
        assert_eq!(engine.clusters()[0].count(), 2);
        assert!(map.fire(MapEvent::marker(b, EventKind::DragEnd)));
    }

    #[test]
    fn operations_before_attachment_only_record_state() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let mut engine = ClusterEngine::new(ClusterOptions::default());
        engine.add_marker(&mut map, a);
        engine.set_option(&mut map, OptionChange::GridSize(40.0));
        assert!(!engine.handle_event(&mut map, MapEvent::map(EventKind::Idle)));
        assert!(engine.clusters().is_empty());
        assert_eq!(engine.markers(), &[a]);
        assert_eq!(engine.options().grid_size, 40.0);
        assert_eq!(map.live_listener_count(), 0);
    }

    #[test]
    fn dragging_a_marker_out_of_range_splits_the_cluster() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert_eq!(engine.clusters().len(), 1);

        map.drag_marker(b, map.from_screen(Point::new(600.0, 300.0)));
        assert!(engine.handle_event(&mut map, MapEvent::marker(b, EventKind::DragEnd)));
        assert_eq!(engine.clusters().len(), 2);
    }

    #[test]
    fn listeners_do_not_accumulate_across_reflows() {
        let mut map = map_at(8.0);
        let options = ClusterOptions {
            disable_click_zoom: false,
            ..ClusterOptions::default()
        };
        let markers: Vec<MarkerId> = (0..6)
            .map(|i| marker_at(&mut map, 100.0 + 10.0 * i as f64, 300.0))
            .collect();
        let mut engine = attached(&mut map, options, &markers);
        let baseline = map.live_listener_count();
        for _ in 0..20 {
            engine.handle_event(&mut map, MapEvent::map(EventKind::Idle));
        }
        assert_eq!(map.live_listener_count(), baseline);

        engine.detach(&mut map);
        assert_eq!(map.live_listener_count(), 0);
        assert!(engine.clusters().is_empty());
    }

    #[test]
    fn cluster_click_expands_after_deferred_turn() {
        let mut map = map_at(8.0);
        let options = ClusterOptions {
            disable_click_zoom: false,
            ..ClusterOptions::default()
        };
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, options, &[a, b]);
        let aggregate = engine.clusters()[0].aggregate_marker().unwrap();

        assert!(engine.handle_event(&mut map, MapEvent::marker(aggregate, EventKind::Click)));
        assert!(engine.expanded_cluster().unwrap().is_expanded());
        assert!(!map.is_marker_visible(a));

        let notifications = engine.run_deferred(&mut map);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].members, vec![a, b]);
        assert!(map.is_marker_visible(a));
        assert!(!map.is_marker_visible(aggregate));
        assert!(engine.run_deferred(&mut map).is_empty());

        assert!(engine.handle_event(&mut map, MapEvent::map(EventKind::Click)));
        assert!(engine.expanded_cluster().is_none());
        assert!(!map.is_marker_visible(a));
        assert!(map.is_marker_visible(aggregate));
    }

    #[test]
    fn stale_expansions_are_dropped_after_reflow() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert!(engine.expand_cluster(&mut map, 0));
        engine.handle_event(&mut map, MapEvent::map(EventKind::Idle));
        assert!(engine.run_deferred(&mut map).is_empty());
        assert!(engine.expanded_cluster().is_none());
    }

    #[test]
    fn icon_change_refreshes_without_reflow() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        let aggregate = engine.clusters()[0].aggregate_marker().unwrap();
        let icon = Icon::html("<i>many</i>", Point::new(10.0, 10.0));

        engine.set_option(&mut map, OptionChange::Icons(vec![icon.clone()]));
        assert_eq!(engine.clusters()[0].aggregate_marker(), Some(aggregate));
        assert_eq!(map.marker_icon(aggregate), Some(icon));
    }

    #[test]
    fn index_generator_change_swaps_icon_in_place() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let small = Icon::html("<i>small</i>", Point::new(10.0, 10.0));
        let large = Icon::html("<i>large</i>", Point::new(20.0, 20.0));
        let options = ClusterOptions {
            icons: vec![small.clone(), large.clone()],
            ..ClusterOptions::default()
        };
        let mut engine = attached(&mut map, options, &[a, b]);
        let aggregate = engine.clusters()[0].aggregate_marker().unwrap();
        assert_eq!(map.marker_icon(aggregate), Some(small));

        engine.set_option(
            &mut map,
            OptionChange::IndexGenerator(crate::config::IndexGenerator::custom(|_| 1)),
        );
        assert_eq!(engine.clusters()[0].aggregate_marker(), Some(aggregate));
        assert_eq!(map.marker_icon(aggregate), Some(large));
    }

    #[test]
    fn average_center_change_rebuilds_at_mean_position() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 320.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        let before = engine.clusters()[0].aggregate_marker().unwrap();
        assert_eq!(map.marker_position(before), map.marker_position(a));

        engine.set_option(&mut map, OptionChange::AverageCenter(true));
        assert!(map.marker(before).is_none());
        let after = engine.clusters()[0].aggregate_marker().unwrap();
        let pa = map.marker_position(a).unwrap();
        let pb = map.marker_position(b).unwrap();
        let placed = map.marker_position(after).unwrap();
        assert!((placed.lat - (pa.lat + pb.lat) / 2.0).abs() < 1e-12);
        assert!((placed.lng - (pa.lng + pb.lng) / 2.0).abs() < 1e-12);
        assert!(map.is_marker_visible(after));
    }

    #[test]
    fn grid_size_change_forces_reflow() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 430.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert_eq!(engine.clusters().len(), 1);
        let before = engine.clusters()[0].aggregate_marker().unwrap();

        engine.set_option(&mut map, OptionChange::GridSize(40.0));
        assert_eq!(engine.clusters().len(), 2);
        assert!(map.marker(before).is_none());
    }

    #[test]
    fn min_cluster_size_change_forces_reflow() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        let before = engine.clusters()[0].aggregate_marker().unwrap();
        engine.set_option(&mut map, OptionChange::MinClusterSize(3));
        let after = engine.clusters()[0].aggregate_marker().unwrap();
        assert_ne!(before, after);
        assert!(map.marker(before).is_none());
    }

    #[test]
    fn max_zoom_change_rechecks_visibility_in_place() {
        let mut map = map_at(10.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 400.5, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        let aggregate = engine.clusters()[0].aggregate_marker().unwrap();
        assert!(!map.is_marker_visible(a));

        engine.set_option(&mut map, OptionChange::MaxZoom(9.0));
        assert_eq!(engine.clusters()[0].aggregate_marker(), Some(aggregate));
        assert!(map.is_marker_visible(a));
        assert!(map.is_marker_visible(b));
        assert!(!map.is_marker_visible(aggregate));
    }

    #[test]
    fn styling_function_change_only_restyles() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        let aggregate = engine.clusters()[0].aggregate_marker().unwrap();
        let styling = crate::config::StylingFunction::new(|icon, count| {
            Some(icon.with_content(format!("{count} companies")))
        });

        engine.set_option(&mut map, OptionChange::StylingFunction(Some(styling)));
        assert_eq!(engine.clusters()[0].aggregate_marker(), Some(aggregate));
        assert_eq!(
            map.marker_icon(aggregate).unwrap().content(),
            Some("2 companies")
        );
    }

    #[test]
    fn click_zoom_toggle_attaches_and_detaches_handlers() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert!(engine.clusters()[0].click_listener().is_none());

        engine.set_option(&mut map, OptionChange::DisableClickZoom(false));
        assert!(engine.clusters()[0].click_listener().is_some());

        engine.set_option(&mut map, OptionChange::DisableClickZoom(true));
        assert!(engine.clusters()[0].click_listener().is_none());
    }

    #[test]
    fn set_markers_replaces_and_reclusters() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let c = marker_at(&mut map, 200.0, 100.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        assert_eq!(engine.clusters().len(), 1);

        engine.set_markers(&mut map, vec![c, a, c]);
        assert_eq!(engine.markers(), &[c, a]);
        assert_eq!(engine.clusters().len(), 2);
        assert!(engine.cluster_of(b).is_none());
        assert!(map.is_marker_visible(a));
        assert!(map.is_marker_visible(c));
    }

    #[test]
    fn clear_markers_drops_everything() {
        let mut map = map_at(8.0);
        let a = marker_at(&mut map, 400.0, 300.0);
        let b = marker_at(&mut map, 410.0, 300.0);
        let mut engine = attached(&mut map, ClusterOptions::default(), &[a, b]);
        engine.clear_markers(&mut map);
        assert!(engine.markers().is_empty());
        assert!(engine.clusters().is_empty());
        engine.handle_event(&mut map, MapEvent::map(EventKind::Idle));
        assert!(engine.clusters().is_empty());
    }
}
