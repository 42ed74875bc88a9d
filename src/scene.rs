//! Scripted map sessions.
//!
//! A scene lists markers, a starting viewport and a sequence of user
//! actions. Replaying it on a [`SimMap`] with a [`ClusterEngine`] and an
//! [`OverlapSpiderfier`] attached gives a deterministic snapshot that the
//! CLI renders or summarises.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::engine::{ClusterEngine, ClusterExpanded};
use crate::geo::{LatLng, Point};
use crate::map::{EventKind, Icon, MapEvent, MapHost, MarkerId, MarkerOptions};
use crate::sim::SimMap;
use crate::spiderfier::OverlapSpiderfier;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub viewport: Viewport,
    pub markers: Vec<SceneMarker>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
}

fn default_width() -> f64 {
    800.0
}

fn default_height() -> f64 {
    600.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneMarker {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Zoom { zoom: f64 },
    Pan { dx: f64, dy: f64 },
    ClickCluster { index: usize },
    ClickMarker { id: String },
    ClickMap,
    Drag { id: String, lat: f64, lng: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("viewport must have a positive size, got {width}x{height}")]
    EmptyViewport { width: f64, height: f64 },
    #[error("duplicate marker id `{0}`")]
    DuplicateMarker(String),
    #[error("action {index} refers to unknown marker `{id}`")]
    UnknownMarker { index: usize, id: String },
}

pub fn parse_scene(input: &str) -> anyhow::Result<Scene> {
    Ok(json5::from_str(input)?)
}

/// State of a replayed scene.
#[derive(Debug)]
pub struct SceneRun {
    pub map: SimMap,
    pub engine: ClusterEngine,
    pub spiderfier: OverlapSpiderfier,
    pub ids: BTreeMap<String, MarkerId>,
    pub expansions: Vec<ClusterExpanded>,
}

impl SceneRun {
    /// Delivers an event to both components, then lets deferred work run.
    pub fn dispatch(&mut self, event: MapEvent) -> bool {
        let clustered = self.engine.handle_event(&mut self.map, event);
        let spidered = self.spiderfier.handle_event(&mut self.map, event);
        let expansions = self.engine.run_deferred(&mut self.map);
        self.expansions.extend(expansions);
        clustered || spidered
    }

    pub fn name_of(&self, id: MarkerId) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, marker)| **marker == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn summary(&self) -> SceneSummary {
        let names = |ids: &[MarkerId]| -> Vec<String> {
            ids.iter()
                .filter_map(|id| self.name_of(*id).map(str::to_string))
                .collect()
        };
        let clusters = self
            .engine
            .clusters()
            .iter()
            .map(|cluster| ClusterSummary {
                count: cluster.count(),
                members: names(cluster.members()),
                aggregate_visible: cluster
                    .aggregate_marker()
                    .is_some_and(|id| self.map.is_marker_visible(id)),
                expanded: cluster.is_expanded(),
                position: cluster.display_position(&self.map, self.engine.options()),
            })
            .collect();
        let spiderfied: Vec<MarkerId> = self
            .spiderfier
            .fanned()
            .iter()
            .map(|leg| leg.marker)
            .collect();

        SceneSummary {
            zoom: self.map.zoom(),
            clusters,
            visible_markers: names(&self.map.visible_markers()),
            spiderfied: names(&spiderfied),
            expansions: self
                .expansions
                .iter()
                .map(|expansion| names(&expansion.members))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSummary {
    pub zoom: f64,
    pub clusters: Vec<ClusterSummary>,
    pub visible_markers: Vec<String>,
    pub spiderfied: Vec<String>,
    pub expansions: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub count: usize,
    pub members: Vec<String>,
    pub aggregate_visible: bool,
    pub expanded: bool,
    pub position: Option<LatLng>,
}

pub fn run_scene(scene: &Scene, config: &Config) -> Result<SceneRun, SceneError> {
    let viewport = &scene.viewport;
    if !(viewport.width > 0.0 && viewport.height > 0.0) {
        return Err(SceneError::EmptyViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let mut map = SimMap::new(viewport.center, viewport.zoom, viewport.width, viewport.height);
    let mut ids = BTreeMap::new();
    let mut order = Vec::with_capacity(scene.markers.len());
    for marker in &scene.markers {
        if ids.contains_key(&marker.id) {
            return Err(SceneError::DuplicateMarker(marker.id.clone()));
        }
        let title = marker.title.clone().unwrap_or_else(|| marker.id.clone());
        let id = map.create_marker(
            MarkerOptions::at(LatLng::new(marker.lat, marker.lng))
                .icon(pin_icon(&title))
                .title(title),
        );
        ids.insert(marker.id.clone(), id);
        order.push(id);
    }

    for (index, action) in scene.actions.iter().enumerate() {
        if let Action::ClickMarker { id } | Action::Drag { id, .. } = action {
            if !ids.contains_key(id) {
                return Err(SceneError::UnknownMarker {
                    index,
                    id: id.clone(),
                });
            }
        }
    }

    let mut engine = ClusterEngine::with_markers(config.cluster.clone(), order.iter().copied());
    engine.set_map(&mut map);
    let mut spiderfier = OverlapSpiderfier::new(config.spiderfier.clone());
    for id in &order {
        spiderfier.add_marker(&mut map, *id);
    }

    let mut run = SceneRun {
        map,
        engine,
        spiderfier,
        ids,
        expansions: Vec::new(),
    };
    for (index, action) in scene.actions.iter().enumerate() {
        apply_action(&mut run, index, action);
    }
    Ok(run)
}

fn apply_action(run: &mut SceneRun, index: usize, action: &Action) {
    match action {
        Action::Zoom { zoom } => {
            run.map.set_zoom(*zoom);
            run.dispatch(MapEvent::map(EventKind::ZoomChanged));
            run.dispatch(MapEvent::map(EventKind::Idle));
        }
        Action::Pan { dx, dy } => {
            run.map.pan_by(*dx, *dy);
            run.dispatch(MapEvent::map(EventKind::Idle));
        }
        Action::ClickCluster { index: cluster } => {
            let aggregate = run
                .engine
                .clusters()
                .get(*cluster)
                .and_then(|cluster| cluster.aggregate_marker());
            let handled = match aggregate {
                Some(id) => run.dispatch(MapEvent::marker(id, EventKind::Click)),
                None => false,
            };
            if !handled {
                warn!("action {index}: cluster {cluster} is not clickable");
            }
        }
        Action::ClickMarker { id } => {
            if let Some(marker) = run.ids.get(id).copied() {
                if !run.dispatch(MapEvent::marker(marker, EventKind::Click)) {
                    warn!("action {index}: marker `{id}` has no click listener");
                }
            }
        }
        Action::ClickMap => {
            run.dispatch(MapEvent::map(EventKind::Click));
        }
        Action::Drag { id, lat, lng } => {
            if let Some(marker) = run.ids.get(id).copied() {
                run.map.drag_marker(marker, LatLng::new(*lat, *lng));
                run.dispatch(MapEvent::marker(marker, EventKind::DragEnd));
            }
        }
    }
}

/// Minimal pin markup using the colours the spiderfier recolours.
fn pin_icon(title: &str) -> Icon {
    let content = format!(
        "<div class=\"marker-content\" style=\"position: relative; padding: 8px; background: white; \
border: 1px solid #888; border-radius: 6px;\">\
<div style=\"position: absolute; bottom: -8px; border-top: 8px solid white;\"></div>\
<div style=\"position: absolute; bottom: -7px; border-top: 8px solid #888;\"></div>\
<div style=\"font-weight: bold; color: #666;\">{}</div></div>",
        escape_html(title)
    );
    Icon::html(content, Point::new(60.0, 40.0))
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
