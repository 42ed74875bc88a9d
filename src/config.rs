use crate::map::{Icon, MarkerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_INDEX_THRESHOLDS: [usize; 5] = [10, 100, 200, 500, 1000];

const SPIDER_PALETTE: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEEAD", "#D4A5A5", "#9A7AA0", "#87A9D6",
];

/// Maps a member count to an index into the configured icon list.
#[derive(Clone)]
pub struct IndexFn(pub Arc<dyn Fn(usize) -> usize + Send + Sync>);

impl fmt::Debug for IndexFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IndexFn(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexGenerator {
    /// Ascending member-count thresholds; the index is the number of
    /// thresholds the count reaches.
    Thresholds(Vec<usize>),
    #[serde(skip)]
    Custom(IndexFn),
}

impl IndexGenerator {
    pub fn custom(f: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        IndexGenerator::Custom(IndexFn(Arc::new(f)))
    }
}

impl Default for IndexGenerator {
    fn default() -> Self {
        IndexGenerator::Thresholds(DEFAULT_INDEX_THRESHOLDS.to_vec())
    }
}

/// Restyles a cluster's aggregate icon for its member count. Returning
/// `None` keeps the icon unchanged.
#[derive(Clone)]
pub struct StylingFunction(pub Arc<dyn Fn(&Icon, usize) -> Option<Icon> + Send + Sync>);

impl StylingFunction {
    pub fn new(f: impl Fn(&Icon, usize) -> Option<Icon> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, icon: &Icon, count: usize) -> Option<Icon> {
        (self.0)(icon, count)
    }
}

impl fmt::Debug for StylingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StylingFunction(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterOptions {
    /// Grouping square edge in pixels; markers within half of it join a cluster.
    pub grid_size: f64,
    pub min_cluster_size: usize,
    /// From this zoom on, only near-coincident markers are grouped and small
    /// clusters show their members.
    pub max_zoom: f64,
    pub icons: Vec<Icon>,
    pub index_generator: IndexGenerator,
    pub average_center: bool,
    pub disable_click_zoom: bool,
    /// Clusters smaller than this show their members at `max_zoom` and above.
    pub member_exemption: usize,
    /// Matching distance in pixels at `max_zoom` and above.
    pub zoomed_in_threshold: f64,
    #[serde(skip)]
    pub styling_function: Option<StylingFunction>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            grid_size: 100.0,
            min_cluster_size: 2,
            max_zoom: 13.0,
            icons: Vec::new(),
            index_generator: IndexGenerator::default(),
            average_center: false,
            disable_click_zoom: true,
            member_exemption: 10,
            zoomed_in_threshold: 2.0,
            styling_function: None,
        }
    }
}

impl ClusterOptions {
    /// Pixel distance under which a marker may join an existing cluster.
    pub fn match_threshold(&self, zoom: f64) -> f64 {
        if zoom >= self.max_zoom {
            self.zoomed_in_threshold
        } else {
            self.grid_size / 2.0
        }
    }
}

/// A single option update. Each variant carries its own reaction so callers
/// never rely on implicit property observation.
#[derive(Debug, Clone)]
pub enum OptionChange {
    Markers(Vec<MarkerId>),
    GridSize(f64),
    MinClusterSize(usize),
    MaxZoom(f64),
    Icons(Vec<Icon>),
    IndexGenerator(IndexGenerator),
    AverageCenter(bool),
    DisableClickZoom(bool),
    StylingFunction(Option<StylingFunction>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionReaction {
    /// Discard and rebuild every cluster.
    Redraw,
    /// Re-pick each cluster's aggregate icon.
    RefreshIcons,
    /// Re-run the zoom/count visibility rule on clusters with several members.
    RecheckVisibility,
    /// Re-run the styling function on each aggregate.
    RefreshCount,
    /// Attach (`true`) or detach aggregate click handlers.
    ToggleClickZoom(bool),
}

impl OptionChange {
    pub fn reaction(&self) -> OptionReaction {
        match self {
            OptionChange::Markers(_)
            | OptionChange::GridSize(_)
            | OptionChange::MinClusterSize(_)
            | OptionChange::AverageCenter(_) => OptionReaction::Redraw,
            OptionChange::Icons(_) | OptionChange::IndexGenerator(_) => {
                OptionReaction::RefreshIcons
            }
            OptionChange::MaxZoom(_) => OptionReaction::RecheckVisibility,
            OptionChange::StylingFunction(_) => OptionReaction::RefreshCount,
            OptionChange::DisableClickZoom(disabled) => OptionReaction::ToggleClickZoom(!disabled),
        }
    }

    /// Stores the value. `Markers` is engine state and is left to the caller.
    pub(crate) fn apply(self, options: &mut ClusterOptions) -> Option<Vec<MarkerId>> {
        match self {
            OptionChange::Markers(markers) => return Some(markers),
            OptionChange::GridSize(v) => options.grid_size = v,
            OptionChange::MinClusterSize(v) => options.min_cluster_size = v,
            OptionChange::MaxZoom(v) => options.max_zoom = v,
            OptionChange::Icons(v) => options.icons = v,
            OptionChange::IndexGenerator(v) => options.index_generator = v,
            OptionChange::AverageCenter(v) => options.average_center = v,
            OptionChange::DisableClickZoom(v) => options.disable_click_zoom = v,
            OptionChange::StylingFunction(v) => options.styling_function = v,
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpiderfierOptions {
    /// Pixel distance under which two markers count as overlapping.
    pub overlap_distance: f64,
    /// Pixel radius of the fan-out ring.
    pub radius: f64,
    pub palette: Vec<String>,
    pub spider_z_index: i32,
    pub leg_weight: f64,
    pub leg_opacity: f64,
}

impl Default for SpiderfierOptions {
    fn default() -> Self {
        Self {
            overlap_distance: 40.0,
            radius: 80.0,
            palette: SPIDER_PALETTE.iter().map(|value| value.to_string()).collect(),
            spider_z_index: 200,
            leg_weight: 2.0,
            leg_opacity: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub font_family: String,
    pub font_size: f32,
    pub marker_fill: String,
    pub marker_stroke: String,
    pub cluster_fill: String,
    pub cluster_text: String,
    pub text_color: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            background: "#F4F1EA".to_string(),
            font_family: "Inter, Segoe UI, system-ui, sans-serif".to_string(),
            font_size: 12.0,
            marker_fill: "#FFFFFF".to_string(),
            marker_stroke: "#888888".to_string(),
            cluster_fill: "rgba(0, 123, 255, 0.8)".to_string(),
            cluster_text: "#FFFFFF".to_string(),
            text_color: "#666666".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cluster: ClusterOptions,
    pub spiderfier: SpiderfierOptions,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    cluster: Option<ClusterConfigFile>,
    spiderfier: Option<SpiderfierOptions>,
    render: Option<RenderConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterConfigFile {
    grid_size: Option<f64>,
    min_cluster_size: Option<usize>,
    max_zoom: Option<f64>,
    icons: Option<Vec<Icon>>,
    index_generator: Option<Vec<usize>>,
    average_center: Option<bool>,
    disable_click_zoom: Option<bool>,
    member_exemption: Option<usize>,
    zoomed_in_threshold: Option<f64>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a JSON5 config document and overlays it on the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(cluster) = parsed.cluster {
        if let Some(v) = cluster.grid_size {
            config.cluster.grid_size = v;
        }
        if let Some(v) = cluster.min_cluster_size {
            config.cluster.min_cluster_size = v;
        }
        if let Some(v) = cluster.max_zoom {
            config.cluster.max_zoom = v;
        }
        if let Some(v) = cluster.icons {
            config.cluster.icons = v;
        }
        if let Some(v) = cluster.index_generator {
            config.cluster.index_generator = IndexGenerator::Thresholds(v);
        }
        if let Some(v) = cluster.average_center {
            config.cluster.average_center = v;
        }
        if let Some(v) = cluster.disable_click_zoom {
            config.cluster.disable_click_zoom = v;
        }
        if let Some(v) = cluster.member_exemption {
            config.cluster.member_exemption = v;
        }
        if let Some(v) = cluster.zoomed_in_threshold {
            config.cluster.zoomed_in_threshold = v;
        }
    }

    if let Some(spiderfier) = parsed.spiderfier {
        config.spiderfier = spiderfier;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }

    Ok(config)
}
