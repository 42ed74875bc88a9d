// Aggregate icon selection for clusters.

use crate::config::{ClusterOptions, IndexGenerator};
use crate::geo::Point;
use crate::map::Icon;

const COUNT_BADGE_SIZE: f64 = 60.0;

/// Raw index for `count`. For thresholds this is the number of entries the
/// count reaches before the first one it falls short of.
pub fn icon_index(count: usize, generator: &IndexGenerator) -> usize {
    match generator {
        IndexGenerator::Thresholds(thresholds) => thresholds
            .iter()
            .take_while(|threshold| count >= **threshold)
            .count(),
        IndexGenerator::Custom(f) => (f.0)(count),
    }
}

/// Icon for a cluster with `count` members, or `None` when the cluster has a
/// single member and must not show an aggregate at all.
pub fn select_cluster_icon(count: usize, options: &ClusterOptions) -> Option<Icon> {
    if count <= 1 {
        return None;
    }
    if options.icons.is_empty() {
        return Some(default_count_icon(count));
    }
    let index = icon_index(count, &options.index_generator).min(options.icons.len() - 1);
    Some(options.icons[index].clone())
}

/// Filled blue circle with the member count, centred in a 60 px box.
pub fn default_count_icon(count: usize) -> Icon {
    let content = format!(
        "<div style=\"position: relative; width: 60px; height: 60px;\">\
<div data-group-index=\"0\" style=\"position: absolute; left: 15px; top: 15px; width:30px; height:30px; \
background: rgba(0, 123, 255, 0.8); border-radius: 50%; display: flex; align-items: center; \
justify-content: center; color: white; font-weight: bold; cursor: pointer;\">{count}</div></div>"
    );
    Icon::html(
        content,
        Point::new(COUNT_BADGE_SIZE / 2.0, COUNT_BADGE_SIZE / 2.0),
    )
}
