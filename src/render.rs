use crate::cluster::Cluster;
use crate::config::RenderConfig;
use crate::map::{MapHost, MarkerId};
use crate::sim::SimMap;
use crate::spiderfier::SpiderLeg;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const CLUSTER_RADIUS: f64 = 15.0;
const PIN_WIDTH: f64 = 96.0;
const PIN_HEIGHT: f64 = 26.0;

/// Draws the visible state of `map` in viewport pixels: leg lines first,
/// then markers in z-order. Aggregate markers of `clusters` are drawn as
/// count badges, everything else as labelled pins.
pub fn render_svg(
    map: &SimMap,
    clusters: &[Cluster],
    legs: &[SpiderLeg],
    config: &RenderConfig,
) -> String {
    let (width, height) = map.size();
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    ));

    for line in map.polylines() {
        let points: Vec<(f64, f64)> = line
            .path
            .iter()
            .map(|position| {
                let p = map.to_screen(*position);
                (p.x, p.y)
            })
            .collect();
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-opacity=\"{}\"/>",
            points_to_path(&points),
            line.stroke_color,
            line.stroke_weight,
            line.stroke_opacity
        ));
    }

    let counts: HashMap<MarkerId, usize> = clusters
        .iter()
        .filter_map(|cluster| cluster.aggregate_marker().map(|id| (id, cluster.count())))
        .collect();
    let leg_colors: HashMap<MarkerId, &str> = legs
        .iter()
        .map(|leg| (leg.marker, leg.color.as_str()))
        .collect();

    let mut visible: Vec<_> = map.markers().filter(|(_, marker)| marker.visible).collect();
    visible.sort_by_key(|(id, marker)| (marker.z_index, *id));

    for (id, marker) in visible {
        let p = map.to_screen(marker.position);
        if let Some(count) = counts.get(&id) {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{CLUSTER_RADIUS}\" fill=\"{}\"/>",
                p.x, p.y, config.cluster_fill
            ));
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" font-weight=\"bold\" fill=\"{}\">{count}</text>",
                p.x,
                p.y,
                config.font_family,
                config.font_size,
                config.cluster_text
            ));
            continue;
        }

        let (fill, stroke, text) = match leg_colors.get(&id) {
            Some(color) => (*color, *color, "#FFFFFF"),
            None => (
                config.marker_fill.as_str(),
                config.marker_stroke.as_str(),
                config.text_color.as_str(),
            ),
        };
        let x = p.x - PIN_WIDTH / 2.0;
        let y = p.y - PIN_HEIGHT - 8.0;
        svg.push_str(&format!(
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{PIN_WIDTH}\" height=\"{PIN_HEIGHT}\" rx=\"6\" ry=\"6\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"1\"/>",
        ));
        svg.push_str(&format!(
            "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} z\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"1\"/>",
            p.x - 8.0,
            p.y - 8.0,
            p.x + 8.0,
            p.y - 8.0,
            p.x,
            p.y
        ));
        if let Some(title) = map.marker_title(id) {
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" font-weight=\"bold\" fill=\"{text}\">{}</text>",
                p.x,
                y + PIN_HEIGHT / 2.0,
                config.font_family,
                config.font_size,
                escape_xml(&title)
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn points_to_path(points: &[(f64, f64)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .unwrap_or(usvg::Size::from_wh(800.0, 600.0).unwrap());

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
