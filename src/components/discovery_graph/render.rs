use std::f64::consts::{FRAC_PI_2, PI, TAU};

use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use super::colors::DEFAULT_EDGE_COLOR;
use super::config::GraphConfig;
use super::graph::DiscoveryGraph;
use super::images::ImageCache;
use super::types::{Connection, Node, Point};
use super::viewport::Viewport;

const BACKGROUND: &str = "#1a1a2e";
const NODE_FILL: &str = "#4caf4f";
const NODE_STROKE: &str = "#ffffff";
const LABEL_BACKGROUND: &str = "rgba(255, 255, 255, 0.8)";
const LABEL_TEXT: &str = "#333333";
const LABEL_LOADING: &str = "#666666";
const LABEL_PADDING: f64 = 4.0;
const LABEL_FONT_PX: f64 = 12.0;
const NAME_FONT_PX: f64 = 14.0;

/// Everything a frame reads. Nothing here is mutated while drawing.
pub struct Scene<'a> {
	pub graph: &'a DiscoveryGraph,
	pub viewport: &'a Viewport,
	pub images: &'a ImageCache<HtmlImageElement>,
	pub config: &'a GraphConfig,
	pub width: f64,
	pub height: f64,
}

pub fn render(scene: &Scene<'_>, ctx: &CanvasRenderingContext2d) {
	ctx.clear_rect(0.0, 0.0, scene.width, scene.height);
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, scene.width, scene.height);
	ctx.save();
	let _ = ctx.translate(scene.viewport.pan.x, scene.viewport.pan.y);
	let _ = ctx.scale(scene.viewport.zoom, scene.viewport.zoom);
	for connection in scene.graph.connections() {
		draw_connection(scene, connection, ctx);
	}
	for node in scene.graph.nodes() {
		draw_node(scene, node, ctx);
	}
	ctx.restore();
}

/// Radius a node is drawn at; selected nodes are scaled up.
pub fn drawn_radius(node: &Node, config: &GraphConfig) -> f64 {
	if node.selected {
		node.size * config.node_scaling_factor
	} else {
		node.size
	}
}

/// Segment between the two circle boundaries along the centre line.
pub fn edge_endpoints(a: Point, ra: f64, b: Point, rb: f64) -> Option<(Point, Point)> {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return None;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	Some((
		Point::new(a.x + ux * ra, a.y + uy * ra),
		Point::new(b.x - ux * rb, b.y - uy * rb),
	))
}

/// Rotation for text running from `a` to `b`, flipped so it never reads upside down.
pub fn upright_angle(a: Point, b: Point) -> f64 {
	let angle = (b.y - a.y).atan2(b.x - a.x);
	if angle > FRAC_PI_2 {
		angle - PI
	} else if angle < -FRAC_PI_2 {
		angle + PI
	} else {
		angle
	}
}

fn draw_connection(scene: &Scene<'_>, connection: &Connection, ctx: &CanvasRenderingContext2d) {
	let (Some(source), Some(target)) = (
		scene.graph.node(connection.source),
		scene.graph.node(connection.target),
	) else {
		return;
	};
	let Some((start, end)) = edge_endpoints(
		source.position(),
		drawn_radius(source, scene.config),
		target.position(),
		drawn_radius(target, scene.config),
	) else {
		return;
	};

	ctx.set_stroke_style_str(connection.color.as_deref().unwrap_or(DEFAULT_EDGE_COLOR));
	ctx.set_line_width(scene.config.connection_width);
	ctx.begin_path();
	ctx.move_to(start.x, start.y);
	ctx.line_to(end.x, end.y);
	ctx.stroke();

	if !scene.config.show_labels {
		return;
	}
	let Some(text) = connection.display_label() else {
		return;
	};
	let mid = start.midpoint(end);
	ctx.save();
	let _ = ctx.translate(mid.x, mid.y);
	let _ = ctx.rotate(upright_angle(start, end));
	ctx.set_font(&format!("{LABEL_FONT_PX}px sans-serif"));
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	let text_width = ctx.measure_text(text).map(|m| m.width()).unwrap_or(0.0);
	ctx.set_fill_style_str(LABEL_BACKGROUND);
	ctx.fill_rect(
		-text_width / 2.0 - LABEL_PADDING,
		-LABEL_FONT_PX / 2.0 - LABEL_PADDING,
		text_width + LABEL_PADDING * 2.0,
		LABEL_FONT_PX + LABEL_PADDING * 2.0,
	);
	ctx.set_fill_style_str(if connection.label_loading {
		LABEL_LOADING
	} else {
		LABEL_TEXT
	});
	let _ = ctx.fill_text(text, 0.0, 0.0);
	ctx.restore();
}

fn draw_node(scene: &Scene<'_>, node: &Node, ctx: &CanvasRenderingContext2d) {
	let (x, y) = (node.x, node.y);
	let radius = drawn_radius(node, scene.config);

	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, TAU);
	match node.image.as_ref().and_then(|key| scene.images.ready(key)) {
		Some(image) => {
			ctx.save();
			ctx.clip();
			let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
				image,
				x - radius,
				y - radius,
				radius * 2.0,
				radius * 2.0,
			);
			ctx.restore();
		}
		None => {
			ctx.set_fill_style_str(NODE_FILL);
			ctx.fill();
		}
	}

	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, TAU);
	ctx.set_stroke_style_str(NODE_STROKE);
	ctx.set_line_width(if node.selected {
		scene.config.selected_border_px
	} else {
		scene.config.border_px
	});
	ctx.stroke();

	ctx.set_fill_style_str(NODE_STROKE);
	ctx.set_font(&format!("{NAME_FONT_PX}px sans-serif"));
	ctx.set_text_align("center");
	ctx.set_text_baseline("top");
	let _ = ctx.fill_text(&node.name, x, y + radius + 4.0);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::discovery_graph::graph::tests::species;

	#[test]
	fn endpoints_sit_on_circle_boundaries() {
		let (start, end) =
			edge_endpoints(Point::new(0.0, 0.0), 10.0, Point::new(100.0, 0.0), 20.0).unwrap();
		assert_eq!(start, Point::new(10.0, 0.0));
		assert_eq!(end, Point::new(80.0, 0.0));
	}

	#[test]
	fn coincident_centres_draw_no_edge() {
		let p = Point::new(5.0, 5.0);
		assert_eq!(edge_endpoints(p, 10.0, p, 10.0), None);
	}

	#[test]
	fn labels_are_never_upside_down() {
		let origin = Point::new(0.0, 0.0);
		assert_eq!(upright_angle(origin, Point::new(10.0, 0.0)), 0.0);
		// right to left reads left to right
		assert!(upright_angle(origin, Point::new(-10.0, 0.0)).abs() < 1e-12);
		for (x, y) in [(3.0, 4.0), (-3.0, 4.0), (-3.0, -4.0), (3.0, -4.0), (0.0, 1.0)] {
			let angle = upright_angle(origin, Point::new(x, y));
			assert!((-FRAC_PI_2..=FRAC_PI_2).contains(&angle), "{x},{y} -> {angle}");
		}
	}

	#[test]
	fn selected_nodes_draw_larger() {
		let config = GraphConfig::default();
		let mut node = species("Robin", 0.0, 0.0);
		assert_eq!(drawn_radius(&node, &config), 50.0);
		node.selected = true;
		assert!((drawn_radius(&node, &config) - 54.0).abs() < 1e-9);
	}
}
