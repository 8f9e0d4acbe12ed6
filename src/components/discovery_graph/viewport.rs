use super::config::GraphConfig;
use super::types::Point;

const FALLBACK_MIN_ZOOM: f64 = 0.1;
const FALLBACK_MAX_ZOOM: f64 = 4.0;

/// Pan/zoom transform. Screen points are relative to the canvas origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
	pub pan: Point,
	pub zoom: f64,
	min_zoom: f64,
	max_zoom: f64,
}

impl Viewport {
	/// Bounds that are not positive and finite fall back to the defaults;
	/// reversed bounds are swapped.
	pub fn new(pan: Point, zoom: f64, min_zoom: f64, max_zoom: f64) -> Self {
		let (min_zoom, max_zoom) = zoom_bounds(min_zoom, max_zoom);
		let zoom = if zoom.is_finite() { zoom } else { 1.0 };
		Self {
			pan,
			zoom: zoom.clamp(min_zoom, max_zoom),
			min_zoom,
			max_zoom,
		}
	}

	/// Centred on the canvas at the configured initial zoom.
	pub fn for_canvas(config: &GraphConfig, width: f64, height: f64) -> Self {
		Self::new(
			Point::new(width / 2.0, height / 2.0),
			config.initial_zoom,
			config.min_zoom,
			config.max_zoom,
		)
	}

	pub fn screen_to_graph(&self, screen: Point) -> Point {
		Point::new(
			(screen.x - self.pan.x) / self.zoom,
			(screen.y - self.pan.y) / self.zoom,
		)
	}

	pub fn pan_by(&mut self, dx: f64, dy: f64) {
		self.pan.x += dx;
		self.pan.y += dy;
	}

	/// Sets the zoom (clamped) while keeping the graph point under `anchor` fixed.
	pub fn zoom_about(&mut self, anchor: Point, zoom: f64) {
		if !zoom.is_finite() {
			return;
		}
		let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
		let ratio = zoom / self.zoom;
		self.pan.x = anchor.x - (anchor.x - self.pan.x) * ratio;
		self.pan.y = anchor.y - (anchor.y - self.pan.y) * ratio;
		self.zoom = zoom;
	}

	/// Additive wheel zoom about the cursor.
	pub fn wheel(&mut self, cursor: Point, delta_y: f64, zoom_factor: f64) {
		self.zoom_about(cursor, self.zoom - delta_y * zoom_factor);
	}

	pub fn zoom_in(&mut self, center: Point) {
		self.zoom_about(center, self.zoom * 1.2);
	}

	pub fn zoom_out(&mut self, center: Point, floor: f64) {
		self.zoom_about(center, (self.zoom * 0.8).max(floor));
	}

	pub fn reset(&mut self) {
		self.zoom = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
		self.pan = Point::default();
	}

	pub fn zoom_percent(&self) -> u32 {
		(self.zoom * 100.0).round() as u32
	}
}

fn zoom_bounds(min: f64, max: f64) -> (f64, f64) {
	let usable = |z: f64| z.is_finite() && z > 0.0;
	let min = if usable(min) { min } else { FALLBACK_MIN_ZOOM };
	let max = if usable(max) { max } else { FALLBACK_MAX_ZOOM };
	if min <= max { (min, max) } else { (max, min) }
}

#[cfg(test)]
impl Viewport {
	pub fn graph_to_screen(&self, graph: Point) -> Point {
		Point::new(
			graph.x * self.zoom + self.pan.x,
			graph.y * self.zoom + self.pan.y,
		)
	}
}
