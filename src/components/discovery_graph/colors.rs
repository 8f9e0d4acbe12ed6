use std::collections::HashMap;

pub const GROUP_EDGE_COLOR: &str = "#4CAF50";
pub const DEFAULT_EDGE_COLOR: &str = "#888";

/// Stable per-user edge colours.
#[derive(Clone, Debug, Default)]
pub struct UserColors {
	cache: HashMap<String, String>,
}

impl UserColors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn color_for(&mut self, user_id: &str) -> String {
		self.cache
			.entry(user_id.to_owned())
			.or_insert_with(|| {
				let hue = (hash_user_id(user_id) as i64).abs() % 360;
				hsl_to_hex(hue as f64, 65.0, 60.0)
			})
			.clone()
	}
}

/// 32-bit `c + (h << 5) - h` over UTF-16 code units.
fn hash_user_id(user_id: &str) -> i32 {
	user_id.encode_utf16().fold(0i32, |hash, c| {
		(c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
	})
}

/// `s` and `l` are percentages.
pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
	let l = l / 100.0;
	let a = s * l.min(1.0 - l) / 100.0;
	let channel = |n: f64| {
		let k = (n + h / 30.0) % 12.0;
		let color = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
		(255.0 * color).round() as u8
	};
	format!("#{:02x}{:02x}{:02x}", channel(0.0), channel(8.0), channel(4.0))
}
