use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, MouseEvent, TouchEvent,
	TouchList, WheelEvent, Window,
};

use super::api::LabelClient;
use super::config::GraphConfig;
use super::ingest::QuestBatch;
use super::state::{DiscoveryGraphState, GraphCaches, ImageRequest, NodeClick};
use super::types::Point;

type SharedState = Rc<RefCell<Option<DiscoveryGraphState<HtmlImageElement>>>>;

/// Browser side of the graph: timers, fetches, image decodes and the click callback.
#[derive(Clone)]
struct Host {
	state: SharedState,
	client: LabelClient,
	/// Bumped whenever the graph is rebuilt; stale timers and fetches check it.
	epoch: Rc<Cell<u32>>,
	on_node_click: Option<Callback<NodeClick>>,
	zoom_percent: RwSignal<u32>,
	grabbing: RwSignal<bool>,
	zoom_level: Option<RwSignal<f64>>,
	pan_offset: Option<RwSignal<Point>>,
}

fn millis(ms: f64) -> Duration {
	Duration::from_millis(ms.max(0.0) as u64)
}

fn set_if_changed<T: PartialEq + Send + Sync + 'static>(signal: RwSignal<T>, value: T) {
	if signal.with_untracked(|current| *current != value) {
		signal.set(value);
	}
}

impl Host {
	fn with_state<R>(
		&self,
		f: impl FnOnce(&mut DiscoveryGraphState<HtmlImageElement>) -> R,
	) -> Option<R> {
		self.state.borrow_mut().as_mut().map(f)
	}

	/// Runs the side effects the last state change asked for.
	fn pump(&self) {
		let Some((labels_queued, images, clicks, debounce_ms)) = self.with_state(|s| {
			(
				s.take_labels_queued(),
				s.take_image_requests(),
				s.take_clicks(),
				s.config.label_debounce_ms,
			)
		}) else {
			return;
		};
		if labels_queued {
			self.debounce_labels(debounce_ms);
		}
		for request in images {
			self.load_image(request);
		}
		for click in clicks {
			self.emit(Some(click));
		}
		self.sync_view();
	}

	fn emit(&self, click: Option<NodeClick>) {
		if let (Some(callback), Some(click)) = (self.on_node_click, click) {
			debug!("node click: {}", click.name);
			callback.run(click);
		}
	}

	/// Pushes zoom, pan and grab state out to the signals that display them.
	fn sync_view(&self) {
		let Some((percent, zoom, pan, grabbing)) = self.with_state(|s| {
			(s.zoom_percent(), s.zoom(), s.pan_offset(), s.is_grabbing())
		}) else {
			return;
		};
		set_if_changed(self.zoom_percent, percent);
		set_if_changed(self.grabbing, grabbing);
		if let Some(signal) = self.zoom_level {
			set_if_changed(signal, zoom);
		}
		if let Some(signal) = self.pan_offset {
			set_if_changed(signal, pan);
		}
	}

	fn schedule_step(&self, delay_ms: f64) {
		let (host, epoch) = (self.clone(), self.epoch.get());
		let scheduled = set_timeout_with_handle(
			move || {
				if host.epoch.get() != epoch {
					return;
				}
				let next = host.with_state(|s| s.step()).flatten();
				host.pump();
				if let Some(delay) = next {
					host.schedule_step(delay);
				}
			},
			millis(delay_ms),
		);
		if let Err(err) = scheduled {
			warn!("could not schedule reveal step: {err:?}");
		}
	}

	fn debounce_labels(&self, debounce_ms: f64) {
		let host = self.clone();
		let handle = match set_timeout_with_handle(move || host.flush_labels(), millis(debounce_ms)) {
			Ok(handle) => Some(handle),
			Err(err) => {
				warn!("could not schedule label flush: {err:?}");
				None
			}
		};
		let previous = match self.state.borrow_mut().as_mut() {
			Some(s) => s.labels.replace_timer(handle),
			None => handle,
		};
		if let Some(previous) = previous {
			previous.clear();
		}
	}

	fn flush_labels(&self) {
		let Some(batches) = self.with_state(|s| s.flush_labels()) else {
			return;
		};
		let epoch = self.epoch.get();
		for batch in batches {
			let host = self.clone();
			spawn_local(async move {
				let result = host.client.fetch(&batch).await;
				if host.epoch.get() != epoch {
					debug!("dropping labels for a replaced graph");
					return;
				}
				host.with_state(|s| s.complete_label_batch(&batch, result));
			});
		}
	}

	fn load_image(&self, request: ImageRequest) {
		let image = match HtmlImageElement::new() {
			Ok(image) => image,
			Err(err) => {
				warn!("could not create image element: {err:?}");
				return;
			}
		};
		image.set_cross_origin(Some("anonymous"));

		let (host, key, loaded) = (self.clone(), request.key.clone(), image.clone());
		let onload = Closure::once_into_js(move || {
			host.with_state(|s| s.image_loaded(&key, loaded));
		});
		let (host, key) = (self.clone(), request.key);
		let onerror = Closure::once_into_js(move || {
			host.with_state(|s| s.image_failed(&key));
		});
		image.set_onload(Some(onload.unchecked_ref()));
		image.set_onerror(Some(onerror.unchecked_ref()));
		image.set_src(&request.src);
	}

	/// Replaces the graph with one built from `batches`, keeping the caches.
	fn rebuild(&self, batches: &[QuestBatch], config: &GraphConfig, width: f64, height: f64) {
		self.epoch.set(self.epoch.get().wrapping_add(1));
		let previous = self.state.borrow_mut().take();
		let caches = match previous {
			Some(mut old) => {
				if let Some(timer) = old.labels.replace_timer(None) {
					timer.clear();
				}
				old.into_caches()
			}
			None => GraphCaches::from_config(config),
		};
		let seed = js_sys::Date::now() as u64;
		let mut next = DiscoveryGraphState::new(batches, config.clone(), caches, seed, width, height);
		let first = next.start();
		*self.state.borrow_mut() = Some(next);
		self.pump();
		if let Some(delay) = first {
			self.schedule_step(delay);
		}
	}
}

fn canvas_size(
	canvas: &HtmlCanvasElement,
	window: &Window,
	fullscreen: bool,
	width: Option<f64>,
	height: Option<f64>,
) -> (f64, f64) {
	let window_dim = |v: Result<JsValue, JsValue>, fallback: f64| {
		v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback)
	};
	if fullscreen {
		return (
			window_dim(window.inner_width(), 800.0),
			window_dim(window.inner_height(), 600.0),
		);
	}
	(
		width.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_width() as f64)
				.unwrap_or(800.0)
		}),
		height.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_height() as f64)
				.unwrap_or(600.0)
		}),
	)
}

fn canvas_point(canvas_ref: NodeRef<leptos::html::Canvas>, client_x: f64, client_y: f64) -> Option<Point> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(Point::new(client_x - rect.left(), client_y - rect.top()))
}

fn touch_points(canvas_ref: NodeRef<leptos::html::Canvas>, touches: &TouchList) -> Vec<Point> {
	(0..touches.length())
		.filter_map(|i| touches.get(i))
		.filter_map(|t| canvas_point(canvas_ref, t.client_x() as f64, t.client_y() as f64))
		.collect()
}

#[component]
pub fn DiscoveryGraphCanvas(
	#[prop(into)] batches: Signal<Vec<QuestBatch>>,
	#[prop(optional)] config: GraphConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(optional, into)] on_node_click: Option<Callback<NodeClick>>,
	/// Receives the current zoom factor.
	#[prop(optional)]
	zoom_level: Option<RwSignal<f64>>,
	/// Receives the current pan offset in canvas pixels.
	#[prop(optional)]
	pan_offset: Option<RwSignal<Point>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let zoom_percent = RwSignal::new((config.initial_zoom * 100.0).round() as u32);
	let grabbing = RwSignal::new(false);
	let host = Host {
		state: Rc::new(RefCell::new(None)),
		client: LabelClient::new(&config.api_url),
		epoch: Rc::new(Cell::new(0)),
		on_node_click,
		zoom_percent,
		grabbing,
		zoom_level,
		pan_offset,
	};
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

	let host_init = host.clone();
	Effect::new(move |_| {
		let batches = batches.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let (w, h) = canvas_size(&canvas, &window, fullscreen, width, height);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		host_init.rebuild(&batches, &config, w, h);

		if resize_cb.borrow().is_none() {
			let (host_resize, canvas_resize) = (host_init.clone(), canvas.clone());
			*resize_cb.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = canvas_size(&canvas_resize, &win, fullscreen, width, height);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				host_resize.with_state(|s| s.resize(nw, nh));
			}));
			if let Some(ref cb) = *resize_cb.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		if animate.borrow().is_some() {
			return;
		}
		let ctx: CanvasRenderingContext2d = match canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into().ok())
		{
			Some(ctx) => ctx,
			None => {
				warn!("canvas has no 2d context");
				return;
			}
		};
		let (host_anim, animate_inner) = (host_init.clone(), animate.clone());
		*animate.borrow_mut() = Some(Closure::new(move || {
			host_anim.with_state(|s| s.render_frame(&ctx));
			if let (Some(win), Some(cb)) = (web_sys::window(), animate_inner.borrow().as_ref()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let host_md = host.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if let Some(at) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64) {
			host_md.with_state(|s| s.pointer_down(at));
			host_md.sync_view();
		}
	};

	let host_mm = host.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some(at) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64) {
			host_mm.with_state(|s| s.pointer_move(at));
			host_mm.sync_view();
		}
	};

	let host_mu = host.clone();
	let on_mouseup = move |_: MouseEvent| {
		let click = host_mu.with_state(|s| s.pointer_up()).flatten();
		host_mu.sync_view();
		host_mu.emit(click);
	};

	let host_ml = host.clone();
	let on_mouseleave = move |_: MouseEvent| {
		host_ml.with_state(|s| s.pointer_leave());
		host_ml.sync_view();
	};

	let host_ts = host.clone();
	let on_touchstart = move |ev: TouchEvent| {
		ev.prevent_default();
		let touches = touch_points(canvas_ref, &ev.touches());
		host_ts.with_state(|s| s.touch_start(&touches));
		host_ts.sync_view();
	};

	let host_tm = host.clone();
	let on_touchmove = move |ev: TouchEvent| {
		ev.prevent_default();
		let touches = touch_points(canvas_ref, &ev.touches());
		host_tm.with_state(|s| s.touch_move(&touches));
		host_tm.sync_view();
	};

	let host_te = host.clone();
	let on_touchend = move |ev: TouchEvent| {
		ev.prevent_default();
		let remaining = touch_points(canvas_ref, &ev.touches());
		let click = host_te.with_state(|s| s.touch_end(&remaining)).flatten();
		host_te.sync_view();
		host_te.emit(click);
	};

	let host_tc = host.clone();
	let on_touchcancel = move |_: TouchEvent| {
		host_tc.with_state(|s| s.touch_cancel());
		host_tc.sync_view();
	};

	let host_wh = host.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some(at) = canvas_point(canvas_ref, ev.client_x() as f64, ev.client_y() as f64) {
			host_wh.with_state(|s| s.wheel(at, ev.delta_y()));
			host_wh.sync_view();
		}
	};

	let host_zi = host.clone();
	let zoom_in = move |_: MouseEvent| {
		host_zi.with_state(|s| s.zoom_in());
		host_zi.sync_view();
	};
	let host_zo = host.clone();
	let zoom_out = move |_: MouseEvent| {
		host_zo.with_state(|s| s.zoom_out());
		host_zo.sync_view();
	};
	let host_zr = host;
	let reset_view = move |_: MouseEvent| {
		host_zr.with_state(|s| s.reset_view());
		host_zr.sync_view();
	};

	view! {
		<div class="discovery-graph">
			<canvas
				node_ref=canvas_ref
				class="discovery-graph-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:touchstart=on_touchstart
				on:touchmove=on_touchmove
				on:touchend=on_touchend
				on:touchcancel=on_touchcancel
				on:wheel=on_wheel
				style=move || {
					let cursor = if grabbing.get() { "grabbing" } else { "grab" };
					format!("display: block; cursor: {cursor}; touch-action: none;")
				}
			/>
			<div class="zoom-controls">
				<button on:click=zoom_in title="Zoom in">"+"</button>
				<button on:click=zoom_out title="Zoom out">"−"</button>
				<button on:click=reset_view title="Reset view">"Reset"</button>
				<span class="zoom-indicator">{move || format!("{}%", zoom_percent.get())}</span>
			</div>
		</div>
	}
}
