//! Viewport fitting for the rendered roadmap graph.
//!
//! The canvas is asked to fit all current nodes whenever its container
//! settles on a new size. Resize notifications arrive in bursts (window drags,
//! sidebar animations), so they are debounced: a fit is issued only after no
//! further notification has arrived for the quiet period.
//!
//! The fit itself is computed here, not by the canvas, so the same bounds and
//! container always produce the same viewport and re-issuing a fit never
//! makes the view jump.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::RoadmapGraph;
use super::layout::Position;
use crate::{Error, Result};

/// Default debounce duration - wait this long after the last event before fitting
pub const DEBOUNCE_MS: u64 = 100;

/// Measured size of the rendering container
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True until the container has been laid out with a positive area
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned bounding box in graph coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Box of a rectangle whose top-left corner is `origin`
    pub fn from_rect(origin: Position, width: f64, height: f64) -> Self {
        Self {
            min_x: origin.x,
            min_y: origin.y,
            max_x: origin.x + width,
            max_y: origin.y + height,
        }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Options for fitting the graph into the container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Extra space around the content, as a fraction of its size
    pub padding: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 1.2,
            padding: 0.2,
        }
    }
}

impl FitOptions {
    /// Validate the option values.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_zoom > 0.0 && self.min_zoom.is_finite()) {
            return Err(Error::Config(format!(
                "min-zoom must be positive, got {}",
                self.min_zoom
            )));
        }
        if !(self.max_zoom >= self.min_zoom && self.max_zoom.is_finite()) {
            return Err(Error::Config(format!(
                "max-zoom ({}) must not be below min-zoom ({})",
                self.max_zoom, self.min_zoom
            )));
        }
        if !(0.0..1.0).contains(&self.padding) {
            return Err(Error::Config(format!(
                "padding must be in [0, 1), got {}",
                self.padding
            )));
        }
        Ok(())
    }
}

/// Pan and zoom of the canvas. A graph point `p` is drawn at
/// `p * zoom + (x, y)` in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

/// Compute the viewport that centers `bounds` in `container`, scaled to fit
/// with padding, zoom clamped to `[min_zoom, max_zoom]`.
///
/// Fails with [`Error::LayoutPrecondition`] while the container has no area.
pub fn compute_fit(bounds: &Bounds, container: ContainerSize, options: &FitOptions) -> Result<Viewport> {
    if container.is_empty() {
        return Err(Error::LayoutPrecondition(format!(
            "container is {}x{}",
            container.width, container.height
        )));
    }

    let scale = 1.0 + options.padding;
    let zoom_x = container.width / (bounds.width() * scale);
    let zoom_y = container.height / (bounds.height() * scale);
    // A zero-sized dimension yields infinity, which the clamp absorbs.
    let zoom = zoom_x.min(zoom_y).clamp(options.min_zoom, options.max_zoom);

    let center = bounds.center();
    Ok(Viewport {
        x: container.width / 2.0 - center.x * zoom,
        y: container.height / 2.0 - center.y * zoom,
        zoom,
    })
}

/// A single "fit all nodes" command for the canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitCommand {
    /// Nodes to bring into view
    pub node_ids: Vec<String>,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub padding: f64,
    pub container: ContainerSize,
    /// The viewport the canvas should end up with
    pub viewport: Viewport,
}

/// The rendering surface, as far as fitting is concerned.
pub trait GraphCanvas: Send {
    fn fit(&mut self, command: FitCommand);
}

/// Configuration for the viewport fitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitterConfig {
    /// How long the container size must stay unchanged before fitting
    #[serde(with = "duration_ms")]
    pub quiet_period: Duration,
    pub options: FitOptions,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEBOUNCE_MS),
            options: FitOptions::default(),
        }
    }
}

/// Debounce state for fit requests, driven by explicit timestamps.
///
/// Every observation pushes the deadline out by the quiet period; once the
/// deadline passes, [`poll`](FitDebouncer::poll) hands back the size to fit.
#[derive(Debug, Clone)]
pub struct FitDebouncer {
    quiet_period: Duration,
    size: Option<ContainerSize>,
    pending_since: Option<Instant>,
}

impl FitDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            size: None,
            pending_since: None,
        }
    }

    /// Record a container size notification
    pub fn observe_resize(&mut self, size: ContainerSize, now: Instant) {
        self.size = Some(size);
        self.pending_since = Some(now);
    }

    /// Record that the graph content changed and needs a refit
    pub fn observe_content(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    /// Latest known container size
    pub fn size(&self) -> Option<ContainerSize> {
        self.size
    }

    /// When the pending fit becomes due, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.pending_since.map(|t| t + self.quiet_period)
    }

    /// Take the pending fit if the quiet period has elapsed.
    ///
    /// Returns `None` while still inside the quiet period. Once due, the
    /// pending state is cleared even if the container has no area yet; a
    /// later non-zero measurement starts a new cycle.
    pub fn poll(&mut self, now: Instant) -> Option<ContainerSize> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.pending_since = None;
        match self.size {
            Some(size) if !size.is_empty() => Some(size),
            _ => None,
        }
    }
}

/// Input to the viewport fitter
#[derive(Debug, Clone)]
pub enum ViewportEvent {
    /// The container was measured at a new size
    Resized(ContainerSize),
    /// A new graph was synthesized
    ContentChanged(RoadmapGraph),
}

/// Observes container size and graph changes and issues debounced fits.
#[derive(Debug)]
pub struct ViewportFitter<C: GraphCanvas> {
    canvas: C,
    config: FitterConfig,
    debouncer: FitDebouncer,
    node_ids: Vec<String>,
    bounds: Option<Bounds>,
}

impl<C: GraphCanvas> ViewportFitter<C> {
    /// Create a fitter for `canvas` showing `graph`
    pub fn new(canvas: C, graph: &RoadmapGraph, config: FitterConfig) -> Self {
        Self {
            canvas,
            config,
            debouncer: FitDebouncer::new(config.quiet_period),
            node_ids: graph.node_ids(),
            bounds: graph.bounds(),
        }
    }

    /// Handle one event at `now`
    pub fn handle(&mut self, event: ViewportEvent, now: Instant) {
        match event {
            ViewportEvent::Resized(size) => self.debouncer.observe_resize(size, now),
            ViewportEvent::ContentChanged(graph) => {
                self.node_ids = graph.node_ids();
                self.bounds = graph.bounds();
                self.debouncer.observe_content(now);
            }
        }
    }

    /// Issue the pending fit if it is due. Returns true if a fit was issued.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        let Some(container) = self.debouncer.poll(now) else {
            return false;
        };
        let Some(bounds) = self.bounds else {
            return false;
        };
        match compute_fit(&bounds, container, &self.config.options) {
            Ok(viewport) => {
                tracing::debug!(
                    width = container.width,
                    height = container.height,
                    zoom = viewport.zoom,
                    "fitting roadmap graph"
                );
                self.canvas.fit(FitCommand {
                    node_ids: self.node_ids.clone(),
                    min_zoom: self.config.options.min_zoom,
                    max_zoom: self.config.options.max_zoom,
                    padding: self.config.options.padding,
                    container,
                    viewport,
                });
                true
            }
            Err(e) if e.is_benign() => {
                tracing::debug!("deferring fit: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("fit failed: {}", e);
                false
            }
        }
    }

    /// Consume events until the channel closes, then hand back the canvas.
    pub async fn run(mut self, mut events: mpsc::Receiver<ViewportEvent>) -> C {
        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle(event, Instant::now()),
                        None => break, // Channel closed
                    }
                }
                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    self.fire_if_due(Instant::now());
                }
            }
        }

        self.canvas
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
