use std::time::{Duration, Instant};

use crate::{projection::{Coord, MapView, project, zoom_for_resolution}, track::TrackFeatures};

/// Axis aligned bounding box in map space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent
{
   pub min_x: f64,
   pub min_y: f64,
   pub max_x: f64,
   pub max_y: f64,
}

impl Extent
{
   /// Extent of the coordinates, None when there are none or any bound is not finite.
   pub fn from_coords(coords: impl IntoIterator<Item = Coord>) -> Option<Extent>
   //----------------------------------------------------------------------------
   {
      let mut extent: Option<Extent> = None;
      for c in coords
      {
         extent = Some(match extent
         {
            | None => Extent { min_x: c.x, min_y: c.y, max_x: c.x, max_y: c.y },
            | Some(e) => Extent { min_x: e.min_x.min(c.x),
                                  min_y: e.min_y.min(c.y),
                                  max_x: e.max_x.max(c.x),
                                  max_y: e.max_y.max(c.y) },
         });
      }
      extent.filter(|e| e.is_finite())
   }

   pub fn is_finite(&self) -> bool
   {
      self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
   }

   pub fn width(&self) -> f64 { self.max_x - self.min_x }

   pub fn height(&self) -> f64 { self.max_y - self.min_y }

   pub fn center(&self) -> Coord { Coord::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0) }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig
{
   pub default_center: Coord,
   pub default_zoom:   f64,
   pub min_zoom:       f64,
   pub max_zoom:       f64,
   /// Zoom used when a deep link focuses a single point.
   pub detail_zoom:    f64,
   /// Upper bound when fitting the whole track.
   pub fit_max_zoom:   f64,
   /// Pixels kept free on every side when fitting.
   pub padding:        f64,
}

impl Default for ViewportConfig
{
   fn default() -> Self
   {
      Self
      {
         default_center: project(4.5, 55.0),
         default_zoom: 18.0,
         min_zoom: 2.0,
         max_zoom: 19.0,
         detail_zoom: 12.0,
         fit_max_zoom: 20.0,
         padding: 40.0,
      }
   }
}

impl ViewportConfig
{
   pub fn clamp_zoom(&self, zoom: f64) -> f64 { zoom.clamp(self.min_zoom, self.max_zoom) }

   pub fn default_view(&self, width: f64, height: f64) -> MapView
   {
      MapView::new(self.default_center, self.clamp_zoom(self.default_zoom), width, height)
   }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewResolution
{
   /// A deep link resolved to a point, the view is centered on it at detail zoom.
   Focus(MapView),
   /// The view fits the extent of all features.
   Fit(MapView),
   /// Nothing to fit, the current view is kept.
   Default(MapView),
}

impl ViewResolution
{
   pub fn view(&self) -> MapView
   {
      match self
      {
         | ViewResolution::Focus(v) | ViewResolution::Fit(v) | ViewResolution::Default(v) => *v,
      }
   }
}

/// Resolves the initial camera for a feature set. `current` supplies the viewport size and is
/// returned unchanged when there is nothing to fit.
pub fn resolve(features: &TrackFeatures, deep_link_id: Option<i64>, current: MapView, config: &ViewportConfig) -> ViewResolution
//----------------------------------------------------------------------------------------------------------------------------
{
   if let Some(id) = deep_link_id
      && let Some((_, coord)) = features.point(id)
   {
      let zoom = config.detail_zoom.min(config.max_zoom);
      return ViewResolution::Focus(MapView::new(coord, zoom, current.width, current.height));
   }

   match Extent::from_coords(features.coords())
   {
      | Some(extent) => ViewResolution::Fit(fit(&extent, current, config)),
      | None => ViewResolution::Default(current),
   }
}

/// Center and zoom that show the whole extent inside the padded viewport.
pub fn fit(extent: &Extent, current: MapView, config: &ViewportConfig) -> MapView
//-------------------------------------------------------------------------------
{
   let cap = config.fit_max_zoom.min(config.max_zoom);
   let usable_w = (current.width - 2.0 * config.padding).max(1.0);
   let usable_h = (current.height - 2.0 * config.padding).max(1.0);
   let needed = (extent.width() / usable_w).max(extent.height() / usable_h);
   let zoom = if needed > 0.0 && needed.is_finite()
   {
      zoom_for_resolution(needed).min(cap).max(config.min_zoom)
   }
   else
   {
      // A single point or stacked duplicates.
      cap
   };
   MapView::new(extent.center(), zoom, current.width, current.height)
}

pub const RECENTER_DURATION: Duration = Duration::from_millis(500);

/// Non-blocking recentering of the view, sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAnimation
{
   pub from:     Coord,
   pub to:       Coord,
   pub started:  Instant,
   pub duration: Duration,
}

impl ViewAnimation
{
   pub fn new(from: Coord, to: Coord, started: Instant) -> Self { Self { from, to, started, duration: RECENTER_DURATION } }

   /// Center at `now` and whether the animation has finished.
   pub fn sample(&self, now: Instant) -> (Coord, bool)
   //--------------------------------------------------
   {
      let elapsed = now.saturating_duration_since(self.started);
      if self.duration.is_zero() || elapsed >= self.duration
      {
         return (self.to, true);
      }
      let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
      let eased = 1.0 - (1.0 - t).powi(3);
      (Coord::new(self.from.x + (self.to.x - self.from.x) * eased, self.from.y + (self.to.y - self.from.y) * eased), false)
   }
}
