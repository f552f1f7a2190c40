use std::time::Instant;

use crate::{navigation::NavigationPort,
            projection::{MapView, Pixel},
            track::{Feature, TrackFeatures},
            viewport::ViewAnimation};

/// Clicks closer than this (in pixels) to a feature hit it.
pub const HIT_TOLERANCE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection
{
   Unselected,
   Selected(i64),
}

impl Selection
{
   pub fn id(&self) -> Option<i64>
   {
      match self
      {
         | Selection::Selected(id) => Some(*id),
         | Selection::Unselected => None,
      }
   }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit
{
   /// Index into the feature list and the point id.
   Point { index: usize, id: i64, distance: f64 },
   Path { index: usize, distance: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome
{
   Selected { id: i64, animation: ViewAnimation },
   Cleared,
}

/// Finds what a click at `pixel` touches. Point features always win over the path; among points the
/// nearest projected pixel wins and equal distances go to the feature added first.
pub fn hit_test(features: &TrackFeatures, view: &MapView, pixel: Pixel, tolerance: f64) -> Option<Hit>
//------------------------------------------------------------------------------------------------------
{
   let mut best_point: Option<Hit> = None;
   let mut best_path: Option<Hit> = None;
   for (index, feature) in features.features().iter().enumerate()
   {
      match feature
      {
         | Feature::Point { id, coord, .. } =>
         {
            let distance = view.to_pixel(*coord).distance(pixel);
            let closer = match best_point
            {
               | Some(Hit::Point { distance: best, .. }) => distance < best,
               | _ => true,
            };
            if distance <= tolerance && closer
            {
               best_point = Some(Hit::Point { index, id: *id, distance });
            }
         }
         | Feature::Path { vertices, .. } =>
         {
            let screen: Vec<Pixel> = vertices.iter().map(|c| view.to_pixel(*c)).collect();
            let distance = screen.windows(2)
                                 .map(|w| segment_distance(pixel, w[0], w[1]))
                                 .fold(f64::INFINITY, f64::min);
            if distance <= tolerance
            {
               best_path = Some(Hit::Path { index, distance });
            }
         }
      }
   }
   best_point.or(best_path)
}

fn segment_distance(p: Pixel, a: Pixel, b: Pixel) -> f64
//-------------------------------------------------------
{
   let (dx, dy) = (b.x - a.x, b.y - a.y);
   let len_sq = dx * dx + dy * dy;
   if len_sq == 0.0
   {
      return p.distance(a);
   }
   let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
   p.distance(Pixel::new(a.x + t * dx, a.y + t * dy))
}

/// Owns the single selection and keeps the link's marker parameter in step with it.
/// Every transition writes the navigation port before returning.
#[derive(Debug)]
pub struct SelectionController
{
   selection: Selection,
   tolerance: f64,
}

impl Default for SelectionController
{
   fn default() -> Self { Self::new() }
}

impl SelectionController
{
   pub fn new() -> Self { Self { selection: Selection::Unselected, tolerance: HIT_TOLERANCE } }

   pub fn selection(&self) -> Selection { self.selection }

   /// Seeds the selection from the link's marker parameter. A marker that does not parse or is not in
   /// the snapshot yields Unselected and is stripped from the link.
   pub fn load(&mut self, features: &TrackFeatures, nav: &mut dyn NavigationPort) -> Selection
   //------------------------------------------------------------------------------------------
   {
      self.selection = match nav.marker()
      {
         | None => Selection::Unselected,
         | Some(marker) => match marker.trim().parse::<i64>().ok().filter(|id| features.point(*id).is_some())
         {
            | Some(id) =>
            {
               log::debug!("Deep link resolved to track point {}", id);
               let canonical = id.to_string();
               if marker != canonical
               {
                  nav.set_marker(&canonical);
               }
               Selection::Selected(id)
            }
            | None =>
            {
               log::debug!("Deep link marker {} not in snapshot, clearing", marker);
               nav.clear_marker();
               Selection::Unselected
            }
         },
      };
      self.selection
   }

   /// Revalidates after the snapshot was replaced, exactly like an initial load.
   pub fn snapshot_changed(&mut self, features: &TrackFeatures, nav: &mut dyn NavigationPort) -> Selection
   {
      self.load(features, nav)
   }

   pub fn click(&mut self, pixel: Pixel, view: &MapView, features: &TrackFeatures, nav: &mut dyn NavigationPort,
                now: Instant) -> ClickOutcome
   //----------------------------------------------------------------------------------------------------------
   {
      match hit_test(features, view, pixel, self.tolerance)
      {
         | Some(Hit::Point { id, .. }) =>
         {
            let target = features.point(id).map(|(_, c)| c).unwrap_or(view.center);
            self.selection = Selection::Selected(id);
            nav.set_marker(&id.to_string());
            log::debug!("Selected track point {}", id);
            ClickOutcome::Selected { id, animation: ViewAnimation::new(view.center, target, now) }
         }
         | Some(Hit::Path { .. }) | None =>
         {
            self.clear(nav);
            ClickOutcome::Cleared
         }
      }
   }

   /// The detail panel was dismissed.
   pub fn close(&mut self, nav: &mut dyn NavigationPort) { self.clear(nav); }

   fn clear(&mut self, nav: &mut dyn NavigationPort)
   {
      if self.selection != Selection::Unselected
      {
         log::debug!("Selection cleared");
      }
      self.selection = Selection::Unselected;
      nav.clear_marker();
   }
}
