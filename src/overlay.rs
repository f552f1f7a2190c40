use std::time::Duration;

use crate::{data::TrackPoint, projection::Coord, selection::Selection, track::TrackFeatures};

/// One full breathing cycle of the latest-position marker.
pub const PULSE_PERIOD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent
{
   pub id:          i64,
   pub speed:       String,
   pub course:      String,
   pub temperature: String,
   pub timestamp:   String,
}

impl PopupContent
{
   pub fn from_point(pt: &TrackPoint) -> Self
   //-----------------------------------------
   {
      Self
      {
         id: pt.id,
         speed: format!("{} km/h", pt.speed),
         course: format!("{}°", pt.course),
         temperature: format!("{} °C", pt.temperature),
         timestamp: pt.formatted_date(),
      }
   }
}

/// Anchors the latest-position indicator and the detail popup. Positions are in map space;
/// None means the overlay is hidden.
#[derive(Debug, Clone, Default)]
pub struct OverlayPresenter
{
   latest: Option<Coord>,
   popup:  Option<(Coord, PopupContent)>,
}

impl OverlayPresenter
{
   /// Places the latest-position indicator for a freshly built feature set and syncs the popup.
   pub fn new(features: &TrackFeatures, selection: Selection) -> Self
   //-----------------------------------------------------------------
   {
      let mut overlays = Self { latest: features.latest().map(|(_, c)| c), popup: None };
      overlays.sync_popup(features, selection);
      overlays
   }

   pub fn latest_position(&self) -> Option<Coord> { self.latest }

   pub fn popup(&self) -> Option<&(Coord, PopupContent)> { self.popup.as_ref() }

   /// Moves the popup to the selected point, or hides it when nothing is selected.
   pub fn sync_popup(&mut self, features: &TrackFeatures, selection: Selection)
   //--------------------------------------------------------------------------
   {
      self.popup = selection.id()
                            .and_then(|id| features.point(id))
                            .map(|(pt, coord)| (coord, PopupContent::from_point(pt)));
   }

   pub fn clear(&mut self)
   {
      self.latest = None;
      self.popup = None;
   }
}

/// Pulse phase in [0, 1) for the breathing animation, `elapsed` is time since the surface was mounted.
pub fn pulse_phase(elapsed: Duration) -> f32
//-----------------------------------------
{
   let period = PULSE_PERIOD.as_secs_f32();
   (elapsed.as_secs_f32() % period) / period
}

#[cfg(test)]
mod tests
{
   use super::*;
   use crate::{projection::project, track::{build, tests::point}};

   #[test]
   fn latest_indicator_follows_last_point()
   {
      let track = build(&[point(2, 20, 51.0, 5.0), point(1, 10, 50.0, 4.0)]);
      let overlays = OverlayPresenter::new(&track, Selection::Unselected);
      assert_eq!(overlays.latest_position(), Some(project(5.0, 51.0)));
      assert!(overlays.popup().is_none());
   }

   #[test]
   fn no_indicator_for_empty_snapshot()
   {
      let overlays = OverlayPresenter::new(&build(&[]), Selection::Unselected);
      assert!(overlays.latest_position().is_none());
   }

   #[test]
   fn popup_anchors_to_selection_and_hides_on_deselect()
   {
      let mut pt = point(7, 10, 50.0, 4.0);
      pt.speed = 12.5;
      pt.course = 270.0;
      pt.temperature = 18.0;
      let track = build(&[pt, point(8, 20, 51.0, 5.0)]);
      let mut overlays = OverlayPresenter::new(&track, Selection::Selected(7));
      let (coord, content) = overlays.popup().unwrap().clone();
      assert_eq!(coord, project(4.0, 50.0));
      assert_eq!(content.speed, "12.5 km/h");
      assert_eq!(content.course, "270°");
      assert_eq!(content.temperature, "18 °C");
      // Latest indicator is independent of selection.
      assert_eq!(overlays.latest_position(), Some(project(5.0, 51.0)));

      overlays.sync_popup(&track, Selection::Unselected);
      assert!(overlays.popup().is_none());
      assert!(overlays.latest_position().is_some());
   }

   #[test]
   fn pulse_wraps_every_period()
   {
      assert_eq!(pulse_phase(Duration::ZERO), 0.0);
      assert!((pulse_phase(Duration::from_millis(1500)) - 0.5).abs() < 1e-6);
      assert!(pulse_phase(Duration::from_millis(4500)) < 0.51);
   }
}
