use std::collections::HashMap;

use crate::{data::TrackPoint, projection::{Coord, project}};

/// Visual style of a feature, the renderer maps these onto painter calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureStyle
{
   /// Filled circle marker, radius in pixels and RGB fill.
   Marker { radius: f32, fill: [u8; 3] },
   /// Stroked line, width in pixels and RGB stroke.
   Line { width: f32, stroke: [u8; 3] },
}

pub const MARKER_STYLE: FeatureStyle = FeatureStyle::Marker { radius: 6.0, fill: [0xc4, 0x1c, 0x2d] };
pub const PATH_STYLE: FeatureStyle = FeatureStyle::Line { width: 3.0, stroke: [0, 0, 0] };

#[derive(Debug, Clone, PartialEq)]
pub enum Feature
{
   Point
   {
      id:    i64,
      coord: Coord,
      data:  TrackPoint,
      style: FeatureStyle,
   },
   Path
   {
      vertices: Vec<Coord>,
      style:    FeatureStyle,
   },
}

impl Feature
{
   pub fn point_id(&self) -> Option<i64>
   {
      match self
      {
         | Feature::Point { id, .. } => Some(*id),
         | Feature::Path { .. } => None,
      }
   }
}

/// The feature set built from one snapshot, in add order: point features chronologically, then the path.
#[derive(Debug, Clone, Default)]
pub struct TrackFeatures
{
   features:       Vec<Feature>,
   index:          HashMap<i64, usize>,
   latest:         Option<usize>,
   invalid_points: usize,
}

impl TrackFeatures
{
   pub fn features(&self) -> &[Feature] { &self.features }

   pub fn is_empty(&self) -> bool { self.features.is_empty() }

   pub fn invalid_points(&self) -> usize { self.invalid_points }

   pub fn point_count(&self) -> usize { self.index.len() }

   /// The point feature with the given id, if any.
   pub fn point(&self, id: i64) -> Option<(&TrackPoint, Coord)>
   //------------------------------------------------------------
   {
      self.index.get(&id).and_then(|&i| match &self.features[i]
      {
         | Feature::Point { data, coord, .. } => Some((data, *coord)),
         | Feature::Path { .. } => None,
      })
   }

   /// Chronologically last point with valid geometry.
   pub fn latest(&self) -> Option<(&TrackPoint, Coord)>
   //----------------------------------------------------
   {
      self.latest.and_then(|i| match &self.features[i]
      {
         | Feature::Point { data, coord, .. } => Some((data, *coord)),
         | Feature::Path { .. } => None,
      })
   }

   pub fn path(&self) -> Option<&[Coord]>
   //-------------------------------------
   {
      self.features.iter().find_map(|f| match f
      {
         | Feature::Path { vertices, .. } => Some(vertices.as_slice()),
         | Feature::Point { .. } => None,
      })
   }

   /// Every projected coordinate in the set, used for extent computation.
   pub fn coords(&self) -> impl Iterator<Item = Coord> + '_
   //-------------------------------------------------------
   {
      self.features.iter().flat_map(|f| match f
      {
         | Feature::Point { coord, .. } => std::slice::from_ref(coord).iter().copied(),
         | Feature::Path { vertices, .. } => vertices.iter().copied(),
      })
   }
}

/// Returns the points ordered by ascending timestamp. Stable, so equal timestamps keep input order.
pub fn sort_chronologically(points: &[TrackPoint]) -> Vec<TrackPoint>
//--------------------------------------------------------------------
{
   let mut sorted = points.to_vec();
   sorted.sort_by_key(|p| p.date);
   sorted
}

/// Builds the point and path features for a snapshot. Points with invalid geometry are left out
/// of both the markers and the path so they cannot distort the extent.
pub fn build(points: &[TrackPoint]) -> TrackFeatures
//--------------------------------------------------
{
   let sorted = sort_chronologically(points);
   let mut track = TrackFeatures::default();
   let mut vertices = Vec::with_capacity(sorted.len());

   for pt in sorted
   {
      if !pt.has_valid_position()
      {
         log::warn!("Skipping track point {} with invalid position ({}, {})", pt.id, pt.latitude, pt.longitude);
         track.invalid_points += 1;
         continue;
      }
      if track.index.contains_key(&pt.id)
      {
         log::warn!("Skipping track point with duplicate id {}", pt.id);
         continue;
      }
      let coord = project(pt.longitude, pt.latitude);
      vertices.push(coord);
      track.index.insert(pt.id, track.features.len());
      track.latest = Some(track.features.len());
      track.features.push(Feature::Point { id: pt.id, coord, data: pt, style: MARKER_STYLE });
   }

   if vertices.len() >= 2
   {
      track.features.push(Feature::Path { vertices, style: PATH_STYLE });
   }
   track
}

#[cfg(test)]
pub(crate) mod tests
{
   use super::*;

   pub(crate) fn point(id: i64, date: i64, lat: f64, lon: f64) -> TrackPoint
   {
      TrackPoint { id, date, latitude: lat, longitude: lon, ..TrackPoint::default() }
   }

   #[test]
   fn path_follows_timestamps_not_input_order()
   {
      let points = vec![point(3, 3, 3.0, 3.0), point(1, 1, 1.0, 1.0), point(2, 2, 2.0, 2.0)];
      let track = build(&points);
      let expected: Vec<Coord> = [1.0, 2.0, 3.0].iter().map(|&v| project(v, v)).collect();
      assert_eq!(track.path().unwrap(), expected.as_slice());
      let ids: Vec<i64> = track.features().iter().filter_map(|f| f.point_id()).collect();
      assert_eq!(ids, vec![1, 2, 3]);
   }

   #[test]
   fn empty_snapshot_has_no_features()
   {
      let track = build(&[]);
      assert!(track.is_empty());
      assert!(track.path().is_none());
      assert!(track.latest().is_none());
   }

   #[test]
   fn single_point_has_no_path()
   {
      let track = build(&[point(5, 10, 50.0, 5.0)]);
      assert_eq!(track.features().len(), 1);
      assert_eq!(track.point_count(), 1);
      assert!(track.path().is_none());
   }

   #[test]
   fn path_is_added_after_points_with_distinct_style()
   {
      let track = build(&[point(1, 1, 0.0, 0.0), point(2, 2, 1.0, 1.0)]);
      assert_eq!(track.features().len(), 3);
      match &track.features()[2]
      {
         | Feature::Path { style, .. } => assert_eq!(*style, PATH_STYLE),
         | other => panic!("expected path, got {:?}", other),
      }
      match &track.features()[0]
      {
         | Feature::Point { style, .. } => assert_eq!(*style, MARKER_STYLE),
         | other => panic!("expected point, got {:?}", other),
      }
   }

   #[test]
   fn latest_is_chronologically_last()
   {
      let track = build(&[point(9, 100, 1.0, 1.0), point(4, 300, 2.0, 2.0), point(6, 200, 3.0, 3.0)]);
      assert_eq!(track.latest().unwrap().0.id, 4);
   }

   #[test]
   fn equal_timestamps_keep_input_order()
   {
      let track = build(&[point(2, 5, 1.0, 1.0), point(1, 5, 2.0, 2.0)]);
      let ids: Vec<i64> = track.features().iter().filter_map(|f| f.point_id()).collect();
      assert_eq!(ids, vec![2, 1]);
   }

   #[test]
   fn invalid_points_are_excluded_everywhere()
   {
      let points = vec![point(1, 1, 10.0, 10.0), point(2, 2, f64::NAN, 0.0), point(3, 3, 95.0, 0.0), point(4, 4, 11.0, 11.0)];
      let track = build(&points);
      assert_eq!(track.invalid_points(), 2);
      assert_eq!(track.point_count(), 2);
      assert_eq!(track.path().unwrap().len(), 2);
      assert!(track.point(2).is_none());
      assert!(track.coords().all(|c| c.is_finite()));
   }

   #[test]
   fn latest_skips_invalid_trailing_point()
   {
      let track = build(&[point(1, 1, 10.0, 10.0), point(2, 2, 0.0, 200.0)]);
      assert_eq!(track.latest().unwrap().0.id, 1);
   }

   #[test]
   fn lookup_by_id_returns_projected_position()
   {
      let track = build(&[point(42, 1, 55.0, 4.5)]);
      let (data, coord) = track.point(42).unwrap();
      assert_eq!(data.id, 42);
      assert_eq!(coord, project(4.5, 55.0));
   }
}
