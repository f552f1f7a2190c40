use std::f64::consts::PI;

// Spherical Web Mercator (EPSG:3857) radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Half the width of the projected world in meters.
pub const HALF_WORLD_METERS: f64 = PI * EARTH_RADIUS_METERS;

/// Web Mercator is undefined at the poles, latitudes are clamped to the square world.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

pub const TILE_SIZE: f64 = 256.0;

/// A position in the planar map space (EPSG:3857 meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord
{
   pub x: f64,
   pub y: f64,
}

/// A position in screen pixels relative to the top-left corner of the map viewport (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel
{
   pub x: f64,
   pub y: f64,
}

impl Coord
{
   pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

   pub fn is_finite(&self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl Pixel
{
   pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

   pub fn distance(&self, other: Pixel) -> f64 { ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt() }
}

/// True when latitude and longitude are finite and inside the geodetic range.
pub fn is_valid_geodetic(lat: f64, lon: f64) -> bool
//---------------------------------------------------
{
   lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Projects geodetic longitude/latitude (degrees) into Web Mercator meters.
/// Every feature, path vertex and view center goes through this one function.
pub fn project(lon: f64, lat: f64) -> Coord
//------------------------------------------
{
   let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
   let x = EARTH_RADIUS_METERS * lon.to_radians();
   let y = EARTH_RADIUS_METERS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
   Coord { x, y }
}

/// Inverse of [`project`], returns (lon, lat) in degrees.
pub fn unproject(coord: Coord) -> (f64, f64)
//-------------------------------------------
{
   let lon = (coord.x / EARTH_RADIUS_METERS).to_degrees();
   let lat = (2.0 * (coord.y / EARTH_RADIUS_METERS).exp().atan() - PI / 2.0).to_degrees();
   (lon, lat)
}

/// Meters per pixel at the given zoom level for 256 pixel tiles.
pub fn resolution(zoom: f64) -> f64
//---------------------------------
{
   (2.0 * HALF_WORLD_METERS) / (TILE_SIZE * 2f64.powf(zoom))
}

/// Inverse of [`resolution`].
pub fn zoom_for_resolution(resolution: f64) -> f64
//-------------------------------------------------
{
   ((2.0 * HALF_WORLD_METERS) / (TILE_SIZE * resolution)).log2()
}

/// The camera looking at the map: center in map space, zoom and viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView
{
   pub center: Coord,
   pub zoom:   f64,
   pub width:  f64,
   pub height: f64,
}

impl MapView
{
   pub fn new(center: Coord, zoom: f64, width: f64, height: f64) -> Self { Self { center, zoom, width, height } }

   pub fn resolution(&self) -> f64 { resolution(self.zoom) }

   pub fn to_pixel(&self, coord: Coord) -> Pixel
   //--------------------------------------------
   {
      let res = self.resolution();
      Pixel { x: (coord.x - self.center.x) / res + self.width / 2.0,
              y: (self.center.y - coord.y) / res + self.height / 2.0 }
   }

   pub fn to_coord(&self, pixel: Pixel) -> Coord
   //--------------------------------------------
   {
      let res = self.resolution();
      Coord { x: self.center.x + (pixel.x - self.width / 2.0) * res,
              y: self.center.y - (pixel.y - self.height / 2.0) * res }
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   fn close(a: f64, b: f64, eps: f64) -> bool { (a - b).abs() <= eps }

   #[test]
   fn origin_projects_to_origin()
   {
      let c = project(0.0, 0.0);
      assert!(close(c.x, 0.0, 1e-9));
      assert!(close(c.y, 0.0, 1e-9));
   }

   #[test]
   fn antimeridian_is_half_world()
   {
      let c = project(180.0, 0.0);
      assert!(close(c.x, HALF_WORLD_METERS, 1e-6));
      let c = project(-180.0, 0.0);
      assert!(close(c.x, -HALF_WORLD_METERS, 1e-6));
   }

   #[test]
   fn known_point_matches_epsg_3857()
   {
      // lon 4.5, lat 55 is the default map center.
      let c = project(4.5, 55.0);
      assert!(close(c.x, 500_937.7, 1.0));
      assert!(close(c.y, 7_361_866.0, 1.0));
   }

   #[test]
   fn unproject_inverts_project()
   {
      let (lon, lat) = unproject(project(-122.4194, 37.7749));
      assert!(close(lon, -122.4194, 1e-9));
      assert!(close(lat, 37.7749, 1e-9));
   }

   #[test]
   fn projection_is_deterministic()
   {
      assert_eq!(project(10.25, -33.5), project(10.25, -33.5));
   }

   #[test]
   fn poles_are_clamped_to_finite_values()
   {
      assert!(project(0.0, 90.0).is_finite());
      assert!(project(0.0, -90.0).is_finite());
   }

   #[test]
   fn geodetic_validation()
   {
      assert!(is_valid_geodetic(90.0, 180.0));
      assert!(is_valid_geodetic(-90.0, -180.0));
      assert!(!is_valid_geodetic(90.5, 0.0));
      assert!(!is_valid_geodetic(0.0, 181.0));
      assert!(!is_valid_geodetic(f64::NAN, 0.0));
      assert!(!is_valid_geodetic(0.0, f64::INFINITY));
   }

   #[test]
   fn zoom_zero_shows_world_in_one_tile()
   {
      assert!(close(resolution(0.0) * TILE_SIZE, 2.0 * HALF_WORLD_METERS, 1e-6));
      assert!(close(zoom_for_resolution(resolution(7.5)), 7.5, 1e-9));
   }

   #[test]
   fn view_center_is_viewport_center()
   {
      let view = MapView::new(project(4.5, 55.0), 10.0, 800.0, 600.0);
      let p = view.to_pixel(view.center);
      assert!(close(p.x, 400.0, 1e-9));
      assert!(close(p.y, 300.0, 1e-9));
   }

   #[test]
   fn pixel_round_trip_and_north_is_up()
   {
      let view = MapView::new(Coord::new(1000.0, 2000.0), 12.0, 640.0, 480.0);
      let north = Coord::new(1000.0, 2000.0 + view.resolution() * 10.0);
      let p = view.to_pixel(north);
      assert!(close(p.y, 230.0, 1e-9));
      let back = view.to_coord(Pixel::new(17.0, 423.0));
      let again = view.to_pixel(back);
      assert!(close(again.x, 17.0, 1e-6));
      assert!(close(again.y, 423.0, 1e-6));
   }
}
