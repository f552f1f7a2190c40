use std::{cell::RefCell, rc::Rc, time::Instant};

use crate::{data::TrackPoint,
            navigation::NavigationPort,
            overlay::OverlayPresenter,
            projection::{MapView, Pixel},
            selection::{ClickOutcome, Selection, SelectionController},
            track::{self, TrackFeatures},
            viewport::{self, ViewAnimation, ViewResolution, ViewportConfig}};

/// The widget area a surface renders into. At most one surface is attached at a time and every
/// attached surface owns exactly one click listener registration.
#[derive(Debug, Default)]
pub struct MapHost
{
   attached:      Option<u64>,
   listeners:     Vec<u64>,
   next_listener: u64,
}

impl MapHost
{
   pub fn new() -> Rc<RefCell<MapHost>> { Rc::new(RefCell::new(MapHost::default())) }

   pub fn attached(&self) -> Option<u64> { self.attached }

   pub fn listener_count(&self) -> usize { self.listeners.len() }

   fn attach(&mut self, version: u64) -> Result<(), String>
   {
      if let Some(current) = self.attached
      {
         return Err(format!("Map host already has surface {} attached, cannot attach {}", current, version));
      }
      self.attached = Some(version);
      Ok(())
   }

   fn detach(&mut self, version: u64)
   {
      if self.attached == Some(version)
      {
         self.attached = None;
      }
   }

   fn register_listener(&mut self) -> u64
   {
      self.next_listener += 1;
      self.listeners.push(self.next_listener);
      self.next_listener
   }

   fn unregister_listener(&mut self, id: u64) { self.listeners.retain(|l| *l != id); }
}

/// Everything rendered for one snapshot version. Built once by [`MapSurface::mount`] and torn
/// down completely on drop; a new snapshot always means drop then mount.
#[derive(Debug)]
pub struct MapSurface
{
   host:      Rc<RefCell<MapHost>>,
   version:   u64,
   listener:  Option<u64>,
   features:  TrackFeatures,
   selection: SelectionController,
   overlays:  OverlayPresenter,
   animation: Option<ViewAnimation>,
   view:      MapView,
   mounted:   Instant,
}

impl MapSurface
{
   /// Attaches to the host, builds the features and resolves the initial selection and view.
   /// `current` is the view before mounting (default view on first mount).
   pub fn mount(host: Rc<RefCell<MapHost>>, version: u64, points: &[TrackPoint], config: &ViewportConfig,
                nav: &mut dyn NavigationPort, current: MapView) -> Result<MapSurface, String>
   //------------------------------------------------------------------------------------------------------
   {
      host.borrow_mut().attach(version)?;
      let listener = Some(host.borrow_mut().register_listener());

      let features = track::build(points);
      // Every mount is a snapshot change; the selection mirrored in the link is revalidated.
      let mut selection = SelectionController::new();
      let initial = selection.snapshot_changed(&features, nav);
      let resolution = viewport::resolve(&features, initial.id(), current, config);
      let overlays = OverlayPresenter::new(&features, initial);
      log::info!("Mounted surface {} with {} points ({} invalid), view {:?}", version, features.point_count(),
                 features.invalid_points(), resolution);

      Ok(MapSurface { host, version, listener, features, selection, overlays, animation: None,
                      view: resolution.view(), mounted: Instant::now() })
   }

   pub fn version(&self) -> u64 { self.version }

   pub fn features(&self) -> &TrackFeatures { &self.features }

   pub fn selection(&self) -> Selection { self.selection.selection() }

   pub fn overlays(&self) -> &OverlayPresenter { &self.overlays }

   pub fn mounted_at(&self) -> Instant { self.mounted }

   /// The view to display, including any recentering in progress.
   pub fn view(&self) -> MapView { self.view }

   pub fn is_animating(&self) -> bool { self.animation.is_some() }

   /// Adopts a view changed by the user (drag, scroll zoom, resize).
   pub fn set_view(&mut self, view: MapView) { self.view = view; }

   /// Resolves the initial view again, e.g. when the viewport size is first known.
   pub fn refit(&mut self, config: &ViewportConfig, width: f64, height: f64) -> ViewResolution
   //---------------------------------------------------------------------------------------
   {
      let current = MapView { width, height, ..self.view };
      let resolution = viewport::resolve(&self.features, self.selection().id(), current, config);
      self.view = resolution.view();
      resolution
   }

   pub fn click(&mut self, pixel: Pixel, view: MapView, nav: &mut dyn NavigationPort, now: Instant) -> ClickOutcome
   //---------------------------------------------------------------------------------------------------------------
   {
      if self.listener.is_none()
      {
         return ClickOutcome::Cleared;
      }
      self.view = view;
      let outcome = self.selection.click(pixel, &view, &self.features, nav, now);
      if let ClickOutcome::Selected { animation, .. } = outcome
      {
         self.animation = Some(animation);
      }
      self.overlays.sync_popup(&self.features, self.selection.selection());
      outcome
   }

   /// Detail panel dismissed.
   pub fn close(&mut self, nav: &mut dyn NavigationPort)
   {
      self.selection.close(nav);
      self.overlays.sync_popup(&self.features, self.selection.selection());
   }

   /// Advances the recentering animation, returns true while it is still running.
   pub fn tick(&mut self, now: Instant) -> bool
   //-------------------------------------------
   {
      let Some(animation) = self.animation else { return false };
      let (center, done) = animation.sample(now);
      self.view.center = center;
      if done
      {
         self.animation = None;
      }
      !done
   }
}

impl Drop for MapSurface
{
   fn drop(&mut self)
   {
      let mut host = self.host.borrow_mut();
      if let Some(listener) = self.listener.take()
      {
         host.unregister_listener(listener);
      }
      host.detach(self.version);
      self.overlays.clear();
      self.animation = None;
      log::info!("Released surface {}", self.version);
   }
}

#[cfg(test)]
mod tests
{
   use std::time::Duration;

   use super::*;
   use crate::{navigation::LinkNavigation, projection::project, track::tests::point};

   fn nav(query: &str) -> LinkNavigation
   {
      LinkNavigation::parse(&format!("https://track.example.org/{}", query)).unwrap()
   }

   fn default_view() -> MapView { ViewportConfig::default().default_view(800.0, 600.0) }

   #[test]
   fn mount_and_drop_release_host()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("");
      {
         let surface = MapSurface::mount(host.clone(), 1, &[point(1, 1, 50.0, 4.0)], &config, &mut nav, default_view()).unwrap();
         assert_eq!(surface.version(), 1);
         assert_eq!(host.borrow().attached(), Some(1));
         assert_eq!(host.borrow().listener_count(), 1);
      }
      assert_eq!(host.borrow().attached(), None);
      assert_eq!(host.borrow().listener_count(), 0);
   }

   #[test]
   fn second_surface_cannot_attach_while_first_is_alive()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("");
      let _first = MapSurface::mount(host.clone(), 1, &[], &config, &mut nav, default_view()).unwrap();
      assert!(MapSurface::mount(host.clone(), 2, &[], &config, &mut nav, default_view()).is_err());
      assert_eq!(host.borrow().listener_count(), 1);
   }

   #[test]
   fn rebuild_replaces_features()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("");
      let view = MapView::new(project(4.0, 50.0), 12.0, 800.0, 600.0);
      let old_px = view.to_pixel(project(4.0, 50.0));

      let mut surface = MapSurface::mount(host.clone(), 1, &[point(1, 1, 50.0, 4.0)], &config, &mut nav, view).unwrap();
      drop(surface);
      surface = MapSurface::mount(host.clone(), 2, &[point(2, 1, 40.0, -3.0)], &config, &mut nav, view).unwrap();

      assert_eq!(host.borrow().attached(), Some(2));
      assert_eq!(host.borrow().listener_count(), 1);
      assert!(surface.features().point(1).is_none());
      let outcome = surface.click(old_px, view, &mut nav, Instant::now());
      assert_eq!(outcome, ClickOutcome::Cleared);
      assert_eq!(surface.selection(), Selection::Unselected);
   }

   #[test]
   fn empty_snapshot_keeps_default_view()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("");
      let surface = MapSurface::mount(host, 1, &[], &config, &mut nav, default_view()).unwrap();
      assert_eq!(surface.view(), default_view());
      assert!(surface.overlays().latest_position().is_none());
      assert!(surface.features().is_empty());
   }

   #[test]
   fn deep_link_reload_focuses_without_animation()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("?marker=7");
      let surface = MapSurface::mount(host, 1, &[point(7, 1, 50.0, 4.0), point(8, 2, 51.0, 5.0)], &config, &mut nav,
                                      default_view()).unwrap();
      assert_eq!(surface.selection(), Selection::Selected(7));
      assert!(!surface.is_animating());
      assert_eq!(surface.view().center, project(4.0, 50.0));
      assert_eq!(surface.view().zoom, 12.0);
      assert_eq!(surface.overlays().popup().unwrap().1.id, 7);
   }

   #[test]
   fn stale_deep_link_is_removed_on_mount()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("?marker=999");
      let surface = MapSurface::mount(host, 1, &[point(7, 1, 50.0, 4.0)], &config, &mut nav, default_view()).unwrap();
      assert_eq!(surface.selection(), Selection::Unselected);
      assert!(nav.marker().is_none());
      assert!(surface.overlays().popup().is_none());
   }

   #[test]
   fn click_selects_animates_and_close_hides_popup()
   {
      let host = MapHost::new();
      let config = ViewportConfig::default();
      let mut nav = nav("");
      let view = MapView::new(project(4.01, 50.01), 12.0, 800.0, 600.0);
      let mut surface = MapSurface::mount(host, 1, &[point(7, 1, 50.0, 4.0), point(8, 2, 50.02, 4.02)], &config,
                                          &mut nav, view).unwrap();
      let start = Instant::now();
      let px = view.to_pixel(project(4.0, 50.0));
      assert!(matches!(surface.click(px, view, &mut nav, start), ClickOutcome::Selected { id: 7, .. }));
      assert_eq!(nav.marker().as_deref(), Some("7"));
      assert!(surface.overlays().popup().is_some());
      assert!(surface.tick(start + Duration::from_millis(100)));
      assert!(!surface.tick(start + Duration::from_millis(600)));
      assert_eq!(surface.view().center, project(4.0, 50.0));

      surface.close(&mut nav);
      assert!(surface.overlays().popup().is_none());
      assert!(nav.marker().is_none());
   }
}
