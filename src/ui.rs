use std::{cell::RefCell, path::PathBuf, rc::Rc, sync::{Arc, mpsc::{Receiver, Sender, channel}}, time::{Duration, Instant}};

use crossbeam::atomic::AtomicCell;
use eframe::{CreationContext, egui::{self, Color32, Context, Frame, RichText}};
use walkers::{HttpTiles, Map, MapMemory};

use crate::{STARTUP_PARAMS, SETTINGS,
            components::{CartoVoyager, MapClick, ToastManager, TrackPlugin, to_position},
            data::{TrackPoint, fetch_snapshot, load_snapshot_file, split_decimal},
            navigation::LinkNavigation,
            projection::MapView,
            selection::ClickOutcome,
            settings::{DEFAULT_SHARE_LINK, Settings},
            surface::{MapHost, MapSurface},
            viewport::ViewportConfig};

/// Windows at least this wide get the side sheet, narrower ones the bottom drawer.
const DESKTOP_MIN_WIDTH: f32 = 768.0;

/// Map size assumed before the first frame reports the real one.
const INITIAL_MAP_SIZE: (f64, f64) = (1024.0, 980.0);

type SnapshotMessage = Result<(Vec<TrackPoint>, String), String>;

pub struct LiveTrackUI
//====================
{
   pub(crate) toast_manager:        ToastManager,
   pub(crate) api_url:              String,
   pub(crate) api_token:            Option<String>,
   pub(crate) viewport_config:      ViewportConfig,
   pub(crate) show_settings_dialog: bool,
   snapshot:                        Arc<Vec<TrackPoint>>,
   snapshot_origin:                 String,
   snapshot_version:                u64,
   snapshot_channel:                (Sender<SnapshotMessage>, Receiver<SnapshotMessage>),
   is_fetching:                     Arc<AtomicCell<bool>>,
   host:                            Rc<RefCell<MapHost>>,
   surface:                         Option<MapSurface>,
   nav:                             LinkNavigation,
   tiles:                           Option<HttpTiles>,
   map_memory:                      MapMemory,
   map_size:                        Option<(f64, f64)>,
   needs_fit:                       bool,
   push_view:                       bool,
   plugin_view:                     Arc<AtomicCell<Option<MapView>>>,
   plugin_click:                    Arc<AtomicCell<Option<MapClick>>>,
}

impl LiveTrackUI
//==============
{
   pub fn new(cc: &CreationContext) -> Self
   //--------------------------------------
   {
      let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::new().get_settings_or_default())));
      let (api_url, api_token, viewport_config, share_link) =
      {
         let settings = settings.lock();
         let token = match settings.get_api_token()
         {
            | Ok(t) => t,
            | Err(e) =>
            {
               log::error!("{e}");
               None
            }
         };
         (settings.api_url.clone(), token, settings.viewport_config(), settings.share_link.clone())
      };

      let (link, file_path, url_override) =
      {
         let params = STARTUP_PARAMS.lock();
         let params = params.borrow();
         match params.as_ref()
         {
            | Some(p) => (p.link.clone(), p.file_path.clone(), p.api_url.clone()),
            | None => (None, None, None),
         }
      };

      let mut toast_manager = ToastManager::new();
      let nav = match LinkNavigation::parse(link.as_deref().unwrap_or(&share_link))
      {
         | Ok(nav) => nav,
         | Err(e) =>
         {
            log::error!("{e}");
            toast_manager.error(e);
            LinkNavigation::parse(DEFAULT_SHARE_LINK).expect("default share link is a valid URL")
         }
      };

      let mut map_memory = MapMemory::default();
      if let Err(e) = map_memory.set_zoom(viewport_config.default_zoom.min(viewport_config.max_zoom))
      {
         log::warn!("Failed to set default zoom level: {:?}", e);
      }
      map_memory.center_at(to_position(viewport_config.default_center));

      let mut app = Self
      {
         toast_manager,
         api_url: url_override.unwrap_or(api_url),
         api_token,
         viewport_config,
         show_settings_dialog: false,
         snapshot: Arc::new(Vec::new()),
         snapshot_origin: String::new(),
         snapshot_version: 0,
         snapshot_channel: channel(),
         is_fetching: Arc::new(AtomicCell::new(false)),
         host: MapHost::new(),
         surface: None,
         nav,
         tiles: Some(HttpTiles::new(CartoVoyager, cc.egui_ctx.clone())),
         map_memory,
         map_size: None,
         needs_fit: false,
         push_view: false,
         plugin_view: Arc::new(AtomicCell::new(None)),
         plugin_click: Arc::new(AtomicCell::new(None)),
      };

      // The deep link is only resolved once real data is mounted; without a source the
      // basemap is shown over an empty snapshot.
      if let Some(path) = file_path
      {
         app.load_file(PathBuf::from(path));
      }
      else if !app.api_url.is_empty()
      {
         app.start_fetch(&cc.egui_ctx);
      }
      if app.surface.is_none() && !app.is_fetching.load()
      {
         app.replace_snapshot(Vec::new(), String::new());
      }
      app
   }

   /// Points the shareable link at a new base, the selected marker carries over.
   pub(crate) fn rebase_link(&mut self, base: &str) -> Result<(), String> { self.nav.rebase(base) }

   /// Tears down the current surface and mounts a new one for `points`. Never patches in place.
   fn replace_snapshot(&mut self, points: Vec<TrackPoint>, origin: String)
   //---------------------------------------------------------------------
   {
      let (width, height) = self.map_size.unwrap_or(INITIAL_MAP_SIZE);
      let current = match &self.surface
      {
         | Some(surface) => MapView { width, height, ..surface.view() },
         | None => self.viewport_config.default_view(width, height),
      };
      self.surface = None;
      self.snapshot = Arc::new(points);
      self.snapshot_origin = origin;
      self.snapshot_version += 1;
      match MapSurface::mount(self.host.clone(), self.snapshot_version, &self.snapshot, &self.viewport_config, &mut self.nav, current)
      {
         | Ok(surface) =>
         {
            self.surface = Some(surface);
            self.needs_fit = self.map_size.is_none();
            self.push_view = true;
         }
         | Err(e) =>
         {
            log::error!("{e}");
            self.toast_manager.error(e);
         }
      }
   }

   fn load_file(&mut self, path: PathBuf)
   //-------------------------------------
   {
      match load_snapshot_file(&path)
      {
         | Ok(points) =>
         {
            let count = points.len();
            self.replace_snapshot(points, path.display().to_string());
            self.toast_manager.info(format!("Loaded {} track points", count));
         }
         | Err(e) =>
         {
            let msg = format!("Error loading {}: {}", path.display(), e);
            log::error!("{msg}");
            self.toast_manager.error(msg);
         }
      }
   }

   fn start_fetch(&mut self, ctx: &Context)
   //---------------------------------------
   {
      if self.api_url.is_empty()
      {
         self.toast_manager.error("No API URL configured, set one in Settings.");
         return;
      }
      if self.is_fetching.swap(true)
      {
         return;
      }
      let sender = self.snapshot_channel.0.clone();
      let is_fetching = self.is_fetching.clone();
      let api_url = self.api_url.clone();
      let token = self.api_token.clone();
      let ctxx = ctx.clone();
      std::thread::spawn(move ||
      {
         let result = fetch_snapshot(&api_url, token.as_deref()).map(|points| (points, api_url));
         is_fetching.store(false);
         if sender.send(result).is_err()
         {
            log::warn!("Snapshot receiver closed before fetch completed");
         }
         ctxx.request_repaint();
      });
   }

   fn receive_snapshots(&mut self)
   //------------------------------
   {
      while let Ok(message) = self.snapshot_channel.1.try_recv()
      {
         match message
         {
            | Ok((points, origin)) => self.replace_snapshot(points, origin),
            | Err(e) =>
            {
               log::error!("{e}");
               self.toast_manager.error(e);
               if self.surface.is_none()
               {
                  self.replace_snapshot(Vec::new(), String::new());
               }
            }
         }
      }
   }

   /// Pushes the surface view into the walkers map memory.
   fn apply_view(&mut self, view: MapView)
   //--------------------------------------
   {
      self.map_memory.center_at(to_position(view.center));
      if let Err(e) = self.map_memory.set_zoom(self.viewport_config.clamp_zoom(view.zoom))
      {
         log::warn!("Failed to set zoom {}: {:?}", view.zoom, e);
      }
   }

   fn show_top_panel(&mut self, ctx: &Context)
   //------------------------------------------
   {
      egui::TopBottomPanel::top("top_panel").min_height(36.0)
      .frame(Frame::new().fill(Color32::from_rgb(169, 157, 133)).inner_margin(6.0))
      .show(ctx, |ui|
      {
         ui.horizontal(|ui|
         {
            if ui.button("⚙ Settings").clicked()
            {
               let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::new().get_settings_or_default())));
               settings.lock().open_settings_dialog(self);
            }
            ui.separator();
            if ui.button("📂 Open").clicked()
            {
               open_file_dialog(ui.ctx(), self.snapshot_channel.0.clone());
            }
            let fetching = self.is_fetching.load();
            if ui.add_enabled(!fetching, egui::Button::new(if fetching { "Fetching…" } else { "⟳ Refresh" }))
                 .on_hover_text("Fetch the latest track points from the API")
                 .clicked()
            {
               self.start_fetch(ui.ctx());
            }
            ui.separator();
            ui.label(RichText::new(format!("{} points", self.snapshot.len())).color(Color32::YELLOW).strong());
            if !self.snapshot_origin.is_empty()
            {
               ui.label(RichText::new(&self.snapshot_origin).color(Color32::LIGHT_YELLOW));
            }
            ui.separator();
            ui.label(RichText::new("Link:").color(Color32::YELLOW).strong());
            let mut link = self.nav.link().to_string();
            ui.add(egui::TextEdit::singleline(&mut link).interactive(false).desired_width(320.0));
            if ui.button("Copy").on_hover_text("Copy the shareable link").clicked()
            {
               ui.ctx().copy_text(link);
               self.toast_manager.success("Link copied");
            }
         });
      });
   }

   fn show_detail_panel(&mut self, ctx: &Context)
   //---------------------------------------------
   {
      let Some(surface) = self.surface.as_ref() else { return };
      let Some(id) = surface.selection().id() else { return };
      let Some((point, _)) = surface.features().point(id) else { return };
      let point = point.clone();

      let mut closed = false;
      let body = |ui: &mut egui::Ui, closed: &mut bool|
      {
         ui.horizontal(|ui|
         {
            ui.heading("📍 Live location tracking");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui|
            {
               if ui.button("✖").on_hover_text("Close").clicked()
               {
                  *closed = true;
               }
            });
         });
         ui.label(format!("📅 {}", point.formatted_date()));
         ui.separator();
         detail_body(ui, &point);
      };

      if ctx.content_rect().width() >= DESKTOP_MIN_WIDTH
      {
         egui::SidePanel::left("detail_sheet").resizable(false).exact_width(320.0)
            .show(ctx, |ui| body(ui, &mut closed));
      }
      else
      {
         egui::TopBottomPanel::bottom("detail_drawer").resizable(false)
            .show(ctx, |ui| body(ui, &mut closed));
      }

      if closed && let Some(surface) = self.surface.as_mut()
      {
         surface.close(&mut self.nav);
      }
   }

   fn show_map(&mut self, ctx: &Context)
   //------------------------------------
   {
      let now = Instant::now();
      if let Some(surface) = self.surface.as_mut()
         && surface.is_animating()
      {
         let running = surface.tick(now);
         let view = surface.view();
         self.apply_view(view);
         if running
         {
            ctx.request_repaint();
         }
      }
      else if self.push_view
         && let Some(view) = self.surface.as_ref().map(|s| s.view())
      {
         self.apply_view(view);
         self.push_view = false;
      }

      egui::CentralPanel::default().frame(Frame::NONE).show(ctx, |ui|
      {
         let Some(tiles) = self.tiles.as_mut() else { return };
         let fallback = to_position(self.viewport_config.default_center);
         match self.surface.as_ref()
         {
            | Some(surface) =>
            {
               let overlays = surface.overlays();
               let plugin = TrackPlugin::new(surface.features(), surface.selection().id(), overlays.latest_position(),
                                             overlays.popup(), now.saturating_duration_since(surface.mounted_at()),
                                             self.plugin_view.clone(), self.plugin_click.clone());
               ui.add(Map::new(Some(tiles), &mut self.map_memory, fallback).with_plugin(plugin));
               if overlays.latest_position().is_some()
               {
                  ctx.request_repaint_after(Duration::from_millis(33));
               }
            }
            // Still waiting for the first snapshot.
            | None =>
            {
               ui.add(Map::new(Some(tiles), &mut self.map_memory, fallback));
            }
         }
      });

      let seen = self.plugin_view.take();
      let click = self.plugin_click.take();
      let Some(surface) = self.surface.as_mut() else { return };
      if let Some(view) = seen
      {
         self.map_size = Some((view.width, view.height));
         if self.needs_fit
         {
            surface.refit(&self.viewport_config, view.width, view.height);
            self.needs_fit = false;
            self.push_view = true;
            ctx.request_repaint();
         }
         else if !surface.is_animating() && !self.push_view
         {
            surface.set_view(view);
         }
      }
      if let Some(MapClick { pixel, view }) = click
      {
         if let ClickOutcome::Selected { .. } = surface.click(pixel, view, &mut self.nav, now)
         {
            ctx.request_repaint();
         }
      }
   }
}

impl eframe::App for LiveTrackUI
//==============================
{
   fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame)
   //------------------------------------------------------------------
   {
      self.receive_snapshots();
      self.show_top_panel(ctx);
      self.show_detail_panel(ctx);
      self.show_map(ctx);
      {
         let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::new().get_settings_or_default())));
         settings.lock().show_settings_dialog(self, ctx);
      }
      self.toast_manager.show(ctx);
   }
}

fn detail_body(ui: &mut egui::Ui, point: &TrackPoint)
//----------------------------------------------------
{
   let decimal = |ui: &mut egui::Ui, value: f64|
   {
      let (int_part, dec_part) = split_decimal(value);
      ui.label(RichText::new(int_part).size(18.0));
      ui.label(RichText::new(format!(".{}", dec_part)).size(13.0).color(Color32::GRAY));
   };
   ui.horizontal(|ui|
   {
      ui.spacing_mut().item_spacing.x = 0.0;
      ui.label("⌖ ");
      decimal(ui, point.latitude);
      ui.label("  ");
      decimal(ui, point.longitude);
   });
   ui.label(format!("🌡 {} °C", point.temperature));
   ui.add_space(8.0);

   egui::Grid::new("detail_grid").num_columns(2).spacing([24.0, 8.0]).striped(true).show(ui, |ui|
   {
      ui.label("Speed");
      ui.label(format!("{} km/h", point.speed));
      ui.end_row();
      ui.label("Course");
      ui.label(format!("{}°", point.course));
      ui.end_row();
      ui.label("Avg Speed");
      ui.label(format!("{} km/h", point.average_speed));
      ui.end_row();
      ui.label("Avg Course");
      ui.label(format!("{}°", point.average_course));
      ui.end_row();
      ui.label("Altitude");
      ui.label(format!("{} m", point.altitude));
      ui.end_row();
   });

   ui.add_space(8.0);
   ui.horizontal(|ui|
   {
      ui.label(RichText::new(format!("🔋 {}%", point.battery)).color(Color32::GRAY));
      ui.label(RichText::new(format!("🔌 {}", point.plugged_in_text())).color(Color32::GRAY));
   });
   ui.label(RichText::new(format!("{:?} · {:?} · {:?}", point.transport, point.trigger, point.source)).small().color(Color32::GRAY));
}

fn open_file_dialog(ctx: &Context, sender: Sender<SnapshotMessage>)
//-----------------------------------------------------------------
{
   let pick_dir = SETTINGS.get().map(|s| s.lock().get_last_directorybuf()).unwrap_or_else(Settings::get_home_dir);
   let dialog_future = rfd::AsyncFileDialog::new().add_filter("Track points", &["json"]).set_directory(pick_dir).pick_file();
   let ctxx = ctx.clone();
   execute(async move
   {
      let Some(file) = dialog_future.await else { return };
      let path = file.path().to_path_buf();
      if let Some(dir) = path.parent()
         && let Some(settings) = SETTINGS.get()
      {
         settings.lock().set_last_directorybuf(dir);
      }
      let result = load_snapshot_file(&path).map(|points| (points, path.display().to_string()))
                                            .map_err(|e| format!("Error loading {}: {}", path.display(), e));
      if sender.send(result).is_err()
      {
         log::warn!("Snapshot receiver closed before file was loaded");
      }
      ctxx.request_repaint();
   });
}

fn execute<F: Future<Output = ()> + Send + 'static>(f: F)
{
   std::thread::spawn(move || futures::executor::block_on(f));
}
