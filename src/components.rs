use std::{sync::Arc, time::{Duration, Instant}};

use crossbeam::atomic::AtomicCell;
use eframe::egui::{self, Color32, Pos2};
use walkers::{MapMemory, Plugin, Position, Projector, TileId, lon_lat, sources::{Attribution, TileSource}};

use crate::{overlay::{PopupContent, pulse_phase},
            projection::{Coord, MapView, Pixel, project, unproject},
            track::{Feature, FeatureStyle, TrackFeatures}};

/// CARTO Voyager raster basemap.
pub struct CartoVoyager;

impl TileSource for CartoVoyager
{
   fn tile_url(&self, tile_id: TileId) -> String
   {
      // Spread requests over the a-c subdomains.
      let subdomain = ['a', 'b', 'c'][((tile_id.x + tile_id.y) % 3) as usize];
      format!("https://{}.basemaps.cartocdn.com/rastertiles/voyager/{}/{}/{}.png", subdomain, tile_id.zoom, tile_id.x, tile_id.y)
   }

   fn attribution(&self) -> Attribution
   {
      Attribution { text: "© OpenStreetMap contributors © CARTO", url: "https://carto.com/attributions", logo_light: None, logo_dark: None }
   }
}

pub fn to_position(coord: Coord) -> Position
{
   let (lon, lat) = unproject(coord);
   lon_lat(lon, lat)
}

/// What the track plugin saw this frame: the effective view and, if the map was clicked, where.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapClick
{
   pub pixel: Pixel,
   pub view:  MapView,
}

/// Owned render list for one frame of the track layer.
pub struct TrackPlugin
//====================
{
   pub(crate) path:       Option<(Vec<Position>, FeatureStyle)>,
   pub(crate) points:     Vec<(Position, FeatureStyle, bool)>, // (position, style, is_selected)
   pub(crate) latest:     Option<Position>,
   pub(crate) popup:      Option<(Position, PopupContent)>,
   pub(crate) pulse:      f32,
   pub(crate) view:       Arc<AtomicCell<Option<MapView>>>,
   pub(crate) click:      Arc<AtomicCell<Option<MapClick>>>,
}

impl TrackPlugin
{
   pub fn new(features: &TrackFeatures, selected: Option<i64>, latest: Option<Coord>, popup: Option<&(Coord, PopupContent)>,
              since_mount: Duration, view: Arc<AtomicCell<Option<MapView>>>, click: Arc<AtomicCell<Option<MapClick>>>) -> Self
   //-------------------------------------------------------------------------------------------------------------------------
   {
      let mut path = None;
      let mut points = Vec::with_capacity(features.point_count());
      for feature in features.features()
      {
         match feature
         {
            | Feature::Point { id, coord, style, .. } => points.push((to_position(*coord), *style, selected == Some(*id))),
            | Feature::Path { vertices, style } => path = Some((vertices.iter().map(|c| to_position(*c)).collect(), *style)),
         }
      }
      Self
      {
         path,
         points,
         latest: latest.map(to_position),
         popup: popup.map(|(c, content)| (to_position(*c), content.clone())),
         pulse: pulse_phase(since_mount),
         view,
         click,
      }
   }
}

impl Plugin for TrackPlugin
//=========================
{
   fn run(self: Box<Self>, ui: &mut egui::Ui, response: &egui::Response, projector: &Projector, map_memory: &MapMemory)
   //------------------------------------------------------------------------------------------------------------------
   {
      let rect = response.rect;
      let painter = ui.painter().with_clip_rect(rect);

      // Report the effective view so hit testing uses exactly what is on screen.
      let center = projector.unproject(rect.center().to_vec2());
      let view = MapView::new(project(center.x(), center.y()), map_memory.zoom(), rect.width() as f64, rect.height() as f64);
      self.view.store(Some(view));
      if response.clicked()
         && let Some(pointer) = response.interact_pointer_pos()
      {
         let pixel = Pixel::new((pointer.x - rect.min.x) as f64, (pointer.y - rect.min.y) as f64);
         self.click.store(Some(MapClick { pixel, view }));
      }

      let to_screen = |p: Position| -> Pos2 { projector.project(p).to_pos2() };

      if let Some((vertices, FeatureStyle::Line { width, stroke })) = &self.path
      {
         let line: Vec<Pos2> = vertices.iter().map(|p| to_screen(*p)).collect();
         painter.add(egui::Shape::line(line, egui::Stroke::new(*width, Color32::from_rgb(stroke[0], stroke[1], stroke[2]))));
      }

      for (position, style, is_selected) in &self.points
      {
         if let FeatureStyle::Marker { radius, fill } = style
         {
            let pos = to_screen(*position);
            painter.circle_filled(pos, *radius, Color32::from_rgb(fill[0], fill[1], fill[2]));
            if *is_selected
            {
               painter.circle_stroke(pos, *radius + 2.0, egui::Stroke::new(2.0, Color32::WHITE));
            }
         }
      }

      if let Some(latest) = self.latest
      {
         draw_latest_indicator(&painter, to_screen(latest), self.pulse);
      }

      if let Some((position, content)) = &self.popup
      {
         draw_popup(&painter, to_screen(*position), content);
      }
   }
}

/// Breathing ring around a solid dot, `phase` in [0, 1).
fn draw_latest_indicator(painter: &egui::Painter, position: Pos2, phase: f32)
//---------------------------------------------------------------------------
{
   let base = Color32::from_rgb(37, 99, 235);
   let breath = (phase * std::f32::consts::TAU).sin() * 0.5 + 0.5;
   let ring_radius = 8.0 + 8.0 * breath;
   let alpha = (190.0 * (1.0 - breath)) as u8;
   painter.circle_filled(position, ring_radius, Color32::from_rgba_unmultiplied(37, 99, 235, alpha));
   painter.circle_filled(position, 8.0, base);
   painter.circle_stroke(position, 8.0, egui::Stroke::new(1.5, Color32::WHITE));
}

fn draw_popup(painter: &egui::Painter, anchor: Pos2, content: &PopupContent)
//--------------------------------------------------------------------------
{
   let lines = [content.timestamp.clone(),
                format!("Speed: {}", content.speed),
                format!("Course: {}", content.course),
                format!("Temperature: {}", content.temperature)];
   let line_height = 16.0;
   let width = 210.0;
   let height = line_height * lines.len() as f32 + 12.0;
   let min = Pos2::new(anchor.x - width / 2.0, anchor.y - height - 14.0);
   let frame = egui::Rect::from_min_size(min, egui::vec2(width, height));

   painter.rect_filled(frame, 6.0, Color32::from_black_alpha(220));
   painter.add(egui::Shape::convex_polygon(vec![Pos2::new(anchor.x - 7.0, frame.max.y),
                                                Pos2::new(anchor.x + 7.0, frame.max.y),
                                                Pos2::new(anchor.x, anchor.y - 6.0)],
                                           Color32::from_black_alpha(220),
                                           egui::Stroke::NONE));
   for (i, line) in lines.iter().enumerate()
   {
      let color = if i == 0 { Color32::LIGHT_YELLOW } else { Color32::WHITE };
      painter.text(Pos2::new(frame.min.x + 10.0, frame.min.y + 6.0 + i as f32 * line_height),
                   egui::Align2::LEFT_TOP,
                   line,
                   egui::FontId::proportional(13.0),
                   color);
   }
}

//-----------------------------------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastLevel
{
   Info,
   Error,
   Success,
}

impl ToastLevel
{
   fn color(&self) -> Color32
   {
      match self
      {
         | ToastLevel::Info => Color32::from_rgb(60, 120, 216),
         | ToastLevel::Error => Color32::from_rgb(220, 53, 69),
         | ToastLevel::Success => Color32::from_rgb(40, 167, 69),
      }
   }

   fn icon(&self) -> &str
   {
      match self
      {
         | ToastLevel::Info => "ℹ",
         | ToastLevel::Error => "✖",
         | ToastLevel::Success => "✔",
      }
   }

   fn duration(&self) -> Duration
   {
      match self
      {
         | ToastLevel::Error => Duration::from_secs(8),
         | _ => Duration::from_secs(4),
      }
   }
}

#[derive(Clone)]
pub struct Toast
{
   message:    String,
   level:      ToastLevel,
   created_at: Instant,
}

impl Toast
{
   pub fn new(message: impl Into<String>, level: ToastLevel) -> Self
   {
      Self { message: message.into(), level, created_at: Instant::now() }
   }

   pub fn is_expired(&self) -> bool { self.created_at.elapsed() > self.level.duration() }

   fn remaining_fraction(&self) -> f32
   {
      let total = self.level.duration().as_secs_f32();
      ((total - self.created_at.elapsed().as_secs_f32()) / total).max(0.0)
   }
}

#[derive(Default)]
pub struct ToastManager
{
   toasts: Vec<Toast>,
}

impl ToastManager
{
   pub fn new() -> Self { Self::default() }

   pub fn info(&mut self, message: impl Into<String>) { self.toasts.push(Toast::new(message, ToastLevel::Info)); }

   pub fn error(&mut self, message: impl Into<String>) { self.toasts.push(Toast::new(message, ToastLevel::Error)); }

   pub fn success(&mut self, message: impl Into<String>) { self.toasts.push(Toast::new(message, ToastLevel::Success)); }

   pub fn show(&mut self, ctx: &egui::Context)
   //-----------------------------------------
   {
      self.toasts.retain(|toast| !toast.is_expired());
      if self.toasts.is_empty()
      {
         return;
      }

      let screen_rect = ctx.content_rect();
      let toast_width = 350.0;
      let margin = 20.0;
      let mut y_offset = margin;

      for (index, toast) in self.toasts.iter().enumerate()
      {
         egui::Area::new(egui::Id::new("toast").with(index))
            .fixed_pos(egui::pos2(screen_rect.right() - toast_width - margin, screen_rect.top() + y_offset))
            .order(egui::Order::Foreground)
            .show(ctx, |ui|
            {
               egui::Frame::new()
                  .fill(Color32::from_black_alpha(230))
                  .stroke(egui::Stroke::new(2.0, toast.level.color()))
                  .corner_radius(8.0)
                  .inner_margin(12.0)
                  .show(ui, |ui|
                  {
                     ui.set_width(toast_width - 24.0);
                     ui.horizontal(|ui|
                     {
                        ui.label(egui::RichText::new(toast.level.icon()).color(toast.level.color()).size(24.0));
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new(&toast.message).color(Color32::WHITE).size(14.0));
                     });
                     ui.add_space(4.0);
                     let (rect, _response) = ui.allocate_exact_size(egui::vec2(toast_width - 24.0, 3.0), egui::Sense::hover());
                     ui.painter().rect_filled(egui::Rect::from_min_size(rect.min, egui::vec2((toast_width - 24.0) * toast.remaining_fraction(), 3.0)),
                                              0.0,
                                              toast.level.color().linear_multiply(0.8));
                  });
            });
         y_offset += 80.0 + 10.0;
      }

      ctx.request_repaint();
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn tile_urls_use_voyager_layout()
   {
      let url = CartoVoyager.tile_url(TileId { x: 4, y: 2, zoom: 3 });
      assert_eq!(url, "https://a.basemaps.cartocdn.com/rastertiles/voyager/3/4/2.png");
      let url = CartoVoyager.tile_url(TileId { x: 1, y: 0, zoom: 1 });
      assert!(url.starts_with("https://b."));
   }

   #[test]
   fn position_conversion_matches_projection()
   {
      let p = to_position(project(4.5, 55.0));
      assert!((p.x() - 4.5).abs() < 1e-9);
      assert!((p.y() - 55.0).abs() < 1e-9);
   }

   #[test]
   fn toast_expiry_depends_on_level()
   {
      let toast = Toast::new("oops", ToastLevel::Error);
      assert!(!toast.is_expired());
      assert!(toast.remaining_fraction() > 0.9);
      let mut manager = ToastManager::new();
      manager.info("a");
      manager.error("b");
      assert_eq!(manager.toasts.len(), 2);
   }
}
