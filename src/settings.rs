use std::{fs::File, io::Write, path::{Path, PathBuf}};
use std::env;

use eframe::egui::{self, Color32, Context, Vec2};

use crate::{ui::LiveTrackUI, ut, viewport::ViewportConfig};

const PROGRAM: &str = "LiveTrack";
const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_SHARE_LINK: &str = "https://livetrack.local/";

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Settings
{
   #[serde(default = "Settings::get_home_dir")]
   last_directory: PathBuf,
   #[serde(default)]
   pub(crate) api_url: String,
   #[serde(default)]
   api_token: String,
   #[serde(default = "Settings::default_share_link")]
   pub(crate) share_link: String,
   #[serde(default = "Settings::default_max_zoom")]
   pub(crate) max_zoom: f64,

   #[serde(skip)] show_token:     bool,
   #[serde(skip)] temp_api_url:   String,
   #[serde(skip)] temp_api_token: String,
   #[serde(skip)] temp_share_link: String,
   #[serde(skip)] temp_max_zoom:  f64,
}

impl Default for Settings
{
   fn default() -> Self
   //------------------
   {
      Self
      {
         last_directory: Settings::get_home_dir(),
         api_url: String::new(),
         api_token: String::new(),
         share_link: DEFAULT_SHARE_LINK.to_string(),
         max_zoom: Settings::default_max_zoom(),

         show_token: false,
         temp_api_url: String::new(),
         temp_api_token: String::new(),
         temp_share_link: String::new(),
         temp_max_zoom: Settings::default_max_zoom(),
      }
   }
}

impl Settings
//===========
{
   pub fn new() -> Self
   {
      Settings::default()
   }

   fn default_share_link() -> String { DEFAULT_SHARE_LINK.to_string() }

   fn default_max_zoom() -> f64 { 19.0 }

   pub fn get_settings(&self) -> Result<Settings, String>
   //-----------------------------------------------------
   {
      let settings_path = self.get_settings_path().map_err(|e| format!("Error getting settings path: {}", e))?;
      if !settings_path.exists()
      {
         Settings::default().write_to(&settings_path)
                            .map_err(|e| format!("Error creating default settings: {}", e))?;
      }
      Settings::read_from(&settings_path)
   }

   pub fn get_settings_or_default(&self) -> Settings
   //-----------------------------------------------
   {
      match self.get_settings()
      {
         | Ok(s) => s,
         | Err(e) =>
         {
            log::warn!("{e}, using default settings");
            Settings::default()
         }
      }
   }

   pub(crate) fn write_settings(&self) -> Result<PathBuf, std::io::Error>
   //---------------------------------------------------------------------
   {
      let config_file = self.get_settings_path()?;
      self.write_to(&config_file)?;
      log::info!("Wrote settings to {}", config_file.display());
      Ok(config_file)
   }

   fn write_to(&self, path: &Path) -> Result<(), std::io::Error>
   //-----------------------------------------------------------
   {
      let mut file = File::create(path)?;
      let json = serde_json::to_string_pretty(&self)?;
      file.write_all(json.as_bytes())?;
      Ok(())
   }

   fn read_from(path: &Path) -> Result<Settings, String>
   //----------------------------------------------------
   {
      let file = File::open(path).map_err(|e| format!("Error opening settings file {}: {}", path.display(), e))?;
      serde_json::from_reader(file).map_err(|e| format!("Error reading settings {}: {}", path.display(), e))
   }

   /// Zoom limits and fit policy for the map, honouring the configured maximum zoom.
   pub fn viewport_config(&self) -> ViewportConfig
   //---------------------------------------------
   {
      let defaults = ViewportConfig::default();
      let max_zoom = if self.max_zoom.is_finite() && self.max_zoom >= defaults.min_zoom { self.max_zoom } else { defaults.max_zoom };
      ViewportConfig { max_zoom, ..defaults }
   }

   pub fn get_api_token(&self) -> Result<Option<String>, String>
   //------------------------------------------------------------
   {
      if self.api_token.is_empty()
      {
         return Ok(None);
      }
      ut::decrypt_token(&self.api_token).map(Some).map_err(|e| format!("Failed to decrypt API token: {}", e))
   }

   pub fn set_api_token(&mut self, token: &str) -> Result<(), String>
   //-----------------------------------------------------------------
   {
      self.api_token = if token.is_empty() { String::new() } else { ut::encrypt_token(token)? };
      self.write_settings().map_err(|e| format!("Failed to write settings file: {}", e))?;
      Ok(())
   }

   pub fn set_last_directorybuf(&mut self, path: &Path) -> bool
   //----------------------------------------------------------
   {
      if path.is_dir()
      {
         self.last_directory = path.to_path_buf();
         if let Err(e) = self.write_settings()
         {
            log::error!("Failed to write settings file: {}", e);
            return false;
         }
         return true;
      }
      log::warn!("{} is not a directory", path.display());
      false
   }

   pub fn get_last_directorybuf(&self) -> PathBuf
   {
      self.last_directory.clone()
   }

   /// Get OS specific path to the config directory for the program
   pub fn get_config_path(&self) -> Result<PathBuf, std::io::Error>
   //---------------------------------------------------------------
   {
      let config_path = match dirs::config_dir()
      {
         | Some(p) => p.join(PROGRAM),
         | None =>
         {
            let mut config_path = Settings::get_home_dir();
            if env::consts::OS == "windows"
            {
               config_path.push("Application Data/Local Settings/");
            }
            else if env::consts::OS != "macos"
            {
               config_path.push(".config/");
            }
            config_path.push(PROGRAM);
            config_path
         }
      };
      if config_path.exists() && !config_path.is_dir()
      {
         return Err(std::io::Error::other(format!("Config path {} exists and is not a directory", config_path.display())));
      }
      if !config_path.exists()
      {
         std::fs::create_dir_all(config_path.as_path())?;
      }
      Ok(config_path)
   }

   pub fn get_settings_path(&self) -> Result<PathBuf, std::io::Error>
   {
      Ok(self.get_config_path()?.join(SETTINGS_FILE))
   }

   pub fn open_settings_dialog(&mut self, app: &mut LiveTrackUI)
   //------------------------------------------------------------
   {
      self.temp_api_url = self.api_url.clone();
      self.temp_api_token = self.get_api_token().ok().flatten().unwrap_or_default();
      self.temp_share_link = self.share_link.clone();
      self.temp_max_zoom = self.max_zoom;
      self.show_token = false;
      app.show_settings_dialog = true;
   }

   pub fn show_settings_dialog(&mut self, app: &mut LiveTrackUI, ctx: &Context)
   //---------------------------------------------------------------------------
   {
      if !app.show_settings_dialog
      {
         return;
      }

      let link_ok = reqwest::Url::parse(self.temp_share_link.trim()).is_ok();
      let url_ok = self.temp_api_url.trim().is_empty() || reqwest::Url::parse(self.temp_api_url.trim()).is_ok();
      egui::Window::new("Settings")
         .collapsible(false)
         .resizable(false)
         .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
         .show(ctx, |ui|
         {
            ui.set_min_width(500.0);

            egui::Grid::new("settings_grid")
               .num_columns(2)
               .spacing([10.0, 10.0])
               .striped(true)
               .show(ui, |ui|
               {
                  ui.label("API URL:");
                  ui.add_sized(Vec2::new(400.0, 30.0),
                               egui::TextEdit::singleline(&mut self.temp_api_url)
                                  .hint_text("https://tracker.example.org")
                                  .text_color(if url_ok { Color32::WHITE } else { Color32::RED }))
                    .on_hover_text("Base URL of the tracker API, track points are read from <url>/cdn/live");
                  ui.end_row();

                  ui.label("API Token:");
                  ui.horizontal(|ui|
                  {
                     ui.add_sized(Vec2::new(400.0, 30.0),
                                  egui::TextEdit::singleline(&mut self.temp_api_token)
                                     .hint_text("Bearer token")
                                     .password(!self.show_token));
                     let button_text = if self.show_token { "Hide" } else { "Show" };
                     if ui.button(button_text).clicked()
                     {
                        self.show_token = !self.show_token;
                     }
                  });
                  ui.end_row();

                  ui.label("Share Link:");
                  ui.add_sized(Vec2::new(400.0, 30.0),
                               egui::TextEdit::singleline(&mut self.temp_share_link)
                                  .text_color(if link_ok { Color32::WHITE } else { Color32::RED }))
                    .on_hover_text("Base link that selections are written into as ?marker=<id>");
                  ui.end_row();

                  ui.label("Max Zoom:");
                  ui.add_sized(Vec2::new(100.0, 30.0),
                               egui::DragValue::new(&mut self.temp_max_zoom).range(2.0..=22.0).speed(0.5).max_decimals(1))
                    .on_hover_text("Highest zoom level supported by the tile server");
                  ui.end_row();
               });

            ui.separator();

            ui.horizontal(|ui|
            {
               if ui.add_enabled(link_ok && url_ok, egui::Button::new("Save")).clicked()
               {
                  self.api_url = self.temp_api_url.trim().to_string();
                  self.share_link = self.temp_share_link.trim().to_string();
                  self.max_zoom = self.temp_max_zoom;
                  let token = self.temp_api_token.trim().to_string();
                  match self.set_api_token(&token)
                  {
                     | Ok(_) =>
                     {
                        app.api_token = if token.is_empty() { None } else { Some(token) };
                        app.api_url = self.api_url.clone();
                        app.viewport_config = self.viewport_config();
                        match app.rebase_link(&self.share_link)
                        {
                           | Ok(_) => app.toast_manager.success("Settings saved"),
                           | Err(e) =>
                           {
                              log::error!("{e}");
                              app.toast_manager.error(e);
                           }
                        }
                     }
                     | Err(e) =>
                     {
                        log::error!("{e}");
                        app.toast_manager.error(format!("Failed to save settings: {}", e));
                     }
                  }
                  self.temp_api_token.clear();
                  app.show_settings_dialog = false;
               }

               if ui.button("Cancel").clicked()
               {
                  self.temp_api_token.clear();
                  self.show_token = false;
                  app.show_settings_dialog = false;
               }
            });
         });
   }

   fn get_home_fallbacks() -> PathBuf
   //--------------------------------
   {
      if cfg!(target_os = "windows")
      {
         return PathBuf::from("C:/Users/Public")
      }
      PathBuf::from("~/")
   }

   pub fn get_home_dir() -> PathBuf
   //-------------------------------
   {
      match dirs::home_dir()
      {
         | Some(h) => h,
         | None => Settings::get_home_fallbacks()
      }
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn settings_round_trip_through_file()
   {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join(SETTINGS_FILE);
      let mut settings = Settings::default();
      settings.api_url = "https://tracker.example.org".to_string();
      settings.max_zoom = 17.0;
      settings.write_to(&path).unwrap();
      let read = Settings::read_from(&path).unwrap();
      assert_eq!(read.api_url, "https://tracker.example.org");
      assert_eq!(read.max_zoom, 17.0);
      assert_eq!(read.share_link, DEFAULT_SHARE_LINK);
   }

   #[test]
   fn missing_fields_take_defaults()
   {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join(SETTINGS_FILE);
      std::fs::write(&path, "{}").unwrap();
      let read = Settings::read_from(&path).unwrap();
      assert!(read.api_url.is_empty());
      assert_eq!(read.max_zoom, 19.0);
      assert!(read.get_api_token().unwrap().is_none());
   }

   #[test]
   fn corrupt_file_is_an_error()
   {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join(SETTINGS_FILE);
      std::fs::write(&path, "not json").unwrap();
      assert!(Settings::read_from(&path).is_err());
   }

   #[test]
   fn viewport_config_uses_max_zoom()
   {
      let mut settings = Settings::default();
      settings.max_zoom = 16.0;
      assert_eq!(settings.viewport_config().max_zoom, 16.0);
      settings.max_zoom = f64::NAN;
      assert_eq!(settings.viewport_config().max_zoom, ViewportConfig::default().max_zoom);
   }

   #[test]
   fn stored_token_is_encrypted()
   {
      let mut settings = Settings::default();
      settings.api_token = ut::encrypt_token("tok").unwrap();
      assert_eq!(settings.get_api_token().unwrap().as_deref(), Some("tok"));
   }
}
