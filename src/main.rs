use std::{cell::RefCell, fs, sync::{Arc, OnceLock}};

use clap::Parser;
use eframe::egui;

mod components;
mod data;
mod navigation;
mod overlay;
mod projection;
mod selection;
mod settings;
mod surface;
mod track;
pub mod ui;
mod ut;
mod viewport;

use crate::ui::LiveTrackUI;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args
{
   /// Share link to start from, a `marker` query parameter selects that track point
   #[arg(short = 'l', long = "link")]
   link: Option<String>,

   /// Base URL of the live location API, overrides the settings file
   #[arg(short = 'u', long = "url")]
   url: Option<String>,

   #[arg(short = 't', long = "token", default_value = "", help = "Encrypt new API token and write to config file")]
   token: String,

   /// Optional JSON snapshot file to display instead of fetching
   #[arg()]
   file_path: Option<String>,
}

struct StartupParameters
{
   link:      Option<String>,
   file_path: Option<String>,
   api_url:   Option<String>,
}

static STARTUP_PARAMS: parking_lot::Mutex<RefCell<Option<StartupParameters>>> = parking_lot::Mutex::new(RefCell::new(None));
static SETTINGS: OnceLock<Arc<parking_lot::Mutex<Settings>>> = OnceLock::new();

fn main()
{
   env_logger::init();
   {
      let cmdline_opts = STARTUP_PARAMS.lock();
      let args = Args::parse();

      let mut file_path: Option<String> = None;
      if let Some(filepath) = args.file_path
      {
         let is_file = fs::metadata(&filepath).map(|meta| meta.is_file()).unwrap_or(false);
         if !is_file
         {
            eprintln!("The path {filepath} is not a valid file.");
            return;
         }
         file_path = Some(filepath);
      }

      let update_token = args.token.trim();
      if !update_token.is_empty()
      {
         let settings = SETTINGS.get_or_init(|| Arc::new(parking_lot::Mutex::new(Settings::new().get_settings_or_default())));
         match settings.lock().set_api_token(update_token)
         {
            | Ok(_) => println!("API token encrypted and saved to settings file"),
            | Err(e) => eprintln!("Error saving settings with new API token: {}", e),
         }
         return;
      }

      cmdline_opts.replace(Some(StartupParameters { link: args.link, file_path, api_url: args.url }));
   }
   let options = eframe::NativeOptions { viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 960.0])
                                                                                     .with_title("Live location tracking"),
                                         ..Default::default() };
   let ret = eframe::run_native("LiveTrack", options, Box::new(|cc| Ok(Box::new(LiveTrackUI::new(cc)))));
   if let Err(e) = ret
   {
      eprintln!("Error starting user interface: {e}");
   }
}
