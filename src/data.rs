use std::{collections::HashSet, fs, path::Path, time::Duration};

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::projection::is_valid_geodetic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transport
{
   Iridium,
   Gprs,
   Other,
   #[serde(other)]
   Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger
{
   Routine,
   Burst,
   Manual,
   Activation,
   Deactivation,
   ConfigReport,
   Waypoint,
   Message,
   Acknowledge,
   BluetoothLoss,
   Collision,
   Countdown,
   DeadMan,
   Geofence,
   Button,
   CancelAlert,
   PowerLoss,
   PowerGain,
   Temperature,
   Generic,
   BleRaw,
   SerialRaw,
   MailboxCheck,
   AppMessage,
   WatchingStartRequest,
   WatchingStopRequest,
   #[serde(other)]
   Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSource
{
   Gps,
   Iridium,
   #[serde(other)]
   Unknown,
}

/// One tracking report as delivered by the tracker API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint
{
   pub id:             i64,
   pub transport:      Transport,
   pub trigger:        Trigger,
   pub source:         PositionSource,
   #[serde(default = "missing_coordinate", deserialize_with = "nullable_coordinate")]
   pub latitude:       f64,
   #[serde(default = "missing_coordinate", deserialize_with = "nullable_coordinate")]
   pub longitude:      f64,
   pub date:           i64, // milliseconds since the Unix epoch
   pub speed:          f64, // km/h
   pub course:         f64, // degrees
   pub altitude:       f64, // metres
   pub average_speed:  f64,
   pub average_course: f64,
   pub temperature:    f64, // Celsius
   pub battery:        f64, // percentage
   pub plugged_in:     bool,
}

// A report without a fix carries null coordinates. They become NaN so the point is skipped as
// invalid geometry instead of failing the whole snapshot.
fn missing_coordinate() -> f64 { f64::NAN }

fn nullable_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
   where D: serde::Deserializer<'de>
{
   Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl Default for TrackPoint
{
   fn default() -> Self
   {
      Self
      {
         id: 0,
         transport: Transport::Other,
         trigger: Trigger::Routine,
         source: PositionSource::Gps,
         latitude: 0.0,
         longitude: 0.0,
         date: 0,
         speed: 0.0,
         course: 0.0,
         altitude: 0.0,
         average_speed: 0.0,
         average_course: 0.0,
         temperature: 0.0,
         battery: 0.0,
         plugged_in: false,
      }
   }
}

impl TrackPoint
{
   pub fn has_valid_position(&self) -> bool { is_valid_geodetic(self.latitude, self.longitude) }

   /// The report time in the local timezone, None if the timestamp is out of chrono's range.
   pub fn local_time(&self) -> Option<DateTime<Local>> { Local.timestamp_millis_opt(self.date).single() }

   pub fn formatted_date(&self) -> String
   //-------------------------------------
   {
      match self.local_time()
      {
         | Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
         | None => format!("invalid date ({})", self.date),
      }
   }

   pub fn plugged_in_text(&self) -> &'static str { if self.plugged_in { "Yes" } else { "No" } }
}

/// Splits a coordinate at the decimal point after rounding to 6 places, e.g. 55.1234567 -> ("55", "123457").
pub fn split_decimal(value: f64) -> (String, String)
//---------------------------------------------------
{
   let text = format!("{:.6}", value);
   match text.split_once('.')
   {
      | Some((int_part, dec_part)) => (int_part.to_string(), dec_part.to_string()),
      | None => (text, String::new()),
   }
}

/// Parses a JSON array of track points. Points with a duplicate id are dropped (first one wins).
pub fn parse_snapshot(json_str: &str) -> Result<Vec<TrackPoint>, String>
//-----------------------------------------------------------------------
{
   let points: Vec<TrackPoint> = serde_json::from_str(json_str)
      .map_err(|e| format!("Failed to parse track point JSON: {}", e))?;
   Ok(dedup_ids(points))
}

fn dedup_ids(points: Vec<TrackPoint>) -> Vec<TrackPoint>
//------------------------------------------------------
{
   let mut seen = HashSet::with_capacity(points.len());
   let total = points.len();
   let unique: Vec<TrackPoint> = points.into_iter().filter(|p| seen.insert(p.id)).collect();
   if unique.len() != total
   {
      log::warn!("Dropped {} track points with duplicate ids", total - unique.len());
   }
   unique
}

pub fn load_snapshot_file(path: &Path) -> Result<Vec<TrackPoint>, Box<dyn std::error::Error>>
//-----------------------------------------------------------------------------------------
{
   let metadata = fs::metadata(path)?;
   if !metadata.is_file()
   {
      return Err(format!("Not a file {}.", path.display()).into());
   }
   let json = fs::read_to_string(path)?;
   let points = parse_snapshot(&json)?;
   log::info!("Loaded {} track points from {}", points.len(), path.display());
   Ok(points)
}

/// Fetches the current snapshot from `{api_url}/cdn/live`. Blocking, call from a worker thread.
pub fn fetch_snapshot(api_url: &str, token: Option<&str>) -> Result<Vec<TrackPoint>, String>
//-----------------------------------------------------------------------------------------
{
   let url = format!("{}/cdn/live", api_url.trim_end_matches('/'));
   let client = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
   let mut request = client.get(&url);
   if let Some(token) = token
   {
      request = request.bearer_auth(token);
   }
   let response = request.send().map_err(|e| format!("Failed to fetch {}: {}", url, e))?;
   if !response.status().is_success()
   {
      return Err(format!("Fetching {} failed with HTTP status {}", url, response.status()));
   }
   let body = response.text().map_err(|e| format!("Failed to read response from {}: {}", url, e))?;
   let points = parse_snapshot(&body)?;
   log::info!("Fetched {} track points from {}", points.len(), url);
   Ok(points)
}
