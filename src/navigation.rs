use reqwest::Url;

/// Name of the query parameter carrying the selected track point id.
pub const MARKER_PARAM: &str = "marker";

/// Access to the shareable selection state. Writing never triggers a reload of the snapshot,
/// it only changes what the link points at.
pub trait NavigationPort
{
   fn marker(&self) -> Option<String>;

   fn set_marker(&mut self, id: &str);

   fn clear_marker(&mut self);
}

/// Keeps the shareable link in memory. Other query parameters and the fragment are preserved.
#[derive(Debug, Clone)]
pub struct LinkNavigation
{
   link: Url,
}

impl LinkNavigation
{
   pub fn new(link: Url) -> Self { Self { link } }

   pub fn parse(link: &str) -> Result<Self, String>
   //-----------------------------------------------
   {
      let url = Url::parse(link).map_err(|e| format!("Invalid link {}: {}", link, e))?;
      Ok(Self::new(url))
   }

   /// Moves to a new base link, keeping the current marker.
   pub fn rebase(&mut self, base: &str) -> Result<(), String>
   //---------------------------------------------------------
   {
      let marker = self.marker();
      let mut rebased = Self::parse(base)?;
      match marker
      {
         | Some(id) => rebased.set_marker(&id),
         | None => rebased.clear_marker(),
      }
      *self = rebased;
      Ok(())
   }

   /// The link text to share or bookmark.
   pub fn link(&self) -> &str { self.link.as_str() }

   fn rewrite(&mut self, marker: Option<&str>)
   //-----------------------------------------
   {
      let kept: Vec<(String, String)> = self.link.query_pairs()
                                            .filter(|(k, _)| k != MARKER_PARAM)
                                            .map(|(k, v)| (k.into_owned(), v.into_owned()))
                                            .collect();
      if kept.is_empty() && marker.is_none()
      {
         self.link.set_query(None);
         return;
      }
      let mut pairs = self.link.query_pairs_mut();
      pairs.clear();
      for (k, v) in &kept
      {
         pairs.append_pair(k, v);
      }
      if let Some(id) = marker
      {
         pairs.append_pair(MARKER_PARAM, id);
      }
   }
}

impl NavigationPort for LinkNavigation
{
   fn marker(&self) -> Option<String>
   {
      self.link.query_pairs().find(|(k, _)| k == MARKER_PARAM).map(|(_, v)| v.into_owned())
   }

   fn set_marker(&mut self, id: &str)
   {
      log::debug!("Link marker set to {}", id);
      self.rewrite(Some(id));
   }

   fn clear_marker(&mut self)
   {
      if self.marker().is_some()
      {
         log::debug!("Link marker removed");
      }
      self.rewrite(None);
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn reads_marker_from_link()
   {
      let nav = LinkNavigation::parse("https://track.example.org/?marker=7").unwrap();
      assert_eq!(nav.marker().as_deref(), Some("7"));
   }

   #[test]
   fn set_marker_replaces_existing_value()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/?marker=7").unwrap();
      nav.set_marker("12");
      assert_eq!(nav.link(), "https://track.example.org/?marker=12");
   }

   #[test]
   fn clear_marker_leaves_bare_path()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/live?marker=7").unwrap();
      nav.clear_marker();
      assert_eq!(nav.link(), "https://track.example.org/live");
      assert!(nav.marker().is_none());
   }

   #[test]
   fn other_parameters_survive()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/?lang=en&marker=3#map").unwrap();
      nav.set_marker("4");
      assert_eq!(nav.link(), "https://track.example.org/?lang=en&marker=4#map");
      nav.clear_marker();
      assert_eq!(nav.link(), "https://track.example.org/?lang=en#map");
   }

   #[test]
   fn marker_is_percent_encoded()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/").unwrap();
      nav.set_marker("a b&c");
      assert_eq!(nav.marker().as_deref(), Some("a b&c"));
      assert!(!nav.link().contains(' '));
   }

   #[test]
   fn rebase_keeps_marker()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/?marker=7").unwrap();
      nav.rebase("https://share.example.net/live?lang=en&marker=3").unwrap();
      assert_eq!(nav.link(), "https://share.example.net/live?lang=en&marker=7");

      let mut nav = LinkNavigation::parse("https://track.example.org/").unwrap();
      nav.rebase("https://share.example.net/?marker=3").unwrap();
      assert_eq!(nav.link(), "https://share.example.net/");
   }

   #[test]
   fn failed_rebase_leaves_link_alone()
   {
      let mut nav = LinkNavigation::parse("https://track.example.org/?marker=7").unwrap();
      assert!(nav.rebase("not a url").is_err());
      assert_eq!(nav.link(), "https://track.example.org/?marker=7");
   }

   #[test]
   fn invalid_link_is_rejected()
   {
      assert!(LinkNavigation::parse("not a url").is_err());
   }
}
