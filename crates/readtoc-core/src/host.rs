//! Per-site behaviour derived from the page location

use regex::Regex;

use crate::config::{HostsConfig, ScrollConfig};
use crate::dom::PageLocation;
use crate::preferences::AutoLoad;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct HostProfile {
    location: PageLocation,
    /// Domain contains a feed-reader domain
    feed_reader: bool,
    /// Domain is exactly a feed-reader domain
    feed_reader_app: bool,
    /// Domain contains the Medium domain
    medium: bool,
    /// Domain is exactly the Medium domain
    medium_app: bool,
    medium_article: Regex,
}

impl HostProfile {
    pub fn new(location: PageLocation, hosts: &HostsConfig) -> Result<Self> {
        let domain = location.domain.as_str();
        let medium_article = Regex::new(&hosts.medium_article_pattern)
            .map_err(|e| Error::Config(format!("medium_article_pattern: {}", e)))?;

        Ok(Self {
            feed_reader: hosts
                .feed_reader_domains
                .iter()
                .any(|d| domain.contains(d.as_str())),
            feed_reader_app: hosts.feed_reader_domains.iter().any(|d| domain == d),
            medium: domain.contains(hosts.medium_domain.as_str()),
            medium_app: domain == hosts.medium_domain,
            medium_article,
            location,
        })
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn is_feed_reader(&self) -> bool {
        self.feed_reader
    }

    pub fn is_medium(&self) -> bool {
        self.medium
    }

    /// The bare app domains, where articles are swapped in place
    pub fn is_app_domain(&self) -> bool {
        self.feed_reader_app || self.medium_app
    }

    /// Hosts that get article tracking and auto-loading
    ///
    /// `medium_article_present` covers Medium-powered custom domains.
    pub fn is_special(&self, medium_article_present: bool) -> bool {
        self.feed_reader || self.medium || medium_article_present
    }

    /// Whether a TOC may be rendered on this page
    ///
    /// Never on the feed-reader app domain itself, and on Medium only for
    /// article paths.
    pub fn allows_render(&self, medium_article_present: bool) -> bool {
        if !self.is_special(medium_article_present) {
            return true;
        }
        if self.feed_reader_app {
            return false;
        }
        !(self.medium && !self.medium_article.is_match(&self.location.path))
    }

    /// Gap left above a heading after scrolling to it
    pub fn scroll_margin(&self, scroll: &ScrollConfig) -> f64 {
        if self.feed_reader {
            scroll.feed_reader_top_margin
        } else {
            scroll.top_margin
        }
    }

    pub fn auto_load(&self, auto: AutoLoad, medium_article_present: bool) -> bool {
        match auto {
            AutoLoad::Never => false,
            AutoLoad::Always => true,
            AutoLoad::FeedReaders => self.is_special(medium_article_present),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(url: &str) -> HostProfile {
        HostProfile::new(PageLocation::parse(url).unwrap(), &HostsConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_site() {
        let host = profile("https://blog.example/post");
        assert!(!host.is_special(false));
        assert!(host.allows_render(false));
        assert_eq!(host.scroll_margin(&ScrollConfig::default()), 10.0);
        assert!(!host.auto_load(AutoLoad::FeedReaders, false));
        assert!(host.auto_load(AutoLoad::Always, false));
    }

    #[test]
    fn test_feed_reader() {
        let app = profile("https://inoreader.com/all_articles");
        assert!(app.is_app_domain());
        assert!(!app.allows_render(false));

        let reader = profile("https://www.inoreader.com/article/3a9c");
        assert!(reader.is_feed_reader());
        assert!(reader.allows_render(false));
        assert_eq!(reader.scroll_margin(&ScrollConfig::default()), 50.0);
        assert!(reader.auto_load(AutoLoad::FeedReaders, false));
        assert!(!reader.auto_load(AutoLoad::Never, false));
    }

    #[test]
    fn test_medium_article_paths() {
        assert!(profile("https://medium.com/@writer/a-story-0123456789ab").allows_render(false));
        assert!(!profile("https://medium.com/@writer").allows_render(false));
        assert!(!profile("https://medium.com/tag/rust").allows_render(false));
    }

    #[test]
    fn test_medium_powered_custom_domain() {
        let host = profile("https://engineering.example/latest");
        assert!(host.is_special(true));
        assert!(host.auto_load(AutoLoad::FeedReaders, true));
        assert!(host.allows_render(true));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let hosts = HostsConfig {
            medium_article_pattern: "(".to_string(),
            ..Default::default()
        };
        let location = PageLocation::parse("https://medium.com/").unwrap();
        assert!(matches!(HostProfile::new(location, &hosts), Err(Error::Config(_))));
    }
}
