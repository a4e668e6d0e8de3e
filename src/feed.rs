use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::http::{FeedTransport, RetryPolicy, fetch_with_retries};

/// A show, as parsed from one feed source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Also the key of the episode's listen record.
    pub title: String,
    pub links: Vec<MediaLink>,
    pub published: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    pub url: String,
    pub mime_type: String,
}

impl Feed {
    /// `"<title> - Updated 01 Jan 2024"`, dated from the newest (first) episode.
    pub fn label(&self) -> String {
        match self.episodes.first().and_then(|episode| episode.published) {
            Some(published) => format!("{} - Updated {}", self.title, published.format("%d %b %Y")),
            None => self.title.clone(),
        }
    }
}

impl Episode {
    /// Prefers `audio/mpeg`, then any `audio/*` link, then whatever comes first.
    pub fn audio_link(&self) -> Option<&MediaLink> {
        self.links
            .iter()
            .find(|link| link.mime_type == "audio/mpeg")
            .or_else(|| {
                self.links
                    .iter()
                    .find(|link| link.mime_type.starts_with("audio/"))
            })
            .or_else(|| self.links.first())
    }
}

/// Read-only view of every show that loaded successfully, in source order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    feeds: Vec<Feed>,
}

impl Catalog {
    pub fn new(feeds: Vec<Feed>) -> Self {
        Self { feeds }
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn labels(&self) -> Vec<String> {
        self.feeds.iter().map(Feed::label).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads every source; a source that cannot be fetched or parsed is logged
/// and left out rather than failing the whole catalog.
pub fn load_catalog<T>(
    sources: &[String],
    base_dir: &Path,
    transport: &T,
    policy: RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Catalog
where
    T: FeedTransport + ?Sized,
{
    let mut feeds = Vec::with_capacity(sources.len());
    for source in sources {
        match load_source(source, base_dir, transport, policy, sleep) {
            Ok(feed) => {
                warn_duplicate_titles(&feed);
                feeds.push(feed);
            }
            Err(err) => warn!(source = %source, "dropping feed source: {err}"),
        }
    }
    info!(
        loaded = feeds.len(),
        requested = sources.len(),
        "feed catalog ready"
    );
    Catalog::new(feeds)
}

fn load_source<T>(
    source: &str,
    base_dir: &Path,
    transport: &T,
    policy: RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<Feed, FetchError>
where
    T: FeedTransport + ?Sized,
{
    let bytes = if is_url(source) {
        fetch_with_retries(transport, source, policy, sleep)?
    } else {
        let path = resolve_local_path(source, base_dir);
        std::fs::read(&path).map_err(|source| FetchError::FileRead { path, source })?
    };
    parse_feed(&bytes, source)
}

fn resolve_local_path(source: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

pub fn parse_feed(bytes: &[u8], origin: &str) -> Result<Feed, FetchError> {
    let channel = rss::Channel::read_from(bytes).map_err(|source| FetchError::Parse {
        origin: origin.to_string(),
        source,
    })?;

    let episodes = channel.items().iter().map(parse_episode).collect();
    Ok(Feed {
        title: channel.title().trim().to_string(),
        episodes,
    })
}

fn parse_episode(item: &rss::Item) -> Episode {
    let title = item
        .title()
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let mut links = Vec::new();
    if let Some(enclosure) = item.enclosure() {
        links.push(MediaLink {
            url: enclosure.url().to_string(),
            mime_type: enclosure.mime_type().to_string(),
        });
    }
    if let Some(link) = item.link() {
        links.push(MediaLink {
            url: link.to_string(),
            mime_type: "text/html".to_string(),
        });
    }

    let published = item.pub_date().and_then(parse_pub_date);
    Episode {
        title,
        links,
        published,
    }
}

fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .or_else(|_| DateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S %z"))
        .ok()
}

fn warn_duplicate_titles(feed: &Feed) {
    let mut seen = HashSet::new();
    for episode in &feed.episodes {
        if !seen.insert(episode.title.as_str()) {
            warn!(
                feed = %feed.title,
                episode = %episode.title,
                "duplicate episode title; listen positions will be shared"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FetchResponse;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast</description>
    <link>https://example.com</link>
    <item>
      <title>Episode 2</title>
      <link>https://example.com/ep2</link>
      <pubDate>Tue, 02 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/ep2.mp3" length="1234" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 1</title>
      <enclosure url="https://cdn.example.com/ep1.m4a" type="audio/x-m4a"/>
    </item>
  </channel>
</rss>"#;

    /// Serves scripted statuses per URL and counts calls.
    struct ScriptedTransport {
        responses: RefCell<HashMap<String, VecDeque<u16>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: &[(&str, &[u16])]) -> Self {
            let responses = script
                .iter()
                .map(|(url, statuses)| (url.to_string(), statuses.iter().copied().collect()))
                .collect();
            Self {
                responses: RefCell::new(responses),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls_for(&self, url: &str) -> usize {
            self.calls.borrow().iter().filter(|call| *call == url).count()
        }
    }

    impl FeedTransport for ScriptedTransport {
        fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            let status = self
                .responses
                .borrow_mut()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or(200);
            let body = if status == 200 {
                SAMPLE_FEED.as_bytes().to_vec()
            } else {
                Vec::new()
            };
            Ok(FetchResponse { status, body })
        }
    }

    #[test]
    fn parse_feed_extracts_episodes_in_order() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes(), "sample").expect("feed parses");

        assert_eq!(feed.title, "Test Podcast");
        let titles: Vec<_> = feed.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Episode 2", "Episode 1"]);
        assert!(feed.episodes[1].published.is_none());
        assert_eq!(feed.episodes[0].links.len(), 2);
    }

    #[test]
    fn label_includes_first_episode_date() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes(), "sample").expect("feed parses");
        assert_eq!(feed.label(), "Test Podcast - Updated 02 Jan 2024");

        let undated = Feed {
            title: "Undated".to_string(),
            episodes: Vec::new(),
        };
        assert_eq!(undated.label(), "Undated");
    }

    #[test]
    fn audio_link_prefers_mpeg_then_any_audio() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes(), "sample").expect("feed parses");

        let mpeg = feed.episodes[0].audio_link().expect("has link");
        assert_eq!(mpeg.url, "https://cdn.example.com/ep2.mp3");

        let m4a = feed.episodes[1].audio_link().expect("has link");
        assert_eq!(m4a.mime_type, "audio/x-m4a");

        let bare = Episode {
            title: "No links".to_string(),
            links: Vec::new(),
            published: None,
        };
        assert!(bare.audio_link().is_none());
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        let err = parse_feed(b"<html>not a feed</html>", "junk").expect_err("not rss");
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[test]
    fn failing_source_is_dropped_after_three_spaced_attempts() {
        let good = "https://good.example/feed";
        let bad = "https://bad.example/feed";
        let transport = ScriptedTransport::new(&[(bad, &[500, 404, 503, 200])]);
        let mut sleeps = Vec::new();

        let catalog = load_catalog(
            &[bad.to_string(), good.to_string()],
            Path::new("."),
            &transport,
            RetryPolicy::default(),
            &mut |delay| sleeps.push(delay),
        );

        assert_eq!(catalog.feeds().len(), 1);
        assert_eq!(catalog.feeds()[0].title, "Test Podcast");
        assert_eq!(transport.calls_for(bad), 3);
        assert_eq!(transport.calls_for(good), 1);
        assert_eq!(sleeps, vec![Duration::from_secs(3); 2]);
    }

    #[test]
    fn catalog_preserves_source_order() {
        let first = "https://one.example/feed";
        let second = "https://two.example/feed";
        let transport = ScriptedTransport::new(&[(first, &[503, 200])]);

        let catalog = load_catalog(
            &[first.to_string(), second.to_string()],
            Path::new("."),
            &transport,
            RetryPolicy::default(),
            &mut |_| {},
        );

        assert_eq!(catalog.feeds().len(), 2);
        assert_eq!(*transport.calls.borrow(), vec![first, first, second]);
    }

    #[test]
    fn local_sources_resolve_against_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("local.xml"), SAMPLE_FEED).expect("write feed");
        let transport = ScriptedTransport::new(&[]);

        let catalog = load_catalog(
            &["local.xml".to_string(), "missing.xml".to_string()],
            dir.path(),
            &transport,
            RetryPolicy::default(),
            &mut |_| {},
        );

        assert_eq!(catalog.labels(), vec!["Test Podcast - Updated 02 Jan 2024"]);
        assert!(transport.calls.borrow().is_empty());
    }
}
