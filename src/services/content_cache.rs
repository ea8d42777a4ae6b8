//! Deduplicating content fetch cache.
//!
//! At most one request per URL is in flight at any time. The pending future is
//! inserted into the map before anyone polls it, so concurrent callers always
//! find and share it. A successful fetch replaces the entry with its body; a
//! failed one removes the entry so the next call starts over.
//!
//! Resolved bodies are reused for a limited time only, so an edited preview
//! is picked up again, and the number of entries is capped.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(30);
const DEFAULT_CAPACITY: usize = 256;

/// Fetch failure shared by every caller waiting on the same request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Source of page content.
#[async_trait]
pub trait ContentFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches content over HTTP with `reqwest`.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("a11y-assist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.http.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}

type PendingFetch = Shared<BoxFuture<'static, Result<String, FetchError>>>;

enum Entry {
    Pending { generation: u64, fetch: PendingFetch },
    Ready { body: String, fetched_at: Instant },
}

/// Cache of fetched content keyed by URL.
///
/// Owned by whatever needs deduplicated fetches; there is no process-wide
/// instance.
pub struct ContentCache {
    fetcher: Arc<dyn ContentFetcher>,
    entries: Arc<DashMap<String, Entry>>,
    generation: AtomicU64,
    ttl: Duration,
    capacity: usize,
}

impl ContentCache {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self::with_limits(fetcher, DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    /// Cache that reuses a resolved body for `ttl` and holds at most
    /// `capacity` entries.
    pub fn with_limits(fetcher: Arc<dyn ContentFetcher>, ttl: Duration, capacity: usize) -> Self {
        Self {
            fetcher,
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Return the content of `url`, fetching it at most once per `ttl`.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if self.entries.len() >= self.capacity {
            self.evict();
        }

        let pending = match self.entries.entry(url.to_string()) {
            MapEntry::Occupied(mut entry) => {
                let in_flight = match entry.get() {
                    Entry::Ready { body, fetched_at } if fetched_at.elapsed() < self.ttl => {
                        metrics::counter!("content_cache_hits_total").increment(1);
                        return Ok(body.clone());
                    }
                    Entry::Ready { .. } => None,
                    Entry::Pending { fetch, .. } => Some(fetch.clone()),
                };

                match in_flight {
                    Some(fetch) => fetch,
                    None => {
                        tracing::debug!(url, "Cached content expired");
                        let (generation, fetch) = self.begin(url);
                        entry.insert(Entry::Pending {
                            generation,
                            fetch: fetch.clone(),
                        });
                        fetch
                    }
                }
            }
            MapEntry::Vacant(entry) => {
                let (generation, fetch) = self.begin(url);
                entry.insert(Entry::Pending {
                    generation,
                    fetch: fetch.clone(),
                });
                fetch
            }
        };

        pending.await
    }

    /// Drop any cached or pending entry for `url`.
    pub fn invalidate(&self, url: &str) {
        if self.entries.remove(url).is_some() {
            tracing::debug!(url, "Invalidated cached content");
        }
    }

    /// Whether `url` currently has a resolved or pending entry.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Number of resolved and pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired bodies, then the oldest ones until there is room for one
    /// more entry. Pending fetches are never evicted.
    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| match entry {
            Entry::Ready { fetched_at, .. } => fetched_at.elapsed() < ttl,
            Entry::Pending { .. } => true,
        });

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter_map(|item| match item.value() {
                    Entry::Ready { fetched_at, .. } => Some((*fetched_at, item.key().clone())),
                    Entry::Pending { .. } => None,
                })
                .min_by_key(|(fetched_at, _)| *fetched_at);

            match oldest {
                Some((_, url)) => {
                    tracing::debug!(url = %url, "Evicted cached content");
                    self.entries.remove(&url);
                }
                None => break,
            }
        }
    }

    fn begin(&self, url: &str) -> (u64, PendingFetch) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        (generation, self.start(url.to_string(), generation))
    }

    fn start(&self, url: String, generation: u64) -> PendingFetch {
        let fetcher = Arc::clone(&self.fetcher);
        let entries = Arc::clone(&self.entries);

        async move {
            tracing::debug!(url = %url, "Fetching content");
            let result = fetcher.fetch(&url).await;

            // Only settle the entry this fetch created; it may have been
            // invalidated and replaced meanwhile.
            if let MapEntry::Occupied(mut entry) = entries.entry(url.clone()) {
                let owned = matches!(
                    entry.get(),
                    Entry::Pending { generation: g, .. } if *g == generation
                );
                if owned {
                    match &result {
                        Ok(body) => {
                            entry.insert(Entry::Ready {
                                body: body.clone(),
                                fetched_at: Instant::now(),
                            });
                        }
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "Content fetch failed");
                            entry.remove();
                        }
                    }
                }
            }

            result
        }
        .boxed()
        .shared()
    }
}
