//! Shortened-link detection and expansion
//!
//! A URL whose registrable domain belongs to a known shortener is expanded by
//! fetching it and following redirects. Expansion never fails on the network
//! side: any transport error, timeout or redirect overflow resolves the URL to
//! itself. Every outcome is written through to the injected [`UrlCache`].

mod shorteners;

pub use shorteners::ShortenerDomainSet;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::{Client, header::{HeaderMap, HeaderValue, USER_AGENT}};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

use crate::cache::UrlCache;
use crate::suffix::SuffixList;

// Constants for resolver configuration
const REQUEST_TIMEOUT: u64 = 6; // seconds
const CONNECTION_TIMEOUT: u64 = 6; // seconds
const MAX_REDIRECTS: usize = 10;
const MAX_CONCURRENCY: usize = 64;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Configuration for link expansion
///
/// Controls the HTTP client used for expansion, how far redirects are
/// followed and how many expansions a batch keeps in flight.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
    pub max_concurrency: usize,
    pub allowed_schemes: Vec<String>,
    pub shorteners: ShortenerDomainSet,
}

impl ResolverConfig {
    /// Creates a new resolver configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overall per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the timeout for establishing connections
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the maximum number of redirects followed per expansion
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets how many expansions a batch runs at once (at least one)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets the URL schemes that may be fetched
    pub fn with_allowed_schemes(mut self, schemes: Vec<String>) -> Self {
        self.allowed_schemes = schemes;
        self
    }

    /// Replaces the set of shortener domains
    pub fn with_shortener_domains(mut self, shorteners: ShortenerDomainSet) -> Self {
        self.shorteners = shorteners;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT),
            connection_timeout: Duration::from_secs(CONNECTION_TIMEOUT),
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_redirects: MAX_REDIRECTS,
            max_concurrency: MAX_CONCURRENCY,
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            shorteners: ShortenerDomainSet::default(),
        }
    }
}

/// Detects and expands shortened links
///
/// Cloning is cheap; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct LinkResolver {
    client: Client,
    cache: Arc<dyn UrlCache>,
    suffixes: Arc<SuffixList>,
    config: Arc<ResolverConfig>,
}

impl LinkResolver {
    /// Builds the HTTP client and wires in the cache
    pub fn new(
        config: ResolverConfig,
        cache: Arc<dyn UrlCache>,
        suffixes: Arc<SuffixList>,
    ) -> Result<Self> {
        debug!("Initializing HTTP client with user agent: {}", config.user_agent);
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .context("Failed to create User-Agent header")?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            cache,
            suffixes,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// True if the URL's registrable domain is a known shortener
    ///
    /// URLs without a registrable domain (IP hosts, unknown suffixes, garbage)
    /// are never treated as shortened.
    pub fn is_shortener(&self, url: &str) -> bool {
        match self.suffixes.extract(url).registrable_domain() {
            Some(domain) => self.config.shorteners.contains(&domain),
            None => false,
        }
    }

    /// Expands one URL, consulting the cache first
    ///
    /// Returns the final redirect target, or `url` itself when the fetch
    /// fails. Only cache failures produce an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, url: &str) -> Result<String> {
        if let Some(cached) = self.cache.get_cached_url(url).await? {
            debug!("Using cached expansion for {}: {}", url, cached);
            return Ok(cached);
        }

        let expanded = self.fetch_final_url(url).await;
        self.cache.cache_url(url, &expanded).await?;
        Ok(expanded)
    }

    /// Expands every URL given, regardless of whether it is a shortener
    ///
    /// Each URL runs in its own task on the caller's runtime; at most
    /// `max_concurrency` fetches are in flight. Results are gathered in
    /// completion order into a map keyed by the input URL.
    pub async fn expand_all(&self, urls: Vec<String>) -> Result<HashMap<String, String>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = FuturesUnordered::new();
        let mut abort_handles: Vec<AbortHandle> = Vec::with_capacity(urls.len());

        for url in urls {
            let resolver = self.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("Failed to acquire resolution permit")?;
                let expanded = resolver.resolve(&url).await?;
                Ok::<_, anyhow::Error>((url, expanded))
            });
            abort_handles.push(handle.abort_handle());
            tasks.push(handle);
        }

        let mut results = HashMap::with_capacity(abort_handles.len());
        while let Some(joined) = tasks.next().await {
            match joined.context("Resolution task panicked").and_then(|outcome| outcome) {
                Ok((url, expanded)) => {
                    trace!("Resolved {} -> {}", url, expanded);
                    results.insert(url, expanded);
                }
                Err(e) => {
                    // spawned tasks outlive their dropped handles unless aborted
                    warn!("Batch resolution failed, aborting {} pending tasks", tasks.len());
                    abort_handles.iter().for_each(AbortHandle::abort);
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    /// Expands the distinct shortened URLs among `urls`
    ///
    /// URLs that are not shortened do not appear in the returned map.
    pub async fn resolve_batch<I, S>(&self, urls: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shortened: BTreeSet<String> = urls
            .into_iter()
            .filter(|url| self.is_shortener(url.as_ref()))
            .map(|url| url.as_ref().to_string())
            .collect();

        if shortened.is_empty() {
            debug!("No shortened URLs in batch");
            return Ok(HashMap::new());
        }

        info!(
            "Resolving {} distinct shortened URLs (max concurrency {})",
            shortened.len(),
            self.config.max_concurrency
        );
        let results = self.expand_all(shortened.into_iter().collect()).await?;
        info!("Resolved {} shortened URLs", results.len());
        Ok(results)
    }

    async fn fetch_final_url(&self, url: &str) -> String {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Cannot fetch unparseable URL '{}': {}", url, e);
                return url.to_string();
            }
        };

        if !self.config.allowed_schemes.iter().any(|s| s == parsed.scheme()) {
            warn!("Refusing to fetch URL with scheme '{}': {}", parsed.scheme(), url);
            return url.to_string();
        }

        debug!("Sending request to {}", url);
        match self.client.get(parsed).send().await {
            Ok(resp) => {
                let final_url = resp.url().to_string();
                debug!("Expanded {} -> {} (status {})", url, final_url, resp.status());
                final_url
            }
            Err(e) if e.is_timeout() => {
                warn!("Timed out after {:?} expanding {}", self.config.request_timeout, url);
                url.to_string()
            }
            Err(e) if e.is_redirect() => {
                warn!("Too many redirects expanding {}: {}", url, e);
                url.to_string()
            }
            Err(e) => {
                error!("Failed to expand {}: {}", url, e);
                url.to_string()
            }
        }
    }
}
