// src/fetch/http.rs
// =============================================================================
// This module fetches web pages over HTTP.
//
// Key functionality:
// - Refuses non-http(s) URLs and (by default) private/loopback hosts,
//   including as redirect targets
// - Waits for the shared per-domain rate limiter before every request
// - Issues a GET with a timeout and a bounded redirect chain
// - Retries timeouts and network failures a fixed number of times
// - Never retries HTTP error statuses
// - Caps the body size, both from Content-Length and while downloading
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::{Host, Url};

use super::rate_limit::DomainRateLimiter;
use super::{FetchedPage, PageFetcher};
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::links::domain_of;

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<DomainRateLimiter>,
}

impl HttpFetcher {
    /// Builds a fetcher with its own rate limiter.
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let rate_limiter = Arc::new(DomainRateLimiter::new(config.min_domain_spacing));
        Self::with_rate_limiter(config, rate_limiter)
    }

    /// Builds a fetcher sharing an existing rate limiter.
    pub fn with_rate_limiter(
        config: FetchConfig,
        rate_limiter: Arc<DomainRateLimiter>,
    ) -> Result<Self, reqwest::Error> {
        // One client for every request (connection pooling)
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect_policy(config.max_redirects, config.block_private_hosts))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    fn validate_url(&self, url: &str) -> Result<Url, FetchError> {
        let invalid = || FetchError::InvalidUrl {
            url: url.to_string(),
        };

        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid());
        }
        let host = parsed.host().ok_or_else(invalid)?;

        if self.config.block_private_hosts && is_private_host(&host) {
            return Err(FetchError::BlockedHost {
                host: host.to_string(),
            });
        }

        Ok(parsed)
    }

    // One GET, no retries
    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| categorize_error(url.as_str(), e))?;

        let status = response.status();
        if status.is_redirection() && self.config.block_private_hosts {
            // The redirect policy stops in front of private targets
            if let Some(host) = blocked_redirect_host(&response) {
                return Err(FetchError::BlockedHost { host });
            }
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_content_size;
        if let Some(announced) = response.content_length() {
            if announced > limit {
                return Err(FetchError::TooLarge {
                    size: announced,
                    limit,
                });
            }
        }

        let final_url = response.url().to_string();

        // Read chunk by chunk so an oversized body is cut off early
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| categorize_error(url.as_str(), e))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > limit {
                return Err(FetchError::TooLarge { size, limit });
            }
            body.extend_from_slice(&chunk);
        }

        let content_size = body.len();
        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content: String::from_utf8_lossy(&body).into_owned(),
            content_size,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = self.validate_url(url)?;
        let domain = domain_of(&parsed);

        let mut attempt = 1;
        loop {
            self.rate_limiter.acquire(&domain).await;
            match self.fetch_once(&parsed).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    tracing::debug!(url, attempt, error = %e, "fetch attempt failed, retrying");
                    attempt += 1;
                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(e) => {
                    match &e {
                        FetchError::TooLarge { size, limit } => {
                            tracing::warn!(url, size, limit, "content size limit exceeded, download aborted");
                        }
                        FetchError::BlockedHost { host } => {
                            tracing::warn!(url, host = %host, "refused redirect to a private host");
                        }
                        _ => {}
                    }
                    return Err(e);
                }
            }
        }
    }
}

// Follows up to `max_redirects` hops, stopping before any private host
fn redirect_policy(max_redirects: usize, block_private_hosts: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            attempt.error("too many redirects")
        } else if block_private_hosts && attempt.url().host().is_some_and(|host| is_private_host(&host)) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

// Host of the Location header of a redirect response, if it is private
fn blocked_redirect_host(response: &reqwest::Response) -> Option<String> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    let target = response.url().join(location).ok()?;
    let host = target.host()?;
    is_private_host(&host).then(|| host.to_string())
}

// Maps reqwest failures onto our error taxonomy
fn categorize_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_redirect() {
        FetchError::TooManyRedirects {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

fn is_private_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_private_ipv4(ip),
        Host::Ipv6(ip) => is_private_ipv6(ip),
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_private_ip(&IpAddr::V4(mapped));
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}
