//! Client configuration.
//!
//! Defaults live in the crate root; each value can be overridden from the
//! environment:
//! - `DOCCHAT_BACKEND_URL`: base URL of the extraction/QA backend
//! - `DOCCHAT_RENDER_SCALE`: viewer scale factor
//! - `DOCCHAT_TIMEOUT_SECS`: optional HTTP request timeout

use crate::error::ConfigError;
use crate::{
    DEFAULT_BACKEND_URL, DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_PROGRESS_STEP, DEFAULT_RENDER_SCALE,
};
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: Url,
    pub render_scale: f32,
    pub progress_step: u8,
    pub progress_interval: Duration,
    /// Transport timeout for backend calls. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(backend_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            backend_url: parse_backend_url(backend_url)?,
            render_scale: DEFAULT_RENDER_SCALE,
            progress_step: DEFAULT_PROGRESS_STEP,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            request_timeout: None,
        })
    }

    /// Build from defaults plus any `DOCCHAT_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DOCCHAT_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let mut config = Self::new(&url)?;

        if let Ok(scale) = env::var("DOCCHAT_RENDER_SCALE") {
            config.render_scale = parse_scale(&scale)?;
        }

        if let Ok(secs) = env::var("DOCCHAT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "DOCCHAT_TIMEOUT_SECS",
                value: secs.clone(),
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn upload_url(&self) -> Url {
        endpoint(&self.backend_url, "upload")
    }

    pub fn query_url(&self) -> Url {
        endpoint(&self.backend_url, "query")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid"),
            render_scale: DEFAULT_RENDER_SCALE,
            progress_step: DEFAULT_PROGRESS_STEP,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            request_timeout: None,
        }
    }
}

/// Parse and check a backend base URL (http or https, with a host).
pub fn parse_backend_url(url_str: &str) -> Result<Url, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidUrl {
        url: url_str.to_string(),
        message: message.to_string(),
    };

    let url = Url::parse(url_str).map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("no host in URL"));
    }

    Ok(url)
}

fn parse_scale(value: &str) -> Result<f32, ConfigError> {
    match value.trim().parse::<f32>() {
        Ok(scale) if scale.is_finite() && scale > 0.0 => Ok(scale),
        _ => Err(ConfigError::InvalidValue {
            key: "DOCCHAT_RENDER_SCALE",
            value: value.to_string(),
        }),
    }
}

/// Join an endpoint onto the base URL, keeping any path prefix the base has.
fn endpoint(base: &Url, name: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), name);
    url.set_path(&path);
    url
}
