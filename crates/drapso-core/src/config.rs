//! Environment configuration.
//!
//! Runtime settings (theme, gestures) are scrolls; see `paths`. This module
//! only covers what has to be known before the shell opens.

/// Base URL of the hosted backend.
pub const ENV_BACKEND_URL: &str = "DRAPSO_BACKEND_URL";
/// Public (anon) API key sent with every backend request.
pub const ENV_ANON_KEY: &str = "DRAPSO_ANON_KEY";
/// Local 9S data root, read by `Shell::open`.
pub const ENV_DATA_ROOT: &str = "NINE_S_ROOT";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    /// Both variables must be set and non-blank; otherwise the client runs
    /// against the offline store.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(
            std::env::var(ENV_BACKEND_URL).ok(),
            std::env::var(ENV_ANON_KEY).ok(),
        )
    }

    fn from_vars(url: Option<String>, key: Option<String>) -> Option<Self> {
        let url = url.filter(|u| !u.trim().is_empty())?;
        let key = key.filter(|k| !k.trim().is_empty())?;
        Some(Self::new(url.trim(), key.trim()))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.url, function)
    }

    pub fn object_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.url, bucket, object)
    }

    pub fn public_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.url, bucket, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_vars_mean_offline() {
        assert!(BackendConfig::from_vars(None, Some("k".into())).is_none());
        assert!(BackendConfig::from_vars(Some("  ".into()), Some("k".into())).is_none());
        assert!(BackendConfig::from_vars(Some("https://x.io".into()), None).is_none());
    }

    #[test]
    fn urls_are_built_without_double_slash() {
        let cfg = BackendConfig::from_vars(Some("https://x.io/".into()), Some("k".into())).unwrap();
        assert_eq!(cfg.rest_url("videos"), "https://x.io/rest/v1/videos");
        assert_eq!(
            cfg.rpc_url("increment_video_views"),
            "https://x.io/rest/v1/rpc/increment_video_views"
        );
        assert_eq!(
            cfg.public_url("videos", "videos/u-1.mp4"),
            "https://x.io/storage/v1/object/public/videos/videos/u-1.mp4"
        );
    }
}
