//! Connection options.

use crate::base::neterror::NetError;
use crate::http::h2settings::H2Settings;
use http::Version;
use url::Url;

/// Where and how to connect.
///
/// Built with consuming setters:
///
/// ```rust,ignore
/// let options = ConnectOptions::from_url("http://localhost:8080")?
///     .http2()
///     .settings(H2Settings::new().initial_window_size(1 << 20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// `HTTP_11` for the single-exchange variant, `HTTP_2` for the
    /// multiplexed one.
    pub version: Version,
    /// Local settings announced by a multiplexed connection.
    pub settings: H2Settings,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            version: Version::HTTP_11,
            settings: H2Settings::default(),
        }
    }

    /// Host and port of an `http://` URL. Path and query are ignored.
    pub fn from_url(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        if url.scheme() != "http" {
            return Err(NetError::UnknownUrlScheme);
        }
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        Ok(Self::new(host, port))
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Use the multiplexed variant (HTTP/2 with prior knowledge).
    pub fn http2(self) -> Self {
        self.version(Version::HTTP_2)
    }

    pub fn settings(mut self, settings: H2Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn is_multiplexed(&self) -> bool {
        self.version == Version::HTTP_2
    }

    /// `host:port`, for the `Host` header and authority.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_defaults_port() {
        let options = ConnectOptions::from_url("http://example.com/path?q=1").unwrap();
        assert_eq!(options.host, "example.com");
        assert_eq!(options.port, 80);
        assert_eq!(options.version, Version::HTTP_11);
        assert!(!options.is_multiplexed());
    }

    #[test]
    fn test_from_url_explicit_port() {
        let options = ConnectOptions::from_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(options.authority(), "127.0.0.1:8080");
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        assert_eq!(
            ConnectOptions::from_url("ftp://example.com").unwrap_err(),
            NetError::UnknownUrlScheme
        );
        assert_eq!(
            ConnectOptions::from_url("not a url").unwrap_err(),
            NetError::InvalidUrl
        );
    }

    #[test]
    fn test_builder() {
        let settings = H2Settings::new().max_frame_size(32768);
        let options = ConnectOptions::new("localhost", 9000)
            .http2()
            .settings(settings);
        assert!(options.is_multiplexed());
        assert_eq!(options.settings.max_frame_size, 32768);
    }
}
