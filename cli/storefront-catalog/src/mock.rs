//! Recording and replaying storefront API traffic.
//!
//! In record mode requests are proxied through a local httpmock server
//! to the real API and written to a file when the client is dropped.
//! In replay mode the same server answers from that file.

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;

use httpmock::{MockServer, RecordingID};
use tracing::{debug, warn};
use url::Url;

use crate::config::{CatalogClientConfig, CatalogMockMode};

/// Keeps a `MockServer` running until the `CatalogClient` is dropped.
#[allow(dead_code)] // https://github.com/rust-lang/rust/issues/122833
pub(crate) enum MockGuard {
    Record(MockRecorder),
    Replay { server: MockServer, api_path: String },
}

impl MockGuard {
    pub(crate) fn new(config: &CatalogClientConfig) -> Option<Self> {
        let (origin, api_path) = split_api_url(&config.api_url);

        match &config.mock_mode {
            CatalogMockMode::None => None,
            CatalogMockMode::Record(path) => {
                let server = MockServer::start();
                let recording = start_recording(&server, &origin);

                debug!(?path, server = server.base_url(), %origin, "mock server recording");
                Some(MockGuard::Record(MockRecorder {
                    path: path.to_path_buf(),
                    api_path,
                    server,
                    recording,
                }))
            },
            CatalogMockMode::Replay(path) => {
                let server = MockServer::start();
                server.playback(path);
                debug!(?path, server = server.base_url(), "mock server replaying");

                Some(MockGuard::Replay { server, api_path })
            },
        }
    }

    /// The API url pointing at the mock server.
    ///
    /// The path of the configured API url is kept so recordings
    /// contain the same paths the real API serves.
    pub(crate) fn url(&self) -> String {
        match self {
            MockGuard::Record(recorder) => {
                format!("{}{}", recorder.server.base_url(), recorder.api_path)
            },
            MockGuard::Replay { server, api_path } => format!("{}{api_path}", server.base_url()),
        }
    }
}

impl Debug for MockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let url = self.url();
        let mode = match self {
            MockGuard::Record(_) => "MockGuard::Record",
            MockGuard::Replay { .. } => "MockGuard::Replay",
        };
        write!(f, "{mode} url={url}")
    }
}

/// Split an API url into its origin and its path.
///
/// Unparseable urls are forwarded as is, client construction
/// reports them as invalid.
fn split_api_url(api_url: &str) -> (String, String) {
    match Url::parse(api_url) {
        Ok(url) => (url.origin().ascii_serialization(), url.path().to_string()),
        Err(_) => (api_url.to_string(), String::new()),
    }
}

fn start_recording(server: &MockServer, origin: &str) -> RecordingID {
    server.forward_to(origin, |rule| {
        rule.filter(|when| {
            when.any_request();
        });
    });
    server.record(|rule| {
        rule.filter(|when| {
            when.any_request();
        });
    })
}

/// In addition to keeping a `MockServer` running, also write any recorded
/// requests to a file when dropped.
pub(crate) struct MockRecorder {
    pub(crate) path: PathBuf,
    pub(crate) api_path: String,
    pub(crate) server: MockServer,
    pub(crate) recording: RecordingID,
}

impl Drop for MockRecorder {
    fn drop(&mut self) {
        // `record_save` appends a timestamp, so we rename after write.
        // The file name prefix keeps parallel test threads apart.
        let Some(file_name) = self.path.file_name().and_then(|name| name.to_str()) else {
            warn!(path = ?self.path, "recording path has no usable file name, discarding recording");
            return;
        };
        let tempfile = match self
            .server
            .record_save(&self.recording, format!("httpmock_{file_name}"))
        {
            Ok(tempfile) => tempfile,
            Err(e) => {
                warn!(error = %e, "failed to save mock recording");
                return;
            },
        };
        debug!(
            src = %tempfile.display(),
            dest = %self.path.display(),
            "renaming recorded mock file"
        );
        if let Err(e) = fs::rename(&tempfile, &self.path) {
            warn!(error = %e, path = ?self.path, "failed to move recorded mock file");
            return;
        }
        debug!(path = ?self.path, "saved mock recording");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_is_split_into_origin_and_path() {
        assert_eq!(
            split_api_url("https://shop.example.com/api/"),
            ("https://shop.example.com".to_string(), "/api/".to_string())
        );
        assert_eq!(
            split_api_url("http://localhost:8000"),
            ("http://localhost:8000".to_string(), "/".to_string())
        );
    }

    #[test]
    fn no_guard_without_mock_mode() {
        let config = CatalogClientConfig::new("https://shop.example.com/api/");
        assert!(MockGuard::new(&config).is_none());
    }
}
