//! HTTP transport for repository scanning
//!
//! Tags come from the git smart-HTTP reference advertisement
//! (`{repo}/info/refs?service=git-upload-pack`), so no local clone is needed.
//! Definitions are read from the raw-content host that serves the repository
//! tree, e.g. `https://raw.githubusercontent.com/{org}/{repo}/{tag}/profile.yaml`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use tracing::debug;

use super::{Credential, ProfileDefinition, RepositoryTransport, TransportError, PROFILE_FILE};
use crate::config::HttpConfig;

/// Transport backed by a shared reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
    raw_hosts: BTreeMap<String, String>,
}

impl HttpTransport {
    /// Create a transport from HTTP settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            raw_hosts: config.raw_hosts.clone(),
        })
    }

    fn parse_repository(repository: &str) -> Result<Url, TransportError> {
        let url = Url::parse(repository).map_err(|_| TransportError::InvalidUrl {
            url: repository.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(TransportError::InvalidUrl {
                url: repository.to_string(),
            }),
        }
    }

    /// URL of the git reference advertisement for `repository`
    pub fn refs_url(repository: &str) -> Result<Url, TransportError> {
        let mut url = Self::parse_repository(repository)?;
        let path = format!("{}/info/refs", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(Some("service=git-upload-pack"));
        Ok(url)
    }

    /// URL of the profile definition published at `tag`
    pub fn definition_url(&self, repository: &str, tag: &str) -> Result<Url, TransportError> {
        let url = Self::parse_repository(repository)?;
        let host = url.host_str().ok_or_else(|| TransportError::InvalidUrl {
            url: repository.to_string(),
        })?;

        let raw_base = self
            .raw_hosts
            .get(host)
            .ok_or_else(|| TransportError::UnsupportedProvider {
                url: repository.to_string(),
                host: host.to_string(),
            })?;

        let path = url.path().trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let definition = format!(
            "{}/{}/{}/{}",
            raw_base.trim_end_matches('/'),
            path,
            tag,
            PROFILE_FILE
        );

        Url::parse(&definition).map_err(|_| TransportError::InvalidUrl { url: definition })
    }

    fn authorize(request: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        match credential {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn get_bytes(
        &self,
        url: Url,
        credential: Option<&Credential>,
    ) -> Result<Vec<u8>, TransportError> {
        let display = url.to_string();
        let request = Self::authorize(self.client.get(url), credential);

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: display.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: display,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request {
                url: display,
                source: Box::new(e),
            })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl RepositoryTransport for HttpTransport {
    async fn list_tags(
        &self,
        repository: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>, TransportError> {
        let url = Self::refs_url(repository)?;
        debug!("Listing tags from {}", url);

        let body = self.get_bytes(url.clone(), credential).await?;
        parse_ref_advertisement(&body).map_err(|reason| TransportError::Protocol {
            url: url.to_string(),
            reason,
        })
    }

    async fn fetch_definition(
        &self,
        repository: &str,
        tag: &str,
        credential: Option<&Credential>,
    ) -> Result<ProfileDefinition, TransportError> {
        let url = self.definition_url(repository, tag)?;
        debug!("Fetching {} from {}", PROFILE_FILE, url);

        let body = self.get_bytes(url, credential).await?;
        let content = String::from_utf8(body).map_err(|_| TransportError::MalformedDefinition {
            reason: "document is not valid UTF-8".to_string(),
        })?;

        ProfileDefinition::from_yaml(&content)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Extract tag names from a git-upload-pack reference advertisement
///
/// The body is a sequence of pkt-lines: four hex digits of length (header
/// included) followed by the payload. `0000`-`0002` are control packets.
fn parse_ref_advertisement(body: &[u8]) -> Result<Vec<String>, String> {
    let mut tags = BTreeSet::new();
    let mut pos = 0;

    while pos < body.len() {
        let header = body
            .get(pos..pos + 4)
            .ok_or_else(|| format!("truncated pkt-line header at byte {pos}"))?;
        let header = std::str::from_utf8(header)
            .map_err(|_| format!("non-ASCII pkt-line header at byte {pos}"))?;
        let len = usize::from_str_radix(header, 16)
            .map_err(|_| format!("invalid pkt-line length '{header}' at byte {pos}"))?;

        if len <= 2 {
            pos += 4;
            continue;
        }
        if len < 4 {
            return Err(format!("invalid pkt-line length {len} at byte {pos}"));
        }

        let payload = body
            .get(pos + 4..pos + len)
            .ok_or_else(|| format!("truncated pkt-line at byte {pos}"))?;
        pos += len;

        let line = String::from_utf8_lossy(payload);
        let line = line.trim_end_matches('\n');
        if line.starts_with('#') {
            continue;
        }

        // The first ref carries capabilities after a NUL byte
        let line = line.split_once('\0').map(|(r, _)| r).unwrap_or(line);
        let Some((_oid, refname)) = line.split_once(' ') else {
            continue;
        };

        if let Some(tag) = refname.strip_prefix("refs/tags/") {
            if !tag.ends_with("^{}") {
                tags.insert(tag.to_string());
            }
        }
    }

    Ok(tags.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const OID: &str = "1c9a2b6f0d5e4c3b2a190817161514131211100f";

    fn pkt(line: &str) -> String {
        format!("{:04x}{}", line.len() + 4, line)
    }

    fn advertisement(refs: &[&str]) -> String {
        let mut body = pkt("# service=git-upload-pack\n");
        body.push_str("0000");
        for (i, refname) in refs.iter().enumerate() {
            if i == 0 {
                body.push_str(&pkt(&format!("{OID} {refname}\0multi_ack side-band-64k\n")));
            } else {
                body.push_str(&pkt(&format!("{OID} {refname}\n")));
            }
        }
        body.push_str("0000");
        body
    }

    fn transport_for(server: &mockito::ServerGuard) -> HttpTransport {
        let mut config = HttpConfig::default();
        config
            .raw_hosts
            .insert("127.0.0.1".to_string(), server.url());
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_parse_ref_advertisement() {
        let body = advertisement(&[
            "HEAD",
            "refs/heads/main",
            "refs/tags/v0.1.0",
            "refs/tags/v0.1.0^{}",
            "refs/tags/v0.1.1",
        ]);

        let tags = parse_ref_advertisement(body.as_bytes()).unwrap();
        assert_eq!(tags, vec!["v0.1.0", "v0.1.1"]);
    }

    #[test]
    fn test_parse_empty_repository() {
        let body = advertisement(&["capabilities^{}"]);
        assert!(parse_ref_advertisement(body.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_ref_advertisement(b"<html>").is_err());
        assert!(parse_ref_advertisement(b"00ffshort").is_err());
    }

    #[test]
    fn test_definition_url_for_github() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();

        let url = transport
            .definition_url("https://github.com/weaveworks/nginx-profile.git", "v0.1.0")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/weaveworks/nginx-profile/v0.1.0/profile.yaml"
        );
    }

    #[test]
    fn test_definition_url_unsupported_host() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();

        let err = transport
            .definition_url("https://gitlab.example.com/org/repo", "v0.1.0")
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedProvider { .. }));

        let err = transport.definition_url("not a url", "v0.1.0").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_refs_url() {
        let url = HttpTransport::refs_url("https://github.com/org/repo/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.com/org/repo/info/refs?service=git-upload-pack"
        );
    }

    #[tokio::test]
    async fn test_list_tags_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/org/repo/info/refs")
            .match_query(Matcher::UrlEncoded(
                "service".into(),
                "git-upload-pack".into(),
            ))
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_header("content-type", "application/x-git-upload-pack-advertisement")
            .with_body(advertisement(&["refs/heads/main", "refs/tags/v0.1.0"]))
            .create_async()
            .await;

        let transport = transport_for(&server);
        let credential = Credential {
            username: "user".to_string(),
            password: "pass".to_string(),
        };

        let tags = transport
            .list_tags(&format!("{}/org/repo", server.url()), Some(&credential))
            .await
            .unwrap();

        assert_eq!(tags, vec!["v0.1.0"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_definition_over_http() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/org/repo/v0.1.0/profile.yaml")
            .with_status(200)
            .with_body("metadata:\n  name: nginx\nspec:\n  description: nginx profile\n")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let definition = transport
            .fetch_definition(&format!("{}/org/repo", server.url()), "v0.1.0", None)
            .await
            .unwrap();

        assert_eq!(definition.metadata.name, "nginx");
        assert_eq!(definition.spec.description, "nginx profile");
    }

    #[tokio::test]
    async fn test_fetch_definition_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/org/repo/v9.9.9/profile.yaml")
            .with_status(404)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .fetch_definition(&format!("{}/org/repo", server.url()), "v9.9.9", None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 404, .. }));
    }
}
