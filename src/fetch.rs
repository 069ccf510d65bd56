//! §4.2 StatementFetcher — retrieves signed entity statements, entity
//! configurations, and (§B.1) subordinate lists over HTTP.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::http_client::HttpClient;
use crate::model::EntityId;
use crate::model::EntityStatementPayload;

const WELL_KNOWN_PATH: &str = ".well-known/openid-federation";

pub(crate) fn join_well_known(entity_id: &str) -> String {
    if entity_id.ends_with('/') {
        format!("{entity_id}{WELL_KNOWN_PATH}")
    } else {
        format!("{entity_id}/{WELL_KNOWN_PATH}")
    }
}

pub(crate) fn query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Minimal percent-encoding, sufficient for the entity-id/URL query
/// parameters this engine constructs (no embedder-controlled free text ever
/// reaches this path).
pub(crate) fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Content types an entity statement response may advertise; parsers must
/// tolerate the generic JWT media types too (§6).
fn is_acceptable_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.split(';').next().unwrap_or(ct).trim();
            matches!(
                ct,
                "application/entity-statement+jwt" | "application/jwt" | "application/jose"
            )
        }
    }
}

/// Retrieves signed statements over HTTP, with timeout and content-type
/// discipline (§4.2).
pub struct StatementFetcher {
    client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl StatementFetcher {
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn get_compact_jws(&self, url: &str) -> Result<String, Error> {
        let uri: http::Uri = url.parse()?;
        let response = self.client.get(&uri, self.timeout).await?;

        if !response.is_success() {
            return Err(Error::FetchHttpError {
                url: url.to_string(),
                status: response.status,
            });
        }

        if !is_acceptable_content_type(response.content_type.as_deref()) {
            tracing::warn!(url, content_type = ?response.content_type, "unrecognized content type on entity statement response");
            return Err(Error::UnrecognizedJwsType);
        }

        String::from_utf8(response.body)
            .map(|s| s.trim().to_string())
            .map_err(|e| Error::FetchFormatError {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// `GET {entity_id}/.well-known/openid-federation`.
    pub async fn fetch_configuration(&self, entity_id: &str) -> Result<String, Error> {
        let url = join_well_known(entity_id);
        tracing::debug!(entity_id, "fetching entity configuration");
        self.get_compact_jws(&url).await
    }

    /// `GET {fetch_endpoint}?iss={iss}&sub={sub}` (`sub` omitted when
    /// `iss == sub`).
    pub async fn fetch(
        &self,
        fetch_endpoint: &str,
        iss: &EntityId,
        sub: &EntityId,
    ) -> Result<String, Error> {
        let qs = if iss == sub {
            query(&[("iss", iss)])
        } else {
            query(&[("iss", iss), ("sub", sub)])
        };
        let url = format!("{fetch_endpoint}?{qs}");
        tracing::debug!(fetch_endpoint, iss, sub, "fetching entity statement");
        self.get_compact_jws(&url).await
    }

    /// (§B.1) `GET {list_endpoint}` -> JSON array of subordinate entity ids.
    pub async fn fetch_subordinate_list(
        &self,
        list_endpoint: &str,
    ) -> Result<Vec<EntityId>, Error> {
        let uri: http::Uri = list_endpoint.parse()?;
        let response = self.client.get(&uri, self.timeout).await?;

        if !response.is_success() {
            return Err(Error::FetchHttpError {
                url: list_endpoint.to_string(),
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| Error::FetchFormatError {
            url: list_endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// `GET {status_endpoint}?trust_mark={jws}` (§6, §4.7.4).
    pub async fn fetch_trust_mark_status(
        &self,
        status_endpoint: &str,
        trust_mark: &str,
    ) -> Result<crate::model::TrustMarkStatus, Error> {
        let qs = query(&[("trust_mark", trust_mark)]);
        let url = format!("{status_endpoint}?{qs}");
        let uri: http::Uri = url.parse()?;
        let response = self.client.get(&uri, self.timeout).await?;

        if !response.is_success() {
            return Err(Error::FetchHttpError {
                url,
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| Error::FetchFormatError {
            url,
            message: e.to_string(),
        })
    }
}

/// Decode a compact JWS's payload *without* verifying its signature.
///
/// Used only to read the fields the collector needs before any key is
/// available to verify with (`authority_hints`, fetch/list/status
/// endpoints). Nothing decoded this way is treated as trustworthy until the
/// statement carrying it is verified top-down by the
/// [`verifier`](crate::verifier).
pub fn decode_unverified_payload(jws: &str) -> Result<EntityStatementPayload, Error> {
    let data = jsonwebtoken::dangerous_insecure_decode::<EntityStatementPayload>(jws)?;
    Ok(data.claims)
}

/// The `federation_entity` metadata claim `federation_fetch_endpoint`,
/// `federation_list_endpoint`, or `federation_status_endpoint`, read from an
/// (unverified) entity configuration.
pub fn federation_endpoint(payload: &EntityStatementPayload, claim: &str) -> Option<String> {
    let metadata = payload.metadata.as_ref()?;
    let fe = metadata.get(&crate::model::EntityType::FederationEntity)?;
    fe.get(claim)?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn urlencode_leaves_unreserved_characters_untouched() {
        assert_eq!(urlencode("abcXYZ019-_.~"), "abcXYZ019-_.~");
    }

    #[test]
    fn urlencode_percent_escapes_everything_else() {
        assert_eq!(urlencode("https://a.example/b"), "https%3A%2F%2Fa.example%2Fb");
        assert_eq!(urlencode("a b"), "a%20b");
    }

    #[test]
    fn is_acceptable_content_type_accepts_known_jwt_media_types() {
        assert!(is_acceptable_content_type(None));
        assert!(is_acceptable_content_type(Some("application/entity-statement+jwt")));
        assert!(is_acceptable_content_type(Some("application/jwt; charset=utf-8")));
        assert!(is_acceptable_content_type(Some("application/jose")));
    }

    #[test]
    fn is_acceptable_content_type_rejects_unrelated_types() {
        assert!(!is_acceptable_content_type(Some("text/html")));
        assert!(!is_acceptable_content_type(Some("application/json")));
    }

    struct WrongContentTypeClient;

    #[async_trait::async_trait]
    impl crate::http_client::HttpClient for WrongContentTypeClient {
        async fn get(
            &self,
            _uri: &http::Uri,
            _timeout: Duration,
        ) -> Result<crate::http_client::HttpResponse, Error> {
            Ok(crate::http_client::HttpResponse {
                status: 200,
                body: b"not a jws".to_vec(),
                content_type: Some("text/html".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn fetch_configuration_rejects_an_unrecognized_content_type() {
        let fetcher = StatementFetcher::new(Arc::new(WrongContentTypeClient), Duration::from_secs(5));

        let err = fetcher
            .fetch_configuration("https://rp.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnrecognizedJwsType));
    }

    #[tokio::test]
    async fn fetch_subordinate_list_decodes_the_entity_id_array() {
        let client = test_support::MockHttpClient::new().with(
            "https://anchor.example.org/list",
            r#"["https://a.example.org", "https://b.example.org"]"#,
        );
        let fetcher = StatementFetcher::new(Arc::new(client), Duration::from_secs(5));

        let subordinates = fetcher
            .fetch_subordinate_list("https://anchor.example.org/list")
            .await
            .unwrap();

        assert_eq!(
            subordinates,
            vec![
                "https://a.example.org".to_string(),
                "https://b.example.org".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_subordinate_list_surfaces_http_errors() {
        let client = test_support::MockHttpClient::new();
        let fetcher = StatementFetcher::new(Arc::new(client), Duration::from_secs(5));

        let err = fetcher
            .fetch_subordinate_list("https://anchor.example.org/list")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchHttpError { status: 404, .. }));
    }

    #[tokio::test]
    async fn fetch_subordinate_list_rejects_malformed_json() {
        let client = test_support::MockHttpClient::new()
            .with("https://anchor.example.org/list", "not json");
        let fetcher = StatementFetcher::new(Arc::new(client), Duration::from_secs(5));

        let err = fetcher
            .fetch_subordinate_list("https://anchor.example.org/list")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchFormatError { .. }));
    }
}
