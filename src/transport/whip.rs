use crate::error::{TransportError, TransportResult};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, RequestBuilder};
use tracing::{debug, info, warn};
use url::Url;

/// Content type of WHIP offers and answers.
pub const WHIP_CONTENT_TYPE: &str = "application/sdp";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Result of a successful offer POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhipAnswer {
    /// Answer SDP text (response body)
    pub sdp: String,
    /// Session resource URL, resolved against the endpoint URL
    pub location: Option<Url>,
}

/// HTTP side of WHIP: one POST to open a session, one DELETE to end it.
///
/// Requests run on their own tokio task, so a request that has been issued
/// completes even when the future awaiting it is dropped (for example when the
/// caller is torn down mid-stop).
#[derive(Debug, Clone)]
pub struct WhipTransport {
    client: Client,
    auth_token: Option<String>,
}

impl Default for WhipTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WhipTransport {
    pub fn new(auth_token: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self::with_client(client, auth_token)
    }

    pub fn with_client(client: Client, auth_token: Option<String>) -> Self {
        Self { client, auth_token }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// POST the offer and return the answer.
    pub async fn send_offer(&self, url: &Url, offer_sdp: &str) -> TransportResult<WhipAnswer> {
        debug!("POST {}", url);

        let request = self
            .request(Method::POST, url.clone())
            .header(CONTENT_TYPE, WHIP_CONTENT_TYPE)
            .body(offer_sdp.to_owned());

        let (location, sdp) = detached(async move {
            let response = request
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let sdp = response
                .text()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            Ok((location, sdp))
        })
        .await?;

        let location = location.and_then(|raw| match url.join(&raw) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                warn!("Ignoring unusable Location header {:?}: {}", raw, e);
                None
            }
        });

        match &location {
            Some(resource) => info!("WHIP session resource: {}", resource),
            None => warn!("WHIP endpoint returned no Location; session cannot be deleted"),
        }

        Ok(WhipAnswer { sdp, location })
    }

    /// DELETE the session resource.
    pub async fn delete_session(&self, location: &Url) -> TransportResult<()> {
        debug!("DELETE {}", location);

        let request = self.request(Method::DELETE, location.clone());

        detached(async move {
            let response = request
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }

            Ok(())
        })
        .await?;

        info!("WHIP session deleted: {}", location);
        Ok(())
    }
}

async fn detached<T, F>(request: F) -> TransportResult<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = TransportResult<T>> + Send + 'static,
{
    tokio::spawn(request)
        .await
        .map_err(|e| TransportError::Network(format!("request task failed: {}", e)))?
}
