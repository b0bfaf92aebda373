use reqwest::header::AUTHORIZATION;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{Level, event, instrument};

use crate::api::RequestTimeout;
use crate::error::LlmError;

/// Deadline for reachability checks.
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for model listings.
pub(crate) const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the API key travels on a request.
#[derive(Clone, Copy)]
pub(crate) enum Auth<'a> {
    None,
    Bearer(&'a str),
    QueryKey(&'a str),
}

impl<'a> Auth<'a> {
    pub(crate) fn bearer(api_key: Option<&'a str>) -> Self {
        api_key.map(Auth::Bearer).unwrap_or(Auth::None)
    }

    pub(crate) fn query_key(api_key: Option<&'a str>) -> Self {
        api_key.map(Auth::QueryKey).unwrap_or(Auth::None)
    }
}

/// Thin JSON wrapper over `reqwest::Client` shared by every adapter.
#[derive(Clone, Default)]
pub struct Client {
    client: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Client {
            client: reqwest::Client::new(),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Auth<'_>,
        timeout: RequestTimeout,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        builder = match auth {
            Auth::None => builder,
            Auth::Bearer(key) => builder.header(AUTHORIZATION, format!("Bearer {}", key)),
            Auth::QueryKey(key) => builder.query(&[("key", key)]),
        };
        match timeout.duration() {
            Some(d) => builder.timeout(d),
            None => builder,
        }
    }

    /// True when the endpoint answers with a 2xx status.
    #[instrument(level = "trace", skip(self, auth))]
    pub(crate) async fn check(&self, url: &str, auth: Auth<'_>) -> Result<bool, LlmError> {
        let timeout = RequestTimeout::After(PROBE_TIMEOUT);
        let response = self
            .request(reqwest::Method::GET, url, auth, timeout)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))?;
        event!(Level::TRACE, status = response.status().as_u16());
        Ok(response.status().is_success())
    }

    #[instrument(level = "trace", skip(self, auth))]
    pub(crate) async fn get<T>(
        &self,
        url: &str,
        auth: Auth<'_>,
        timeout: RequestTimeout,
    ) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(reqwest::Method::GET, url, auth, timeout)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))?;
        Self::parse(response, timeout).await
    }

    #[instrument(level = "trace", skip(self, auth, request))]
    pub(crate) async fn post<S, T>(
        &self,
        url: &str,
        auth: Auth<'_>,
        request: &S,
        timeout: RequestTimeout,
    ) -> Result<T, LlmError>
    where
        S: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(reqwest::Method::POST, url, auth, timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))?;
        Self::parse(response, timeout).await
    }

    async fn parse<T>(response: reqwest::Response, timeout: RequestTimeout) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(LlmError::status(status, &error_body));
        }
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))?;
        event!(Level::TRACE, response_len = text.len());

        serde_json::from_str::<T>(&text).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// Joins a host and a path without doubling the slash.
pub(crate) fn endpoint(host: &str, path: &str) -> String {
    format!("{}/{}", host.trim_end_matches('/'), path.trim_start_matches('/'))
}
