use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::domain::{MappingPair, SchemeTag};
use crate::error::SeqidError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRequest {
    pub from: SchemeTag,
    pub to: SchemeTag,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub accessions: Vec<String>,
}

/// One request to the mapping/metadata service, returning the raw body.
pub trait Transport: Send + Sync {
    /// Response body is `source\ttarget` lines; unmapped sources are absent.
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError>;
    /// Response body is flat-record text, one `//`-terminated record per entry.
    fn fetch_records(&self, request: &MetadataRequest) -> Result<String, SeqidError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError> {
        (**self).map_ids(request)
    }

    fn fetch_records(&self, request: &MetadataRequest) -> Result<String, SeqidError> {
        (**self).fetch_records(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError> {
        (**self).map_ids(request)
    }

    fn fetch_records(&self, request: &MetadataRequest) -> Result<String, SeqidError> {
        (**self).fetch_records(request)
    }
}

#[derive(Clone)]
pub struct UniprotHttpTransport {
    client: Client,
    config: TransportConfig,
}

impl UniprotHttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, SeqidError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("useqid/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SeqidError::Transport(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SeqidError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, SeqidError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let max_retries = self.config.max_retries;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying uniprot request");
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying uniprot request");
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(SeqidError::Transport(err.to_string()));
                }
            }
        }
    }

    /// The batch endpoint answers long jobs with `Retry-After`; poll the
    /// result URL until the body is ready.
    fn follow_retry_after(&self, mut response: Response) -> Result<Response, SeqidError> {
        let mut polls = 0usize;
        while let Some(wait) = retry_after_secs(&response) {
            if polls >= self.config.max_polls {
                return Err(SeqidError::Transport(format!(
                    "result not ready after {polls} polls"
                )));
            }
            info!(wait, "uniprot asked to wait before polling");
            std::thread::sleep(Duration::from_secs(wait));
            let url = response.url().clone();
            response = self.send_with_retries(|| self.client.get(url.clone()))?;
            polls += 1;
        }
        Ok(response)
    }

    fn handle_status(response: Response) -> Result<Response, SeqidError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "UniProt request failed".to_string());
        Err(SeqidError::TransportStatus { status, message })
    }

    fn read_body(response: Response, what: &str) -> Result<String, SeqidError> {
        let text = response
            .text()
            .map_err(|err| SeqidError::Transport(err.to_string()))?;
        if is_html(&text) {
            return Err(SeqidError::ServiceError(what.to_string()));
        }
        Ok(text)
    }
}

impl Transport for UniprotHttpTransport {
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError> {
        let query = request.ids.join(" ");
        let params = [
            ("from", request.from.as_str()),
            ("to", request.to.as_str()),
            ("format", "tab"),
            ("query", query.as_str()),
        ];
        let url = &self.config.mapping_url;
        let response = self.send_with_retries(|| self.client.post(url).form(&params))?;
        let response = Self::handle_status(response)?;
        Self::read_body(response, "a mapping table")
    }

    fn fetch_records(&self, request: &MetadataRequest) -> Result<String, SeqidError> {
        let query = request.accessions.join(" ");
        let params = [("query", query.as_str()), ("format", "txt")];
        let url = &self.config.metadata_url;
        let response = self.send_with_retries(|| self.client.post(url).form(&params))?;
        let response = self.follow_retry_after(response)?;
        let response = Self::handle_status(response)?;
        Self::read_body(response, "flat-record text")
    }
}

/// Parses a tab-separated mapping response. A leading `From\tTo` header and
/// blank or single-column lines are ignored.
pub fn parse_mapping_response(text: &str) -> Result<Vec<MappingPair>, SeqidError> {
    if is_html(text) {
        return Err(SeqidError::ServiceError("a mapping table".to_string()));
    }
    let mut pairs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let mut fields = line.split('\t');
        let (Some(source), Some(target)) = (fields.next(), fields.next()) else {
            continue;
        };
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            continue;
        }
        if index == 0 && source.eq_ignore_ascii_case("from") {
            continue;
        }
        pairs.push(MappingPair::new(source, target));
    }
    Ok(pairs)
}

/// A failed call comes back as an HTML error page instead of data.
pub fn is_html(text: &str) -> bool {
    text.get(..512.min(text.len()))
        .unwrap_or(text)
        .to_ascii_lowercase()
        .contains("<html")
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
