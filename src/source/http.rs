//! Long-lived HTTP stream: one POST with the keyword filter, then one record
//! per line of the response body.

use std::fmt;
use std::io::BufReader;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;

use super::{LineSource, RecordSource};
use crate::config::{AuthConfig, SourceConfig};
use crate::constants::{STREAM_FILTER_PATH, TRACK_PARAM};
use crate::error::{Result, TallyError};
use crate::keywords::KeywordSet;

/// The parts of the stream request a signing authenticator covers.
#[derive(Debug, Clone, Copy)]
pub struct FilterRequest<'a> {
    /// Endpoint without a query string.
    pub url: &'a str,
    /// Comma-joined keywords sent as the `track` form field.
    pub track: &'a str,
}

/// Decorates the outgoing stream request with credentials.
pub trait Authenticator: Send + Sync {
    fn authorize(
        &self,
        request: RequestBuilder,
        filter: &FilterRequest<'_>,
    ) -> Result<RequestBuilder>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authenticator for NoAuth {
    fn authorize(&self, request: RequestBuilder, _: &FilterRequest<'_>) -> Result<RequestBuilder> {
        Ok(request)
    }
}

#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl Authenticator for BearerToken {
    fn authorize(&self, request: RequestBuilder, _: &FilterRequest<'_>) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(&self.0))
    }
}

#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: Option<String>,
}

impl Authenticator for BasicCredentials {
    fn authorize(&self, request: RequestBuilder, _: &FilterRequest<'_>) -> Result<RequestBuilder> {
        Ok(request.basic_auth(&self.username, self.password.as_ref()))
    }
}

/// Signed form parameters of the stream request.
#[derive(oauth1_request::Request)]
struct TrackForm<'a> {
    track: &'a str,
}

/// OAuth 1.0a user context: every request carries an HMAC-SHA1 signed
/// `Authorization: OAuth ...` header over the URL and the `track` field.
#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl OAuth1Credentials {
    /// Header value for one request; nonce and timestamp are fresh each call.
    #[must_use]
    pub fn authorization(&self, filter: &FilterRequest<'_>) -> String {
        let token = oauth1_request::Token::from_parts(
            self.consumer_key.as_str(),
            self.consumer_secret.as_str(),
            self.access_token.as_str(),
            self.access_token_secret.as_str(),
        );
        let form = TrackForm {
            track: filter.track,
        };
        oauth1_request::post(filter.url, &form, &token, oauth1_request::HMAC_SHA1)
    }
}

impl Authenticator for OAuth1Credentials {
    fn authorize(
        &self,
        request: RequestBuilder,
        filter: &FilterRequest<'_>,
    ) -> Result<RequestBuilder> {
        Ok(request.header(AUTHORIZATION, self.authorization(filter)))
    }
}

impl AuthConfig {
    #[must_use]
    pub fn authenticator(&self) -> Box<dyn Authenticator> {
        match self {
            Self::None => Box::new(NoAuth),
            Self::Bearer { token } => Box::new(BearerToken(token.clone())),
            Self::Basic { username, password } => Box::new(BasicCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            Self::OAuth1 {
                consumer_key,
                consumer_secret,
                access_token,
                access_token_secret,
            } => Box::new(OAuth1Credentials {
                consumer_key: consumer_key.clone(),
                consumer_secret: consumer_secret.clone(),
                access_token: access_token.clone(),
                access_token_secret: access_token_secret.clone(),
            }),
        }
    }
}

pub struct HttpStreamSource {
    lines: LineSource<BufReader<Response>>,
    url: String,
}

impl HttpStreamSource {
    /// Open the stream filtered on `keywords`. Connection and status failures
    /// are [`TallyError::Source`].
    pub fn open(
        config: &SourceConfig,
        keywords: &KeywordSet,
        auth: &dyn Authenticator,
    ) -> Result<Self> {
        let url = format!(
            "{}{STREAM_FILTER_PATH}",
            config.base_url.trim_end_matches('/')
        );
        // No overall timeout: the body is an endless stream.
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(None::<Duration>)
            .build()?;
        let track = keywords.track_param();
        let filter = FilterRequest {
            url: &url,
            track: &track,
        };
        let request = auth.authorize(
            client.post(&url).form(&[(TRACK_PARAM, track.as_str())]),
            &filter,
        )?;

        let response = request.send().map_err(|err| TallyError::Source {
            reason: format!("could not open {url}: {err}"),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TallyError::Source {
                reason: format!("{url} answered {status}"),
            });
        }
        tracing::info!(source.url = %url, source.track = %track, "record stream opened");
        Ok(Self {
            lines: LineSource::new(BufReader::new(response)),
            url,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RecordSource for HttpStreamSource {
    fn next_record(&mut self) -> Result<Option<String>> {
        let next = self.lines.next_record()?;
        if next.is_none() {
            tracing::info!(
                source.url = %self.url,
                source.lines = self.lines.lines_read(),
                "record stream ended"
            );
        }
        Ok(next)
    }
}
