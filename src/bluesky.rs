use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::timeline::{Author, Item, LikeRef, Page, ViewerState};

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const LIKE_COLLECTION: &str = "app.bsky.feed.like";
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("session expired")]
    ExpiredToken,
    #[error("bluesky: {status} {error}: {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },
    #[error("bluesky: decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("bluesky: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub service_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Tokens for one logged-in account, as returned by `createSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = if config.service_url.trim().is_empty() {
            DEFAULT_SERVICE_URL.to_string()
        } else {
            config.service_url.trim().to_string()
        };
        let mut base_url = Url::parse(&base)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        let user_agent = if config.user_agent.trim().is_empty() {
            format!("bsky-tui/{}", crate::VERSION)
        } else {
            config.user_agent
        };

        Ok(Client {
            http,
            user_agent,
            base_url,
        })
    }

    pub fn service_url(&self) -> &Url {
        &self.base_url
    }

    pub fn create_session(&self, identifier: &str, password: &str) -> Result<Session, ApiError> {
        let body = json!({ "identifier": identifier, "password": password });
        let req = self
            .http
            .post(self.xrpc_url("com.atproto.server.createSession")?)
            .json(&body);
        let resp = self.send(req).map_err(|err| match err {
            ApiError::Api { message, .. } => ApiError::Auth(message),
            other => other,
        })?;
        decode(resp, "session")
    }

    pub fn refresh_session(&self, session: &Session) -> Result<Session, ApiError> {
        let req = self
            .http
            .post(self.xrpc_url("com.atproto.server.refreshSession")?)
            .header(AUTHORIZATION, format!("Bearer {}", session.refresh_jwt));
        let resp = self.send(req).map_err(|err| match err {
            ApiError::ExpiredToken => ApiError::Auth("refresh token expired".into()),
            other => other,
        })?;
        decode(resp, "refreshed session")
    }

    pub fn timeline(&self, session: &Session, cursor: Option<&str>, limit: u32) -> Result<Page, ApiError> {
        let mut url = self.xrpc_url("app.bsky.feed.getTimeline")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
        }
        let resp = self.send(self.authorized(self.http.get(url), session))?;
        let timeline: TimelineResponse = decode(resp, "timeline")?;
        Ok(timeline.into_page())
    }

    pub fn like(&self, session: &Session, uri: &str, cid: &str) -> Result<LikeRef, ApiError> {
        let record = json!({
            "$type": LIKE_COLLECTION,
            "subject": { "uri": uri, "cid": cid },
            "createdAt": now_timestamp(),
        });
        let created = self.create_record(session, LIKE_COLLECTION, record)?;
        Ok(created.uri)
    }

    pub fn unlike(&self, session: &Session, like_ref: &str) -> Result<(), ApiError> {
        let rkey = record_key(like_ref, LIKE_COLLECTION)
            .ok_or_else(|| ApiError::Invalid(format!("not a like record: {like_ref}")))?;
        let body = json!({
            "repo": session.did,
            "collection": LIKE_COLLECTION,
            "rkey": rkey,
        });
        let req = self
            .http
            .post(self.xrpc_url("com.atproto.repo.deleteRecord")?)
            .json(&body);
        self.send(self.authorized(req, session))?;
        Ok(())
    }

    pub fn create_post(&self, session: &Session, text: &str) -> Result<String, ApiError> {
        let record = json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": now_timestamp(),
        });
        let created = self.create_record(session, POST_COLLECTION, record)?;
        Ok(created.uri)
    }

    fn create_record(&self, session: &Session, collection: &str, record: Value) -> Result<CreatedRecord, ApiError> {
        let body = json!({
            "repo": session.did,
            "collection": collection,
            "record": record,
        });
        let req = self
            .http
            .post(self.xrpc_url("com.atproto.repo.createRecord")?)
            .json(&body);
        let resp = self.send(self.authorized(req, session))?;
        decode(resp, "created record")
    }

    fn xrpc_url(&self, method: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(&format!("xrpc/{method}"))
            .map_err(|err| ApiError::Invalid(format!("service url: {err}")))
    }

    fn authorized(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bearer {}", session.access_jwt))
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.header(USER_AGENT, self.user_agent.clone()).send()?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        Err(classify_error(status, &body))
    }
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

fn classify_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or(XrpcErrorBody {
        error: String::new(),
        message: body.trim().to_string(),
    });
    if parsed.error == "ExpiredToken" {
        return ApiError::ExpiredToken;
    }
    if status == StatusCode::UNAUTHORIZED {
        let message = if parsed.message.is_empty() {
            "unauthorized".to_string()
        } else {
            parsed.message
        };
        return ApiError::Auth(message);
    }
    ApiError::Api {
        status: status.as_u16(),
        error: parsed.error,
        message: parsed.message,
    }
}

fn decode<T: DeserializeOwned>(resp: Response, context: &'static str) -> Result<T, ApiError> {
    let bytes = resp.bytes()?;
    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { context, source })
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extracts the record key from `at://<repo>/<collection>/<rkey>`.
pub fn record_key<'a>(at_uri: &'a str, collection: &str) -> Option<&'a str> {
    let rest = at_uri.strip_prefix("at://")?;
    let mut parts = rest.splitn(3, '/');
    let _repo = parts.next().filter(|repo| !repo.is_empty())?;
    if parts.next()? != collection {
        return None;
    }
    parts.next().filter(|rkey| !rkey.is_empty() && !rkey.contains('/'))
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    feed: Vec<FeedViewPost>,
}

impl TimelineResponse {
    fn into_page(self) -> Page {
        Page {
            items: self.feed.into_iter().map(|entry| entry.post.into_item()).collect(),
            cursor: self.cursor.filter(|cursor| !cursor.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    cid: String,
    author: ProfileView,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    repost_count: Option<u64>,
    #[serde(default)]
    reply_count: Option<u64>,
    #[serde(default)]
    indexed_at: String,
    #[serde(default)]
    viewer: Option<ViewerView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    did: String,
    handle: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ViewerView {
    #[serde(default)]
    like: Option<String>,
    #[serde(default)]
    repost: Option<String>,
}

impl PostView {
    fn into_item(self) -> Item {
        let text = self
            .record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let created_at = self
            .record
            .get("createdAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let viewer = self.viewer.unwrap_or_default();

        Item {
            uri: self.uri,
            cid: self.cid,
            author: Author {
                did: self.author.did,
                handle: self.author.handle,
                display_name: self.author.display_name.filter(|name| !name.trim().is_empty()),
                avatar: self.author.avatar,
            },
            text,
            created_at,
            indexed_at: self.indexed_at,
            like_count: self.like_count.unwrap_or(0),
            repost_count: self.repost_count.unwrap_or(0),
            reply_count: self.reply_count.unwrap_or(0),
            viewer: ViewerState {
                like: viewer.like,
                repost: viewer.repost,
            },
        }
    }
}
