//! reqwest-backed implementation of [`ChatApi`].

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{
    FileAttachment, FileUpload, LoginResponse, Mention, Message, MessageId, ModAction,
    ModLogEntry, Registration, Reply, RoomSummary, UnreadCounts,
};
use super::ChatApi;
use crate::config::{AuthScheme, ClientConfig, Flavor, ServerConfig};
use crate::error::{ChatError, Result};
use crate::session::RoomCode;

// --- request bodies ---------------------------------------------------------

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RoomBody<'a> {
    room: &'a str,
}

#[derive(Serialize)]
struct JoinBody<'a> {
    room: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize)]
struct RoomUserBody<'a> {
    room: &'a str,
    user: &'a str,
}

#[derive(Serialize)]
struct SendBody<'a> {
    room: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a FileAttachment>,
}

#[derive(Serialize)]
struct LegacySendBody<'a> {
    room: &'a str,
    sender: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct TypingBody<'a> {
    room: &'a str,
    user: &'a str,
    typing: bool,
}

#[derive(Serialize)]
struct CreateRoomBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize)]
struct MessageRef<'a> {
    message_id: &'a MessageId,
}

#[derive(Serialize)]
struct ThreadRef<'a> {
    room: &'a str,
    id: &'a MessageId,
}

#[derive(Serialize)]
struct ThreadReply<'a> {
    room: &'a str,
    id: &'a MessageId,
    text: &'a str,
}

#[derive(Serialize)]
struct DirectBody<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct EmptyBody {}

/// Error envelope the backend uses for non-2xx replies: `{"error": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

// --- client -----------------------------------------------------------------

/// HTTP/JSON client for the chat backend.
pub struct HttpChatApi {
    base_url: String,
    flavor: Flavor,
    auth_scheme: AuthScheme,
    client: Client,
}

impl HttpChatApi {
    /// Build a client for `base_url` using the server section's flavor,
    /// auth scheme and timeouts.
    pub fn new(base_url: impl Into<String>, server: &ServerConfig) -> Self {
        // Client::builder() can fail in extreme environments; fall back to a
        // default client instead of panicking.
        let client = Client::builder()
            .connect_timeout(server.connect_timeout())
            .timeout(server.request_timeout())
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            flavor: server.flavor,
            auth_scheme: server.auth_scheme,
            client,
        }
    }

    /// Pick the base URL from the hostname switch in `config`.
    pub fn from_config(config: &ClientConfig, hostname: &str) -> Self {
        Self::new(config.base_url_for_host(hostname), &config.server)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ChatError::Config(format!("invalid base url '{}': {e}", self.base_url)))
    }

    /// `path` plus one percent-encoded segment, e.g. `/get_dm/{user}`.
    fn endpoint_with(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| {
                ChatError::Config(format!("base url '{}' cannot carry a path", self.base_url))
            })?
            .push(segment);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder, auth: Option<&str>) -> RequestBuilder {
        match (auth, self.auth_scheme) {
            (Some(token), AuthScheme::Raw) => req.header(AUTHORIZATION, token),
            (Some(token), AuthScheme::Bearer) => req.bearer_auth(token),
            (None, _) => req,
        }
    }

    /// Send and map failures: transport → `Connect`, non-2xx → `Http` with
    /// the server's `error` text when the body carries one.
    async fn send(&self, req: RequestBuilder, url: &Url) -> Result<Response> {
        let resp = req.send().await.map_err(|e| ChatError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        debug!(status = status.as_u16(), url = %url, ?message, "request rejected");

        Err(ChatError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: Response, field: &str) -> Result<T> {
        let bytes = resp.bytes().await.map_err(|e| ChatError::Json {
            field: field.to_string(),
            detail: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ChatError::Json {
            field: field.to_string(),
            detail: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        auth: Option<&str>,
        field: &str,
    ) -> Result<T> {
        let req = self.authorize(self.client.get(url.clone()), auth);
        let resp = self.send(req, &url).await?;
        Self::decode(resp, field).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Option<&str>,
        body: &B,
        field: &str,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let req = self.authorize(self.client.post(url.clone()).json(body), auth);
        let resp = self.send(req, &url).await?;
        Self::decode(resp, field).await
    }

    /// POST where only the status matters; the reply body is ignored.
    async fn post<B: Serialize>(&self, path: &str, auth: Option<&str>, body: &B) -> Result<()> {
        let url = self.endpoint(path)?;
        let req = self.authorize(self.client.post(url.clone()).json(body), auth);
        self.send(req, &url).await.map(|_| ())
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.post_json("/login", None, &Credentials { username, password }, "login")
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        self.post("/register", None, registration).await
    }

    async fn heartbeat(&self, auth: Option<&str>) -> Result<()> {
        let url = self.endpoint("/heartbeat")?;
        let req = self.authorize(self.client.post(url.clone()), auth);
        self.send(req, &url).await.map(|_| ())
    }

    async fn join_room(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        user: &str,
        password: Option<&str>,
    ) -> Result<()> {
        match self.flavor {
            Flavor::Token => {
                let body = JoinBody {
                    room: room.as_str(),
                    user: None,
                    password,
                };
                self.post("/join_room", auth, &body).await
            }
            Flavor::Legacy => {
                let body = JoinBody {
                    room: room.as_str(),
                    user: Some(user),
                    password,
                };
                self.post("/join", auth, &body).await
            }
        }
    }

    async fn leave_room(&self, auth: Option<&str>, room: &RoomCode, user: &str) -> Result<()> {
        let body = RoomUserBody {
            room: room.as_str(),
            user,
        };
        self.post("/leave", auth, &body).await
    }

    async fn list_rooms(&self, auth: Option<&str>) -> Result<Vec<RoomSummary>> {
        self.get_json(self.endpoint("/rooms")?, auth, "rooms").await
    }

    async fn create_room(
        &self,
        auth: Option<&str>,
        name: &str,
        password: Option<&str>,
    ) -> Result<()> {
        self.post("/create_room", auth, &CreateRoomBody { name, password })
            .await
    }

    async fn clear_room(&self, auth: Option<&str>, room: &RoomCode) -> Result<()> {
        let url = self.endpoint_with("/clear", room.as_str())?;
        let req = self.authorize(self.client.delete(url.clone()), auth);
        self.send(req, &url).await.map(|_| ())
    }

    async fn fetch_messages(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>> {
        let url = self.endpoint_with("/get", room.as_str())?;
        self.get_json(url, auth, "messages").await
    }

    async fn send_message(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        sender: &str,
        text: &str,
        file: Option<&FileAttachment>,
    ) -> Result<()> {
        match self.flavor {
            Flavor::Token => {
                let body = SendBody {
                    room: room.as_str(),
                    text,
                    file,
                };
                self.post("/send_message", auth, &body).await
            }
            Flavor::Legacy => {
                let body = LegacySendBody {
                    room: room.as_str(),
                    sender,
                    text,
                };
                self.post("/send", auth, &body).await
            }
        }
    }

    async fn pinned_messages(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<Message>> {
        let url = self.endpoint_with("/get_pins", room.as_str())?;
        self.get_json(url, auth, "pins").await
    }

    async fn replies(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        id: &MessageId,
    ) -> Result<Vec<Reply>> {
        let body = ThreadRef {
            room: room.as_str(),
            id,
        };
        self.post_json("/get_replies", auth, &body, "replies").await
    }

    async fn reply(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        id: &MessageId,
        text: &str,
    ) -> Result<()> {
        let body = ThreadReply {
            room: room.as_str(),
            id,
            text,
        };
        self.post("/reply_message", auth, &body).await
    }

    async fn mark_room_read(&self, auth: Option<&str>, room: &RoomCode) -> Result<()> {
        self.post("/mark_read", auth, &RoomBody { room: room.as_str() })
            .await
    }

    async fn mark_message_read(&self, auth: Option<&str>, id: &MessageId) -> Result<()> {
        self.post("/mark_message_read", auth, &MessageRef { message_id: id })
            .await
    }

    async fn unread_counts(&self, auth: Option<&str>) -> Result<UnreadCounts> {
        self.post_json("/get_unread_count", auth, &EmptyBody {}, "unread_counts")
            .await
    }

    async fn mentions(&self, auth: Option<&str>) -> Result<Vec<Mention>> {
        self.post_json("/get_mentions", auth, &EmptyBody {}, "mentions")
            .await
    }

    async fn upload_file(&self, auth: Option<&str>, upload: FileUpload) -> Result<FileAttachment> {
        let url = self.endpoint("/upload_file")?;
        let part = reqwest::multipart::Part::bytes(upload.bytes).file_name(upload.filename);
        let form = reqwest::multipart::Form::new().part("file", part);
        let req = self.authorize(self.client.post(url.clone()).multipart(form), auth);
        let resp = self.send(req, &url).await?;
        Self::decode(resp, "file").await
    }

    async fn room_users(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<String>> {
        let url = self.endpoint_with("/users", room.as_str())?;
        self.get_json(url, auth, "users").await
    }

    async fn online_users(&self, auth: Option<&str>) -> Result<Vec<String>> {
        self.get_json(self.endpoint("/online_users")?, auth, "online_users")
            .await
    }

    async fn set_typing(
        &self,
        auth: Option<&str>,
        room: &RoomCode,
        user: &str,
        typing: bool,
    ) -> Result<()> {
        let body = TypingBody {
            room: room.as_str(),
            user,
            typing,
        };
        self.post("/typing", auth, &body).await
    }

    async fn direct_messages(&self, auth: Option<&str>, peer: &str) -> Result<Vec<Message>> {
        let url = self.endpoint_with("/get_dm", peer)?;
        self.get_json(url, auth, "direct_messages").await
    }

    async fn send_direct(&self, auth: Option<&str>, peer: &str, text: &str) -> Result<()> {
        self.post("/send_dm", auth, &DirectBody { to: peer, text })
            .await
    }

    async fn moderate(
        &self,
        auth: Option<&str>,
        action: ModAction,
        room: &RoomCode,
        user: &str,
    ) -> Result<()> {
        let path = format!("/{}", action.endpoint());
        let body = RoomUserBody {
            room: room.as_str(),
            user,
        };
        self.post(&path, auth, &body).await
    }

    async fn mod_logs(&self, auth: Option<&str>, room: &RoomCode) -> Result<Vec<ModLogEntry>> {
        self.post_json("/get_mod_logs", auth, &RoomBody { room: room.as_str() }, "mod_logs")
            .await
    }
}
