//! HTTP store client for the hosted backend
//!
//! Row reads and writes go through the store's REST surface
//! (`/rest/v1/<resource>` with `eq.` filters). The change feed is the
//! streaming endpoint `/changes/v1/calls`, one JSON event per line; a
//! reader task decodes lines and forwards them into the subscription
//! channel.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::event::CallChange;
use shared::models::{
    Call, CallCreate, CallStatus, CallUpdate, DiningTable, DiningTableCreate, DiningTableUpdate,
    MenuItem, MenuItemCreate, MenuItemUpdate, Profile,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{CallStore, CallSubscription};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Buffered events per subscription before the reader task backpressures.
const SUBSCRIPTION_BUFFER: usize = 256;

/// HTTP client for the hosted store
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl HttpStore {
    /// Create a new store client from configuration
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            token: config.token.clone(),
        }
    }

    /// Set the account bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Base request with api key and bearer headers attached
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("apikey", &self.api_key);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
                    Err(ClientError::Validation(text))
                }
                _ => Err(ClientError::Internal(text)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    /// Writes return the affected rows; callers want the single row.
    async fn single_row<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let mut rows: Vec<T> = Self::handle_response(response).await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound("no row affected".to_string()));
        }
        Ok(rows.remove(0))
    }

    async fn patch_call(
        &self,
        account_id: Uuid,
        call_id: Uuid,
        update: &CallUpdate,
    ) -> ClientResult<Call> {
        let response = self
            .request(
                Method::PATCH,
                &format!("rest/v1/calls?id=eq.{call_id}&account_id=eq.{account_id}"),
            )
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;

        Self::single_row(response).await
    }

    // ========== Menu API (management dashboard) ==========

    /// List the account's menu items, grouped the way the menu renders
    pub async fn fetch_menu_items(&self, account_id: Uuid) -> ClientResult<Vec<MenuItem>> {
        let response = self
            .request(
                Method::GET,
                &format!("rest/v1/menu_items?account_id=eq.{account_id}&order=category.asc,name.asc"),
            )
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_menu_item(
        &self,
        account_id: Uuid,
        payload: MenuItemCreate,
    ) -> ClientResult<MenuItem> {
        #[derive(serde::Serialize)]
        struct Insert {
            account_id: Uuid,
            #[serde(flatten)]
            payload: MenuItemCreate,
        }

        let response = self
            .request(Method::POST, "rest/v1/menu_items")
            .header("Prefer", "return=representation")
            .json(&Insert {
                account_id,
                payload,
            })
            .send()
            .await?;
        Self::single_row(response).await
    }

    pub async fn update_menu_item(
        &self,
        account_id: Uuid,
        item_id: Uuid,
        update: MenuItemUpdate,
    ) -> ClientResult<MenuItem> {
        let response = self
            .request(
                Method::PATCH,
                &format!("rest/v1/menu_items?id=eq.{item_id}&account_id=eq.{account_id}"),
            )
            .header("Prefer", "return=representation")
            .json(&update)
            .send()
            .await?;
        Self::single_row(response).await
    }

    pub async fn delete_menu_item(&self, account_id: Uuid, item_id: Uuid) -> ClientResult<()> {
        let response = self
            .request(
                Method::DELETE,
                &format!("rest/v1/menu_items?id=eq.{item_id}&account_id=eq.{account_id}"),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(ClientError::Internal(text));
        }
        Ok(())
    }

    // ========== Table API ==========

    pub async fn fetch_tables(&self, account_id: Uuid) -> ClientResult<Vec<DiningTable>> {
        let response = self
            .request(
                Method::GET,
                &format!("rest/v1/tables?account_id=eq.{account_id}&order=table_number.asc"),
            )
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_table(
        &self,
        account_id: Uuid,
        payload: DiningTableCreate,
    ) -> ClientResult<DiningTable> {
        #[derive(serde::Serialize)]
        struct Insert {
            account_id: Uuid,
            #[serde(flatten)]
            payload: DiningTableCreate,
        }

        let response = self
            .request(Method::POST, "rest/v1/tables")
            .header("Prefer", "return=representation")
            .json(&Insert {
                account_id,
                payload,
            })
            .send()
            .await?;
        Self::single_row(response).await
    }

    pub async fn update_table(
        &self,
        account_id: Uuid,
        table_id: Uuid,
        update: DiningTableUpdate,
    ) -> ClientResult<DiningTable> {
        let response = self
            .request(
                Method::PATCH,
                &format!("rest/v1/tables?id=eq.{table_id}&account_id=eq.{account_id}"),
            )
            .header("Prefer", "return=representation")
            .json(&update)
            .send()
            .await?;
        Self::single_row(response).await
    }

    // ========== Profile API ==========

    pub async fn fetch_profile(&self, account_id: Uuid) -> ClientResult<Profile> {
        let response = self
            .request(Method::GET, &format!("rest/v1/profiles?id=eq.{account_id}"))
            .send()
            .await?;
        Self::single_row(response).await
    }
}

#[async_trait]
impl CallStore for HttpStore {
    async fn fetch_calls(&self, account_id: Uuid) -> ClientResult<Vec<Call>> {
        let response = self
            .request(
                Method::GET,
                &format!("rest/v1/calls?account_id=eq.{account_id}&order=created_at.desc"),
            )
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn subscribe_calls(&self, account_id: Uuid) -> ClientResult<CallSubscription> {
        let response = self
            .request(
                Method::GET,
                &format!("changes/v1/calls?account_id=eq.{account_id}"),
            )
            .header("Accept", "application/x-ndjson")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Stream(format!("subscribe failed ({status}): {text}")));
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let closer = CancellationToken::new();
        let guard = closer.clone();
        let mut stream = response.bytes_stream();

        // 流读取任务：按行解码并转发，流结束即订阅结束
        tokio::spawn(async move {
            let mut buf: Vec<u8> = Vec::new();

            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,

                    chunk = stream.next() => match chunk {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);

                            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                                let line: Vec<u8> = buf.drain(..=pos).collect();
                                let mut line = &line[..line.len() - 1];
                                if line.last() == Some(&b'\r') {
                                    line = &line[..line.len() - 1];
                                }
                                // Blank lines are keep-alives
                                if line.is_empty() {
                                    continue;
                                }

                                match serde_json::from_slice::<CallChange>(line) {
                                    Ok(change) => {
                                        if tx.send(change).await.is_err() {
                                            return;
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!("Skipping malformed change event: {e}");
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(account = %account_id, "Change stream error: {e}");
                            break;
                        }
                        None => {
                            tracing::debug!(account = %account_id, "Change stream ended");
                            break;
                        }
                    }
                }
            }
        });

        Ok(CallSubscription::new(rx, closer))
    }

    async fn create_call(&self, account_id: Uuid, payload: CallCreate) -> ClientResult<Call> {
        #[derive(serde::Serialize)]
        struct Insert {
            account_id: Uuid,
            status: CallStatus,
            #[serde(flatten)]
            payload: CallCreate,
        }

        let response = self
            .request(Method::POST, "rest/v1/calls")
            .header("Prefer", "return=representation")
            .json(&Insert {
                account_id,
                status: CallStatus::Pending,
                payload,
            })
            .send()
            .await?;
        Self::single_row(response).await
    }

    async fn mark_attended(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.patch_call(
            account_id,
            call_id,
            &CallUpdate {
                status: Some(CallStatus::Attended),
                attended_at: Some(Utc::now()),
                notes: None,
            },
        )
        .await
    }

    async fn cancel_call(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.patch_call(
            account_id,
            call_id,
            &CallUpdate {
                status: Some(CallStatus::Cancelled),
                attended_at: None,
                notes: None,
            },
        )
        .await
    }
}
