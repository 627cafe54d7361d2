/// 实体存储 API 客户端
///
/// 封装所有与远端实体存储服务的交互：CRUD、列表查询、版本令牌回传
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{
    EntityData, EntityId, EntityRecord, EntitySummary, ListFilter, VersionToken,
};

/// 传输层错误
#[derive(Debug, Error)]
pub enum StoreApiError {
    /// 网络请求失败
    #[error("存储请求失败 ({endpoint}): {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 响应体不是合法 JSON
    #[error("存储响应解析失败 ({endpoint}): {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// 存储服务响应信封
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: u64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// 实体存储 API 客户端
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: usize,
}

impl StoreClient {
    /// 创建新的存储客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.store_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.store_api_base_url.clone(),
            token: config.store_token.clone(),
            max_retries: config.store_max_retries,
        })
    }

    /// 发送 API 请求（带频率限制重试逻辑）
    ///
    /// # 参数
    /// - `endpoint`: 相对路径，如 `entity/create`
    /// - `body`: 请求体 JSON
    ///
    /// # 返回
    /// 返回信封中的 data 字段
    async fn post_api(&self, endpoint: &str, body: &Value) -> AppResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);

        for retry_count in 0..self.max_retries.max(1) {
            let response = self
                .http
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Accept", "application/json, text/plain, */*")
                .header("examtoken", &self.token)
                .json(body)
                .send()
                .await
                .map_err(|e| store_api_error(StoreApiError::Request {
                    endpoint: endpoint.to_string(),
                    source: e,
                }))?;

            let envelope: ApiEnvelope = response.json().await.map_err(|e| {
                store_api_error(StoreApiError::Decode {
                    endpoint: endpoint.to_string(),
                    source: e,
                })
            })?;

            // 频率限制：等待后重试
            if Self::is_rate_limited(&envelope) {
                warn!(
                    "存储请求频率限制 ({}) (尝试 {}/{}), 等待2秒后重试...",
                    endpoint,
                    retry_count + 1,
                    self.max_retries
                );
                sleep(Duration::from_secs(2)).await;
                continue;
            }

            return Self::unpack(endpoint, envelope);
        }

        Err(AppError::Store(StoreError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after: Some(2),
        }))
    }

    /// 检查是否是频率限制错误
    fn is_rate_limited(envelope: &ApiEnvelope) -> bool {
        if envelope.code == 600 {
            if let Some(msg) = &envelope.message {
                return msg.contains("请求过于频繁");
            }
        }
        false
    }

    /// 将信封转换为 data 或领域错误
    fn unpack(endpoint: &str, envelope: ApiEnvelope) -> AppResult<Value> {
        match envelope.code {
            200 => Ok(envelope.data),
            404 => {
                let id = envelope
                    .data
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Err(AppError::store_not_found(id))
            }
            409 => {
                let id = envelope
                    .data
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let supplied = envelope
                    .data
                    .get("supplied")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default();
                let current = envelope
                    .data
                    .get("current")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default();
                Err(AppError::stale_version(id, supplied, current))
            }
            code => Err(AppError::Store(StoreError::BadResponse {
                endpoint: endpoint.to_string(),
                code: Some(code),
                message: envelope.message,
            })),
        }
    }
}

fn store_api_error(err: StoreApiError) -> AppError {
    let endpoint = match &err {
        StoreApiError::Request { endpoint, .. } => endpoint.clone(),
        StoreApiError::Decode { endpoint, .. } => endpoint.clone(),
    };
    AppError::Store(StoreError::RequestFailed {
        endpoint,
        source: Box::new(err),
    })
}

impl EntityStore for StoreClient {
    async fn create(&self, data: EntityData) -> AppResult<EntityRecord> {
        let body = json!({ "data": data });
        debug!("创建实体: {}", data_kind_label(&body));

        let data = self.post_api("entity/create", &body).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn get(&self, id: &EntityId) -> AppResult<EntityRecord> {
        let body = json!({ "id": id });
        let data = self.post_api("entity/get", &body).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn update(
        &self,
        id: &EntityId,
        data: EntityData,
        version: VersionToken,
    ) -> AppResult<EntityRecord> {
        let body = json!({ "id": id, "data": data, "version": version });
        debug!("更新实体: {} (版本 {})", id, version.0);

        let data = self.post_api("entity/update", &body).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn delete(&self, id: &EntityId) -> AppResult<()> {
        let body = json!({ "id": id });
        debug!("删除实体: {}", id);

        self.post_api("entity/delete", &body).await?;
        Ok(())
    }

    async fn list(
        &self,
        parent_id: Option<&EntityId>,
        filter: &ListFilter,
    ) -> AppResult<Vec<EntitySummary>> {
        let body = json!({
            "parentId": parent_id,
            "filter": {
                "kind": filter.entity_kind,
                "titleContains": filter.title_contains,
            }
        });

        let data = self.post_api("entity/list", &body).await?;
        Ok(serde_json::from_value(data)?)
    }
}

fn data_kind_label(body: &Value) -> &str {
    body.get("data")
        .and_then(|d| d.get("kind"))
        .and_then(|k| k.as_str())
        .unwrap_or("unknown")
}
