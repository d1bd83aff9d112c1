//! HTTP 传输层
//!
//! 所有远程调用都经过 [`Transport::request`]，这是 SDK 与服务器之间唯一的边界。

use crate::sdk::error::{Result, SdkError};
use crate::sdk::types::extract_payload;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// multipart 表单字段（文件上传）
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

/// 请求体
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    None,
    /// JSON 编码
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data`
    Multipart(Vec<MultipartField>),
}

/// 一次 API 请求
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// 相对路径，例如 `messages_history.php`
    pub path: String,
    pub method: Method,
    /// 查询参数，由 reqwest 编码
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Bearer token
    pub token: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            query: Vec::new(),
            body: RequestBody::None,
            token: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            query: Vec::new(),
            body: RequestBody::None,
            token: None,
        }
    }

    /// 追加查询参数
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// 读取查询参数
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// 端点名，用于日志和测试路由
    pub fn endpoint(&self) -> &str {
        &self.path
    }
}

/// 远程 API 传输接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送请求，成功时返回 payload 的 `data` 字段（缺失时返回整个 payload）
    async fn request(&self, req: ApiRequest) -> Result<Value>;
}

/// 基于 reqwest 的 HTTP 传输实现
pub struct HttpTransport {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpTransport {
    pub fn new(api_base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::ClientBuilder::new().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SdkError::Network(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 使用外部构建好的 reqwest 客户端
    pub fn with_client(client: reqwest::Client, api_base_url: &str) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    fn build_multipart(fields: Vec<MultipartField>) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for field in fields {
            form = match field {
                MultipartField::Text { name, value } => form.text(name, value),
                MultipartField::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str(&mime)
                        .map_err(|e| SdkError::validation(format!("无效的文件类型 {}: {}", mime, e)))?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, req: ApiRequest) -> Result<Value> {
        let operation_id = Uuid::new_v4().to_string();
        let url = self.url_for(&req.path);
        let endpoint = req.endpoint().to_string();

        debug!(
            "[HTTP] 📡 {:?} {}，操作ID: {}",
            req.method, url, operation_id
        );

        let mut builder = match req.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        builder = builder.header("operationID", &operation_id);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = req.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder = match req.body {
            RequestBody::None => builder,
            RequestBody::Json(body) => builder
                .header("Content-Type", "application/json")
                .json(&body),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_multipart(fields)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| SdkError::Network(format!("请求失败: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SdkError::Network(format!("读取响应 body 失败: {}", e)))?;
        debug!("[HTTP] {} 响应，HTTP状态: {}, {} 字节", endpoint, status, body.len());

        extract_payload(status, &body, &endpoint)
    }
}
