//! 测试辅助：按端点编排响应的内存传输实现

use crate::sdk::error::{Result, SdkError};
use crate::sdk::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

type Responder = Arc<dyn Fn(&ApiRequest) -> Result<Value> + Send + Sync>;

/// 端点 → 响应函数；记录所有请求
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册端点（不含查询串）的响应函数，后注册的覆盖先注册的
    pub fn on<F>(&self, endpoint: &str, responder: F)
    where
        F: Fn(&ApiRequest) -> Result<Value> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Arc::new(responder));
    }

    /// 固定返回成功数据
    pub fn ok(&self, endpoint: &str, value: Value) {
        self.on(endpoint, move |_| Ok(value.clone()));
    }

    /// 固定返回服务器错误
    pub fn fail(&self, endpoint: &str, status: u16, message: &str) {
        let message = message.to_string();
        self.on(endpoint, move |_| Err(SdkError::api(status, message.clone())));
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint() == endpoint)
            .collect()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.calls_to(endpoint).len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, req: ApiRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(req.clone());
        let responder = self.routes.lock().unwrap().get(req.endpoint()).cloned();
        match responder {
            Some(responder) => responder(&req),
            None => Err(SdkError::api(404, format!("未注册的端点: {}", req.endpoint()))),
        }
    }
}

/// 取出请求的查询参数
pub fn query_param(req: &ApiRequest, key: &str) -> Option<String> {
    req.query_value(key).map(str::to_string)
}

static INIT_LOGGER: Once = Once::new();

pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        let filter_layer = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,cyberx_sdk_core=debug"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}
