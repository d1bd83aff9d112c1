use crate::sdk::error::{Result, SdkError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// 未设置头像时使用的默认头像
pub const DEFAULT_AVATAR: &str = "/public/assets/default.webp";

/// 通用响应处理：解析响应 body 并取出业务数据
///
/// - body 不是 JSON：网络错误（信息本地生成）
/// - HTTP 非 2xx 或 `ok: false`：服务器错误，信息依次取 `error`、`message`，都没有时为 `HTTP <状态码>`
/// - 成功：返回 `data` 字段；`data` 缺失或为 null 时返回整个 payload
pub fn extract_payload(status: u16, body: &[u8], operation_name: &str) -> Result<Value> {
    let payload: Value = serde_json::from_slice(body).map_err(|e| {
        error!(
            "[HTTP] {}响应不是有效 JSON: {:?}，原始响应: {}",
            operation_name,
            e,
            String::from_utf8_lossy(body)
        );
        SdkError::Network(format!("服务器响应无效 (HTTP {})", status))
    })?;

    let success = (200..300).contains(&status);
    let ok_flag = payload.get("ok").and_then(Value::as_bool);
    if !success || ok_flag == Some(false) {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| payload.get("message").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        error!(
            "[HTTP] {}服务器错误，HTTP状态: {}, 错误信息: {}",
            operation_name, status, message
        );
        return Err(SdkError::api(status, message));
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    match payload {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => Ok(data),
            _ => Ok(Value::Object(map)),
        },
        other => Ok(other),
    }
}

/// 把已取出的业务数据反序列化为具体类型
pub fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SdkError::Decode(format!("{}: {}", what, e)))
}

/// 反序列化数组字段，处理 null 值
pub(crate) fn deserialize_vec_or_null<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// ID 反序列化：服务器有时返回数字，有时返回数字字符串
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("无效的 ID: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("无效的 ID: {}", s))),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!("无效的 ID: {}", other))),
    }
}

/// 宽松的计数 / 布尔反序列化：接受 数字、数字字符串、布尔、null
pub(crate) fn deserialize_lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(b),
        _ => 0,
    })
}

pub(crate) fn deserialize_lenient_bool<'de, D>(
    deserializer: D,
) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

/// 当前登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// 下一次允许修改姓名的时间
    #[serde(default)]
    pub can_change_name_at: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

impl User {
    /// 展示名称：优先姓名，其次用户名
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }
}
