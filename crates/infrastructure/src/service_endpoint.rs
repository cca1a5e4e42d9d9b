use std::collections::BTreeMap;

use helmsman_core::{HelmsmanError, Result};
use tracing::debug;

/// 服务端点HTTP客户端
///
/// 服务绑定时 GET 实例端点，期望一个扁平的 JSON 字符串映射
/// （变量名 -> 值）。非2xx和畸形响应体都是绑定失败。
#[derive(Debug, Clone, Default)]
pub struct ServiceEndpointClient {
    client: reqwest::Client,
}

impl ServiceEndpointClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch_env(&self, url: &str) -> Result<BTreeMap<String, String>> {
        debug!("调用服务端点: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HelmsmanError::Endpoint(format!("request {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HelmsmanError::Endpoint(format!(
                "unexpected status {status} from {url}"
            )));
        }
        response
            .json::<BTreeMap<String, String>>()
            .await
            .map_err(|e| HelmsmanError::Endpoint(format!("malformed body from {url}: {e}")))
    }
}
