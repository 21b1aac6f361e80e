//! Client configuration

/// Hosted-store connection settings
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | COMANDA_STORE_URL | http://localhost:54321 | 远程 store 地址 |
/// | COMANDA_API_KEY | (empty) | store API key |
/// | COMANDA_TOKEN | (none) | Bearer token (已登录账户) |
/// | COMANDA_TIMEOUT_SECS | 30 | 请求超时(秒) |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the hosted store
    pub base_url: String,
    /// Project API key, sent on every request
    pub api_key: String,
    /// Bearer token of the signed-in account, if any
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            token: None,
            timeout_secs: 30,
        }
    }

    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("COMANDA_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:54321".into()),
            api_key: std::env::var("COMANDA_API_KEY").unwrap_or_default(),
            token: std::env::var("COMANDA_TOKEN").ok(),
            timeout_secs: std::env::var("COMANDA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Set the account bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
