use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateRequest {
    /// 已编码的键前缀，如 `search:`
    pub prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub prefix: String,
    pub deleted: u64,
}
