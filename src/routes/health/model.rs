use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// 存储是否可达："up" / "down"
    pub store: String,
    pub rate_limiting: bool,
}
