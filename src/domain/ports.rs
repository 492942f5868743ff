use crate::domain::model::{LookupResult, Module};
use crate::domain::phone::PhoneNumber;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 單一外部資料來源。每個實作只服務一個 [`Module`]。
///
/// `lookup` 失敗時只會回傳 `Timeout`、`AuthError`、`RateLimited`、
/// `SourceUnavailable` 或 `MalformedResponse`。
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn id(&self) -> &str;

    fn module(&self) -> Module;

    async fn lookup(&self, number: &PhoneNumber, timeout: Duration) -> Result<LookupResult>;
}
