use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for issuing feed requests; wrappers can add headers or retries.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
