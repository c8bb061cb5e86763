//! Mock explorer API built on mockito.
//!
//! Every mock requires the `_t` cache-busting parameter, so a request without it falls
//! through to mockito's default 501 response.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Consolidated source path.
pub const CONSOLIDATED: &str = "/api/consolidated-data";
pub const BLOCKCHAIN: &str = "/api/blockchain-info";
pub const MEMPOOL: &str = "/api/mempool/size";
pub const MINING: &str = "/api/mining-info";
pub const STAKING: &str = "/api/real-staking-data";
pub const SIDECHAINS: &str = "/api/verus-pbaas";

/// Every individual source path, in request order.
pub const INDIVIDUAL: [&str; 5] = [BLOCKCHAIN, MEMPOOL, MINING, STAKING, SIDECHAINS];

/// A mockito server answering explorer envelopes.
pub struct ExplorerMock {
    server: ServerGuard,
}

impl ExplorerMock {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    fn base(&mut self, path: &str) -> Mock {
        self.server
            .mock("GET", path)
            .match_query(Matcher::Regex(r"^_t=\d+$".to_string()))
    }

    /// Answers `{ success: true, data }` on `path`, expecting exactly `hits` requests.
    pub async fn ok(&mut self, path: &str, data: Value, hits: usize) -> Mock {
        self.base(path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "success": true, "data": data }).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    /// Answers `{ success: false, error }` on `path`.
    pub async fn rejected(&mut self, path: &str, hits: usize) -> Mock {
        self.base(path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "success": false, "error": "daemon unavailable" }).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    /// Answers a bare HTTP `status` on `path`.
    pub async fn status(&mut self, path: &str, status: usize, hits: usize) -> Mock {
        self.base(path).with_status(status).expect(hits).create_async().await
    }
}
