// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Chain Height Source

//! Where the current burn-chain height comes from, plus the small blocking
//! JSON client every upstream integration shares.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

pub trait ChainHeightSource {
    fn current_height(&self) -> EngineResult<u64>;
}

/// A height known in advance: offline runs, the browser build and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeight(pub u64);

impl ChainHeightSource for FixedHeight {
    fn current_height(&self) -> EngineResult<u64> {
        Ok(self.0)
    }
}

impl<S: ChainHeightSource + ?Sized> ChainHeightSource for &S {
    fn current_height(&self) -> EngineResult<u64> {
        (**self).current_height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl HttpTimeouts {
    pub fn from_secs(connect: u64, read: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect),
            read: Duration::from_secs(read),
        }
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self::from_secs(10, 30)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{HiroClient, JsonHttp};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use log::debug;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Serialize};

    use super::{ChainHeightSource, HttpTimeouts};
    use crate::error::{EngineError, EngineResult};

    /// Blocking JSON-over-HTTP client bound to one base URL.
    #[derive(Clone)]
    pub struct JsonHttp {
        base_url: String,
        agent: ureq::Agent,
    }

    impl JsonHttp {
        pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout_connect(timeouts.connect)
                .timeout_read(timeouts.read)
                .build();
            Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                agent,
            }
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }

        pub fn get<T: DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
            self.get_optional(path)?
                .ok_or_else(|| EngineError::upstream_status(self.url(path), 404))
        }

        /// Like [`get`](Self::get), but a 404 is `Ok(None)`.
        pub fn get_optional<T: DeserializeOwned>(&self, path: &str) -> EngineResult<Option<T>> {
            let url = self.url(path);
            debug!("GET {url}");
            match self.agent.get(&url).call() {
                Ok(resp) => resp
                    .into_json::<T>()
                    .map(Some)
                    .map_err(|e| EngineError::upstream(&url, format!("invalid body: {e}"))),
                Err(ureq::Error::Status(404, _)) => Ok(None),
                Err(e) => Err(map_error(&url, e)),
            }
        }

        pub fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> EngineResult<T> {
            let url = self.url(path);
            debug!("POST {url}");
            self.agent
                .post(&url)
                .send_json(body)
                .map_err(|e| map_error(&url, e))?
                .into_json::<T>()
                .map_err(|e| EngineError::upstream(&url, format!("invalid body: {e}")))
        }
    }

    fn map_error(url: &str, err: ureq::Error) -> EngineError {
        match err {
            ureq::Error::Status(code, _) => EngineError::upstream_status(url, code),
            ureq::Error::Transport(t) => EngineError::upstream(url, t),
        }
    }

    #[derive(Debug, Deserialize)]
    struct NodeInfo {
        burn_block_height: u64,
    }

    /// Public Hiro API: `GET /v2/info`.
    #[derive(Clone)]
    pub struct HiroClient {
        http: JsonHttp,
    }

    impl HiroClient {
        pub const MAINNET: &'static str = "https://api.mainnet.hiro.so";

        pub fn new(api_url: impl Into<String>, timeouts: HttpTimeouts) -> Self {
            Self {
                http: JsonHttp::new(api_url, timeouts),
            }
        }

        pub fn mainnet() -> Self {
            Self::new(Self::MAINNET, HttpTimeouts::default())
        }
    }

    impl ChainHeightSource for HiroClient {
        fn current_height(&self) -> EngineResult<u64> {
            let info: NodeInfo = self.http.get("/v2/info")?;
            debug!("burn block height {}", info.burn_block_height);
            Ok(info.burn_block_height)
        }
    }
}
