use std::sync::Arc;

use crate::bulk::Bulk;
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::executor::RequestExecutor;
use crate::facade::MultiHistorical;
use crate::historical::Historical;
use crate::http_client::{Connector, HttpClient};
use crate::reference::Reference;

/// Entry point. Owns one executor and hands out per-kind getters borrowing it.
pub struct EodClient {
    executor: RequestExecutor,
}

impl EodClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            executor: RequestExecutor::new(config)?,
        })
    }

    /// Client configured from `EODFEED_*` environment variables.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            executor: RequestExecutor::with_connector(config, connector)?,
        })
    }

    pub fn with_http_client(
        config: ClientConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            executor: RequestExecutor::with_http_client(config, client)?,
        })
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    pub fn historical(&self) -> Historical<'_> {
        Historical::new(&self.executor)
    }

    pub fn bulk(&self) -> Bulk<'_> {
        Bulk::new(&self.executor)
    }

    pub fn multi(&self) -> MultiHistorical<'_> {
        MultiHistorical::new(&self.executor)
    }

    pub fn reference(&self) -> Reference<'_> {
        Reference::new(&self.executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ScriptedHttpClient;

    #[test]
    fn rejects_invalid_config() {
        let result = EodClient::with_http_client(
            ClientConfig::new("token").with_base_url(""),
            Arc::new(ScriptedHttpClient::new()),
        );
        assert!(matches!(result, Err(FetchError::Config(_))));
    }

    #[test]
    fn builds_production_transport() {
        let client = EodClient::new(ClientConfig::new("token")).expect("valid config");
        assert_eq!(client.config().base_url, crate::config::DEFAULT_BASE_URL);
    }
}
