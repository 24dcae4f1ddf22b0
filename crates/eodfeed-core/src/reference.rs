//! Reference data: fundamentals, exchanges and listed symbols.
//!
//! These are single calls. Bodies are decoded but not reshaped into tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::executor::RequestExecutor;
use crate::request::{Period, RequestParams, SortOrder, INDEX_EXCHANGE};

const FUNDAMENTALS_PATH: &str = "/api/fundamentals";
const EXCHANGES_PATH: &str = "/api/exchanges-list";
const EXCHANGE_SYMBOLS_PATH: &str = "/api/exchange-symbol-list";

/// One supported exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExchangeInfo {
    pub name: String,
    pub code: String,
    #[serde(rename = "OperatingMIC", default)]
    pub operating_mic: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "CountryISO2", default)]
    pub country_iso2: Option<String>,
    #[serde(rename = "CountryISO3", default)]
    pub country_iso3: Option<String>,
}

/// One symbol listed on an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListedSymbol {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
}

#[derive(Clone, Copy)]
pub struct Reference<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> Reference<'a> {
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    /// Fundamentals document of one symbol, as returned upstream.
    pub async fn fundamentals(&self, exchange: &str, ticker: &str) -> Result<Value, FetchError> {
        let session = self.executor.open_session()?;
        session
            .execute_value(
                &format!("{FUNDAMENTALS_PATH}/{ticker}.{exchange}"),
                &listing_params(),
            )
            .await
    }

    pub async fn exchanges(&self) -> Result<Vec<ExchangeInfo>, FetchError> {
        let session = self.executor.open_session()?;
        session
            .execute_typed(EXCHANGES_PATH, &listing_params())
            .await
    }

    pub async fn exchange_symbols(&self, exchange: &str) -> Result<Vec<ListedSymbol>, FetchError> {
        let session = self.executor.open_session()?;
        session
            .execute_typed(
                &format!("{EXCHANGE_SYMBOLS_PATH}/{exchange}"),
                &listing_params(),
            )
            .await
    }

    /// Supported market indices.
    pub async fn indices(&self) -> Result<Vec<ListedSymbol>, FetchError> {
        self.exchange_symbols(INDEX_EXCHANGE).await
    }
}

fn listing_params() -> RequestParams {
    RequestParams {
        period: Some(Period::Daily),
        order: Some(SortOrder::Ascending),
        ..RequestParams::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::http_client::{HttpResponse, ScriptedHttpClient};

    fn executor(client: Arc<ScriptedHttpClient>) -> RequestExecutor {
        let config = ClientConfig::new("token").with_base_url("https://example.test");
        RequestExecutor::with_http_client(config, client).expect("valid config")
    }

    #[tokio::test]
    async fn exchanges_decode_upstream_field_names() {
        let client = Arc::new(ScriptedHttpClient::new().with_route(
            "/api/exchanges-list",
            Ok(HttpResponse::ok_json(
                r#"[{"Name":"Johannesburg Exchange","Code":"JSE","OperatingMIC":"XJSE","Country":"South Africa","Currency":"ZAR","CountryISO2":"ZA","CountryISO3":"ZAF"}]"#,
            )),
        ));
        let executor = executor(client);

        let exchanges = Reference::new(&executor).exchanges().await.expect("exchanges");
        assert_eq!(exchanges[0].code, "JSE");
        assert_eq!(exchanges[0].operating_mic.as_deref(), Some("XJSE"));
        assert_eq!(exchanges[0].country_iso3.as_deref(), Some("ZAF"));
    }

    #[tokio::test]
    async fn indices_list_the_index_exchange() {
        let client = Arc::new(ScriptedHttpClient::new().with_route(
            "/api/exchange-symbol-list/INDX",
            Ok(HttpResponse::ok_json(
                r#"[{"Code":"GSPC","Name":"S&P 500 Index","Country":"USA","Exchange":"INDX","Currency":"USD","Type":"INDEX","Isin":null}]"#,
            )),
        ));
        let executor = executor(Arc::clone(&client));

        let indices = Reference::new(&executor).indices().await.expect("indices");
        assert_eq!(indices[0].kind.as_deref(), Some("INDEX"));
        assert_eq!(indices[0].isin, None);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn fundamentals_pass_the_document_through() {
        let client = Arc::new(ScriptedHttpClient::new().with_route(
            "/api/fundamentals/AAPL.US",
            Ok(HttpResponse::ok_json(r#"{"General":{"Code":"AAPL"}}"#)),
        ));
        let executor = executor(client);

        let document = Reference::new(&executor)
            .fundamentals("US", "AAPL")
            .await
            .expect("fundamentals");
        assert_eq!(document["General"]["Code"], "AAPL");
    }

    #[tokio::test]
    async fn malformed_listing_is_a_decode_error() {
        let client = Arc::new(
            ScriptedHttpClient::new().with_fallback(Ok(HttpResponse::ok_json(r#"[{"Name":1}]"#))),
        );
        let executor = executor(client);

        let error = Reference::new(&executor)
            .exchange_symbols("US")
            .await
            .expect_err("bad shape");
        assert_eq!(error.code(), "fetch.decode");
    }
}
