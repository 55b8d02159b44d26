// This file is part of Opflow.
//
// Opflow is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opflow is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opflow.
// If not, see https://www.gnu.org/licenses/.

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, Context};
use opflow_types::{GasEstimate, UserOperation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    BundlerClient, BundlerClientError, BundlerResult, UserOperationReceipt,
};

/// JSON-RPC client for an ERC-4337 bundler endpoint.
#[derive(Clone, Debug)]
pub struct HttpBundlerClient {
    url: Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl HttpBundlerClient {
    /// Create a new client for the given bundler URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }

    /// Issue a JSON-RPC call, returning `None` when the bundler answers with
    /// a null result.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> BundlerResult<Option<T>> {
        debug!("Bundler request {method}");
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: JsonRpcResponse<T> = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("should reach bundler for {method}"))?
            .json()
            .await
            .with_context(|| format!("should parse bundler response for {method}"))?;

        if let Some(error) = response.error {
            return Err(BundlerClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }
}

#[async_trait::async_trait]
impl BundlerClient for HttpBundlerClient {
    async fn send_user_operation(
        &self,
        operation: &UserOperation,
        entry_point: Address,
    ) -> BundlerResult<B256> {
        self.request(
            "eth_sendUserOperation",
            serde_json::json!([operation, entry_point]),
        )
        .await?
        .ok_or_else(|| anyhow!("eth_sendUserOperation returned no hash").into())
    }

    async fn estimate_user_operation_gas(
        &self,
        operation: &UserOperation,
        entry_point: Address,
    ) -> BundlerResult<GasEstimate> {
        self.request(
            "eth_estimateUserOperationGas",
            serde_json::json!([operation, entry_point]),
        )
        .await?
        .ok_or_else(|| anyhow!("eth_estimateUserOperationGas returned no estimate").into())
    }

    async fn get_user_operation_receipt(
        &self,
        hash: B256,
    ) -> BundlerResult<Option<UserOperationReceipt>> {
        self.request("eth_getUserOperationReceipt", serde_json::json!([hash]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{b256, U256};
    use wiremock::{
        matchers::{body_partial_json, method},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    async fn client_for(server: &MockServer) -> HttpBundlerClient {
        HttpBundlerClient::new(server.uri().parse().unwrap())
    }

    #[tokio::test]
    async fn test_send_user_operation_returns_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "method": "eth_sendUserOperation"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result":
                    "0x000000000000000000000000000000000000000000000000000000000000beef"
            })))
            .mount(&server)
            .await;

        let hash = client_for(&server)
            .await
            .send_user_operation(&UserOperation::empty(), Address::ZERO)
            .await
            .unwrap();
        assert_eq!(
            hash,
            b256!("000000000000000000000000000000000000000000000000000000000000beef")
        );
    }

    #[tokio::test]
    async fn test_null_receipt_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null
            })))
            .mount(&server)
            .await;

        let receipt = client_for(&server)
            .await
            .get_user_operation_receipt(B256::ZERO)
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn test_rpc_error_is_definitive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32500, "message": "op rejected" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .send_user_operation(&UserOperation::empty(), Address::ZERO)
            .await
            .unwrap_err();
        match err {
            BundlerClientError::Rpc { code, message } => {
                assert_eq!(code, -32500);
                assert_eq!(message, "op rejected");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receipt_parses_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "userOpHash":
                        "0x000000000000000000000000000000000000000000000000000000000000beef",
                    "success": true,
                    "actualGasCost": "0x5208",
                    "actualGasUsed": "0x5208",
                    "receipt": {
                        "transactionHash":
                            "0x000000000000000000000000000000000000000000000000000000000000cafe",
                        "blockNumber": "0x10"
                    }
                }
            })))
            .mount(&server)
            .await;

        let receipt = client_for(&server)
            .await
            .get_user_operation_receipt(B256::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.reason, None);
        assert_eq!(receipt.actual_gas_cost, U256::from(0x5208));
        assert_eq!(
            receipt.receipt.transaction_hash,
            b256!("000000000000000000000000000000000000000000000000000000000000cafe")
        );
    }
}
