//! JSON-RPC implementation of [`LedgerClient`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chain_sol::{transaction_id, Pubkey};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::config::{Commitment, SdkConfig};
use crate::error::SdkError;
use crate::ledger::{AccountInfo, LedgerClient, LedgerError};

/// Preflight simulation failed; `data` carries the simulation logs.
const SEND_TRANSACTION_PREFLIGHT_FAILURE: i64 = -32002;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    data: (String, String),
    owner: String,
    lamports: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    block_time: Option<i64>,
    meta: Option<RpcTransactionMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    #[serde(default)]
    log_messages: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreflightData {
    #[serde(default)]
    logs: Vec<String>,
}

/// A request that never produced a JSON-RPC response.
#[derive(Debug)]
struct TransportFailure {
    message: String,
    /// The node may have received the request.
    delivered: bool,
}

impl From<TransportFailure> for LedgerError {
    fn from(f: TransportFailure) -> Self {
        LedgerError::Transport(f.message)
    }
}

/// Ledger access over HTTP JSON-RPC.
#[derive(Clone, Debug)]
pub struct RpcLedgerClient {
    client: Client,
    endpoint: Url,
    commitment: Commitment,
    confirm_timeout: Duration,
    poll_interval: Duration,
    request_id: Arc<AtomicU64>,
}

impl RpcLedgerClient {
    pub fn new(
        endpoint: Url,
        commitment: Commitment,
        request_timeout: Duration,
        confirm_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            commitment,
            confirm_timeout,
            poll_interval,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn from_config(config: &SdkConfig) -> Result<Self, SdkError> {
        let timing = config.timing();
        Ok(Self::new(
            config.rpc_url()?,
            config.commitment,
            timing.request_timeout,
            timing.confirm_timeout,
            timing.poll_interval,
        )?)
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn call_raw<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Result<Option<T>, JsonRpcError>, TransportFailure> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_request_id(),
            method,
            params,
        };
        tracing::trace!(method, id = request.id, "rpc request");

        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportFailure {
                message: format!("{method}: {e}"),
                // Only a failed connect or a request that was never built
                // proves the node did not see it; timeouts may come after.
                delivered: !e.is_connect() && !e.is_builder(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportFailure {
                message: format!("{method}: HTTP {status}"),
                delivered: status.is_server_error(),
            });
        }

        let body = response.text().await.map_err(|e| TransportFailure {
            message: format!("{method}: failed to read response: {e}"),
            delivered: true,
        })?;

        let parsed: JsonRpcResponse<T> =
            serde_json::from_str(&body).map_err(|e| TransportFailure {
                message: format!("{method}: malformed response: {e}"),
                delivered: true,
            })?;

        Ok(match parsed.error {
            Some(error) => Err(error),
            None => Ok(parsed.result),
        })
    }

    /// Call a method whose result must be present.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        match self.call_raw::<T>(method, params).await? {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(LedgerError::Rpc {
                code: -32603,
                message: format!("{method}: missing result"),
            }),
            Err(error) => Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            }),
        }
    }

    /// Call a method whose result may be `null`.
    async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, LedgerError> {
        match self.call_raw::<T>(method, params).await? {
            Ok(result) => Ok(result),
            Err(error) => Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            }),
        }
    }

    async fn send_transaction(&self, wire: &[u8], signature: &str) -> Result<String, LedgerError> {
        let params = json!([
            general_purpose::STANDARD.encode(wire),
            { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }
        ]);

        match self.call_raw::<String>("sendTransaction", params).await {
            Ok(Ok(Some(sig))) => Ok(sig),
            Ok(Ok(None)) => Err(LedgerError::Unconfirmed {
                signature: signature.to_string(),
                message: "sendTransaction returned no signature".into(),
            }),
            Ok(Err(error)) if error.code == SEND_TRANSACTION_PREFLIGHT_FAILURE => {
                let logs = error
                    .data
                    .and_then(|data| serde_json::from_value::<PreflightData>(data).ok())
                    .unwrap_or_default()
                    .logs;
                Err(LedgerError::Rejected {
                    message: error.message,
                    logs,
                })
            }
            Ok(Err(error)) => Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            }),
            Err(failure) if failure.delivered => Err(LedgerError::Unconfirmed {
                signature: signature.to_string(),
                message: failure.message,
            }),
            Err(failure) => Err(failure.into()),
        }
    }

    async fn signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<RpcSignatureStatus>, LedgerError> {
        let statuses: WithContext<Vec<Option<RpcSignatureStatus>>> = self
            .call("getSignatureStatuses", json!([[signature]]))
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    async fn fetch_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<RpcTransaction>, LedgerError> {
        // getTransaction does not accept "processed".
        let commitment = self.commitment.max(Commitment::Confirmed);
        self.call_optional(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "json",
                    "commitment": commitment.as_str(),
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        )
        .await
    }

    /// Poll until the signature reaches the configured commitment.
    async fn confirm(&self, signature: &str) -> Result<(), LedgerError> {
        let poll = async {
            loop {
                match self.signature_status(signature).await {
                    Ok(Some(status)) => {
                        if let Some(err) = status.err {
                            let logs = match self.fetch_transaction(signature).await {
                                Ok(Some(tx)) => tx.meta.map(|m| m.log_messages).unwrap_or_default(),
                                _ => Vec::new(),
                            };
                            return Err(LedgerError::Rejected {
                                message: format!("Transaction {signature} failed: {err}"),
                                logs,
                            });
                        }
                        let reached = status
                            .confirmation_status
                            .as_deref()
                            .and_then(|s| s.parse::<Commitment>().ok())
                            .is_some_and(|c| c >= self.commitment);
                        if reached {
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(%signature, error = %err, "status poll failed"),
                }
                sleep(self.poll_interval).await;
            }
        };

        timeout(self.confirm_timeout, poll)
            .await
            .unwrap_or_else(|_| {
                Err(LedgerError::Unconfirmed {
                    signature: signature.to_string(),
                    message: format!(
                        "not {} within {:?}",
                        self.commitment.as_str(),
                        self.confirm_timeout
                    ),
                })
            })
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, LedgerError> {
        let response: WithContext<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;

        let Some(account) = response.value else {
            return Ok(None);
        };
        let malformed = |what: &str| LedgerError::Rpc {
            code: -32603,
            message: format!("getAccountInfo {address}: {what}"),
        };

        let data = general_purpose::STANDARD
            .decode(&account.data.0)
            .map_err(|_| malformed("invalid base64 data"))?;
        let owner = account.owner.parse().map_err(|_| malformed("invalid owner"))?;

        Ok(Some(AccountInfo {
            owner,
            lamports: account.lamports,
            data,
        }))
    }

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], LedgerError> {
        let response: WithContext<RpcBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;

        let bytes = bs58::decode(&response.value.blockhash)
            .into_vec()
            .map_err(|e| LedgerError::Rpc {
                code: -32603,
                message: format!("invalid blockhash: {e}"),
            })?;
        bytes.try_into().map_err(|_| LedgerError::Rpc {
            code: -32603,
            message: "blockhash is not 32 bytes".into(),
        })
    }

    async fn send_and_confirm(&self, transaction: &[u8]) -> Result<String, LedgerError> {
        let local = transaction_id(transaction)
            .map_err(|e| LedgerError::Transport(format!("unsendable transaction: {e}")))?;

        let signature = self.send_transaction(transaction, &local).await?;
        tracing::debug!(%signature, "transaction sent, awaiting confirmation");
        self.confirm(&signature).await?;
        Ok(signature)
    }

    async fn get_transaction_time(&self, signature: &str) -> Result<Option<i64>, LedgerError> {
        Ok(self
            .fetch_transaction(signature)
            .await?
            .and_then(|tx| tx.block_time))
    }

    async fn get_cluster_time(&self) -> Result<i64, LedgerError> {
        let slot: u64 = self
            .call("getSlot", json!([{ "commitment": self.commitment.as_str() }]))
            .await?;
        self.call_optional::<i64>("getBlockTime", json!([slot]))
            .await?
            .ok_or_else(|| LedgerError::Rpc {
                code: -32004,
                message: format!("block time for slot {slot} is not available"),
            })
    }
}
