use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::rpc::approve_calldata;
use super::types::{StatusQuery, TransferState, TransferStatus};
use super::{EvmRpc, LifiClient, LifiDirectory};
use crate::amount;
use crate::error::{ExecutionError, WalletError};
use crate::model::{
    ChainDescriptor, ChainType, ProcessKind, ProcessStatus, Quote, Route, StepExecution,
    TransactionRequest,
};
use crate::services::{ExecutionService, ExecutionUpdate, negotiate_rate_change, with_cancel};

/// The external wallet: signs and broadcasts a transaction, returning its hash.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, WalletError>;
}

/// Executes LI.FI routes: approval, step refresh, hand-off to the wallet and
/// status tracking until the transfer settles.
pub struct LifiExecutor {
    client: Arc<LifiClient>,
    directory: Arc<LifiDirectory>,
    rpc: EvmRpc,
    sender: Arc<dyn TransactionSender>,
    poll_interval: Duration,
    status_timeout: Duration,
}

fn execution_mut(route: &mut Route, index: usize) -> &mut StepExecution {
    route.steps[index].execution.get_or_insert_default()
}

fn main_process_kind(step: &Quote) -> ProcessKind {
    if step.is_cross_chain() {
        ProcessKind::CrossChain
    } else {
        ProcessKind::Swap
    }
}

async fn publish(updates: &mpsc::Sender<ExecutionUpdate>, route: &Route) {
    if updates
        .send(ExecutionUpdate::Progress(route.clone()))
        .await
        .is_err()
    {
        tracing::debug!("Progress receiver dropped; continuing execution");
    }
}

impl LifiExecutor {
    pub fn new(
        client: Arc<LifiClient>,
        directory: Arc<LifiDirectory>,
        rpc: EvmRpc,
        sender: Arc<dyn TransactionSender>,
        poll_interval: Duration,
        status_timeout: Duration,
    ) -> Self {
        Self {
            client,
            directory,
            rpc,
            sender,
            poll_interval,
            status_timeout,
        }
    }

    async fn chain(&self, chain_id: u64) -> Option<ChainDescriptor> {
        match self.directory.chain(chain_id).await {
            Ok(chain) => chain,
            Err(e) => {
                tracing::debug!(chain_id, "Chain lookup failed: {}", e);
                None
            }
        }
    }

    async fn send(
        &self,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ExecutionError> {
        let hash = with_cancel(cancel, self.sender.send_transaction(request, cancel))
            .await
            .ok_or(ExecutionError::Cancelled)??;
        tracing::info!(tx_hash = %hash, "Transaction submitted");
        Ok(hash)
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), ExecutionError> {
        with_cancel(cancel, tokio::time::sleep(self.poll_interval))
            .await
            .ok_or(ExecutionError::Cancelled)
    }

    async fn execute_step(
        &self,
        route: &mut Route,
        index: usize,
        updates: &mpsc::Sender<ExecutionUpdate>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        let step = route.steps[index].step.clone();
        let owner = step
            .action
            .from_address
            .clone()
            .ok_or_else(|| ExecutionError::InvalidRoute {
                reason: "step has no sender address".to_string(),
            })?;
        execution_mut(route, index).status = ProcessStatus::Started;
        publish(updates, route).await;

        let source_chain = self.chain(step.action.from_chain_id).await;
        let is_evm_source = source_chain
            .as_ref()
            .is_none_or(|chain| chain.chain_type == ChainType::Evm);
        let approval_address = step
            .estimate
            .as_ref()
            .and_then(|estimate| estimate.approval_address.clone());
        if let Some(spender) = approval_address
            && is_evm_source
            && !step.action.from_token.is_native()
        {
            self.ensure_allowance(
                route,
                index,
                &step,
                &owner,
                &spender,
                source_chain.as_ref(),
                updates,
                cancel,
            )
            .await?;
        }

        let refreshed = with_cancel(cancel, self.client.step_transaction(&step))
            .await
            .ok_or(ExecutionError::Cancelled)??;
        if let (Some(old), Some(new)) = (step.to_amount(), refreshed.to_amount())
            && old != new
        {
            let token = refreshed.action.to_token.clone();
            tracing::info!(old, new, symbol = %token.symbol, "Exchange rate changed");
            let accepted =
                negotiate_rate_change(updates, token.clone(), old, new, cancel).await?;
            if !accepted {
                return Err(ExecutionError::RateChangeRejected {
                    new_amount: amount::display_amount(new, token.decimals)
                        .unwrap_or_else(|| new.to_string()),
                    symbol: token.symbol,
                });
            }
        }
        let request =
            refreshed
                .transaction_request
                .clone()
                .ok_or_else(|| ExecutionError::InvalidRoute {
                    reason: "routing service returned no transaction request".to_string(),
                })?;
        if let Some(to_amount) = refreshed.to_amount() {
            route.to_amount = to_amount.to_string();
        }
        route.steps[index].step = refreshed;

        let kind = main_process_kind(&step);
        execution_mut(route, index).status = ProcessStatus::ActionRequired;
        execution_mut(route, index)
            .process_mut(kind)
            .set_status(ProcessStatus::ActionRequired);
        publish(updates, route).await;

        let tx_hash = self.send(&request, cancel).await?;
        {
            let process = execution_mut(route, index).process_mut(kind);
            process.set_status(ProcessStatus::Pending);
            process.tx_link = source_chain.as_ref().and_then(|c| c.tx_link(&tx_hash));
            process.tx_hash = Some(tx_hash.clone());
        }
        execution_mut(route, index).status = ProcessStatus::Pending;
        publish(updates, route).await;

        let query = StatusQuery {
            tx_hash: tx_hash.clone(),
            from_chain: step.action.from_chain_id,
            to_chain: step.action.to_chain_id,
            bridge: step.is_cross_chain().then(|| step.tool.clone()),
        };
        let settled = self
            .wait_for_transfer(route, index, kind, &query, updates, cancel)
            .await?;

        let execution = execution_mut(route, index);
        let process = execution.process_mut(kind);
        if let Some(link) = settled.sending.as_ref().and_then(|leg| leg.tx_link.clone()) {
            process.tx_link = Some(link);
        }
        process.message = None;
        process.set_status(ProcessStatus::Done);
        if step.is_cross_chain() {
            let receiving = execution.process_mut(ProcessKind::ReceivingChain);
            if let Some(leg) = settled.receiving.as_ref() {
                receiving.tx_hash = leg.tx_hash.clone();
                receiving.tx_link = leg.tx_link.clone();
            }
            receiving.set_status(ProcessStatus::Done);
        }
        execution.status = ProcessStatus::Done;
        publish(updates, route).await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn ensure_allowance(
        &self,
        route: &mut Route,
        index: usize,
        step: &Quote,
        owner: &str,
        spender: &str,
        chain: Option<&ChainDescriptor>,
        updates: &mpsc::Sender<ExecutionUpdate>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        execution_mut(route, index).process_mut(ProcessKind::TokenAllowance);
        publish(updates, route).await;

        let chain_id = step.action.from_chain_id;
        let token = step.action.from_token.address.as_str();
        let required =
            amount::parse_raw(&step.action.from_amount).map_err(|e| ExecutionError::InvalidRoute {
                reason: format!("from amount: {e}"),
            })?;
        let url = self
            .directory
            .rpc_url(chain_id)
            .await
            .ok_or_else(|| ExecutionError::InvalidRoute {
                reason: format!("no RPC endpoint is known for chain {chain_id}"),
            })?;

        let current = with_cancel(cancel, self.rpc.allowance(&url, token, owner, spender))
            .await
            .ok_or(ExecutionError::Cancelled)?
            .map_err(WalletError::from)?;
        if current >= required {
            tracing::debug!(chain_id, token, "Allowance already sufficient");
            execution_mut(route, index)
                .process_mut(ProcessKind::TokenAllowance)
                .set_status(ProcessStatus::Done);
            publish(updates, route).await;
            return Ok(());
        }

        execution_mut(route, index)
            .process_mut(ProcessKind::TokenAllowance)
            .set_status(ProcessStatus::ActionRequired);
        publish(updates, route).await;

        let request = TransactionRequest {
            to: token.to_string(),
            from: Some(owner.to_string()),
            data: approve_calldata(spender, required).map_err(WalletError::from)?,
            value: Some("0x0".to_string()),
            chain_id: Some(chain_id),
            ..TransactionRequest::default()
        };
        let tx_hash = self.send(&request, cancel).await?;
        {
            let process = execution_mut(route, index).process_mut(ProcessKind::TokenAllowance);
            process.set_status(ProcessStatus::Pending);
            process.tx_link = chain.and_then(|c| c.tx_link(&tx_hash));
            process.tx_hash = Some(tx_hash.clone());
        }
        publish(updates, route).await;

        let deadline = Instant::now() + self.status_timeout;
        loop {
            self.pause(cancel).await?;
            match self.rpc.allowance(&url, token, owner, spender).await {
                Ok(current) if current >= required => break,
                Ok(_) => {}
                Err(e) => tracing::warn!(chain_id, "Allowance check failed: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(ExecutionError::StatusTimeout {
                    tx_hash,
                    waited: self.status_timeout,
                });
            }
        }

        execution_mut(route, index)
            .process_mut(ProcessKind::TokenAllowance)
            .set_status(ProcessStatus::Done);
        publish(updates, route).await;
        Ok(())
    }

    async fn wait_for_transfer(
        &self,
        route: &mut Route,
        index: usize,
        kind: ProcessKind,
        query: &StatusQuery,
        updates: &mpsc::Sender<ExecutionUpdate>,
        cancel: &CancellationToken,
    ) -> Result<TransferStatus, ExecutionError> {
        let deadline = Instant::now() + self.status_timeout;
        let mut last_message: Option<String> = None;
        loop {
            let result = with_cancel(cancel, self.client.status(query))
                .await
                .ok_or(ExecutionError::Cancelled)?;
            match result {
                Ok(status) => match status.status {
                    TransferState::Done => return Ok(status),
                    TransferState::Failed | TransferState::Invalid => {
                        return Err(ExecutionError::StepFailed {
                            step: route.steps[index].step.tool_name().to_string(),
                            reason: status.describe(),
                        });
                    }
                    TransferState::NotFound | TransferState::Pending | TransferState::Unknown => {
                        let message = status.substatus_message.clone();
                        if message.is_some() && message != last_message {
                            execution_mut(route, index).process_mut(kind).message =
                                message.clone();
                            publish(updates, route).await;
                            last_message = message;
                        }
                    }
                },
                Err(e) => tracing::warn!(tx_hash = %query.tx_hash, "Status check failed: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(ExecutionError::StatusTimeout {
                    tx_hash: query.tx_hash.clone(),
                    waited: self.status_timeout,
                });
            }
            self.pause(cancel).await?;
        }
    }
}

#[async_trait]
impl ExecutionService for LifiExecutor {
    async fn execute(
        &self,
        mut route: Route,
        updates: mpsc::Sender<ExecutionUpdate>,
        cancel: CancellationToken,
    ) -> Result<Route, ExecutionError> {
        tracing::info!(route_id = %route.id, steps = route.steps.len(), "Executing route");
        for index in 0..route.steps.len() {
            if let Err(err) = self.execute_step(&mut route, index, &updates, &cancel).await {
                let status = match err {
                    ExecutionError::Cancelled => ProcessStatus::Cancelled,
                    _ => ProcessStatus::Failed,
                };
                execution_mut(&mut route, index).fail_current(status, err.to_string());
                publish(&updates, &route).await;
                tracing::warn!(route_id = %route.id, "Route execution failed: {}", err);
                return Err(err);
            }
        }
        tracing::info!(route_id = %route.id, "Route execution complete");
        Ok(route)
    }
}
