//! Bridge orchestration
//!
//! Per token the flows move through
//! `Unverified → OwnershipConfirmed → {AlreadyMinted | Minting → Minted} → URISet`,
//! with `OwnershipRejected` as the negative terminal state. Nothing is kept
//! between requests: every call re-reads both ledgers.
//!
//! Steps within a flow are strictly sequential. Transaction ordering per
//! signer is the chain client's concern, not the orchestrator's.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::abi::values::{first_address, first_string, outputs_to_json};
use crate::abi::ContractInterfaceDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::explorer::ContractSource;
use crate::invoker::{CallOutput, ContractInvoker};
use crate::registry::ContractRegistry;
use crate::types::{
    ChainRole, ContractBinding, DeployOutcome, LoginOutcome, OwnershipClaim, PushBackResult,
    ReconcileResult, SyncResult, TokenIdentity,
};

/// Outcome of a generic call. An unknown function name is an expected
/// negative result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Completed(Value),
    UnsupportedFunction { name: String },
}

/// Composes the per-chain invokers, the registry and the code source into
/// the bridge flows.
pub struct BridgeOrchestrator {
    l1: ContractInvoker,
    l2: ContractInvoker,
    registry: Arc<dyn ContractRegistry>,
    source: Arc<dyn ContractSource>,
}

impl BridgeOrchestrator {
    pub fn new(
        l1: ContractInvoker,
        l2: ContractInvoker,
        registry: Arc<dyn ContractRegistry>,
        source: Arc<dyn ContractSource>,
    ) -> Self {
        Self {
            l1,
            l2,
            registry,
            source,
        }
    }

    pub fn invoker(&self, role: ChainRole) -> &ContractInvoker {
        match role {
            ChainRole::L1 => &self.l1,
            ChainRole::L2 => &self.l2,
        }
    }

    pub fn registry(&self) -> &Arc<dyn ContractRegistry> {
        &self.registry
    }

    async fn binding_on(&self, role: ChainRole, address: Address) -> BridgeResult<ContractBinding> {
        let found = match role {
            ChainRole::L1 => self.registry.find_by_l1(address).await?,
            ChainRole::L2 => self.registry.find_by_l2(address).await?,
        };
        found.ok_or_else(|| BridgeError::binding_not_found(address))
    }

    async fn read_owner(
        &self,
        role: ChainRole,
        descriptor: &ContractInterfaceDescriptor,
        contract: Address,
        token_id: U256,
    ) -> BridgeResult<Address> {
        let values = self
            .invoker(role)
            .read(descriptor, contract, "ownerOf", &[json!(token_id.to_string())])
            .await?;
        first_address(&values).ok_or_else(|| {
            BridgeError::RemoteCallReverted(format!("ownerOf on {} returned no address", contract))
        })
    }

    async fn read_uri(
        &self,
        role: ChainRole,
        descriptor: &ContractInterfaceDescriptor,
        contract: Address,
        token_id: U256,
    ) -> BridgeResult<String> {
        let values = self
            .invoker(role)
            .read(descriptor, contract, "tokenURI", &[json!(token_id.to_string())])
            .await?;
        first_string(&values).ok_or_else(|| {
            BridgeError::RemoteCallReverted(format!("tokenURI on {} returned no string", contract))
        })
    }

    async fn set_uri(
        &self,
        role: ChainRole,
        descriptor: &ContractInterfaceDescriptor,
        contract: Address,
        token_id: U256,
        uri: &str,
    ) -> BridgeResult<alloy::primitives::TxHash> {
        let handle = self
            .invoker(role)
            .transact(
                descriptor,
                contract,
                "setTokenURI",
                &[json!(token_id.to_string()), json!(uri)],
            )
            .await?;
        Ok(handle.tx_hash)
    }

    /// Flow A: verify the claim on L1, then mint and set the URI on L2 if the
    /// mirror token does not exist yet.
    pub async fn login_and_sync(
        &self,
        claimed_owner: Address,
        l1_address: Address,
        token_id: U256,
    ) -> BridgeResult<LoginOutcome> {
        let binding = self.binding_on(ChainRole::L1, l1_address).await?;
        let claim = OwnershipClaim {
            token: TokenIdentity {
                contract_address: l1_address,
                token_id,
            },
            claimed_owner,
        };
        let descriptor = &binding.interface;

        let actual_owner = self
            .read_owner(ChainRole::L1, descriptor, l1_address, token_id)
            .await?;
        if actual_owner != claim.claimed_owner {
            warn!(
                token = %claim.token,
                claimed = %claim.claimed_owner,
                actual = %actual_owner,
                "Ownership claim rejected"
            );
            return Ok(LoginOutcome::OwnershipRejected {
                claimed_owner: claim.claimed_owner,
                actual_owner,
            });
        }
        debug!(token = %claim.token, owner = %actual_owner, "Ownership confirmed");

        let uri = self
            .read_uri(ChainRole::L1, descriptor, l1_address, token_id)
            .await?;

        let l2_address = binding.l2_address;
        let l2_owner = self
            .read_owner(ChainRole::L2, descriptor, l2_address, token_id)
            .await?;

        let mut minted_now = false;
        if l2_owner == Address::ZERO {
            minted_now = self
                .mint_mirror(&claim, descriptor, l2_address, &uri)
                .await?;
        } else {
            debug!(token = %claim.token, l2_owner = %l2_owner, "Mirror token already minted");
        }

        Ok(LoginOutcome::Synced(SyncResult {
            owner_address: claim.claimed_owner,
            l1_address,
            l2_address,
            token_id,
            minted_now,
        }))
    }

    /// Mint then set the URI. Returns false when a concurrent flow minted
    /// the token to the same owner first.
    async fn mint_mirror(
        &self,
        claim: &OwnershipClaim,
        descriptor: &ContractInterfaceDescriptor,
        l2_address: Address,
        uri: &str,
    ) -> BridgeResult<bool> {
        let token_id = claim.token.token_id;
        let mint = self
            .l2
            .transact(
                descriptor,
                l2_address,
                "mint",
                &[
                    json!(claim.claimed_owner.to_string()),
                    json!(token_id.to_string()),
                ],
            )
            .await;

        match mint {
            Ok(handle) => {
                info!(
                    token = %claim.token,
                    l2 = %l2_address,
                    owner = %claim.claimed_owner,
                    tx_hash = %handle.tx_hash,
                    "Minted mirror token"
                );
            }
            Err(
                e @ (BridgeError::GasEstimationFailed(_) | BridgeError::RemoteCallReverted(_)),
            ) => {
                let owner_now = self
                    .read_owner(ChainRole::L2, descriptor, l2_address, token_id)
                    .await?;
                if owner_now == claim.claimed_owner {
                    warn!(
                        token = %claim.token,
                        error = %e,
                        "Mint lost a race with a concurrent sync; token already mirrored"
                    );
                    return Ok(false);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        match self
            .set_uri(ChainRole::L2, descriptor, l2_address, token_id, uri)
            .await
        {
            Ok(tx_hash) => {
                info!(token = %claim.token, l2 = %l2_address, tx_hash = %tx_hash, "Set mirror token URI");
                Ok(true)
            }
            Err(e) => {
                error!(
                    token = %claim.token,
                    l2 = %l2_address,
                    error = %e,
                    "Mirror token minted without URI; reconcile to repair"
                );
                Err(e)
            }
        }
    }

    /// Flow B: copy the L2 token URI back onto the bound L1 contract.
    pub async fn update_l1_from_l2(
        &self,
        l2_address: Address,
        token_id: U256,
    ) -> BridgeResult<PushBackResult> {
        let binding = self.binding_on(ChainRole::L2, l2_address).await?;
        let descriptor = &binding.interface;

        let uri = self
            .read_uri(ChainRole::L2, descriptor, l2_address, token_id)
            .await?;
        let tx_hash = self
            .set_uri(ChainRole::L1, descriptor, binding.l1_address, token_id, &uri)
            .await?;

        info!(
            l1 = %binding.l1_address,
            l2 = %l2_address,
            token_id = %token_id,
            tx_hash = %tx_hash,
            "Pushed token URI back to L1"
        );

        Ok(PushBackResult {
            l1_address: binding.l1_address,
            l2_address,
            token_id,
            token_uri: uri,
            tx_hash,
        })
    }

    /// Flow C: mirror the L1 contract onto L2 and register the binding. An
    /// existing binding is returned without deploying.
    pub async fn deploy_and_register(
        &self,
        l1_address: Address,
        constructor_args: &[Value],
    ) -> BridgeResult<DeployOutcome> {
        if let Some(existing) = self.registry.find_by_l1(l1_address).await? {
            info!(l1 = %l1_address, l2 = %existing.l2_address, "Binding exists, skipping deployment");
            return Ok(DeployOutcome {
                binding: existing,
                deployed_now: false,
            });
        }

        let artifact = self.source.fetch(l1_address).await?;
        let l2_address = self
            .l2
            .deploy(&artifact.descriptor, &artifact.bytecode, constructor_args)
            .await?;

        let binding = ContractBinding::new(l1_address, l2_address, artifact.descriptor, artifact.bytecode);
        let (stored, inserted) = self.registry.insert_if_absent(binding).await?;
        if inserted {
            info!(l1 = %l1_address, l2 = %l2_address, "Registered contract binding");
        } else {
            warn!(
                l1 = %l1_address,
                kept = %stored.l2_address,
                orphaned = %l2_address,
                "Concurrent deployment registered first; new mirror left unbound"
            );
        }

        Ok(DeployOutcome {
            binding: stored,
            deployed_now: inserted,
        })
    }

    /// Flow D: call any function of a bound contract by name.
    pub async fn generic_invoke(
        &self,
        chain_role: &str,
        contract: Address,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<InvokeOutcome> {
        let role: ChainRole = chain_role.parse()?;
        let binding = self.binding_on(role, contract).await?;
        let invoker = self.invoker(role);

        if !invoker.supports_function(&binding.interface, function) {
            debug!(chain = %role, contract = %contract, function, "Unsupported function");
            return Ok(InvokeOutcome::UnsupportedFunction {
                name: function.to_string(),
            });
        }

        let result = match invoker
            .invoke_auto(&binding.interface, contract, function, args)
            .await?
        {
            CallOutput::Values(values) => outputs_to_json(&values),
            CallOutput::Submitted(handle) => json!({ "txHash": handle.tx_hash.to_string() }),
        };
        Ok(InvokeOutcome::Completed(result))
    }

    /// Current `tokenURI` of a token on either side of a binding.
    pub async fn token_uri(
        &self,
        role: ChainRole,
        contract: Address,
        token_id: U256,
    ) -> BridgeResult<String> {
        let binding = self.binding_on(role, contract).await?;
        self.read_uri(role, &binding.interface, contract, token_id)
            .await
    }

    /// Repair a mirror whose URI differs from L1, e.g. after a failed
    /// `setTokenURI` following a mint. Unminted tokens are left alone.
    pub async fn reconcile_token_uri(
        &self,
        l1_address: Address,
        token_id: U256,
    ) -> BridgeResult<ReconcileResult> {
        let binding = self.binding_on(ChainRole::L1, l1_address).await?;
        let descriptor = &binding.interface;
        let l2_address = binding.l2_address;

        let l1_uri = self
            .read_uri(ChainRole::L1, descriptor, l1_address, token_id)
            .await?;
        let l2_owner = self
            .read_owner(ChainRole::L2, descriptor, l2_address, token_id)
            .await?;
        if l2_owner == Address::ZERO {
            debug!(l2 = %l2_address, token_id = %token_id, "Mirror token not minted, nothing to reconcile");
            return Ok(ReconcileResult {
                token_id,
                token_uri: l1_uri,
                updated: false,
            });
        }

        let l2_uri = self
            .read_uri(ChainRole::L2, descriptor, l2_address, token_id)
            .await?;
        if l2_uri == l1_uri {
            return Ok(ReconcileResult {
                token_id,
                token_uri: l1_uri,
                updated: false,
            });
        }

        let tx_hash = self
            .set_uri(ChainRole::L2, descriptor, l2_address, token_id, &l1_uri)
            .await?;
        info!(l2 = %l2_address, token_id = %token_id, tx_hash = %tx_hash, "Reconciled mirror token URI");

        Ok(ReconcileResult {
            token_id,
            token_uri: l1_uri,
            updated: true,
        })
    }

    pub async fn update_interface(
        &self,
        l1_address: Address,
        interface: ContractInterfaceDescriptor,
    ) -> BridgeResult<ContractBinding> {
        let binding = self.registry.update_interface(l1_address, interface).await?;
        info!(l1 = %l1_address, "Updated binding interface");
        Ok(binding)
    }

    /// Rebind to a redeployed mirror. The new address must hold code.
    pub async fn update_l2_address(
        &self,
        l1_address: Address,
        l2_address: Address,
    ) -> BridgeResult<ContractBinding> {
        self.l2.code_at(l2_address).await?;
        let binding = self.registry.update_l2_address(l1_address, l2_address).await?;
        info!(l1 = %l1_address, l2 = %l2_address, "Rebound mirror contract");
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::testing::{mirror_descriptor, MockChainClient, StaticContractSource, MIRROR_BYTECODE};
    use alloy::primitives::Bytes;

    const L1_NFT: Address = Address::repeat_byte(0xaa);
    const L2_NFT: Address = Address::repeat_byte(0xbb);
    const OWNER: Address = Address::repeat_byte(0x01);
    const BOB: Address = Address::repeat_byte(0x0b);

    struct Harness {
        l1: Arc<MockChainClient>,
        l2: Arc<MockChainClient>,
        registry: Arc<InMemoryRegistry>,
        source: Arc<StaticContractSource>,
        orchestrator: BridgeOrchestrator,
    }

    fn harness_with(l2: MockChainClient) -> Harness {
        let l1 = Arc::new(MockChainClient::new(ChainRole::L1));
        let l2 = Arc::new(l2);
        let registry = Arc::new(InMemoryRegistry::new());
        let source = Arc::new(StaticContractSource::mirror());
        let orchestrator = BridgeOrchestrator::new(
            ContractInvoker::new(l1.clone()),
            ContractInvoker::new(l2.clone()),
            registry.clone(),
            source.clone(),
        );
        Harness {
            l1,
            l2,
            registry,
            source,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(MockChainClient::new(ChainRole::L2))
    }

    async fn bind(h: &Harness) {
        h.registry
            .insert_if_absent(ContractBinding::new(
                L1_NFT,
                L2_NFT,
                mirror_descriptor(),
                Bytes::copy_from_slice(&MIRROR_BYTECODE),
            ))
            .await
            .unwrap();
    }

    fn five() -> U256 {
        U256::from(5)
    }

    fn synced(outcome: LoginOutcome) -> SyncResult {
        match outcome {
            LoginOutcome::Synced(result) => result,
            other => panic!("expected Synced, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_mints_and_sets_uri_when_unminted() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l1.set_token_uri(L1_NFT, five(), "ipfs://meta/5");

        let result = synced(
            h.orchestrator
                .login_and_sync(OWNER, L1_NFT, five())
                .await
                .unwrap(),
        );

        assert!(result.minted_now);
        assert_eq!(result.l2_address, L2_NFT);
        assert_eq!(
            h.l2.sent_functions(),
            vec!["mint".to_string(), "setTokenURI".to_string()]
        );
        assert_eq!(h.l2.owner(L2_NFT, five()), Some(OWNER));
        assert_eq!(h.l2.token_uri(L2_NFT, five()).as_deref(), Some("ipfs://meta/5"));
        assert!(h.l1.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_owner_without_touching_l2() {
        let h = harness_with(MockChainClient::forbidden(ChainRole::L2));
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);

        let outcome = h
            .orchestrator
            .login_and_sync(BOB, L1_NFT, five())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::OwnershipRejected {
                claimed_owner: BOB,
                actual_owner: OWNER,
            }
        );
        assert_eq!(h.l2.call_count(), 0);
        assert_eq!(h.l1.read_functions(), vec!["ownerOf".to_string()]);
    }

    #[tokio::test]
    async fn test_login_accepts_owner_in_any_case() {
        let h = harness();
        bind(&h).await;
        let owner = crate::types::parse_address("0xABCDEF0000000000000000000000000000000001").unwrap();
        h.l1.set_owner(L1_NFT, five(), owner);
        h.l2.set_owner(L2_NFT, five(), owner);

        let claimed = crate::types::parse_address("0xabcdef0000000000000000000000000000000001").unwrap();
        let result = synced(
            h.orchestrator
                .login_and_sync(claimed, L1_NFT, five())
                .await
                .unwrap(),
        );
        assert_eq!(result.owner_address, owner);
    }

    #[tokio::test]
    async fn test_login_is_idempotent_when_already_minted() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.set_owner(L2_NFT, five(), OWNER);

        let result = synced(
            h.orchestrator
                .login_and_sync(OWNER, L1_NFT, five())
                .await
                .unwrap(),
        );

        assert!(!result.minted_now);
        assert!(h.l2.sent_functions().is_empty());
        assert!(h.l1.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_login_twice_mints_once() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);

        for _ in 0..2 {
            h.orchestrator
                .login_and_sync(OWNER, L1_NFT, five())
                .await
                .unwrap();
        }
        let mints = h
            .l2
            .sent_functions()
            .into_iter()
            .filter(|f| f == "mint")
            .count();
        assert_eq!(mints, 1);
    }

    #[tokio::test]
    async fn test_login_unknown_contract_is_binding_not_found() {
        let h = harness();
        let err = h
            .orchestrator
            .login_and_sync(OWNER, L1_NFT, five())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BindingNotFound { .. }));
        assert_eq!(h.l1.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_recovers_from_duplicate_mint() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.preempt_mint(L2_NFT, five(), OWNER);

        let result = synced(
            h.orchestrator
                .login_and_sync(OWNER, L1_NFT, five())
                .await
                .unwrap(),
        );

        assert!(!result.minted_now);
        assert_eq!(h.l2.sent_functions(), vec!["mint".to_string()]);
    }

    #[tokio::test]
    async fn test_login_recovers_from_mint_reverted_in_receipt() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.preempt_mint_at_receipt(L2_NFT, five(), OWNER);

        let result = synced(
            h.orchestrator
                .login_and_sync(OWNER, L1_NFT, five())
                .await
                .unwrap(),
        );

        assert!(!result.minted_now);
        assert_eq!(h.l2.sent_functions(), vec!["mint".to_string()]);
        assert_eq!(h.l2.owner(L2_NFT, five()), Some(OWNER));
        assert_eq!(h.l2.token_uri(L2_NFT, five()), None);
    }

    #[tokio::test]
    async fn test_login_propagates_receipt_revert_for_other_owner() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.preempt_mint_at_receipt(L2_NFT, five(), BOB);

        let err = h
            .orchestrator
            .login_and_sync(OWNER, L1_NFT, five())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::RemoteCallReverted(_)));
        assert_eq!(h.l2.sent_functions(), vec!["mint".to_string()]);
    }

    #[tokio::test]
    async fn test_login_propagates_mint_failure_for_other_owner() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.preempt_mint(L2_NFT, five(), BOB);

        let err = h
            .orchestrator
            .login_and_sync(OWNER, L1_NFT, five())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::GasEstimationFailed(_)));
    }

    #[tokio::test]
    async fn test_set_uri_failure_after_mint_propagates_and_reconcile_repairs() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l1.set_token_uri(L1_NFT, five(), "ipfs://meta/5");
        h.l2.fail_next_send(
            "setTokenURI",
            BridgeError::RemoteCallReverted("out of gas".to_string()),
        );

        let err = h
            .orchestrator
            .login_and_sync(OWNER, L1_NFT, five())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::RemoteCallReverted(_)));
        assert_eq!(h.l2.owner(L2_NFT, five()), Some(OWNER));
        assert_eq!(h.l2.token_uri(L2_NFT, five()), None);

        let repaired = h
            .orchestrator
            .reconcile_token_uri(L1_NFT, five())
            .await
            .unwrap();
        assert!(repaired.updated);
        assert_eq!(h.l2.token_uri(L2_NFT, five()).as_deref(), Some("ipfs://meta/5"));

        let again = h
            .orchestrator
            .reconcile_token_uri(L1_NFT, five())
            .await
            .unwrap();
        assert!(!again.updated);
    }

    #[tokio::test]
    async fn test_reconcile_skips_unminted_token() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l1.set_token_uri(L1_NFT, five(), "ipfs://meta/5");

        let result = h
            .orchestrator
            .reconcile_token_uri(L1_NFT, five())
            .await
            .unwrap();
        assert!(!result.updated);
        assert!(h.l2.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_update_l1_from_l2_pushes_uri() {
        let h = harness();
        bind(&h).await;
        h.l1.set_owner(L1_NFT, five(), OWNER);
        h.l2.set_owner(L2_NFT, five(), OWNER);
        h.l2.set_token_uri(L2_NFT, five(), "ipfs://meta/5-v2");

        let pushed = h
            .orchestrator
            .update_l1_from_l2(L2_NFT, five())
            .await
            .unwrap();

        assert_eq!(pushed.l1_address, L1_NFT);
        assert_eq!(pushed.token_uri, "ipfs://meta/5-v2");
        assert_eq!(h.l1.sent_functions(), vec!["setTokenURI".to_string()]);
        assert_eq!(h.l1.token_uri(L1_NFT, five()).as_deref(), Some("ipfs://meta/5-v2"));
        assert!(h.l2.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_update_l1_from_unknown_l2_contract() {
        let h = harness();
        bind(&h).await;
        let err = h
            .orchestrator
            .update_l1_from_l2(L1_NFT, five())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BindingNotFound { .. }));
    }

    #[tokio::test]
    async fn test_deploy_rejects_constructor_mismatch_before_deploying() {
        let h = harness_with(MockChainClient::forbidden(ChainRole::L2));

        let err = h
            .orchestrator
            .deploy_and_register(L1_NFT, &[])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BridgeError::ConstructorArgumentMismatch {
                expected: 2,
                actual: 0
            }
        );
        assert_eq!(h.l2.call_count(), 0);
        assert!(h.registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_and_register_is_idempotent() {
        let h = harness();
        let args = [json!("Mirror"), json!("MIR")];

        let first = h
            .orchestrator
            .deploy_and_register(L1_NFT, &args)
            .await
            .unwrap();
        assert!(first.deployed_now);
        assert_eq!(first.binding.l1_address, L1_NFT);

        let second = h
            .orchestrator
            .deploy_and_register(L1_NFT, &args)
            .await
            .unwrap();
        assert!(!second.deployed_now);
        assert_eq!(second.binding.l2_address, first.binding.l2_address);

        assert_eq!(h.l2.deploy_count(), 1);
        assert_eq!(h.source.fetch_count(), 1);
        assert_eq!(h.registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_failure_registers_nothing() {
        let h = harness();
        h.l2.fail_next_deploy(BridgeError::DeploymentReverted("reverted".to_string()));

        let err = h
            .orchestrator
            .deploy_and_register(L1_NFT, &[json!("Mirror"), json!("MIR")])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DeploymentReverted(_)));
        assert!(h.registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_without_verified_source() {
        let l1 = Arc::new(MockChainClient::new(ChainRole::L1));
        let l2 = Arc::new(MockChainClient::forbidden(ChainRole::L2));
        let orchestrator = BridgeOrchestrator::new(
            ContractInvoker::new(l1),
            ContractInvoker::new(l2),
            Arc::new(InMemoryRegistry::new()),
            Arc::new(StaticContractSource::empty()),
        );
        let err = orchestrator
            .deploy_and_register(L1_NFT, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Explorer(_)));
    }

    #[tokio::test]
    async fn test_generic_invoke_reads_and_writes() {
        let h = harness();
        bind(&h).await;
        h.l2.set_owner(L2_NFT, five(), OWNER);

        let read = h
            .orchestrator
            .generic_invoke("L2", L2_NFT, "ownerOf", &[json!("5")])
            .await
            .unwrap();
        assert_eq!(read, InvokeOutcome::Completed(json!(OWNER.to_checksum(None))));

        let write = h
            .orchestrator
            .generic_invoke("l2", L2_NFT, "setTokenURI", &[json!("5"), json!("ipfs://x")])
            .await
            .unwrap();
        assert!(matches!(write, InvokeOutcome::Completed(Value::Object(_))));
        assert_eq!(h.l2.token_uri(L2_NFT, five()).as_deref(), Some("ipfs://x"));
    }

    #[tokio::test]
    async fn test_generic_invoke_unsupported_function() {
        let h = harness_with(MockChainClient::forbidden(ChainRole::L2));
        bind(&h).await;

        let outcome = h
            .orchestrator
            .generic_invoke("l2", L2_NFT, "burn", &[json!("5")])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InvokeOutcome::UnsupportedFunction {
                name: "burn".to_string()
            }
        );
        assert_eq!(h.l2.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generic_invoke_invalid_chain_and_arity() {
        let h = harness();
        bind(&h).await;

        let err = h
            .orchestrator
            .generic_invoke("l3", L1_NFT, "ownerOf", &[json!("5")])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidChainType(_)));

        let err = h
            .orchestrator
            .generic_invoke("l1", L1_NFT, "ownerOf", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ArgumentCountMismatch { .. }));
        assert_eq!(h.l1.call_count(), 0);
    }

    #[tokio::test]
    async fn test_token_uri_round_trip() {
        let h = harness();
        bind(&h).await;
        h.l2.set_owner(L2_NFT, five(), OWNER);

        h.orchestrator
            .generic_invoke("l2", L2_NFT, "setTokenURI", &[json!("5"), json!("ipfs://rt")])
            .await
            .unwrap();
        let uri = h
            .orchestrator
            .token_uri(ChainRole::L2, L2_NFT, five())
            .await
            .unwrap();
        assert_eq!(uri, "ipfs://rt");
    }

    #[tokio::test]
    async fn test_update_l2_address_requires_code() {
        let h = harness();
        bind(&h).await;
        let redeployed = Address::repeat_byte(0xcc);

        let err = h
            .orchestrator
            .update_l2_address(L1_NFT, redeployed)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::AddressNotAContract { .. }));

        h.l2.set_code(redeployed, Bytes::from_static(&[0x60, 0x80]));
        let binding = h
            .orchestrator
            .update_l2_address(L1_NFT, redeployed)
            .await
            .unwrap();
        assert_eq!(binding.l2_address, redeployed);
        assert!(h
            .registry
            .find_by_l2(redeployed)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_interface_changes_supported_functions() {
        let h = harness();
        bind(&h).await;
        let reduced = ContractInterfaceDescriptor::from_json_str(
            r#"[{"type":"function","name":"ownerOf","stateMutability":"view",
                 "inputs":[{"name":"tokenId","type":"uint256"}],
                 "outputs":[{"name":"","type":"address"}]}]"#,
        )
        .unwrap();

        h.orchestrator
            .update_interface(L1_NFT, reduced)
            .await
            .unwrap();
        let outcome = h
            .orchestrator
            .generic_invoke("l1", L1_NFT, "mint", &[json!(OWNER.to_string()), json!("5")])
            .await
            .unwrap();
        assert!(matches!(outcome, InvokeOutcome::UnsupportedFunction { .. }));
    }
}
