//! In-process ledger and fixtures for tests
//!
//! [`MockChainClient`] models one ERC-721 ledger with per-token URIs and
//! records every call it receives. [`MockChainClient::forbidden`] builds a
//! client that panics on any ledger access, for asserting that validation
//! short-circuits before the network.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::abi::ContractInterfaceDescriptor;
use crate::chain::{ChainClient, SubmissionLane};
use crate::error::{BridgeError, BridgeResult};
use crate::explorer::{ContractArtifact, ContractSource};
use crate::types::{ChainRole, TransactionHandle, TransactionReceiptSummary};

/// ABI of the mirrored NFT contract used across tests.
pub const MIRROR_ABI_JSON: &str = r#"[
  {"type": "constructor", "stateMutability": "nonpayable", "inputs": [
    {"name": "name_", "type": "string"},
    {"name": "symbol_", "type": "string"}
  ]},
  {"type": "function", "name": "name", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "string"}]},
  {"type": "function", "name": "ownerOf", "stateMutability": "view",
   "inputs": [{"name": "tokenId", "type": "uint256"}],
   "outputs": [{"name": "", "type": "address"}]},
  {"type": "function", "name": "tokenURI", "stateMutability": "view",
   "inputs": [{"name": "tokenId", "type": "uint256"}],
   "outputs": [{"name": "", "type": "string"}]},
  {"type": "function", "name": "mint", "stateMutability": "nonpayable",
   "inputs": [{"name": "to", "type": "address"}, {"name": "tokenId", "type": "uint256"}],
   "outputs": []},
  {"type": "function", "name": "setTokenURI", "stateMutability": "nonpayable",
   "inputs": [{"name": "tokenId", "type": "uint256"}, {"name": "uri", "type": "string"}],
   "outputs": []},
  {"type": "event", "name": "Transfer", "anonymous": false, "inputs": [
    {"name": "from", "type": "address", "indexed": true},
    {"name": "to", "type": "address", "indexed": true},
    {"name": "tokenId", "type": "uint256", "indexed": true}
  ]}
]"#;

/// Stand-in creation bytecode for the mirror contract.
pub const MIRROR_BYTECODE: [u8; 8] = [0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15];

pub fn mirror_descriptor() -> ContractInterfaceDescriptor {
    ContractInterfaceDescriptor::from_json_str(MIRROR_ABI_JSON)
        .expect("fixture ABI is well-formed")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Read,
    Send,
    Confirm,
    GetCode,
    Deploy,
}

/// One ledger access seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub address: Option<Address>,
    pub function: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct LedgerState {
    owners: HashMap<(Address, U256), Address>,
    uris: HashMap<(Address, U256), String>,
    code: HashMap<Address, Bytes>,
    calls: Vec<RecordedCall>,
    tx_counter: u64,
    deploy_counter: u64,
    send_failures: HashMap<String, BridgeError>,
    deploy_failure: Option<BridgeError>,
    /// Token minted by a concurrent actor right before our mint lands
    preempted_mints: HashMap<(Address, U256), Address>,
    /// Same race, but lost only when the block is built: the mint is
    /// accepted and its receipt reverts
    receipt_preempted_mints: HashMap<(Address, U256), Address>,
    reverting_receipts: HashMap<B256, ((Address, U256), Address)>,
}

impl LedgerState {
    fn next_tx_hash(&mut self) -> B256 {
        self.tx_counter += 1;
        B256::from(U256::from(self.tx_counter))
    }
}

/// Scripted ERC-721 ledger
pub struct MockChainClient {
    role: ChainRole,
    signer: Address,
    forbidden: bool,
    state: Mutex<LedgerState>,
    lane: SubmissionLane,
    send_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockChainClient {
    pub fn new(role: ChainRole) -> Self {
        Self {
            role,
            signer: Address::repeat_byte(0x5e),
            forbidden: false,
            state: Mutex::new(LedgerState::default()),
            lane: SubmissionLane::new(),
            send_gate: Mutex::new(None),
        }
    }

    /// A client that panics if any ledger method is reached.
    pub fn forbidden(role: ChainRole) -> Self {
        Self {
            forbidden: true,
            ..Self::new(role)
        }
    }

    fn guard(&self, method: &str) {
        if self.forbidden {
            panic!("{} ChainClient::{} must not be called", self.role, method);
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().expect("mock ledger lock poisoned")
    }

    fn record(&self, kind: CallKind, address: Option<Address>, function: &str, args: &[Value]) {
        self.state().calls.push(RecordedCall {
            kind,
            address,
            function: function.to_string(),
            args: args.to_vec(),
        });
    }

    // ---------------------------------------------------------------------
    // Scripting
    // ---------------------------------------------------------------------

    pub fn set_owner(&self, contract: Address, token_id: U256, owner: Address) {
        self.state().owners.insert((contract, token_id), owner);
    }

    pub fn set_token_uri(&self, contract: Address, token_id: U256, uri: &str) {
        self.state().uris.insert((contract, token_id), uri.to_string());
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    /// Make the next submission of `function` fail with `error`.
    pub fn fail_next_send(&self, function: &str, error: BridgeError) {
        self.state().send_failures.insert(function.to_string(), error);
    }

    pub fn fail_next_deploy(&self, error: BridgeError) {
        self.state().deploy_failure = Some(error);
    }

    /// Simulate a concurrent mint of the token landing first: our `mint`
    /// reverts and `winner` owns the token afterwards.
    pub fn preempt_mint(&self, contract: Address, token_id: U256, winner: Address) {
        self.state().preempted_mints.insert((contract, token_id), winner);
    }

    /// Like [`Self::preempt_mint`], but our `mint` is accepted and its
    /// receipt reverts.
    pub fn preempt_mint_at_receipt(&self, contract: Address, token_id: U256, winner: Address) {
        self.state()
            .receipt_preempted_mints
            .insert((contract, token_id), winner);
    }

    /// Hold the next submission inside the lane until the returned sender
    /// fires or is dropped.
    pub fn hold_next_send(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.send_gate.lock().expect("send gate lock poisoned") = Some(gate);
        release
    }

    pub fn lane_idle(&self) -> bool {
        self.lane.is_idle()
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    pub fn owner(&self, contract: Address, token_id: U256) -> Option<Address> {
        self.state().owners.get(&(contract, token_id)).copied()
    }

    pub fn token_uri(&self, contract: Address, token_id: U256) -> Option<String> {
        self.state().uris.get(&(contract, token_id)).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn functions_of(&self, kind: CallKind) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.function.clone())
            .collect()
    }

    /// Names of submitted functions, in submission order.
    pub fn sent_functions(&self) -> Vec<String> {
        self.functions_of(CallKind::Send)
    }

    pub fn read_functions(&self) -> Vec<String> {
        self.functions_of(CallKind::Read)
    }

    pub fn deploy_count(&self) -> usize {
        self.functions_of(CallKind::Deploy).len()
    }
}

impl MockChainClient {
    fn apply_send(
        &self,
        address: Address,
        function: &str,
        values: &[DynSolValue],
    ) -> BridgeResult<TransactionHandle> {
        let mut state = self.state();
        if let Some(err) = state.send_failures.remove(function) {
            return Err(err);
        }

        match function {
            "mint" => {
                let to = address_arg(values, 0)?;
                let token_id = uint_arg(values, 1)?;
                let key = (address, token_id);
                if let Some(winner) = state.preempted_mints.remove(&key) {
                    state.owners.insert(key, winner);
                    return Err(BridgeError::GasEstimationFailed(
                        "execution reverted: ERC721: token already minted".to_string(),
                    ));
                }
                if state.owners.contains_key(&key) {
                    return Err(BridgeError::GasEstimationFailed(
                        "execution reverted: ERC721: token already minted".to_string(),
                    ));
                }
                if let Some(winner) = state.receipt_preempted_mints.remove(&key) {
                    let tx_hash = state.next_tx_hash();
                    state.reverting_receipts.insert(tx_hash, (key, winner));
                    return Ok(TransactionHandle {
                        role: self.role,
                        tx_hash,
                    });
                }
                state.owners.insert(key, to);
            }
            "setTokenURI" => {
                let token_id = uint_arg(values, 0)?;
                let uri = string_arg(values, 1)?;
                if !state.owners.contains_key(&(address, token_id)) {
                    return Err(BridgeError::GasEstimationFailed(
                        "execution reverted: URI set of nonexistent token".to_string(),
                    ));
                }
                state.uris.insert((address, token_id), uri);
            }
            _ => {}
        }

        Ok(TransactionHandle {
            role: self.role,
            tx_hash: state.next_tx_hash(),
        })
    }
}

fn uint_arg(values: &[DynSolValue], index: usize) -> BridgeResult<U256> {
    match values.get(index) {
        Some(DynSolValue::Uint(v, _)) => Ok(*v),
        other => Err(BridgeError::RemoteCallReverted(format!(
            "mock: expected uint at {}, got {:?}",
            index, other
        ))),
    }
}

fn address_arg(values: &[DynSolValue], index: usize) -> BridgeResult<Address> {
    match values.get(index) {
        Some(DynSolValue::Address(a)) => Ok(*a),
        other => Err(BridgeError::RemoteCallReverted(format!(
            "mock: expected address at {}, got {:?}",
            index, other
        ))),
    }
}

fn string_arg(values: &[DynSolValue], index: usize) -> BridgeResult<String> {
    match values.get(index) {
        Some(DynSolValue::String(s)) => Ok(s.clone()),
        other => Err(BridgeError::RemoteCallReverted(format!(
            "mock: expected string at {}, got {:?}",
            index, other
        ))),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn role(&self) -> ChainRole {
        self.role
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn read_call(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<Vec<DynSolValue>> {
        self.guard("read_call");
        self.record(CallKind::Read, Some(address), function, args);
        let (_, values) = descriptor.coerce_call(function, args)?;

        let state = self.state();
        match function {
            "ownerOf" => {
                let token_id = uint_arg(&values, 0)?;
                let owner = state
                    .owners
                    .get(&(address, token_id))
                    .copied()
                    .unwrap_or(Address::ZERO);
                Ok(vec![DynSolValue::Address(owner)])
            }
            "tokenURI" => {
                let token_id = uint_arg(&values, 0)?;
                let uri = state
                    .uris
                    .get(&(address, token_id))
                    .cloned()
                    .unwrap_or_default();
                Ok(vec![DynSolValue::String(uri)])
            }
            "name" => Ok(vec![DynSolValue::String("Mirror".to_string())]),
            other => Err(BridgeError::RemoteCallReverted(format!(
                "mock: no handler for {}",
                other
            ))),
        }
    }

    async fn send_transaction(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<TransactionHandle> {
        self.guard("send_transaction");
        self.record(CallKind::Send, Some(address), function, args);
        let (_, values) = descriptor.coerce_call(function, args)?;
        let gate = self.send_gate.lock().expect("send gate lock poisoned").take();

        self.lane
            .submit(|| async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                self.apply_send(address, function, &values)
            })
            .await
    }

    async fn confirm(&self, handle: &TransactionHandle) -> BridgeResult<TransactionReceiptSummary> {
        self.guard("confirm");
        self.record(CallKind::Confirm, None, "", &[]);
        {
            let mut state = self.state();
            if let Some((key, winner)) = state.reverting_receipts.remove(&handle.tx_hash) {
                state.owners.insert(key, winner);
                return Err(BridgeError::RemoteCallReverted(format!(
                    "transaction {} reverted",
                    handle.tx_hash
                )));
            }
        }
        Ok(TransactionReceiptSummary {
            tx_hash: handle.tx_hash,
            block_number: Some(1),
            gas_used: 21_000,
            contract_address: None,
        })
    }

    async fn get_code(&self, address: Address) -> BridgeResult<Bytes> {
        self.guard("get_code");
        self.record(CallKind::GetCode, Some(address), "", &[]);
        match self.state().code.get(&address) {
            Some(code) if !code.is_empty() => Ok(code.clone()),
            _ => Err(BridgeError::AddressNotAContract {
                address: address.to_string(),
            }),
        }
    }

    async fn deploy_contract(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        bytecode: &Bytes,
        constructor_args: &[Value],
    ) -> BridgeResult<Address> {
        self.guard("deploy_contract");
        self.record(CallKind::Deploy, None, "constructor", constructor_args);
        let init_code = descriptor.encode_deployment(bytecode, constructor_args)?;

        let mut state = self.state();
        if let Some(err) = state.deploy_failure.take() {
            return Err(err);
        }
        state.deploy_counter += 1;
        let address = Address::from_word(B256::from(U256::from(0xd000 + state.deploy_counter)));
        state.code.insert(address, init_code);
        Ok(address)
    }
}

/// Code-introspection stand-in returning one fixed artifact
pub struct StaticContractSource {
    artifact: Option<ContractArtifact>,
    fetches: Mutex<usize>,
}

impl StaticContractSource {
    pub fn new(descriptor: ContractInterfaceDescriptor, bytecode: Bytes) -> Self {
        Self {
            artifact: Some(ContractArtifact {
                descriptor,
                bytecode,
            }),
            fetches: Mutex::new(0),
        }
    }

    /// The mirror contract fixture.
    pub fn mirror() -> Self {
        Self::new(mirror_descriptor(), Bytes::copy_from_slice(&MIRROR_BYTECODE))
    }

    /// A source that knows no contracts.
    pub fn empty() -> Self {
        Self {
            artifact: None,
            fetches: Mutex::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().expect("fetch counter lock poisoned")
    }
}

#[async_trait]
impl ContractSource for StaticContractSource {
    async fn fetch(&self, address: Address) -> BridgeResult<ContractArtifact> {
        *self.fetches.lock().expect("fetch counter lock poisoned") += 1;
        self.artifact
            .clone()
            .ok_or_else(|| BridgeError::Explorer(format!("no verified source for {}", address)))
    }
}
