//! Contract binding registry
//!
//! Durable L1 ↔ L2 contract bindings keyed by the L1 address. The
//! orchestrator only depends on [`ContractRegistry`]; [`InMemoryRegistry`]
//! serves tests and database-less runs, [`PgContractRegistry`] persists to
//! PostgreSQL.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::WrapErr;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::abi::ContractInterfaceDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{parse_address, ContractBinding};

/// Persistence for contract bindings.
///
/// Lookups by either side compare addresses case-insensitively; both sides
/// are stored as parsed addresses.
#[async_trait]
pub trait ContractRegistry: Send + Sync {
    async fn find_by_l1(&self, l1_address: Address) -> BridgeResult<Option<ContractBinding>>;

    async fn find_by_l2(&self, l2_address: Address) -> BridgeResult<Option<ContractBinding>>;

    /// Insert unless a binding for the same L1 address exists. Returns the
    /// binding that is stored afterwards and whether this call inserted it.
    async fn insert_if_absent(&self, binding: ContractBinding) -> BridgeResult<(ContractBinding, bool)>;

    /// Replace the interface descriptor of an existing binding.
    async fn update_interface(
        &self,
        l1_address: Address,
        interface: ContractInterfaceDescriptor,
    ) -> BridgeResult<ContractBinding>;

    /// Point an existing binding at a redeployed mirror.
    async fn update_l2_address(
        &self,
        l1_address: Address,
        l2_address: Address,
    ) -> BridgeResult<ContractBinding>;

    async fn list(&self) -> BridgeResult<Vec<ContractBinding>>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local registry
#[derive(Default)]
pub struct InMemoryRegistry {
    bindings: RwLock<HashMap<Address, ContractBinding>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractRegistry for InMemoryRegistry {
    async fn find_by_l1(&self, l1_address: Address) -> BridgeResult<Option<ContractBinding>> {
        Ok(self.bindings.read().await.get(&l1_address).cloned())
    }

    async fn find_by_l2(&self, l2_address: Address) -> BridgeResult<Option<ContractBinding>> {
        Ok(self
            .bindings
            .read()
            .await
            .values()
            .find(|b| b.l2_address == l2_address)
            .cloned())
    }

    async fn insert_if_absent(&self, binding: ContractBinding) -> BridgeResult<(ContractBinding, bool)> {
        let mut bindings = self.bindings.write().await;
        if let Some(existing) = bindings.get(&binding.l1_address) {
            return Ok((existing.clone(), false));
        }
        bindings.insert(binding.l1_address, binding.clone());
        Ok((binding, true))
    }

    async fn update_interface(
        &self,
        l1_address: Address,
        interface: ContractInterfaceDescriptor,
    ) -> BridgeResult<ContractBinding> {
        let mut bindings = self.bindings.write().await;
        let binding = bindings
            .get_mut(&l1_address)
            .ok_or_else(|| BridgeError::binding_not_found(l1_address))?;
        binding.interface = interface;
        binding.updated_at = Utc::now();
        Ok(binding.clone())
    }

    async fn update_l2_address(
        &self,
        l1_address: Address,
        l2_address: Address,
    ) -> BridgeResult<ContractBinding> {
        let mut bindings = self.bindings.write().await;
        let binding = bindings
            .get_mut(&l1_address)
            .ok_or_else(|| BridgeError::binding_not_found(l1_address))?;
        binding.l2_address = l2_address;
        binding.updated_at = Utc::now();
        Ok(binding.clone())
    }

    async fn list(&self) -> BridgeResult<Vec<ContractBinding>> {
        let mut all: Vec<_> = self.bindings.read().await.values().cloned().collect();
        all.sort_by_key(|b| b.created_at);
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// Row of `contract_bindings`. Addresses are stored lowercase hex, the
/// interface as its JSON text.
#[derive(Debug, Clone, FromRow)]
struct BindingRow {
    l1_address: String,
    l2_address: String,
    interface: String,
    bytecode: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BindingRow> for ContractBinding {
    type Error = BridgeError;

    fn try_from(row: BindingRow) -> Result<Self, Self::Error> {
        Ok(ContractBinding {
            l1_address: parse_address(&row.l1_address)?,
            l2_address: parse_address(&row.l2_address)?,
            interface: ContractInterfaceDescriptor::from_json_str(&row.interface)?,
            bytecode: Bytes::from(row.bytecode),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn address_key(address: Address) -> String {
    format!("{:#x}", address)
}

fn db_error(context: &str, e: sqlx::Error) -> BridgeError {
    error!(error = ?e, "SQL error: {}", context);
    BridgeError::Registry(format!("{}: {}", context, e))
}

const SELECT_BINDING: &str = r#"SELECT l1_address, l2_address, interface, bytecode, created_at, updated_at
    FROM contract_bindings"#;

/// PostgreSQL-backed registry
#[derive(Clone)]
pub struct PgContractRegistry {
    pool: PgPool,
}

impl PgContractRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, run pending migrations, and return the registry.
    pub async fn connect(database_url: &str) -> eyre::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .wrap_err("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("Failed to run database migrations")?;

        Ok(Self::new(pool))
    }

    async fn fetch_one_by(&self, column: &str, address: Address) -> BridgeResult<Option<ContractBinding>> {
        let sql = format!("{} WHERE {} = $1", SELECT_BINDING, column);
        let row = sqlx::query_as::<_, BindingRow>(&sql)
            .bind(address_key(address))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up contract binding", e))?;
        row.map(ContractBinding::try_from).transpose()
    }

    async fn require(&self, l1_address: Address) -> BridgeResult<ContractBinding> {
        self.find_by_l1(l1_address)
            .await?
            .ok_or_else(|| BridgeError::binding_not_found(l1_address))
    }
}

#[async_trait]
impl ContractRegistry for PgContractRegistry {
    async fn find_by_l1(&self, l1_address: Address) -> BridgeResult<Option<ContractBinding>> {
        self.fetch_one_by("l1_address", l1_address).await
    }

    async fn find_by_l2(&self, l2_address: Address) -> BridgeResult<Option<ContractBinding>> {
        self.fetch_one_by("l2_address", l2_address).await
    }

    async fn insert_if_absent(&self, binding: ContractBinding) -> BridgeResult<(ContractBinding, bool)> {
        let interface = serde_json::to_string(binding.interface.raw_entries())
            .map_err(|e| BridgeError::Registry(format!("Failed to serialize interface: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO contract_bindings (l1_address, l2_address, interface, bytecode, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (l1_address) DO NOTHING
            "#,
        )
        .bind(address_key(binding.l1_address))
        .bind(address_key(binding.l2_address))
        .bind(&interface)
        .bind(binding.bytecode.to_vec())
        .bind(binding.created_at)
        .bind(binding.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert contract binding", e))?;

        let inserted = result.rows_affected() == 1;
        debug!(l1 = %binding.l1_address, inserted, "insert_if_absent");

        if inserted {
            Ok((binding, true))
        } else {
            Ok((self.require(binding.l1_address).await?, false))
        }
    }

    async fn update_interface(
        &self,
        l1_address: Address,
        interface: ContractInterfaceDescriptor,
    ) -> BridgeResult<ContractBinding> {
        let text = serde_json::to_string(interface.raw_entries())
            .map_err(|e| BridgeError::Registry(format!("Failed to serialize interface: {}", e)))?;

        let result = sqlx::query(
            r#"UPDATE contract_bindings SET interface = $1, updated_at = NOW() WHERE l1_address = $2"#,
        )
        .bind(&text)
        .bind(address_key(l1_address))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update interface", e))?;

        if result.rows_affected() == 0 {
            return Err(BridgeError::binding_not_found(l1_address));
        }
        self.require(l1_address).await
    }

    async fn update_l2_address(
        &self,
        l1_address: Address,
        l2_address: Address,
    ) -> BridgeResult<ContractBinding> {
        let result = sqlx::query(
            r#"UPDATE contract_bindings SET l2_address = $1, updated_at = NOW() WHERE l1_address = $2"#,
        )
        .bind(address_key(l2_address))
        .bind(address_key(l1_address))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update L2 address", e))?;

        if result.rows_affected() == 0 {
            return Err(BridgeError::binding_not_found(l1_address));
        }
        self.require(l1_address).await
    }

    async fn list(&self) -> BridgeResult<Vec<ContractBinding>> {
        let sql = format!("{} ORDER BY created_at", SELECT_BINDING);
        let rows = sqlx::query_as::<_, BindingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list contract bindings", e))?;
        rows.into_iter().map(ContractBinding::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mirror_descriptor;

    fn binding(l1: u8, l2: u8) -> ContractBinding {
        ContractBinding::new(
            Address::repeat_byte(l1),
            Address::repeat_byte(l2),
            mirror_descriptor(),
            Bytes::from_static(&[0x60, 0x80]),
        )
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first() {
        let registry = InMemoryRegistry::new();

        let (stored, inserted) = registry.insert_if_absent(binding(0xaa, 0xbb)).await.unwrap();
        assert!(inserted);
        assert_eq!(stored.l2_address, Address::repeat_byte(0xbb));

        let (stored, inserted) = registry.insert_if_absent(binding(0xaa, 0xcc)).await.unwrap();
        assert!(!inserted);
        assert_eq!(stored.l2_address, Address::repeat_byte(0xbb));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_either_side() {
        let registry = InMemoryRegistry::new();
        registry.insert_if_absent(binding(0xaa, 0xbb)).await.unwrap();

        let upper = parse_address("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert!(registry.find_by_l1(upper).await.unwrap().is_some());
        assert!(registry
            .find_by_l2(Address::repeat_byte(0xbb))
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .find_by_l1(Address::repeat_byte(0xbb))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_updates_require_existing_binding() {
        let registry = InMemoryRegistry::new();
        let err = registry
            .update_l2_address(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BindingNotFound { .. }));

        registry.insert_if_absent(binding(0xaa, 0xbb)).await.unwrap();
        let updated = registry
            .update_l2_address(Address::repeat_byte(0xaa), Address::repeat_byte(0xcc))
            .await
            .unwrap();
        assert_eq!(updated.l2_address, Address::repeat_byte(0xcc));
        assert!(updated.updated_at >= updated.created_at);

        let empty = ContractInterfaceDescriptor::parse(&[]).unwrap();
        let updated = registry
            .update_interface(Address::repeat_byte(0xaa), empty)
            .await
            .unwrap();
        assert!(!updated.interface.supports_function("ownerOf"));
    }

    #[test]
    fn test_row_conversion() {
        let row = BindingRow {
            l1_address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            l2_address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
            interface: crate::testing::MIRROR_ABI_JSON.to_string(),
            bytecode: vec![0x60, 0x80],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let binding = ContractBinding::try_from(row).unwrap();
        assert_eq!(binding.l1_address, Address::repeat_byte(0xaa));
        assert!(binding.interface.supports_function("mint"));
        assert_eq!(address_key(binding.l2_address), "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    }
}
