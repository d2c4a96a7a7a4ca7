use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::signature::{SignatureVerifier, WithdrawalRequest};

pub type Sats = u64;
pub type PubKey = String;
pub type OperationId = String;

pub const DEFAULT_VAULT_LABEL: &str = "Main Vault";
pub const DEFAULT_VAULT_BALANCE: Sats = 1_500_000;

/// Form field a [`LedgerError::InvalidInput`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputField {
    Destination,
    Signature,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputField::Destination => f.write_str("Destination pubkey"),
            InputField::Signature => f.write_str("Saver signature"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be a positive integer (sats).")]
    InvalidAmount,
    #[error("{field} is required.")]
    InvalidInput { field: InputField },
    #[error("Insufficient balance in vault: requested {requested} sats, available {available} sats.")]
    InsufficientBalance { requested: Sats, available: Sats },
    #[error("No pending operation to execute.")]
    NoPendingOperation,
    #[error("Operation {id} is still pending; execute it before initiating another.")]
    OperationPending { id: OperationId },
    #[error("Saver signature rejected: {0}")]
    InvalidSignature(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultConfig {
    pub label: String,
    pub balance: Sats,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_VAULT_LABEL.to_string(),
            balance: DEFAULT_VAULT_BALANCE,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub amount: Sats,
    pub destination: PubKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerPhase {
    Idle,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub vault: VaultConfig,
    pub pending: Option<PendingOperation>,
    #[serde(default)]
    pub next_sequence: u64,
}

/// Parse a raw amount string typed by the saver.
///
/// Anything that is not a positive base-10 integer is rejected, including
/// negative numbers and zero.
pub fn parse_amount(input: &str) -> Result<Sats, LedgerError> {
    match input.trim().parse::<Sats>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(LedgerError::InvalidAmount),
    }
}

/// Two-phase withdrawal ledger over a single vault balance.
///
/// Funds are deducted when a withdrawal is initiated; executing the pending
/// operation only confirms the deduction. At most one operation is pending.
#[derive(Clone, Debug, Default)]
pub struct VaultLedger {
    vault: VaultConfig,
    pending: Option<PendingOperation>,
    next_sequence: u64,
}

impl VaultLedger {
    pub fn new(label: impl Into<String>, balance: Sats) -> Self {
        Self {
            vault: VaultConfig {
                label: label.into(),
                balance,
            },
            pending: None,
            next_sequence: 0,
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            vault: snapshot.vault,
            pending: snapshot.pending,
            next_sequence: snapshot.next_sequence,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            vault: self.vault.clone(),
            pending: self.pending.clone(),
            next_sequence: self.next_sequence,
        }
    }

    pub fn vault(&self) -> &VaultConfig {
        &self.vault
    }

    pub fn balance(&self) -> Sats {
        self.vault.balance
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> LedgerPhase {
        match self.pending {
            Some(_) => LedgerPhase::Pending,
            None => LedgerPhase::Idle,
        }
    }

    /// Reserve `amount` for `destination`.
    ///
    /// The signature must be present but is not checked here; use
    /// [`VaultLedger::initiate_verified`] to run it through a verifier.
    pub fn initiate(
        &mut self,
        amount: Sats,
        destination: &str,
        signature: &str,
    ) -> Result<PendingOperation, LedgerError> {
        validate_request(amount, destination, signature)?;
        if let Some(pending) = &self.pending {
            warn!(pending = %pending.id, "initiate rejected: operation already pending");
            return Err(LedgerError::OperationPending {
                id: pending.id.clone(),
            });
        }
        if self.vault.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.vault.balance,
            });
        }

        self.vault.balance -= amount;
        let operation = PendingOperation {
            id: self.next_operation_id(),
            amount,
            destination: destination.to_string(),
        };
        self.pending = Some(operation.clone());
        info!(
            id = %operation.id,
            amount,
            balance = self.vault.balance,
            "planned withdrawal initiated"
        );
        Ok(operation)
    }

    pub fn initiate_verified<V>(
        &mut self,
        amount: Sats,
        destination: &str,
        signature: &str,
        verifier: &V,
    ) -> Result<PendingOperation, LedgerError>
    where
        V: SignatureVerifier + ?Sized,
    {
        validate_request(amount, destination, signature)?;
        let request = WithdrawalRequest {
            amount,
            destination,
            signature,
        };
        verifier
            .verify(&request)
            .map_err(|err| LedgerError::InvalidSignature(err.to_string()))?;
        self.initiate(amount, destination, signature)
    }

    /// Confirm the pending withdrawal. The balance is left untouched.
    pub fn execute(&mut self) -> Result<VaultConfig, LedgerError> {
        self.settle().map(|(vault, _)| vault)
    }

    /// Like [`VaultLedger::execute`], also handing back the settled operation.
    pub fn settle(&mut self) -> Result<(VaultConfig, PendingOperation), LedgerError> {
        let operation = self.pending.take().ok_or(LedgerError::NoPendingOperation)?;
        info!(
            id = %operation.id,
            amount = operation.amount,
            balance = self.vault.balance,
            "planned withdrawal executed"
        );
        Ok((self.vault.clone(), operation))
    }

    fn next_operation_id(&mut self) -> OperationId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let id = format!("op-{millis}-{}", self.next_sequence);
        self.next_sequence += 1;
        debug!(%id, "assigned operation id");
        id
    }
}

fn validate_request(amount: Sats, destination: &str, signature: &str) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }
    if destination.trim().is_empty() {
        return Err(LedgerError::InvalidInput {
            field: InputField::Destination,
        });
    }
    if signature.trim().is_empty() {
        return Err(LedgerError::InvalidInput {
            field: InputField::Signature,
        });
    }
    Ok(())
}

/// A [`VaultLedger`] shared between callers.
///
/// Every operation holds the lock for its whole check-then-mutate sequence.
#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<VaultLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: VaultLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn initiate(
        &self,
        amount: Sats,
        destination: &str,
        signature: &str,
    ) -> Result<PendingOperation, LedgerError> {
        self.inner.lock().initiate(amount, destination, signature)
    }

    pub fn initiate_verified<V>(
        &self,
        amount: Sats,
        destination: &str,
        signature: &str,
        verifier: &V,
    ) -> Result<PendingOperation, LedgerError>
    where
        V: SignatureVerifier + ?Sized,
    {
        self.inner
            .lock()
            .initiate_verified(amount, destination, signature, verifier)
    }

    /// Verified reservation that also returns the vault as it stood right
    /// after this reservation, read under the same lock.
    pub fn reserve_verified<V>(
        &self,
        amount: Sats,
        destination: &str,
        signature: &str,
        verifier: &V,
    ) -> Result<(VaultConfig, PendingOperation), LedgerError>
    where
        V: SignatureVerifier + ?Sized,
    {
        let mut ledger = self.inner.lock();
        let operation = ledger.initiate_verified(amount, destination, signature, verifier)?;
        Ok((ledger.vault().clone(), operation))
    }

    pub fn execute(&self) -> Result<VaultConfig, LedgerError> {
        self.inner.lock().execute()
    }

    pub fn settle(&self) -> Result<(VaultConfig, PendingOperation), LedgerError> {
        self.inner.lock().settle()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run `f` against the ledger while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&VaultLedger) -> R) -> R {
        let guard = self.inner.lock();
        f(&*guard)
    }
}

impl From<VaultLedger> for SharedLedger {
    fn from(ledger: VaultLedger) -> Self {
        Self::new(ledger)
    }
}
