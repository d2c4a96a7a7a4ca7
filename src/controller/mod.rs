use tokio::sync::watch;
use tracing::debug;

use crate::{
    format::format_sats,
    ledger::{parse_amount, PendingOperation, Sats, SharedLedger, VaultLedger},
    signature::{AcceptAnySignature, SignatureVerifier},
};

/// Everything the planned-withdrawal screen renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalState {
    pub vault_label: String,
    pub vault_balance: Sats,
    pub amount_input: String,
    pub destination_input: String,
    pub signature_input: String,
    pub initiate_result: Option<String>,
    pub pending_operation: Option<PendingOperation>,
    pub execute_result: Option<String>,
    pub error: Option<String>,
}

impl Default for WithdrawalState {
    fn default() -> Self {
        Self::from_ledger(&VaultLedger::default())
    }
}

impl WithdrawalState {
    pub fn from_ledger(ledger: &VaultLedger) -> Self {
        Self {
            vault_label: ledger.vault().label.clone(),
            vault_balance: ledger.balance(),
            amount_input: String::new(),
            destination_input: String::new(),
            signature_input: String::new(),
            initiate_result: None,
            pending_operation: ledger.pending().cloned(),
            execute_result: None,
            error: None,
        }
    }

    pub fn balance_label(&self) -> String {
        format_sats(self.vault_balance)
    }
}

/// Operations a planned-withdrawal front-end drives.
pub trait WithdrawalActions {
    fn state(&self) -> WithdrawalState;
    fn subscribe(&self) -> watch::Receiver<WithdrawalState>;
    fn update_amount_input(&self, value: &str);
    fn update_destination(&self, value: &str);
    fn update_signature(&self, value: &str);
    fn on_initiate(&self);
    fn on_execute(&self);
    fn clear_messages(&self);
}

/// Feeds form input into a [`SharedLedger`] and publishes the resulting
/// [`WithdrawalState`] to every subscriber.
pub struct WithdrawalController<V = AcceptAnySignature> {
    ledger: SharedLedger,
    verifier: V,
    state: watch::Sender<WithdrawalState>,
}

impl WithdrawalController<AcceptAnySignature> {
    pub fn new(ledger: SharedLedger) -> Self {
        Self::with_verifier(ledger, AcceptAnySignature)
    }
}

impl<V: SignatureVerifier> WithdrawalController<V> {
    pub fn with_verifier(ledger: SharedLedger, verifier: V) -> Self {
        let initial = ledger.with(WithdrawalState::from_ledger);
        let (state, _) = watch::channel(initial);
        Self {
            ledger,
            verifier,
            state,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    fn report_error(&self, message: String) {
        debug!(%message, "withdrawal action rejected");
        self.state.send_modify(|s| s.error = Some(message));
    }
}

impl<V: SignatureVerifier> WithdrawalActions for WithdrawalController<V> {
    fn state(&self) -> WithdrawalState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<WithdrawalState> {
        self.state.subscribe()
    }

    fn update_amount_input(&self, value: &str) {
        self.state.send_modify(|s| {
            s.amount_input = value.to_string();
            s.error = None;
        });
    }

    fn update_destination(&self, value: &str) {
        self.state.send_modify(|s| {
            s.destination_input = value.to_string();
            s.error = None;
        });
    }

    fn update_signature(&self, value: &str) {
        self.state.send_modify(|s| {
            s.signature_input = value.to_string();
            s.error = None;
        });
    }

    fn on_initiate(&self) {
        let (amount, destination, signature) = {
            let s = self.state.borrow();
            (
                s.amount_input.clone(),
                s.destination_input.clone(),
                s.signature_input.clone(),
            )
        };
        let result = parse_amount(&amount).and_then(|amount| {
            self.ledger
                .reserve_verified(amount, &destination, &signature, &self.verifier)
        });
        match result {
            Ok((vault, operation)) => self.state.send_modify(|s| {
                s.vault_balance = vault.balance;
                s.initiate_result =
                    Some(format!("Pending operation created (id={}).", operation.id));
                s.pending_operation = Some(operation);
                s.execute_result = None;
                s.error = None;
            }),
            Err(err) => self.report_error(err.to_string()),
        }
    }

    fn on_execute(&self) {
        match self.ledger.settle() {
            Ok((vault, operation)) => self.state.send_modify(|s| {
                s.vault_balance = vault.balance;
                s.execute_result = Some(format!(
                    "Withdrawal executed for {} sats.",
                    operation.amount
                ));
                s.pending_operation = None;
                s.error = None;
            }),
            Err(err) => self.report_error(err.to_string()),
        }
    }

    fn clear_messages(&self) {
        self.state.send_modify(|s| {
            s.initiate_result = None;
            s.execute_result = None;
            s.error = None;
        });
    }
}

/// Stand-in for demos and layout tests: remembers form input, never touches a
/// ledger.
pub struct FixtureWithdrawal {
    state: watch::Sender<WithdrawalState>,
}

impl FixtureWithdrawal {
    pub fn new(state: WithdrawalState) -> Self {
        let (state, _) = watch::channel(state);
        Self { state }
    }
}

impl Default for FixtureWithdrawal {
    fn default() -> Self {
        Self::new(WithdrawalState::default())
    }
}

impl WithdrawalActions for FixtureWithdrawal {
    fn state(&self) -> WithdrawalState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<WithdrawalState> {
        self.state.subscribe()
    }

    fn update_amount_input(&self, value: &str) {
        self.state.send_modify(|s| s.amount_input = value.to_string());
    }

    fn update_destination(&self, value: &str) {
        self.state
            .send_modify(|s| s.destination_input = value.to_string());
    }

    fn update_signature(&self, value: &str) {
        self.state.send_modify(|s| s.signature_input = value.to_string());
    }

    fn on_initiate(&self) {}

    fn on_execute(&self) {}

    fn clear_messages(&self) {}
}
