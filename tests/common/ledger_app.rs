//! [`LedgerApp`], a simple implementation of [`App`] used in the integration tests.

use isaac_rs::{
    app::{App, AppError, AppStateView, ApplyTransactionRequest, ValidateTransactionRequest},
    ballot::basis::VotingBasis,
    types::{
        data_types::{Address, Amount},
        transaction::{Operation, Transaction},
        update_sets::AppStateUpdates,
    },
};

use crate::common::mem_db::MemDB;

/// A ledger of account balances.
///
/// The balance of each account is stored in the app state under the bytes of its address, as a
/// little-endian `u64`. Every block mints [`LedgerApp::INFLATION`] into the common account.
pub(crate) struct LedgerApp;

impl LedgerApp {
    pub(crate) const INFLATION: Amount = Amount::new(10);

    /// An initial app state in which every account in `accounts` holds `amount`.
    pub(crate) fn initial_app_state(accounts: &[Address], amount: Amount) -> AppStateUpdates {
        let mut state = AppStateUpdates::new();
        for account in accounts {
            state.insert(account.bytes().to_vec(), amount.int().to_le_bytes().to_vec());
        }
        state
    }

    /// Decode a balance as stored in the app state.
    pub(crate) fn decode_balance(bytes: Vec<u8>) -> Amount {
        Amount::new(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn balance(app_state: &AppStateView<MemDB>, account: &Address) -> Option<Amount> {
        app_state.app_state(&account.bytes()).map(Self::decode_balance)
    }

    /// Compute the balances changed by `transaction`, reading the current balances from `app_state`.
    fn execute(
        app_state: &AppStateView<MemDB>,
        transaction: &Transaction,
    ) -> Result<AppStateUpdates, AppError> {
        let mut changes: Vec<(Address, Amount)> = Vec::new();
        let balance_of = |changes: &Vec<(Address, Amount)>, account: &Address| {
            changes
                .iter()
                .rev()
                .find(|(changed, _)| changed == account)
                .map(|(_, amount)| *amount)
                .or_else(|| Self::balance(app_state, account))
        };

        let mut debit = transaction.fee();
        for operation in transaction.operations() {
            match operation {
                Operation::CreateAccount { target, amount } => {
                    if balance_of(&changes, target).is_some() {
                        return Err(invalid("account already exists"));
                    }
                    changes.push((*target, *amount));
                    debit = debit.checked_add(*amount).ok_or_else(|| invalid("overflow"))?;
                }
                Operation::Payment { target, amount } => {
                    let balance = balance_of(&changes, target).ok_or_else(|| invalid("no such account"))?;
                    changes.push((*target, balance.checked_add(*amount).ok_or_else(|| invalid("overflow"))?));
                    debit = debit.checked_add(*amount).ok_or_else(|| invalid("overflow"))?;
                }
                Operation::CollectTxFee { target, amount, .. } | Operation::Inflation { target, amount, .. } => {
                    let balance = balance_of(&changes, target).unwrap_or(Amount::zero());
                    changes.push((*target, balance.checked_add(*amount).ok_or_else(|| invalid("overflow"))?));
                }
            }
        }

        if debit != Amount::zero() {
            let source = transaction.source();
            let balance = balance_of(&changes, source).ok_or_else(|| invalid("no such account"))?;
            let remaining = balance
                .checked_sub(debit)
                .ok_or_else(|| invalid("insufficient balance"))?;
            changes.push((*source, remaining));
        }

        let mut updates = AppStateUpdates::new();
        for (account, amount) in changes {
            updates.insert(account.bytes().to_vec(), amount.int().to_le_bytes().to_vec());
        }
        Ok(updates)
    }
}

fn invalid(reason: &str) -> AppError {
    AppError::InvalidTransaction {
        reason: reason.to_string(),
    }
}

impl App<MemDB> for LedgerApp {
    fn validate_transaction(&self, request: ValidateTransactionRequest<MemDB>) -> Result<(), AppError> {
        Self::execute(request.app_state(), request.transaction()).map(|_| ())
    }

    fn inflation_amount(&self, _: &VotingBasis) -> Amount {
        Self::INFLATION
    }

    fn apply_transaction(
        &self,
        request: ApplyTransactionRequest<MemDB>,
    ) -> Result<AppStateUpdates, AppError> {
        Self::execute(request.app_state(), request.transaction())
    }
}
