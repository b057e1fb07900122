//! Pure constructors for unsigned blocks.
//!
//! Builders read an [`AccountState`] snapshot and never mutate it; the
//! snapshot only moves once the submission pipeline sees the block
//! confirmed.

use lattice_crypto::validate_address;
use lattice_types::{Address, Amount, Block, BlockKind, Link, NetworkId, Receivable, Timestamp};

use crate::account::AccountState;
use crate::WalletError;

/// Block timestamps never go backwards on an account.
fn next_timestamp(state: &AccountState, now: Timestamp) -> Timestamp {
    if state.is_open() {
        now.max(state.timestamp.plus_millis(1))
    } else {
        now
    }
}

fn current_representative(state: &AccountState) -> Result<Address, WalletError> {
    state
        .representative
        .clone()
        .ok_or_else(|| WalletError::MissingRepresentative(state.address.clone()))
}

/// Move `amount` from `state`'s account to `recipient`.
///
/// `representative` replaces the account's representative in the same
/// block when given.
pub fn build_send(
    state: &AccountState,
    network: NetworkId,
    recipient: &Address,
    amount: Amount,
    representative: Option<&Address>,
    now: Timestamp,
) -> Result<Block, WalletError> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    if !validate_address(recipient.as_str()) {
        return Err(WalletError::InvalidAddress(recipient.to_string()));
    }
    if *recipient == state.address {
        return Err(WalletError::SelfSend(recipient.clone()));
    }
    let balance = state
        .balance
        .checked_sub(amount)
        .ok_or(WalletError::InsufficientBalance {
            needed: amount,
            available: state.balance,
        })?;
    let representative = match representative {
        Some(rep) => rep.clone(),
        None => current_representative(state)?,
    };

    Ok(Block {
        kind: BlockKind::Send,
        network,
        account: state.address.clone(),
        height: state.height.next(),
        previous: state.frontier,
        representative,
        balance,
        amount,
        link: Link::Destination(recipient.clone()),
        timestamp: next_timestamp(state, now),
    })
}

/// Credit `receivable` to `state`'s account.
///
/// An unopened account gets an open block, which needs `representative`.
/// Opened accounts keep their own representative.
pub fn build_receive(
    state: &AccountState,
    network: NetworkId,
    receivable: &Receivable,
    representative: Option<&Address>,
    now: Timestamp,
) -> Result<Block, WalletError> {
    if receivable.receiver != state.address {
        return Err(WalletError::NotFound(format!(
            "receivable {} for {}",
            receivable.source_hash, state.address
        )));
    }
    if receivable.amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    let balance = state
        .balance
        .checked_add(receivable.amount)
        .ok_or(WalletError::InvalidAmount)?;
    // The node refuses receives that do not come after their send.
    let timestamp = next_timestamp(state, now).max(receivable.timestamp.plus_millis(1));

    let (kind, representative) = if state.is_open() {
        (BlockKind::Receive, current_representative(state)?)
    } else {
        let rep = representative
            .cloned()
            .ok_or_else(|| WalletError::MissingRepresentative(state.address.clone()))?;
        (BlockKind::Open, rep)
    };

    Ok(Block {
        kind,
        network,
        account: state.address.clone(),
        height: state.height.next(),
        previous: state.frontier,
        representative,
        balance,
        amount: receivable.amount,
        link: Link::Source(receivable.source_hash),
        timestamp,
    })
}

/// Point `state`'s account at a new representative.
pub fn build_change(
    state: &AccountState,
    network: NetworkId,
    representative: &Address,
    now: Timestamp,
) -> Result<Block, WalletError> {
    if !state.is_open() {
        return Err(WalletError::AccountNotOpen(state.index));
    }
    if !validate_address(representative.as_str()) {
        return Err(WalletError::InvalidAddress(representative.to_string()));
    }

    Ok(Block {
        kind: BlockKind::Change,
        network,
        account: state.address.clone(),
        height: state.height.next(),
        previous: state.frontier,
        representative: representative.clone(),
        balance: state.balance,
        amount: Amount::ZERO,
        link: Link::None,
        timestamp: next_timestamp(state, now),
    })
}
