use proptest::prelude::*;

use lattice_types::{
    Amount, BlockHash, BlockKind, Height, KeyIndex, NetworkId, Receivable, Seed, Timestamp,
};
use lattice_wallet_core::block_builder::{build_receive, build_send};
use lattice_wallet_core::keys::derive;
use lattice_wallet_core::{AccountState, WalletError};

fn open_state(balance: u64, last: u64) -> AccountState {
    let account = derive(&Seed::new([9; 64]), KeyIndex::new(0)).unwrap();
    AccountState {
        index: KeyIndex::new(0),
        address: account.address.clone(),
        height: Height::new(3),
        frontier: Some(BlockHash::new([3; 32])),
        balance: Amount::new(balance),
        representative: Some(account.address),
        timestamp: Timestamp::from_millis(last),
    }
}

fn other_address() -> lattice_types::Address {
    derive(&Seed::new([9; 64]), KeyIndex::new(1)).unwrap().address
}

proptest! {
    /// A send either debits exactly `amount` or fails without a block.
    #[test]
    fn send_conserves_balance(balance in 0u64..1_000_000, amount in 0u64..1_000_000) {
        let state = open_state(balance, 10);
        let result = build_send(
            &state,
            NetworkId::Dev,
            &other_address(),
            Amount::new(amount),
            None,
            Timestamp::from_millis(5),
        );
        match result {
            Ok(block) => {
                prop_assert!(amount > 0 && amount <= balance);
                prop_assert_eq!(block.balance.raw(), balance - amount);
                prop_assert_eq!(block.height, Height::new(4));
                prop_assert!(block.timestamp > state.timestamp);
            }
            Err(WalletError::InvalidAmount) => prop_assert_eq!(amount, 0),
            Err(WalletError::InsufficientBalance { .. }) => prop_assert!(amount > balance),
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    /// Receive timestamps never precede the receivable they consume.
    #[test]
    fn receive_follows_its_source(sent_at in 0u64..1_000_000, now in 0u64..1_000_000) {
        let state = open_state(100, 1);
        let receivable = Receivable {
            source_hash: BlockHash::new([7; 32]),
            source_account: other_address(),
            receiver: state.address.clone(),
            amount: Amount::new(50),
            timestamp: Timestamp::from_millis(sent_at),
        };
        let block = build_receive(
            &state,
            NetworkId::Dev,
            &receivable,
            None,
            Timestamp::from_millis(now),
        )
        .unwrap();
        prop_assert_eq!(block.kind, BlockKind::Receive);
        prop_assert!(block.timestamp > receivable.timestamp);
        prop_assert_eq!(block.balance, Amount::new(150));
    }
}
