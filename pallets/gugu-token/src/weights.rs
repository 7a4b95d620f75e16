//! Weights for pallet_gugu_token.
//!
//! Hand-estimated from the storage accesses of each call until the benchmarks in
//! `benchmarking.rs` are run on reference hardware. The signature calls add the
//! cost of one secp256k1 recovery.

#![allow(unused_parens)]
#![allow(unused_imports)]

use core::marker::PhantomData;
use frame_support::{
    traits::Get,
    weights::{constants::RocksDbWeight, Weight},
};

/// Weight functions needed for pallet_gugu_token.
pub trait WeightInfo {
    fn initialize() -> Weight;
    fn transfer() -> Weight;
    fn approve() -> Weight;
    fn transfer_from() -> Weight;
    fn permit() -> Weight;
    fn delegate() -> Weight;
    fn delegate_by_sig() -> Weight;
    fn authorize_upgrade() -> Weight;
    fn transfer_principal() -> Weight;
    fn renounce_principal() -> Weight;
}

/// Weights for pallet_gugu_token using the runtime's database weights.
pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: frame_system::Config> WeightInfo for SubstrateWeight<T> {
    fn initialize() -> Weight {
        Weight::from_parts(40_000_000, 3_600)
            .saturating_add(T::DbWeight::get().reads(5_u64))
            .saturating_add(T::DbWeight::get().writes(6_u64))
    }
    /// Balances (2), Delegates (2), CheckpointCount (2), Checkpoints (2)
    fn transfer() -> Weight {
        Weight::from_parts(45_000_000, 7_200)
            .saturating_add(T::DbWeight::get().reads(8_u64))
            .saturating_add(T::DbWeight::get().writes(6_u64))
    }
    fn approve() -> Weight {
        Weight::from_parts(18_000_000, 0)
            .saturating_add(T::DbWeight::get().writes(1_u64))
    }
    fn transfer_from() -> Weight {
        Weight::from_parts(52_000_000, 7_200)
            .saturating_add(T::DbWeight::get().reads(9_u64))
            .saturating_add(T::DbWeight::get().writes(7_u64))
    }
    fn permit() -> Weight {
        Weight::from_parts(95_000_000, 3_600)
            .saturating_add(T::DbWeight::get().reads(2_u64))
            .saturating_add(T::DbWeight::get().writes(2_u64))
    }
    fn delegate() -> Weight {
        Weight::from_parts(40_000_000, 7_200)
            .saturating_add(T::DbWeight::get().reads(6_u64))
            .saturating_add(T::DbWeight::get().writes(5_u64))
    }
    fn delegate_by_sig() -> Weight {
        Weight::from_parts(115_000_000, 7_200)
            .saturating_add(T::DbWeight::get().reads(8_u64))
            .saturating_add(T::DbWeight::get().writes(6_u64))
    }
    fn authorize_upgrade() -> Weight {
        Weight::from_parts(15_000_000, 1_500)
            .saturating_add(T::DbWeight::get().reads(2_u64))
            .saturating_add(T::DbWeight::get().writes(1_u64))
    }
    fn transfer_principal() -> Weight {
        Weight::from_parts(14_000_000, 1_500)
            .saturating_add(T::DbWeight::get().reads(1_u64))
            .saturating_add(T::DbWeight::get().writes(1_u64))
    }
    fn renounce_principal() -> Weight {
        Weight::from_parts(13_000_000, 1_500)
            .saturating_add(T::DbWeight::get().reads(1_u64))
            .saturating_add(T::DbWeight::get().writes(1_u64))
    }
}

// For backwards compatibility and tests
impl WeightInfo for () {
    fn initialize() -> Weight {
        Weight::from_parts(40_000_000, 3_600)
            .saturating_add(RocksDbWeight::get().reads(5_u64))
            .saturating_add(RocksDbWeight::get().writes(6_u64))
    }
    fn transfer() -> Weight {
        Weight::from_parts(45_000_000, 7_200)
            .saturating_add(RocksDbWeight::get().reads(8_u64))
            .saturating_add(RocksDbWeight::get().writes(6_u64))
    }
    fn approve() -> Weight {
        Weight::from_parts(18_000_000, 0)
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }
    fn transfer_from() -> Weight {
        Weight::from_parts(52_000_000, 7_200)
            .saturating_add(RocksDbWeight::get().reads(9_u64))
            .saturating_add(RocksDbWeight::get().writes(7_u64))
    }
    fn permit() -> Weight {
        Weight::from_parts(95_000_000, 3_600)
            .saturating_add(RocksDbWeight::get().reads(2_u64))
            .saturating_add(RocksDbWeight::get().writes(2_u64))
    }
    fn delegate() -> Weight {
        Weight::from_parts(40_000_000, 7_200)
            .saturating_add(RocksDbWeight::get().reads(6_u64))
            .saturating_add(RocksDbWeight::get().writes(5_u64))
    }
    fn delegate_by_sig() -> Weight {
        Weight::from_parts(115_000_000, 7_200)
            .saturating_add(RocksDbWeight::get().reads(8_u64))
            .saturating_add(RocksDbWeight::get().writes(6_u64))
    }
    fn authorize_upgrade() -> Weight {
        Weight::from_parts(15_000_000, 1_500)
            .saturating_add(RocksDbWeight::get().reads(2_u64))
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }
    fn transfer_principal() -> Weight {
        Weight::from_parts(14_000_000, 1_500)
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }
    fn renounce_principal() -> Weight {
        Weight::from_parts(13_000_000, 1_500)
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }
}
