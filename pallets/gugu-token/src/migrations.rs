//! Storage migrations for pallet-gugu-token.
//!
//! Rebinding the active logic never rewrites ledger storage by itself. When a
//! new logic version changes how storage is read, the change ships as a
//! versioned migration here and is wired into the runtime's `Executive`:
//!
//! ```ignore
//! pub type Executive = frame_executive::Executive<
//!     Runtime,
//!     Block,
//!     frame_system::ChainContext<Runtime>,
//!     Runtime,
//!     AllPalletsWithSystem,
//!     pallet_gugu_token::migrations::v1::MigrateToV1<Runtime>,
//! >;
//! ```
//!
//! Every migration checks the on-chain storage version first, so running it
//! again is a no-op.

use frame_support::{pallet_prelude::*, traits::OnRuntimeUpgrade};
use sp_std::marker::PhantomData;

use crate::{Config, Pallet};

/// Version 1 introduced the total-supply history.
///
/// Ledgers minted under v0 hold a `TotalSupply` but no supply checkpoints, so
/// `get_past_total_supply` would read zero for every block. The migration
/// seeds one checkpoint holding the current supply at the upgrade block.
/// Blocks before the upgrade keep reading zero; their history was never
/// recorded.
pub mod v1 {
    use super::*;
    use crate::{
        checkpoints::{self, CheckpointSeries},
        votes::TotalSupplySeries,
        TotalSupply,
    };

    pub struct MigrateToV1<T>(PhantomData<T>);

    impl<T: Config> OnRuntimeUpgrade for MigrateToV1<T> {
        fn on_runtime_upgrade() -> Weight {
            let on_chain_version = Pallet::<T>::on_chain_storage_version();

            if on_chain_version >= 1 {
                log::info!(
                    target: crate::LOG_TARGET,
                    "Storage already at v{on_chain_version:?}, skipping v1 migration"
                );
                return T::DbWeight::get().reads(1);
            }

            let supply = TotalSupply::<T>::get();
            let mut series = TotalSupplySeries::<T>::new();
            let mut writes = 1u64;

            if !supply.is_zero() && series.len() == 0 {
                let block = frame_system::Pallet::<T>::block_number();
                match checkpoints::push(&mut series, block, supply) {
                    Ok(_) => {
                        writes += 2;
                        log::info!(
                            target: crate::LOG_TARGET,
                            "Seeded total supply history with {supply:?} at block {block:?}"
                        );
                    },
                    Err(err) => log::error!(
                        target: crate::LOG_TARGET,
                        "Could not seed total supply history: {err:?}"
                    ),
                }
            }

            StorageVersion::new(1).put::<Pallet<T>>();
            log::info!(target: crate::LOG_TARGET, "Migrated pallet-gugu-token storage to v1");

            // version, supply, history length
            T::DbWeight::get().reads_writes(3, writes)
        }

        #[cfg(feature = "try-runtime")]
        fn pre_upgrade() -> Result<sp_std::vec::Vec<u8>, sp_runtime::TryRuntimeError> {
            let on_chain_version = Pallet::<T>::on_chain_storage_version();
            Ok((on_chain_version, TotalSupply::<T>::get()).encode())
        }

        #[cfg(feature = "try-runtime")]
        fn post_upgrade(state: sp_std::vec::Vec<u8>) -> Result<(), sp_runtime::TryRuntimeError> {
            let (pre_version, pre_supply): (StorageVersion, sp_core::U256) =
                Decode::decode(&mut &state[..])
                    .map_err(|_| sp_runtime::TryRuntimeError::Other("Failed to decode pre-state"))?;

            ensure!(
                Pallet::<T>::on_chain_storage_version() >= 1,
                sp_runtime::TryRuntimeError::Other("Migration to v1 did not complete")
            );
            ensure!(
                TotalSupply::<T>::get() == pre_supply,
                sp_runtime::TryRuntimeError::Other("Total supply changed during migration")
            );
            if pre_version < 1 && !pre_supply.is_zero() {
                ensure!(
                    Pallet::<T>::latest_total_supply() == pre_supply,
                    sp_runtime::TryRuntimeError::Other("Total supply history not seeded")
                );
            }
            Ok(())
        }
    }
}
