//! Delegation and the storage-backed voting-weight histories.

use crate::{
    checkpoints::{self, Checkpoint, CheckpointSeries},
    Balances, CheckpointCount, Checkpoints, Config, Delegates, Error, Event, Pallet,
    TotalSupplyCheckpointCount, TotalSupplyCheckpoints,
};
use frame_support::{dispatch::DispatchResult, ensure};
use frame_system::pallet_prelude::BlockNumberFor;
use sp_core::U256;
use sp_runtime::DispatchError;
use sp_std::marker::PhantomData;

/// Weight delegated to one account.
pub(crate) struct AccountSeries<T: Config> {
    account: T::AccountId,
    _marker: PhantomData<T>,
}

impl<T: Config> AccountSeries<T> {
    pub(crate) fn new(account: T::AccountId) -> Self {
        Self { account, _marker: PhantomData }
    }
}

impl<T: Config> CheckpointSeries<BlockNumberFor<T>> for AccountSeries<T> {
    fn len(&self) -> u32 {
        CheckpointCount::<T>::get(&self.account)
    }

    fn at(&self, pos: u32) -> Option<Checkpoint<BlockNumberFor<T>>> {
        Checkpoints::<T>::get(&self.account, pos)
    }

    fn write(&mut self, pos: u32, checkpoint: Checkpoint<BlockNumberFor<T>>) {
        Checkpoints::<T>::insert(&self.account, pos, checkpoint);
    }

    fn set_len(&mut self, len: u32) {
        CheckpointCount::<T>::insert(&self.account, len);
    }
}

/// History of the total supply.
pub(crate) struct TotalSupplySeries<T: Config>(PhantomData<T>);

impl<T: Config> TotalSupplySeries<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Config> CheckpointSeries<BlockNumberFor<T>> for TotalSupplySeries<T> {
    fn len(&self) -> u32 {
        TotalSupplyCheckpointCount::<T>::get()
    }

    fn at(&self, pos: u32) -> Option<Checkpoint<BlockNumberFor<T>>> {
        TotalSupplyCheckpoints::<T>::get(pos)
    }

    fn write(&mut self, pos: u32, checkpoint: Checkpoint<BlockNumberFor<T>>) {
        TotalSupplyCheckpoints::<T>::insert(pos, checkpoint);
    }

    fn set_len(&mut self, len: u32) {
        TotalSupplyCheckpointCount::<T>::put(len);
    }
}

enum VoteDelta {
    Add(U256),
    Sub(U256),
}

impl<T: Config> Pallet<T> {
    /// Mode string of the clock checkpoints are keyed by.
    pub const CLOCK_MODE: &'static str = "mode=blocknumber&from=default";

    /// Current checkpoint key: the block number.
    pub fn clock() -> BlockNumberFor<T> {
        frame_system::Pallet::<T>::block_number()
    }

    /// Voting weight currently delegated to `account`.
    pub fn get_votes(account: &T::AccountId) -> U256 {
        checkpoints::latest(&AccountSeries::<T>::new(account.clone()))
    }

    /// Voting weight delegated to `account` at the end of `block`.
    ///
    /// Only finished blocks can be queried.
    pub fn get_past_votes(
        account: &T::AccountId,
        block: BlockNumberFor<T>,
    ) -> Result<U256, DispatchError> {
        ensure!(block < Self::clock(), Error::<T>::InvalidQuery);
        Ok(checkpoints::upper_lookup_recent(&AccountSeries::<T>::new(account.clone()), block))
    }

    /// Total supply at the end of `block`.
    pub fn get_past_total_supply(block: BlockNumberFor<T>) -> Result<U256, DispatchError> {
        ensure!(block < Self::clock(), Error::<T>::InvalidQuery);
        Ok(checkpoints::upper_lookup_recent(&TotalSupplySeries::<T>::new(), block))
    }

    pub(crate) fn latest_total_supply() -> U256 {
        checkpoints::latest(&TotalSupplySeries::<T>::new())
    }

    pub(crate) fn do_delegate(delegator: &T::AccountId, delegatee: T::AccountId) -> DispatchResult {
        let target = (delegatee != Self::null_account()).then_some(delegatee);
        let previous = Delegates::<T>::get(delegator);

        match target {
            Some(ref to) => Delegates::<T>::insert(delegator, to),
            None => Delegates::<T>::remove(delegator),
        }
        Self::deposit_event(Event::DelegateChanged {
            delegator: delegator.clone(),
            from_delegate: previous.clone(),
            to_delegate: target.clone(),
        });

        Self::move_delegate_votes(previous.as_ref(), target.as_ref(), Balances::<T>::get(delegator))
    }

    /// Moves `amount` of weight from one delegate's history to another's at
    /// the current block.
    pub(crate) fn move_delegate_votes(
        from: Option<&T::AccountId>,
        to: Option<&T::AccountId>,
        amount: U256,
    ) -> DispatchResult {
        if from == to || amount.is_zero() {
            return Ok(());
        }
        if let Some(source) = from {
            let (previous_votes, new_votes) = Self::write_votes(
                &mut AccountSeries::<T>::new(source.clone()),
                VoteDelta::Sub(amount),
            )?;
            Self::deposit_event(Event::DelegateVotesChanged {
                delegate: source.clone(),
                previous_votes,
                new_votes,
            });
        }
        if let Some(target) = to {
            let (previous_votes, new_votes) = Self::write_votes(
                &mut AccountSeries::<T>::new(target.clone()),
                VoteDelta::Add(amount),
            )?;
            Self::deposit_event(Event::DelegateVotesChanged {
                delegate: target.clone(),
                previous_votes,
                new_votes,
            });
        }
        Ok(())
    }

    pub(crate) fn record_supply_change(minted: U256) -> DispatchResult {
        Self::write_votes(&mut TotalSupplySeries::<T>::new(), VoteDelta::Add(minted))?;
        Ok(())
    }

    fn write_votes<S: CheckpointSeries<BlockNumberFor<T>>>(
        series: &mut S,
        delta: VoteDelta,
    ) -> Result<(U256, U256), DispatchError> {
        let current = checkpoints::latest(series);
        let next = match delta {
            VoteDelta::Add(amount) => current.checked_add(amount).ok_or(Error::<T>::Overflow)?,
            VoteDelta::Sub(amount) => current.checked_sub(amount).ok_or(Error::<T>::Underflow)?,
        };
        checkpoints::push(series, Self::clock(), next)
            .map_err(|_| Error::<T>::CheckpointOutOfOrder.into())
    }
}
