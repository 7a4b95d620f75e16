#![cfg_attr(not(feature = "std"), no_std)]
// Storage getters are kept for the public query surface
#![allow(deprecated)]
#![allow(clippy::let_unit_value)]

//! Fixed-supply governance token.
//!
//! The whole supply is minted once to an initial holder. Balances carry
//! delegated voting weight, recorded per block so that past voting power can
//! be queried. Owners may grant allowances off-chain through signed permits,
//! and a single principal controls which logic is bound to the ledger storage.

use frame_support::{
    dispatch::DispatchResult,
    ensure,
    pallet_prelude::*,
    traits::{EnsureOrigin, UnixTime},
    PalletId,
};
use frame_system::{ensure_signed, pallet_prelude::*};
use sp_core::{H256, U256};
use sp_runtime::traits::{AccountIdConversion, Convert, TrailingZeroInput};
use sp_std::{marker::PhantomData, prelude::*};

pub use pallet::*;
pub use weights::WeightInfo;

pub mod checkpoints;
pub mod migrations;
pub mod permit;
mod votes;
pub mod weights;

#[cfg(test)]
mod mock;


#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub(crate) const LOG_TARGET: &str = "runtime::gugu-token";

/// The current storage version.
const STORAGE_VERSION: StorageVersion = StorageVersion::new(1);

/// Notified after the principal rebinds the active logic.
pub trait OnLogicUpgrade<Hash> {
    fn on_logic_upgrade(previous: Option<Hash>, new: Hash);
}

impl<Hash> OnLogicUpgrade<Hash> for () {
    fn on_logic_upgrade(_previous: Option<Hash>, _new: Hash) {}
}

/// Binds the principal's choice to the runtime code.
///
/// The new logic hash is authorized as the next runtime code through
/// `frame_system`, so anyone may then submit the matching code with
/// `frame_system::apply_authorized_upgrade`. The code is replaced while every
/// storage item of this pallet stays as it is. Runtimes wire it as
///
/// ```ignore
/// impl pallet_gugu_token::Config for Runtime {
///     type OnLogicUpgrade = pallet_gugu_token::AuthorizeRuntimeUpgrade<Runtime>;
///     // ...
/// }
/// ```
pub struct AuthorizeRuntimeUpgrade<T>(PhantomData<T>);

impl<T: frame_system::Config> OnLogicUpgrade<T::Hash> for AuthorizeRuntimeUpgrade<T> {
    fn on_logic_upgrade(_previous: Option<T::Hash>, new: T::Hash) {
        frame_system::Pallet::<T>::do_authorize_upgrade(new, true);
    }
}

/// Supplies a secp256k1 signer for the signature benchmarks.
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
    /// Account that `T::SignerToAccount` maps the helper's key to.
    fn signer() -> AccountId;
    /// `r ‖ s ‖ recovery id` over `digest`.
    fn sign(digest: &[u8; 32]) -> [u8; 65];
}

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use crate::checkpoints::Checkpoint;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Origin allowed to perform the one-time initialization.
        type InitializeOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Entire supply, minted once to the initial holder.
        #[pallet::constant]
        type MaxSupply: Get<U256>;

        /// Identifies the ledger; its derived account is bound into permit signatures.
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// Chain identity bound into permit signatures.
        #[pallet::constant]
        type ChainId: Get<u64>;

        /// Wall clock for signature deadlines.
        type Time: UnixTime;

        /// Maps a recovered uncompressed secp256k1 public key to its account.
        type SignerToAccount: Convert<[u8; 64], Self::AccountId>;

        /// Called after the principal rebinds the active logic; see
        /// [`AuthorizeRuntimeUpgrade`].
        type OnLogicUpgrade: OnLogicUpgrade<Self::Hash>;

        type WeightInfo: WeightInfo;

        #[cfg(feature = "runtime-benchmarks")]
        type BenchmarkHelper: BenchmarkHelper<Self::AccountId>;
    }

    #[pallet::pallet]
    #[pallet::storage_version(STORAGE_VERSION)]
    pub struct Pallet<T>(_);

    /// Token name (e.g., "GUGUToken"), also the permit domain name
    #[pallet::storage]
    #[pallet::getter(fn token_name)]
    pub type TokenName<T> = StorageValue<_, BoundedVec<u8, ConstU32<64>>, ValueQuery>;

    /// Token symbol (e.g., "GUGU")
    #[pallet::storage]
    #[pallet::getter(fn token_symbol)]
    pub type TokenSymbol<T> = StorageValue<_, BoundedVec<u8, ConstU32<16>>, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn decimals)]
    pub type Decimals<T> = StorageValue<_, u8, ValueQuery>;

    /// Set once the supply has been minted
    #[pallet::storage]
    #[pallet::getter(fn is_initialized)]
    pub type Initialized<T> = StorageValue<_, bool, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn total_supply)]
    pub type TotalSupply<T> = StorageValue<_, U256, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn balance_of)]
    pub type Balances<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, U256, ValueQuery>;

    /// Remaining amount `spender` may move out of `owner`'s balance
    #[pallet::storage]
    #[pallet::getter(fn allowance)]
    pub type Allowances<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::AccountId,
        Blake2_128Concat,
        T::AccountId,
        U256,
        ValueQuery,
    >;

    /// Next nonce expected in a signature by this account
    #[pallet::storage]
    #[pallet::getter(fn nonce_of)]
    pub type Nonces<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, U256, ValueQuery>;

    /// Account that receives this account's voting weight
    #[pallet::storage]
    #[pallet::getter(fn delegates)]
    pub type Delegates<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, T::AccountId, OptionQuery>;

    #[pallet::storage]
    #[pallet::getter(fn num_checkpoints)]
    pub type CheckpointCount<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, u32, ValueQuery>;

    /// Voting weight delegated to an account, by position in its history
    #[pallet::storage]
    #[pallet::getter(fn checkpoint_at)]
    pub type Checkpoints<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::AccountId,
        Twox64Concat,
        u32,
        Checkpoint<BlockNumberFor<T>>,
        OptionQuery,
    >;

    #[pallet::storage]
    pub type TotalSupplyCheckpointCount<T> = StorageValue<_, u32, ValueQuery>;

    #[pallet::storage]
    pub type TotalSupplyCheckpoints<T: Config> =
        StorageMap<_, Twox64Concat, u32, Checkpoint<BlockNumberFor<T>>, OptionQuery>;

    /// Account allowed to upgrade the logic and hand over this role
    #[pallet::storage]
    #[pallet::getter(fn principal)]
    pub type Principal<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    /// Reference to the logic currently bound to this storage
    #[pallet::storage]
    #[pallet::getter(fn active_logic)]
    pub type ActiveLogic<T: Config> = StorageValue<_, T::Hash, OptionQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Tokens transferred from one account to another
        Transferred { from: T::AccountId, to: T::AccountId, amount: U256 },
        /// Supply minted at initialization
        Minted { to: T::AccountId, amount: U256 },
        /// Allowance set, directly or through a permit
        Approval { owner: T::AccountId, spender: T::AccountId, amount: U256 },
        DelegateChanged {
            delegator: T::AccountId,
            from_delegate: Option<T::AccountId>,
            to_delegate: Option<T::AccountId>,
        },
        /// Voting weight held by a delegate changed
        DelegateVotesChanged { delegate: T::AccountId, previous_votes: U256, new_votes: U256 },
        PrincipalTransferred { previous: Option<T::AccountId>, new: Option<T::AccountId> },
        /// Active logic rebound by the principal
        Upgraded { previous: Option<T::Hash>, logic: T::Hash },
    }

    #[pallet::error]
    pub enum Error<T> {
        Overflow,
        Underflow,
        InsufficientBalance,
        InsufficientAllowance,
        /// Target is the null account
        InvalidRecipient,
        /// Signature deadline has passed
        Expired,
        /// Signature does not recover to the expected account
        InvalidSigner,
        /// Nonce supplied with a signature is not the signer's current one
        InvalidNonce,
        /// Caller is not the principal
        Unauthorized,
        /// Historical lookup of the current or a future block
        InvalidQuery,
        AlreadyInitialized,
        CheckpointOutOfOrder,
    }

    #[pallet::hooks]
    impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
        fn integrity_test() {
            assert!(!T::MaxSupply::get().is_zero(), "MaxSupply must be non-zero");
        }

        #[cfg(feature = "try-runtime")]
        fn try_state(_n: BlockNumberFor<T>) -> Result<(), sp_runtime::TryRuntimeError> {
            Self::do_try_state()
        }
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Mints the entire supply to `holder` and makes it the principal.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::initialize())]
        pub fn initialize(origin: OriginFor<T>, holder: T::AccountId) -> DispatchResult {
            T::InitializeOrigin::ensure_origin(origin)?;
            Self::do_initialize(&holder)
        }

        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::transfer())]
        pub fn transfer(origin: OriginFor<T>, to: T::AccountId, amount: U256) -> DispatchResult {
            let from = ensure_signed(origin)?;
            Self::do_transfer(&from, &to, amount)
        }

        /// Sets the allowance of `spender` over the caller's tokens to exactly `amount`.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::approve())]
        pub fn approve(origin: OriginFor<T>, spender: T::AccountId, amount: U256) -> DispatchResult {
            let owner = ensure_signed(origin)?;
            Self::do_approve(&owner, &spender, amount)
        }

        /// Moves `amount` from `from` to `to`, spending the caller's allowance.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::transfer_from())]
        pub fn transfer_from(
            origin: OriginFor<T>,
            from: T::AccountId,
            to: T::AccountId,
            amount: U256,
        ) -> DispatchResult {
            let spender = ensure_signed(origin)?;
            Self::spend_allowance(&from, &spender, amount)?;
            Self::do_transfer(&from, &to, amount)
        }

        /// Sets an allowance on behalf of `owner`, authorized by their signature
        /// over the permit and their current nonce. Anyone may submit it.
        #[pallet::call_index(4)]
        #[pallet::weight(T::WeightInfo::permit())]
        #[allow(clippy::too_many_arguments)]
        pub fn permit(
            origin: OriginFor<T>,
            owner: T::AccountId,
            spender: T::AccountId,
            value: U256,
            deadline: u64,
            v: u8,
            r: H256,
            s: H256,
        ) -> DispatchResult {
            ensure_signed(origin)?;
            ensure!(Self::now() <= deadline, Error::<T>::Expired);

            let nonce = Nonces::<T>::get(&owner);
            let payload = permit::PermitPayload { owner, spender, value, nonce, deadline };
            let digest = Self::typed_digest(&payload.struct_hash());
            let signer = Self::recover_account(&permit::Signature { v, r, s }, &digest);
            if !permit::is_authorized(&payload, signer.as_ref(), nonce) {
                log::debug!(
                    target: LOG_TARGET,
                    "permit rejected: owner {:?}, recovered {:?}",
                    payload.owner,
                    signer
                );
                return Err(Error::<T>::InvalidSigner.into());
            }

            Nonces::<T>::insert(&payload.owner, nonce.checked_add(U256::one()).ok_or(Error::<T>::Overflow)?);
            Self::do_approve(&payload.owner, &payload.spender, payload.value)
        }

        /// Delegates the caller's voting weight. Delegating to the null account
        /// clears the delegation.
        #[pallet::call_index(5)]
        #[pallet::weight(T::WeightInfo::delegate())]
        pub fn delegate(origin: OriginFor<T>, delegatee: T::AccountId) -> DispatchResult {
            let delegator = ensure_signed(origin)?;
            Self::do_delegate(&delegator, delegatee)
        }

        /// Delegates on behalf of whoever signed the delegation.
        #[pallet::call_index(6)]
        #[pallet::weight(T::WeightInfo::delegate_by_sig())]
        #[allow(clippy::too_many_arguments)]
        pub fn delegate_by_sig(
            origin: OriginFor<T>,
            delegatee: T::AccountId,
            nonce: U256,
            expiry: u64,
            v: u8,
            r: H256,
            s: H256,
        ) -> DispatchResult {
            ensure_signed(origin)?;
            ensure!(Self::now() <= expiry, Error::<T>::Expired);

            let payload = permit::DelegationPayload { delegatee, nonce, expiry };
            let digest = Self::typed_digest(&payload.struct_hash());
            let signer = Self::recover_account(&permit::Signature { v, r, s }, &digest)
                .ok_or(Error::<T>::InvalidSigner)?;

            Self::use_checked_nonce(&signer, nonce)?;
            Self::do_delegate(&signer, payload.delegatee)
        }

        /// Binds `new_logic` to the ledger storage. Only the principal may do this.
        #[pallet::call_index(7)]
        #[pallet::weight(T::WeightInfo::authorize_upgrade())]
        pub fn authorize_upgrade(origin: OriginFor<T>, new_logic: T::Hash) -> DispatchResult {
            let caller = ensure_signed(origin)?;
            Self::ensure_principal(&caller)?;

            let previous = ActiveLogic::<T>::get();
            ActiveLogic::<T>::put(new_logic);
            T::OnLogicUpgrade::on_logic_upgrade(previous, new_logic);

            log::info!(target: LOG_TARGET, "active logic {:?} -> {:?}", previous, new_logic);
            Self::deposit_event(Event::Upgraded { previous, logic: new_logic });
            Ok(())
        }

        #[pallet::call_index(8)]
        #[pallet::weight(T::WeightInfo::transfer_principal())]
        pub fn transfer_principal(
            origin: OriginFor<T>,
            new_principal: T::AccountId,
        ) -> DispatchResult {
            let caller = ensure_signed(origin)?;
            Self::ensure_principal(&caller)?;
            ensure!(new_principal != Self::null_account(), Error::<T>::InvalidRecipient);

            Principal::<T>::put(&new_principal);
            log::info!(target: LOG_TARGET, "principal {:?} -> {:?}", caller, new_principal);
            Self::deposit_event(Event::PrincipalTransferred {
                previous: Some(caller),
                new: Some(new_principal),
            });
            Ok(())
        }

        /// Gives up the principal role for good. Upgrades become impossible.
        #[pallet::call_index(9)]
        #[pallet::weight(T::WeightInfo::renounce_principal())]
        pub fn renounce_principal(origin: OriginFor<T>) -> DispatchResult {
            let caller = ensure_signed(origin)?;
            Self::ensure_principal(&caller)?;

            Principal::<T>::kill();
            log::info!(target: LOG_TARGET, "principal {:?} renounced", caller);
            Self::deposit_event(Event::PrincipalTransferred { previous: Some(caller), new: None });
            Ok(())
        }
    }

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        /// Token name
        pub token_name: Vec<u8>,
        /// Token symbol
        pub token_symbol: Vec<u8>,
        /// Token decimals
        pub decimals: u8,
        /// Receives the whole supply and the principal role, if set
        pub initial_holder: Option<T::AccountId>,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            let name: BoundedVec<u8, ConstU32<64>> =
                self.token_name.clone().try_into().expect("Token name too long (max 64 bytes)");
            TokenName::<T>::put(name);

            let symbol: BoundedVec<u8, ConstU32<16>> =
                self.token_symbol.clone().try_into().expect("Token symbol too long (max 16 bytes)");
            TokenSymbol::<T>::put(symbol);

            Decimals::<T>::put(self.decimals);

            if let Some(ref holder) = self.initial_holder {
                Pallet::<T>::do_initialize(holder).expect("Initial holder must be a valid account");
            }
        }
    }
}

impl<T: Config> Pallet<T> {
    /// The all-zero account, never a valid recipient.
    pub fn null_account() -> T::AccountId {
        T::AccountId::decode(&mut TrailingZeroInput::zeroes())
            .expect("infinite length input; no invalid inputs for type; qed")
    }

    /// The ledger's own account, bound into signed messages.
    pub fn ledger_account() -> T::AccountId {
        T::PalletId::get().into_account_truncating()
    }

    pub fn domain_separator() -> H256 {
        let name = TokenName::<T>::get();
        H256(permit::domain_separator(&name, T::ChainId::get(), &Self::ledger_account()))
    }

    fn now() -> u64 {
        T::Time::now().as_secs()
    }

    fn typed_digest(struct_hash: &[u8; 32]) -> [u8; 32] {
        permit::typed_data_hash(&Self::domain_separator().0, struct_hash)
    }

    fn recover_account(signature: &permit::Signature, digest: &[u8; 32]) -> Option<T::AccountId> {
        signature.recover(digest).map(T::SignerToAccount::convert)
    }

    pub(crate) fn do_initialize(holder: &T::AccountId) -> DispatchResult {
        ensure!(!Initialized::<T>::get(), Error::<T>::AlreadyInitialized);
        ensure!(*holder != Self::null_account(), Error::<T>::InvalidRecipient);

        Initialized::<T>::put(true);
        Self::mint(holder, T::MaxSupply::get())?;
        Principal::<T>::put(holder);

        log::info!(
            target: LOG_TARGET,
            "ledger initialized: {:?} minted to {:?}",
            T::MaxSupply::get(),
            holder
        );
        Self::deposit_event(Event::PrincipalTransferred { previous: None, new: Some(holder.clone()) });
        Ok(())
    }

    fn mint(to: &T::AccountId, amount: U256) -> DispatchResult {
        let supply = TotalSupply::<T>::get().checked_add(amount).ok_or(Error::<T>::Overflow)?;
        ensure!(supply <= T::MaxSupply::get(), Error::<T>::Overflow);

        TotalSupply::<T>::put(supply);
        Balances::<T>::try_mutate(to, |balance| -> DispatchResult {
            *balance = balance.checked_add(amount).ok_or(Error::<T>::Overflow)?;
            Ok(())
        })?;
        Self::record_supply_change(amount)?;
        Self::move_delegate_votes(None, Delegates::<T>::get(to).as_ref(), amount)?;

        Self::deposit_event(Event::Minted { to: to.clone(), amount });
        Ok(())
    }

    pub(crate) fn do_transfer(from: &T::AccountId, to: &T::AccountId, amount: U256) -> DispatchResult {
        ensure!(*to != Self::null_account(), Error::<T>::InvalidRecipient);
        let from_balance = Balances::<T>::get(from);
        ensure!(from_balance >= amount, Error::<T>::InsufficientBalance);

        Balances::<T>::insert(from, from_balance.checked_sub(amount).ok_or(Error::<T>::Underflow)?);
        Balances::<T>::try_mutate(to, |balance| -> DispatchResult {
            *balance = balance.checked_add(amount).ok_or(Error::<T>::Overflow)?;
            Ok(())
        })?;
        Self::move_delegate_votes(
            Delegates::<T>::get(from).as_ref(),
            Delegates::<T>::get(to).as_ref(),
            amount,
        )?;

        Self::deposit_event(Event::Transferred { from: from.clone(), to: to.clone(), amount });
        Ok(())
    }

    pub(crate) fn do_approve(
        owner: &T::AccountId,
        spender: &T::AccountId,
        amount: U256,
    ) -> DispatchResult {
        ensure!(*spender != Self::null_account(), Error::<T>::InvalidRecipient);
        Allowances::<T>::insert(owner, spender, amount);
        Self::deposit_event(Event::Approval { owner: owner.clone(), spender: spender.clone(), amount });
        Ok(())
    }

    fn spend_allowance(owner: &T::AccountId, spender: &T::AccountId, amount: U256) -> DispatchResult {
        let allowance = Allowances::<T>::get(owner, spender);
        ensure!(allowance >= amount, Error::<T>::InsufficientAllowance);
        Allowances::<T>::insert(owner, spender, allowance.checked_sub(amount).ok_or(Error::<T>::Underflow)?);
        Ok(())
    }

    /// Consumes `nonce` if it is `owner`'s current one.
    fn use_checked_nonce(owner: &T::AccountId, nonce: U256) -> DispatchResult {
        let current = Nonces::<T>::get(owner);
        ensure!(nonce == current, Error::<T>::InvalidNonce);
        Nonces::<T>::insert(owner, current.checked_add(U256::one()).ok_or(Error::<T>::Overflow)?);
        Ok(())
    }

    fn ensure_principal(who: &T::AccountId) -> DispatchResult {
        ensure!(Principal::<T>::get().as_ref() == Some(who), Error::<T>::Unauthorized);
        Ok(())
    }

    /// Checks the ledger invariants: balances add up to the supply, the supply
    /// respects the cap, and every delegate's votes equal the balances
    /// delegated to it.
    #[cfg(any(feature = "try-runtime", test))]
    pub fn do_try_state() -> Result<(), sp_runtime::TryRuntimeError> {
        use sp_std::collections::btree_map::BTreeMap;

        let supply = TotalSupply::<T>::get();
        let sum = Balances::<T>::iter_values()
            .try_fold(U256::zero(), |acc, balance| acc.checked_add(balance))
            .ok_or("sum of balances overflows")?;
        ensure!(sum == supply, "sum of balances differs from total supply");
        ensure!(supply <= T::MaxSupply::get(), "total supply exceeds the cap");
        ensure!(
            Self::latest_total_supply() == supply,
            "total supply history out of date"
        );

        let mut delegated: BTreeMap<T::AccountId, U256> = BTreeMap::new();
        for (delegator, delegate) in Delegates::<T>::iter() {
            let weight = delegated.entry(delegate).or_default();
            *weight = weight.saturating_add(Balances::<T>::get(&delegator));
        }
        for (delegate, weight) in delegated.iter() {
            ensure!(Self::get_votes(delegate) == *weight, "delegate votes out of sync");
        }
        for account in CheckpointCount::<T>::iter_keys() {
            let expected = delegated.get(&account).copied().unwrap_or_default();
            ensure!(Self::get_votes(&account) == expected, "stale votes for former delegate");
        }
        Ok(())
    }
}
