//! Benchmarking setup for pallet-gugu-token
//!
//! The signature calls sign with the key supplied by `T::BenchmarkHelper`.

use super::*;

#[allow(unused)]
use crate::Pallet as GuguToken;
use frame_benchmarking::v2::*;
use frame_system::RawOrigin;
use sp_runtime::traits::Hash;

fn seed_balance<T: Config>(who: &T::AccountId, amount: U256) {
    Balances::<T>::insert(who, amount);
    TotalSupply::<T>::mutate(|supply| *supply = supply.saturating_add(amount));
}

/// Splits `r ‖ s ‖ recovery id` into call arguments.
fn signature_parts(raw: [u8; 65]) -> (u8, H256, H256) {
    (raw[64], H256::from_slice(&raw[..32]), H256::from_slice(&raw[32..64]))
}

/// Self-delegates `who` so transfers touch its vote history.
fn seed_self_delegation<T: Config>(who: &T::AccountId) {
    Pallet::<T>::do_delegate(who, who.clone()).expect("self delegation");
}

#[benchmarks]
mod benchmarks {
    use super::*;

    #[benchmark]
    fn initialize() {
        Initialized::<T>::kill();
        TotalSupply::<T>::kill();
        let _ = TotalSupplyCheckpoints::<T>::clear(u32::MAX, None);
        TotalSupplyCheckpointCount::<T>::kill();
        let holder: T::AccountId = account("holder", 0, 0);
        let origin = T::InitializeOrigin::try_successful_origin().expect("Initialize origin");

        #[extrinsic_call]
        _(origin as T::RuntimeOrigin, holder.clone());

        assert_eq!(Balances::<T>::get(&holder), T::MaxSupply::get());
        assert_eq!(Principal::<T>::get(), Some(holder));
    }

    #[benchmark]
    fn transfer() {
        let caller: T::AccountId = whitelisted_caller();
        let recipient: T::AccountId = account("recipient", 0, 0);
        let amount = U256::from(1_000_000u64);

        // Both sides delegated: two vote histories get a checkpoint
        seed_balance::<T>(&caller, U256::from(10_000_000u64));
        seed_self_delegation::<T>(&caller);
        seed_self_delegation::<T>(&recipient);

        #[extrinsic_call]
        _(RawOrigin::Signed(caller.clone()), recipient.clone(), amount);

        assert_eq!(Balances::<T>::get(&recipient), amount);
        assert_eq!(Pallet::<T>::get_votes(&recipient), amount);
    }

    #[benchmark]
    fn approve() {
        let caller: T::AccountId = whitelisted_caller();
        let spender: T::AccountId = account("spender", 0, 0);
        let amount = U256::from(1_000_000u64);

        #[extrinsic_call]
        _(RawOrigin::Signed(caller.clone()), spender.clone(), amount);

        assert_eq!(Allowances::<T>::get(&caller, &spender), amount);
    }

    #[benchmark]
    fn transfer_from() {
        let owner: T::AccountId = account("owner", 0, 0);
        let caller: T::AccountId = whitelisted_caller();
        let recipient: T::AccountId = account("recipient", 0, 0);
        let amount = U256::from(1_000_000u64);

        seed_balance::<T>(&owner, U256::from(10_000_000u64));
        seed_self_delegation::<T>(&owner);
        seed_self_delegation::<T>(&recipient);
        Allowances::<T>::insert(&owner, &caller, amount);

        #[extrinsic_call]
        _(RawOrigin::Signed(caller.clone()), owner.clone(), recipient.clone(), amount);

        assert_eq!(Balances::<T>::get(&recipient), amount);
        assert_eq!(Allowances::<T>::get(&owner, &caller), U256::zero());
    }

    #[benchmark]
    fn permit() {
        let caller: T::AccountId = whitelisted_caller();
        let owner = T::BenchmarkHelper::signer();
        let spender: T::AccountId = account("spender", 0, 0);
        let value = U256::from(1_000_000u64);
        let deadline = T::Time::now().as_secs().saturating_add(3_600);

        let payload = crate::permit::PermitPayload {
            owner: owner.clone(),
            spender: spender.clone(),
            value,
            nonce: Nonces::<T>::get(&owner),
            deadline,
        };
        let (v, r, s) = signature_parts(T::BenchmarkHelper::sign(&Pallet::<T>::typed_digest(
            &payload.struct_hash(),
        )));

        #[extrinsic_call]
        _(RawOrigin::Signed(caller), owner.clone(), spender.clone(), value, deadline, v, r, s);

        assert_eq!(Allowances::<T>::get(&owner, &spender), value);
        assert_eq!(Nonces::<T>::get(&owner), U256::one());
    }

    #[benchmark]
    fn delegate() {
        let caller: T::AccountId = whitelisted_caller();
        let previous: T::AccountId = account("previous", 0, 0);
        let delegatee: T::AccountId = account("delegatee", 0, 0);

        // Moving weight away from an existing delegate is the expensive path
        seed_balance::<T>(&caller, U256::from(10_000_000u64));
        Pallet::<T>::do_delegate(&caller, previous).expect("initial delegation");

        #[extrinsic_call]
        _(RawOrigin::Signed(caller.clone()), delegatee.clone());

        assert_eq!(Delegates::<T>::get(&caller), Some(delegatee.clone()));
        assert_eq!(Pallet::<T>::get_votes(&delegatee), U256::from(10_000_000u64));
    }

    #[benchmark]
    fn delegate_by_sig() {
        let caller: T::AccountId = whitelisted_caller();
        let signer = T::BenchmarkHelper::signer();
        let previous: T::AccountId = account("previous", 0, 0);
        let delegatee: T::AccountId = account("delegatee", 0, 0);
        let expiry = T::Time::now().as_secs().saturating_add(3_600);

        seed_balance::<T>(&signer, U256::from(10_000_000u64));
        Pallet::<T>::do_delegate(&signer, previous).expect("initial delegation");

        let nonce = Nonces::<T>::get(&signer);
        let payload =
            crate::permit::DelegationPayload { delegatee: delegatee.clone(), nonce, expiry };
        let (v, r, s) = signature_parts(T::BenchmarkHelper::sign(&Pallet::<T>::typed_digest(
            &payload.struct_hash(),
        )));

        #[extrinsic_call]
        _(RawOrigin::Signed(caller), delegatee.clone(), nonce, expiry, v, r, s);

        assert_eq!(Delegates::<T>::get(&signer), Some(delegatee.clone()));
        assert_eq!(Pallet::<T>::get_votes(&delegatee), U256::from(10_000_000u64));
    }

    #[benchmark]
    fn authorize_upgrade() {
        let caller: T::AccountId = whitelisted_caller();
        Principal::<T>::put(&caller);
        let logic = T::Hashing::hash(b"gugu-token-logic-v2");

        #[extrinsic_call]
        _(RawOrigin::Signed(caller), logic);

        assert_eq!(ActiveLogic::<T>::get(), Some(logic));
    }

    #[benchmark]
    fn transfer_principal() {
        let caller: T::AccountId = whitelisted_caller();
        let successor: T::AccountId = account("successor", 0, 0);
        Principal::<T>::put(&caller);

        #[extrinsic_call]
        _(RawOrigin::Signed(caller), successor.clone());

        assert_eq!(Principal::<T>::get(), Some(successor));
    }

    #[benchmark]
    fn renounce_principal() {
        let caller: T::AccountId = whitelisted_caller();
        Principal::<T>::put(&caller);

        #[extrinsic_call]
        _(RawOrigin::Signed(caller));

        assert_eq!(Principal::<T>::get(), None);
    }

    impl_benchmark_test_suite!(GuguToken, crate::mock::new_test_ext(), crate::mock::Test);
}
