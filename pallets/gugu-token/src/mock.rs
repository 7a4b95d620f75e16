use crate as pallet_gugu_token;
use crate::OnLogicUpgrade as _;
use crate::permit::{self, DelegationPayload, PermitPayload};
use core::time::Duration;
use frame_support::{
    derive_impl, parameter_types,
    traits::{ConstU32, ConstU64, UnixTime},
    PalletId,
};
use frame_system::EnsureRoot;
use sp_core::{ecdsa, Pair as _, H256, U256};
use sp_runtime::{
    traits::{BlakeTwo256, Convert, IdentityLookup},
    BuildStorage,
};

type Block = frame_system::mocking::MockBlock<Test>;

// Configure a mock runtime to test the pallet.
frame_support::construct_runtime!(
    pub enum Test {
        System: frame_system,
        GuguToken: pallet_gugu_token,
    }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
    type BaseCallFilter = frame_support::traits::Everything;
    type BlockWeights = ();
    type BlockLength = ();
    type DbWeight = ();
    type RuntimeOrigin = RuntimeOrigin;
    type RuntimeCall = RuntimeCall;
    type Nonce = u64;
    type Hash = H256;
    type Hashing = BlakeTwo256;
    type AccountId = u64;
    type Lookup = IdentityLookup<Self::AccountId>;
    type Block = Block;
    type RuntimeEvent = RuntimeEvent;
    type BlockHashCount = ConstU64<250>;
    type Version = ();
    type PalletInfo = PalletInfo;
    type AccountData = ();
    type OnNewAccount = ();
    type OnKilledAccount = ();
    type SystemWeightInfo = ();
    type SS58Prefix = ();
    type OnSetCode = ();
    type MaxConsumers = ConstU32<16>;
}

/// Receives the whole supply at genesis and is the initial principal.
pub const OWNER: u64 = 1;
pub const ALICE: u64 = 2;
pub const BOB: u64 = 3;
pub const CAROL: u64 = 4;

pub const GENESIS_TIME: u64 = 1_700_000_000;

parameter_types! {
    pub const GuguPalletId: PalletId = PalletId(*b"py/gugu_");
    pub const TestChainId: u64 = 97;
    pub MaxSupply: U256 = U256::from(1_000_000_000u64) * U256::exp10(18);
    pub static Now: u64 = GENESIS_TIME;
    pub static LastUpgrade: Option<(Option<H256>, H256)> = None;
}

pub struct MockTime;
impl UnixTime for MockTime {
    fn now() -> Duration {
        Duration::from_secs(Now::get())
    }
}

/// Account id taken from the low 8 bytes of the key's keccak-256 hash.
pub struct KeccakAccount;
impl Convert<[u8; 64], u64> for KeccakAccount {
    fn convert(public: [u8; 64]) -> u64 {
        let hash = sp_io::hashing::keccak_256(&public);
        let mut id = [0u8; 8];
        id.copy_from_slice(&hash[24..]);
        u64::from_be_bytes(id)
    }
}

/// Authorizes the runtime code like a production runtime, and remembers the call.
pub struct RecordUpgrade;
impl pallet_gugu_token::OnLogicUpgrade<H256> for RecordUpgrade {
    fn on_logic_upgrade(previous: Option<H256>, new: H256) {
        pallet_gugu_token::AuthorizeRuntimeUpgrade::<Test>::on_logic_upgrade(previous, new);
        LastUpgrade::set(Some((previous, new)));
    }
}

#[cfg(feature = "runtime-benchmarks")]
pub struct BenchmarkSigner;
#[cfg(feature = "runtime-benchmarks")]
impl pallet_gugu_token::BenchmarkHelper<u64> for BenchmarkSigner {
    fn signer() -> u64 {
        account_of(&signer(42))
    }

    fn sign(digest: &[u8; 32]) -> [u8; 65] {
        let sig = signer(42).sign_prehashed(digest);
        let mut raw = [0u8; 65];
        raw.copy_from_slice(sig.as_ref());
        raw
    }
}

impl pallet_gugu_token::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type InitializeOrigin = EnsureRoot<u64>;
    type MaxSupply = MaxSupply;
    type PalletId = GuguPalletId;
    type ChainId = TestChainId;
    type Time = MockTime;
    type SignerToAccount = KeccakAccount;
    type OnLogicUpgrade = RecordUpgrade;
    type WeightInfo = ();
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper = BenchmarkSigner;
}

/// `n` whole tokens at 18 decimals.
pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

fn build_ext(initial_holder: Option<u64>) -> sp_io::TestExternalities {
    let mut t = frame_system::GenesisConfig::<Test>::default().build_storage().unwrap();

    pallet_gugu_token::GenesisConfig::<Test> {
        token_name: b"GUGUToken".to_vec(),
        token_symbol: b"GUGU".to_vec(),
        decimals: 18,
        initial_holder,
    }
    .assimilate_storage(&mut t)
    .unwrap();

    Now::set(GENESIS_TIME);
    LastUpgrade::set(None);

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| System::set_block_number(1));
    ext
}

// Build genesis storage with the whole supply minted to `OWNER` at block 0.
pub fn new_test_ext() -> sp_io::TestExternalities {
    build_ext(Some(OWNER))
}

// Genesis with metadata only; the ledger still has to be initialized.
pub fn new_uninitialized_ext() -> sp_io::TestExternalities {
    build_ext(None)
}

pub fn run_to_block(n: u64) {
    System::set_block_number(n);
}

pub fn signer(seed: u8) -> ecdsa::Pair {
    ecdsa::Pair::from_seed(&[seed; 32])
}

fn sign_digest(pair: &ecdsa::Pair, digest: &[u8; 32]) -> (u8, H256, H256) {
    let sig = pair.sign_prehashed(digest);
    let raw: &[u8] = sig.as_ref();
    (raw[64] + 27, H256::from_slice(&raw[..32]), H256::from_slice(&raw[32..64]))
}

/// Ledger account controlled by `pair`.
pub fn account_of(pair: &ecdsa::Pair) -> u64 {
    let digest = [7u8; 32];
    let (v, r, s) = sign_digest(pair, &digest);
    let public = permit::Signature { v, r, s }.recover(&digest).expect("fresh signature recovers");
    KeccakAccount::convert(public)
}

/// Signs a permit against the ledger's current domain.
pub fn sign_permit(
    pair: &ecdsa::Pair,
    spender: u64,
    value: U256,
    nonce: U256,
    deadline: u64,
) -> (u8, H256, H256) {
    let payload = PermitPayload { owner: account_of(pair), spender, value, nonce, deadline };
    let digest =
        permit::typed_data_hash(&GuguToken::domain_separator().0, &payload.struct_hash());
    sign_digest(pair, &digest)
}

pub fn sign_delegation(
    pair: &ecdsa::Pair,
    delegatee: u64,
    nonce: U256,
    expiry: u64,
) -> (u8, H256, H256) {
    let payload = DelegationPayload { delegatee, nonce, expiry };
    let digest =
        permit::typed_data_hash(&GuguToken::domain_separator().0, &payload.struct_hash());
    sign_digest(pair, &digest)
}
