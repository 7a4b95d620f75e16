//! Typed-data hashing and secp256k1 signer recovery for signed approvals.
//!
//! Messages follow the EIP-712 layout: a domain separator binding the token
//! name, version, chain and ledger account, and a struct hash per message
//! type. Account ids are not fixed 20-byte addresses here, so they are
//! encoded as `bytes32` words (see [`account_word`]).
//!
//! Nothing in this module touches storage. [`is_authorized`] is the whole
//! authorization decision for a permit.

use codec::Encode;
use frame_support::pallet_prelude::RuntimeDebug;
use sp_core::{H256, U256};
use sp_io::hashing::keccak_256;
use sp_std::vec::Vec;

/// Version string of the signing domain.
pub const DOMAIN_VERSION: &[u8] = b"1";

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,bytes32 verifyingContract)";
const PERMIT_TYPE: &[u8] =
    b"Permit(bytes32 owner,bytes32 spender,uint256 value,uint256 nonce,uint256 deadline)";
const DELEGATION_TYPE: &[u8] = b"Delegation(bytes32 delegatee,uint256 nonce,uint256 expiry)";

/// Half the secp256k1 group order. Signatures with a larger `s` are malleable.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// 32-byte word for an account: its SCALE encoding left-padded with zeros,
/// or the keccak-256 of the encoding if it does not fit.
pub fn account_word<A: Encode>(who: &A) -> [u8; 32] {
    let encoded = who.encode();
    if encoded.len() > 32 {
        return keccak_256(&encoded);
    }
    let mut word = [0u8; 32];
    word[32 - encoded.len()..].copy_from_slice(&encoded);
    word
}

/// Big-endian `uint256` word.
pub fn u256_word(value: U256) -> [u8; 32] {
    // SCALE encodes U256 as 32 little-endian bytes
    let mut word = [0u8; 32];
    for (i, byte) in value.encode().into_iter().enumerate().take(32) {
        word[31 - i] = byte;
    }
    word
}

fn hash_words(words: &[[u8; 32]]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(word);
    }
    keccak_256(&buf)
}

pub fn domain_separator<A: Encode>(name: &[u8], chain_id: u64, ledger: &A) -> [u8; 32] {
    hash_words(&[
        keccak_256(DOMAIN_TYPE),
        keccak_256(name),
        keccak_256(DOMAIN_VERSION),
        u256_word(U256::from(chain_id)),
        account_word(ledger),
    ])
}

/// Digest actually signed: `keccak256(0x19 0x01 ‖ domain ‖ struct hash)`.
pub fn typed_data_hash(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain_separator);
    buf[34..].copy_from_slice(struct_hash);
    keccak_256(&buf)
}

/// Allowance grant signed by `owner`.
#[derive(Clone, PartialEq, Eq, RuntimeDebug)]
pub struct PermitPayload<AccountId> {
    pub owner: AccountId,
    pub spender: AccountId,
    pub value: U256,
    pub nonce: U256,
    pub deadline: u64,
}

impl<AccountId: Encode> PermitPayload<AccountId> {
    pub fn struct_hash(&self) -> [u8; 32] {
        hash_words(&[
            keccak_256(PERMIT_TYPE),
            account_word(&self.owner),
            account_word(&self.spender),
            u256_word(self.value),
            u256_word(self.nonce),
            u256_word(U256::from(self.deadline)),
        ])
    }
}

/// Delegation of the signer's voting weight to `delegatee`.
#[derive(Clone, PartialEq, Eq, RuntimeDebug)]
pub struct DelegationPayload<AccountId> {
    pub delegatee: AccountId,
    pub nonce: U256,
    pub expiry: u64,
}

impl<AccountId: Encode> DelegationPayload<AccountId> {
    pub fn struct_hash(&self) -> [u8; 32] {
        hash_words(&[
            keccak_256(DELEGATION_TYPE),
            account_word(&self.delegatee),
            u256_word(self.nonce),
            u256_word(U256::from(self.expiry)),
        ])
    }
}

/// Recoverable secp256k1 signature in `(v, r, s)` form.
#[derive(Clone, Copy, PartialEq, Eq, RuntimeDebug)]
pub struct Signature {
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl Signature {
    /// `r ‖ s ‖ recovery id`, or `None` for an unknown `v` or a high `s`.
    pub fn to_bytes(&self) -> Option<[u8; 65]> {
        let recovery_id = match self.v {
            0 | 1 => self.v,
            27 | 28 => self.v - 27,
            _ => return None,
        };
        if self.s.0 > SECP256K1_HALF_ORDER {
            return None;
        }
        let mut raw = [0u8; 65];
        raw[..32].copy_from_slice(self.r.as_bytes());
        raw[32..64].copy_from_slice(self.s.as_bytes());
        raw[64] = recovery_id;
        Some(raw)
    }

    /// Uncompressed public key (without the 0x04 prefix) that signed `digest`.
    pub fn recover(&self, digest: &[u8; 32]) -> Option<[u8; 64]> {
        let raw = self.to_bytes()?;
        sp_io::crypto::secp256k1_ecdsa_recover(&raw, digest).ok()
    }
}

/// A permit is authorized when it was signed by its owner over the owner's
/// current nonce.
pub fn is_authorized<AccountId: PartialEq>(
    payload: &PermitPayload<AccountId>,
    signer: Option<&AccountId>,
    stored_nonce: U256,
) -> bool {
    payload.nonce == stored_nonce && signer == Some(&payload.owner)
}
