//! The puzzle hash chain: keccak-256, then RIPEMD-160, then SHA-256.

use alloy_primitives::{Address, B256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// Longest preimage: challenge, address and the 20 digits of `u64::MAX`
const MAX_PREIMAGE: usize = 32 + 20 + 20;

#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}

/// Write `nonce` as decimal ASCII into `buf`, returning the digit count
#[inline]
fn write_decimal(mut nonce: u64, buf: &mut [u8; 20]) -> usize {
    let mut digits = [0u8; 20];
    let mut len = 0;
    loop {
        digits[len] = b'0' + (nonce % 10) as u8;
        len += 1;
        nonce /= 10;
        if nonce == 0 {
            break;
        }
    }
    for (dst, src) in buf.iter_mut().zip(digits[..len].iter().rev()) {
        *dst = *src;
    }
    len
}

/// `challenge ‖ address ‖ ascii(nonce)`
pub fn preimage(challenge: &B256, address: &Address, nonce: u64) -> Vec<u8> {
    let mut buf = [0u8; MAX_PREIMAGE];
    let len = fill_preimage(&mut buf, challenge, address, nonce);
    buf[..len].to_vec()
}

#[inline(always)]
fn fill_preimage(
    buf: &mut [u8; MAX_PREIMAGE],
    challenge: &B256,
    address: &Address,
    nonce: u64,
) -> usize {
    buf[..32].copy_from_slice(challenge.as_slice());
    buf[32..52].copy_from_slice(address.as_slice());
    let mut digits = [0u8; 20];
    let n = write_decimal(nonce, &mut digits);
    buf[52..52 + n].copy_from_slice(&digits[..n]);
    52 + n
}

/// Final 32-byte digest for one candidate
#[inline]
pub fn puzzle_hash(challenge: &B256, address: &Address, nonce: u64) -> [u8; 32] {
    let mut buf = [0u8; MAX_PREIMAGE];
    let len = fill_preimage(&mut buf, challenge, address, nonce);

    let first = keccak256(&buf[..len]);
    let second = Ripemd160::digest(first);
    Sha256::digest(second).into()
}
