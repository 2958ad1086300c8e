//! Shamir's Secret Sharing over GF(2^8), byte-wise on the secret.
//!
//! Each share is `x ‖ evaluations`: the first byte is the evaluation
//! point (1..=N), followed by one polynomial evaluation per secret byte.
//! The field is GF(2^8) with the 0x11B (AES) reduction polynomial, the
//! same arithmetic HashiCorp Vault's shamir package uses, so shares
//! produced here combine correctly in that implementation and vice versa.
//!
//! Any set of fewer than K shares is statistically independent of the
//! secret; combining is plain Lagrange interpolation at x = 0 and cannot
//! itself tell a wrong cohort from a right one.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::{RememoryError, RememoryResult};

/// Largest share count the field supports (evaluation points 1..=255).
pub const MAX_SHARES: usize = 255;

/// Validate an N-of-K parameter pair: 2 <= threshold <= total <= 255.
pub fn validate_params(total: usize, threshold: usize) -> RememoryResult<()> {
    if total > MAX_SHARES {
        return Err(RememoryError::InvalidParams(format!(
            "total shares {total} exceeds maximum {MAX_SHARES}"
        )));
    }
    if threshold < 2 {
        return Err(RememoryError::InvalidParams(format!(
            "threshold {threshold} is below minimum 2"
        )));
    }
    if threshold > total {
        return Err(RememoryError::InvalidParams(format!(
            "threshold {threshold} exceeds total shares {total}"
        )));
    }
    Ok(())
}

/// Split `secret` into `total` shares, any `threshold` of which recover it.
pub fn split(secret: &[u8], total: usize, threshold: usize) -> RememoryResult<Vec<Vec<u8>>> {
    split_with_rng(secret, total, threshold, &mut rand::thread_rng())
}

/// Split with an explicit RNG for the polynomial coefficients.
///
/// The RNG is an ambient capability: production call sites pass the
/// process CSPRNG, tests may pass a seeded one.
pub fn split_with_rng<R: RngCore + CryptoRng>(
    secret: &[u8],
    total: usize,
    threshold: usize,
    rng: &mut R,
) -> RememoryResult<Vec<Vec<u8>>> {
    validate_params(total, threshold)?;
    if secret.is_empty() {
        return Err(RememoryError::InvalidParams("secret must not be empty".into()));
    }

    let mut shares: Vec<Vec<u8>> = (1..=total as u8)
        .map(|x| {
            let mut share = Vec::with_capacity(secret.len() + 1);
            share.push(x);
            share
        })
        .collect();

    // One random polynomial per secret byte, constant term = the byte.
    let mut coeffs = vec![0u8; threshold];
    for &byte in secret {
        coeffs[0] = byte;
        rng.fill_bytes(&mut coeffs[1..]);
        for share in shares.iter_mut() {
            let x = share[0];
            share.push(eval(&coeffs, x));
        }
    }
    coeffs.zeroize();

    Ok(shares)
}

/// Combine shares back into the secret.
///
/// Works on any subset of at least the original threshold; the caller is
/// responsible for knowing how many shares suffice. Fewer than the
/// threshold yields a value unrelated to the secret, not an error.
pub fn combine(shares: &[Vec<u8>]) -> RememoryResult<Vec<u8>> {
    if shares.len() < 2 {
        return Err(RememoryError::Insufficient(shares.len()));
    }

    let len = shares[0].len();
    if len < 2 {
        return Err(RememoryError::CombineFailed(
            "share is too short to carry a payload".into(),
        ));
    }
    if shares.iter().any(|s| s.len() != len) {
        return Err(RememoryError::CombineFailed(
            "shares have mismatched lengths".into(),
        ));
    }

    let mut seen = [false; 256];
    for share in shares {
        let x = share[0];
        if x == 0 {
            return Err(RememoryError::CombineFailed(
                "share has a zero index byte".into(),
            ));
        }
        if seen[x as usize] {
            return Err(RememoryError::DuplicateIndex(x));
        }
        seen[x as usize] = true;
    }

    let mut secret = Vec::with_capacity(len - 1);
    for pos in 1..len {
        secret.push(interpolate_at_zero(shares, pos));
    }
    Ok(secret)
}

/// Evaluate the polynomial with the given coefficients at `x` (Horner).
fn eval(coeffs: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coeffs.iter().rev() {
        acc = gf_mul(acc, x) ^ c;
    }
    acc
}

/// Lagrange interpolation at x = 0 for byte position `pos`.
fn interpolate_at_zero(shares: &[Vec<u8>], pos: usize) -> u8 {
    let mut acc = 0u8;
    for (i, si) in shares.iter().enumerate() {
        let (xi, yi) = (si[0], si[pos]);
        let mut basis = 1u8;
        for (j, sj) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            let xj = sj[0];
            basis = gf_mul(basis, gf_div(xj, xi ^ xj));
        }
        acc ^= gf_mul(yi, basis);
    }
    acc
}

/// Carry-less multiplication modulo x^8 + x^4 + x^3 + x + 1.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    p
}

/// Division via the multiplicative inverse; `b` must be non-zero.
fn gf_div(a: u8, b: u8) -> u8 {
    debug_assert_ne!(b, 0, "division by zero in GF(2^8)");
    gf_mul(a, gf_inv(b))
}

/// Inverse by exponentiation: a^254 = a^-1 in GF(2^8)*.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}
