// src/accumulator/rsa.rs
//! RSA accumulator over the RSA-2048 challenge modulus.
//!
//! A digest commits to a set of DIDs as `D = g^(p_1 * ... * p_n) mod N`,
//! where `p_i` is the prime representative of the i-th member. A witness for
//! member `m` is the same product with `p_m` left out, so membership is
//! checked with a single exponentiation: `w^(p_m) == D`.
//!
//! The factorization of `N` is unknown to everyone, so nobody can take
//! `p`-th roots. That is what makes forged witnesses infeasible, and it also
//! means removals need the removed member's witness (the new digest *is* that
//! witness) rather than a trapdoor.

use crate::utils::crypto::hash_parts;
use num_bigint::{BigInt, BigUint, Sign};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use thiserror::Error;

/// RSA-2048 challenge number (decimal). Nobody knows its factors.
const RSA_2048_DECIMAL: &str = "\
25195908475657893494027183240048398571429282126204032027777137836043662020707595556264018525880784406918290641249515082189298559149176184502808489120072844992687392807287776735971418347270261896375014971824691165077613379859095700097330459748808428401797429100642458691817195118746121515172654632282216869987549182422433637259085141865462043576798423387184774447920739934236584823824281198163815010674810451660377306056201619676256133844143603833904414952634432190114657544454178424020924616515723350778707749817125772467962926386356373289912154831438167899885040445364023527381951378636564391212010397122822120720357";

/// Accumulator base.
pub const GENERATOR: u32 = 65537;

/// Width of a serialized digest or witness.
pub const ELEMENT_BYTES: usize = 256;

const PRIME_DOMAIN: &[u8] = b"weid-trust-registry/hash-to-prime/v1";
const MILLER_RABIN_DOMAIN: &[u8] = b"weid-trust-registry/miller-rabin/v1";
const MILLER_RABIN_ROUNDS: u32 = 24;
const SMALL_PRIME_BOUND: usize = 2000;

static RSA_2048_MODULUS: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(RSA_2048_DECIMAL.as_bytes(), 10).expect("RSA-2048 literal is decimal")
});

static SMALL_PRIMES: Lazy<Vec<u32>> = Lazy::new(|| {
    let mut sieve = vec![true; SMALL_PRIME_BOUND];
    let mut primes = Vec::new();
    for i in 2..SMALL_PRIME_BOUND {
        if sieve[i] {
            primes.push(i as u32);
            let mut j = i * i;
            while j < SMALL_PRIME_BOUND {
                sieve[j] = false;
                j += i;
            }
        }
    }
    primes
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("witness does not prove membership of {0}")]
    InvalidWitness(String),

    #[error("{0} is not a member of the accumulated set")]
    NotAMember(String),

    #[error("malformed accumulator element: {0}")]
    MalformedElement(String),

    #[error("prime representatives of {0} and {1} collide")]
    PrimeCollision(String, String),

    #[error("invalid accumulator parameters: {0}")]
    InvalidParameters(String),

    #[error("inconsistent membership history: {0}")]
    InconsistentHistory(String),
}

/// Accumulator value committing to a member set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(BigUint);

/// Membership proof for one member against one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness(BigUint);

macro_rules! group_element {
    ($ty:ident) => {
        impl $ty {
            /// Fixed-width big-endian encoding.
            pub fn to_bytes(&self) -> Vec<u8> {
                let raw = self.0.to_bytes_be();
                let mut out = vec![0u8; ELEMENT_BYTES.saturating_sub(raw.len())];
                out.extend_from_slice(&raw);
                out
            }

            /// Parses a value produced by `to_bytes`.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, AccumulatorError> {
                if bytes.is_empty() || bytes.len() > ELEMENT_BYTES {
                    return Err(AccumulatorError::MalformedElement(format!(
                        "expected at most {} bytes, got {}",
                        ELEMENT_BYTES,
                        bytes.len()
                    )));
                }
                Ok(Self(BigUint::from_bytes_be(bytes)))
            }
        }
    };
}

group_element!(Digest);
group_element!(Witness);

impl Digest {
    /// The witness of whichever member gets added on top of this digest.
    pub fn as_witness(&self) -> Witness {
        Witness(self.0.clone())
    }
}

/// The accumulator engine. Stateless apart from its public parameters.
#[derive(Debug, Clone)]
pub struct RsaAccumulator {
    modulus: BigUint,
    generator: BigUint,
}

impl Default for RsaAccumulator {
    fn default() -> Self {
        Self {
            modulus: RSA_2048_MODULUS.clone(),
            generator: BigUint::from(GENERATOR),
        }
    }
}

impl RsaAccumulator {
    /// Engine over custom parameters. The factorization of `modulus` must be
    /// unknown to every party for the scheme to be sound.
    pub fn with_parameters(modulus: BigUint, generator: BigUint) -> Result<Self, AccumulatorError> {
        let one = BigUint::from(1u32);
        if generator <= one || generator >= modulus {
            return Err(AccumulatorError::InvalidParameters(
                "generator must lie in (1, N)".to_string(),
            ));
        }
        if modulus.bits() as usize > ELEMENT_BYTES * 8 {
            return Err(AccumulatorError::InvalidParameters(format!(
                "modulus wider than {} bits",
                ELEMENT_BYTES * 8
            )));
        }
        Ok(Self { modulus, generator })
    }

    /// Digest of the empty set.
    pub fn empty_digest(&self) -> Digest {
        Digest(self.generator.clone())
    }

    /// Prime representative of `member`.
    pub fn prime_for(&self, member: &str) -> BigUint {
        hash_to_prime(member)
    }

    /// `add(D, m) = D^(p_m)`.
    pub fn add(&self, digest: &Digest, member: &str) -> Digest {
        Digest(digest.0.modpow(&hash_to_prime(member), &self.modulus))
    }

    /// `remove(D, m)`: checks `witness` against `digest` and returns the
    /// digest of the set without `m`, which is exactly that witness.
    pub fn remove(&self, digest: &Digest, member: &str, witness: &Witness) -> Result<Digest, AccumulatorError> {
        if !self.verify(digest, member, witness) {
            return Err(AccumulatorError::InvalidWitness(member.to_string()));
        }
        Ok(Digest(witness.0.clone()))
    }

    /// Digest of an explicit member set. Duplicates count once.
    pub fn accumulate<'a, I>(&self, members: I) -> Digest
    where
        I: IntoIterator<Item = &'a str>,
    {
        let set: BTreeSet<&str> = members.into_iter().collect();
        set.into_iter()
            .fold(self.empty_digest(), |digest, member| self.add(&digest, member))
    }

    /// Witness for `member` computed from the full member set.
    pub fn witness<'a, I>(&self, members: I, member: &str) -> Result<Witness, AccumulatorError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set: BTreeSet<&str> = members.into_iter().collect();
        if !set.remove(member) {
            return Err(AccumulatorError::NotAMember(member.to_string()));
        }
        Ok(Witness(self.accumulate(set).0))
    }

    /// `verify(D, m, w)`: true iff `w^(p_m) == D (mod N)`.
    pub fn verify(&self, digest: &Digest, member: &str, witness: &Witness) -> bool {
        if witness.0 >= self.modulus || digest.0 >= self.modulus {
            return false;
        }
        witness.0.modpow(&hash_to_prime(member), &self.modulus) == digest.0
    }

    /// Carries `witness` forward over the addition of `added`.
    pub fn update_on_add(&self, witness: &Witness, added: &str) -> Witness {
        Witness(witness.0.modpow(&hash_to_prime(added), &self.modulus))
    }

    /// Carries `witness` forward over several additions at once, with a
    /// single exponentiation by the product of their primes.
    pub fn update_on_adds<'a, I>(&self, witness: &Witness, added: I) -> Witness
    where
        I: IntoIterator<Item = &'a str>,
    {
        let exponent = added
            .into_iter()
            .fold(BigUint::from(1u32), |acc, member| acc * hash_to_prime(member));
        Witness(witness.0.modpow(&exponent, &self.modulus))
    }

    /// Carries `member`'s witness forward over the removal of `removed`,
    /// given the digest produced by that removal.
    ///
    /// With `a*p_m + b*p_x = 1`, the new witness is `w^b * D'^a`.
    pub fn update_on_remove(
        &self,
        witness: &Witness,
        member: &str,
        removed: &str,
        new_digest: &Digest,
    ) -> Result<Witness, AccumulatorError> {
        if member == removed {
            return Err(AccumulatorError::NotAMember(member.to_string()));
        }
        let p_member = hash_to_prime(member);
        let p_removed = hash_to_prime(removed);
        // a = p_m^-1 mod p_x, then b = (1 - a*p_m) / p_x exactly.
        let a = p_member
            .modinv(&p_removed)
            .ok_or_else(|| AccumulatorError::PrimeCollision(member.to_string(), removed.to_string()))?;
        let b = (BigInt::from(1) - BigInt::from(a.clone() * &p_member)) / BigInt::from(p_removed);

        let left = self.pow_signed(&witness.0, &b)?;
        let right = new_digest.0.modpow(&a, &self.modulus);
        Ok(Witness((left * right) % &self.modulus))
    }

    fn pow_signed(&self, base: &BigUint, exponent: &BigInt) -> Result<BigUint, AccumulatorError> {
        match exponent.sign() {
            Sign::Minus => {
                // Only fails if someone found a factor of N.
                let inverse = base.modinv(&self.modulus).ok_or_else(|| {
                    AccumulatorError::MalformedElement("element shares a factor with the modulus".to_string())
                })?;
                Ok(inverse.modpow(exponent.magnitude(), &self.modulus))
            }
            _ => Ok(base.modpow(exponent.magnitude(), &self.modulus)),
        }
    }
}

/// Maps a DID to a 256-bit prime by hashing with an increasing counter until
/// the candidate passes the primality test. Deterministic across nodes.
fn hash_to_prime(member: &str) -> BigUint {
    let mut counter: u64 = 0;
    loop {
        let mut bytes = hash_parts(&[PRIME_DOMAIN, member.as_bytes(), &counter.to_be_bytes()]);
        bytes[0] |= 0x80;
        bytes[31] |= 0x01;
        let candidate = BigUint::from_bytes_be(&bytes);
        if is_probable_prime(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Trial division followed by Miller-Rabin with bases derived from the
/// candidate itself, so every node reaches the same verdict.
pub(crate) fn is_probable_prime(n: &BigUint) -> bool {
    let zero = BigUint::from(0u32);
    let one = BigUint::from(1u32);
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if *n < two {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if n % &p == zero {
            return false;
        }
    }

    let n_minus_1 = n - &one;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> (s as usize);
    let base_range = n - &three;
    let n_bytes = n.to_bytes_be();

    'witness: for round in 0..MILLER_RABIN_ROUNDS {
        let seed = hash_parts(&[MILLER_RABIN_DOMAIN, &n_bytes, &round.to_be_bytes()]);
        let a = BigUint::from_bytes_be(&seed) % &base_range + &two;
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
