use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::OverlayError;

/// Radix of a single identifier digit.
pub const BASE: usize = 16;

/// Number of digits in every identifier.
pub const DIGITS: usize = 40;

/// A fixed-length digit vector locating a node or a key in the overlay.
///
/// Digit 0 is the most significant. Ids are ordered numerically, which for a
/// fixed-length digit vector is the same as lexicographic digit order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Id([u8; DIGITS]);

impl Id {
    pub fn from_digits(digits: &[u8]) -> Result<Self, OverlayError> {
        if digits.len() != DIGITS {
            return Err(OverlayError::MalformedIdentifier(format!(
                "expected {} digits, got {}",
                DIGITS,
                digits.len()
            )));
        }

        let mut out = [0u8; DIGITS];
        for (i, &d) in digits.iter().enumerate() {
            if d as usize >= BASE {
                return Err(OverlayError::MalformedIdentifier(format!(
                    "digit {} at position {} is out of range",
                    d, i
                )));
            }
            out[i] = d;
        }

        Ok(Self(out))
    }

    /// Hashes arbitrary bytes into the identifier space (leading SHA-256 nibbles).
    pub fn hash(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; DIGITS];
        for (i, slot) in out.iter_mut().enumerate() {
            let byte = digest[i / 2];
            *slot = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        }
        Self(out)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut out = [0u8; DIGITS];
        for slot in out.iter_mut() {
            *slot = rng.gen_range(0..BASE) as u8;
        }
        Self(out)
    }

    pub fn digits(&self) -> &[u8; DIGITS] {
        &self.0
    }

    /// Panics when `i >= DIGITS`.
    pub fn digit_at(&self, i: usize) -> u8 {
        self.0[i]
    }

    pub fn shared_prefix_len(&self, other: &Id) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Absolute numeric difference, treating both ids as base-`BASE` integers.
    pub fn distance(&self, other: &Id) -> Distance {
        let (hi, lo) = match self.cmp(other) {
            Ordering::Less => (other, self),
            _ => (self, other),
        };

        let mut out = [0u8; DIGITS];
        let mut borrow = 0i16;
        for i in (0..DIGITS).rev() {
            let mut d = hi.0[i] as i16 - lo.0[i] as i16 - borrow;
            if d < 0 {
                d += BASE as i16;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = d as u8;
        }
        Distance(out)
    }
}

/// Numeric distance between two ids; compares like the integer it encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance([u8; DIGITS]);

impl Distance {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&d| d == 0)
    }
}

/// Cyclic upward distance from `from` to `to` within a single digit position.
pub fn digit_gap(from: u8, to: u8) -> usize {
    (to as usize + BASE - from as usize) % BASE
}

pub fn equal(a: &Id, b: &Id) -> bool {
    a == b
}

pub fn shared_prefix_len(a: &Id, b: &Id) -> usize {
    a.shared_prefix_len(b)
}

pub fn digit_at(id: &Id, i: usize) -> u8 {
    id.digit_at(i)
}

pub fn distance(a: &Id, b: &Id) -> Distance {
    a.distance(b)
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.0.iter() {
            write!(f, "{:x}", d)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl FromStr for Id {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .chars()
            .map(|c| {
                c.to_digit(BASE as u32).map(|d| d as u8).ok_or_else(|| {
                    OverlayError::MalformedIdentifier(format!("invalid digit {:?} in {:?}", c, s))
                })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Id::from_digits(&digits)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for Id {
    type Error = OverlayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Builds an id from a short hex prefix, padding the remaining digits with zeros.
#[cfg(test)]
pub(crate) fn padded(prefix: &str) -> Id {
    let mut s = prefix.to_lowercase();
    while s.len() < DIGITS {
        s.push('0');
    }
    s.parse().expect("test id")
}
