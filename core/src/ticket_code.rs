//! Ticket codes: the human-presentable string encoded in the QR code.
//!
//! Format is two groups of eight characters from `[A-Z0-9]` joined by a
//! hyphen, e.g. `K3F8QZ1M-7GH2P0XR`. Each group carries `8 * log2(36) ≈ 41.4`
//! bits of entropy. Uniqueness is enforced by the store; generation never
//! assumes it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Characters a code group is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of each group.
pub const GROUP_LEN: usize = 8;

/// Total length including the separator.
pub const CODE_LEN: usize = GROUP_LEN * 2 + 1;

/// Rejected ticket code input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ticket code must be two groups of 8 letters or digits joined by '-'")]
pub struct MalformedTicketCode;

/// A well-formed ticket code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketCode(String);

impl TicketCode {
    /// Draws a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(CODE_LEN);
        for position in 0..CODE_LEN {
            if position == GROUP_LEN {
                code.push('-');
            } else {
                let index = rng.gen_range(0..CODE_ALPHABET.len());
                code.push(char::from(CODE_ALPHABET[index]));
            }
        }
        Self(code)
    }

    /// Parses scanner or keyboard input.
    ///
    /// Surrounding whitespace is ignored and lowercase letters are accepted, so
    /// a code typed by hand resolves to the same ticket as a scanned one.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTicketCode`] if the input does not match the format.
    pub fn parse(input: &str) -> Result<Self, MalformedTicketCode> {
        let candidate = input.trim().to_ascii_uppercase();
        if Self::is_well_formed(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(MalformedTicketCode)
        }
    }

    fn is_well_formed(candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        bytes.len() == CODE_LEN
            && bytes.iter().enumerate().all(|(position, byte)| {
                if position == GROUP_LEN {
                    *byte == b'-'
                } else {
                    byte.is_ascii_uppercase() || byte.is_ascii_digit()
                }
            })
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First group, used in payment references.
    #[must_use]
    pub fn first_group(&self) -> &str {
        &self.0[..GROUP_LEN]
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TicketCode {
    type Error = MalformedTicketCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TicketCode> for String {
    fn from(code: TicketCode) -> Self {
        code.0
    }
}

/// Source of candidate ticket codes.
///
/// The issuer asks for a new candidate after every uniqueness violation.
pub trait CodeSource: Send + Sync {
    /// Next candidate code.
    fn next_code(&self) -> TicketCode;
}

/// Thread-local CSPRNG backed code source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> TicketCode {
        TicketCode::generate(&mut rand::thread_rng())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn group_entropy_is_at_least_40_bits() {
        #[allow(clippy::cast_precision_loss)]
        let bits = (CODE_ALPHABET.len() as f64).log2() * GROUP_LEN as f64;
        assert!(bits >= 40.0, "group entropy {bits} bits");
    }

    #[test]
    fn generated_codes_are_well_formed() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let code = TicketCode::generate(&mut rng);
            assert_eq!(TicketCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn hundred_thousand_codes_do_not_collide() {
        let source = RandomCodes;
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            assert!(seen.insert(source.next_code()));
        }
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = TicketCode::parse("  k3f8qz1m-7gh2p0xr\n").unwrap();
        assert_eq!(code.as_str(), "K3F8QZ1M-7GH2P0XR");
        assert_eq!(code.first_group(), "K3F8QZ1M");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for input in [
            "",
            "K3F8QZ1M7GH2P0XR",
            "K3F8QZ1M-7GH2P0X",
            "K3F8QZ1M_7GH2P0XR",
            "K3F8QZ1M-7GH2P0XR-",
            "K3F8QZ!M-7GH2P0XR",
            "ÄÄÄÄÄÄÄÄ-7GH2P0XR",
        ] {
            assert_eq!(TicketCode::parse(input), Err(MalformedTicketCode), "{input:?}");
        }
    }

    #[test]
    fn serde_rejects_malformed_codes() {
        let ok: TicketCode = serde_json::from_str("\"AAAAAAAA-BBBBBBBB\"").unwrap();
        assert_eq!(ok.as_str(), "AAAAAAAA-BBBBBBBB");
        assert!(serde_json::from_str::<TicketCode>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn parse_accepts_exactly_the_two_group_pattern(input in "[A-Z0-9]{8}-[A-Z0-9]{8}") {
            let code = TicketCode::parse(&input).unwrap();
            prop_assert_eq!(code.as_str(), input.as_str());
        }

        #[test]
        fn parse_never_accepts_wrong_lengths(input in "[A-Z0-9]{0,7}-[A-Z0-9]{9,12}") {
            prop_assert!(TicketCode::parse(&input).is_err());
        }
    }
}
