//! Random password generation.
//!
//! A password is assembled from letters, digits, and symbols in the
//! requested proportions. Each character is inserted at a random position and
//! no character appears twice.

use rand::Rng;
use rand::seq::SliceRandom;

const LOWER_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

/// The shape of a password to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Total number of characters.
    pub length: usize,
    /// How many of them are digits.
    pub digits: usize,
    /// How many of them are symbols.
    pub symbols: usize,
}

/// Errors raised when a policy cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    /// Digits and symbols together exceed the length.
    #[error("{digits} digits and {symbols} symbols exceed the total length {length}")]
    ExceedsTotalLength {
        /// Requested length.
        length: usize,
        /// Requested digits.
        digits: usize,
        /// Requested symbols.
        symbols: usize,
    },

    /// More unique characters of one class were requested than exist.
    #[error("{requested} unique {class} requested but only {available} available")]
    ExceedsAvailable {
        /// The character class, e.g. `letters`.
        class: &'static str,
        /// Requested count.
        requested: usize,
        /// Characters in the class.
        available: usize,
    },
}

/// Capability that produces random passwords.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordGenerator {
    /// Generate a password matching `policy`.
    ///
    /// # Errors
    ///
    /// Returns an error when the policy cannot be satisfied.
    fn generate(&self, policy: &PasswordPolicy) -> Result<String, PasswordError>;
}

/// Generator backed by the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPasswordGenerator;

impl PasswordGenerator for RandomPasswordGenerator {
    fn generate(&self, policy: &PasswordPolicy) -> Result<String, PasswordError> {
        generate_with(&mut rand::thread_rng(), policy)
    }
}

/// Generate a password using the supplied random source.
///
/// # Errors
///
/// Returns an error when the policy cannot be satisfied.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    policy: &PasswordPolicy,
) -> Result<String, PasswordError> {
    let letters: Vec<char> = LOWER_LETTERS.chars().chain(UPPER_LETTERS.chars()).collect();
    let digits: Vec<char> = DIGITS.chars().collect();
    let symbols: Vec<char> = SYMBOLS.chars().collect();

    let letter_count = policy
        .length
        .checked_sub(policy.digits)
        .and_then(|rest| rest.checked_sub(policy.symbols))
        .ok_or(PasswordError::ExceedsTotalLength {
            length: policy.length,
            digits: policy.digits,
            symbols: policy.symbols,
        })?;
    check_available("letters", letter_count, letters.len())?;
    check_available("digits", policy.digits, digits.len())?;
    check_available("symbols", policy.symbols, symbols.len())?;

    let mut password = Vec::with_capacity(policy.length);
    for (pool, count) in [
        (&letters, letter_count),
        (&digits, policy.digits),
        (&symbols, policy.symbols),
    ] {
        for &ch in pool.choose_multiple(rng, count) {
            let position = rng.gen_range(0..=password.len());
            password.insert(position, ch);
        }
    }
    Ok(password.into_iter().collect())
}

fn check_available(
    class: &'static str,
    requested: usize,
    available: usize,
) -> Result<(), PasswordError> {
    if requested > available {
        return Err(PasswordError::ExceedsAvailable {
            class,
            requested,
            available,
        });
    }
    Ok(())
}
