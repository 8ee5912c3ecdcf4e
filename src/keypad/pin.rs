use anyhow::{anyhow, Result};
use std::fmt;

/// The secret digit sequence to enter.
///
/// Not validated: a non-digit character simply never matches a key. The
/// `Debug` and `Display` forms are masked so the PIN never reaches a log.
#[derive(Clone, PartialEq, Eq)]
pub struct PinSequence(String);

impl PinSequence {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    /// Reads the PIN from the environment variable `name`.
    pub fn from_env(name: &str) -> Result<Self> {
        let value = std::env::var(name)
            .map_err(|_| anyhow!("PIN environment variable {} is not set", name))?;
        Ok(Self::new(value))
    }

    pub fn digits(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn masked(&self) -> String {
        "*".repeat(self.len())
    }
}

impl fmt::Debug for PinSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinSequence({})", self.masked())
    }
}

impl fmt::Display for PinSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
