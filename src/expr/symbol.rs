//! Named symbols and the time variable pair.

use std::fmt;
use std::sync::{Arc, LazyLock};

/// Which sample a symbol refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sample {
    /// Value at the sample being solved for.
    Current,
    /// Value at the previous sample (history).
    Previous,
}

/// A named algebraic quantity: an unknown, an input, a parameter or time.
///
/// Symbols are cheap to clone; the name is reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: Arc<str>,
    sample: Sample,
}

/// The continuous time variable `t`.
pub static TIME: LazyLock<Symbol> = LazyLock::new(|| Symbol::new("t"));

/// The time of the previous sample, `t0`.
pub static PREV_TIME: LazyLock<Symbol> = LazyLock::new(|| TIME.previous());

impl Symbol {
    /// Create a symbol referring to the current sample.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            sample: Sample::Current,
        }
    }

    /// The symbol name, without any sample decoration.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample(&self) -> Sample {
        self.sample
    }

    pub fn is_previous(&self) -> bool {
        self.sample == Sample::Previous
    }

    /// The same quantity one sample earlier.
    pub fn previous(&self) -> Self {
        Self {
            name: self.name.clone(),
            sample: Sample::Previous,
        }
    }

    /// The same quantity at the current sample.
    pub fn current(&self) -> Self {
        Self {
            name: self.name.clone(),
            sample: Sample::Current,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sample {
            Sample::Current => write!(f, "{}", self.name),
            Sample::Previous if *self.name == *TIME.name => write!(f, "{}0", self.name),
            Sample::Previous => write!(f, "{}[t0]", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_keeps_name() {
        let v = Symbol::new("V[out]");
        let v0 = v.previous();
        assert_eq!(v0.name(), "V[out]");
        assert!(v0.is_previous());
        assert_ne!(v, v0);
        assert_eq!(v0.current(), v);
    }

    #[test]
    fn test_time_pair_display() {
        assert_eq!(TIME.to_string(), "t");
        assert_eq!(PREV_TIME.to_string(), "t0");
        assert_eq!(Symbol::new("Vin").previous().to_string(), "Vin[t0]");
    }
}
