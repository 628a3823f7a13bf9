//! What a symbol callback emits (spec §3 "Symbol result").

use crate::bounded::{OrderedSet, DEFAULT_OPTION_CAP};

/// A single symbol result, as produced by a callback invocation.
#[derive(Debug, Clone)]
pub struct SymbolResult {
    pub symbol: String,
    /// Score multiplier; the accumulator's stored raw weight is
    /// `registered_weight * multiplier`.
    pub multiplier: f64,
    options: OrderedSet,
    /// Optional nested sub-symbol results (e.g. a multi-hit composite
    /// sub-check reporting more than one finding under one callback).
    pub sub_symbols: Vec<SymbolResult>,
}

impl SymbolResult {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            multiplier: 1.0,
            options: OrderedSet::with_capacity(DEFAULT_OPTION_CAP),
            sub_symbols: Vec::new(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.insert(option);
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn options(&self) -> &[String] {
        self.options.as_slice()
    }

    pub(crate) fn options_mut(&mut self) -> &mut OrderedSet {
        &mut self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_dedups_options_in_order() {
        let r = SymbolResult::new("FOO")
            .with_multiplier(2.0)
            .with_option("a")
            .with_option("b")
            .with_option("a");
        assert_eq!(r.options(), &["a", "b"]);
        assert_eq!(r.multiplier, 2.0);
    }
}
