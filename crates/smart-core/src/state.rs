//! State value store
//!
//! A `States` component is a small enumerated value. Its current value is
//! only trusted when it is one of the possible values; otherwise readers see
//! the default, then the first possible value. Writes follow the same rule,
//! so a bad request quietly lands on the default instead of failing.

use crate::States;

impl States {
    /// Create a state store with the given possible values
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: 0,
            value: values.into_iter().map(Into::into).collect(),
            current_value: None,
            default_value: None,
        }
    }

    /// Set the identity of this component
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Set the current value, unchecked
    pub fn with_current(mut self, value: impl Into<String>) -> Self {
        self.current_value = Some(value.into());
        self
    }

    /// Set the default value, unchecked
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// True iff `value` is one of the possible values
    pub fn is_valid(&self, value: &str) -> bool {
        self.value.iter().any(|v| v == value)
    }

    /// The declared default if valid, else the first possible value
    pub fn effective_default(&self) -> Option<&str> {
        match self.default_value.as_deref() {
            Some(d) if self.is_valid(d) => Some(d),
            _ => self.value.first().map(String::as_str),
        }
    }

    /// The current value if valid, else [`States::effective_default`]
    pub fn effective_current(&self) -> Option<&str> {
        match self.current_value.as_deref() {
            Some(c) if self.is_valid(c) => Some(c),
            _ => self.effective_default(),
        }
    }

    /// Set the current value, falling back to the default when `requested`
    /// is not a possible value
    pub fn set_state(&mut self, requested: &str) {
        if self.is_valid(requested) {
            self.current_value = Some(requested.to_string());
            return;
        }

        let fallback = self.effective_default().map(str::to_string);
        log::warn!(
            "state '{}' is not one of {:?}; falling back to {:?}",
            requested,
            self.value,
            fallback
        );
        self.current_value = fallback;
    }

    /// Return to the effective default
    pub fn reset(&mut self) {
        self.current_value = self.effective_default().map(str::to_string);
    }
}
