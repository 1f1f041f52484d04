use std::collections::{BTreeSet, HashMap};

/// Pure predicate over a candidate secret for one provider.
pub type SecretValidator = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Lookup table from provider identifier to its format validator.
/// Constructed once and handed to the engine by reference; there is no
/// global registry.
#[derive(Default)]
pub struct ProviderRegistry {
    validators: HashMap<String, SecretValidator>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the validator for an identifier.
    pub fn register<F>(&mut self, identifier: impl Into<String>, validator: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validators
            .insert(identifier.into(), Box::new(validator));
    }

    pub fn get(&self, identifier: &str) -> Option<&SecretValidator> {
        self.validators.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.validators.contains_key(identifier)
    }

    /// False when the identifier is unknown or the secret fails its format.
    pub fn validate(&self, identifier: &str, secret: &str) -> bool {
        match self.validators.get(identifier) {
            Some(validator) => validator(secret),
            None => false,
        }
    }

    pub fn identifiers(&self) -> BTreeSet<String> {
        self.validators.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
