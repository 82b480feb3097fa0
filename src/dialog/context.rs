//! Caller-local dialog registrations

use super::types::DialogRegistration;
use std::collections::HashMap;

/// Registrations visible only to the code path that owns this context.
///
/// Lookups try the runtime-attached table first, then the statically declared
/// one. Both shadow the manager's global table.
#[derive(Debug, Clone, Default)]
pub struct DialogContext {
    local: HashMap<String, DialogRegistration>,
    declared: HashMap<String, DialogRegistration>,
}

impl DialogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a registration at runtime
    pub fn with_local(mut self, name: impl Into<String>, registration: DialogRegistration) -> Self {
        self.local.insert(name.into(), registration);
        self
    }

    /// Declare a registration as part of the owner's static definition
    pub fn with_declared(mut self, name: impl Into<String>, registration: DialogRegistration) -> Self {
        self.declared.insert(name.into(), registration);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&DialogRegistration> {
        self.local.get(name).or_else(|| self.declared.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ComponentRef;

    #[test]
    fn test_local_shadows_declared() {
        let context = DialogContext::new()
            .with_declared("Share", DialogRegistration::component(ComponentRef::new("Declared")))
            .with_local("Share", DialogRegistration::component(ComponentRef::new("Local")));

        let resolved = context.resolve("Share").unwrap();
        assert_eq!(resolved.component_ref().name, "Local");
        assert!(context.resolve("Other").is_none());
    }
}
