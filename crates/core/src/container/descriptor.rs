use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A resolved, type-erased provider instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Stable identity of a provider, derived from its type
///
/// Two declarations of the same type share an identity, which is what makes
/// the provider registry hand out one singleton per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ProviderId {
    /// Create the provider ID for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    /// Check if this ID belongs to `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

/// Last path segment of a type name, without generic arguments
pub fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;
    struct Wrapper<T>(T);

    #[test]
    fn test_identity_is_per_type() {
        assert_eq!(ProviderId::of::<Clock>(), ProviderId::of::<Clock>());
        assert_ne!(ProviderId::of::<Clock>(), ProviderId::of::<String>());
        assert!(ProviderId::of::<Clock>().is::<Clock>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(ProviderId::of::<Clock>().short_name(), "Clock");
        assert_eq!(ProviderId::of::<Wrapper<Clock>>().short_name(), "Wrapper");
    }
}
