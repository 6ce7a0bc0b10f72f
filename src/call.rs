use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Coarse per-argument fingerprint: type identity only, never the value.
///
/// Two calls with the same target, method and argument-type sequence are
/// deliberately treated as the same call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgFingerprint {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ArgFingerprint {
    pub fn of<T: 'static>(_arg: &T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Identity of one intercepted call: which interface declared the method,
/// which target it runs on, and the shape of its arguments.
///
/// Created fresh per invocation and discarded after.
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    /// Name of the declaring interface, used for policy eligibility.
    pub iface: &'static str,
    /// Label identifying the wrapped target (its type label).
    pub target: Arc<str>,
    pub method: &'static str,
    pub args: Vec<ArgFingerprint>,
    /// Sub-resource label resolved by the forwarding adapter from a
    /// context-carrying argument, when one exists.
    pub scope: Option<String>,
}

impl CallDescriptor {
    pub fn new(iface: &'static str, target: Arc<str>, method: &'static str) -> Self {
        Self {
            iface,
            target,
            method,
            args: Vec::new(),
            scope: None,
        }
    }

    pub fn with_arg<T: 'static>(mut self, arg: &T) -> Self {
        self.args.push(ArgFingerprint::of(arg));
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Key grouping "this kind of call" for failure tracking. Not a strong
    /// hash: same shape always yields the same key.
    pub fn failure_key(&self) -> FailureKey {
        let mut hasher = DefaultHasher::new();
        self.target.hash(&mut hasher);
        self.method.hash(&mut hasher);
        for arg in &self.args {
            arg.type_id.hash(&mut hasher);
        }
        FailureKey(hasher.finish())
    }
}

/// Derived identity of a call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailureKey(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(target: &str, method: &'static str) -> CallDescriptor {
        CallDescriptor::new("plugin.events", Arc::from(target), method)
    }

    #[test]
    fn same_shape_same_key() {
        let a = descriptor("demo", "on_event").with_arg(&1u32).with_arg(&"x");
        let b = descriptor("demo", "on_event").with_arg(&7u32).with_arg(&"y");
        assert_eq!(a.failure_key(), b.failure_key());
    }

    #[test]
    fn different_method_different_key() {
        let a = descriptor("demo", "on_event").with_arg(&1u32);
        let b = descriptor("demo", "start").with_arg(&1u32);
        assert_ne!(a.failure_key(), b.failure_key());
    }

    #[test]
    fn different_arg_types_different_key() {
        let a = descriptor("demo", "on_event").with_arg(&1u32);
        let b = descriptor("demo", "on_event").with_arg(&1i64);
        assert_ne!(a.failure_key(), b.failure_key());
    }

    #[test]
    fn different_target_different_key() {
        let a = descriptor("alpha", "on_event");
        let b = descriptor("beta", "on_event");
        assert_ne!(a.failure_key(), b.failure_key());
    }
}
