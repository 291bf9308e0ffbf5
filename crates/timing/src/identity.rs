//! Component identity resolution.
//!
//! Every observation is tagged with the logical name of the data-access
//! component that was called. Proxies describe the component they stand in
//! for with a [`ComponentDescriptor`]; [`resolve`] turns that descriptor into
//! the [`ComponentIdentity`] used for the `class` tag.
//!
//! # Resolution order
//!
//! 1. A proxy declaring more than one capability (a domain capability plus the generic marker)
//!    resolves to the simple name of its *first* declared capability. Proxies list the most
//!    specific capability first.
//! 2. A proxy declaring only the marker (or nothing) resolves to the simple name of the type it
//!    wraps.
//! 3. A direct, non-proxied target resolves to its own type's simple name.
//! 4. Anything else resolves to [`FALLBACK_IDENTITY`].
//!
//! ```
//! use repo_timing::identity::{ComponentDescriptor, resolve};
//!
//! struct StorageConfigRepository;
//!
//! let proxy = ComponentDescriptor::proxy::<StorageConfigRepository>(["ConfigRepository", "Repository"]);
//! assert_eq!(resolve(&proxy).as_str(), "ConfigRepository");
//!
//! let marker_only = ComponentDescriptor::proxy::<StorageConfigRepository>(["Repository"]);
//! assert_eq!(resolve(&marker_only).as_str(), "StorageConfigRepository");
//! ```

use std::{any::type_name, borrow::Cow, fmt, sync::Arc};

/// Identity used when nothing better can be determined.
pub const FALLBACK_IDENTITY: &str = "Repository";

/// Describes the target of an invocation: which capabilities a proxy declares
/// and which concrete type sits behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentDescriptor {
    /// A proxy standing in for another component.
    Proxy {
        /// Declared capabilities, most specific first.
        interfaces: Vec<Cow<'static, str>>,
        /// Type name of the wrapped target, if known.
        target_type: Option<Cow<'static, str>>,
    },
    /// A component called directly, without a proxy.
    Direct {
        /// Type name of the component.
        type_name: Cow<'static, str>,
    },
    /// Nothing is known about the target.
    Unknown,
}

impl ComponentDescriptor {
    /// Describes a proxy wrapping a `T` and declaring `interfaces`.
    pub fn proxy<T: ?Sized>(
        interfaces: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        Self::Proxy {
            interfaces: interfaces.into_iter().map(Into::into).collect(),
            target_type: Some(Cow::Borrowed(type_name::<T>())),
        }
    }

    /// Describes a `T` called without a proxy.
    pub fn direct<T: ?Sized>() -> Self {
        Self::Direct { type_name: Cow::Borrowed(type_name::<T>()) }
    }

    /// Describes a target about which nothing is known.
    pub fn unknown() -> Self {
        Self::Unknown
    }
}

/// The resolved logical name of a component.
///
/// Cheap to clone; shared between the timing sample and the emitted observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentIdentity(Arc<str>);

impl ComponentIdentity {
    /// Creates an identity from an already-resolved name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn fallback() -> Self {
        Self(Arc::from(FALLBACK_IDENTITY))
    }
}

impl fmt::Display for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComponentIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves the identity of the component described by `descriptor`.
///
/// Never fails: undeterminable names degrade to [`FALLBACK_IDENTITY`].
#[must_use]
pub fn resolve(descriptor: &ComponentDescriptor) -> ComponentIdentity {
    let name = match descriptor {
        ComponentDescriptor::Proxy { interfaces, target_type } => {
            if interfaces.len() > 1 {
                simple_name(&interfaces[0])
                    .or_else(|| target_type.as_deref().and_then(simple_name))
            } else {
                target_type.as_deref().and_then(simple_name)
            }
        },
        ComponentDescriptor::Direct { type_name } => simple_name(type_name),
        ComponentDescriptor::Unknown => None,
    };

    name.map_or_else(ComponentIdentity::fallback, ComponentIdentity::new)
}

/// Strips generic arguments, `dyn ` prefixes and the module path from a type name.
///
/// `a::b::Foo<c::D>` becomes `Foo`. Returns `None` when nothing is left.
fn simple_name(path: &str) -> Option<&str> {
    let path = path.trim();
    let path = path.strip_prefix("dyn ").unwrap_or(path);
    let without_generics = match path.find('<') {
        Some(idx) => &path[..idx],
        None => path,
    };
    let name = without_generics.rsplit("::").next().unwrap_or_default().trim();
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct StorageConfigRepository;
    struct Wrapper<T>(T);

    #[test]
    fn test_proxy_with_domain_capability_uses_first_interface() {
        let descriptor = ComponentDescriptor::proxy::<StorageConfigRepository>([
            "ConfigRepository",
            "Repository",
        ]);
        assert_eq!(resolve(&descriptor).as_str(), "ConfigRepository");
    }

    #[test]
    fn test_proxy_interface_path_is_shortened() {
        let descriptor = ComponentDescriptor::proxy::<StorageConfigRepository>([
            "crate::repository::ConfigRepository",
            "crate::repository::Repository",
        ]);
        assert_eq!(resolve(&descriptor).as_str(), "ConfigRepository");
    }

    #[test]
    fn test_proxy_with_marker_only_uses_target_type() {
        let descriptor = ComponentDescriptor::proxy::<StorageConfigRepository>(["Repository"]);
        assert_eq!(resolve(&descriptor).as_str(), "StorageConfigRepository");
    }

    #[test]
    fn test_proxy_without_interfaces_uses_target_type() {
        let descriptor =
            ComponentDescriptor::proxy::<StorageConfigRepository>(Vec::<&'static str>::new());
        assert_eq!(resolve(&descriptor).as_str(), "StorageConfigRepository");
    }

    #[test]
    fn test_generic_target_type_drops_arguments() {
        let descriptor =
            ComponentDescriptor::proxy::<Wrapper<StorageConfigRepository>>(["Repository"]);
        assert_eq!(resolve(&descriptor).as_str(), "Wrapper");
    }

    #[test]
    fn test_direct_target_uses_own_type() {
        let descriptor = ComponentDescriptor::direct::<StorageConfigRepository>();
        assert_eq!(resolve(&descriptor).as_str(), "StorageConfigRepository");
    }

    #[test]
    fn test_unknown_target_falls_back() {
        assert_eq!(resolve(&ComponentDescriptor::unknown()).as_str(), FALLBACK_IDENTITY);
    }

    #[test]
    fn test_proxy_without_target_type_falls_back() {
        let descriptor =
            ComponentDescriptor::Proxy { interfaces: vec!["Repository".into()], target_type: None };
        assert_eq!(resolve(&descriptor).as_str(), FALLBACK_IDENTITY);
    }

    #[test]
    fn test_blank_first_interface_degrades_to_target_type() {
        let descriptor =
            ComponentDescriptor::proxy::<StorageConfigRepository>(["  ", "Repository"]);
        assert_eq!(resolve(&descriptor).as_str(), "StorageConfigRepository");
    }

    #[test]
    fn test_simple_name_edge_cases() {
        assert_eq!(simple_name("Foo"), Some("Foo"));
        assert_eq!(simple_name("a::b::Foo"), Some("Foo"));
        assert_eq!(simple_name("a::Foo<b::Bar<c::Baz>>"), Some("Foo"));
        assert_eq!(simple_name("dyn a::Capability"), Some("Capability"));
        assert_eq!(simple_name(""), None);
        assert_eq!(simple_name("a::"), None);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_ident() -> impl Strategy<Value = String> {
            "[A-Z][A-Za-z0-9_]{0,15}"
        }

        proptest! {
            /// A proxy declaring two or more capabilities always resolves to the first one.
            #[test]
            fn first_capability_wins(
                names in proptest::collection::vec(arb_ident(), 2..6),
                module in "[a-z_]{1,8}",
            ) {
                let interfaces: Vec<Cow<'static, str>> =
                    names.iter().map(|n| Cow::Owned(format!("{module}::{n}"))).collect();
                let descriptor = ComponentDescriptor::Proxy {
                    interfaces,
                    target_type: Some(Cow::Borrowed("x::Concrete")),
                };
                let resolved = resolve(&descriptor);
                prop_assert_eq!(resolved.as_str(), names[0].as_str());
            }

            /// Resolution never produces an empty identity.
            #[test]
            fn identity_is_never_empty(
                interfaces in proptest::collection::vec("[a-zA-Z:<> ]{0,12}", 0..4),
                target in proptest::option::of("[a-zA-Z:<> ]{0,12}"),
            ) {
                let descriptor = ComponentDescriptor::Proxy {
                    interfaces: interfaces.into_iter().map(Cow::Owned).collect(),
                    target_type: target.map(Cow::Owned),
                };
                prop_assert!(!resolve(&descriptor).as_str().is_empty());
            }
        }
    }
}
