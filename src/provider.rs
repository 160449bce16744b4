//! Provider trait for pluggable transaction and data source factories.
//!
//! A configuration document names its transaction manager and data source by
//! type alias (`JDBC`, `POOLED`, ...). Each alias is answered by a `Provider`
//! registered in a [`Registry`](crate::Registry).

use std::any::Any;
use std::fmt::Debug;

/// Base trait for everything a configuration document can name by alias.
///
/// # Example
///
/// ```rust
/// use sqlsession::Provider;
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct VendorFactory;
///
/// impl Provider for VendorFactory {
///     fn name(&self) -> &str {
///         "VENDOR"
///     }
///
///     fn aliases(&self) -> &[&str] {
///         &["VENDOR_DS"]
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let factory = VendorFactory;
/// assert!(factory.supports("vendor"));
/// assert!(factory.supports("Vendor_Ds"));
/// assert!(!factory.supports("pooled"));
/// ```
pub trait Provider: Send + Sync + Debug {
    /// Returns the canonical alias of this provider.
    ///
    /// This name is used for registration and lookup in the registry.
    fn name(&self) -> &str;

    /// Returns additional aliases the provider answers to.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Check whether this provider answers to `alias`, ignoring ASCII case.
    fn supports(&self, alias: &str) -> bool {
        self.name().eq_ignore_ascii_case(alias)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(alias))
    }

    /// Downcast to concrete type for advanced usage.
    fn as_any(&self) -> &dyn Any;
}

/// Extension trait for provider type checking.
pub trait ProviderExt: Provider {
    /// Check if this provider is of type T.
    fn is<T: Provider + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to type T.
    fn downcast_ref<T: Provider + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl<P: Provider + ?Sized> ProviderExt for P {}
