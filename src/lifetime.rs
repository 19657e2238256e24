//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior.
///
/// Defines how service instances are created, cached, and shared within
/// the dependency injection container.
///
/// # Examples
///
/// ```rust
/// use wirebox::{ServiceCollection, ResolverExt, Lifetime};
///
/// struct Database { url: String }
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
/// let mut services = ServiceCollection::new();
///
/// // Singleton: one instance for the entire provider
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
///
/// let provider = services.build_provider();
/// let a = provider.get_required::<Database>().await?;
/// let b = provider.get_required::<Database>().await?;
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// # provider.aclose().await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never memoized.
    ///
    /// Transient services create a fresh instance every time they are
    /// requested, even within the same scope. Disposable transients are
    /// still captured by the resolving scope for teardown.
    Transient,
    /// Single instance per scope, cached for the scope lifetime.
    ///
    /// Scoped services are created once per scope on first request. The
    /// root scope refuses to resolve user scoped services when scope
    /// validation is enabled.
    Scoped,
    /// Single instance per provider, cached in the root scope.
    Singleton,
}

impl Lifetime {
    /// Human-readable name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
        }
    }
}
