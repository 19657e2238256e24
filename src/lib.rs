//! # wirebox
//!
//! Async-first, task-safe dependency injection for Rust, inspired by
//! Microsoft.Extensions.DependencyInjection.
//!
//! ## Features
//!
//! - **Three lifetimes**: singleton, scoped, and transient services
//! - **Keyed services**: any `Eq + Hash` key, with a catch-all sentinel
//! - **Cached resolution plans**: each service compiles once into a
//!   call-site tree, shared by every resolution
//! - **Async throughout**: async factories, async teardown, and fair,
//!   reentrant async locking on every shared structure
//! - **Scope validation**: reject singletons that capture scoped services
//!   before anything is constructed
//! - **Deterministic teardown**: disposables run in reverse capture order
//!
//! ## Quick start
//!
//! ```rust
//! use wirebox::{ServiceCollection, ResolverExt};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_async_factory(|scope| async move {
//!     Ok(UserService {
//!         db: scope.get_required::<Database>().await?,
//!     })
//! });
//!
//! let provider = services.build_provider();
//! let user_service = provider.get_required::<UserService>().await?;
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! provider.aclose().await?;
//! # Ok(()) }
//! ```
//!
//! ## Service lifetimes
//!
//! - **Singleton**: created once, cached in the provider's root scope
//! - **Scoped**: created once per [`Scope`] (one web request, one job run)
//! - **Transient**: created fresh on every resolution; disposable
//!   transients are still captured by the resolving scope for teardown
//!
//! ## Scoped services
//!
//! ```rust
//! use wirebox::{ServiceCollection, ResolverExt};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! struct Session(u32);
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> wirebox::DiResult<()> {
//! let mut services = ServiceCollection::new();
//! let counter = Arc::new(AtomicU32::new(0));
//! let c = counter.clone();
//! services.add_scoped_factory(move |_| Session(c.fetch_add(1, Ordering::SeqCst)));
//!
//! let provider = services.build_provider();
//!
//! let scope1 = provider.create_scope()?;
//! let scope2 = provider.create_scope()?;
//! let a = scope1.get_required::<Session>().await?;
//! let b = scope1.get_required::<Session>().await?;
//! let c = scope2.get_required::<Session>().await?;
//! assert!(Arc::ptr_eq(&a, &b)); // same scope, same instance
//! assert_ne!(a.0, c.0); // different scopes, different instances
//!
//! scope1.dispose().await?;
//! scope2.dispose().await?;
//! provider.aclose().await?;
//! # Ok(()) }
//! ```

// Module declarations
pub mod collection;
pub mod container;
pub mod descriptors;
pub mod error;
pub mod injection;
pub mod key;
pub mod lifetime;
pub mod lookup;
pub mod provider;
pub mod sync;
pub mod traits;
pub mod typed_type;

#[cfg(any(feature = "logging-pretty", feature = "logging-json"))]
pub mod logging;

// Internal modules
mod internal;

// Re-export core types
pub use collection::ServiceCollection;
pub use container::ServiceContainer;
pub use descriptors::{AnyArc, BoxFuture, ServiceDescriptor};
pub use error::{DiError, DiResult};
pub use injection::{Arguments, ConstructorInfo, Injectable, KeyLookupMode, ParameterInfo};
pub use key::ServiceKey;
pub use lifetime::Lifetime;
pub use lookup::{ServiceCacheKey, ServiceIdentifier};
pub use provider::{
    OverrideGuard, Scope, ScopeFactory, ServiceProvider, ServiceProviderIsKeyedService,
    ServiceProviderIsService,
};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverExt};
pub use typed_type::TypedType;
