use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use wirebox::{ResolverExt, ServiceCollection, ServiceDescriptor};

#[derive(Debug)]
struct Late(&'static str);

#[tokio::test]
async fn descriptors_added_after_build_are_resolvable() {
    let sp = ServiceCollection::new().build_provider();
    sp.initialize().await.unwrap();

    assert!(sp.get::<Late>().await.unwrap().is_none());

    sp.add_descriptor(ServiceDescriptor::instance(Late("dynamic"))).await;

    let late = sp.get_required::<Late>().await.unwrap();
    assert_eq!(late.0, "dynamic");

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn later_descriptor_overrides_unrealized_singletons() {
    struct Versioned(u32);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| Versioned(1));

    let sp = sc.build_provider();
    sp.initialize().await.unwrap();

    // Never resolved before the dynamic registration: the new descriptor
    // wins.
    sp.add_descriptor(ServiceDescriptor::factory(
        wirebox::Lifetime::Singleton,
        |_| Versioned(2),
    ))
    .await;

    let resolved = sp.get_required::<Versioned>().await.unwrap();
    assert_eq!(resolved.0, 2);

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn realized_singletons_keep_their_identity() {
    struct Versioned(u32);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| Versioned(1));

    let sp = sc.build_provider();
    let before = sp.get_required::<Versioned>().await.unwrap();
    assert_eq!(before.0, 1);

    sp.add_descriptor(ServiceDescriptor::factory(
        wirebox::Lifetime::Singleton,
        |_| Versioned(2),
    ))
    .await;

    // The new primary registration shares slot 0 with the already
    // materialized instance, so identity is preserved.
    let after = sp.get_required::<Versioned>().await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn enumerations_see_dynamic_registrations() {
    struct Tagged(u32);

    let counter = Arc::new(AtomicU32::new(1));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory(move |_| Tagged(c.fetch_add(1, Ordering::SeqCst)));

    let sp = sc.build_provider();

    let first = sp.get_services::<Tagged>().await.unwrap();
    assert_eq!(first.len(), 1);

    sp.add_descriptor(ServiceDescriptor::factory(
        wirebox::Lifetime::Transient,
        |_| Tagged(100),
    ))
    .await;

    let second = sp.get_services::<Tagged>().await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[1].0, 100);

    sp.aclose().await.unwrap();
}
