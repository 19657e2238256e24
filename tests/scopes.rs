use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use wirebox::{ResolverExt, Scope, ScopeFactory, ServiceCollection};

struct Session {
    id: u32,
}

fn session_collection() -> (ServiceCollection, Arc<AtomicU32>) {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory(move |_| Session {
        id: c.fetch_add(1, Ordering::SeqCst),
    });
    (sc, counter)
}

#[tokio::test]
async fn scoped_services_are_cached_per_scope() {
    let (sc, counter) = session_collection();
    let sp = sc.build_provider();

    let s1 = sp.create_scope().unwrap();
    let x = s1.get_required::<Session>().await.unwrap();
    let y = s1.get_required::<Session>().await.unwrap();
    assert!(Arc::ptr_eq(&x, &y));

    let s2 = sp.create_scope().unwrap();
    let z = s2.get_required::<Session>().await.unwrap();
    assert!(!Arc::ptr_eq(&x, &z));
    assert_ne!(x.id, z.id);

    assert_eq!(counter.load(Ordering::SeqCst), 2);

    s1.dispose().await.unwrap();
    s2.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn singletons_are_shared_across_scopes() {
    struct Registry;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| Registry);

    let sp = sc.build_provider();
    let s1 = sp.create_scope().unwrap();
    let s2 = sp.create_scope().unwrap();

    let a = s1.get_required::<Registry>().await.unwrap();
    let b = s2.get_required::<Registry>().await.unwrap();
    let c = sp.get_required::<Registry>().await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));

    s1.dispose().await.unwrap();
    s2.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn concurrent_scoped_resolution_builds_one_instance() {
    let (sc, counter) = session_collection();
    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let scope = scope.clone();
        handles.push(tokio::spawn(async move {
            scope.get_required::<Session>().await.unwrap().id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    scope.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn current_scope_facade_is_resolvable() {
    let (sc, _) = session_collection();
    let sp = sc.build_provider();

    let root_facade = sp.get_required::<Scope>().await.unwrap();
    assert!(root_facade.is_root());

    let scope = sp.create_scope().unwrap();
    let facade = scope.get_required::<Scope>().await.unwrap();
    assert!(!facade.is_root());

    // The facade resolves against the same scope cache.
    let a = scope.get_required::<Session>().await.unwrap();
    let b = facade.get_required::<Session>().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    scope.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn scope_factory_creates_scopes() {
    let (sc, _) = session_collection();
    let sp = sc.build_provider();

    let factory = sp.get_required::<ScopeFactory>().await.unwrap();
    let s1 = factory.create_scope().unwrap();
    let s2 = factory.create_scope().unwrap();

    let a = s1.get_required::<Session>().await.unwrap();
    let b = s2.get_required::<Session>().await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    s1.dispose().await.unwrap();
    s2.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn sibling_scopes_have_fresh_state() {
    let (sc, _) = session_collection();
    let sp = sc.build_provider();

    let parent = sp.create_scope().unwrap();
    let child = parent.create_scope().unwrap();

    let a = parent.get_required::<Session>().await.unwrap();
    let b = child.get_required::<Session>().await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    child.dispose().await.unwrap();
    parent.dispose().await.unwrap();
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn scoped_resolution_fails_after_scope_disposal() {
    let (sc, _) = session_collection();
    let sp = sc.build_provider();

    let scope = sp.create_scope().unwrap();
    scope.dispose().await.unwrap();

    assert!(scope.get_required::<Session>().await.is_err());

    sp.aclose().await.unwrap();
}
