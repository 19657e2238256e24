use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wirebox::{
    AsyncDispose, ConstructorInfo, DiError, DiResult, Dispose, Injectable, ResolverExt,
    ServiceCollection,
};

type Log = Arc<Mutex<Vec<String>>>;

fn log_entry(log: &Log, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

struct Resource {
    name: String,
}

#[tokio::test]
async fn transient_disposables_tear_down_in_reverse_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let counter = Arc::new(Mutex::new(0u32));

    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_transient_setup_factory(move |_| {
        let mut n = counter.lock().unwrap();
        *n += 1;
        let name = format!("resource-{}", *n);
        let teardown_log = factory_log.clone();
        let teardown_name = name.clone();
        Ok((Resource { name }, move || {
            log_entry(&teardown_log, &teardown_name);
            Ok(())
        }))
    });

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();

    let a = scope.get_required::<Resource>().await.unwrap();
    let b = scope.get_required::<Resource>().await.unwrap();
    let c = scope.get_required::<Resource>().await.unwrap();
    assert_eq!(a.name, "resource-1");
    assert_eq!(b.name, "resource-2");
    assert_eq!(c.name, "resource-3");
    assert!(log.lock().unwrap().is_empty());

    scope.dispose().await.unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["resource-3", "resource-2", "resource-1"]
    );

    // A disposed scope refuses new disposables; the incoming instance is
    // released immediately.
    match scope.get_required::<Resource>().await {
        Err(DiError::ObjectDisposed(_)) => {}
        other => panic!("expected ObjectDisposed, got {:?}", other.map(|r| r.name.clone())),
    }
    assert_eq!(log.lock().unwrap().len(), 4);

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn singleton_disposables_run_on_provider_close() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    struct Pool;

    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_singleton_setup_factory(move |_| {
        let teardown_log = factory_log.clone();
        Ok((Pool, move || {
            log_entry(&teardown_log, "pool");
            Ok(())
        }))
    });

    let sp = sc.build_provider();
    let _pool = sp.get_required::<Pool>().await.unwrap();
    assert!(log.lock().unwrap().is_empty());

    sp.aclose().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["pool"]);

    // Idempotent.
    sp.aclose().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn async_setup_factories_run_async_teardown() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    struct Connection;

    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_async_setup_factory(wirebox::Lifetime::Scoped, move |_scope| {
        let teardown_log = factory_log.clone();
        async move {
            Ok((Connection, move || async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                log_entry(&teardown_log, "connection");
                Ok(())
            }))
        }
    });

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();
    let _conn = scope.get_required::<Connection>().await.unwrap();

    scope.dispose().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["connection"]);

    sp.aclose().await.unwrap();
}

struct TrackedService {
    log: Log,
}

impl Dispose for TrackedService {
    fn dispose(&self) -> DiResult<()> {
        log_entry(&self.log, "tracked");
        Ok(())
    }
}

struct TrackedLog(Log);

impl Injectable for TrackedService {
    fn constructor() -> ConstructorInfo {
        ConstructorInfo::of::<TrackedService, _>(
            vec![wirebox::ParameterInfo::service::<TrackedLog>()],
            |args| {
                Ok(TrackedService {
                    log: args.get::<TrackedLog>(0)?.0.clone(),
                })
            },
        )
        .with_dispose::<TrackedService>()
    }
}

#[tokio::test]
async fn constructor_dispose_hook_is_captured() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    sc.add_singleton(TrackedLog(log.clone()));
    sc.add_scoped_injectable::<TrackedService>();

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();
    let _service = scope.get_required::<TrackedService>().await.unwrap();

    scope.dispose().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["tracked"]);

    sp.aclose().await.unwrap();
}

struct AsyncClient {
    log: Log,
}

#[async_trait]
impl AsyncDispose for AsyncClient {
    async fn dispose(&self) -> DiResult<()> {
        log_entry(&self.log, "client");
        Ok(())
    }
}

#[tokio::test]
async fn register_async_disposer_participates_in_teardown() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_scoped_async_factory(move |scope| {
        let log = factory_log.clone();
        async move {
            let client = Arc::new(AsyncClient { log });
            scope.register_async_disposer(client.clone()).await?;
            Ok(client)
        }
    });

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();
    let _client = scope.get_required::<Arc<AsyncClient>>().await.unwrap();

    scope.dispose().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["client"]);

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn teardown_errors_propagate_after_best_effort() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    struct Fragile(u32);

    let counter = Arc::new(Mutex::new(0u32));
    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_transient_setup_factory(move |_| {
        let mut n = counter.lock().unwrap();
        *n += 1;
        let id = *n;
        let teardown_log = factory_log.clone();
        Ok((Fragile(id), move || {
            log_entry(&teardown_log, &format!("fragile-{}", id));
            if id == 1 {
                Err(DiError::DisposalFailed(format!("fragile-{} failed", id)))
            } else {
                Ok(())
            }
        }))
    });

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();
    let _a = scope.get_required::<Fragile>().await.unwrap();
    let _b = scope.get_required::<Fragile>().await.unwrap();

    // Both hooks run even though the last-disposed one fails, and its
    // error is the one that propagates.
    match scope.dispose().await {
        Err(DiError::DisposalFailed(message)) => assert!(message.contains("fragile-1")),
        other => panic!("expected DisposalFailed, got {:?}", other),
    }
    assert_eq!(*log.lock().unwrap(), vec!["fragile-2", "fragile-1"]);

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn provider_close_disposes_live_child_scopes() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    struct Job;

    let mut sc = ServiceCollection::new();
    let factory_log = log.clone();
    sc.add_scoped_setup_factory(move |_| {
        let teardown_log = factory_log.clone();
        Ok((Job, move || {
            log_entry(&teardown_log, "job");
            Ok(())
        }))
    });

    let sp = sc.build_provider();
    let scope = sp.create_scope().unwrap();
    let _job = scope.get_required::<Job>().await.unwrap();

    // The scope is never disposed explicitly; closing the provider takes
    // it down.
    sp.aclose().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["job"]);
    assert!(scope.is_disposed());
}

#[tokio::test]
async fn disposing_root_scope_disposes_provider() {
    struct Marker;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| Marker);

    let sp = sc.build_provider();
    let _marker = sp.get_required::<Marker>().await.unwrap();

    sp.root_scope().dispose().await.unwrap();
    assert!(sp.is_disposed());
    assert!(sp.get_required::<Marker>().await.is_err());
}
