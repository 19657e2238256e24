use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use wirebox::{
    ConstructorInfo, DiError, Injectable, ParameterInfo, ResolverExt, ServiceCollection,
};

#[tokio::test]
async fn singleton_instances_are_shared() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42usize);
    sc.add_singleton("hello".to_string());

    let sp = sc.build_provider();

    let num1 = sp.get_required::<usize>().await.unwrap();
    let num2 = sp.get_required::<usize>().await.unwrap();
    let str1 = sp.get_required::<String>().await.unwrap();
    let str2 = sp.get_required::<String>().await.unwrap();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
    assert!(Arc::ptr_eq(&str1, &str2));

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn singleton_factory_runs_once() {
    struct Counter {
        id: u32,
    }

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(move |_| Counter {
        id: calls_clone.fetch_add(1, Ordering::SeqCst),
    });

    let sp = sc.build_provider();

    let a = sp.get_required::<Counter>().await.unwrap();
    let b = sp.get_required::<Counter>().await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.id, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn transient_creates_new_instances() {
    struct Stamp(u32);

    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory(move |_| Stamp(counter_clone.fetch_add(1, Ordering::SeqCst)));

    let sp = sc.build_provider();

    let a = sp.get_required::<Stamp>().await.unwrap();
    let b = sp.get_required::<Stamp>().await.unwrap();
    let c = sp.get_required::<Stamp>().await.unwrap();

    assert_eq!((a.0, b.0, c.0), (0, 1, 2));
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&b, &c));

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn async_factory_resolves_dependencies() {
    struct Database {
        url: String,
    }

    struct UserService {
        db: Arc<Database>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Database {
        url: "postgres://localhost".to_string(),
    });
    sc.add_transient_async_factory(|scope| async move {
        Ok(UserService {
            db: scope.get_required::<Database>().await?,
        })
    });

    let sp = sc.build_provider();
    let users = sp.get_required::<UserService>().await.unwrap();
    assert_eq!(users.db.url, "postgres://localhost");

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn missing_service_is_none_and_required_fails() {
    let sp = ServiceCollection::new().build_provider();

    assert!(sp.get::<String>().await.unwrap().is_none());

    match sp.get_required::<String>().await {
        Err(DiError::NoServiceRegistered(ty)) => assert!(ty.to_string().contains("String")),
        other => panic!("expected NoServiceRegistered, got {:?}", other.map(|_| ())),
    }

    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn last_registration_wins_for_single_lookup() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton("first".to_string());
    sc.add_singleton("second".to_string());

    let sp = sc.build_provider();
    let value = sp.get_required::<String>().await.unwrap();
    assert_eq!(*value, "second");

    sp.aclose().await.unwrap();
}

// ----- Constructor injection -----

struct Config {
    retries: u32,
}

struct Repository {
    config: Arc<Config>,
}

impl Injectable for Repository {
    fn constructor() -> ConstructorInfo {
        ConstructorInfo::of::<Repository, _>(
            vec![ParameterInfo::service::<Config>()],
            |args| {
                Ok(Repository {
                    config: args.get::<Config>(0)?,
                })
            },
        )
    }
}

#[tokio::test]
async fn injectable_constructor_receives_dependencies() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { retries: 5 });
    sc.add_transient_injectable::<Repository>();

    let sp = sc.build_provider();
    let repo = sp.get_required::<Repository>().await.unwrap();
    assert_eq!(repo.config.retries, 5);

    sp.aclose().await.unwrap();
}

struct WithDefault {
    limit: u32,
}

impl Injectable for WithDefault {
    fn constructor() -> ConstructorInfo {
        ConstructorInfo::of::<WithDefault, _>(
            vec![ParameterInfo::service::<u32>().with_default(9u32)],
            |args| {
                Ok(WithDefault {
                    limit: *args.get::<u32>(0)?,
                })
            },
        )
    }
}

#[tokio::test]
async fn default_parameter_used_when_unregistered() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_injectable::<WithDefault>();

    let sp = sc.build_provider();
    let service = sp.get_required::<WithDefault>().await.unwrap();
    assert_eq!(service.limit, 9);
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn registered_value_beats_default() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(3u32);
    sc.add_transient_injectable::<WithDefault>();

    let sp = sc.build_provider();
    let service = sp.get_required::<WithDefault>().await.unwrap();
    assert_eq!(service.limit, 3);
    sp.aclose().await.unwrap();
}

struct MaybeCache {
    cache: Option<Arc<Config>>,
}

impl Injectable for MaybeCache {
    fn constructor() -> ConstructorInfo {
        ConstructorInfo::of::<MaybeCache, _>(
            vec![ParameterInfo::service::<Config>().optional()],
            |args| {
                Ok(MaybeCache {
                    cache: args.get_optional::<Config>(0),
                })
            },
        )
    }
}

#[tokio::test]
async fn optional_parameter_is_none_when_unregistered() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_injectable::<MaybeCache>();

    let sp = sc.build_provider();
    let service = sp.get_required::<MaybeCache>().await.unwrap();
    assert!(service.cache.is_none());
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn optional_parameter_is_resolved_when_registered() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { retries: 2 });
    sc.add_transient_injectable::<MaybeCache>();

    let sp = sc.build_provider();
    let service = sp.get_required::<MaybeCache>().await.unwrap();
    assert_eq!(service.cache.as_ref().unwrap().retries, 2);
    sp.aclose().await.unwrap();
}

struct NeedsMissing {
    #[allow(dead_code)]
    config: Arc<Config>,
}

impl Injectable for NeedsMissing {
    fn constructor() -> ConstructorInfo {
        ConstructorInfo::of::<NeedsMissing, _>(
            vec![ParameterInfo::service::<Config>()],
            |args| {
                Ok(NeedsMissing {
                    config: args.get::<Config>(0)?,
                })
            },
        )
    }
}

#[tokio::test]
async fn required_unresolvable_parameter_fails() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_injectable::<NeedsMissing>();

    let sp = sc.build_provider_with(false, false);
    match sp.get_required::<NeedsMissing>().await {
        Err(DiError::CannotResolveService {
            parameter_type,
            implementation_type,
        }) => {
            assert!(parameter_type.to_string().contains("Config"));
            assert!(implementation_type.to_string().contains("NeedsMissing"));
        }
        other => panic!("expected CannotResolveService, got {:?}", other.map(|_| ())),
    }
    sp.aclose().await.unwrap();
}

// ----- Trait objects -----

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;
impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct French;
impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}

#[tokio::test]
async fn trait_objects_resolve() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Greeter>(Arc::new(English));

    let sp = sc.build_provider();
    let greeter = sp.get_required_trait::<dyn Greeter>().await.unwrap();
    assert_eq!(greeter.greet(), "hello");
    sp.aclose().await.unwrap();
}

#[tokio::test]
async fn trait_services_enumerate_in_declaration_order() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Greeter>(Arc::new(English));
    sc.add_transient_trait_factory::<dyn Greeter, _>(|_| Arc::new(French));

    let sp = sc.build_provider();

    let all = sp.get_trait_services::<dyn Greeter>().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].greet(), "hello");
    assert_eq!(all[1].greet(), "bonjour");

    // Single lookup prefers the last registration.
    let one = sp.get_required_trait::<dyn Greeter>().await.unwrap();
    assert_eq!(one.greet(), "bonjour");

    sp.aclose().await.unwrap();
}
