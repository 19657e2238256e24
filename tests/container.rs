use wirebox::{DiError, ServiceContainer, ServiceDescriptor, ServiceKey};

#[derive(Debug)]
struct Config {
    name: &'static str,
}

#[tokio::test]
async fn container_builds_lazily_and_resolves() {
    let container = ServiceContainer::new();
    container
        .add(ServiceDescriptor::instance(Config { name: "app" }))
        .await;

    assert!(container.service_provider().is_none());

    let config = container.get::<Config>().await.unwrap();
    assert_eq!(config.name, "app");
    assert!(container.service_provider().is_some());

    container.aclose().await.unwrap();
}

#[tokio::test]
async fn try_get_returns_none_for_unregistered() {
    let container = ServiceContainer::new();
    assert!(container.try_get::<Config>().await.unwrap().is_none());

    match container.get::<Config>().await {
        Err(DiError::NoServiceRegistered(_)) => {}
        other => panic!("expected NoServiceRegistered, got {:?}", other),
    }

    container.aclose().await.unwrap();
}

#[tokio::test]
async fn registrations_after_build_become_dynamic_descriptors() {
    let container = ServiceContainer::new();
    container
        .add(ServiceDescriptor::instance(Config { name: "first" }))
        .await;

    // Force the provider into existence.
    let _ = container.get::<Config>().await.unwrap();

    container
        .add(ServiceDescriptor::keyed_instance(
            ServiceKey::of("extra"),
            Config { name: "second" },
        ))
        .await;

    let extra = container
        .get_keyed::<Config>(ServiceKey::of("extra"))
        .await
        .unwrap();
    assert_eq!(extra.name, "second");

    container.aclose().await.unwrap();
}

#[tokio::test]
async fn override_requires_a_built_container() {
    let container = ServiceContainer::new();
    container
        .add(ServiceDescriptor::instance(Config { name: "real" }))
        .await;

    match container.override_service(Config { name: "fake" }) {
        Err(DiError::ServiceContainerNotBuilt) => {}
        other => panic!("expected ServiceContainerNotBuilt, got {:?}", other.map(|_| ())),
    }

    let _ = container.get::<Config>().await.unwrap();

    {
        let _guard = container
            .override_service(Config { name: "fake" })
            .unwrap();
        assert_eq!(container.get::<Config>().await.unwrap().name, "fake");
    }
    assert_eq!(container.get::<Config>().await.unwrap().name, "real");

    container.aclose().await.unwrap();
}

#[tokio::test]
async fn get_all_enumerates_through_the_container() {
    let container = ServiceContainer::new();
    container
        .add(ServiceDescriptor::instance(Config { name: "one" }))
        .await;
    container
        .add(ServiceDescriptor::instance(Config { name: "two" }))
        .await;

    let all = container.get_all::<Config>().await.unwrap();
    let names: Vec<_> = all.iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["one", "two"]);

    container.aclose().await.unwrap();
}

#[tokio::test]
async fn scopes_from_the_container_resolve_scoped_services() {
    struct Session;

    let container = ServiceContainer::new();
    container
        .add(ServiceDescriptor::factory(
            wirebox::Lifetime::Scoped,
            |_| Session,
        ))
        .await;

    let scope = container.create_scope().unwrap();
    use wirebox::ResolverExt;
    assert!(scope.get_required::<Session>().await.is_ok());

    scope.dispose().await.unwrap();
    container.aclose().await.unwrap();
}
