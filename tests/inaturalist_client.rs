//! Blocking client against a local fake of the iNaturalist API.
//!
//! The mock server needs a tokio runtime while the client is blocking, so the
//! client is built, used and dropped on a plain thread.

use serde_json::json;
use taxatree::core::collector::LeafCollector;
use taxatree::core::config::ApiConfig;
use taxatree::core::registry::NodeRegistry;
use taxatree::core::resolver::{AncestorResolver, ResolverOptions};
use taxatree::core::retry::RetryPolicy;
use taxatree::core::source::{FetchError, ObservationQuery, TaxonSource};
use taxatree::download::{CachedPhotos, INatClient, PhotoCache};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(uri: &str) -> INatClient {
    let api = ApiConfig {
        base_url: format!("{}/v1", uri),
        timeout_secs: 5,
        connect_timeout_secs: 5,
        ..ApiConfig::default()
    };
    INatClient::new(&api).unwrap()
}

fn taxon_body(id: u32, name: &str, common: Option<&str>, parent: Option<u32>, rank_level: f64) -> serde_json::Value {
    json!({
        "total_results": 1,
        "page": 1,
        "per_page": 1,
        "results": [{
            "id": id,
            "name": name,
            "preferred_common_name": common,
            "parent_id": parent,
            "rank_level": rank_level,
            "rank": "species",
            "default_photo": null
        }]
    })
}

async fn mount_taxon(server: &MockServer, id: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/taxa/{}", id)))
        .and(query_param("locale", "ru"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn on_thread<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::spawn(f).join().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_taxon_record() {
    let server = MockServer::start().await;
    mount_taxon(
        &server,
        12716,
        taxon_body(12716, "Parus major", Some("Большая синица"), Some(13685), 10.0),
    )
    .await;

    let uri = server.uri();
    let record = on_thread(move || client_for(&uri).fetch_taxon(12716)).unwrap();

    assert_eq!(record.id, 12716);
    assert_eq!(record.display_name(), "Большая синица");
    assert_eq!(record.parent_id, Some(13685));
    assert!(record.is_species(10.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_classification() {
    let server = MockServer::start().await;
    for (id, status) in [(1u32, 429u16), (2, 503), (3, 404)] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/taxa/{}", id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1/taxa/4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let results = on_thread(move || {
        let client = client_for(&uri);
        (1..=4)
            .map(|id| client.fetch_taxon(id))
            .collect::<Vec<_>>()
    });

    assert_eq!(results[0], Err(FetchError::RateLimited));
    assert!(matches!(results[1], Err(FetchError::Transient(_))));
    assert!(matches!(results[2], Err(FetchError::Status { status: 404, .. })));
    assert!(matches!(results[3], Err(FetchError::Malformed(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limited_once_then_resolved() {
    let server = MockServer::start().await;

    // First request for 7 is throttled, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/v1/taxa/7"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_taxon(&server, 7, taxon_body(7, "Parus major", None, Some(3), 10.0)).await;
    mount_taxon(&server, 3, taxon_body(3, "Aves", Some("Птицы"), Some(355675), 50.0)).await;

    let uri = server.uri();
    let registry = on_thread(move || {
        let client = client_for(&uri);
        let options = ResolverOptions {
            root_id: Some(3),
            retry: RetryPolicy::immediate(),
            ..ResolverOptions::default()
        };
        let mut registry = NodeRegistry::new();
        AncestorResolver::new(&client, options)
            .resolve(7, &mut registry)
            .map(|_| registry)
    })
    .unwrap();

    assert_eq!(registry.ids(), vec![7, 3]);
    assert_eq!(registry.get(3).unwrap().name, "Птицы");
    assert_eq!(registry.validate(Some(3)).unwrap(), 3);

    let requests = server.received_requests().await.unwrap();
    let taxon_7 = requests.iter().filter(|r| r.url.path() == "/v1/taxa/7").count();
    assert_eq!(taxon_7, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_observation_paging() {
    let server = MockServer::start().await;
    let page = |n: u32, taxa: Vec<serde_json::Value>| {
        Mock::given(method("GET"))
            .and(path("/v1/observations"))
            .and(query_param("user_login", "merrcurys"))
            .and(query_param("taxon_id", "3"))
            .and(query_param("page", n.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_results": 5,
                "page": n,
                "per_page": 2,
                "results": taxa
            })))
    };

    page(1, vec![json!({"taxon": {"id": 12716}}), json!({"taxon": null})])
        .mount(&server)
        .await;
    page(2, vec![json!({"taxon": {"id": 8021}}), json!({"taxon": {"id": 12716}})])
        .mount(&server)
        .await;
    page(3, vec![json!({"taxon": {"id": 144815}})])
        .mount(&server)
        .await;

    let uri = server.uri();
    let leaves = on_thread(move || {
        let client = client_for(&uri);
        let query = ObservationQuery {
            user_login: "merrcurys".to_string(),
            taxon_id: Some(3),
        };
        LeafCollector::new(&client, RetryPolicy::immediate()).collect(&query, |_, _| {})
    })
    .unwrap();

    assert_eq!(leaves.into_iter().collect::<Vec<_>>(), vec![8021, 12716, 144815]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_species_photo_downloaded_once() {
    let server = MockServer::start().await;
    let photo_url = format!("{}/photos/12716/square.jpg", server.uri());

    let mut body = taxon_body(12716, "Parus major", None, None, 10.0);
    body["results"][0]["default_photo"] = json!({ "square_url": photo_url });
    mount_taxon(&server, 12716, body).await;
    Mock::given(method("GET"))
        .and(path("/photos/12716/square.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("photos");
    let uri = server.uri();
    let cache = PhotoCache::new(&cache_dir);
    on_thread(move || {
        let client = client_for(&uri);
        let photos = CachedPhotos::new(&cache, &client);
        let resolver = AncestorResolver::new(
            &client,
            ResolverOptions {
                retry: RetryPolicy::immediate(),
                ..ResolverOptions::default()
            },
        )
        .with_photos(&photos);

        // Two separate registries: the second run hits the cache
        for _ in 0..2 {
            let mut registry = NodeRegistry::new();
            resolver.resolve(12716, &mut registry).unwrap();
        }
    });

    assert_eq!(
        std::fs::read(cache_dir.join("12716.jpg")).unwrap(),
        vec![0xFF, 0xD8, 0xFF, 0xE0]
    );
    server.verify().await;
}
