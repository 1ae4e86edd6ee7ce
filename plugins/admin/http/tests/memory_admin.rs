use std::time::Duration;

use admin_http::HttpAdmin;
use broker_memory::{MemoryBroker, serve_admin};
use probe_api::{AdminError, MessageBus, NamespaceName, TopicAdmin, TopicDomain, TopicName};
use tokio_util::sync::CancellationToken;

struct TestServer {
    base_url: String,
    broker: MemoryBroker,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let broker = MemoryBroker::default();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve_admin(listener, broker.clone(), shutdown.clone()));
        Self {
            base_url,
            broker,
            shutdown,
        }
    }

    fn admin(&self) -> HttpAdmin {
        HttpAdmin::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn ns() -> NamespaceName {
    NamespaceName::new("localdev", "test").unwrap()
}

#[tokio::test]
async fn creates_fixture_and_reports_conflicts() {
    let server = TestServer::start().await;
    let admin = server.admin();

    let clusters = admin.clusters().await.unwrap();
    assert_eq!(clusters, vec!["standalone".to_string()]);

    admin.create_tenant("localdev", &clusters).await.unwrap();
    assert_eq!(
        admin.create_tenant("localdev", &clusters).await,
        Err(AdminError::Conflict("tenant 'localdev'".into()))
    );

    admin.create_namespace(&ns()).await.unwrap();
    assert_eq!(
        admin.create_namespace(&ns()).await,
        Err(AdminError::Conflict("namespace 'localdev/test'".into()))
    );
}

#[tokio::test]
async fn unknown_cluster_is_rejected_with_reason() {
    let server = TestServer::start().await;
    let err = server
        .admin()
        .create_tenant("localdev", &["nowhere".to_string()])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdminError::Rejected {
            status: 412,
            reason: "cluster 'nowhere' does not exist".into()
        }
    );
}

#[tokio::test]
async fn lists_topics_created_on_the_data_plane() {
    let server = TestServer::start().await;
    server.broker.provision(&ns()).await;
    let admin = server.admin();

    assert!(admin.list_topics(&ns()).await.unwrap().is_empty());

    let topic = TopicName::random(TopicDomain::Persistent, ns());
    let mut producer = server.broker.create_producer(&topic).await.unwrap();
    producer.send("hello".into()).await.unwrap();
    producer.close().await.unwrap();

    assert_eq!(admin.list_topics(&ns()).await.unwrap(), vec![topic.to_string()]);
}

#[tokio::test]
async fn missing_namespace_is_not_found() {
    let server = TestServer::start().await;
    assert_eq!(
        server.admin().list_topics(&ns()).await,
        Err(AdminError::NotFound("namespace 'localdev/test'".into()))
    );
}

#[tokio::test]
async fn broker_outage_maps_to_unavailable() {
    let server = TestServer::start().await;
    server.broker.provision(&ns()).await;
    server.broker.set_admin_available(false);

    let err = server.admin().list_topics(&ns()).await.unwrap_err();
    assert!(matches!(err, AdminError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    // Порт свободен: listener закрыт до запроса.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let admin = HttpAdmin::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = admin.clusters().await.unwrap_err();
    assert!(matches!(err, AdminError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let app = axum::Router::new().route("/admin/v2/clusters", axum::routing::get(|| async { "not json" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let admin = HttpAdmin::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    assert!(matches!(admin.clusters().await, Err(AdminError::Decode(_))));
}
