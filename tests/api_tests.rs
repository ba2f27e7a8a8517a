use drop_dat::archive::{Archive, ArchiveEngine, ArchiveKey, MemoryEngine};
use drop_dat::gateway::{Gateway, GatewayConfig, SiteRegistry};
use reqwest::{Client, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

struct TestGateway {
    base_url: String,
    upload_addr: SocketAddr,
    registry: SiteRegistry,
}

// Helper to spawn a gateway on random ports
async fn spawn_gateway(configure: impl FnOnce(&mut GatewayConfig)) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.host = "127.0.0.1".to_string();
    config.upload_port = 0;
    config.http_port = 0;
    configure(&mut config);

    let gateway = Gateway::bind(config, Arc::new(MemoryEngine::new())).await.unwrap();
    let http_addr = gateway.http_addr().unwrap();
    let upload_addr = gateway.upload_addr().unwrap();
    let registry = gateway.registry().clone();

    tokio::spawn(async move {
        gateway.serve().await.unwrap();
    });

    TestGateway {
        base_url: format!("http://{}", http_addr),
        upload_addr,
        registry,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_paths_without_a_site_are_404() {
    let gateway = spawn_gateway(|_| {}).await;
    let client = Client::new();

    for path in ["/", "/favicon.ico", "/not-a-key/", "/upload"] {
        let res = client.get(format!("{}{}", gateway.base_url, path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
    }

    let key = ArchiveKey::new([0x5a; 32]);
    let res = client
        .get(format!("{}/{}/", gateway.base_url, key))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_raw_session_lifecycle() {
    let gateway = spawn_gateway(|_| {}).await;
    let client = Client::new();
    let key = ArchiveKey::new([0x42; 32]);
    let site_url = format!("{}/{}/", gateway.base_url, hex::encode([0x42u8; 32]));

    // 1. Open a transport and send the raw key
    let mut upload = TcpStream::connect(gateway.upload_addr).await.unwrap();
    upload.write_all(key.as_bytes()).await.unwrap();

    // 2. The site is registered while the transport stays open
    let registry = gateway.registry.clone();
    wait_until(|| registry.contains(&key)).await;
    let res = client.get(&site_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["archive-key"].to_str().unwrap(),
        key.to_hex().as_str()
    );

    // 3. Closing the transport removes it
    drop(upload);
    let registry = gateway.registry.clone();
    wait_until(|| !registry.contains(&key)).await;
    let res = client.get(&site_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_handshake_never_registers() {
    let gateway = spawn_gateway(|_| {}).await;

    let mut upload = TcpStream::connect(gateway.upload_addr).await.unwrap();
    upload.write_all(&[1u8; 31]).await.unwrap();
    upload.shutdown().await.unwrap();
    drop(upload);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(gateway.registry.is_empty());
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let gateway = spawn_gateway(|_| {}).await;
    let a = ArchiveKey::new([1; 32]);
    let b = ArchiveKey::new([2; 32]);

    let mut first = TcpStream::connect(gateway.upload_addr).await.unwrap();
    first.write_all(a.as_bytes()).await.unwrap();
    let mut second = TcpStream::connect(gateway.upload_addr).await.unwrap();
    second.write_all(b.as_bytes()).await.unwrap();

    let registry = gateway.registry.clone();
    wait_until(|| registry.contains(&a) && registry.contains(&b)).await;

    drop(first);
    let registry = gateway.registry.clone();
    wait_until(|| !registry.contains(&a)).await;
    assert!(gateway.registry.contains(&b));
}

#[tokio::test]
async fn test_reregistering_closes_older_session() {
    let gateway = spawn_gateway(|_| {}).await;
    let key = ArchiveKey::new([3; 32]);

    let mut older = TcpStream::connect(gateway.upload_addr).await.unwrap();
    older.write_all(key.as_bytes()).await.unwrap();
    let registry = gateway.registry.clone();
    wait_until(|| registry.contains(&key)).await;

    let mut newer = TcpStream::connect(gateway.upload_addr).await.unwrap();
    newer.write_all(key.as_bytes()).await.unwrap();

    // The older transport is closed by the gateway
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::io::AsyncReadExt::read(&mut older, &mut buf),
    )
    .await
    .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    // The newer session still owns the key
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(gateway.registry.contains(&key));
    drop(newer);
}

#[tokio::test]
async fn test_listing_footer_and_cache_headers() {
    let gateway = spawn_gateway(|config| {
        config.footer = Some("<p>relayed by a test gateway</p>".to_string());
        config.expose_headers = false;
        config.live = true;
    })
    .await;
    let key = ArchiveKey::new([9; 32]);

    let mut upload = TcpStream::connect(gateway.upload_addr).await.unwrap();
    upload.write_all(key.as_bytes()).await.unwrap();
    let registry = gateway.registry.clone();
    wait_until(|| registry.contains(&key)).await;

    let res = Client::new()
        .get(format!("{}/{}/", gateway.base_url, key))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("archive-key").is_none());
    assert_eq!(res.headers()["cache-control"], "no-cache");
    let body = res.text().await.unwrap();
    assert!(body.contains("relayed by a test gateway"));
    drop(upload);
}

#[tokio::test]
async fn test_created_archives_are_distinct() {
    let engine = MemoryEngine::new();
    let a = engine.create().await.unwrap();
    let b = engine.create().await.unwrap();
    assert_ne!(a.key(), b.key());
    assert!(a.is_writable());
}
