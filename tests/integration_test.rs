//! End-to-end tests: import local files, upload them through a running
//! gateway and read them back over HTTP.

use bytes::Bytes;
use drop_dat::archive::{import_paths, Archive, ArchiveEngine, ArchiveRef, Endpoint, MemoryEngine};
use drop_dat::client::{ClientConfig, ClientError, UploadClient};
use drop_dat::gateway::{Gateway, GatewayConfig, SiteRegistry};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

struct Running {
    client_config: ClientConfig,
    base_url: String,
    registry: SiteRegistry,
}

async fn start_gateway(allow_upgrade: bool) -> Running {
    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        upload_port: 0,
        http_port: 0,
        allow_upgrade,
        ..Default::default()
    };
    let gateway = Gateway::bind(config, Arc::new(MemoryEngine::new())).await.unwrap();
    let http_port = gateway.http_addr().unwrap().port();
    let upload_port = gateway.upload_addr().unwrap().port();
    let registry = gateway.registry().clone();
    tokio::spawn(gateway.serve());

    let client_config = ClientConfig {
        default_host: "127.0.0.1".to_string(),
        default_port: upload_port,
        http_port,
        ..Default::default()
    };

    Running {
        client_config,
        base_url: format!("http://127.0.0.1:{}", http_port),
        registry,
    }
}

async fn sample_archive() -> ArchiveRef {
    let archive = MemoryEngine::new().create().await.unwrap();
    archive
        .write_file("index.html", Bytes::from_static(b"<h1>dropped</h1>"))
        .await
        .unwrap();
    archive
        .write_file("notes/todo.txt", Bytes::from_static(b"ship it"))
        .await
        .unwrap();
    archive
}

/// GET until the gateway has replicated the file
async fn fetch(url: &str) -> reqwest::Response {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(res) = reqwest::get(url).await {
                if res.status() == StatusCode::OK {
                    return res;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("file never became available")
}

#[tokio::test]
async fn test_upload_and_serve() {
    let gateway = start_gateway(false).await;
    let archive = sample_archive().await;
    let key = archive.key();

    let client = UploadClient::new(gateway.client_config.clone()).unwrap();
    let url = client.gateway_url(&Endpoint::Default, key);
    assert!(url.ends_with(&format!("/{}/", key)));

    let upload = {
        let archive = archive.clone();
        tokio::spawn(async move { client.upload(archive.as_ref(), &Endpoint::Default).await })
    };

    let res = fetch(&format!("{}/{}/notes/todo.txt", gateway.base_url, key)).await;
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.text().await.unwrap(), "ship it");

    let res = fetch(&format!("{}/{}/", gateway.base_url, key)).await;
    assert_eq!(res.text().await.unwrap(), "<h1>dropped</h1>");

    // Live writes keep flowing while the session is open
    archive
        .write_file("late.txt", Bytes::from_static(b"later"))
        .await
        .unwrap();
    let res = fetch(&format!("{}/{}/late.txt", gateway.base_url, key)).await;
    assert_eq!(res.text().await.unwrap(), "later");

    // Ending the upload takes the site down
    upload.abort();
    let _ = upload.await;
    let registry = gateway.registry.clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while registry.contains(&key) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_upload_over_http_upgrade() {
    let gateway = start_gateway(true).await;
    let archive = sample_archive().await;
    let key = archive.key();

    let client = UploadClient::new(gateway.client_config.clone().with_upgrade()).unwrap();
    let upload = {
        let archive = archive.clone();
        tokio::spawn(async move { client.upload(archive.as_ref(), &Endpoint::Default).await })
    };

    let res = fetch(&format!("{}/{}/index.html", gateway.base_url, key)).await;
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(res.text().await.unwrap(), "<h1>dropped</h1>");
    upload.abort();
}

#[tokio::test]
async fn test_upgrade_refused_when_disabled() {
    let gateway = start_gateway(false).await;
    let archive = sample_archive().await;

    let client = UploadClient::new(gateway.client_config.clone().with_upgrade()).unwrap();
    let err = client
        .upload(archive.as_ref(), &Endpoint::Default)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UpgradeRefused(_)));
}

#[tokio::test]
async fn test_import_then_upload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("site/css")).unwrap();
    std::fs::write(dir.path().join("site/index.html"), "<p>home</p>").unwrap();
    std::fs::write(dir.path().join("site/css/main.css"), "p{}").unwrap();
    std::fs::write(dir.path().join("site/.secret"), "hidden").unwrap();

    let archive = MemoryEngine::new().create().await.unwrap();
    let report = import_paths(archive.as_ref(), dir.path(), &["site"]).await;
    assert!(report.is_complete());

    let gateway = start_gateway(false).await;
    let key = archive.key();
    let client = UploadClient::new(gateway.client_config.clone()).unwrap();
    let upload = {
        let archive = archive.clone();
        tokio::spawn(async move { client.upload(archive.as_ref(), &Endpoint::Default).await })
    };

    let res = fetch(&format!("{}/{}/site/css/main.css", gateway.base_url, key)).await;
    assert_eq!(res.headers()["content-type"], "text/css");

    let res = reqwest::get(format!("{}/{}/site/.secret", gateway.base_url, key))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    upload.abort();
}

#[tokio::test]
async fn test_unreachable_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let archive = sample_archive().await;
    let client = UploadClient::new(ClientConfig::default()).unwrap();
    let err = client
        .upload(archive.as_ref(), &Endpoint::parse(&format!("127.0.0.1:{}", port)))
        .await
        .unwrap_err();
    assert!(err.is_connection());
}
