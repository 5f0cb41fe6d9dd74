use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use snapshelf::normalize::{fetch_stylesheet, rewrite_media_rules};
use url::Url;

const STYLE_CSS: &str = "@media print { body { display: none; } }\n\
                         @media screen { body { font-size: 14px; } }\n";

fn spawn_style_server() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let response = match request.url() {
                "/assets/style.css" => tiny_http::Response::from_string(STYLE_CSS)
                    .with_status_code(200),
                _ => tiny_http::Response::from_string("not found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

#[tokio::test]
async fn fetches_a_stylesheet_and_rewrites_its_media_rules() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_style_server();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let url = Url::parse(&format!("{base_url}/assets/style.css"))?;
    let css = fetch_stylesheet(&client, &url).await?;
    assert_eq!(css, STYLE_CSS);

    let rewritten = rewrite_media_rules(&css);
    assert!(!rewritten.contains("@media print"));
    assert!(rewritten.contains("noprint"));
    assert!(rewritten.contains("screen, print"));

    let _ = shutdown.send(());
    let _ = handle.join();
    Ok(())
}

#[tokio::test]
async fn missing_stylesheet_is_an_error_not_a_panic() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_style_server();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let url = Url::parse(&format!("{base_url}/assets/missing.css"))?;
    let err = fetch_stylesheet(&client, &url).await.unwrap_err();
    assert!(err.to_string().contains("404"));

    let _ = shutdown.send(());
    let _ = handle.join();
    Ok(())
}
