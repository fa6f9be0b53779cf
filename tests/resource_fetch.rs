//! Manifest fetching against a local HTTP stub: batching, timeouts, and
//! non-success statuses must drop entries without failing the manifest.

use std::sync::Arc;
use std::time::Duration;

use pagediff::manifest::{FetchOptions, ResourceManifest, ResourceUrls};
use tiny_http::{Response, Server};

fn start_stub_server() -> String {
    let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
    let addr = server.server_addr();

    let server_for_loop = server.clone();
    std::thread::spawn(move || {
        for request in server_for_loop.incoming_requests() {
            // Thread per request so a slow handler cannot stall the rest
            std::thread::spawn(move || {
                let path = request.url().to_string();
                match path.as_str() {
                    "/ok.css" => {
                        let _ = request.respond(Response::from_string("body { color: red }"));
                    }
                    "/ok.js" => {
                        let _ = request.respond(Response::from_string("run();"));
                    }
                    "/slow.js" => {
                        std::thread::sleep(Duration::from_millis(1500));
                        let _ = request.respond(Response::from_string("late();"));
                    }
                    _ => {
                        let _ = request
                            .respond(Response::from_string("Not Found").with_status_code(404));
                    }
                }
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn failed_and_timed_out_fetches_are_dropped_not_fatal() {
    let base = start_stub_server();
    let client = reqwest::Client::new();
    let opts = FetchOptions {
        timeout_ms: 400,
        batch_size: 10,
    };

    let urls = ResourceUrls {
        css: vec![
            format!("{}/ok.css", base),
            format!("{}/missing.css", base),
        ],
        javascript: vec![format!("{}/slow.js", base), format!("{}/ok.js", base)],
        images: vec![format!("{}/img/logo.png", base)],
    };

    let manifest = ResourceManifest::fetch_contents(&client, urls, &opts).await;

    // 404 dropped, body kept for the good stylesheet
    assert_eq!(manifest.css.len(), 1);
    assert!(manifest.css[0].url.ends_with("/ok.css"));
    assert_eq!(manifest.css[0].content, "body { color: red }");

    // The slow script times out; the fast one survives
    assert_eq!(manifest.javascript.len(), 1);
    assert!(manifest.javascript[0].url.ends_with("/ok.js"));

    // Images are recorded by URL only, never fetched
    assert_eq!(manifest.images.len(), 1);
    assert!(manifest.images[0].url.ends_with("/img/logo.png"));
}

#[tokio::test]
async fn manifest_preserves_document_order_within_a_category() {
    let base = start_stub_server();
    let client = reqwest::Client::new();
    let opts = FetchOptions::default();

    let urls = ResourceUrls {
        css: vec![format!("{}/ok.css", base)],
        javascript: vec![format!("{}/ok.js", base)],
        images: vec![
            format!("{}/img/a.png", base),
            format!("{}/img/b.png", base),
        ],
    };

    let manifest = ResourceManifest::fetch_contents(&client, urls, &opts).await;
    assert!(manifest.images[0].url.ends_with("/img/a.png"));
    assert!(manifest.images[1].url.ends_with("/img/b.png"));
}
