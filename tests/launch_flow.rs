#![cfg(unix)]

#[path = "../src/config.rs"]
mod config;
#[path = "../src/engine/mod.rs"]
mod engine;
#[path = "../src/env.rs"]
mod env;
#[path = "../src/listing.rs"]
mod listing;
#[path = "../src/networking/mod.rs"]
mod networking;
#[path = "../src/pattern.rs"]
mod pattern;
#[path = "../src/process/mod.rs"]
mod process;
#[path = "../src/storage/mod.rs"]
mod storage;
#[path = "../src/updater/mod.rs"]
mod updater;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::{LauncherConfig, Overrides};
use crate::engine::state::{FailurePrompt, LaunchFailure, RetryChoice};
use crate::engine::{LaunchOutcome, LauncherEngine};

const OLD_NAME: &str = "Demo (202401010000).run";
const NEW_NAME: &str = "Demo (202402020000).run";

struct Response {
    status: u16,
    body: Vec<u8>,
    advertised_len: Option<usize>,
}

impl Response {
    fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            advertised_len: None,
        }
    }

    fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            advertised_len: None,
        }
    }

    /// Advertises more bytes than it sends, then closes the connection.
    fn truncated(body: impl Into<Vec<u8>>, advertised_len: usize) -> Self {
        Self {
            status: 200,
            body: body.into(),
            advertised_len: Some(advertised_len),
        }
    }
}

struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Minimal canned-response HTTP server. Reads one request head per
/// connection, records the (space-decoded) path and answers with whatever
/// the handler returns.
async fn spawn_server(
    respond: impl Fn(&str) -> Response + Send + Sync + 'static,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Arc<Mutex<Vec<String>>> = Arc::default();
    let respond = Arc::new(respond);
    let log = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let respond = respond.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            head.extend_from_slice(&chunk[..n]);
                            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }
                let request = String::from_utf8_lossy(&head);
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .replace("%20", " ");
                log.lock().unwrap().push(path.clone());

                let response = respond(&path);
                let reason = match response.status {
                    200 => "OK",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    _ => "Status",
                };
                let advertised = response.advertised_len.unwrap_or(response.body.len());
                let header = format!(
                    "HTTP/1.1 {} {reason}\r\ncontent-length: {advertised}\r\nconnection: close\r\n\r\n",
                    response.status
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// URL on a port nothing listens on; connections get refused.
fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/builds")
}

struct ScriptedPrompt {
    answers: Mutex<Vec<RetryChoice>>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    fn new(answers: &[RetryChoice]) -> Self {
        Self {
            answers: Mutex::new(answers.to_vec()),
            asked: AtomicUsize::new(0),
        }
    }

    fn never_asked() -> Self {
        Self::new(&[])
    }

    fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl FailurePrompt for ScriptedPrompt {
    fn decide(&self, failure: &LaunchFailure) -> RetryChoice {
        self.asked.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        assert!(!answers.is_empty(), "unexpected prompt for: {failure}");
        answers.remove(0)
    }
}

fn test_config(url: &str, dir: &Path) -> LauncherConfig {
    let overrides = Overrides {
        product: Some("Demo".to_owned()),
        url: Some(url.to_owned()),
        ext: Some(".run".to_owned()),
        dir: Some(dir.to_path_buf()),
        runner: Some("sh".to_owned()),
        pick: None,
    };
    config::load(None, overrides).unwrap()
}

/// Shell script package: writes its argv to `marker` in the working
/// directory, one line per argument, then exits with `exit_code`.
fn script(marker: &str, exit_code: i32) -> String {
    format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > {marker}\nexit {exit_code}\n")
}

fn index_page(names: &[&str]) -> String {
    let rows = names
        .iter()
        .map(|name| format!("<a href=\"{name}\">{name}</a><br>"))
        .collect::<String>();
    format!("<html><body><h1>Index of /builds</h1>{rows}</body></html>")
}

#[tokio::test]
async fn downloads_newer_package_then_launches_it() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(OLD_NAME), script("launched-old.txt", 0)).unwrap();

    let listing = index_page(&[OLD_NAME, NEW_NAME]);
    let new_body = script("launched-new.txt", 3);
    let pkg_path = format!("/builds/{NEW_NAME}");
    let served = new_body.clone();
    let server = spawn_server(move |path| match path {
        "/builds" => Response::ok(listing.clone()),
        p if p == pkg_path => Response::ok(served.clone()),
        _ => Response::status(404),
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::never_asked();
    let args = vec!["a b".to_owned(), "c".to_owned()];
    let outcome = engine.run(&args, &prompt, None).await.unwrap();

    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: NEW_NAME.to_owned(),
            exit_code: 3,
        }
    );
    // The downloaded file holds the served bytes verbatim.
    assert_eq!(fs::read_to_string(dir.path().join(NEW_NAME)).unwrap(), new_body);
    // Arguments arrived as separate argv entries, spaces intact, and the
    // child ran with the application directory as working directory.
    assert_eq!(
        fs::read_to_string(dir.path().join("launched-new.txt")).unwrap(),
        "a b\nc\n"
    );
    assert!(!dir.path().join("launched-old.txt").exists());
    // The old package is left in place.
    assert!(dir.path().join(OLD_NAME).exists());
    assert_eq!(
        server.requests(),
        vec!["/builds".to_owned(), format!("/builds/{NEW_NAME}")]
    );
    assert_eq!(prompt.times_asked(), 0);
}

#[tokio::test]
async fn skips_download_when_local_matches_remote() {
    let dir = tempfile::tempdir().unwrap();
    let local_body = script("launched.txt", 0);
    fs::write(dir.path().join(NEW_NAME), &local_body).unwrap();

    let listing = index_page(&[OLD_NAME, NEW_NAME]);
    let server = spawn_server(move |path| match path {
        "/builds" => Response::ok(listing.clone()),
        _ => Response::status(404),
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::never_asked();
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: NEW_NAME.to_owned(),
            exit_code: 0,
        }
    );
    // Only the listing was fetched; the package was not re-downloaded.
    assert_eq!(server.requests(), vec!["/builds".to_owned()]);
    assert_eq!(fs::read_to_string(dir.path().join(NEW_NAME)).unwrap(), local_body);
    assert!(dir.path().join("launched.txt").exists());
}

#[tokio::test]
async fn downloads_when_names_differ_even_if_local_is_newer() {
    let dir = tempfile::tempdir().unwrap();
    let ahead = "Demo (209901010000).run";
    fs::write(dir.path().join(ahead), script("launched-ahead.txt", 0)).unwrap();

    let listing = index_page(&[NEW_NAME]);
    let pkg_path = format!("/builds/{NEW_NAME}");
    let server = spawn_server(move |path| match path {
        "/builds" => Response::ok(listing.clone()),
        p if p == pkg_path => Response::ok(script("launched-new.txt", 0)),
        _ => Response::status(404),
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::never_asked();
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    // Name inequality triggers the download, not name ordering; the freshly
    // named remote package wins even against a local file from the future.
    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: NEW_NAME.to_owned(),
            exit_code: 0,
        }
    );
    assert_eq!(
        server.requests(),
        vec!["/builds".to_owned(), format!("/builds/{NEW_NAME}")]
    );
}

#[tokio::test]
async fn honors_last_listed_pick_rule() {
    let dir = tempfile::tempdir().unwrap();

    // Listing sorted newest-first: the last entry is the oldest name.
    let listing = index_page(&[NEW_NAME, OLD_NAME]);
    let pkg_path = format!("/builds/{OLD_NAME}");
    let server = spawn_server(move |path| match path {
        "/builds" => Response::ok(listing.clone()),
        p if p == pkg_path => Response::ok(script("launched.txt", 0)),
        _ => Response::status(404),
    })
    .await;

    let mut config = test_config(&server.url("/builds"), dir.path());
    config.pick = listing::RemotePick::LastListed;
    let engine = LauncherEngine::new(config);
    let prompt = ScriptedPrompt::never_asked();
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: OLD_NAME.to_owned(),
            exit_code: 0,
        }
    );
}

#[tokio::test]
async fn retries_full_attempt_after_operator_retry() {
    let dir = tempfile::tempdir().unwrap();

    let listing = index_page(&[NEW_NAME]);
    let pkg_path = format!("/builds/{NEW_NAME}");
    let listing_hits = Arc::new(AtomicUsize::new(0));
    let hits = listing_hits.clone();
    let server = spawn_server(move |path| {
        if path == "/builds" {
            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                Response::status(500)
            } else {
                Response::ok(listing.clone())
            }
        } else if path == pkg_path {
            Response::ok(script("launched.txt", 3))
        } else {
            Response::status(404)
        }
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::new(&[RetryChoice::Retry]);
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: NEW_NAME.to_owned(),
            exit_code: 3,
        }
    );
    // A retry repeats the whole attempt, starting with the listing fetch.
    assert_eq!(
        server.requests(),
        vec![
            "/builds".to_owned(),
            "/builds".to_owned(),
            format!("/builds/{NEW_NAME}"),
        ]
    );
    assert_eq!(prompt.times_asked(), 1);
}

#[tokio::test]
async fn falls_back_to_local_package_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(OLD_NAME), script("launched-old.txt", 5)).unwrap();

    let engine = LauncherEngine::new(test_config(&refused_url(), dir.path()));
    let prompt = ScriptedPrompt::new(&[RetryChoice::Cancel]);
    let args = vec!["--flag".to_owned()];
    let outcome = engine.run(&args, &prompt, None).await.unwrap();

    assert_eq!(
        outcome,
        LaunchOutcome::Launched {
            filename: OLD_NAME.to_owned(),
            exit_code: 5,
        }
    );
    // The fallback launch still forwards the activation arguments.
    assert_eq!(
        fs::read_to_string(dir.path().join("launched-old.txt")).unwrap(),
        "--flag\n"
    );
    assert_eq!(prompt.times_asked(), 1);
}

#[tokio::test]
async fn aborts_when_cancelled_with_nothing_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let engine = LauncherEngine::new(test_config(&refused_url(), dir.path()));
    let prompt = ScriptedPrompt::new(&[RetryChoice::Cancel]);
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    match outcome {
        LaunchOutcome::Aborted {
            failure: LaunchFailure::Fetch(_),
        } => {}
        other => panic!("expected an aborted fetch, got {other:?}"),
    }
    assert_eq!(prompt.times_asked(), 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn removes_partial_download_before_prompting() {
    let dir = tempfile::tempdir().unwrap();

    let listing = index_page(&[NEW_NAME]);
    let pkg_path = format!("/builds/{NEW_NAME}");
    let server = spawn_server(move |path| match path {
        "/builds" => Response::ok(listing.clone()),
        // Connection drops long before the advertised length is reached.
        p if p == pkg_path => Response::truncated("#!/bin/sh\n", 4096),
        _ => Response::status(404),
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::new(&[RetryChoice::Cancel]);
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    match outcome {
        LaunchOutcome::Aborted {
            failure: LaunchFailure::Download(_),
        } => {}
        other => panic!("expected an aborted download, got {other:?}"),
    }
    // No half-written package is left behind to be mistaken for a fallback.
    assert!(!dir.path().join(NEW_NAME).exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn listing_without_matches_is_a_fetch_error() {
    let dir = tempfile::tempdir().unwrap();

    let server = spawn_server(|path| match path {
        "/builds" => Response::ok("<html><body><a href=\"notes.txt\">notes.txt</a></body></html>"),
        _ => Response::status(404),
    })
    .await;

    let engine = LauncherEngine::new(test_config(&server.url("/builds"), dir.path()));
    let prompt = ScriptedPrompt::new(&[RetryChoice::Cancel]);
    let outcome = engine.run(&[], &prompt, None).await.unwrap();

    match outcome {
        LaunchOutcome::Aborted {
            failure: LaunchFailure::Fetch(message),
        } => {
            assert!(message.contains("no package matching"), "got: {message}");
        }
        other => panic!("expected an aborted fetch, got {other:?}"),
    }
}
