//! End-to-end resolve flows against mock HTTP services and fake tools

#![allow(clippy::unwrap_used, clippy::expect_used)]

use media_dl::{Config, ErrorKind, MediaResolver, Resolution, ToolsConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing all platform endpoints at `server`, with every external
/// tool pinned to a dangling path so no real binary ever runs.
fn test_config(server: &MockServer, staging: &std::path::Path) -> Config {
    let mut config = Config {
        staging_dir: staging.to_path_buf(),
        ..Config::default()
    };
    config.http.deezer_api_base = server.uri();
    config.http.reddit_api_base = Some(server.uri());
    config.tools = ToolsConfig {
        ytdlp_path: Some("/nonexistent/yt-dlp".into()),
        gallerydl_path: Some("/nonexistent/gallery-dl".into()),
        deemix_path: Some("/nonexistent/deemix".into()),
        ffmpeg_path: Some("/nonexistent/ffmpeg".into()),
        ..ToolsConfig::default()
    };
    config
}

fn media_files_under(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).into_iter().flatten().flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

fn track_body(id: u64, preview: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "title": "One More Time",
        "duration": 320,
        "preview": preview,
        "artist": {"name": "Daft Punk"},
        "album": {"title": "Discovery", "cover_big": null}
    })
}

#[tokio::test]
async fn free_text_query_returns_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "daft punk one more time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [track_body(3135556, Some("https://cdn.example/p.mp3"))]
        })))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    match resolver.resolve("daft punk one more time").await.unwrap() {
        Resolution::Candidates(candidates) => {
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].title, "One More Time");
            assert_eq!(candidates[0].artist, "Daft Punk");
        }
        Resolution::Media(_) => panic!("expected candidates for a free-text query"),
    }
}

#[tokio::test]
async fn query_with_no_matches_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let err = resolver.resolve("zxqw no such band").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deezer_track_url_stages_preview() {
    let server = MockServer::start().await;
    let preview_url = format!("{}/preview/3135556.mp3", server.uri());
    Mock::given(method("GET"))
        .and(path("/track/3135556"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(track_body(3135556, Some(&preview_url))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/preview/3135556.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let resolution = resolver
        .resolve("https://www.deezer.com/track/3135556")
        .await
        .unwrap();
    let Resolution::Media(retrieved) = resolution else {
        panic!("expected staged media");
    };
    assert_eq!(retrieved.title, "Daft Punk - One More Time");
    assert_eq!(retrieved.files.len(), 1);
    assert!(retrieved.files[0].path.starts_with(staging.path()));

    // Caller-side release clears the staged file and its attempt dir; the
    // platform dir must be empty afterward.
    resolver.release_all(&retrieved.files);
    assert!(!retrieved.files[0].path.exists());
    let leftovers: Vec<_> = std::fs::read_dir(staging.path().join("deezer"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "staging leaked: {leftovers:?}");
}

#[tokio::test]
async fn chosen_candidate_resolves_by_track_id() {
    let server = MockServer::start().await;
    let preview_url = format!("{}/preview/7.mp3", server.uri());
    Mock::given(method("GET"))
        .and(path("/track/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(track_body(7, Some(&preview_url))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/preview/7.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let retrieved = resolver.resolve_track(7).await.unwrap();
    assert_eq!(retrieved.files.len(), 1);
}

#[tokio::test]
async fn oversized_media_is_discarded_with_too_large() {
    let server = MockServer::start().await;
    let preview_url = format!("{}/preview/big.mp3", server.uri());
    Mock::given(method("GET"))
        .and(path("/track/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(track_body(9, Some(&preview_url))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/preview/big.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2 * 1024 * 1024]))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, staging.path());
    config.max_file_size = 1024 * 1024;
    let resolver = MediaResolver::new(config).unwrap();

    let err = resolver
        .resolve("https://www.deezer.com/track/9")
        .await
        .unwrap_err();
    // The download aborts mid-stream, so the exact size is unknown but the
    // limit must be reported.
    match err {
        media_dl::Error::TooLarge { limit, .. } => assert_eq!(limit, 1024 * 1024),
        other => panic!("expected TooLarge, got {other:?}"),
    }
    assert!(media_files_under(staging.path()).is_empty());
    // No attempt dirs may linger either.
    let leftovers: Vec<_> = std::fs::read_dir(staging.path().join("deezer"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "staging leaked: {leftovers:?}");
}

#[tokio::test]
async fn reddit_image_post_resolves_directly() {
    let server = MockServer::start().await;
    let image_url = format!("{}/img/cat.jpg", server.uri());
    Mock::given(method("GET"))
        .and(path("/r/aww/comments/abc/cute.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "data": {"children": [{"data": {
                "id": "abc",
                "title": "Cute cat",
                "url": image_url
            }}]}
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg-bytes".to_vec()))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let resolution = resolver
        .resolve("https://old.reddit.com/r/aww/comments/abc/cute/?utm_source=share")
        .await
        .unwrap();
    let Resolution::Media(retrieved) = resolution else {
        panic!("expected staged media");
    };
    assert_eq!(retrieved.title, "Cute cat");
    assert!(retrieved.files[0].path.ends_with("cat.jpg"));
}

#[cfg(unix)]
#[tokio::test]
async fn reddit_failure_falls_back_to_ytdlp() {
    use std::os::unix::fs::PermissionsExt;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/videos/comments/xyz/clip.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bins = tempfile::tempdir().unwrap();
    let script = bins.path().join("yt-dlp");
    // The output template is argument 5; drop a file where it points.
    std::fs::write(
        &script,
        "#!/bin/sh\nout_dir=$(dirname \"$5\")\nprintf vid > \"$out_dir/clip.mp4\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, staging.path());
    config.tools.ytdlp_path = Some(script);
    let resolver = MediaResolver::new(config).unwrap();

    let resolution = resolver
        .resolve("https://www.reddit.com/r/videos/comments/xyz/clip/")
        .await
        .unwrap();
    let Resolution::Media(retrieved) = resolution else {
        panic!("expected staged media");
    };
    assert!(retrieved.files[0].path.ends_with("clip.mp4"));
    // The fallback stages under the platform of the original reference.
    assert!(retrieved.files[0].path.starts_with(staging.path().join("reddit")));
}

#[tokio::test]
async fn instagram_without_gallery_dl_reports_tool_missing() {
    let server = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let err = resolver
        .resolve("https://www.instagram.com/p/Cabc123XyZ/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolMissing);
}

// Needs a real yt-dlp binary on PATH and network access.
// Run with: cargo test -- --ignored
#[tokio::test]
#[ignore]
async fn real_ytdlp_resolves_a_tiktok_url() {
    let staging = tempfile::tempdir().unwrap();
    let config = Config {
        staging_dir: staging.path().to_path_buf(),
        ..Config::default()
    };
    let resolver = MediaResolver::new(config).unwrap();

    let resolution = resolver
        .resolve("https://www.tiktok.com/@tiktok/video/7106594312292453675")
        .await
        .unwrap();
    let Resolution::Media(retrieved) = resolution else {
        panic!("expected staged media");
    };
    assert!(!retrieved.files.is_empty());
    resolver.release_all(&retrieved.files);
}

#[tokio::test]
async fn aggregate_failure_surfaces_most_actionable_kind() {
    let server = MockServer::start().await;
    // The post fetch is rejected outright; with yt-dlp also missing, the
    // chain collects a 403 (auth) and a ToolMissing. Auth must win.
    Mock::given(method("GET"))
        .and(path("/r/aww/comments/abc/cute.json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let resolver = MediaResolver::new(test_config(&server, staging.path())).unwrap();

    let err = resolver
        .resolve("https://www.reddit.com/r/aww/comments/abc/cute/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationRequired);
}
