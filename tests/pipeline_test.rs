mod common;

use common::{html_page, jpeg_bytes, test_config, FakePage, ORIGIN};
use mediascrape::error::ScrapeError;
use mediascrape::models::{DownloadStatus, Target};
use mediascrape::orchestrator::Orchestrator;
use mediascrape::pacing::Pacer;
use std::fs;
use tempfile::TempDir;
use tracing::Span;

async fn image_mock(server: &mut mockito::ServerGuard, path: &str, hits: usize) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(jpeg_bytes(256))
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn site_run_meets_quota_despite_duplicate_and_disallowed() {
    let mut server = mockito::Server::new_async().await;
    let a = image_mock(&mut server, "/a.jpg", 1).await;
    let b = image_mock(&mut server, "/b.jpg", 1).await;
    let c = image_mock(&mut server, "/c.jpg", 1).await;
    let html = server
        .mock("GET", "/banner.html")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html></html>")
        .expect(1)
        .create_async()
        .await;

    let base = server.url();
    let listing = html_page(&format!(
        r#"<img src="{base}/a.jpg"><img src="{base}/banner.html"><img src="{base}/a.jpg">
           <img src="{base}/b.jpg"><img src="{base}/c.jpg">"#
    ));
    let page = FakePage::new().with_page("https://shop.test/search?q=dress", listing);

    let out = TempDir::new().unwrap();
    let config = test_config(out.path());
    let orchestrator = Orchestrator::new(config, &page, Span::none());
    let target = Target::site("shop", "dress", 3, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    a.assert_async().await;
    b.assert_async().await;
    c.assert_async().await;
    html.assert_async().await;

    assert_eq!(report.discovered, 5);
    assert_eq!(report.unique, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.authenticated);
    assert!(report.finished_at.is_some());

    let dir = out.path().join("dress_images");
    assert_eq!(report.output_dir, dir);
    for name in ["image_1.jpg", "image_3.jpg", "image_4.jpg"] {
        assert_eq!(fs::metadata(dir.join(name)).unwrap().len(), 256, "{name}");
    }
    assert!(!dir.join("image_2.jpg").exists());
    assert_eq!(page.visits(), vec!["https://shop.test/search?q=dress".to_string()]);
}

#[tokio::test]
async fn unknown_site_is_an_invalid_target() {
    let out = TempDir::new().unwrap();
    let page = FakePage::new();
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none());
    let target = Target::site("nowhere", "dress", 3, out.path()).unwrap();

    let err = orchestrator.run(&target).await.unwrap_err();

    assert!(matches!(err, ScrapeError::InvalidTarget(_)));
    assert!(page.visits().is_empty());
}

#[tokio::test]
async fn empty_page_writes_diagnostic() {
    let out = TempDir::new().unwrap();
    let page = FakePage::new().with_page(
        "https://shop.test/search?q=coat",
        html_page("<p>No results</p>"),
    );
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none());
    let target = Target::site("shop", "coat", 5, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    assert_eq!(report.attempted, 0);
    let diagnostic = report.diagnostic.expect("diagnostic path");
    assert!(fs::read_to_string(diagnostic).unwrap().contains("No results"));
}

#[tokio::test]
async fn search_without_cookies_runs_unauthenticated() {
    let out = TempDir::new().unwrap();
    let page = FakePage::new();
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none());
    let target = Target::search("linen", 2, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    assert!(!report.authenticated);
    assert_eq!(report.output_dir, out.path().join("linen"));
    assert!(report.output_dir.is_dir());
    assert_eq!(report.posts_attempted, 0);
    assert!(report.diagnostic.is_some());
    assert!(page.cookies.lock().unwrap().is_none());
    assert_eq!(page.visits(), vec![format!("{}/search?keyword=linen", ORIGIN)]);
}

#[tokio::test]
async fn profile_run_drills_into_selected_posts() {
    let mut server = mockito::Server::new_async().await;
    let photo = server
        .mock("GET", "/webpic/1.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(jpeg_bytes(128))
        .expect(1)
        .create_async()
        .await;

    let profile_url = format!("{}/user/profile/u42", ORIGIN);
    let profile = html_page(
        r#"<div class="user-name">Mia</div>
           <div class="data-info"><span class="count">10</span><span class="count">2.1万</span></div>
           <a href="/explore/p1">first</a><a href="/explore/p2">second</a><a href="/explore/p1">again</a>"#,
    );
    let post = html_page(&format!(
        r#"<div id="detail-title">Linen day</div>
           <div class="left"><span class="count">8</span></div>
           <a class="tag">#linen</a>
           <img src="{}/webpic/1.jpg"><img src="{}/avatar.jpg">"#,
        server.url(),
        server.url()
    ));
    let page = FakePage::new()
        .with_page(&profile_url, profile)
        .with_page(&format!("{}/explore/p1", ORIGIN), post);

    let cookie_file = tempfile::NamedTempFile::new().unwrap();
    fs::write(cookie_file.path(), r#"{"web_session": "abc", "a1": "x"}"#).unwrap();

    let out = TempDir::new().unwrap();
    let mut config = test_config(out.path());
    config.cookies.path = Some(cookie_file.path().to_path_buf());
    let orchestrator =
        Orchestrator::new(config, &page, Span::none()).with_pacer(Pacer::disabled());
    let target = Target::profile(profile_url.clone(), 1, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    photo.assert_async().await;
    assert!(report.authenticated);
    assert_eq!(report.unique, 2);
    assert_eq!(report.posts_attempted, 1);
    assert_eq!(report.posts_succeeded, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        page.cookies.lock().unwrap().clone(),
        Some((2, ".xiaohongshu.com".to_string()))
    );
    assert_eq!(
        page.visits(),
        vec![profile_url.clone(), format!("{}/explore/p1", ORIGIN)]
    );

    let user_dir = out.path().join("Mia");
    let user_info = fs::read_to_string(user_dir.join("user_info.txt")).unwrap();
    assert!(user_info.starts_with(&format!("Profile URL: {}\n", profile_url)));
    assert!(user_info.contains("User Name: Mia"));
    assert!(user_info.contains("Fans: 2.1万"));
    assert!(user_info.contains("Total Posts: 2"));

    let post_dir = user_dir.join("Linen day_p1");
    let post_info = fs::read_to_string(post_dir.join("post_info.txt")).unwrap();
    assert!(post_info.contains(&format!("Post URL: {}/explore/p1", ORIGIN)));
    assert!(post_info.contains("likes: 8"));
    assert!(post_info.contains("tags:\n- #linen\n"));
    assert_eq!(fs::metadata(post_dir.join("image_1.jpg")).unwrap().len(), 128);
}

#[tokio::test]
async fn blocked_post_is_counted_and_skipped() {
    let search_url = format!("{}/search?keyword=linen", ORIGIN);
    let page = FakePage::new()
        .with_page(
            &search_url,
            html_page(r#"<a href="/explore/p1">1</a><a href="/explore/p2">2</a>"#),
        )
        .with_page(
            &format!("{}/explore/p1", ORIGIN),
            html_page(r#"<div class="captcha-container">verify</div>"#),
        )
        .with_page(
            &format!("{}/explore/p2", ORIGIN),
            html_page(r#"<div id="detail-title">Plain</div>"#),
        );

    let out = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none())
        .with_pacer(Pacer::disabled());
    let target = Target::search("linen", 5, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    assert_eq!(report.posts_attempted, 2);
    assert_eq!(report.posts_succeeded, 1);
    assert_eq!(report.attempted, 0);
    assert!(out.path().join("linen").join("Plain_p2").join("post_info.txt").exists());
    assert!(!out.path().join("linen").join("post_p1").exists());
}

#[tokio::test]
async fn search_waits_for_late_rendering_listing() {
    let search_url = format!("{}/search?keyword=linen", ORIGIN);
    let page = FakePage::new()
        .with_page(&search_url, html_page(r#"<a href="/explore/p1">1</a>"#))
        .with_page(
            &format!("{}/explore/p1", ORIGIN),
            html_page(r#"<div id="detail-title">Late</div>"#),
        )
        .rendering_for(3);

    let out = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none())
        .with_pacer(Pacer::disabled());
    let target = Target::search("linen", 1, out.path()).unwrap();

    let report = orchestrator.run(&target).await.unwrap();

    assert_eq!(report.unique, 1);
    assert_eq!(report.posts_attempted, 1);
    assert_eq!(report.posts_succeeded, 1);
    assert!(report.diagnostic.is_none());
    assert!(out.path().join("linen").join("Late_p1").join("post_info.txt").exists());
}

#[tokio::test]
async fn batch_continues_past_a_failing_target() {
    let mut server = mockito::Server::new_async().await;
    let a = image_mock(&mut server, "/a.jpg", 1).await;
    let page = FakePage::new().with_page(
        "https://shop.test/search?q=dress",
        html_page(&format!(r#"<img src="{}/a.jpg">"#, server.url())),
    );

    let out = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(test_config(out.path()), &page, Span::none());
    let targets = vec![
        Target::site("nowhere", "dress", 1, out.path()).unwrap(),
        Target::site("shop", "dress", 1, out.path()).unwrap(),
    ];

    let batch = orchestrator.run_batch(&targets).await;

    a.assert_async().await;
    assert_eq!(batch.runs.len(), 2);
    assert_eq!(batch.failed_targets(), 1);
    assert_eq!(batch.total_succeeded(), 1);
    let (_, second) = &batch.runs[1];
    let second = second.as_ref().unwrap();
    assert_eq!(second.outcomes[0].status, DownloadStatus::Success);
}
