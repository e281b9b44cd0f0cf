mod support;

use anyhow::Result;
use http::StatusCode;
use http::header::CONTENT_LENGTH;
use tempfile::TempDir;
use varycache::{CacheKey, LockOutcome, X_BODY_FILE, X_CONTENT_DIGEST};

use support::*;

#[tokio::test]
async fn miss_then_store_then_hit() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let req = get("http://example.com/test", &[]);

    assert!(store.lookup(&req).await.is_none());

    let mut resp = ok_response(&[("cache-control", "max-age=420")], b"test");
    let key = store.write(&req, &mut resp).await?;
    assert_eq!(key, store.cache_key(&req));
    assert_eq!(key.as_str().len(), 42);

    let hit = store.lookup(&req).await.expect("hit after write");
    assert_eq!(hit.status, StatusCode::OK);
    assert_eq!(
        hit.headers.get(&X_CONTENT_DIGEST).unwrap(),
        "ena94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
    );
    assert_eq!(hit.headers.get(CONTENT_LENGTH).unwrap(), "4");
    assert_eq!(hit.body, b"test");

    // x-body-file names the on-disk blob.
    let body_file = hit.headers.get(&X_BODY_FILE).unwrap().to_str()?;
    assert_eq!(std::fs::read(body_file)?, b"test");
    Ok(())
}

#[tokio::test]
async fn vary_isolates_variants_in_both_directions() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let uri = "http://example.com/content";

    let mobile = get(uri, &[("user-agent", "mobile")]);
    let desktop = get(uri, &[("user-agent", "desktop")]);

    store
        .write(
            &mobile,
            &mut ok_response(
                &[("cache-control", "max-age=60"), ("vary", "User-Agent")],
                b"mobile content",
            ),
        )
        .await?;

    assert!(store.lookup(&desktop).await.is_none());
    assert_eq!(
        store.lookup(&mobile).await.unwrap().body,
        b"mobile content"
    );

    store
        .write(
            &desktop,
            &mut ok_response(
                &[("cache-control", "max-age=60"), ("vary", "User-Agent")],
                b"desktop content",
            ),
        )
        .await?;

    assert_eq!(
        store.lookup(&mobile).await.unwrap().body,
        b"mobile content"
    );
    assert_eq!(
        store.lookup(&desktop).await.unwrap().body,
        b"desktop content"
    );
    Ok(())
}

#[tokio::test]
async fn hosts_do_not_share_entries() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let alpha = get("http://alpha.example.com/shared", &[]);
    let beta = get("http://beta.example.com/shared", &[]);
    store
        .write(&alpha, &mut ok_response(&[("cache-control", "max-age=30")], b"alpha"))
        .await?;

    assert!(store.lookup(&beta).await.is_none());
    assert!(store.lookup(&alpha).await.is_some());
    Ok(())
}

#[tokio::test]
async fn write_honors_an_existing_content_digest() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    // First fill persists the body.
    let req = get("http://example.com/digested", &[]);
    let mut first = ok_response(&[("cache-control", "max-age=60")], b"the payload");
    store.write(&req, &mut first).await?;
    let digest = first.headers.get(&X_CONTENT_DIGEST).unwrap().to_str()?.to_string();

    // A re-store of the looked-up response carries the digest already; the
    // empty body must not overwrite the blob.
    let mut second = ok_response(
        &[
            ("cache-control", "max-age=60"),
            ("x-content-digest", &digest),
        ],
        b"",
    );
    store.write(&req, &mut second).await?;

    let hit = store.lookup(&req).await.expect("hit");
    assert_eq!(hit.body, b"the payload");
    Ok(())
}

#[tokio::test]
async fn purge_forgets_the_url_but_not_its_blob() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let req = get("http://example.com/gone", &[]);
    store
        .write(&req, &mut ok_response(&[("cache-control", "max-age=60")], b"gone body"))
        .await?;

    assert!(store.purge(req.uri()).await);
    assert!(store.lookup(&req).await.is_none());
    assert!(!store.purge(req.uri()).await);

    let blob = store.path_for(&CacheKey::entity(b"gone body"));
    assert!(blob.exists(), "purge must not touch entity blobs");
    Ok(())
}

#[tokio::test]
async fn invalidate_marks_entries_stale_but_keeps_serving_them() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let req = get("http://example.com/volatile", &[]);
    store
        .write(&req, &mut ok_response(&[("cache-control", "max-age=420")], b"v1"))
        .await?;

    store.invalidate(&req).await?;

    // Still cached: serving stale is the kernel's call, not the store's.
    let hit = store.lookup(&req).await.expect("stale entry remains readable");
    let cc = hit.headers.get("cache-control").unwrap().to_str()?;
    assert!(cc.contains("max-age=0"), "freshness was rewritten: {cc}");
    Ok(())
}

#[tokio::test]
async fn invalidated_entries_disappear_after_clear() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let req = get("http://example.com/collected", &[]);
    store
        .write(&req, &mut ok_response(&[("cache-control", "max-age=420")], b"bytes"))
        .await?;
    store.invalidate(&req).await?;

    let stats = store.clear().await?;
    assert_eq!(stats.removed(), 2, "metadata file and orphan blob");
    assert!(store.lookup(&req).await.is_none());
    assert!(!store.path_for(&CacheKey::entity(b"bytes")).exists());
    Ok(())
}

#[tokio::test]
async fn lock_contention_is_visible_across_stores() -> Result<()> {
    let dir = TempDir::new()?;
    let store_a = open_store(&dir).await?;
    let store_b = open_store(&dir).await?;
    let req = get("http://example.com/fill", &[]);

    assert_eq!(store_a.lock(&req).await, LockOutcome::Acquired);

    // The second store sees the sentinel, not an acquisition.
    let meta_path = store_a.path_for(&store_a.cache_key(&req));
    let expected = std::path::PathBuf::from(format!("{}.lck", meta_path.display()));
    match store_b.lock(&req).await {
        LockOutcome::Held(path) => assert_eq!(path, expected),
        other => panic!("expected held lock, got {other:?}"),
    }
    assert!(store_b.is_locked(&req).await);

    // Cleanup of the non-owner leaves the lock in place.
    store_b.cleanup().await;
    assert!(store_a.is_locked(&req).await);

    store_a.cleanup().await;
    assert!(!store_a.is_locked(&req).await);
    Ok(())
}

#[tokio::test]
async fn corrupt_metadata_reads_as_a_miss_and_heals_on_write() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let req = get("http://example.com/mangled", &[]);

    store
        .write(&req, &mut ok_response(&[("cache-control", "max-age=60")], b"ok"))
        .await?;

    let meta_path = store.path_for(&store.cache_key(&req));
    std::fs::write(&meta_path, b"\x00 definitely not a variant list")?;

    assert!(store.lookup(&req).await.is_none());

    store
        .write(&req, &mut ok_response(&[("cache-control", "max-age=60")], b"ok again"))
        .await?;
    assert_eq!(store.lookup(&req).await.unwrap().body, b"ok again");
    Ok(())
}

#[tokio::test]
async fn multi_value_headers_survive_the_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let req = get("http://example.com/cookies", &[]);

    store
        .write(
            &req,
            &mut ok_response(
                &[
                    ("cache-control", "max-age=60"),
                    ("set-cookie", "a=1"),
                    ("set-cookie", "b=2"),
                ],
                b"body",
            ),
        )
        .await?;

    let hit = store.lookup(&req).await.expect("hit");
    let cookies: Vec<_> = hit
        .headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
    Ok(())
}

#[tokio::test]
async fn interrupted_writes_are_pruned_at_open() -> Result<()> {
    let dir = TempDir::new()?;
    {
        let store = open_store(&dir).await?;
        let req = get("http://example.com/seed", &[]);
        store
            .write(&req, &mut ok_response(&[("cache-control", "max-age=60")], b"seed"))
            .await?;
    }

    // Simulate a crash mid-write: a temp file next to the metadata.
    let probe = open_store(&dir).await?;
    let shard = probe
        .path_for(&probe.cache_key(&get("http://example.com/seed", &[])))
        .parent()
        .unwrap()
        .to_path_buf();
    let stray = shard.join("tmp_crashed-write");
    std::fs::write(&stray, b"partial")?;

    let reopened = open_store(&dir).await?;
    assert!(!stray.exists(), "stale temp should be pruned at open");
    assert!(
        reopened
            .lookup(&get("http://example.com/seed", &[]))
            .await
            .is_some()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_fills_and_lookups_settle() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let mut writers = Vec::new();
    for index in 0..8 {
        let store = store.clone();
        writers.push(tokio::spawn(async move {
            let req = get(&format!("http://example.com/item-{index}"), &[]);
            let mut resp = ok_response(
                &[("cache-control", "max-age=120")],
                format!("payload {index}").as_bytes(),
            );
            store.write(&req, &mut resp).await
        }));
    }
    for writer in writers {
        writer.await??;
    }

    let mut readers = Vec::new();
    for index in 0..8 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            let req = get(&format!("http://example.com/item-{index}"), &[]);
            let hit = store.lookup(&req).await.expect("hit after write settled");
            hit.body
        }));
    }
    for (index, reader) in readers.into_iter().enumerate() {
        let body = reader.await?;
        assert_eq!(body, format!("payload {index}").as_bytes());
    }
    Ok(())
}
