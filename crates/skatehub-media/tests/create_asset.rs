use skatehub_media::test_helpers::*;
use skatehub_media::{ManagerOptions, MediaError, PayloadDescriptor};
use skatehub_storage::KeyGenerator;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SEED: u64 = 42;

/// Keys the manager's seeded generator will hand out, in order.
fn expected_keys(count: usize) -> Vec<String> {
    let keys = KeyGenerator::seeded(SEED, test_config().key_length);
    (0..count).map(|_| keys.generate()).collect()
}

#[tokio::test]
async fn test_png_upload_records_dimensions() {
    let (manager, storage, repository) = mock_manager(SEED);

    let asset = manager
        .create_asset(file_payload("kickflip.png", "image/png", png_bytes(10, 20)))
        .await
        .unwrap();

    assert_eq!(asset.extension, "png");
    assert_eq!(asset.width, Some(10));
    assert_eq!(asset.height, Some(20));
    assert_eq!(asset.key.len(), 16);
    assert_eq!(asset.base_url, TEST_BASE_URL);

    let storage_key = asset.storage_key();
    assert!(storage.has_object(&storage_key));
    assert!(storage.is_public(&storage_key));
    assert_eq!(storage.content_type(&storage_key).as_deref(), Some("image/png"));
    assert_eq!(repository.count(), 1);
    assert_eq!(manager.get_asset(&asset.key).await.unwrap(), asset);
}

#[tokio::test]
async fn test_response_url_matches_uploaded_object() {
    let (manager, storage, _repository) = mock_manager(SEED);

    let asset = manager
        .create_asset(file_payload("grind.png", "image/png", png_bytes(3, 3)))
        .await
        .unwrap();

    let response = asset.to_response();
    assert_eq!(
        response.url,
        format!("{}/{}.png", TEST_BASE_URL, asset.key)
    );
    assert_eq!(storage.keys(), vec![format!("{}.png", asset.key)]);
}

#[tokio::test]
async fn test_gif_is_rejected_without_side_effects() {
    let (manager, storage, repository) = mock_manager(SEED);

    let err = manager
        .create_asset(file_payload("loop.gif", "image/gif", gif_bytes(4, 4)))
        .await
        .unwrap_err();

    match err {
        MediaError::UnsupportedMediaKind(subtype) => assert_eq!(subtype, "gif"),
        other => panic!("expected UnsupportedMediaKind, got {:?}", other),
    }
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_disallowed_kinds_never_reach_the_store() {
    let (manager, storage, repository) = mock_manager(SEED);

    let payloads = vec![
        file_payload("notes.txt", "text/plain", b"just some text".to_vec()),
        file_payload("clip.webm", "video/webm", vec![0x1A, 0x45, 0xDF, 0xA3, 0x00]),
        data_uri_payload("image/gif", &gif_bytes(2, 2)),
    ];

    for payload in payloads {
        let result = manager.create_asset(payload).await;
        assert!(
            matches!(result, Err(MediaError::UnsupportedMediaKind(_))),
            "unexpected result: {:?}",
            result
        );
    }
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_mislabeled_png_is_corrupt() {
    let (manager, storage, repository) = mock_manager(SEED);

    let err = manager
        .create_asset(file_payload(
            "spot.png",
            "image/png",
            b"definitely not pixels".to_vec(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::CorruptMedia(_)), "got {:?}", err);
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

/// ISO media file with the given major brand: an `ftyp` box and an empty `mdat`.
fn iso_media(brand: &[u8; 4]) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x14];
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(brand);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(brand);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x08]);
    data.extend_from_slice(b"mdat");
    data
}

#[tokio::test]
async fn test_iso_media_other_than_mp4_is_rejected() {
    let (manager, storage, repository) = mock_manager(SEED);

    let cases = vec![
        (file_payload("IMG_0042.heic", "image/heic", iso_media(b"heic")), "heic"),
        (file_payload("grind.m4a", "audio/mp4", iso_media(b"M4A ")), "m4a"),
        (file_payload("old_phone.mp4", "video/mp4", iso_media(b"3gp4")), "3gp"),
        (data_uri_payload("video/mp4", &iso_media(b"mif1")), "heif"),
    ];

    for (payload, expected) in cases {
        match manager.create_asset(payload).await {
            Err(MediaError::UnsupportedMediaKind(subtype)) => assert_eq!(subtype, expected),
            other => panic!("expected UnsupportedMediaKind({}), got {:?}", expected, other),
        }
    }
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_unrecognized_video_container_is_corrupt() {
    let (manager, storage, repository) = mock_manager(SEED);

    let payloads = vec![
        file_payload("session.mp4", "video/mp4", b"not a movie at all".to_vec()),
        data_uri_payload("video/mp4", &[0u8; 48]),
    ];

    for payload in payloads {
        let result = manager.create_asset(payload).await;
        assert!(
            matches!(result, Err(MediaError::CorruptMedia(_))),
            "unexpected result: {:?}",
            result
        );
    }
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_non_ascii_data_uri_is_corrupt() {
    let (manager, storage, repository) = mock_manager(SEED);

    let payloads = vec![
        PayloadDescriptor::data_uri("data:image/png;base64,a\u{e9}\u{e9}"),
        PayloadDescriptor::data_uri(format!(
            "data:image/png;base64,{}\u{1F6F9}",
            "iVBORw0KGgo".repeat(8)
        )),
        PayloadDescriptor::data_uri("data:video/mp4;base64,AAAAGGZ0eXBpc29t\u{e9}"),
    ];

    for payload in payloads {
        let result = manager.create_asset(payload).await;
        assert!(
            matches!(result, Err(MediaError::CorruptMedia(_))),
            "unexpected result: {:?}",
            result
        );
    }
    assert_eq!(storage.put_attempts(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_truncated_png_is_corrupt() {
    let (manager, storage, _repository) = mock_manager(SEED);
    let mut data = png_bytes(32, 32);
    data.truncate(40);

    let err = manager
        .create_asset(file_payload("cut.png", "image/png", data))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::CorruptMedia(_)), "got {:?}", err);
    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn test_mp4_has_no_dimensions() {
    let (manager, storage, _repository) = mock_manager(SEED);

    let asset = manager
        .create_asset(file_payload("line.mp4", "video/mp4", mp4_bytes()))
        .await
        .unwrap();

    assert_eq!(asset.extension, "mp4");
    assert_eq!(asset.width, None);
    assert_eq!(asset.height, None);
    assert_eq!(
        storage.content_type(&asset.storage_key()).as_deref(),
        Some("video/mp4")
    );
}

#[tokio::test]
async fn test_jpeg_keeps_client_spelling() {
    let (manager, _storage, _repository) = mock_manager(SEED);

    let jpeg = manager
        .create_asset(file_payload("heelflip.jpeg", "image/jpeg", jpeg_bytes(8, 6)))
        .await
        .unwrap();
    assert_eq!(jpeg.extension, "jpeg");
    assert_eq!((jpeg.width, jpeg.height), (Some(8), Some(6)));

    let jpg = manager
        .create_asset(file_payload("heelflip.jpg", "image/jpeg", jpeg_bytes(8, 6)))
        .await
        .unwrap();
    assert_eq!(jpg.extension, "jpg");
}

#[tokio::test]
async fn test_data_uri_payload() {
    let (manager, storage, repository) = mock_manager(SEED);

    let asset = manager
        .create_asset(data_uri_payload("image/png", &png_bytes(7, 5)))
        .await
        .unwrap();

    assert_eq!(asset.extension, "png");
    assert_eq!((asset.width, asset.height), (Some(7), Some(5)));
    assert_eq!(storage.object(&asset.storage_key()).unwrap(), png_bytes(7, 5));
    assert_eq!(repository.count(), 1);
}

#[tokio::test]
async fn test_store_rejection_leaves_nothing_behind() {
    let (manager, storage, repository) = mock_manager(SEED);
    storage.fail_uploads();

    let err = manager
        .create_asset(file_payload("drop.png", "image/png", png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::StorageUpload(_)), "got {:?}", err);
    assert_eq!(storage.put_attempts(), 1);
    assert_eq!(storage.object_count(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_public_read_failure_removes_object() {
    let (manager, storage, repository) = mock_manager(SEED);
    storage.fail_make_public();

    let err = manager
        .create_asset(file_payload("drop.png", "image/png", png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::StorageUpload(_)), "got {:?}", err);
    assert_eq!(storage.object_count(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_upload_retry_uses_fresh_key() {
    let config = skatehub_core::MediaConfig {
        upload_retries: 1,
        ..test_config()
    };
    let (manager, storage, _repository) = mock_manager_with_config(SEED, &config);
    storage.fail_next_uploads(1);

    let asset = manager
        .create_asset(file_payload("retry.png", "image/png", png_bytes(2, 2)))
        .await
        .unwrap();

    let keys = expected_keys(2);
    assert_eq!(asset.key, keys[1]);
    assert_eq!(storage.put_attempts(), 2);
    assert_eq!(storage.object_count(), 1);
}

#[tokio::test]
async fn test_upload_timeout() {
    let (manager, storage, repository) = mock_manager(SEED);
    let options = ManagerOptions {
        upload_timeout: Duration::from_millis(50),
        ..ManagerOptions::from(&test_config())
    };
    let manager = manager.with_options(options);
    storage.delay_uploads(Duration::from_secs(5));

    let err = manager
        .create_asset(file_payload("slow.mp4", "video/mp4", mp4_bytes()))
        .await
        .unwrap_err();

    match err {
        MediaError::StorageUpload(detail) => assert!(detail.contains("timed out")),
        other => panic!("expected StorageUpload, got {:?}", other),
    }
    assert_eq!(storage.object_count(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_oversized_payload_is_rejected_before_upload() {
    let (manager, storage, _repository) = mock_manager(SEED);
    let options = ManagerOptions {
        max_payload_bytes: 16,
        ..ManagerOptions::from(&test_config())
    };
    let manager = manager.with_options(options);

    let err = manager
        .create_asset(file_payload("huge.png", "image/png", png_bytes(64, 64)))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::PayloadTooLarge { max: 16, .. }), "got {:?}", err);
    assert_eq!(storage.put_attempts(), 0);
}

#[tokio::test]
async fn test_recorded_key_is_regenerated() {
    let (manager, _storage, repository) = mock_manager(SEED);
    let keys = expected_keys(2);
    repository.insert_row(
        skatehub_core::NewAsset::new(TEST_BASE_URL, keys[0].clone(), "png", None).into_asset(),
    );

    let asset = manager
        .create_asset(file_payload("dup.mp4", "video/mp4", mp4_bytes()))
        .await
        .unwrap();

    assert_eq!(asset.key, keys[1]);
    assert_eq!(repository.count(), 2);
}

#[tokio::test]
async fn test_occupied_store_key_is_regenerated() {
    let (manager, storage, _repository) = mock_manager(SEED);
    let keys = expected_keys(2);
    storage.insert_object(&format!("{}.mp4", keys[0]), mp4_bytes(), chrono::Utc::now());

    let asset = manager
        .create_asset(file_payload("dup.mp4", "video/mp4", mp4_bytes()))
        .await
        .unwrap();

    assert_eq!(asset.key, keys[1]);
    // The pre-existing object is untouched.
    assert!(storage.has_object(&format!("{}.mp4", keys[0])));
    assert_eq!(storage.object_count(), 2);
}

#[tokio::test]
async fn test_key_attempts_exhausted() {
    let (manager, storage, repository) = mock_manager(SEED);
    for key in expected_keys(test_config().key_attempts as usize) {
        repository.insert_row(
            skatehub_core::NewAsset::new(TEST_BASE_URL, key, "png", None).into_asset(),
        );
    }

    let err = manager
        .create_asset(file_payload("dup.mp4", "video/mp4", mp4_bytes()))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::DuplicateKey(_)), "got {:?}", err);
    assert_eq!(storage.put_attempts(), 0);
}

#[tokio::test]
async fn test_insert_failure_removes_object() {
    let (manager, storage, repository) = mock_manager(SEED);
    repository.fail_inserts();

    let err = manager
        .create_asset(file_payload("lost.png", "image/png", png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Internal(_)), "got {:?}", err);
    assert_eq!(storage.put_attempts(), 1);
    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn test_duplicate_insert_removes_object() {
    let (manager, storage, repository) = mock_manager(SEED);
    repository.reject_inserts_as_duplicate();

    let err = manager
        .create_asset(file_payload("race.png", "image/png", png_bytes(4, 4)))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::DuplicateKey(_)), "got {:?}", err);
    assert_eq!(storage.object_count(), 0);
    assert_eq!(repository.count(), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_keys() {
    let storage = Arc::new(MockStorage::new());
    let repository = Arc::new(MockAssetRepository::new());
    let manager = Arc::new(skatehub_media::MediaAssetManager::new(
        storage.clone(),
        repository.clone(),
        &test_config(),
    ));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create_asset(file_payload("session.mp4", "video/mp4", mp4_bytes()))
                    .await
            })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        let asset = handle.await.unwrap().unwrap();
        assert!(storage.has_object(&asset.storage_key()));
        keys.insert(asset.key);
    }

    assert_eq!(keys.len(), 32);
    assert_eq!(storage.object_count(), 32);
    assert_eq!(repository.count(), 32);
}
