use keyspace_client::Action;
use keyspace_client::StoreErrorCode;

use crate::common::MemoryStore;
use crate::enable_logger;

#[tokio::test]
async fn test_ls_lists_immediate_children_in_key_order() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    client.set("/ls/c", "3").await.unwrap();
    client.set("/ls/a", "1").await.unwrap();
    client.set("/ls/b/nested", "2").await.unwrap();

    let listing = client.ls("/ls").await.unwrap();
    assert!(listing.is_ok());
    assert_eq!(listing.keys(), vec!["/ls/a", "/ls/b", "/ls/c"]);
    assert!(listing.values()[1].is_dir());
    assert_eq!(listing.values()[0].as_string(), "1");
}

#[tokio::test]
async fn test_ls_missing_directory_is_empty() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    let listing = client.ls("/nothing/here").await.unwrap();
    assert_eq!(listing.error_code(), 0);
    assert_eq!(listing.action(), &Action::Get);
    assert!(listing.values().is_empty());
}

#[tokio::test]
async fn test_ls_on_leaf_is_not_a_directory() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    client.set("/leaf", "v").await.unwrap();
    let listing = client.ls("/leaf").await.unwrap();
    assert_eq!(listing.error_kind(), Some(StoreErrorCode::NotADirectory));
}

#[tokio::test]
async fn test_mkdir_creates_missing_ancestors_and_rejects_duplicates() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    let created = client.mkdir("/a/b/c").await.unwrap();
    assert!(created.is_ok());
    assert!(created.value().is_dir());

    assert_eq!(client.ls("/a").await.unwrap().keys(), vec!["/a/b"]);

    let again = client.mkdir("/a/b/c").await.unwrap();
    assert_eq!(again.error_kind(), Some(StoreErrorCode::NodeExists));
}

#[tokio::test]
async fn test_rmdir_non_recursive_guards_non_empty_directory() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    client.set("/guarded/k", "v").await.unwrap();

    let refused = client.rmdir("/guarded", false).await.unwrap();
    assert_eq!(refused.error_kind(), Some(StoreErrorCode::DirectoryNotEmpty));
    assert_eq!(client.ls("/guarded").await.unwrap().keys(), vec!["/guarded/k"]);

    client.rm("/guarded/k").await.unwrap();
    let removed = client.rmdir("/guarded", false).await.unwrap();
    assert!(removed.is_ok());
}

#[tokio::test]
async fn test_rmdir_recursive_tolerates_any_subtree() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    for children in [0usize, 1, 5] {
        let dir = format!("/tree{children}");
        client.mkdir(&dir).await.unwrap();
        for i in 0..children {
            client.set(format!("{dir}/sub/k{i}"), "v").await.unwrap();
        }

        let removed = client.rmdir(&dir, true).await.unwrap();
        assert!(removed.is_ok(), "rmdir {dir}: {}", removed.error_message());
        assert!(client.ls(&dir).await.unwrap().values().is_empty());
    }
}

#[tokio::test]
async fn test_rm_on_directory_is_not_a_file() {
    enable_logger();
    let store = MemoryStore::new();
    let client = store.client();

    client.mkdir("/dir").await.unwrap();
    let response = client.rm("/dir").await.unwrap();
    assert_eq!(response.error_kind(), Some(StoreErrorCode::NotAFile));
}
