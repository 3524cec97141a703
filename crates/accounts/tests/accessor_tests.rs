//! Tests for the account, open installation and installation accessors.

mod common;

use common::*;
use pwa_accounts::{AccountError, Credentials};
use pwa_core::ObfuscatedPasswd;
use time::Duration;

#[tokio::test]
async fn test_account_add_get_remove() {
    let t = TestAccounts::new().await;
    let accounts = t.mgr.account_accessor();

    assert!(accounts.get("bob").await.unwrap().is_none());
    accounts.add("bob").await.unwrap();

    let bob = accounts.get("bob").await.unwrap().unwrap();
    assert_eq!(bob.username, "bob");
    assert_eq!(bob.created, bob.modified);

    let err = accounts.add("bob").await.unwrap_err();
    assert!(matches!(err, AccountError::AlreadyExists(_)));

    accounts.remove("bob").await.unwrap();
    assert!(accounts.get("bob").await.unwrap().is_none());

    let err = accounts.remove("bob").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_account_listing_is_sorted() {
    let t = TestAccounts::new().await;
    for name in ["charles", "alice", "bob"] {
        t.mgr.account_accessor().add(name).await.unwrap();
    }
    let names: Vec<_> = t
        .mgr
        .account_accessor()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.username)
        .collect();
    assert_eq!(names, vec!["alice", "bob", "charles"]);
}

#[tokio::test]
async fn test_open_inst_get_verifies_password() {
    let t = TestAccounts::new().await;
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    let p2 = t.mgr.add_open_inst("bob").await.unwrap();
    let p3 = t.mgr.add_open_inst("alice").await.unwrap();
    assert_ne!(p1, p2);

    let open_insts = t.mgr.open_inst_accessor();
    let first = open_insts.get("bob", &p1).await.unwrap().unwrap();
    let second = open_insts.get("bob", &p2).await.unwrap().unwrap();
    assert_ne!(first.passwd_hash, second.passwd_hash);
    assert_eq!(first.username, "bob");

    // Alice's password does not open Bob's installations, and vice versa.
    assert!(open_insts.get("bob", &p3).await.unwrap().is_none());
    assert!(open_insts.get("alice", &p1).await.unwrap().is_none());

    let garbage = ObfuscatedPasswd::from_bytes(vec![0u8; 16]);
    assert!(open_insts.get("bob", &garbage).await.unwrap().is_none());

    // Lookups never consume anything.
    assert_eq!(t.open_inst_count().await, 3);
}

#[tokio::test]
async fn test_open_inst_hash_is_not_the_password() {
    let t = TestAccounts::new().await;
    let obfuscated = t.mgr.add_open_inst("bob").await.unwrap();
    let record = t
        .mgr
        .open_inst_accessor()
        .get("bob", &obfuscated)
        .await
        .unwrap()
        .unwrap();

    assert!(record.passwd_hash.starts_with("$2b$04$"));
    assert!(!record.passwd_hash.contains(&obfuscated.to_base64()));
}

#[tokio::test]
async fn test_expired_open_inst_is_purged() {
    let t = TestAccounts::new().await;
    let expired = t.mgr.add_open_inst("alice").await.unwrap();
    t.backdate_open_insts("alice", Duration::seconds(5)).await;
    let fresh = t.mgr.add_open_inst("alice").await.unwrap();
    assert_eq!(t.user_open_inst_count("alice").await, 2);

    let open_insts = t.mgr.open_inst_accessor();
    assert!(open_insts.get("alice", &expired).await.unwrap().is_none());
    assert_eq!(t.user_open_inst_count("alice").await, 1);

    assert!(open_insts.get("alice", &fresh).await.unwrap().is_some());
    assert_eq!(t.user_open_inst_count("alice").await, 1);
}

#[tokio::test]
async fn test_open_inst_expires_after_max_age() {
    let t = TestAccounts::new().await;
    let p1 = t.mgr.add_open_inst("alice").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    assert!(
        t.mgr
            .open_inst_accessor()
            .get("alice", &p1)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(t.open_inst_count().await, 0);
}

#[tokio::test]
async fn test_unbounded_open_inst_age_never_expires() {
    let t = TestAccounts::with_ages(TestAges {
        max_open_inst_age: Duration::MAX,
        ..TestAges::default()
    })
    .await;
    let p1 = t.mgr.add_open_inst("alice").await.unwrap();
    t.backdate_open_insts("alice", Duration::days(3650)).await;

    assert!(
        t.mgr
            .open_inst_accessor()
            .get("alice", &p1)
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(t.open_inst_count().await, 1);
}

#[tokio::test]
async fn test_open_inst_remove() {
    let t = TestAccounts::new().await;
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    let open_insts = t.mgr.open_inst_accessor();
    let record = open_insts.get("bob", &p1).await.unwrap().unwrap();

    open_insts.remove(&record.passwd_hash).await.unwrap();
    assert!(open_insts.get("bob", &p1).await.unwrap().is_none());

    let err = open_insts.remove(&record.passwd_hash).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_inst_get_credential_contract() {
    let t = TestAccounts::new().await;
    let inst_id = new_inst_id();
    let bob = t.mgr.add_open_inst("bob").await.unwrap();
    let alice = t.mgr.add_open_inst("alice").await.unwrap();
    t.mgr
        .add_or_modify_inst(&inst_id, "bob", &bob, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();

    let insts = t.mgr.inst_accessor();

    // Unknown ids are absent, with or without credentials.
    assert!(insts.get("unknown", None).await.unwrap().is_none());
    assert!(
        insts
            .get("unknown", Some(Credentials::new("bob", &bob)))
            .await
            .unwrap()
            .is_none()
    );

    let record = insts.get(&inst_id, None).await.unwrap().unwrap();
    assert_eq!(record.username, "bob");

    let record = insts
        .get(&inst_id, Some(Credentials::new("bob", &bob)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.inst_id, inst_id);

    // Known id with the wrong user or password is an error, not absent.
    let err = insts
        .get(&inst_id, Some(Credentials::new("alice", &bob)))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = insts
        .get(&inst_id, Some(Credentials::new("bob", &alice)))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_inst_modify_and_update() {
    let t = TestAccounts::new().await;
    let inst_id = new_inst_id();
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    t.mgr
        .add_or_modify_inst(&inst_id, "bob", &p1, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();

    let insts = t.mgr.inst_accessor();
    let created = insts.get(&inst_id, None).await.unwrap().unwrap();
    assert_eq!(created.update_count, 0);
    assert_eq!(created.launcher, None);

    insts
        .modify(&inst_id, UA_PLAIN, Some("homescreen"))
        .await
        .unwrap();
    let modified = insts.get(&inst_id, None).await.unwrap().unwrap();
    assert_eq!(modified.user_agent, UA_PLAIN);
    assert_eq!(modified.launcher.as_deref(), Some("homescreen"));
    assert_eq!(modified.app_version, "0.42.1");
    assert_eq!(modified.update_count, 0);
    assert_eq!(modified.created, created.created);
    assert!(modified.modified >= created.modified);

    insts
        .update_inst(&inst_id, UA_BLACKBERRY, "0.43.0", None)
        .await
        .unwrap();
    let updated = insts.get(&inst_id, None).await.unwrap().unwrap();
    assert_eq!(updated.user_agent, UA_BLACKBERRY);
    assert_eq!(updated.app_version, "0.43.0");
    assert_eq!(updated.launcher, None);
    assert_eq!(updated.update_count, 1);
    assert_eq!(updated.created, created.created);

    assert!(insts.modify("unknown", UA_PLAIN, None).await.unwrap_err().is_not_found());
    assert!(
        insts
            .update_inst("unknown", UA_PLAIN, "1.0", None)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(insts.remove("unknown").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_inst_user_queries() {
    let t = TestAccounts::new().await;
    let ids: Vec<String> = (0..3).map(|_| new_inst_id()).collect();
    for (inst_id, user_agent) in ids.iter().zip([UA_PLAIN, UA_BLACKBERRY, UA_PLAIN]) {
        let passwd = t.mgr.add_open_inst("alice").await.unwrap();
        t.mgr
            .add_or_modify_inst(inst_id, "alice", &passwd, user_agent, "1.2.3", None)
            .await
            .unwrap();
    }
    t.backdate_inst(&ids[2], Duration::hours(2), Duration::hours(2))
        .await;
    t.backdate_inst(&ids[0], Duration::hours(1), Duration::hours(1))
        .await;

    let insts = t.mgr.inst_accessor();
    let order: Vec<_> = insts
        .get_user_insts("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.inst_id)
        .collect();
    assert_eq!(order, vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]);

    let order: Vec<_> = insts
        .get_user_user_agent_insts("alice", UA_PLAIN)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.inst_id)
        .collect();
    assert_eq!(order, vec![ids[2].clone(), ids[0].clone()]);

    assert!(insts.get_user_insts("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replaceable_inst_is_renamed() {
    let t = TestAccounts::with_ages(TestAges {
        min_replaceable_inst_age: Some(Duration::days(7)),
        ..TestAges::default()
    })
    .await;
    let old_id = new_inst_id();
    let new_id = new_inst_id();
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    t.mgr
        .add_or_modify_inst(&old_id, "bob", &p1, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();

    let insts = t.mgr.inst_accessor();

    // Too young to be replaced.
    assert!(
        insts
            .get(&new_id, Some(Credentials::new("bob", &p1)))
            .await
            .unwrap()
            .is_none()
    );

    t.backdate_inst(&old_id, Duration::days(8), Duration::days(1))
        .await;
    let before = insts.get(&old_id, None).await.unwrap().unwrap();

    let renamed = insts
        .get(&new_id, Some(Credentials::new("bob", &p1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.inst_id, new_id);
    assert_eq!(renamed.created, before.created);
    assert!(renamed.modified > before.modified);
    assert_eq!(renamed.passwd_hash, before.passwd_hash);

    assert!(insts.get(&old_id, None).await.unwrap().is_none());
    assert_eq!(t.inst_count().await, 1);
}

#[tokio::test]
async fn test_replaceable_inst_requires_password() {
    let t = TestAccounts::with_ages(TestAges {
        min_replaceable_inst_age: Some(Duration::days(7)),
        ..TestAges::default()
    })
    .await;
    let old_id = new_inst_id();
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    let other = t.mgr.add_open_inst("bob").await.unwrap();
    t.mgr
        .add_or_modify_inst(&old_id, "bob", &p1, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();
    t.backdate_inst(&old_id, Duration::days(8), Duration::days(8))
        .await;

    let insts = t.mgr.inst_accessor();
    assert!(
        insts
            .get(&new_inst_id(), Some(Credentials::new("bob", &other)))
            .await
            .unwrap()
            .is_none()
    );
    assert!(insts.get(&old_id, None).await.unwrap().is_some());
}

#[tokio::test]
async fn test_replacement_disabled_by_default() {
    let t = TestAccounts::new().await;
    let old_id = new_inst_id();
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    t.mgr
        .add_or_modify_inst(&old_id, "bob", &p1, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();
    t.backdate_inst(&old_id, Duration::days(365), Duration::days(365))
        .await;

    assert!(
        t.mgr
            .inst_accessor()
            .get(&new_inst_id(), Some(Credentials::new("bob", &p1)))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_unbounded_replaceable_age_replaces_nothing() {
    let t = TestAccounts::with_ages(TestAges {
        min_replaceable_inst_age: Some(Duration::MAX),
        ..TestAges::default()
    })
    .await;
    let old_id = new_inst_id();
    let p1 = t.mgr.add_open_inst("bob").await.unwrap();
    t.mgr
        .add_or_modify_inst(&old_id, "bob", &p1, UA_BLACKBERRY, "0.42.1", None)
        .await
        .unwrap();
    t.backdate_inst(&old_id, Duration::days(3650), Duration::days(3650))
        .await;

    let insts = t.mgr.inst_accessor();
    assert!(
        insts
            .get(&new_inst_id(), Some(Credentials::new("bob", &p1)))
            .await
            .unwrap()
            .is_none()
    );
    assert!(insts.get(&old_id, None).await.unwrap().is_some());
}
