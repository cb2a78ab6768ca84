// tests/store_windows.rs
use chrono::{DateTime, TimeZone, Utc};

use leak_tracker::store::NewLeakItem;
use leak_tracker::{LeakDraft, LeakStore, ReportKind};

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
}

fn item(n: u32, discovered_at: DateTime<Utc>) -> NewLeakItem {
    NewLeakItem {
        draft: LeakDraft {
            title: format!("Dump {n}"),
            link: format!("https://forum.test/threads/{n}/"),
            author: "someone".into(),
            category: "Databases".into(),
            published_at: String::new(),
            content: "<p>rows</p>".into(),
            resource_links: "https://mega.nz/file/x".into(),
        },
        source_name: "BreachForum".into(),
        discovered_at,
    }
}

#[tokio::test]
async fn file_store_survives_reopen_and_keeps_links_unique() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("leaks.db").display());

    {
        let store = LeakStore::connect(&url).await.unwrap();
        assert!(store.insert(&item(1, at(19, 9))).await.unwrap().is_some());
    }

    let store = LeakStore::connect(&url).await.unwrap();
    assert!(store.exists("https://forum.test/threads/1/").await.unwrap());
    // same link after a restart is still a duplicate
    assert!(store.insert(&item(1, at(20, 9))).await.unwrap().is_none());
    assert_eq!(store.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn sunday_belongs_to_the_week_started_on_monday() {
    let store = LeakStore::in_memory().await.unwrap();
    for (n, ts) in [(1, at(18, 23)), (2, at(19, 0)), (3, at(25, 23)), (4, at(26, 0))] {
        store.insert(&item(n, ts)).await.unwrap();
    }

    let week = store.window(ReportKind::Weekly, at(25, 12)).await.unwrap();
    assert_eq!(week.label(), "2026-10-19 - 2026-10-25");
    assert_eq!(store.count_in(&week).await.unwrap(), 2);

    let monday = store.window(ReportKind::Weekly, at(19, 0)).await.unwrap();
    assert_eq!(monday, week);

    let day = store.window(ReportKind::Daily, at(19, 15)).await.unwrap();
    assert_eq!(day.label(), "2026-10-19");
    assert!(day.contains(at(19, 0)));
    assert!(!day.contains(at(20, 0)));
    assert_eq!(store.count_in(&day).await.unwrap(), 1);
}
