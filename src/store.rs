// src/store.rs
//! Dedup store: append-only SQLite table keyed by item link, plus the
//! window/grouping queries the reports need.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::SourceGrouping;
use crate::extract::LeakDraft;

/// Storage timestamp format (UTC, second precision, sorts lexicographically).
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("bad timestamp in store: {0:?}")]
    Timestamp(String),
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|n| n.and_utc())
        .map_err(|_| StoreError::Timestamp(s.to_string()))
}

/// A stored post. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakItem {
    pub id: i64,
    pub title: String,
    /// Identity: unique across the store.
    pub link: String,
    pub author: String,
    pub category: String,
    pub published_at: String,
    pub content: String,
    pub resource_links: String,
    pub source_name: String,
    pub discovered_at: DateTime<Utc>,
}

/// Insert request assembled by the orchestrator.
#[derive(Debug, Clone)]
pub struct NewLeakItem {
    pub draft: LeakDraft,
    pub source_name: String,
    pub discovered_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    link: String,
    pub_date: String,
    author: String,
    category: String,
    content: String,
    download_links: String,
    site_name: String,
    discovered_at: String,
}

impl TryFrom<ItemRow> for LeakItem {
    type Error = StoreError;

    fn try_from(r: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            link: r.link,
            author: r.author,
            category: r.category,
            published_at: r.pub_date,
            content: r.content,
            resource_links: r.download_links,
            source_name: r.site_name,
            discovered_at: parse_ts(&r.discovered_at)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Daily,
    Weekly,
}

/// Half-open `[start, end)` interval in storage time (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub kind: ReportKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Last calendar day inside the window (Sunday for weekly windows).
    pub fn last_day(&self) -> NaiveDate {
        (self.end - Duration::days(1)).date_naive()
    }

    /// "2026-10-19" for a day, "2026-10-19 - 2026-10-25" for a week.
    pub fn label(&self) -> String {
        match self.kind {
            ReportKind::Daily => self.first_day().format("%Y-%m-%d").to_string(),
            ReportKind::Weekly => format!(
                "{} - {}",
                self.first_day().format("%Y-%m-%d"),
                self.last_day().format("%Y-%m-%d")
            ),
        }
    }
}

/// Read-side selectors used by reporting.
#[derive(Debug, Clone)]
pub enum LeakQuery {
    Window(ReportWindow),
    SourcePrefix(String),
    HourBucket { date: NaiveDate, hour: u32 },
}

const ITEM_COLUMNS: &str = "id, title, link, pub_date, author, category, content, download_links, site_name, discovered_at";

#[derive(Debug, Clone)]
pub struct LeakStore {
    pool: SqlitePool,
}

impl LeakStore {
    /// Open (creating if missing) a SQLite database, e.g. `sqlite://data_leaks.db`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Self::init(pool).await
    }

    /// Private in-memory database (single connection so every query sees the same data).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn exists(&self, link: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM items WHERE link = ?1 LIMIT 1")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert-if-absent. `Ok(None)` means the link was already stored.
    pub async fn insert(&self, item: &NewLeakItem) -> Result<Option<LeakItem>, StoreError> {
        let d = &item.draft;
        let discovered = format_ts(item.discovered_at);
        let res = sqlx::query(
            "INSERT INTO items (title, link, pub_date, author, category, content, download_links, site_name, discovered_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(link) DO NOTHING",
        )
        .bind(&d.title)
        .bind(&d.link)
        .bind(&d.published_at)
        .bind(&d.author)
        .bind(&d.category)
        .bind(&d.content)
        .bind(&d.resource_links)
        .bind(&item.source_name)
        .bind(&discovered)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(LeakItem {
            id: res.last_insert_rowid(),
            title: d.title.clone(),
            link: d.link.clone(),
            author: d.author.clone(),
            category: d.category.clone(),
            published_at: d.published_at.clone(),
            content: d.content.clone(),
            resource_links: d.resource_links.clone(),
            source_name: item.source_name.clone(),
            discovered_at: parse_ts(&discovered)?,
        }))
    }

    /// Day or Monday-to-Monday window containing `at`, computed by SQLite date functions.
    pub async fn window(
        &self,
        kind: ReportKind,
        at: DateTime<Utc>,
    ) -> Result<ReportWindow, StoreError> {
        let sql = match kind {
            ReportKind::Daily => "SELECT datetime(date(?1)), datetime(date(?1, '+1 day'))",
            ReportKind::Weekly => {
                "SELECT datetime(date(?1, '-6 days', 'weekday 1')), \
                        datetime(date(?1, '-6 days', 'weekday 1', '+7 days'))"
            }
        };
        let at_s = format_ts(at);
        let (start, end): (Option<String>, Option<String>) = sqlx::query_as(sql)
            .bind(&at_s)
            .fetch_one(&self.pool)
            .await?;
        let start = start.ok_or_else(|| StoreError::Timestamp(at_s.clone()))?;
        let end = end.ok_or_else(|| StoreError::Timestamp(at_s.clone()))?;
        Ok(ReportWindow {
            kind,
            start: parse_ts(&start)?,
            end: parse_ts(&end)?,
        })
    }

    /// Items in insertion order.
    pub async fn query(&self, q: &LeakQuery) -> Result<Vec<LeakItem>, StoreError> {
        let rows: Vec<ItemRow> = match q {
            LeakQuery::Window(w) => {
                sqlx::query_as(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items \
                     WHERE discovered_at >= ?1 AND discovered_at < ?2 ORDER BY id"
                ))
                .bind(format_ts(w.start))
                .bind(format_ts(w.end))
                .fetch_all(&self.pool)
                .await?
            }
            LeakQuery::SourcePrefix(prefix) => {
                sqlx::query_as(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items \
                     WHERE substr(site_name, 1, length(?1)) = ?1 ORDER BY id"
                ))
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?
            }
            LeakQuery::HourBucket { date, hour } => {
                sqlx::query_as(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items \
                     WHERE date(discovered_at) = ?1 AND strftime('%H', discovered_at) = ?2 ORDER BY id"
                ))
                .bind(date.format("%Y-%m-%d").to_string())
                .bind(format!("{hour:02}"))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(LeakItem::try_from).collect()
    }

    pub async fn count_in(&self, w: &ReportWindow) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM items WHERE discovered_at >= ?1 AND discovered_at < ?2",
        )
        .bind(format_ts(w.start))
        .bind(format_ts(w.end))
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    /// Largest group first, ties by label.
    pub async fn count_by_source(
        &self,
        w: &ReportWindow,
        grouping: SourceGrouping,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let label = match grouping {
            SourceGrouping::SourceName => "site_name",
            SourceGrouping::TitlePrefix => "SUBSTR(title, 1, INSTR(title || ' ', ' ') - 1)",
        };
        self.grouped(label, w, "n DESC, label").await
    }

    /// `("HH", n)` buckets in hour order.
    pub async fn count_by_hour(&self, w: &ReportWindow) -> Result<Vec<(String, i64)>, StoreError> {
        self.grouped("strftime('%H', discovered_at)", w, "label").await
    }

    /// `("YYYY-MM-DD", n)` buckets in date order.
    pub async fn count_by_date(&self, w: &ReportWindow) -> Result<Vec<(String, i64)>, StoreError> {
        self.grouped("date(discovered_at)", w, "label").await
    }

    async fn grouped(
        &self,
        label_expr: &str,
        w: &ReportWindow,
        order: &str,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let sql = format!(
            "SELECT {label_expr} AS label, COUNT(*) AS n FROM items \
             WHERE discovered_at >= ?1 AND discovered_at < ?2 \
             GROUP BY label ORDER BY {order}"
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
            .bind(format_ts(w.start))
            .bind(format_ts(w.end))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_all(&self) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(link: &str, title: &str) -> LeakDraft {
        LeakDraft {
            title: title.into(),
            link: link.into(),
            author: "bob".into(),
            category: "Databases".into(),
            published_at: String::new(),
            content: "<p>dump</p>".into(),
            resource_links: "https://x.test/files/a.zip".into(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn new_item(link: &str, source: &str, when: DateTime<Utc>) -> NewLeakItem {
        NewLeakItem {
            draft: draft(link, &format!("Acme {link}")),
            source_name: source.into(),
            discovered_at: when,
        }
    }

    #[tokio::test]
    async fn second_insert_of_same_link_is_ignored() {
        let store = LeakStore::in_memory().await.unwrap();
        let first = store
            .insert(&new_item("https://f.test/1", "bf", at(2026, 10, 19, 9)))
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(store.exists("https://f.test/1").await.unwrap());

        let again = store
            .insert(&new_item("https://f.test/1", "other", at(2026, 10, 20, 9)))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.count_all().await.unwrap(), 1);
        let kept = store
            .query(&LeakQuery::SourcePrefix("bf".into()))
            .await
            .unwrap();
        assert_eq!(kept[0].discovered_at, at(2026, 10, 19, 9));
    }

    #[tokio::test]
    async fn daily_and_weekly_windows() {
        let store = LeakStore::in_memory().await.unwrap();
        let day = store
            .window(ReportKind::Daily, at(2026, 10, 21, 15))
            .await
            .unwrap();
        assert_eq!(day.start, at(2026, 10, 21, 0));
        assert_eq!(day.end, at(2026, 10, 22, 0));
        assert_eq!(day.label(), "2026-10-21");

        // Monday maps to its own week.
        let week = store
            .window(ReportKind::Weekly, at(2026, 10, 19, 0))
            .await
            .unwrap();
        assert_eq!(week.start, at(2026, 10, 19, 0));
        assert_eq!(week.end, at(2026, 10, 26, 0));
        // Sunday is the last day of the same week.
        let sunday = store
            .window(ReportKind::Weekly, at(2026, 10, 25, 23))
            .await
            .unwrap();
        assert_eq!(sunday, week);
        assert_eq!(week.label(), "2026-10-19 - 2026-10-25");
        assert!(week.contains(at(2026, 10, 25, 23)));
        assert!(!week.contains(at(2026, 10, 26, 0)));
    }

    #[tokio::test]
    async fn counts_and_buckets() {
        let store = LeakStore::in_memory().await.unwrap();
        store.insert(&new_item("l1", "breach", at(2026, 10, 19, 9))).await.unwrap();
        store.insert(&new_item("l2", "breach", at(2026, 10, 19, 9))).await.unwrap();
        store.insert(&new_item("l3", "xss", at(2026, 10, 20, 14))).await.unwrap();
        store.insert(&new_item("l4", "xss", at(2026, 10, 27, 1))).await.unwrap();

        let week = store.window(ReportKind::Weekly, at(2026, 10, 21, 0)).await.unwrap();
        assert_eq!(store.count_in(&week).await.unwrap(), 3);
        assert_eq!(
            store.count_by_source(&week, SourceGrouping::SourceName).await.unwrap(),
            vec![("breach".to_string(), 2), ("xss".to_string(), 1)]
        );
        assert_eq!(
            store.count_by_source(&week, SourceGrouping::TitlePrefix).await.unwrap(),
            vec![("Acme".to_string(), 3)]
        );
        assert_eq!(
            store.count_by_hour(&week).await.unwrap(),
            vec![("09".to_string(), 2), ("14".to_string(), 1)]
        );
        assert_eq!(
            store.count_by_date(&week).await.unwrap(),
            vec![("2026-10-19".to_string(), 2), ("2026-10-20".to_string(), 1)]
        );

        let nine = store
            .query(&LeakQuery::HourBucket {
                date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                hour: 9,
            })
            .await
            .unwrap();
        let links: Vec<_> = nine.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["l1", "l2"]);

        let in_week = store.query(&LeakQuery::Window(week)).await.unwrap();
        assert_eq!(in_week.len(), 3);
        assert_eq!(store.query(&LeakQuery::SourcePrefix("xs".into())).await.unwrap().len(), 2);
    }
}
