//! Static asset store: avatars and uploaded images, keyed by URL.
//!
//! Non-API GET resources are served cache-first; the network layer refreshes
//! entries on successful fetches and falls back to whatever is here when the
//! network is down, however stale.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};

use crate::Cache;

pub struct CachedAsset {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedAsset {
    /// Fresh entries are served without touching the network.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        Utc::now() - self.fetched_at < max_age
    }
}

impl Cache {
    pub fn store_asset(&self, url: &str, content_type: Option<&str>, body: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO assets (url, content_type, body, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![url, content_type, body, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn asset(&self, url: &str) -> Result<Option<CachedAsset>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT content_type, body, fetched_at FROM assets WHERE url = ?1",
                    [url],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            Ok(row.map(|(content_type, body, fetched_at)| CachedAsset {
                content_type,
                body,
                fetched_at: fetched_at
                    .parse()
                    .unwrap_or_else(|_| Utc::now() - Duration::days(365)),
            }))
        })
    }

    pub fn prune_assets(&self, days_to_keep: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(days_to_keep)).to_rfc3339();
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM assets WHERE fetched_at < ?1", [&cutoff])?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_roundtrip() {
        let cache = Cache::open_in_memory().unwrap();
        cache
            .store_asset("/uploads/avatar_3.png", Some("image/png"), b"pngbytes")
            .unwrap();

        let asset = cache.asset("/uploads/avatar_3.png").unwrap().unwrap();
        assert_eq!(asset.content_type.as_deref(), Some("image/png"));
        assert_eq!(asset.body, b"pngbytes");
        assert!(asset.is_fresh(Duration::days(1)));
    }

    #[test]
    fn missing_asset_is_none() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.asset("/uploads/nope.png").unwrap().is_none());
    }

    #[test]
    fn restore_overwrites_previous_body() {
        let cache = Cache::open_in_memory().unwrap();
        cache.store_asset("/a", None, b"v1").unwrap();
        cache.store_asset("/a", Some("image/webp"), b"v2").unwrap();

        let asset = cache.asset("/a").unwrap().unwrap();
        assert_eq!(asset.body, b"v2");
        assert_eq!(asset.content_type.as_deref(), Some("image/webp"));
    }
}
