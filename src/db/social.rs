/// Votes and follow edges
use crate::error::{DropsError, DropsResult};
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::{HashMap, HashSet};

#[derive(Clone)]
pub struct SocialStore {
    db: SqlitePool,
}

impl SocialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Upsert the sender's standing vote on a message; a new vote
    /// overwrites the prior one, no history is kept
    pub async fn vote(&self, sender: &str, message_hash: &str, is_like: bool) -> DropsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO votes (sender, message_hash, is_like) VALUES (?, ?, ?)
            ON CONFLICT(sender, message_hash) DO UPDATE SET is_like = excluded.is_like
            "#,
        )
        .bind(sender)
        .bind(message_hash)
        .bind(is_like)
        .execute(&self.db)
        .await
        .map_err(DropsError::Database)?;

        Ok(())
    }

    /// Insert or remove a follow edge; both directions are idempotent
    pub async fn follow(&self, follower: &str, following: &str, is_follow: bool) -> DropsResult<()> {
        if is_follow {
            sqlx::query("INSERT OR IGNORE INTO followers (follower, following) VALUES (?, ?)")
                .bind(follower)
                .bind(following)
                .execute(&self.db)
                .await
                .map_err(DropsError::Database)?;
        } else {
            sqlx::query("DELETE FROM followers WHERE follower = ? AND following = ?")
                .bind(follower)
                .bind(following)
                .execute(&self.db)
                .await
                .map_err(DropsError::Database)?;
        }

        Ok(())
    }

    /// Addresses the given user follows
    pub async fn following_set(&self, follower: &str) -> DropsResult<Vec<String>> {
        let rows = sqlx::query("SELECT following FROM followers WHERE follower = ?")
            .bind(follower)
            .fetch_all(&self.db)
            .await
            .map_err(DropsError::Database)?;

        rows.iter()
            .map(|row| row.try_get("following").map_err(DropsError::Database))
            .collect()
    }

    /// Batched vote state: hash -> Some(like) or None when no vote stands
    pub async fn get_likes(
        &self,
        address: &str,
        hashes: &[String],
    ) -> DropsResult<HashMap<String, Option<bool>>> {
        let mut result: HashMap<String, Option<bool>> =
            hashes.iter().map(|h| (h.clone(), None)).collect();
        if hashes.is_empty() {
            return Ok(result);
        }

        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT message_hash, is_like FROM votes WHERE sender = ",
        );
        qb.push_bind(address);
        qb.push(" AND message_hash IN (");
        let mut separated = qb.separated(", ");
        for hash in hashes {
            separated.push_bind(hash);
        }
        qb.push(")");

        for row in qb.build().fetch_all(&self.db).await.map_err(DropsError::Database)? {
            let hash: String = row.try_get("message_hash")?;
            let is_like: bool = row.try_get("is_like")?;
            result.insert(hash, Some(is_like));
        }

        Ok(result)
    }

    /// Batched follow state: address -> whether the caller follows it
    pub async fn get_following(
        &self,
        address: &str,
        users: &[String],
    ) -> DropsResult<HashMap<String, bool>> {
        let mut followed: HashSet<String> = HashSet::new();
        if !users.is_empty() {
            let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
                "SELECT following FROM followers WHERE follower = ",
            );
            qb.push_bind(address);
            qb.push(" AND following IN (");
            let mut separated = qb.separated(", ");
            for user in users {
                separated.push_bind(user);
            }
            qb.push(")");

            for row in qb.build().fetch_all(&self.db).await.map_err(DropsError::Database)? {
                followed.insert(row.try_get("following")?);
            }
        }

        Ok(users
            .iter()
            .map(|u| (u.clone(), followed.contains(u)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_vote_upsert_keeps_single_row() {
        let store = SocialStore::new(test_pool().await);

        store.vote("0xa", "0xm1", true).await.unwrap();
        store.vote("0xa", "0xm1", false).await.unwrap();

        let likes = store
            .get_likes("0xa", &["0xm1".to_string()])
            .await
            .unwrap();
        assert_eq!(likes.get("0xm1"), Some(&Some(false)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
            .fetch_one(&store.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_get_likes_reports_missing_votes_as_none() {
        let store = SocialStore::new(test_pool().await);
        store.vote("0xa", "0xm1", true).await.unwrap();

        let likes = store
            .get_likes("0xa", &["0xm1".to_string(), "0xm2".to_string()])
            .await
            .unwrap();
        assert_eq!(likes.get("0xm1"), Some(&Some(true)));
        assert_eq!(likes.get("0xm2"), Some(&None));
    }

    #[tokio::test]
    async fn test_follow_is_idempotent_and_unfollow_removes() {
        let store = SocialStore::new(test_pool().await);

        store.follow("0xa", "0xb", true).await.unwrap();
        store.follow("0xa", "0xb", true).await.unwrap();
        assert_eq!(store.following_set("0xa").await.unwrap(), vec!["0xb"]);

        store.follow("0xa", "0xb", false).await.unwrap();
        assert!(store.following_set("0xa").await.unwrap().is_empty());
        // Removing an absent edge is a no-op
        store.follow("0xa", "0xb", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_following_batch() {
        let store = SocialStore::new(test_pool().await);
        store.follow("0xa", "0xb", true).await.unwrap();

        let state = store
            .get_following("0xa", &["0xb".to_string(), "0xc".to_string()])
            .await
            .unwrap();
        assert_eq!(state.get("0xb"), Some(&true));
        assert_eq!(state.get("0xc"), Some(&false));
    }
}
