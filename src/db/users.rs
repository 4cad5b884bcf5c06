/// User rows: append markers, storage links, profile metadata
use crate::{
    db::models::UserRecord,
    discovery::ProfileMetadata,
    envelope::GENESIS_HASH,
    error::{DropsError, DropsResult},
};
use sqlx::{Row, SqlitePool};

#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Advance the user's append marker, creating the row on first use
    pub async fn update_last_hash(&self, address: &str, hash: &str) -> DropsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (address, last_hash) VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET last_hash = excluded.last_hash
            "#,
        )
        .bind(address)
        .bind(hash)
        .execute(&self.db)
        .await
        .map_err(DropsError::Database)?;

        Ok(())
    }

    /// Record where the user's discovery document and index head live
    pub async fn set_storage_links(
        &self,
        address: &str,
        storage_info_link: &str,
        index_link: &str,
    ) -> DropsResult<()> {
        let result = sqlx::query(
            "UPDATE users SET storage_info_link = ?, index_link = ? WHERE address = ?",
        )
        .bind(storage_info_link)
        .bind(index_link)
        .bind(address)
        .execute(&self.db)
        .await
        .map_err(DropsError::Database)?;

        if result.rows_affected() == 0 {
            return Err(DropsError::NotFound(format!("User not found: {}", address)));
        }
        Ok(())
    }

    /// Refresh profile metadata mirrored from the discovery directory
    pub async fn update_profile(
        &self,
        address: &str,
        profile: &ProfileMetadata,
    ) -> DropsResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = ?, description = ?, tags = ?, links = ?,
                avatar = ?, profile_image = ?, background_image = ?
            WHERE address = ?
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(profile.tags.join(","))
        .bind(profile.links.join(","))
        .bind(&profile.avatar)
        .bind(&profile.profile_image)
        .bind(&profile.background_image)
        .bind(address)
        .execute(&self.db)
        .await
        .map_err(DropsError::Database)?;

        Ok(())
    }

    pub async fn get_user(&self, address: &str) -> DropsResult<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT u.address, u.last_hash, u.storage_info_link, u.index_link,
                   u.name, u.description, u.avatar, u.profile_image,
                   u.background_image, u.tags, u.links,
                   (SELECT COUNT(*) FROM followers f WHERE f.following = u.address) AS followers_count,
                   (SELECT COUNT(*) FROM messages m WHERE m.sender = u.address) AS messages_count
            FROM users u WHERE u.address = ?
            "#,
        )
        .bind(address)
        .fetch_optional(&self.db)
        .await
        .map_err(DropsError::Database)?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        Ok(Some(UserRecord {
            address: row.try_get("address")?,
            last_hash: row.try_get("last_hash")?,
            storage_info_link: row.try_get("storage_info_link")?,
            index_link: row.try_get("index_link")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            avatar: row.try_get("avatar")?,
            profile_image: row.try_get("profile_image")?,
            background_image: row.try_get("background_image")?,
            tags: row.try_get("tags")?,
            links: row.try_get("links")?,
            followers_count: row.try_get("followers_count")?,
            messages_count: row.try_get("messages_count")?,
        }))
    }

    /// Last accepted hash, or the genesis hash for unknown users
    pub async fn get_last_hash(&self, address: &str) -> DropsResult<String> {
        let row = sqlx::query("SELECT last_hash FROM users WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.db)
            .await
            .map_err(DropsError::Database)?;

        match row {
            Some(row) => Ok(row.try_get("last_hash")?),
            None => Ok(GENESIS_HASH.to_string()),
        }
    }
}
