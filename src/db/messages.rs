/// Message rows and the feed/thread query engine
///
/// Queries are cursor-paginated over the composite `(timestamp DESC,
/// hash DESC)` order; reply trees are reconstructed from the flat
/// table with an explicit breadth-first walk over `in_reply_to` edges
/// rather than a recursive SQL query.
use crate::{
    db::{
        models::{MessageQuery, NewMessage, StoredMessage},
        social::SocialStore,
        users::UserStore,
    },
    envelope::Media,
    error::{DropsError, DropsResult},
};
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::{HashMap, HashSet};

#[derive(Clone)]
pub struct MessageStore {
    db: SqlitePool,
}

impl MessageStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a message row with its tag/category dimensions and media
    /// rows. Inserting the same hash twice is a no-op: content
    /// addressing makes resubmission idempotent.
    pub async fn add_message(&self, message: &NewMessage) -> DropsResult<()> {
        let mut tx = self.db.begin().await.map_err(DropsError::Database)?;

        let mut tag_ids = Vec::new();
        for tag in &message.tags {
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(tag)
                .execute(&mut *tx)
                .await
                .map_err(DropsError::Database)?;
            let id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(tag)
                .fetch_one(&mut *tx)
                .await
                .map_err(DropsError::Database)?;
            tag_ids.push(id);
        }

        let category_id: Option<i64> = match &message.category {
            Some(category) => {
                sqlx::query(
                    "INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
                )
                .bind(category)
                .execute(&mut *tx)
                .await
                .map_err(DropsError::Database)?;
                Some(
                    sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
                        .bind(category)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(DropsError::Database)?,
                )
            }
            None => None,
        };

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages
                (hash, sender, content, timestamp, category_id, in_reply_to, origin, url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.hash)
        .bind(&message.sender)
        .bind(&message.content)
        .bind(message.timestamp)
        .bind(category_id)
        .bind(&message.in_reply_to)
        .bind(&message.origin)
        .bind(&message.url)
        .execute(&mut *tx)
        .await
        .map_err(DropsError::Database)?
        .rows_affected();

        if inserted > 0 {
            for tag_id in tag_ids {
                sqlx::query("INSERT INTO message_tags (message_hash, tag_id) VALUES (?, ?)")
                    .bind(&message.hash)
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DropsError::Database)?;
            }
            for media in &message.medias {
                sqlx::query(
                    "INSERT INTO medias (message_hash, url, media_type) VALUES (?, ?, ?)",
                )
                .bind(&message.hash)
                .bind(&media.url)
                .bind(&media.media_type)
                .execute(&mut *tx)
                .await
                .map_err(DropsError::Database)?;
            }
        }

        tx.commit().await.map_err(DropsError::Database)?;
        Ok(())
    }

    /// Soft-delete: only the owner's row matches, so the WHERE clause
    /// enforces ownership
    pub async fn hide_message(&self, sender: &str, hash: &str) -> DropsResult<()> {
        let result = sqlx::query("UPDATE messages SET hidden = 1 WHERE hash = ? AND sender = ?")
            .bind(hash)
            .bind(sender)
            .execute(&self.db)
            .await
            .map_err(DropsError::Database)?;

        if result.rows_affected() == 0 {
            return Err(DropsError::NotFound(format!(
                "Message not found for this sender: {}",
                hash
            )));
        }
        Ok(())
    }

    /// Feed/thread query
    ///
    /// Selects one page of matching non-hidden messages, then (when
    /// replies are requested) expands the page to its reply closure and
    /// reassembles the tree, returning only the original page rows with
    /// replies nested inside.
    pub async fn get_messages(
        &self,
        query: &MessageQuery,
        social: &SocialStore,
    ) -> DropsResult<Vec<StoredMessage>> {
        let follow_set = if query.only_following {
            match &query.sender {
                Some(sender) => {
                    let set = social.following_set(sender).await?;
                    if set.is_empty() {
                        return Ok(Vec::new());
                    }
                    Some(set)
                }
                None => {
                    return Err(DropsError::Validation(
                        "onlyFollowing requires a sender".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        let page_hashes = self.select_page(query, follow_set.as_deref()).await?;
        if page_hashes.is_empty() {
            return Ok(Vec::new());
        }

        if !query.include_replies {
            return self.load_full(&page_hashes).await;
        }

        let closure = self.reply_closure(&page_hashes).await?;
        let rows = self.load_full(&closure).await?;

        // hash -> node, plus parent -> children adjacency in feed order
        let mut nodes: HashMap<String, StoredMessage> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            if let Some(parent) = &row.in_reply_to {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(row.hash.clone());
            }
            nodes.insert(row.hash.clone(), row);
        }

        // Each page row gets its own tree; a reply selected into the
        // page itself shows up both top-level and nested in its parent
        let mut result = Vec::with_capacity(page_hashes.len());
        for hash in &page_hashes {
            let mut path = HashSet::new();
            if let Some(tree) = build_tree(hash, &nodes, &children, &mut path) {
                result.push(tree);
            }
        }
        Ok(result)
    }

    /// One page of matching hashes, composite order, strict cursor
    async fn select_page(
        &self,
        query: &MessageQuery,
        follow_set: Option<&[String]>,
    ) -> DropsResult<Vec<String>> {
        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            r#"
            SELECT m.hash FROM messages m
            LEFT JOIN categories c ON c.id = m.category_id
            WHERE m.hidden = 0
            "#,
        );

        if let (Some(sender), false) = (&query.sender, query.only_following) {
            qb.push(" AND m.sender = ");
            qb.push_bind(sender);
        }
        if query.only_parent_comments {
            qb.push(" AND m.in_reply_to IS NULL");
        }
        if let Some(category) = &query.category {
            qb.push(" AND c.name = ");
            qb.push_bind(category);
        }
        if let Some(hash) = &query.message_hash {
            qb.push(" AND m.hash = ");
            qb.push_bind(hash);
        }
        if let Some(origin) = &query.origin {
            qb.push(" AND m.origin LIKE ");
            qb.push_bind(format!("{}%", origin));
        }
        match (&query.before, &query.before_id) {
            (Some(before), Some(before_id)) => {
                qb.push(" AND (m.timestamp < ");
                qb.push_bind(before);
                qb.push(" OR (m.timestamp = ");
                qb.push_bind(before);
                qb.push(" AND m.hash < ");
                qb.push_bind(before_id);
                qb.push("))");
            }
            (Some(before), None) => {
                qb.push(" AND m.timestamp < ");
                qb.push_bind(before);
            }
            _ => {}
        }
        if let Some(follow_set) = follow_set {
            qb.push(" AND m.sender IN (");
            let mut separated = qb.separated(", ");
            for address in follow_set {
                separated.push_bind(address);
            }
            qb.push(")");
        }

        qb.push(" ORDER BY m.timestamp DESC, m.hash DESC LIMIT ");
        qb.push_bind(query.limit);

        let rows = qb
            .build()
            .fetch_all(&self.db)
            .await
            .map_err(DropsError::Database)?;

        rows.iter()
            .map(|row| row.try_get("hash").map_err(DropsError::Database))
            .collect()
    }

    /// Transitive reply closure of a seed set, breadth first
    ///
    /// Hidden rows never enter the frontier, so hiding a message prunes
    /// its whole subtree even when descendants are not hidden
    /// themselves.
    async fn reply_closure(&self, seeds: &[String]) -> DropsResult<Vec<String>> {
        let mut seen: HashSet<String> = seeds.iter().cloned().collect();
        let mut closure: Vec<String> = seeds.to_vec();
        let mut frontier: Vec<String> = seeds.to_vec();

        while !frontier.is_empty() {
            let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
                "SELECT hash FROM messages WHERE hidden = 0 AND in_reply_to IN (",
            );
            let mut separated = qb.separated(", ");
            for hash in &frontier {
                separated.push_bind(hash.clone());
            }
            qb.push(")");

            let rows = qb
                .build()
                .fetch_all(&self.db)
                .await
                .map_err(DropsError::Database)?;

            frontier = Vec::new();
            for row in rows {
                let hash: String = row.try_get("hash")?;
                if seen.insert(hash.clone()) {
                    closure.push(hash.clone());
                    frontier.push(hash);
                }
            }
        }

        Ok(closure)
    }

    /// Load full rows (all joins, no tree) for a hash set, in feed order
    async fn load_full(&self, hashes: &[String]) -> DropsResult<Vec<StoredMessage>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            r#"
            SELECT m.hash, m.sender, m.content, m.timestamp, m.in_reply_to,
                   m.hidden, m.origin, m.url, c.name AS category
            FROM messages m
            LEFT JOIN categories c ON c.id = m.category_id
            WHERE m.hash IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for hash in hashes {
            separated.push_bind(hash);
        }
        qb.push(") ORDER BY m.timestamp DESC, m.hash DESC");

        let rows = qb
            .build()
            .fetch_all(&self.db)
            .await
            .map_err(DropsError::Database)?;

        let mut messages = Vec::with_capacity(rows.len());
        let mut senders: HashSet<String> = HashSet::new();
        for row in rows {
            let sender: String = row.try_get("sender")?;
            senders.insert(sender.clone());
            messages.push(StoredMessage {
                hash: row.try_get("hash")?,
                sender,
                content: row.try_get("content")?,
                timestamp: row.try_get("timestamp")?,
                category: row.try_get("category")?,
                tags: Vec::new(),
                medias: Vec::new(),
                in_reply_to: row.try_get("in_reply_to")?,
                hidden: row.try_get("hidden")?,
                origin: row.try_get("origin")?,
                url: row.try_get("url")?,
                likes: 0,
                user: None,
                replies: Vec::new(),
            });
        }

        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            r#"
            SELECT mt.message_hash, t.name FROM message_tags mt
            JOIN tags t ON t.id = mt.tag_id
            WHERE mt.message_hash IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for hash in hashes {
            separated.push_bind(hash);
        }
        qb.push(")");
        for row in qb.build().fetch_all(&self.db).await.map_err(DropsError::Database)? {
            let hash: String = row.try_get("message_hash")?;
            tags.entry(hash).or_default().push(row.try_get("name")?);
        }

        let mut medias: HashMap<String, Vec<Media>> = HashMap::new();
        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT message_hash, url, media_type FROM medias WHERE message_hash IN (",
        );
        let mut separated = qb.separated(", ");
        for hash in hashes {
            separated.push_bind(hash);
        }
        qb.push(") ORDER BY id");
        for row in qb.build().fetch_all(&self.db).await.map_err(DropsError::Database)? {
            let hash: String = row.try_get("message_hash")?;
            medias.entry(hash).or_default().push(Media {
                url: row.try_get("url")?,
                media_type: row.try_get("media_type")?,
            });
        }

        let mut likes: HashMap<String, i64> = HashMap::new();
        let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
            r#"
            SELECT message_hash,
                   SUM(CASE WHEN is_like THEN 1 ELSE -1 END) AS score
            FROM votes WHERE message_hash IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for hash in hashes {
            separated.push_bind(hash);
        }
        qb.push(") GROUP BY message_hash");
        for row in qb.build().fetch_all(&self.db).await.map_err(DropsError::Database)? {
            let hash: String = row.try_get("message_hash")?;
            likes.insert(hash, row.try_get("score")?);
        }

        let users = UserStore::new(self.db.clone());
        let mut user_records = HashMap::new();
        for sender in senders {
            if let Some(record) = users.get_user(&sender).await? {
                user_records.insert(sender, record);
            }
        }

        for message in &mut messages {
            message.tags = tags.remove(&message.hash).unwrap_or_default();
            message.medias = medias.remove(&message.hash).unwrap_or_default();
            message.likes = likes.get(&message.hash).copied().unwrap_or(0);
            message.user = user_records.get(&message.sender).cloned();
        }

        Ok(messages)
    }
}

/// Clone a node with its children recursively attached; `path` guards
/// against a malformed reply cycle
fn build_tree(
    hash: &str,
    nodes: &HashMap<String, StoredMessage>,
    children: &HashMap<String, Vec<String>>,
    path: &mut HashSet<String>,
) -> Option<StoredMessage> {
    let mut node = nodes.get(hash)?.clone();
    if !path.insert(hash.to_string()) {
        return None;
    }
    if let Some(child_hashes) = children.get(hash) {
        for child in child_hashes {
            if let Some(subtree) = build_tree(child, nodes, children, path) {
                node.replies.push(subtree);
            }
        }
    }
    path.remove(hash);
    Some(node)
}
