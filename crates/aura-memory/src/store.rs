use aura_core::{AuraError, Result};
use aura_llm::EmbeddingProvider;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::record::*;
use crate::vector::{self, from_blob, to_blob};

/// Distance thresholds and ranking knobs for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySettings {
    /// New memory closer than this to an existing one is a duplicate.
    pub dedup_threshold: f32,
    /// New recipe whose solution is closer than this to an existing one is a duplicate.
    pub recipe_dedup_threshold: f32,
    pub search_threshold: f32,
    pub recipe_threshold: f32,
    pub importance_boost: f32,
    pub min_relevance: f32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.15,
            recipe_dedup_threshold: 0.15,
            search_threshold: 0.8,
            recipe_threshold: 0.6,
            importance_boost: 0.1,
            min_relevance: 0.5,
        }
    }
}

fn db_err(e: rusqlite::Error) -> AuraError {
    AuraError::Memory(e.to_string())
}

/// Memories and recipes, persisted in SQLite and searched in memory.
///
/// Shared as `Arc<MemoryStore>` between the orchestrator, the reflection
/// workers and the built-in memory tools. Dedup-then-insert is not atomic
/// across callers; two racing inserts of the same fact may both land.
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
    memories: RwLock<Vec<MemoryRecord>>,
    recipes: RwLock<Vec<RecipeRecord>>,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: MemorySettings,
}

impl MemoryStore {
    /// Open or create the memory database at the given path.
    pub fn open(
        path: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: MemorySettings,
    ) -> Result<Self> {
        info!(?path, embedder = embedder.name(), "opening memory store");

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                importance INTEGER NOT NULL DEFAULT 1,
                source TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recipes (
                id TEXT PRIMARY KEY,
                trigger TEXT NOT NULL,
                solution TEXT NOT NULL,
                importance INTEGER NOT NULL DEFAULT 1,
                source TEXT NOT NULL,
                meta TEXT NOT NULL DEFAULT '{}',
                trigger_embedding BLOB NOT NULL,
                solution_embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);
            CREATE INDEX IF NOT EXISTS idx_recipes_source ON recipes(source);
            ",
        )
        .map_err(db_err)?;

        let store = Self {
            db: Arc::new(Mutex::new(conn)),
            memories: RwLock::new(vec![]),
            recipes: RwLock::new(vec![]),
            embedder,
            settings,
        };

        let memories = store.load_memories()?;
        let recipes = store.load_recipes()?;
        if memories + recipes > 0 {
            info!(memories, recipes, "loaded memory store from SQLite");
        }
        Ok(store)
    }

    /// Open an in-memory database with default settings (for tests).
    pub fn open_in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::open(Path::new(":memory:"), embedder, MemorySettings::default())
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    fn load_memories(&self) -> Result<usize> {
        let rows: Vec<MemoryRecord> = {
            let db = self.db.lock();
            let mut stmt = db
                .prepare(
                    "SELECT id, content, category, importance, source, embedding, created_at
                     FROM memories ORDER BY created_at",
                )
                .map_err(db_err)?;
            let rows: Vec<MemoryRecord> = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter_map(|(id, content, category, importance, source, blob, created)| {
                Some(MemoryRecord {
                    id: Uuid::parse_str(&id).ok()?,
                    content,
                    category: category.parse().unwrap_or(MemoryCategory::General),
                    embedding: from_blob(&blob)?,
                    meta: MemoryMeta {
                        timestamp: parse_time(&created),
                        importance,
                        source,
                    },
                })
            })
            .collect();
            rows
        };
        let count = rows.len();
        *self.memories.write() = rows;
        Ok(count)
    }

    fn load_recipes(&self) -> Result<usize> {
        let rows: Vec<RecipeRecord> = {
            let db = self.db.lock();
            let mut stmt = db
                .prepare(
                    "SELECT id, trigger, solution, meta, trigger_embedding, solution_embedding
                     FROM recipes ORDER BY created_at",
                )
                .map_err(db_err)?;
            let rows: Vec<RecipeRecord> = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                ))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter_map(|(id, trigger, solution, meta, trig_blob, sol_blob)| {
                let meta = match serde_json::from_str::<RecipeMeta>(&meta) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(%id, error = %e, "skipping recipe with unreadable metadata");
                        return None;
                    }
                };
                Some(RecipeRecord {
                    id: Uuid::parse_str(&id).ok()?,
                    trigger,
                    solution,
                    trigger_embedding: from_blob(&trig_blob)?,
                    solution_embedding: from_blob(&sol_blob)?,
                    meta,
                })
            })
            .collect();
            rows
        };
        let count = rows.len();
        *self.recipes.write() = rows;
        Ok(count)
    }

    // ── Memories ───────────────────────────────────────────────

    /// Store a memory unless a near-duplicate already exists.
    pub async fn add_memory(
        &self,
        content: &str,
        category: MemoryCategory,
        meta: MemoryMeta,
    ) -> Result<AddOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AuraError::EmptyContent);
        }
        let embedding = self.embedder.embed_one(content).await?;

        if let Some((existing, distance)) =
            self.closest_memory(&embedding, self.settings.dedup_threshold)
        {
            debug!(%existing, distance, "memory is a near-duplicate, skipping");
            return Ok(AddOutcome::Duplicate(existing));
        }

        let record = MemoryRecord {
            id: Uuid::new_v4(),
            content: content.to_string(),
            category,
            embedding,
            meta: MemoryMeta {
                importance: clamp_importance(meta.importance),
                ..meta
            },
        };
        self.db
            .lock()
            .execute(
                "INSERT INTO memories (id, content, category, importance, source, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.content,
                    record.category.as_str(),
                    record.meta.importance,
                    record.meta.source,
                    to_blob(&record.embedding),
                    record.meta.timestamp.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        let id = record.id;
        info!(%id, category = %record.category, importance = record.meta.importance, "memory stored");
        self.memories.write().push(record);
        Ok(AddOutcome::Inserted(id))
    }

    fn closest_memory(&self, embedding: &[f32], threshold: f32) -> Option<(Uuid, f32)> {
        let memories = self.memories.read();
        vector::nearest(
            embedding,
            memories.iter().map(|m| m.embedding.as_slice()),
            1,
            threshold,
        )
        .first()
        .map(|(i, d)| (memories[*i].id, *d))
    }

    /// Up to `k` memories closer than `threshold` to `query`, nearest first.
    pub async fn search_memory(&self, query: &str, k: usize, threshold: f32) -> Result<Vec<MemoryHit>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(vec![]);
        }
        let q = self.embedder.embed_one(query).await?;
        let memories = self.memories.read();
        Ok(vector::nearest(&q, memories.iter().map(|m| m.embedding.as_slice()), k, threshold)
            .into_iter()
            .map(|(i, distance)| MemoryHit {
                record: memories[i].clone(),
                distance,
            })
            .collect())
    }

    /// Memories relevant to `query`, re-ranked by importance.
    ///
    /// Each candidate scores `similarity * (1 + boost * (importance - 1))`;
    /// candidates under `min_relevance` are dropped.
    pub async fn relevant_memories(&self, query: &str, k: usize) -> Result<Vec<(MemoryHit, f32)>> {
        let candidates = self
            .search_memory(query, k.saturating_mul(3), self.settings.search_threshold)
            .await?;
        Ok(crate::context::rank_by_importance(
            candidates,
            k,
            self.settings.importance_boost,
            self.settings.min_relevance,
        ))
    }

    /// Formatted memory block for the system prompt, or `""` if nothing is relevant.
    pub async fn get_memory_context(&self, query: &str, k: usize) -> Result<String> {
        let ranked = self.relevant_memories(query, k).await?;
        Ok(crate::context::format_memory_context(&ranked))
    }

    /// Replace a memory's content and re-embed it. Returns false if unknown.
    pub async fn update_memory(&self, id: Uuid, content: &str) -> Result<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AuraError::EmptyContent);
        }
        if !self.memories.read().iter().any(|m| m.id == id) {
            return Ok(false);
        }
        let embedding = self.embedder.embed_one(content).await?;
        self.db
            .lock()
            .execute(
                "UPDATE memories SET content = ?2, embedding = ?3 WHERE id = ?1",
                params![id.to_string(), content, to_blob(&embedding)],
            )
            .map_err(db_err)?;
        let mut memories = self.memories.write();
        match memories.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.content = content.to_string();
                m.embedding = embedding;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_memory(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .db
            .lock()
            .execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        self.memories.write().retain(|m| m.id != id);
        Ok(rows > 0)
    }

    /// Delete every memory whose content contains `keyword`, case-insensitively.
    /// Returns the removed records.
    pub fn forget_by_content(&self, keyword: &str) -> Result<Vec<MemoryRecord>> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }
        let doomed: Vec<MemoryRecord> = self
            .memories
            .read()
            .iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        for m in &doomed {
            self.delete_memory(m.id)?;
        }
        if !doomed.is_empty() {
            info!(keyword, removed = doomed.len(), "forgot memories by keyword");
        }
        Ok(doomed)
    }

    /// All memories, newest first.
    pub fn list_memories(&self) -> Vec<MemoryRecord> {
        let mut all = self.memories.read().clone();
        all.sort_by(|a, b| b.meta.timestamp.cmp(&a.meta.timestamp));
        all
    }

    pub fn clear_memories(&self) -> Result<usize> {
        let rows = self
            .db
            .lock()
            .execute("DELETE FROM memories", [])
            .map_err(db_err)?;
        self.memories.write().clear();
        warn!(removed = rows, "all memories cleared");
        Ok(rows)
    }

    // ── Recipes ────────────────────────────────────────────────

    /// Store a recipe unless one with a near-identical solution exists.
    pub async fn add_recipe(&self, trigger: &str, solution: &str, meta: RecipeMeta) -> Result<AddOutcome> {
        let (trigger, solution) = (trigger.trim(), solution.trim());
        if trigger.is_empty() || solution.is_empty() {
            return Err(AuraError::EmptyContent);
        }
        let mut vectors = self.embedder.embed(&[trigger, solution]).await?.into_iter();
        let (Some(trigger_embedding), Some(solution_embedding)) = (vectors.next(), vectors.next())
        else {
            return Err(AuraError::Embedding("expected two recipe embeddings".into()));
        };

        let duplicate = {
            let recipes = self.recipes.read();
            vector::nearest(
                &solution_embedding,
                recipes.iter().map(|r| r.solution_embedding.as_slice()),
                1,
                self.settings.recipe_dedup_threshold,
            )
            .first()
            .map(|(i, _)| recipes[*i].id)
        };
        if let Some(existing) = duplicate {
            debug!(%existing, "recipe solution already known, skipping");
            return Ok(AddOutcome::Duplicate(existing));
        }

        let record = RecipeRecord {
            id: Uuid::new_v4(),
            trigger: trigger.to_string(),
            solution: solution.to_string(),
            trigger_embedding,
            solution_embedding,
            meta: RecipeMeta {
                importance: clamp_importance(meta.importance),
                ..meta
            },
        };
        self.db
            .lock()
            .execute(
                "INSERT INTO recipes (id, trigger, solution, importance, source, meta,
                                      trigger_embedding, solution_embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    record.trigger,
                    record.solution,
                    record.meta.importance,
                    record.meta.source,
                    serde_json::to_string(&record.meta)?,
                    to_blob(&record.trigger_embedding),
                    to_blob(&record.solution_embedding),
                    record.meta.timestamp.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        let id = record.id;
        info!(%id, source = %record.meta.source, trigger = %record.trigger, "recipe stored");
        self.recipes.write().push(record);
        Ok(AddOutcome::Inserted(id))
    }

    /// Up to `k` recipes whose trigger is closer than `threshold` to `query`.
    pub async fn search_recipes(&self, query: &str, k: usize, threshold: f32) -> Result<Vec<RecipeHit>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(vec![]);
        }
        let q = self.embedder.embed_one(query).await?;
        let recipes = self.recipes.read();
        Ok(vector::nearest(
            &q,
            recipes.iter().map(|r| r.trigger_embedding.as_slice()),
            k,
            threshold,
        )
        .into_iter()
        .map(|(i, distance)| RecipeHit {
            record: recipes[i].clone(),
            distance,
        })
        .collect())
    }

    /// Recipes relevant to an upcoming task, using the configured recall threshold.
    pub async fn recall_recipe(&self, query: &str, k: usize) -> Result<Vec<RecipeHit>> {
        self.search_recipes(query, k, self.settings.recipe_threshold).await
    }

    /// "Read first" block to prepend to the user's message, if any recipe applies.
    pub async fn recipe_hint(&self, query: &str) -> Result<Option<String>> {
        let hits = self.recall_recipe(query, 3).await?;
        Ok(crate::context::format_recipe_hint(&hits))
    }

    pub fn delete_recipe(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .db
            .lock()
            .execute("DELETE FROM recipes WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        self.recipes.write().retain(|r| r.id != id);
        Ok(rows > 0)
    }

    /// All recipes, most important first, then newest.
    pub fn list_recipes(&self) -> Vec<RecipeRecord> {
        let mut all = self.recipes.read().clone();
        all.sort_by(|a, b| {
            b.meta
                .importance
                .cmp(&a.meta.importance)
                .then(b.meta.timestamp.cmp(&a.meta.timestamp))
        });
        all
    }

    /// True if some recipe trigger starts with `prefix`.
    pub fn has_recipe_with_trigger_prefix(&self, prefix: &str) -> bool {
        self.recipes.read().iter().any(|r| r.trigger.starts_with(prefix))
    }

    // ── Stats ──────────────────────────────────────────────────

    pub fn stats(&self) -> MemoryStats {
        let memories = self.memories.read();
        let recipes = self.recipes.read();
        let mut stats = MemoryStats {
            memories: memories.len(),
            recipes: recipes.len(),
            ..Default::default()
        };
        for m in memories.iter() {
            *stats.by_category.entry(m.category).or_default() += 1;
        }
        for r in recipes.iter() {
            match r.meta.source.as_str() {
                crate::seed::SEED_SOURCE => stats.seeded_recipes += 1,
                crate::seed::LEARNED_SOURCE => stats.learned_recipes += 1,
                _ => {}
            }
        }
        stats
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_llm::HashEmbedding;

    fn store() -> MemoryStore {
        MemoryStore::open_in_memory(Arc::new(HashEmbedding::new(256))).unwrap()
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let s = store();
        let err = s
            .add_memory("   ", MemoryCategory::Fact, MemoryMeta::new(3, "user"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuraError::EmptyContent));
        assert!(s.add_recipe("", "x", RecipeMeta::new(1, "user")).await.is_err());
    }

    #[tokio::test]
    async fn test_importance_is_clamped() {
        let s = store();
        let mut meta = MemoryMeta::new(3, "user");
        meta.importance = 9;
        s.add_memory("the cat is named Miso", MemoryCategory::Fact, meta)
            .await
            .unwrap();
        assert_eq!(s.list_memories()[0].meta.importance, 5);
    }

    #[tokio::test]
    async fn test_update_memory_reembeds() {
        let s = store();
        let id = s
            .add_memory("favourite colour is blue", MemoryCategory::Preference, MemoryMeta::new(2, "user"))
            .await
            .unwrap()
            .id();
        assert!(s.update_memory(id, "favourite colour is green").await.unwrap());
        let hits = s.search_memory("favourite colour is green", 1, 0.1).await.unwrap();
        assert_eq!(hits[0].record.id, id);
        assert!(!s.update_memory(Uuid::new_v4(), "nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_memories() {
        let s = store();
        s.add_memory("one fact", MemoryCategory::Fact, MemoryMeta::new(1, "user"))
            .await
            .unwrap();
        assert_eq!(s.clear_memories().unwrap(), 1);
        assert!(s.list_memories().is_empty());
    }

    #[test]
    fn test_parse_time_falls_back() {
        let t = parse_time("2024-05-01T10:00:00+00:00");
        assert_eq!(t.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        let _ = parse_time("garbage");
    }
}
