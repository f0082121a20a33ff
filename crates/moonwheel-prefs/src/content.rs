use chrono::Utc;
use rand::Rng;
use rusqlite::params;
use tracing::{info, instrument};

use crate::db::{lock, SharedConnection};
use crate::error::{PrefsError, Result};

/// Longest submission accepted, in characters.
pub const MAX_SUBMISSION_CHARS: usize = 500;

const SEED_QUOTES: &[&str] = &[
    "\u{1f33f} May the Wheel of the Year turn in your favor.",
    "\u{1f315} Reflect, release, and renew under the Moon's light.",
    "\u{2728} Blessed be, traveler of the mystical paths.",
    "\u{1f525} May your rituals be fruitful and your intentions clear.",
    "\u{1f331} Growth is guided by the cycles of the Earth and Moon.",
];

const SEED_PROMPTS: &[&str] = &[
    "What are three things you are grateful for today?",
    "Reflect on a recent challenge and what you learned.",
    "What intention do you want to set for today?",
];

/// Which pool a piece of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Quote,
    Prompt,
}

impl PoolKind {
    fn table(self) -> &'static str {
        match self {
            PoolKind::Quote => "quotes",
            PoolKind::Prompt => "prompts",
        }
    }

    fn seeds(self) -> &'static [&'static str] {
        match self {
            PoolKind::Quote => SEED_QUOTES,
            PoolKind::Prompt => SEED_PROMPTS,
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolKind::Quote => write!(f, "quote"),
            PoolKind::Prompt => write!(f, "prompt"),
        }
    }
}

/// Built-in seeds plus community submissions, drawn from uniformly.
///
/// Seeds are never stored, so the pool is non-empty on a fresh database.
#[derive(Clone)]
pub struct ContentPool {
    db: SharedConnection,
}

impl ContentPool {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Append a submission and return its row id.
    #[instrument(skip(self, text), fields(kind = %kind))]
    pub fn submit(&self, kind: PoolKind, text: &str, submitted_by: u64) -> Result<i64> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PrefsError::InvalidField {
                field: "text",
                reason: "must not be empty".into(),
            });
        }
        let chars = text.chars().count();
        if chars > MAX_SUBMISSION_CHARS {
            return Err(PrefsError::InvalidField {
                field: "text",
                reason: format!("{} characters (max {})", chars, MAX_SUBMISSION_CHARS),
            });
        }

        let conn = lock(&self.db)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (text, submitted_by, created_at) VALUES (?1, ?2, ?3)",
                kind.table()
            ),
            params![text, submitted_by, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, submitted_by, "{} submitted", kind);
        Ok(id)
    }

    /// Number of entries a draw can pick from, seeds included.
    pub fn len(&self, kind: PoolKind) -> Result<usize> {
        Ok(kind.seeds().len() + self.submitted_count(kind)?)
    }

    /// Uniformly random entry using the thread-local RNG.
    pub fn random(&self, kind: PoolKind) -> Result<String> {
        self.random_with(kind, &mut rand::thread_rng())
    }

    /// Uniformly random entry; every seed and every submission has the same
    /// probability.
    pub fn random_with<R: Rng + ?Sized>(&self, kind: PoolKind, rng: &mut R) -> Result<String> {
        let seeds = kind.seeds();
        let submitted = self.submitted_count(kind)?;
        let pick = rng.gen_range(0..seeds.len() + submitted);
        if pick < seeds.len() {
            return Ok(seeds[pick].to_string());
        }

        let conn = lock(&self.db)?;
        let text = conn.query_row(
            &format!(
                "SELECT text FROM {} ORDER BY id LIMIT 1 OFFSET ?1",
                kind.table()
            ),
            params![(pick - seeds.len()) as i64],
            |row| row.get::<_, String>(0),
        )?;
        Ok(text)
    }

    pub fn add_quote(&self, text: &str, submitted_by: u64) -> Result<i64> {
        self.submit(PoolKind::Quote, text, submitted_by)
    }

    pub fn add_prompt(&self, text: &str, submitted_by: u64) -> Result<i64> {
        self.submit(PoolKind::Prompt, text, submitted_by)
    }

    pub fn random_quote(&self) -> Result<String> {
        self.random(PoolKind::Quote)
    }

    pub fn random_prompt(&self) -> Result<String> {
        self.random(PoolKind::Prompt)
    }

    /// (quotes, prompts) available to draw from, seeds included.
    pub fn counts(&self) -> Result<(usize, usize)> {
        Ok((self.len(PoolKind::Quote)?, self.len(PoolKind::Prompt)?))
    }

    fn submitted_count(&self, kind: PoolKind) -> Result<usize> {
        let conn = lock(&self.db)?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_shared;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rusqlite::Connection;
    use std::collections::HashMap;

    fn pool() -> ContentPool {
        ContentPool::new(open_shared(Connection::open_in_memory().unwrap()).unwrap())
    }

    #[test]
    fn fresh_pool_serves_seeds() {
        let pool = pool();
        assert_eq!(pool.len(PoolKind::Quote).unwrap(), SEED_QUOTES.len());
        let quote = pool.random(PoolKind::Quote).unwrap();
        assert!(SEED_QUOTES.contains(&quote.as_str()));
        let prompt = pool.random(PoolKind::Prompt).unwrap();
        assert!(SEED_PROMPTS.contains(&prompt.as_str()));
    }

    #[test]
    fn submissions_join_the_pool() {
        let pool = pool();
        pool.submit(PoolKind::Prompt, "  What did the moon teach you?  ", 11)
            .unwrap();
        assert_eq!(pool.len(PoolKind::Prompt).unwrap(), SEED_PROMPTS.len() + 1);
        let stored: String = lock(&pool.db)
            .unwrap()
            .query_row("SELECT text FROM prompts ORDER BY id DESC LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "What did the moon teach you?");
        // Quotes are a separate pool.
        assert_eq!(pool.len(PoolKind::Quote).unwrap(), SEED_QUOTES.len());
    }

    #[test]
    fn blank_and_oversized_submissions_are_rejected() {
        let pool = pool();
        assert!(pool.submit(PoolKind::Quote, "   ", 1).is_err());
        let long = "x".repeat(MAX_SUBMISSION_CHARS + 1);
        assert!(pool.submit(PoolKind::Quote, &long, 1).is_err());
        let exact = "y".repeat(MAX_SUBMISSION_CHARS);
        assert!(pool.submit(PoolKind::Quote, &exact, 1).is_ok());
    }

    #[test]
    fn draws_cover_every_entry() {
        let pool = pool();
        pool.submit(PoolKind::Prompt, "first", 1).unwrap();
        pool.submit(PoolKind::Prompt, "second", 2).unwrap();
        let total = pool.len(PoolKind::Prompt).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..2_000 {
            *counts
                .entry(pool.random_with(PoolKind::Prompt, &mut rng).unwrap())
                .or_default() += 1;
        }
        assert_eq!(counts.len(), total);
        // Each of 5 entries expects 400 draws.
        assert!(counts.values().all(|&n| (250..=550).contains(&n)), "{counts:?}");
    }
}
