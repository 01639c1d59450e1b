//! Built-in recipes installed at startup.

use aura_core::Result;
use tracing::{debug, info};

use crate::record::RecipeMeta;
use crate::store::MemoryStore;

/// `source` of startup recipes.
pub const SEED_SOURCE: &str = "seed";
/// `source` of recipes distilled from slow turns.
pub const LEARNED_SOURCE: &str = "auto_learn";

/// Leading characters of a trigger used to recognise an installed seed.
const TRIGGER_PREFIX_CHARS: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct SeedRecipe {
    pub trigger: String,
    pub solution: String,
}

impl SeedRecipe {
    pub fn new(trigger: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            solution: solution.into(),
        }
    }

    fn prefix(&self) -> String {
        self.trigger.chars().take(TRIGGER_PREFIX_CHARS).collect()
    }
}

pub fn default_seeds() -> Vec<SeedRecipe> {
    vec![
        SeedRecipe::new(
            "user asks to open a website or search the web",
            "Call open_url with the address or search URL directly. Do not launch the browser application first.",
        ),
        SeedRecipe::new(
            "user asks to play a song or some music",
            "Use the music tool with the song name in one call. Do not open the player and search step by step.",
        ),
        SeedRecipe::new(
            "user asks what is on the screen",
            "Take one screenshot and describe it. Do not chain OCR, window listing and a second capture.",
        ),
        SeedRecipe::new(
            "user asks to find a file on the computer",
            "Search the home directory once with the file name pattern before asking the user for a path.",
        ),
    ]
}

impl MemoryStore {
    /// Install seeds whose trigger prefix is not already present.
    /// Safe to call on every startup. Returns how many were written.
    pub async fn seed_recipes(&self, seeds: &[SeedRecipe]) -> Result<usize> {
        let mut written = 0;
        for seed in seeds {
            if self.has_recipe_with_trigger_prefix(&seed.prefix()) {
                debug!(trigger = %seed.trigger, "seed already present");
                continue;
            }
            let outcome = self
                .add_recipe(&seed.trigger, &seed.solution, RecipeMeta::new(5, SEED_SOURCE))
                .await?;
            if outcome.is_inserted() {
                written += 1;
            }
        }
        if written > 0 {
            info!(written, "installed seed recipes");
        }
        Ok(written)
    }
}
