use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aura_core::{AuraError, Result};

/// Small persistent state that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Free-form profile fields (name, city, ...).
    pub user_profile: BTreeMap<String, String>,
    pub short_term_summary: String,
    pub last_interaction: Option<DateTime<Utc>>,
}

/// Characters of the previous summary carried into the next one.
const PREVIOUS_SUMMARY_CHARS: usize = 50;

impl SessionState {
    /// Profile and last-topic block for the system prompt. Empty when
    /// there is nothing known yet.
    pub fn prompt_context(&self) -> String {
        let mut out = String::new();
        if !self.user_profile.is_empty() {
            out.push_str("\n\n[User profile]\n");
            for (key, value) in &self.user_profile {
                out.push_str(&format!("- {key}: {value}\n"));
            }
        }
        let summary = self.short_term_summary.trim();
        if !summary.is_empty() {
            out.push_str("\n\n[Last conversation]\n");
            out.push_str(summary);
            out.push('\n');
        }
        out
    }

    /// Replace the summary, keeping a short tail of the previous one.
    pub fn record_summary(&mut self, summary: &str) {
        let previous: String = self
            .short_term_summary
            .split(" | (previous: ")
            .next()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(PREVIOUS_SUMMARY_CHARS)
            .collect();
        self.short_term_summary = if previous.is_empty() {
            summary.trim().to_string()
        } else {
            format!("{} | (previous: {previous}...)", summary.trim())
        };
    }
}

/// Load/save collaborator for [`SessionState`].
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<SessionState>;
    fn save(&self, state: &SessionState) -> Result<()>;

    /// Refresh `last_interaction` to now.
    fn touch(&self) -> Result<SessionState> {
        let mut state = self.load()?;
        state.last_interaction = Some(Utc::now());
        self.save(&state)?;
        Ok(state)
    }
}

/// Session state kept in a JSON file. A missing file loads as the default state.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonSessionStore {
    fn load(&self) -> Result<SessionState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session file yet");
                return Ok(SessionState::default());
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(SessionState::default());
        }
        serde_json::from_str(&raw)
            .map_err(|e| AuraError::Session(format!("corrupt session file {}: {e}", self.path.display())))
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: Mutex<SessionState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<SessionState> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("session.json"));
        assert_eq!(store.load().unwrap(), SessionState::default());
    }

    #[test]
    fn test_json_roundtrip_and_touch() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("nested").join("session.json"));
        let mut state = SessionState::default();
        state.user_profile.insert("name".into(), "Rui".into());
        store.save(&state).unwrap();

        let touched = store.touch().unwrap();
        assert!(touched.last_interaction.is_some());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.user_profile["name"], "Rui");
        assert_eq!(loaded.last_interaction, touched.last_interaction);
    }

    #[test]
    fn test_corrupt_file_is_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonSessionStore::new(path).load().unwrap_err();
        assert!(matches!(err, AuraError::Session(_)));
    }

    #[test]
    fn test_prompt_context_lists_profile_and_summary() {
        assert_eq!(SessionState::default().prompt_context(), "");

        let mut state = SessionState::default();
        state.user_profile.insert("name".into(), "Rui".into());
        state.user_profile.insert("city".into(), "Lisbon".into());
        state.short_term_summary = "Talked about a trip to Porto.".into();
        let ctx = state.prompt_context();
        assert!(ctx.contains("[User profile]\n- city: Lisbon\n- name: Rui"));
        assert!(ctx.contains("[Last conversation]\nTalked about a trip to Porto."));
    }

    #[test]
    fn test_record_summary_keeps_short_tail_of_previous() {
        let mut state = SessionState::default();
        state.record_summary("Planned a trip to Porto.");
        assert_eq!(state.short_term_summary, "Planned a trip to Porto.");

        state.record_summary("Booked the train.");
        assert_eq!(
            state.short_term_summary,
            "Booked the train. | (previous: Planned a trip to Porto....)"
        );

        // Only the newest previous summary is carried, never the whole chain.
        state.record_summary("Packed.");
        assert_eq!(state.short_term_summary, "Packed. | (previous: Booked the train....)");
    }

    #[test]
    fn test_in_memory_touch() {
        let store = InMemorySessionStore::new();
        assert!(store.load().unwrap().last_interaction.is_none());
        store.touch().unwrap();
        assert!(store.load().unwrap().last_interaction.is_some());
    }
}
