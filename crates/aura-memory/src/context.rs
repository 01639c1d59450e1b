//! Ranking and prompt formatting for recalled memories and recipes.

use crate::record::{MemoryHit, RecipeHit};

/// Re-rank search hits by `similarity * (1 + boost * (importance - 1))`,
/// drop anything under `min_relevance`, keep the best `k`.
pub fn rank_by_importance(
    hits: Vec<MemoryHit>,
    k: usize,
    boost: f32,
    min_relevance: f32,
) -> Vec<(MemoryHit, f32)> {
    let mut scored: Vec<(MemoryHit, f32)> = hits
        .into_iter()
        .map(|hit| {
            let weight = 1.0 + boost * (f32::from(hit.record.meta.importance) - 1.0);
            let score = hit.similarity() * weight;
            (hit, score)
        })
        .filter(|(_, score)| *score >= min_relevance)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

pub fn format_memory_context(ranked: &[(MemoryHit, f32)]) -> String {
    if ranked.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = ranked
        .iter()
        .map(|(hit, _)| format!("- [{}] {}", hit.record.category, hit.record.content))
        .collect();
    format!(
        "\n[Relevant memories]\n{}\n(Use these to inform your answer. Do not recite them mechanically.)\n",
        lines.join("\n")
    )
}

/// Block prepended to the user's message when past lessons apply.
pub fn format_recipe_hint(hits: &[RecipeHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let mut out = String::from("[Lessons from past tasks, read first]\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. When: {}\n   Do: {} (relevance {:.0}%)\n",
            i + 1,
            hit.record.trigger,
            hit.record.solution,
            hit.relevance() * 100.0
        ));
    }
    Some(out)
}

/// Listing used by the `recall_recipe` tool.
pub fn format_recipe_list(hits: &[RecipeHit]) -> String {
    if hits.is_empty() {
        return "No matching recipes.".into();
    }
    let mut lines = vec!["Found these recipes:".to_string()];
    for hit in hits {
        lines.push(format!(
            "  • {} → {} (relevance {:.0}%)",
            hit.record.trigger,
            hit.record.solution,
            hit.relevance() * 100.0
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::*;
    use uuid::Uuid;

    fn hit(content: &str, importance: u8, distance: f32) -> MemoryHit {
        MemoryHit {
            record: MemoryRecord {
                id: Uuid::new_v4(),
                content: content.into(),
                category: MemoryCategory::Preference,
                embedding: vec![],
                meta: MemoryMeta::new(importance, "test"),
            },
            distance,
        }
    }

    #[test]
    fn test_importance_outranks_raw_similarity() {
        let ranked = rank_by_importance(
            vec![hit("low", 1, 0.35), hit("high", 5, 0.45)],
            5,
            0.1,
            0.5,
        );
        assert_eq!(ranked[0].0.record.content, "high");
        assert!((ranked[0].1 - 0.77).abs() < 1e-4);
        assert!((ranked[1].1 - 0.65).abs() < 1e-4);
    }

    #[test]
    fn test_min_relevance_filters() {
        let ranked = rank_by_importance(vec![hit("weak", 1, 0.6)], 5, 0.1, 0.5);
        assert!(ranked.is_empty());
        assert_eq!(format_memory_context(&ranked), "");
    }

    #[test]
    fn test_memory_context_format() {
        let ranked = rank_by_importance(vec![hit("likes tea", 3, 0.1)], 5, 0.1, 0.5);
        let ctx = format_memory_context(&ranked);
        assert!(ctx.contains("- [preference] likes tea"));
        assert!(ctx.contains("Do not recite"));
    }

    #[test]
    fn test_recipe_hint_none_when_empty() {
        assert!(format_recipe_hint(&[]).is_none());
        assert_eq!(format_recipe_list(&[]), "No matching recipes.");
    }
}
