//! Prompt sequence reconstruction.
//!
//! Stored history is a flat append log where tool turns point back at the
//! invocation that produced them by id. Backends reject a tool result with
//! no invocation immediately before it, so the prompt is rebuilt by scanning
//! forward from each tool-calling assistant turn and matching ids.

use crate::turn::{Turn, TurnRole};
use std::collections::HashSet;

/// Default number of recent turns fed to the backend.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

/// Returns the last `n` turns of `history`.
#[must_use]
pub fn recent_window(history: &[Turn], n: usize) -> &[Turn] {
    &history[history.len().saturating_sub(n)..]
}

/// Builds a well-formed prompt sequence from a window of turns.
///
/// - User turns and assistant turns without invocations pass through.
/// - An assistant turn with invocations is followed by the tool turns in the
///   run immediately after it whose `tool_call_id` matches one of its
///   invocations, each id at most once, in their original order. Its
///   invocation list is narrowed to the matched ids. If nothing matched,
///   the turn is kept as plain text when it has content and dropped
///   otherwise.
/// - Every other tool turn is dropped.
#[must_use]
pub fn build_prompt_sequence(window: &[Turn]) -> Vec<Turn> {
    let mut sequence = Vec::with_capacity(window.len());

    for (index, turn) in window.iter().enumerate() {
        match turn {
            Turn::User { .. } => sequence.push(turn.clone()),
            Turn::Assistant { .. } if !turn.has_tool_invocations() => sequence.push(turn.clone()),
            Turn::Assistant {
                content,
                timestamp,
                tool_invocations,
            } => {
                let wanted: HashSet<&str> =
                    tool_invocations.iter().map(|inv| inv.id.as_str()).collect();
                let mut matched: HashSet<&str> = HashSet::new();
                let mut results = Vec::new();

                for follower in window[index + 1..]
                    .iter()
                    .take_while(|t| t.role() == TurnRole::Tool)
                {
                    if let Some(id) = follower.tool_call_id()
                        && wanted.contains(id)
                        && matched.insert(id)
                    {
                        results.push(follower.clone());
                    }
                }

                if results.is_empty() {
                    if !content.trim().is_empty() {
                        sequence.push(Turn::Assistant {
                            content: content.clone(),
                            timestamp: *timestamp,
                            tool_invocations: Vec::new(),
                        });
                    }
                    continue;
                }

                sequence.push(Turn::Assistant {
                    content: content.clone(),
                    timestamp: *timestamp,
                    tool_invocations: tool_invocations
                        .iter()
                        .filter(|inv| matched.contains(inv.id.as_str()))
                        .cloned()
                        .collect(),
                });
                sequence.extend(results);
            }
            // Reachable tool turns were emitted with their assistant turn.
            Turn::Tool { .. } => {}
        }
    }

    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::ToolInvocation;

    fn call(id: &str) -> ToolInvocation {
        ToolInvocation::new(id, "derivar_area", r#"{"area":"cobranzas"}"#)
    }

    fn ids(sequence: &[Turn]) -> Vec<String> {
        sequence
            .iter()
            .map(|t| match t.tool_call_id() {
                Some(id) => format!("tool:{id}"),
                None => format!("{}:{}", t.role(), t.content()),
            })
            .collect()
    }

    #[test]
    fn window_takes_last_turns() {
        let history: Vec<Turn> = ["a", "b", "c"].into_iter().map(Turn::user).collect();
        assert_eq!(recent_window(&history, 2).len(), 2);
        assert_eq!(recent_window(&history, 2)[0].content(), "b");
        assert_eq!(recent_window(&history, 10).len(), 3);
        assert!(recent_window(&history, 0).is_empty());
    }

    #[test]
    fn plain_turns_pass_through() {
        let window = vec![Turn::user("hola"), Turn::assistant("buenas")];
        assert_eq!(build_prompt_sequence(&window), window);
    }

    #[test]
    fn matched_results_keep_relative_order_and_orphans_drop() {
        let window = vec![
            Turn::assistant_with_tools("", vec![call("A"), call("B")]),
            Turn::tool("B", "resultado B"),
            Turn::tool("A", "resultado A"),
            Turn::tool("C", "huerfano"),
        ];

        let sequence = build_prompt_sequence(&window);

        assert_eq!(ids(&sequence), vec!["assistant:", "tool:B", "tool:A"]);
        assert_eq!(sequence[0].tool_invocations().len(), 2);
    }

    #[test]
    fn scan_stops_at_first_non_tool_turn() {
        let window = vec![
            Turn::assistant_with_tools("", vec![call("A"), call("B")]),
            Turn::tool("A", "resultado A"),
            Turn::user("sigo aqui"),
            Turn::tool("B", "tarde"),
        ];

        let sequence = build_prompt_sequence(&window);

        assert_eq!(ids(&sequence), vec!["assistant:", "tool:A", "user:sigo aqui"]);
        let kept: Vec<_> = sequence[0]
            .tool_invocations()
            .iter()
            .map(|inv| inv.id.as_str())
            .collect();
        assert_eq!(kept, vec!["A"]);
    }

    #[test]
    fn leading_orphan_tool_turn_is_dropped() {
        // The invoking assistant turn fell outside the window.
        let window = vec![Turn::tool("A", "resultado"), Turn::assistant("listo")];
        assert_eq!(ids(&build_prompt_sequence(&window)), vec!["assistant:listo"]);
    }

    #[test]
    fn unanswered_invocation_is_dropped_or_kept_as_text() {
        let window = vec![
            Turn::user("hola"),
            Turn::assistant_with_tools("", vec![call("A")]),
            Turn::assistant_with_tools("te derivo", vec![call("B")]),
        ];

        let sequence = build_prompt_sequence(&window);

        assert_eq!(ids(&sequence), vec!["user:hola", "assistant:te derivo"]);
        assert!(!sequence[1].has_tool_invocations());
    }

    #[test]
    fn duplicate_result_ids_are_kept_once() {
        let window = vec![
            Turn::assistant_with_tools("", vec![call("A")]),
            Turn::tool("A", "primero"),
            Turn::tool("A", "segundo"),
        ];
        let sequence = build_prompt_sequence(&window);
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence[1].content(), "primero");
    }
}
