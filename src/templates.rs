//! Per-slot template expansion.
//!
//! Each configured `(source, target)` pair reads a text file from
//! `.grove/templates/` and writes it into the slot with two literal
//! placeholders substituted. Unknown placeholders pass through verbatim —
//! the target file may well have its own `{{ … }}` syntax.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::TemplateRule;
use crate::styling::warning_message;
use crate::utils::atomic_write;

pub const WORKTREE_DIR_VAR: &str = "{{WORKTREE_DIR}}";
pub const BRANCH_NAME_VAR: &str = "{{BRANCH_NAME}}";

/// Render one template source for a slot.
pub fn render(source: &str, slot_name: &str, branch: Option<&str>) -> String {
    source
        .replace(WORKTREE_DIR_VAR, slot_name)
        .replace(BRANCH_NAME_VAR, branch.unwrap_or(""))
}

/// Expand every configured template into `slot_dir`, overwriting
/// unconditionally. A missing source warns and is skipped; it never fails
/// the surrounding operation.
pub fn expand_all(
    templates_dir: &Path,
    rules: &[TemplateRule],
    slot_dir: &Path,
    slot_name: &str,
    branch: Option<&str>,
) -> Result<()> {
    for rule in rules {
        let source_path = templates_dir.join(&rule.source);
        let source = match std::fs::read_to_string(&source_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "{}",
                    warning_message(format!(
                        "Template source {} is missing; skipping",
                        source_path.display()
                    ))
                );
                continue;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", source_path.display()));
            }
        };

        let target = slot_dir.join(&rule.target);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        atomic_write(&target, &render(&source, slot_name, branch))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateRule;

    #[test]
    fn substitutes_both_placeholders() {
        let rendered = render(
            "dir={{WORKTREE_DIR}} branch={{BRANCH_NAME}}",
            "amber-fox-glen",
            Some("main"),
        );
        assert_eq!(rendered, "dir=amber-fox-glen branch=main");
    }

    #[test]
    fn vacant_slot_renders_empty_branch() {
        assert_eq!(render("b={{BRANCH_NAME}}.", "s", None), "b=.");
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        assert_eq!(
            render("{{UNKNOWN}} {{WORKTREE_DIR}}", "oak-elm-fig", None),
            "{{UNKNOWN}} oak-elm-fig"
        );
    }

    #[test]
    fn expands_into_nested_target_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let slot = dir.path().join("slot");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(&slot).unwrap();
        std::fs::write(templates.join("envrc"), "export WT={{WORKTREE_DIR}}\n").unwrap();

        let rules = vec![TemplateRule {
            source: "envrc".to_string(),
            target: "nested/.envrc".to_string(),
        }];

        expand_all(&templates, &rules, &slot, "oak-elm-fig", Some("dev")).unwrap();
        let target = slot.join("nested/.envrc");
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "export WT=oak-elm-fig\n"
        );

        // Re-expansion overwrites whatever is there
        std::fs::write(&target, "stale").unwrap();
        expand_all(&templates, &rules, &slot, "oak-elm-fig", Some("dev")).unwrap();
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "export WT=oak-elm-fig\n"
        );
    }

    #[test]
    fn missing_source_warns_but_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let slot = dir.path().join("slot");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(&slot).unwrap();

        let rules = vec![TemplateRule {
            source: "nope".to_string(),
            target: "out".to_string(),
        }];
        expand_all(&templates, &rules, &slot, "s", None).unwrap();
        assert!(!slot.join("out").exists());
    }
}
