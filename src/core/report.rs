//! Human and JSON renderings of a job, its plan and an apply pass.
//!
//! Rendering is pure string building; the caller decides where it goes.

use std::{fmt::Write as _, io::IsTerminal, path::Path};

use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::cli::AppContext;
use crate::core::{
    apply::ApplyReport,
    plan::{Action, ActionCounts, Plan, PlanEntry},
};
use crate::infra::{config::JobDescriptor, paths::display_path};

const BLOCKS: [(Action, &str); 4] = [
    (Action::Add, "ADDED"),
    (Action::Update, "UPDATED"),
    (Action::Skip, "SKIPPED (already up-to-date)"),
    (Action::Exclude, "EXCLUDED (by pattern or pruned dir)"),
];

/// Text renderer; colour is a per-run decision
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Colour only when allowed and stdout is a terminal
    pub fn for_context(ctx: &AppContext) -> Self {
        Self::new(!ctx.no_color && std::io::stdout().is_terminal())
    }

    fn paint(&self, text: impl std::fmt::Display, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn action_style(action: Action) -> Style {
        match action {
            Action::Add => Style::new().green(),
            Action::Update => Style::new().yellow(),
            Action::Skip => Style::new().dimmed(),
            Action::Exclude => Style::new().magenta(),
        }
    }

    /// Roots and the four exclusion lists
    pub fn config_summary(&self, job: &JobDescriptor) -> String {
        let ex = &job.excludes;
        let mut out = String::new();
        let _ = writeln!(out, "Source: {}", display_path(&job.source_root).display());
        let _ = writeln!(out, "Dest  : {}", display_path(&job.dest_root).display());
        let _ = writeln!(out, "{}", self.paint("Excludes:", Style::new().bold()));
        let _ = writeln!(out, "  root_dirs     : {}", list_or_none(&ex.root_dirs));
        let _ = writeln!(out, "  recursive_dirs: {}", list_or_none(&ex.recursive_dirs));
        let _ = writeln!(out, "  specific_paths: {}", list_or_none(&ex.specific_paths));
        let _ = writeln!(out, "  file_patterns : {}", list_or_none(&ex.file_patterns));
        out
    }

    /// Grouped plan listing followed by the summary line
    pub fn plan(&self, plan: &Plan, compact: bool) -> String {
        let counts = plan.counts();
        let mut out = String::new();

        if compact {
            let _ = writeln!(out, "Source: {}", display_path(plan.source_root()).display());
            let _ = writeln!(out, "Dest  : {}", display_path(plan.dest_root()).display());
            let _ = writeln!(
                out,
                "Plan  : add {} | update {} | skip {} | exclude {}",
                counts.add, counts.update, counts.skip, counts.exclude
            );
            out.push('\n');
        }

        for (action, title) in BLOCKS {
            let rows: Vec<&PlanEntry> = plan.with_action(action).collect();
            let _ = writeln!(
                out,
                "{}",
                self.paint(format!("{title} ({})", rows.len()), Style::new().bold())
            );
            for entry in rows {
                if compact {
                    let _ = writeln!(
                        out,
                        "  - {} [{}]",
                        entry.relative_path.display(),
                        entry.reason
                    );
                } else {
                    self.verbose_row(&mut out, plan, entry);
                }
            }
            out.push('\n');
        }

        out.push_str(&self.summary_line(&counts));
        out.push('\n');
        out
    }

    fn verbose_row(&self, out: &mut String, plan: &Plan, entry: &PlanEntry) {
        let src = full_path(plan.source_root(), &entry.relative_path);
        let dst = full_path(plan.dest_root(), &entry.relative_path);
        let label = format!("{:7}", entry.action.as_str());
        let _ = writeln!(
            out,
            "  - {} {src}  →  {dst}  [{}]",
            self.paint(label, Self::action_style(entry.action)),
            entry.reason
        );
        if let Some(issue) = &entry.issue {
            let _ = writeln!(
                out,
                "      {} {}: {}",
                self.paint("!", Style::new().red().bold()),
                issue.kind,
                issue.message
            );
        }
    }

    pub fn summary_line(&self, counts: &ActionCounts) -> String {
        let errors = format!("errors {}", counts.errors);
        let errors = if counts.errors > 0 {
            self.paint(errors, Style::new().red().bold())
        } else {
            errors
        };
        format!(
            "Summary: total {} | add {} | update {} | skip {} | exclude {} | {errors}",
            counts.total, counts.add, counts.update, counts.skip, counts.exclude
        )
    }

    /// Outcome of an apply pass, one line per failure
    pub fn apply_result(&self, report: &ApplyReport) -> String {
        let mut out = String::new();
        let head = format!(
            "Apply complete: {} copied, {} failed",
            report.copied.len(),
            report.failures.len()
        );
        let style = if report.is_success() {
            Style::new().green()
        } else {
            Style::new().red()
        };
        let _ = writeln!(out, "{}", self.paint(head, style));
        for failure in &report.failures {
            let _ = writeln!(out, "  ! {}: {}", failure.relative_path.display(), failure.error);
        }
        out
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn full_path(root: &Path, relative: &Path) -> String {
    display_path(&root.join(relative)).display().to_string()
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    dry_run: bool,
    #[serde(flatten)]
    plan: &'a Plan,
    counts: ActionCounts,
    apply: Option<&'a ApplyReport>,
}

/// Single JSON document for `sync --json`
pub fn plan_json(plan: &Plan, apply: Option<&ApplyReport>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonDocument {
        dry_run: apply.is_none(),
        plan,
        counts: plan.counts(),
        apply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        error::{EntryIssue, IssueKind},
        exclude::ExclusionRules,
        plan::EntryKind,
    };
    use std::path::PathBuf;

    fn entry(rel: &str, kind: EntryKind, action: Action, reason: &str) -> PlanEntry {
        PlanEntry {
            relative_path: PathBuf::from(rel),
            kind,
            action,
            source_size: Some(1),
            source_mtime: None,
            reason: reason.to_string(),
            issue: None,
        }
    }

    fn sample_plan() -> Plan {
        let mut unreadable = entry("locked", EntryKind::Directory, Action::Exclude, "unreadable");
        unreadable.issue = Some(EntryIssue::new(IssueKind::Walk, "permission denied"));
        Plan::from_entries(
            PathBuf::from("/src"),
            PathBuf::from("/dst"),
            vec![
                entry("a.txt", EntryKind::File, Action::Add, "missing"),
                entry("b.txt", EntryKind::File, Action::Skip, "same size+mtime"),
                entry("c.txt", EntryKind::File, Action::Update, "size ≠, mtime ≠"),
                unreadable,
                entry("node_modules", EntryKind::Directory, Action::Exclude, "recursive_dir"),
            ],
        )
    }

    #[cfg(unix)]
    #[test]
    fn compact_rendering() {
        let text = Renderer::new(false).plan(&sample_plan(), true);
        insta::assert_snapshot!(text, @r"
        Source: /src
        Dest  : /dst
        Plan  : add 1 | update 1 | skip 1 | exclude 2

        ADDED (1)
          - a.txt [missing]

        UPDATED (1)
          - c.txt [size ≠, mtime ≠]

        SKIPPED (already up-to-date) (1)
          - b.txt [same size+mtime]

        EXCLUDED (by pattern or pruned dir) (2)
          - locked [unreadable]
          - node_modules [recursive_dir]

        Summary: total 5 | add 1 | update 1 | skip 1 | exclude 2 | errors 1
        ");
    }

    #[cfg(unix)]
    #[test]
    fn verbose_rows_show_both_sides_and_issues() {
        let text = Renderer::new(false).plan(&sample_plan(), false);
        assert!(text.contains("  - ADD     /src/a.txt  →  /dst/a.txt  [missing]"), "{text}");
        assert!(text.contains("      ! walk: permission denied"), "{text}");
        assert!(!text.starts_with("Source:"));
    }

    #[cfg(unix)]
    #[test]
    fn config_summary_lists_rules() {
        let job = JobDescriptor::new(
            "/srv/app",
            "/tmp/mirror",
            ExclusionRules {
                recursive_dirs: vec!["node_modules".into(), ".git".into()],
                ..ExclusionRules::default()
            },
        )
        .unwrap();
        let text = Renderer::new(false).config_summary(&job);
        assert!(text.starts_with("Source: /srv/app\nDest  : /tmp/mirror\n"), "{text}");
        assert!(text.contains("  root_dirs     : (none)"));
        assert!(text.contains("  recursive_dirs: node_modules, .git"));
    }

    #[test]
    fn json_document_carries_counts_and_entries() {
        let json = plan_json(&sample_plan(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["counts"]["exclude"], 2);
        assert_eq!(value["entries"][0]["action"], "ADD");
        assert_eq!(value["entries"][3]["issue"]["kind"], "walk");
        assert!(value["apply"].is_null());
    }

    #[test]
    fn apply_result_lists_failures() {
        use crate::core::{apply::ApplyFailure, error::{CopyStage, MirrorError}};

        let report = ApplyReport {
            copied: vec![PathBuf::from("a.txt")],
            failures: vec![ApplyFailure {
                relative_path: PathBuf::from("d.txt"),
                error: MirrorError::copy(
                    "/dst/d.txt",
                    CopyStage::Rename,
                    std::io::Error::other("is a directory"),
                ),
            }],
            bytes_copied: 3,
        };
        let text = Renderer::new(false).apply_result(&report);
        assert!(text.starts_with("Apply complete: 1 copied, 1 failed\n"));
        assert!(text.contains("  ! d.txt: copy failed for /dst/d.txt (rename)"), "{text}");
    }

    // APFS refuses such names outright.
    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn json_survives_non_utf8_file_names() -> anyhow::Result<()> {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        use crate::core::{apply::Applier, plan::Planner};

        let tmp = tempfile::TempDir::new()?;
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(&src)?;
        std::fs::write(src.join(OsStr::from_bytes(b"bad\xffname.txt")), "x")?;
        let job = JobDescriptor::new(
            src.to_str().unwrap(),
            dst.to_str().unwrap(),
            ExclusionRules::default(),
        )?;

        let plan = Planner::new(&job)?.plan()?;
        let dry = plan_json(&plan, None)?;
        assert!(dry.contains("bad\u{FFFD}name.txt"), "{dry}");

        let report = Applier::new(&job).apply(&plan);
        assert!(report.is_success(), "{:?}", report.failures);
        let value: serde_json::Value = serde_json::from_str(&plan_json(&plan, Some(&report))?)?;
        assert_eq!(value["entries"][0]["relative_path"], "bad\u{FFFD}name.txt");
        assert_eq!(value["apply"]["copied"][0], "bad\u{FFFD}name.txt");
        Ok(())
    }
}
