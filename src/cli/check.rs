use std::path::PathBuf;

use clap::Parser;
use placement::{BuildReport, FeatureId};
use tracing::instrument;

use super::{OutputFormat, features_by_path, path_name, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Load a model file and report placement issues")]
pub struct Check {
    /// The model file to check
    file: PathBuf,

    /// Treat unplaced features as issues
    #[arg(long)]
    require_placed: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Default)]
struct CheckResult {
    placed: Vec<String>,
    rejected: Vec<RejectedIssue>,
    cycles: Vec<Vec<String>>,
    unplaced: Vec<String>,
}

#[derive(Debug)]
struct RejectedIssue {
    feature: String,
    reason: String,
}

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let report = super::load(&self.file)?;
        let result = Self::collect(&report);

        match self.output {
            OutputFormat::Table => self.output_table(&result),
            OutputFormat::Json => self.output_json(&result)?,
        }

        if self.count_issues(&result) > 0 {
            std::process::exit(2);
        }
        Ok(())
    }

    fn collect(report: &BuildReport) -> CheckResult {
        let model = &report.model;
        let mut result = CheckResult::default();

        for (path, feature) in features_by_path(model) {
            if model.has_placement(feature) {
                result.placed.push(path);
            } else {
                result.unplaced.push(path);
            }
        }

        result.rejected = report
            .rejected
            .iter()
            .map(|rejected| RejectedIssue {
                feature: rejected.feature.to_string(),
                reason: rejected.error.to_string(),
            })
            .collect();

        result.cycles = model
            .cycles()
            .into_iter()
            .map(|cycle| {
                let mut paths: Vec<_> = cycle
                    .into_iter()
                    .map(|feature: FeatureId| path_name(model, feature))
                    .collect();
                paths.sort();
                paths
            })
            .collect();

        result
    }

    fn count_issues(&self, result: &CheckResult) -> usize {
        let unplaced = if self.require_placed {
            result.unplaced.len()
        } else {
            0
        };
        result.rejected.len() + result.cycles.len() + unplaced
    }

    const fn status(issues: usize) -> &'static str {
        if issues == 0 { "consistent" } else { "issues_found" }
    }

    fn output_table(&self, result: &CheckResult) {
        if self.quiet {
            return;
        }

        println!("Checking {}...\n", self.file.display());

        println!("✓ Placed:     {} features", result.placed.len());

        if result.rejected.is_empty() {
            println!("✓ Rejected:   no placements refused");
        } else {
            println!(
                "{}",
                format!("✗ Rejected:   {} placements refused", result.rejected.len()).error()
            );
            for issue in &result.rejected {
                println!("    {}: {}", issue.feature, issue.reason.dim());
            }
        }

        if result.cycles.is_empty() {
            println!("✓ Cycles:     none");
        } else {
            println!(
                "{}",
                format!("✗ Cycles:     {} found", result.cycles.len()).error()
            );
            for cycle in &result.cycles {
                println!("    {}", cycle.join(" ↔ "));
            }
        }

        if result.unplaced.is_empty() {
            println!("✓ Unplaced:   none");
        } else {
            let line = format!("! Unplaced:   {} features", result.unplaced.len());
            if self.require_placed {
                println!("{}", line.error());
            } else {
                println!("{}", line.warning());
            }
            for path in &result.unplaced {
                println!("    {}", path.dim());
            }
        }

        let total = self.count_issues(result);
        if total == 0 {
            println!("\n{}", "Model is consistent (0 issues)".success());
        } else {
            println!("\n{}", format!("Summary: {total} issues found").warning());
        }
    }

    fn output_json(&self, result: &CheckResult) -> anyhow::Result<()> {
        use serde_json::json;

        let rejected: Vec<_> = result
            .rejected
            .iter()
            .map(|issue| {
                json!({
                    "feature": issue.feature,
                    "reason": issue.reason,
                })
            })
            .collect();

        let output = json!({
            "status": Self::status(self.count_issues(result)),
            "placed": result.placed,
            "rejected": rejected,
            "cycles": result.cycles,
            "unplaced": result.unplaced,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const MODEL: &str = r#"
[config]
_version = "1"
cycle_check = "deferred"

[[subsystem]]
path = "m"

[[feature]]
path = "m/a"
kind = "station"

[[feature]]
path = "m/b"
kind = "station"

[[feature]]
path = "m/c"
kind = "direction"

[[feature]]
path = "m/x"
kind = "vec3"

[[feature]]
path = "m/y"
kind = "vec3"

[[placement]]
feature = "m/a"
value = { station = [0.0, 0.0, 0.0] }

[[placement]]
feature = "m/c"
value = { real = 2.0 }

[[placement]]
feature = "m/x"
value = { feature = { path = "m/y" } }

[[placement]]
feature = "m/y"
value = { feature = { path = "m/x" } }
"#;

    fn check(file: PathBuf, require_placed: bool) -> Check {
        Check {
            file,
            require_placed,
            output: OutputFormat::Json,
            quiet: true,
        }
    }

    fn collect(contents: &str) -> CheckResult {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("model.toml");
        std::fs::write(&path, contents).unwrap();
        let report = crate::cli::load(&path).expect("model file should build");
        Check::collect(&report)
    }

    #[test]
    fn collect_sorts_features_into_issues() {
        let result = collect(MODEL);

        assert_eq!(result.placed, ["m/a", "m/x", "m/y"]);
        assert_eq!(result.unplaced, ["m/b", "m/c"]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].feature, "m/c");
        assert!(result.rejected[0].reason.contains("Direction requires direction"));
        assert_eq!(result.cycles, [["m/x", "m/y"]]);
    }

    #[test]
    fn unplaced_features_count_only_when_required() {
        let result = collect(MODEL);
        let path = PathBuf::from("model.toml");

        assert_eq!(check(path.clone(), false).count_issues(&result), 2);
        assert_eq!(check(path, true).count_issues(&result), 4);
    }

    #[test]
    fn status_follows_the_issue_count() {
        let unplaced_only = "[[subsystem]]\npath = \"m\"\n\n[[feature]]\npath = \"m/a\"\nkind = \"station\"\n";
        let result = collect(unplaced_only);
        let path = PathBuf::from("model.toml");

        let lenient = check(path.clone(), false);
        assert_eq!(Check::status(lenient.count_issues(&result)), "consistent");
        let strict = check(path, true);
        assert_eq!(Check::status(strict.count_issues(&result)), "issues_found");
    }
}
