use std::path::PathBuf;

use clap::Parser;
use placement::{FeatureId, FeaturePath, Model};
use tracing::instrument;

use super::{OutputFormat, path_name, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Display the placement of a feature")]
pub struct Show {
    /// The model file
    file: PathBuf,

    /// Path of the feature, e.g. `pendulum/pivot/origin`
    feature: FeaturePath,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

/// Everything `show` reports about one feature.
#[derive(Debug)]
struct Details {
    path: String,
    kind: &'static str,
    required: String,
    placement: Option<String>,
    placement_type: Option<String>,
    owner: Option<String>,
    dependencies: Vec<String>,
    dependants: Vec<String>,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let report = super::load(&self.file)?;
        let model = &report.model;

        let Some(feature) = model
            .find(&self.feature)
            .and_then(|id| model.feature_id(id))
        else {
            eprintln!("Feature {} not found", self.feature);
            std::process::exit(1);
        };

        let details = Self::details(model, feature)?;
        match self.output {
            OutputFormat::Table => Self::output_table(&details),
            OutputFormat::Json => Self::output_json(&details)?,
        }
        Ok(())
    }

    fn details(model: &Model, feature: FeatureId) -> anyhow::Result<Details> {
        let handle = model.feature(feature)?;
        let name = |f: FeatureId| path_name(model, f);

        let placement = model.placement(feature).ok().and_then(|p| p.rep());
        let mut dependencies: Vec<_> = placement
            .map(|rep| rep.dependencies().into_iter().map(name).collect())
            .unwrap_or_default();
        dependencies.sort();
        let mut dependants: Vec<_> = model.dependants(feature).map(name).collect();
        dependants.sort();

        Ok(Details {
            path: name(feature),
            kind: handle.kind().type_name(),
            required: handle.required_placement_type().to_string(),
            placement: placement.map(|rep| rep.display_with(name).to_string()),
            placement_type: placement.map(|rep| rep.placement_type().to_string()),
            owner: model.slot_owner(feature).map(|owner| path_name(model, owner)),
            dependencies,
            dependants,
        })
    }

    fn output_table(details: &Details) {
        let none = || "-".dim();

        println!("{}", details.path.success());
        println!("  kind:         {}", details.kind);
        println!("  requires:     {}", details.required);
        match &details.placement {
            Some(placement) => println!("  placement:    {placement}"),
            None => println!("  placement:    {}", "unplaced".warning()),
        }
        println!(
            "  type:         {}",
            details.placement_type.clone().unwrap_or_else(none)
        );
        println!(
            "  slot owner:   {}",
            details.owner.clone().unwrap_or_else(none)
        );

        println!("  depends on:");
        if details.dependencies.is_empty() {
            println!("    {}", none());
        }
        for dependency in &details.dependencies {
            println!("    {dependency}");
        }

        println!("  used by:");
        if details.dependants.is_empty() {
            println!("    {}", none());
        }
        for dependant in &details.dependants {
            println!("    {dependant}");
        }
    }

    fn output_json(details: &Details) -> anyhow::Result<()> {
        use serde_json::json;

        let output = json!({
            "path": details.path,
            "kind": details.kind,
            "required_type": details.required,
            "placement": details.placement,
            "placement_type": details.placement_type,
            "slot_owner": details.owner,
            "dependencies": details.dependencies,
            "dependants": details.dependants,
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
[[subsystem]]
path = "p"

[[feature]]
path = "p/pivot"
kind = "frame"

[[feature]]
path = "p/tip"
kind = "station"

[[feature]]
path = "p/spare"
kind = "real"

[[placement]]
feature = "p/pivot"
value = { frame = { orientation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], origin = [0.0, 0.0, 1.0] } }

[[placement]]
feature = "p/tip"
on = "p/pivot"
"#;

    fn details(path: &str) -> Details {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("model.toml");
        std::fs::write(&file, MODEL).unwrap();
        let report = crate::cli::load(&file).expect("model file should build");
        let model = &report.model;

        let path: FeaturePath = path.parse().unwrap();
        let feature = model
            .find(&path)
            .and_then(|id| model.feature_id(id))
            .expect("feature should exist");
        Show::details(model, feature).unwrap()
    }

    #[test]
    fn details_of_a_station_placed_on_a_frame() {
        let details = details("p/tip");

        assert_eq!(details.path, "p/tip");
        assert_eq!(details.kind, "Station");
        assert_eq!(details.required, "station");
        assert_eq!(details.placement_type.as_deref(), Some("station"));
        assert!(details.placement.unwrap().contains("p/pivot/origin"));
        assert_eq!(details.owner.as_deref(), Some("p"));
        assert_eq!(details.dependencies, ["p/pivot/origin"]);
        assert!(details.dependants.is_empty());
    }

    #[test]
    fn details_of_a_derived_origin() {
        let details = details("p/pivot/origin");

        assert_eq!(details.owner.as_deref(), Some("p/pivot"));
        assert_eq!(details.dependencies, ["p/pivot"]);
        assert_eq!(details.dependants, ["p/tip"]);
    }

    #[test]
    fn details_of_an_unplaced_feature() {
        let details = details("p/spare");

        assert_eq!(details.kind, "RealParameter");
        assert_eq!(details.placement, None);
        assert_eq!(details.placement_type, None);
        assert_eq!(details.owner, None);
        assert!(details.dependencies.is_empty());
    }
}
