//! `qube.yml` launch manifests.
//!
//! The manifest mirrors the CLI's `run` flags. `cmd` may be a scalar or a
//! list (joined with ` && `); `environment` may be a map, a scalar
//! `KEY=VALUE`, or a list of them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// A parsed `qube.yml`.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// The single container section.
    pub container: ContainerSection,
}

/// The `container:` block of a manifest.
#[derive(Debug, Deserialize)]
pub struct ContainerSection {
    /// Image identifier `user:image:version`.
    pub system: String,
    /// Advisory port list.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Shell command, scalar or list.
    pub cmd: CmdValue,
    /// Network isolation flag.
    #[serde(default)]
    pub isolated: bool,
    /// Workload environment in any accepted shape.
    #[serde(default)]
    pub environment: EnvValue,
    /// Bind mounts.
    #[serde(default)]
    pub volumes: Vec<VolumeEntry>,
    /// Verbose launch reporting.
    #[serde(default)]
    pub debug: bool,
}

/// Scalar-or-list command value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CmdValue {
    /// One shell string.
    Single(String),
    /// Steps joined with ` && ` at launch.
    List(Vec<String>),
}

impl CmdValue {
    /// Joins the command into the single shell string the runtime executes.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Single(cmd) => cmd.clone(),
            Self::List(steps) => steps.join(" && "),
        }
    }
}

/// Map, scalar, or list environment value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// `{ KEY: VALUE, … }`.
    Map(BTreeMap<String, String>),
    /// `[ "A=B", "C=D" ]`.
    List(Vec<String>),
    /// `"SOLO=VAL"`.
    Single(String),
}

impl Default for EnvValue {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl EnvValue {
    /// Normalizes to ordered `KEY=VALUE` entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        match self {
            Self::Map(map) => map.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            Self::List(list) => list.clone(),
            Self::Single(entry) if !entry.is_empty() => vec![entry.clone()],
            Self::Single(_) => Vec::new(),
        }
    }
}

/// One bind-mount entry.
#[derive(Debug, Deserialize)]
pub struct VolumeEntry {
    /// Host side of the mount.
    pub host_path: String,
    /// Container side of the mount.
    pub container_path: String,
}

/// Loads and parses a manifest file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or not valid manifest YAML.
pub fn load(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_cmd_and_map_environment() {
        let yaml = r#"
container:
  system: Foo:demo:1.0.0
  ports: ["3000", "8080"]
  cmd: "npm start"
  isolated: true
  environment: { NODE_ENV: production, PORT: "3000" }
  volumes:
    - host_path: /srv/data
      container_path: /data
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("parse");
        let container = manifest.container;
        assert_eq!(container.system, "Foo:demo:1.0.0");
        assert_eq!(container.ports, vec!["3000", "8080"]);
        assert_eq!(container.cmd.joined(), "npm start");
        assert!(container.isolated);
        assert_eq!(
            container.environment.entries(),
            vec!["NODE_ENV=production", "PORT=3000"]
        );
        assert_eq!(container.volumes.len(), 1);
        assert_eq!(container.volumes[0].host_path, "/srv/data");
    }

    #[test]
    fn list_cmd_joins_with_ampersands() {
        let yaml = r#"
container:
  system: a:b:c
  cmd:
    - apt-get update
    - npm install
    - npm start
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(
            manifest.container.cmd.joined(),
            "apt-get update && npm install && npm start"
        );
    }

    #[test]
    fn scalar_environment_becomes_one_entry() {
        let yaml = r#"
container:
  system: a:b:c
  cmd: "true"
  environment: "SOLO=VAL"
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(manifest.container.environment.entries(), vec!["SOLO=VAL"]);
    }

    #[test]
    fn list_environment_passes_through() {
        let yaml = r#"
container:
  system: a:b:c
  cmd: "true"
  environment: ["A=B", "C=D"]
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(manifest.container.environment.entries(), vec!["A=B", "C=D"]);
    }

    #[test]
    fn omitted_fields_default() {
        let yaml = r#"
container:
  system: a:b:c
  cmd: "true"
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("parse");
        let container = manifest.container;
        assert!(container.ports.is_empty());
        assert!(!container.isolated);
        assert!(!container.debug);
        assert!(container.environment.entries().is_empty());
        assert!(container.volumes.is_empty());
    }

    #[test]
    fn missing_cmd_fails_to_parse() {
        let yaml = r#"
container:
  system: a:b:c
"#;
        assert!(serde_yaml::from_str::<Manifest>(yaml).is_err());
    }
}
