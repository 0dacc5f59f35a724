//! Dockerfile conversion.
//!
//! Maps the `FROM`/`EXPOSE`/`ENV`/`CMD` subset onto a `qube.yml`, with the
//! `INSTALL_<TOOL>` environment convention expanded into setup commands
//! that run ahead of the workload.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// The recognized subset of a Dockerfile.
#[derive(Debug, Default)]
pub struct DockerfileConfig {
    /// Base image from `FROM`.
    pub from: String,
    /// Ports from `EXPOSE` lines.
    pub expose: Vec<String>,
    /// Command from `CMD` (exec-form JSON arrays are flattened).
    pub cmd: Vec<String>,
    /// Variables from `ENV` lines.
    pub env: BTreeMap<String, String>,
    /// Setup commands derived from `INSTALL_<TOOL>` variables.
    pub install_cmds: Vec<String>,
}

/// Parses the recognized directives out of a Dockerfile.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn parse(path: &Path) -> anyhow::Result<DockerfileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut config = DockerfileConfig::default();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("FROM ") {
            config.from = rest.trim().to_owned();
        } else if let Some(rest) = line.strip_prefix("EXPOSE ") {
            config
                .expose
                .extend(rest.split_whitespace().map(ToOwned::to_owned));
        } else if let Some(rest) = line.strip_prefix("CMD ") {
            let cmd = rest.trim();
            if cmd.starts_with('[') {
                // exec form is argv words, not separate shell steps
                match serde_json::from_str::<Vec<String>>(cmd) {
                    Ok(parts) => config.cmd = vec![parts.join(" ")],
                    Err(_) => config.cmd = vec![cmd.to_owned()],
                }
            } else {
                config.cmd = vec![cmd.to_owned()];
            }
        } else if let Some(rest) = line.strip_prefix("ENV ") {
            if let Some((key, value)) = rest.trim().split_once(' ') {
                let _ = config
                    .env
                    .insert(key.to_owned(), value.trim_matches(['"', '\'']).to_owned());
            } else if let Some((key, value)) = rest.trim().split_once('=') {
                let _ = config
                    .env
                    .insert(key.to_owned(), value.trim_matches(['"', '\'']).to_owned());
            }
        }
    }

    config.install_cmds = install_commands(&config.env);
    Ok(config)
}

/// Expands `INSTALL_<TOOL>` variables into toolchain setup commands.
#[must_use]
pub fn install_commands(env: &BTreeMap<String, String>) -> Vec<String> {
    let mut commands = Vec::new();

    if let Some(version) = env.get("INSTALL_NODE").filter(|v| !v.is_empty()) {
        commands.push("curl -fsSL https://deb.nodesource.com/setup_lts.x | bash -".to_owned());
        commands.push("apt-get install -y nodejs".to_owned());
        if version != "latest" {
            commands.push(format!("npm install -g n && n {version}"));
        }
    }

    if let Some(version) = env.get("INSTALL_RUST").filter(|v| !v.is_empty()) {
        commands.push(
            "curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y".to_owned(),
        );
        commands.push("source $HOME/.cargo/env".to_owned());
        if version != "latest" {
            commands.push(format!("rustup install {version}"));
        }
    }

    if let Some(version) = env.get("INSTALL_PYTHON").filter(|v| !v.is_empty()) {
        if version == "latest" || version == "3" {
            commands.push("apt-get update && apt-get install -y python3 python3-pip".to_owned());
        } else {
            commands.push(format!(
                "apt-get update && apt-get install -y python{version} python{version}-pip"
            ));
        }
    }

    if let Some(version) = env.get("INSTALL_GOLANG").filter(|v| !v.is_empty()) {
        let version = if version == "latest" {
            "1.21.0"
        } else {
            version.as_str()
        };
        commands.push(format!(
            "wget https://go.dev/dl/go{version}.linux-amd64.tar.gz"
        ));
        commands.push(format!(
            "tar -C /usr/local -xzf go{version}.linux-amd64.tar.gz"
        ));
        commands.push("export PATH=$PATH:/usr/local/go/bin".to_owned());
    }

    if let Some(version) = env.get("INSTALL_JAVA").filter(|v| !v.is_empty()) {
        if version == "latest" || version == "11" {
            commands.push("apt-get update && apt-get install -y openjdk-11-jdk".to_owned());
        } else {
            commands.push(format!(
                "apt-get update && apt-get install -y openjdk-{version}-jdk"
            ));
        }
    }

    commands
}

#[derive(Debug, Serialize)]
struct ManifestOut {
    container: ContainerOut,
}

#[derive(Debug, Serialize)]
struct ContainerOut {
    system: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    cmd: Vec<String>,
    isolated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
}

/// Command fragments tracked for the converted container: setup first.
#[must_use]
pub fn command_fragments(config: &DockerfileConfig) -> Vec<String> {
    let mut fragments = config.install_cmds.clone();
    fragments.extend(config.cmd.iter().cloned());
    fragments
}

/// Renders the converted configuration as `qube.yml` content.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn to_manifest_yaml(config: &DockerfileConfig) -> anyhow::Result<String> {
    let manifest = ManifestOut {
        container: ContainerOut {
            system: config.from.clone(),
            ports: config.expose.clone(),
            cmd: command_fragments(config),
            isolated: true,
            environment: config
                .env
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
        },
    };
    serde_yaml::to_string(&manifest).context("failed to render qube.yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dockerfile(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("Dockerfile");
        std::fs::write(&path, content).expect("write Dockerfile");
        path
    }

    #[test]
    fn parses_the_recognized_directives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_dockerfile(
            dir.path(),
            r#"
# comment
FROM Voyrox:ubuntu:22.04
EXPOSE 3000 8080
ENV NODE_ENV "production"
CMD ["npm", "start"]
"#,
        );

        let config = parse(&path).expect("parse");
        assert_eq!(config.from, "Voyrox:ubuntu:22.04");
        assert_eq!(config.expose, vec!["3000", "8080"]);
        assert_eq!(config.cmd, vec!["npm start"]);
        assert_eq!(config.env.get("NODE_ENV").map(String::as_str), Some("production"));
    }

    #[test]
    fn shell_form_cmd_is_one_fragment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_dockerfile(dir.path(), "FROM a:b:c\nCMD npm start\n");

        let config = parse(&path).expect("parse");
        assert_eq!(config.cmd, vec!["npm start"]);
    }

    #[test]
    fn install_node_expands_to_setup_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_dockerfile(
            dir.path(),
            "FROM a:b:c\nENV INSTALL_NODE 18\nCMD [\"node\", \"app.js\"]\n",
        );

        let config = parse(&path).expect("parse");
        assert!(config.install_cmds.iter().any(|c| c.contains("nodesource")));
        assert!(config
            .install_cmds
            .iter()
            .any(|c| c.contains("npm install -g n && n 18")));

        let fragments = command_fragments(&config);
        assert!(fragments.len() > config.cmd.len());
        assert_eq!(fragments.last().map(String::as_str), Some("node app.js"));
    }

    #[test]
    fn rendered_manifest_round_trips_through_the_loader() {
        let mut config = DockerfileConfig {
            from: "Foo:demo:1.0.0".into(),
            expose: vec!["3000".into()],
            cmd: vec!["npm start".into()],
            ..DockerfileConfig::default()
        };
        let _ = config.env.insert("NODE_ENV".into(), "production".into());

        let yaml = to_manifest_yaml(&config).expect("render");
        let manifest: crate::manifest::Manifest =
            serde_yaml::from_str(&yaml).expect("loader accepts rendered yaml");
        assert_eq!(manifest.container.system, "Foo:demo:1.0.0");
        assert!(manifest.container.isolated);
        assert_eq!(
            manifest.container.environment.entries(),
            vec!["NODE_ENV=production"]
        );
    }
}
