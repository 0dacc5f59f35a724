//! The persistent container tracking ledger.
//!
//! A line-oriented UTF-8 file, one record per line, fields separated by
//! `|`; the command field tab-separates its shell fragments. Two trailing
//! fields extend the historical eight-field format so restarts keep their
//! volumes and environment; eight-field lines still parse.
//!
//! Every operation holds a file lock for its duration — exclusive for
//! mutation, shared for reads — so the daemon and concurrent CLI
//! invocations serialize per ledger.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use nix::fcntl::{Flock, FlockArg};
use qube_common::config::RuntimeConfig;
use qube_common::error::{QubeError, Result};
use serde::Serialize;

/// The durable description of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    /// Unique short identifier, e.g. `Qube-3fa9c1`.
    pub name: String,
    /// Current pid; -1 = exited (restartable), -2 = deliberately stopped.
    pub pid: i32,
    /// Host directory seeded into `/workspace`.
    pub work_dir: String,
    /// Ordered shell fragments, `&&`-joined at execution time.
    pub command: Vec<String>,
    /// Epoch seconds at track/update time.
    pub created_at: u64,
    /// Image identifier `user:name:version`.
    pub image: String,
    /// Advisory comma-separated port list.
    pub ports: String,
    /// Whether the container runs in its own network namespace.
    pub isolated: bool,
    /// Ordered `(host_path, container_path)` bind mounts.
    pub volumes: Vec<(String, String)>,
    /// Ordered `KEY=VALUE` environment entries.
    pub env: Vec<String>,
}

impl ContainerRecord {
    /// Serializes the record as one ledger line (without the newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        let volumes = self
            .volumes
            .iter()
            .map(|(host, guest)| format!("{host}:{guest}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.name,
            self.pid,
            self.work_dir,
            self.command.join("\t"),
            self.created_at,
            self.image,
            self.ports,
            self.isolated,
            volumes,
            self.env.join("\t"),
        )
    }

    /// Parses one ledger line; `None` for malformed input.
    ///
    /// Lines with fewer than eight fields are malformed. The ninth and
    /// tenth fields (volumes, environment) are optional for compatibility
    /// with the historical format.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 8 {
            return None;
        }

        let pid = fields[1].parse::<i32>().ok()?;
        let command = fields[3]
            .split('\t')
            .filter(|f| !f.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        let created_at = fields[4].parse::<u64>().unwrap_or(0);
        let isolated = fields[7].trim() == "true";

        let volumes = fields
            .get(8)
            .map(|field| {
                field
                    .split(',')
                    .filter(|pair| !pair.is_empty())
                    .filter_map(|pair| {
                        pair.split_once(':')
                            .map(|(host, guest)| (host.to_owned(), guest.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let env = fields
            .get(9)
            .map(|field| {
                field
                    .split('\t')
                    .filter(|entry| !entry.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name: fields[0].to_owned(),
            pid,
            work_dir: fields[2].to_owned(),
            command,
            created_at,
            image: fields[5].to_owned(),
            ports: fields[6].to_owned(),
            isolated,
            volumes,
            env,
        })
    }
}

/// Handle to the ledger file.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Creates a ledger handle from the runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            path: config.ledger_path.clone(),
        }
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Appends a record, creating the ledger if needed.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::Conflict`] when the name is already tracked and
    /// a validation error for names unusable as a filesystem component.
    pub fn insert(&self, record: &ContainerRecord) -> Result<()> {
        validate_name(&record.name)?;
        let mut file = self.open_exclusive()?;

        let content = read_all(&mut file, &self.path)?;
        if content
            .lines()
            .filter_map(ContainerRecord::parse_line)
            .any(|existing| existing.name == record.name)
        {
            return Err(QubeError::Conflict {
                message: format!("container {} is already tracked", record.name),
            });
        }

        let mut line = String::new();
        if !content.is_empty() && !content.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&record.to_line());
        line.push('\n');

        file.seek(SeekFrom::End(0)).map_err(|e| QubeError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        file.write_all(line.as_bytes()).map_err(|e| QubeError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(name = %record.name, pid = record.pid, "ledger insert");
        Ok(())
    }

    /// Replaces the record with the same name, inserting when absent.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or lock failure.
    pub fn update(&self, record: &ContainerRecord) -> Result<()> {
        validate_name(&record.name)?;
        let mut file = self.open_exclusive()?;
        let content = read_all(&mut file, &self.path)?;

        let mut found = false;
        let mut lines: Vec<String> = Vec::new();
        for line in content.lines().filter(|l| !l.is_empty()) {
            match ContainerRecord::parse_line(line) {
                Some(existing) if existing.name == record.name => {
                    lines.push(record.to_line());
                    found = true;
                }
                _ => lines.push(line.to_owned()),
            }
        }
        if !found {
            lines.push(record.to_line());
        }

        self.rewrite(&mut file, &lines)?;
        tracing::debug!(name = %record.name, pid = record.pid, "ledger update");
        Ok(())
    }

    /// Rewrites just the pid of a named record, leaving other fields alone.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] when no record carries the name.
    pub fn set_pid(&self, name: &str, pid: i32) -> Result<()> {
        let mut file = self.open_exclusive()?;
        let content = read_all(&mut file, &self.path)?;

        let mut found = false;
        let mut lines: Vec<String> = Vec::new();
        for line in content.lines().filter(|l| !l.is_empty()) {
            match ContainerRecord::parse_line(line) {
                Some(mut record) if record.name == name => {
                    record.pid = pid;
                    lines.push(record.to_line());
                    found = true;
                }
                _ => lines.push(line.to_owned()),
            }
        }
        if !found {
            return Err(QubeError::NotFound {
                kind: "container",
                id: name.to_owned(),
            });
        }

        self.rewrite(&mut file, &lines)?;
        tracing::debug!(name, pid, "ledger pid updated");
        Ok(())
    }

    /// Removes the record with the given name, if any.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or lock failure; an absent name is not an
    /// error.
    pub fn remove_by_name(&self, name: &str) -> Result<()> {
        self.retain(|record| record.name != name)
    }

    /// Removes every record carrying the given pid.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or lock failure.
    pub fn remove_by_pid(&self, pid: i32) -> Result<()> {
        self.retain(|record| record.pid != pid)
    }

    /// Parses every well-formed record in the ledger.
    ///
    /// Malformed lines are discarded. A missing ledger file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or locked.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let Some(mut file) = self.open_shared()? else {
            return Ok(Vec::new());
        };
        let content = read_all(&mut file, &self.path)?;
        Ok(content
            .lines()
            .filter_map(ContainerRecord::parse_line)
            .collect())
    }

    /// Finds a record by name or decimal pid.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn find(&self, name_or_pid: &str) -> Result<Option<ContainerRecord>> {
        let records = self.list()?;
        Ok(records.into_iter().find(|record| {
            record.name == name_or_pid || record.pid.to_string() == name_or_pid
        }))
    }

    fn retain(&self, keep: impl Fn(&ContainerRecord) -> bool) -> Result<()> {
        let mut file = self.open_exclusive()?;
        let content = read_all(&mut file, &self.path)?;

        let lines: Vec<String> = content
            .lines()
            .filter(|l| !l.is_empty())
            .filter(|line| ContainerRecord::parse_line(line).is_none_or(|record| keep(&record)))
            .map(ToOwned::to_owned)
            .collect();

        self.rewrite(&mut file, &lines)
    }

    fn rewrite(&self, file: &mut Flock<File>, lines: &[String]) -> Result<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        file.set_len(0).map_err(|e| QubeError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        file.seek(SeekFrom::Start(0)).map_err(|e| QubeError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        file.write_all(content.as_bytes()).map_err(|e| QubeError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    fn open_exclusive(&self) -> Result<Flock<File>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QubeError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| QubeError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| QubeError::Kernel {
            op: "flock ledger",
            errno,
        })
    }

    fn open_shared(&self) -> Result<Option<Flock<File>>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(QubeError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        Flock::lock(file, FlockArg::LockShared)
            .map(Some)
            .map_err(|(_, errno)| QubeError::Kernel {
                op: "flock ledger",
                errno,
            })
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(QubeError::Parse {
            message: format!("container name '{name}' is not usable as a path component"),
        })
    }
}

fn read_all(file: &mut Flock<File>, path: &std::path::Path) -> Result<String> {
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(|e| QubeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(content)
}
