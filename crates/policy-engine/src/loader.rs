use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::directory::Directory;
use crate::matrix::AccessControlMatrix;
use crate::schema::ScenarioConfig;

/// The built-in scenario: alice, bob and admin with a report and a system
/// configuration file.
pub const DEFAULT_SCENARIO: &str = r#"
version: "1.0"
subjects:
  - name: alice
    credential: alice123
    level: CONFIDENTIAL
  - name: bob
    credential: bob123
    level: PUBLIC
  - name: admin
    credential: admin123
    admin: true
    level: SECRET
resources:
  - name: report.pdf
    owner: alice
    level: CONFIDENTIAL
    owner_permissions: [READ, WRITE]
    others_permissions: [READ]
  - name: system_config.conf
    owner: admin
    level: SECRET
    critical: true
    owner_permissions: [READ, WRITE, DELETE]
    others_permissions: []
grants:
  - subject: alice
    resource: report.pdf
    permissions: [READ, WRITE]
  - subject: bob
    resource: report.pdf
    permissions: [READ]
  - subject: admin
    resource: report.pdf
    permissions: [READ, WRITE, DELETE]
  - subject: admin
    resource: system_config.conf
    permissions: [READ, WRITE, DELETE, CONFIGURE]
"#;

/// Load a [`ScenarioConfig`] from a YAML file on disk.
///
/// Validates the scenario after deserialization.
pub fn load_scenario(path: impl AsRef<Path>) -> Result<ScenarioConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file: {}", path.display()))?;
    load_scenario_from_str(&contents)
        .with_context(|| format!("failed to parse scenario file: {}", path.display()))
}

/// Parse and validate a [`ScenarioConfig`] from a YAML string.
pub fn load_scenario_from_str(yaml: &str) -> Result<ScenarioConfig> {
    let config: ScenarioConfig =
        serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&config)?;
    Ok(config)
}

/// The parsed [`DEFAULT_SCENARIO`].
pub fn default_scenario() -> Result<ScenarioConfig> {
    load_scenario_from_str(DEFAULT_SCENARIO).context("built-in scenario is invalid")
}

/// Register the scenario's subjects and resources in `directory` and apply
/// its grants to `matrix`.
pub fn apply_scenario(
    config: &ScenarioConfig,
    directory: &mut Directory,
    matrix: &AccessControlMatrix,
) -> Result<()> {
    for spec in &config.subjects {
        directory
            .add_subject(spec.to_subject())
            .with_context(|| format!("cannot register subject '{}'", spec.name))?;
    }
    for spec in &config.resources {
        directory
            .add_resource(spec.to_resource())
            .with_context(|| format!("cannot register resource '{}'", spec.name))?;
    }
    for grant in &config.grants {
        matrix.grant(&grant.subject, &grant.resource, grant.permission_set());
    }
    tracing::debug!(
        subjects = config.subjects.len(),
        resources = config.resources.len(),
        grants = config.grants.len(),
        "scenario applied"
    );
    Ok(())
}

/// Run post-deserialization validation checks.
fn validate(config: &ScenarioConfig) -> Result<()> {
    if config.version != "1.0" {
        bail!(
            "unsupported scenario version '{}'; only '1.0' is supported",
            config.version
        );
    }

    let mut subjects = HashSet::new();
    for s in &config.subjects {
        if s.name.is_empty() {
            bail!("subject name must not be empty");
        }
        if !subjects.insert(s.name.as_str()) {
            bail!("duplicate subject name: '{}'", s.name);
        }
    }

    let mut resources = HashSet::new();
    for r in &config.resources {
        if r.name.is_empty() {
            bail!("resource name must not be empty");
        }
        if !resources.insert(r.name.as_str()) {
            bail!("duplicate resource name: '{}'", r.name);
        }
        if !subjects.contains(r.owner.as_str()) {
            bail!("resource '{}' has unknown owner '{}'", r.name, r.owner);
        }
    }

    for g in &config.grants {
        if !subjects.contains(g.subject.as_str()) {
            bail!("grant references unknown subject '{}'", g.subject);
        }
        if !resources.contains(g.resource.as_str()) {
            bail!("grant references unknown resource '{}'", g.resource);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionSet;

    #[test]
    fn default_scenario_is_valid() {
        let config = default_scenario().unwrap();
        assert_eq!(config.subjects.len(), 3);
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.grants.len(), 4);
    }

    #[test]
    fn apply_populates_directory_and_matrix() {
        let config = default_scenario().unwrap();
        let mut directory = Directory::new();
        let matrix = AccessControlMatrix::new();
        apply_scenario(&config, &mut directory, &matrix).unwrap();

        assert!(directory.subject("admin").unwrap().is_admin());
        assert!(directory.resource("system_config.conf").unwrap().is_critical());
        assert_eq!(matrix.permissions_of("bob", "report.pdf"), PermissionSet::READ);
        assert_eq!(matrix.len(), 4);
    }

    #[test]
    fn apply_twice_reports_duplicates() {
        let config = default_scenario().unwrap();
        let mut directory = Directory::new();
        let matrix = AccessControlMatrix::new();
        apply_scenario(&config, &mut directory, &matrix).unwrap();
        let err = apply_scenario(&config, &mut directory, &matrix).unwrap_err();
        assert!(
            format!("{err:#}").contains("already exists"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn reject_wrong_version() {
        let err = load_scenario_from_str("version: \"2.0\"\n").unwrap_err();
        assert!(
            err.to_string().contains("unsupported scenario version"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_duplicate_subject_names() {
        let yaml = r#"
version: "1.0"
subjects:
  - name: dup
  - name: dup
"#;
        let err = load_scenario_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("duplicate subject name"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_unknown_owner() {
        let yaml = r#"
version: "1.0"
resources:
  - name: r
    owner: ghost
"#;
        let err = load_scenario_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown owner"), "unexpected error: {err}");
    }

    #[test]
    fn reject_grant_to_unknown_resource() {
        let yaml = r#"
version: "1.0"
subjects:
  - name: a
grants:
  - subject: a
    resource: missing
    permissions: [READ]
"#;
        let err = load_scenario_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("unknown resource"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn load_from_nonexistent_file() {
        let err = load_scenario("/does/not/exist.yaml").unwrap_err();
        assert!(
            err.to_string().contains("failed to read scenario file"),
            "unexpected error: {err}"
        );
    }
}
