use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use audit_log::AuditLog;
use policy_engine::loader::apply_scenario;
use policy_engine::{
    AccessControlMatrix, AdversarySimulator, Authenticator, Directory, IntegrityMonitor,
    IntegrityReport, ModifyOutcome, Permission, PermissionSet, PolicyEngine, Resource,
    ScenarioConfig, SecurityLevel, Subject,
};

const HELP: &str = "\
commands:
  users                                       list subjects
  resources                                   list resources
  matrix                                      dump the access-control matrix
  add-user <name> <credential> <level> [admin]
  add-resource <name> <owner> <level> [critical]
  grant <subject> <resource> <PERMS|->        replace a matrix entry, e.g. READ,WRITE
  check <subject> <credential> <resource> <permission>
  modify <actor> <credential> <resource> <target>
                                              add WRITE for <target> (owner or admin only)
  escalate <subject> <resource>               simulated rootkit: silent full grant
  baseline                                    take an integrity baseline
  integrity                                   compare the matrix with the baseline
  log                                         print the audit log
  demo                                        run the default demonstration
  help
  quit | exit";

/// Whether the shell loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
    Help,
    Users,
    Resources,
    Matrix,
    AddUser {
        name: &'a str,
        credential: &'a str,
        level: SecurityLevel,
        admin: bool,
    },
    AddResource {
        name: &'a str,
        owner: &'a str,
        level: SecurityLevel,
        critical: bool,
    },
    Grant {
        subject: &'a str,
        resource: &'a str,
        permissions: PermissionSet,
    },
    Check {
        subject: &'a str,
        credential: &'a str,
        resource: &'a str,
        permission: Permission,
    },
    Modify {
        actor: &'a str,
        credential: &'a str,
        resource: &'a str,
        target: &'a str,
    },
    Escalate {
        subject: &'a str,
        resource: &'a str,
    },
    Baseline,
    Integrity,
    Log,
    Demo,
    Quit,
}

impl<'a> Command<'a> {
    /// `None` for blank lines and `#` comments.
    fn parse(line: &'a str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = (words[0], &words[1..]);

        let command = match (name, args) {
            ("help" | "?", []) => Self::Help,
            ("users", []) => Self::Users,
            ("resources", []) => Self::Resources,
            ("matrix", []) => Self::Matrix,
            ("add-user", &[name, credential, level, ref rest @ ..]) => Self::AddUser {
                name,
                credential,
                level: level.parse()?,
                admin: flag(rest, "admin")?,
            },
            ("add-resource", &[name, owner, level, ref rest @ ..]) => Self::AddResource {
                name,
                owner,
                level: level.parse()?,
                critical: flag(rest, "critical")?,
            },
            ("grant", &[subject, resource, permissions]) => Self::Grant {
                subject,
                resource,
                permissions: PermissionSet::parse_list(permissions)?,
            },
            ("check", &[subject, credential, resource, permission]) => Self::Check {
                subject,
                credential,
                resource,
                permission: permission.parse()?,
            },
            ("modify", &[actor, credential, resource, target]) => Self::Modify {
                actor,
                credential,
                resource,
                target,
            },
            ("escalate", &[subject, resource]) => Self::Escalate { subject, resource },
            ("baseline", []) => Self::Baseline,
            ("integrity", []) => Self::Integrity,
            ("log", []) => Self::Log,
            ("demo", []) => Self::Demo,
            ("quit" | "exit", []) => Self::Quit,
            (
                "help" | "?" | "users" | "resources" | "matrix" | "add-user" | "add-resource"
                | "grant" | "check" | "modify" | "escalate" | "baseline" | "integrity" | "log"
                | "demo" | "quit" | "exit",
                _,
            ) => bail!("wrong arguments for '{name}'; type 'help' for usage"),
            _ => bail!("unknown command '{name}'; type 'help' for usage"),
        };
        Ok(Some(command))
    }
}

/// Optional trailing keyword such as `admin` or `critical`.
fn flag(rest: &[&str], keyword: &str) -> Result<bool> {
    match rest {
        [] => Ok(false),
        [word] if word.eq_ignore_ascii_case(keyword) => Ok(true),
        _ => bail!("expected optional '{keyword}', got '{}'", rest.join(" ")),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Wires the registry, matrix, engine, monitor and adversary together and
/// drives them from text commands.
pub struct Simulator {
    directory: Directory,
    matrix: Arc<AccessControlMatrix>,
    engine: PolicyEngine,
    monitor: Arc<IntegrityMonitor>,
    adversary: AdversarySimulator,
    auth: Authenticator,
    audit: AuditLog,
    rebaseline_on_grant: bool,
}

impl Simulator {
    pub fn new(audit: AuditLog, rebaseline_on_grant: bool) -> Self {
        let matrix = Arc::new(AccessControlMatrix::new());
        Self {
            directory: Directory::new(),
            engine: PolicyEngine::new(Arc::clone(&matrix), audit.clone()),
            monitor: Arc::new(IntegrityMonitor::new(Arc::clone(&matrix), audit.clone())),
            adversary: AdversarySimulator::new(Arc::clone(&matrix)),
            auth: Authenticator::new(audit.clone()),
            matrix,
            audit,
            rebaseline_on_grant,
        }
    }

    /// Register the scenario and take the initial baseline.
    pub fn load(&mut self, scenario: &ScenarioConfig) -> Result<()> {
        apply_scenario(scenario, &mut self.directory, &self.matrix)?;
        let pairs = self.monitor.take_baseline();
        info!(pairs, "scenario loaded");
        Ok(())
    }

    pub fn monitor(&self) -> Arc<IntegrityMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Run one command line, writing its output to `out`.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let Some(command) = Command::parse(line)? else {
            return Ok(Flow::Continue);
        };

        match command {
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Users => self.list_users(out)?,
            Command::Resources => self.list_resources(out)?,
            Command::Matrix => self.dump_matrix(out)?,
            Command::AddUser {
                name,
                credential,
                level,
                admin,
            } => {
                self.directory
                    .add_subject(Subject::new(name, credential, admin, level))?;
                writeln!(out, "subject created: {name}")?;
            }
            Command::AddResource {
                name,
                owner,
                level,
                critical,
            } => {
                let resource = Resource::new(name, owner, level, critical)
                    .with_owner_permissions(PermissionSet::READ | PermissionSet::WRITE);
                self.directory.add_resource(resource)?;
                writeln!(out, "resource created: {name}")?;
            }
            Command::Grant {
                subject,
                resource,
                permissions,
            } => self.grant(subject, resource, permissions, out)?,
            Command::Check {
                subject,
                credential,
                resource,
                permission,
            } => self.check(subject, credential, resource, permission, out)?,
            Command::Modify {
                actor,
                credential,
                resource,
                target,
            } => self.modify(actor, credential, resource, target, out)?,
            Command::Escalate { subject, resource } => self.escalate(subject, resource, out)?,
            Command::Baseline => {
                let pairs = self.monitor.take_baseline();
                writeln!(out, "integrity baseline taken ({pairs} pairs)")?;
            }
            Command::Integrity => self.integrity(out)?,
            Command::Log => self.print_log(out)?,
            Command::Demo => self.demo(out)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    // -- Listings -------------------------------------------------------------

    fn list_users(&self, out: &mut impl Write) -> Result<()> {
        for s in self.directory.subjects() {
            writeln!(
                out,
                "{:<16} level={:<12} admin={}",
                s.name(),
                s.level(),
                yes_no(s.is_admin())
            )?;
        }
        Ok(())
    }

    fn list_resources(&self, out: &mut impl Write) -> Result<()> {
        for r in self.directory.resources() {
            writeln!(
                out,
                "{:<20} owner={:<12} level={:<12} critical={:<3} owner_perms={} others_perms={}",
                r.name(),
                r.owner(),
                r.level(),
                yes_no(r.is_critical()),
                r.owner_permissions(),
                r.others_permissions()
            )?;
        }
        Ok(())
    }

    fn dump_matrix(&self, out: &mut impl Write) -> Result<()> {
        let snapshot = self.matrix.snapshot();
        if snapshot.is_empty() {
            writeln!(out, "(matrix is empty)")?;
        }
        for (key, permissions) in snapshot.iter() {
            writeln!(out, "{:<16} {:<20} {}", key.subject, key.resource, permissions)?;
        }
        Ok(())
    }

    fn print_log(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "=== AUDIT LOG ===")?;
        for entry in self.audit.entries() {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }

    // -- Actions --------------------------------------------------------------

    fn grant(
        &self,
        subject: &str,
        resource: &str,
        permissions: PermissionSet,
        out: &mut impl Write,
    ) -> Result<()> {
        self.require_subject(subject)?;
        self.require_resource(resource)?;

        self.matrix.grant(subject, resource, permissions);
        writeln!(out, "granted {permissions} to {subject} on {resource}")?;

        if self.rebaseline_on_grant {
            self.monitor.take_baseline();
            writeln!(out, "integrity baseline refreshed")?;
        }
        Ok(())
    }

    fn check(
        &self,
        subject: &str,
        credential: &str,
        resource: &str,
        permission: Permission,
        out: &mut impl Write,
    ) -> Result<()> {
        let Some(subject) = self.auth.authenticate(&self.directory, subject, credential) else {
            writeln!(out, "authentication failed")?;
            return Ok(());
        };
        let resource = self.require_resource(resource)?;

        let decision = self.engine.decide(&subject, resource, permission);
        writeln!(
            out,
            "{} {} {}: {} ({})",
            subject.name(),
            permission,
            resource.name(),
            if decision.allowed { "GRANTED" } else { "DENIED" },
            decision.reason.description()
        )?;
        Ok(())
    }

    fn modify(
        &self,
        actor: &str,
        credential: &str,
        resource: &str,
        target: &str,
        out: &mut impl Write,
    ) -> Result<()> {
        let Some(actor) = self.auth.authenticate(&self.directory, actor, credential) else {
            writeln!(out, "authentication failed")?;
            return Ok(());
        };
        let resource = self.require_resource(resource)?;
        let target = self.require_subject(target)?;

        match self.engine.try_modify_permissions(&actor, resource, target) {
            ModifyOutcome::Granted { before, after } => writeln!(
                out,
                "permissions for {} on {}: {before} -> {after}",
                target.name(),
                resource.name()
            )?,
            ModifyOutcome::Refused => writeln!(
                out,
                "refused: {} is neither administrator nor owner of {} (recorded as escalation attempt)",
                actor.name(),
                resource.name()
            )?,
        }
        Ok(())
    }

    fn escalate(&self, subject: &str, resource: &str, out: &mut impl Write) -> Result<()> {
        self.require_subject(subject)?;
        self.require_resource(resource)?;

        writeln!(out, "simulated rootkit; the real operating system is not touched")?;
        let before = self.adversary.silently_escalate(subject, resource);
        let after = self.matrix.permissions_of(subject, resource);
        writeln!(out, "before: {before}")?;
        writeln!(out, "after:  {after}")?;
        writeln!(
            out,
            "nothing was audited; run 'check' to see the engine trust it, 'integrity' to catch it"
        )?;
        Ok(())
    }

    fn integrity(&self, out: &mut impl Write) -> Result<()> {
        match self.monitor.check_integrity() {
            IntegrityReport::NoBaseline => {
                writeln!(out, "no integrity baseline; run 'baseline' first")?
            }
            IntegrityReport::Intact => {
                writeln!(out, "integrity OK: no changes since the baseline")?
            }
            IntegrityReport::Diverged(divergences) => {
                writeln!(
                    out,
                    "ALERT: {} change(s) to the access-control matrix since the baseline",
                    divergences.len()
                )?;
                for d in &divergences {
                    writeln!(
                        out,
                        "  {} on {}: {} -> {} (gained {}, lost {})",
                        d.key.subject,
                        d.key.resource,
                        d.before,
                        d.after,
                        d.gained(),
                        d.lost()
                    )?;
                }
                writeln!(out, "see the audit log for details")?;
            }
        }
        Ok(())
    }

    /// Logins, four access checks and one refused modification against the
    /// built-in scenario, then a fresh baseline.
    fn demo(&self, out: &mut impl Write) -> Result<()> {
        const REQUIRED_SUBJECTS: [&str; 3] = ["alice", "bob", "admin"];
        const REQUIRED_RESOURCES: [&str; 2] = ["report.pdf", "system_config.conf"];
        let missing = REQUIRED_SUBJECTS
            .iter()
            .any(|s| self.directory.subject(s).is_none())
            || REQUIRED_RESOURCES
                .iter()
                .any(|r| self.directory.resource(r).is_none());
        if missing {
            bail!("the demo needs the built-in scenario (alice, bob, admin, report.pdf, system_config.conf)");
        }

        writeln!(out, "running default demonstration...")?;
        let directory = &self.directory;
        let alice = self.auth.authenticate(directory, "alice", "alice123");
        let bob = self.auth.authenticate(directory, "bob", "bob123");
        let admin = self.auth.authenticate(directory, "admin", "admin123");

        let report = self.require_resource("report.pdf")?;
        let config = self.require_resource("system_config.conf")?;

        let mut show = |subject: &Subject, resource: &Resource, permission| -> Result<()> {
            let d = self.engine.decide(subject, resource, permission);
            writeln!(
                out,
                "  {} {} {}: {}",
                subject.name(),
                permission,
                resource.name(),
                if d.allowed { "GRANTED" } else { "DENIED" }
            )?;
            Ok(())
        };
        if let Some(alice) = &alice {
            show(alice, report, Permission::Read)?;
            show(alice, config, Permission::Read)?;
        }
        if let Some(bob) = &bob {
            show(bob, report, Permission::Write)?;
        }
        if let Some(admin) = &admin {
            show(admin, config, Permission::Configure)?;
        }
        drop(show);

        if let (Some(bob), Some(alice)) = (&bob, directory.subject("alice")) {
            let outcome = self.engine.try_modify_permissions(bob, config, alice);
            writeln!(out, "  bob modifies {} for alice: {:?}", config.name(), outcome)?;
        }

        writeln!(out, "demonstration finished")?;
        self.print_log(out)?;
        self.monitor.take_baseline();
        Ok(())
    }

    // -- Lookups ----------------------------------------------------------------

    fn require_subject(&self, name: &str) -> Result<&Subject> {
        self.directory
            .subject(name)
            .with_context(|| format!("subject '{name}' does not exist"))
    }

    fn require_resource(&self, name: &str) -> Result<&Resource> {
        self.directory
            .resource(name)
            .with_context(|| format!("resource '{name}' does not exist"))
    }
}
