use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "access-sim",
    version,
    about = "MAC/DAC access-control simulator with tamper detection"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "access-sim.yaml")]
    pub config: PathBuf,

    /// Scenario file to load instead of the built-in one (overrides config file setting)
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Mirror the audit log to this JSON Lines file (overrides config file setting)
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Run an integrity check every N seconds in the background (overrides config file setting)
    #[arg(long, value_name = "SECS")]
    pub integrity_interval: Option<u64>,

    /// Read commands from this file instead of stdin
    #[arg(long)]
    pub script: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::parse_from(["access-sim"]);
        assert_eq!(cli.config, PathBuf::from("access-sim.yaml"));
        assert!(cli.scenario.is_none());
        assert!(cli.integrity_interval.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "access-sim",
            "--scenario",
            "lab.yaml",
            "--audit-log",
            "/tmp/audit.jsonl",
            "--integrity-interval",
            "30",
        ]);
        assert_eq!(cli.scenario, Some(PathBuf::from("lab.yaml")));
        assert_eq!(cli.audit_log, Some(PathBuf::from("/tmp/audit.jsonl")));
        assert_eq!(cli.integrity_interval, Some(30));
    }
}
