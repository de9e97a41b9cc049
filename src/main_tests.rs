// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command-line parsing

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::BTreeSet;
    use tetra::capabilities::BackendKind;
    use tetra::config::Layer;
    use tetra::errors::ProviderError;
    use tetra::reconciler::{DomainReport, FailedOperation};
    use tetra::records::{DesiredRecord, Operation, RecordKey, RecordType};

    fn create(fqdn: &str) -> Operation {
        Operation::Create {
            record: DesiredRecord::new(
                RecordKey::new(fqdn, RecordType::A, None),
                BTreeSet::from(["1.1.1.1".to_string()]),
                600,
            ),
            comment: "TETRAT 2025-01-01 00:00:00".to_string(),
        }
    }

    fn domain(name: &str, status: DomainStatus) -> DomainReport {
        DomainReport {
            domain: name.to_string(),
            layer: Some(Layer::Top),
            backend: Some(BackendKind::Cloudflare),
            status,
            desired: 2,
            planned: Vec::new(),
            applied: Vec::new(),
            failed: None,
            abandoned: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tetra"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("tetra.yaml"));
        assert!(cli.domains.is_empty());
        assert!(!cli.dry_run);
        assert!(!cli.force);
        assert!(!cli.verbose);
        assert!(cli.metrics_file.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "tetra", "-c", "/etc/tetra.yaml", "-d", "example.com", "-d", "example.net", "-D", "-f", "-v",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/tetra.yaml"));
        assert_eq!(cli.domains, vec!["example.com".to_string(), "example.net".to_string()]);
        assert!(cli.dry_run);
        assert!(cli.force);
        assert!(cli.verbose);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "tetra",
            "--domain",
            "example.com",
            "--dry-run",
            "--metrics-file",
            "/var/lib/node_exporter/tetra.prom",
        ])
        .unwrap();

        assert_eq!(cli.domains, vec!["example.com".to_string()]);
        assert!(cli.dry_run);
        assert_eq!(cli.metrics_file, Some(PathBuf::from("/var/lib/node_exporter/tetra.prom")));
    }

    #[test]
    fn test_completions_subcommand() {
        let cli = Cli::try_parse_from(["tetra", "completions", "bash"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Completions { shell: Shell::Bash })));

        assert!(Cli::try_parse_from(["tetra", "completions", "cmd.exe"]).is_err());
    }

    #[test]
    fn test_report_lists_applied_failed_and_abandoned_operations() {
        let mut applied = domain("example.com", DomainStatus::Applied);
        applied.planned = vec![create("www.example.com")];
        applied.applied = vec![create("www.example.com")];

        let mut failed = domain("example.org", DomainStatus::Failed);
        failed.planned = vec![create("a.example.org"), create("b.example.org")];
        failed.failed = Some(FailedOperation {
            operation: create("a.example.org"),
            error: ProviderError::Rejected {
                provider: "cloudflare".to_string(),
                reason: "record already exists".to_string(),
            },
        });
        failed.abandoned = vec![create("b.example.org")];

        let text = render_report(&ReconcileReport {
            domains: vec![applied, failed],
        });
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("example.com: applied"));
        assert!(lines[1].starts_with("  applied: create www.example.com"));
        assert!(lines[2].starts_with("example.org: failed"));
        assert!(lines[3].starts_with("  failed: create a.example.org"));
        assert!(lines[3].contains("record already exists"));
        assert!(lines[4].starts_with("  abandoned: create b.example.org"));
    }

    #[test]
    fn test_planned_operations_are_listed_for_dry_runs_only() {
        let mut planned = domain("example.com", DomainStatus::Planned);
        planned.planned = vec![create("www.example.com")];
        let text = render_report(&ReconcileReport {
            domains: vec![planned],
        });
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("  create www.example.com"));
    }
}
