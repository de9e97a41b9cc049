// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reconciler/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::provider::memory::MemoryFactory;
    use crate::records::OperationKind;

    const CONFIG: &str = r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  auth: { account: infra }
  hosts:
    - name: h1
      addresses: { 0: [1.1.1.1] }
      mid_names: lab

example.com:
  layer: top
  backend: cloudflare
  auth: { account: public }
  bottom: infra.example.net
  domains:
    - names: www
      records: lab
"#;

    fn config(yaml: &str) -> Configuration {
        Configuration::from_yaml_str(yaml).unwrap()
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions::default()
    }

    #[tokio::test]
    async fn test_first_run_creates_then_converges() {
        let config = config(CONFIG);
        let factory = MemoryFactory::new();

        let first = reconcile(&config, &factory, &options()).await;
        assert!(!first.has_failures());
        let top = first.get("example.com").unwrap();
        assert_eq!(top.status, DomainStatus::Applied);
        assert_eq!(top.applied.len(), 1);
        assert_eq!(top.applied[0].kind(), OperationKind::Create);

        let public = factory.account("public").unwrap();
        let records = public.records("example.com");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "lab.infra.example.net.");
        assert!(records[0].is_owned_by("TETRAT"));

        let infra = factory.account("infra").unwrap();
        assert!(infra.records("infra.example.net")[0].is_owned_by("TETRAB"));

        let second = reconcile(&config, &factory, &options()).await;
        for domain in &second.domains {
            assert_eq!(domain.status, DomainStatus::Converged, "{domain}");
            assert!(domain.planned.is_empty());
        }
    }

    #[tokio::test]
    async fn test_dry_run_applies_nothing() {
        let config = config(CONFIG);
        let factory = MemoryFactory::new();
        let options = ReconcileOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = reconcile(&config, &factory, &options).await;
        for domain in &report.domains {
            assert_eq!(domain.status, DomainStatus::Planned);
            assert_eq!(domain.planned.len(), 1);
            assert!(domain.applied.is_empty());
        }
        assert!(factory.account("public").unwrap().applied().is_empty());
    }

    #[tokio::test]
    async fn test_force_rewrites_converged_records() {
        let config = config(CONFIG);
        let factory = MemoryFactory::new();
        reconcile(&config, &factory, &options()).await;

        let forced = ReconcileOptions {
            force: true,
            ..Default::default()
        };
        let report = reconcile(&config, &factory, &forced).await;
        let top = report.get("example.com").unwrap();
        assert_eq!(top.status, DomainStatus::Applied);
        assert_eq!(top.applied[0].kind(), OperationKind::Update);
    }

    #[tokio::test]
    async fn test_selection() {
        let config = config(CONFIG);
        let factory = MemoryFactory::new();
        let options = ReconcileOptions {
            domains: vec![
                "example.com".to_string(),
                "missing.com".to_string(),
                "example.com".to_string(),
            ],
            ..Default::default()
        };

        let report = reconcile(&config, &factory, &options).await;
        assert_eq!(report.domains.len(), 2);
        assert_eq!(report.get("example.com").unwrap().status, DomainStatus::Applied);
        let public = factory.account("public").unwrap();
        assert_eq!(public.fetches(), 1);
        assert_eq!(public.applied().len(), 1);

        let missing = report.get("missing.com").unwrap();
        assert_eq!(missing.status, DomainStatus::Invalid);
        assert_eq!(missing.reason(), Some("UnknownDomain"));
        assert!(factory.account("infra").is_none());
    }

    #[tokio::test]
    async fn test_invalid_domain_is_never_fetched() {
        let yaml = format!(
            "{CONFIG}
lined.com:
  layer: top
  backend: cloudflare
  auth: {{ account: public }}
  bottom: infra.example.net
  domains:
    - names: www
      records: {{ value: lab, line: overseas }}
"
        );
        let config = config(&yaml);
        let factory = MemoryFactory::new();

        let report = reconcile(&config, &factory, &options()).await;
        let lined = report.get("lined.com").unwrap();
        assert_eq!(lined.status, DomainStatus::Invalid);
        assert_eq!(lined.reason(), Some("UnsupportedLine"));
        assert!(lined.planned.is_empty());

        assert_eq!(report.get("example.com").unwrap().status, DomainStatus::Applied);
        assert_eq!(factory.account("public").unwrap().fetches(), 1);
        assert!(report.has_failures());
    }
}
