// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end reconciliation tests against the in-memory provider.
//!
//! Run with: cargo test --test reconcile_integration

mod common;

use common::{auth_failure, factory_with, foreign, load, outage, planned_kinds, run, BOTTOM};
use std::collections::BTreeSet;
use std::io::Write;
use tetra::capabilities::BackendKind;
use tetra::config::Configuration;
use tetra::records::{ActualRecord, OperationKind, RecordKey, RecordType};
use tetra::reconciler::{reconcile, DomainStatus, ReconcileOptions};

// ============================================================================
// Helper Functions
// ============================================================================

fn top(domain: &str, account: &str, groups: &str) -> String {
    format!(
        "
{domain}:
  layer: top
  backend: cloudflare
  auth: {{ account: {account} }}
  bottom: infra.example.net
  domains:
{groups}"
    )
}

const GROUPS: &str = "    - names: [www, api]
      records: cn0
      cnames: w3
    - names: blog
      records: cn0-v0-ext
";

fn values(records: &[ActualRecord], fqdn: &str, record_type: RecordType) -> BTreeSet<String> {
    records
        .iter()
        .filter(|r| r.key == RecordKey::new(fqdn, record_type, None))
        .map(|r| r.value.clone())
        .collect()
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_end_to_end_bottom_and_top() {
    let config = load(&format!("{BOTTOM}{}", top("example.com", "public", GROUPS)));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);

    let report = run(&config, &factory).await;
    assert!(!report.has_failures(), "{:?}", report.domains);

    let bottom = providers[0].records("infra.example.net");
    assert_eq!(values(&bottom, "cn0-v0-ip4.infra.example.net", RecordType::A), set(&["1.1.1.1"]));
    assert_eq!(values(&bottom, "cn0-v0-ip6.infra.example.net", RecordType::AAAA), set(&["::1"]));
    assert_eq!(values(&bottom, "cn0-v0-ext.infra.example.net", RecordType::A), set(&["2.2.2.2"]));
    assert_eq!(values(&bottom, "cn0.infra.example.net", RecordType::A), set(&["1.1.1.1"]));
    assert_eq!(values(&bottom, "cn0.infra.example.net", RecordType::AAAA), set(&["::1"]));
    assert!(bottom.iter().all(|r| r.key.fqdn != "cn0-v0.infra.example.net"));
    assert!(bottom.iter().all(|r| r.is_owned_by("TETRAB")));

    let public = providers[1].records("example.com");
    assert_eq!(values(&public, "www.example.com", RecordType::CNAME), set(&["cn0.infra.example.net."]));
    assert_eq!(values(&public, "api.example.com", RecordType::CNAME), set(&["cn0.infra.example.net."]));
    assert_eq!(values(&public, "w3.example.com", RecordType::CNAME), set(&["www.example.com."]));
    assert_eq!(
        values(&public, "blog.example.com", RecordType::CNAME),
        set(&["cn0-v0-ext.infra.example.net."])
    );
    assert!(public.iter().all(|r| r.is_owned_by("TETRAT") && r.ttl == 600));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let config = load(&format!("{BOTTOM}{}", top("example.com", "public", GROUPS)));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);

    run(&config, &factory).await;
    let applied_after_first: usize = providers.iter().map(|p| p.applied().len()).sum();

    let second = run(&config, &factory).await;
    for domain in &second.domains {
        assert_eq!(domain.status, DomainStatus::Converged, "{domain}");
        assert!(domain.planned.is_empty());
    }
    let applied_after_second: usize = providers.iter().map(|p| p.applied().len()).sum();
    assert_eq!(applied_after_first, applied_after_second);
}

#[tokio::test]
async fn test_removed_group_only_deletes() {
    let before = load(&format!("{BOTTOM}{}", top("example.com", "public", GROUPS)));
    let after = load(&format!(
        "{BOTTOM}{}",
        top(
            "example.com",
            "public",
            "    - names: [www, api]
      records: cn0
      cnames: w3
"
        )
    ));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);

    run(&before, &factory).await;
    let report = run(&after, &factory).await;

    assert_eq!(planned_kinds(&report, "example.com"), vec![OperationKind::Delete]);
    assert!(planned_kinds(&report, "infra.example.net").is_empty());
    assert_eq!(
        report.get("example.com").unwrap().planned[0].key().fqdn,
        "blog.example.com"
    );
    assert!(values(&providers[1].records("example.com"), "blog.example.com", RecordType::CNAME).is_empty());
}

#[tokio::test]
async fn test_foreign_records_survive_and_stale_owned_records_go() {
    let config = load(&format!("{BOTTOM}{}", top("example.com", "public", GROUPS)));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);
    providers[1].seed("example.com", foreign("manual-1", "manual.example.com", "9.9.9.9"));
    providers[1].seed(
        "example.com",
        ActualRecord::new(
            "old-1",
            "old.example.com",
            RecordType::CNAME,
            "gone.infra.example.net.",
            600,
            None,
            Some("TETRAT 2024-01-01 00:00:00".to_string()),
        ),
    );

    let report = run(&config, &factory).await;
    assert!(!report.has_failures());

    let public = providers[1].records("example.com");
    assert!(public.iter().any(|r| r.id == "manual-1"));
    assert!(public.iter().all(|r| r.id != "old-1"));
}

#[tokio::test]
async fn test_dnspod_lines_converge() {
    let config = load(&format!(
        "{BOTTOM}
example.cn:
  layer: top
  backend: dnspod
  auth: {{ account: cn }}
  bottom: infra.example.net
  domains:
    - names: www
      records:
        - cn0
        - {{ value: cn0-v0-ext, line: 境外 }}
"
    ));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("cn", BackendKind::Dnspod),
    ]);

    let first = run(&config, &factory).await;
    assert_eq!(planned_kinds(&first, "example.cn"), vec![OperationKind::Create, OperationKind::Create]);

    let records = providers[1].records("example.cn");
    let overseas = records
        .iter()
        .find(|r| r.key.line() == Some("境外"))
        .expect("line record should exist");
    assert_eq!(overseas.value, "cn0-v0-ext.infra.example.net.");

    let second = run(&config, &factory).await;
    assert_eq!(second.get("example.cn").unwrap().status, DomainStatus::Converged);
}

// ============================================================================
// Externally managed zones
// ============================================================================

#[tokio::test]
async fn test_external_zone_is_read_only() {
    let config = load(
        r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  auth: { account: infra }
  hosts:
    - name: h1
      addresses:
        0: [1.1.1.1]
        10: ~
      mid_names: edge-v0
"#,
    );
    let (factory, providers) = factory_with(&[("infra", BackendKind::Cloudflare)]);
    providers[0].seed(
        "infra.example.net",
        ActualRecord::new(
            "tunnel-1",
            "edge-v0-10.infra.example.net",
            RecordType::CNAME,
            "abc.cfargotunnel.com",
            1,
            None,
            Some("TETRAB 2024-01-01 00:00:00".to_string()),
        ),
    );

    let report = run(&config, &factory).await;
    let bottom = report.get("infra.example.net").unwrap();
    assert!(bottom
        .planned
        .iter()
        .all(|op| op.key().fqdn != "edge-v0-10.infra.example.net"));
    assert!(providers[0]
        .records("infra.example.net")
        .iter()
        .any(|r| r.id == "tunnel-1"));
}

#[tokio::test]
async fn test_external_name_claimed_by_another_host_never_piles_up() {
    let config = load(
        r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  auth: { account: infra }
  hosts:
    - name: h1
      addresses: { 0: [1.1.1.1] }
      mid_names: lab
    - name: h2
      addresses: { 10: null }
      mid_names: lab
"#,
    );
    let (factory, providers) = factory_with(&[("infra", BackendKind::Cloudflare)]);

    for _ in 0..3 {
        let report = run(&config, &factory).await;
        let bottom = report.get("infra.example.net").unwrap();
        assert_eq!(bottom.status, DomainStatus::Invalid);
        assert_eq!(bottom.reason(), Some("ExternalConflict"));
        assert!(bottom.planned.is_empty());
    }
    assert!(providers[0].records("infra.example.net").is_empty());
    assert!(providers[0].applied().is_empty());
}

#[tokio::test]
async fn test_invalid_domain_does_not_block_others() {
    let config = load(&format!(
        "{BOTTOM}{}
broken.example.org:
  layer: bottom
  backend: cloudflare
  auth: {{ account: infra }}
  hosts:
    - name: h9
      addresses:
        10: [10.0.0.1]
      mid_names: x
",
        top("example.com", "public", GROUPS)
    ));
    let (factory, _providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);

    let report = run(&config, &factory).await;
    let broken = report.get("broken.example.org").unwrap();
    assert_eq!(broken.status, DomainStatus::Invalid);
    assert_eq!(broken.reason(), Some("ZoneContradiction"));

    assert_eq!(report.get("infra.example.net").unwrap().status, DomainStatus::Applied);
    assert_eq!(report.get("example.com").unwrap().status, DomainStatus::Applied);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failed_operation_abandons_rest_of_domain_only() {
    let config = load(&format!(
        "{BOTTOM}{}{}",
        top(
            "a.example.com",
            "shared",
            "    - names: [x, y]
      records: cn0
"
        ),
        top(
            "b.example.com",
            "shared",
            "    - names: z
      records: cn0
"
        )
    ));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("shared", BackendKind::Cloudflare),
    ]);
    providers[1].fail_operations_on("x.a.example.com", outage());

    let report = run(&config, &factory).await;

    let a = report.get("a.example.com").unwrap();
    assert_eq!(a.status, DomainStatus::Failed);
    assert_eq!(a.reason(), Some("ProviderUnavailable"));
    assert_eq!(a.failed.as_ref().unwrap().operation.key().fqdn, "x.a.example.com");
    assert_eq!(a.abandoned.len(), 1);
    assert_eq!(a.abandoned[0].key().fqdn, "y.a.example.com");
    assert!(a.applied.is_empty());

    assert_eq!(report.get("b.example.com").unwrap().status, DomainStatus::Applied);
    assert!(providers[1].records("a.example.com").is_empty());
}

#[tokio::test]
async fn test_authentication_failure_cancels_account() {
    let config = load(&format!(
        "{BOTTOM}{}{}{}",
        top(
            "a.example.com",
            "shared",
            "    - names: www
      records: cn0
"
        ),
        top(
            "b.example.com",
            "shared",
            "    - names: www
      records: cn0
"
        ),
        top(
            "c.example.com",
            "other",
            "    - names: www
      records: cn0
"
        )
    ));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("shared", BackendKind::Cloudflare),
        ("other", BackendKind::Cloudflare),
    ]);
    providers[1].fail_fetch("a.example.com", auth_failure());
    providers[1].fail_fetch("b.example.com", auth_failure());

    let report = run(&config, &factory).await;

    let reasons: BTreeSet<&str> = ["a.example.com", "b.example.com"]
        .iter()
        .map(|domain| {
            let domain = report.get(domain).unwrap();
            assert_eq!(domain.status, DomainStatus::Failed);
            domain.reason().unwrap()
        })
        .collect();
    assert_eq!(
        reasons,
        BTreeSet::from(["ProviderAuthenticationFailed", "AccountCancelled"])
    );
    assert!(providers[1].applied().is_empty());

    assert_eq!(report.get("c.example.com").unwrap().status, DomainStatus::Applied);
    assert_eq!(report.get("infra.example.net").unwrap().status, DomainStatus::Applied);
}

#[tokio::test]
async fn test_authentication_failure_during_apply_abandons_queue() {
    let config = load(&format!(
        "{BOTTOM}{}",
        top(
            "a.example.com",
            "shared",
            "    - names: [x, y]
      records: cn0
"
        )
    ));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("shared", BackendKind::Cloudflare),
    ]);
    providers[1].fail_operations_on("x.a.example.com", auth_failure());

    let report = run(&config, &factory).await;
    let a = report.get("a.example.com").unwrap();
    assert_eq!(a.reason(), Some("ProviderAuthenticationFailed"));
    assert_eq!(a.abandoned.len(), 1);

    let retry = run(&config, &factory).await;
    assert_eq!(retry.get("a.example.com").unwrap().reason(), Some("ProviderAuthenticationFailed"));
}

// ============================================================================
// Options and loading
// ============================================================================

#[tokio::test]
async fn test_dry_run_and_selection() {
    let config = load(&format!("{BOTTOM}{}", top("example.com", "public", GROUPS)));
    let (factory, providers) = factory_with(&[
        ("infra", BackendKind::Cloudflare),
        ("public", BackendKind::Cloudflare),
    ]);
    let options = ReconcileOptions {
        dry_run: true,
        force: false,
        domains: vec!["example.com".to_string()],
    };

    let report = reconcile(&config, &factory, &options).await;
    assert_eq!(report.domains.len(), 1);
    let domain = report.get("example.com").unwrap();
    assert_eq!(domain.status, DomainStatus::Planned);
    assert_eq!(domain.planned.len(), 4);
    assert!(providers.iter().all(|p| p.applied().is_empty()));
    assert_eq!(providers[0].fetches(), 0);
}

#[tokio::test]
async fn test_loaded_configuration_with_exec_source() {
    let mut hosts = tempfile::NamedTempFile::new().unwrap();
    write!(
        hosts,
        r#"[{{"name": "h2", "addresses": {{"0": ["3.3.3.3"]}}, "mid_names": "edge"}}]"#
    )
    .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "
infra.example.net:
  layer: bottom
  backend: cloudflare
  auth: {{ account: infra }}
  hosts_from_exec: cat {}
  hosts:
    - name: h1
      addresses: {{ 0: [1.1.1.1] }}
      mid_names: lab
",
        hosts.path().display()
    )
    .unwrap();

    let config = Configuration::load(file.path()).await.unwrap();
    let names: Vec<&str> = config.domains["infra.example.net"]
        .hosts
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(names, vec!["h2", "h1"]);

    let (factory, providers) = factory_with(&[("infra", BackendKind::Cloudflare)]);
    let report = run(&config, &factory).await;
    assert_eq!(report.get("infra.example.net").unwrap().applied.len(), 2);
    assert_eq!(
        values(&providers[0].records("infra.example.net"), "edge.infra.example.net", RecordType::A),
        set(&["3.3.3.3"])
    );
}
