// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `graph.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::Configuration;

    const CONFIG: &str = r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses:
        0: [1.1.1.1, "::1"]
        1: [2.2.2.2]
      mid_names:
        - { name: cn0-v0, current: true, current_zone: 0 }

example.com:
  layer: top
  backend: dnspod
  bottom: infra.example.net
  domains:
    - names: ["@", www]
      records:
        - cn0
        - { value: cn0-v0-ext, line: 境外 }
      cnames: w3
"#;

    fn load(yaml: &str) -> Configuration {
        Configuration::from_yaml_str(yaml).unwrap()
    }

    fn values(compiled: &CompiledDomain, fqdn: &str, record_type: RecordType, line: Option<&str>) -> Option<Vec<String>> {
        compiled
            .get(&RecordKey::new(fqdn, record_type, line))
            .map(|record| record.values.iter().cloned().collect())
    }

    #[test]
    fn test_bottom_end_to_end() {
        let config = load(CONFIG);
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();

        assert_eq!(
            values(&compiled, "cn0-v0-ip4.infra.example.net", RecordType::A, None),
            Some(vec!["1.1.1.1".to_string()])
        );
        assert_eq!(
            values(&compiled, "cn0-v0-ip6.infra.example.net", RecordType::AAAA, None),
            Some(vec!["::1".to_string()])
        );
        assert_eq!(
            values(&compiled, "cn0-v0-ext.infra.example.net", RecordType::A, None),
            Some(vec!["2.2.2.2".to_string()])
        );
        assert_eq!(
            values(&compiled, "cn0.infra.example.net", RecordType::A, None),
            Some(vec!["1.1.1.1".to_string()])
        );
        assert_eq!(
            values(&compiled, "cn0.infra.example.net", RecordType::AAAA, None),
            Some(vec!["::1".to_string()])
        );

        assert!(compiled
            .records
            .iter()
            .all(|record| record.fqdn() != "cn0-v0.infra.example.net"));
        assert_eq!(compiled.records.len(), 5);
    }

    #[test]
    fn test_bottom_ttls() {
        let config = load(CONFIG);
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();

        let ext = compiled
            .get(&RecordKey::new("cn0-v0-ext.infra.example.net", RecordType::A, None))
            .unwrap();
        assert_eq!(ext.ttl, 86400);

        let canonical = compiled
            .get(&RecordKey::new("cn0.infra.example.net", RecordType::A, None))
            .unwrap();
        assert_eq!(canonical.ttl, 1);
    }

    #[test]
    fn test_domain_ttl_overrides_defaults() {
        let mut config = load(CONFIG);
        config.domains.get_mut("infra.example.net").unwrap().ttl = Some(300);

        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();
        assert!(compiled.records.iter().all(|record| record.ttl == 300));
    }

    #[test]
    fn test_zone_ten_is_excluded_and_tracked() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses:
        0: 1.1.1.1
        10: null
      mid_names: web-v1
"#,
        );
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();

        assert!(compiled.is_external("web-v1-10.infra.example.net"));
        assert!(compiled
            .records
            .iter()
            .all(|record| record.fqdn() != "web-v1-10.infra.example.net"));
    }

    #[test]
    fn test_reference_addresses_become_cnames() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses:
        0: 1.1.1.1
        1: Tunnel.Example.org
      mid_names: web-v1
"#,
        );
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();

        assert_eq!(
            values(&compiled, "web-v1-ext.infra.example.net", RecordType::CNAME, None),
            Some(vec!["tunnel.example.org.".to_string()])
        );
    }

    #[test]
    fn test_multiple_addresses_share_one_record_set() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses: [1.1.1.1, 1.1.1.2]
      mid_names: lab
"#,
        );
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();

        assert_eq!(
            values(&compiled, "lab.infra.example.net", RecordType::A, None),
            Some(vec!["1.1.1.1".to_string(), "1.1.1.2".to_string()])
        );
    }

    #[test]
    fn test_conflicting_hosts_rejected() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses: 1.1.1.1
      mid_names: lab
    - name: h2
      addresses: 2.2.2.2
      mid_names: lab
"#,
        );
        let error = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap_err();

        assert!(matches!(
            error,
            DomainError::Compilation(CompilationError::RecordConflict { ref fqdn, .. }) if fqdn == "lab.infra.example.net"
        ));
    }

    #[test]
    fn test_identical_duplicates_accepted() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses: 1.1.1.1
      mid_names: lab
    - name: h2
      addresses: 1.1.1.1
      mid_names: lab
"#,
        );
        let compiled = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap();
        assert_eq!(compiled.records.len(), 1);
    }

    #[test]
    fn test_cname_coexistence_rejected() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses: [1.1.1.1, edge.example.org]
      mid_names: lab
"#,
        );
        let error = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap_err();

        assert!(matches!(
            error,
            DomainError::Compilation(CompilationError::CnameCoexistence { .. })
        ));
    }

    #[test]
    fn test_external_name_with_records_rejected() {
        let config = load(
            r#"
infra.example.net:
  layer: bottom
  backend: cloudflare
  hosts:
    - name: h1
      addresses: { 0: [1.1.1.1] }
      mid_names: lab
    - name: h2
      addresses: { 10: null }
      mid_names: lab
"#,
        );
        let error = compile_bottom("infra.example.net", &config.domains["infra.example.net"]).unwrap_err();

        assert!(matches!(
            error,
            DomainError::Compilation(CompilationError::ExternalConflict { ref fqdn }) if fqdn == "lab.infra.example.net"
        ));
        assert_eq!(error.status_reason(), "ExternalConflict");
    }

    #[test]
    fn test_top_records_resolve_against_bottom() {
        let config = load(CONFIG);
        let compiled = compile_top("example.com", &config.domains["example.com"]).unwrap();

        assert_eq!(
            values(&compiled, "example.com", RecordType::CNAME, None),
            Some(vec!["cn0.infra.example.net.".to_string()])
        );
        assert_eq!(
            values(&compiled, "www.example.com", RecordType::CNAME, Some("境外")),
            Some(vec!["cn0-v0-ext.infra.example.net.".to_string()])
        );
        assert!(compiled.records.iter().all(|record| record.ttl == 600));
    }

    #[test]
    fn test_top_cname_aliases_point_at_first_name() {
        let config = load(CONFIG);
        let compiled = compile_top("example.com", &config.domains["example.com"]).unwrap();

        assert_eq!(
            values(&compiled, "w3.example.com", RecordType::CNAME, None),
            Some(vec!["example.com.".to_string()])
        );
    }

    #[test]
    fn test_fully_qualified_values_are_kept() {
        let config = load(
            r#"
example.com:
  layer: top
  backend: cloudflare
  domains:
    - names: www
      records: edge.other.org.
    - names: ip
      records: 192.0.2.1
"#,
        );
        let compiled = compile_top("example.com", &config.domains["example.com"]).unwrap();

        assert_eq!(
            values(&compiled, "www.example.com", RecordType::CNAME, None),
            Some(vec!["edge.other.org.".to_string()])
        );
        assert_eq!(
            values(&compiled, "ip.example.com", RecordType::A, None),
            Some(vec!["192.0.2.1".to_string()])
        );
    }

    #[test]
    fn test_unqualified_value_without_bottom_rejected() {
        let config = load(
            "example.com:\n  layer: top\n  backend: cloudflare\n  domains:\n    - names: www\n      records: edge\n",
        );
        let error = compile_top("example.com", &config.domains["example.com"]).unwrap_err();

        assert!(matches!(
            error,
            DomainError::Validation(ConfigValidationError::MissingBottomReference { .. })
        ));
    }

    #[test]
    fn test_group_with_two_cname_targets_rejected() {
        let config = load(
            r#"
example.com:
  layer: top
  backend: cloudflare
  bottom: infra.example.net
  domains:
    - names: www
      records: [edge-a, edge-b]
"#,
        );
        let error = compile_top("example.com", &config.domains["example.com"]).unwrap_err();

        assert!(matches!(
            error,
            DomainError::Compilation(CompilationError::RecordConflict { .. })
        ));
    }

    #[test]
    fn test_qualify_labels() {
        assert_eq!(qualify("@", "Example.com."), "example.com");
        assert_eq!(qualify("www", "example.com"), "www.example.com");
        assert!(needs_bottom("edge"));
        assert!(!needs_bottom("edge.example.org."));
        assert!(!needs_bottom("2001:db8::1"));
    }
}
