use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use ocp_audit::{
    reproduce, AuditAccumulator, AuditConfig, AuditError, AuditWindow, Auditor, BatchAudit,
    CancelToken, CollectingSink, DataSource, Ed25519Verifier, EntryStatus, LocalFirst,
    MemorySource, Projection, SourceError, StaticKeys,
};
use ocp_canonical::{canonicalize_record, semantic_hash, HashAlgorithm, Record};
use serde_json::{json, Value as Json};

const PRE: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const POST: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

fn base(agent: &str, timestamp: &str) -> Json {
    json!({
        "action_type": "vote",
        "agent_id": agent,
        "content": "{\"proposal\":\"PROP-7\",\"vote\":\"SUPPORT\"}",
        "evidence_pointers": ["ipfs://evidence/1"],
        "constitutional_citation": "Article IV.2",
        "timestamp": timestamp,
        "pre_state_hash": PRE,
        "post_state_hash": POST,
        "signature": "SIG-0123456789abcdef"
    })
}

/// Builds an entry whose stored digest matches its content.
fn sealed(value: Json) -> Record {
    let mut entry = Record::from_json(value).unwrap();
    let projection = Projection::default().extract(&entry);
    let digest = semantic_hash(&projection, HashAlgorithm::Sha256).unwrap();
    entry.insert("semantic_hash", digest.prefixed());
    entry
}

fn entry() -> Record {
    sealed(base("agent-7", "2025-11-20T09:30:00Z"))
}

fn source(ids: &[&str]) -> MemorySource {
    ids.iter().map(|id| (id.to_string(), entry())).collect()
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-11-24T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn ids(batch: &BatchAudit) -> Vec<&str> {
    batch.reports.iter().map(|r| r.entry_id.as_str()).collect()
}

struct Unreachable;

impl DataSource for Unreachable {
    fn get_entry(&self, _id: &str) -> Result<Record, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }
}

/// Cancels its token once `after` fetches have been served.
struct CancelAfter {
    inner: MemorySource,
    token: CancelToken,
    after: usize,
}

impl DataSource for CancelAfter {
    fn get_entry(&self, id: &str) -> Result<Record, SourceError> {
        let result = self.inner.get_entry(id);
        if self.inner.fetch_count() >= self.after {
            self.token.cancel();
        }
        result
    }
}

#[test]
fn intact_entry_passes_every_check() {
    let auditor = Auditor::new(source(&["e-1"])).unwrap();
    let report = auditor.validate_entry("e-1");

    assert_eq!(report.status, EntryStatus::Checked);
    assert!(report.valid, "{:?}", report);
    let hash = report.hash.as_ref().unwrap();
    assert!(hash.valid);
    assert_eq!(hash.original, hash.recomputed);
    assert!(report.signature.as_ref().unwrap().valid);
    assert!(!report.signature.as_ref().unwrap().verified);
    assert!(report.compliance.as_ref().unwrap().compliant);
    assert!(report.state.as_ref().unwrap().valid);
}

#[test]
fn tampered_entry_fails_reproduction_with_both_digests() {
    let mut tampered = entry();
    let original = tampered.get("semantic_hash").cloned().unwrap();
    tampered.insert("content", "{\"proposal\":\"PROP-7\",\"vote\":\"OPPOSE\"}");

    let reproduction = reproduce(&tampered, &Projection::default(), HashAlgorithm::Sha256).unwrap();
    assert!(!reproduction.matches);
    assert_eq!(reproduction.original.as_deref(), original.as_str());
    assert_ne!(Some(reproduction.recomputed.prefixed()), reproduction.original);

    let auditor = Auditor::new(MemorySource::new().with_entry("e-1", tampered)).unwrap();
    let report = auditor.validate_entry("e-1");
    assert!(!report.valid);
    let hash = report.hash.unwrap();
    assert!(!hash.valid);
    assert_eq!(hash.error.as_deref(), Some("hash mismatch"));
    assert!(report.compliance.unwrap().compliant);
}

#[test]
fn stored_digest_comparison_ignores_prefix_and_case() {
    let mut entry = entry();
    let stored = entry.get("semantic_hash").and_then(|v| v.as_str()).unwrap().to_string();
    entry.insert("semantic_hash", stored.trim_start_matches("0x").to_uppercase());
    let reproduction = reproduce(&entry, &Projection::default(), HashAlgorithm::Sha256).unwrap();
    assert!(reproduction.matches);
}

#[test]
fn key_order_and_content_encoding_do_not_change_the_digest() {
    let mut reordered = base("agent-7", "2025-11-20T09:30:00Z");
    reordered["content"] = json!("{\"vote\":\"SUPPORT\",\"proposal\":\"PROP-7\"}");
    let a = reproduce(&entry(), &Projection::default(), HashAlgorithm::Sha256).unwrap();
    let b = reproduce(
        &Record::from_json(reordered).unwrap(),
        &Projection::default(),
        HashAlgorithm::Sha256,
    )
    .unwrap();
    assert_eq!(a.recomputed, b.recomputed);
}

#[test]
fn missing_stored_digest_never_matches() {
    let entry = Record::from_json(base("agent-7", "2025-11-20T09:30:00Z")).unwrap();
    let reproduction = reproduce(&entry, &Projection::default(), HashAlgorithm::Sha256).unwrap();
    assert!(!reproduction.matches);
    assert_eq!(reproduction.original, None);
}

#[test]
fn unknown_entry_is_reported_not_raised() {
    let auditor = Auditor::new(MemorySource::new()).unwrap();
    let report = auditor.validate_entry("entry-404");
    assert!(!report.valid);
    assert_eq!(report.status, EntryStatus::NotFound);
    assert_eq!(report.error.as_deref(), Some("entry not found"));
    assert!(report.hash.is_none());
}

#[test]
fn unreachable_source_is_a_fetch_failure() {
    let auditor = Auditor::new(Unreachable).unwrap();
    let report = auditor.validate_entry("e-1");
    assert!(!report.valid);
    assert_eq!(report.status, EntryStatus::FetchFailed);
    assert!(report.error.unwrap().contains("connection refused"));
}

#[test]
fn unchanged_state_requires_read_only_action() {
    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    value["post_state_hash"] = json!(PRE);
    let auditor = Auditor::new(MemorySource::new()).unwrap();

    let report = auditor.check_entry("e-1", &sealed(value.clone()));
    let state = report.state.unwrap();
    assert!(!state.valid);
    assert!(!report.valid);
    assert!(state.error.unwrap().contains("vote"));

    value["action_type"] = json!("query");
    let report = auditor.check_entry("e-1", &sealed(value.clone()));
    assert!(report.state.unwrap().valid);

    value.as_object_mut().unwrap().remove("post_state_hash");
    let report = auditor.check_entry("e-1", &sealed(value));
    assert_eq!(
        report.state.unwrap().error.as_deref(),
        Some("missing post_state_hash")
    );
}

#[test]
fn evidence_backed_actions_require_evidence() {
    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    value["action_type"] = json!("fraud_proof");
    value["evidence_pointers"] = json!([]);
    let auditor = Auditor::new(MemorySource::new()).unwrap();

    let report = auditor.check_entry("e-1", &sealed(value));
    assert!(report.hash.as_ref().unwrap().valid);
    let compliance = report.compliance.unwrap();
    assert!(!compliance.compliant);
    assert_eq!(compliance.violations[0].field_path, "evidence_pointers");
    assert!(!report.valid);
}

#[test]
fn blank_or_null_compliance_fields_fail_the_entry() {
    let auditor = Auditor::new(MemorySource::new()).unwrap();

    let mut value = base("", "2025-11-20T09:30:00Z");
    value["constitutional_citation"] = Json::Null;
    let report = auditor.check_entry("e-1", &sealed(value));
    assert!(report.hash.as_ref().unwrap().valid);
    assert!(report.signature.as_ref().unwrap().valid);
    let compliance = report.compliance.as_ref().unwrap();
    assert!(!compliance.compliant);
    let fields: Vec<&str> = compliance
        .violations
        .iter()
        .map(|v| v.field_path.as_str())
        .collect();
    assert_eq!(fields, ["agent_id", "constitutional_citation"]);
    assert!(!report.valid);

    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    value["constitutional_citation"] = Json::Null;
    let report = auditor.check_entry("e-2", &sealed(value));
    assert!(!report.compliance.unwrap().compliant);
    assert!(!report.valid);
}

#[test]
fn signature_must_be_present_and_well_formed() {
    let auditor = Auditor::new(MemorySource::new()).unwrap();

    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    value["signature"] = json!("SIG-1");
    let report = auditor.check_entry("e-1", &sealed(value.clone()));
    assert!(!report.signature.unwrap().valid);

    value.as_object_mut().unwrap().remove("signature");
    let report = auditor.check_entry("e-1", &sealed(value));
    assert_eq!(
        report.signature.unwrap().error.as_deref(),
        Some("missing signature")
    );
}

#[test]
fn ed25519_signatures_are_verified_over_the_canonical_projection() {
    let signing = SigningKey::from_bytes(&[42u8; 32]);
    let keys = StaticKeys::new().with_key("agent-7", signing.verifying_key().to_bytes().to_vec());

    let unsigned = Record::from_json(base("agent-7", "2025-11-20T09:30:00Z")).unwrap();
    let message = canonicalize_record(&Projection::default().extract(&unsigned))
        .unwrap()
        .into_bytes();
    let signature = format!(
        "ed25519:{}",
        URL_SAFE_NO_PAD.encode(signing.sign(&message).to_bytes())
    );

    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    value["signature"] = json!(signature);
    let auditor = Auditor::new(MemorySource::new().with_entry("e-1", sealed(value.clone())))
        .unwrap()
        .with_verifier(Ed25519Verifier::with_prefix("ed25519:"), keys);

    let report = auditor.validate_entry("e-1");
    let check = report.signature.as_ref().unwrap();
    assert!(check.valid && check.verified, "{:?}", check);
    assert!(report.valid);

    // Same signature over different content.
    value["constitutional_citation"] = json!("Article IX.1");
    let report = auditor.check_entry("e-2", &sealed(value.clone()));
    assert_eq!(
        report.signature.unwrap().error.as_deref(),
        Some("signature does not verify")
    );

    value["agent_id"] = json!("agent-unknown");
    let report = auditor.check_entry("e-3", &sealed(value));
    assert!(report
        .signature
        .unwrap()
        .error
        .unwrap()
        .starts_with("no public key"));
}

#[test]
fn batch_continues_past_missing_entries() {
    let auditor = Auditor::new(source(&["e-1", "e-3"])).unwrap();
    let batch = auditor.audit_ids(&["e-1", "e-2", "e-3"], &CancelToken::new());

    assert_eq!(ids(&batch), ["e-1", "e-2", "e-3"]);
    assert_eq!(batch.reports[1].status, EntryStatus::NotFound);
    let summary = &batch.summary;
    assert_eq!(summary.requested, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.valid, 2);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.hash_failures, 0);
    assert!((summary.compliance_rate - 2.0 / 3.0).abs() < 1e-12);
    assert!((summary.hash_integrity_rate - 2.0 / 3.0).abs() < 1e-12);
    assert!(!summary.cancelled);
    assert_eq!(batch.stats.hashes_valid, 2);
    assert_eq!(batch.stats.signatures_valid, 2);
}

#[test]
fn cancellation_before_start_yields_an_empty_summary() {
    let auditor = Auditor::new(source(&["e-1", "e-2"])).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let batch = auditor.audit_ids(&["e-1", "e-2"], &cancel);
    assert!(batch.reports.is_empty());
    assert_eq!(batch.summary.requested, 2);
    assert_eq!(batch.summary.processed, 0);
    assert_eq!(batch.summary.compliance_rate, 0.0);
    assert!(batch.summary.cancelled);
    assert_eq!(auditor.source().fetch_count(), 0);
}

#[test]
fn cancellation_mid_batch_stops_further_fetches() {
    let cancel = CancelToken::new();
    let auditor = Auditor::new(CancelAfter {
        inner: source(&["e-1", "e-2", "e-3", "e-4"]),
        token: cancel.clone(),
        after: 2,
    })
    .unwrap();

    let batch = auditor.audit_ids(&["e-1", "e-2", "e-3", "e-4"], &cancel);
    assert_eq!(ids(&batch), ["e-1", "e-2"]);
    assert_eq!(batch.summary.processed, 2);
    assert_eq!(batch.summary.requested, 4);
    assert!(batch.summary.cancelled);
    assert_eq!(auditor.source().inner.fetch_count(), 2);
}

#[test]
fn parallel_audit_preserves_order_and_counts() {
    let mut source = source(&["e-01", "e-02", "e-04", "e-05", "e-07", "e-08"]);
    let mut tampered = entry();
    tampered.insert("timestamp", "2025-11-21T00:00:00Z");
    source.insert("e-05", tampered);
    let auditor = Auditor::new(source).unwrap();

    let requested: Vec<String> = (1..=8).map(|n| format!("e-{:02}", n)).collect();
    let sequential = auditor.audit_ids(&requested, &CancelToken::new());
    let parallel = auditor.audit_ids_parallel(&requested, &CancelToken::new());

    assert_eq!(ids(&parallel), requested.iter().map(String::as_str).collect::<Vec<_>>());
    for (a, b) in sequential.reports.iter().zip(&parallel.reports) {
        assert_eq!(a.status, b.status);
        assert_eq!(a.valid, b.valid);
        assert_eq!(a.hash, b.hash);
    }
    let (s, p) = (&sequential.summary, &parallel.summary);
    assert_eq!(
        (s.processed, s.valid, s.not_found, s.hash_failures),
        (p.processed, p.valid, p.not_found, p.hash_failures)
    );
    assert_eq!((p.processed, p.valid, p.not_found, p.hash_failures), (8, 5, 2, 1));
}

#[test]
fn parallel_audit_honours_cancellation() {
    let auditor = Auditor::new(source(&["e-1", "e-2"])).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let batch = auditor.audit_ids_parallel(&["e-1", "e-2"], &cancel);
    assert_eq!(batch.summary.processed, 0);
    assert!(batch.summary.cancelled);
}

#[test]
fn parallel_cancellation_mid_batch_yields_partial_summary() {
    let requested: Vec<String> = (0..64).map(|n| format!("e-{:03}", n)).collect();
    let names: Vec<&str> = requested.iter().map(String::as_str).collect();
    let cancel = CancelToken::new();
    let auditor = Auditor::new(CancelAfter {
        inner: source(&names),
        token: cancel.clone(),
        after: 3,
    })
    .unwrap();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap();
    let batch = pool.install(|| auditor.audit_ids_parallel(&requested, &cancel));
    let summary = &batch.summary;

    assert!(summary.cancelled);
    assert_eq!(summary.requested, 64);
    assert!(summary.processed >= 3 && summary.processed < 64, "{:?}", summary);
    assert_eq!(summary.processed, batch.reports.len());
    assert_eq!(auditor.source().inner.fetch_count(), summary.processed);
    assert_eq!(summary.valid, summary.processed);

    let positions: Vec<usize> = ids(&batch)
        .iter()
        .map(|id| names.iter().position(|n| n == id).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
}

#[test]
fn local_source_is_preferred_and_remote_used_on_miss() {
    let local = MemorySource::new().with_entry("e-1", entry());
    let remote = MemorySource::new().with_entry("e-2", entry());
    let composite = LocalFirst::new(&local, &remote);

    assert!(composite.get_entry("e-1").is_ok());
    assert_eq!(remote.fetch_count(), 0);

    assert!(composite.get_entry("e-2").is_ok());
    assert_eq!(local.fetch_count(), 2);
    assert_eq!(remote.fetch_count(), 1);

    assert_eq!(
        composite.get_entry("e-3"),
        Err(SourceError::NotFound("e-3".to_string()))
    );
}

#[test]
fn failing_local_source_falls_back_to_remote() {
    let remote = MemorySource::new().with_entry("e-1", entry());
    let auditor = Auditor::new(LocalFirst::new(Unreachable, &remote)).unwrap();
    assert!(auditor.validate_entry("e-1").valid);
    assert_eq!(remote.fetch_count(), 1);
}

#[test]
fn agent_audit_covers_the_requested_window() {
    let source: MemorySource = [
        ("a-1", "agent-7", "2025-11-20T09:30:00Z"),
        ("a-2", "agent-7", "2025-11-01T12:00:00Z"),
        ("a-3", "agent-7", "2025-06-01T12:00:00Z"),
        ("b-1", "agent-9", "2025-11-23T12:00:00Z"),
    ]
    .iter()
    .map(|(id, agent, ts)| (id.to_string(), sealed(base(agent, ts))))
    .collect();
    let auditor = Auditor::new(source).unwrap();
    let cancel = CancelToken::new();

    let week = auditor
        .audit_agent("agent-7", AuditWindow::Week, now(), &cancel)
        .unwrap();
    assert_eq!(ids(&week), ["a-1"]);

    let month = auditor
        .audit_agent("agent-7", AuditWindow::default(), now(), &cancel)
        .unwrap();
    assert_eq!(ids(&month), ["a-1", "a-2"]);

    let year = auditor
        .audit_agent("agent-7", "1y".parse().unwrap(), now(), &cancel)
        .unwrap();
    assert_eq!(ids(&year), ["a-1", "a-2", "a-3"]);
    assert_eq!(year.summary.valid, 3);
}

#[test]
fn range_audit_uses_source_ordering() {
    let auditor = Auditor::new(source(&["e-001", "e-002", "e-003", "e-004", "e-005"])).unwrap();
    let batch = auditor
        .audit_range("e-002", "e-004", &CancelToken::new())
        .unwrap();
    assert_eq!(ids(&batch), ["e-002", "e-003", "e-004"]);
    assert_eq!(batch.summary.valid, 3);
}

#[test]
fn listing_without_support_is_an_error() {
    let auditor = Auditor::new(Unreachable).unwrap();
    let result = auditor.audit_range("e-1", "e-9", &CancelToken::new());
    assert!(matches!(
        result,
        Err(AuditError::Source(SourceError::Unsupported("list_range")))
    ));
}

#[test]
fn batch_publishes_reports_then_summary() {
    let auditor = Auditor::new(source(&["e-1"])).unwrap();
    let batch = auditor.audit_ids(&["e-1", "e-2"], &CancelToken::new());

    let mut sink = CollectingSink::new();
    batch.publish(&mut sink).unwrap();
    assert_eq!(sink.reports, batch.reports);
    assert_eq!(sink.summaries, vec![batch.summary.clone()]);
}

#[test]
fn merged_accumulators_equal_a_single_pass() {
    let auditor = Auditor::new(source(&["e-1", "e-3"])).unwrap();
    let reports: Vec<_> = ["e-1", "e-2", "e-3"]
        .iter()
        .map(|id| auditor.validate_entry(id))
        .collect();

    let mut single = AuditAccumulator::new();
    reports.iter().for_each(|r| single.record(r));

    let mut left = AuditAccumulator::new();
    let mut right = AuditAccumulator::new();
    left.record(&reports[0]);
    right.record(&reports[1]);
    right.record(&reports[2]);
    left.merge(&right);

    assert_eq!(left.snapshot(), single.snapshot());
    assert_eq!(single.snapshot().entries_processed, 3);
    assert_eq!(single.snapshot().not_found, 1);
}

#[test]
fn alternative_algorithm_is_configurable() {
    let mut value = base("agent-7", "2025-11-20T09:30:00Z");
    let projected = Projection::default().extract(&Record::from_json(value.clone()).unwrap());
    value["semantic_hash"] = json!(semantic_hash(&projected, HashAlgorithm::Sha3_256)
        .unwrap()
        .prefixed());

    let config = AuditConfig {
        algorithm: HashAlgorithm::Sha3_256,
        ..AuditConfig::default()
    };
    let auditor = Auditor::with_config(MemorySource::new(), config).unwrap();
    let report = auditor.check_entry("e-1", &Record::from_json(value).unwrap());
    assert!(report.hash.unwrap().valid);
}
