// Integration tests for Group Assign

use group_assign::core::{gender_key, normalize};
use group_assign::models::{
    BucketKind, CanonicalField, EngineConfig, FieldCandidates, FieldMapping, RawRecord,
};
use group_assign::{Assigner, AssignmentReport};
use serde_json::json;
use std::collections::HashSet;

fn record(value: serde_json::Value) -> RawRecord {
    serde_json::from_value(value).expect("fixture is an object")
}

/// Spreadsheet-shaped row with the headers a typical export carries
fn create_test_record(
    id: &str,
    sex: &str,
    preference: &str,
    province: &str,
    city: &str,
) -> RawRecord {
    record(json!({
        "Participant ID": id,
        "Email Address": format!("{}@cohort.ph", id),
        "Sex": sex,
        "Gender Identity": if sex == "F" { "Woman" } else { "Man" },
        "Gender Preference": preference,
        "Country": "Philippines",
        "Province": province,
        "City": city,
        "Local Resident": "Yes",
        "Eligible": "TRUE",
        "Coach": "Liza"
    }))
}

fn detect(records: &[RawRecord]) -> FieldMapping {
    let headers = FieldMapping::headers_of(records);
    let report = FieldMapping::detect(headers, &FieldCandidates::default());
    assert!(report.is_complete(), "unresolved: {:?}", report.unresolved_required);
    report.mapping
}

/// Deterministic pseudo-random roster covering every stage
///
/// Rows carry no names so the alias pass leaves every email distinct.
fn synthetic_roster(size: usize) -> Vec<RawRecord> {
    const CITIES: &[(&str, &str)] = &[
        ("Metro Manila", "Manila"),
        ("Metro Manila", "Quezon City"),
        ("Metro Manila", "Makati"),
        ("Cebu", "Cebu City"),
        ("Laguna", "Calamba"),
        ("Davao del Sur", "Davao City"),
    ];
    const ABROAD: &[(&str, &str)] = &[
        ("Singapore", ""),
        ("Japan", "Tokyo"),
        ("United States", "California"),
        ("United Kingdom", "England"),
        ("Canada", "Ontario"),
    ];
    const PREFERENCES: &[&str] = &["Same gender", "No preference", "Mixed please"];

    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move |bound: usize| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % bound as u64) as usize
    };

    (0..size)
        .map(|i| {
            let local = next(3) > 0;
            let (region, place) = if local {
                CITIES[next(CITIES.len())]
            } else {
                let (country, state) = ABROAD[next(ABROAD.len())];
                (state, country)
            };
            let buddies = if next(6) == 0 {
                json!([format!("p{}@cohort.ph", next(size))])
            } else {
                json!("")
            };
            let team = if next(10) == 0 { format!("Team {}", next(4)) } else { String::new() };

            record(json!({
                "id": format!("p{}", i),
                "email": format!("p{}@cohort.ph", i),
                "sex": if next(2) == 0 { "Female" } else { "Male" },
                "gender identity": if next(15) == 0 { "Non-binary" } else { "Cis" },
                "gender preference": PREFERENCES[next(PREFERENCES.len())],
                "country": if local { "Philippines" } else { place },
                "province": region,
                "city": if local { place } else { "" },
                "local resident": if local { "yes" } else { "no" },
                "solo": if next(25) == 0 { "yes" } else { "" },
                "eligible": if next(20) == 0 { "no" } else { "" },
                "buddy requests": buddies,
                "team": team,
            }))
        })
        .collect()
}

#[test]
fn test_integration_end_to_end_assignment() {
    let mut records: Vec<RawRecord> = (0..6)
        .map(|i| {
            create_test_record(&format!("f{}", i), "F", "Same gender", "Metro Manila", "Manila")
        })
        .collect();
    records.push(create_test_record("m0", "M", "Same gender", "Metro Manila", "Manila"));

    let mapping = detect(&records);
    let result = Assigner::with_defaults()
        .assign_records(&records, &mapping)
        .expect("assignment succeeds");

    // Six Manila women: a full five plus a one-person remainder, never six
    let sizes: Vec<_> = result.regular.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![5, 1, 1]);
    assert_eq!(result.regular[0].label, "Female - Manila");
    assert_eq!(result.regular[2].label, "Male - Manila");

    // Unmapped columns survive for the exporter
    let first = &result.regular[0].members[0];
    assert_eq!(first.attributes.get("Coach").map(String::as_str), Some("Liza"));
}

#[test]
fn test_one_directional_request_forms_group() {
    let mut a = create_test_record("a", "F", "No preference", "Cebu", "Cebu City");
    a.insert("Buddy Requests".into(), json!("['b@cohort.ph']"));
    let b = create_test_record("b", "M", "Same gender", "Laguna", "Calamba");
    let c = create_test_record("c", "F", "No preference", "Cebu", "Cebu City");
    let records = vec![a, b, c];

    let result = Assigner::with_defaults()
        .assign_records(&records, &detect(&records))
        .expect("assignment succeeds");

    assert_eq!(result.requested_or_team.len(), 1);
    let group = &result.requested_or_team[0];
    assert_eq!(group.kind, BucketKind::Requested);
    assert_eq!(group.member_ids(), vec!["a", "b"]);
    assert_eq!(result.regular.len(), 1);
    assert_eq!(result.regular[0].member_ids(), vec!["c"]);
}

#[test]
fn test_team_of_twelve() {
    let records: Vec<RawRecord> = (0..12)
        .map(|i| {
            let id = format!("t{:02}", i);
            let mut r = create_test_record(&id, "F", "Same gender", "Cebu", "Cebu City");
            r.insert("Team".into(), json!("Phoenix"));
            r
        })
        .collect();

    let result = Assigner::with_defaults()
        .assign_records(&records, &detect(&records))
        .expect("assignment succeeds");

    let sizes: Vec<_> = result.requested_or_team.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![5, 5, 2]);
    assert_eq!(result.requested_or_team[2].member_ids(), vec!["t10", "t11"]);
    assert!(result.regular.is_empty());
}

#[test]
fn test_ineligible_never_grouped() {
    let mut x = create_test_record("x", "F", "Same gender", "Cebu", "Cebu City");
    x.insert("Eligible".into(), json!("no"));
    x.insert("Team".into(), json!("Phoenix"));
    let mut y = create_test_record("y", "F", "Same gender", "Cebu", "Cebu City");
    y.insert("Team".into(), json!("Phoenix"));
    y.insert("Buddy Requests".into(), json!("x@cohort.ph"));
    let records = vec![x, y];

    let result = Assigner::with_defaults()
        .assign_records(&records, &detect(&records))
        .expect("assignment succeeds");

    assert_eq!(result.excluded.len(), 1);
    assert_eq!(result.excluded[0].id, "x");
    assert!(result.bucket_of("x").is_none());
    assert!(result.requested_or_team.is_empty());
    assert_eq!(result.diagnostics.unknown_references, 1);
}

#[test]
fn test_alias_email_joins_requested_group() {
    let mut a = create_test_record("a", "F", "Same gender", "Cebu", "Cebu City");
    a.insert("Full Name".into(), json!("Bea Alonzo"));
    a.insert("Email Address".into(), json!("bea.alonzo@cohort.ph"));
    let mut b = create_test_record("b", "F", "Same gender", "Cebu", "Cebu City");
    b.insert("Full Name".into(), json!("Bea Alonzo"));
    b.insert("Email Address".into(), json!("bea.alonzo1998@cohort.ph"));
    let mut c = create_test_record("c", "F", "Same gender", "Laguna", "Calamba");
    c.insert("Buddy Requests".into(), json!("bea.alonzo1998@cohort.ph"));
    let records = vec![a, b, c];

    let mapping = detect(&records);
    let roster = normalize(&records, &mapping, &EngineConfig::default()).expect("normalizes");
    assert_eq!(roster.aliases.resolve("bea.alonzo1998@cohort.ph"), "bea.alonzo@cohort.ph");

    let result = Assigner::with_defaults().assign(roster).expect("assignment succeeds");
    assert_eq!(result.diagnostics.alias_entries, 1);
    assert_eq!(result.requested_or_team.len(), 1);
    assert_eq!(result.requested_or_team[0].member_ids(), vec!["a", "b", "c"]);
}

#[test]
fn test_missing_required_headers_reported() {
    let records = vec![record(json!({"id": "1", "email": "a@b.com"}))];
    let headers = FieldMapping::headers_of(&records);
    let report = FieldMapping::detect(headers, &FieldCandidates::default());

    assert_eq!(
        report.unresolved_required,
        vec![CanonicalField::GenderIdentity, CanonicalField::GenderPreference]
    );
    assert!(Assigner::with_defaults().assign_records(&records, &report.mapping).is_err());
}

#[test]
fn test_partition_completeness_and_capacity() {
    let records = synthetic_roster(400);
    let mapping = detect(&records);
    let config = EngineConfig::default();
    let result = Assigner::new(config.clone())
        .expect("valid config")
        .assign_records(&records, &mapping)
        .expect("assignment succeeds");

    let ids: Vec<&str> = result.placed_ids().collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 400);
    assert_eq!(unique.len(), 400);

    for bucket in result.buckets() {
        assert!(!bucket.is_empty(), "empty bucket {}", bucket.label);
        assert!(bucket.len() <= config.capacity, "oversized bucket {}", bucket.label);
    }

    for bucket in &result.solo {
        assert_eq!(bucket.len(), 1);
    }
    assert!(result.excluded.iter().all(|p| !p.is_eligible()));
}

#[test]
fn test_regular_buckets_are_gender_pure() {
    let records = synthetic_roster(400);
    let config = EngineConfig::default();
    let result = Assigner::with_defaults()
        .assign_records(&records, &detect(&records))
        .expect("assignment succeeds");

    for bucket in &result.regular {
        let key = gender_key(&bucket.members[0], &config.non_binary_identities);
        assert!(
            bucket.members.iter().all(|m| gender_key(m, &config.non_binary_identities) == key),
            "bucket {} mixes gender keys",
            bucket.label
        );
    }
}

#[test]
fn test_deterministic_runs() {
    let records = synthetic_roster(300);
    let mapping = detect(&records);
    let assigner = Assigner::with_defaults();

    let first = assigner.assign_records(&records, &mapping).expect("first run");
    let second = assigner.assign_records(&records, &mapping).expect("second run");

    assert_eq!(first, second);
}

#[test]
fn test_requested_pairs_share_origin() {
    let records = synthetic_roster(300);
    let mapping = detect(&records);
    let roster = normalize(&records, &mapping, &EngineConfig::default()).expect("normalizes");
    let requests: Vec<(String, Vec<String>)> = roster
        .participants
        .iter()
        .map(|p| (p.id.clone(), p.raw_buddy_requests.clone()))
        .collect();

    let result = Assigner::with_defaults().assign(roster).expect("assignment succeeds");
    let deduplicated: HashSet<String> =
        result.diagnostics.deduplicated_requests.iter().cloned().collect();

    for (requester, buddies) in requests {
        if deduplicated.contains(&requester) {
            continue;
        }
        let Some(source) = result.bucket_of(&requester) else { continue };
        for buddy in buddies {
            let buddy_id = buddy.trim_end_matches("@cohort.ph");
            if buddy_id == requester {
                continue;
            }
            let Some(target) = result.bucket_of(buddy_id) else { continue };
            assert_eq!(
                source.kind,
                BucketKind::Requested,
                "{} should be in a requested group",
                requester
            );
            assert_eq!(
                source.origin, target.origin,
                "{} and {} split across components",
                requester, buddy_id
            );
        }
    }
}

#[test]
fn test_report_renders_every_bucket() {
    let records = synthetic_roster(120);
    let result = Assigner::with_defaults()
        .assign_records(&records, &detect(&records))
        .expect("assignment succeeds");

    let report = AssignmentReport::from_result(&result, uuid::Uuid::new_v4());
    assert_eq!(report.totals.participants, 120);
    assert_eq!(report.totals.buckets, result.buckets().count());
    assert_eq!(report.regular.len(), result.regular.len());
    for (view, bucket) in report.regular.iter().zip(&result.regular) {
        assert_eq!(view.size, bucket.len());
        assert_eq!(view.same_locality, bucket.same_locality);
    }

    let json = serde_json::to_value(&report).expect("serializes");
    assert!(json.get("requestedOrTeam").is_some());
}
