use serde_json::{Value, json};

use form_spec::{
    AnswerOutcome, AnswerSet, EngineConfig, FormEngine, ResetPolicy, evaluate_relevance,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "household_visit" => include_str!("../tests/fixtures/household_visit.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn engine() -> FormEngine {
    FormEngine::from_json(fixture("household_visit"), EngineConfig::default()).expect("engine")
}

fn option_values(engine: &FormEngine, name: &str, answers: &AnswerSet) -> Vec<String> {
    engine
        .resolve_options(name, answers)
        .expect("known field")
        .into_iter()
        .map(|option| option.value)
        .collect()
}

#[test]
fn kwilu_keeps_only_matching_and_unfiltered_zones() {
    let engine = engine();
    let answers = AnswerSet::from_value(&json!({ "province": "kwilu" }));
    assert_eq!(option_values(&engine, "zone", &answers), ["kikwit", "unlisted"]);

    let answers = AnswerSet::from_value(&json!({ "province": "kinshasa" }));
    assert_eq!(
        option_values(&engine, "zone", &answers),
        ["gombe", "limete", "unlisted"]
    );
    assert_eq!(
        option_values(&engine, "zone", &AnswerSet::new()),
        ["gombe", "limete", "kikwit", "unlisted"]
    );
}

#[test]
fn province_without_filters_returns_only_unfiltered_option() {
    let engine = FormEngine::from_value(
        &json!({
            "properties": {
                "province": { "type": "string", "enum": ["kinshasa", "kwilu"] },
                "zone": {
                    "type": "string",
                    "x-type": "select_one",
                    "x-options": [
                        { "label": "Gombe", "value": "gombe", "filter": "${province}='kinshasa'" },
                        { "label": "Any", "value": "any" }
                    ]
                }
            }
        }),
        EngineConfig::default(),
    );
    let answers = AnswerSet::from_value(&json!({ "province": "kwilu" }));
    assert_eq!(option_values(&engine, "zone", &answers), ["any"]);
}

#[test]
fn health_area_is_filtered_by_inferred_zone() {
    let engine = engine();
    let answers = AnswerSet::from_value(&json!({ "province": "kwilu", "zone": "kikwit" }));
    assert_eq!(option_values(&engine, "aire_sante", &answers), ["kikwit_nord"]);
}

#[test]
fn changing_a_parent_clears_its_dependents() {
    let engine = FormEngine::from_value(
        &json!({
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string", "x-depends-on": "a" }
            }
        }),
        EngineConfig::default(),
    );
    for new_value in [json!("one"), json!("two"), json!("")] {
        let mut session =
            engine.session_with(AnswerSet::from_value(&json!({ "a": "zero", "b": "set" })));
        let update = session.set_answer("a", new_value).expect("known field");
        assert_eq!(update.outcome, AnswerOutcome::Accepted { cleared: vec!["b".to_string()] });
        assert!(!session.answers().contains("b"));
    }
}

#[test]
fn regex_constraint_rejects_and_retains_previous_value() {
    let engine = engine();
    let mut session = engine.session();
    session.set_answer("phone", json!("0991234567")).expect("known field");

    let update = session.set_answer("phone", json!("12345")).expect("known field");
    match &update.outcome {
        AnswerOutcome::Rejected { error } => {
            assert_eq!(error.code.as_deref(), Some("constraint"));
            assert_eq!(error.field.as_deref(), Some("phone"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(session.answers().get("phone"), Some(&json!("0991234567")));
    assert!(update.evaluation.errors_by_field.contains_key("phone"));

    let update = session.set_answer("phone", json!("0991234567")).expect("known field");
    assert!(update.outcome.is_accepted());
    assert!(!update.evaluation.errors_by_field.contains_key("phone"));
}

#[test]
fn garbled_relevance_keeps_field_visible() {
    let engine = FormEngine::from_value(
        &json!({
            "properties": {
                "shown": { "type": "string", "x-relevant": "frobnicate(x)" },
                "half": { "type": "string", "x-relevant": "${a} = 'b' and ${c} = 'd'" }
            }
        }),
        EngineConfig::default(),
    );
    let visibility = engine.evaluate_visibility(&AnswerSet::new());
    assert_eq!(visibility.get("shown"), Some(&true));
    assert_eq!(visibility.get("half"), Some(&true));
    assert!(evaluate_relevance("frobnicate(x)", &AnswerSet::new()));
    assert_eq!(engine.lint().len(), 2);
}

#[test]
fn relevance_drives_the_visible_list() {
    let engine = engine();
    let mut session = engine.session();
    let visible = |session: &form_spec::FormSession<'_>| session.evaluate().visible;

    assert!(!visible(&session).contains(&"children_under_five".to_string()));
    session.set_answer("members", json!(4)).expect("known field");
    assert!(visible(&session).contains(&"children_under_five".to_string()));
    session.set_answer("children_under_five", json!(2)).expect("known field");
    assert!(visible(&session).contains(&"vaccinated".to_string()));
    session.set_answer("vaccinated", json!("no")).expect("known field");
    assert!(visible(&session).contains(&"refusal_reason".to_string()));

    session.set_answer("symptoms", json!(["fever", "cough"])).expect("known field");
    assert!(visible(&session).contains(&"referral".to_string()));

    let update = session.set_answer("members", json!(1)).expect("known field");
    assert_eq!(
        update.outcome,
        AnswerOutcome::Accepted { cleared: vec!["children_under_five".to_string()] }
    );
    assert!(!update.evaluation.is_visible("children_under_five"));
    assert!(!update.evaluation.is_visible("vaccinated"));
    // One level only: the stale "vaccinated" answer survives, hidden.
    assert_eq!(session.answers().get("vaccinated"), Some(&json!("no")));
}

#[test]
fn transitive_policy_clears_the_whole_chain() {
    let config = EngineConfig {
        reset_policy: ResetPolicy::Transitive,
        ..EngineConfig::default()
    };
    let engine = FormEngine::from_json(fixture("household_visit"), config).expect("engine");
    let mut session = engine.session();
    for (name, value) in [
        ("members", json!(3)),
        ("children_under_five", json!(1)),
        ("vaccinated", json!("no")),
        ("refusal_reason", json!("travelling")),
    ] {
        session.set_answer(name, value).expect("known field");
    }
    let update = session.set_answer("members", json!(2)).expect("known field");
    assert_eq!(
        update.outcome,
        AnswerOutcome::Accepted {
            cleared: vec![
                "children_under_five".to_string(),
                "vaccinated".to_string(),
                "refusal_reason".to_string(),
            ]
        }
    );
}

#[test]
fn unknown_fields_and_missing_required_are_reported() {
    let engine = engine();
    let answers: AnswerSet = [
        ("province".to_string(), json!("kwilu")),
        ("zone".to_string(), json!("gombe")),
        ("stray".to_string(), Value::Bool(true)),
    ]
    .into_iter()
    .collect();
    let result = engine.validate(&answers);
    assert!(!result.valid);
    assert_eq!(result.missing_required, ["head_name", "members"]);
    assert_eq!(result.unknown_fields, ["stray"]);
    let codes: Vec<_> = result
        .errors
        .iter()
        .map(|error| (error.field.as_deref(), error.code.as_deref()))
        .collect();
    assert_eq!(codes, [(Some("zone"), Some("option_not_eligible"))]);
}

#[test]
fn complete_submission_is_valid() {
    let engine = engine();
    let answers = AnswerSet::from_value(&json!({
        "province": "kinshasa",
        "zone": "gombe",
        "aire_sante": "gombe_a",
        "head_name": "Mbuyi Kalala",
        "phone": "0991234567",
        "members": 1,
        "device_id": "tablet-07"
    }));
    let result = engine.validate(&answers);
    assert!(result.valid, "{:?}", result);
}
