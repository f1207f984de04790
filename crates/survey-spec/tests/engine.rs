use serde_json::json;

use survey_spec::{
    AnswerStore, AnswerValue, Condition, InlineSchema, MemoryPersistence, SubmitError,
    SurveySchema, SurveySession, VisibilitySnapshot, build_render_payload, evaluate, recompute,
    render_text,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "two_sections" => include_str!("../tests/fixtures/two_sections.json"),
        "household" => include_str!("../tests/fixtures/household.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn schema(name: &str) -> SurveySchema {
    SurveySchema::from_json_str(fixture(name)).expect("schema")
}

fn session(name: &str) -> SurveySession<MemoryPersistence> {
    SurveySession::with_schema(schema(name), MemoryPersistence::new())
}

fn assert_pruned(schema: &SurveySchema, answers: &AnswerStore, snapshot: &VisibilitySnapshot) {
    for item in schema.items() {
        if !snapshot.is_question_visible(&item.id) {
            assert!(
                !answers.contains(&item.id),
                "hidden question {} kept an answer",
                item.id
            );
        }
    }
}

#[test]
fn initial_state_reveals_only_first_section() {
    let session = session("two_sections");
    let snapshot = session.snapshot().expect("snapshot");

    let s1 = snapshot.section("S1").unwrap();
    assert!(s1.visible && s1.revealed && !s1.complete);
    let s2 = snapshot.section("S2").unwrap();
    assert!(!s2.visible && !s2.revealed);
    assert_eq!(snapshot.progress, 0);
    assert!(!snapshot.ready_to_finish);
}

#[test]
fn answering_no_unlocks_follow_up_section() {
    let mut session = session("two_sections");
    let snapshot = session.submit_answer("Q1", &json!("2")).expect("accepted");

    assert!(snapshot.section("S1").unwrap().complete);
    let s2 = snapshot.section("S2").unwrap();
    assert!(s2.visible && s2.revealed);
    // S2 holds no required items, so it is complete as soon as it is visible.
    assert!(s2.complete);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.ready_to_finish);
}

#[test]
fn switching_answer_hides_section_and_prunes_its_answers() {
    let mut session = session("two_sections");
    session.submit_answer("Q1", &json!("2")).expect("accepted");
    session
        .submit_answer("Q2", &json!("a friend"))
        .expect("accepted");
    assert!(session.answers().unwrap().contains("Q2"));

    let snapshot = session.submit_answer("Q1", &json!("1")).expect("accepted");
    assert!(!snapshot.section("S2").unwrap().visible);
    assert!(!snapshot.section("S2").unwrap().revealed);
    assert_eq!(snapshot.progress, 100);
    let answers = session.answers().unwrap();
    assert!(!answers.contains("Q2"));
    assert_eq!(
        session.persistence().saved().as_ref(),
        Some(answers),
        "pruned map is written back"
    );
}

#[test]
fn undeclared_option_is_rejected_without_side_effects() {
    let mut session = session("two_sections");
    session.submit_answer("Q1", &json!("2")).expect("accepted");
    let answers_before = session.answers().unwrap().clone();
    let snapshot_before = session.snapshot().unwrap().clone();

    let err = session.submit_answer("Q1", &json!("9")).unwrap_err();
    assert!(err.to_string().contains("not an option"));
    assert_eq!(session.answers().unwrap(), &answers_before);
    assert_eq!(session.snapshot().unwrap(), &snapshot_before);
}

#[test]
fn or_combinator_over_one_question() {
    let condition = Condition::any(vec![
        Condition::equals("Q1", "1"),
        Condition::equals("Q1", "2"),
    ]);
    let mut store = AnswerStore::new();
    assert!(!evaluate(&condition, store.as_map()));

    let item = schema("two_sections").item("Q1").cloned().expect("Q1");
    for value in ["1", "2"] {
        store.set(&item, &json!(value)).expect("set");
        assert!(evaluate(&condition, store.as_map()));
    }
    let mut other = survey_spec::AnswerMap::new();
    other.insert("Q1".into(), AnswerValue::Text("3".into()));
    assert!(!evaluate(&condition, &other));
}

#[test]
fn recompute_is_idempotent() {
    let schema = schema("household");
    let mut answers = AnswerStore::restore(&json!({
        "name": "Ada",
        "has_pets": "1",
        "pet_kinds": ["dog"],
        "vet": "Dr. Who",
        "agree": true,
        "contact": "email"
    }))
    .expect("restore");

    let first = recompute(&schema, &mut answers, None);
    let stored = answers.clone();
    let second = recompute(&schema, &mut answers, Some(&first));
    assert_eq!(first, second);
    assert_eq!(stored, answers);
    assert!(second.ready_to_finish);
}

#[test]
fn nested_section_logic_and_cascading_prune() {
    let mut session = session("household");
    session.submit_answer("name", &json!("Ada")).unwrap();
    session.submit_answer("has_pets", &json!(1)).unwrap();
    assert!(session.snapshot().unwrap().is_question_visible("pet_kinds"));
    assert!(!session.snapshot().unwrap().section("pets").unwrap().visible);

    let snapshot = session
        .submit_answer("pet_kinds", &json!(["dog"]))
        .unwrap();
    let pets = snapshot.section("pets").unwrap();
    assert!(pets.visible && pets.revealed && !pets.complete);
    session.submit_answer("vet", &json!("Dr. Who")).unwrap();

    // Answering "no" hides pet_kinds, which in turn hides the pets section.
    let snapshot = session.submit_answer("has_pets", &json!("2")).unwrap().clone();
    let answers = session.answers().unwrap();
    assert!(!answers.contains("pet_kinds"));
    assert!(!answers.contains("vet"));
    assert!(!snapshot.section("pets").unwrap().visible);
    assert_pruned(session.schema().unwrap(), answers, &snapshot);
}

#[test]
fn unknown_types_and_operators_never_block() {
    let mut session = session("household");
    for (id, value) in [
        ("name", json!("Ada")),
        ("has_pets", json!("1")),
        ("pet_kinds", json!(["cat"])),
        ("vet", json!("Dr. Who")),
    ] {
        session.submit_answer(id, &value).unwrap();
    }
    let snapshot = session.snapshot().unwrap();
    assert!(snapshot.section("pets").unwrap().complete);
    assert!(snapshot.is_question_visible("legacy"));
    assert!(!snapshot.is_question_visible("odd"));
    assert!(session.submit_answer("legacy", &json!("5")).is_err());

    let snapshot = session.submit_answer("agree", &json!(true)).unwrap();
    assert!(snapshot.is_question_visible("contact"));
    assert!(snapshot.ready_to_finish);
    assert_eq!(snapshot.progress, 100);
}

#[test]
fn fresh_reveals_extend_only_a_complete_prefix() {
    let mut session = session("household");
    // consent is visible but about is incomplete, so it stays locked.
    match session.submit_answer("agree", &json!(true)) {
        Err(SubmitError::Invalid(error)) => assert_eq!(error.code(), "locked"),
        other => panic!("expected locked rejection, got {other:?}"),
    }
    assert!(session.answers().unwrap().is_empty());
    assert!(!session.snapshot().unwrap().is_revealed("consent"));

    session.submit_answer("name", &json!("Ada")).unwrap();
    let snapshot = session.submit_answer("has_pets", &json!("2")).unwrap();
    assert!(snapshot.section("consent").unwrap().revealed);
    let snapshot = session.submit_answer("agree", &json!(true)).unwrap();
    assert!(snapshot.section("consent").unwrap().complete);

    // Clearing an earlier answer does not retract the reveal.
    let snapshot = session.clear_answer("name").unwrap();
    assert!(!snapshot.section("about").unwrap().complete);
    assert!(snapshot.section("consent").unwrap().revealed);
    assert_eq!(snapshot.progress, 50);
    // A revealed section stays writable.
    session.submit_answer("agree", &json!(false)).unwrap();
    assert!(!session.answers().unwrap().contains("agree"));
}

#[test]
fn malformed_item_types_degrade_to_display_items() {
    let raw = json!({
        "questions": [{
            "id": "s1",
            "title": "Odd items",
            "items": [
                { "id": "untyped", "text": "Nothing declared" },
                { "id": "nulltype", "type": null, "required": true },
                { "id": "numtype", "type": 7, "required": true },
                { "id": "q", "type": "text" }
            ]
        }]
    });
    let mut session = SurveySession::open(&InlineSchema(raw.to_string()), MemoryPersistence::new());
    assert!(session.error().is_none());

    let snapshot = session.snapshot().unwrap();
    assert!(snapshot.section("s1").unwrap().complete);
    assert_eq!(snapshot.progress, 100);

    for id in ["untyped", "nulltype", "numtype"] {
        match session.submit_answer(id, &json!("x")) {
            Err(SubmitError::Invalid(error)) => assert_eq!(error.code(), "not_answerable", "{id}"),
            other => panic!("{id}: expected rejection, got {other:?}"),
        }
    }
    let payload = build_render_payload(
        session.schema().unwrap(),
        session.answers().unwrap(),
        session.snapshot().unwrap(),
    );
    assert!(render_text(&payload).contains("Unknown question type"));
}
