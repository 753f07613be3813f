//! Integration tests exercising the concrete scenarios in SPEC_FULL.md §8
//! end-to-end: runner, inverter, split, and authorization over a shared
//! fixture built on `tests/common`.

mod common;

use common::{employee, office, office_closed, office_model, president, user, MemoryStorage};

use factgraph::auth::{is_authorized, AuthorizationRules};
use factgraph::fact::FactReference;
use factgraph::inverter::{self, Operation};
use factgraph::source::{FactSource, InMemoryGraph};
use factgraph::specification::builder::*;
use factgraph::specification::runner;
use factgraph::storage::Storage;

fn office_with_closed_check() -> factgraph::specification::Specification {
    let o = LabelRef::new("o");
    SpecificationBuilder::new()
        .given_where(
            "o",
            "Office",
            vec![not_exists(vec![one_match(
                "c",
                "Office.Closed",
                vec![successor(vec![role("office", "Office")], &o)],
            )])],
        )
        .project_fact("o")
}

#[tokio::test]
async fn open_office_is_returned_closed_office_is_not() {
    let model = office_model();
    let storage = MemoryStorage::new();

    let o1 = office(1);
    let o1_ref = storage.insert(o1);
    let o2 = office(2);
    let o2_ref = storage.insert(o2.clone());
    storage.insert(office_closed(o2_ref.clone()));

    let spec = office_with_closed_check();

    let open_results = storage
        .read(&model, &[("o".to_string(), o1_ref.clone())], &spec)
        .await
        .unwrap();
    assert_eq!(open_results.len(), 1);

    let closed_results = storage
        .read(&model, &[("o".to_string(), o2_ref.clone())], &spec)
        .await
        .unwrap();
    assert!(closed_results.is_empty());
}

#[tokio::test]
async fn inverter_emits_a_remove_inverse_for_the_negative_existential() {
    let model = office_model();
    let spec = office_with_closed_check();

    let inverses = inverter::invert(&model, &spec);
    let closed_inverse = inverses
        .iter()
        .find(|inv| inv.inverse_specification.given[0].name == "c")
        .expect("an inverse rooted at Office.Closed's unknown");
    assert_eq!(closed_inverse.operation, Operation::Remove);

    let o2 = office(2);
    let o2_ref = o2.reference();
    let closed = office_closed(o2_ref.clone());
    let closed_ref = closed.reference();

    let mut graph = InMemoryGraph::new();
    graph.insert(o2);
    graph.insert(closed);

    let given_name = closed_inverse.inverse_specification.given[0].name.clone();
    let results = runner::read(
        &graph,
        &model,
        &closed_inverse.inverse_specification,
        &[(given_name, closed_ref)],
    )
    .await
    .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn zigzag_president_match_resolves_through_shared_office() {
    let model = office_model();
    let storage = MemoryStorage::new();

    let o1_ref = storage.insert(office(1));
    let alice_ref = storage.insert(user("alice-key"));
    storage.insert(employee(o1_ref.clone(), alice_ref.clone()));
    storage.insert(president(o1_ref.clone(), alice_ref.clone()));

    let e = LabelRef::new("e");
    let spec = SpecificationBuilder::new()
        .given("e", "Employee")
        .matching(
            "p",
            "President",
            vec![path(
                vec![role("office", "Office")],
                &e,
                vec![role("office", "Office")],
            )],
        )
        .project_fact("p");

    let employee_ref = FactReference::new(
        "Employee",
        employee(o1_ref.clone(), alice_ref.clone()).hash,
    );
    let results = storage
        .read(&model, &[("e".to_string(), employee_ref)], &spec)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn office_president_is_authorized_to_create_employees() {
    let model = office_model();
    let mut store = InMemoryGraph::new();

    let o1_ref = store.insert(office(1));
    let alice_ref = store.insert(user("alice-key"));
    store.insert(president(o1_ref.clone(), alice_ref.clone()));

    // Given the candidate Employee `e`, zigzag to the President sharing its
    // office, then hop to that President's user (§8 scenario 4, via the
    // scenario 2 zigzag shape).
    let e = LabelRef::new("e");
    let p = LabelRef::new("president");
    let rule_spec = SpecificationBuilder::new()
        .given("e", "Employee")
        .matching(
            "president",
            "President",
            vec![path(
                vec![role("office", "Office")],
                &e,
                vec![role("office", "Office")],
            )],
        )
        .matching(
            "presidentUser",
            "User",
            vec![predecessor(&p, vec![role("user", "User")])],
        )
        .project_fact("presidentUser");

    let rules = AuthorizationRules::new().specification("Employee", rule_spec);

    let submitted = InMemoryGraph::from_submission(
        employee(o1_ref.clone(), alice_ref.clone()),
        &[],
    );

    let ok = is_authorized(
        &model,
        &rules,
        &submitted,
        &store,
        &"Employee".to_string(),
        &employee(o1_ref.clone(), alice_ref.clone()).reference(),
        &alice_ref,
    )
    .await
    .unwrap();
    assert!(ok);
}
