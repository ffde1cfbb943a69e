//! Full headless sessions driven through the line protocol.

use skirmish_core::events::MatchEvent;
use skirmish_core::replay::{Replay, ReplayPlayer};
use skirmish_headless::{HeadlessConfig, HeadlessRunner, Response, Scenario};

fn run_session(scenario: &Scenario, script: &[&str]) -> (Vec<Response>, HeadlessRunner) {
    let mut runner = HeadlessRunner::with_config(
        scenario,
        HeadlessConfig {
            record: true,
            ..HeadlessConfig::default()
        },
    )
    .unwrap();
    let input = script.join("\n");
    let mut output = Vec::new();
    runner.run(input.as_bytes(), &mut output).unwrap();

    let responses = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| Response::from_json(line).unwrap())
        .collect();
    (responses, runner)
}

#[test]
fn duel_played_to_the_end_and_replayed() {
    let scenario = Scenario::duel();
    let (responses, mut runner) = run_session(
        &scenario,
        &[
            r#"{"cmd":"connect","player":1}"#,
            r#"{"cmd":"connect","player":2}"#,
            r#"{"cmd":"attack","player":1,"unit":1,"target":2}"#,
            r#"{"cmd":"tick","count":1000}"#,
            r#"{"cmd":"quit"}"#,
        ],
    );

    assert_eq!(responses.first(), Some(&Response::ready(0)));
    assert_eq!(responses.last(), Some(&Response::Bye));
    assert!(responses.contains(&Response::ack("attack")));

    let destroyed = responses.iter().any(|r| {
        matches!(r, Response::Events { events, .. }
            if events.contains(&MatchEvent::UnitDestroyed { unit: 2, owner: 2 }))
    });
    assert!(destroyed);
    assert!(responses.iter().any(|r| matches!(
        r,
        Response::GameOver {
            winner: Some(1),
            ..
        }
    )));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duel.replay");
    runner.finish().unwrap().save(&path).unwrap();

    let replay = Replay::load(&path).unwrap();
    assert_eq!(replay.label, "duel");
    assert_eq!(replay.input_count(), 3);
    ReplayPlayer::new(replay).unwrap().verify().unwrap();
}

#[test]
fn state_query_reflects_orders() {
    let (responses, _) = run_session(
        &Scenario::duel(),
        &[
            r#"{"cmd":"connect","player":1}"#,
            r#"{"cmd":"connect","player":2}"#,
            r#"{"cmd":"move","player":1,"unit":1,"x":-6.0,"y":0.0}"#,
            r#"{"cmd":"query"}"#,
        ],
    );

    let snapshot = responses
        .iter()
        .find_map(|r| match r {
            Response::State { snapshot, .. } => Some(snapshot),
            _ => None,
        })
        .unwrap();
    let unit = snapshot.units.iter().find(|u| u.id == 1).unwrap();
    assert_eq!(unit.owner, 1);
    assert!(unit.destination.is_some());
    // The single action ended the turn.
    assert_eq!(snapshot.turn.turn_number, 2);
}
