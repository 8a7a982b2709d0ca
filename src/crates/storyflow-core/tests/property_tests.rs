//! Property-style traversal invariants

use proptest::prelude::*;
use serde_json::{json, Value as Json};
use storyflow_core::{NextOutcome, Runtime};

fn loop_text_project(lines: &[String]) -> Json {
    let elements: Vec<Json> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            json!({
                "_id": format!("line_e{i}"),
                "_nodeId": "line",
                "_localizedContents": [{ "_localeCode": "en", "_text": line }]
            })
        })
        .collect();
    json!({
        "_apiVersion": "1.4",
        "_name": "prop-fixture",
        "_locale": "en",
        "_mainLocale": { "_code": "en" },
        "_flows": [{
            "_id": "f1",
            "_name": "f1",
            "_slug": "f1",
            "_nodes": [
                { "_id": "s", "_type": "start", "_connections": [{ "_to": "line" }] },
                {
                    "_id": "line",
                    "_type": "text",
                    "_cycleType": "loop",
                    "_elements": elements,
                    "_connections": [{ "_to": "line" }]
                }
            ]
        }],
    })
}

fn random_walk_project() -> Json {
    json!({
        "_apiVersion": "1.4",
        "_name": "prop-fixture",
        "_locale": "en",
        "_mainLocale": { "_code": "en" },
        "_flows": [{
            "_id": "f1",
            "_name": "f1",
            "_slug": "f1",
            "_nodes": [
                { "_id": "s", "_type": "start", "_connections": [{ "_to": "rnd" }] },
                {
                    "_id": "rnd",
                    "_type": "random",
                    "_connections": [{ "_to": "a" }, { "_to": "b" }, { "_to": "c" }]
                },
                {
                    "_id": "a",
                    "_type": "text",
                    "_elements": [{
                        "_id": "a_e0", "_nodeId": "a",
                        "_localizedContents": [{ "_localeCode": "en", "_text": "[[SRND x|y|z]]" }]
                    }],
                    "_connections": [{ "_to": "rnd" }]
                },
                {
                    "_id": "b",
                    "_type": "text",
                    "_elements": [{
                        "_id": "b_e0", "_nodeId": "b",
                        "_localizedContents": [{ "_localeCode": "en", "_text": "[[RND p|q]]" }]
                    }],
                    "_connections": [{ "_to": "rnd" }]
                },
                {
                    "_id": "c",
                    "_type": "text",
                    "_elements": [{
                        "_id": "c_e0", "_nodeId": "c",
                        "_localizedContents": [{ "_localeCode": "en", "_text": "plain" }]
                    }],
                    "_connections": [{ "_to": "rnd" }]
                }
            ]
        }],
    })
}

proptest! {
    /// LOOP closure: a looping text node with N elements, stepped 2N
    /// times, emits its sequence twice
    #[test]
    fn loop_cycle_closes(n in 2usize..6) {
        let lines: Vec<String> = (0..n).map(|i| format!("line-{i}")).collect();
        let doc = loop_text_project(&lines);
        let mut rt = Runtime::from_json(doc.to_string().as_bytes(), None)
            .unwrap()
            .with_seed(0);

        let mut seen = Vec::new();
        for _ in 0..(2 * n) {
            prop_assert_eq!(
                rt.next_node(None).unwrap(),
                NextOutcome::Node("line".to_string())
            );
            seen.push(rt.get_parsed_text(None, false).unwrap().text);
        }
        prop_assert_eq!(&seen[..n], &seen[n..]);
        prop_assert_eq!(&seen[..n], &lines[..]);
    }

    /// Determinism under a seed: random branches and variations replay
    /// identically for equal seeds
    #[test]
    fn seeded_runs_replay_identically(seed in any::<u64>(), steps in 1usize..40) {
        let doc = random_walk_project();
        let mut traces = Vec::new();
        for _ in 0..2 {
            let mut rt = Runtime::from_json(doc.to_string().as_bytes(), None)
                .unwrap()
                .with_seed(seed);
            let mut trace = Vec::new();
            for _ in 0..steps {
                match rt.next_node(None).unwrap() {
                    NextOutcome::Node(id) => {
                        let text = rt.get_parsed_text(None, false).unwrap().text;
                        trace.push((id, text));
                    }
                    NextOutcome::End => break,
                }
            }
            traces.push(trace);
        }
        prop_assert_eq!(&traces[0], &traces[1]);
    }
}
