//! Facade query surface
//!
//! Exercises the lookup and rendering operations a host uses around the
//! walker: actors, labels, metadata, permalinks, graph neighbourhood
//! queries, and raw-text access.

use serde_json::json;
use storyflow_core::{NextOutcome, Runtime};
use storyflow_model::NodeType;

fn project_doc() -> serde_json::Value {
    json!({
        "_apiVersion": "1.4",
        "_name": "api-fixture",
        "_locale": "en",
        "_mainLocale": { "_code": "en" },
        "_availableLocale": [{ "_code": "en" }, { "_code": "fr" }],
        "_flowGroups": [
            { "_id": "g1", "_name": "stories", "_flowIds": ["main", "second"] }
        ],
        "_flows": [
            {
                "_id": "main",
                "_name": "Main Story",
                "_slug": "main-story",
                "_nodes": [
                    {
                        "_id": "s",
                        "_type": "start",
                        "_connections": [{ "_to": "greet" }]
                    },
                    {
                        "_id": "greet",
                        "_type": "text",
                        "_permalink": "the-greeting",
                        "_actorId": "a1",
                        "_metadata": ["mv1"],
                        "_elements": [{
                            "_id": "greet_e0",
                            "_nodeId": "greet",
                            "_localizedContents": [
                                { "_localeCode": "en", "_text": "[-]Hello {$who}[TODO tone]" }
                            ]
                        }],
                        "_connections": [{ "_to": "bye" }]
                    },
                    {
                        "_id": "bye",
                        "_type": "text",
                        "_elements": [{
                            "_id": "bye_e0",
                            "_nodeId": "bye",
                            "_localizedContents": [
                                { "_localeCode": "en", "_text": "Bye" }
                            ]
                        }]
                    }
                ]
            },
            {
                "_id": "second",
                "_name": "Second",
                "_slug": "second",
                "_nodes": [
                    {
                        "_id": "s2",
                        "_type": "start",
                        "_connections": [{ "_to": "alt" }]
                    },
                    {
                        "_id": "alt",
                        "_type": "text",
                        "_elements": [{
                            "_id": "alt_e0",
                            "_nodeId": "alt",
                            "_localizedContents": [
                                { "_localeCode": "en", "_text": "Alt" }
                            ]
                        }]
                    }
                ]
            }
        ],
        "_actors": [
            { "_id": "a1", "_uid": "actor-hero", "_name": "Hero", "_isNarrator": false },
            { "_id": "a2", "_uid": "actor-narrator", "_name": "Narrator", "_isNarrator": true }
        ],
        "_variables": [
            { "_key": "who", "_value": "world", "_type": "string" }
        ],
        "_labels": [
            {
                "_key": "ui.continue",
                "_localizedContents": [
                    { "_localeCode": "en", "_text": "Continue" },
                    { "_localeCode": "fr", "_text": "Continuer" }
                ]
            },
            {
                "_key": "ui.quit",
                "_localizedContents": [
                    { "_localeCode": "en", "_text": "Quit" }
                ]
            }
        ],
        "_metadata": [
            {
                "_id": "m1",
                "_uid": "mood",
                "_name": "Mood",
                "_icon": "face",
                "_values": [
                    { "_id": "mv1", "_uid": "mood-happy", "_value": "happy",
                      "_icon": null, "_metadataId": "m1" },
                    { "_id": "mv2", "_uid": "mood-grim", "_value": "grim",
                      "_icon": null, "_metadataId": "m1" }
                ]
            }
        ]
    })
}

fn runtime() -> Runtime {
    Runtime::from_json(project_doc().to_string().as_bytes(), None)
        .unwrap()
        .with_seed(1)
}

#[test]
fn flows_resolve_by_id_name_and_slug() {
    let rt = runtime();
    assert_eq!(rt.get_flows().len(), 2);
    assert!(rt.get_flow("main").is_some());
    assert!(rt.get_flow("Main Story").is_some());
    assert!(rt.get_flow("main-story").is_some());
    assert_eq!(rt.get_selected_flow().unwrap().id, "main");
}

#[test]
fn named_flow_load_starts_there() {
    let mut rt = Runtime::from_json(project_doc().to_string().as_bytes(), Some("second"))
        .unwrap()
        .with_seed(1);
    assert_eq!(rt.selected_flow_id(), "second");
    assert_eq!(rt.next_node(None).unwrap(), NextOutcome::Node("alt".to_string()));
}

#[test]
fn node_lookups() {
    let rt = runtime();
    assert!(rt.get_node(Some("greet"), None).is_some());
    assert!(rt.get_node(Some("greet"), Some("main")).is_some());
    assert!(rt.get_node(Some("greet"), Some("second")).is_none());
    assert_eq!(
        rt.get_node_by_permalink("the-greeting").unwrap().id,
        "greet"
    );
    assert_eq!(rt.get_nodes_by_type(NodeType::Text).len(), 3);
    assert!(rt.node_exists("alt", None));
    assert!(!rt.node_exists("alt", Some("main")));
}

#[test]
fn actor_lookups() {
    let mut rt = runtime();
    rt.next_node(None).unwrap();
    assert_eq!(rt.get_node_actor(None).unwrap().name, "Hero");
    assert_eq!(rt.get_node_actor(Some("bye")), None);
    let narrator = rt.get_actor_by_uid("actor-narrator").unwrap();
    assert!(narrator.is_narrator);
}

#[test]
fn label_lookup_follows_locale_fallback() {
    let rt = runtime();
    assert_eq!(rt.get_labels().len(), 2);

    let fr = rt.get_label("ui.continue", Some("fr")).unwrap();
    assert_eq!(fr.text, "Continuer");
    assert!(!fr.not_translated);

    let fr_missing = rt.get_label("ui.quit", Some("fr")).unwrap();
    assert_eq!(fr_missing.text, "Quit");
    assert!(fr_missing.not_translated);

    assert!(rt.get_label("ui.missing", None).is_none());
}

#[test]
fn metadata_lookups() {
    let rt = runtime();
    let metadata = rt.get_node_metadata(Some("greet"));
    assert_eq!(metadata.len(), 1);
    let (tag, value) = metadata[0];
    assert_eq!(tag.name, "Mood");
    assert_eq!(value.value, "happy");

    let by_uid = rt.get_node_meta_by_meta_uid("mood", Some("greet")).unwrap();
    assert_eq!(by_uid.id, "mv1");
    assert!(rt.get_node_meta_by_meta_uid("missing", Some("greet")).is_none());
    assert!(rt.get_node_metadata(Some("bye")).is_empty());
}

#[test]
fn graph_neighbourhood_queries() {
    let rt = runtime();
    let incoming = rt.get_linking_nodes(Some("greet"));
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].id, "s");

    let outgoing = rt.get_links_to_nodes(Some("greet"));
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].id, "bye");
}

#[test]
fn previous_node_is_tracked() {
    let mut rt = runtime();
    rt.next_node(None).unwrap();
    assert_eq!(rt.previous_node_id("greet"), Some("s"));
}

#[test]
fn original_text_variants() {
    let mut rt = runtime();

    let raw = rt
        .get_original_text("greet_e0", false, false, None)
        .unwrap();
    assert_eq!(raw.text, "[-]Hello {$who}[TODO tone]");

    let cleaned = rt.get_original_text("greet_e0", true, false, None).unwrap();
    assert_eq!(cleaned.text, "Hello {$who}");

    let resolved = rt.get_original_text("greet_e0", true, true, None).unwrap();
    assert_eq!(resolved.text, "Hello world");

    assert!(rt.get_original_text("missing", false, false, None).is_none());
}
