//! Resolver tests
//!
//! Covers namespace flattening, reference expansion, pull-group synthesis,
//! mapping construction and the determinism guarantees.

use serde_json::json;

use crate::component::ComponentKind;
use crate::declaration::{DEFAULT_NAMESPACE, Declaration};
use crate::error::ConfigError;
use crate::resolver::{resolve, resolve_with_current};

fn declaration(value: serde_json::Value) -> Declaration {
    Declaration::from_value(value).unwrap()
}

#[test]
fn test_empty_declaration_resolves_to_nothing() {
    let resolved = resolve(&Declaration::empty()).unwrap();
    assert!(resolved.components.is_empty());
    assert!(resolved.mappings.is_empty());
}

#[test]
fn test_listener_and_consumer_in_default_namespace() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "My_Listener": {"class": "Telemetry_Listener", "port": 6514},
        "My_Consumer": {"class": "Telemetry_Consumer", "type": "default"},
    }));
    let resolved = resolve(&decl).unwrap();

    assert_eq!(resolved.components.len(), 2);
    let listener = resolved
        .component("f5telemetry_default::My_Listener")
        .unwrap();
    assert_eq!(listener.class, "Telemetry_Listener");
    assert_eq!(listener.namespace, DEFAULT_NAMESPACE);

    // The listener feeds the consumer
    let targets = &resolved.mappings["f5telemetry_default::My_Listener"];
    assert_eq!(targets, &vec!["f5telemetry_default::My_Consumer".to_string()]);
}

#[test]
fn test_namespace_flattening() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Root_Listener": {"class": "Telemetry_Listener"},
        "My_NS": {
            "class": "Telemetry_Namespace",
            "Inner_Listener": {"class": "Telemetry_Listener"},
            "Inner_Consumer": {"class": "Telemetry_Consumer", "type": "default"},
        },
    }));
    let resolved = resolve(&decl).unwrap();

    // The namespace object itself is not emitted as a component
    assert_eq!(resolved.components.len(), 3);
    assert!(resolved.component("My_NS::Inner_Listener").is_some());

    // Mappings never cross namespaces
    assert!(resolved.mappings.contains_key("My_NS::Inner_Listener"));
    assert!(!resolved.mappings.contains_key("f5telemetry_default::Root_Listener"));
}

#[test]
fn test_unknown_top_level_key_rejected() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "bogus": 42,
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(matches!(err, ConfigError::AdditionalProperties { .. }));
    assert!(err.to_string().contains("bogus"));
}

#[test]
fn test_unknown_class_rejected() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "thing": {"class": "Telemetry_Imaginary"},
    }));
    assert!(matches!(
        resolve(&decl).unwrap_err(),
        ConfigError::AdditionalProperties { .. }
    ));
}

#[test]
fn test_controls_not_allowed_inside_namespace() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "NS": {
            "class": "Telemetry_Namespace",
            "controls": {"class": "Controls", "debug": true},
        },
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(err.to_string().contains("not allowed inside a namespace"));
}

#[test]
fn test_system_with_inline_and_referenced_pollers() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Standalone": {"class": "Telemetry_System_Poller", "interval": 120},
        "My_System": {
            "class": "Telemetry_System",
            "host": "10.0.0.5",
            "systemPoller": [
                "Standalone",
                {"interval": 90},
                {"interval": 60},
            ],
        },
    }));
    let resolved = resolve(&decl).unwrap();

    let ids: Vec<&str> = resolved.components.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "f5telemetry_default::My_System::Standalone",
            "f5telemetry_default::My_System::SystemPoller_1",
            "f5telemetry_default::My_System::SystemPoller_2",
        ]
    );

    // Connection comes from the system
    let poller = resolved
        .component("f5telemetry_default::My_System::SystemPoller_1")
        .unwrap();
    match &poller.kind {
        ComponentKind::SystemPoller(spec) => {
            assert_eq!(spec.connection.host, "10.0.0.5");
            assert_eq!(spec.interval, 90);
            assert_eq!(spec.system_name, "My_System");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_unreferenced_standalone_poller_gets_synthesized_system() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Lone_Poller": {"class": "Telemetry_System_Poller", "interval": 300},
    }));
    let resolved = resolve(&decl).unwrap();

    let poller = resolved
        .component("f5telemetry_default::Lone_Poller::Lone_Poller")
        .unwrap();
    match &poller.kind {
        ComponentKind::SystemPoller(spec) => {
            assert_eq!(spec.connection.host, "localhost");
            assert_eq!(spec.system_name, "Lone_Poller");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_unknown_poller_reference_rejected() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "My_System": {
            "class": "Telemetry_System",
            "systemPoller": "Missing",
        },
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownReference { .. }));
    assert!(err.to_string().contains("Missing"));
}

/// The pull-consumer resolution scenario from the system requirements:
/// ordered, system-major, de-duplicated poller ids plus a synthesized
/// system for the bare poller reference.
#[test]
fn test_pull_consumer_group_resolution_order() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "My_Pull_Consumer": {
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": ["Pull_Poller_1", "Pull_Poller_2", "Pull_Poller_3"],
        },
        "My_System": {
            "class": "Telemetry_System",
            "systemPoller": ["Pull_Poller_1"],
        },
        "My_System_2": {
            "class": "Telemetry_System",
            "systemPoller": ["Pull_Poller_2"],
        },
        "My_System_3": {
            "class": "Telemetry_System",
            "systemPoller": ["Pull_Poller_1", "Pull_Poller_2"],
        },
        "Pull_Poller_1": {"class": "Telemetry_System_Poller", "interval": 0},
        "Pull_Poller_2": {"class": "Telemetry_System_Poller", "interval": 0},
        "Pull_Poller_3": {"class": "Telemetry_System_Poller", "interval": 0},
    }));
    let resolved = resolve(&decl).unwrap();

    let group = resolved
        .component(
            "f5telemetry_default::Telemetry_Pull_Consumer_System_Poller_Group_My_Pull_Consumer",
        )
        .unwrap();
    match &group.kind {
        ComponentKind::PullConsumerGroup(spec) => {
            assert_eq!(
                spec.system_pollers,
                vec![
                    "f5telemetry_default::My_System::Pull_Poller_1",
                    "f5telemetry_default::My_System_2::Pull_Poller_2",
                    "f5telemetry_default::My_System_3::Pull_Poller_1",
                    "f5telemetry_default::My_System_3::Pull_Poller_2",
                    "f5telemetry_default::Pull_Poller_3::Pull_Poller_3",
                ]
            );
            assert_eq!(spec.pull_consumer, "f5telemetry_default::My_Pull_Consumer");
        }
        other => panic!("unexpected kind: {other:?}"),
    }

    // The group is the producer for the pull consumer
    let targets = &resolved.mappings[&group.id];
    assert_eq!(
        targets,
        &vec!["f5telemetry_default::My_Pull_Consumer".to_string()]
    );
}

#[test]
fn test_pull_consumer_rejects_interval_pollers() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "PC": {
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": "P",
        },
        "P": {"class": "Telemetry_System_Poller", "interval": 300},
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(err.to_string().contains("interval"));
}

/// Mapping edges only ever touch enabled components.
#[test]
fn test_disabled_consumer_has_no_mappings() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "L": {"class": "Telemetry_Listener"},
        "On": {"class": "Telemetry_Consumer", "type": "default"},
        "Off": {"class": "Telemetry_Consumer", "type": "default", "enable": false},
    }));
    let resolved = resolve(&decl).unwrap();

    let targets = &resolved.mappings["f5telemetry_default::L"];
    assert_eq!(targets, &vec!["f5telemetry_default::On".to_string()]);
}

#[test]
fn test_disabled_listener_produces_no_mapping() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "L": {"class": "Telemetry_Listener", "enable": false},
        "C": {"class": "Telemetry_Consumer", "type": "default"},
    }));
    let resolved = resolve(&decl).unwrap();
    assert!(resolved.mappings.is_empty());
}

#[test]
fn test_pull_mode_pollers_do_not_feed_push_consumers() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "P": {"class": "Telemetry_System_Poller", "interval": 0},
        "C": {"class": "Telemetry_Consumer", "type": "default"},
        "PC": {
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": "P",
        },
    }));
    let resolved = resolve(&decl).unwrap();
    assert!(!resolved.mappings.contains_key("f5telemetry_default::P::P"));
}

/// Resolving the same declaration twice is byte-identical.
#[test]
fn test_resolution_is_deterministic() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "S": {
            "class": "Telemetry_System",
            "systemPoller": [{"interval": 60}, {"interval": 90}],
        },
        "L": {"class": "Telemetry_Listener", "trace": true},
        "C": {"class": "Telemetry_Consumer", "type": "default"},
    }));

    let first = resolve(&decl).unwrap();
    let second = resolve(&decl).unwrap();

    let a = serde_json::to_string(&first.components).unwrap();
    let b = serde_json::to_string(&second.components).unwrap();
    assert_eq!(a, b);
    assert_eq!(first.mappings, second.mappings);
}

/// Expansion is idempotent over its own normalized output shape;
/// re-resolving a re-serialized declaration changes nothing.
#[test]
fn test_resolution_idempotent_over_raw_round_trip() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "L": {"class": "Telemetry_Listener", "port": 7000},
        "C": {"class": "Telemetry_Consumer", "type": "default"},
    }));
    let first = resolve(&decl).unwrap();

    let round_tripped =
        Declaration::from_value(serde_json::to_value(decl.raw()).unwrap()).unwrap();
    let second = resolve(&round_tripped).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_trace_forms() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Off": {"class": "Telemetry_Listener", "port": 1001},
        "On": {"class": "Telemetry_Listener", "port": 1002, "trace": true},
        "Custom": {"class": "Telemetry_Listener", "port": 1003, "trace": "/tmp/custom"},
        "Both": {
            "class": "Telemetry_Listener",
            "port": 1004,
            "trace": [{"type": "input"}, {"type": "output"}],
        },
    }));
    let resolved = resolve(&decl).unwrap();

    assert!(!resolved.component("f5telemetry_default::Off").unwrap().trace.is_enabled());

    let on = resolved.component("f5telemetry_default::On").unwrap();
    assert_eq!(
        on.trace.output.as_deref(),
        Some("/var/tmp/telemetry/Telemetry_Listener.f5telemetry_default::On")
    );

    let custom = resolved.component("f5telemetry_default::Custom").unwrap();
    assert_eq!(custom.trace.output.as_deref(), Some("/tmp/custom"));

    let both = resolved.component("f5telemetry_default::Both").unwrap();
    assert_eq!(
        both.trace.input.as_deref(),
        Some("/var/tmp/telemetry/INPUT.Telemetry_Listener.f5telemetry_default::Both")
    );
    assert!(both.trace.output.is_some());
}

#[test]
fn test_invalid_match_regex_rejected() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "L": {"class": "Telemetry_Listener", "match": "virtual_name=["},
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(err.to_string().contains("regular expression"));
}

#[test]
fn test_class_override_rejected() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Obj": {"class": "Telemetry_Listener"},
    }));
    let current = resolve(&declaration(json!({
        "class": "Telemetry",
        "Obj": {"class": "Telemetry_Consumer", "type": "default"},
    })))
    .unwrap();

    let err = resolve_with_current(&decl, &current.components, None).unwrap_err();
    assert!(matches!(err, ConfigError::ClassOverride { .. }));
}

#[test]
fn test_duplicate_synthesized_id_rejected() {
    // A user object colliding with the synthesized group name
    let decl = declaration(json!({
        "class": "Telemetry",
        "Telemetry_Pull_Consumer_System_Poller_Group_PC": {
            "class": "Telemetry_Listener",
        },
        "PC": {
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": "P",
        },
        "P": {"class": "Telemetry_System_Poller", "interval": 0},
    }));
    let err = resolve(&decl).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateId { .. }));
}

#[test]
fn test_namespace_scoped_update_marks_skip() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "Root_L": {"class": "Telemetry_Listener"},
        "NS": {
            "class": "Telemetry_Namespace",
            "Inner_L": {"class": "Telemetry_Listener", "port": 7000},
        },
    }));
    let resolved = resolve_with_current(&decl, &[], Some("NS")).unwrap();

    let root = resolved.component("f5telemetry_default::Root_L").unwrap();
    assert!(root.skip_update);

    let inner = resolved.component("NS::Inner_L").unwrap();
    assert!(!inner.skip_update);
}

#[test]
fn test_endpoint_list_resolution() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "EP": {
            "class": "Telemetry_Endpoints",
            "basePath": "/mgmt/tm",
            "items": {
                "virtualServers": {"path": "/ltm/virtual"},
                "pools": {"path": "/ltm/pool", "enable": false},
            },
        },
        "S": {
            "class": "Telemetry_System",
            "systemPoller": [{
                "interval": 60,
                "endpointList": ["EP", {"name": "custom", "path": "/custom/stat"}],
            }],
        },
    }));
    let resolved = resolve(&decl).unwrap();

    let poller = resolved
        .component("f5telemetry_default::S::SystemPoller_1")
        .unwrap();
    match &poller.kind {
        ComponentKind::SystemPoller(spec) => {
            let endpoints = spec.endpoint_list.as_ref().unwrap();
            assert_eq!(endpoints.len(), 3);
            assert_eq!(endpoints[0].name, "virtualServers");
            assert_eq!(endpoints[0].path, "/mgmt/tm/ltm/virtual");
            assert!(!endpoints[1].enable);
            assert_eq!(endpoints[2].name, "custom");
            assert_eq!(endpoints[2].path, "/custom/stat");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_endpoint_single_item_reference() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "EP": {
            "class": "Telemetry_Endpoints",
            "items": {"a": {"path": "/a"}, "b": {"path": "/b"}},
        },
        "P": {
            "class": "Telemetry_System_Poller",
            "interval": 60,
            "endpointList": "EP/b",
        },
    }));
    let resolved = resolve(&decl).unwrap();
    let poller = resolved.component("f5telemetry_default::P::P").unwrap();
    match &poller.kind {
        ComponentKind::SystemPoller(spec) => {
            let endpoints = spec.endpoint_list.as_ref().unwrap();
            assert_eq!(endpoints.len(), 1);
            assert_eq!(endpoints[0].path, "/b");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_poller_default_actions_tag_tenant_and_application() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "P": {"class": "Telemetry_System_Poller", "interval": 60},
    }));
    let resolved = resolve(&decl).unwrap();
    let poller = resolved.component("f5telemetry_default::P::P").unwrap();
    match &poller.kind {
        ComponentKind::SystemPoller(spec) => {
            assert_eq!(spec.data_opts.actions.len(), 1);
            let tags = spec.data_opts.actions[0].set_tag.as_ref().unwrap();
            assert_eq!(tags["tenant"], "`T`");
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_disabled_system_disables_its_pollers() {
    let decl = declaration(json!({
        "class": "Telemetry",
        "S": {
            "class": "Telemetry_System",
            "enable": false,
            "systemPoller": [{"interval": 60}],
        },
        "C": {"class": "Telemetry_Consumer", "type": "default"},
    }));
    let resolved = resolve(&decl).unwrap();

    let poller = resolved
        .component("f5telemetry_default::S::SystemPoller_1")
        .unwrap();
    assert!(!poller.enable);
    assert!(resolved.mappings.is_empty());
}
