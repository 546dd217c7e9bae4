//! Declaration resolver
//!
//! Validates a declaration and expands it into the flat component set plus
//! the producer-to-consumer mappings. Expansion is deterministic: resolving
//! the same declaration twice yields byte-identical output, including the
//! names of synthesized components.
//!
//! # Steps
//!
//! 1. Walk the root, flattening namespaces (default namespace for root-level
//!    objects); unknown keys fail with `additionalProperties`.
//! 2. Parse each object against its class model (serde fills defaults and
//!    rejects unknown fields).
//! 3. Expand systems into one component per system-scoped poller; inline
//!    pollers get synthetic `SystemPoller_<n>` names, positional and stable.
//! 4. Synthesize a system for every standalone poller no system references,
//!    and a poller group for every pull consumer.
//! 5. Build mappings: push consumers are fed by their namespace's listeners
//!    and interval pollers; pull consumers by their synthesized group.

use serde_json::Value;

use crate::actions::ActionConfig;
use crate::component::{
    Component, ComponentKind, Connection, ConsumerSpec, Credentials, DataOpts, Endpoint,
    ListenerSpec, Mappings, PullConsumerSpec, PullGroupSpec, SystemPollerSpec, TraceSpec,
    component_id, poller_component_id,
};
use crate::declaration::{
    ConsumerDecl, ControlsDecl, Declaration, EndpointItemDecl, EndpointListValue, EndpointRef,
    EndpointsDecl, IHealthPollerDecl, ListenerDecl, OneOrMany, PollerRef, PullConsumerDecl,
    SystemDecl, SystemPollerDecl, TraceEntryType, TraceValue, DEFAULT_NAMESPACE, class_of, classes,
};
use crate::error::{ConfigError, Result};

/// Output of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Flat, id-addressed component set, in expansion order
    pub components: Vec<Component>,
    /// Producer id → consumer ids
    pub mappings: Mappings,
}

impl Resolved {
    /// Find a component by id
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }
}

/// Resolve a declaration with no prior state
pub fn resolve(declaration: &Declaration) -> Result<Resolved> {
    resolve_with_current(declaration, &[], None)
}

/// Resolve a declaration against the currently running component set
///
/// `current` is consulted for class-override protection. When
/// `namespace_to_update` is set, components outside that namespace carry the
/// `skip_update` marker so workers only rebuild local state.
pub fn resolve_with_current(
    declaration: &Declaration,
    current: &[Component],
    namespace_to_update: Option<&str>,
) -> Result<Resolved> {
    let namespaces = collect_namespaces(declaration)?;

    let mut components = Vec::new();
    for ns in &namespaces {
        expand_namespace(ns, &mut components)?;
    }

    // Ids are unique across the whole set
    for (i, component) in components.iter().enumerate() {
        if components[..i].iter().any(|c| c.id == component.id) {
            return Err(ConfigError::DuplicateId {
                id: component.id.clone(),
            });
        }
    }

    // An existing object may not change class
    for component in &components {
        if let Some(existing) = current.iter().find(|c| c.id == component.id)
            && existing.class != component.class
        {
            return Err(ConfigError::ClassOverride {
                id: component.id.clone(),
                current: existing.class.clone(),
                requested: component.class.clone(),
            });
        }
    }

    if let Some(target_ns) = namespace_to_update {
        for component in &mut components {
            component.skip_update = component.namespace != target_ns;
        }
    }

    let mappings = build_mappings(&components);

    Ok(Resolved {
        components,
        mappings,
    })
}

// =============================================================================
// Namespace collection
// =============================================================================

/// One namespace's objects, in declaration order
struct NamespaceObjects {
    namespace: String,
    objects: Vec<(String, Value)>,
}

/// Flatten the root into per-namespace object lists
///
/// The default namespace comes first; declared namespaces follow in root
/// order. Controls objects are validated and dropped.
fn collect_namespaces(declaration: &Declaration) -> Result<Vec<NamespaceObjects>> {
    let mut default_ns = NamespaceObjects {
        namespace: DEFAULT_NAMESPACE.to_string(),
        objects: Vec::new(),
    };
    let mut named = Vec::new();

    for (key, value) in declaration.objects() {
        let Some(class) = class_of(value) else {
            return Err(ConfigError::additional_properties(key));
        };
        match class {
            classes::CONTROLS => {
                parse_object::<ControlsDecl>(key, value)?;
            }
            classes::NAMESPACE => {
                let mut ns = NamespaceObjects {
                    namespace: key.clone(),
                    objects: Vec::new(),
                };
                let inner = value.as_object().expect("class_of checked object");
                for (inner_key, inner_value) in inner {
                    if inner_key == "class" {
                        continue;
                    }
                    let location = format!("{key}.{inner_key}");
                    let Some(inner_class) = class_of(inner_value) else {
                        return Err(ConfigError::additional_properties(location));
                    };
                    if matches!(
                        inner_class,
                        classes::CONTROLS | classes::NAMESPACE
                    ) {
                        return Err(ConfigError::validation(
                            location,
                            format!("class '{inner_class}' is not allowed inside a namespace"),
                        ));
                    }
                    check_known_class(&location, inner_class)?;
                    ns.objects.push((inner_key.clone(), inner_value.clone()));
                }
                named.push(ns);
            }
            other => {
                check_known_class(key, other)?;
                default_ns.objects.push((key.clone(), value.clone()));
            }
        }
    }

    let mut out = vec![default_ns];
    out.extend(named);
    Ok(out)
}

fn check_known_class(location: &str, class: &str) -> Result<()> {
    const KNOWN: &[&str] = &[
        classes::SYSTEM,
        classes::SYSTEM_POLLER,
        classes::LISTENER,
        classes::CONSUMER,
        classes::PULL_CONSUMER,
        classes::ENDPOINTS,
        classes::IHEALTH_POLLER,
    ];
    if KNOWN.contains(&class) {
        Ok(())
    } else {
        Err(ConfigError::additional_properties(location))
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(location: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| ConfigError::validation(location, e.to_string()))
}

// =============================================================================
// Per-namespace expansion
// =============================================================================

fn expand_namespace(ns: &NamespaceObjects, components: &mut Vec<Component>) -> Result<()> {
    let namespace = ns.namespace.as_str();

    // First pass: parse by class, keeping declaration order
    let mut systems: Vec<(String, SystemDecl)> = Vec::new();
    let mut standalone_pollers: Vec<(String, SystemPollerDecl)> = Vec::new();
    let mut listeners: Vec<(String, ListenerDecl)> = Vec::new();
    let mut consumers: Vec<(String, ConsumerDecl)> = Vec::new();
    let mut pull_consumers: Vec<(String, PullConsumerDecl)> = Vec::new();
    let mut endpoints: Vec<(String, EndpointsDecl)> = Vec::new();
    let mut ihealth: Vec<(String, IHealthPollerDecl)> = Vec::new();

    for (name, value) in &ns.objects {
        let location = object_location(namespace, name);
        match class_of(value).expect("checked during collection") {
            classes::SYSTEM => systems.push((name.clone(), parse_object(&location, value)?)),
            classes::SYSTEM_POLLER => {
                let poller: SystemPollerDecl = parse_object(&location, value)?;
                if poller.class.as_deref() != Some(classes::SYSTEM_POLLER) {
                    return Err(ConfigError::validation(&location, "missing or wrong class"));
                }
                standalone_pollers.push((name.clone(), poller));
            }
            classes::LISTENER => listeners.push((name.clone(), parse_object(&location, value)?)),
            classes::CONSUMER => consumers.push((name.clone(), parse_object(&location, value)?)),
            classes::PULL_CONSUMER => {
                pull_consumers.push((name.clone(), parse_object(&location, value)?));
            }
            classes::ENDPOINTS => endpoints.push((name.clone(), parse_object(&location, value)?)),
            classes::IHEALTH_POLLER => {
                ihealth.push((name.clone(), parse_object(&location, value)?));
            }
            other => unreachable!("unknown class '{other}' survived collection"),
        }
    }

    // System-scoped pollers, in system declaration order
    let mut referenced: Vec<&str> = Vec::new();
    for (system_name, system) in &systems {
        let location = object_location(namespace, system_name);
        let refs = match &system.system_poller {
            Some(value) => value.clone().into_vec(),
            None => Vec::new(),
        };

        let mut anonymous_counter = 0usize;
        for poller_ref in refs {
            let (poller_name, poller) = match poller_ref {
                PollerRef::Ref(target) => {
                    let Some((found_name, decl)) =
                        standalone_pollers.iter().find(|(n, _)| *n == target)
                    else {
                        return Err(ConfigError::unknown_reference(
                            &location,
                            "Telemetry_System_Poller",
                            target,
                        ));
                    };
                    referenced.push(found_name.as_str());
                    (target, decl.clone())
                }
                PollerRef::Inline(decl) => {
                    // Positional name, stable across re-applications
                    anonymous_counter += 1;
                    (format!("SystemPoller_{anonymous_counter}"), decl)
                }
            };

            components.push(build_poller_component(
                namespace,
                system_name,
                system.enable,
                system_connection(system),
                system_credentials(system),
                &poller_name,
                &poller,
                &endpoints,
            )?);
        }
    }

    // Standalone pollers no system references poll a synthesized localhost
    // system named after themselves
    for (poller_name, poller) in &standalone_pollers {
        if referenced.contains(&poller_name.as_str()) {
            continue;
        }
        components.push(build_poller_component(
            namespace,
            poller_name,
            true,
            Connection {
                host: poller.host.clone(),
                port: poller.port.unwrap_or_else(|| poller.protocol.default_port()),
                protocol: poller.protocol,
                allow_self_signed_cert: poller.allow_self_signed_cert,
            },
            Credentials {
                username: poller.username.clone(),
                passphrase: poller.passphrase.clone(),
            },
            poller_name,
            poller,
            &endpoints,
        )?);
    }

    // Listeners
    for (name, listener) in &listeners {
        let location = object_location(namespace, name);
        if let Some(pattern) = &listener.match_pattern
            && regex::Regex::new(pattern).is_err()
        {
            return Err(ConfigError::validation(
                &location,
                format!("'match' is not a valid regular expression: '{pattern}'"),
            ));
        }
        let actions = validated_actions(&location, listener.actions.clone(), Vec::new)?;
        let id = component_id(namespace, name);
        components.push(Component {
            trace: resolve_trace(&listener.trace, classes::LISTENER, &id),
            id,
            namespace: namespace.to_string(),
            name: name.clone(),
            class: classes::LISTENER.to_string(),
            enable: listener.enable,
            skip_update: false,
            kind: ComponentKind::Listener(ListenerSpec {
                port: listener.port,
                match_pattern: listener.match_pattern.clone(),
                tags: listener.tag.clone().unwrap_or_default(),
                actions,
            }),
        });
    }

    // Push consumers
    for (name, consumer) in &consumers {
        let location = object_location(namespace, name);
        let actions = validated_actions(&location, consumer.actions.clone(), Vec::new)?;
        let id = component_id(namespace, name);
        components.push(Component {
            trace: resolve_trace(&consumer.trace, classes::CONSUMER, &id),
            id,
            namespace: namespace.to_string(),
            name: name.clone(),
            class: classes::CONSUMER.to_string(),
            enable: consumer.enable,
            skip_update: false,
            kind: ComponentKind::Consumer(ConsumerSpec {
                consumer_type: consumer.consumer_type.clone(),
                config: consumer.extra.clone(),
                actions,
            }),
        });
    }

    // Pull consumers and their synthesized groups
    for (name, pull) in &pull_consumers {
        let location = object_location(namespace, name);
        let poller_names = match &pull.system_poller {
            OneOrMany::One(one) => vec![one.clone()],
            OneOrMany::Many(many) => many.clone(),
        };
        let consumer_id = component_id(namespace, name);

        // System-major order: walk the expanded poller components and pick
        // the referenced names, de-duplicating by id
        let mut group_pollers: Vec<String> = Vec::new();
        for target in &poller_names {
            let mut found = false;
            for component in components.iter() {
                if component.namespace != namespace || component.name != *target {
                    continue;
                }
                if let ComponentKind::SystemPoller(spec) = &component.kind {
                    if spec.interval != 0 {
                        return Err(ConfigError::validation(
                            &location,
                            format!(
                                "systemPoller '{target}' has interval {}; pull consumers \
                                 require interval 0",
                                spec.interval
                            ),
                        ));
                    }
                    found = true;
                }
            }
            if !found {
                return Err(ConfigError::unknown_reference(
                    &location,
                    "Telemetry_System_Poller",
                    target.clone(),
                ));
            }
        }
        for component in components.iter() {
            if component.namespace != namespace {
                continue;
            }
            if let ComponentKind::SystemPoller(_) = &component.kind
                && poller_names.iter().any(|n| *n == component.name)
                && !group_pollers.contains(&component.id)
            {
                group_pollers.push(component.id.clone());
            }
        }

        components.push(Component {
            trace: resolve_trace(&pull.trace, classes::PULL_CONSUMER, &consumer_id),
            id: consumer_id.clone(),
            namespace: namespace.to_string(),
            name: name.clone(),
            class: classes::PULL_CONSUMER.to_string(),
            enable: pull.enable,
            skip_update: false,
            kind: ComponentKind::PullConsumer(PullConsumerSpec {
                consumer_type: pull.consumer_type.clone(),
                system_pollers: poller_names,
            }),
        });

        let group_name = format!("{}_{name}", classes::PULL_CONSUMER_GROUP);
        let group_id = component_id(namespace, &group_name);
        components.push(Component {
            id: group_id,
            namespace: namespace.to_string(),
            name: group_name,
            class: classes::PULL_CONSUMER_GROUP.to_string(),
            enable: pull.enable,
            trace: TraceSpec::disabled(),
            skip_update: false,
            kind: ComponentKind::PullConsumerGroup(PullGroupSpec {
                pull_consumer: consumer_id,
                system_pollers: group_pollers,
            }),
        });
    }

    // iHealth pollers: validated and carried, no worker consumes them yet
    for (name, decl) in &ihealth {
        let id = component_id(namespace, name);
        components.push(Component {
            trace: resolve_trace(&decl.trace, classes::IHEALTH_POLLER, &id),
            id,
            namespace: namespace.to_string(),
            name: name.clone(),
            class: classes::IHEALTH_POLLER.to_string(),
            enable: decl.enable,
            skip_update: false,
            kind: ComponentKind::IHealthPoller,
        });
    }

    Ok(())
}

fn object_location(namespace: &str, name: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn system_connection(system: &SystemDecl) -> Connection {
    Connection {
        host: system.host.clone(),
        port: system.port.unwrap_or_else(|| system.protocol.default_port()),
        protocol: system.protocol,
        allow_self_signed_cert: system.allow_self_signed_cert,
    }
}

fn system_credentials(system: &SystemDecl) -> Credentials {
    Credentials {
        username: system.username.clone(),
        passphrase: system.passphrase.clone(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_poller_component(
    namespace: &str,
    system_name: &str,
    system_enable: bool,
    connection: Connection,
    credentials: Credentials,
    poller_name: &str,
    poller: &SystemPollerDecl,
    ns_endpoints: &[(String, EndpointsDecl)],
) -> Result<Component> {
    let location = format!(
        "{}.systemPoller",
        object_location(namespace, system_name)
    );

    let endpoint_list = match &poller.endpoint_list {
        Some(value) => Some(resolve_endpoint_list(&location, value, ns_endpoints)?),
        None => None,
    };

    let actions = validated_actions(
        &location,
        poller.actions.clone(),
        ActionConfig::default_data_actions,
    )?;

    let id = poller_component_id(namespace, system_name, poller_name);
    Ok(Component {
        trace: resolve_trace(&poller.trace, classes::SYSTEM_POLLER, &id),
        id,
        namespace: namespace.to_string(),
        name: poller_name.to_string(),
        class: classes::SYSTEM_POLLER.to_string(),
        enable: system_enable && poller.enable,
        skip_update: false,
        kind: ComponentKind::SystemPoller(SystemPollerSpec {
            interval: poller.interval,
            connection,
            credentials,
            endpoint_list,
            data_opts: DataOpts {
                actions,
                tags: poller.tag.clone().unwrap_or_default(),
                no_tm_stats: poller.no_tm_stats,
            },
            system_name: system_name.to_string(),
        }),
    })
}

/// Validate a declared action list, or produce defaults when absent
fn validated_actions(
    location: &str,
    declared: Option<Vec<ActionConfig>>,
    default: impl FnOnce() -> Vec<ActionConfig>,
) -> Result<Vec<ActionConfig>> {
    match declared {
        Some(actions) => {
            for (i, action) in actions.iter().enumerate() {
                action.validate(&format!("{location}.actions[{i}]"))?;
            }
            Ok(actions)
        }
        None => Ok(default()),
    }
}

/// Resolve an `endpointList` against the namespace's `Telemetry_Endpoints`
fn resolve_endpoint_list(
    location: &str,
    value: &EndpointListValue,
    ns_endpoints: &[(String, EndpointsDecl)],
) -> Result<Vec<Endpoint>> {
    let refs: Vec<EndpointRef> = match value {
        EndpointListValue::Ref(name) => vec![EndpointRef::Ref(name.clone())],
        EndpointListValue::List(items) => items.clone(),
    };

    let mut out = Vec::new();
    for item in refs {
        match item {
            EndpointRef::Ref(reference) => {
                // `Name` pulls every item; `Name/item` pulls one
                let (endpoints_name, item_key) = match reference.split_once('/') {
                    Some((a, b)) => (a, Some(b)),
                    None => (reference.as_str(), None),
                };
                let Some((_, decl)) =
                    ns_endpoints.iter().find(|(n, _)| n == endpoints_name)
                else {
                    return Err(ConfigError::unknown_reference(
                        location,
                        "Telemetry_Endpoints",
                        reference.clone(),
                    ));
                };
                let base = decl.base_path.as_deref().unwrap_or("");
                for (key, raw_item) in &decl.items {
                    if let Some(wanted) = item_key
                        && key != wanted
                    {
                        continue;
                    }
                    let parsed: EndpointItemDecl = parse_object(
                        &format!("{location}.{endpoints_name}.items.{key}"),
                        raw_item,
                    )?;
                    out.push(Endpoint {
                        name: parsed.name.unwrap_or_else(|| key.clone()),
                        path: join_path(base, &parsed.path),
                        enable: decl.enable && parsed.enable,
                    });
                }
                if let Some(wanted) = item_key
                    && !decl.items.contains_key(wanted)
                {
                    return Err(ConfigError::unknown_reference(
                        location,
                        "Telemetry_Endpoints item",
                        reference.clone(),
                    ));
                }
            }
            EndpointRef::Inline(decl) => {
                let name = decl.name.clone().unwrap_or_else(|| decl.path.clone());
                out.push(Endpoint {
                    name,
                    path: decl.path.clone(),
                    enable: decl.enable,
                });
            }
        }
    }
    Ok(out)
}

fn join_path(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Resolve the raw `trace` field into concrete file paths
fn resolve_trace(trace: &Option<TraceValue>, class: &str, id: &str) -> TraceSpec {
    let default_output = || format!("/var/tmp/telemetry/{class}.{id}");
    let default_input = || format!("/var/tmp/telemetry/INPUT.{class}.{id}");

    match trace {
        None | Some(TraceValue::Enabled(false)) => TraceSpec::disabled(),
        Some(TraceValue::Enabled(true)) => TraceSpec {
            input: None,
            output: Some(default_output()),
        },
        Some(TraceValue::Path(path)) => TraceSpec {
            input: None,
            output: Some(path.clone()),
        },
        Some(TraceValue::Multi(entries)) => {
            let mut spec = TraceSpec::disabled();
            for entry in entries {
                match entry.direction {
                    TraceEntryType::Input => {
                        spec.input = Some(entry.path.clone().unwrap_or_else(default_input));
                    }
                    TraceEntryType::Output => {
                        spec.output = Some(entry.path.clone().unwrap_or_else(default_output));
                    }
                }
            }
            spec
        }
    }
}

// =============================================================================
// Mappings
// =============================================================================

/// Build the producer → consumer routing table
///
/// Only enabled components appear on either side of an edge.
fn build_mappings(components: &[Component]) -> Mappings {
    let mut mappings = Mappings::new();

    for consumer in components {
        if !consumer.enable {
            continue;
        }
        match &consumer.kind {
            ComponentKind::Consumer(_) => {
                for producer in components {
                    if !producer.enable || producer.namespace != consumer.namespace {
                        continue;
                    }
                    let feeds = match &producer.kind {
                        ComponentKind::Listener(_) => true,
                        // Pull-mode pollers only feed their group
                        ComponentKind::SystemPoller(spec) => spec.interval > 0,
                        _ => false,
                    };
                    if feeds {
                        mappings
                            .entry(producer.id.clone())
                            .or_default()
                            .push(consumer.id.clone());
                    }
                }
            }
            ComponentKind::PullConsumerGroup(spec) => {
                // The group is the producer; its pull consumer the target
                let target_enabled = components
                    .iter()
                    .any(|c| c.id == spec.pull_consumer && c.enable);
                if target_enabled {
                    mappings
                        .entry(consumer.id.clone())
                        .or_default()
                        .push(spec.pull_consumer.clone());
                }
            }
            _ => {}
        }
    }

    mappings
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
