//! Action chain
//!
//! Compiles a declared action list into executable form and applies it
//! left-to-right. The chain is built once per component configuration and
//! shared by every record that component produces.

use jmespath::Expression;
use serde_json::{Map, Value};
use tstream_config::{ActionConfig, ActionKind};
use tstream_protocol::Record;

use crate::data_filter::{exclude_locations, include_locations};
use crate::tag::{infer_tenant_app, resolve_placeholders};

/// One compiled action
enum CompiledAction {
    SetTag(Map<String, Value>),
    IncludeData(Value),
    ExcludeData(Value),
    JmesPath(Box<Expression<'static>>),
}

impl CompiledAction {
    fn name(&self) -> &'static str {
        match self {
            Self::SetTag(_) => "setTag",
            Self::IncludeData(_) => "includeData",
            Self::ExcludeData(_) => "excludeData",
            Self::JmesPath(_) => "JMESPath",
        }
    }
}

/// A compiled, user-ordered action list
///
/// Disabled actions are dropped at compile time; an empty chain is a no-op.
pub struct ActionChain {
    actions: Vec<CompiledAction>,
}

impl ActionChain {
    /// Compile a declared action list
    ///
    /// Shape validation already happened in the resolver; a JMESPath
    /// expression that fails to compile is logged and skipped here so one
    /// bad expression cannot take a listener down.
    pub fn new(configs: &[ActionConfig]) -> Self {
        let mut actions = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.enable {
                continue;
            }
            match config.kind() {
                Some(ActionKind::SetTag) => {
                    if let Some(tags) = &config.set_tag {
                        actions.push(CompiledAction::SetTag(tags.clone()));
                    }
                }
                Some(ActionKind::IncludeData) => {
                    if let Some(locations) = &config.locations {
                        actions.push(CompiledAction::IncludeData(locations.clone()));
                    }
                }
                Some(ActionKind::ExcludeData) => {
                    if let Some(locations) = &config.locations {
                        actions.push(CompiledAction::ExcludeData(locations.clone()));
                    }
                }
                Some(ActionKind::JmesPath) => {
                    let expression = config.expression.as_deref().unwrap_or("");
                    match jmespath::compile(expression) {
                        Ok(compiled) => {
                            actions.push(CompiledAction::JmesPath(Box::new(compiled)));
                        }
                        Err(e) => {
                            tracing::warn!(
                                expression,
                                error = %e,
                                "invalid JMESPath expression, action skipped"
                            );
                        }
                    }
                }
                None => {
                    tracing::warn!("action with no recognizable kind skipped");
                }
            }
        }
        Self { actions }
    }

    /// An empty chain (no-op)
    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Number of active actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the chain has no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Apply all actions in order
    ///
    /// A failing action is logged and skipped; the record stays as the
    /// previous action left it. This never fails the caller.
    pub fn apply(&self, record: &mut Record) {
        for action in &self.actions {
            if let Err(message) = apply_one(action, record) {
                tracing::warn!(
                    action = action.name(),
                    source_id = %record.source_id,
                    error = %message,
                    "action failed, record left unchanged"
                );
            }
        }
    }
}

fn apply_one(action: &CompiledAction, record: &mut Record) -> Result<(), String> {
    match action {
        CompiledAction::SetTag(tags) => {
            let (tenant, application) = infer_tenant_app(&record.data);
            for (name, raw_value) in tags {
                let text = match raw_value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if let Some(resolved) =
                    resolve_placeholders(&text, tenant.as_deref(), application.as_deref())
                {
                    record.tags.insert(name.clone(), resolved);
                }
            }
            Ok(())
        }
        CompiledAction::IncludeData(locations) => {
            record.data = include_locations(&record.data, locations);
            Ok(())
        }
        CompiledAction::ExcludeData(locations) => {
            record.data = exclude_locations(&record.data, locations);
            Ok(())
        }
        CompiledAction::JmesPath(expression) => {
            let input = jmespath::Variable::from_json(&record.data.to_string())?;
            let result = expression.search(input).map_err(|e| e.to_string())?;
            record.data = serde_json::to_value(&*result).map_err(|e| e.to_string())?;
            Ok(())
        }
    }
}

impl std::fmt::Debug for ActionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionChain")
            .field("len", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;
