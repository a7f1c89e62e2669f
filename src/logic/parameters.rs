use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;

use crate::client::traits::{NifiApi, ParameterContextApi};
use crate::error::{NifiError, Result};
use crate::model::{Id, Parameter, ParameterContext, ProcessGroup, REDACTED};

/// The context that declares a parameter, as seen from a starting context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterOwner {
    pub context_id: Id,
    pub context_name: String,
    pub sensitive: bool,
    pub has_asset: bool,
}

/// Result of walking an inheritance chain: who owns each name, plus every
/// context read along the way (with the revision that was read).
#[derive(Debug, Clone, Default)]
pub struct ParameterOwnership {
    pub owners: HashMap<String, ParameterOwner>,
    pub contexts: HashMap<Id, ParameterContext>,
    /// Context ids in visiting order
    pub chain: Vec<Id>,
}

impl ParameterOwnership {
    pub fn owner_of(&self, name: &str) -> Option<&ParameterOwner> {
        self.owners.get(name)
    }
}

pub struct ParameterResolver;

impl ParameterResolver {
    /// Walk the inheritance chain rooted at `root` and record, for each
    /// parameter name, the first context that declares it.
    ///
    /// Visiting order is depth-first: a context's own parameters, then each
    /// of its inherited contexts in declared order, fully, before the next
    /// sibling. A context reachable along several paths is visited once.
    pub async fn ownership_map<S: ParameterContextApi + ?Sized>(
        api: &S,
        root: &ParameterContext,
    ) -> Result<ParameterOwnership> {
        let mut ownership = ParameterOwnership::default();
        let mut visited: HashSet<Id> = HashSet::new();
        let mut pending: Vec<(Id, String)> = Vec::new();
        let mut next = Some(root.clone());

        while let Some(context) = next.take() {
            visited.insert(context.id.clone());
            for parameter in &context.parameters {
                ownership
                    .owners
                    .entry(parameter.name.clone())
                    .or_insert_with(|| ParameterOwner {
                        context_id: context.id.clone(),
                        context_name: context.name.clone(),
                        sensitive: parameter.sensitive,
                        has_asset: parameter.has_asset(),
                    });
            }
            pending.extend(
                context
                    .inherited_parameter_contexts
                    .iter()
                    .rev()
                    .map(|r| (r.id.clone(), context.name.clone())),
            );
            ownership.chain.push(context.id.clone());
            ownership.contexts.insert(context.id.clone(), context);

            while let Some((id, child_name)) = pending.pop() {
                if visited.contains(&id) {
                    continue;
                }
                let parent = api.get_parameter_context(&id).await?.ok_or_else(|| {
                    NifiError::configuration(format!(
                        "parameter context '{}' inherits from missing context {}",
                        child_name, id
                    ))
                })?;
                next = Some(parent);
                break;
            }
        }

        log::debug!(
            "Resolved {} parameters across {} contexts",
            ownership.owners.len(),
            ownership.chain.len()
        );
        Ok(ownership)
    }
}

/// Planned write of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterAction {
    Update {
        name: String,
        value: String,
        context_id: Id,
        context_name: String,
        sensitive: bool,
    },
    Create {
        name: String,
        value: String,
        context_id: Id,
        context_name: String,
    },
}

impl ParameterAction {
    pub fn context_id(&self) -> &str {
        match self {
            ParameterAction::Update { context_id, .. }
            | ParameterAction::Create { context_id, .. } => context_id,
        }
    }

    /// The parameter as it will be sent. A plain value always clears any
    /// asset reference.
    pub fn to_parameter(&self) -> Parameter {
        match self {
            ParameterAction::Update {
                name,
                value,
                sensitive,
                ..
            } => Parameter {
                sensitive: *sensitive,
                ..Parameter::new(name.clone(), value.clone())
            },
            ParameterAction::Create { name, value, .. } => {
                Parameter::new(name.clone(), value.clone())
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ParameterAction::Update {
                name,
                value,
                context_id,
                context_name,
                sensitive,
            } => {
                let shown = if *sensitive { REDACTED } else { value.as_str() };
                format!("UPDATE '{}' in '{}' ({}) = {}", name, context_name, context_id, shown)
            }
            ParameterAction::Create {
                name,
                value,
                context_id,
                context_name,
            } => format!("CREATE '{}' in '{}' ({}) = {}", name, context_name, context_id, value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InheritedParamsRequest {
    pub process_group_id: Id,
    pub parameters: BTreeMap<String, String>,
    pub dry_run: bool,
    pub allow_override: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InheritedParamsResult {
    pub dry_run: bool,
    pub parameters_updated: usize,
    pub contexts_modified: usize,
    pub plan: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Parse a JSON object of parameter values. Scalars are stringified;
/// nulls, arrays and nested objects are rejected.
pub fn parse_parameter_map(json: &str) -> Result<BTreeMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| NifiError::input(format!("parameters are not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| NifiError::input("parameters must be a JSON object of name to value"))?;

    object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(NifiError::input(format!(
                        "value of parameter '{}' must be a string, number or boolean",
                        name
                    )))
                }
            };
            Ok((name.clone(), value))
        })
        .collect()
}

async fn bound_context<S: NifiApi + ?Sized>(
    api: &S,
    process_group_id: &str,
) -> Result<(ProcessGroup, ParameterContext)> {
    let group = api
        .get_process_group(process_group_id)
        .await?
        .ok_or_else(|| NifiError::not_found(format!("process group {}", process_group_id)))?;
    let reference = group.parameter_context.clone().ok_or_else(|| {
        NifiError::configuration(format!(
            "process group '{}' has no parameter context",
            group.name
        ))
    })?;
    let context = api
        .get_parameter_context(&reference.id)
        .await?
        .ok_or_else(|| NifiError::not_found(format!("parameter context {}", reference.id)))?;
    Ok((group, context))
}

/// Update parameters where they are declared in the inheritance chain of
/// the group's bound context instead of shadowing them in the group's own
/// context.
pub async fn configure_inherited_params<S: NifiApi + ?Sized>(
    api: &S,
    request: &InheritedParamsRequest,
) -> Result<InheritedParamsResult> {
    if request.parameters.is_empty() {
        return Err(NifiError::input("no parameters given"));
    }
    let (group, own_context) = bound_context(api, &request.process_group_id).await?;
    let ownership = ParameterResolver::ownership_map(api, &own_context).await?;

    let mut result = InheritedParamsResult {
        dry_run: request.dry_run,
        ..Default::default()
    };
    let mut actions = Vec::new();

    for (name, value) in &request.parameters {
        match ownership.owner_of(name) {
            Some(owner) => {
                if owner.has_asset {
                    result.warnings.push(format!(
                        "'{}' in '{}' references an asset; setting a value replaces the asset reference",
                        name, owner.context_name
                    ));
                }
                actions.push(ParameterAction::Update {
                    name: name.clone(),
                    value: value.clone(),
                    context_id: owner.context_id.clone(),
                    context_name: owner.context_name.clone(),
                    sensitive: owner.sensitive,
                });
            }
            None if request.allow_override => actions.push(ParameterAction::Create {
                name: name.clone(),
                value: value.clone(),
                context_id: own_context.id.clone(),
                context_name: own_context.name.clone(),
            }),
            None => result.errors.push(format!(
                "'{}' is not defined in the inheritance chain of '{}' (set allow_override to create it)",
                name, own_context.name
            )),
        }
    }

    result.plan = actions.iter().map(ParameterAction::describe).collect();
    for warning in &result.warnings {
        log::warn!("{}", warning);
    }

    if request.dry_run || !result.errors.is_empty() {
        if !result.errors.is_empty() {
            log::warn!(
                "Not applying parameters to '{}': {} unresolved",
                group.name,
                result.errors.len()
            );
        }
        return Ok(result);
    }

    // one request per context, in the order contexts first appear in the plan
    let context_ids: Vec<&str> = actions.iter().map(ParameterAction::context_id).unique().collect();
    for context_id in context_ids {
        let context = ownership
            .contexts
            .get(context_id)
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", context_id)))?;
        let parameters: Vec<Parameter> = actions
            .iter()
            .filter(|a| a.context_id() == context_id)
            .map(ParameterAction::to_parameter)
            .collect();
        log::info!(
            "Updating {} parameter(s) in context '{}'",
            parameters.len(),
            context.name
        );
        result.parameters_updated += parameters.len();
        api.update_parameter_context(context, parameters).await?;
        result.contexts_modified += 1;
    }

    Ok(result)
}

#[derive(Debug, Clone)]
pub struct ConfigureParamsRequest {
    pub process_group_id: Id,
    pub parameters: BTreeMap<String, String>,
    /// Write to this context instead of the group's bound one
    pub parameter_context_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigureParamsResult {
    pub parameter_context_id: Id,
    pub parameter_context_name: String,
    pub parameters_updated: usize,
    pub parameters_created: usize,
}

/// Write parameters into a single context without looking at inheritance.
pub async fn configure_params<S: NifiApi + ?Sized>(
    api: &S,
    request: &ConfigureParamsRequest,
) -> Result<ConfigureParamsResult> {
    if request.parameters.is_empty() {
        return Err(NifiError::input("no parameters given"));
    }
    let context = match &request.parameter_context_id {
        Some(id) => api
            .get_parameter_context(id)
            .await?
            .ok_or_else(|| NifiError::not_found(format!("parameter context {}", id)))?,
        None => bound_context(api, &request.process_group_id).await?.1,
    };

    let mut updated = 0;
    let mut created = 0;
    let parameters: Vec<Parameter> = request
        .parameters
        .iter()
        .map(|(name, value)| match context.get_parameter(name) {
            Some(existing) => {
                updated += 1;
                Parameter {
                    sensitive: existing.sensitive,
                    ..Parameter::new(name.clone(), value.clone())
                }
            }
            None => {
                created += 1;
                Parameter::new(name.clone(), value.clone())
            }
        })
        .collect();

    log::info!(
        "Writing {} parameter(s) to context '{}'",
        parameters.len(),
        context.name
    );
    api.update_parameter_context(&context, parameters).await?;

    Ok(ConfigureParamsResult {
        parameter_context_id: context.id.clone(),
        parameter_context_name: context.name.clone(),
        parameters_updated: updated,
        parameters_created: created,
    })
}
