//! Structured (record-to-record) mapping.
//!
//! A plan is built once per pair: every writable target member gets a
//! directive from explicit configuration or the first answering convention.
//! The plan then compiles into a procedure that runs the member copies.

use crate::convention::ConventionContext;
use crate::error::{MapError, Result};
use crate::mapper::MapperInner;
use crate::oracle::derives_from;
use crate::plan::{Directive, MemberConfig, PlanConfig, Recursion, StructuredPlan};
use crate::procedure::Procedure;
use crate::shape::{MemberDescriptor, Shape};
use crate::strategy::Synthesizer;
use crate::value::{Record, Value};
use std::sync::{Arc, Weak};

pub(crate) fn build_plan(
    mapper: &MapperInner,
    source: &Shape,
    target: &Shape,
    config: &PlanConfig,
) -> Result<StructuredPlan> {
    let recursion = config.recursion.unwrap_or(if mapper.options().hierarchical {
        Recursion::Hierarchical
    } else {
        Recursion::Flat
    });
    let mut plan = StructuredPlan {
        source: source.clone(),
        target: target.clone(),
        directives: Vec::new(),
        constructor: config
            .constructor
            .clone()
            .or_else(|| mapper.conventions().constructor(source, target)),
        custom: config.custom.clone(),
        before: config.before.clone(),
        after: config.after.clone(),
        recursion,
    };
    if plan.custom.is_some() {
        return Ok(plan);
    }

    let (Some(source_def), Some(target_def)) = (source.as_record(), target.as_record()) else {
        return Err(MapError::unsupported(
            source,
            target,
            "structured mapping needs record shapes on both sides",
        ));
    };
    let source_members: Vec<MemberDescriptor> = source_def
        .members()
        .filter(|m| m.is_readable())
        .cloned()
        .collect();

    for target_member in target_def.members().filter(|m| m.is_writable()) {
        let name = target_member.name();
        let member_config = config.member(name);
        let directive = if member_config.is_some_and(|m| m.ignore) {
            Directive::Ignore
        } else {
            member_directive(
                mapper,
                source,
                target,
                &source_members,
                target_member,
                member_config,
                recursion,
            )
            .map_err(|e| e.in_member(name))?
        };
        plan.directives.push((name.to_string(), directive));
    }

    tracing::debug!(
        %source,
        %target,
        members = plan.directives.len(),
        ?recursion,
        "built structured plan"
    );
    Ok(plan)
}

fn member_directive(
    mapper: &MapperInner,
    source: &Shape,
    target: &Shape,
    source_members: &[MemberDescriptor],
    target_member: &MemberDescriptor,
    member_config: Option<&MemberConfig>,
    recursion: Recursion,
) -> Result<Directive> {
    let find = |name: &str| source_members.iter().find(|m| m.name() == name);

    let (source_member, suggested) = match member_config.and_then(|m| m.source_member.as_deref()) {
        Some(explicit) => match find(explicit) {
            Some(found) => (found, None),
            None => {
                tracing::warn!(
                    %source,
                    member = explicit,
                    target_member = target_member.name(),
                    "configured source member does not exist, leaving target member unmapped"
                );
                return Ok(Directive::Ignore);
            }
        },
        None => {
            let ctx = ConventionContext {
                source,
                target,
                source_members,
                target_member,
            };
            let Some((found, rule)) = mapper.conventions().find(&ctx) else {
                tracing::debug!(
                    %target,
                    target_member = target_member.name(),
                    "no convention matched"
                );
                return Ok(Directive::Ignore);
            };
            match find(&found.source_member) {
                Some(descriptor) => (descriptor, found.converter),
                None => {
                    tracing::warn!(
                        rule,
                        member = %found.source_member,
                        "convention named a missing source member"
                    );
                    return Ok(Directive::Ignore);
                }
            }
        }
    };

    let source_name = source_member.name().to_string();
    let null_substitute = member_config.and_then(|m| m.null_substitute.clone());
    let (from, to) = (source_member.shape(), target_member.shape());
    let convert = |converter: Option<Procedure>| Directive::Convert {
        source_member: source_name.clone(),
        converter,
        null_substitute: null_substitute.clone(),
    };

    if let Some(f) = member_config.and_then(|m| m.converter.clone()) {
        return Ok(convert(Some(Procedure::from_fn(from.clone(), to.clone(), f))));
    }
    if let Some(converter) = suggested {
        return Ok(convert(Some(converter)));
    }

    match recursion {
        Recursion::Hierarchical if from.is_record() && to.is_record() => Ok(Directive::Nested {
            source_member: source_name.clone(),
            procedure: mapper.compile(from, to)?,
        }),
        Recursion::Hierarchical if from == to => Ok(convert(None)),
        Recursion::Hierarchical => Ok(convert(Some(mapper.compile(from, to)?))),
        Recursion::Flat if from == to => Ok(convert(None)),
        Recursion::Flat => match mapper.resolver().compile(from, to) {
            Ok(procedure) => Ok(convert(Some(procedure))),
            Err(error) => {
                tracing::warn!(
                    %from,
                    %to,
                    %error,
                    target_member = target_member.name(),
                    "no strategy for member in flat mode, leaving it unmapped"
                );
                Ok(Directive::Ignore)
            }
        },
    }
}

/// Compile a plan into a procedure that dispatches on the runtime record shape.
pub(crate) fn into_procedure(plan: StructuredPlan, dispatch: Weak<MapperInner>) -> Procedure {
    let plan = Arc::new(plan);
    let (source, target) = (plan.source.clone(), plan.target.clone());
    let (into_plan, into_dispatch) = (Arc::clone(&plan), dispatch.clone());

    Procedure::new(source, target, move |value| execute(&plan, &dispatch, value)).with_into(
        move |value, dest| execute_into(&into_plan, &into_dispatch, value, dest),
    )
}

fn execute(plan: &StructuredPlan, dispatch: &Weak<MapperInner>, value: Value) -> Result<Value> {
    if let Some(custom) = &plan.custom {
        return custom(value);
    }
    if value.is_null() {
        return Ok(Value::Null);
    }
    if let Some(redirect) = redirect(plan, dispatch, &value)? {
        return redirect.call(value);
    }
    let mut dest = construct(plan);
    populate(plan, &value, &mut dest)?;
    Ok(dest)
}

fn execute_into(
    plan: &StructuredPlan,
    dispatch: &Weak<MapperInner>,
    value: Value,
    dest: &mut Value,
) -> Result<()> {
    if let Some(custom) = &plan.custom {
        *dest = custom(value)?;
        return Ok(());
    }
    if value.is_null() {
        *dest = Value::Null;
        return Ok(());
    }
    if let Some(redirect) = redirect(plan, dispatch, &value)? {
        return redirect.call_into(value, dest);
    }
    if !matches!(dest, Value::Record(_)) {
        *dest = construct(plan);
    }
    populate(plan, &value, dest)
}

/// Procedure for a more derived runtime shape, when the value has one.
fn redirect(
    plan: &StructuredPlan,
    dispatch: &Weak<MapperInner>,
    value: &Value,
) -> Result<Option<Procedure>> {
    let Some(runtime) = value.as_record().map(Record::shape) else {
        return Ok(None);
    };
    if runtime == &plan.source || !derives_from(runtime, &plan.source) {
        return Ok(None);
    }
    let mapper = dispatch
        .upgrade()
        .ok_or_else(|| MapError::configuration("mapper was dropped"))?;
    mapper.compile(runtime, &plan.target).map(Some)
}

fn construct(plan: &StructuredPlan) -> Value {
    if let Some(constructor) = &plan.constructor {
        return constructor();
    }
    match plan.target.as_record().and_then(|def| def.constructor_fn()) {
        Some(constructor) => constructor(),
        None => Value::Record(Record::with_defaults(plan.target.clone())),
    }
}

fn populate(plan: &StructuredPlan, source: &Value, dest: &mut Value) -> Result<()> {
    for hook in &plan.before {
        hook(source, dest)?;
    }

    let src = source
        .as_record()
        .ok_or_else(|| MapError::mismatch(&plan.source, source))?;
    match dest {
        Value::Record(out) => copy_members(plan, src, out)?,
        other => return Err(MapError::mismatch(&plan.target, &*other)),
    }

    for hook in &plan.after {
        hook(source, dest)?;
    }
    Ok(())
}

fn copy_members(plan: &StructuredPlan, src: &Record, out: &mut Record) -> Result<()> {
    for (target_member, directive) in &plan.directives {
        match directive {
            Directive::Ignore => {}
            Directive::Convert {
                source_member,
                converter,
                null_substitute,
            } => {
                let mut value = src.get(source_member).cloned().unwrap_or(Value::Null);
                if let (true, Some(substitute)) = (value.is_null(), null_substitute) {
                    value = substitute.clone();
                }
                let value = match converter {
                    Some(procedure) => procedure
                        .call(value)
                        .map_err(|e| e.in_member(target_member.as_str()))?,
                    None => value,
                };
                out.set(target_member.as_str(), value);
            }
            Directive::Nested {
                source_member,
                procedure,
            } => {
                let value = src.get(source_member).cloned().unwrap_or(Value::Null);
                let in_place =
                    !value.is_null() && out.get(target_member).is_some_and(|v| !v.is_null());
                let result = if in_place {
                    match out.get_mut(target_member) {
                        Some(slot) => procedure.call_into(value, slot),
                        None => Ok(()),
                    }
                } else {
                    procedure
                        .call(value)
                        .map(|mapped| out.set(target_member.as_str(), mapped))
                };
                result.map_err(|e| e.in_member(target_member.as_str()))?;
            }
        }
    }
    Ok(())
}
