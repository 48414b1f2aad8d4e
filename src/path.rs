use crate::{
    ast::Expr,
    error::{BindError, RuntimeError, ScriptResult},
    registry::TypeRegistry,
    value::Value,
};

/// One step below the root variable of an assignment target.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Member access by name
    ///
    /// # Examples
    /// - `order.Price` → `Field("Price")`
    /// - `prices["coffee"]` → `Field("coffee")`
    Field(String),

    /// Array element by position; negative positions count from the end
    ///
    /// # Examples
    /// - `items[0]` → `Index(0)`
    /// - `items[-1]` → `Index(-1)`
    Index(i64),
}

/// Collect the static shape of an assignment target: the root variable plus
/// the steps to walk. For `ticket.Items[0].Price` that is root `ticket` and
/// steps `Items`, `[0]`, `Price`. Index expressions are returned unevaluated,
/// in source order, for the caller to evaluate.
pub fn extract_path(expr: &Expr) -> ScriptResult<(String, Vec<PathStep<'_>>)> {
    let mut steps = Vec::new();
    let root = extract_path_recursive(expr, &mut steps)?;
    Ok((root, steps))
}

/// An unevaluated segment.
#[derive(Debug, Clone, Copy)]
pub enum PathStep<'a> {
    Field(&'a str),
    Index(&'a Expr),
}

fn extract_path_recursive<'a>(expr: &'a Expr, steps: &mut Vec<PathStep<'a>>) -> ScriptResult<String> {
    match expr {
        Expr::Identifier { name, .. } => Ok(name.clone()),
        Expr::Member { object, name } => {
            let root = extract_path_recursive(object, steps)?;
            steps.push(PathStep::Field(name));
            Ok(root)
        }
        Expr::Index { object, index } => {
            let root = extract_path_recursive(object, steps)?;
            steps.push(PathStep::Index(index));
            Ok(root)
        }
        _ => Err(RuntimeError::Type(
            "assignment target must be a variable, member or index path".to_string(),
        )
        .into()),
    }
}

/// Turn an evaluated index into a segment.
pub fn segment_for(index: Value) -> ScriptResult<PathSegment> {
    match index {
        Value::Integer(n) => Ok(PathSegment::Index(n)),
        Value::String(s) => Ok(PathSegment::Field(s)),
        Value::Float(n) if n.fract() == 0.0 => Ok(PathSegment::Index(n as i64)),
        other => Err(RuntimeError::Type(format!("cannot index with {}", other.type_name())).into()),
    }
}

fn resolve_index(idx: i64, len: usize) -> Option<usize> {
    if idx >= 0 {
        let index = idx as usize;
        (index < len).then_some(index)
    } else {
        let abs = idx.unsigned_abs() as usize;
        (abs <= len).then(|| len - abs)
    }
}

/// Store `value` at `path` below `current`.
///
/// Maps gain missing keys; arrays must already have the slot; host instances
/// are written through their type's property setters.
pub fn assign_at_path(
    current: &mut Value,
    path: &[PathSegment],
    value: Value,
    types: &TypeRegistry,
) -> ScriptResult<()> {
    let Some((segment, rest)) = path.split_first() else {
        *current = value;
        return Ok(());
    };

    match (current, segment) {
        (Value::Object(map), PathSegment::Field(key)) => {
            if rest.is_empty() {
                map.insert(key.clone(), value);
                return Ok(());
            }
            let existing = map.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned();
            let child = existing
                .and_then(|k| map.get_mut(&k))
                .ok_or_else(|| RuntimeError::UnknownMember {
                    type_name: "map".to_string(),
                    member: key.clone(),
                })?;
            assign_at_path(child, rest, value, types)
        }
        (Value::Array(arr), PathSegment::Index(idx)) => {
            let len = arr.len();
            let index = resolve_index(*idx, len)
                .ok_or(RuntimeError::IndexOutOfBounds { index: *idx, length: len })?;
            assign_at_path(&mut arr[index], rest, value, types)
        }
        (Value::Instance(instance), PathSegment::Field(member)) => {
            let instance = instance.clone();
            let ty = types.get_match(&instance.type_name).map(|(_, ty)| ty.clone());
            if rest.is_empty() {
                return match ty {
                    Some(ty) => ty.set(&instance, member, value),
                    None => {
                        instance.set_field(member, value);
                        Ok(())
                    }
                };
            }
            let current_value = match &ty {
                Some(ty) => ty.get(&instance, member)?,
                None => instance.field(member),
            };
            let mut child = current_value.ok_or_else(|| RuntimeError::UnknownMember {
                type_name: instance.type_name.to_string(),
                member: member.clone(),
            })?;
            assign_at_path(&mut child, rest, value, types)?;
            match ty {
                Some(ty) => ty.set(&instance, member, child),
                None => {
                    instance.set_field(member, child);
                    Ok(())
                }
            }
        }
        (Value::Object(_), PathSegment::Index(_)) => {
            Err(RuntimeError::Type("cannot use a numeric index on a map".into()).into())
        }
        (Value::Array(_), PathSegment::Field(_)) => {
            Err(RuntimeError::Type("cannot use a member name on an array".into()).into())
        }
        (v, _) => Err(RuntimeError::Type(format!("cannot assign into {}", v.type_name())).into()),
    }
}

/// Error for assignment to a path whose root variable does not exist.
pub fn unknown_root(name: &str) -> BindError {
    BindError::UnknownIdentifier {
        name: name.to_string(),
    }
}
