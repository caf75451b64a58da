//! Converter plans
//!
//! The factory resolves a target shape into an [`Expr`] tree: field reads, conversions,
//! null checks, constructor calls and member assignments. [`Expr::compile`] turns the tree
//! into a single closure that is built once and invoked per row; `Display` renders the
//! tree for diagnostics.

use super::shape::{AnyValue, AssignFn, ConstructFn, ConvertFn};
use crate::core::error::{MappingError, Result};
use crate::core::field_type::FieldType;
use crate::core::record::DataRecord;
use crate::core::value::DatabaseValue;
use std::fmt;
use std::sync::Arc;

/// Compiled converter: reads one record, produces one value
pub type CompiledFn = Arc<dyn Fn(&dyn DataRecord) -> Result<AnyValue> + Send + Sync>;

type Eval = Box<dyn Fn(&dyn DataRecord) -> Result<AnyValue> + Send + Sync>;

/// A node of a converter plan
pub enum Expr {
    /// Read the field at `ordinal` as its declared type
    ReadField {
        member: String,
        ordinal: usize,
        field_type: FieldType,
    },
    /// Apply a conversion to the operand
    Convert {
        operand: Box<Expr>,
        to: String,
        convert: ConvertFn,
    },
    /// Yield the default value if any of the listed fields is null, otherwise evaluate `then`
    Condition {
        null_check: Vec<usize>,
        member: String,
        type_name: String,
        default: Option<fn() -> AnyValue>,
        then: Box<Expr>,
    },
    /// Default value of a type
    Default {
        type_name: String,
        make: fn() -> AnyValue,
    },
    /// Call a constructor
    New {
        type_name: String,
        args: Vec<Expr>,
        construct: ConstructFn,
    },
    /// Construct, then assign members in order
    MemberInit {
        new: Box<Expr>,
        bindings: Vec<MemberBinding>,
    },
    /// Call a caller-supplied selector
    Invoke {
        target: String,
        args: Vec<Expr>,
        invoke: ConstructFn,
    },
    /// Collect bound arguments for a trampoline
    Arguments(Vec<Expr>),
}

/// Assignment of one member inside [`Expr::MemberInit`]
pub struct MemberBinding {
    /// Member name
    pub member: String,
    /// Value expression
    pub value: Expr,
    assign: AssignFn,
}

impl MemberBinding {
    pub(crate) fn new(member: impl Into<String>, value: Expr, assign: AssignFn) -> Self {
        Self {
            member: member.into(),
            value,
            assign,
        }
    }
}

impl Expr {
    /// Build the closure evaluating this plan
    pub fn compile(&self) -> CompiledFn {
        Arc::from(self.build())
    }

    fn build(&self) -> Eval {
        match self {
            Expr::ReadField {
                member,
                ordinal,
                field_type,
            } => {
                let member = member.clone();
                let (ordinal, field_type) = (*ordinal, *field_type);
                Box::new(move |record: &dyn DataRecord| {
                    read_field(record, &member, ordinal, field_type)
                })
            }
            Expr::Convert {
                operand, convert, ..
            } => {
                let operand = operand.build();
                let convert = Arc::clone(convert);
                Box::new(move |record: &dyn DataRecord| convert(operand(record)?))
            }
            Expr::Condition {
                null_check,
                member,
                default,
                then,
                ..
            } => {
                let null_check = null_check.clone();
                let member = member.clone();
                let default = *default;
                let then = then.build();
                Box::new(move |record: &dyn DataRecord| {
                    match null_check.iter().find(|&&ordinal| record.is_null(ordinal)) {
                        Some(&ordinal) => match default {
                            Some(make) => Ok(make()),
                            None => Err(MappingError::unexpected_null(&member, ordinal)),
                        },
                        None => then(record),
                    }
                })
            }
            Expr::Default { make, .. } => {
                let make = *make;
                Box::new(move |_: &dyn DataRecord| Ok(make()))
            }
            Expr::New {
                args, construct, ..
            }
            | Expr::Invoke {
                args,
                invoke: construct,
                ..
            } => {
                let args = build_all(args);
                let construct = Arc::clone(construct);
                Box::new(move |record: &dyn DataRecord| construct(eval_all(&args, record)?))
            }
            Expr::MemberInit { new, bindings } => {
                let new = new.build();
                let bindings: Vec<(Eval, AssignFn)> = bindings
                    .iter()
                    .map(|b| (b.value.build(), Arc::clone(&b.assign)))
                    .collect();
                Box::new(move |record: &dyn DataRecord| {
                    let mut target = new(record)?;
                    for (value, assign) in &bindings {
                        assign(&mut target, value(record)?)?;
                    }
                    Ok(target)
                })
            }
            Expr::Arguments(args) => {
                let args = build_all(args);
                Box::new(move |record: &dyn DataRecord| {
                    Ok(Box::new(eval_all(&args, record)?) as AnyValue)
                })
            }
        }
    }
}

fn build_all(args: &[Expr]) -> Vec<Eval> {
    args.iter().map(Expr::build).collect()
}

fn eval_all(args: &[Eval], record: &dyn DataRecord) -> Result<Vec<AnyValue>> {
    args.iter().map(|arg| arg(record)).collect()
}

fn boxed<T: Send + 'static>(value: T) -> AnyValue {
    Box::new(value)
}

/// Read a field as its natural Rust type; nulls are an error at this level
///
/// The value must match the declared type exactly or widen losslessly into it
/// (smaller integers into larger ones, `f32` into `f64`). Anything else is an
/// [`MappingError::InvalidCast`].
fn read_field(
    record: &dyn DataRecord,
    member: &str,
    ordinal: usize,
    field_type: FieldType,
) -> Result<AnyValue> {
    let value = record.value(ordinal);
    if value.is_null() {
        return Err(MappingError::unexpected_null(member, ordinal));
    }
    let read = match (field_type, value) {
        (FieldType::Object, value) => Some(boxed(value.clone())),
        (FieldType::Bool, DatabaseValue::Bool(v)) => Some(boxed(*v)),
        (FieldType::Byte, DatabaseValue::Byte(v)) => Some(boxed(*v)),
        (FieldType::Short, DatabaseValue::Short(v)) => Some(boxed(*v)),
        (FieldType::Short, DatabaseValue::Byte(v)) => Some(boxed(i16::from(*v))),
        (FieldType::Int, DatabaseValue::Int(v)) => Some(boxed(*v)),
        (FieldType::Int, DatabaseValue::Short(v)) => Some(boxed(i32::from(*v))),
        (FieldType::Int, DatabaseValue::Byte(v)) => Some(boxed(i32::from(*v))),
        (FieldType::Long, DatabaseValue::Long(v)) => Some(boxed(*v)),
        (FieldType::Long, DatabaseValue::Int(v)) => Some(boxed(i64::from(*v))),
        (FieldType::Long, DatabaseValue::Short(v)) => Some(boxed(i64::from(*v))),
        (FieldType::Long, DatabaseValue::Byte(v)) => Some(boxed(i64::from(*v))),
        (FieldType::Float, DatabaseValue::Float(v)) => Some(boxed(*v)),
        (FieldType::Double, DatabaseValue::Double(v)) => Some(boxed(*v)),
        (FieldType::Double, DatabaseValue::Float(v)) => Some(boxed(f64::from(*v))),
        (FieldType::String, DatabaseValue::String(v)) => Some(boxed(v.clone())),
        (FieldType::Bytes, DatabaseValue::Bytes(v)) => Some(boxed(v.clone())),
        (FieldType::Timestamp, DatabaseValue::Timestamp(_)) => value.as_timestamp().map(boxed),
        _ => None,
    };
    read.ok_or_else(|| MappingError::invalid_cast(member, field_type.to_str(), value.type_name()))
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::ReadField {
                ordinal,
                field_type,
                ..
            } => write!(f, "x.{}({})", field_type.getter_name(), ordinal),
            Expr::Convert { operand, to, .. } => write!(f, "{} as {}", operand, to),
            Expr::Condition {
                null_check,
                type_name,
                then,
                ..
            } => {
                f.write_str("if ")?;
                for (i, ordinal) in null_check.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "x.is_null({})", ordinal)?;
                }
                write!(f, " {{ default::<{}>() }} else {{ {} }}", type_name, then)
            }
            Expr::Default { type_name, .. } => write!(f, "default::<{}>()", type_name),
            Expr::New {
                type_name, args, ..
            } => {
                write!(f, "{}::construct(", type_name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::MemberInit { new, bindings } => {
                write!(f, "{}", new)?;
                if bindings.is_empty() {
                    return Ok(());
                }
                f.write_str(" { ")?;
                for (i, binding) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", binding.member, binding.value)?;
                }
                f.write_str(" }")
            }
            Expr::Invoke { target, args, .. } => {
                write!(f, "{}(", target)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Arguments(args) => {
                f.write_str("(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
