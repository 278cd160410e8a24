//! Types every [`crate::TypeRegistry::with_builtins`] registry starts with: the primitives
//! (`int`, `string`, ...) and a static `Math` type.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::HostError;
use crate::object_model::TypeInfo;
use crate::value::{Type, Value};

pub(crate) fn types() -> Vec<TypeInfo> {
    vec![
        bool_type(),
        int_type(),
        float_type(),
        double_type(),
        decimal_type(),
        string_type(),
        math_type(),
    ]
}

fn to_string(info: TypeInfo) -> TypeInfo {
    info.value_method("ToString", &[], Type::Text, |receiver, _| {
        Ok(Value::from(receiver.to_string()))
    })
}

fn text_receiver(receiver: &Value) -> Result<&str, HostError> {
    receiver
        .as_str()
        .ok_or_else(|| HostError::new(format!("expected a string receiver, found {}", receiver.ty())))
}

fn text_arg(args: &[Value], idx: usize) -> Result<&str, HostError> {
    args.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| HostError::new(format!("argument {idx} must be a string")))
}

fn int_arg(args: &[Value], idx: usize) -> Result<i32, HostError> {
    args.get(idx)
        .and_then(Value::as_int)
        .ok_or_else(|| HostError::new(format!("argument {idx} must be an int")))
}

fn double_arg(args: &[Value], idx: usize) -> Result<f64, HostError> {
    args.get(idx)
        .and_then(Value::as_double)
        .ok_or_else(|| HostError::new(format!("argument {idx} must be a double")))
}

fn decimal_arg(args: &[Value], idx: usize) -> Result<Decimal, HostError> {
    args.get(idx)
        .and_then(Value::as_decimal)
        .ok_or_else(|| HostError::new(format!("argument {idx} must be a decimal")))
}

fn parse_arg<T: FromStr>(args: &[Value], ty: &str) -> Result<T, HostError> {
    let raw = text_arg(args, 0)?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| HostError::new(format!("cannot parse {raw:?} as {ty}")))
}

fn bool_type() -> TypeInfo {
    to_string(TypeInfo::new("bool")).static_method("Parse", &[Type::Text], Type::Bool, |args| {
        Ok(Value::from(parse_arg::<bool>(args, "bool")?))
    })
}

fn int_type() -> TypeInfo {
    to_string(TypeInfo::new("int"))
        .static_field("MaxValue", Type::Int, Value::from(i32::MAX))
        .static_field("MinValue", Type::Int, Value::from(i32::MIN))
        .static_method("Parse", &[Type::Text], Type::Int, |args| {
            Ok(Value::from(parse_arg::<i32>(args, "int")?))
        })
}

fn float_type() -> TypeInfo {
    to_string(TypeInfo::new("float")).static_method("Parse", &[Type::Text], Type::Float, |args| {
        Ok(Value::from(parse_arg::<f32>(args, "float")?))
    })
}

fn double_type() -> TypeInfo {
    to_string(TypeInfo::new("double"))
        .static_field("MaxValue", Type::Double, Value::from(f64::MAX))
        .static_field("MinValue", Type::Double, Value::from(f64::MIN))
        .static_field("NaN", Type::Double, Value::from(f64::NAN))
        .static_method("Parse", &[Type::Text], Type::Double, |args| {
            Ok(Value::from(parse_arg::<f64>(args, "double")?))
        })
}

fn decimal_type() -> TypeInfo {
    to_string(TypeInfo::new("decimal"))
        .static_field("MaxValue", Type::Decimal, Value::from(Decimal::MAX))
        .static_field("MinValue", Type::Decimal, Value::from(Decimal::MIN))
        .static_method("Parse", &[Type::Text], Type::Decimal, |args| {
            Ok(Value::from(parse_arg::<Decimal>(args, "decimal")?))
        })
}

fn char_count(s: &str) -> Result<i32, HostError> {
    i32::try_from(s.chars().count()).map_err(|_| HostError::new("string is too long"))
}

fn substring(s: &str, start: i32, len: Option<i32>) -> Result<String, HostError> {
    let total = char_count(s)?;
    let len = len.unwrap_or(total.saturating_sub(start));
    if start < 0 || len < 0 || start > total || len > total - start {
        return Err(HostError::new(format!(
            "Substring({start}, {len}) is out of range for a string of length {total}"
        )));
    }
    Ok(s.chars().skip(start as usize).take(len as usize).collect())
}

fn string_type() -> TypeInfo {
    to_string(TypeInfo::new("string"))
        .value_property("Length", Type::Int, |s| {
            Ok(Value::from(char_count(text_receiver(s)?)?))
        })
        .value_method("ToUpper", &[], Type::Text, |s, _| {
            Ok(Value::from(text_receiver(s)?.to_uppercase()))
        })
        .value_method("ToLower", &[], Type::Text, |s, _| {
            Ok(Value::from(text_receiver(s)?.to_lowercase()))
        })
        .value_method("Trim", &[], Type::Text, |s, _| {
            Ok(Value::from(text_receiver(s)?.trim()))
        })
        .value_method("Substring", &[Type::Int], Type::Text, |s, args| {
            Ok(Value::from(substring(
                text_receiver(s)?,
                int_arg(args, 0)?,
                None,
            )?))
        })
        .value_method(
            "Substring",
            &[Type::Int, Type::Int],
            Type::Text,
            |s, args| {
                Ok(Value::from(substring(
                    text_receiver(s)?,
                    int_arg(args, 0)?,
                    Some(int_arg(args, 1)?),
                )?))
            },
        )
        .value_method("Contains", &[Type::Text], Type::Bool, |s, args| {
            Ok(Value::from(text_receiver(s)?.contains(text_arg(args, 0)?)))
        })
        .value_method("StartsWith", &[Type::Text], Type::Bool, |s, args| {
            Ok(Value::from(text_receiver(s)?.starts_with(text_arg(args, 0)?)))
        })
        .value_method("EndsWith", &[Type::Text], Type::Bool, |s, args| {
            Ok(Value::from(text_receiver(s)?.ends_with(text_arg(args, 0)?)))
        })
        .value_indexer(&[Type::Int], Type::Text, |s, args| {
            let idx = int_arg(args, 0)?;
            let s = text_receiver(s)?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| HostError::new(format!("index {idx} is out of range")))
        })
        .static_field("Empty", Type::Text, Value::from(""))
        .static_method("Concat", &[Type::Text, Type::Text], Type::Text, |args| {
            Ok(Value::from(format!("{}{}", text_arg(args, 0)?, text_arg(args, 1)?)))
        })
        .static_method(
            "Concat",
            &[Type::Text, Type::Text, Type::Text],
            Type::Text,
            |args| {
                Ok(Value::from(format!(
                    "{}{}{}",
                    text_arg(args, 0)?,
                    text_arg(args, 1)?,
                    text_arg(args, 2)?
                )))
            },
        )
        .static_method("IsNullOrEmpty", &[Type::Text], Type::Bool, |args| {
            Ok(Value::from(text_arg(args, 0)?.is_empty()))
        })
}

fn math_type() -> TypeInfo {
    TypeInfo::new("Math")
        .static_field("PI", Type::Double, Value::from(std::f64::consts::PI))
        .static_field("E", Type::Double, Value::from(std::f64::consts::E))
        .static_method("Abs", &[Type::Int], Type::Int, |args| {
            let v = int_arg(args, 0)?;
            v.checked_abs()
                .map(Value::from)
                .ok_or_else(|| HostError::new("Abs overflows for int.MinValue"))
        })
        .static_method("Abs", &[Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.abs()))
        })
        .static_method("Abs", &[Type::Decimal], Type::Decimal, |args| {
            Ok(Value::from(decimal_arg(args, 0)?.abs()))
        })
        .static_method("Pow", &[Type::Double, Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.powf(double_arg(args, 1)?)))
        })
        .static_method("Sqrt", &[Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.sqrt()))
        })
        .static_method("Floor", &[Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.floor()))
        })
        .static_method("Ceiling", &[Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.ceil()))
        })
        // Midpoints round to even.
        .static_method("Round", &[Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.round_ties_even()))
        })
        .static_method("Round", &[Type::Decimal], Type::Decimal, |args| {
            Ok(Value::from(decimal_arg(args, 0)?.round()))
        })
        .static_method("Min", &[Type::Int, Type::Int], Type::Int, |args| {
            Ok(Value::from(int_arg(args, 0)?.min(int_arg(args, 1)?)))
        })
        .static_method("Max", &[Type::Int, Type::Int], Type::Int, |args| {
            Ok(Value::from(int_arg(args, 0)?.max(int_arg(args, 1)?)))
        })
        .static_method("Min", &[Type::Double, Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.min(double_arg(args, 1)?)))
        })
        .static_method("Max", &[Type::Double, Type::Double], Type::Double, |args| {
            Ok(Value::from(double_arg(args, 0)?.max(double_arg(args, 1)?)))
        })
        .static_method("Min", &[Type::Decimal, Type::Decimal], Type::Decimal, |args| {
            Ok(Value::from(decimal_arg(args, 0)?.min(decimal_arg(args, 1)?)))
        })
        .static_method("Max", &[Type::Decimal, Type::Decimal], Type::Decimal, |args| {
            Ok(Value::from(decimal_arg(args, 0)?.max(decimal_arg(args, 1)?)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_checks_bounds_in_chars() {
        assert_eq!(substring("héllo", 1, Some(3)).unwrap(), "éll");
        assert_eq!(substring("héllo", 2, None).unwrap(), "llo");
        assert!(substring("abc", 2, Some(5)).is_err());
        assert!(substring("abc", -1, None).is_err());
    }

    #[test]
    fn string_members_reject_other_receivers() {
        let string = string_type();
        let length = string.find_member("Length").unwrap();
        assert_eq!(length.get(&Value::from("héllo")).unwrap(), Value::Int(5));
        let err = length.get(&Value::Int(3)).unwrap_err();
        assert!(err.to_string().contains("found int"), "{err}");

        let contains = string.find_method("Contains", &[Type::Text]).unwrap();
        assert!(contains.invoke(&Value::Bool(true), &[Value::from("b")]).is_err());
    }

    #[test]
    fn math_round_uses_bankers_rounding() {
        let math = math_type();
        let round = math.find_static_method("Round", &[Type::Double]).unwrap();
        assert_eq!(
            round.invoke(&Value::Unit, &[Value::from(2.5)]),
            Ok(Value::from(2.0))
        );
        let round = math.find_static_method("Round", &[Type::Decimal]).unwrap();
        assert_eq!(
            round.invoke(&Value::Unit, &[Value::from(Decimal::new(35, 1))]),
            Ok(Value::from(Decimal::from(4)))
        );
    }
}
