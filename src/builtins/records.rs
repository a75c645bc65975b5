//! Record primitives: construction and field projection
//!
//! `(record 'name 'field1 v1 'field2 v2 ...)` builds a record with an
//! ordered field list; `(record-get r 'field)` projects a field.

use crate::env::Environment;
use crate::error::LispError;
use crate::value::{RecordData, Value};
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.bind("record", Value::Primitive("record", prim_record));
    env.bind("record-get", Value::Primitive("record-get", prim_record_get));
}

pub fn prim_record(args: &[Value]) -> Result<Value, LispError> {
    const SHAPE: &str = "(record 'name 'field value ...)";
    let Some((name_arg, field_args)) = args.split_first() else {
        return Err(LispError::TypeError(SHAPE.to_string()));
    };
    let Value::Symbol(name) = name_arg else {
        return Err(LispError::TypeError(SHAPE.to_string()));
    };
    if field_args.len() % 2 != 0 {
        return Err(LispError::TypeError(SHAPE.to_string()));
    }

    let mut fields = Vec::with_capacity(field_args.len() / 2);
    for chunk in field_args.chunks(2) {
        let Value::Symbol(field) = &chunk[0] else {
            return Err(LispError::RecordFieldNameMustBeSymbol(chunk[0].to_string()));
        };
        fields.push((field.clone(), chunk[1].clone()));
    }

    Ok(Value::Record(Rc::new(RecordData {
        name: name.clone(),
        fields,
    })))
}

pub fn prim_record_get(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::Record(record), Value::Symbol(field)] => record
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                LispError::NotFound(format!(
                    "Record {} has no field {}",
                    record.name, field
                ))
            }),
        _ => Err(LispError::TypeError("(record-get record 'field)".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Value {
        Value::Symbol(s.to_string())
    }

    #[test]
    fn test_record_construction_and_printing() {
        let r = prim_record(&[
            sym("point"),
            sym("x"),
            Value::Integer(1),
            sym("y"),
            Value::Integer(2),
        ])
        .unwrap();
        assert_eq!(r.to_string(), "#<record:point(x:int=1 y:int=2)>");
    }

    #[test]
    fn test_field_names_must_be_symbols() {
        let result = prim_record(&[sym("point"), Value::Integer(1), Value::Integer(2)]);
        assert!(matches!(
            result,
            Err(LispError::RecordFieldNameMustBeSymbol(_))
        ));
    }

    #[test]
    fn test_record_get() {
        let r = prim_record(&[sym("point"), sym("x"), Value::Integer(1)]).unwrap();
        assert_eq!(
            prim_record_get(&[r.clone(), sym("x")]).unwrap(),
            Value::Integer(1)
        );
        assert!(matches!(
            prim_record_get(&[r, sym("z")]),
            Err(LispError::NotFound(_))
        ));
    }
}
