//! Display and Debug implementations for Value
//!
//! `Display` is the text a value interpolates as; `Debug` is for diagnostics.

use std::fmt;

use super::*;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),

            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }

            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }

            Value::Record(record) => {
                write!(f, "{}{{", record.type_name)?;
                for (i, (k, v)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }

            Value::Object(object) => write!(f, "<{}>", object.type_name()),
            Value::Optional(inner) => match inner.as_ref() {
                Some(value) => write!(f, "{}", value),
                None => Ok(()),
            },
            Value::Lambda(_) => write!(f, "<lambda>"),
            Value::Deferred(_) => write!(f, "<deferred>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Record(record) => {
                let mut s = f.debug_struct(&record.type_name);
                for (k, v) in &record.fields {
                    s.field(k, v);
                }
                s.finish()
            }
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
            Value::Optional(inner) => match inner.as_ref() {
                Some(value) => write!(f, "Some({:?})", value),
                None => write!(f, "None"),
            },
            Value::Lambda(lambda) => write!(f, "{:?}", lambda),
            Value::Deferred(deferred) => write!(f, "{:?}", deferred),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_primitives() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(1.21).to_string(), "1.21");
        assert_eq!(Value::from("text").to_string(), "text");
    }

    #[test]
    fn test_display_compounds() {
        assert_eq!(Value::list([Value::Int(1), Value::Int(2)]).to_string(), "[1, 2]");
        assert_eq!(Value::map([("a", 1)]).to_string(), "{a=1}");
        assert_eq!(Value::some("x").to_string(), "x");
        assert_eq!(Value::none().to_string(), "");
    }

    #[test]
    fn test_debug_string_is_quoted() {
        assert_eq!(format!("{:?}", Value::from("a")), "\"a\"");
        assert_eq!(format!("{:?}", Value::Null), "null");
    }
}
