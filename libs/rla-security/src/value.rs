use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// A scalar value a restricted column is compared against.
///
/// Produced from [`UserValue`]s when a rule generates its filter, and
/// converted to `sea_orm::Value`s by the criteria layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// UUID value (tenant IDs, subject IDs, etc.)
    Uuid(Uuid),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uuid(_) => "uuid",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<Uuid> for ScalarValue {
    #[inline]
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<String> for ScalarValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ScalarValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for ScalarValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for ScalarValue {
    #[inline]
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for ScalarValue {
    #[inline]
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for ScalarValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Result of invoking a user method.
///
/// `Null` means "no restriction". `Object` wraps any value with a string
/// form; it is coerced to [`ScalarValue::String`] before filtering. `Map`
/// is a structured record and cannot be used as a filter value.
#[derive(Clone)]
pub enum UserValue {
    Null,
    Scalar(ScalarValue),
    Object(Arc<dyn fmt::Display + Send + Sync>),
    List(Vec<UserValue>),
    Map(BTreeMap<String, UserValue>),
}

impl UserValue {
    /// Wrap a value that is only usable through its `Display` form.
    pub fn object(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self::Object(Arc::new(value))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar(s) => s.kind(),
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Coerce to a scalar: scalars pass through, objects use their string
    /// form, everything else yields `None`.
    #[must_use]
    pub fn to_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::Scalar(s) => Some(s.clone()),
            Self::Object(o) => Some(ScalarValue::String(o.to_string())),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl fmt::Debug for UserValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(&o.to_string()).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
        }
    }
}

impl From<ScalarValue> for UserValue {
    fn from(value: ScalarValue) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! user_value_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for UserValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(ScalarValue::from(value))
                }
            }
        )*
    };
}

user_value_from_scalar!(Uuid, String, &str, i64, i32, f64, bool);

impl<T: Into<UserValue>> From<Option<T>> for UserValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<UserValue>> From<Vec<T>> for UserValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// JSON attributes map onto user values one to one. Numbers that fit in an
/// `i64` become integers, larger unsigned integers their decimal string, the
/// rest floats.
impl From<&serde_json::Value> for UserValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Scalar(ScalarValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Scalar(ScalarValue::Int(i))
                } else if n.is_u64() {
                    // Beyond i64: keep the exact digits rather than round
                    Self::Scalar(ScalarValue::String(n.to_string()))
                } else {
                    Self::Scalar(ScalarValue::Float(n.as_f64().unwrap_or_default()))
                }
            }
            serde_json::Value::String(s) => Self::Scalar(ScalarValue::String(s.clone())),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}
