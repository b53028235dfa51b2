use derive_more::{Display, From};

/// A value destined for a display field. Numeric fields on the panel are
/// signed 32 bit integers, so every scaled quantity ends up as a `Number`.
#[derive(Debug, Display, From, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    #[display(fmt = "{}", _0)]
    Number(i32),
    #[display(fmt = "{:?}", _0)]
    Text(String),
}

impl From<&str> for DisplayValue {
    fn from(value: &str) -> Self {
        DisplayValue::Text(value.to_string())
    }
}
