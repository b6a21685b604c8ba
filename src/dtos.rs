pub mod userdtos;
pub mod providerdtos;
pub mod requestdtos;
pub mod emergencydtos;

pub use userdtos::*;
pub use providerdtos::*;
pub use requestdtos::*;
pub use emergencydtos::*;

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrText::Number(value) => Ok(value),
            NumberOrText::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("`{}` is not a number", text))),
        }
    }
}

/// Coordinates are accepted as JSON numbers or numeric strings (`"77.59"`).
pub fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrText::deserialize(deserializer)?.into_f64()
}

pub fn optional_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(NumberOrText::into_f64)
        .transpose()
}
