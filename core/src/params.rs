use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Symbol(String),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Symbol(value.to_string())
    }
}

/// One candidate point: parameter name to value. Produced by the search
/// engine, read once by a representation's decode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, ParamValue>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    fn require(&self, name: &str) -> Result<&ParamValue, DecodeError> {
        self.0.get(name).ok_or_else(|| DecodeError::MissingParameter {
            name: name.to_string(),
        })
    }

    pub fn bool(&self, name: &str) -> Result<bool, DecodeError> {
        match self.require(name)? {
            ParamValue::Bool(value) => Ok(*value),
            _ => Err(DecodeError::WrongType {
                name: name.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Integer value. Integer-valued symbols (`"7"`) are accepted so enum
    /// alphabets of numbers decode the same whichever way they were stored.
    pub fn int(&self, name: &str) -> Result<i64, DecodeError> {
        let wrong_type = || DecodeError::WrongType {
            name: name.to_string(),
            expected: "integer",
        };
        match self.require(name)? {
            ParamValue::Int(value) => Ok(*value),
            ParamValue::Symbol(symbol) => symbol.trim().parse::<i64>().map_err(|_| wrong_type()),
            ParamValue::Bool(_) => Err(wrong_type()),
        }
    }

    pub fn symbol(&self, name: &str) -> Result<&str, DecodeError> {
        match self.require(name)? {
            ParamValue::Symbol(value) => Ok(value),
            _ => Err(DecodeError::WrongType {
                name: name.to_string(),
                expected: "symbol",
            }),
        }
    }
}

impl FromIterator<(String, ParamValue)> for Configuration {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDomain {
    Bool,
    Int { lo: i64, hi: i64 },
    Enum { symbols: Vec<String> },
}

impl ParamDomain {
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Bool, ParamValue::Bool(_)) => true,
            (Self::Int { lo, hi }, ParamValue::Int(v)) => lo <= v && v <= hi,
            (Self::Enum { symbols }, ParamValue::Symbol(s)) => symbols.iter().any(|x| x == s),
            (Self::Enum { symbols }, ParamValue::Int(v)) => {
                let rendered = v.to_string();
                symbols.iter().any(|x| *x == rendered)
            }
            _ => false,
        }
    }

    /// Number of distinct values.
    pub fn cardinality(&self) -> u64 {
        match self {
            Self::Bool => 2,
            Self::Int { lo, hi } => (hi - lo).max(0) as u64 + 1,
            Self::Enum { symbols } => symbols.len() as u64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub domain: ParamDomain,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCounts {
    pub bool_params: usize,
    pub int_params: usize,
    pub enum_params: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<Parameter>,
}

impl ParameterSpace {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parameters: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, domain: ParamDomain) {
        self.parameters.push(Parameter {
            name: name.into(),
            domain,
        });
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.name == name)
    }

    pub fn domain_counts(&self) -> DomainCounts {
        let mut counts = DomainCounts::default();
        for param in &self.parameters {
            match param.domain {
                ParamDomain::Bool => counts.bool_params += 1,
                ParamDomain::Int { .. } => counts.int_params += 1,
                ParamDomain::Enum { .. } => counts.enum_params += 1,
            }
        }
        counts
    }

    /// log10 of the number of distinct configurations.
    pub fn log10_size(&self) -> f64 {
        self.parameters
            .iter()
            .map(|param| (param.domain.cardinality().max(1) as f64).log10())
            .sum()
    }

    /// Checks every parameter is present and inside its domain. Decode never
    /// calls this; it exists for diagnostics on externally produced points.
    pub fn check(&self, configuration: &Configuration) -> Result<(), DecodeError> {
        for param in &self.parameters {
            let value = configuration
                .get(&param.name)
                .ok_or_else(|| DecodeError::MissingParameter {
                    name: param.name.clone(),
                })?;
            if !param.domain.contains(value) {
                return Err(DecodeError::OutOfDomain {
                    name: param.name.clone(),
                });
            }
        }
        Ok(())
    }
}
