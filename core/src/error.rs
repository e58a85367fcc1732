use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    MissingParameter { name: String },
    WrongType { name: String, expected: &'static str },
    FrameOutOfRange { name: String, value: i64 },
    OutOfDomain { name: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { name } => write!(f, "configuration is missing parameter {name}"),
            Self::WrongType { name, expected } => {
                write!(f, "parameter {name} is not a {expected}")
            }
            Self::FrameOutOfRange { name, value } => {
                write!(f, "parameter {name}={value} is not a valid frame offset")
            }
            Self::OutOfDomain { name } => write!(f, "parameter {name} is outside its domain"),
        }
    }
}

impl std::error::Error for DecodeError {}
