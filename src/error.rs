use thiserror::Error;

/// Errors that can occur when coercing a node into a host value
#[derive(Debug, Error)]
pub enum CoerceError {
    /// No mapper exists for the source value / target type pair, even after
    /// hierarchy search and structural synthesis
    #[error("cannot map {value} to {target}")]
    Unmappable { value: String, target: String },
    /// A text value named no constant of the target enum
    #[error("unknown enum value {value} for enum {enum_type}")]
    UnknownEnumValue { value: String, enum_type: String },
    /// A value was accessed with a type that doesn't match what was produced
    #[error("type mismatch for the requested target")]
    TypeMismatch,
}
