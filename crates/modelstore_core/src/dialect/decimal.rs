//! Fixed-point decimal column type.
//!
//! # Invariants
//! - `precision <= MAX_PRECISION` and `scale <= MAX_SCALE`.
//! - When both are declared, `precision >= scale`.
//! - Omitted values render as the maxima but stay distinguishable through
//!   `declared_precision` / `declared_scale`.
//! - An omitted scale never exceeds the declared precision.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest precision accepted by any supported backend.
pub const MAX_PRECISION: u32 = 60;
/// Largest scale accepted by any supported backend.
pub const MAX_SCALE: u32 = 30;

/// Invalid `(precision, scale)` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalTypeError {
    PrecisionTooLarge(u32),
    ScaleTooLarge(u32),
    ScaleExceedsPrecision { precision: u32, scale: u32 },
}

impl Display for DecimalTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrecisionTooLarge(value) => write!(
                f,
                "invalid argument: decimal precision {value} exceeds maximum {MAX_PRECISION}"
            ),
            Self::ScaleTooLarge(value) => write!(
                f,
                "invalid argument: decimal scale {value} exceeds maximum {MAX_SCALE}"
            ),
            Self::ScaleExceedsPrecision { precision, scale } => write!(
                f,
                "invalid argument: decimal precision {precision} is smaller than scale {scale}"
            ),
        }
    }
}

impl Error for DecimalTypeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecimalType {
    precision: Option<u32>,
    scale: Option<u32>,
}

impl DecimalType {
    /// Builds a decimal type from optional precision and scale.
    ///
    /// # Errors
    /// - `PrecisionTooLarge` when `precision > 60`.
    /// - `ScaleTooLarge` when `scale > 30`, or when precision is omitted and
    ///   `scale > 60`.
    /// - `ScaleExceedsPrecision` when both are given and `precision < scale`.
    pub fn new(precision: Option<u32>, scale: Option<u32>) -> Result<Self, DecimalTypeError> {
        if let Some(precision) = precision {
            if precision > MAX_PRECISION {
                return Err(DecimalTypeError::PrecisionTooLarge(precision));
            }
        }
        if let Some(scale) = scale {
            if precision.is_none() && scale > MAX_PRECISION {
                return Err(DecimalTypeError::ScaleTooLarge(scale));
            }
            if scale > MAX_SCALE {
                return Err(DecimalTypeError::ScaleTooLarge(scale));
            }
        }
        if let (Some(precision), Some(scale)) = (precision, scale) {
            if precision < scale {
                return Err(DecimalTypeError::ScaleExceedsPrecision { precision, scale });
            }
        }
        Ok(Self { precision, scale })
    }

    /// Decimal with neither precision nor scale declared.
    pub fn unbounded() -> Self {
        Self {
            precision: None,
            scale: None,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision.unwrap_or(MAX_PRECISION)
    }

    pub fn scale(&self) -> u32 {
        self.scale.unwrap_or_else(|| MAX_SCALE.min(self.precision()))
    }

    pub fn declared_precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn declared_scale(&self) -> Option<u32> {
        self.scale
    }

    pub fn to_sql(&self) -> String {
        format!("DECIMAL({},{})", self.precision(), self.scale())
    }
}

impl Default for DecimalType {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Renders `DECIMAL(precision,scale)` after validating the declaration.
pub fn render_decimal(
    precision: Option<u32>,
    scale: Option<u32>,
) -> Result<String, DecimalTypeError> {
    DecimalType::new(precision, scale).map(|decimal| decimal.to_sql())
}
