use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("palette must hold between 1 and 256 colors, got {len}")]
    InvalidPalette { len: usize },

    #[error("failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("no source images were supplied")]
    EmptySourceSet,

    #[error("index buffer is {buffer_width}x{buffer_height} but image is {width}x{height}")]
    DimensionMismatch {
        buffer_width: usize,
        buffer_height: usize,
        width: usize,
        height: usize,
    },
}

/// Reasons a [`QuantizeConfig`](crate::QuantizeConfig) or kernel is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_colors must be between 1 and 256, got {0}")]
    InvalidMaxColors(usize),

    #[error("{fixed} fixed colors do not fit in a palette of {max_colors}")]
    TooManyFixedColors { fixed: usize, max_colors: usize },

    #[error("palette mode needs {needed} free slots, only {available} available")]
    PaletteCapacity { needed: usize, available: usize },

    #[error("kernel is {width}x{height} but has {len} coefficients")]
    KernelShape {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("kernel origin column {origin} is outside width {width}")]
    KernelOrigin { origin: usize, width: usize },

    #[error("kernel coefficients must sum to a positive value, got {0}")]
    KernelSum(i64),

    #[error("kernel weights are too large to accumulate error")]
    KernelMagnitude,

    #[error("perturbation deviation must be finite")]
    NonFiniteDeviation,
}

/// Allocate a vector of `len` copies of `value`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, QuantizeError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| QuantizeError::OutOfMemory {
            bytes: len.saturating_mul(core::mem::size_of::<T>()),
        })?;
    v.resize(len, value);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err: QuantizeError = ConfigError::InvalidMaxColors(300).into();
        assert!(matches!(
            err,
            QuantizeError::InvalidConfig(ConfigError::InvalidMaxColors(300))
        ));
        assert_eq!(
            err.to_string(),
            "invalid configuration: max_colors must be between 1 and 256, got 300"
        );
    }

    #[test]
    fn try_filled_allocates() {
        let v = try_filled(16, 7u8).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&b| b == 7));
    }

    #[test]
    fn try_filled_reports_overflow() {
        assert!(matches!(
            try_filled(usize::MAX / 2, 0u64),
            Err(QuantizeError::OutOfMemory { .. })
        ));
    }
}
