use crate::{Result, StridedError};

/// Largest register tile the micro-kernels accept in either direction.
pub const MAX_REGISTER_BLOCK: usize = 16;

/// Cache and register tile sizes of the blocked multiply.
///
/// - `mc`, `kc`: rows and depth of the packed `A` slab (sized for L2).
/// - `nc`: columns of the packed `B` slab (sized for L3).
/// - `mr`, `nr`: register tile computed by one micro-kernel call.
/// - `prefer_column_major`: the output orientation the kernels write fastest.
///   A `C` whose layout disagrees is handled by transposing the whole product.
///
/// Results do not depend on `mc`, `nc`, `mr`, `nr` or the orientation. `kc`
/// only changes how partial sums are grouped, so results agree bit for bit
/// whenever the products are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingFactors {
    pub mc: usize,
    pub nc: usize,
    pub kc: usize,
    pub mr: usize,
    pub nr: usize,
    pub prefer_column_major: bool,
}

impl BlockingFactors {
    /// Defaults used by [`crate::level3::gemm`].
    pub const DEFAULT: Self = Self {
        mc: 128,
        nc: 2048,
        kc: 256,
        mr: 8,
        nr: 4,
        prefer_column_major: true,
    };

    /// Build a validated record preferring column-major output.
    pub fn new(mc: usize, nc: usize, kc: usize, mr: usize, nr: usize) -> Result<Self> {
        let bf = Self {
            mc,
            nc,
            kc,
            mr,
            nr,
            prefer_column_major: true,
        };
        bf.validate()?;
        Ok(bf)
    }

    /// Same factors with the given preferred output orientation.
    pub fn with_column_major(self, prefer_column_major: bool) -> Self {
        Self {
            prefer_column_major,
            ..self
        }
    }

    /// Check the constraints the packing routines rely on.
    pub fn validate(&self) -> Result<()> {
        let Self { mc, nc, kc, mr, nr, .. } = *self;
        if mc == 0 || nc == 0 || kc == 0 || mr == 0 || nr == 0 {
            return Err(StridedError::InvalidBlocking(format!(
                "all factors must be positive (mc={mc}, nc={nc}, kc={kc}, mr={mr}, nr={nr})"
            )));
        }
        if mr > MAX_REGISTER_BLOCK || nr > MAX_REGISTER_BLOCK {
            return Err(StridedError::InvalidBlocking(format!(
                "register tile {mr}x{nr} exceeds {MAX_REGISTER_BLOCK}x{MAX_REGISTER_BLOCK}"
            )));
        }
        if mc % mr != 0 {
            return Err(StridedError::InvalidBlocking(format!(
                "mc={mc} is not a multiple of mr={mr}"
            )));
        }
        if nc % nr != 0 {
            return Err(StridedError::InvalidBlocking(format!(
                "nc={nc} is not a multiple of nr={nr}"
            )));
        }
        Ok(())
    }
}

impl Default for BlockingFactors {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BlockingFactors::DEFAULT.validate().is_ok());
        assert_eq!(BlockingFactors::default(), BlockingFactors::DEFAULT);
    }

    #[test]
    fn test_rejects_bad_factors() {
        assert!(matches!(
            BlockingFactors::new(0, 8, 8, 4, 4),
            Err(StridedError::InvalidBlocking(_))
        ));
        assert!(matches!(
            BlockingFactors::new(12, 8, 8, 8, 4),
            Err(StridedError::InvalidBlocking(_))
        ));
        assert!(matches!(
            BlockingFactors::new(32, 32, 8, 32, 4),
            Err(StridedError::InvalidBlocking(_))
        ));
        let bf = BlockingFactors::new(6, 10, 3, 3, 5).unwrap();
        assert!(bf.prefer_column_major);
        assert!(!bf.with_column_major(false).prefer_column_major);
    }
}
