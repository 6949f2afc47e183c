//! Field arithmetic and the structure of the AES-192 round function and key schedule.

pub mod aes192;

use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// The AES MixColumns matrix.
pub static MIX_COLUMNS: [[u8; 4]; 4] = [
    [2, 3, 1, 1],
    [1, 2, 3, 1],
    [1, 1, 2, 3],
    [3, 1, 1, 2],
];

/// Differential branch number of MixColumns.
pub const BRANCH_NUMBER: u8 = 5;

/**
Performs multiplication by two in the AES field.
*/
fn aes_times2(x: u8) -> u8 {
    (x << 1) ^ (((x >> 7) & 0x1) * 0x1b)
}

/// An element of GF(2^8) reduced by the AES polynomial x^8 + x^4 + x^3 + x + 1.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Gf256(pub u8);

impl Gf256 {
    pub const ZERO: Gf256 = Gf256(0);
    pub const ONE: Gf256 = Gf256(1);

    #[inline(always)]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /**
    Returns the multiplicative inverse, computed as x^254. Zero is mapped to zero.
    */
    pub fn inverse(self) -> Gf256 {
        let mut result = Gf256::ONE;
        let mut base = self;
        let mut exponent = 254u8;

        while exponent != 0 {
            if exponent & 1 == 1 {
                result = result * base;
            }

            base = base * base;
            exponent >>= 1;
        }

        result
    }
}

impl Add for Gf256 {
    type Output = Gf256;

    #[inline(always)]
    fn add(self, other: Gf256) -> Gf256 {
        Gf256(self.0 ^ other.0)
    }
}

impl AddAssign for Gf256 {
    #[inline(always)]
    fn add_assign(&mut self, other: Gf256) {
        self.0 ^= other.0;
    }
}

impl Mul for Gf256 {
    type Output = Gf256;

    fn mul(self, other: Gf256) -> Gf256 {
        let mut a = self.0;
        let mut b = other.0;
        let mut product = 0;

        while b != 0 {
            if b & 1 == 1 {
                product ^= a;
            }

            a = aes_times2(a);
            b >>= 1;
        }

        Gf256(product)
    }
}

impl fmt::Debug for Gf256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn multiplication_matches_fips_example() {
        // FIPS-197 section 4.2
        assert_eq!(Gf256(0x57) * Gf256(0x83), Gf256(0xc1));
        assert_eq!(Gf256(0x57) * Gf256(0x13), Gf256(0xfe));
    }

    #[test]
    fn mix_columns_matches_known_column() {
        let input = [0xdbu8, 0x13, 0x53, 0x45];
        let expected = [0x8eu8, 0x4d, 0xa1, 0xbc];

        for (row, coefs) in MIX_COLUMNS.iter().enumerate() {
            let value = coefs.iter()
                             .zip(input.iter())
                             .fold(Gf256::ZERO, |acc, (&c, &x)| acc + Gf256(c) * Gf256(x));
            assert_eq!(value, Gf256(expected[row]));
        }
    }

    proptest! {
        #[test]
        fn inverse_is_multiplicative_inverse(x in 1u8..) {
            prop_assert_eq!(Gf256(x) * Gf256(x).inverse(), Gf256::ONE);
        }

        #[test]
        fn multiplication_distributes(a: u8, b: u8, c: u8) {
            let (a, b, c) = (Gf256(a), Gf256(b), Gf256(c));
            prop_assert_eq!(a * (b + c), a * b + a * c);
        }
    }
}
