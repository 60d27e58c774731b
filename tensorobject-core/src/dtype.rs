use std::fmt::{self, Debug, Display};

#[cfg(feature = "bfloat")]
use half::bf16;
#[cfg(feature = "half")]
use half::f16;
use rayon::prelude::*;

use crate::{Error, Result};

/// Runtime descriptor of a tensor element type.
///
/// Two tensors are type-compatible iff their descriptors compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    #[cfg(feature = "half")]
    F16,
    #[cfg(feature = "bfloat")]
    BF16,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn item_size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            #[cfg(feature = "half")]
            Self::F16 => 2,
            #[cfg(feature = "bfloat")]
            Self::BF16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            #[cfg(feature = "half")]
            Self::F16 => "float16",
            #[cfg(feature = "bfloat")]
            Self::BF16 => "bfloat16",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    /// Kind character, numpy style: `u`, `i` or `f`.
    pub const fn type_code(&self) -> char {
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => 'u',
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 'i',
            _ => 'f',
        }
    }

    /// Numpy array-interface typestr, e.g. `<f4` or `|u1`.
    ///
    /// `bfloat16` has no numpy equivalent and is reported as `<bf2`.
    pub fn type_str(&self) -> String {
        let order = if self.item_size() == 1 {
            '|'
        } else if cfg!(target_endian = "little") {
            '<'
        } else {
            '>'
        };
        let code = match self {
            #[cfg(feature = "bfloat")]
            Self::BF16 => "bf",
            _ => match self.type_code() {
                'u' => "u",
                'i' => "i",
                _ => "f",
            },
        };
        format!("{order}{code}{}", self.item_size())
    }

    pub const fn is_integral(&self) -> bool {
        matches!(self.type_code(), 'u' | 'i')
    }

    pub const fn is_float(&self) -> bool {
        !self.is_integral()
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Marker trait for element types that can be read out of a tensor.
pub trait Element: Debug + Copy + bytemuck::Pod + Send + Sync + 'static {
    const DTYPE: DType;
    const ZERO: Self;
    const ONE: Self;

    fn to_f64(&self) -> f64;
    fn from_f64(x: f64) -> Self;
}

macro_rules! element {
    ($rt:ident, $variant:ident, $zero:expr, $one:expr) => {
        impl Element for $rt {
            const DTYPE: DType = DType::$variant;
            const ZERO: $rt = $zero;
            const ONE: $rt = $one;

            fn to_f64(&self) -> f64 {
                *self as f64
            }
            fn from_f64(x: f64) -> Self {
                x as $rt
            }
        }
    };
}

element!(u8, U8, 0u8, 1u8);
element!(u16, U16, 0u16, 1u16);
element!(u32, U32, 0u32, 1u32);
element!(u64, U64, 0u64, 1u64);
element!(i8, I8, 0i8, 1i8);
element!(i16, I16, 0i16, 1i16);
element!(i32, I32, 0i32, 1i32);
element!(i64, I64, 0i64, 1i64);
element!(f32, F32, 0f32, 1f32);
element!(f64, F64, 0f64, 1f64);

#[cfg(feature = "half")]
impl Element for f16 {
    const DTYPE: DType = DType::F16;
    const ZERO: f16 = f16::from_f64_const(0.0);
    const ONE: f16 = f16::from_f64_const(1.0);

    fn to_f64(&self) -> f64 {
        self.to_f64_const()
    }
    fn from_f64(x: f64) -> Self {
        Self::from_f64_const(x)
    }
}

#[cfg(feature = "bfloat")]
impl Element for bf16 {
    const DTYPE: DType = DType::BF16;
    const ZERO: bf16 = bf16::from_f64_const(0.0);
    const ONE: bf16 = bf16::from_f64_const(1.0);

    fn to_f64(&self) -> f64 {
        self.to_f64_const()
    }
    fn from_f64(x: f64) -> Self {
        Self::from_f64_const(x)
    }
}

/// Run `$body` with `$T` bound to the Rust type behind a runtime [`DType`].
macro_rules! with_element {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            DType::U8 => {
                type $T = u8;
                $body
            }
            DType::U16 => {
                type $T = u16;
                $body
            }
            DType::U32 => {
                type $T = u32;
                $body
            }
            DType::U64 => {
                type $T = u64;
                $body
            }
            DType::I8 => {
                type $T = i8;
                $body
            }
            DType::I16 => {
                type $T = i16;
                $body
            }
            DType::I32 => {
                type $T = i32;
                $body
            }
            DType::I64 => {
                type $T = i64;
                $body
            }
            #[cfg(feature = "half")]
            DType::F16 => {
                type $T = f16;
                $body
            }
            #[cfg(feature = "bfloat")]
            DType::BF16 => {
                type $T = bf16;
                $body
            }
            DType::F32 => {
                type $T = f32;
                $body
            }
            DType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

fn decode<T: Element>(bytes: &[u8]) -> Vec<f64> {
    bytes
        .par_chunks_exact(std::mem::size_of::<T>())
        .map(|chunk| bytemuck::pod_read_unaligned::<T>(chunk).to_f64())
        .collect()
}

fn encode<T: Element>(values: &[f64]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * std::mem::size_of::<T>()];
    out.par_chunks_exact_mut(std::mem::size_of::<T>())
        .zip(values.par_iter())
        .for_each(|(chunk, x)| chunk.copy_from_slice(bytemuck::bytes_of(&T::from_f64(*x))));
    out
}

/// Convert a compact host buffer of `from` elements into `to` elements.
///
/// Values go through `f64` with `as` cast semantics, so integers beyond 2^53
/// are rounded. Non-finite floats cannot become integers and are rejected
/// before any output is produced.
pub(crate) fn convert_bytes(src: &[u8], from: DType, to: DType) -> Result<Vec<u8>> {
    if src.len() % from.item_size() != 0 {
        return Err(Error::Conversion {
            from,
            to,
            msg: format!(
                "{} bytes is not a whole number of {from} elements",
                src.len()
            ),
        }
        .bt());
    }
    let values = with_element!(from, T => decode::<T>(src));
    if from.is_float() && to.is_integral() {
        if let Some(pos) = values.par_iter().position_first(|x| !x.is_finite()) {
            return Err(Error::Conversion {
                from,
                to,
                msg: format!("element {pos} is {}", values[pos]),
            }
            .bt());
        }
    }
    Ok(with_element!(to, T => encode::<T>(&values)))
}

/// Element values in a compact host buffer, reinterpreted as `T`.
pub(crate) fn cast_host_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}
