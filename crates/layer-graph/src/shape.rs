// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape propagation between consecutive layers.
//!
//! [`next_shape`] is a pure function of the incoming [`MapShape`] and the
//! layer's static parameters. Windowed layers (convolution, pooling) use
//!
//! ```text
//! out = floor((in + 2*pad - window + 1 + stride - 1) / stride)
//! ```
//!
//! on each spatial axis. Inner product and softmax flatten their input.

use net_model::{InputDims, LayerParams};
use std::fmt;

/// Height, width and map count of the activations between two layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MapShape {
    pub height: usize,
    pub width: usize,
    pub maps: usize,
}

impl MapShape {
    pub fn new(height: usize, width: usize, maps: usize) -> Self {
        Self { height, width, maps }
    }

    /// A flattened feature vector of `features` values.
    pub fn flat(features: usize) -> Self {
        Self::new(1, features, 1)
    }

    /// Total number of values, `height * width * maps`.
    pub fn flattened(&self) -> Result<usize, ShapeError> {
        self.height
            .checked_mul(self.width)
            .and_then(|hw| hw.checked_mul(self.maps))
            .ok_or(ShapeError::Overflow)
    }

    /// Checks that every dimension is positive.
    pub fn validated(self) -> Result<Self, ShapeError> {
        for (axis, value) in [
            ("height", self.height),
            ("width", self.width),
            ("maps", self.maps),
        ] {
            if value == 0 {
                return Err(ShapeError::NonPositive { axis, value: 0 });
            }
        }
        Ok(self)
    }
}

impl From<InputDims> for MapShape {
    fn from(d: InputDims) -> Self {
        Self::new(d.height, d.width, d.maps)
    }
}

impl fmt::Display for MapShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.maps)
    }
}

/// Errors from shape propagation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// A windowed layer has a zero stride.
    #[error("stride must be positive")]
    ZeroStride,

    /// A windowed layer has a zero kernel or window.
    #[error("window size must be positive")]
    ZeroWindow,

    /// A derived dimension is zero or negative.
    #[error("derived {axis} is {value}, must be positive")]
    NonPositive { axis: &'static str, value: i64 },

    /// A dimension does not fit the arithmetic.
    #[error("dimension overflow")]
    Overflow,
}

/// Computes one spatial output dimension of a windowed layer.
pub fn window_output(
    axis: &'static str,
    input: usize,
    window: usize,
    stride: usize,
    pad: usize,
) -> Result<usize, ShapeError> {
    if stride == 0 {
        return Err(ShapeError::ZeroStride);
    }
    if window == 0 {
        return Err(ShapeError::ZeroWindow);
    }

    let to_i64 = |v: usize| i64::try_from(v).map_err(|_| ShapeError::Overflow);
    let (input, window, stride, pad) = (to_i64(input)?, to_i64(window)?, to_i64(stride)?, to_i64(pad)?);

    let numerator = pad
        .checked_mul(2)
        .and_then(|p2| input.checked_add(p2))
        .and_then(|n| n.checked_sub(window))
        .and_then(|n| n.checked_add(1))
        .and_then(|n| n.checked_add(stride - 1))
        .ok_or(ShapeError::Overflow)?;

    // div_euclid floors for negative numerators too.
    let out = numerator.div_euclid(stride);
    if out <= 0 {
        return Err(ShapeError::NonPositive { axis, value: out });
    }
    usize::try_from(out).map_err(|_| ShapeError::Overflow)
}

/// Derives a layer's output shape from its parameters and input shape.
pub fn next_shape(params: &LayerParams, input: MapShape) -> Result<MapShape, ShapeError> {
    let out = match params {
        LayerParams::Convolution(c) => MapShape::new(
            window_output("height", input.height, c.kernel, c.stride, c.pad)?,
            window_output("width", input.width, c.kernel, c.stride, c.pad)?,
            c.output_maps,
        ),
        LayerParams::Pooling(p) => MapShape::new(
            window_output("height", input.height, p.window, p.stride, p.pad)?,
            window_output("width", input.width, p.window, p.stride, p.pad)?,
            input.maps,
        ),
        LayerParams::Activation(_) => input,
        LayerParams::InnerProduct(ip) => MapShape::flat(ip.outputs),
        LayerParams::Softmax => MapShape::flat(input.flattened()?),
    };
    out.validated()
}
