// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! First-pass context allocation.
//!
//! One context block per layer, from the [`ContextArena`], populated with
//! every field derivable from the layer parameters and its input shape.
//! Fields owned by the quantization pass are left `None`.
//!
//! Weighted layers are also checked for representable weight and bias
//! lengths here, so every shaped graph can report its requirements.

use crate::context::{
    ActContext, ActInfo, ConvContext, ConvInfo, IpContext, IpInfo, LayerContext, PoolContext,
    PoolInfo, SoftmaxContext,
};
use crate::{GraphError, MapShape};
use context_arena::{ArenaError, ContextArena};
use net_model::LayerParams;

/// Allocates and populates layer contexts from a [`ContextArena`].
#[derive(Debug, Clone, Copy)]
pub struct LayerContextAllocator<'a> {
    arena: &'a ContextArena,
}

impl<'a> LayerContextAllocator<'a> {
    pub fn new(arena: &'a ContextArena) -> Self {
        Self { arena }
    }

    /// Allocates the context for layer `index`, whose input is `input`.
    ///
    /// An arena refusal is returned as [`GraphError::Allocation`]; the
    /// caller must abandon the whole construction.
    pub fn allocate<'w>(
        &self,
        index: usize,
        name: &str,
        params: &LayerParams,
        input: MapShape,
    ) -> Result<LayerContext<'w>, GraphError> {
        let alloc_err = |source: ArenaError| GraphError::Allocation {
            index,
            layer: name.to_string(),
            source,
        };
        let shape_err = |source| GraphError::Shape {
            index,
            layer: name.to_string(),
            source,
        };

        let context = match params {
            LayerParams::Convolution(c) => {
                let info = ConvInfo {
                    map_h: input.height,
                    map_w: input.width,
                    in_maps: input.maps,
                    out_maps: c.output_maps,
                    kernel: c.kernel,
                    stride: c.stride,
                    pad: c.pad,
                };
                info.tensor_lens().map_err(shape_err)?;
                LayerContext::Convolution(self.arena.alloc(ConvContext::new(info)).map_err(alloc_err)?)
            }
            LayerParams::Pooling(p) => {
                let info = PoolInfo {
                    map_h: input.height,
                    map_w: input.width,
                    maps: input.maps,
                    window: p.window,
                    stride: p.stride,
                    pad: p.pad,
                    operator: p.operator,
                };
                LayerContext::Pooling(
                    self.arena
                        .alloc(PoolContext {
                            info,
                            exec: None,
                            layout: None,
                        })
                        .map_err(alloc_err)?,
                )
            }
            LayerParams::Activation(a) => {
                let info = ActInfo {
                    maps: input.maps,
                    map_h: input.height,
                    map_w: input.width,
                    function: a.function,
                };
                LayerContext::Activation(
                    self.arena
                        .alloc(ActContext { info, exec: None })
                        .map_err(alloc_err)?,
                )
            }
            LayerParams::InnerProduct(ip) => {
                let info = IpInfo {
                    inputs: input.flattened().map_err(shape_err)?,
                    outputs: ip.outputs,
                };
                info.tensor_lens().map_err(shape_err)?;
                LayerContext::InnerProduct(self.arena.alloc(IpContext::new(info)).map_err(alloc_err)?)
            }
            LayerParams::Softmax => {
                let inputs = input.flattened().map_err(shape_err)?;
                LayerContext::Softmax(
                    self.arena
                        .alloc(SoftmaxContext { inputs, exec: None })
                        .map_err(alloc_err)?,
                )
            }
        };

        Ok(context)
    }
}
