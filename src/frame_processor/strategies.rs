// SPDX-License-Identifier: GPL-3.0-only

//! Decode strategies
//!
//! Each strategy is one decode attempt on a sampled frame. A
//! [`StrategyChain`] runs them in a fixed order and stops at the first
//! success:
//!
//! 1. normal polarity
//! 2. inverted polarity
//! 3. both polarities
//! 4. normal polarity, contrast enhanced
//! 5. inverted polarity, contrast enhanced

use super::qr_detector::SymbolDecoder;
use super::sampling::{SampledFrame, inverted};
use super::types::DecodeResult;
use crate::constants::CONTRAST_GAIN;
use crate::errors::DecodeFault;
use std::sync::Arc;
use tracing::{debug, trace};

/// Which luma polarity a pass hands to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Dark modules on a light background
    Normal,
    /// Light modules on a dark background
    Inverted,
    /// Normal first, then inverted
    Both,
}

/// One decode attempt on a sampled frame
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt a decode; corners in the result are in sampled coordinates
    fn attempt(
        &self,
        frame: &SampledFrame,
        decoder: &dyn SymbolDecoder,
    ) -> Result<Option<DecodeResult>, DecodeFault>;
}

/// A polarity pass, optionally on a contrast-enhanced copy
#[derive(Debug, Clone, Copy)]
pub struct PolarityPass {
    name: &'static str,
    polarity: Polarity,
    /// Contrast gain, or `None` for the plain frame
    enhance: Option<f32>,
}

impl PolarityPass {
    pub fn new(name: &'static str, polarity: Polarity, enhance: Option<f32>) -> Self {
        Self {
            name,
            polarity,
            enhance,
        }
    }
}

impl DecodeStrategy for PolarityPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(
        &self,
        frame: &SampledFrame,
        decoder: &dyn SymbolDecoder,
    ) -> Result<Option<DecodeResult>, DecodeFault> {
        let luma = match self.enhance {
            Some(gain) => frame.enhanced_luma(gain),
            None => frame.luma(),
        };

        match self.polarity {
            Polarity::Normal => decoder.decode(&luma),
            Polarity::Inverted => decoder.decode(&inverted(&luma)),
            Polarity::Both => match decoder.decode(&luma)? {
                Some(result) => Ok(Some(result)),
                None => decoder.decode(&inverted(&luma)),
            },
        }
    }
}

/// The standard pass order with the given contrast gain
pub fn standard_strategies(gain: f32) -> Vec<Box<dyn DecodeStrategy>> {
    vec![
        Box::new(PolarityPass::new("normal", Polarity::Normal, None)),
        Box::new(PolarityPass::new("inverted", Polarity::Inverted, None)),
        Box::new(PolarityPass::new("both", Polarity::Both, None)),
        Box::new(PolarityPass::new("enhanced-normal", Polarity::Normal, Some(gain))),
        Box::new(PolarityPass::new("enhanced-inverted", Polarity::Inverted, Some(gain))),
    ]
}

/// Ordered, short-circuiting list of strategies over one decoder
pub struct StrategyChain {
    decoder: Arc<dyn SymbolDecoder>,
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl StrategyChain {
    pub fn new(decoder: Arc<dyn SymbolDecoder>, strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self {
            decoder,
            strategies,
        }
    }

    /// Standard five passes with the given gain
    pub fn standard(decoder: Arc<dyn SymbolDecoder>, gain: f32) -> Self {
        Self::new(decoder, standard_strategies(gain))
    }

    /// Strategy names, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategies in order, stopping at the first success
    ///
    /// A fault in one strategy is logged and the next one is tried. The
    /// returned corners are in native frame coordinates.
    pub fn run(&self, frame: &SampledFrame) -> Option<DecodeResult> {
        for strategy in &self.strategies {
            match strategy.attempt(frame, self.decoder.as_ref()) {
                Ok(Some(mut result)) => {
                    result.geometry = result.geometry.scaled(frame.scale);
                    debug!(
                        strategy = strategy.name(),
                        sequence = frame.sequence,
                        "Strategy decoded a symbol"
                    );
                    return Some(result);
                }
                Ok(None) => {
                    trace!(strategy = strategy.name(), sequence = frame.sequence, "No symbol");
                }
                Err(fault) => {
                    debug!(strategy = strategy.name(), error = %fault, "Decode attempt failed");
                }
            }
        }
        None
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::standard(Arc::new(super::qr_detector::RqrrDecoder), CONTRAST_GAIN)
    }
}
