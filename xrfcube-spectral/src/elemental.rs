//! Element averages over normalised elemental layers.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::Result;
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;
use serde::Serialize;
use xrfcube_core::{short_element_name, ElementalCube, SelectionMask};

/// Average abundance of one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementAverage {
    pub name: String,
    pub average: f64,
}

/// Rescales `layer` to 8-bit grey levels, `round((v - min) / (max - min) * 255)`.
///
/// A constant layer maps to 0 everywhere.
#[must_use]
pub fn normalize_layer(layer: ArrayView2<'_, f32>) -> Array2<u8> {
    let (min, max) = layer
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = f64::from(max) - f64::from(min);
    if !(range.is_finite() && range > 0.0) {
        return Array2::zeros(layer.raw_dim());
    }
    layer.mapv(|v| ((f64::from(v) - f64::from(min)) / range * 255.0).round() as u8)
}

fn layer_mean(layer: &Array2<u8>) -> f64 {
    if layer.is_empty() {
        return 0.0;
    }
    layer.iter().map(|&v| f64::from(v)).sum::<f64>() / layer.len() as f64
}

/// Mean of every normalised layer, reported under short element names.
#[must_use]
pub fn element_averages(cube: &ElementalCube) -> Vec<ElementAverage> {
    (0..cube.channels())
        .into_par_iter()
        .map(|channel| ElementAverage {
            name: short_element_name(&cube.names()[channel]),
            average: layer_mean(&normalize_layer(cube.layer(channel))),
        })
        .collect()
}

/// Mean of every normalised layer over the pixels selected in `mask`.
///
/// Every average is 0 when nothing is selected.
///
/// # Errors
/// Returns an invalid-parameter error if `mask` does not match the cube grid.
pub fn element_averages_for_selection(
    cube: &ElementalCube,
    mask: &SelectionMask,
) -> Result<Vec<ElementAverage>> {
    if mask.width() as usize != cube.width() || mask.height() as usize != cube.height() {
        return Err(xrfcube_core::Error::InvalidParameter(format!(
            "mask is {}x{} but the elemental cube is {}x{}",
            mask.width(),
            mask.height(),
            cube.width(),
            cube.height()
        ))
        .into());
    }
    let selected = mask.count_selected();
    let bits = Array2::from_shape_vec((cube.height(), cube.width()), mask.as_bits().to_vec())
        .map_err(|e| xrfcube_core::Error::DimensionMismatch(e.to_string()))?;

    Ok((0..cube.channels())
        .into_par_iter()
        .map(|channel| {
            let average = if selected == 0 {
                0.0
            } else {
                let layer = normalize_layer(cube.layer(channel));
                let mut sum = 0.0;
                Zip::from(&layer).and(&bits).for_each(|&v, &on| {
                    if on {
                        sum += f64::from(v);
                    }
                });
                sum / selected as f64
            };
            ElementAverage {
                name: short_element_name(&cube.names()[channel]),
                average,
            }
        })
        .collect())
}
