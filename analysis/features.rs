//! Derived columns shared by both partitions: the log-price target and the
//! composite bathroom count.

use crate::data::HousingData;
use ndarray::{Array1, Zip};
use thiserror::Error;

/// Weight applied to half bathrooms in the composite count.
pub const HALF_BATH_WEIGHT: f64 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("SalePrice must be positive to take its logarithm; row '{row_id}' has {value}.")]
    NonPositivePrice { row_id: String, value: f64 },
}

/// `FullBath + 0.5 * HalfBath`, elementwise.
pub fn bath_composite(full_bath: &Array1<f64>, half_bath: &Array1<f64>) -> Array1<f64> {
    Zip::from(full_bath)
        .and(half_bath)
        .map_collect(|&full, &half| full + HALF_BATH_WEIGHT * half)
}

/// `ln(price)`, rejecting non-positive prices.
pub fn log_price(prices: &Array1<f64>, ids: &[String]) -> Result<Array1<f64>, FeatureError> {
    if let Some((i, &value)) = prices.iter().enumerate().find(|(_, p)| **p <= 0.0) {
        return Err(FeatureError::NonPositivePrice {
            row_id: ids[i].clone(),
            value,
        });
    }
    Ok(prices.mapv(f64::ln))
}

/// Adds the derived columns in place. Tables without `SalePrice` only get the
/// bathroom composite.
pub fn engineer_features(data: &mut HousingData) -> Result<(), FeatureError> {
    data.bath_composite = Some(bath_composite(&data.full_bath, &data.half_bath));
    data.log_price = match &data.sale_price {
        Some(prices) => Some(log_price(prices, &data.ids)?),
        None => None,
    };
    log::debug!("Engineered features for {} rows.", data.n_rows());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn composite_weights_half_baths() {
        let composite = bath_composite(&array![1.0, 2.0, 3.0], &array![0.0, 1.0, 2.0]);
        assert_eq!(composite, array![1.0, 2.5, 4.0]);
    }

    #[test]
    fn log_price_inverts_to_price() {
        let prices = array![34_900.0, 163_000.0, 755_000.0, 1.0];
        let ids: Vec<String> = (1..=4).map(|i| i.to_string()).collect();
        let logs = log_price(&prices, &ids).unwrap();
        for (l, p) in logs.iter().zip(prices.iter()) {
            assert_relative_eq!(l.exp(), *p, max_relative = 1e-12);
        }
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let ids: Vec<String> = vec!["a".into(), "b".into()];
        let err = log_price(&array![100.0, 0.0], &ids).unwrap_err();
        assert_eq!(
            err,
            FeatureError::NonPositivePrice {
                row_id: "b".to_string(),
                value: 0.0
            }
        );
    }
}
