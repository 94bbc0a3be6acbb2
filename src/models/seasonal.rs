//! Fourier basis for weekly and yearly seasonality.

use chrono::NaiveDate;

use crate::domain::{ModelConfig, SeasonalComponent, SeasonalPeriod};
use crate::math::{epoch_days, fill_fourier_terms};

/// Fixed-length periodic feature generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalBasis {
    components: Vec<(SeasonalPeriod, usize)>,
}

impl SeasonalBasis {
    /// Components with order 0 are left out.
    pub fn new(weekly_order: usize, yearly_order: usize) -> Self {
        let components = [(SeasonalPeriod::Weekly, weekly_order), (SeasonalPeriod::Yearly, yearly_order)]
            .into_iter()
            .filter(|(_, order)| *order > 0)
            .collect();
        Self { components }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.weekly_order, config.yearly_order)
    }

    pub fn components(&self) -> &[(SeasonalPeriod, usize)] {
        &self.components
    }

    /// Total number of sine/cosine pairs.
    pub fn harmonic_count(&self) -> usize {
        self.components.iter().map(|(_, order)| order).sum()
    }

    /// Length of the vector returned by [`SeasonalBasis::features`].
    pub fn feature_len(&self) -> usize {
        2 * self.harmonic_count()
    }

    pub fn features(&self, date: NaiveDate) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.feature_len());
        self.fill_features(date, &mut out);
        out
    }

    pub fn fill_features(&self, date: NaiveDate, out: &mut Vec<f64>) {
        let t = epoch_days(date);
        for &(period, order) in &self.components {
            fill_fourier_terms(t, period.days(), order, out);
        }
    }

    /// Split a coefficient vector laid out like [`SeasonalBasis::features`]
    /// into one component per period.
    ///
    /// # Panics
    /// Panics if `coefficients.len() != self.feature_len()`.
    pub fn split_coefficients(&self, coefficients: &[f64]) -> Vec<SeasonalComponent> {
        assert_eq!(coefficients.len(), self.feature_len(), "seasonal coefficient length mismatch");
        let mut offset = 0;
        self.components
            .iter()
            .map(|&(period, order)| {
                let width = 2 * order;
                let component = SeasonalComponent {
                    period,
                    order,
                    coefficients: coefficients[offset..offset + width].to_vec(),
                };
                offset += width;
                component
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orders_give_26_features() {
        let basis = SeasonalBasis::from_config(&ModelConfig::default());
        let d = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        assert_eq!(basis.harmonic_count(), 13);
        assert_eq!(basis.features(d).len(), 26);
    }

    #[test]
    fn zero_order_disables_component() {
        let basis = SeasonalBasis::new(3, 0);
        assert_eq!(basis.components(), &[(SeasonalPeriod::Weekly, 3)]);
        assert_eq!(basis.feature_len(), 6);
    }

    #[test]
    fn weekly_features_repeat_after_seven_days() {
        let basis = SeasonalBasis::new(3, 0);
        let a = NaiveDate::from_ymd_opt(2020, 4, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2020, 4, 9).unwrap();
        for (x, y) in basis.features(a).iter().zip(basis.features(b).iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn split_round_trips_component_values() {
        let basis = SeasonalBasis::new(2, 1);
        let coefs = vec![1.0, 0.5, -0.25, 0.0, 3.0, -1.0];
        let parts = basis.split_coefficients(&coefs);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].coefficients, vec![3.0, -1.0]);

        let d = NaiveDate::from_ymd_opt(2020, 8, 17).unwrap();
        let direct: f64 = basis.features(d).iter().zip(&coefs).map(|(x, b)| x * b).sum();
        let summed: f64 = parts.iter().map(|c| c.value_at(d)).sum();
        assert!((direct - summed).abs() < 1e-9);
    }
}
