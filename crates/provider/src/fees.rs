// This file is part of Opflow.
//
// Opflow is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opflow is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opflow.
// If not, see https://www.gnu.org/licenses/.

use anyhow::Context;
#[cfg(feature = "test-utils")]
use mockall::automock;
use opflow_utils::math;
use tokio::try_join;
use tracing::instrument;

/// Network fee estimates for a user operation.
///
/// Either field may be absent; the controller only consults the estimator
/// for fields the caller did not supply, and caller-supplied values always
/// win.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasFeeEstimates {
    /// Suggested max fee per gas
    pub max_fee_per_gas: Option<u128>,
    /// Suggested max priority fee per gas
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Source of current network fee estimates.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait GasFeeEstimator: Send + Sync + 'static {
    /// Return current fee estimates.
    async fn estimate(&self) -> anyhow::Result<GasFeeEstimates>;
}

/// Minimal EVM node surface needed to derive fee estimates.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait EvmProvider: Send + Sync + 'static {
    /// Base fee of the pending block.
    async fn get_pending_base_fee(&self) -> anyhow::Result<u128>;

    /// Current suggested max priority fee.
    async fn get_max_priority_fee(&self) -> anyhow::Result<u128>;
}

/// Fee estimator backed by an EVM provider.
///
/// Applies configurable overhead percentages on top of the network values so
/// that an operation is not underpriced by the time it is bundled.
#[derive(Debug)]
pub struct ProviderFeeEstimator<P> {
    provider: P,
    base_fee_overhead_percent: u32,
    priority_fee_overhead_percent: u32,
}

impl<P: EvmProvider> ProviderFeeEstimator<P> {
    /// Create a new estimator over the given provider.
    pub fn new(
        provider: P,
        base_fee_overhead_percent: u32,
        priority_fee_overhead_percent: u32,
    ) -> Self {
        Self {
            provider,
            base_fee_overhead_percent,
            priority_fee_overhead_percent,
        }
    }
}

#[async_trait::async_trait]
impl<P: EvmProvider> GasFeeEstimator for ProviderFeeEstimator<P> {
    #[instrument(skip_all)]
    async fn estimate(&self) -> anyhow::Result<GasFeeEstimates> {
        let (base_fee, priority_fee) = try_join!(
            self.provider.get_pending_base_fee(),
            self.provider.get_max_priority_fee()
        )
        .context("should fetch network fees")?;

        let base_fee = math::increase_by_percent(base_fee, self.base_fee_overhead_percent);
        let priority_fee =
            math::increase_by_percent(priority_fee, self.priority_fee_overhead_percent);

        Ok(GasFeeEstimates {
            max_fee_per_gas: Some(base_fee + priority_fee),
            max_priority_fee_per_gas: Some(priority_fee),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_estimate_applies_overheads() {
        let mut provider = MockEvmProvider::new();
        provider
            .expect_get_pending_base_fee()
            .returning(|| Ok(100));
        provider.expect_get_max_priority_fee().returning(|| Ok(10));

        let estimator = ProviderFeeEstimator::new(provider, 50, 100);
        let estimates = estimator.estimate().await.unwrap();

        assert_eq!(estimates.max_priority_fee_per_gas, Some(20));
        assert_eq!(estimates.max_fee_per_gas, Some(170));
    }

    #[tokio::test]
    async fn test_estimate_propagates_provider_error() {
        let mut provider = MockEvmProvider::new();
        provider
            .expect_get_pending_base_fee()
            .returning(|| anyhow::bail!("node down"));
        provider.expect_get_max_priority_fee().returning(|| Ok(10));

        let estimator = ProviderFeeEstimator::new(provider, 0, 0);
        assert!(estimator.estimate().await.is_err());
    }
}
