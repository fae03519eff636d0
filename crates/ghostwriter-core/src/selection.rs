//! Provider identity selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::provider::ProviderIdentity;

/// How an identity is picked from the pool for each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionStrategy {
    /// Always the first identity.
    Fixed,
    /// Independent uniform choice per call.
    #[default]
    UniformRandom,
    /// Cycle through the pool in order.
    StrictRoundRobin,
}

/// A non-empty set of identities plus the strategy to choose among them.
#[derive(Debug)]
pub struct ProviderPool {
    identities: Vec<ProviderIdentity>,
    strategy: SelectionStrategy,
    cursor: AtomicUsize,
}

impl ProviderPool {
    /// Create a pool.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if `identities` is empty.
    pub fn new(
        identities: Vec<ProviderIdentity>,
        strategy: SelectionStrategy,
    ) -> Result<Self, CoreError> {
        if identities.is_empty() {
            return Err(CoreError::Config(
                "no generation credentials configured. Set GOOGLE_API_KEY or add \
                 generation.pool to .ghostwriter/config.yaml"
                    .to_owned(),
            ));
        }
        Ok(Self {
            identities,
            strategy,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Create a pool with a single identity.
    pub fn single(identity: ProviderIdentity) -> Self {
        Self {
            identities: vec![identity],
            strategy: SelectionStrategy::Fixed,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the identity for the next call.
    pub fn select(&self) -> &ProviderIdentity {
        let index = match self.strategy {
            SelectionStrategy::Fixed => 0,
            SelectionStrategy::UniformRandom => rand::rng().random_range(0..self.identities.len()),
            SelectionStrategy::StrictRoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.identities.len()
            }
        };
        &self.identities[index]
    }

    /// Returns the configured strategy.
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Returns all identities in configuration order.
    pub fn identities(&self) -> &[ProviderIdentity] {
        &self.identities
    }
}
