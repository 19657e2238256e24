//! The in-flight compilation chain, for cycle detection.

use std::collections::HashMap;

use crate::error::{DiError, DiResult};
use crate::lookup::ServiceIdentifier;
use crate::typed_type::TypedType;

// Order and implementation type are kept for diagnostics parity with the
// resolution chain; only membership is consulted today.
#[allow(dead_code)]
struct ChainItemInfo {
    order: usize,
    implementation_type: Option<TypedType>,
}

/// Identifiers currently being compiled on this logical call path.
pub(crate) struct CallSiteChain {
    chain: HashMap<ServiceIdentifier, ChainItemInfo>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self {
            chain: HashMap::new(),
        }
    }

    pub(crate) fn check_circular_dependency(
        &self,
        identifier: &ServiceIdentifier,
    ) -> DiResult<()> {
        if self.chain.contains_key(identifier) {
            return Err(DiError::CircularDependency(identifier.service_type().clone()));
        }
        Ok(())
    }

    pub(crate) fn add(
        &mut self,
        identifier: ServiceIdentifier,
        implementation_type: Option<TypedType>,
    ) {
        let order = self.chain.len();
        self.chain.entry(identifier).or_insert(ChainItemInfo {
            order,
            implementation_type,
        });
    }

    pub(crate) fn remove(&mut self, identifier: &ServiceIdentifier) {
        self.chain.remove(identifier);
    }
}
