use std::sync::Arc;

use crate::application::{
    invalidation::InvalidationService, lookup::LookupService, precompute::PrecomputeQuota,
    repos::SwitchesRepo, status::StatusService,
};

#[derive(Clone)]
pub struct ApiState {
    pub status: Arc<StatusService>,
    pub lookup: Arc<LookupService>,
    pub invalidation: Arc<InvalidationService>,
    pub switches: Arc<dyn SwitchesRepo>,
    pub quota: PrecomputeQuota,
}
