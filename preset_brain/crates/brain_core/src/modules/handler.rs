use crate::modules::adapter::PresetAdapter;
use crate::modules::catalog::DeviceCatalog;
use crate::modules::protocol::{ErrorEnvelope, Preset, PresetRequest};
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PresetOutcome {
    Generated(Preset),
    InvalidRequest,
    NotFound,
    Failed,
}

impl PresetOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            PresetOutcome::Generated(_) => StatusCode::OK,
            PresetOutcome::InvalidRequest => StatusCode::BAD_REQUEST,
            PresetOutcome::NotFound => StatusCode::NOT_FOUND,
            PresetOutcome::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-visible error body; `None` for a generated preset.
    pub fn error_envelope(&self) -> Option<ErrorEnvelope> {
        match self {
            PresetOutcome::Generated(_) => None,
            PresetOutcome::InvalidRequest => Some(ErrorEnvelope::invalid_request()),
            PresetOutcome::NotFound => Some(ErrorEnvelope::pedal_not_found()),
            PresetOutcome::Failed => Some(ErrorEnvelope::generation_failed()),
        }
    }
}

/// Resolves the device, runs the adapter and folds every failure into an outcome.
#[derive(Clone)]
pub struct PresetService {
    catalog: Arc<DeviceCatalog>,
    adapter: PresetAdapter,
}

impl PresetService {
    pub fn new(catalog: Arc<DeviceCatalog>, adapter: PresetAdapter) -> Self {
        Self { catalog, adapter }
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub async fn handle_body(&self, body: &[u8]) -> PresetOutcome {
        match serde_json::from_slice::<PresetRequest>(body) {
            Ok(req) => self.handle(&req).await,
            Err(e) => {
                log::warn!("rejecting preset request: {e}");
                PresetOutcome::InvalidRequest
            }
        }
    }

    pub async fn handle(&self, req: &PresetRequest) -> PresetOutcome {
        let descriptor = match self.catalog.find(&req.selected_device_id) {
            Ok(d) => d,
            Err(e) => {
                log::info!("{e}");
                return PresetOutcome::NotFound;
            }
        };

        log::info!(
            "generating preset for {:?} ({} chars of tone description)",
            descriptor.device_id,
            req.tone_description.chars().count()
        );

        match self.adapter.generate(descriptor, &req.tone_description).await {
            Ok(preset) => PresetOutcome::Generated(preset),
            Err(e) => {
                log::error!("preset generation failed for {:?}: {e}", descriptor.device_id);
                PresetOutcome::Failed
            }
        }
    }
}
