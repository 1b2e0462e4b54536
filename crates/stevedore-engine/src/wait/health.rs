//! Container healthcheck condition

use std::sync::Arc;

use stevedore_core::prelude::*;

use crate::client::EngineQuery;

/// Wait until the container's healthcheck reports "healthy".
///
/// The first successful inspect must show a healthcheck actually
/// configured; waiting for health on a container without one would never
/// finish, so that is a configuration error. Transient inspect failures
/// are "not yet".
pub struct HealthyCondition {
    engine: Arc<dyn EngineQuery>,
    container_id: String,
    first: bool,
    healthcheck: Option<String>,
}

impl HealthyCondition {
    pub fn new(engine: Arc<dyn EngineQuery>, container_id: &str) -> Self {
        Self {
            engine,
            container_id: container_id.to_string(),
            first: true,
            healthcheck: None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.healthcheck {
            Some(check) => format!("on healthcheck '{check}'"),
            None => "on healthcheck".to_string(),
        }
    }

    pub async fn check(&mut self) -> Result<bool> {
        let status = match self.engine.container_status(&self.container_id).await {
            Ok(status) => status,
            Err(e) => {
                debug!("cannot inspect {} for health: {e}", self.container_id);
                return Ok(false);
            }
        };

        if self.first {
            let Some(check) = status.healthcheck.clone() else {
                return Err(Error::config(format!(
                    "cannot wait for healthy state of {}: no HEALTHCHECK configured",
                    self.container_id
                )));
            };
            info!("{}: waiting to become healthy", self.container_id);
            debug!("waiting on healthcheck '{check}'");
            self.healthcheck = Some(check);
            self.first = false;
        }

        Ok(status.healthy == Some(true))
    }

    pub async fn cleanup(&mut self) {}
}
