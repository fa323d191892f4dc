//! Saved trip plans.
//!
//! [`PlanRepository`] is the document store seam; [`TripPlanService`] adds
//! ownership checks on top of it. Plans are stored as opaque JSON, usually a
//! [`TripPlanResponse`](crate::planner::TripPlanResponse) the user chose to keep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{ItineraError, Result};

/// A plan saved by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlan {
    pub id: Uuid,
    /// Owning user id.
    pub owner: Uuid,
    pub plan: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan storage.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn insert(&self, plan: StoredPlan) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<StoredPlan>>;

    /// Every plan of `owner`, in no particular order.
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<StoredPlan>>;

    /// Returns `true` if a plan was removed.
    async fn remove(&self, id: Uuid) -> Result<bool>;
}

/// [`PlanRepository`] in a map keyed by plan id.
#[derive(Debug, Default)]
pub struct MemoryPlanRepository {
    plans: RwLock<HashMap<Uuid, StoredPlan>>,
}

impl MemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ItineraError {
    ItineraError::Store(format!("plan repository lock poisoned: {e}"))
}

#[async_trait]
impl PlanRepository for MemoryPlanRepository {
    async fn insert(&self, plan: StoredPlan) -> Result<()> {
        self.plans.write().map_err(poisoned)?.insert(plan.id, plan);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<StoredPlan>> {
        Ok(self.plans.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<StoredPlan>> {
        let plans = self.plans.read().map_err(poisoned)?;
        Ok(plans.values().filter(|p| p.owner == owner).cloned().collect())
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.plans.write().map_err(poisoned)?.remove(&id).is_some())
    }
}

/// Owner-checked access to saved plans.
pub struct TripPlanService {
    repository: Arc<dyn PlanRepository>,
}

impl TripPlanService {
    pub fn new(repository: Arc<dyn PlanRepository>) -> Self {
        Self { repository }
    }

    /// Save a plan for `owner`.
    pub async fn save(&self, owner: Uuid, plan: serde_json::Value) -> Result<StoredPlan> {
        if plan.is_null() {
            return Err(ItineraError::Validation("plan is required".to_string()));
        }
        let now = Utc::now();
        let stored = StoredPlan {
            id: Uuid::new_v4(),
            owner,
            plan,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert(stored.clone()).await?;
        info!(plan_id = %stored.id, owner = %owner, "trip plan saved");
        Ok(stored)
    }

    /// Fetch a plan `owner` may read.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<StoredPlan> {
        let plan = self
            .repository
            .find(id)
            .await?
            .ok_or_else(|| ItineraError::NotFound(format!("trip plan {id}")))?;
        if plan.owner != owner {
            return Err(ItineraError::Unauthorized(
                "trip plan belongs to another user".to_string(),
            ));
        }
        Ok(plan)
    }

    /// Plans of `owner`, newest first.
    pub async fn list(&self, owner: Uuid) -> Result<Vec<StoredPlan>> {
        let mut plans = self.repository.list_by_owner(owner).await?;
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }

    /// Delete a plan `owner` may read; returns its id.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Uuid> {
        self.get(owner, id).await?;
        if !self.repository.remove(id).await? {
            return Err(ItineraError::NotFound(format!("trip plan {id}")));
        }
        info!(plan_id = %id, owner = %owner, "trip plan deleted");
        Ok(id)
    }
}
