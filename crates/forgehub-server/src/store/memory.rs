// SPDX-License-Identifier: Apache-2.0

use crate::store::{
    CheckinOutcome, CheckinUpdate, LeaseTransition, ProjectStore, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgehub_model::{Lease, Project, ProjectId, UserId};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Default document store. Holding the map lock across each transition is
/// what makes `try_acquire_lease` and `complete_checkin` atomic here; a
/// database-backed implementation must supply an equivalent conditional
/// write.
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn get(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.lock().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let map = self.projects.lock().await;
        let mut out: Vec<Project> = map.values().cloned().collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn insert(&self, project: Project) -> Result<(), StoreError> {
        let mut map = self.projects.lock().await;
        if map.contains_key(&project.id) {
            return Err(StoreError(format!(
                "project {} already exists",
                project.id
            )));
        }
        map.insert(project.id.clone(), project);
        Ok(())
    }

    async fn update(&self, project: Project) -> Result<(), StoreError> {
        let mut map = self.projects.lock().await;
        if !map.contains_key(&project.id) {
            return Err(StoreError(format!("project {} missing", project.id)));
        }
        map.insert(project.id.clone(), project);
        Ok(())
    }

    async fn remove(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.lock().await.remove(id))
    }

    async fn try_acquire_lease(
        &self,
        id: &ProjectId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LeaseTransition, StoreError> {
        let mut map = self.projects.lock().await;
        let Some(project) = map.get_mut(id) else {
            return Ok(LeaseTransition::Missing);
        };
        if let Some(lease) = &project.lease {
            return Ok(LeaseTransition::AlreadyHeld(lease.holder.clone()));
        }
        project.lease = Some(Lease {
            holder: user.clone(),
            acquired_at: now,
        });
        project.updated_at = now;
        Ok(LeaseTransition::Acquired(project.clone()))
    }

    async fn complete_checkin(
        &self,
        id: &ProjectId,
        user: &UserId,
        update: CheckinUpdate,
    ) -> Result<CheckinOutcome, StoreError> {
        let mut map = self.projects.lock().await;
        let Some(project) = map.get_mut(id) else {
            return Ok(CheckinOutcome::Missing);
        };
        match project.lease_holder() {
            Some(holder) if holder == user => {}
            holder => {
                return Ok(CheckinOutcome::NotHolder {
                    holder: holder.cloned(),
                });
            }
        }
        let replaced_files = match update.new_files {
            Some(files) => std::mem::replace(&mut project.files, files),
            None => Vec::new(),
        };
        if let Some(version) = update.new_version {
            project.version = version;
        }
        project.lease = None;
        project.updated_at = update.at;
        Ok(CheckinOutcome::Completed {
            project: project.clone(),
            replaced_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgehub_model::{ProjectMetadata, ValidationError};

    fn user(handle: &str) -> UserId {
        UserId::parse(handle).expect("handle")
    }

    fn sample_project() -> Result<Project, ValidationError> {
        Project::new(
            ProjectId::random(),
            ProjectMetadata {
                name: "demo".to_string(),
                description: String::new(),
                tags: vec![],
                is_public: true,
            },
            user("alice"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn acquire_is_first_wins() {
        let store = MemoryProjectStore::new();
        let p = sample_project().expect("project");
        let id = p.id.clone();
        store.insert(p).await.expect("insert");

        let first = store
            .try_acquire_lease(&id, &user("alice"), Utc::now())
            .await
            .expect("store ok");
        assert!(matches!(first, LeaseTransition::Acquired(_)));

        let second = store
            .try_acquire_lease(&id, &user("bob"), Utc::now())
            .await
            .expect("store ok");
        assert_eq!(second, LeaseTransition::AlreadyHeld(user("alice")));
    }

    #[tokio::test]
    async fn concurrent_acquires_grant_exactly_one() {
        let store = std::sync::Arc::new(MemoryProjectStore::new());
        let mut p = sample_project().expect("project");
        p.collaborators.push(user("bob"));
        let id = p.id.clone();
        store.insert(p).await.expect("insert");

        let mut tasks = Vec::new();
        for handle in ["alice", "bob"] {
            let store = std::sync::Arc::clone(&store);
            let id = id.clone();
            let u = user(handle);
            tasks.push(tokio::spawn(async move {
                store.try_acquire_lease(&id, &u, Utc::now()).await
            }));
        }
        let mut acquired = 0;
        for t in tasks {
            if let LeaseTransition::Acquired(_) = t.await.expect("join").expect("store ok") {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1, "exactly one concurrent acquire may win");
    }

    #[tokio::test]
    async fn checkin_requires_holder_and_is_single_shot() {
        let store = MemoryProjectStore::new();
        let p = sample_project().expect("project");
        let id = p.id.clone();
        store.insert(p).await.expect("insert");
        store
            .try_acquire_lease(&id, &user("alice"), Utc::now())
            .await
            .expect("acquire");

        let wrong = store
            .complete_checkin(
                &id,
                &user("bob"),
                CheckinUpdate {
                    new_files: None,
                    new_version: None,
                    at: Utc::now(),
                },
            )
            .await
            .expect("store ok");
        assert_eq!(
            wrong,
            CheckinOutcome::NotHolder {
                holder: Some(user("alice"))
            }
        );

        let done = store
            .complete_checkin(
                &id,
                &user("alice"),
                CheckinUpdate {
                    new_files: None,
                    new_version: Some("1.0.0".to_string()),
                    at: Utc::now(),
                },
            )
            .await
            .expect("store ok");
        let CheckinOutcome::Completed { project, .. } = done else {
            panic!("first check-in must complete");
        };
        assert!(project.lease.is_none());
        assert_eq!(project.version, "1.0.0");

        let again = store
            .complete_checkin(
                &id,
                &user("alice"),
                CheckinUpdate {
                    new_files: None,
                    new_version: None,
                    at: Utc::now(),
                },
            )
            .await
            .expect("store ok");
        assert_eq!(again, CheckinOutcome::NotHolder { holder: None });
    }
}
