// SPDX-License-Identifier: MPL-2.0

use crate::api::{Id, Job, NeworkClient, User};
use crate::cache::{CacheDb, CacheError, UserCache};
use crate::error::AppError;
use std::sync::Arc;
use tracing::debug;

/// Users and their job history
pub struct UserRepository {
    client: Arc<NeworkClient>,
    db: CacheDb,
}

impl UserRepository {
    pub fn new(client: Arc<NeworkClient>, db: CacheDb) -> Self {
        Self { client, db }
    }

    /// Replace the cached directory with the server's
    pub async fn refresh_all(&self) -> Result<Vec<User>, AppError> {
        let users = self.client.users().await?;
        let cache = UserCache::new(&self.db);
        cache.store_batch(&users)?;
        Ok(cache.all()?)
    }

    pub fn cached(&self) -> Result<Vec<User>, AppError> {
        Ok(UserCache::new(&self.db).all()?)
    }

    pub async fn user(&self, id: Id) -> Result<User, AppError> {
        let user = self.client.user(id).await?;
        UserCache::new(&self.db).store_batch(std::slice::from_ref(&user))?;
        Ok(user)
    }

    /// Resolve ids in order, from the cache where possible
    pub async fn users_by_ids(&self, ids: &[Id]) -> Result<Vec<User>, AppError> {
        let mut users = Vec::with_capacity(ids.len());
        for &id in ids {
            let cached = match UserCache::new(&self.db).get(id) {
                Ok(user) => Some(user),
                Err(CacheError::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            match cached {
                Some(user) => users.push(user),
                None => {
                    debug!(id, "user not cached, fetching");
                    users.push(self.user(id).await?);
                }
            }
        }
        Ok(users)
    }

    /// Jobs of a user, newest start first
    pub async fn jobs(&self, user_id: Id) -> Result<Vec<Job>, AppError> {
        let my_id = self.client.auth().my_id();
        let mut jobs = self.client.jobs(user_id).await?;
        for job in &mut jobs {
            job.owned_by_me = my_id != 0 && job.user_id == my_id;
        }
        jobs.sort_by(|a, b| b.start.cmp(&a.start));
        Ok(jobs)
    }

    /// The job without a finish date, if any
    pub async fn latest_job(&self, user_id: Id) -> Result<Option<Job>, AppError> {
        let jobs = self.jobs(user_id).await?;
        Ok(jobs.into_iter().find(Job::is_current))
    }

    pub async fn save_job(&self, job: &Job) -> Result<Job, AppError> {
        let mut saved = self.client.save_job(job).await?;
        saved.owned_by_me = true;
        Ok(saved)
    }

    pub async fn remove_job(&self, id: Id) -> Result<(), AppError> {
        Ok(self.client.remove_job(id).await?)
    }
}
