// CreateUser job: one user with random placeholder fields

use crate::domain::{JobKind, JobPayload};
use crate::port::{JobContext, JobError, JobHandler, NewUser, UserStore};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

const PLACEHOLDER_LEN: usize = 12;

pub struct CreateUserJob {
    store: Arc<dyn UserStore>,
}

impl CreateUserJob {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    fn placeholder() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PLACEHOLDER_LEN)
            .map(char::from)
            .collect()
    }

    fn random_user() -> NewUser {
        NewUser {
            name: Self::placeholder(),
            email: Self::placeholder(),
            password: Self::placeholder(),
        }
    }
}

#[async_trait]
impl JobHandler for CreateUserJob {
    fn kind(&self) -> JobKind {
        JobKind::CreateUser
    }

    async fn handle(&self, ctx: &JobContext, _payload: &JobPayload) -> Result<(), JobError> {
        let user_id = self.store.create_user(&ctx.tenant, Self::random_user()).await?;
        info!(job_id = %ctx.job_id, tenant = %ctx.tenant, user_id = %user_id, "User created");
        Ok(())
    }
}
