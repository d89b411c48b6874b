// Restart Signal Port
//
// Central (tenant-independent) store for the "restart workers" timestamp.
// Workers remember the value seen at start and exit once it changes.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RestartSignal: Send + Sync {
    /// Last broadcast restart time in epoch ms, if any
    async fn last_restart(&self) -> Result<Option<i64>>;

    /// Ask every worker sharing this store to exit after its current job
    async fn broadcast(&self, at_millis: i64) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryRestartSignal {
        last: Mutex<Option<i64>>,
    }

    #[async_trait]
    impl RestartSignal for InMemoryRestartSignal {
        async fn last_restart(&self) -> Result<Option<i64>> {
            Ok(*self.last.lock().unwrap())
        }

        async fn broadcast(&self, at_millis: i64) -> Result<()> {
            *self.last.lock().unwrap() = Some(at_millis);
            Ok(())
        }
    }
}
