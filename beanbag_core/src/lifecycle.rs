use std::collections::HashMap;

use log::{debug, info};

use crate::{bean::TeardownHook, BeanId, IocError, Result};

/// Lifecycle of a singleton. Transitions only move forward, one step at a time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LifecycleState {
    Constructed,
    Wired,
    PostConstructed,
    PreDestroyed,
}

impl LifecycleState {
    fn previous(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Constructed => None,
            LifecycleState::Wired => Some(LifecycleState::Constructed),
            LifecycleState::PostConstructed => Some(LifecycleState::Wired),
            LifecycleState::PreDestroyed => Some(LifecycleState::PostConstructed),
        }
    }
}

struct Teardown {
    id: BeanId,
    name: String,
    hook: Option<TeardownHook>,
}

#[derive(Default)]
pub(crate) struct LifecycleManager {
    states: HashMap<BeanId, LifecycleState>,
    teardowns: Vec<Teardown>,
    torn_down: bool,
}

impl LifecycleManager {
    pub(crate) fn advance(&mut self, id: BeanId, name: &str, to: LifecycleState) -> Result<()> {
        let from = self.states.get(&id).copied();
        if from != to.previous() {
            return Err(IocError::IllegalState {
                name: name.to_string(),
                from,
                to,
            });
        }
        self.states.insert(id, to);
        Ok(())
    }

    pub(crate) fn state(&self, id: BeanId) -> Option<LifecycleState> {
        self.states.get(&id).copied()
    }

    /// Drops the tracked state of a bean whose construction failed.
    pub(crate) fn forget(&mut self, id: BeanId) {
        self.states.remove(&id);
    }

    /// Records a published singleton. Registration order is construction order.
    pub(crate) fn register_for_teardown(
        &mut self,
        id: BeanId,
        name: &str,
        hook: Option<TeardownHook>,
    ) {
        self.teardowns.push(Teardown {
            id,
            name: name.to_string(),
            hook,
        });
    }

    /// Runs pre-destroy hooks in reverse construction order. Only the first call does anything.
    pub(crate) fn teardown_all(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        self.torn_down = true;

        let mut count = 0;
        while let Some(mut teardown) = self.teardowns.pop() {
            if self.state(teardown.id) != Some(LifecycleState::PostConstructed) {
                continue;
            }
            if let Some(hook) = teardown.hook.take() {
                debug!("pre destroy bean {}", teardown.name);
                hook();
                count += 1;
            }
            self.states.insert(teardown.id, LifecycleState::PreDestroyed);
        }
        info!("teardown complete, {count} pre destroy hooks run");
        count
    }
}
