//! Link-time handler discovery.
//!
//! Handler crates submit a [`HandlerRegistration`] per handler under a group name;
//! a service definition collects its group with [`handlers`].

use std::sync::Arc;

use crate::contracts::Handler;

/// One discoverable handler, submitted via `inventory::submit!`.
pub struct HandlerRegistration {
    pub group: &'static str,
    pub name: &'static str,
    pub factory: fn() -> Arc<dyn Handler>,
}

impl HandlerRegistration {
    pub const fn new(
        group: &'static str,
        name: &'static str,
        factory: fn() -> Arc<dyn Handler>,
    ) -> Self {
        Self {
            group,
            name,
            factory,
        }
    }
}

impl std::fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("group", &self.group)
            .field("name", &self.name)
            .finish()
    }
}

inventory::collect!(HandlerRegistration);

/// Instantiate every handler registered under `group`, ordered by name.
///
/// Link order is not stable, so results are sorted. A name registered twice
/// keeps its first instance.
pub fn handlers(group: &str) -> Vec<Arc<dyn Handler>> {
    let mut regs: Vec<&HandlerRegistration> = ::inventory::iter::<HandlerRegistration>
        .into_iter()
        .filter(|r| r.group == group)
        .collect();
    regs.sort_by_key(|r| r.name);

    let mut out: Vec<Arc<dyn Handler>> = Vec::with_capacity(regs.len());
    let mut last: Option<&'static str> = None;
    for reg in regs {
        if last == Some(reg.name) {
            tracing::warn!(group, handler = reg.name, "Duplicate handler registration ignored");
            continue;
        }
        last = Some(reg.name);
        out.push((reg.factory)());
    }
    out
}
