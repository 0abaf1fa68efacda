//! Static table of the resources served by the read API.
//!
//! The table is fixed at compile time. [`api_router`] walks it once when the
//! router is built and refuses a table that names a resource twice.

use std::collections::BTreeSet;

use axum::routing::{get, MethodRouter};
use axum::Router;

use super::handlers;
use super::state::AppState;

/// One resource: a list route at `/{name}/` and a detail route at
/// `/{name}/{id}/`.
pub struct Resource {
    pub name: &'static str,
    pub mount: fn(Router<AppState>, &str) -> Router<AppState>,
}

pub static RESOURCES: &[Resource] = &[
    Resource {
        name: "target",
        mount: mount_targets,
    },
    Resource {
        name: "period",
        mount: mount_periods,
    },
    Resource {
        name: "daily_hours",
        mount: mount_daily_hours,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource '{0}' is registered more than once")]
pub struct DuplicateResource(pub &'static str);

fn mount(
    router: Router<AppState>,
    name: &str,
    list: MethodRouter<AppState>,
    detail: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(&list_path(name), list)
        .route(&format!("/{}/{{id}}/", name), detail)
}

fn mount_targets(router: Router<AppState>, name: &str) -> Router<AppState> {
    mount(
        router,
        name,
        get(handlers::list_targets),
        get(handlers::get_target),
    )
}

fn mount_periods(router: Router<AppState>, name: &str) -> Router<AppState> {
    mount(
        router,
        name,
        get(handlers::list_periods),
        get(handlers::get_period),
    )
}

fn mount_daily_hours(router: Router<AppState>, name: &str) -> Router<AppState> {
    mount(
        router,
        name,
        get(handlers::list_daily_hours),
        get(handlers::get_daily_hours),
    )
}

pub fn list_path(name: &str) -> String {
    format!("/{}/", name)
}

pub fn check_unique(resources: &[Resource]) -> Result<(), DuplicateResource> {
    let mut seen = BTreeSet::new();
    for resource in resources {
        if !seen.insert(resource.name) {
            return Err(DuplicateResource(resource.name));
        }
    }
    Ok(())
}

/// Router with every resource in `resources` mounted.
pub fn api_router(resources: &[Resource]) -> Result<Router<AppState>, DuplicateResource> {
    check_unique(resources)?;
    Ok(resources
        .iter()
        .fold(Router::new(), |router, resource| {
            (resource.mount)(router, resource.name)
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_table_is_unique() {
        assert!(check_unique(RESOURCES).is_ok());
        let names: Vec<_> = RESOURCES.iter().map(|r| r.name).collect();
        assert_eq!(names, ["target", "period", "daily_hours"]);
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let table = [
            Resource {
                name: "target",
                mount: mount_targets,
            },
            Resource {
                name: "target",
                mount: mount_periods,
            },
        ];
        assert_eq!(
            api_router(&table).err(),
            Some(DuplicateResource("target"))
        );
    }
}
