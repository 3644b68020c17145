//! `window.opener` reads as null

use crate::host::{Realm, Value};
use crate::intercept::{Constant, Registry, Target};

pub fn install(realm: &Realm, registry: &Registry) -> bool {
    registry.install_accessor(
        realm,
        Target::global(realm, "opener"),
        Constant(Value::Null),
        Some("opener"),
    )
}
