//! Dynamic-code vetoing: `eval` and `Function`

use super::classifier::{excerpt, has_debugger_directive, is_trap};
use crate::error::Result;
use crate::host::{native, Realm, Value};
use crate::intercept::{CallHook, HookContext, Interceptor, Registry, Target};

/// Wrap `eval`: trap source evaluates to nothing
pub fn install_eval_guard(realm: &Realm, registry: &Registry) -> bool {
    let hook = CallHook(|cx: &HookContext<'_>, this: &Value, args: &[Value]| {
        if let Some(source) = args.first().and_then(Value::as_str) {
            if is_trap(source) {
                tracing::debug!("vetoed eval: {}", excerpt(source));
                return Ok(Value::Undefined);
            }
        }
        cx.call_original(this, args)
    });
    registry.install(realm, Target::global(realm, "eval"), hook, Some("eval"))
}

/// Rejects constructed functions whose source contains `debugger`
struct FunctionGuard;

impl FunctionGuard {
    fn vetoes(args: &[Value]) -> bool {
        let source = args
            .iter()
            .map(Value::to_display)
            .collect::<Vec<_>>()
            .join(",");
        if has_debugger_directive(&source) {
            tracing::debug!("vetoed Function: {}", excerpt(&source));
            return true;
        }
        false
    }

    fn inert(realm: &Realm) -> Value {
        Value::Object(realm.new_function(
            "function anonymous(\n) {\n\n}",
            native(|_, _, _| Ok(Value::Undefined)),
        ))
    }
}

impl Interceptor for FunctionGuard {
    fn call(&self, cx: &HookContext<'_>, this: &Value, args: &[Value]) -> Result<Value> {
        if Self::vetoes(args) {
            return Ok(Self::inert(cx.realm));
        }
        cx.call_original(this, args)
    }

    fn construct(&self, cx: &HookContext<'_>, args: &[Value]) -> Result<Value> {
        if Self::vetoes(args) {
            return Ok(Self::inert(cx.realm));
        }
        cx.construct_original(args)
    }
}

/// Wrap `Function` and rebind `Function.prototype.constructor` to the wrapper
pub fn install_function_guard(realm: &Realm, registry: &Registry) -> bool {
    let target = Target::global(realm, "Function");
    if !registry.install(realm, target.clone(), FunctionGuard, Some("Function")) {
        return false;
    }
    let Some(wrapper) = registry.wrapper(&target) else {
        return false;
    };
    let constructor = Target::new(realm.function_prototype().clone(), "constructor");
    registry.define(realm, constructor, Value::Object(wrapper))
}
