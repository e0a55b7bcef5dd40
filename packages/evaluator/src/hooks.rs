//! Component state.
//!
//! Hook slots are keyed by the component instance's position in the rendered
//! tree and by call order inside the component, the same contract React
//! enforces. Instances not rendered during a pass are dropped at its end.

use crate::evaluator::{EvalError, EvalResult, Evaluator};
use crate::value::{Value, ContextId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Clone)]
pub enum HookSlot {
    State { value: Value, setter: Value },
    Memo { deps: Option<Vec<Value>>, value: Value },
    Ref(Value),
    Effect { deps: Option<Vec<Value>> },
    Id(String),
}

#[derive(Default)]
pub struct HookStore {
    instances: HashMap<String, Vec<HookSlot>>,
    /// `(instance, next slot index)` for components currently rendering
    cursors: Vec<(String, usize)>,
    rendered: HashSet<String>,
    pending_effects: Vec<Value>,
    next_id: usize,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&mut self) {
        self.rendered.clear();
    }

    /// Forget instances that were not rendered this pass
    pub fn end_pass(&mut self) {
        let rendered = &self.rendered;
        let before = self.instances.len();
        self.instances.retain(|instance, _| rendered.contains(instance));
        let dropped = before - self.instances.len();
        if dropped > 0 {
            debug!(dropped, "unmounted component instances");
        }
    }

    pub fn enter(&mut self, instance: &str) {
        self.rendered.insert(instance.to_string());
        self.cursors.push((instance.to_string(), 0));
    }

    pub fn exit(&mut self) {
        self.cursors.pop();
    }

    /// Claim the next slot of the rendering component
    pub fn next_slot(&mut self) -> Option<(String, usize)> {
        let (instance, index) = self.cursors.last_mut()?;
        let claimed = (instance.clone(), *index);
        *index += 1;
        Some(claimed)
    }

    pub fn get(&self, instance: &str, index: usize) -> Option<&HookSlot> {
        self.instances.get(instance)?.get(index)
    }

    pub fn set(&mut self, instance: &str, index: usize, slot: HookSlot) {
        let slots = self.instances.entry(instance.to_string()).or_default();
        if index < slots.len() {
            slots[index] = slot;
        } else {
            slots.push(slot);
        }
    }

    pub fn is_mounted(&self, instance: &str) -> bool {
        self.instances.contains_key(instance)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn queue_effect(&mut self, effect: Value) {
        self.pending_effects.push(effect);
    }

    pub fn take_effects(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.pending_effects)
    }

    pub fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!(":r{}:", self.next_id)
    }
}

fn claim(ev: &Evaluator, hook: &str) -> EvalResult<(String, usize)> {
    ev.ctx().hooks.borrow_mut().next_slot().ok_or_else(|| {
        EvalError::type_error(format!(
            "Invalid hook call: {} can only be called inside the body of a function component",
            hook
        ))
    })
}

fn current_slot(ev: &Evaluator, instance: &str, index: usize) -> Option<HookSlot> {
    ev.ctx().hooks.borrow().get(instance, index).cloned()
}

fn deps_of(value: Option<&Value>) -> Option<Vec<Value>> {
    match value {
        Some(Value::Array(items)) => Some(items.borrow().clone()),
        _ => None,
    }
}

fn deps_changed(previous: &Option<Vec<Value>>, next: &Option<Vec<Value>>) -> bool {
    match (previous, next) {
        (Some(previous), Some(next)) => {
            previous.len() != next.len()
                || previous.iter().zip(next).any(|(a, b)| !a.same_value_zero(b))
        }
        _ => true,
    }
}

/// Store `next` in a state slot; marks the tree dirty on change
fn update_state(ev: &mut Evaluator, instance: &str, index: usize, next: Value) {
    let ctx = ev.ctx().clone();
    let mut hooks = ctx.hooks.borrow_mut();
    if let Some(HookSlot::State { value, setter }) = hooks.get(instance, index).cloned() {
        if !value.strict_equals(&next) {
            hooks.set(instance, index, HookSlot::State { value: next, setter });
            ctx.dirty.set(true);
        }
    }
}

fn read_state(ev: &Evaluator, instance: &str, index: usize) -> Value {
    match current_slot(ev, instance, index) {
        Some(HookSlot::State { value, .. }) => value,
        _ => Value::Undefined,
    }
}

pub fn use_state(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useState")?;
    if let Some(HookSlot::State { value, setter }) = current_slot(ev, &instance, index) {
        return Ok(Value::array(vec![value, setter]));
    }

    let initial = args.first().cloned().unwrap_or(Value::Undefined);
    let initial = if initial.is_callable() {
        ev.call_function(&initial, Value::Undefined, &[])?
    } else {
        initial
    };

    let key = instance.clone();
    let setter = Value::native("setState", move |ev, _this, args| {
        let next = args.first().cloned().unwrap_or(Value::Undefined);
        let next = if next.is_callable() {
            let current = read_state(ev, &key, index);
            ev.call_function(&next, Value::Undefined, &[current])?
        } else {
            next
        };
        update_state(ev, &key, index, next);
        Ok(Value::Undefined)
    });
    ev.ctx().hooks.borrow_mut().set(
        &instance,
        index,
        HookSlot::State {
            value: initial.clone(),
            setter: setter.clone(),
        },
    );
    Ok(Value::array(vec![initial, setter]))
}

pub fn use_reducer(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useReducer")?;
    if let Some(HookSlot::State { value, setter }) = current_slot(ev, &instance, index) {
        return Ok(Value::array(vec![value, setter]));
    }

    let reducer = args.first().cloned().unwrap_or(Value::Undefined);
    let mut initial = args.get(1).cloned().unwrap_or(Value::Undefined);
    if let Some(init) = args.get(2).filter(|init| init.is_callable()) {
        initial = ev.call_function(init, Value::Undefined, &[initial])?;
    }

    let key = instance.clone();
    let dispatch = Value::native("dispatch", move |ev, _this, args| {
        let action = args.first().cloned().unwrap_or(Value::Undefined);
        let current = read_state(ev, &key, index);
        let next = ev.call_function(&reducer, Value::Undefined, &[current, action])?;
        update_state(ev, &key, index, next);
        Ok(Value::Undefined)
    });
    ev.ctx().hooks.borrow_mut().set(
        &instance,
        index,
        HookSlot::State {
            value: initial.clone(),
            setter: dispatch.clone(),
        },
    );
    Ok(Value::array(vec![initial, dispatch]))
}

/// Effects run after the render pass whenever their dependencies change
pub fn use_effect(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useEffect")?;
    let deps = deps_of(args.get(1));
    let changed = match current_slot(ev, &instance, index) {
        Some(HookSlot::Effect { deps: previous }) => deps_changed(&previous, &deps),
        _ => true,
    };
    if changed {
        let ctx = ev.ctx().clone();
        let mut hooks = ctx.hooks.borrow_mut();
        hooks.set(&instance, index, HookSlot::Effect { deps });
        if let Some(effect) = args.first().filter(|effect| effect.is_callable()) {
            hooks.queue_effect(effect.clone());
        }
    }
    Ok(Value::Undefined)
}

pub fn use_memo(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useMemo")?;
    let deps = deps_of(args.get(1));
    if let Some(HookSlot::Memo { deps: previous, value }) = current_slot(ev, &instance, index) {
        if !deps_changed(&previous, &deps) {
            return Ok(value);
        }
    }
    let factory = args.first().cloned().unwrap_or(Value::Undefined);
    let value = ev.call_function(&factory, Value::Undefined, &[])?;
    ev.ctx()
        .hooks
        .borrow_mut()
        .set(&instance, index, HookSlot::Memo { deps, value: value.clone() });
    Ok(value)
}

pub fn use_callback(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useCallback")?;
    let deps = deps_of(args.get(1));
    if let Some(HookSlot::Memo { deps: previous, value }) = current_slot(ev, &instance, index) {
        if !deps_changed(&previous, &deps) {
            return Ok(value);
        }
    }
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    ev.ctx()
        .hooks
        .borrow_mut()
        .set(&instance, index, HookSlot::Memo { deps, value: value.clone() });
    Ok(value)
}

pub fn use_ref(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useRef")?;
    if let Some(HookSlot::Ref(value)) = current_slot(ev, &instance, index) {
        return Ok(value);
    }
    let initial = args.first().cloned().unwrap_or(Value::Undefined);
    let object = Value::object(vec![("current", initial)]);
    ev.ctx()
        .hooks
        .borrow_mut()
        .set(&instance, index, HookSlot::Ref(object.clone()));
    Ok(object)
}

pub fn use_id(ev: &mut Evaluator, _args: &[Value]) -> EvalResult<Value> {
    let (instance, index) = claim(ev, "useId")?;
    if let Some(HookSlot::Id(id)) = current_slot(ev, &instance, index) {
        return Ok(Value::string(id));
    }
    let ctx = ev.ctx().clone();
    let mut hooks = ctx.hooks.borrow_mut();
    let id = hooks.next_id();
    hooks.set(&instance, index, HookSlot::Id(id.clone()));
    Ok(Value::string(id))
}

/// Nearest provided value, else the context's default
pub fn read_context(ev: &Evaluator, id: ContextId) -> Value {
    let ctx = ev.ctx();
    let provided = ctx
        .render
        .borrow()
        .contexts
        .iter()
        .rev()
        .find(|(provided, _)| *provided == id)
        .map(|(_, value)| value.clone());
    provided.unwrap_or_else(|| {
        ctx.contexts
            .borrow()
            .get(id)
            .cloned()
            .unwrap_or(Value::Undefined)
    })
}

/// Context id carried by a context object or its provider
pub fn context_id(value: &Value) -> Option<ContextId> {
    use crate::value::FunctionKind;
    match value {
        Value::Object(object) => object
            .borrow()
            .get_own("Provider")
            .and_then(|provider| context_id(provider)),
        Value::Function(function) => match &function.kind {
            FunctionKind::Provider(id) | FunctionKind::Consumer(id) => Some(*id),
            _ => None,
        },
        _ => None,
    }
}

pub fn use_context(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    // useContext claims no slot, matching React
    let context = args.first().cloned().unwrap_or(Value::Undefined);
    match context_id(&context) {
        Some(id) => Ok(read_context(ev, id)),
        None => Ok(Value::Undefined),
    }
}

/// Run effects queued by the last render pass
pub fn flush_effects(ev: &mut Evaluator) -> EvalResult<usize> {
    let effects = ev.ctx().hooks.borrow_mut().take_effects();
    let count = effects.len();
    for effect in effects {
        ev.call_function(&effect, Value::Undefined, &[])?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_call_order() {
        let mut store = HookStore::new();
        store.begin_pass();
        store.enter("root:App");
        assert_eq!(store.next_slot(), Some(("root:App".to_string(), 0)));
        assert_eq!(store.next_slot(), Some(("root:App".to_string(), 1)));
        store.enter("root:App>0:Child");
        assert_eq!(store.next_slot(), Some(("root:App>0:Child".to_string(), 0)));
        store.exit();
        assert_eq!(store.next_slot(), Some(("root:App".to_string(), 2)));
        store.exit();
        assert_eq!(store.next_slot(), None);
    }

    #[test]
    fn test_unrendered_instances_are_dropped() {
        let mut store = HookStore::new();
        store.begin_pass();
        store.enter("a");
        store.set("a", 0, HookSlot::Ref(Value::Null));
        store.exit();
        store.enter("b");
        store.set("b", 0, HookSlot::Ref(Value::Null));
        store.exit();
        store.end_pass();
        assert_eq!(store.instance_count(), 2);

        store.begin_pass();
        store.enter("a");
        store.exit();
        store.end_pass();
        assert!(store.is_mounted("a"));
        assert!(!store.is_mounted("b"));
    }

    #[test]
    fn test_dependency_comparison() {
        let a = Some(vec![Value::Number(1.0), Value::str("x")]);
        let same = Some(vec![Value::Number(1.0), Value::str("x")]);
        let different = Some(vec![Value::Number(2.0), Value::str("x")]);
        assert!(!deps_changed(&a, &same));
        assert!(deps_changed(&a, &different));
        assert!(deps_changed(&None, &None));
        assert!(!deps_changed(&Some(vec![]), &Some(vec![])));
    }
}
