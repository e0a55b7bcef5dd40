//! State shims: `zustand` stores and `@tanstack/react-query`.
//!
//! Store state and the query cache live in the session context; natives
//! capture only an index, so stores never form reference cycles with the
//! closures they hold. Every update marks the tree dirty and the session
//! re-renders.

use crate::builtins::globals::{from_json, to_json};
use crate::evaluator::{own_keys, EvalResult, Evaluator};
use crate::value::*;
use tracing::debug;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn prop(value: &Value, key: &str) -> Value {
    value
        .as_object()
        .and_then(|object| object.borrow().get(key))
        .unwrap_or(Value::Undefined)
}

/// One zustand store
pub struct Store {
    pub state: Value,
    pub listeners: Vec<Value>,
}

/// Cached result of one query key
pub struct QueryEntry {
    pub key: serde_json::Value,
    pub data: Value,
    pub error: Value,
}

// -------------------------------------------------------------------
// zustand
// -------------------------------------------------------------------

fn store_state(ev: &Evaluator, id: usize) -> Value {
    ev.ctx()
        .stores
        .borrow()
        .get(id)
        .map_or(Value::Undefined, |store| store.state.clone())
}

/// `set(partial | updater, replace)`
fn store_set(ev: &mut Evaluator, id: usize, args: &[Value]) -> EvalResult<Value> {
    let previous = store_state(ev, id);
    let partial = match arg(args, 0) {
        updater if updater.is_callable() => ev.call_function(&updater, Value::Undefined, &[previous.clone()])?,
        partial => partial,
    };
    let next = if arg(args, 1).is_truthy() || !matches!(partial, Value::Object(_)) {
        partial
    } else {
        let mut merged = match &previous {
            Value::Object(object) => object.borrow().clone(),
            _ => JsObject::new(),
        };
        if let Value::Object(partial) = &partial {
            for (key, value) in partial.borrow().entries() {
                merged.set(key, value.clone());
            }
        }
        Value::from_object(merged)
    };

    let listeners = {
        let mut stores = ev.ctx().stores.borrow_mut();
        let Some(store) = stores.get_mut(id) else {
            return Ok(Value::Undefined);
        };
        store.state = next.clone();
        store.listeners.clone()
    };
    ev.ctx().dirty.set(true);
    for listener in listeners {
        ev.call_function(&listener, Value::Undefined, &[next.clone(), previous.clone()])?;
    }
    Ok(Value::Undefined)
}

fn store_api(id: usize) -> Value {
    Value::object(vec![
        ("getState", Value::native("getState", move |ev, _this, _args| Ok(store_state(ev, id)))),
        ("setState", Value::native("setState", move |ev, _this, args| store_set(ev, id, args))),
        (
            "subscribe",
            Value::native("subscribe", move |ev, _this, args| {
                let listener = arg(args, 0);
                if let Some(store) = ev.ctx().stores.borrow_mut().get_mut(id) {
                    store.listeners.push(listener);
                }
                Ok(Value::native("unsubscribe", |_ev, _this, _args| Ok(Value::Undefined)))
            }),
        ),
        ("destroy", Value::native("destroy", |_ev, _this, _args| Ok(Value::Undefined))),
        ("getInitialState", Value::native("getInitialState", move |ev, _this, _args| Ok(store_state(ev, id)))),
    ])
}

/// Build a store from `initializer(set, get, api)` and return its hook
fn create_store(ev: &mut Evaluator, initializer: &Value) -> EvalResult<Value> {
    let id = {
        let mut stores = ev.ctx().stores.borrow_mut();
        stores.push(Store {
            state: Value::Undefined,
            listeners: Vec::new(),
        });
        stores.len() - 1
    };
    let set = Value::native("set", move |ev, _this, args| store_set(ev, id, args));
    let get = Value::native("get", move |ev, _this, _args| Ok(store_state(ev, id)));
    let api = store_api(id);
    let initial = if initializer.is_callable() {
        ev.call_function(initializer, Value::Undefined, &[set, get, api.clone()])?
    } else {
        initializer.clone()
    };
    if let Some(store) = ev.ctx().stores.borrow_mut().get_mut(id) {
        // `persist` may already have hydrated state during the initializer
        let merged = match (&store.state, &initial) {
            (Value::Object(hydrated), Value::Object(fresh)) => {
                let mut merged = fresh.borrow().clone();
                for (key, value) in hydrated.borrow().entries() {
                    merged.set(key, value.clone());
                }
                Some(Value::from_object(merged))
            }
            _ => None,
        };
        store.state = merged.unwrap_or(initial);
    }
    debug!(store = id, "zustand store created");

    let hook = Value::native("useStore", move |ev, _this, args| {
        let state = store_state(ev, id);
        match arg(args, 0) {
            selector if selector.is_callable() => ev.call_function(&selector, Value::Undefined, &[state]),
            _ => Ok(state),
        }
    });
    if let (Value::Function(function), Value::Object(api)) = (&hook, &api) {
        let mut props = function.props.borrow_mut();
        for (key, value) in api.borrow().entries() {
            props.set(key, value.clone());
        }
    }
    Ok(hook)
}

fn create_native(name: &str) -> Value {
    Value::native(name, |ev, _this, args| match args.first() {
        // `create<State>()(initializer)`
        None => Ok(Value::native("create", |ev, _this, args| create_store(ev, &arg(args, 0)))),
        Some(initializer) => create_store(ev, initializer),
    })
}

/// `persist(initializer, { name })`: hydrate from and write back to localStorage
fn persist() -> Value {
    Value::native("persist", |_ev, _this, args| {
        let initializer = arg(args, 0);
        let name = prop(&arg(args, 1), "name").to_js_string();
        Ok(Value::native("persisted", move |ev, _this, args| {
            let key = format!("local:{}", name);
            let stored = ev.ctx().storage.borrow().get(&key).cloned();
            let set = arg(args, 0);
            let get = arg(args, 1);
            let api = arg(args, 2);
            if let Some(stored) = stored {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&stored) {
                    let hydrated = from_json(json.get("state").unwrap_or(&json));
                    let set_state = ev.get_member(&api, "setState")?;
                    ev.call_function(&set_state, Value::Undefined, &[hydrated])?;
                }
            }
            let inner_get = get.clone();
            let persisting_set = Value::native("set", move |ev, _this, args| {
                ev.call_function(&set, Value::Undefined, args)?;
                let state = ev.call_function(&inner_get, Value::Undefined, &[])?;
                let json = serde_json::json!({ "state": to_json(&state), "version": 0 });
                ev.ctx().storage.borrow_mut().insert(key.clone(), json.to_string());
                Ok(Value::Undefined)
            });
            ev.call_function(&initializer, Value::Undefined, &[persisting_set, get, api])
        }))
    })
}

fn identity(name: &str) -> Value {
    Value::native(name, |_ev, _this, args| Ok(arg(args, 0)))
}

pub fn zustand_module() -> Value {
    let create = create_native("create");
    Value::object(vec![
        ("create", create.clone()),
        ("default", create),
        ("createStore", create_native("createStore")),
        (
            "useStore",
            Value::native("useStore", |ev, _this, args| {
                let hook = arg(args, 0);
                ev.call_function(&hook, Value::Undefined, &args[1.min(args.len())..])
            }),
        ),
    ])
}

pub fn zustand_middleware_module() -> Value {
    Value::object(vec![
        ("persist", persist()),
        ("devtools", identity("devtools")),
        ("subscribeWithSelector", identity("subscribeWithSelector")),
        ("immer", identity("immer")),
        (
            "createJSONStorage",
            Value::native("createJSONStorage", |_ev, _this, _args| Ok(Value::empty_object())),
        ),
        (
            "combine",
            Value::native("combine", |_ev, _this, args| {
                let initial = arg(args, 0);
                let creator = arg(args, 1);
                Ok(Value::native("combined", move |ev, _this, args| {
                    let extra = ev.call_function(&creator, Value::Undefined, args)?;
                    let mut merged = match &initial {
                        Value::Object(object) => object.borrow().clone(),
                        _ => JsObject::new(),
                    };
                    for key in own_keys(&extra) {
                        let value = ev.get_member(&extra, &key)?;
                        merged.set(key, value);
                    }
                    Ok(Value::from_object(merged))
                }))
            }),
        ),
    ])
}

// -------------------------------------------------------------------
// @tanstack/react-query
// -------------------------------------------------------------------

fn key_json(key: &Value) -> serde_json::Value {
    match key {
        Value::Array(_) => to_json(key),
        Value::Undefined => serde_json::Value::Array(Vec::new()),
        other => serde_json::Value::Array(vec![to_json(other)]),
    }
}

/// `filter` is a prefix of `key`
fn key_matches(filter: &serde_json::Value, key: &serde_json::Value) -> bool {
    match (filter, key) {
        (serde_json::Value::Array(filter), serde_json::Value::Array(key)) => {
            filter.len() <= key.len() && filter.iter().zip(key).all(|(a, b)| a == b)
        }
        _ => filter == key,
    }
}

fn settle(value: Value) -> (Value, Value) {
    match value.as_promise() {
        Some(Ok(data)) => (data, Value::Undefined),
        Some(Err(error)) => (Value::Undefined, error),
        None => (value, Value::Undefined),
    }
}

/// `useQuery({ queryKey, queryFn })` or the positional v3 form
fn query_options(args: &[Value]) -> Value {
    match arg(args, 0) {
        Value::Object(_) => arg(args, 0),
        key => {
            let mut options = match arg(args, 2) {
                Value::Object(object) => object.borrow().clone(),
                _ => JsObject::new(),
            };
            options.set("queryKey", key);
            options.set("queryFn", arg(args, 1));
            Value::from_object(options)
        }
    }
}

fn run_query(ev: &mut Evaluator, options: &Value) -> EvalResult<(Value, Value, bool)> {
    let query_key = prop(options, "queryKey");
    let key = key_json(&query_key);
    let cached = ev
        .ctx()
        .query_cache
        .borrow()
        .iter()
        .find(|entry| entry.key == key)
        .map(|entry| (entry.data.clone(), entry.error.clone()));
    if let Some((data, error)) = cached {
        return Ok((data, error, true));
    }
    let enabled = prop(options, "enabled");
    let query_fn = prop(options, "queryFn");
    if matches!(enabled, Value::Bool(false)) || !query_fn.is_callable() {
        return Ok((prop(options, "initialData"), Value::Undefined, false));
    }
    let context = Value::object(vec![
        ("queryKey", query_key),
        ("signal", Value::empty_object()),
        ("pageParam", prop(options, "initialPageParam")),
        ("meta", Value::Undefined),
    ]);
    let (data, error) = match ev.call_function(&query_fn, Value::Undefined, &[context]) {
        Ok(result) => settle(result),
        Err(err) => (Value::Undefined, err.to_value()),
    };
    if !error.is_nullish() {
        debug!(key = %key, error = %error.to_js_string(), "query failed");
    }
    ev.ctx().query_cache.borrow_mut().push(QueryEntry {
        key,
        data: data.clone(),
        error: error.clone(),
    });
    Ok((data, error, true))
}

fn query_result(ev: &mut Evaluator, options: &Value, data: Value, error: Value, fetched: bool) -> EvalResult<Value> {
    let select = prop(options, "select");
    let data = if select.is_callable() && !data.is_nullish() {
        ev.call_function(&select, Value::Undefined, &[data])?
    } else if matches!(data, Value::Undefined) {
        prop(options, "placeholderData")
    } else {
        data
    };
    let failed = !error.is_nullish();
    let status = match (fetched, failed) {
        (_, true) => "error",
        (true, false) => "success",
        (false, false) => "pending",
    };
    let key = prop(options, "queryKey");
    let refetch = Value::native("refetch", move |ev, _this, _args| {
        let filter = key_json(&key);
        ev.ctx().query_cache.borrow_mut().retain(|entry| !key_matches(&filter, &entry.key));
        ev.ctx().dirty.set(true);
        Ok(Value::promise(Ok(Value::Undefined)))
    });
    Ok(Value::object(vec![
        ("data", data),
        ("error", if failed { error } else { Value::Null }),
        ("status", Value::str(status)),
        ("fetchStatus", Value::str("idle")),
        ("isLoading", Value::Bool(false)),
        ("isPending", Value::Bool(status == "pending")),
        ("isFetching", Value::Bool(false)),
        ("isRefetching", Value::Bool(false)),
        ("isError", Value::Bool(failed)),
        ("isSuccess", Value::Bool(status == "success")),
        ("isPlaceholderData", Value::Bool(false)),
        ("refetch", refetch),
    ]))
}

fn use_query() -> Value {
    Value::native("useQuery", |ev, _this, args| {
        let options = query_options(args);
        let (data, error, fetched) = run_query(ev, &options)?;
        query_result(ev, &options, data, error, fetched)
    })
}

fn use_infinite_query() -> Value {
    Value::native("useInfiniteQuery", |ev, _this, args| {
        let options = query_options(args);
        let (page, error, fetched) = run_query(ev, &options)?;
        let data = if page.is_nullish() {
            Value::Undefined
        } else {
            Value::object(vec![
                ("pages", Value::array(vec![page])),
                ("pageParams", Value::array(vec![prop(&options, "initialPageParam")])),
            ])
        };
        let result = query_result(ev, &options, data, error, fetched)?;
        if let Value::Object(object) = &result {
            let mut object = object.borrow_mut();
            object.set("hasNextPage", Value::Bool(false));
            object.set("hasPreviousPage", Value::Bool(false));
            object.set("isFetchingNextPage", Value::Bool(false));
            object.set(
                "fetchNextPage",
                Value::native("fetchNextPage", |_ev, _this, _args| Ok(Value::promise(Ok(Value::Undefined)))),
            );
        }
        Ok(result)
    })
}

fn call_option(ev: &mut Evaluator, options: &Value, name: &str, args: &[Value]) -> EvalResult<()> {
    let callback = prop(options, name);
    if callback.is_callable() {
        ev.call_function(&callback, Value::Undefined, args)?;
    }
    Ok(())
}

fn use_mutation() -> Value {
    Value::native("useMutation", |_ev, _this, args| {
        let options = mutation_options(args);
        let run_options = options.clone();
        let run = move |ev: &mut Evaluator, args: &[Value]| -> EvalResult<Value> {
            let variables = arg(args, 0);
            let per_call = arg(args, 1);
            let mutation_fn = prop(&run_options, "mutationFn");
            let outcome = match ev.call_function(&mutation_fn, Value::Undefined, &[variables.clone()]) {
                Ok(result) => settle(result),
                Err(err) => (Value::Undefined, err.to_value()),
            };
            let (data, error) = outcome;
            for options in [&run_options, &per_call] {
                if error.is_nullish() {
                    call_option(ev, options, "onSuccess", &[data.clone(), variables.clone()])?;
                } else {
                    call_option(ev, options, "onError", &[error.clone(), variables.clone()])?;
                }
                call_option(ev, options, "onSettled", &[data.clone(), error.clone(), variables.clone()])?;
            }
            Ok(if error.is_nullish() {
                Value::promise(Ok(data))
            } else {
                Value::promise(Err(error))
            })
        };
        let run = std::rc::Rc::new(run);
        let mutate_run = run.clone();
        Ok(Value::object(vec![
            ("mutate", Value::native("mutate", move |ev, _this, args| {
                (*mutate_run)(ev, args)?;
                Ok(Value::Undefined)
            })),
            ("mutateAsync", Value::native("mutateAsync", move |ev, _this, args| (*run)(ev, args))),
            ("reset", Value::native("reset", |_ev, _this, _args| Ok(Value::Undefined))),
            ("status", Value::str("idle")),
            ("data", Value::Undefined),
            ("error", Value::Null),
            ("isIdle", Value::Bool(true)),
            ("isPending", Value::Bool(false)),
            ("isLoading", Value::Bool(false)),
            ("isError", Value::Bool(false)),
            ("isSuccess", Value::Bool(false)),
        ]))
    })
}

fn mutation_options(args: &[Value]) -> Value {
    match arg(args, 0) {
        Value::Object(_) => arg(args, 0),
        mutation_fn => Value::object(vec![("mutationFn", mutation_fn)]),
    }
}

fn filter_key(value: &Value) -> serde_json::Value {
    match value {
        Value::Object(_) => key_json(&prop(value, "queryKey")),
        other => key_json(other),
    }
}

fn query_client() -> Value {
    let invalidate = |name: &str| {
        Value::native(name, |ev, _this, args| {
            let filter = filter_key(&arg(args, 0));
            ev.ctx().query_cache.borrow_mut().retain(|entry| !key_matches(&filter, &entry.key));
            ev.ctx().dirty.set(true);
            Ok(Value::promise(Ok(Value::Undefined)))
        })
    };
    let resolved = |name: &str| Value::native(name, |_ev, _this, _args| Ok(Value::promise(Ok(Value::Undefined))));
    Value::object(vec![
        ("invalidateQueries", invalidate("invalidateQueries")),
        ("refetchQueries", invalidate("refetchQueries")),
        ("resetQueries", invalidate("resetQueries")),
        ("removeQueries", invalidate("removeQueries")),
        ("cancelQueries", resolved("cancelQueries")),
        ("prefetchQuery", Value::native("prefetchQuery", |ev, _this, args| {
            run_query(ev, &query_options(args))?;
            Ok(Value::promise(Ok(Value::Undefined)))
        })),
        ("getQueryData", Value::native("getQueryData", |ev, _this, args| {
            let key = key_json(&arg(args, 0));
            Ok(ev
                .ctx()
                .query_cache
                .borrow()
                .iter()
                .find(|entry| entry.key == key)
                .map_or(Value::Undefined, |entry| entry.data.clone()))
        })),
        ("setQueryData", Value::native("setQueryData", |ev, _this, args| {
            let key = key_json(&arg(args, 0));
            let previous = ev
                .ctx()
                .query_cache
                .borrow()
                .iter()
                .find(|entry| entry.key == key)
                .map_or(Value::Undefined, |entry| entry.data.clone());
            let data = match arg(args, 1) {
                updater if updater.is_callable() => ev.call_function(&updater, Value::Undefined, &[previous])?,
                data => data,
            };
            {
                let mut cache = ev.ctx().query_cache.borrow_mut();
                cache.retain(|entry| entry.key != key);
                cache.push(QueryEntry {
                    key,
                    data: data.clone(),
                    error: Value::Undefined,
                });
            }
            ev.ctx().dirty.set(true);
            Ok(data)
        })),
        ("clear", Value::native("clear", |ev, _this, _args| {
            ev.ctx().query_cache.borrow_mut().clear();
            Ok(Value::Undefined)
        })),
    ])
}

pub fn react_query_module() -> Value {
    Value::object(vec![
        ("QueryClient", Value::native("QueryClient", |_ev, _this, _args| Ok(query_client()))),
        (
            "QueryClientProvider",
            Value::native("QueryClientProvider", |_ev, _this, args| Ok(prop(&arg(args, 0), "children"))),
        ),
        ("useQueryClient", Value::native("useQueryClient", |_ev, _this, _args| Ok(query_client()))),
        ("useQuery", use_query()),
        ("useSuspenseQuery", use_query()),
        ("useInfiniteQuery", use_infinite_query()),
        (
            "useQueries",
            Value::native("useQueries", |ev, _this, args| {
                let queries = prop(&arg(args, 0), "queries");
                let mut results = Vec::new();
                for options in ev.iterate(&queries)? {
                    let (data, error, fetched) = run_query(ev, &options)?;
                    results.push(query_result(ev, &options, data, error, fetched)?);
                }
                Ok(Value::array(results))
            }),
        ),
        ("useMutation", use_mutation()),
        ("useIsFetching", Value::native("useIsFetching", |_ev, _this, _args| Ok(Value::Number(0.0)))),
        (
            "keepPreviousData",
            Value::native("keepPreviousData", |_ev, _this, args| Ok(arg(args, 0))),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix_matching() {
        let key = serde_json::json!(["todos", 1]);
        assert!(key_matches(&serde_json::json!(["todos"]), &key));
        assert!(key_matches(&serde_json::json!(["todos", 1]), &key));
        assert!(!key_matches(&serde_json::json!(["todos", 2]), &key));
        assert!(!key_matches(&serde_json::json!(["users"]), &key));
    }

    #[test]
    fn test_key_json_wraps_scalars() {
        assert_eq!(key_json(&Value::str("todos")), serde_json::json!(["todos"]));
        assert_eq!(
            key_json(&Value::array(vec![Value::str("todo"), Value::Number(3.0)])),
            serde_json::json!(["todo", 3])
        );
    }

    #[test]
    fn test_positional_query_options() {
        let options = query_options(&[Value::str("todos"), Value::Null]);
        assert_eq!(prop(&options, "queryKey").to_js_string(), "todos");
    }
}
