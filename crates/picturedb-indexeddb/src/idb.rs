//! IndexedDB event plumbing
//!
//! Every IDB request and transaction reports through DOM events. Each one is
//! wrapped in a `js_sys::Promise` and awaited as a `JsFuture`.
//!
//! Requests settle on `success`/`error`, opens also reject on `blocked`, and
//! transactions settle on `complete` or `abort`. Completion watchers must be
//! attached before the first await so the `complete` event cannot fire
//! unobserved.

use js_sys::Promise;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    DomException, IdbDatabase, IdbFactory, IdbObjectStore, IdbObjectStoreParameters,
    IdbOpenDbRequest, IdbRequest, IdbTransaction, IdbTransactionMode,
};

use picturedb_core::record::KEY_PATH;

use crate::error::{describe_js, IndexedDbError, Result};

/// A DOM event handler owned on the Rust side.
pub type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

/// Listeners of one request or transaction.
///
/// The first one to fire detaches every handler from the event target, then
/// releases all of them. Later events on the target find no handler instead of
/// a freed closure.
struct Listeners {
    closures: RefCell<Vec<EventClosure>>,
    detach: Box<dyn Fn()>,
}

impl Listeners {
    fn new(detach: impl Fn() + 'static) -> Rc<Self> {
        Rc::new(Self {
            closures: RefCell::new(Vec::new()),
            detach: Box::new(detach),
        })
    }

    /// A one-shot listener. `fire` runs after the handlers are detached, so it
    /// may install replacements.
    fn listener(self: &Rc<Self>, mut fire: impl FnMut() + 'static) -> EventClosure {
        let listeners = self.clone();
        Closure::wrap(Box::new(move |_event: web_sys::Event| {
            (listeners.detach)();
            fire();
            listeners.closures.borrow_mut().clear();
        }) as Box<dyn FnMut(web_sys::Event)>)
    }

    fn keep(&self, closures: impl IntoIterator<Item = EventClosure>) {
        self.closures.borrow_mut().extend(closures);
    }
}

/// Locate `indexedDB` on the global object (window or worker scope).
pub fn idb_factory() -> Result<IdbFactory> {
    let value = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("indexedDB"))
        .map_err(|e| IndexedDbError::NotAvailable(describe_js(&e)))?;
    if value.is_undefined() || value.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "this environment has no indexedDB".into(),
        ));
    }
    value
        .dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("global indexedDB is not an IDBFactory".into()))
}

/// "Name: message" of a DOMException, matching what browsers print.
fn describe_exception(e: &DomException) -> String {
    format!("{}: {}", e.name(), e.message())
}

fn request_error(req: &IdbRequest, fallback: &str) -> JsValue {
    let msg = req
        .error()
        .ok()
        .flatten()
        .map(|e| describe_exception(&e))
        .unwrap_or_else(|| fallback.to_string());
    JsValue::from_str(&msg)
}

/// Promise that settles on the request's `success` (with its result) or `error`.
fn request_to_promise(req: &IdbRequest) -> Promise {
    Promise::new(&mut |resolve, reject| {
        let listeners = {
            let req = req.clone();
            Listeners::new(move || {
                req.set_onsuccess(None);
                req.set_onerror(None);
            })
        };

        let on_success = {
            let req = req.clone();
            listeners.listener(move || {
                let result = req.result().unwrap_or(JsValue::UNDEFINED);
                let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            })
        };
        let on_error = {
            let req = req.clone();
            listeners.listener(move || {
                let err = request_error(&req, "UnknownError: request failed");
                let _ = reject.call1(&JsValue::UNDEFINED, &err);
            })
        };

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        listeners.keep([on_success, on_error]);
    })
}

/// Promise for an open request: settles on `success` or `error`, and rejects
/// on `blocked`.
///
/// A blocked open stays queued in the browser. If it later succeeds, the
/// connection nobody is waiting for is closed straight away.
fn open_to_promise(req: &IdbOpenDbRequest, db_name: &str, blocked: Rc<Cell<bool>>) -> Promise {
    Promise::new(&mut |resolve, reject| {
        let listeners = {
            let req = req.clone();
            Listeners::new(move || {
                req.set_onsuccess(None);
                req.set_onerror(None);
                req.set_onblocked(None);
            })
        };

        let on_success = {
            let req = req.clone();
            listeners.listener(move || {
                let result = req.result().unwrap_or(JsValue::UNDEFINED);
                let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            })
        };
        let on_error = {
            let req = req.clone();
            let reject = reject.clone();
            listeners.listener(move || {
                let err = request_error(&req, "UnknownError: open failed");
                let _ = reject.call1(&JsValue::UNDEFINED, &err);
            })
        };
        let on_blocked = {
            let req = req.clone();
            let name = db_name.to_string();
            let blocked = blocked.clone();
            listeners.listener(move || {
                warn!(database = %name, "open blocked by a connection on an older version");
                blocked.set(true);
                let late_success = Closure::once_into_js(close_late_connection(req.clone()));
                req.set_onsuccess(Some(late_success.unchecked_ref()));
                let msg = format!(
                    "blocked: another connection to {} is still open on an older version",
                    name
                );
                let _ = reject.call1(&JsValue::UNDEFINED, &JsValue::from_str(&msg));
            })
        };

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        req.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));
        listeners.keep([on_success, on_error, on_blocked]);
    })
}

fn close_late_connection(req: IdbOpenDbRequest) -> impl FnOnce(web_sys::Event) {
    move |_event| {
        if let Ok(result) = req.result() {
            if let Ok(db) = result.dyn_into::<IdbDatabase>() {
                debug!(database = %db.name(), "closing connection opened after blocked");
                db.close();
            }
        }
    }
}

/// Promise that resolves on the transaction's `complete` (the commit) and
/// rejects on `abort`.
///
/// A failed request fires `error` on the transaction and then aborts it, so
/// `abort` is the terminal failure event.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    Promise::new(&mut |resolve, reject| {
        let listeners = {
            let tx = tx.clone();
            Listeners::new(move || {
                tx.set_oncomplete(None);
                tx.set_onabort(None);
            })
        };

        let on_complete = listeners.listener(move || {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        });
        let on_abort = {
            let tx = tx.clone();
            listeners.listener(move || {
                let msg = tx
                    .error()
                    .map(|e| describe_exception(&e))
                    .unwrap_or_else(|| "AbortError: transaction aborted".to_string());
                let _ = reject.call1(&JsValue::UNDEFINED, &JsValue::from_str(&msg));
            })
        };

        tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx.set_onabort(Some(on_abort.as_ref().unchecked_ref()));
        listeners.keep([on_complete, on_abort]);
    })
}

/// Close `db` when another connection asks to upgrade or delete it.
///
/// The returned closure is the installed handler; keep it alive for as long
/// as the connection and call [`unwatch_version_change`] before dropping it.
pub fn watch_version_change(db: &IdbDatabase) -> EventClosure {
    let target = db.clone();
    let on_versionchange = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        warn!(database = %target.name(), "closing connection for a version change elsewhere");
        target.set_onversionchange(None);
        target.close();
    }) as Box<dyn FnMut(web_sys::Event)>);
    db.set_onversionchange(Some(on_versionchange.as_ref().unchecked_ref()));
    on_versionchange
}

/// Remove the handler installed by [`watch_version_change`].
pub fn unwatch_version_change(db: &IdbDatabase) {
    db.set_onversionchange(None);
}

/// Create the image collection if this database does not have it yet.
fn create_schema(req: &IdbOpenDbRequest, collection: &str) -> std::result::Result<(), String> {
    let db: IdbDatabase = req.result().map_err(|e| describe_js(&e))?.unchecked_into();

    if db.object_store_names().contains(collection) {
        debug!(collection, "collection already present");
        return Ok(());
    }

    let params = IdbObjectStoreParameters::new();
    js_sys::Reflect::set(&params, &"keyPath".into(), &JsValue::from_str(KEY_PATH))
        .map_err(|e| describe_js(&e))?;
    db.create_object_store_with_optional_parameters(collection, &params)
        .map_err(|e| describe_js(&e))?;

    debug!(collection, "collection created");
    Ok(())
}

/// Open (or create) a database, creating `collection` when the version increases.
pub async fn open_database(db_name: &str, version: u32, collection: &str) -> Result<IdbDatabase> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(db_name, version)
        .map_err(|e| IndexedDbError::Open(describe_js(&e)))?;

    // Failure inside upgradeneeded aborts the versionchange transaction; keep the reason
    let upgrade_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let req_for_upgrade = open_req.clone();
    let error_for_upgrade = upgrade_error.clone();
    let collection_name = collection.to_string();
    let on_upgrade = Closure::wrap(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
        debug!(
            from = event.old_version(),
            to = ?event.new_version(),
            "upgrade needed"
        );
        if let Err(msg) = create_schema(&req_for_upgrade, &collection_name) {
            if let Some(tx) = req_for_upgrade.transaction() {
                let _ = tx.abort();
            }
            *error_for_upgrade.borrow_mut() = Some(msg);
        }
    }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    let blocked = Rc::new(Cell::new(false));
    let outcome = JsFuture::from(open_to_promise(&open_req, db_name, blocked.clone())).await;

    if blocked.get() {
        // Still queued in the browser: the upgrade may run once the blocker closes
        on_upgrade.forget();
    } else {
        open_req.set_onupgradeneeded(None);
        drop(on_upgrade);
    }

    if let Some(msg) = upgrade_error.borrow_mut().take() {
        return Err(IndexedDbError::Open(format!("schema upgrade failed: {}", msg)));
    }

    outcome
        .map_err(|e| IndexedDbError::Open(describe_js(&e)))?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))
}

/// Start a transaction on one collection.
pub fn begin_transaction(
    db: &IdbDatabase,
    collection: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(collection, mode)
        .map_err(|e| IndexedDbError::Transaction(describe_js(&e)))?;
    let store = tx
        .object_store(collection)
        .map_err(|e| IndexedDbError::Request(describe_js(&e)))?;
    Ok((tx, store))
}

/// Await a request's `success`, yielding `request.result`.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    JsFuture::from(request_to_promise(req))
        .await
        .map_err(|e| IndexedDbError::Request(describe_js(&e)))
}

/// Attach a completion watcher to `tx`. Call before awaiting anything else.
pub fn watch_transaction(tx: &IdbTransaction) -> JsFuture {
    JsFuture::from(transaction_to_promise(tx))
}

/// Await a watched transaction's commit.
pub async fn await_transaction(done: JsFuture) -> Result<()> {
    done.await
        .map_err(|e| IndexedDbError::Transaction(describe_js(&e)))?;
    Ok(())
}

/// Await a write request, then its transaction's commit.
///
/// A failed request aborts its transaction; the abort is drained before the
/// request's error is reported.
pub async fn await_write(req: &IdbRequest, done: JsFuture) -> Result<()> {
    if let Err(err) = await_request(req).await {
        let _ = done.await;
        return Err(err);
    }
    await_transaction(done).await
}

/// Drop a whole database, records and schema included.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let req = idb_factory()?
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe_js(&e))))?;
    JsFuture::from(request_to_promise(&req))
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe_js(&e))))?;
    Ok(())
}
