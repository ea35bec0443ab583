//! Integration tests over the full engine: ledger + container + events
//! wired to the in-memory store and lock manager.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::json;

    use warehause_container::{
        Warehause, WarehauseDef, WarehauseDefStore, WarehauseDims, WarehausePatch, WarehauseStore,
        Yard,
    };
    use warehause_core::{
        DomainError, Entity, EntityId, EntityMeta, LockManager, OwnerId, Status,
    };
    use warehause_events::{
        EventDef, EventDefStore, EventDims, EventPatch, EventQueue, EventStore, GarbageCollector,
        Processor, TaskRegistry,
    };
    use warehause_ledger::{
        Ledger, Product, ProductDef, ProductDefStore, ProductDims, ProductPatch, ProductStore,
    };

    use crate::locks::InMemoryLockManager;
    use crate::memory::MemoryStore;

    struct World {
        store: Arc<MemoryStore>,
        locks: Arc<InMemoryLockManager>,
        ledger: Arc<Ledger>,
        yard: Arc<Yard>,
        registry: Arc<TaskRegistry>,
        processor: Arc<Processor>,
        queue: EventQueue,
        gc: GarbageCollector,
        owner: OwnerId,
    }

    fn world() -> World {
        let store = MemoryStore::arc();
        let locks = Arc::new(InMemoryLockManager::new());

        let ledger = Arc::new(Ledger::new(
            store.clone() as Arc<dyn ProductStore>,
            store.clone() as Arc<dyn ProductDefStore>,
            locks.clone() as Arc<dyn LockManager>,
        ));
        let yard = Arc::new(Yard::new(
            store.clone() as Arc<dyn WarehauseStore>,
            store.clone() as Arc<dyn WarehauseDefStore>,
            store.clone() as Arc<dyn ProductStore>,
            ledger.clone(),
        ));
        let registry = Arc::new(TaskRegistry::new());
        let processor = Arc::new(Processor::new(
            store.clone() as Arc<dyn EventStore>,
            store.clone() as Arc<dyn EventDefStore>,
            locks.clone() as Arc<dyn LockManager>,
            registry.clone(),
            ledger.clone(),
            yard.clone(),
        ));
        let queue = EventQueue::new(
            store.clone() as Arc<dyn EventStore>,
            locks.clone() as Arc<dyn LockManager>,
            processor.clone(),
        );
        let gc = GarbageCollector::new(
            store.clone() as Arc<dyn EventStore>,
            store.clone() as Arc<dyn WarehauseStore>,
            store.clone() as Arc<dyn ProductStore>,
            locks.clone() as Arc<dyn LockManager>,
        );

        World {
            store,
            locks,
            ledger,
            yard,
            registry,
            processor,
            queue,
            gc,
            owner: OwnerId::new(),
        }
    }

    fn product_def(w: &World, barcode: &str, dims: ProductDims) -> ProductDef {
        let dfn = ProductDef::new(EntityMeta::new(w.owner, barcode), dims);
        ProductDefStore::insert(&*w.store, dfn.clone()).unwrap();
        dfn
    }

    fn warehause_def(w: &World, barcode: &str, dims: WarehauseDims) -> WarehauseDef {
        let dfn = WarehauseDef::new(EntityMeta::new(w.owner, barcode), dims);
        WarehauseDefStore::insert(&*w.store, dfn.clone()).unwrap();
        dfn
    }

    fn warehause(w: &World, dfn: &WarehauseDef, patch: WarehausePatch) -> Warehause {
        let mut instance = w.yard.create_instance(dfn.id(), &patch, None).unwrap();
        w.yard.save(&mut instance).unwrap();
        instance
    }

    fn event_def(w: &World, barcode: &str, dims: EventDims) -> EventDef {
        let dfn = EventDef::new(EntityMeta::new(w.owner, barcode), dims);
        EventDefStore::insert(&*w.store, dfn.clone()).unwrap();
        dfn
    }

    /// Manufacture `quantity` of `dfn` and receive it into `warehause`.
    fn stock(w: &World, warehause: &Warehause, dfn: &ProductDef, quantity: f64) -> Product {
        let product = w
            .ledger
            .create_instance(
                dfn.id(),
                &ProductPatch {
                    quantity: Some(quantity),
                    ..ProductPatch::default()
                },
                None,
            )
            .unwrap();
        w.yard.receive(warehause.id(), product).unwrap()
    }

    fn stored_quantity(w: &World, id: EntityId) -> f64 {
        ProductStore::get(&*w.store, id).unwrap().unwrap().quantity
    }

    // --- container engine ---------------------------------------------------

    #[test]
    fn dispatch_then_receive_conserves_total() -> anyhow::Result<()> {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W-BAY", WarehauseDims::default());
        let source = warehause(&w, &wdfn, WarehausePatch::default());
        let dest = warehause(&w, &wdfn, WarehausePatch::default());

        let seed = stock(&w, &source, &pdfn, 10.0);

        let dispatched = w.yard.dispatch(source.id(), pdfn.id(), 4.0)?;
        assert_eq!(dispatched.product.quantity, 4.0);
        assert!(dispatched.product.warehause.is_none());
        assert_eq!(stored_quantity(&w, seed.id()), 6.0);

        let received = w.yard.receive(dest.id(), dispatched.product)?;
        assert_eq!(received.warehause, Some(dest.id()));
        assert_eq!(received.quantity, 4.0);

        let source_usage = w.yard.usage(source.id())?;
        let dest_usage = w.yard.usage(dest.id())?;
        assert_eq!(source_usage.totals.quantity, 6.0);
        assert_eq!(dest_usage.totals.quantity, 4.0);
        Ok(())
    }

    #[test]
    fn transfer_is_dispatch_plus_receive() -> anyhow::Result<()> {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W-BAY", WarehauseDims::default());
        let source = warehause(&w, &wdfn, WarehausePatch::default());
        let dest = warehause(&w, &wdfn, WarehausePatch::default());
        stock(&w, &source, &pdfn, 10.0);

        let moved = w.yard.transfer(source.id(), dest.id(), pdfn.id(), 3.0)?;
        assert_eq!(moved.warehause, Some(dest.id()));
        assert_eq!(w.yard.usage(source.id())?.totals.quantity, 7.0);
        assert_eq!(w.yard.usage(dest.id())?.totals.quantity, 3.0);
        Ok(())
    }

    #[test]
    fn non_permissive_warehause_holds_one_definition() {
        let w = world();
        let pdfn_a = product_def(&w, "P-A", ProductDims::default());
        let pdfn_b = product_def(&w, "P-B", ProductDims::default());
        let wdfn = warehause_def(&w, "W-BAY", WarehauseDims::default());
        let bay = warehause(&w, &wdfn, WarehausePatch::default());

        let first = stock(&w, &bay, &pdfn_a, 5.0);

        // a different definition is refused
        let other = w
            .ledger
            .create_instance(pdfn_b.id(), &ProductPatch::default(), None)
            .unwrap();
        let err = w.yard.receive(bay.id(), other).unwrap_err();
        assert_eq!(err.code(), "dfn_mismatch");

        // more of the same definition merges into the seed row
        let more = w
            .ledger
            .create_instance(
                pdfn_a.id(),
                &ProductPatch {
                    quantity: Some(2.5),
                    ..ProductPatch::default()
                },
                None,
            )
            .unwrap();
        let merged = w.yard.receive(bay.id(), more).unwrap();
        assert_eq!(merged.id(), first.id());
        assert_eq!(merged.quantity, 7.5);
    }

    #[test]
    fn mixed_expiry_stays_in_separate_seed_rows() {
        let w = world();
        let pdfn = product_def(
            &w,
            "P-MILK",
            ProductDims {
                is_expires: true,
                ..ProductDims::default()
            },
        );
        let wdfn = warehause_def(
            &w,
            "W-CHILL",
            WarehauseDims {
                is_permissive: true,
                ..WarehauseDims::default()
            },
        );
        let chiller = warehause(&w, &wdfn, WarehausePatch::default());

        let lot = |date: &str, quantity: f64| {
            w.ledger
                .create_instance(
                    pdfn.id(),
                    &ProductPatch {
                        quantity: Some(quantity),
                        expires: Some(date.parse().unwrap()),
                        ..ProductPatch::default()
                    },
                    None,
                )
                .unwrap()
        };

        let a = w.yard.receive(chiller.id(), lot("2026-09-01", 10.0)).unwrap();
        let b = w.yard.receive(chiller.id(), lot("2026-10-01", 4.0)).unwrap();
        assert_ne!(a.id(), b.id());

        let rows = w.yard.get_stock(chiller.id(), pdfn.id(), true).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn capacity_overload_names_the_failed_dimensions() {
        let w = world();
        let pdfn = product_def(
            &w,
            "P-BRICK",
            ProductDims {
                weight: Some(2.0),
                ..ProductDims::default()
            },
        );
        let wdfn = warehause_def(
            &w,
            "W-SHELF",
            WarehauseDims {
                max_weight: Some(10.0),
                ..WarehauseDims::default()
            },
        );
        let shelf = warehause(
            &w,
            &wdfn,
            WarehausePatch {
                stock_max: Some(4.0),
                ..WarehausePatch::default()
            },
        );

        let heavy = w
            .ledger
            .create_instance(
                pdfn.id(),
                &ProductPatch {
                    quantity: Some(6.0), // weight 12 > 10, quantity 6 > 4
                    ..ProductPatch::default()
                },
                None,
            )
            .unwrap();

        let err = w.yard.receive(shelf.id(), heavy).unwrap_err();
        match err {
            DomainError::Overload { overcap, .. } => {
                assert_eq!(overcap.len(), 2);
                assert!(overcap.iter().all(|o| o.excess() > 0.0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn closed_root_closes_the_whole_containment_tree() {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());

        let mut root = warehause(&w, &wdfn, WarehausePatch::default());
        let aisle = warehause(
            &w,
            &wdfn,
            WarehausePatch {
                parent: Some(root.id()),
                ..WarehausePatch::default()
            },
        );
        let bin = warehause(
            &w,
            &wdfn,
            WarehausePatch {
                parent: Some(aisle.id()),
                ..WarehausePatch::default()
            },
        );

        root.status = Status::Closed;
        w.yard.save(&mut root).unwrap();

        assert_eq!(w.yard.effective_status(root.id()).unwrap(), Status::Closed);
        assert_eq!(w.yard.effective_status(aisle.id()).unwrap(), Status::Closed);
        assert_eq!(w.yard.effective_status(bin.id()).unwrap(), Status::Closed);

        // the leaf's own field still says OPEN, yet receive is refused
        let product = w
            .ledger
            .create_instance(pdfn.id(), &ProductPatch::default(), None)
            .unwrap();
        let err = w.yard.receive(bin.id(), product).unwrap_err();
        assert_eq!(err.code(), "status_not_open");
    }

    #[test]
    fn productdef_map_is_unioned_across_ancestors() {
        let w = world();
        let pdfn_a = product_def(&w, "P-A", ProductDims::default());
        let pdfn_b = product_def(&w, "P-B", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());

        let root = warehause(&w, &wdfn, WarehausePatch::default());
        let bin = warehause(
            &w,
            &wdfn,
            WarehausePatch {
                parent: Some(root.id()),
                ..WarehausePatch::default()
            },
        );

        // mapping configured on the ROOT restricts the child too
        w.yard.map_productdef(pdfn_a.id(), root.id()).unwrap();

        let allowed = w
            .ledger
            .create_instance(pdfn_a.id(), &ProductPatch::default(), None)
            .unwrap();
        assert!(w.yard.receive(bin.id(), allowed).is_ok());

        let rejected = w
            .ledger
            .create_instance(pdfn_b.id(), &ProductPatch::default(), None)
            .unwrap();
        let err = w.yard.receive(bin.id(), rejected).unwrap_err();
        assert_eq!(err.code(), "dfn_not_mapped");
    }

    #[test]
    fn reserve_then_unreserve_restores_seed() -> anyhow::Result<()> {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());
        let bay = warehause(&w, &wdfn, WarehausePatch::default());
        let seed = stock(&w, &bay, &pdfn, 10.0);

        let reservation = w.yard.reserve(bay.id(), pdfn.id(), 4.0)?;
        assert_eq!(reservation.parent, Some(seed.id()));
        assert_eq!(reservation.warehause, Some(bay.id()));
        assert_eq!(stored_quantity(&w, seed.id()), 6.0);

        // reserved stock still occupies the warehause
        assert_eq!(w.yard.usage(bay.id())?.totals.quantity, 10.0);
        // but only the seed row is dispatchable
        let err = w.yard.dispatch(bay.id(), pdfn.id(), 8.0).unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");

        let restored = w.yard.unreserve(bay.id(), reservation.id())?;
        assert_eq!(restored.id(), seed.id());
        assert_eq!(restored.quantity, 10.0);
        Ok(())
    }

    // --- concurrency --------------------------------------------------------

    #[test]
    fn racing_reservations_cannot_oversell() {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());
        let bay = warehause(&w, &wdfn, WarehausePatch::default());
        let seed = stock(&w, &bay, &pdfn, 5.0);

        let results: Vec<_> = [0, 1]
            .map(|_| {
                let ledger = w.ledger.clone();
                let seed_id = seed.id();
                thread::spawn(move || ledger.reserve(seed_id, 4.0))
            })
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost: Vec<_> = results.into_iter().filter_map(Result::err).collect();
        assert_eq!(won, 1);
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].code(), "insufficient_stock");
        assert_eq!(stored_quantity(&w, seed.id()), 1.0);
    }

    // --- event engine -------------------------------------------------------

    #[test]
    fn immediate_event_processes_inside_create() {
        let w = world();
        w.registry.register(w.owner, "demo.close", |_ctx, event| {
            event.set_status(Status::Closed);
            Ok(())
        });

        let edfn = event_def(
            &w,
            "E-CLOSE",
            EventDims {
                is_batched: false,
                proc_name: Some("demo.close".into()),
            },
        );

        let event = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap()
            .expect("event survives processing");

        assert_eq!(event.status, Status::Closed);
        assert!(event.proc_start.is_some());
        assert!(event.proc_end.is_some());
    }

    #[test]
    fn batched_event_waits_for_the_drain() {
        let w = world();
        let processed = Arc::new(Mutex::new(Vec::new()));
        {
            let processed = processed.clone();
            w.registry.register(w.owner, "demo.mark", move |_ctx, event| {
                processed.lock().unwrap().push(event.id());
                event.set_status(Status::Closed);
                Ok(())
            });
        }

        let edfn = event_def(
            &w,
            "E-MARK",
            EventDims {
                is_batched: true,
                proc_name: Some("demo.mark".into()),
            },
        );

        let event = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap()
            .unwrap();
        assert_eq!(event.status, Status::Open);
        assert!(event.proc_start.is_none());
        assert!(processed.lock().unwrap().is_empty());

        let report = w.queue.drain().unwrap();
        assert_eq!(report.spawned, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);

        let after = EventStore::get(&*w.store, event.id()).unwrap().unwrap();
        assert_eq!(after.status, Status::Closed);
        assert!(after.proc_end.is_some());
        assert_eq!(processed.lock().unwrap().as_slice(), &[event.id()]);
    }

    #[test]
    fn tasks_call_back_into_the_container_engine() -> anyhow::Result<()> {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());
        let source = warehause(&w, &wdfn, WarehausePatch::default());
        let dest = warehause(&w, &wdfn, WarehausePatch::default());
        stock(&w, &source, &pdfn, 10.0);

        let (source_id, dest_id, pdfn_id) = (source.id(), dest.id(), pdfn.id());
        w.registry
            .register(w.owner, "demo.putaway", move |ctx, event| {
                ctx.yard.transfer(source_id, dest_id, pdfn_id, 6.0)?;
                event.set_status(Status::Closed);
                Ok(())
            });

        let edfn = event_def(
            &w,
            "E-PUTAWAY",
            EventDims {
                is_batched: false,
                proc_name: Some("demo.putaway".into()),
            },
        );
        w.processor
            .create_instance(edfn.id(), &EventPatch::default(), None)?;

        assert_eq!(w.yard.usage(source_id)?.totals.quantity, 4.0);
        assert_eq!(w.yard.usage(dest_id)?.totals.quantity, 6.0);
        Ok(())
    }

    #[test]
    fn task_failure_keeps_its_error_kind_and_stamps_proc_end() {
        let w = world();
        w.registry.register(w.owner, "demo.fail", |_ctx, _event| {
            Err(DomainError::QuantityNotPositive { quantity: -1.0 })
        });

        let edfn = event_def(
            &w,
            "E-FAIL",
            EventDims {
                is_batched: false,
                proc_name: Some("demo.fail".into()),
            },
        );

        let err = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap_err();
        assert_eq!(err.code(), "quantity_not_positive");

        let stuck: Vec<_> = EventStore::open_batched(&*w.store).unwrap();
        assert!(stuck.is_empty());
    }

    #[test]
    fn unresolvable_task_closes_the_event_with_a_typed_error() {
        let w = world();
        let edfn = event_def(
            &w,
            "E-GHOST",
            EventDims {
                is_batched: true,
                proc_name: Some("no.such.task".into()),
            },
        );

        let event = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap()
            .unwrap();

        let err = w.processor.process(event.id()).unwrap_err();
        assert_eq!(err.code(), "task_not_found");

        let after = EventStore::get(&*w.store, event.id()).unwrap().unwrap();
        assert_eq!(after.status, Status::Closed);
        assert!(after.meta.option("errors").is_some());
    }

    #[test]
    fn virtual_event_destroys_itself_after_processing() {
        let w = world();
        w.registry.register(w.owner, "demo.burn", |_ctx, event| {
            event.set_status(Status::Destroy);
            Ok(())
        });

        let edfn = event_def(
            &w,
            "E-BURN",
            EventDims {
                is_batched: false,
                proc_name: Some("demo.burn".into()),
            },
        );

        let outcome = w
            .processor
            .create_instance(
                edfn.id(),
                &EventPatch {
                    is_virtual: Some(true),
                    ..EventPatch::default()
                },
                None,
            )
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn stale_processing_events_are_requeued() {
        let w = world();
        let edfn = event_def(
            &w,
            "E-STUCK",
            EventDims {
                is_batched: true,
                proc_name: Some("demo.never".into()),
            },
        );

        let mut stuck = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap()
            .unwrap();
        let mut fresh = w
            .processor
            .create_instance(edfn.id(), &EventPatch::default(), None)
            .unwrap()
            .unwrap();

        // a worker died an hour ago; another started just now
        stuck.status = Status::Processing;
        stuck.proc_start = Some(Utc::now() - chrono::Duration::hours(1));
        EventStore::update(&*w.store, &stuck).unwrap();
        fresh.status = Status::Processing;
        fresh.proc_start = Some(Utc::now());
        EventStore::update(&*w.store, &fresh).unwrap();

        let requeued = w.queue.requeue_stale(Duration::from_secs(600)).unwrap();
        assert_eq!(requeued, 1);

        let stuck = EventStore::get(&*w.store, stuck.id()).unwrap().unwrap();
        let fresh = EventStore::get(&*w.store, fresh.id()).unwrap().unwrap();
        assert_eq!(stuck.status, Status::Open);
        assert!(stuck.meta.option("requeued").is_some());
        assert_eq!(fresh.status, Status::Processing);
    }

    // --- garbage collection -------------------------------------------------

    #[test]
    fn sweep_deletes_virtual_destroyed_and_skips_blocked() {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let wdfn = warehause_def(&w, "W", WarehauseDims::default());
        let edfn = event_def(&w, "E", EventDims::default());

        // a virtual warehause that still holds stock: delete is blocked
        let mut blocked = warehause(
            &w,
            &wdfn,
            WarehausePatch {
                is_virtual: Some(true),
                ..WarehausePatch::default()
            },
        );
        stock(&w, &blocked, &pdfn, 3.0);
        blocked.status = Status::Destroy;
        w.yard.save(&mut blocked).unwrap();

        // a virtual product ready for collection
        let mut dead_product = w
            .ledger
            .create_instance(
                pdfn.id(),
                &ProductPatch {
                    is_virtual: Some(true),
                    ..ProductPatch::default()
                },
                None,
            )
            .unwrap();
        dead_product.status = Status::Destroy;
        w.ledger.save(&mut dead_product).unwrap();

        // a virtual event ready for collection
        let mut dead_event = w
            .processor
            .create_instance(
                edfn.id(),
                &EventPatch {
                    is_virtual: Some(true),
                    ..EventPatch::default()
                },
                None,
            )
            .unwrap()
            .unwrap();
        dead_event.status = Status::Destroy;
        w.processor.save(&mut dead_event).unwrap();

        // a non-virtual destroyed product must be left alone
        let mut bystander = w
            .ledger
            .create_instance(pdfn.id(), &ProductPatch::default(), None)
            .unwrap();
        bystander.status = Status::Destroy;
        w.ledger.save(&mut bystander).unwrap();

        let report = w.gc.sweep().unwrap();
        assert_eq!(report.collected, 2); // product + event
        assert_eq!(report.skipped, 1); // warehause with stock

        assert!(ProductStore::get(&*w.store, dead_product.id())
            .unwrap()
            .is_none());
        assert!(EventStore::get(&*w.store, dead_event.id())
            .unwrap()
            .is_none());
        assert!(WarehauseStore::get(&*w.store, blocked.id())
            .unwrap()
            .is_some());
        assert!(ProductStore::get(&*w.store, bystander.id())
            .unwrap()
            .is_some());

        // releasing the stock lets the next sweep finish the job
        ProductStore::delete(
            &*w.store,
            w.yard.get_stock(blocked.id(), pdfn.id(), true).unwrap()[0].id(),
        )
        .unwrap();
        let report = w.gc.sweep().unwrap();
        assert_eq!(report.collected, 1);
        assert!(WarehauseStore::get(&*w.store, blocked.id())
            .unwrap()
            .is_none());
    }

    // --- save discipline ----------------------------------------------------

    #[test]
    fn schema_violation_blocks_save_and_post_hook_sees_it() {
        #[derive(Default)]
        struct Recording {
            outcomes: Mutex<Vec<Option<&'static str>>>,
        }

        impl warehause_ledger::ProductHook for Recording {
            fn post_save(&self, _product: &Product, outcome: Option<&DomainError>) {
                self.outcomes
                    .lock()
                    .unwrap()
                    .push(outcome.map(|e| e.code()));
            }
        }

        let w = world();
        let hook = Arc::new(Recording::default());
        let ledger = Ledger::new(
            w.store.clone() as Arc<dyn ProductStore>,
            w.store.clone() as Arc<dyn ProductDefStore>,
            w.locks.clone() as Arc<dyn LockManager>,
        )
        .with_hooks(hook.clone());

        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let mut product = ledger
            .create_instance(
                pdfn.id(),
                &ProductPatch {
                    schema: Some(json!({"type": "object", "required": ["lot"]})),
                    options: Some(json!({"batch": 1})),
                    ..ProductPatch::default()
                },
                None,
            )
            .unwrap();

        let err = ledger.save(&mut product).unwrap_err();
        assert_eq!(err.code(), "schema_violation");
        assert!(!product.is_saved());

        product.meta.set_option("lot", Some(json!("L-77")));
        ledger.save(&mut product).unwrap();

        let outcomes = hook.outcomes.lock().unwrap();
        assert_eq!(outcomes.as_slice(), &[Some("schema_violation"), None]);
    }

    #[test]
    fn updated_at_is_stamped_from_the_second_save_on() {
        let w = world();
        let pdfn = product_def(&w, "P-SKU", ProductDims::default());
        let mut product = w
            .ledger
            .create_instance(pdfn.id(), &ProductPatch::default(), None)
            .unwrap();

        w.ledger.save(&mut product).unwrap();
        assert!(product.meta.created_at.is_some());
        assert!(product.meta.updated_at.is_none());

        w.ledger.save(&mut product).unwrap();
        assert!(product.meta.updated_at.is_some());
    }
}
