//! EventTarget - worker 実装が共有するハンドラ／listener テーブル
//!
//! # 学習ポイント
//! - ロックの中でユーザーのコールバックを呼ばない
//!   （コールバックが `release` → 別タスクの登録、と再入してくるため）
//! - listener の同一性は `(event_type, listener, capture)`
//! - dispatch 中に外された listener は呼ばない（呼ぶ直前に serial で再確認）

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{EventType, Listener, ListenerOptions, WorkerEvent};

/// A callback plus the serial it was installed under.
#[derive(Debug, Clone)]
struct Entry {
    serial: u64,
    listener: Listener,
}

#[derive(Debug)]
struct Registered {
    event_type: EventType,
    entry: Entry,
    options: ListenerOptions,
}

impl Registered {
    fn matches(&self, event_type: &EventType, listener: &Listener, capture: bool) -> bool {
        self.event_type == *event_type
            && self.entry.listener == *listener
            && self.options.capture == capture
    }
}

#[derive(Debug, Default)]
struct Slots {
    next_serial: u64,
    on_message: Option<Entry>,
    on_error: Option<Entry>,
    listeners: Vec<Registered>,
}

impl Slots {
    fn entry(&mut self, listener: Listener) -> Entry {
        self.next_serial += 1;
        Entry {
            serial: self.next_serial,
            listener,
        }
    }

    /// Whether the callback installed under `serial` is still installed.
    fn is_live(&self, serial: u64) -> bool {
        let in_slot = |slot: &Option<Entry>| slot.as_ref().is_some_and(|e| e.serial == serial);
        in_slot(&self.on_message)
            || in_slot(&self.on_error)
            || self.listeners.iter().any(|r| r.entry.serial == serial)
    }
}

/// Handler slots plus a listener table, with DOM-style semantics.
#[derive(Debug, Default)]
pub struct EventTarget {
    slots: Mutex<Slots>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_message(&self) -> Option<Listener> {
        self.lock().on_message.as_ref().map(|e| e.listener.clone())
    }

    pub fn set_on_message(&self, handler: Option<Listener>) {
        let mut slots = self.lock();
        let entry = handler.map(|h| slots.entry(h));
        slots.on_message = entry;
    }

    pub fn on_error(&self) -> Option<Listener> {
        self.lock().on_error.as_ref().map(|e| e.listener.clone())
    }

    pub fn set_on_error(&self, handler: Option<Listener>) {
        let mut slots = self.lock();
        let entry = handler.map(|h| slots.entry(h));
        slots.on_error = entry;
    }

    /// Adding the same `(event_type, listener, capture)` twice is ignored.
    pub fn add_listener(&self, event_type: &EventType, listener: Listener, options: ListenerOptions) {
        let mut slots = self.lock();
        if slots
            .listeners
            .iter()
            .any(|r| r.matches(event_type, &listener, options.capture))
        {
            return;
        }
        let entry = slots.entry(listener);
        slots.listeners.push(Registered {
            event_type: event_type.clone(),
            entry,
            options,
        });
    }

    /// Removing a listener that is not registered is a no-op.
    pub fn remove_listener(&self, event_type: &EventType, listener: &Listener, options: ListenerOptions) {
        self.lock()
            .listeners
            .retain(|r| !r.matches(event_type, listener, options.capture));
    }

    pub fn has_listener(&self, event_type: &EventType, listener: &Listener) -> bool {
        self.lock()
            .listeners
            .iter()
            .any(|r| r.event_type == *event_type && r.entry.listener == *listener)
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Deliver `event` to the matching slot handler, then to every listener
    /// registered for its type, in registration order. Returns how many
    /// callbacks ran.
    ///
    /// A callback removed or replaced by an earlier callback of the same
    /// dispatch is skipped.
    pub fn dispatch(&self, event: &WorkerEvent) -> usize {
        let event_type = event.event_type();
        let targets: Vec<Entry> = {
            let slots = self.lock();
            let slot = match event {
                WorkerEvent::Message(_) => slots.on_message.clone(),
                WorkerEvent::Error(_) => slots.on_error.clone(),
                WorkerEvent::Custom { .. } => None,
            };
            slot.into_iter()
                .chain(
                    slots
                        .listeners
                        .iter()
                        .filter(|r| r.event_type == event_type)
                        .map(|r| r.entry.clone()),
                )
                .collect()
        };

        let mut ran = 0;
        for target in targets {
            if !self.lock().is_live(target.serial) {
                continue;
            }
            target.listener.call(event);
            ran += 1;
        }
        ran
    }
}
