//! Typed, prioritised publish/subscribe used between the CPU core and its
//! collaborators (memory modules, debuggers, front-ends).
//!
//! Dispatch is single-threaded and synchronous: [`Transceiver::emit`] runs
//! every matching listener before returning. Listeners are ordered by
//! ascending sub-priority (ties broken by registration order). A listener
//! may emit follow-up events through the [`Emitter`] it receives; those
//! queue behind the event currently being dispatched and are drained before
//! `emit` returns.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::cpu::addressing::Addressing;
use crate::cpu::opcodes::Instruction;
use crate::cpu::registers::{Register, Registers};

/// An event produced by the CPU core.
#[derive(Clone, Debug)]
pub enum Event {
    /// Bus request: read one byte at `addr`.
    MemoryRead { addr: u16 },
    /// Bus request: write `data` at `addr`.
    MemoryWrite { addr: u16, data: u8 },
    /// A watched register changed value.
    RegisterUpdate { register: Register, value: u16 },
    /// Full register snapshot at an instruction boundary.
    RegistersUpdate { registers: Registers },
    /// A fetch began at `pc`.
    InstructionBegin { pc: u16 },
    /// The opcode was recognised.
    InstructionFetched { instruction: &'static Instruction },
    /// Operand addressing has been resolved; execution begins.
    InstructionDecoded {
        instruction: &'static Instruction,
        addressing: Addressing,
    },
    /// The current instruction retired.
    InstructionFinish,
    /// The reset sequence completed.
    ResetFinish,
    /// The CPU entered the terminal fail state.
    Fail,
    /// Execution reached a host-function address; the host must reply with
    /// a function result carrying the registers to resume with.
    Function { pc: u16, registers: Registers },
}

/// Discriminant used for listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    MemoryRead,
    MemoryWrite,
    RegisterUpdate,
    RegistersUpdate,
    InstructionBegin,
    InstructionFetched,
    InstructionDecoded,
    InstructionFinish,
    ResetFinish,
    Fail,
    Function,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MemoryRead { .. } => EventKind::MemoryRead,
            Event::MemoryWrite { .. } => EventKind::MemoryWrite,
            Event::RegisterUpdate { .. } => EventKind::RegisterUpdate,
            Event::RegistersUpdate { .. } => EventKind::RegistersUpdate,
            Event::InstructionBegin { .. } => EventKind::InstructionBegin,
            Event::InstructionFetched { .. } => EventKind::InstructionFetched,
            Event::InstructionDecoded { .. } => EventKind::InstructionDecoded,
            Event::InstructionFinish => EventKind::InstructionFinish,
            Event::ResetFinish => EventKind::ResetFinish,
            Event::Fail => EventKind::Fail,
            Event::Function { .. } => EventKind::Function,
        }
    }
}

/// Handle a listener uses to queue follow-up emissions.
pub struct Emitter {
    queued: Vec<Event>,
}

impl Emitter {
    /// Queue `event` behind the one currently being dispatched.
    pub fn emit(&mut self, event: Event) {
        self.queued.push(event);
    }
}

/// One-shot completion handle returned by the await-style helpers.
///
/// Resolved with the payload of the next matching emission; `take()` hands
/// the payload out at most once.
#[derive(Clone)]
pub struct EventHandle {
    slot: Rc<RefCell<Option<Event>>>,
}

impl EventHandle {
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn take(&self) -> Option<Event> {
        self.slot.borrow_mut().take()
    }
}

/// Identifies a registered listener so it can be removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&Event, &mut Emitter)>;

struct Entry {
    id: ListenerId,
    kind: EventKind,
    priority: i32,
    seq: u64,
    once: bool,
    callback: Callback,
}

/// The event transceiver. See module docs for the dispatch contract.
#[derive(Default)]
pub struct Transceiver {
    entries: Vec<Entry>,
    queue: VecDeque<Event>,
    dispatching: bool,
    next_id: u64,
}

impl Transceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permanent listener for `kind` at the given sub-priority.
    pub fn on<F>(&mut self, kind: EventKind, priority: i32, callback: F) -> ListenerId
    where
        F: FnMut(&Event, &mut Emitter) + 'static,
    {
        self.register(kind, priority, false, Box::new(callback))
    }

    /// Register a listener that fires exactly once, then unregisters itself.
    pub fn once<F>(&mut self, kind: EventKind, priority: i32, callback: F) -> ListenerId
    where
        F: FnMut(&Event, &mut Emitter) + 'static,
    {
        self.register(kind, priority, true, Box::new(callback))
    }

    /// Remove a listener. Removing an already-fired once listener is a no-op.
    pub fn off(&mut self, id: ListenerId) {
        self.entries.retain(|e| e.id != id);
    }

    /// One-shot handle resolved with the next `kind` event.
    pub fn next(&mut self, kind: EventKind) -> EventHandle {
        self.next_matching(kind, |_| true)
    }

    /// One-shot handle resolved with the next `kind` event whose payload
    /// satisfies `predicate`. Non-matching emissions leave the listener in
    /// place.
    pub fn next_matching<P>(&mut self, kind: EventKind, predicate: P) -> EventHandle
    where
        P: Fn(&Event) -> bool + 'static,
    {
        let slot: Rc<RefCell<Option<Event>>> = Rc::new(RefCell::new(None));
        let filled = slot.clone();
        // Cannot use a once listener: the predicate may reject emissions,
        // and a rejected emission must not consume the registration.
        let resolved = Rc::new(RefCell::new(false));
        let resolved_inner = resolved.clone();
        self.on(kind, i32::MAX, move |event, _| {
            if *resolved_inner.borrow() || !predicate(event) {
                return;
            }
            *resolved_inner.borrow_mut() = true;
            *filled.borrow_mut() = Some(event.clone());
        });
        EventHandle { slot }
    }

    /// Emit `event`, then return a handle awaiting the next `await_kind`
    /// emission matching `predicate`.
    pub fn emit_then_next<P>(
        &mut self,
        event: Event,
        await_kind: EventKind,
        predicate: P,
    ) -> EventHandle
    where
        P: Fn(&Event) -> bool + 'static,
    {
        let handle = self.next_matching(await_kind, predicate);
        self.emit(event);
        handle
    }

    /// Dispatch `event` to all matching listeners, in ascending priority
    /// order, before returning. Events queued by listeners are drained in
    /// FIFO order after the current event's listeners have all run.
    pub fn emit(&mut self, event: Event) {
        self.queue.push_back(event);
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(current) = self.queue.pop_front() {
            self.dispatch(&current);
        }
        self.dispatching = false;
    }

    fn register(
        &mut self,
        kind: EventKind,
        priority: i32,
        once: bool,
        callback: Callback,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        let seq = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            kind,
            priority,
            seq,
            once,
            callback,
        });
        id
    }

    fn dispatch(&mut self, event: &Event) {
        let kind = event.kind();
        // Snapshot the matching set up front so the dispatch order stays
        // stable while callbacks run.
        let mut matching: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == kind)
            .map(|(i, _)| i)
            .collect();
        matching.sort_by_key(|&i| (self.entries[i].priority, self.entries[i].seq));

        let mut fired_once: Vec<ListenerId> = Vec::new();
        let mut sink = Emitter { queued: Vec::new() };
        let ids: Vec<ListenerId> = matching.iter().map(|&i| self.entries[i].id).collect();
        for id in ids {
            // Look the entry up again by id: an earlier callback may have
            // removed it.
            let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
                continue;
            };
            let once = self.entries[pos].once;
            let mut callback = std::mem::replace(
                &mut self.entries[pos].callback,
                Box::new(|_: &Event, _: &mut Emitter| {}),
            );
            callback(event, &mut sink);
            if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
                self.entries[pos].callback = callback;
            }
            if once {
                fired_once.push(id);
            }
        }
        for id in fired_once {
            self.off(id);
        }
        for queued in sink.queued {
            self.queue.push_back(queued);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn log_listener(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> impl FnMut(&Event, &mut Emitter) + use<> {
        let log = log.clone();
        move |_, _| log.borrow_mut().push(tag.to_string())
    }

    #[test]
    fn listeners_run_in_priority_order() {
        let mut tx = Transceiver::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        tx.on(EventKind::ResetFinish, 10, log_listener(&log, "late"));
        tx.on(EventKind::ResetFinish, -5, log_listener(&log, "early"));
        tx.on(EventKind::ResetFinish, 0, log_listener(&log, "middle"));
        tx.emit(Event::ResetFinish);
        assert_eq!(*log.borrow(), ["early", "middle", "late"]);
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let mut tx = Transceiver::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        tx.once(EventKind::Fail, 0, move |_, _| *c.borrow_mut() += 1);
        tx.emit(Event::Fail);
        tx.emit(Event::Fail);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn kinds_are_filtered() {
        let mut tx = Transceiver::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        tx.on(EventKind::MemoryRead, 0, move |_, _| *c.borrow_mut() += 1);
        tx.emit(Event::MemoryWrite { addr: 0, data: 0 });
        assert_eq!(*count.borrow(), 0);
        tx.emit(Event::MemoryRead { addr: 0x1234 });
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn next_resolves_with_payload() {
        let mut tx = Transceiver::new();
        let handle = tx.next(EventKind::MemoryRead);
        assert!(!handle.is_resolved());
        tx.emit(Event::MemoryRead { addr: 0xBEEF });
        assert!(handle.is_resolved());
        match handle.take() {
            Some(Event::MemoryRead { addr }) => assert_eq!(addr, 0xBEEF),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(handle.take().is_none(), "payload is handed out once");
    }

    #[test]
    fn next_matching_skips_rejected_payloads() {
        let mut tx = Transceiver::new();
        let handle = tx.next_matching(EventKind::MemoryRead, |e| {
            matches!(e, Event::MemoryRead { addr } if *addr == 2)
        });
        tx.emit(Event::MemoryRead { addr: 1 });
        assert!(!handle.is_resolved());
        tx.emit(Event::MemoryRead { addr: 2 });
        assert!(handle.is_resolved());
    }

    #[test]
    fn listener_emissions_queue_behind_current_event() {
        let mut tx = Transceiver::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        tx.on(EventKind::InstructionFinish, 0, move |_, emitter| {
            l.borrow_mut().push("finish-first".to_string());
            emitter.emit(Event::Fail);
        });
        tx.on(EventKind::InstructionFinish, 5, log_listener(&log, "finish-second"));
        tx.on(EventKind::Fail, 0, log_listener(&log, "fail"));
        tx.emit(Event::InstructionFinish);
        // The queued Fail event must not interleave with the remaining
        // InstructionFinish listeners.
        assert_eq!(*log.borrow(), ["finish-first", "finish-second", "fail"]);
    }

    #[test]
    fn emit_then_next_awaits_the_response() {
        let mut tx = Transceiver::new();
        // A responder that answers memory requests by queueing a register
        // announcement, standing in for a collaborator round-trip.
        tx.on(EventKind::MemoryRead, 0, |event, emitter| {
            if let Event::MemoryRead { addr } = *event {
                emitter.emit(Event::RegisterUpdate {
                    register: crate::cpu::registers::Register::Pc,
                    value: addr,
                });
            }
        });
        let handle = tx.emit_then_next(
            Event::MemoryRead { addr: 0x1234 },
            EventKind::RegisterUpdate,
            |e| matches!(e, Event::RegisterUpdate { value, .. } if *value == 0x1234),
        );
        assert!(handle.is_resolved(), "response arrived within the emit");
    }

    #[test]
    fn off_removes_listener() {
        let mut tx = Transceiver::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = tx.on(EventKind::Fail, 0, move |_, _| *c.borrow_mut() += 1);
        tx.off(id);
        tx.emit(Event::Fail);
        assert_eq!(*count.borrow(), 0);
    }
}
