#![forbid(unsafe_code)]

//! Window Slot Manager.
//!
//! Several same-origin windows share one durable store. Each window claims a
//! numbered slot and keeps a liveness lease on it by heartbeat; per-slot
//! state is namespaced by slot id so layouts never collide.
//!
//! # Liveness
//!
//! A slot is **busy** when its lease belongs to another owner and
//! `now - last_seen <= ttl`. Once the lease is older than the TTL any window
//! may take the slot over.
//!
//! # Invariants
//!
//! - Slot `"0"` always exists and is never removed.
//! - A window never claims a slot that is busy.
//! - A window whose lease was taken over drops its slot on the next
//!   heartbeat and stops reporting it as current.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use paneldeck_core::clock::Clock;
use paneldeck_core::storage::{SafeStore, SharedStore};
use serde::{Deserialize, Serialize};

use crate::keys::{DEFAULT_SLOT_ID, SlotKeys, namespaced_key, slot_order};

/// Default lease lifetime.
pub const DEFAULT_SLOT_TTL_MS: u64 = 15_000;

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Slot manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotConfig {
    pub ttl_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Packaged single-window runtime: owner id and slot choice persist
    /// durably instead of per tab.
    pub single_instance: bool,
    pub keys: SlotKeys,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_SLOT_TTL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            single_instance: false,
            keys: SlotKeys::default(),
        }
    }
}

/// Liveness lease stored in the active map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLease {
    pub owner_id: String,
    pub last_seen: u64,
}

/// Row returned by [`WindowSlotManager::list_window_slots`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSlotInfo {
    pub slot_id: String,
    pub name: Option<String>,
    pub owner_id: Option<String>,
    pub last_seen: Option<u64>,
    pub busy: bool,
    pub current: bool,
}

/// Why a slot operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRefusal {
    DefaultSlot,
    CurrentSlot,
    Busy,
    UnknownSlot,
}

impl fmt::Display for SlotRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultSlot => write!(f, "the default slot cannot be removed"),
            Self::CurrentSlot => write!(f, "the slot is in use by this window"),
            Self::Busy => write!(f, "the slot is in use by another window"),
            Self::UnknownSlot => write!(f, "no such slot"),
        }
    }
}

/// Result of [`WindowSlotManager::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heartbeat {
    /// Interval not elapsed, or no slot is held.
    NotDue,
    Sent,
    /// Another window took the slot over after this window's lease
    /// expired. The slot is no longer current; the window must reload.
    Lost { slot_id: String },
}

impl Heartbeat {
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Coordinates slot ownership for one window.
pub struct WindowSlotManager {
    durable: SafeStore,
    tab: SafeStore,
    clock: Rc<dyn Clock>,
    config: SlotConfig,
    owner_id: String,
    current: Option<String>,
    last_heartbeat: Option<u64>,
}

impl fmt::Debug for WindowSlotManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowSlotManager")
            .field("owner_id", &self.owner_id)
            .field("current", &self.current)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WindowSlotManager {
    /// Create a manager over the shared `durable` store and this window's
    /// `tab` store. Loads or generates the owner id.
    #[must_use]
    pub fn new(durable: SharedStore, tab: SharedStore, clock: Rc<dyn Clock>, config: SlotConfig) -> Self {
        let durable = SafeStore::new(durable);
        let tab = SafeStore::new(tab);
        let owner_store = if config.single_instance { &durable } else { &tab };
        let owner_id = match owner_store.get(&config.keys.owner) {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                owner_store.set(&config.keys.owner, &id);
                id
            }
        };
        Self {
            durable,
            tab,
            clock,
            config,
            owner_id,
            current: None,
            last_heartbeat: None,
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Slot claimed by this window, if resolved.
    #[must_use]
    pub fn current_slot(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Per-slot key for `base` under the current slot (default slot if
    /// unresolved).
    #[must_use]
    pub fn namespaced_key(&self, base: &str) -> String {
        namespaced_key(base, self.current.as_deref().unwrap_or(DEFAULT_SLOT_ID))
    }

    // ---------------------------------------------------------------------
    // Registry access
    // ---------------------------------------------------------------------

    fn choice_store(&self) -> &SafeStore {
        if self.config.single_instance {
            &self.durable
        } else {
            &self.tab
        }
    }

    /// Known slot ids in numeric order; always contains the default slot.
    #[must_use]
    pub fn slot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .durable
            .get_json(&self.config.keys.slots)
            .unwrap_or_default();
        if !ids.iter().any(|id| id == DEFAULT_SLOT_ID) {
            ids.push(DEFAULT_SLOT_ID.to_owned());
        }
        ids.sort_by_key(|id| slot_order(id));
        ids.dedup();
        ids
    }

    fn save_slot_ids(&self, ids: &[String]) {
        self.durable.set_json(&self.config.keys.slots, &ids);
    }

    fn leases(&self) -> BTreeMap<String, SlotLease> {
        self.durable
            .get_json(&self.config.keys.active)
            .unwrap_or_default()
    }

    fn save_leases(&self, leases: &BTreeMap<String, SlotLease>) {
        self.durable.set_json(&self.config.keys.active, leases);
    }

    fn names(&self) -> BTreeMap<String, String> {
        self.durable
            .get_json(&self.config.keys.names)
            .unwrap_or_default()
    }

    fn lease_is_busy(&self, lease: Option<&SlotLease>, now: u64) -> bool {
        lease.is_some_and(|lease| {
            lease.owner_id != self.owner_id && now.saturating_sub(lease.last_seen) <= self.config.ttl_ms
        })
    }

    /// Whether another live window holds `slot_id`.
    #[must_use]
    pub fn is_busy(&self, slot_id: &str) -> bool {
        let now = self.clock.now_ms();
        self.lease_is_busy(self.leases().get(slot_id), now)
    }

    // ---------------------------------------------------------------------
    // Claiming
    // ---------------------------------------------------------------------

    /// Resolve this window's slot, claiming one if needed.
    ///
    /// Prefers the previously recorded slot if it is still ours or
    /// unclaimed; otherwise the lowest-numbered free slot; otherwise a new
    /// slot.
    pub fn get_client_window_id(&mut self) -> String {
        if let Some(current) = self.current.clone() {
            return current;
        }
        let now = self.clock.now_ms();
        let leases = self.leases();
        let ids = self.slot_ids();

        let recorded = self
            .choice_store()
            .get(&self.config.keys.current)
            .filter(|id| ids.contains(id) && !self.lease_is_busy(leases.get(id), now));

        let slot_id = recorded
            .or_else(|| {
                ids.iter()
                    .find(|id| !self.lease_is_busy(leases.get(*id), now))
                    .cloned()
            })
            .unwrap_or_else(|| self.create_window_slot());

        self.claim(&slot_id);
        slot_id
    }

    fn claim(&mut self, slot_id: &str) {
        let now = self.clock.now_ms();
        let mut ids = self.slot_ids();
        if !ids.iter().any(|id| id == slot_id) {
            ids.push(slot_id.to_owned());
            ids.sort_by_key(|id| slot_order(id));
            self.save_slot_ids(&ids);
        }
        let mut leases = self.leases();
        let _ = leases.insert(
            slot_id.to_owned(),
            SlotLease {
                owner_id: self.owner_id.clone(),
                last_seen: now,
            },
        );
        self.save_leases(&leases);
        self.choice_store().set(&self.config.keys.current, slot_id);
        self.current = Some(slot_id.to_owned());
        self.last_heartbeat = Some(now);
        tracing::info!(
            message = "slot.claimed",
            slot_id,
            owner_id = %self.owner_id,
        );
    }

    /// Refresh this window's lease. Returns `false` if none is claimed or
    /// the slot was lost to another window, in which case it is dropped.
    pub fn heartbeat(&mut self) -> bool {
        let Some(slot_id) = self.current.clone() else {
            return false;
        };
        let now = self.clock.now_ms();
        let mut leases = self.leases();
        if self.lease_is_busy(leases.get(&slot_id), now) {
            tracing::warn!(message = "slot.lost", slot_id = %slot_id);
            self.current = None;
            self.last_heartbeat = None;
            return false;
        }
        let _ = leases.insert(
            slot_id,
            SlotLease {
                owner_id: self.owner_id.clone(),
                last_seen: now,
            },
        );
        self.save_leases(&leases);
        self.last_heartbeat = Some(now);
        true
    }

    /// Heartbeat if the interval has elapsed.
    pub fn tick(&mut self) -> Heartbeat {
        let Some(slot_id) = self.current.clone() else {
            return Heartbeat::NotDue;
        };
        let now = self.clock.now_ms();
        let due = self
            .last_heartbeat
            .is_none_or(|last| now.saturating_sub(last) >= self.config.heartbeat_interval_ms);
        if !due {
            Heartbeat::NotDue
        } else if self.heartbeat() {
            Heartbeat::Sent
        } else {
            Heartbeat::Lost { slot_id }
        }
    }

    /// Drop this window's lease (page unload). The recorded choice is kept
    /// so a reload reclaims the same slot.
    pub fn release(&mut self) {
        let Some(slot_id) = self.current.take() else {
            return;
        };
        let mut leases = self.leases();
        if leases
            .get(&slot_id)
            .is_some_and(|lease| lease.owner_id == self.owner_id)
        {
            let _ = leases.remove(&slot_id);
            self.save_leases(&leases);
        }
        self.last_heartbeat = None;
        tracing::info!(message = "slot.released", slot_id = %slot_id);
    }

    /// Switch this window to `slot_id`. Refused if another live window
    /// holds it. The caller reloads to pick up the new namespace.
    pub fn set_client_window_id(&mut self, slot_id: &str) -> Result<(), SlotRefusal> {
        if self.current.as_deref() == Some(slot_id) {
            return Ok(());
        }
        if self.is_busy(slot_id) {
            return Err(SlotRefusal::Busy);
        }
        self.release();
        self.claim(slot_id);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Slot registry maintenance
    // ---------------------------------------------------------------------

    /// Allocate the next unused numeric slot id.
    pub fn create_window_slot(&mut self) -> String {
        let mut ids = self.slot_ids();
        let next = ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max.saturating_add(1));
        let slot_id = next.to_string();
        ids.push(slot_id.clone());
        self.save_slot_ids(&ids);
        tracing::debug!(message = "slot.created", slot_id = %slot_id);
        slot_id
    }

    /// Remove a slot and its per-slot state.
    ///
    /// Refused for the default slot, this window's slot, slots held by
    /// another live window, and unknown slots.
    pub fn remove_window_slot(&mut self, slot_id: &str) -> Result<(), SlotRefusal> {
        if slot_id == DEFAULT_SLOT_ID {
            return Err(SlotRefusal::DefaultSlot);
        }
        if self.current.as_deref() == Some(slot_id) {
            return Err(SlotRefusal::CurrentSlot);
        }
        let mut ids = self.slot_ids();
        if !ids.iter().any(|id| id == slot_id) {
            return Err(SlotRefusal::UnknownSlot);
        }
        if self.is_busy(slot_id) {
            return Err(SlotRefusal::Busy);
        }

        ids.retain(|id| id != slot_id);
        self.save_slot_ids(&ids);
        let mut leases = self.leases();
        if leases.remove(slot_id).is_some() {
            self.save_leases(&leases);
        }
        let mut names = self.names();
        if names.remove(slot_id).is_some() {
            self.durable.set_json(&self.config.keys.names, &names);
        }
        for base in &self.config.keys.scoped {
            self.durable.remove(&namespaced_key(base, slot_id));
        }
        tracing::debug!(message = "slot.removed", slot_id);
        Ok(())
    }

    /// Set or clear a slot's display name.
    pub fn set_window_slot_name(&mut self, slot_id: &str, name: Option<&str>) -> Result<(), SlotRefusal> {
        if !self.slot_ids().iter().any(|id| id == slot_id) {
            return Err(SlotRefusal::UnknownSlot);
        }
        let mut names = self.names();
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let _ = names.insert(slot_id.to_owned(), name.to_owned());
            }
            None => {
                let _ = names.remove(slot_id);
            }
        }
        self.durable.set_json(&self.config.keys.names, &names);
        Ok(())
    }

    /// Every slot with its name and liveness, in numeric order.
    #[must_use]
    pub fn list_window_slots(&self) -> Vec<WindowSlotInfo> {
        let now = self.clock.now_ms();
        let leases = self.leases();
        let names = self.names();
        self.slot_ids()
            .into_iter()
            .map(|slot_id| {
                let lease = leases.get(&slot_id);
                WindowSlotInfo {
                    name: names.get(&slot_id).cloned(),
                    owner_id: lease.map(|l| l.owner_id.clone()),
                    last_seen: lease.map(|l| l.last_seen),
                    busy: self.lease_is_busy(lease, now),
                    current: self.current.as_deref() == Some(slot_id.as_str()),
                    slot_id,
                }
            })
            .collect()
    }

    /// Copy legacy un-namespaced per-slot state into the default slot once.
    /// Returns how many keys were copied.
    pub fn migrate_legacy(&self) -> usize {
        let marker = &self.config.keys.migration_marker;
        if self.durable.get(marker).is_some() {
            return 0;
        }
        let mut copied = 0;
        for base in &self.config.keys.scoped {
            let target = namespaced_key(base, DEFAULT_SLOT_ID);
            if let Some(value) = self.durable.get(base)
                && self.durable.get(&target).is_none()
            {
                self.durable.set(&target, &value);
                copied += 1;
            }
        }
        self.durable.set(marker, "1");
        if copied > 0 {
            tracing::info!(message = "slot.legacy_migrated", copied);
        }
        copied
    }

    /// Durable store handle (shared by every window).
    #[must_use]
    pub fn durable_store(&self) -> &SafeStore {
        &self.durable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneldeck_core::clock::ManualClock;
    use paneldeck_core::storage::{KeyValueStore, MemoryStore};

    fn window(durable: &MemoryStore, clock: &ManualClock) -> WindowSlotManager {
        WindowSlotManager::new(
            durable.shared(),
            MemoryStore::new().shared(),
            Rc::new(clock.clone()),
            SlotConfig::default(),
        )
    }

    #[test]
    fn first_window_claims_default_slot() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let mut w = window(&durable, &clock);
        assert_eq!(w.get_client_window_id(), "0");
        assert_eq!(w.namespaced_key("paneldeck.layout"), "paneldeck.layout:0");
    }

    #[test]
    fn owner_id_is_stable_per_tab() {
        let durable = MemoryStore::new();
        let tab = MemoryStore::new();
        let clock = ManualClock::new(0);
        let a = WindowSlotManager::new(durable.shared(), tab.shared(), Rc::new(clock.clone()), SlotConfig::default());
        let b = WindowSlotManager::new(durable.shared(), tab.shared(), Rc::new(clock), SlotConfig::default());
        assert_eq!(a.owner_id(), b.owner_id());
        assert_eq!(a.owner_id().len(), 36);
    }

    #[test]
    fn single_instance_persists_owner_durably() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let config = SlotConfig {
            single_instance: true,
            ..SlotConfig::default()
        };
        let a = WindowSlotManager::new(durable.shared(), MemoryStore::new().shared(), Rc::new(clock.clone()), config.clone());
        let b = WindowSlotManager::new(durable.shared(), MemoryStore::new().shared(), Rc::new(clock), config);
        assert_eq!(a.owner_id(), b.owner_id());
    }

    #[test]
    fn create_allocates_next_numeric_id() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut w = window(&durable, &clock);
        assert_eq!(w.create_window_slot(), "1");
        assert_eq!(w.create_window_slot(), "2");
        assert_eq!(w.slot_ids(), vec!["0", "1", "2"]);
    }

    #[test]
    fn remove_refuses_default_and_current() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut w = window(&durable, &clock);
        let slot = w.create_window_slot();
        w.set_client_window_id(&slot).unwrap();
        assert_eq!(w.remove_window_slot("0"), Err(SlotRefusal::DefaultSlot));
        assert_eq!(w.remove_window_slot(&slot), Err(SlotRefusal::CurrentSlot));
        assert_eq!(w.remove_window_slot("42"), Err(SlotRefusal::UnknownSlot));
    }

    #[test]
    fn remove_clears_slot_namespaces() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut w = window(&durable, &clock);
        w.get_client_window_id();
        let slot = w.create_window_slot();
        durable.set("paneldeck.layout:1", "{}").unwrap();
        durable.set("paneldeck.focusHistory:1", "[]").unwrap();
        w.set_window_slot_name(&slot, Some("Research")).unwrap();

        w.remove_window_slot(&slot).unwrap();
        assert!(!durable.keys().iter().any(|k| k.ends_with(":1")));
        assert_eq!(w.slot_ids(), vec!["0"]);
        assert!(w.list_window_slots().iter().all(|s| s.name.is_none()));
    }

    #[test]
    fn heartbeat_tick_respects_interval() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut w = window(&durable, &clock);
        assert_eq!(w.tick(), Heartbeat::NotDue);
        w.get_client_window_id();
        clock.advance(1_000);
        assert_eq!(w.tick(), Heartbeat::NotDue);
        clock.advance(4_000);
        assert_eq!(w.tick(), Heartbeat::Sent);
    }

    #[test]
    fn release_frees_slot_for_others() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut a = window(&durable, &clock);
        let mut b = window(&durable, &clock);
        assert_eq!(a.get_client_window_id(), "0");
        a.release();
        assert_eq!(b.get_client_window_id(), "0");
    }

    #[test]
    fn names_are_trimmed_and_clearable() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mut w = window(&durable, &clock);
        w.set_window_slot_name("0", Some("  Main  ")).unwrap();
        assert_eq!(w.list_window_slots()[0].name.as_deref(), Some("Main"));
        w.set_window_slot_name("0", Some("   ")).unwrap();
        assert_eq!(w.list_window_slots()[0].name, None);
        assert_eq!(w.set_window_slot_name("9", Some("x")), Err(SlotRefusal::UnknownSlot));
    }

    #[test]
    fn legacy_state_migrates_once() {
        let durable = MemoryStore::new();
        let clock = ManualClock::new(0);
        durable.set("paneldeck.layout", "legacy").unwrap();
        let w = window(&durable, &clock);
        assert_eq!(w.migrate_legacy(), 1);
        assert_eq!(durable.get("paneldeck.layout:0").unwrap().as_deref(), Some("legacy"));
        durable.set("paneldeck.focusHistory", "[]").unwrap();
        assert_eq!(w.migrate_legacy(), 0);
    }
}
