//! End-to-end: two windows on one origin, restore across reload, server
//! messages feeding the sidebar, and the shortcut gate.

use std::rc::Rc;

use paneldeck::core::PreferenceKey;
use paneldeck::host::ServerOutcome;
use paneldeck::host::testing::{CallLog, RecordingModule, RecordingSink};
use paneldeck::prelude::*;
use paneldeck::slots::SlotRefusal;
use paneldeck::workspace::RestoreOutcome;
use pretty_assertions::assert_eq;

struct Origin {
    durable: MemoryStore,
    clock: ManualClock,
    log: CallLog,
}

impl Origin {
    fn new() -> Self {
        Self {
            durable: MemoryStore::new(),
            clock: ManualClock::new(10_000),
            log: CallLog::default(),
        }
    }

    fn window(&self, tab: &MemoryStore) -> Workbench {
        let mut registry = PanelRegistry::new();
        for panel_type in ["sessions", "chat", "notes"] {
            registry.register(
                PanelManifest::new(panel_type, panel_type),
                RecordingModule::factory(&self.log),
            );
        }
        let env = Environment {
            durable: self.durable.shared(),
            tab: tab.shared(),
            clock: Rc::new(self.clock.clone()),
            registry,
            outbound: Rc::new(RecordingSink::default()),
            dialogs: Rc::new(NoDialogs),
        };
        Workbench::start(env, WorkbenchConfig::default())
    }
}

fn layout_chord() -> KeyEvent {
    KeyEvent::char('p').with_modifiers(Modifiers::CTRL | Modifiers::SHIFT)
}

#[test]
fn first_window_gets_default_layout_in_slot_zero() {
    let origin = Origin::new();
    let tab = MemoryStore::new();
    let wb = origin.window(&tab);

    assert_eq!(wb.slot_id(), Some("0"));
    assert_eq!(
        *wb.restore_outcome(),
        RestoreOutcome::DefaultLayout { reason: None }
    );
    let types: Vec<&str> = wb
        .workspace()
        .visible_panel_ids()
        .iter()
        .filter_map(|id| wb.workspace().panel_type(id))
        .collect();
    assert_eq!(types, vec!["sessions", "chat"]);
    wb.workspace().check_invariants().unwrap();
}

#[test]
fn second_window_does_not_collide_and_reload_restores() {
    let origin = Origin::new();
    let tab_a = MemoryStore::new();
    let tab_b = MemoryStore::new();

    let mut a = origin.window(&tab_a);
    let notes = a.open_panel("notes", OpenOptions::default()).unwrap();
    let b = origin.window(&tab_b);
    assert_eq!(a.slot_id(), Some("0"));
    assert_eq!(b.slot_id(), Some("1"));
    assert_eq!(b.workspace().panel_ids().len(), 2, "slot 1 starts from defaults");

    let before = a.workspace().visible_panel_ids();
    a.shutdown();
    let a = origin.window(&tab_a);
    assert_eq!(a.slot_id(), Some("0"));
    assert_eq!(*a.restore_outcome(), RestoreOutcome::Restored { panels: 3 });
    assert_eq!(a.workspace().visible_panel_ids(), before);
    assert_eq!(a.workspace().active_panel_id(), Some(&notes));
}

#[test]
fn unavailable_panel_type_reports_placeholder_recovery() {
    let origin = Origin::new();
    let mut wb = origin.window(&MemoryStore::new());
    let err = wb.open_panel("kanban", OpenOptions::default()).unwrap_err();
    assert_eq!(err.recovery(), Recovery::Placeholder);
}

#[test]
fn session_list_feeds_sidebar_navigation() {
    let origin = Origin::new();
    let mut wb = origin.window(&MemoryStore::new());

    let outcome = wb
        .handle_server_text(
            r#"{"type":"session_list","sessions":[{"sessionId":"s1"},{"sessionId":"s2","pinned":true}]}"#,
        )
        .unwrap();
    assert_eq!(outcome, ServerOutcome::SessionsPublished(2));
    assert_eq!(
        wb.nav().sidebar().sessions().to_vec(),
        vec!["s1".to_string(), "s2".to_string()]
    );

    let response = wb.handle_key(&KeyEvent::new(KeyCode::Tab), KeyContext::default());
    assert!(response.handled);
    assert_eq!(wb.nav().focus_zone(), Some(FocusZone::Sidebar));
    assert_eq!(wb.input_session().get().as_deref(), Some("s1"));

    wb.handle_key(&KeyEvent::new(KeyCode::Down), KeyContext::default());
    assert_eq!(wb.input_session().get().as_deref(), Some("s2"));
    assert_eq!(wb.nav().sidebar().active_session(), Some("s2"));
}

#[test]
fn malformed_server_text_is_dropped() {
    let origin = Origin::new();
    let mut wb = origin.window(&MemoryStore::new());
    let before = wb.workspace().panel_ids();

    let err = wb.handle_server_text("{not json").unwrap_err();
    assert_eq!(err.recovery(), Recovery::Drop);
    assert_eq!(wb.workspace().panel_ids(), before);
    assert!(matches!(
        wb.handle_server_text(r#"{"type":"typing"}"#),
        Ok(ServerOutcome::Ignored(kind)) if kind == "typing"
    ));
}

#[test]
fn disabled_shortcuts_veto_navigation() {
    let origin = Origin::new();
    let mut wb = origin.window(&MemoryStore::new());
    wb.resize(Rect::new(0.0, 0.0, 1000.0, 700.0));

    assert!(wb.handle_key(&layout_chord(), KeyContext::default()).handled);
    assert!(wb.nav().mode().is_some());

    wb.preferences()
        .set_bool(PreferenceKey::KeyboardShortcutsEnabled, false);
    assert!(wb.sync_shortcut_gate());
    assert_eq!(wb.nav().mode(), None);
    assert!(!wb.handle_key(&layout_chord(), KeyContext::default()).handled);
}

#[test]
fn heartbeat_and_slot_management() {
    let origin = Origin::new();
    let tab_a = MemoryStore::new();
    let mut a = origin.window(&tab_a);
    let _b = origin.window(&MemoryStore::new());

    assert_eq!(a.tick(), Heartbeat::NotDue);
    origin.clock.advance(5_000);
    assert_eq!(a.tick(), Heartbeat::Sent);

    let err = a.switch_window_slot("1").unwrap_err();
    assert!(matches!(err, Error::Slot(SlotRefusal::Busy)));
    assert_eq!(a.create_window_slot(), "2");
    a.set_window_slot_name("2", Some("  Research ")).unwrap();
    let slots = a.list_window_slots();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2].name.as_deref(), Some("Research"));

    assert!(matches!(
        a.remove_window_slot("0"),
        Err(Error::Slot(SlotRefusal::DefaultSlot))
    ));
    a.remove_window_slot("2").unwrap();
    assert_eq!(a.list_window_slots().len(), 2);
}

#[test]
fn window_whose_slot_was_taken_over_stops_persisting() {
    let origin = Origin::new();
    let tab_a = MemoryStore::new();
    let mut a = origin.window(&tab_a);
    assert_eq!(a.slot_id(), Some("0"));

    // Window a stalls past the lease TTL and another window claims slot 0.
    origin.clock.advance(16_000);
    let mut b = origin.window(&MemoryStore::new());
    assert_eq!(b.slot_id(), Some("0"));
    b.open_panel("notes", OpenOptions::default()).unwrap();
    let owned_by_b = origin.durable.get("paneldeck.layout:0").unwrap();

    assert_eq!(
        a.tick(),
        Heartbeat::Lost {
            slot_id: "0".into()
        }
    );
    assert_eq!(a.slot_id(), None);
    assert!(a.workspace().storage().is_none());

    a.open_panel("chat", OpenOptions::default()).unwrap();
    assert_eq!(origin.durable.get("paneldeck.layout:0").unwrap(), owned_by_b);
}
